//! Permission kinds and bitset operations.
//!
//! The enumeration is closed and shared by every grant scope: a bit
//! position means the same operation everywhere. Bits outside the
//! enumeration are rejected at the boundary rather than silently carried
//! or silently denied.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Sub};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// One operation kind, identified by its bit position.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Read = 0,
    Edit = 1,
    Delete = 2,
    Publish = 3,
    Share = 4,
    Comment = 5,
    Vote = 6,
    Reply = 7,
    Draft = 8,
    Download = 9,
    ManageCollaborators = 10,
}

impl PermissionKind {
    /// Every kind, in bit order.
    pub const ALL: [PermissionKind; 11] = [
        PermissionKind::Read,
        PermissionKind::Edit,
        PermissionKind::Delete,
        PermissionKind::Publish,
        PermissionKind::Share,
        PermissionKind::Comment,
        PermissionKind::Vote,
        PermissionKind::Reply,
        PermissionKind::Draft,
        PermissionKind::Download,
        PermissionKind::ManageCollaborators,
    ];

    /// The single-bit mask for this kind.
    #[inline]
    pub const fn bit(self) -> u64 {
        1 << (self as u8)
    }

    /// Lowercase wire/display name.
    pub const fn name(self) -> &'static str {
        match self {
            PermissionKind::Read => "read",
            PermissionKind::Edit => "edit",
            PermissionKind::Delete => "delete",
            PermissionKind::Publish => "publish",
            PermissionKind::Share => "share",
            PermissionKind::Comment => "comment",
            PermissionKind::Vote => "vote",
            PermissionKind::Reply => "reply",
            PermissionKind::Draft => "draft",
            PermissionKind::Download => "download",
            PermissionKind::ManageCollaborators => "manage_collaborators",
        }
    }

    /// Parse a kind name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|k| k.name() == lower)
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn valid_mask() -> u64 {
    let mut mask = 0u64;
    let mut i = 0;
    while i < PermissionKind::ALL.len() {
        mask |= 1 << (PermissionKind::ALL[i] as u8);
        i += 1;
    }
    mask
}

/// A set of [`PermissionKind`]s packed into one integer.
///
/// Union, intersection and membership are O(1). Construction from raw bits
/// validates against the closed enumeration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionSet(u64);

impl PermissionSet {
    /// Mask with every defined bit set.
    pub const VALID_MASK: u64 = valid_mask();

    /// The empty set.
    #[inline]
    pub const fn empty() -> Self {
        PermissionSet(0)
    }

    /// Every defined permission.
    #[inline]
    pub const fn all() -> Self {
        PermissionSet(Self::VALID_MASK)
    }

    /// Set containing exactly `kinds`.
    pub fn of(kinds: &[PermissionKind]) -> Self {
        kinds.iter().copied().collect()
    }

    /// Validate raw bits against the closed enumeration.
    ///
    /// Unknown bits are a contract violation, surfaced as
    /// [`EngineError::UnknownPermission`] carrying the offending bits.
    pub fn from_bits(bits: u64) -> Result<Self, EngineError> {
        let unknown = bits & !Self::VALID_MASK;
        if unknown != 0 {
            return Err(EngineError::UnknownPermission(unknown));
        }
        Ok(PermissionSet(bits))
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of kinds in the set.
    #[inline]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub const fn contains(self, kind: PermissionKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// True when every kind of `other` is present.
    #[inline]
    pub const fn contains_all(self, other: PermissionSet) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, kind: PermissionKind) {
        self.0 |= kind.bit();
    }

    #[inline]
    pub fn remove(&mut self, kind: PermissionKind) {
        self.0 &= !kind.bit();
    }

    /// Kinds in `self` but not in `other`.
    #[inline]
    pub const fn difference(self, other: PermissionSet) -> Self {
        PermissionSet(self.0 & !other.0)
    }

    /// Iterate the kinds in bit order.
    pub fn iter(self) -> impl Iterator<Item = PermissionKind> {
        PermissionKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    /// Names of every kind in the set, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(PermissionKind::name).collect()
    }

    /// Parse a list of kind names into a set, reporting unknown names
    /// instead of dropping them.
    pub fn parse_names<'a>(names: &[&'a str]) -> (Self, Vec<&'a str>) {
        let mut set = PermissionSet::empty();
        let mut unknown = Vec::new();
        for name in names {
            match PermissionKind::from_name(name) {
                Some(kind) => set.insert(kind),
                None => unknown.push(*name),
            }
        }
        (set, unknown)
    }
}

impl From<PermissionKind> for PermissionSet {
    fn from(kind: PermissionKind) -> Self {
        PermissionSet(kind.bit())
    }
}

impl FromIterator<PermissionKind> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PermissionSet::empty(), |acc, k| PermissionSet(acc.0 | k.bit()))
    }
}

impl BitOr for PermissionSet {
    type Output = PermissionSet;
    fn bitor(self, rhs: Self) -> Self {
        PermissionSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for PermissionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PermissionSet {
    type Output = PermissionSet;
    fn bitand(self, rhs: Self) -> Self {
        PermissionSet(self.0 & rhs.0)
    }
}

impl Sub for PermissionSet {
    type Output = PermissionSet;
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.names().join("|"))
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionSet({})", self)
    }
}

// Serialized as the raw integer; deserialization funnels through the
// closed-set check so foreign bits cannot enter via stored or wire data.
impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        PermissionSet::from_bits(bits).map_err(D::Error::custom)
    }
}
