//! Grant records: permission bits with an optional expiry.
//!
//! Expiry is evaluated lazily at read time. A record whose expiry has
//! passed, or whose bits are all clear, reads as absent everywhere; the row
//! itself stays until a maintenance sweep removes it. Read paths capture
//! one timestamp per operation so a single resolution cannot straddle an
//! expiry boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bits::PermissionSet;

/// One stored grant: which bits are set and until when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub bits: PermissionSet,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GrantRecord {
    pub fn new(bits: PermissionSet, expires_at: Option<DateTime<Utc>>) -> Self {
        GrantRecord { bits, expires_at }
    }

    /// A grant with no expiry.
    pub fn permanent(bits: PermissionSet) -> Self {
        GrantRecord { bits, expires_at: None }
    }

    /// True once the stored expiry has passed. A record expires at exactly
    /// its `expires_at` instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Live means readable: bits set and not expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.bits.is_empty() && !self.is_expired(now)
    }

    /// The bits a read path may act on: all of them while live, none
    /// otherwise.
    pub fn live_bits(&self, now: DateTime<Utc>) -> PermissionSet {
        if self.is_live(now) {
            self.bits
        } else {
            PermissionSet::empty()
        }
    }
}

/// What a write does to the stored expiry.
///
/// The caller is authoritative: merging grants never silently picks one of
/// two timestamps, it does exactly what this says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    /// Leave the stored expiry as it is (none stays none).
    Keep,
    /// Clear the stored expiry; the grant becomes permanent.
    Never,
    /// Replace the stored expiry with this instant.
    At(DateTime<Utc>),
}

impl Expiry {
    /// Resulting expiry given what is currently stored.
    pub fn apply(self, current: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Keep => current,
            Expiry::Never => None,
            Expiry::At(at) => Some(at),
        }
    }
}
