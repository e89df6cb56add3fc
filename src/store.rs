//! Record store interface.
//!
//! The engine talks to storage only through [`GrantStore`]. Adapters
//! persist records faithfully and keep one guarantee: writes to the same
//! key are serialized, so a read-modify-write [`merge`] never loses bits to
//! a concurrent writer. Keys arrive through the engine's validation, every
//! id part non-empty and at most [`MAX_PART_LEN`] bytes, which
//! length-prefixed key codecs rely on. Liveness (expiry, empty bits) is
//! interpreted by the callers, not here; stores return what is physically
//! present.
//!
//! [`merge`]: GrantStore::merge
//! [`MAX_PART_LEN`]: crate::scope::MAX_PART_LEN

use chrono::{DateTime, Utc};

use crate::bits::PermissionSet;
use crate::error::StoreError;
use crate::record::{Expiry, GrantRecord};
use crate::scope::ScopeKey;

/// Per-key failures from a best-effort batch write, by input index.
pub type MergeFailures = Vec<(usize, StoreError)>;

/// Storage adapter for grant records, keyed by [`ScopeKey`].
pub trait GrantStore: Send + Sync {
    /// Fetch the record stored at `key`, expired rows included.
    fn get(&self, key: &ScopeKey) -> Result<Option<GrantRecord>, StoreError>;

    /// Fetch several records in one trip.
    ///
    /// Returns exactly one entry per key, in input order; callers match
    /// entries to keys positionally. Adapters with snapshot reads serve
    /// the whole batch from one snapshot. The default forwards to [`get`]
    /// per key.
    ///
    /// [`get`]: GrantStore::get
    fn get_many(&self, keys: &[ScopeKey]) -> Result<Vec<Option<GrantRecord>>, StoreError> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Union `bits` into the record at `key`, creating it if absent, and
    /// apply `expiry` to the stored timestamp. The read-modify-write runs
    /// inside the store's serialization point for that key.
    fn merge(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<GrantRecord, StoreError>;

    /// [`merge`] over many keys, best-effort: a failing key is reported by
    /// input index and the rest are still applied. The outer error is for
    /// failures before any key was attempted.
    ///
    /// [`merge`]: GrantStore::merge
    fn merge_many(
        &self,
        keys: &[ScopeKey],
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<MergeFailures, StoreError> {
        let mut failures = MergeFailures::new();
        for (i, key) in keys.iter().enumerate() {
            if let Err(e) = self.merge(key, bits, expiry) {
                failures.push((i, e));
            }
        }
        Ok(failures)
    }

    /// Store `record` at `key` verbatim, replacing whatever was there.
    fn replace(&self, key: &ScopeKey, record: GrantRecord) -> Result<(), StoreError>;

    /// Clear exactly `bits` from the record at `key`. The row is kept even
    /// when no bits remain. Absent rows stay absent; none is created.
    /// Returns the updated record, or `None` when there was no row.
    fn clear_bits(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
    ) -> Result<Option<GrantRecord>, StoreError>;

    /// [`clear_bits`] over many keys with the same best-effort reporting
    /// as [`merge_many`].
    ///
    /// [`clear_bits`]: GrantStore::clear_bits
    /// [`merge_many`]: GrantStore::merge_many
    fn clear_many(&self, keys: &[ScopeKey], bits: PermissionSet) -> Result<MergeFailures, StoreError> {
        let mut failures = MergeFailures::new();
        for (i, key) in keys.iter().enumerate() {
            if let Err(e) = self.clear_bits(key, bits) {
                failures.push((i, e));
            }
        }
        Ok(failures)
    }

    /// Physically remove the row at `key`. Returns whether one existed.
    fn delete(&self, key: &ScopeKey) -> Result<bool, StoreError>;

    /// Every per-user record held by `user` in `tenant`: tenant,
    /// content-type and resource scopes. Order unspecified.
    fn user_grants(
        &self,
        tenant: &str,
        user: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError>;

    /// Every user's resource-scope record on one entity. Order unspecified.
    fn resource_grants(
        &self,
        tenant: &str,
        kind: &str,
        resource: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError>;

    /// Remove rows that are expired at `now` or hold no bits. Returns how
    /// many were removed. Reads never depend on this; it is hygiene only.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
