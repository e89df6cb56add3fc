//! In-memory record store on a sharded concurrent map.
//!
//! Suitable for tests and for embedders that keep grants ephemeral. The
//! map's per-entry locking is the serialization point: a merge holds the
//! entry for its whole read-modify-write, so concurrent merges to one key
//! union cleanly. Scans walk the whole map; this adapter trades scan speed
//! for zero setup.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::bits::PermissionSet;
use crate::error::StoreError;
use crate::record::{Expiry, GrantRecord};
use crate::scope::ScopeKey;
use crate::store::GrantStore;

/// Concurrent in-memory [`GrantStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ScopeKey, GrantRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { records: DashMap::new() }
    }

    /// Number of stored rows, live or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl GrantStore for MemoryStore {
    fn get(&self, key: &ScopeKey) -> Result<Option<GrantRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| *r))
    }

    fn merge(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<GrantRecord, StoreError> {
        // The entry guard pins the shard for the full read-modify-write.
        let mut entry = self
            .records
            .entry(key.clone())
            .or_insert_with(|| GrantRecord::permanent(PermissionSet::empty()));
        entry.bits |= bits;
        entry.expires_at = expiry.apply(entry.expires_at);
        Ok(*entry)
    }

    fn replace(&self, key: &ScopeKey, record: GrantRecord) -> Result<(), StoreError> {
        self.records.insert(key.clone(), record);
        Ok(())
    }

    fn clear_bits(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
    ) -> Result<Option<GrantRecord>, StoreError> {
        match self.records.get_mut(key) {
            Some(mut rec) => {
                rec.bits = rec.bits - bits;
                Ok(Some(*rec))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &ScopeKey) -> Result<bool, StoreError> {
        Ok(self.records.remove(key).is_some())
    }

    fn user_grants(
        &self,
        tenant: &str,
        user: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|e| e.key().tenant_id() == Some(tenant) && e.key().user_id() == Some(user))
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    fn resource_grants(
        &self,
        tenant: &str,
        kind: &str,
        resource: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|e| {
                matches!(
                    e.key(),
                    ScopeKey::Resource { tenant: t, kind: k, resource: r, .. }
                        if t == tenant && k == kind && r == resource
                )
            })
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, rec| rec.is_live(now));
        Ok(before.saturating_sub(self.records.len()))
    }
}
