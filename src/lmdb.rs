//! LMDB-backed record store.
//!
//! Layout, one named database per scope kind:
//! - `tenant`    [tenant][user]                 -> record
//! - `ctype`     [tenant][user][content_type]   -> record
//! - `res`       [tenant][user][kind][resource] -> record
//! - `res_rev`   [tenant][kind][resource][user] -> same record
//! - `defaults`  [tenant]                       -> record, global row under `_global`
//!
//! Keys come from [`crate::keys`]; length prefixes make every multi-part
//! scan an exact prefix scan. Resource records are written to both `res`
//! and `res_rev` in the same transaction so "grants held by a user" and
//! "users on a resource" are each one scan.
//!
//! LMDB gives the store contract for free: writers are serialized by the
//! single write transaction, readers run on MVCC snapshots and never
//! block, and a batch read inside one read transaction is one consistent
//! snapshot.

use std::path::Path;

use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::bits::PermissionSet;
use crate::error::{backend, StoreError};
use crate::keys;
use crate::record::{Expiry, GrantRecord};
use crate::scope::ScopeKey;
use crate::store::{GrantStore, MergeFailures};

type Db = Database<Bytes, Bytes>;

const MAX_DBS: u32 = 5;

/// Tuning for [`LmdbStore::open_with`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Memory map size in bytes; the upper bound on total store size.
    pub map_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions { map_size: 1 << 30 }
    }
}

/// Forward and reverse resource index, kept in sync on every write.
struct BiPair {
    fwd: Db,
    rev: Db,
}

impl BiPair {
    fn put(&self, tx: &mut RwTxn, fwd: &[u8], rev: &[u8], val: &[u8]) -> Result<(), StoreError> {
        self.fwd.put(tx, fwd, val).map_err(backend)?;
        self.rev.put(tx, rev, val).map_err(backend)
    }

    fn del(&self, tx: &mut RwTxn, fwd: &[u8], rev: &[u8]) -> Result<bool, StoreError> {
        let r = self.fwd.delete(tx, fwd).map_err(backend)?;
        self.rev.delete(tx, rev).map_err(backend)?;
        Ok(r)
    }
}

struct Dbs {
    tenants: Db,
    content_types: Db,
    resources: BiPair,
    defaults: Db,
}

/// Durable [`GrantStore`] on an LMDB environment.
pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
}

impl LmdbStore {
    /// Open (creating if needed) the store at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path.as_ref()).map_err(backend)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(options.map_size)
                .max_dbs(MAX_DBS)
                .open(path.as_ref())
                .map_err(backend)?
        };
        let mut tx = env.write_txn().map_err(backend)?;
        let dbs = Dbs {
            tenants: env.create_database(&mut tx, Some("tenant")).map_err(backend)?,
            content_types: env.create_database(&mut tx, Some("ctype")).map_err(backend)?,
            resources: BiPair {
                fwd: env.create_database(&mut tx, Some("res")).map_err(backend)?,
                rev: env.create_database(&mut tx, Some("res_rev")).map_err(backend)?,
            },
            defaults: env.create_database(&mut tx, Some("defaults")).map_err(backend)?,
        };
        tx.commit().map_err(backend)?;
        Ok(LmdbStore { env, dbs })
    }

    /// Run a read-only operation on one snapshot.
    fn read<T>(&self, f: impl FnOnce(&RoTxn) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let tx = self.env.read_txn().map_err(backend)?;
        f(&tx)
    }

    /// Run a write operation in one committed transaction.
    fn write<T>(&self, f: impl FnOnce(&mut RwTxn) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut tx = self.env.write_txn().map_err(backend)?;
        let out = f(&mut tx)?;
        tx.commit().map_err(backend)?;
        Ok(out)
    }

    /// Database and encoded key for a scope, forward side for resources.
    fn slot(&self, key: &ScopeKey) -> (&Db, Vec<u8>) {
        match key {
            ScopeKey::Global => (&self.dbs.defaults, keys::default_key(keys::GLOBAL_TENANT)),
            ScopeKey::TenantDefault { tenant } => (&self.dbs.defaults, keys::default_key(tenant)),
            ScopeKey::Tenant { tenant, user } => {
                (&self.dbs.tenants, keys::tenant_key(tenant, user))
            }
            ScopeKey::ContentType { tenant, user, content_type } => {
                (&self.dbs.content_types, keys::content_type_key(tenant, user, content_type))
            }
            ScopeKey::Resource { tenant, user, kind, resource } => {
                (&self.dbs.resources.fwd, keys::resource_key(tenant, user, kind, resource))
            }
        }
    }

    fn get_raw(&self, tx: &RoTxn, key: &ScopeKey) -> Result<Option<GrantRecord>, StoreError> {
        let (db, k) = self.slot(key);
        match db.get(tx, &k).map_err(backend)? {
            Some(bytes) => Ok(Some(keys::decode_record(bytes)?)),
            None => Ok(None),
        }
    }

    fn put_raw(&self, tx: &mut RwTxn, key: &ScopeKey, rec: &GrantRecord) -> Result<(), StoreError> {
        let val = keys::encode_record(rec);
        match key {
            ScopeKey::Resource { tenant, user, kind, resource } => self.dbs.resources.put(
                tx,
                &keys::resource_key(tenant, user, kind, resource),
                &keys::resource_rev_key(tenant, kind, resource, user),
                &val,
            ),
            _ => {
                let (db, k) = self.slot(key);
                db.put(tx, &k, &val).map_err(backend)
            }
        }
    }

    fn del_raw(&self, tx: &mut RwTxn, key: &ScopeKey) -> Result<bool, StoreError> {
        match key {
            ScopeKey::Resource { tenant, user, kind, resource } => self.dbs.resources.del(
                tx,
                &keys::resource_key(tenant, user, kind, resource),
                &keys::resource_rev_key(tenant, kind, resource, user),
            ),
            _ => {
                let (db, k) = self.slot(key);
                db.delete(tx, &k).map_err(backend)
            }
        }
    }

    fn merge_raw(
        &self,
        tx: &mut RwTxn,
        key: &ScopeKey,
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<GrantRecord, StoreError> {
        let cur = self.get_raw(tx, key)?.unwrap_or(GrantRecord::permanent(PermissionSet::empty()));
        let next = GrantRecord::new(cur.bits | bits, expiry.apply(cur.expires_at));
        self.put_raw(tx, key, &next)?;
        Ok(next)
    }

    fn clear_raw(
        &self,
        tx: &mut RwTxn,
        key: &ScopeKey,
        bits: PermissionSet,
    ) -> Result<Option<GrantRecord>, StoreError> {
        match self.get_raw(tx, key)? {
            Some(cur) => {
                let next = GrantRecord::new(cur.bits - bits, cur.expires_at);
                self.put_raw(tx, key, &next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }
}

impl GrantStore for LmdbStore {
    fn get(&self, key: &ScopeKey) -> Result<Option<GrantRecord>, StoreError> {
        self.read(|tx| self.get_raw(tx, key))
    }

    fn get_many(&self, keys: &[ScopeKey]) -> Result<Vec<Option<GrantRecord>>, StoreError> {
        // One read transaction, so the whole batch sees one snapshot.
        self.read(|tx| keys.iter().map(|k| self.get_raw(tx, k)).collect())
    }

    fn merge(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<GrantRecord, StoreError> {
        self.write(|tx| self.merge_raw(tx, key, bits, expiry))
    }

    fn merge_many(
        &self,
        keys: &[ScopeKey],
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<MergeFailures, StoreError> {
        self.write(|tx| {
            let mut failures = MergeFailures::new();
            for (i, key) in keys.iter().enumerate() {
                if let Err(e) = self.merge_raw(tx, key, bits, expiry) {
                    failures.push((i, e));
                }
            }
            Ok(failures)
        })
    }

    fn replace(&self, key: &ScopeKey, record: GrantRecord) -> Result<(), StoreError> {
        self.write(|tx| self.put_raw(tx, key, &record))
    }

    fn clear_bits(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
    ) -> Result<Option<GrantRecord>, StoreError> {
        self.write(|tx| self.clear_raw(tx, key, bits))
    }

    fn clear_many(&self, keys: &[ScopeKey], bits: PermissionSet) -> Result<MergeFailures, StoreError> {
        self.write(|tx| {
            let mut failures = MergeFailures::new();
            for (i, key) in keys.iter().enumerate() {
                if let Err(e) = self.clear_raw(tx, key, bits) {
                    failures.push((i, e));
                }
            }
            Ok(failures)
        })
    }

    fn delete(&self, key: &ScopeKey) -> Result<bool, StoreError> {
        self.write(|tx| self.del_raw(tx, key))
    }

    fn user_grants(
        &self,
        tenant: &str,
        user: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError> {
        self.read(|tx| {
            let mut out = Vec::new();
            let pfx = keys::build_prefix(&[tenant, user]);

            if let Some(bytes) = self.dbs.tenants.get(tx, &pfx).map_err(backend)? {
                out.push((ScopeKey::tenant(tenant, user), keys::decode_record(bytes)?));
            }
            for item in self.dbs.content_types.prefix_iter(tx, &pfx).map_err(backend)? {
                let (k, v) = item.map_err(backend)?;
                let ct = keys::get_part(k, 2)
                    .ok_or_else(|| StoreError::Corrupt("short content-type key".into()))?;
                out.push((ScopeKey::content_type(tenant, user, ct), keys::decode_record(v)?));
            }
            for item in self.dbs.resources.fwd.prefix_iter(tx, &pfx).map_err(backend)? {
                let (k, v) = item.map_err(backend)?;
                let kind = keys::get_part(k, 2)
                    .ok_or_else(|| StoreError::Corrupt("short resource key".into()))?;
                let res = keys::get_part(k, 3)
                    .ok_or_else(|| StoreError::Corrupt("short resource key".into()))?;
                out.push((ScopeKey::resource(tenant, user, kind, res), keys::decode_record(v)?));
            }
            Ok(out)
        })
    }

    fn resource_grants(
        &self,
        tenant: &str,
        kind: &str,
        resource: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>, StoreError> {
        self.read(|tx| {
            let mut out = Vec::new();
            let pfx = keys::build_prefix(&[tenant, kind, resource]);
            for item in self.dbs.resources.rev.prefix_iter(tx, &pfx).map_err(backend)? {
                let (k, v) = item.map_err(backend)?;
                let user = keys::get_part(k, 3)
                    .ok_or_else(|| StoreError::Corrupt("short reverse key".into()))?;
                out.push((ScopeKey::resource(tenant, user, kind, resource), keys::decode_record(v)?));
            }
            Ok(out)
        })
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.write(|tx| {
            let mut removed = 0usize;

            for db in [&self.dbs.tenants, &self.dbs.content_types, &self.dbs.defaults] {
                let mut dead: Vec<Vec<u8>> = Vec::new();
                for item in db.iter(tx).map_err(backend)? {
                    let (k, v) = item.map_err(backend)?;
                    if !keys::decode_record(v)?.is_live(now) {
                        dead.push(k.to_vec());
                    }
                }
                for k in &dead {
                    db.delete(tx, k).map_err(backend)?;
                }
                removed += dead.len();
            }

            // Resource rows carry their reverse twin.
            let mut dead: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
            for item in self.dbs.resources.fwd.iter(tx).map_err(backend)? {
                let (k, v) = item.map_err(backend)?;
                if !keys::decode_record(v)?.is_live(now) {
                    let parts = keys::parse_key(k);
                    if let [tenant, user, kind, res] = parts[..] {
                        dead.push((k.to_vec(), keys::resource_rev_key(tenant, kind, res, user)));
                    }
                }
            }
            for (fwd, rev) in &dead {
                self.dbs.resources.del(tx, fwd, rev)?;
            }
            removed += dead.len();

            Ok(removed)
        })
    }
}
