//! Grant and revoke: the only mutation paths into the store.
//!
//! Grants are monotonic-additive, a bit union into whatever is stored, so
//! granting is idempotent and two managers racing on one key both land.
//! Revocation clears exactly the named bits and keeps the row; a record
//! revoked down to no bits reads as absent everywhere. Expiry on writes
//! follows the caller's [`Expiry`] policy verbatim.
//!
//! Bulk variants are chunked and best-effort: every subject is attempted,
//! failures are reported by input index, and because the underlying writes
//! are idempotent unions a partial run can simply be re-run. Malformed
//! input fails the whole call up front, before anything is written.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::bits::PermissionSet;
use crate::engine::Engine;
use crate::error::{EngineError, Result, StoreError};
use crate::record::{Expiry, GrantRecord};
use crate::scope::ScopeKey;
use crate::store::GrantStore;

/// Subjects per store batch in bulk operations.
pub(crate) const BULK_CHUNK: usize = 512;

/// One subject a bulk operation could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    /// Index into the input slice.
    pub index: usize,
    pub key: ScopeKey,
    pub error: StoreError,
}

/// Outcome of a bulk mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkReport {
    /// Subjects applied.
    pub applied: usize,
    /// Subjects not applied, by input index.
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<S: GrantStore> Engine<S> {
    /// Merge `bits` into the record at `key`.
    ///
    /// Creates the record if absent, unions if present, and applies
    /// `expiry` to the stored timestamp. An empty `bits` is rejected:
    /// a grant that grants nothing is a caller bug, not a no-op.
    pub fn grant(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<GrantRecord> {
        self.check_key(key)?;
        if bits.is_empty() {
            return Err(EngineError::EmptyPermissionSet);
        }
        let rec = self.store.merge(key, bits, expiry)?;
        debug!(scope = %key, bits = %bits, "grant merged");
        Ok(rec)
    }

    /// Store exactly `bits` at `key`, replacing whatever was there.
    ///
    /// The non-additive escape hatch: the record becomes precisely what is
    /// passed, expiry included. An empty set is allowed here, it is the
    /// explicit way to clear a record while keeping its row.
    pub fn replace(
        &self,
        key: &ScopeKey,
        bits: PermissionSet,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<GrantRecord> {
        self.check_key(key)?;
        let rec = GrantRecord::new(bits, expires_at);
        self.store.replace(key, rec)?;
        debug!(scope = %key, bits = %bits, "grant replaced");
        Ok(rec)
    }

    /// Clear exactly `bits` from the record at `key`.
    ///
    /// Bits not present are ignored; the row is kept for audit even when
    /// nothing remains. `None` means there was no record to revoke from,
    /// which is already the revoked state.
    pub fn revoke(&self, key: &ScopeKey, bits: PermissionSet) -> Result<Option<GrantRecord>> {
        self.check_key(key)?;
        if bits.is_empty() {
            return Err(EngineError::EmptyPermissionSet);
        }
        let rec = self.store.clear_bits(key, bits)?;
        debug!(scope = %key, bits = %bits, "grant revoked");
        Ok(rec)
    }

    /// Remove the row at `key` entirely, audit trail included.
    pub fn delete_grant(&self, key: &ScopeKey) -> Result<bool> {
        self.check_key(key)?;
        let existed = self.store.delete(key)?;
        debug!(scope = %key, existed, "grant deleted");
        Ok(existed)
    }

    /// [`grant`] over many subjects.
    ///
    /// All keys are validated before anything is written; a malformed key
    /// fails the whole call. Store-level failures are per-subject: the
    /// rest of the batch still lands and the report says exactly which
    /// indices to retry.
    ///
    /// [`grant`]: Engine::grant
    pub fn bulk_grant(
        &self,
        keys: &[ScopeKey],
        bits: PermissionSet,
        expiry: Expiry,
    ) -> Result<BulkReport> {
        if bits.is_empty() {
            return Err(EngineError::EmptyPermissionSet);
        }
        for key in keys {
            self.check_key(key)?;
        }
        let report = self.bulk_apply(keys, |chunk| self.store.merge_many(chunk, bits, expiry));
        debug!(
            subjects = keys.len(),
            applied = report.applied,
            failed = report.failures.len(),
            bits = %bits,
            "bulk grant"
        );
        Ok(report)
    }

    /// [`revoke`] over many subjects, with the same reporting as
    /// [`bulk_grant`].
    ///
    /// [`revoke`]: Engine::revoke
    /// [`bulk_grant`]: Engine::bulk_grant
    pub fn bulk_revoke(&self, keys: &[ScopeKey], bits: PermissionSet) -> Result<BulkReport> {
        if bits.is_empty() {
            return Err(EngineError::EmptyPermissionSet);
        }
        for key in keys {
            self.check_key(key)?;
        }
        let report = self.bulk_apply(keys, |chunk| self.store.clear_many(chunk, bits));
        debug!(
            subjects = keys.len(),
            applied = report.applied,
            failed = report.failures.len(),
            bits = %bits,
            "bulk revoke"
        );
        Ok(report)
    }

    /// Drive a chunked batch write and fold per-chunk results into one
    /// report. A chunk that fails outright is counted as every subject in
    /// it failing; transactional stores roll such a chunk back, so
    /// retrying those indices is always safe.
    fn bulk_apply(
        &self,
        keys: &[ScopeKey],
        mut apply: impl FnMut(&[ScopeKey]) -> std::result::Result<Vec<(usize, StoreError)>, StoreError>,
    ) -> BulkReport {
        let mut report = BulkReport::default();
        for (chunk_idx, chunk) in keys.chunks(BULK_CHUNK).enumerate() {
            let base = chunk_idx * BULK_CHUNK;
            match apply(chunk) {
                Ok(failures) => {
                    report.applied += chunk.len() - failures.len();
                    for (i, error) in failures {
                        warn!(scope = %chunk[i], %error, "bulk subject failed");
                        report.failures.push(BulkFailure {
                            index: base + i,
                            key: chunk[i].clone(),
                            error,
                        });
                    }
                }
                Err(error) => {
                    warn!(chunk = chunk_idx, %error, "bulk chunk failed");
                    for (i, key) in chunk.iter().enumerate() {
                        report.failures.push(BulkFailure {
                            index: base + i,
                            key: key.clone(),
                            error: error.clone(),
                        });
                    }
                }
            }
        }
        report
    }
}
