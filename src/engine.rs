//! Engine assembly.
//!
//! [`Engine`] ties a record store to the startup registries. It keeps no
//! per-request state and takes no lock of its own; every operation is a
//! validation step, a batch of store calls, and pure bit arithmetic, so
//! one engine is shared freely across threads.
//!
//! The read and write surfaces live in sibling modules: resolution in
//! `resolver`, mutation in `grants`, aggregation in `effective`, batch
//! reads in `bulk`.

use chrono::Utc;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::record::GrantRecord;
use crate::registry::{KindRegistry, OperationTable};
use crate::scope::{check_part, AccessContext, ScopeKey};
use crate::store::GrantStore;

/// Permission engine over a [`GrantStore`].
pub struct Engine<S> {
    pub(crate) store: S,
    pub(crate) kinds: KindRegistry,
    pub(crate) ops: OperationTable,
}

impl<S: GrantStore> Engine<S> {
    /// Engine with empty registries. Content-type and tenant-wide targets
    /// work as-is; resource targets are refused until their kind is
    /// registered.
    pub fn new(store: S) -> Self {
        Engine { store, kinds: KindRegistry::new(), ops: OperationTable::new() }
    }

    pub fn with_registry(store: S, kinds: KindRegistry, ops: OperationTable) -> Self {
        Engine { store, kinds, ops }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub fn operations(&self) -> &OperationTable {
        &self.ops
    }

    /// A resource key names a kind; only registered kinds may hold grants.
    pub(crate) fn check_key(&self, key: &ScopeKey) -> Result<()> {
        key.validate()?;
        if let ScopeKey::Resource { kind, .. } = key {
            if !self.kinds.is_registered(kind) {
                return Err(EngineError::UnknownEntityKind(kind.clone()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Audit and maintenance surface
    // ========================================================================

    /// Every stored row held by the context's user, as stored: expired and
    /// emptied rows included, since they are part of the audit trail.
    /// Filter with [`GrantRecord::is_live`] for an affordance view.
    pub fn grants_for_user(&self, ctx: &AccessContext) -> Result<Vec<(ScopeKey, GrantRecord)>> {
        ctx.validate()?;
        Ok(self.store.user_grants(&ctx.tenant_id, &ctx.user_id)?)
    }

    /// Every user holding a resource-scope row on one entity, as stored.
    pub fn resource_collaborators(
        &self,
        tenant: &str,
        kind: &str,
        resource: &str,
    ) -> Result<Vec<(ScopeKey, GrantRecord)>> {
        check_part(tenant, "tenant id")?;
        check_part(kind, "entity kind")?;
        check_part(resource, "resource id")?;
        if !self.kinds.is_registered(kind) {
            return Err(EngineError::UnknownEntityKind(kind.to_string()));
        }
        Ok(self.store.resource_grants(tenant, kind, resource)?)
    }

    /// Delete rows that are expired or hold no bits. Reads never depend on
    /// this sweep; it reclaims space and shortens audit listings.
    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.store.purge_expired(Utc::now())?;
        debug!(removed, "purged dead grant records");
        Ok(removed)
    }
}
