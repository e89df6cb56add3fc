//! Hierarchy resolution: one permission, one target, one decision.
//!
//! The walk runs narrowest first: resource, content type, tenant, tenant
//! default, global default. A live grant holding the requested bit ends
//! the walk at that scope; a scope without the bit says nothing and the
//! walk falls through. There is no negative grant anywhere, so the only
//! way to be denied is for every scope to fall through.
//!
//! All scopes are fetched in one store batch before the walk, so one
//! resolution sees one consistent snapshot and one clock reading. The
//! reported scope is the narrowest live holder of the bit, which is what
//! audit wants; whether ANY scope holds it does not depend on the order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::bits::PermissionKind;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::registry::TargetShape;
use crate::scope::{check_part, AccessContext, ScopeKey, ScopeKind, Target};
use crate::store::GrantStore;

/// Outcome of a resolution. Denial is a value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The permission is held; `scope` is the narrowest scope granting it.
    Granted { scope: ScopeKind },
    /// No scope in the hierarchy grants the permission.
    Denied,
}

impl Decision {
    #[inline]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted { .. })
    }

    /// The granting scope, when granted.
    pub const fn granting_scope(&self) -> Option<ScopeKind> {
        match self {
            Decision::Granted { scope } => Some(*scope),
            Decision::Denied => None,
        }
    }
}

impl<S: GrantStore> Engine<S> {
    /// Scope keys consulted for this context and target, narrowest first.
    ///
    /// A resource target contributes its resource step plus a content-type
    /// step, derived from the kind registry unless the target overrides
    /// it. A bare content-type target starts at that step. The tenant,
    /// tenant-default and global steps are always present.
    pub(crate) fn hierarchy_keys(
        &self,
        ctx: &AccessContext,
        target: &Target,
    ) -> Result<Vec<ScopeKey>> {
        ctx.validate()?;
        target.validate()?;

        let mut keys = Vec::with_capacity(5);
        if let Some(res) = &target.resource {
            let descriptor = self
                .kinds
                .get(&res.kind)
                .ok_or_else(|| EngineError::UnknownEntityKind(res.kind.clone()))?;
            let ct = target.content_type.as_deref().unwrap_or(&descriptor.content_type);
            // Descriptors are registered unvalidated; a derived content
            // type gets the same checks as caller input.
            check_part(ct, "content type")?;
            keys.push(ScopeKey::resource(&ctx.tenant_id, &ctx.user_id, &res.kind, &res.id));
            keys.push(ScopeKey::content_type(&ctx.tenant_id, &ctx.user_id, ct));
        } else if let Some(ct) = &target.content_type {
            keys.push(ScopeKey::content_type(&ctx.tenant_id, &ctx.user_id, ct));
        }
        keys.push(ScopeKey::tenant(&ctx.tenant_id, &ctx.user_id));
        keys.push(ScopeKey::tenant_default(&ctx.tenant_id));
        keys.push(ScopeKey::global());
        Ok(keys)
    }

    /// Resolve one permission for one target.
    ///
    /// `Ok(Decision::Denied)` means the hierarchy was consulted and nothing
    /// grants the bit. `Err` means the question was malformed or the store
    /// could not answer; callers must not read an error as a denial.
    pub fn resolve(
        &self,
        ctx: &AccessContext,
        permission: PermissionKind,
        target: &Target,
    ) -> Result<Decision> {
        let keys = self.hierarchy_keys(ctx, target)?;
        let now = Utc::now();
        let records = self.store.get_many(&keys)?;

        for (key, rec) in keys.iter().zip(&records) {
            if let Some(rec) = rec {
                if rec.live_bits(now).contains(permission) {
                    trace!(
                        tenant = %ctx.tenant_id,
                        user = %ctx.user_id,
                        permission = %permission,
                        scope = %key.kind(),
                        "granted"
                    );
                    return Ok(Decision::Granted { scope: key.kind() });
                }
            }
        }
        trace!(
            tenant = %ctx.tenant_id,
            user = %ctx.user_id,
            permission = %permission,
            "denied"
        );
        Ok(Decision::Denied)
    }

    /// Convenience wrapper: the boolean of [`resolve`].
    ///
    /// [`resolve`]: Engine::resolve
    pub fn is_granted(
        &self,
        ctx: &AccessContext,
        permission: PermissionKind,
        target: &Target,
    ) -> Result<bool> {
        Ok(self.resolve(ctx, permission, target)?.is_granted())
    }

    /// Gate one registered operation: look up what it demands, check the
    /// target is shaped for it, then resolve the required permission.
    pub fn resolve_operation(
        &self,
        ctx: &AccessContext,
        op: &str,
        target: &Target,
    ) -> Result<Decision> {
        let req = *self.ops.require(op)?;
        match req.scope {
            TargetShape::Resource if target.resource.is_none() => {
                return Err(EngineError::InvalidTarget("operation requires a resource"));
            }
            TargetShape::ContentType
                if target.resource.is_none() && target.content_type.is_none() =>
            {
                return Err(EngineError::InvalidTarget("operation requires a content type"));
            }
            _ => {}
        }
        self.resolve(ctx, req.permission, target)
    }
}
