//! Effective permission aggregation.
//!
//! The union of every live grant visible to a context on a target, meant
//! for affordance: menus, toolbars, capability lists. It deliberately
//! cannot say which scope contributed a bit, so it is no substitute for
//! [`Engine::resolve`] at an enforcement point.

use chrono::Utc;

use crate::bits::PermissionSet;
use crate::engine::Engine;
use crate::error::Result;
use crate::scope::{AccessContext, Target};
use crate::store::GrantStore;

impl<S: GrantStore> Engine<S> {
    /// Union of live bits across every scope the target reaches.
    ///
    /// Purely additive; an empty result means nothing is granted anywhere
    /// in the hierarchy for this target.
    pub fn effective_permissions(
        &self,
        ctx: &AccessContext,
        target: &Target,
    ) -> Result<PermissionSet> {
        let keys = self.hierarchy_keys(ctx, target)?;
        let now = Utc::now();
        let records = self.store.get_many(&keys)?;
        Ok(records
            .iter()
            .flatten()
            .fold(PermissionSet::empty(), |acc, rec| acc | rec.live_bits(now)))
    }
}
