//! Tiered discretionary access control with scoped grant records.
//!
//! Access is decided by walking a fixed hierarchy of grant scopes from
//! narrowest to broadest: resource, content type, tenant, tenant default,
//! global default. A live grant holding the requested permission
//! short-circuits the walk; a scope that says nothing falls through.
//! There are no negative grants, so denial is simply every scope falling
//! through.
//!
//! Grants are bitmask records: one closed set of permission kinds, one bit
//! position per kind, the same meaning at every scope. Records may carry
//! an expiry, evaluated lazily at read time. Storage is pluggable through
//! [`GrantStore`]; [`MemoryStore`] keeps everything in a concurrent map,
//! [`LmdbStore`] persists to LMDB.
//!
//! ```
//! use scopebit::{
//!     AccessContext, Engine, EntityKindDescriptor, Expiry, KindRegistry, MemoryStore,
//!     OperationTable, PermissionKind, PermissionSet, ScopeKey, Target,
//! };
//!
//! # fn main() -> scopebit::Result<()> {
//! let kinds = KindRegistry::new().with(EntityKindDescriptor::new("document", "article"));
//! let engine = Engine::with_registry(MemoryStore::new(), kinds, OperationTable::new());
//!
//! engine.grant(
//!     &ScopeKey::resource("acme", "maya", "document", "doc-7"),
//!     PermissionSet::of(&[PermissionKind::Read, PermissionKind::Edit]),
//!     Expiry::Keep,
//! )?;
//!
//! let ctx = AccessContext::new("maya", "acme");
//! let decision = engine.resolve(&ctx, PermissionKind::Edit, &Target::resource("document", "doc-7"))?;
//! assert!(decision.is_granted());
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod bulk;
pub mod effective;
pub mod engine;
pub mod error;
pub mod grants;
mod keys;
pub mod lmdb;
pub mod memory;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod store;

pub use bits::{PermissionKind, PermissionSet};
pub use engine::Engine;
pub use error::{EngineError, Result, StoreError};
pub use grants::{BulkFailure, BulkReport};
pub use lmdb::{LmdbStore, StoreOptions};
pub use memory::MemoryStore;
pub use record::{Expiry, GrantRecord};
pub use registry::{
    EntityKindDescriptor, KindRegistry, OperationRequirement, OperationTable, TargetShape,
};
pub use resolver::Decision;
pub use scope::{AccessContext, MAX_PART_LEN, ResourceRef, ScopeKey, ScopeKind, Target};
pub use store::{GrantStore, MergeFailures};
