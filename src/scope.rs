//! Scope addressing: who a grant belongs to and how wide it reaches.
//!
//! A grant record is keyed by exactly one [`ScopeKey`]. Tenants are
//! namespaces for every narrower part, and entity kinds are namespaces for
//! resource ids, so equal ids under different tenants or kinds never
//! collide. Ids starting with `_` are reserved for internal sentinels and
//! rejected at the boundary, as are parts over [`MAX_PART_LEN`] bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Longest id part in bytes. Storage keys length-prefix each part with a
/// single byte, so longer parts cannot be addressed.
pub const MAX_PART_LEN: usize = 255;

/// Width of a grant scope, narrowest first.
///
/// `Ord` follows resolution order: a smaller kind is consulted before a
/// larger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Resource,
    ContentType,
    Tenant,
    TenantDefault,
    Global,
}

impl ScopeKind {
    pub const fn name(self) -> &'static str {
        match self {
            ScopeKind::Resource => "resource",
            ScopeKind::ContentType => "content-type",
            ScopeKind::Tenant => "tenant",
            ScopeKind::TenantDefault => "tenant-default",
            ScopeKind::Global => "global",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Address of one grant record.
///
/// The two broadest scopes carry no user: a tenant default applies to every
/// user of the tenant, and the global default to every user of the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScopeKey {
    Global,
    TenantDefault {
        tenant: String,
    },
    Tenant {
        tenant: String,
        user: String,
    },
    ContentType {
        tenant: String,
        user: String,
        content_type: String,
    },
    Resource {
        tenant: String,
        user: String,
        kind: String,
        resource: String,
    },
}

impl ScopeKey {
    pub fn global() -> Self {
        ScopeKey::Global
    }

    pub fn tenant_default(tenant: impl Into<String>) -> Self {
        ScopeKey::TenantDefault { tenant: tenant.into() }
    }

    pub fn tenant(tenant: impl Into<String>, user: impl Into<String>) -> Self {
        ScopeKey::Tenant { tenant: tenant.into(), user: user.into() }
    }

    pub fn content_type(
        tenant: impl Into<String>,
        user: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        ScopeKey::ContentType {
            tenant: tenant.into(),
            user: user.into(),
            content_type: content_type.into(),
        }
    }

    pub fn resource(
        tenant: impl Into<String>,
        user: impl Into<String>,
        kind: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        ScopeKey::Resource {
            tenant: tenant.into(),
            user: user.into(),
            kind: kind.into(),
            resource: resource.into(),
        }
    }

    pub const fn kind(&self) -> ScopeKind {
        match self {
            ScopeKey::Global => ScopeKind::Global,
            ScopeKey::TenantDefault { .. } => ScopeKind::TenantDefault,
            ScopeKey::Tenant { .. } => ScopeKind::Tenant,
            ScopeKey::ContentType { .. } => ScopeKind::ContentType,
            ScopeKey::Resource { .. } => ScopeKind::Resource,
        }
    }

    /// Tenant part, absent only for the global default.
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            ScopeKey::Global => None,
            ScopeKey::TenantDefault { tenant }
            | ScopeKey::Tenant { tenant, .. }
            | ScopeKey::ContentType { tenant, .. }
            | ScopeKey::Resource { tenant, .. } => Some(tenant),
        }
    }

    /// User part for the per-user scopes.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            ScopeKey::Global | ScopeKey::TenantDefault { .. } => None,
            ScopeKey::Tenant { user, .. }
            | ScopeKey::ContentType { user, .. }
            | ScopeKey::Resource { user, .. } => Some(user),
        }
    }

    /// Check every id part: non-empty, not `_`-reserved.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            ScopeKey::Global => Ok(()),
            ScopeKey::TenantDefault { tenant } => check_part(tenant, "tenant id"),
            ScopeKey::Tenant { tenant, user } => {
                check_part(tenant, "tenant id")?;
                check_part(user, "user id")
            }
            ScopeKey::ContentType { tenant, user, content_type } => {
                check_part(tenant, "tenant id")?;
                check_part(user, "user id")?;
                check_part(content_type, "content type")
            }
            ScopeKey::Resource { tenant, user, kind, resource } => {
                check_part(tenant, "tenant id")?;
                check_part(user, "user id")?;
                check_part(kind, "entity kind")?;
                check_part(resource, "resource id")
            }
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Global => f.write_str("global"),
            ScopeKey::TenantDefault { tenant } => write!(f, "tenant-default:{tenant}"),
            ScopeKey::Tenant { tenant, user } => write!(f, "tenant:{tenant}/{user}"),
            ScopeKey::ContentType { tenant, user, content_type } => {
                write!(f, "content-type:{tenant}/{user}/{content_type}")
            }
            ScopeKey::Resource { tenant, user, kind, resource } => {
                write!(f, "resource:{tenant}/{user}/{kind}/{resource}")
            }
        }
    }
}

/// Ids starting with `_` are reserved for internal sentinels.
pub(crate) fn is_reserved(id: &str) -> bool {
    id.starts_with('_')
}

pub(crate) fn check_part(part: &str, what: &'static str) -> Result<(), EngineError> {
    if part.is_empty() {
        return Err(EngineError::InvalidTarget(what));
    }
    if is_reserved(part) {
        return Err(EngineError::InvalidTarget(what));
    }
    if part.len() > MAX_PART_LEN {
        return Err(EngineError::InvalidTarget(what));
    }
    Ok(())
}

/// Caller-supplied identity for a resolution request.
///
/// The engine never authenticates; it trusts these ids and only checks
/// that they are usable. A missing or reserved identity denies nothing and
/// grants nothing: it is rejected before the hierarchy is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessContext {
    pub user_id: String,
    pub tenant_id: String,
}

impl AccessContext {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        AccessContext { user_id: user_id.into(), tenant_id: tenant_id.into() }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.user_id.is_empty() {
            return Err(EngineError::Unauthenticated("empty user id"));
        }
        if self.tenant_id.is_empty() {
            return Err(EngineError::Unauthenticated("empty tenant id"));
        }
        if is_reserved(&self.user_id) {
            return Err(EngineError::Unauthenticated("reserved user id"));
        }
        if is_reserved(&self.tenant_id) {
            return Err(EngineError::Unauthenticated("reserved tenant id"));
        }
        if self.user_id.len() > MAX_PART_LEN {
            return Err(EngineError::Unauthenticated("user id too long"));
        }
        if self.tenant_id.len() > MAX_PART_LEN {
            return Err(EngineError::Unauthenticated("tenant id too long"));
        }
        Ok(())
    }
}

/// One concrete entity, addressed by kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        ResourceRef { kind: kind.into(), id: id.into() }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// What a resolution request is about.
///
/// With a resource, the walk starts at resource scope and the content-type
/// step is derived from the kind registry unless overridden here. With only
/// a content type, the walk starts there. Empty targets ask the tenant-wide
/// question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub resource: Option<ResourceRef>,
    pub content_type: Option<String>,
}

impl Target {
    /// Tenant-wide question: no resource, no content type.
    pub fn tenant_wide() -> Self {
        Target::default()
    }

    pub fn resource(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Target { resource: Some(ResourceRef::new(kind, id)), content_type: None }
    }

    pub fn content_type(content_type: impl Into<String>) -> Self {
        Target { resource: None, content_type: Some(content_type.into()) }
    }

    /// Override the content-type step derived from the kind registry.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(res) = &self.resource {
            check_part(&res.kind, "entity kind")?;
            check_part(&res.id, "resource id")?;
        }
        if let Some(ct) = &self.content_type {
            check_part(ct, "content type")?;
        }
        Ok(())
    }
}
