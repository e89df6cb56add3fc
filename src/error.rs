//! Error types for scopebit.
//!
//! Denial is never an error: the resolver reports it through [`Decision`].
//! Errors mean the contract was violated or the store could not answer, and
//! callers must be able to tell "we know and the answer is no" apart from
//! "we don't know".
//!
//! [`Decision`]: crate::resolver::Decision

use thiserror::Error;

/// Failures raised by record store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The storage backend refused or failed the operation.
    #[error("storage backend: {0}")]
    Backend(String),

    /// A stored record could not be decoded.
    #[error("corrupt grant record: {0}")]
    Corrupt(String),
}

/// Convert any displayable backend error to a `StoreError`.
#[inline]
pub(crate) fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// The main error type for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No usable identity context was supplied. Rejected before any
    /// hierarchy walk; never defaults to granted.
    #[error("unauthenticated context: {0}")]
    Unauthenticated(&'static str),

    /// Bits outside the closed permission enumeration.
    #[error("unknown permission bits {0:#x}")]
    UnknownPermission(u64),

    /// The entity kind was never registered.
    #[error("unknown entity kind '{0}'")]
    UnknownEntityKind(String),

    /// The operation id was never registered.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// Malformed resolve or grant target.
    #[error("invalid target: {0}")]
    InvalidTarget(&'static str),

    /// Grant or revoke called with no bits set.
    #[error("empty permission set")]
    EmptyPermissionSet,

    /// The record store failed; no decision was made.
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
