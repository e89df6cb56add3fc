//! Length-prefixed key and record encoding for LMDB storage.
//!
//! All keys are encoded as: [len1][bytes1][len2][bytes2]...
//! - No delimiters, no escaping, any bytes allowed
//! - O(1) parsing per part (just read length byte)
//! - A key built from the first parts of another key is its byte prefix,
//!   which is what makes the per-user and per-resource scans plain
//!   prefix scans
//!
//! Record values are fixed width: bits, expiry millis, expiry flag.

use byteorder::{BigEndian, ByteOrder};
use chrono::DateTime;

use crate::bits::PermissionSet;
use crate::error::StoreError;
use crate::record::GrantRecord;
use crate::scope::MAX_PART_LEN;

/// Reserved tenant part under which the global default row is stored.
pub const GLOBAL_TENANT: &str = "_global";

/// Build a length-prefixed key from parts.
///
/// Callers bound each part to [`MAX_PART_LEN`] bytes before building; the
/// one-byte prefix cannot carry more.
#[inline]
pub fn build_key(parts: &[&str]) -> Vec<u8> {
    let total_len: usize = parts.iter().map(|p| 1 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len);
    for part in parts {
        debug_assert!(part.len() <= MAX_PART_LEN, "key part over {MAX_PART_LEN} bytes");
        key.push(part.len() as u8);
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// Build a prefix for scanning (same as build_key, just clearer intent).
#[inline]
pub fn build_prefix(parts: &[&str]) -> Vec<u8> {
    build_key(parts)
}

/// Parse a length-prefixed key into parts.
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(4);
    let mut i = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            break;
        }
        // SAFETY: we only store valid UTF-8
        let part = unsafe { std::str::from_utf8_unchecked(&bytes[i + 1..i + 1 + len]) };
        parts.push(part);
        i += 1 + len;
    }
    parts
}

/// Get the Nth part from a key without allocating.
#[inline]
pub fn get_part(bytes: &[u8], n: usize) -> Option<&str> {
    let mut i = 0;
    let mut count = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            return None;
        }
        if count == n {
            return Some(unsafe { std::str::from_utf8_unchecked(&bytes[i + 1..i + 1 + len]) });
        }
        i += 1 + len;
        count += 1;
    }
    None
}

// ============================================================================
// Per-database key builders
// ============================================================================

/// Tenant-scope key: [tenant][user]
#[inline]
pub fn tenant_key(tenant: &str, user: &str) -> Vec<u8> {
    build_key(&[tenant, user])
}

/// Content-type-scope key: [tenant][user][content_type]
#[inline]
pub fn content_type_key(tenant: &str, user: &str, content_type: &str) -> Vec<u8> {
    build_key(&[tenant, user, content_type])
}

/// Resource-scope forward key: [tenant][user][kind][resource]
#[inline]
pub fn resource_key(tenant: &str, user: &str, kind: &str, resource: &str) -> Vec<u8> {
    build_key(&[tenant, user, kind, resource])
}

/// Resource-scope reverse key: [tenant][kind][resource][user]
///
/// Same record, indexed for the "who can touch this entity" scan.
#[inline]
pub fn resource_rev_key(tenant: &str, kind: &str, resource: &str, user: &str) -> Vec<u8> {
    build_key(&[tenant, kind, resource, user])
}

/// Default-scope key: [tenant], with [`GLOBAL_TENANT`] for the global row.
#[inline]
pub fn default_key(tenant: &str) -> Vec<u8> {
    build_key(&[tenant])
}

// ============================================================================
// Record value codec
// ============================================================================

/// bits u64 | expiry millis i64 | has-expiry u8
pub const RECORD_LEN: usize = 17;

/// Encode a record into its fixed-width value.
///
/// Expiry is stored at millisecond precision; the flag byte keeps "expires
/// at epoch zero" distinct from "never expires".
pub fn encode_record(rec: &GrantRecord) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    BigEndian::write_u64(&mut buf[0..8], rec.bits.bits());
    match rec.expires_at {
        Some(at) => {
            BigEndian::write_i64(&mut buf[8..16], at.timestamp_millis());
            buf[16] = 1;
        }
        None => buf[16] = 0,
    }
    buf
}

/// Decode a stored value back into a record.
pub fn decode_record(bytes: &[u8]) -> Result<GrantRecord, StoreError> {
    if bytes.len() != RECORD_LEN {
        return Err(StoreError::Corrupt(format!(
            "record value has {} bytes, want {RECORD_LEN}",
            bytes.len()
        )));
    }
    let bits = PermissionSet::from_bits(BigEndian::read_u64(&bytes[0..8]))
        .map_err(|_| StoreError::Corrupt("undefined permission bits".into()))?;
    let expires_at = match bytes[16] {
        0 => None,
        1 => {
            let millis = BigEndian::read_i64(&bytes[8..16]);
            Some(
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| StoreError::Corrupt("expiry out of range".into()))?,
            )
        }
        other => return Err(StoreError::Corrupt(format!("bad expiry flag {other}"))),
    };
    Ok(GrantRecord { bits, expires_at })
}

// ============================================================================
// Tests
// ============================================================================
