// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content fingerprints: SHA-256 digests for signed attributes and logs.

use chancela_core::error::ChancelaError;
use sha2::{Digest, Sha256};

/// Raw SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
///
/// Used to fingerprint artifact content in logs without writing the content
/// itself.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Parse a configured hex SHA-256 digest.
pub fn parse_digest(hex_digest: &str) -> Result<[u8; 32], ChancelaError> {
    let bytes = hex::decode(hex_digest.trim())
        .map_err(|e| ChancelaError::Configuration(format!("invalid SHA-256 digest: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ChancelaError::Configuration(format!(
            "invalid SHA-256 digest: expected 32 bytes, got {}",
            bytes.len()
        ))
    })
}
