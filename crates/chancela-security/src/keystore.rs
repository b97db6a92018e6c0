// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key store capability: alias enumeration, certificate chains, and private
// key operations.
//
// Hardware tokens never release their private keys, so the capability signs
// on the caller's behalf instead of handing out key material. Any PIN prompt
// happens inside the implementation.
//
// `FileKeyStore` is the software implementation: one directory per alias,
// holding `key.der` (PKCS#8 RSA key) and one or more DER certificates. The
// directory is re-read on every call so a token or folder inserted between
// operations is picked up without restarting.

use std::fs;
use std::path::PathBuf;

use chancela_core::error::{ChancelaError, SigningFailure};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use thiserror::Error;
use tracing::{debug, instrument};

const KEY_FILE: &str = "key.der";

/// Failures reported by a key store, structured where the backend allows.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key store not present: {0}")]
    Absent(String),

    #[error("operation cancelled by the user")]
    Cancelled,

    #[error("certificate rejected: {0}")]
    CertificateInvalid(String),

    #[error("no such alias: {0}")]
    UnknownAlias(String),

    /// Free-text failure from a third-party backend.
    #[error("{0}")]
    Backend(String),
}

impl From<KeyStoreError> for ChancelaError {
    fn from(err: KeyStoreError) -> Self {
        let kind = match &err {
            KeyStoreError::Absent(_) => SigningFailure::TokenAbsent,
            KeyStoreError::Cancelled => SigningFailure::Cancelled,
            KeyStoreError::CertificateInvalid(_) => SigningFailure::CertificateValidation,
            KeyStoreError::UnknownAlias(_) => SigningFailure::UnknownAlias,
            KeyStoreError::Backend(detail) => classify_signing_text(detail),
        };
        ChancelaError::signing(kind, err.to_string())
    }
}

/// Best-effort classification of free-text key store failures.
///
/// Only used for backends that report plain messages; structured variants
/// of [`KeyStoreError`] are mapped directly.
pub fn classify_signing_text(detail: &str) -> SigningFailure {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("revocation")
        || lower.contains("ocsp")
        || lower.contains("crl")
        || (lower.contains("certificate") && lower.contains("valid"))
    {
        SigningFailure::CertificateValidation
    } else if lower.contains("token_not_present")
        || lower.contains("token not present")
        || lower.contains("no token")
        || lower.contains("not present")
        || lower.contains("no such device")
    {
        SigningFailure::TokenAbsent
    } else if lower.contains("cancel") || lower.contains("aborted by user") {
        SigningFailure::Cancelled
    } else {
        SigningFailure::Other
    }
}

/// Access to signing identities, addressed by alias.
pub trait KeyStore: Send + Sync {
    /// Every alias with a usable key. An empty list is not an error.
    fn aliases(&self) -> Result<Vec<String>, KeyStoreError>;

    /// DER certificates for `alias`, leaf first.
    fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeyStoreError>;

    /// RSASSA-PKCS1-v1_5 with SHA-256 over `message`, using the key of `alias`.
    fn sign(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>, KeyStoreError>;
}

/// Software key store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn alias_dir(&self, alias: &str) -> Result<PathBuf, KeyStoreError> {
        if !self.root.is_dir() {
            return Err(KeyStoreError::Absent(self.root.display().to_string()));
        }
        let plain = !alias.is_empty()
            && alias != "."
            && alias != ".."
            && !alias.contains(['/', '\\']);
        let dir = self.root.join(alias);
        if plain && dir.join(KEY_FILE).is_file() {
            Ok(dir)
        } else {
            Err(KeyStoreError::UnknownAlias(alias.to_owned()))
        }
    }
}

impl KeyStore for FileKeyStore {
    #[instrument(skip_all, fields(root = %self.root.display()))]
    fn aliases(&self) -> Result<Vec<String>, KeyStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| KeyStoreError::Absent(format!("{}: {e}", self.root.display())))?;

        let mut aliases = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| KeyStoreError::Backend(e.to_string()))?;
            let path = entry.path();
            if path.join(KEY_FILE).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    aliases.push(name.to_owned());
                }
            }
        }
        aliases.sort();
        debug!(count = aliases.len(), "aliases enumerated");
        Ok(aliases)
    }

    #[instrument(skip(self))]
    fn certificate_chain(&self, alias: &str) -> Result<Vec<Vec<u8>>, KeyStoreError> {
        let dir = self.alias_dir(alias)?;
        let entries = fs::read_dir(&dir).map_err(|e| KeyStoreError::Backend(e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("der"))
                    && path.file_name().is_some_and(|name| name != KEY_FILE)
            })
            .collect();
        files.sort();

        let mut chain = Vec::with_capacity(files.len());
        for path in &files {
            chain.push(fs::read(path).map_err(|e| KeyStoreError::Backend(e.to_string()))?);
        }
        if chain.is_empty() {
            return Err(KeyStoreError::CertificateInvalid(format!(
                "no certificate stored for {alias}"
            )));
        }
        debug!(chain_len = chain.len(), "certificate chain loaded");
        Ok(chain)
    }

    #[instrument(skip(self, message), fields(message_len = message.len()))]
    fn sign(&self, alias: &str, message: &[u8]) -> Result<Vec<u8>, KeyStoreError> {
        let dir = self.alias_dir(alias)?;
        let pkcs8 = fs::read(dir.join(KEY_FILE)).map_err(|e| KeyStoreError::Backend(e.to_string()))?;
        let key_pair = RsaKeyPair::from_pkcs8(&pkcs8)
            .map_err(|e| KeyStoreError::Backend(format!("private key rejected: {e}")))?;

        let rng = SystemRandom::new();
        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(&RSA_PKCS1_SHA256, &rng, message, &mut signature)
            .map_err(|e| KeyStoreError::Backend(format!("RSA signing failed: {e}")))?;

        debug!(signature_len = signature.len(), "message signed");
        Ok(signature)
    }
}
