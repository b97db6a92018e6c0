// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secret box: AES-256-GCM encryption of single secret strings (the proxy
// password, the integrity header) for at-rest storage and transmission.
//
// The key is derived once per box from the application secret with
// PBKDF2-HMAC-SHA256. Each encryption draws a fresh 96-bit nonce, so the
// same plaintext never encrypts to the same text twice. The output is
// `base64(nonce || ciphertext || tag)`, safe to embed in JSON and headers.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chancela_core::error::ChancelaError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

/// Salt for deriving the box key from the application secret.
const KEY_SALT: &[u8] = b"chancela/secret-box/v1";

/// Salt appended to the shared secret when building the integrity header.
pub const INTEGRITY_SALT: &str = "c4f1-7a9e-chancela";

const PBKDF2_ROUNDS: NonZeroU32 = NonZeroU32::new(10_000).unwrap();

/// Symmetric encryption of secret strings under a key derived from the
/// application secret.
pub struct SecretBox {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl SecretBox {
    /// Derive the box key from `secret`.
    pub fn new(secret: &str) -> Result<Self, ChancelaError> {
        let mut key_bytes = [0u8; 32];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ROUNDS,
            KEY_SALT,
            secret.as_bytes(),
            &mut key_bytes,
        );
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| ChancelaError::Encryption("key rejected".into()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext`. An empty input stays empty so that an unset
    /// password round-trips as unset.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ChancelaError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ChancelaError::Encryption("nonce generation failed".into()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| ChancelaError::Encryption("seal failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        debug!(sealed_len = sealed.len(), "encryption complete");
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a value produced by [`SecretBox::encrypt`].
    #[instrument(skip_all, fields(encoded_len = encoded.len()))]
    pub fn decrypt(&self, encoded: &str) -> Result<String, ChancelaError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let sealed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ChancelaError::Decryption(format!("not base64: {e}")))?;
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(ChancelaError::Decryption("sealed value too short".into()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| ChancelaError::Decryption("bad nonce".into()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| ChancelaError::Decryption("authentication failed".into()))?;

        let plaintext = String::from_utf8(plaintext.to_vec())
            .map_err(|e| ChancelaError::Decryption(format!("not UTF-8: {e}")))?;
        debug!("decryption complete");
        Ok(plaintext)
    }

    /// `encrypt(shared_secret + INTEGRITY_SALT)`: proves to the server that
    /// the request comes from an authentic client build.
    pub fn integrity_proof(&self, shared_secret: &str) -> Result<String, ChancelaError> {
        self.encrypt(&format!("{shared_secret}{INTEGRITY_SALT}"))
    }
}
