// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signing engine: everything that touches the local certificate store.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chancela_core::error::ChancelaError;
use chancela_core::types::{CertificateIdentity, SignableArtifact};
use chrono::Local;
use tracing::{error, info, instrument};
use x509_cert::Certificate;

use crate::certificates::{describe, parse_certificate};
use crate::detached::{SignaturePolicy, VerifiedSignature, build_detached, verify_detached};
use crate::integrity::hash_bytes;
use crate::keystore::KeyStore;
use crate::mirror::write_mirror;

/// Payload signed by [`SigningEngine::request_pin`] to wake the token.
const PIN_WARM_UP: &[u8] = b"chancela:pin-warm-up";

/// What the sign workflow needs from the signing side.
pub trait ArtifactSigner: Send + Sync {
    /// Detached signature over `content` with the identity behind `alias`.
    fn sign(&self, content: &[u8], alias: &str) -> Result<Vec<u8>, ChancelaError>;

    /// Mirror a signed artifact into `directory`, returning the written paths.
    fn persist_signed_artifact(
        &self,
        artifact: &SignableArtifact,
        directory: &Path,
    ) -> Result<Vec<PathBuf>, ChancelaError>;
}

/// Key store access plus detached CMS signing.
///
/// The store is consulted afresh on every call; nothing about a token is
/// cached between operations.
pub struct SigningEngine<K: KeyStore> {
    store: K,
    policy: Option<SignaturePolicy>,
    fallback_volume: Option<String>,
}

impl<K: KeyStore> SigningEngine<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            policy: None,
            fallback_volume: None,
        }
    }

    /// Commit every signature to `policy` through a `sigPolicyId` attribute.
    pub fn with_policy(mut self, policy: SignaturePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_fallback_volume(mut self, volume: Option<String>) -> Self {
        self.fallback_volume = volume;
        self
    }

    /// Every alias in the store. Empty means "no certificate", not failure.
    #[instrument(skip_all)]
    pub fn list_aliases(&self) -> Result<Vec<String>, ChancelaError> {
        Ok(self.store.aliases()?)
    }

    #[instrument(skip(self))]
    pub fn certificate_metadata(&self, alias: &str) -> Result<CertificateIdentity, ChancelaError> {
        let chain = self.store.certificate_chain(alias)?;
        describe(alias, &chain)
    }

    /// Sign a throwaway payload so the token asks for its PIN now.
    #[instrument(skip(self))]
    pub fn request_pin(&self, alias: &str) -> Result<(), ChancelaError> {
        self.store.sign(alias, PIN_WARM_UP)?;
        info!("key store unlocked");
        Ok(())
    }

    pub fn verify(&self, signature: &[u8], content: &[u8]) -> Result<VerifiedSignature, ChancelaError> {
        verify_detached(signature, content)
    }

    fn chain(&self, alias: &str) -> Result<Vec<Certificate>, ChancelaError> {
        self.store
            .certificate_chain(alias)?
            .iter()
            .map(|der| parse_certificate(der))
            .collect()
    }
}

impl<K: KeyStore> ArtifactSigner for SigningEngine<K> {
    #[instrument(skip(self, content), fields(content_len = content.len()))]
    fn sign(&self, content: &[u8], alias: &str) -> Result<Vec<u8>, ChancelaError> {
        let result = self.chain(alias).and_then(|chain| {
            build_detached(
                content,
                &chain,
                self.policy.as_ref(),
                SystemTime::now(),
                |attributes| Ok(self.store.sign(alias, attributes)?),
            )
        });
        match &result {
            Ok(signature) => info!(
                content_sha256 = %hash_bytes(content),
                signature_len = signature.len(),
                "content signed"
            ),
            Err(err) => error!(error = %err, "signing failed"),
        }
        result
    }

    #[instrument(skip_all, fields(record_id = %artifact.record_id, directory = %directory.display()))]
    fn persist_signed_artifact(
        &self,
        artifact: &SignableArtifact,
        directory: &Path,
    ) -> Result<Vec<PathBuf>, ChancelaError> {
        write_mirror(
            artifact,
            directory,
            self.fallback_volume.as_deref(),
            Local::now(),
        )
    }
}
