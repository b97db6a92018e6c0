// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// chancela-security: secrets at rest, request authentication, and signing.
//
// `secret_box` protects the stored proxy password and produces the integrity
// header. `token` mints the per-request identity token. `keystore`,
// `certificates`, `detached`, `mirror` and `signer` make up the signing
// engine: alias lookup, ICP-Brasil holder extraction, detached CMS over the
// fetched bytes, and the optional local copy of the result.

pub mod certificates;
pub mod detached;
pub mod integrity;
pub mod keystore;
pub mod mirror;
pub mod secret_box;
pub mod signer;
pub mod token;

pub use certificates::{describe, holder_tax_id, parse_certificate};
pub use detached::{SignaturePolicy, VerifiedSignature, build_detached, verify_detached};
pub use integrity::{hash_bytes, parse_digest, sha256};
pub use keystore::{FileKeyStore, KeyStore, KeyStoreError};
pub use secret_box::SecretBox;
pub use signer::{ArtifactSigner, SigningEngine};
pub use token::{IdentityClaims, TokenIssuer};
