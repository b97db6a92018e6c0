// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity tokens: compact HS256 JWS binding a tax id to an instant.
//
// A token is minted for every outbound request and never cached. The random
// `jti` claim makes two tokens minted in the same second for the same tax id
// differ, and the HMAC makes any edit detectable.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chancela_core::error::ChancelaError;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// `{"alg":"HS256","typ":"JWT"}`, pre-encoded.
const HEADER_B64: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

/// Tokens are short-lived; anything above a day is a configuration mistake.
const MAX_TTL_SECS: u64 = 86_400;

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// The caller's tax id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Mints and checks identity tokens under one HMAC key.
#[derive(Clone)]
pub struct TokenIssuer {
    key: hmac::Key,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_TTL_SECS) as i64;
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Mint a fresh token for `tax_id`, valid from now.
    pub fn mint(&self, tax_id: &str) -> Result<String, ChancelaError> {
        self.mint_at(tax_id, Utc::now())
    }

    pub fn mint_at(&self, tax_id: &str, now: DateTime<Utc>) -> Result<String, ChancelaError> {
        let claims = IdentityClaims {
            sub: tax_id.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| ChancelaError::Token(format!("claims encoding: {e}")))?;

        let signing_input = format!("{HEADER_B64}.{}", URL_SAFE_NO_PAD.encode(payload));
        let tag = hmac::sign(&self.key, signing_input.as_bytes());

        debug!(jti = %claims.jti, "identity token minted");
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref())))
    }

    /// Check signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, ChancelaError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaims, ChancelaError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ChancelaError::Token("malformed token".into()));
        };
        if header != HEADER_B64 {
            return Err(ChancelaError::Token("unsupported token header".into()));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| ChancelaError::Token(format!("signature encoding: {e}")))?;
        let signing_input = format!("{header}.{payload}");
        hmac::verify(&self.key, signing_input.as_bytes(), &signature)
            .map_err(|_| ChancelaError::Token("signature mismatch".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| ChancelaError::Token(format!("payload encoding: {e}")))?;
        let claims: IdentityClaims = serde_json::from_slice(&payload)
            .map_err(|e| ChancelaError::Token(format!("claims decoding: {e}")))?;

        if claims.exp < now.timestamp() {
            return Err(ChancelaError::Token("token expired".into()));
        }
        Ok(claims)
    }
}
