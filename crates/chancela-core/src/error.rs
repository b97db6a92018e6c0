// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Chancela.

use std::fmt;

use thiserror::Error;

/// Classified cause of a failed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The network has no route to the server.
    NoRoute,
    /// Connection refused, or the host name did not resolve.
    ConnectionRefused,
    /// Connect or request timeout expired.
    TimedOut,
    /// The peer dropped an established connection.
    ConnectionReset,
    /// Anything the classifier does not recognise.
    Unexpected,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoRoute => "no route to host",
            Self::ConnectionRefused => "connection refused",
            Self::TimedOut => "timed out",
            Self::ConnectionReset => "connection reset",
            Self::Unexpected => "unexpected",
        };
        f.write_str(label)
    }
}

/// Classified cause of a failed signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningFailure {
    /// The certificate could not be validated (often a proxy blocking
    /// revocation checks).
    CertificateValidation,
    /// No token or key store is present.
    TokenAbsent,
    /// The operator dismissed the PIN prompt.
    Cancelled,
    /// The requested alias is not in the key store.
    UnknownAlias,
    /// Raw failure from the key store.
    Other,
}

impl fmt::Display for SigningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CertificateValidation => "certificate validation",
            Self::TokenAbsent => "token absent",
            Self::Cancelled => "cancelled",
            Self::UnknownAlias => "unknown alias",
            Self::Other => "key store",
        };
        f.write_str(label)
    }
}

/// Top-level error type for all Chancela operations.
#[derive(Debug, Error)]
pub enum ChancelaError {
    // -- Configuration --
    #[error("configuration error: {0}")]
    Configuration(String),

    // -- Remote channel --
    #[error("transport failure ({kind}): {detail}")]
    Transport {
        kind: TransportFailure,
        detail: String,
    },

    #[error("remote service reported an error: {0}")]
    Remote(String),

    // -- Certificates and signing --
    #[error("certificate holder data unreadable: {0}")]
    IdentityExtraction(String),

    #[error("signing failed ({kind}): {detail}")]
    Signing {
        kind: SigningFailure,
        detail: String,
    },

    #[error("local copy could not be written: {0}")]
    LocalPersistence(String),

    // -- Secrets --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("identity token error: {0}")]
    Token(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChancelaError {
    /// Shorthand for a transport error of the given kind.
    pub fn transport(kind: TransportFailure, detail: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for a signing error of the given kind.
    pub fn signing(kind: SigningFailure, detail: impl Into<String>) -> Self {
        Self::Signing {
            kind,
            detail: detail.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChancelaError>;
