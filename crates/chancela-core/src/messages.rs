// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing messages.
//
// Every classified error is mapped to one plain-language message, plus an
// optional hint that is shown as a second entry. The fixed strings used by
// the request layer live here too so the wording stays in one place.

use crate::error::{ChancelaError, SigningFailure, TransportFailure};

pub const PREFERENCES_SAVED: &str = "Preferences saved.";
pub const PREFERENCES_LOAD_FAILED: &str = "Your preferences could not be loaded.";
pub const PREFERENCES_SAVE_FAILED: &str = "Your preferences could not be saved.";
pub const DATA_SOURCE_NOT_DEFINED: &str =
    "The data source in your preferences is not defined. Choose local or remote.";
pub const SAVE_DIRECTORY_UNAVAILABLE: &str = "The folder for saving signed documents could not be found or created. \
     Check that the folder is set in your preferences and that your user can write to it.";

pub const VALIDATION_SERVICE_OK: &str = "The certificate validation service is reachable.";
pub const VALIDATION_SERVICE_UNREACHABLE: &str =
    "The certificate validation service is not reachable. Check your internet connection and proxy.";
pub const SIGNATURE_SERVER_OK: &str = "The signature server is working.";
pub const SIGNATURE_SERVER_UNREACHABLE: &str = "The signature server is not reachable.";

pub const VERSION_MISMATCH: &str =
    "This client is out of date. Please install the latest version.";

pub const CERTIFICATE_PRESENT: &str = "Certificate found.";
pub const NO_CERTIFICATE_FOUND: &str = "No certificate was found.";
pub const NO_CERTIFICATE_ALERT: &str = "Check that your token is inserted and its driver is installed.";
pub const TOKEN_FOUND: &str = "Token found.";
pub const TOKEN_UNREADABLE: &str = "A token was found but its certificate could not be read.";

pub const DIRECTORY_UNCHANGED: &str = "No folder was chosen; the previous folder was kept.";
pub const TOKEN_UNLOCKED: &str = "The token is unlocked and ready to sign.";

/// Final message appended when the signing workflow does not complete.
pub fn sign_failed(holder: &str) -> String {
    format!("The document of {holder} could not be signed.")
}

/// Warning used when the local mirror of a signed document fails.
pub fn mirror_failed(holder: &str, detail: &str) -> String {
    format!("The document of {holder} was signed, but the local copy could not be saved: {detail}")
}

/// A plain-language error with an optional follow-up hint.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    /// Extra guidance, emitted as a separate message.
    pub hint: Option<String>,
}

impl HumanError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }
}

/// Convert a `ChancelaError` into the message shown to the operator.
pub fn humanize_error(err: &ChancelaError) -> HumanError {
    match err {
        ChancelaError::Configuration(detail) => HumanError::new(detail.clone()),

        ChancelaError::Transport { kind, detail } => humanize_transport(*kind, detail),

        ChancelaError::Remote(detail) => HumanError::new(detail.clone()),

        ChancelaError::IdentityExtraction(_) => HumanError::new(
            "A certificate is present but its holder data could not be read.",
        ),

        ChancelaError::Signing { kind, detail } => humanize_signing(*kind, detail),

        ChancelaError::LocalPersistence(detail) => HumanError::new(
            format!("The signed copy could not be saved on this computer: {detail}"),
        ),

        ChancelaError::Encryption(_) | ChancelaError::Decryption(_) => HumanError {
            message: "There was a security problem with your stored preferences.".into(),
            hint: Some("Save your preferences again to store the proxy password anew.".into()),
        },

        ChancelaError::Token(_) => HumanError::new(
            "The identity token for the signature server could not be created.",
        ),

        ChancelaError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new("A required file could not be found."),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "This program does not have permission to use that file or folder.",
            ),
            _ => HumanError::new("There was a problem reading or writing a file."),
        },

        ChancelaError::Serialization(_) => HumanError::new(
            "The signature server sent a response this client could not understand.",
        ),
    }
}

fn humanize_transport(kind: TransportFailure, detail: &str) -> HumanError {
    match kind {
        TransportFailure::NoRoute => HumanError::new(
            "There is no route to the signature server. Check your internet connection.",
        ),
        TransportFailure::ConnectionRefused => HumanError::new(
            "The connection to the signature server was interrupted. Try again in a few minutes.",
        ),
        TransportFailure::TimedOut => HumanError::new(
            "The signature server did not answer in time. Check your internet connection.",
        ),
        TransportFailure::ConnectionReset => HumanError::new(
            "The connection to the signature server was reset. Try again.",
        ),
        TransportFailure::Unexpected if detail.trim().is_empty() => {
            HumanError::new("Unexpected error.")
        }
        TransportFailure::Unexpected => HumanError::new(format!("Unexpected error: {detail}")),
    }
}

fn humanize_signing(kind: SigningFailure, detail: &str) -> HumanError {
    match kind {
        SigningFailure::CertificateValidation => HumanError {
            message: "The certificate could not be validated.".into(),
            hint: Some(
                "If you connect through a proxy, run the diagnostics: a misconfigured proxy \
                 can block certificate revocation checks."
                    .into(),
            ),
        },
        SigningFailure::TokenAbsent => HumanError::new(
            "No certificate is present. Insert your token and try again.",
        ),
        SigningFailure::Cancelled => HumanError::new("Signing was cancelled by the user."),
        SigningFailure::UnknownAlias => HumanError::new(
            "The selected certificate is no longer available. Reload the certificate list.",
        ),
        SigningFailure::Other => HumanError::new(detail.to_owned()),
    }
}
