// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Chancela signing client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::config::Preferences;
use crate::error::ChancelaError;
use crate::messages::humanize_error;

/// The citizen or operator a request is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Server fields this client does not interpret, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A document rendered by the remote service, before or after signing.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignableArtifact {
    pub record_id: String,
    pub document_type: String,
    /// Rendered document bytes; empty until fetched.
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub content: Vec<u8>,
    /// Detached CMS signature over `content`.
    #[serde_as(as = "Option<Base64>")]
    #[serde(default)]
    pub signature: Option<Vec<u8>>,
    #[serde(default)]
    pub signed: bool,
    #[serde_as(as = "Option<Base64>")]
    #[serde(default)]
    pub preview_image: Option<Vec<u8>>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub signer: Option<UserProfile>,
}

impl SignableArtifact {
    /// Name used in user-facing messages about this artifact.
    pub fn display_holder(&self) -> &str {
        self.holder_name.as_deref().unwrap_or(&self.record_id)
    }

    pub fn signer_tax_id(&self) -> &str {
        self.signer.as_ref().map(|s| s.tax_id.as_str()).unwrap_or("")
    }
}

/// Non-secret metadata derived from a key store certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateIdentity {
    pub alias: String,
    pub tax_id: String,
    pub holder_name: Option<String>,
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub chain_length: usize,
}

/// Uniform response envelope for every public operation.
///
/// The presence of any error message means the requested effect did not fully
/// complete; payload fields are only meaningful when `error_msgs` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    #[serde(default)]
    pub info_msgs: Vec<String>,
    #[serde(default)]
    pub warning_msgs: Vec<String>,
    #[serde(default)]
    pub error_msgs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CertificateIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<SignableArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<SignableArtifact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsms: Option<Value>,
}

impl OperationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelope carrying the user-facing messages for `err`.
    pub fn from_error(err: &ChancelaError) -> Self {
        let mut result = Self::new();
        result.push_error(err);
        result
    }

    pub fn with_info(mut self, msg: impl Into<String>) -> Self {
        self.info_msgs.push(msg.into());
        self
    }

    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error_msgs.push(msg.into());
        self
    }

    pub fn push_info(&mut self, msg: impl Into<String>) {
        self.info_msgs.push(msg.into());
    }

    pub fn push_warning(&mut self, msg: impl Into<String>) {
        self.warning_msgs.push(msg.into());
    }

    pub fn push_error_msg(&mut self, msg: impl Into<String>) {
        self.error_msgs.push(msg.into());
    }

    /// Append the classified message for `err`, followed by its hint if any.
    pub fn push_error(&mut self, err: &ChancelaError) {
        let human = humanize_error(err);
        self.error_msgs.push(human.message);
        if let Some(hint) = human.hint {
            self.error_msgs.push(hint);
        }
    }

    /// Move all messages of `other` into `self`, keeping their order.
    pub fn absorb_messages(&mut self, other: OperationResult) {
        self.info_msgs.extend(other.info_msgs);
        self.warning_msgs.extend(other.warning_msgs);
        self.error_msgs.extend(other.error_msgs);
    }

    pub fn has_errors(&self) -> bool {
        !self.error_msgs.is_empty()
    }

    /// Total number of messages of any class.
    pub fn message_count(&self) -> usize {
        self.info_msgs.len() + self.warning_msgs.len() + self.error_msgs.len()
    }
}
