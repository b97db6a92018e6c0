// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User preferences and client settings.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which remote server the client talks to.
///
/// Persisted as a bare string. Values other than `local`/`remote` survive
/// deserialization so the request layer can report them as a configuration
/// error instead of failing to load the whole preferences file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataSource {
    Local,
    #[default]
    Remote,
    Other(String),
}

impl From<String> for DataSource {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("local") {
            Self::Local
        } else if value.eq_ignore_ascii_case("remote") {
            Self::Remote
        } else {
            Self::Other(value)
        }
    }
}

impl From<DataSource> for String {
    fn from(value: DataSource) -> Self {
        match value {
            DataSource::Local => "local".into(),
            DataSource::Remote => "remote".into(),
            DataSource::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Outbound HTTP proxy.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    /// Host name or address; operators often paste a full `http://` URL.
    pub address: String,
    pub port: u16,
    pub requires_auth: bool,
    pub user: Option<String>,
    /// Plaintext in memory, encrypted in the persisted file.
    pub password: Option<String>,
}

impl ProxyConfig {
    /// A proxy is only used when an address is configured.
    pub fn is_active(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("requires_auth", &self.requires_auth)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Operator-editable settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub data_source: DataSource,
    pub proxy: Option<ProxyConfig>,
    /// Mirror every signed document and its signature to local disk.
    pub save_signed_copy_locally: bool,
    pub local_save_directory: Option<PathBuf>,
}

/// Everything the request layer persists: the user config plus the
/// filter/selection state owned by the web UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub config: Option<UserConfig>,
    #[serde(default)]
    pub filter: Option<Value>,
}

impl Preferences {
    pub fn new(config: UserConfig) -> Self {
        Self {
            config: Some(config),
            filter: Some(Value::Object(Default::default())),
        }
    }

    /// Both sections must be present for a persisted file to be trusted.
    pub fn is_complete(&self) -> bool {
        self.config.is_some() && self.filter.is_some()
    }

    /// The data source, falling back to the default when no config is set.
    pub fn data_source(&self) -> DataSource {
        self.config
            .as_ref()
            .map(|c| c.data_source.clone())
            .unwrap_or_default()
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.config.as_ref().and_then(|c| c.proxy.as_ref())
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new(UserConfig::default())
    }
}

/// Deployment settings for the client itself (not operator preferences).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL used when the data source is `local`.
    pub local_server_url: String,
    /// Base URL used when the data source is `remote`.
    pub remote_server_url: String,
    /// Third-party certificate validation service probed by diagnostics.
    pub validation_service_url: String,
    /// Header carrying the serialized preferences.
    pub preferences_header: String,
    /// Lifetime of each identity token, in seconds.
    pub token_ttl_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Volume prepended to root-relative mirror directories (e.g. `C:`).
    pub fallback_volume: Option<String>,
    /// Version reported to the version check.
    pub app_version: String,
    /// Keys the secret box and backs the integrity header.
    pub app_secret: String,
    /// HMAC key for identity tokens.
    pub token_secret: String,
    /// Info message fragment the self-test endpoint returns when healthy.
    pub self_test_marker: String,
    /// Root of the file-backed key store. `None` means the data directory.
    pub keystore_root: Option<PathBuf>,
    /// Hex SHA-256 of the signature policy document, enables `sigPolicyId`.
    pub signature_policy_hash: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            local_server_url: "http://localhost:8080/assinatura".into(),
            remote_server_url: "https://chancela.example.org/assinatura".into(),
            validation_service_url: "https://validar.iti.gov.br/".into(),
            preferences_header: "X-Chancela-Preferences".into(),
            token_ttl_secs: 60,
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            fallback_volume: if cfg!(windows) { Some("C:".into()) } else { None },
            app_version: env!("CARGO_PKG_VERSION").into(),
            app_secret: "chancela-client-secret".into(),
            token_secret: "chancela-token-secret".into(),
            self_test_marker: "SIGNATURE_SERVER_RUNNING".into(),
            keystore_root: None,
            signature_policy_hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_is_case_insensitive() {
        assert_eq!(DataSource::from("LOCAL".to_string()), DataSource::Local);
        assert_eq!(DataSource::from("Remote".to_string()), DataSource::Remote);
        assert_eq!(
            DataSource::from("bogus".to_string()),
            DataSource::Other("bogus".into())
        );
    }

    #[test]
    fn unknown_data_source_survives_deserialization() {
        let config: UserConfig =
            serde_json::from_str(r#"{"dataSource":"bogus"}"#).expect("parse");
        assert_eq!(config.data_source, DataSource::Other("bogus".into()));
        assert!(config.proxy.is_none());
        assert!(!config.save_signed_copy_locally);
    }

    #[test]
    fn preferences_completeness() {
        assert!(Preferences::default().is_complete());

        let missing_filter: Preferences =
            serde_json::from_str(r#"{"config":{"dataSource":"local"}}"#).expect("parse");
        assert!(!missing_filter.is_complete());

        let missing_config: Preferences =
            serde_json::from_str(r#"{"filter":{}}"#).expect("parse");
        assert!(!missing_config.is_complete());
    }

    #[test]
    fn proxy_debug_redacts_password() {
        let proxy = ProxyConfig {
            address: "proxy.local".into(),
            port: 3128,
            requires_auth: true,
            user: Some("op".into()),
            password: Some("hunter2".into()),
        };
        let rendered = format!("{proxy:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"remote_server_url":"https://example.test"}"#)
                .expect("parse");
        assert_eq!(settings.remote_server_url, "https://example.test");
        assert_eq!(settings.token_ttl_secs, 60);
    }
}
