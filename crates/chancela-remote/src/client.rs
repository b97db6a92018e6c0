// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Authenticated client for the signature server.
//
// Every request carries JSON negotiation headers, a freshly minted identity
// token, the caller's preferences, and an integrity proof. Failures never
// escape `get`/`post`: they come back as a classified `OperationResult`.

use std::future::Future;

use chancela_core::config::{ClientSettings, DataSource, Preferences, ProxyConfig};
use chancela_core::error::{ChancelaError, Result};
use chancela_core::messages::DATA_SOURCE_NOT_DEFINED;
use chancela_core::types::{OperationResult, SignableArtifact};
use chancela_security::{SecretBox, TokenIssuer};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::classify::transport_error;
use crate::transport::build_transport;

/// Identity token header.
pub const TOKEN_HEADER: &str = "x-chancela-token";
/// Build integrity proof header.
pub const INTEGRITY_HEADER: &str = "x-chancela-verification";

const JSON: &str = "application/json";

/// Remote calls the sign workflow depends on.
pub trait RemoteService: Send + Sync {
    /// Render `artifact` and return the bytes to sign.
    ///
    /// The render is requested with `signed = true`; the flag is back to
    /// `false` on return whatever the outcome.
    fn fetch_signable_content(
        &self,
        artifact: &mut SignableArtifact,
        tax_id: &str,
        prefs: &Preferences,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Commit a signed artifact, returning the server's envelope.
    fn persist_signed_artifact(
        &self,
        artifact: &SignableArtifact,
        tax_id: &str,
        prefs: &Preferences,
    ) -> impl Future<Output = Result<OperationResult>> + Send;
}

pub struct AuthClient {
    settings: ClientSettings,
    http: reqwest::Client,
    secret_box: SecretBox,
    tokens: TokenIssuer,
    /// Proxy the current transport routes through.
    proxy: Option<ProxyConfig>,
}

impl AuthClient {
    pub fn new(settings: ClientSettings, prefs: &Preferences) -> Result<Self> {
        let http = build_transport(prefs, &settings)?;
        let secret_box = SecretBox::new(&settings.app_secret)?;
        let tokens = TokenIssuer::new(&settings.token_secret, settings.token_ttl_secs);
        Ok(Self {
            settings,
            http,
            secret_box,
            tokens,
            proxy: active_proxy(prefs),
        })
    }

    /// Rebuild the transport after the preferences (and so the proxy) changed.
    pub fn reconfigure(&mut self, prefs: &Preferences) -> Result<()> {
        self.http = build_transport(prefs, &self.settings)?;
        self.proxy = active_proxy(prefs);
        debug!("transport rebuilt");
        Ok(())
    }

    /// Whether the current transport already routes the way `prefs` asks.
    pub fn is_configured_for(&self, prefs: &Preferences) -> bool {
        self.proxy == active_proxy(prefs)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Server base URL for the configured data source.
    pub fn base_url(&self, prefs: &Preferences) -> Result<&str> {
        match prefs.data_source() {
            DataSource::Local => Ok(&self.settings.local_server_url),
            DataSource::Remote => Ok(&self.settings.remote_server_url),
            DataSource::Other(raw) => {
                error!(data_source = %raw, "unknown data source");
                Err(ChancelaError::Configuration(DATA_SOURCE_NOT_DEFINED.into()))
            }
        }
    }

    /// Headers for one request. Never reuse the result for a second request.
    pub fn headers(&self, tax_id: &str, prefs: &Preferences) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        headers.insert(
            HeaderName::from_static(TOKEN_HEADER),
            header_value(&self.tokens.mint(tax_id)?)?,
        );

        let name = HeaderName::from_bytes(self.settings.preferences_header.as_bytes())
            .map_err(|e| ChancelaError::Configuration(format!("preferences header name: {e}")))?;
        headers.insert(name, header_value(&serde_json::to_string(&without_password(prefs))?)?);

        headers.insert(
            HeaderName::from_static(INTEGRITY_HEADER),
            header_value(&self.secret_box.integrity_proof(&self.settings.app_secret)?)?,
        );
        Ok(headers)
    }

    pub async fn get(&self, path: &str, tax_id: &str, prefs: &Preferences) -> OperationResult {
        self.call::<()>(Method::GET, path, None, tax_id, prefs)
            .await
            .unwrap_or_else(|err| OperationResult::from_error(&err))
    }

    pub async fn post<B>(&self, body: &B, path: &str, tax_id: &str, prefs: &Preferences) -> OperationResult
    where
        B: Serialize + Sync + ?Sized,
    {
        self.call(Method::POST, path, Some(body), tax_id, prefs)
            .await
            .unwrap_or_else(|err| OperationResult::from_error(&err))
    }

    pub async fn version_check(&self, tax_id: &str, prefs: &Preferences) -> OperationResult {
        self.get("/version/check", tax_id, prefs).await
    }

    pub async fn user_info(&self, tax_id: &str, prefs: &Preferences) -> OperationResult {
        self.get("/user/info", tax_id, prefs).await
    }

    pub async fn user_jsms(&self, tax_id: &str, prefs: &Preferences) -> OperationResult {
        self.get("/user/jsms", tax_id, prefs).await
    }

    pub async fn user_certificates(&self, tax_id: &str, prefs: &Preferences) -> OperationResult {
        self.post(prefs, "/user/certificates", tax_id, prefs).await
    }

    /// Ask the server to render the preview image of `artifact`.
    pub async fn certificate_image(
        &self,
        artifact: &SignableArtifact,
        prefs: &Preferences,
    ) -> OperationResult {
        self.post(artifact, "/user/certificate/image", artifact.signer_tax_id(), prefs)
            .await
    }

    /// Server self-test; healthy servers answer with the configured marker.
    pub async fn self_test(&self, prefs: &Preferences) -> OperationResult {
        self.get("/autoteste", "", prefs).await
    }

    #[instrument(skip(self, body, tax_id, prefs), fields(method = %method))]
    async fn call<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        tax_id: &str,
        prefs: &Preferences,
    ) -> Result<OperationResult>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{path}", self.base_url(prefs)?.trim_end_matches('/'));
        let mut request: RequestBuilder = self
            .http
            .request(method, &url)
            .headers(self.headers(tax_id, prefs)?);
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        info!(url = %url, "calling signature server");
        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;
        debug!(status = status.as_u16(), len = bytes.len(), "response received");

        let mut envelope = if bytes.is_empty() {
            OperationResult::new()
        } else {
            match serde_json::from_slice::<OperationResult>(&bytes) {
                Ok(envelope) => envelope,
                Err(e) if status.is_success() => {
                    error!(error = %e, "unreadable server response");
                    return Err(ChancelaError::Remote(format!(
                        "The server sent a response that could not be read: {e}"
                    )));
                }
                Err(_) => OperationResult::new(),
            }
        };
        if !status.is_success() && !envelope.has_errors() {
            error!(status = status.as_u16(), "server rejected request");
            envelope.push_error(&ChancelaError::Remote(format!(
                "The server answered with status {status}."
            )));
        }
        Ok(envelope)
    }
}

impl RemoteService for AuthClient {
    #[instrument(skip_all, fields(record_id = %artifact.record_id))]
    async fn fetch_signable_content(
        &self,
        artifact: &mut SignableArtifact,
        tax_id: &str,
        prefs: &Preferences,
    ) -> Result<Vec<u8>> {
        artifact.signed = true;
        let rendered = self
            .call(Method::POST, "/user/certificate/pdf", Some(&*artifact), tax_id, prefs)
            .await;
        artifact.signed = false;

        let envelope = rendered?;
        if envelope.has_errors() {
            return Err(ChancelaError::Remote(envelope.error_msgs.join(" ")));
        }
        let content = envelope
            .artifact
            .map(|rendered| rendered.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ChancelaError::Remote("The server returned no document to sign.".into()))?;
        info!(len = content.len(), "signable content fetched");
        Ok(content)
    }

    #[instrument(skip_all, fields(record_id = %artifact.record_id))]
    async fn persist_signed_artifact(
        &self,
        artifact: &SignableArtifact,
        tax_id: &str,
        prefs: &Preferences,
    ) -> Result<OperationResult> {
        let body = OperationResult {
            artifact: Some(artifact.clone()),
            ..OperationResult::new()
        };
        let envelope = self
            .call(Method::POST, "/token/certificate/persistir", Some(&body), tax_id, prefs)
            .await?;
        if envelope.has_errors() {
            return Err(ChancelaError::Remote(envelope.error_msgs.join(" ")));
        }
        info!("signed artifact persisted");
        Ok(envelope)
    }
}

fn active_proxy(prefs: &Preferences) -> Option<ProxyConfig> {
    prefs.proxy().filter(|p| p.is_active()).cloned()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|e| ChancelaError::Configuration(format!("header value: {e}")))
}

/// The server sees the preferences, never the proxy password.
fn without_password(prefs: &Preferences) -> Preferences {
    let mut shared = prefs.clone();
    if let Some(proxy) = shared.config.as_mut().and_then(|c| c.proxy.as_mut()) {
        proxy.password = None;
    }
    shared
}
