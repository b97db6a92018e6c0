// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AuthClient against a stub signature server.

mod common;

use std::time::Duration;

use chancela_core::config::{ClientSettings, DataSource, Preferences, UserConfig};
use chancela_core::error::{ChancelaError, TransportFailure};
use chancela_core::messages::humanize_error;
use chancela_core::types::SignableArtifact;
use chancela_remote::client::{INTEGRITY_HEADER, TOKEN_HEADER};
use chancela_remote::{AuthClient, RemoteService};
use chancela_security::secret_box::INTEGRITY_SALT;
use chancela_security::{SecretBox, TokenIssuer};
use serde_json::json;

use common::{Reply, drain, serve, settings_for};

fn artifact() -> SignableArtifact {
    SignableArtifact {
        record_id: "123".into(),
        document_type: "X".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn every_request_is_authenticated() {
    let (base, rx) = serve(|_, _| Reply::json(json!({ "infoMsgs": ["ok"] })));
    let settings = settings_for(&base);
    let client = AuthClient::new(settings.clone(), &Preferences::default()).expect("client");

    let result = client.user_info("12345678909", &Preferences::default()).await;
    assert_eq!(result.info_msgs, vec!["ok"]);

    let seen = drain(&rx);
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/remote/user/info");
    assert_eq!(request.header("Accept"), Some("application/json"));

    let token = request.header(TOKEN_HEADER).expect("token header");
    let claims = TokenIssuer::new(&settings.token_secret, 60)
        .verify(token)
        .expect("token verifies");
    assert_eq!(claims.sub, "12345678909");

    let proof = request.header(INTEGRITY_HEADER).expect("integrity header");
    let opened = SecretBox::new(&settings.app_secret)
        .expect("key")
        .decrypt(proof)
        .expect("proof decrypts");
    assert_eq!(opened, format!("{}{INTEGRITY_SALT}", settings.app_secret));

    let shared = request
        .header(&settings.preferences_header)
        .expect("preferences header");
    let shared: Preferences = serde_json::from_str(shared).expect("preferences JSON");
    assert_eq!(shared, Preferences::default());
}

#[tokio::test]
async fn local_data_source_uses_local_url() {
    let (base, rx) = serve(|_, _| Reply::json(json!({ "version": "1.0.0" })));
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");
    let prefs = Preferences::new(UserConfig {
        data_source: DataSource::Local,
        ..Default::default()
    });

    let result = client.version_check("1", &prefs).await;
    assert_eq!(result.version.as_deref(), Some("1.0.0"));
    assert_eq!(drain(&rx)[0].path, "/local/version/check");
}

#[tokio::test]
async fn fetch_renders_as_signed_then_resets() {
    let (base, rx) = serve(|_, _| {
        Reply::json(json!({ "artifact": { "recordId": "123", "documentType": "X", "content": "RE9D" } }))
    });
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");
    let mut artifact = artifact();

    let content = client
        .fetch_signable_content(&mut artifact, "1", &Preferences::default())
        .await
        .expect("content");
    assert_eq!(content, b"DOC");
    assert!(!artifact.signed);

    let seen = drain(&rx);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/remote/user/certificate/pdf");
    assert_eq!(seen[0].json()["signed"], true);
}

#[tokio::test]
async fn server_error_envelope_fails_fetch() {
    let (base, _rx) = serve(|_, _| Reply::json(json!({ "errorMsgs": ["record locked"] })));
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");
    let mut artifact = artifact();

    let err = client
        .fetch_signable_content(&mut artifact, "1", &Preferences::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChancelaError::Remote(ref detail) if detail == "record locked"));
    assert!(!artifact.signed);
}

#[tokio::test]
async fn persist_wraps_artifact_in_envelope() {
    let (base, rx) = serve(|_, _| Reply::json(json!({ "infoMsgs": ["saved"] })));
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");
    let signed = SignableArtifact {
        content: b"DOC".to_vec(),
        signature: Some(vec![1, 2, 3]),
        signed: true,
        ..artifact()
    };

    let envelope = client
        .persist_signed_artifact(&signed, "1", &Preferences::default())
        .await
        .expect("persisted");
    assert_eq!(envelope.info_msgs, vec!["saved"]);

    let seen = drain(&rx);
    assert_eq!(seen[0].path, "/remote/token/certificate/persistir");
    let body = seen[0].json();
    assert_eq!(body["artifact"]["signed"], true);
    assert_eq!(body["artifact"]["signature"], "AQID");
}

#[tokio::test]
async fn http_error_without_envelope_is_reported() {
    let (base, _rx) = serve(|_, _| Reply::json(json!({})).status(500));
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");

    let result = client.user_jsms("1", &Preferences::default()).await;
    assert!(result.has_errors());
}

#[tokio::test]
async fn slow_server_times_out() {
    let (base, _rx) =
        serve(|_, _| Reply::json(json!({})).delayed(Duration::from_secs(3)));
    let settings = ClientSettings {
        request_timeout_secs: 1,
        ..settings_for(&base)
    };
    let client = AuthClient::new(settings, &Preferences::default()).expect("client");

    let result = client.user_info("1", &Preferences::default()).await;
    let expected = humanize_error(&ChancelaError::transport(TransportFailure::TimedOut, ""));
    assert_eq!(result.error_msgs.first(), Some(&expected.message));
}

#[tokio::test]
async fn bogus_data_source_makes_no_call() {
    let (base, rx) = serve(|_, _| Reply::json(json!({})));
    let client = AuthClient::new(settings_for(&base), &Preferences::default()).expect("client");
    let prefs = Preferences::new(UserConfig {
        data_source: DataSource::Other("bogus".into()),
        ..Default::default()
    });
    let mut artifact = artifact();

    let err = client
        .fetch_signable_content(&mut artifact, "1", &prefs)
        .await
        .unwrap_err();
    assert!(matches!(err, ChancelaError::Configuration(_)));
    assert!(drain(&rx).is_empty());
}
