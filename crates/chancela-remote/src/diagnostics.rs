// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connectivity diagnostics.
//
// Two independent checks, each contributing exactly one message:
//   1. the certificate validation service answers an OPTIONS probe
//   2. the signature server's self-test reports the healthy marker
// A failing check never stops the other one from running.

use std::fs;

use chancela_core::config::{Preferences, UserConfig};
use chancela_core::messages::{
    SAVE_DIRECTORY_UNAVAILABLE, SIGNATURE_SERVER_OK, SIGNATURE_SERVER_UNREACHABLE,
    VALIDATION_SERVICE_OK, VALIDATION_SERVICE_UNREACHABLE,
};
use chancela_core::types::OperationResult;
use reqwest::Method;
use reqwest::header::ALLOW;
use tracing::{debug, info, instrument, warn};

use crate::classify::transport_error;
use crate::client::AuthClient;

pub struct DiagnosticProbe<'a> {
    client: &'a AuthClient,
}

impl<'a> DiagnosticProbe<'a> {
    pub fn new(client: &'a AuthClient) -> Self {
        Self { client }
    }

    #[instrument(skip_all)]
    pub async fn run(&self, prefs: &Preferences) -> OperationResult {
        let mut result = OperationResult::new();

        if self.validation_service_reachable().await {
            result.push_info(VALIDATION_SERVICE_OK);
        } else {
            result.push_error_msg(VALIDATION_SERVICE_UNREACHABLE);
        }

        if self.signature_server_healthy(prefs).await {
            result.push_info(SIGNATURE_SERVER_OK);
        } else {
            result.push_error_msg(SIGNATURE_SERVER_UNREACHABLE);
        }

        info!(errors = result.error_msgs.len(), "diagnostics finished");
        result
    }

    async fn validation_service_reachable(&self) -> bool {
        let url = &self.client.settings().validation_service_url;
        match self.client.http().request(Method::OPTIONS, url).send().await {
            Ok(response) => {
                let allows = response
                    .headers()
                    .get(ALLOW)
                    .is_some_and(|allow| !allow.is_empty());
                debug!(status = response.status().as_u16(), allows, "validation service probed");
                allows || response.status().is_success()
            }
            Err(err) => {
                let err = transport_error(&err);
                warn!(url = %url, error = %err, "validation service unreachable");
                false
            }
        }
    }

    async fn signature_server_healthy(&self, prefs: &Preferences) -> bool {
        let marker = &self.client.settings().self_test_marker;
        let answer = self.client.self_test(prefs).await;
        let healthy = answer.info_msgs.iter().any(|msg| msg.contains(marker.as_str()));
        if !healthy {
            warn!(errors = ?answer.error_msgs, "signature server self-test failed");
        }
        healthy
    }
}

/// When local mirroring is enabled, make sure its directory exists.
///
/// A missing config counts as a failure: there is nothing to check against.
#[instrument(skip_all)]
pub fn check_local_save_directory(config: Option<&UserConfig>) -> OperationResult {
    let mut result = OperationResult::new();
    let Some(config) = config else {
        warn!("no user config to check");
        result.push_error_msg(SAVE_DIRECTORY_UNAVAILABLE);
        return result;
    };
    if !config.save_signed_copy_locally {
        return result;
    }

    let usable = match config
        .local_save_directory
        .as_deref()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        Some(dir) => match fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(directory = %dir.display(), error = %e, "save directory unusable");
                false
            }
        },
        None => {
            warn!("local copies enabled without a directory");
            false
        }
    };
    if !usable {
        result.push_error_msg(SAVE_DIRECTORY_UNAVAILABLE);
    }
    result
}
