// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client settings: `settings.json` in the data directory, then environment
// overrides.

use std::path::{Path, PathBuf};

use chancela_core::config::ClientSettings;
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "settings.json";

pub const REMOTE_URL_VAR: &str = "CHANCELA_REMOTE_URL";
pub const LOCAL_URL_VAR: &str = "CHANCELA_LOCAL_URL";
pub const KEYSTORE_VAR: &str = "CHANCELA_KEYSTORE";

/// Settings for this process: file (or defaults) plus environment.
pub fn load_settings(data_dir: &Path) -> ClientSettings {
    let settings = read_settings_file(data_dir).unwrap_or_default();
    apply_overrides(settings, |name| std::env::var(name).ok())
}

fn read_settings_file(data_dir: &Path) -> Option<ClientSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(settings) => {
            debug!(path = %path.display(), "settings loaded");
            Some(settings)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            None
        }
    }
}

/// Apply environment overrides; `lookup` stands in for `std::env::var`.
pub fn apply_overrides<F>(mut settings: ClientSettings, lookup: F) -> ClientSettings
where
    F: Fn(&str) -> Option<String>,
{
    let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = value(REMOTE_URL_VAR) {
        settings.remote_server_url = url;
    }
    if let Some(url) = value(LOCAL_URL_VAR) {
        settings.local_server_url = url;
    }
    if let Some(root) = value(KEYSTORE_VAR) {
        settings.keystore_root = Some(PathBuf::from(root));
    }
    settings
}
