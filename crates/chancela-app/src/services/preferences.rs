// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preferences persistence: one JSON document, proxy password sealed with the
// secret box on disk and plaintext in memory.

use std::fs;
use std::path::{Path, PathBuf};

use chancela_core::config::Preferences;
use chancela_core::error::{ChancelaError, Result};
use chancela_security::SecretBox;
use tracing::{debug, info, instrument, warn};

pub const PREFERENCES_FILE: &str = "preferences.json";

pub struct PreferencesStore {
    path: PathBuf,
    secret_box: SecretBox,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>, secret_box: SecretBox) -> Self {
        Self {
            path: path.into(),
            secret_box,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted preferences.
    ///
    /// A missing, unparsable, or incomplete file is replaced by `default`,
    /// which is then returned.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self, default: &Preferences) -> Result<Preferences> {
        match self.read_stored()? {
            Some(prefs) => {
                debug!("preferences loaded");
                Ok(prefs)
            }
            None => {
                self.save(default)?;
                Ok(default.clone())
            }
        }
    }

    /// The stored preferences, without seeding anything when there are none.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn peek(&self) -> Option<Preferences> {
        match self.read_stored() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "stored preferences unusable");
                None
            }
        }
    }

    /// `None` when the file is missing, unparsable, or incomplete.
    fn read_stored(&self) -> Result<Option<Preferences>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no preferences stored yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut prefs = match serde_json::from_slice::<Preferences>(&bytes) {
            Ok(prefs) if prefs.is_complete() => prefs,
            Ok(_) => {
                warn!("preferences incomplete");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "preferences unreadable");
                return Ok(None);
            }
        };

        if let Some(password) = password_mut(&mut prefs) {
            *password = self.secret_box.decrypt(password)?;
        }
        Ok(Some(prefs))
    }

    /// Persist `prefs`, sealing the proxy password.
    ///
    /// The file is replaced atomically: written beside the target, then
    /// renamed over it.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        let mut sealed = prefs.clone();
        if let Some(password) = password_mut(&mut sealed) {
            *password = self.secret_box.encrypt(password)?;
        }
        let json = serde_json::to_vec_pretty(&sealed)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path).map_err(|e| {
            ChancelaError::LocalPersistence(format!("{}: {e}", self.path.display()))
        })?;
        debug!("preferences written");
        Ok(())
    }
}

/// The proxy password, when one is set.
fn password_mut(prefs: &mut Preferences) -> Option<&mut String> {
    prefs
        .config
        .as_mut()?
        .proxy
        .as_mut()?
        .password
        .as_mut()
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chancela_core::config::{DataSource, ProxyConfig, UserConfig};
    use serde_json::json;

    fn store(dir: &Path) -> PreferencesStore {
        PreferencesStore::new(
            dir.join(PREFERENCES_FILE),
            SecretBox::new("test-secret").expect("key"),
        )
    }

    fn with_proxy_password(password: &str) -> Preferences {
        Preferences {
            config: Some(UserConfig {
                data_source: DataSource::Local,
                proxy: Some(ProxyConfig {
                    address: "proxy.intra".into(),
                    port: 3128,
                    requires_auth: true,
                    user: Some("ana".into()),
                    password: Some(password.into()),
                }),
                save_signed_copy_locally: true,
                local_save_directory: Some(PathBuf::from("/srv/signed")),
            }),
            filter: Some(json!({ "year": 2026 })),
        }
    }

    #[test]
    fn round_trip_recovers_password_without_storing_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let prefs = with_proxy_password("p@ss w0rd");

        store.save(&prefs).expect("save");
        let on_disk = fs::read_to_string(store.path()).expect("read");
        assert!(!on_disk.contains("p@ss w0rd"));
        assert!(!dir.path().join("preferences.json.tmp").exists());

        let loaded = store.load(&Preferences::default()).expect("load");
        assert_eq!(loaded, prefs);
    }

    #[test]
    fn missing_file_is_created_from_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let default = with_proxy_password("x");

        let loaded = store.load(&default).expect("load");
        assert_eq!(loaded, default);
        assert!(store.path().exists());
    }

    #[test]
    fn incomplete_file_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        fs::write(store.path(), r#"{ "config": { "dataSource": "remote" } }"#).expect("write");

        let loaded = store.load(&Preferences::default()).expect("load");
        assert_eq!(loaded, Preferences::default());
        let rewritten: Preferences =
            serde_json::from_slice(&fs::read(store.path()).expect("read")).expect("json");
        assert!(rewritten.is_complete());
    }

    #[test]
    fn empty_password_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        let prefs = with_proxy_password("");
        store.save(&prefs).expect("save");
        assert_eq!(store.load(&Preferences::default()).expect("load"), prefs);
    }

    #[test]
    fn password_sealed_under_another_secret_fails_to_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        store(dir.path())
            .save(&with_proxy_password("secret"))
            .expect("save");
        let other = PreferencesStore::new(
            dir.path().join(PREFERENCES_FILE),
            SecretBox::new("another-secret").expect("key"),
        );
        assert!(matches!(
            other.load(&Preferences::default()),
            Err(ChancelaError::Decryption(_))
        ));
        assert_eq!(other.peek(), None);
    }

    #[test]
    fn peek_reads_without_seeding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        assert_eq!(store.peek(), None);
        assert!(!store.path().exists());

        fs::write(store.path(), "not json").expect("write");
        assert_eq!(store.peek(), None);
        assert_eq!(fs::read_to_string(store.path()).expect("read"), "not json");

        let prefs = with_proxy_password("hunter2");
        store.save(&prefs).expect("save");
        assert_eq!(store.peek(), Some(prefs));
    }
}
