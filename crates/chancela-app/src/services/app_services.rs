// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: owns the preferences store, the authenticated
// client, and the signing engine, and exposes every request-layer operation.
//
// Every operation returns an `OperationResult`; nothing here raises past the
// request boundary. The client sits behind a `tokio::sync::RwLock` because a
// preferences change rebuilds its transport while other requests may be
// reading it.

use std::path::PathBuf;
use std::sync::Arc;

use chancela_core::config::{ClientSettings, Preferences, UserConfig};
use chancela_core::error::{ChancelaError, Result, SigningFailure};
use chancela_core::messages::{
    CERTIFICATE_PRESENT, DIRECTORY_UNCHANGED, NO_CERTIFICATE_ALERT, NO_CERTIFICATE_FOUND,
    PREFERENCES_LOAD_FAILED, PREFERENCES_SAVE_FAILED, PREFERENCES_SAVED, TOKEN_FOUND,
    TOKEN_UNLOCKED, TOKEN_UNREADABLE, VERSION_MISMATCH, sign_failed,
};
use chancela_core::types::{OperationResult, SignableArtifact};
use chancela_remote::{AuthClient, DiagnosticProbe, check_local_save_directory};
use chancela_security::{FileKeyStore, SecretBox, SignaturePolicy, SigningEngine, parse_digest};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info, instrument, warn};

use super::data_dir;
use super::picker::PickerHandle;
use super::preferences::{PREFERENCES_FILE, PreferencesStore};
use super::settings::load_settings;
use super::workflow::SignWorkflow;

/// Shared application services.
///
/// All fields are cheaply cloneable (Arc-wrapped) so that the struct can be
/// handed to concurrent request handlers.
#[derive(Clone)]
pub struct AppServices {
    preferences: Arc<PreferencesStore>,
    client: Arc<RwLock<AuthClient>>,
    engine: Arc<SigningEngine<FileKeyStore>>,
    picker: Option<PickerHandle>,
}

impl AppServices {
    /// Initialise all services from the platform data directory. Call once at
    /// startup.
    pub fn init(picker: Option<PickerHandle>) -> Result<Self> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising app services");
        let settings = load_settings(&dir);
        Self::with_settings(dir, settings, picker)
    }

    /// Initialise against an explicit directory and settings.
    pub fn with_settings(
        data_dir: PathBuf,
        settings: ClientSettings,
        picker: Option<PickerHandle>,
    ) -> Result<Self> {
        let preferences = PreferencesStore::new(
            data_dir.join(PREFERENCES_FILE),
            SecretBox::new(&settings.app_secret)?,
        );

        // Startup only reads; seeding is left to the first `load_preferences`.
        let initial = preferences.peek().unwrap_or_default();

        let keystore_root = settings
            .keystore_root
            .clone()
            .unwrap_or_else(|| data_dir.join("keystore"));
        let mut engine = SigningEngine::new(FileKeyStore::new(keystore_root))
            .with_fallback_volume(settings.fallback_volume.clone());
        if let Some(hash) = settings.signature_policy_hash.as_deref() {
            engine = engine.with_policy(SignaturePolicy::ad_rb(parse_digest(hash)?));
        }

        let client = AuthClient::new(settings, &initial)?;
        info!("app services initialised");

        Ok(Self {
            preferences: Arc::new(preferences),
            client: Arc::new(RwLock::new(client)),
            engine: Arc::new(engine),
            picker,
        })
    }

    pub fn engine(&self) -> &SigningEngine<FileKeyStore> {
        &self.engine
    }

    /// The persisted preferences, or defaults when none are stored yet.
    pub fn current_preferences(&self) -> Result<Preferences> {
        self.preferences.load(&Preferences::default())
    }

    // -- Preferences ---------------------------------------------------------

    /// Load the stored preferences, seeding them with `submitted` when the
    /// store is empty or incomplete.
    #[instrument(skip_all)]
    pub async fn load_preferences(&self, submitted: Preferences) -> OperationResult {
        let loaded = match self.preferences.load(&submitted) {
            Ok(prefs) => self.apply_proxy(&prefs).await.map(|()| prefs),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(prefs) => self.settled(prefs),
            Err(e) => {
                error!(error = %e, "preferences load failed");
                let mut result = OperationResult::from_error(&e);
                result.push_error_msg(PREFERENCES_LOAD_FAILED);
                result
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn save_preferences(&self, prefs: Preferences) -> OperationResult {
        let saved = match self.preferences.save(&prefs) {
            Ok(()) => self.apply_proxy(&prefs).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => self.settled(prefs),
            Err(e) => {
                error!(error = %e, "preferences save failed");
                let mut result = OperationResult::from_error(&e);
                result.push_error_msg(PREFERENCES_SAVE_FAILED);
                result.preferences = Some(prefs);
                result
            }
        }
    }

    /// Ask the operator for the local copy folder.
    ///
    /// The chosen folder is written into the returned preferences only; the
    /// caller saves them. Without a picker the current folder is kept.
    #[instrument(skip_all)]
    pub async fn choose_directory(&self, mut prefs: Preferences) -> OperationResult {
        let current = prefs
            .config
            .as_ref()
            .and_then(|c| c.local_save_directory.clone());
        let chosen = match &self.picker {
            Some(picker) => picker.choose(current.as_deref()).await,
            None => {
                warn!("no folder picker available");
                current.clone()
            }
        };

        let mut result = OperationResult::new();
        if chosen == current {
            result.push_info(DIRECTORY_UNCHANGED);
        }
        prefs
            .config
            .get_or_insert_with(UserConfig::default)
            .local_save_directory = chosen;
        result.preferences = Some(prefs);
        result
    }

    // -- Remote service ------------------------------------------------------

    pub async fn run_diagnostics(&self, prefs: &Preferences) -> OperationResult {
        match self.client_for(prefs).await {
            Ok(client) => DiagnosticProbe::new(&client).run(prefs).await,
            Err(e) => OperationResult::from_error(&e),
        }
    }

    #[instrument(skip_all)]
    pub async fn check_version(&self, prefs: &Preferences, tax_id: &str) -> OperationResult {
        let client = match self.client_for(prefs).await {
            Ok(client) => client,
            Err(e) => return OperationResult::from_error(&e),
        };
        let mut result = client.version_check(tax_id, prefs).await;
        let running = &client.settings().app_version;
        if !result.has_errors() {
            if let Some(latest) = result.version.as_deref() {
                if latest != running {
                    warn!(running = %running, latest = %latest, "client out of date");
                    result.push_warning(VERSION_MISMATCH);
                }
            }
        }
        result
    }

    pub async fn user_info(&self, prefs: &Preferences, tax_id: &str) -> OperationResult {
        match self.client_for(prefs).await {
            Ok(client) => client.user_info(tax_id, prefs).await,
            Err(e) => OperationResult::from_error(&e),
        }
    }

    pub async fn user_jsms(&self, prefs: &Preferences, tax_id: &str) -> OperationResult {
        match self.client_for(prefs).await {
            Ok(client) => client.user_jsms(tax_id, prefs).await,
            Err(e) => OperationResult::from_error(&e),
        }
    }

    /// Certificates waiting for the user's signature, each stamped with the
    /// user as signer.
    pub async fn user_certificates(&self, prefs: &Preferences, tax_id: &str) -> OperationResult {
        let mut result = match self.client_for(prefs).await {
            Ok(client) => client.user_certificates(tax_id, prefs).await,
            Err(e) => return OperationResult::from_error(&e),
        };
        if let (Some(user), Some(artifacts)) = (result.user.clone(), result.artifacts.as_mut()) {
            for artifact in artifacts {
                artifact.signer = Some(user.clone());
            }
        }
        result
    }

    /// Preview image of `artifact`, rendered by the server on first request.
    pub async fn certificate_image(
        &self,
        mut artifact: SignableArtifact,
        prefs: &Preferences,
    ) -> OperationResult {
        if artifact.preview_image.is_none() {
            let mut rendered = match self.client_for(prefs).await {
                Ok(client) => client.certificate_image(&artifact, prefs).await,
                Err(e) => return OperationResult::from_error(&e),
            };
            if let Some(first) = rendered.error_msgs.first() {
                return OperationResult::from_error(&ChancelaError::Remote(first.clone()));
            }
            artifact.preview_image = rendered.artifact.take().and_then(|a| a.preview_image);
        }
        OperationResult {
            artifact: Some(artifact),
            ..OperationResult::new()
        }
    }

    // -- Key store -----------------------------------------------------------

    pub fn list_aliases(&self) -> OperationResult {
        match self.engine.list_aliases() {
            Ok(aliases) if aliases.is_empty() => {
                OperationResult::new().with_error(NO_CERTIFICATE_FOUND)
            }
            Ok(aliases) => OperationResult {
                aliases: Some(aliases),
                ..OperationResult::new().with_info(CERTIFICATE_PRESENT)
            },
            Err(e) => {
                let mut result = OperationResult::from_error(&e);
                result.push_error_msg(NO_CERTIFICATE_FOUND);
                result.push_error_msg(NO_CERTIFICATE_ALERT);
                result
            }
        }
    }

    pub fn certificate_info(&self, alias: &str) -> OperationResult {
        match self.engine.certificate_metadata(alias) {
            Ok(identity) => OperationResult {
                identity: Some(identity),
                ..OperationResult::new().with_info(TOKEN_FOUND)
            },
            // No token, or nothing under that alias: not an unreadable certificate.
            Err(
                e @ ChancelaError::Signing {
                    kind: SigningFailure::TokenAbsent | SigningFailure::UnknownAlias,
                    ..
                },
            ) => {
                let mut result = OperationResult::from_error(&e);
                result.push_error_msg(NO_CERTIFICATE_ALERT);
                result
            }
            Err(e) => {
                error!(alias, error = %e, "certificate unreadable");
                OperationResult::new().with_error(TOKEN_UNREADABLE)
            }
        }
    }

    pub fn request_pin(&self, alias: &str) -> OperationResult {
        match self.engine.request_pin(alias) {
            Ok(()) => OperationResult::new().with_info(TOKEN_UNLOCKED),
            Err(e) => OperationResult::from_error(&e),
        }
    }

    // -- Signing -------------------------------------------------------------

    /// Run the sign workflow for one artifact.
    #[instrument(skip_all, fields(record_id = %artifact.record_id, alias = %alias))]
    pub async fn sign(
        &self,
        artifact: SignableArtifact,
        prefs: &Preferences,
        alias: &str,
    ) -> OperationResult {
        let holder = artifact.display_holder().to_string();
        let client = match self.client_for(prefs).await {
            Ok(client) => client,
            Err(e) => {
                let mut result = OperationResult::from_error(&e);
                result.push_error_msg(sign_failed(&holder));
                return result;
            }
        };

        let outcome = SignWorkflow::new(&*client, &*self.engine)
            .run(artifact, alias, prefs)
            .await;
        let mut result = outcome.result;
        if outcome.failed_at.is_some() {
            result.push_error_msg(sign_failed(&holder));
        }
        result
    }

    // -- Internals -----------------------------------------------------------

    /// Success envelope shared by load and save.
    fn settled(&self, prefs: Preferences) -> OperationResult {
        let mut result = OperationResult::new().with_info(PREFERENCES_SAVED);
        result.absorb_messages(check_local_save_directory(prefs.config.as_ref()));
        result.preferences = Some(prefs);
        result
    }

    /// Route the client's transport the way `prefs` asks.
    async fn apply_proxy(&self, prefs: &Preferences) -> Result<()> {
        let mut client = self.client.write().await;
        if !client.is_configured_for(prefs) {
            client.reconfigure(prefs)?;
        }
        Ok(())
    }

    /// The client, reconfigured first if its proxy no longer matches `prefs`.
    ///
    /// The write guard is downgraded in place, so no other caller can
    /// reconfigure between the check and the request.
    async fn client_for(&self, prefs: &Preferences) -> Result<RwLockReadGuard<'_, AuthClient>> {
        {
            let client = self.client.read().await;
            if client.is_configured_for(prefs) {
                return Ok(client);
            }
        }
        let mut client = self.client.write().await;
        if !client.is_configured_for(prefs) {
            client.reconfigure(prefs)?;
        }
        Ok(client.downgrade())
    }
}
