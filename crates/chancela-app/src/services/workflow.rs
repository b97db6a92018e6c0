// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The sign workflow: fetch, sign, persist remotely, mirror locally.
//
// Stages only move forward. A failure before the remote commit is terminal;
// a failure of the local mirror after it is only a warning.

use chancela_core::config::Preferences;
use chancela_core::error::ChancelaError;
use chancela_core::messages::{humanize_error, mirror_failed};
use chancela_core::types::{OperationResult, SignableArtifact};
use chancela_remote::RemoteService;
use chancela_security::ArtifactSigner;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Sign,
    PersistRemote,
    MirrorLocal,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// `Done` or `Failed`.
    pub stage: Stage,
    /// The stage that failed, when `stage` is `Failed`.
    pub failed_at: Option<Stage>,
    pub result: OperationResult,
}

impl WorkflowOutcome {
    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    fn failed(at: Stage, err: &ChancelaError) -> Self {
        error!(stage = ?at, error = %err, "sign workflow failed");
        Self {
            stage: Stage::Failed,
            failed_at: Some(at),
            result: OperationResult::from_error(err),
        }
    }
}

/// One artifact through the sign workflow.
pub struct SignWorkflow<'a, R: RemoteService, S: ArtifactSigner> {
    remote: &'a R,
    signer: &'a S,
}

impl<'a, R: RemoteService, S: ArtifactSigner> SignWorkflow<'a, R, S> {
    pub fn new(remote: &'a R, signer: &'a S) -> Self {
        Self { remote, signer }
    }

    #[instrument(skip_all, fields(record_id = %artifact.record_id, alias = %alias))]
    pub async fn run(
        &self,
        mut artifact: SignableArtifact,
        alias: &str,
        prefs: &Preferences,
    ) -> WorkflowOutcome {
        let tax_id = artifact.signer_tax_id().to_string();

        // Fetch
        let content = match self
            .remote
            .fetch_signable_content(&mut artifact, &tax_id, prefs)
            .await
        {
            Ok(content) => content,
            Err(err) => return WorkflowOutcome::failed(Stage::Fetch, &err),
        };
        artifact.content = content;

        // Sign
        match self.signer.sign(&artifact.content, alias) {
            Ok(signature) => {
                artifact.signature = Some(signature);
                artifact.signed = true;
                artifact.preview_image = None;
            }
            Err(err) => return WorkflowOutcome::failed(Stage::Sign, &err),
        }

        // Persist remotely
        let mut result = match self
            .remote
            .persist_signed_artifact(&artifact, &tax_id, prefs)
            .await
        {
            Ok(envelope) => envelope,
            Err(err) => return WorkflowOutcome::failed(Stage::PersistRemote, &err),
        };

        // Mirror locally
        if let Some(warning) = self.mirror(&artifact, prefs) {
            result.push_warning(warning);
        }

        info!(warnings = result.warning_msgs.len(), "sign workflow done");
        result.artifact = Some(artifact);
        WorkflowOutcome {
            stage: Stage::Done,
            failed_at: None,
            result,
        }
    }

    /// Best-effort local copy; the warning to report, if any.
    fn mirror(&self, artifact: &SignableArtifact, prefs: &Preferences) -> Option<String> {
        let config = prefs.config.as_ref().filter(|c| c.save_signed_copy_locally)?;
        let holder = artifact.display_holder();

        let outcome = match config
            .local_save_directory
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            Some(dir) => self.signer.persist_signed_artifact(artifact, dir).map(|_| ()),
            None => Err(ChancelaError::LocalPersistence(
                "no folder is set for local copies".into(),
            )),
        };
        match outcome {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "local mirror failed");
                let detail = match err {
                    ChancelaError::LocalPersistence(detail) => detail,
                    other => humanize_error(&other).message,
                };
                Some(mirror_failed(holder, &detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chancela_core::config::{DataSource, UserConfig};
    use chancela_core::error::{Result, SigningFailure, TransportFailure};

    #[derive(Default)]
    struct FakeRemote {
        fail_fetch: bool,
        fetches: AtomicUsize,
        persisted: Mutex<Vec<SignableArtifact>>,
    }

    impl RemoteService for FakeRemote {
        async fn fetch_signable_content(
            &self,
            artifact: &mut SignableArtifact,
            _tax_id: &str,
            _prefs: &Preferences,
        ) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(ChancelaError::transport(
                    TransportFailure::ConnectionRefused,
                    "connection refused",
                ));
            }
            artifact.signed = false;
            Ok(b"DOC".to_vec())
        }

        async fn persist_signed_artifact(
            &self,
            artifact: &SignableArtifact,
            _tax_id: &str,
            _prefs: &Preferences,
        ) -> Result<OperationResult> {
            self.persisted
                .lock()
                .expect("lock")
                .push(artifact.clone());
            Ok(OperationResult::new().with_info("stored as 42"))
        }
    }

    #[derive(Default)]
    struct FakeSigner {
        fail_mirror: bool,
        signs: AtomicUsize,
    }

    impl ArtifactSigner for FakeSigner {
        fn sign(&self, content: &[u8], _alias: &str) -> Result<Vec<u8>> {
            self.signs.fetch_add(1, Ordering::SeqCst);
            assert_eq!(content, b"DOC");
            Ok(vec![0x30, 0x82])
        }

        fn persist_signed_artifact(
            &self,
            _artifact: &SignableArtifact,
            directory: &Path,
        ) -> Result<Vec<PathBuf>> {
            if self.fail_mirror {
                return Err(ChancelaError::LocalPersistence(format!(
                    "{}: read-only file system",
                    directory.display()
                )));
            }
            Ok(vec![directory.join("a.pdf"), directory.join("a.p7s")])
        }
    }

    struct RefusingSigner;

    impl ArtifactSigner for RefusingSigner {
        fn sign(&self, _content: &[u8], _alias: &str) -> Result<Vec<u8>> {
            Err(ChancelaError::signing(SigningFailure::Cancelled, "PIN dialog dismissed"))
        }

        fn persist_signed_artifact(
            &self,
            _artifact: &SignableArtifact,
            _directory: &Path,
        ) -> Result<Vec<PathBuf>> {
            unreachable!("nothing to mirror")
        }
    }

    fn artifact() -> SignableArtifact {
        SignableArtifact {
            record_id: "123".into(),
            document_type: "X".into(),
            preview_image: Some(vec![1, 2, 3]),
            holder_name: Some("Ana Souza".into()),
            ..Default::default()
        }
    }

    fn prefs(mirror_to: Option<&str>) -> Preferences {
        Preferences::new(UserConfig {
            data_source: DataSource::Remote,
            save_signed_copy_locally: mirror_to.is_some(),
            local_save_directory: mirror_to.filter(|d| !d.is_empty()).map(PathBuf::from),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn happy_path_returns_server_payload_with_signed_artifact() {
        let remote = FakeRemote::default();
        let signer = FakeSigner::default();
        let outcome = SignWorkflow::new(&remote, &signer)
            .run(artifact(), "cert-1", &prefs(None))
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.result.info_msgs, vec!["stored as 42"]);
        assert!(outcome.result.warning_msgs.is_empty());
        let signed = outcome.result.artifact.expect("artifact");
        assert!(signed.signed);
        assert_eq!(signed.signature.as_deref(), Some(&[0x30, 0x82][..]));
        assert!(signed.preview_image.is_none());

        let persisted = remote.persisted.lock().expect("lock");
        assert_eq!(persisted.len(), 1);
        assert!(persisted[0].signed);
    }

    #[tokio::test]
    async fn fetch_failure_never_signs() {
        let remote = FakeRemote {
            fail_fetch: true,
            ..Default::default()
        };
        let signer = FakeSigner::default();
        let outcome = SignWorkflow::new(&remote, &signer)
            .run(artifact(), "cert-1", &prefs(None))
            .await;

        assert_eq!(outcome.stage, Stage::Failed);
        assert_eq!(outcome.failed_at, Some(Stage::Fetch));
        assert_eq!(signer.signs.load(Ordering::SeqCst), 0);
        assert!(remote.persisted.lock().expect("lock").is_empty());
        let expected = OperationResult::from_error(&ChancelaError::transport(
            TransportFailure::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(outcome.result.error_msgs, expected.error_msgs);
        assert!(outcome.result.info_msgs.is_empty());
        assert!(outcome.result.warning_msgs.is_empty());
    }

    #[tokio::test]
    async fn signing_failure_persists_nothing() {
        let remote = FakeRemote::default();
        let outcome = SignWorkflow::new(&remote, &RefusingSigner)
            .run(artifact(), "cert-1", &prefs(None))
            .await;

        assert_eq!(outcome.failed_at, Some(Stage::Sign));
        assert!(outcome.result.has_errors());
        assert!(remote.persisted.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn mirror_failure_is_a_single_warning() {
        let remote = FakeRemote::default();
        let signer = FakeSigner {
            fail_mirror: true,
            ..Default::default()
        };
        let outcome = SignWorkflow::new(&remote, &signer)
            .run(artifact(), "cert-1", &prefs(Some("/mnt/readonly")))
            .await;

        assert!(outcome.is_done());
        assert!(outcome.result.error_msgs.is_empty());
        assert_eq!(
            outcome.result.warning_msgs,
            vec![mirror_failed("Ana Souza", "/mnt/readonly: read-only file system")]
        );
        assert_eq!(outcome.result.info_msgs, vec!["stored as 42"]);
    }

    #[tokio::test]
    async fn mirroring_without_a_folder_warns() {
        let remote = FakeRemote::default();
        let signer = FakeSigner::default();
        let outcome = SignWorkflow::new(&remote, &signer)
            .run(artifact(), "cert-1", &prefs(Some("")))
            .await;

        assert!(outcome.is_done());
        assert_eq!(
            outcome.result.warning_msgs,
            vec![mirror_failed("Ana Souza", "no folder is set for local copies")]
        );
    }

    #[tokio::test]
    async fn successful_mirror_adds_no_messages() {
        let remote = FakeRemote::default();
        let signer = FakeSigner::default();
        let outcome = SignWorkflow::new(&remote, &signer)
            .run(artifact(), "cert-1", &prefs(Some("/srv/signed")))
            .await;

        assert!(outcome.is_done());
        assert_eq!(outcome.result.message_count(), 1);
    }
}
