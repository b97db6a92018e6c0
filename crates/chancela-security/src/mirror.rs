// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local mirror of signed artifacts: the signed PDF plus its `.p7s`.

use std::fs;
use std::path::{Path, PathBuf};

use chancela_core::error::ChancelaError;
use chancela_core::types::SignableArtifact;
use chrono::{DateTime, Local};
use tracing::{debug, instrument};

/// Minute resolution, local time.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M";

const SIGNATURE_SUFFIX: &str = "ASSINATURA";

/// File names for one mirror, sharing a single timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorNames {
    pub document: String,
    pub signature: String,
}

pub fn mirror_names(artifact: &SignableArtifact, at: DateTime<Local>) -> MirrorNames {
    let stamp = at.format(TIMESTAMP_FORMAT);
    let prefix = format!("RA_{}-{stamp}", artifact.record_id);
    MirrorNames {
        document: format!("{prefix}-{}.pdf", artifact.document_type),
        signature: format!("{prefix}-{SIGNATURE_SUFFIX}.p7s"),
    }
}

/// Normalise a configured directory.
///
/// Backslashes become `/`. A root-relative path (`/dir`, as left behind when
/// a drive letter is stripped) is placed on `fallback_volume` when one is
/// configured; otherwise it is used as is.
pub fn normalize_directory(configured: &Path, fallback_volume: Option<&str>) -> PathBuf {
    let text = configured.to_string_lossy().replace('\\', "/");
    match fallback_volume {
        Some(volume) if text.starts_with('/') && !text.starts_with("//") => {
            PathBuf::from(format!("{}{text}", volume.trim_end_matches(['/', '\\'])))
        }
        _ => PathBuf::from(text),
    }
}

/// Write the signed content and its detached signature into `directory`.
///
/// The directory is created when missing. Returns the two written paths,
/// document first.
#[instrument(skip(artifact, fallback_volume), fields(record_id = %artifact.record_id))]
pub fn write_mirror(
    artifact: &SignableArtifact,
    directory: &Path,
    fallback_volume: Option<&str>,
    at: DateTime<Local>,
) -> Result<Vec<PathBuf>, ChancelaError> {
    let signature = artifact
        .signature
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ChancelaError::LocalPersistence("artifact has no signature".into()))?;

    let directory = normalize_directory(directory, fallback_volume);
    fs::create_dir_all(&directory).map_err(|e| {
        ChancelaError::LocalPersistence(format!("{}: {e}", directory.display()))
    })?;

    let names = mirror_names(artifact, at);
    let mut written = Vec::with_capacity(2);
    for (name, bytes) in [
        (&names.document, artifact.content.as_slice()),
        (&names.signature, signature),
    ] {
        let path = directory.join(name);
        fs::write(&path, bytes)
            .map_err(|e| ChancelaError::LocalPersistence(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), len = bytes.len(), "mirror file written");
        written.push(path);
    }
    Ok(written)
}
