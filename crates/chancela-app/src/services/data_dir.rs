// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where Chancela keeps its settings, preferences, and default key store.

use std::path::PathBuf;

use tracing::warn;

/// Explicit data directory, used as-is.
pub const HOME_VAR: &str = "CHANCELA_HOME";

const APP_DIR: &str = "chancela";

/// The data directory for this process, created on first use.
///
/// A directory that cannot be created is still returned; whatever reads or
/// writes inside it reports the failure.
pub fn data_dir() -> PathBuf {
    let dir = resolve(|name| std::env::var(name).ok(), std::env::temp_dir);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %e, "data directory could not be created");
    }
    dir
}

/// `CHANCELA_HOME`, else `$XDG_DATA_HOME/chancela`, else
/// `$HOME/.local/share/chancela`, else `<temp>/chancela`.
///
/// Empty and relative values are skipped, as the XDG base directory rules ask.
fn resolve<F, T>(lookup: F, temp: T) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
    T: FnOnce() -> PathBuf,
{
    let absolute = |name: &str| {
        lookup(name)
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
    };

    if let Some(dir) = absolute(HOME_VAR) {
        return dir;
    }
    let base = absolute("XDG_DATA_HOME")
        .or_else(|| absolute("HOME").map(|home| home.join(".local").join("share")))
        .unwrap_or_else(temp);
    base.join(APP_DIR)
}
