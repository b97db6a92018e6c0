// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native folder picker.
//
// Dialogs run on one dedicated UI thread; request handlers only send it a
// request and await the reply. Dismissing the dialog, a dead UI thread, or a
// reply slower than the configured timeout all leave the current folder in
// place.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A modal "choose folder" dialog.
pub trait DirectoryDialog: Send + 'static {
    /// `None` when the operator dismisses the dialog.
    fn pick_folder(&self, start: Option<&Path>) -> Option<PathBuf>;
}

/// The platform dialog, through `rfd`.
pub struct RfdDialog;

impl DirectoryDialog for RfdDialog {
    fn pick_folder(&self, start: Option<&Path>) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().set_title("Chancela");
        if let Some(start) = start.filter(|dir| dir.is_dir()) {
            dialog = dialog.set_directory(start);
        }
        dialog.pick_folder()
    }
}

struct PickRequest {
    start: Option<PathBuf>,
    reply: oneshot::Sender<Option<PathBuf>>,
}

/// Cloneable handle to the UI thread.
#[derive(Clone)]
pub struct PickerHandle {
    tx: mpsc::Sender<PickRequest>,
    timeout: Option<Duration>,
}

impl PickerHandle {
    /// Ask the operator for a folder, starting at `current`.
    ///
    /// Returns the chosen folder, or `current` when nothing was chosen.
    pub async fn choose(&self, current: Option<&Path>) -> Option<PathBuf> {
        let (reply, answer) = oneshot::channel();
        let request = PickRequest {
            start: current.map(Path::to_path_buf),
            reply,
        };
        if self.tx.send(request).is_err() {
            warn!("folder picker thread is gone");
            return current.map(Path::to_path_buf);
        }

        let chosen = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, answer).await {
                Ok(reply) => reply.ok().flatten(),
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "folder picker timed out");
                    None
                }
            },
            None => answer.await.ok().flatten(),
        };

        match chosen {
            Some(dir) => {
                info!(directory = %dir.display(), "folder chosen");
                Some(dir)
            }
            None => {
                debug!("no folder chosen");
                current.map(Path::to_path_buf)
            }
        }
    }
}

/// Start the UI thread that owns `dialog`.
pub fn spawn_dialog_thread<D: DirectoryDialog>(
    dialog: D,
    timeout: Option<Duration>,
) -> std::io::Result<PickerHandle> {
    let (tx, rx) = mpsc::channel::<PickRequest>();
    thread::Builder::new()
        .name("chancela-ui".into())
        .spawn(move || {
            for request in rx {
                let chosen = dialog.pick_folder(request.start.as_deref());
                // The requester may have timed out already.
                let _ = request.reply.send(chosen);
            }
            debug!("folder picker thread exiting");
        })?;
    Ok(PickerHandle { tx, timeout })
}
