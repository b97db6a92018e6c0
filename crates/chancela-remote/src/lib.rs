// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chancela Remote: the authenticated HTTP client for the signature server,
// its proxy-aware transport, failure classification, and the connectivity
// diagnostics built on top of it.

pub mod classify;
pub mod client;
pub mod diagnostics;
pub mod transport;

pub use classify::{classify_transport_text, transport_error};
pub use client::{AuthClient, RemoteService};
pub use diagnostics::{DiagnosticProbe, check_local_save_directory};
pub use transport::build_transport;
