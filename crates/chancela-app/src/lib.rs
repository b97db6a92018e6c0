// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chancela request layer: preferences, folder picker, sign workflow, and the
// `AppServices` facade used by the `chancela` binary.

pub mod services;

pub use services::app_services::AppServices;
pub use services::workflow::{SignWorkflow, Stage, WorkflowOutcome};
