// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: bridges the request front end (CLI or embedded caller) to
// the chancela backend crates.
//
// Each service wraps one or more backend crate APIs so that every operation
// hands back an `OperationResult` the front end can display directly.

pub mod app_services;
pub mod data_dir;
pub mod picker;
pub mod preferences;
pub mod settings;
pub mod workflow;
