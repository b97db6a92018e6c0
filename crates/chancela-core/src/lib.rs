// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chancela: Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod messages;
pub mod types;

pub use config::{ClientSettings, DataSource, Preferences, ProxyConfig, UserConfig};
pub use error::{ChancelaError, SigningFailure, TransportFailure};
pub use types::*;
