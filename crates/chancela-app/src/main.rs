// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Chancela: digital signing client for ICP-Brasil certificates.
//
// Entry point. Initialises logging and backend services, runs one request,
// and prints its `OperationResult` as JSON on stdout.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chancela_app::AppServices;
use chancela_app::services::picker::{RfdDialog, spawn_dialog_thread};
use chancela_core::config::Preferences;
use chancela_core::error::Result;
use chancela_core::types::{OperationResult, SignableArtifact};
use clap::{Parser, Subcommand};

/// How long the folder dialog may stay open.
const PICKER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "chancela")]
#[command(about = "Sign documents with a certificate from your token", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load or save preferences
    Preferences {
        #[command(subcommand)]
        action: PreferencesAction,
    },

    /// Pick the folder for local copies of signed documents
    ChooseDirectory,

    /// Check the validation service and the signature server
    Diagnose,

    /// Compare this client's version with the server's
    Version {
        #[arg(long, default_value = "")]
        tax_id: String,
    },

    /// List the certificates on the token
    Aliases,

    /// Show holder data of one certificate
    Certificate { alias: String },

    /// Fetch the user's profile
    UserInfo { tax_id: String },

    /// Fetch the user's client-side scripts
    Jsms { tax_id: String },

    /// List the certificates awaiting the user's signature
    Certificates { tax_id: String },

    /// Render the preview image of an artifact (JSON file)
    Image { artifact: PathBuf },

    /// Make the token ask for its PIN now
    RequestPin { alias: String },

    /// Sign an artifact (JSON file) with the certificate behind `alias`
    Sign { artifact: PathBuf, alias: String },
}

#[derive(Subcommand, Debug)]
enum PreferencesAction {
    /// Load stored preferences, seeding them from FILE when none are stored
    Load { file: Option<PathBuf> },
    /// Replace stored preferences with FILE
    Save { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Chancela starting");

    let result = match run(cli.command).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            OperationResult::from_error(&e)
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "result could not be printed");
            return ExitCode::FAILURE;
        }
    }
    if result.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run(command: Commands) -> Result<OperationResult> {
    // The dialog thread is only worth starting when a dialog can be shown.
    let picker = match command {
        Commands::ChooseDirectory => Some(spawn_dialog_thread(RfdDialog, Some(PICKER_TIMEOUT))?),
        _ => None,
    };
    let svc = AppServices::init(picker)?;

    let result = match command {
        Commands::Preferences { action } => match action {
            PreferencesAction::Load { file } => {
                let submitted = match file {
                    Some(path) => read_json(&path)?,
                    None => Preferences::default(),
                };
                svc.load_preferences(submitted).await
            }
            PreferencesAction::Save { file } => svc.save_preferences(read_json(&file)?).await,
        },
        Commands::ChooseDirectory => {
            let mut result = svc.choose_directory(svc.current_preferences()?).await;
            if let Some(prefs) = result.preferences.take() {
                let saved = svc.save_preferences(prefs).await;
                result.absorb_messages(saved.clone());
                result.preferences = saved.preferences;
            }
            result
        }
        Commands::Diagnose => svc.run_diagnostics(&svc.current_preferences()?).await,
        Commands::Version { tax_id } => {
            svc.check_version(&svc.current_preferences()?, &tax_id).await
        }
        Commands::Aliases => svc.list_aliases(),
        Commands::Certificate { alias } => svc.certificate_info(&alias),
        Commands::UserInfo { tax_id } => svc.user_info(&svc.current_preferences()?, &tax_id).await,
        Commands::Jsms { tax_id } => svc.user_jsms(&svc.current_preferences()?, &tax_id).await,
        Commands::Certificates { tax_id } => {
            svc.user_certificates(&svc.current_preferences()?, &tax_id).await
        }
        Commands::Image { artifact } => {
            let artifact: SignableArtifact = read_json(&artifact)?;
            svc.certificate_image(artifact, &svc.current_preferences()?).await
        }
        Commands::RequestPin { alias } => svc.request_pin(&alias),
        Commands::Sign { artifact, alias } => {
            let artifact: SignableArtifact = read_json(&artifact)?;
            svc.sign(artifact, &svc.current_preferences()?, &alias).await
        }
    };
    Ok(result)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
