// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dineo, a WhatsApp coaching assistant for rental fleet drivers.
//!
//! Binary entry point: config loading, tracing init, and wiring of the
//! storage, dialogue, worker, and gateway layers.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod dryrun;
mod serve;

use clap::{Parser, Subcommand};
use dineo_core::DineoError;
use tracing_subscriber::EnvFilter;

/// Dineo, a WhatsApp coaching assistant for rental fleet drivers.
#[derive(Parser, Debug)]
#[command(name = "dineo", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway and scheduled workers.
    Serve,
    /// Run environment health checks.
    Doctor,
    /// Run an engagement campaign from a driver CSV.
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CampaignCommands {
    /// Ingest a CSV, preview it, and send the templates.
    Send {
        /// Path to the driver CSV export.
        csv: std::path::PathBuf,
        /// Template map JSON, e.g. '{"default": "winter_checkin_v1"}'.
        #[arg(long)]
        templates: String,
    },
    /// Print the uplift report for a sent campaign.
    Report {
        /// Campaign id printed by `campaign send`.
        campaign_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match dineo_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            dineo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.assistant.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result: Result<(), DineoError> = match cli.command {
        Some(Commands::Serve) => serve::run(config).await,
        Some(Commands::Doctor) => match doctor::run(&config).await {
            Ok(0) => Ok(()),
            Ok(_) => std::process::exit(1),
            Err(e) => Err(e),
        },
        Some(Commands::Campaign { command }) => match command {
            CampaignCommands::Send { csv, templates } => {
                serve::run_campaign_send(&config, &csv, &templates).await
            }
            CampaignCommands::Report { campaign_id } => {
                serve::run_campaign_report(&config, &campaign_id).await
            }
        },
        None => {
            println!("dineo: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("dineo: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports the epoch control, the system allocator
        // would fail here.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    #[serial_test::serial]
    fn binary_loads_config_defaults() {
        let config = dineo_config::load_and_validate().expect("default config should be valid");
        assert_eq!(config.assistant.name, "Dineo");
    }
}
