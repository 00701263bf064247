//! # Charge Worlds Server - Main Entry Point
//!
//! Shared campaign worlds for the Charge RPG. This entry point handles CLI
//! parsing, configuration loading, logging and the application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! charge_worlds
//!
//! # Specify custom configuration
//! charge_worlds --config production.toml
//!
//! # Override specific settings
//! charge_worlds --bind 0.0.0.0:8080 --snapshot /var/lib/charge/snapshot.json --log-level debug
//!
//! # JSON logging for production
//! charge_worlds --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration with one world is
//! created.
//!
//! ## Signal Handling
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the server and write a final snapshot.
//! A second signal exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

pub use app::{save_snapshot, Application, WorldState};
pub use cli::CliArgs;
pub use config::{
    AppConfig, GateSettings, LoggingSettings, ServerSettings, StorageSettings, WorldSettings,
};

/// Runs the Charge Worlds server.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes up before the application so config errors are visible.
    let mut logging_config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_config.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging_config, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
