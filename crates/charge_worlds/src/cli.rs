//! Command-line interface handling for the Charge Worlds server.
//!
//! Argument parsing uses the `clap` builder API; every option overrides the
//! matching setting in the configuration file.

use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the snapshot file
    pub snapshot_path: Option<PathBuf>,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Invalid arguments print usage and exit, as clap does by default.
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    /// Parses an explicit argument list (the first item is the binary name).
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().get_matches_from(args);

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            snapshot_path: matches.get_one::<String>("snapshot").map(PathBuf::from),
        }
    }
}

fn command() -> Command {
    Command::new("Charge Worlds Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shared campaign worlds for the Charge RPG: sheets, clocks, dice and cursors")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 127.0.0.1:8080)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("snapshot")
                .short('s')
                .long("snapshot")
                .value_name("FILE")
                .help("Snapshot file to restore from and save to"),
        )
}
