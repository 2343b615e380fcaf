//! pptime CLI - time-report workbooks
//!
//! Pulls time reports from the remote service, pivots them per project,
//! user and year, and writes an Excel workbook recorded in a local
//! registry.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pptime_core::config::{PartialConfig, PartialReportConfig, PartialServiceConfig};
use pptime_core::Year;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pptime")]
#[command(author, version, about = "Time-report workbooks for a remote project service", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML config file; flags and environment override it
    #[arg(long, global = true, value_name = "FILE", env = "PPTIME_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand
#[derive(Args, Default)]
struct SettingsArgs {
    /// Service base URL
    #[arg(long, global = true, env = "PP_BASE_URL")]
    base_url: Option<String>,

    /// OAuth consumer key
    #[arg(long, global = true, env = "PP_CLIENT_KEY")]
    client_key: Option<String>,

    /// OAuth consumer secret
    #[arg(long, global = true, env = "PP_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// OAuth access token key
    #[arg(long, global = true, env = "PP_ACCESS_TOKEN_KEY")]
    access_token_key: Option<String>,

    /// OAuth access token secret
    #[arg(long, global = true, env = "PP_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    access_token_secret: Option<String>,

    /// Directory receiving generated workbooks
    #[arg(long, global = true, value_name = "DIR", env = "PPTIME_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Report registry database
    #[arg(long, global = true, value_name = "FILE", env = "PPTIME_DATABASE")]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a time-report workbook
    Generate {
        /// Comment stored with the report
        #[arg(short, long)]
        comment: Option<String>,

        /// Read projects, members and time reports from a JSON snapshot
        #[arg(long, value_name = "FILE")]
        from_json: Option<PathBuf>,

        /// Fill every yearly sheet with this year's data
        #[arg(long, value_name = "YEAR")]
        pin_yearly_sheets: Option<Year>,

        /// Workbook file-name prefix
        #[arg(long)]
        file_prefix: Option<String>,
    },

    /// List generated reports, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Obtain an access token through the service's approval page
    Authorize,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

impl SettingsArgs {
    fn into_partial(self) -> PartialConfig {
        PartialConfig {
            service: PartialServiceConfig {
                base_url: self.base_url,
                client_key: self.client_key,
                client_secret: self.client_secret,
                access_token_key: self.access_token_key,
                access_token_secret: self.access_token_secret,
            },
            report: PartialReportConfig {
                output_dir: self.output_dir,
                database: self.database,
                ..PartialReportConfig::default()
            },
        }
    }
}

/// File layer, then environment and flags
fn load_config(path: Option<&PathBuf>, settings: SettingsArgs) -> Result<PartialConfig> {
    let file = match path {
        Some(path) => PartialConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PartialConfig::default(),
    };
    Ok(file.merge(settings.into_partial()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_ref(), cli.settings)?;

    match cli.command {
        Commands::Generate {
            comment,
            from_json,
            pin_yearly_sheets,
            file_prefix,
        } => {
            config = config.merge(PartialConfig {
                report: PartialReportConfig {
                    file_prefix,
                    pin_yearly_sheets,
                    ..PartialReportConfig::default()
                },
                ..PartialConfig::default()
            });
            commands::generate(&config, comment.as_deref(), from_json.as_deref())
        }
        Commands::List { json } => commands::list(&config, json),
        Commands::Authorize => commands::authorize(&config),
    }
}
