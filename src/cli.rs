//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// crt - campaign runtime engine
#[derive(Parser)]
#[command(
    name = "crt",
    about = "Per-campaign operation scheduler with retries and rolling metrics",
    version,
    after_help = "Logs are written to: ~/.local/share/campaign-runtime/logs/crt.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a simulated campaign against in-memory collaborators
    Simulate {
        /// Campaign id (overrides simulation.campaign-id)
        #[arg(long)]
        campaign: Option<String>,

        /// Number of operations to enqueue
        #[arg(short = 'n', long)]
        operations: Option<usize>,

        /// Seconds to run before stopping
        #[arg(short, long = "duration")]
        duration_secs: Option<u64>,

        /// Max operations executing at once
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Seed for the simulated handlers
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Output format for the simulation report
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Path of the log file written by `crt`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campaign-runtime")
        .join("logs")
        .join("crt.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["crt"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_simulate_defaults() {
        let cli = Cli::parse_from(["crt", "simulate"]);
        if let Some(Command::Simulate {
            campaign,
            operations,
            duration_secs,
            batch_size,
            seed,
            format,
        }) = cli.command
        {
            assert!(campaign.is_none());
            assert!(operations.is_none());
            assert!(duration_secs.is_none());
            assert!(batch_size.is_none());
            assert!(seed.is_none());
            assert_eq!(format, OutputFormat::Text);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_cli_parse_simulate_flags() {
        let cli = Cli::parse_from([
            "crt", "simulate", "--campaign", "spring", "-n", "12", "--duration", "5", "-b", "2", "--seed", "7", "-f",
            "json",
        ]);
        if let Some(Command::Simulate {
            campaign,
            operations,
            duration_secs,
            batch_size,
            seed,
            format,
        }) = cli.command
        {
            assert_eq!(campaign.as_deref(), Some("spring"));
            assert_eq!(operations, Some(12));
            assert_eq!(duration_secs, Some(5));
            assert_eq!(batch_size, Some(2));
            assert_eq!(seed, Some(7));
            assert_eq!(format, OutputFormat::Json);
        } else {
            panic!("Expected Simulate command");
        }
    }

    #[test]
    fn test_cli_parse_config() {
        let cli = Cli::parse_from(["crt", "config"]);
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["crt", "-c", "/path/to/config.yml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }

    #[test]
    fn test_log_path_file_name() {
        assert!(get_log_path().ends_with("campaign-runtime/logs/crt.log"));
    }
}
