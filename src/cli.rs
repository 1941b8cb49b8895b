//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// funnel-guard - check funnel inputs against the configured policies
#[derive(Parser, Debug)]
#[command(name = "funnel-guard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "FUNNEL_GUARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "FUNNEL_GUARD_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "FUNNEL_GUARD_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a single value and print the JSON result
    Check {
        /// Which validator to run
        #[arg(value_enum)]
        kind: CheckKind,

        /// Value to validate
        value: String,
    },

    /// Escape values as one CSV row
    EscapeCsv {
        /// Cell values, in column order
        values: Vec<String>,
    },

    /// Validate a webhook URL and resolve it to public addresses
    Resolve {
        /// Webhook URL
        url: String,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Validators reachable from `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckKind {
    /// Outbound webhook target
    Webhook,
    /// Video embed URL
    Video,
    /// Calendar booking link
    Calendar,
    /// Email address
    Email,
    /// Page slug
    Slug,
}
