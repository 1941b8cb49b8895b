//! funnel-guard - check funnel inputs against the configured policies.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

use funnel_guard::{
    cli::{CheckKind, Cli, Command},
    config::Config,
    csv::csv_row,
    security::{UrlPolicy, resolve_public_addrs},
    setup_tracing,
    validation::{ValidationResult, validate_email, validate_slug},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let policy = match UrlPolicy::from_config(&config.url_policy) {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Check { kind, value } => run_check(&policy, kind, &value),
        Command::EscapeCsv { values } => {
            let cells: Vec<Option<&str>> = values.iter().map(|v| Some(v.as_str())).collect();
            println!("{}", csv_row(&cells));
            ExitCode::SUCCESS
        }
        Command::Resolve { url } => run_resolve(&policy, &url).await,
        Command::Config => match serde_yaml::to_string(&config) {
            Ok(yaml) => {
                print!("{yaml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Failed to serialize configuration: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

/// Run one validator and print its result as JSON
fn run_check(policy: &UrlPolicy, kind: CheckKind, value: &str) -> ExitCode {
    let result = match kind {
        CheckKind::Webhook => policy.validate_webhook_url(value),
        CheckKind::Video => policy.validate_video_embed_url(value),
        CheckKind::Calendar => policy.validate_calendly_url(value),
        CheckKind::Slug => validate_slug(value),
        CheckKind::Email => {
            if validate_email(value) {
                ValidationResult::ok()
            } else {
                ValidationResult::invalid("Invalid email address")
            }
        }
    };
    debug!(?kind, valid = result.valid, "Checked value");

    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("❌ Failed to serialize result: {e}");
            return ExitCode::FAILURE;
        }
    }

    if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Validate a webhook URL, then resolve it and print the public addresses
async fn run_resolve(policy: &UrlPolicy, url: &str) -> ExitCode {
    let result = policy.validate_webhook_url(url);
    if let Some(reason) = result.error() {
        eprintln!("❌ {reason}");
        return ExitCode::from(1);
    }

    match resolve_public_addrs(url).await {
        Ok(addrs) => {
            for addr in addrs {
                println!("{addr}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::from(1)
        }
    }
}
