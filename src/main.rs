//! # Farm Runner
//!
//! Command-line entry point. Initializes tracing, loads configuration,
//! opens the store and dispatches to a subcommand.
//!
//! There is no `stop` subcommand: `start` runs in the foreground and stops
//! on Ctrl-C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use validator::Validate;

use farm_runner::config::Settings;
use farm_runner::domain::NewAccount;
use farm_runner::shared::error::AppError;
use farm_runner::startup::Application;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Start,
    /// Run one account immediately
    Run {
        account_id: i64,
    },
    /// Register an account
    AddAccount {
        /// Login code; read from --code-file when omitted
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value = "code.txt")]
        code_file: PathBuf,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "qq")]
        platform: String,
    },
    /// List active accounts
    List,
    /// Show recorded lands and the next maturity per account
    Status,
    /// Delete an account and its recorded lands
    Remove {
        account_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for structured logging
    farm_runner::telemetry::init_tracing();

    let settings = Settings::load()?;
    info!(
        gateway = %settings.gateway.url,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    match cli.command {
        Command::Start => application.run_until_stopped().await?,
        Command::Run { account_id } => application.run_once(account_id).await?,
        Command::AddAccount {
            code,
            code_file,
            name,
            platform,
        } => {
            let code = match code {
                Some(code) => code,
                None => std::fs::read_to_string(&code_file)
                    .with_context(|| {
                        format!("no --code given and {} unreadable", code_file.display())
                    })?
                    .trim()
                    .to_string(),
            };
            let new_account = NewAccount { code, platform, name };
            new_account
                .validate()
                .map_err(|e| AppError::Validation(e.to_string()))?;
            let account = application.accounts.create(&new_account).await?;
            println!("Account added, id: {}", account.id);
        }
        Command::List => {
            let accounts = application.accounts.find_active().await?;
            if accounts.is_empty() {
                println!("No accounts");
                return Ok(());
            }
            println!(
                "{:<5} {:<8} {:<18} {:>5} {:>10} {:<8}",
                "ID", "PLATFORM", "NAME", "LEVEL", "GOLD", "STATUS"
            );
            for a in accounts {
                let name = if a.name.is_empty() { "-" } else { a.name.as_str() };
                println!(
                    "{:<5} {:<8} {:<18} {:>5} {:>10} {:<8}",
                    a.id, a.platform, name, a.level, a.gold, a.status.as_str()
                );
            }
        }
        Command::Status => {
            let reports = application.report().await?;
            if reports.is_empty() {
                println!("No accounts");
                return Ok(());
            }
            println!("{:<5} {:<18} {:>5} {:<25}", "ID", "NAME", "LANDS", "NEXT MATURITY");
            for r in reports {
                let name = if r.account.name.is_empty() { "-" } else { r.account.name.as_str() };
                let next = r
                    .next_maturity
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<5} {:<18} {:>5} {:<25}", r.account.id, name, r.lands, next);
            }
        }
        Command::Remove { account_id } => {
            application.accounts.delete(account_id).await?;
            println!("Account {account_id} removed");
        }
    }

    Ok(())
}
