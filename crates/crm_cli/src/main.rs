//! Operator CLI over the CRM core.
//!
//! # Responsibility
//! - Load configuration, start logging and open the store.
//! - Expose checksum and daily-log operations for quick local use.

#![forbid(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand};
use commands::LogsCommand;
use crm_core::{
    compute_ccp, init_logging, load_config, open_db, CoreConfig, DailyLog, DailyLogKind,
    DailyLogReconciler, DailyLogService, ListQuery, LocalGateway, RecordId,
};
use log::error;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "crm")]
#[command(about = "Distribution CRM operations CLI")]
struct Cli {
    /// JSON config file; `CRM_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path, overriding the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Ping,
    Version,
    /// Compute CCP key, RIP and RIP key for an account number.
    Ccp { number: String },
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error message={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Ping => {
            println!("{}", crm_core::ping());
            Ok(())
        }
        Commands::Version => {
            println!("{}", crm_core::core_version());
            Ok(())
        }
        Commands::Ccp { number } => {
            let record = compute_ccp(&number);
            if cli.json {
                print_json(&record)?;
            } else if record.valid {
                println!(
                    "ccp={} cle={} rip={} rip_cle={}",
                    record.ccp, record.cle, record.rip, record.rip_cle
                );
            } else {
                println!("ccp={} valid=false", number.trim());
            }
            Ok(())
        }
        Commands::Logs { command } => {
            let mut config = load_config(cli.config.as_deref()).map_err(|err| err.to_string())?;
            if let Some(db) = cli.db {
                config.database_path = db;
            }
            init_logging(&config.logging).map_err(|err| err.to_string())?;
            run_logs(&config, command, cli.json)
        }
    }
}

fn run_logs(config: &CoreConfig, command: LogsCommand, as_json: bool) -> Result<(), String> {
    let conn = open_db(&config.database_path).map_err(|err| err.to_string())?;
    match command {
        LogsCommand::List { kind, limit } => {
            let service = DailyLogService::sqlite(&conn).map_err(|err| err.to_string())?;
            let query = ListQuery {
                limit: Some(limit),
                ..ListQuery::default()
            };
            let logs = service
                .list_logs(kind.map(Into::into), &query)
                .map_err(|err| err.to_string())?;
            if as_json {
                return print_json(&logs);
            }
            for log in &logs {
                print_log_line(log);
            }
            Ok(())
        }
        LogsCommand::Show { id } => {
            let log_id = parse_id(&id)?;
            let mut reconciler = open_reconciler(&conn, config)?;
            let log = reconciler.reconcile(log_id).map_err(|err| err.to_string())?;
            if as_json {
                return print_json(log);
            }
            print_log_line(log);
            for entry in &log.entries {
                println!("  subject={} added_at={}", entry.subject_id, entry.added_at);
            }
            Ok(())
        }
        LogsCommand::Close { id } => {
            let log_id = parse_id(&id)?;
            let mut reconciler = open_reconciler(&conn, config)?;
            let log = reconciler.close(log_id).map_err(|err| err.to_string())?;
            if as_json {
                return print_json(log);
            }
            print_log_line(log);
            Ok(())
        }
        LogsCommand::Refresh { kind } => {
            let kind = DailyLogKind::from(kind);
            let mut reconciler = open_reconciler(&conn, config)?;
            let count = reconciler.refresh_all(kind).map_err(|err| err.to_string())?;
            if as_json {
                return print_json(&json!({
                    "kind": kind.as_str(),
                    "count": count,
                    "logs": reconciler.cached_logs(kind),
                }));
            }
            println!("kind={} refreshed={}", kind.as_str(), count);
            for log in reconciler.cached_logs(kind) {
                print_log_line(log);
            }
            Ok(())
        }
    }
}

fn open_reconciler<'conn>(
    conn: &'conn Connection,
    config: &CoreConfig,
) -> Result<DailyLogReconciler<LocalGateway<'conn>>, String> {
    let gateway = LocalGateway::try_new(conn).map_err(|err| err.to_string())?;
    Ok(DailyLogReconciler::new(gateway, config.sync.clone()))
}

fn parse_id(value: &str) -> Result<RecordId, String> {
    RecordId::parse_str(value.trim()).map_err(|_| format!("invalid log id `{value}`"))
}

fn print_log_line(log: &DailyLog) {
    println!(
        "{} kind={} date={} status={} entries={}",
        log.uuid,
        log.kind.as_str(),
        log.log_date,
        log.status.as_str(),
        log.entries.len()
    );
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}
