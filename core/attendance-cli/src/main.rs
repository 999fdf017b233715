//! attendance: command-line client for attendance sessions and leave approvals.
//!
//! Session actions apply locally first and are then reported to the service.
//! Leave decisions made while the service is unreachable are queued on disk
//! and replayed in order by `sync` (or by the next command that finds the
//! service reachable).
//!
//! ## Subcommands
//!
//! - `status`, `check-in`, `break-in`, `break-out`, `check-out`: session state
//! - `approve`, `reject`: leave decisions
//! - `queue`, `sync`, `retry`, `dismiss`: the offline decision queue
//! - `summary`: weekly or monthly attendance counts

mod commands;
mod http_gateway;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use attendance_core::{
    ActionKind, ActorMeta, AttendanceEngine, RemoteGateway, SessionAction, StorageConfig,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::commands::CliError;
use crate::http_gateway::HttpGateway;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Parser)]
#[command(name = "attendance")]
#[command(about = "Attendance sessions and offline leave approvals")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to ~/.attendance)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Remote service base URL
    #[arg(long, global = true, env = "ATTENDANCE_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Acting user id; also the default subject of session commands
    #[arg(long, global = true, env = "ATTENDANCE_ACTOR", default_value = "me")]
    actor: String,

    /// Acting user's display name, sent with leave decisions
    #[arg(long, global = true, env = "ATTENDANCE_ACTOR_NAME")]
    actor_name: Option<String>,

    /// Do not contact the service; queue decisions and work from local state
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session status
    Status {
        /// Actor to inspect (defaults to --actor)
        #[arg(value_name = "ACTOR")]
        subject: Option<String>,
    },

    /// Start a work session
    CheckIn,

    /// Start a break
    BreakIn,

    /// End the current break
    BreakOut,

    /// End the work session
    CheckOut,

    /// Approve a leave request
    Approve {
        #[arg(value_name = "LEAVE_ID")]
        leave_id: String,
    },

    /// Reject a leave request
    Reject {
        #[arg(value_name = "LEAVE_ID")]
        leave_id: String,
    },

    /// List queued decisions, including those needing attention
    Queue,

    /// Send queued decisions now
    Sync,

    /// Re-arm a decision that needs attention and try to send it
    Retry {
        #[arg(value_name = "ACTION_ID")]
        id: String,
    },

    /// Drop a queued decision without sending it
    Dismiss {
        #[arg(value_name = "ACTION_ID")]
        id: String,
    },

    /// Weekly (or monthly) attendance summary
    Summary {
        /// Actor to summarize (defaults to --actor)
        #[arg(value_name = "ACTOR")]
        subject: Option<String>,

        /// Any date inside the week to summarize (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "month")]
        week_of: Option<NaiveDate>,

        /// Summarize a calendar month instead of a week
        #[arg(long, value_name = "YYYY-MM")]
        month: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let storage = cli
        .root
        .clone()
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&storage);

    if let Err(e) = run(cli, &storage).await {
        tracing::error!(error = %e, "attendance command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, storage: &StorageConfig) -> Result<(), CliError> {
    let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::new(&cli.base_url)?);
    let actor_name = cli.actor_name.clone().unwrap_or_else(|| cli.actor.clone());
    let actor = ActorMeta::new(cli.actor.clone(), actor_name);
    let engine = AttendanceEngine::open(storage, actor, gateway)?;

    if cli.offline {
        engine.set_offline();
    } else if !matches!(cli.command, Commands::Sync) {
        // Replay leftovers from earlier runs before doing anything new
        engine.resume().await?;
    }

    let me = cli.actor.as_str();
    match &cli.command {
        Commands::Status { subject } => {
            commands::status(&engine, subject.as_deref().unwrap_or(me)).await
        }
        Commands::CheckIn => commands::session(&engine, me, SessionAction::CheckIn).await,
        Commands::BreakIn => commands::session(&engine, me, SessionAction::BreakIn).await,
        Commands::BreakOut => commands::session(&engine, me, SessionAction::BreakOut).await,
        Commands::CheckOut => commands::session(&engine, me, SessionAction::CheckOut).await,
        Commands::Approve { leave_id } => {
            commands::decide(&engine, leave_id, ActionKind::Approve).await
        }
        Commands::Reject { leave_id } => {
            commands::decide(&engine, leave_id, ActionKind::Reject).await
        }
        Commands::Queue => commands::queue(&engine).await,
        Commands::Sync => commands::sync(&engine).await,
        Commands::Retry { id } => commands::retry(&engine, id).await,
        Commands::Dismiss { id } => commands::dismiss(&engine, id).await,
        Commands::Summary {
            subject,
            week_of,
            month,
        } => {
            commands::summary(
                &engine,
                subject.as_deref().unwrap_or(me),
                *week_of,
                month.as_deref(),
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "attendance",
            "approve",
            "leave-7",
            "--actor",
            "mgr-1",
            "--offline",
        ])
        .unwrap();
        assert!(cli.offline);
        assert_eq!(cli.actor, "mgr-1");
        assert!(matches!(cli.command, Commands::Approve { ref leave_id } if leave_id == "leave-7"));
    }

    #[test]
    fn test_week_and_month_conflict() {
        let result = Cli::try_parse_from([
            "attendance",
            "summary",
            "--week-of",
            "2026-03-02",
            "--month",
            "2026-03",
        ]);
        assert!(result.is_err());
    }
}
