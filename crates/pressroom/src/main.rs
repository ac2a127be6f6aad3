//! Pressroom: scheduled publishing for CMS content
//!
//! Main binary with subcommands:
//! - `serve`: poller plus the HTTP control surface
//! - `check-pending`, `retry`, `publish-now`, `cancel`: one-shot control actions
//! - `health`: status counts and recent activity
//! - `schedule`: queue content for a destination
//! - `import`: load contents, destinations and subscriptions from JSON

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::Result;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pressroom_scheduler::NewSchedule;

mod app;
mod import;
mod serve;

use app::{SchedulerArgs, build_scheduler, open_store};

const DEFAULT_LOG_FILTER: &str = "pressroom=info,pressroom_scheduler=info,pressroom_publishers=info,pressroom_webhooks=info,pressroom_web=info,tower_http=info";

#[derive(Parser)]
#[command(name = "pressroom")]
#[command(about = "Scheduled publishing for CMS content", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "PRESSROOM_DB", default_value = "pressroom.db")]
    db: PathBuf,

    #[command(flatten)]
    scheduler: SchedulerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller and the HTTP control surface
    Serve {
        /// Address to bind
        #[arg(long, env = "PRESSROOM_HOST", default_value = "0.0.0.0")]
        host: String,

        /// HTTP port
        #[arg(long, env = "PRESSROOM_PORT", default_value = "8080")]
        port: u16,
    },

    /// Run one poll pass now
    CheckPending,

    /// Requeue a failed schedule
    Retry {
        schedule_id: String,
    },

    /// Publish a pending schedule immediately, ignoring its publish time
    PublishNow {
        schedule_id: String,
    },

    /// Cancel a pending schedule
    Cancel {
        schedule_id: String,
    },

    /// Print status counts and recent activity
    Health,

    /// Queue content for publishing to a destination
    Schedule {
        #[arg(long)]
        content_id: String,

        #[arg(long)]
        destination_id: String,

        /// RFC 3339 publish time (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        campaign_id: Option<String>,
    },

    /// Import contents, destinations and webhook subscriptions from a JSON file
    Import {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli.db)?;

    if let Commands::Import { file } = &cli.command {
        let summary = import::apply(&store, &import::read(file)?)?;
        return print_json(&summary);
    }

    if let Commands::Serve { host, port } = &cli.command {
        return serve::run(store, &cli.scheduler, host, *port).await;
    }

    let scheduler = build_scheduler(store, &cli.scheduler);
    let coordinator = scheduler.coordinator();

    match cli.command {
        Commands::CheckPending => print_json(&scheduler.trigger_now().await.map_err(report)?),
        Commands::Retry { schedule_id } => {
            print_json(&coordinator.retry(&schedule_id).await.map_err(report)?)
        }
        Commands::PublishNow { schedule_id } => {
            print_json(&coordinator.publish_now(&schedule_id).await.map_err(report)?)
        }
        Commands::Cancel { schedule_id } => {
            print_json(&coordinator.cancel(&schedule_id).await.map_err(report)?)
        }
        Commands::Health => print_json(&scheduler.health().await.map_err(report)?),
        Commands::Schedule {
            content_id,
            destination_id,
            at,
            campaign_id,
        } => {
            let mut new = NewSchedule::at(content_id, destination_id, at.unwrap_or_else(Utc::now));
            if let Some(campaign_id) = campaign_id {
                new = new.with_campaign(campaign_id);
            }
            print_json(&scheduler.enqueue(new).await.map_err(report)?)
        }
        Commands::Serve { .. } | Commands::Import { .. } => Ok(()),
    }
}

fn report(e: pressroom_scheduler::SchedulerError) -> miette::Report {
    miette::miette!("{}", e)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schedule_with_time() {
        let cli = Cli::try_parse_from([
            "pressroom",
            "schedule",
            "--content-id",
            "c1",
            "--destination-id",
            "d1",
            "--at",
            "2026-03-01T09:00:00Z",
        ])
        .unwrap();

        match cli.command {
            Commands::Schedule { at, campaign_id, .. } => {
                assert_eq!(at.unwrap().to_rfc3339(), "2026-03-01T09:00:00+00:00");
                assert!(campaign_id.is_none());
            }
            _ => panic!("expected schedule command"),
        }
    }

    #[test]
    fn scheduler_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "pressroom",
            "--max-attempts",
            "5",
            "--backoff-base",
            "0",
            "--db",
            "/tmp/x.db",
            "check-pending",
        ])
        .unwrap();

        let config = cli.scheduler.config();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff, pressroom_scheduler::BackoffPolicy::none());
        assert_eq!(cli.db, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn schedule_id_is_required() {
        assert!(Cli::try_parse_from(["pressroom", "retry"]).is_err());
    }
}
