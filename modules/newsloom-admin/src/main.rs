//! Admin CLI for the narrative threading engine: runs migrations and the
//! batch passes, and queries committed storyline and alert state.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use newsloom_common::{AlertKind, Config, Severity, StorylineStatus};
use newsloom_graph::reader::{AlertFilter, StorylineFilter};
use newsloom_graph::{Pipeline, Store, StoreReader, StoreWriter};

#[derive(Parser)]
#[command(name = "admin", about = "Newsloom narrative threading admin")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply schema migrations and exit.
    Migrate,
    /// Full rebuild: reweave all storylines, rescore, run detections.
    Rebuild,
    /// Incremental pass: attach new articles, rescore, run detections.
    Refresh,
    /// Recompute momentum and status only.
    Rescore,
    /// Run the anomaly detections now.
    Detect,
    /// List storylines, momentum-ordered.
    Storylines {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        min_momentum: Option<f64>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show one storyline with its ordered members.
    Storyline { id: i64 },
    /// List alerts, newest first.
    Alerts {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Acknowledge an alert.
    Ack { id: i64 },
    /// Aggregated storyline and alert statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    tracing::info!(database = %config.database_url, "Opening store");
    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    store.migrate().await?;

    let now = Utc::now();

    match cli.command {
        Command::Migrate => {
            println!("Migrations applied");
        }
        Command::Rebuild => {
            let pipeline = Pipeline::new(store, &config)?;
            let stats = pipeline.rebuild(now).await?;
            println!("{stats}");
        }
        Command::Refresh => {
            let pipeline = Pipeline::new(store, &config)?;
            let stats = pipeline.refresh(now).await?;
            println!("{stats}");
        }
        Command::Rescore => {
            let pipeline = Pipeline::new(store, &config)?;
            let stats = pipeline.rescore(now).await?;
            println!("{stats}");
        }
        Command::Detect => {
            let pipeline = Pipeline::new(store, &config)?;
            let stats = pipeline.detect(now).await?;
            println!("{stats}");
        }
        Command::Storylines {
            status,
            min_momentum,
            limit,
        } => {
            let filter = StorylineFilter {
                status: parse_opt::<StorylineStatus>(status, "status")?,
                min_momentum,
                limit: Some(limit),
                ..StorylineFilter::default()
            };
            let reader = StoreReader::new(store);
            for s in reader.list_storylines(&filter).await? {
                println!(
                    "#{:<5} {:<9} momentum {:>7.3}  {:>3} articles  {} .. {}  {}",
                    s.id, s.status, s.momentum_score, s.article_count, s.first_date, s.last_date,
                    s.label,
                );
            }
        }
        Command::Storyline { id } => {
            let reader = StoreReader::new(store);
            let detail = reader.storyline_detail(id).await?;
            let s = &detail.storyline;
            println!(
                "#{} {} [{}] momentum {:.3}, {} articles, {} .. {}",
                s.id, s.label, s.status, s.momentum_score, s.article_count, s.first_date,
                s.last_date,
            );
            for m in &detail.members {
                println!(
                    "  {:>3}. [{}] {} ({}) article #{}",
                    m.sequence_order, m.tier, m.title, m.date, m.article_id,
                );
            }
        }
        Command::Alerts {
            kind,
            severity,
            limit,
        } => {
            let filter = AlertFilter {
                kind: parse_opt::<AlertKind>(kind, "kind")?,
                severity: parse_opt::<Severity>(severity, "severity")?,
                limit: Some(limit),
                ..AlertFilter::default()
            };
            let reader = StoreReader::new(store);
            for a in reader.list_alerts(&filter).await? {
                let ack = if a.acknowledged { " (ack)" } else { "" };
                println!(
                    "#{:<5} {:<18} {:<6} {}  {}{}",
                    a.id, a.kind, a.severity, a.triggered_at, a.description, ack,
                );
            }
        }
        Command::Ack { id } => {
            let writer = StoreWriter::new(store);
            if writer.acknowledge_alert(id).await? {
                println!("Alert {id} acknowledged");
            } else {
                println!("Alert {id} was already acknowledged");
            }
        }
        Command::Stats => {
            let reader = StoreReader::new(store);
            println!("{}", reader.stats().await?);
        }
    }

    Ok(())
}

fn parse_opt<T>(value: Option<String>, what: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| v.parse::<T>())
        .transpose()
        .with_context(|| format!("invalid {what}"))
}
