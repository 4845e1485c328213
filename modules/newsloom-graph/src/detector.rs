//! Anomaly detection over the evolving corpus.
//!
//! Three independent checks, each a pure function over an immutable
//! window snapshot:
//! - **Topic surge**: trailing-window article volume per cluster vs the
//!   preceding window.
//! - **Story reactivation**: storylines quiet for more than two weeks
//!   that picked up new members in the trailing window.
//! - **New actor emergence**: entities prominent in the trailing window
//!   with zero prior history.
//!
//! One `now` is captured per run and shared by every check so that items
//! scanned at different instants see the same window boundaries. Inserts
//! pass through a suppression check: an open (unacknowledged) alert with
//! the same kind and context key blocks a duplicate, which makes a rerun
//! over unchanged data a no-op.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tracing::info;

use newsloom_common::{AlertKind, MonitorConfig, Severity};

use crate::error::Result;
use crate::reader::StoreReader;
use crate::store::Store;
use crate::writer::StoreWriter;

/// Article counts for one cluster across the two comparison windows.
#[derive(Debug, Clone)]
pub struct ClusterWindow {
    pub cluster_id: i64,
    pub recent: u32,
    pub previous: u32,
}

/// A storyline with member activity split around the recent window.
#[derive(Debug, Clone)]
pub struct DormantActivity {
    pub storyline_id: i64,
    pub label: String,
    /// Latest member date before the recent window, if any.
    pub prior_last_date: Option<NaiveDate>,
    /// Members whose dates fall inside the recent window.
    pub new_article_ids: Vec<i64>,
}

/// Distinct-article mention counts for one entity across the windows.
#[derive(Debug, Clone)]
pub struct EntityWindow {
    pub entity_id: i64,
    pub name: String,
    pub entity_type: String,
    pub recent_mentions: u32,
    pub prior_mentions: u32,
}

/// An alert about to be inserted, before id and timestamp assignment.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub kind: AlertKind,
    pub severity: Severity,
    pub context: serde_json::Value,
    pub context_key: String,
    pub description: String,
}

/// Week-over-week growth check per cluster.
pub fn check_topic_surges(windows: &[ClusterWindow], cfg: &MonitorConfig) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();
    for w in windows {
        if w.recent == 0 {
            continue;
        }
        let ratio = w.recent as f64 / w.previous.max(1) as f64;
        if ratio < cfg.surge_ratio {
            continue;
        }
        // A triggered surge is never low severity: the 1.5x detection
        // floor already sits above any meaningful low band.
        let severity = if ratio >= cfg.surge_high_ratio {
            Severity::High
        } else {
            Severity::Medium
        };
        drafts.push(AlertDraft {
            kind: AlertKind::TopicSurge,
            severity,
            context: json!({
                "cluster_id": w.cluster_id,
                "current_count": w.recent,
                "previous_count": w.previous,
                "ratio": ratio,
            }),
            context_key: format!("cluster:{}", w.cluster_id),
            description: format!(
                "Cluster {}: {} articles in the last {} days vs {} in the previous window ({:.1}x growth)",
                w.cluster_id, w.recent, cfg.window_days, w.previous, ratio
            ),
        });
    }
    drafts
}

/// Dormant storylines with fresh members in the recent window.
///
/// Dormancy is computed from member dates prior to the window rather than
/// the stored status or `last_date`: by the time detection runs, the
/// weaver has already attached the new member and advanced both.
pub fn check_reactivations(
    storylines: &[DormantActivity],
    cfg: &MonitorConfig,
    today: NaiveDate,
) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();
    for s in storylines {
        if s.new_article_ids.is_empty() {
            continue;
        }
        let Some(prior_last) = s.prior_last_date else {
            // Every member is recent: a young storyline, not a revival.
            continue;
        };
        let dormant_days = (today - prior_last).num_days();
        if dormant_days <= cfg.reactivation_min_dormant_days {
            continue;
        }
        drafts.push(AlertDraft {
            kind: AlertKind::StoryReactivation,
            severity: Severity::Medium,
            context: json!({
                "storyline_id": s.storyline_id,
                "label": s.label,
                "dormant_days": dormant_days,
                "new_article_ids": s.new_article_ids,
            }),
            context_key: format!("storyline:{}", s.storyline_id),
            description: format!(
                "Storyline '{}' (quiet for {} days) has {} new article(s)",
                s.label,
                dormant_days,
                s.new_article_ids.len()
            ),
        });
    }
    drafts
}

/// Entities prominent in the recent window with no prior history.
pub fn check_new_actors(entities: &[EntityWindow], cfg: &MonitorConfig) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();
    for e in entities {
        if e.prior_mentions > 0 || e.recent_mentions < cfg.new_actor_min_mentions {
            continue;
        }
        let severity = if e.recent_mentions > cfg.new_actor_min_mentions {
            Severity::Medium
        } else {
            Severity::Low
        };
        drafts.push(AlertDraft {
            kind: AlertKind::NewActor,
            severity,
            context: json!({
                "entity_id": e.entity_id,
                "name": e.name,
                "entity_type": e.entity_type,
                "mentions_7d": e.recent_mentions,
            }),
            context_key: format!("entity:{}", e.entity_id),
            description: format!(
                "New actor: {} ({}) appeared in {} article(s) this week",
                e.name, e.entity_type, e.recent_mentions
            ),
        });
    }
    drafts
}

/// Stats from a detection run.
#[derive(Debug, Default)]
pub struct DetectionStats {
    pub surges: u32,
    pub reactivations: u32,
    pub new_actors: u32,
    pub suppressed: u32,
}

impl DetectionStats {
    pub fn alerts_created(&self) -> u32 {
        self.surges + self.reactivations + self.new_actors
    }
}

impl std::fmt::Display for DetectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AnomalyDetector: {} alerts created ({} surges, {} reactivations, \
             {} new actors), {} suppressed",
            self.alerts_created(),
            self.surges,
            self.reactivations,
            self.new_actors,
            self.suppressed,
        )
    }
}

/// Runs the three checks against a consistent snapshot and persists the
/// surviving alerts.
pub struct AnomalyDetector {
    reader: StoreReader,
    writer: StoreWriter,
    cfg: MonitorConfig,
}

impl AnomalyDetector {
    pub fn new(store: Store, cfg: MonitorConfig) -> Self {
        Self {
            reader: StoreReader::new(store.clone()),
            writer: StoreWriter::new(store),
            cfg,
        }
    }

    /// Run all checks with window boundaries derived from one `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DetectionStats> {
        let today = now.date_naive();
        let window = self.cfg.window_days;

        let clusters = self.reader.cluster_window_counts(today, window).await?;
        let storylines = self.reader.storyline_window_activity(today, window).await?;
        let entities = self.reader.entity_window_counts(today, window).await?;

        let mut drafts = check_topic_surges(&clusters, &self.cfg);
        drafts.extend(check_reactivations(&storylines, &self.cfg, today));
        drafts.extend(check_new_actors(&entities, &self.cfg));

        let mut stats = DetectionStats::default();
        for draft in &drafts {
            match self.writer.insert_alert(draft, now).await? {
                Some(_) => match draft.kind {
                    AlertKind::TopicSurge => stats.surges += 1,
                    AlertKind::StoryReactivation => stats.reactivations += 1,
                    AlertKind::NewActor => stats.new_actors += 1,
                    AlertKind::Divergence => {}
                },
                None => stats.suppressed += 1,
            }
        }

        info!(
            created = stats.alerts_created(),
            surges = stats.surges,
            reactivations = stats.reactivations,
            new_actors = stats.new_actors,
            suppressed = stats.suppressed,
            "Detection run complete"
        );
        Ok(stats)
    }
}
