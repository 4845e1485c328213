//! Read side of the store: the query surface consumed by serving layers,
//! plus the snapshot loads that feed the batch passes.
//!
//! Readers never invoke the engine; they only see committed storyline and
//! alert state.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use newsloom_common::{
    Alert, AlertKind, Severity, SimilarityEdge, Storyline, StorylineStatus, Tier,
};

use crate::detector::{ClusterWindow, DormantActivity, EntityWindow};
use crate::error::{EngineError, Result};
use crate::store::Store;
use crate::weaver::ArticleRef;

/// Default page size for alert and storyline listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Hard cap on page size regardless of what the caller asks for.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Storyline listing filter. All fields are optional and combine with AND.
#[derive(Debug, Default, Clone)]
pub struct StorylineFilter {
    pub status: Option<StorylineStatus>,
    pub min_momentum: Option<f64>,
    /// Keep storylines still running at or after this date.
    pub active_from: Option<NaiveDate>,
    /// Keep storylines that started at or before this date.
    pub active_to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct AlertFilter {
    pub kind: Option<AlertKind>,
    pub severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// One member in a storyline detail view.
#[derive(Debug, Clone)]
pub struct StorylineMemberDetail {
    pub article_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub tier: Tier,
    pub sequence_order: u32,
}

#[derive(Debug, Clone)]
pub struct StorylineDetail {
    pub storyline: Storyline,
    pub members: Vec<StorylineMemberDetail>,
}

/// Aggregated corpus statistics.
#[derive(Debug, Default, Clone)]
pub struct EngineStats {
    pub active_storylines: u32,
    pub dormant_storylines: u32,
    pub concluded_storylines: u32,
    pub total_storylines: u32,
    pub total_alerts: u32,
    pub unacknowledged_alerts: u32,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} storylines ({} active, {} dormant, {} concluded), \
             {} alerts ({} unacknowledged)",
            self.total_storylines,
            self.active_storylines,
            self.dormant_storylines,
            self.concluded_storylines,
            self.total_alerts,
            self.unacknowledged_alerts,
        )
    }
}

/// Per-storyline member dates for the momentum pass.
#[derive(Debug, Clone)]
pub struct StorylineDates {
    pub storyline_id: i64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub member_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StorylineRow {
    id: i64,
    label: String,
    status: String,
    momentum_score: f64,
    article_count: i64,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl StorylineRow {
    fn into_storyline(self) -> Result<Storyline> {
        Ok(Storyline {
            id: self.id,
            label: self.label,
            status: self.status.parse::<StorylineStatus>()?,
            momentum_score: self.momentum_score,
            article_count: self.article_count as u32,
            first_date: self.first_date,
            last_date: self.last_date,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct AlertRow {
    id: i64,
    alert_type: String,
    context_json: String,
    context_key: String,
    triggered_at: DateTime<Utc>,
    description: String,
    severity: String,
    acknowledged: bool,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert> {
        Ok(Alert {
            id: self.id,
            kind: self.alert_type.parse::<AlertKind>()?,
            context: serde_json::from_str(&self.context_json)
                .unwrap_or(serde_json::Value::Null),
            context_key: self.context_key,
            triggered_at: self.triggered_at,
            description: self.description,
            severity: self.severity.parse::<Severity>()?,
            acknowledged: self.acknowledged,
        })
    }
}

#[derive(Clone)]
pub struct StoreReader {
    store: Store,
}

impl StoreReader {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // --- Query surface ---

    /// List storylines, ordered by momentum descending then recency
    /// descending.
    pub async fn list_storylines(&self, filter: &StorylineFilter) -> Result<Vec<Storyline>> {
        let status = filter.status.map(|s| s.to_string());
        let limit = page_limit(filter.limit);

        let rows = sqlx::query_as::<_, StorylineRow>(
            r#"
            SELECT id, label, status, momentum_score, article_count, first_date, last_date
            FROM storylines
            WHERE (? IS NULL OR status = ?)
              AND (? IS NULL OR momentum_score >= ?)
              AND (? IS NULL OR last_date >= ?)
              AND (? IS NULL OR first_date <= ?)
            ORDER BY momentum_score DESC, last_date DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(&status)
        .bind(&status)
        .bind(filter.min_momentum)
        .bind(filter.min_momentum)
        .bind(filter.active_from)
        .bind(filter.active_from)
        .bind(filter.active_to)
        .bind(filter.active_to)
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(StorylineRow::into_storyline).collect()
    }

    /// Storyline with its ordered member list.
    pub async fn storyline_detail(&self, id: i64) -> Result<StorylineDetail> {
        let row = sqlx::query_as::<_, StorylineRow>(
            r#"
            SELECT id, label, status, momentum_score, article_count, first_date, last_date
            FROM storylines
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.store.pool())
        .await?
        .ok_or(EngineError::StorylineNotFound(id))?;

        let members = sqlx::query_as::<_, (i64, String, NaiveDate, String, i64)>(
            r#"
            SELECT sa.article_id, a.title, a.date, sa.tier, sa.sequence_order
            FROM storyline_articles sa
            JOIN articles a ON a.id = sa.article_id
            WHERE sa.storyline_id = ?
            ORDER BY sa.sequence_order ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.store.pool())
        .await?;

        let members = members
            .into_iter()
            .map(|(article_id, title, date, tier, sequence_order)| {
                Ok(StorylineMemberDetail {
                    article_id,
                    title,
                    date,
                    tier: tier.parse::<Tier>()?,
                    sequence_order: sequence_order as u32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StorylineDetail {
            storyline: row.into_storyline()?,
            members,
        })
    }

    /// List alerts, newest first, bounded page size.
    pub async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let kind = filter.kind.map(|k| k.to_string());
        let severity = filter.severity.map(|s| s.to_string());
        let limit = page_limit(filter.limit);

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT id, alert_type, context_json, context_key, triggered_at,
                   description, severity, acknowledged
            FROM alerts
            WHERE (? IS NULL OR alert_type = ?)
              AND (? IS NULL OR severity = ?)
              AND (? IS NULL OR triggered_at >= ?)
            ORDER BY triggered_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(&kind)
        .bind(&kind)
        .bind(&severity)
        .bind(&severity)
        .bind(filter.since)
        .bind(filter.since)
        .bind(limit)
        .fetch_all(self.store.pool())
        .await?;

        rows.into_iter().map(AlertRow::into_alert).collect()
    }

    /// Storyline counts by status plus alert totals.
    pub async fn stats(&self) -> Result<EngineStats> {
        let (active, dormant, concluded, total): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'dormant' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'concluded' THEN 1 ELSE 0 END), 0),
                   COUNT(*)
            FROM storylines
            "#,
        )
        .fetch_one(self.store.pool())
        .await?;

        let (total_alerts, unacknowledged): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN acknowledged = 0 THEN 1 ELSE 0 END), 0)
            FROM alerts
            "#,
        )
        .fetch_one(self.store.pool())
        .await?;

        Ok(EngineStats {
            active_storylines: active as u32,
            dormant_storylines: dormant as u32,
            concluded_storylines: concluded as u32,
            total_storylines: total as u32,
            total_alerts: total_alerts as u32,
            unacknowledged_alerts: unacknowledged as u32,
        })
    }

    // --- Snapshot loads for the batch passes ---

    /// All articles with their current assignment, for the weaver.
    pub async fn load_article_refs(&self) -> Result<Vec<ArticleRef>> {
        let rows = sqlx::query_as::<_, (i64, String, NaiveDate, Option<i64>, Option<String>)>(
            r#"
            SELECT a.id, a.title, a.date, a.storyline_id, sa.tier
            FROM articles a
            LEFT JOIN storyline_articles sa
                   ON sa.article_id = a.id AND sa.storyline_id = a.storyline_id
            ORDER BY a.id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, date, storyline_id, tier)| ArticleRef {
                id,
                title,
                date,
                storyline_id,
                tier: tier.and_then(|t| t.parse::<Tier>().ok()),
            })
            .collect())
    }

    /// The full similarity edge set.
    pub async fn load_similarity_edges(&self) -> Result<Vec<SimilarityEdge>> {
        let rows = sqlx::query_as::<_, (i64, i64, f64, Option<String>)>(
            r#"
            SELECT src_id, dst_id, cosine, shared_entities
            FROM similarities
            ORDER BY src_id ASC, dst_id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(src_id, dst_id, cosine, shared)| SimilarityEdge {
                src_id,
                dst_id,
                cosine,
                shared_entities: shared
                    .and_then(|s| serde_json::from_str(&s).ok())
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Member dates per storyline, for the momentum pass.
    pub async fn load_storyline_dates(&self) -> Result<Vec<StorylineDates>> {
        let rows = sqlx::query_as::<_, (i64, NaiveDate, NaiveDate, NaiveDate)>(
            r#"
            SELECT s.id, s.first_date, s.last_date, a.date
            FROM storylines s
            JOIN storyline_articles sa ON sa.storyline_id = s.id
            JOIN articles a ON a.id = sa.article_id
            ORDER BY s.id ASC, a.date ASC, a.id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        let mut out: Vec<StorylineDates> = Vec::new();
        for (id, first_date, last_date, member_date) in rows {
            match out.last_mut() {
                Some(current) if current.storyline_id == id => {
                    current.member_dates.push(member_date);
                }
                _ => out.push(StorylineDates {
                    storyline_id: id,
                    first_date,
                    last_date,
                    member_dates: vec![member_date],
                }),
            }
        }
        Ok(out)
    }

    /// Per-cluster article counts for the two comparison windows.
    pub async fn cluster_window_counts(
        &self,
        today: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<ClusterWindow>> {
        let recent_start = today - Duration::days(window_days);
        let previous_start = today - Duration::days(window_days * 2);

        let rows = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT c.id,
                   COALESCE(SUM(CASE WHEN a.date >= ? THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN a.date >= ? AND a.date < ? THEN 1 ELSE 0 END), 0)
            FROM clusters c
            LEFT JOIN articles a ON a.cluster_id = c.id
            GROUP BY c.id
            ORDER BY c.id ASC
            "#,
        )
        .bind(recent_start)
        .bind(previous_start)
        .bind(recent_start)
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cluster_id, recent, previous)| ClusterWindow {
                cluster_id,
                recent: recent as u32,
                previous: previous as u32,
            })
            .collect())
    }

    /// Member activity per storyline, split around the recent window.
    pub async fn storyline_window_activity(
        &self,
        today: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<DormantActivity>> {
        let recent_start = today - Duration::days(window_days);

        let rows = sqlx::query_as::<_, (i64, String, i64, NaiveDate)>(
            r#"
            SELECT s.id, s.label, a.id, a.date
            FROM storylines s
            JOIN storyline_articles sa ON sa.storyline_id = s.id
            JOIN articles a ON a.id = sa.article_id
            ORDER BY s.id ASC, a.date ASC, a.id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await?;

        let mut out: Vec<DormantActivity> = Vec::new();
        for (storyline_id, label, article_id, date) in rows {
            if out.last().map(|s| s.storyline_id) != Some(storyline_id) {
                out.push(DormantActivity {
                    storyline_id,
                    label,
                    prior_last_date: None,
                    new_article_ids: Vec::new(),
                });
            }
            if let Some(current) = out.last_mut() {
                if date >= recent_start {
                    current.new_article_ids.push(article_id);
                } else {
                    // Rows arrive date-ascending, so the last one wins.
                    current.prior_last_date = Some(date);
                }
            }
        }
        Ok(out)
    }

    /// Distinct-article mention counts per entity across the windows.
    pub async fn entity_window_counts(
        &self,
        today: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<EntityWindow>> {
        let recent_start = today - Duration::days(window_days);

        let rows = sqlx::query_as::<_, (i64, String, String, i64, i64)>(
            r#"
            SELECT e.id, e.name, COALESCE(e.type, 'OTHER'),
                   COUNT(DISTINCT CASE WHEN a.date >= ? THEN a.id END),
                   COUNT(DISTINCT CASE WHEN a.date < ? THEN a.id END)
            FROM entities e
            JOIN article_entities ae ON ae.entity_id = e.id
            JOIN articles a ON a.id = ae.article_id
            GROUP BY e.id, e.name, e.type
            ORDER BY e.id ASC
            "#,
        )
        .bind(recent_start)
        .bind(recent_start)
        .fetch_all(self.store.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(entity_id, name, entity_type, recent, prior)| EntityWindow {
                    entity_id,
                    name,
                    entity_type,
                    recent_mentions: recent as u32,
                    prior_mentions: prior as u32,
                },
            )
            .collect())
    }
}

fn page_limit(requested: Option<u32>) -> i64 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_defaults_and_caps() {
        assert_eq!(page_limit(None), 50);
        assert_eq!(page_limit(Some(10)), 10);
        assert_eq!(page_limit(Some(9_999)), 500);
    }
}
