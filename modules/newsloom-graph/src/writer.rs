//! Write side of the store.
//!
//! The weaver is the only writer of the article -> storyline assignment;
//! alerts are append-only apart from the acknowledged flag. Every
//! storyline commit is one transaction, so an aborted pass leaves no
//! partially written group behind.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use newsloom_common::{EntityKind, StorylineStatus};

use crate::detector::AlertDraft;
use crate::error::{EngineError, Result};
use crate::store::Store;
use crate::weaver::WovenGroup;

#[derive(Clone)]
pub struct StoreWriter {
    store: Store,
}

impl StoreWriter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // --- Upstream ingest surface ---

    pub async fn insert_article(
        &self,
        title: &str,
        date: NaiveDate,
        cluster_id: Option<i64>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO articles (title, date, cluster_id) VALUES (?, ?, ?)",
        )
        .bind(title)
        .bind(date)
        .bind(cluster_id)
        .execute(self.store.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record one similarity edge. Re-inserting the same pair replaces it,
    /// preserving the one-row-per-pair invariant.
    pub async fn insert_similarity(
        &self,
        src_id: i64,
        dst_id: i64,
        cosine: f64,
        shared_entities: &[i64],
    ) -> Result<()> {
        let shared = serde_json::to_string(shared_entities).unwrap_or_default();
        sqlx::query(
            "INSERT OR REPLACE INTO similarities (src_id, dst_id, cosine, shared_entities)
             VALUES (?, ?, ?, ?)",
        )
        .bind(src_id)
        .bind(dst_id)
        .bind(cosine)
        .bind(shared)
        .execute(self.store.pool())
        .await?;
        Ok(())
    }

    pub async fn insert_cluster(&self, label: &str, size: u32) -> Result<i64> {
        let result = sqlx::query("INSERT INTO clusters (label, size) VALUES (?, ?)")
            .bind(label)
            .bind(size as i64)
            .execute(self.store.pool())
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_entity(&self, name: &str, kind: EntityKind) -> Result<i64> {
        let result = sqlx::query("INSERT INTO entities (name, type) VALUES (?, ?)")
            .bind(name)
            .bind(kind.to_string())
            .execute(self.store.pool())
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_mention(
        &self,
        article_id: i64,
        entity_id: i64,
        weight: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO article_entities (article_id, entity_id, weight)
             VALUES (?, ?, ?)",
        )
        .bind(article_id)
        .bind(entity_id)
        .bind(weight)
        .execute(self.store.pool())
        .await?;
        Ok(())
    }

    // --- Storyline writes (weaver only) ---

    /// Drop the entire partition ahead of a full rebuild.
    pub async fn clear_assignments(&self) -> Result<()> {
        let mut tx = self.store.pool().begin().await?;
        sqlx::query("DELETE FROM storyline_articles")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM storylines").execute(&mut *tx).await?;
        sqlx::query("UPDATE articles SET storyline_id = NULL")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Commit one new storyline: row, memberships, and article
    /// back-references in a single transaction.
    pub async fn create_storyline(&self, group: &WovenGroup) -> Result<i64> {
        let mut tx = self.store.pool().begin().await?;

        let result = sqlx::query(
            "INSERT INTO storylines (label, status, momentum_score, first_date, last_date, article_count)
             VALUES (?, 'active', 0.0, ?, ?, ?)",
        )
        .bind(&group.label)
        .bind(group.first_date)
        .bind(group.last_date)
        .bind(group.members.len() as i64)
        .execute(&mut *tx)
        .await?;
        let storyline_id = result.last_insert_rowid();

        for member in &group.members {
            sqlx::query(
                "INSERT INTO storyline_articles (storyline_id, article_id, tier, sequence_order)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(storyline_id)
            .bind(member.article_id)
            .bind(member.tier.to_string())
            .bind(member.sequence_order as i64)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE articles SET storyline_id = ? WHERE id = ?")
                .bind(storyline_id)
                .bind(member.article_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(storyline_id)
    }

    /// Replace an existing storyline's membership with the grown group.
    /// Storylines only ever gain members; status and momentum are left
    /// for the next scoring pass.
    pub async fn grow_storyline(&self, storyline_id: i64, group: &WovenGroup) -> Result<()> {
        let mut tx = self.store.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE storylines
             SET label = ?, first_date = ?, last_date = ?, article_count = ?
             WHERE id = ?",
        )
        .bind(&group.label)
        .bind(group.first_date)
        .bind(group.last_date)
        .bind(group.members.len() as i64)
        .bind(storyline_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(EngineError::StorylineNotFound(storyline_id));
        }

        sqlx::query("DELETE FROM storyline_articles WHERE storyline_id = ?")
            .bind(storyline_id)
            .execute(&mut *tx)
            .await?;

        for member in &group.members {
            sqlx::query(
                "INSERT INTO storyline_articles (storyline_id, article_id, tier, sequence_order)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(storyline_id)
            .bind(member.article_id)
            .bind(member.tier.to_string())
            .bind(member.sequence_order as i64)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE articles SET storyline_id = ? WHERE id = ?")
                .bind(storyline_id)
                .bind(member.article_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Write one storyline's recomputed momentum and status.
    pub async fn update_storyline_score(
        &self,
        storyline_id: i64,
        momentum: f64,
        status: StorylineStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE storylines SET momentum_score = ?, status = ? WHERE id = ?")
            .bind(momentum)
            .bind(status.to_string())
            .bind(storyline_id)
            .execute(self.store.pool())
            .await?;
        Ok(())
    }

    // --- Alert writes (detector only) ---

    /// Insert an alert unless an open alert with the same kind and
    /// context key already exists. Returns the new id, or `None` when
    /// suppressed.
    pub async fn insert_alert(
        &self,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let open: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM alerts
             WHERE alert_type = ? AND context_key = ? AND acknowledged = 0
             LIMIT 1",
        )
        .bind(draft.kind.to_string())
        .bind(&draft.context_key)
        .fetch_optional(self.store.pool())
        .await?;

        if let Some((existing_id,)) = open {
            debug!(
                alert_id = existing_id,
                kind = %draft.kind,
                context_key = %draft.context_key,
                "Open alert already covers this condition, suppressing"
            );
            return Ok(None);
        }

        let result = sqlx::query(
            "INSERT INTO alerts
                 (alert_type, context_json, context_key, triggered_at,
                  description, severity, acknowledged)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(draft.kind.to_string())
        .bind(draft.context.to_string())
        .bind(&draft.context_key)
        .bind(now)
        .bind(&draft.description)
        .bind(draft.severity.to_string())
        .execute(self.store.pool())
        .await?;

        Ok(Some(result.last_insert_rowid()))
    }

    /// Set the acknowledged flag. Returns true when newly acknowledged,
    /// false when the alert was already acknowledged.
    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT acknowledged FROM alerts WHERE id = ?")
                .bind(alert_id)
                .fetch_optional(self.store.pool())
                .await?;

        let already = match row {
            None => return Err(EngineError::AlertNotFound(alert_id)),
            Some((acknowledged,)) => acknowledged,
        };
        if already {
            return Ok(false);
        }

        sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?")
            .bind(alert_id)
            .execute(self.store.pool())
            .await?;
        Ok(true)
    }
}
