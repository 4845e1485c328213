//! Momentum scoring and lifecycle status for storylines.
//!
//! Momentum is a recency-decayed sum over member article ages,
//! normalized by the storyline's duration in days. Status is a
//! deterministic function of (momentum, days since last member),
//! recomputed from scratch each cycle, so no transition history is kept.
//! Callers re-run the engine after every weave and on a recurring
//! schedule, since `now` advances independently of data changes.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use newsloom_common::StorylineStatus;

use crate::error::Result;
use crate::reader::StoreReader;
use crate::store::Store;
use crate::writer::StoreWriter;

/// Recency weight of a member article by age in days.
///
/// The 7-day boundary is inclusive: an article exactly a week old still
/// carries full weight. Future-dated members count as fresh.
pub fn recency_weight(age_days: i64) -> f64 {
    if age_days <= 7 {
        1.0
    } else if age_days <= 14 {
        0.5
    } else if age_days <= 30 {
        0.25
    } else {
        0.0
    }
}

/// Momentum of a storyline from its member dates.
///
/// The weight sum is normalized by duration in days; a single-day
/// storyline keeps the raw sum.
pub fn momentum_score(
    member_dates: &[NaiveDate],
    first_date: NaiveDate,
    last_date: NaiveDate,
    today: NaiveDate,
) -> f64 {
    let raw: f64 = member_dates
        .iter()
        .map(|d| recency_weight((today - *d).num_days()))
        .sum();
    let duration = (last_date - first_date).num_days();
    if duration > 0 {
        raw / duration as f64
    } else {
        raw
    }
}

/// Lifecycle status, evaluated in precedence order.
pub fn storyline_status(momentum: f64, days_since_last: i64) -> StorylineStatus {
    if momentum > 0.5 && days_since_last <= 7 {
        StorylineStatus::Active
    } else if momentum > 0.0 && days_since_last <= 14 {
        StorylineStatus::Active
    } else if days_since_last > 14 {
        StorylineStatus::Dormant
    } else {
        StorylineStatus::Concluded
    }
}

/// Stats from a momentum rescoring pass.
#[derive(Debug, Default)]
pub struct ScoreStats {
    pub scored: u32,
    pub active: u32,
    pub dormant: u32,
    pub concluded: u32,
}

impl std::fmt::Display for ScoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MomentumEngine: {} scored ({} active, {} dormant, {} concluded)",
            self.scored, self.active, self.dormant, self.concluded,
        )
    }
}

/// Recomputes momentum and status for every storyline. Each storyline is
/// written independently, so an aborted pass leaves previously committed
/// scores intact.
pub struct MomentumEngine {
    reader: StoreReader,
    writer: StoreWriter,
}

impl MomentumEngine {
    pub fn new(store: Store) -> Self {
        Self {
            reader: StoreReader::new(store.clone()),
            writer: StoreWriter::new(store),
        }
    }

    /// Rescore all storylines against a single captured `now`.
    pub async fn rescore(&self, now: DateTime<Utc>) -> Result<ScoreStats> {
        let today = now.date_naive();
        let storylines = self.reader.load_storyline_dates().await?;

        let mut stats = ScoreStats::default();
        for row in &storylines {
            let momentum =
                momentum_score(&row.member_dates, row.first_date, row.last_date, today);
            let days_since_last = (today - row.last_date).num_days();
            let status = storyline_status(momentum, days_since_last);

            self.writer
                .update_storyline_score(row.storyline_id, momentum, status)
                .await?;

            stats.scored += 1;
            match status {
                StorylineStatus::Active => stats.active += 1,
                StorylineStatus::Dormant => stats.dormant += 1,
                StorylineStatus::Concluded => stats.concluded += 1,
            }
        }

        info!(
            scored = stats.scored,
            active = stats.active,
            dormant = stats.dormant,
            concluded = stats.concluded,
            "Momentum rescoring complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn weight_boundary_at_seven_days_is_inclusive() {
        assert_eq!(recency_weight(7), 1.0);
        assert_eq!(recency_weight(8), 0.5);
    }

    #[test]
    fn weight_tiers_decay_with_age() {
        assert_eq!(recency_weight(0), 1.0);
        assert_eq!(recency_weight(14), 0.5);
        assert_eq!(recency_weight(15), 0.25);
        assert_eq!(recency_weight(30), 0.25);
        assert_eq!(recency_weight(31), 0.0);
        assert_eq!(recency_weight(365), 0.0);
    }

    #[test]
    fn future_dated_member_counts_as_fresh() {
        assert_eq!(recency_weight(-2), 1.0);
    }

    #[test]
    fn momentum_is_normalized_by_duration() {
        let today = date("2024-03-15");
        // Ages 10 and 0 days: weights 0.5 + 1.0 = 1.5, duration 10 days.
        let dates = [date("2024-03-05"), date("2024-03-15")];
        let m = momentum_score(&dates, dates[0], dates[1], today);
        assert!((m - 0.15).abs() < 1e-12);
    }

    #[test]
    fn single_day_storyline_keeps_raw_sum() {
        let today = date("2024-03-15");
        let dates = [date("2024-03-14"), date("2024-03-14")];
        let m = momentum_score(&dates, dates[0], dates[1], today);
        assert!((m - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stale_storyline_has_zero_momentum() {
        let today = date("2024-06-01");
        let dates = [date("2024-01-01"), date("2024-01-10")];
        let m = momentum_score(&dates, dates[0], dates[1], today);
        assert_eq!(m, 0.0);
    }

    #[test]
    fn status_precedence_matches_contract() {
        // Strong momentum, recent activity.
        assert_eq!(storyline_status(0.6, 5), StorylineStatus::Active);
        // Same momentum but three weeks quiet.
        assert_eq!(storyline_status(0.6, 20), StorylineStatus::Dormant);
        // No momentum at all.
        assert_eq!(storyline_status(0.0, 3), StorylineStatus::Concluded);
    }

    #[test]
    fn weak_momentum_within_two_weeks_is_still_active() {
        assert_eq!(storyline_status(0.1, 10), StorylineStatus::Active);
        assert_eq!(storyline_status(0.1, 14), StorylineStatus::Active);
    }

    #[test]
    fn quiet_past_two_weeks_is_dormant_regardless_of_momentum() {
        assert_eq!(storyline_status(0.0, 15), StorylineStatus::Dormant);
        assert_eq!(storyline_status(0.3, 15), StorylineStatus::Dormant);
    }

    #[test]
    fn weak_momentum_in_first_week_is_active_via_second_rule() {
        assert_eq!(storyline_status(0.2, 5), StorylineStatus::Active);
    }
}
