use std::env;

use serde::{Deserialize, Serialize};

use crate::error::NewsloomError;

/// Thresholds and windows for classifying similarity edges into tiers.
///
/// Bands are half-open on similarity: an edge at exactly `tier2_max_sim`
/// belongs to tier 1 territory, not tier 2. Date windows are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub tier1_min_sim: f64,
    pub tier1_max_days: i64,
    pub tier2_min_sim: f64,
    pub tier2_max_sim: f64,
    pub tier2_max_days: i64,
    pub tier3_min_sim: f64,
    pub tier3_max_sim: f64,
    pub tier3_min_shared_entities: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier1_min_sim: 0.85,
            tier1_max_days: 3,
            tier2_min_sim: 0.65,
            tier2_max_sim: 0.85,
            tier2_max_days: 7,
            tier3_min_sim: 0.50,
            tier3_max_sim: 0.65,
            tier3_min_shared_entities: 2,
        }
    }
}

impl TierConfig {
    /// Reject inverted or empty threshold bands before any pass runs.
    pub fn validate(&self) -> Result<(), NewsloomError> {
        let sims = [
            ("tier1_min_sim", self.tier1_min_sim),
            ("tier2_min_sim", self.tier2_min_sim),
            ("tier2_max_sim", self.tier2_max_sim),
            ("tier3_min_sim", self.tier3_min_sim),
            ("tier3_max_sim", self.tier3_max_sim),
        ];
        for (name, value) in sims {
            if !(0.0..=1.0).contains(&value) {
                return Err(NewsloomError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.tier2_min_sim >= self.tier2_max_sim {
            return Err(NewsloomError::Config(format!(
                "tier2 similarity band is empty: {} >= {}",
                self.tier2_min_sim, self.tier2_max_sim
            )));
        }
        if self.tier3_min_sim >= self.tier3_max_sim {
            return Err(NewsloomError::Config(format!(
                "tier3 similarity band is empty: {} >= {}",
                self.tier3_min_sim, self.tier3_max_sim
            )));
        }
        if self.tier3_max_sim > self.tier2_min_sim {
            return Err(NewsloomError::Config(format!(
                "tier3 band overlaps tier2: {} > {}",
                self.tier3_max_sim, self.tier2_min_sim
            )));
        }
        if self.tier2_max_sim > self.tier1_min_sim {
            return Err(NewsloomError::Config(format!(
                "tier2 band overlaps tier1: {} > {}",
                self.tier2_max_sim, self.tier1_min_sim
            )));
        }
        if self.tier1_max_days <= 0 || self.tier2_max_days <= 0 {
            return Err(NewsloomError::Config(
                "tier date windows must be positive".to_string(),
            ));
        }
        if self.tier3_min_shared_entities == 0 {
            return Err(NewsloomError::Config(
                "tier3_min_shared_entities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Thresholds for the anomaly detection checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Length of the trailing comparison window in days.
    pub window_days: i64,
    /// Week-over-week growth ratio that triggers a topic surge.
    pub surge_ratio: f64,
    /// Growth ratio at which a surge is escalated to high severity.
    pub surge_high_ratio: f64,
    /// Days of quiet before a storyline counts as reactivatable.
    pub reactivation_min_dormant_days: i64,
    /// Minimum distinct-article mentions in the trailing window for a
    /// new actor alert.
    pub new_actor_min_mentions: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            surge_ratio: 1.5,
            surge_high_ratio: 3.0,
            reactivation_min_dormant_days: 14,
            new_actor_min_mentions: 5,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), NewsloomError> {
        if self.window_days <= 0 {
            return Err(NewsloomError::Config(
                "window_days must be positive".to_string(),
            ));
        }
        if self.surge_ratio < 1.0 {
            return Err(NewsloomError::Config(format!(
                "surge_ratio must be at least 1.0, got {}",
                self.surge_ratio
            )));
        }
        if self.surge_high_ratio < self.surge_ratio {
            return Err(NewsloomError::Config(format!(
                "surge_high_ratio {} is below surge_ratio {}",
                self.surge_high_ratio, self.surge_ratio
            )));
        }
        if self.reactivation_min_dormant_days <= 0 {
            return Err(NewsloomError::Config(
                "reactivation_min_dormant_days must be positive".to_string(),
            ));
        }
        if self.new_actor_min_mentions == 0 {
            return Err(NewsloomError::Config(
                "new_actor_min_mentions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub tiers: TierConfig,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://newsloom.db?mode=rwc".to_string(),
            tiers: TierConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://newsloom.db?mode=rwc".to_string()),
            tiers: TierConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }

    /// Validate every section. Engines refuse to start on failure.
    pub fn validate(&self) -> Result<(), NewsloomError> {
        self.tiers.validate()?;
        self.monitor.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn inverted_tier2_band_is_rejected() {
        let cfg = TierConfig {
            tier2_min_sim: 0.85,
            tier2_max_sim: 0.65,
            ..TierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_similarity_is_rejected() {
        let cfg = TierConfig {
            tier1_min_sim: 1.2,
            ..TierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overlapping_bands_are_rejected() {
        let cfg = TierConfig {
            tier3_max_sim: 0.70,
            ..TierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_day_window_is_rejected() {
        let cfg = TierConfig {
            tier1_max_days: 0,
            ..TierConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn surge_ratio_below_one_is_rejected() {
        let cfg = MonitorConfig {
            surge_ratio: 0.8,
            ..MonitorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn high_ratio_below_trigger_ratio_is_rejected() {
        let cfg = MonitorConfig {
            surge_high_ratio: 1.2,
            ..MonitorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
