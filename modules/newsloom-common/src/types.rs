use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NewsloomError;

// --- Enums ---

/// Relationship strength class assigned to a similarity edge.
///
/// Variant order is processing order: near-duplicate edges are applied
/// before continuations, continuations before related edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    NearDuplicate,
    Continuation,
    Related,
}

impl Tier {
    /// Numeric rank, 1 = strongest evidence.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::NearDuplicate => 1,
            Tier::Continuation => 2,
            Tier::Related => 3,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::NearDuplicate => write!(f, "near_duplicate"),
            Tier::Continuation => write!(f, "continuation"),
            Tier::Related => write!(f, "related"),
        }
    }
}

impl FromStr for Tier {
    type Err = NewsloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near_duplicate" => Ok(Tier::NearDuplicate),
            "continuation" => Ok(Tier::Continuation),
            "related" => Ok(Tier::Related),
            other => Err(NewsloomError::Validation(format!("unknown tier: {other}"))),
        }
    }
}

/// Lifecycle state of a storyline, recomputed on every scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorylineStatus {
    Active,
    Dormant,
    Concluded,
}

impl std::fmt::Display for StorylineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorylineStatus::Active => write!(f, "active"),
            StorylineStatus::Dormant => write!(f, "dormant"),
            StorylineStatus::Concluded => write!(f, "concluded"),
        }
    }
}

impl FromStr for StorylineStatus {
    type Err = NewsloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StorylineStatus::Active),
            "dormant" => Ok(StorylineStatus::Dormant),
            "concluded" => Ok(StorylineStatus::Concluded),
            other => Err(NewsloomError::Validation(format!(
                "unknown storyline status: {other}"
            ))),
        }
    }
}

/// Kind of anomaly an alert reports.
///
/// `Divergence` is reserved: the kind is part of the taxonomy but no
/// detection check emits it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TopicSurge,
    StoryReactivation,
    NewActor,
    Divergence,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::TopicSurge => write!(f, "topic_surge"),
            AlertKind::StoryReactivation => write!(f, "story_reactivation"),
            AlertKind::NewActor => write!(f, "new_actor"),
            AlertKind::Divergence => write!(f, "divergence"),
        }
    }
}

impl FromStr for AlertKind {
    type Err = NewsloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topic_surge" => Ok(AlertKind::TopicSurge),
            "story_reactivation" => Ok(AlertKind::StoryReactivation),
            "new_actor" => Ok(AlertKind::NewActor),
            "divergence" => Ok(AlertKind::Divergence),
            other => Err(NewsloomError::Validation(format!(
                "unknown alert kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = NewsloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(NewsloomError::Validation(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

/// Entity type as produced by the upstream extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Person,
    Org,
    Gpe,
    Loc,
    Other,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Person => write!(f, "PERSON"),
            EntityKind::Org => write!(f, "ORG"),
            EntityKind::Gpe => write!(f, "GPE"),
            EntityKind::Loc => write!(f, "LOC"),
            EntityKind::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = NewsloomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSON" => Ok(EntityKind::Person),
            "ORG" => Ok(EntityKind::Org),
            "GPE" => Ok(EntityKind::Gpe),
            "LOC" => Ok(EntityKind::Loc),
            "OTHER" => Ok(EntityKind::Other),
            other => Err(NewsloomError::Validation(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

// --- Records ---

/// Pairwise similarity between two articles, produced externally.
///
/// The pair is unordered; at most one edge exists per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub src_id: i64,
    pub dst_id: i64,
    pub cosine: f64,
    pub shared_entities: Vec<i64>,
}

/// A narrative thread of related articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyline {
    pub id: i64,
    pub label: String,
    pub status: StorylineStatus,
    pub momentum_score: f64,
    pub article_count: u32,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// An anomaly alert. Append-only apart from the acknowledged flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub kind: AlertKind,
    pub context: serde_json::Value,
    /// Canonical subject key (`cluster:<id>`, `storyline:<id>`,
    /// `entity:<id>`) used to suppress duplicates of an open alert.
    pub context_key: String,
    pub triggered_at: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
    pub acknowledged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_follows_evidence_strength() {
        assert!(Tier::NearDuplicate < Tier::Continuation);
        assert!(Tier::Continuation < Tier::Related);
        assert_eq!(Tier::NearDuplicate.rank(), 1);
        assert_eq!(Tier::Related.rank(), 3);
    }

    #[test]
    fn enums_round_trip_through_strings() {
        for tier in [Tier::NearDuplicate, Tier::Continuation, Tier::Related] {
            assert_eq!(tier.to_string().parse::<Tier>().unwrap(), tier);
        }
        for status in [
            StorylineStatus::Active,
            StorylineStatus::Dormant,
            StorylineStatus::Concluded,
        ] {
            assert_eq!(
                status.to_string().parse::<StorylineStatus>().unwrap(),
                status
            );
        }
        for kind in [
            AlertKind::TopicSurge,
            AlertKind::StoryReactivation,
            AlertKind::NewActor,
            AlertKind::Divergence,
        ] {
            assert_eq!(kind.to_string().parse::<AlertKind>().unwrap(), kind);
        }
        for severity in [Severity::Low, Severity::Medium, Severity::High] {
            assert_eq!(severity.to_string().parse::<Severity>().unwrap(), severity);
        }
        for kind in [
            EntityKind::Person,
            EntityKind::Org,
            EntityKind::Gpe,
            EntityKind::Loc,
            EntityKind::Other,
        ] {
            assert_eq!(kind.to_string().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_enum_strings_are_rejected() {
        assert!("tier9".parse::<Tier>().is_err());
        assert!("paused".parse::<StorylineStatus>().is_err());
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }
}
