//! Pipeline: sequences the batch passes into a complete run.
//!
//! Order: weave (assign articles to storylines), rescore (momentum and
//! status), detect (anomaly alerts). Every pass is idempotent: re-running
//! against an unchanged corpus reproduces identical output, and each pass
//! commits per storyline or per alert, so an aborted run can always be
//! repaired by a fresh full rebuild.
//!
//! Configuration is validated once at construction; an engine with an
//! inverted threshold band refuses to start.

use chrono::{DateTime, Utc};
use tracing::info;

use newsloom_common::Config;

use crate::detector::{AnomalyDetector, DetectionStats};
use crate::error::Result;
use crate::momentum::{MomentumEngine, ScoreStats};
use crate::store::Store;
use crate::weaver::{StorylineWeaver, WeaveStats};

/// Stats from a full pipeline run.
#[derive(Debug)]
pub struct PipelineStats {
    pub weave: WeaveStats,
    pub score: ScoreStats,
    pub detection: DetectionStats,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Complete ===")?;
        writeln!(f, "{}", self.weave)?;
        writeln!(f, "{}", self.score)?;
        write!(f, "{}", self.detection)
    }
}

pub struct Pipeline {
    weaver: StorylineWeaver,
    momentum: MomentumEngine,
    detector: AnomalyDetector,
}

impl Pipeline {
    /// Build the pipeline, failing fast on invalid configuration.
    pub fn new(store: Store, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weaver: StorylineWeaver::new(store.clone(), config.tiers.clone()),
            momentum: MomentumEngine::new(store.clone()),
            detector: AnomalyDetector::new(store, config.monitor.clone()),
        })
    }

    /// Full rebuild: discard the partition, reweave, rescore, detect.
    pub async fn rebuild(&self, now: DateTime<Utc>) -> Result<PipelineStats> {
        info!("Pipeline: full rebuild starting");
        let weave = self.weaver.rebuild().await?;
        let score = self.momentum.rescore(now).await?;
        let detection = self.detector.run(now).await?;
        info!("Pipeline: full rebuild complete");
        Ok(PipelineStats {
            weave,
            score,
            detection,
        })
    }

    /// Incremental run: attach new articles, rescore, detect.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<PipelineStats> {
        info!("Pipeline: incremental refresh starting");
        let weave = self.weaver.run_incremental().await?;
        let score = self.momentum.rescore(now).await?;
        let detection = self.detector.run(now).await?;
        info!("Pipeline: incremental refresh complete");
        Ok(PipelineStats {
            weave,
            score,
            detection,
        })
    }

    /// Momentum-only pass for the recurring schedule: status decays as
    /// `now` advances even when no data changed.
    pub async fn rescore(&self, now: DateTime<Utc>) -> Result<ScoreStats> {
        self.momentum.rescore(now).await
    }

    /// Detection-only pass, also exposed as the manual
    /// "run detections now" operation.
    pub async fn detect(&self, now: DateTime<Utc>) -> Result<DetectionStats> {
        self.detector.run(now).await
    }
}
