//! Narrative threading and monitoring engine.
//!
//! Consumes dated articles already enriched with pairwise similarity
//! scores and extracted entities, groups them into storylines via a
//! tiered union-find merge, tracks each storyline's activity with a
//! recency-decayed momentum score, and watches the evolving corpus for
//! surges, reactivations, and newly prominent actors.
//!
//! All passes are idempotent batch jobs over a SQLite store; a serving
//! layer only ever reads the committed storyline and alert state.

pub mod detector;
pub mod error;
pub mod momentum;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod tier;
pub mod weaver;
pub mod writer;

pub use detector::{AnomalyDetector, DetectionStats};
pub use error::{EngineError, Result};
pub use momentum::{MomentumEngine, ScoreStats};
pub use pipeline::{Pipeline, PipelineStats};
pub use reader::StoreReader;
pub use store::Store;
pub use weaver::{StorylineWeaver, WeaveStats};
pub use writer::StoreWriter;
