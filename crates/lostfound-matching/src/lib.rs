//! Matching engine for lost and found reports.
//!
//! A new report is turned into a [`FeatureVector`], scored against every open
//! or matched report of the opposing kind, and each pair that clears the threshold is
//! recorded once in the [`NotificationLedger`].

pub mod config;
pub mod embedding;
pub mod error;
pub mod evaluator;
pub mod features;
pub mod scorer;
pub mod store;
pub mod sweep;

pub use config::{MatchConfig, SignalWeights};
pub use embedding::{EmbeddingProvider, HashingEmbedder, HttpEmbedder};
pub use error::MatchError;
pub use evaluator::{Evaluator, MatchCandidate, SweepSummary};
pub use features::{FeatureExtractor, FeatureVector};
pub use scorer::{Scorer, Similarity};
pub use store::{ItemStore, NotificationLedger, RecordOutcome, StatusUpdate};
