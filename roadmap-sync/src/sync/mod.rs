//! Sync and scoring passes

pub mod inputs;
pub mod outputs;
pub mod scoring;

pub use inputs::InputSync;
pub use outputs::{plan_score_writes, OutputSync, WritePlan};
pub use scoring::{ScoreOutcome, ScoringOrchestrator};
