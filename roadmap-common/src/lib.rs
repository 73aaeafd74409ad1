//! # Roadmap Common Library
//!
//! Shared code for the roadmap scoring and sync engine:
//! - Error taxonomy
//! - Configuration loading
//! - Framework registry and scoring engine
//! - Provenance tokens
//! - Database initialization, schema definitions and the initiative model

pub mod config;
pub mod db;
pub mod error;
pub mod frameworks;
pub mod provenance;
pub mod scoring;

pub use error::{Error, Result};
pub use frameworks::{FrameworkId, FrameworkRegistry, ScoreComponent};
pub use provenance::ProvenanceToken;
pub use scoring::{ScoreTriple, StoredScores};
