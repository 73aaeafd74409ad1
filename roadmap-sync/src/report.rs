//! Pass reports
//!
//! Every pass returns a [`RunReport`]: counts, per-record failures and the provenance of
//! what it changed. Failures are data, not errors; a report with failures is still a
//! completed pass.

use roadmap_common::{Error, FrameworkId, ProvenanceToken};
use serde::Serialize;
use std::fmt;

/// One record-level problem, located as precisely as the pass knows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Grid row index (header is row 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiative_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<FrameworkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub kind: &'static str,
    pub message: String,
}

impl RecordFailure {
    pub fn from_error(err: &Error) -> Self {
        let mut failure = Self {
            row: None,
            initiative_key: None,
            framework: None,
            field: None,
            kind: err.kind(),
            message: err.to_string(),
        };
        match err {
            Error::MissingIdentifier { row } => failure.row = Some(*row),
            Error::MissingParameter {
                framework,
                parameter,
            } => {
                failure.framework = framework.parse().ok();
                failure.field = Some(parameter.clone());
            }
            Error::InvalidValue { field, .. } => failure.field = Some(field.clone()),
            Error::NotFound(key) => failure.initiative_key = Some(key.clone()),
            _ => {}
        }
        failure
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn for_key(mut self, key: &str) -> Self {
        self.initiative_key = Some(key.to_string());
        self
    }

    pub fn for_framework(mut self, framework: FrameworkId) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn for_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(row) = self.row {
            write!(f, "row {}: ", row + 1)?;
        }
        if let Some(key) = &self.initiative_key {
            write!(f, "{}: ", key)?;
        }
        if let Some(framework) = self.framework {
            write!(f, "[{}] ", framework)?;
        }
        write!(f, "{}", self.message)
    }
}

/// What a pass did to one initiative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Touched {
    pub initiative_key: String,
    pub token: ProvenanceToken,
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub operation: &'static str,
    /// Records (rows or initiatives) the pass looked at
    pub processed: usize,
    /// Records the pass changed
    pub changed: usize,
    /// Cell writes applied (output sync only)
    pub cells_written: usize,
    pub checkpoints: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_columns: Vec<String>,
    pub failures: Vec<RecordFailure>,
    pub touched: Vec<Touched>,
}

impl RunReport {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, failure: RecordFailure) {
        self.failures.push(failure);
    }

    pub fn touch(&mut self, initiative_key: &str, token: ProvenanceToken) {
        self.touched.push(Touched {
            initiative_key: initiative_key.to_string(),
            token,
        });
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} processed, {} changed, {} cells written, {} failures, {} checkpoints",
            self.operation,
            self.processed,
            self.changed,
            self.cells_written,
            self.failures.len(),
            self.checkpoints
        )
    }
}
