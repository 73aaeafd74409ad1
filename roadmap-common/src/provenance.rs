//! Provenance tokens
//!
//! Each pass reports, per initiative it touched, which operation touched it last.
//! Storage and display of the tokens belong to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceToken {
    /// Inputs synced from the tabular surface
    SheetInputsSynced,
    /// Per-framework scores recomputed
    ScoresComputed,
    /// Active framework selection changed and mirrored
    ActiveFrameworkSet,
    /// Scores written back to the tabular surface
    ScoresWrittenToSheet,
}

impl ProvenanceToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceToken::SheetInputsSynced => "sheet_inputs_synced",
            ProvenanceToken::ScoresComputed => "scores_computed",
            ProvenanceToken::ActiveFrameworkSet => "active_framework_set",
            ProvenanceToken::ScoresWrittenToSheet => "scores_written_to_sheet",
        }
    }
}

impl fmt::Display for ProvenanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
