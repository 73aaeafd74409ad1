//! Database models

use crate::frameworks::{FrameworkId, SHARED_FIELDS};
use crate::scoring::StoredScores;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One product initiative with every framework's inputs and scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    pub initiative_key: String,
    pub title: Option<String>,
    pub active_scoring_framework: FrameworkId,

    /// Stored selection text when it names no known framework; scoring still runs and
    /// the active columns keep their last mirrored values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_active_framework: Option<String>,

    /// Framework-agnostic inputs (`priority_coefficient`), keyed by field
    pub shared_inputs: BTreeMap<String, Option<f64>>,

    /// Framework-prefixed inputs, keyed by field; every registry field is present
    pub inputs: BTreeMap<String, Option<f64>>,

    /// Stored per-framework output triples
    pub framework_scores: BTreeMap<FrameworkId, StoredScores>,

    /// Mirror of the active framework's triple as of the last mirror
    pub active_scores: StoredScores,
}

impl Initiative {
    /// A fresh initiative with no inputs and no scores
    pub fn new(initiative_key: impl Into<String>) -> Self {
        Self {
            initiative_key: initiative_key.into(),
            title: None,
            active_scoring_framework: FrameworkId::Rice,
            unknown_active_framework: None,
            shared_inputs: SHARED_FIELDS
                .iter()
                .map(|s| (s.field.to_string(), None))
                .collect(),
            inputs: crate::frameworks::input_fields()
                .map(|(_, p)| (p.field.to_string(), None))
                .collect(),
            framework_scores: FrameworkId::ALL
                .into_iter()
                .map(|id| (id, StoredScores::default()))
                .collect(),
            active_scores: StoredScores::default(),
        }
    }

    /// Stored value of any input field, shared or framework-prefixed
    pub fn input(&self, field: &str) -> Option<f64> {
        self.inputs
            .get(field)
            .or_else(|| self.shared_inputs.get(field))
            .copied()
            .flatten()
    }

    pub fn scores(&self, id: FrameworkId) -> StoredScores {
        self.framework_scores.get(&id).copied().unwrap_or_default()
    }

    /// `UnknownFramework` when the stored selection could not be recognized
    pub fn selection_error(&self) -> Option<Error> {
        self.unknown_active_framework
            .as_ref()
            .map(|raw| Error::UnknownFramework(raw.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameworks::ScoreComponent;

    #[test]
    fn test_new_initiative_lists_every_field_as_absent() {
        let initiative = Initiative::new("INIT-001");
        assert_eq!(initiative.inputs.len(), 8);
        assert!(initiative.inputs.values().all(|v| v.is_none()));
        assert_eq!(initiative.input("priority_coefficient"), None);
        assert!(initiative.scores(FrameworkId::Wsjf).is_empty());
        assert_eq!(initiative.active_scoring_framework, FrameworkId::Rice);
    }

    #[test]
    fn test_unknown_selection_is_reported_as_error() {
        let mut initiative = Initiative::new("INIT-005");
        assert!(initiative.selection_error().is_none());

        initiative.unknown_active_framework = Some("ICE".to_string());
        assert!(matches!(
            initiative.selection_error(),
            Some(Error::UnknownFramework(raw)) if raw == "ICE"
        ));
    }

    #[test]
    fn test_input_reads_shared_and_framework_fields() {
        let mut initiative = Initiative::new("INIT-001");
        initiative
            .inputs
            .insert("rice_reach".to_string(), Some(1000.0));
        initiative
            .shared_inputs
            .insert("priority_coefficient".to_string(), Some(1.5));

        assert_eq!(initiative.input("rice_reach"), Some(1000.0));
        assert_eq!(initiative.input("priority_coefficient"), Some(1.5));
        assert_eq!(initiative.input("wsjf_job_size"), None);
        assert_eq!(
            initiative.scores(FrameworkId::Rice).get(ScoreComponent::Value),
            None
        );
    }
}
