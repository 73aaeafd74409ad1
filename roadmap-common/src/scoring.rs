//! Scoring engine
//!
//! Pure, deterministic computation of a value/effort/overall triple for one framework.

use crate::frameworks::{Combination, FrameworkDefinition, ScoreComponent, ValueRule};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Freshly computed scores for one framework
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTriple {
    pub value: f64,
    pub effort: f64,
    pub overall: f64,
}

impl ScoreTriple {
    pub fn get(&self, component: ScoreComponent) -> f64 {
        match component {
            ScoreComponent::Value => self.value,
            ScoreComponent::Effort => self.effort,
            ScoreComponent::Overall => self.overall,
        }
    }
}

/// Stored scores: nullable until computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredScores {
    pub value: Option<f64>,
    pub effort: Option<f64>,
    pub overall: Option<f64>,
}

impl StoredScores {
    pub fn get(&self, component: ScoreComponent) -> Option<f64> {
        match component {
            ScoreComponent::Value => self.value,
            ScoreComponent::Effort => self.effort,
            ScoreComponent::Overall => self.overall,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.effort.is_none() && self.overall.is_none()
    }
}

impl From<ScoreTriple> for StoredScores {
    fn from(triple: ScoreTriple) -> Self {
        Self {
            value: Some(triple.value),
            effort: Some(triple.effort),
            overall: Some(triple.overall),
        }
    }
}

/// Compute a score triple
///
/// Each parameter uses the initiative's value when present, else `defaults[field]`.
/// A parameter with neither fails with `MissingParameter`. Effort is floored at
/// `min_effort` before any division.
pub fn compute(
    definition: &FrameworkDefinition,
    inputs: &BTreeMap<String, Option<f64>>,
    defaults: &BTreeMap<String, f64>,
    min_effort: f64,
) -> Result<ScoreTriple> {
    let param = |field: &str| -> Result<f64> {
        inputs
            .get(field)
            .copied()
            .flatten()
            .or_else(|| defaults.get(field).copied())
            .ok_or_else(|| Error::MissingParameter {
                framework: definition.id.as_str().to_string(),
                parameter: field.to_string(),
            })
    };

    let value = match definition.value_rule {
        ValueRule::Product(fields) => fields
            .iter()
            .try_fold(1.0, |acc, field| param(*field).map(|v| acc * v))?,
        ValueRule::Sum(fields) => fields
            .iter()
            .try_fold(0.0, |acc, field| param(*field).map(|v| acc + v))?,
    };
    let effort = param(definition.effort_param)?.max(min_effort);

    let overall = match definition.combination {
        Combination::Ratio => value / effort,
        Combination::WeightedSum {
            value_weight,
            effort_weight,
        } => value_weight * value + effort_weight * effort,
    };

    Ok(ScoreTriple {
        value,
        effort,
        overall,
    })
}
