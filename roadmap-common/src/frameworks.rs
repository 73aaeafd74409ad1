//! Framework registry
//!
//! Enumerates the known scoring frameworks and their parameter tables. Adding a
//! framework means adding a variant to [`FrameworkId`], an entry to
//! [`FrameworkId::ALL`] and its [`FrameworkDefinition`]. Table columns, header aliases
//! and output fields are all derived from these tables.

use crate::config::ScoringConfig;
use crate::scoring::{self, ScoreTriple};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Known scoring frameworks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FrameworkId {
    #[serde(rename = "RICE")]
    Rice,
    #[serde(rename = "WSJF")]
    Wsjf,
}

impl FrameworkId {
    /// Every known framework, in registry order
    pub const ALL: [FrameworkId; 2] = [FrameworkId::Rice, FrameworkId::Wsjf];

    /// Identifier as stored in `active_scoring_framework`
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkId::Rice => "RICE",
            FrameworkId::Wsjf => "WSJF",
        }
    }

    /// Prefix of every field owned by this framework
    pub fn prefix(&self) -> &'static str {
        match self {
            FrameworkId::Rice => "rice",
            FrameworkId::Wsjf => "wsjf",
        }
    }

    pub fn definition(&self) -> &'static FrameworkDefinition {
        match self {
            FrameworkId::Rice => &RICE,
            FrameworkId::Wsjf => &WSJF,
        }
    }

    /// Canonical field name for one of this framework's output scores
    pub fn output_field(&self, component: ScoreComponent) -> &'static str {
        match (self, component) {
            (FrameworkId::Rice, ScoreComponent::Value) => "rice_value_score",
            (FrameworkId::Rice, ScoreComponent::Effort) => "rice_effort_score",
            (FrameworkId::Rice, ScoreComponent::Overall) => "rice_overall_score",
            (FrameworkId::Wsjf, ScoreComponent::Value) => "wsjf_value_score",
            (FrameworkId::Wsjf, ScoreComponent::Effort) => "wsjf_effort_score",
            (FrameworkId::Wsjf, ScoreComponent::Overall) => "wsjf_overall_score",
        }
    }

    /// Whether `field` is one of this framework's input parameters
    pub fn owns_input(&self, field: &str) -> bool {
        self.definition().params.iter().any(|p| p.field == field)
    }
}

impl fmt::Display for FrameworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameworkId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        FrameworkId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownFramework(wanted.to_string()))
    }
}

/// One member of a score triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Value,
    Effort,
    Overall,
}

impl ScoreComponent {
    pub const ALL: [ScoreComponent; 3] = [
        ScoreComponent::Value,
        ScoreComponent::Effort,
        ScoreComponent::Overall,
    ];

    /// Column name of the active (mirrored) score
    pub fn active_field(&self) -> &'static str {
        match self {
            ScoreComponent::Value => "value_score",
            ScoreComponent::Effort => "effort_score",
            ScoreComponent::Overall => "overall_score",
        }
    }

    /// Header label used in the namespaced form (`RICE: Value Score`)
    pub fn label(&self) -> &'static str {
        match self {
            ScoreComponent::Value => "Value Score",
            ScoreComponent::Effort => "Effort Score",
            ScoreComponent::Overall => "Overall Score",
        }
    }
}

/// One named input parameter of a framework
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDef {
    /// Canonical, framework-prefixed field name
    pub field: &'static str,
    /// Human label used in the namespaced header form
    pub label: &'static str,
    /// Built-in default substituted when the initiative has no value
    pub default: Option<f64>,
}

/// How the value score is derived from the parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRule {
    Product(&'static [&'static str]),
    Sum(&'static [&'static str]),
}

/// How value and effort combine into the overall score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Combination {
    /// `value / effort`
    Ratio,
    /// `value_weight * value + effort_weight * effort`
    WeightedSum { value_weight: f64, effort_weight: f64 },
}

/// Complete arithmetic definition of one framework
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameworkDefinition {
    pub id: FrameworkId,
    pub params: &'static [ParamDef],
    pub value_rule: ValueRule,
    pub effort_param: &'static str,
    pub combination: Combination,
}

static RICE_PARAMS: [ParamDef; 4] = [
    ParamDef { field: "rice_reach", label: "Reach", default: None },
    ParamDef { field: "rice_impact", label: "Impact", default: Some(1.0) },
    ParamDef { field: "rice_confidence", label: "Confidence", default: Some(1.0) },
    ParamDef { field: "rice_effort", label: "Effort", default: None },
];

static WSJF_PARAMS: [ParamDef; 4] = [
    ParamDef { field: "wsjf_business_value", label: "Business Value", default: None },
    ParamDef { field: "wsjf_time_criticality", label: "Time Criticality", default: None },
    ParamDef { field: "wsjf_risk_reduction", label: "Risk Reduction", default: Some(1.0) },
    ParamDef { field: "wsjf_job_size", label: "Job Size", default: None },
];

/// RICE: value = reach * impact * confidence, overall = value / effort
static RICE: FrameworkDefinition = FrameworkDefinition {
    id: FrameworkId::Rice,
    params: &RICE_PARAMS,
    value_rule: ValueRule::Product(&["rice_reach", "rice_impact", "rice_confidence"]),
    effort_param: "rice_effort",
    combination: Combination::Ratio,
};

/// WSJF: value = cost of delay (business value + time criticality + risk reduction),
/// overall = cost of delay / job size
static WSJF: FrameworkDefinition = FrameworkDefinition {
    id: FrameworkId::Wsjf,
    params: &WSJF_PARAMS,
    value_rule: ValueRule::Sum(&[
        "wsjf_business_value",
        "wsjf_time_criticality",
        "wsjf_risk_reduction",
    ]),
    effort_param: "wsjf_job_size",
    combination: Combination::Ratio,
};

/// Framework-agnostic input with a documented default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedFieldDef {
    pub field: &'static str,
    pub label: &'static str,
    pub default: f64,
}

/// Shared inputs stored once per initiative
pub static SHARED_FIELDS: [SharedFieldDef; 1] = [SharedFieldDef {
    field: "priority_coefficient",
    label: "Priority Coefficient",
    default: 1.0,
}];

/// Routes (framework, inputs) pairs to the scoring engine with the effective defaults
#[derive(Debug, Clone)]
pub struct FrameworkRegistry {
    defaults: BTreeMap<FrameworkId, BTreeMap<String, f64>>,
    min_effort: f64,
}

impl FrameworkRegistry {
    /// Build the registry from scoring configuration
    ///
    /// Configured defaults override built-in ones. Defaults naming an unknown framework or
    /// a parameter the framework does not own are configuration errors.
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        if !(config.min_effort.is_finite() && config.min_effort > 0.0) {
            return Err(Error::Config(format!(
                "min_effort must be a positive number (got {})",
                config.min_effort
            )));
        }

        let mut defaults: BTreeMap<FrameworkId, BTreeMap<String, f64>> = FrameworkId::ALL
            .into_iter()
            .map(|id| {
                let builtin = id
                    .definition()
                    .params
                    .iter()
                    .filter_map(|p| p.default.map(|d| (p.field.to_string(), d)))
                    .collect();
                (id, builtin)
            })
            .collect();

        for (name, overrides) in &config.defaults {
            let id = FrameworkId::from_str(name)
                .map_err(|_| Error::Config(format!("defaults given for unknown framework {name}")))?;
            let table = defaults.entry(id).or_default();
            for (field, value) in overrides {
                if !id.owns_input(field) {
                    return Err(Error::Config(format!(
                        "{field} is not a parameter of framework {id}"
                    )));
                }
                if !value.is_finite() {
                    return Err(Error::Config(format!(
                        "default {field} for framework {id} must be finite (got {value})"
                    )));
                }
                table.insert(field.clone(), *value);
            }
        }

        Ok(Self {
            defaults,
            min_effort: config.min_effort,
        })
    }

    /// Known framework identifiers
    pub fn frameworks(&self) -> &'static [FrameworkId] {
        &FrameworkId::ALL
    }

    /// Effective defaults for one framework
    pub fn defaults_for(&self, id: FrameworkId) -> &BTreeMap<String, f64> {
        static EMPTY: BTreeMap<String, f64> = BTreeMap::new();
        self.defaults.get(&id).unwrap_or(&EMPTY)
    }

    pub fn min_effort(&self) -> f64 {
        self.min_effort
    }

    /// Compute one framework's score triple from an initiative's stored inputs
    pub fn compute_for(
        &self,
        id: FrameworkId,
        inputs: &BTreeMap<String, Option<f64>>,
    ) -> Result<ScoreTriple> {
        scoring::compute(id.definition(), inputs, self.defaults_for(id), self.min_effort)
    }

    /// As [`compute_for`](Self::compute_for), resolving the framework by name
    pub fn compute_named(
        &self,
        framework: &str,
        inputs: &BTreeMap<String, Option<f64>>,
    ) -> Result<ScoreTriple> {
        self.compute_for(framework.parse()?, inputs)
    }
}

/// Every per-framework input field, in registry order
pub fn input_fields() -> impl Iterator<Item = (FrameworkId, &'static ParamDef)> {
    FrameworkId::ALL
        .into_iter()
        .flat_map(|id| id.definition().params.iter().map(move |p| (id, p)))
}

/// Every per-framework output field, in registry order
pub fn output_fields() -> impl Iterator<Item = (FrameworkId, ScoreComponent, &'static str)> {
    FrameworkId::ALL.into_iter().flat_map(|id| {
        ScoreComponent::ALL
            .into_iter()
            .map(move |c| (id, c, id.output_field(c)))
    })
}
