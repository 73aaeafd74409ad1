//! Column resolver
//!
//! Maps a raw header cell to a canonical field through one explicit alias table. Each
//! canonical field accepts its snake-case name and a namespaced `Namespace: Label` form;
//! matching trims whitespace and ignores case, nothing else. New spellings are added to
//! the table, never guessed.

use once_cell::sync::Lazy;
use roadmap_common::frameworks::{self, SHARED_FIELDS};
use roadmap_common::{Error, FrameworkId, Result, ScoreComponent};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Canonical name of the identifier column
pub const INITIATIVE_KEY: &str = "initiative_key";

/// Canonical name of the active framework selection column
pub const ACTIVE_FRAMEWORK: &str = "active_scoring_framework";

/// What a canonical field holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Identifier,
    ActiveFramework,
    /// Framework-agnostic input; a blank cell resolves to `default`
    Shared { default: f64 },
    Input(FrameworkId),
    Output(FrameworkId, ScoreComponent),
}

impl FieldKind {
    /// Whether cells of this field are read as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Shared { .. } | FieldKind::Input(_) | FieldKind::Output(..)
        )
    }
}

/// One canonical field with every accepted header spelling
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub aliases: Vec<String>,
}

static FIELD_TABLE: Lazy<Vec<FieldSpec>> = Lazy::new(build_field_table);

static ALIAS_INDEX: Lazy<HashMap<String, usize>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (position, spec) in FIELD_TABLE.iter().enumerate() {
        for alias in &spec.aliases {
            index.insert(normalize(alias), position);
        }
    }
    index
});

fn build_field_table() -> Vec<FieldSpec> {
    let mut table = vec![
        FieldSpec {
            name: INITIATIVE_KEY,
            kind: FieldKind::Identifier,
            aliases: vec![
                INITIATIVE_KEY.to_string(),
                "Initiative Key".to_string(),
                "Key".to_string(),
            ],
        },
        FieldSpec {
            name: ACTIVE_FRAMEWORK,
            kind: FieldKind::ActiveFramework,
            aliases: vec![
                ACTIVE_FRAMEWORK.to_string(),
                "Active Framework".to_string(),
                "Scoring: Active Framework".to_string(),
            ],
        },
    ];

    table.extend(SHARED_FIELDS.iter().map(|shared| FieldSpec {
        name: shared.field,
        kind: FieldKind::Shared {
            default: shared.default,
        },
        aliases: vec![shared.field.to_string(), shared.label.to_string()],
    }));

    table.extend(frameworks::input_fields().map(|(id, param)| FieldSpec {
        name: param.field,
        kind: FieldKind::Input(id),
        aliases: vec![
            param.field.to_string(),
            format!("{}: {}", id.as_str(), param.label),
        ],
    }));

    table.extend(frameworks::output_fields().map(|(id, component, field)| FieldSpec {
        name: field,
        kind: FieldKind::Output(id, component),
        aliases: vec![
            field.to_string(),
            format!("{}: {}", id.as_str(), component.label()),
        ],
    }));

    table
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Every canonical field
pub fn field_table() -> &'static [FieldSpec] {
    &FIELD_TABLE
}

/// Canonical field by name
pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|spec| spec.name == name)
}

/// Resolve a raw header to its canonical field
pub fn resolve(raw_header: &str) -> Option<&'static FieldSpec> {
    ALIAS_INDEX
        .get(&normalize(raw_header))
        .map(|&position| &FIELD_TABLE[position])
}

/// Field → column index lookup built from one header row
///
/// Built fresh for every pass; headers can change between runs.
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    columns: BTreeMap<&'static str, usize>,
    unresolved: Vec<(usize, String)>,
}

impl HeaderMapping {
    /// Resolve a header row
    ///
    /// Blank header cells are ignored. Unrecognized headers are kept as unresolved and
    /// logged. Two headers resolving to the same field is a configuration error.
    pub fn from_header(header: &[String]) -> Result<Self> {
        let mut mapping = HeaderMapping::default();

        for (column, raw) in header.iter().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            match resolve(raw) {
                Some(spec) => {
                    if let Some(previous) = mapping.columns.insert(spec.name, column) {
                        return Err(Error::Config(format!(
                            "columns {} and {} both resolve to {}",
                            previous + 1,
                            column + 1,
                            spec.name
                        )));
                    }
                }
                None => {
                    let raw = raw.trim().to_string();
                    warn!("{}; column {} ignored", Error::UnresolvedColumn(raw.clone()), column + 1);
                    mapping.unresolved.push((column, raw));
                }
            }
        }

        Ok(mapping)
    }

    pub fn column(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Column of a mandatory field; absence is a configuration error
    pub fn require(&self, field: &str) -> Result<usize> {
        self.column(field)
            .ok_or_else(|| Error::Config(format!("required column {} not found in header", field)))
    }

    /// Resolved fields with their column index, in canonical name order
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, usize)> + '_ {
        self.columns
            .iter()
            .filter_map(|(name, column)| field(name).map(|spec| (spec, *column)))
    }

    /// Headers that matched no canonical field, with their column index
    pub fn unresolved(&self) -> &[(usize, String)] {
        &self.unresolved
    }
}
