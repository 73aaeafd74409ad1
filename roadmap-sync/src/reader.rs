//! Tabular reader
//!
//! Turns a [`Grid`] into per-row records keyed by canonical field. Column position never
//! matters; the header row is resolved once through the column resolver and every data
//! row is read through that mapping.

use crate::columns::{FieldKind, HeaderMapping, INITIATIVE_KEY};
use crate::transport::Grid;
use roadmap_common::{Error, Result};
use std::collections::BTreeMap;

/// Parsed content of one cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Blank cell
    Absent,
    Number(f64),
    Text(String),
}

/// One data row, fields keyed by canonical name
#[derive(Debug)]
pub struct ParsedRecord {
    /// Grid row index (header is row 0)
    pub row: usize,
    pub initiative_key: String,
    /// Resolved, well-formed cells; the identifier is not repeated here
    pub values: BTreeMap<&'static str, CellValue>,
    /// Cells that could not be read (`InvalidValue`); their fields are left out of `values`
    pub invalid: Vec<Error>,
}

/// Reads `Number`s out of sheet text
///
/// Accepts thousands separators (`1,000`) and a trailing percent sign (`80%` → 0.8).
/// Blank text is `Ok(None)`. Anything else that is not a finite number is an error.
pub(crate) fn parse_number(raw: &str) -> std::result::Result<Option<f64>, ()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (digits, divisor) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 100.0),
        None => (trimmed, 1.0),
    };
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value / divisor)),
        _ => Err(()),
    }
}

/// Header-resolved view over one grid
pub struct TabularReader<'g> {
    grid: &'g Grid,
    mapping: HeaderMapping,
    key_column: usize,
}

impl<'g> TabularReader<'g> {
    /// Resolve the header row; a grid without an identifier column is a configuration error
    pub fn new(grid: &'g Grid) -> Result<Self> {
        let mapping = HeaderMapping::from_header(grid.header())?;
        let key_column = mapping.require(INITIATIVE_KEY)?;
        Ok(Self {
            grid,
            mapping,
            key_column,
        })
    }

    pub fn mapping(&self) -> &HeaderMapping {
        &self.mapping
    }

    /// Lazily parse data rows in grid order
    ///
    /// Fully blank rows are skipped silently. A row with content but no key yields
    /// `MissingIdentifier`.
    pub fn records(&self) -> impl Iterator<Item = Result<ParsedRecord>> + '_ {
        self.grid
            .data_rows()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(move |(row, _)| self.parse_row(row))
    }

    fn parse_row(&self, row: usize) -> Result<ParsedRecord> {
        let initiative_key = self.grid.cell(row, self.key_column).trim();
        if initiative_key.is_empty() {
            return Err(Error::MissingIdentifier { row });
        }

        let mut values = BTreeMap::new();
        let mut invalid = Vec::new();

        for (spec, column) in self.mapping.fields() {
            if spec.kind == FieldKind::Identifier {
                continue;
            }
            let raw = self.grid.cell(row, column);

            if spec.kind.is_numeric() {
                match parse_number(raw) {
                    Ok(Some(value)) => {
                        values.insert(spec.name, CellValue::Number(value));
                    }
                    Ok(None) => {
                        values.insert(spec.name, CellValue::Absent);
                    }
                    Err(()) => invalid.push(Error::InvalidValue {
                        field: spec.name.to_string(),
                        value: raw.trim().to_string(),
                    }),
                }
            } else {
                let text = raw.trim();
                let value = if text.is_empty() {
                    CellValue::Absent
                } else {
                    CellValue::Text(text.to_string())
                };
                values.insert(spec.name, value);
            }
        }

        Ok(ParsedRecord {
            row,
            initiative_key: initiative_key.to_string(),
            values,
            invalid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn records(grid: &Grid) -> Vec<Result<ParsedRecord>> {
        TabularReader::new(grid).unwrap().records().collect()
    }

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("1000"), Ok(Some(1000.0)));
        assert_eq!(parse_number(" 1,000 "), Ok(Some(1000.0)));
        assert_eq!(parse_number("80%"), Ok(Some(0.8)));
        assert_eq!(parse_number("-2.5"), Ok(Some(-2.5)));
        assert_eq!(parse_number(""), Ok(None));
        assert_eq!(parse_number("   "), Ok(None));
        assert_eq!(parse_number("high"), Err(()));
        assert_eq!(parse_number("inf"), Err(()));
        assert_eq!(parse_number("NaN"), Err(()));
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let a = grid(&[
            &["initiative_key", "rice_reach", "rice_effort"],
            &["INIT-001", "1000", "5"],
        ]);
        let b = grid(&[
            &["rice_effort", "Initiative Key", "RICE: Reach"],
            &["5", "INIT-001", "1000"],
        ]);

        let a = records(&a).remove(0).unwrap();
        let b = records(&b).remove(0).unwrap();
        assert_eq!(a.values, b.values);
        assert_eq!(a.initiative_key, b.initiative_key);
        assert_eq!(a.values["rice_reach"], CellValue::Number(1000.0));
    }

    #[test]
    fn test_blank_cells_are_absent() {
        let g = grid(&[
            &["Key", "WSJF: Job Size", "Active Framework"],
            &["INIT-002", "", ""],
        ]);
        let record = records(&g).remove(0).unwrap();
        assert_eq!(record.values["wsjf_job_size"], CellValue::Absent);
        assert_eq!(record.values["active_scoring_framework"], CellValue::Absent);
    }

    #[test]
    fn test_row_without_key_is_skipped_with_error() {
        let g = grid(&[
            &["Key", "rice_reach"],
            &["", "10"],
            &["INIT-003", "20"],
        ]);
        let parsed = records(&g);
        assert!(matches!(parsed[0], Err(Error::MissingIdentifier { row: 1 })));
        assert_eq!(parsed[1].as_ref().unwrap().initiative_key, "INIT-003");
    }

    #[test]
    fn test_fully_blank_rows_are_ignored() {
        let g = grid(&[&["Key", "rice_reach"], &["INIT-001", "10"], &["", " "], &[]]);
        assert_eq!(records(&g).len(), 1);
    }

    #[test]
    fn test_missing_identifier_column_is_config_error() {
        let g = grid(&[&["rice_reach", "rice_effort"], &["10", "2"]]);
        assert!(matches!(TabularReader::new(&g), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_number_reported_per_field() {
        let g = grid(&[
            &["Key", "rice_reach", "rice_impact"],
            &["INIT-004", "lots", "80%"],
        ]);
        let record = records(&g).remove(0).unwrap();
        assert!(!record.values.contains_key("rice_reach"));
        assert_eq!(record.values["rice_impact"], CellValue::Number(0.8));
        assert!(matches!(
            &record.invalid[0],
            Error::InvalidValue { field, .. } if field == "rice_reach"
        ));
    }

    #[test]
    fn test_unresolved_columns_do_not_reach_records() {
        let g = grid(&[&["Key", "PM Notes"], &["INIT-001", "ship it"]]);
        let reader = TabularReader::new(&g).unwrap();
        assert_eq!(reader.mapping().unresolved().len(), 1);
        let record = reader.records().next().unwrap().unwrap();
        assert!(record.values.is_empty());
    }
}
