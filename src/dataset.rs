//! In-memory tabular dataset consumed by the reconciliation engine.
//!
//! A [`Dataset`] is an ordered list of column names plus fixed-width rows of
//! `Option<Value>` cells. Construction validates that headers are unique and
//! that every row has exactly one cell per column, so downstream stages can
//! index cells without re-checking bounds.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    data::{Value, parse_boolean_token},
    error::{ReconError, Result},
};

pub type Row = Vec<Option<Value>>;

/// Type observed across all non-null cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    String,
    /// Column holds no non-null values.
    Empty,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), idx).is_some() {
                return Err(ReconError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            index,
            rows: Vec::new(),
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// Builds a dataset from JSON objects; keys absent from an object become
    /// nulls. `serde_json` objects iterate their keys sorted by name, so
    /// columns are sorted within each object and appended in first-seen order
    /// across objects. Use [`Dataset::from_rows`] when column order matters,
    /// since key detection and field order follow it.
    pub fn from_json_records(records: &[serde_json::Value]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in records {
            if let Some(object) = record.as_object() {
                for key in object.keys() {
                    if seen.insert(key.clone()) {
                        columns.push(key.clone());
                    }
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).and_then(json_to_value))
                    .collect::<Row>()
            })
            .collect();
        Self::from_rows(columns, rows)
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ReconError::RaggedRow {
                row: self.rows.len() + 1,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates one column's cells in row order.
    pub fn column_values<'a>(
        &'a self,
        name: &str,
    ) -> Option<impl Iterator<Item = Option<&'a Value>> + use<'a>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_ref()))
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let values = self.column_values(name)?;
        Some(observe_kind(values.flatten()))
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        self.rows.get(row).map(|cells| Record {
            dataset: self,
            cells,
        })
    }
}

/// Columns present in both datasets, in `old`'s column order.
pub fn common_columns(old: &Dataset, new: &Dataset) -> Vec<String> {
    old.columns()
        .iter()
        .filter(|column| new.has_column(column))
        .cloned()
        .collect()
}

/// Read-only view of one row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    dataset: &'a Dataset,
    cells: &'a Row,
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.dataset.column_index(column)?;
        self.cells[idx].as_ref()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.dataset.has_column(column)
    }
}

pub fn observe_kind<'a, I>(values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut kind = ColumnKind::Empty;
    for value in values {
        let current = match value {
            Value::Integer(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Boolean(_) => ColumnKind::Boolean,
            Value::String(_) => ColumnKind::String,
        };
        kind = match (kind, current) {
            (ColumnKind::Empty, next) => next,
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::String,
        };
    }
    kind
}

/// Infers the narrowest kind that fits every raw, already null-filtered cell.
pub fn infer_raw_kind<'a, I>(values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a str>,
{
    let mut integer = true;
    let mut float = true;
    let mut boolean = true;
    let mut any = false;
    for raw in values {
        any = true;
        let trimmed = raw.trim();
        if integer && trimmed.parse::<i64>().is_err() {
            integer = false;
        }
        if float && !trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
            float = false;
        }
        if boolean && parse_boolean_token(trimmed).is_none() {
            boolean = false;
        }
        if !integer && !float && !boolean {
            return ColumnKind::String;
        }
    }
    if !any {
        ColumnKind::Empty
    } else if integer {
        ColumnKind::Integer
    } else if float {
        ColumnKind::Float
    } else if boolean {
        ColumnKind::Boolean
    } else {
        ColumnKind::String
    }
}

/// Converts a raw cell to `kind`. Falls back to the raw text when the cell
/// does not parse, which cannot happen for kinds produced by
/// [`infer_raw_kind`] over the same cells.
pub fn convert_raw(raw: &str, kind: ColumnKind) -> Value {
    let trimmed = raw.trim();
    let parsed = match kind {
        ColumnKind::Integer => trimmed.parse::<i64>().ok().map(Value::Integer),
        ColumnKind::Float => trimmed.parse::<f64>().ok().map(Value::Float),
        ColumnKind::Boolean => parse_boolean_token(trimmed).map(Value::Boolean),
        ColumnKind::String | ColumnKind::Empty => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn json_to_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Float)),
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        other => Some(Value::String(other.to_string())),
    }
}
