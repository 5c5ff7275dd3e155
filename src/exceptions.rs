//! Exception records and their collection from the comparison scans.

use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    align::{AlignedRecord, Alignment},
    compare::FieldScan,
    data::{Value, format_cell},
};

/// Pseudo-field carrying record-membership exceptions.
pub const RECORD_STATUS_FIELD: &str = "_record_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    DeletedRecord,
    AddedRecord,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::DeletedRecord => write!(f, "deleted_record"),
            ChangeType::AddedRecord => write!(f, "added_record"),
        }
    }
}

/// Old or new side of an exception: a data cell or a membership sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionValue {
    Cell(Option<Value>),
    Exists,
    Missing,
}

impl ExceptionValue {
    pub fn cell(&self) -> Option<&Value> {
        match self {
            ExceptionValue::Cell(value) => value.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionValue::Cell(value) => write!(f, "{}", format_cell(value.as_ref())),
            ExceptionValue::Exists => write!(f, "EXISTS"),
            ExceptionValue::Missing => write!(f, "MISSING"),
        }
    }
}

impl Serialize for ExceptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExceptionValue::Cell(value) => value.serialize(serializer),
            ExceptionValue::Exists => serializer.serialize_str("EXISTS"),
            ExceptionValue::Missing => serializer.serialize_str("MISSING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    /// Key column names paired with this record's key values.
    pub key: Vec<(String, Option<Value>)>,
    pub field: String,
    pub old: ExceptionValue,
    pub new: ExceptionValue,
    pub change_type: Option<ChangeType>,
    pub summary: Option<String>,
}

impl Exception {
    pub fn is_membership(&self) -> bool {
        self.change_type.is_some()
    }

    pub fn key_value(&self, column: &str) -> Option<&Value> {
        self.key
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }
}

/// Serialises flat: key columns first, then `field`, `old`, `new` and the
/// optional `change_type` / `summary` entries only when present.
impl Serialize for Exception {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let optional = usize::from(self.change_type.is_some()) + usize::from(self.summary.is_some());
        let mut map = serializer.serialize_map(Some(self.key.len() + 3 + optional))?;
        for (column, value) in &self.key {
            map.serialize_entry(column, value)?;
        }
        map.serialize_entry("field", &self.field)?;
        map.serialize_entry("old", &self.old)?;
        map.serialize_entry("new", &self.new)?;
        if let Some(change_type) = &self.change_type {
            map.serialize_entry("change_type", change_type)?;
        }
        if let Some(summary) = &self.summary {
            map.serialize_entry("summary", summary)?;
        }
        map.end()
    }
}

/// Builds the ordered exception list: field exceptions grouped by field in
/// scan order and by record within a field, then (when enabled) one deleted
/// record per old-only row followed by one added record per new-only row.
pub fn collect(
    alignment: &Alignment<'_>,
    scans: &[FieldScan],
    include_missing_records: bool,
) -> Vec<Exception> {
    let mut exceptions = Vec::new();
    for scan in scans {
        let field = scan.field();
        for &idx in &scan.mismatches {
            let Some(record) = alignment.both.get(idx) else {
                continue;
            };
            exceptions.push(Exception {
                key: key_pairs(&alignment.key_columns, record),
                field: field.to_string(),
                old: ExceptionValue::Cell(record.old.and_then(|r| r.get(field)).cloned()),
                new: ExceptionValue::Cell(record.new.and_then(|r| r.get(field)).cloned()),
                change_type: None,
                summary: None,
            });
        }
    }

    if include_missing_records {
        let deleted = alignment.old_only.iter().map(|record| {
            membership_exception(&alignment.key_columns, record, ChangeType::DeletedRecord)
        });
        let added = alignment.new_only.iter().map(|record| {
            membership_exception(&alignment.key_columns, record, ChangeType::AddedRecord)
        });
        exceptions.extend(deleted.chain(added));
    }
    exceptions
}

fn membership_exception(
    key_columns: &[String],
    record: &AlignedRecord<'_>,
    change_type: ChangeType,
) -> Exception {
    let (old, new) = match change_type {
        ChangeType::DeletedRecord => (ExceptionValue::Exists, ExceptionValue::Missing),
        ChangeType::AddedRecord => (ExceptionValue::Missing, ExceptionValue::Exists),
    };
    Exception {
        key: key_pairs(key_columns, record),
        field: RECORD_STATUS_FIELD.to_string(),
        old,
        new,
        change_type: Some(change_type),
        summary: None,
    }
}

fn key_pairs(key_columns: &[String], record: &AlignedRecord<'_>) -> Vec<(String, Option<Value>)> {
    key_columns
        .iter()
        .cloned()
        .zip(record.key.iter().cloned())
        .collect()
}
