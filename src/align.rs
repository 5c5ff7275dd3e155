//! Full outer join of two datasets on a key.
//!
//! Every distinct key value from either side appears exactly once, tagged with
//! its membership. Rows are carried structurally as optional old/new
//! [`Record`] views instead of suffix-mangled column names. Key uniqueness per
//! side is enforced: a duplicate key is a typed error, never a cross product.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::{
    data::{KeyToken, Value},
    dataset::{ColumnKind, Dataset, Record},
    error::{ReconError, Result, Side},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Both,
    OldOnly,
    NewOnly,
}

#[derive(Debug, Clone)]
pub struct AlignedRecord<'a> {
    /// Key values in key-column order, taken from whichever side has the row.
    pub key: Vec<Option<Value>>,
    pub old: Option<Record<'a>>,
    pub new: Option<Record<'a>>,
}

impl AlignedRecord<'_> {
    pub fn membership(&self) -> Membership {
        match (&self.old, &self.new) {
            (Some(_), Some(_)) => Membership::Both,
            (Some(_), None) => Membership::OldOnly,
            _ => Membership::NewOnly,
        }
    }
}

/// Write-once partitions produced by [`align`].
#[derive(Debug, Clone)]
pub struct Alignment<'a> {
    pub key_columns: Vec<String>,
    /// In `old` row order.
    pub both: Vec<AlignedRecord<'a>>,
    /// In `old` row order.
    pub old_only: Vec<AlignedRecord<'a>>,
    /// In `new` row order.
    pub new_only: Vec<AlignedRecord<'a>>,
}

impl Alignment<'_> {
    pub fn len(&self) -> usize {
        self.both.len() + self.old_only.len() + self.new_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn align<'a>(old: &'a Dataset, new: &'a Dataset, key: &[String]) -> Result<Alignment<'a>> {
    if key.is_empty() {
        return Err(ReconError::EmptyKey);
    }
    let old_indices = key_indices(old, key, Side::Old)?;
    let new_indices = key_indices(new, key, Side::New)?;
    for (column, old_kind, new_kind) in key_kind_mismatches(old, new, key) {
        warn!(
            "Key column '{column}' holds {old_kind:?} values in old but {new_kind:?} in new; \
             keys are not coerced, so these rows will not align"
        );
    }

    let mut new_lookup: HashMap<Vec<KeyToken>, usize> = HashMap::with_capacity(new.len());
    for (row_idx, row) in new.rows().iter().enumerate() {
        let tokens = key_tokens(row, &new_indices);
        match new_lookup.entry(tokens) {
            Entry::Occupied(entry) => {
                return Err(ReconError::DuplicateKey {
                    side: Side::New,
                    key: describe_key(entry.key()),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(row_idx);
            }
        }
    }

    let mut matched = vec![false; new.len()];
    let mut seen_old: HashSet<Vec<KeyToken>> = HashSet::with_capacity(old.len());
    let mut both = Vec::new();
    let mut old_only = Vec::new();
    for (row_idx, row) in old.rows().iter().enumerate() {
        let tokens = key_tokens(row, &old_indices);
        if seen_old.contains(&tokens) {
            return Err(ReconError::DuplicateKey {
                side: Side::Old,
                key: describe_key(&tokens),
            });
        }
        let partner = new_lookup.get(&tokens).copied();
        seen_old.insert(tokens);
        let aligned = AlignedRecord {
            key: old_indices.iter().map(|idx| row[*idx].clone()).collect(),
            old: old.record(row_idx),
            new: partner.and_then(|new_idx| new.record(new_idx)),
        };
        match partner {
            Some(new_idx) => {
                matched[new_idx] = true;
                both.push(aligned);
            }
            None => old_only.push(aligned),
        }
    }

    let new_only = new
        .rows()
        .iter()
        .enumerate()
        .filter(|(row_idx, _)| !matched[*row_idx])
        .map(|(row_idx, row)| AlignedRecord {
            key: new_indices.iter().map(|idx| row[*idx].clone()).collect(),
            old: None,
            new: new.record(row_idx),
        })
        .collect::<Vec<_>>();

    info!(
        "Aligned on [{}]: {} in both, {} only in old, {} only in new",
        key.iter().join(", "),
        both.len(),
        old_only.len(),
        new_only.len()
    );

    Ok(Alignment {
        key_columns: key.to_vec(),
        both,
        old_only,
        new_only,
    })
}

fn key_indices(dataset: &Dataset, key: &[String], side: Side) -> Result<Vec<usize>> {
    key.iter()
        .map(|column| {
            dataset
                .column_index(column)
                .ok_or_else(|| ReconError::MissingKeyColumn {
                    side,
                    column: column.clone(),
                })
        })
        .collect()
}

/// Key columns whose inferred kinds differ between the two sides. Columns
/// that are entirely null on either side are not reported.
pub fn key_kind_mismatches(
    old: &Dataset,
    new: &Dataset,
    key: &[String],
) -> Vec<(String, ColumnKind, ColumnKind)> {
    key.iter()
        .filter_map(|column| {
            let old_kind = old.column_kind(column)?;
            let new_kind = new.column_kind(column)?;
            let comparable = old_kind != ColumnKind::Empty && new_kind != ColumnKind::Empty;
            (comparable && old_kind != new_kind).then(|| (column.clone(), old_kind, new_kind))
        })
        .collect()
}

fn key_tokens(row: &[Option<Value>], indices: &[usize]) -> Vec<KeyToken> {
    indices
        .iter()
        .map(|idx| KeyToken::from_cell(row[*idx].as_ref()))
        .collect()
}

fn describe_key(tokens: &[KeyToken]) -> String {
    format!("({})", tokens.iter().join(", "))
}
