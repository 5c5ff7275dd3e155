use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    data::KeyToken,
    dataset::{Dataset, common_columns},
};

/// Infers a key from the columns both datasets share.
///
/// The first common column (in `old`'s column order) whose values are unique
/// within each dataset wins as a single-column key. Otherwise the two common
/// columns with the most distinct non-null values in `old` form a composite
/// key, ties keeping column order. Returns an empty key only when the datasets
/// share no columns.
pub fn detect_primary_key(old: &Dataset, new: &Dataset) -> Vec<String> {
    let common = common_columns(old, new);
    if common.is_empty() {
        debug!("No common columns; key detection yields an empty key");
        return Vec::new();
    }

    if let Some(column) = common
        .iter()
        .find(|column| is_unique(old, column) && is_unique(new, column))
    {
        info!("Detected unique key column '{column}'");
        return vec![column.clone()];
    }

    let key = common
        .iter()
        .map(|column| (column, distinct_non_null(old, column)))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .take(2)
        .map(|(column, _)| column.clone())
        .collect::<Vec<_>>();
    info!(
        "No single unique column; using composite key [{}]",
        key.iter().join(", ")
    );
    key
}

/// True when no two rows share a value, nulls included.
fn is_unique(dataset: &Dataset, column: &str) -> bool {
    let Some(values) = dataset.column_values(column) else {
        return false;
    };
    let mut seen = HashSet::with_capacity(dataset.len());
    values.map(KeyToken::from_cell).all(|token| seen.insert(token))
}

fn distinct_non_null(dataset: &Dataset, column: &str) -> usize {
    dataset
        .column_values(column)
        .map(|values| {
            values
                .flatten()
                .map(|value| KeyToken::from_cell(Some(value)))
                .collect::<HashSet<_>>()
                .len()
        })
        .unwrap_or(0)
}
