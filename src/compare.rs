//! Field-level comparison of records present on both sides.
//!
//! Each row yields `Result<RowOutcome, SkipReason>`. A row that cannot be
//! evaluated is logged, tallied as skipped and reported as a mismatch; it is
//! never folded into the matched count.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    align::AlignedRecord,
    data::{Value, format_cell, same_number},
    error::{ReconError, Result, Side},
    rules::FieldRule,
    similarity::similarity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Match,
    Mismatch,
    /// Exactly one side was null and the null policy waived it.
    NullIgnored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A tolerance comparison met NaN or an infinity on one side and a
    /// different value on the other.
    NonFinite { side: Side },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonFinite { side } => {
                write!(f, "{side} value is not a finite number")
            }
        }
    }
}

/// Per-field tallies. `mismatched` includes skipped rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldStats {
    pub field: String,
    pub matched: usize,
    pub mismatched: usize,
    pub null_ignored: usize,
    pub skipped: usize,
}

impl FieldStats {
    pub fn compared(&self) -> usize {
        self.matched + self.mismatched + self.null_ignored
    }
}

/// Outcome of scanning one field across the aligned-both partition.
#[derive(Debug, Clone)]
pub struct FieldScan {
    /// Indices into the aligned-both partition, ascending.
    pub mismatches: Vec<usize>,
    pub stats: FieldStats,
}

impl FieldScan {
    pub fn field(&self) -> &str {
        &self.stats.field
    }
}

pub fn compare_values(
    old: Option<&Value>,
    new: Option<&Value>,
    rule: FieldRule,
    ignore_nulls: bool,
) -> std::result::Result<RowOutcome, SkipReason> {
    let (old, new) = match (old, new) {
        (None, None) => return Ok(RowOutcome::Match),
        (None, Some(_)) | (Some(_), None) => {
            return Ok(if ignore_nulls {
                RowOutcome::NullIgnored
            } else {
                RowOutcome::Mismatch
            });
        }
        (Some(old), Some(new)) => (old, new),
    };

    let matched = match rule {
        FieldRule::Ignore => true,
        FieldRule::Exact => old.literal_eq(new),
        FieldRule::Fuzzy {
            threshold,
            metric,
            case_insensitive,
        } => {
            similarity(&old.as_display(), &new.as_display(), metric, case_insensitive)
                >= threshold
        }
        FieldRule::Tolerance { epsilon } => match (old.to_f64(), new.to_f64()) {
            (Some(a), Some(b)) if same_number(a, b) => true,
            (Some(a), Some(b)) => {
                if !a.is_finite() {
                    return Err(SkipReason::NonFinite { side: Side::Old });
                }
                if !b.is_finite() {
                    return Err(SkipReason::NonFinite { side: Side::New });
                }
                (a - b).abs() <= epsilon
            }
            _ => false,
        },
    };
    Ok(if matched {
        RowOutcome::Match
    } else {
        RowOutcome::Mismatch
    })
}

/// Scans `field` across every record of the aligned-both partition.
pub fn compare_field(
    both: &[AlignedRecord<'_>],
    field: &str,
    rule: FieldRule,
    ignore_nulls: bool,
) -> Result<FieldScan> {
    if let Some(first) = both.first() {
        let present = first.old.is_some_and(|r| r.has_column(field))
            && first.new.is_some_and(|r| r.has_column(field));
        if !present {
            return Err(ReconError::UnknownColumn(field.to_string()));
        }
    }

    let mut scan = FieldScan {
        mismatches: Vec::new(),
        stats: FieldStats {
            field: field.to_string(),
            ..Default::default()
        },
    };
    for (idx, record) in both.iter().enumerate() {
        let old = record.old.and_then(|r| r.get(field));
        let new = record.new.and_then(|r| r.get(field));
        match compare_values(old, new, rule, ignore_nulls) {
            Ok(RowOutcome::Match) => scan.stats.matched += 1,
            Ok(RowOutcome::NullIgnored) => scan.stats.null_ignored += 1,
            Ok(RowOutcome::Mismatch) => {
                scan.stats.mismatched += 1;
                scan.mismatches.push(idx);
            }
            Err(reason) => {
                warn!(
                    "Field '{field}' row {}: {reason} (old={}, new={}); reporting as mismatch",
                    idx + 1,
                    format_cell(old),
                    format_cell(new)
                );
                scan.stats.skipped += 1;
                scan.stats.mismatched += 1;
                scan.mismatches.push(idx);
            }
        }
    }
    debug!(
        "Field '{field}': {} matched, {} mismatched, {} null-ignored, {} skipped",
        scan.stats.matched, scan.stats.mismatched, scan.stats.null_ignored, scan.stats.skipped
    );
    Ok(scan)
}
