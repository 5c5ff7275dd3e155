//! Single-pass reconciliation of two in-memory datasets.
//!
//! The pipeline runs in a fixed order: choose a key, align records, scan each
//! active field, collect exceptions, compute the match rate and finally attach
//! summaries. Inputs are borrowed read-only; the returned
//! [`ComparisonResult`] is immutable.

use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::{
    align::align,
    compare::{FieldStats, compare_field},
    dataset::{ColumnKind, Dataset, common_columns},
    error::{ReconError, Result},
    exceptions::{Exception, collect},
    key::detect_primary_key,
    rate::match_rate,
    rules::{FieldRuleSet, FieldType},
    summary::{SummaryHint, summarize, summarize_membership},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    Explicit(Vec<String>),
    Detect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub aligned_records: usize,
    pub old_only_records: usize,
    pub new_only_records: usize,
    pub active_fields: usize,
    pub total_comparisons: usize,
    pub field_exceptions: usize,
    pub membership_exceptions: usize,
    pub fields: Vec<FieldStats>,
}

impl RunStats {
    pub fn skipped_rows(&self) -> usize {
        self.fields.iter().map(|f| f.skipped).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    primary_key: Vec<String>,
    match_pct: f64,
    exceptions: Vec<Exception>,
    stats: RunStats,
}

impl ComparisonResult {
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn match_pct(&self) -> f64 {
        self.match_pct
    }

    pub fn exceptions(&self) -> &[Exception] {
        &self.exceptions
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_exceptions(self) -> Vec<Exception> {
        self.exceptions
    }
}

/// Configured reconciliation run over a borrowed rule set.
#[derive(Debug, Clone)]
pub struct Reconciler<'r> {
    rules: &'r FieldRuleSet,
    key: KeySelection,
    summaries: bool,
}

impl<'r> Reconciler<'r> {
    /// Uses the rule set's `pk` when present, otherwise detects a key.
    pub fn new(rules: &'r FieldRuleSet) -> Self {
        let key = if rules.key().is_empty() {
            KeySelection::Detect
        } else {
            KeySelection::Explicit(rules.key().to_vec())
        };
        Self {
            rules,
            key,
            summaries: true,
        }
    }

    pub fn with_key(mut self, key: KeySelection) -> Self {
        self.key = key;
        self
    }

    pub fn with_summaries(mut self, enabled: bool) -> Self {
        self.summaries = enabled;
        self
    }

    pub fn run(&self, old: &Dataset, new: &Dataset) -> Result<ComparisonResult> {
        let key = self.resolve_key(old, new)?;
        let alignment = align(old, new, &key)?;

        let fields = self.active_fields(old, new, &key);
        let scans = fields
            .iter()
            .map(|field| {
                compare_field(
                    &alignment.both,
                    field,
                    self.rules.rule_for(field),
                    self.rules.ignore_nulls(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let include_missing = self.rules.include_missing_records();
        let mut exceptions = collect(&alignment, &scans, include_missing);
        let field_exceptions = exceptions.iter().filter(|e| !e.is_membership()).count();
        let membership_exceptions = exceptions.len() - field_exceptions;
        let match_pct = match_rate(fields.len(), alignment.both.len(), field_exceptions);

        if self.summaries {
            for exception in &mut exceptions {
                exception.summary = Some(match exception.change_type {
                    Some(change_type) => summarize_membership(change_type),
                    None => summarize(
                        exception.old.cell(),
                        exception.new.cell(),
                        self.summary_hint(old, &exception.field),
                    ),
                });
            }
        }

        let stats = RunStats {
            aligned_records: alignment.both.len(),
            old_only_records: alignment.old_only.len(),
            new_only_records: alignment.new_only.len(),
            active_fields: fields.len(),
            total_comparisons: alignment.both.len() * fields.len(),
            field_exceptions,
            membership_exceptions,
            fields: scans.into_iter().map(|scan| scan.stats).collect(),
        };
        info!(
            "Match rate {match_pct:.2}% with {} exception(s) ({} field, {} membership)",
            exceptions.len(),
            field_exceptions,
            membership_exceptions
        );
        Ok(ComparisonResult {
            primary_key: key,
            match_pct,
            exceptions,
            stats,
        })
    }

    fn resolve_key(&self, old: &Dataset, new: &Dataset) -> Result<Vec<String>> {
        match &self.key {
            KeySelection::Explicit(key) if key.is_empty() => Err(ReconError::EmptyKey),
            KeySelection::Explicit(key) => Ok(key.clone()),
            KeySelection::Detect => {
                let key = detect_primary_key(old, new);
                if key.is_empty() {
                    Err(ReconError::NoCommonColumns)
                } else {
                    Ok(key)
                }
            }
        }
    }

    /// Common non-key columns in `old`'s order, minus ignored fields.
    fn active_fields(&self, old: &Dataset, new: &Dataset, key: &[String]) -> Vec<String> {
        let common = common_columns(old, new);
        let common_set: HashSet<&str> = common.iter().map(String::as_str).collect();
        let unused = self
            .rules
            .configured_fields()
            .filter(|field| !common_set.contains(field))
            .collect::<Vec<_>>();
        if !unused.is_empty() {
            debug!(
                "Rules for column(s) not shared by both datasets ignored: {}",
                unused.iter().join(", ")
            );
        }
        let fields = common
            .into_iter()
            .filter(|column| !key.contains(column) && !self.rules.is_ignored(column))
            .collect::<Vec<_>>();
        debug!("Comparing field(s): {}", fields.iter().join(", "));
        fields
    }

    fn summary_hint(&self, old: &Dataset, field: &str) -> SummaryHint {
        match self.rules.declared_type(field) {
            Some(FieldType::Date) => SummaryHint::Date,
            Some(declared) if declared.is_numeric() => SummaryHint::Numeric,
            Some(FieldType::String | FieldType::Boolean) => SummaryHint::Text,
            _ if old.column_kind(field).is_some_and(ColumnKind::is_numeric) => {
                SummaryHint::Numeric
            }
            _ => SummaryHint::Text,
        }
    }
}

/// Reconciles `old` against `new` with the rule set's own key and policy,
/// attaching summaries.
pub fn reconcile(old: &Dataset, new: &Dataset, rules: &FieldRuleSet) -> Result<ComparisonResult> {
    Reconciler::new(rules).run(old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        error::Stage,
        exceptions::{ChangeType, ExceptionValue},
        rules::FieldRule,
    };
    use serde_json::json;

    fn dataset(records: serde_json::Value) -> Dataset {
        let records = records.as_array().expect("array").clone();
        Dataset::from_json_records(&records).expect("dataset")
    }

    #[test]
    fn summaries_use_declared_then_inferred_types() {
        let old = dataset(json!([{"id": 1, "price": 10.0, "day": "2024-01-01", "note": "a"}]));
        let new = dataset(json!([{"id": 1, "price": 12.0, "day": "2024-01-03", "note": "b"}]));
        let rules = FieldRuleSet::new()
            .with_declared_type("day", FieldType::Date)
            .with_key(vec!["id".into()]);
        let result = reconcile(&old, &new, &rules).expect("run");
        let summaries = result
            .exceptions()
            .iter()
            .map(|e| (e.field.as_str(), e.summary.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>();
        assert!(summaries.contains(&("price", "changed by +2.00 (+20.00%)")));
        assert!(summaries.contains(&("day", "shifted by +2 days")));
        assert!(summaries.contains(&("note", "from 'a' to 'b'")));
    }

    #[test]
    fn ignored_and_key_fields_are_not_compared() {
        let old = dataset(json!([{"id": 1, "a": 1, "b": 1}, {"id": 2, "a": 2, "b": 2}]));
        let new = dataset(json!([{"id": 1, "a": 9, "b": 1}, {"id": 2, "a": 9, "b": 3}]));
        let rules = FieldRuleSet::new().with_rule("a", FieldRule::Ignore);
        let result = Reconciler::new(&rules)
            .with_key(KeySelection::Explicit(vec!["id".into()]))
            .with_summaries(false)
            .run(&old, &new)
            .expect("run");
        assert_eq!(result.stats().active_fields, 1);
        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.exceptions()[0].field, "b");
        assert_eq!(result.exceptions()[0].summary, None);
        assert_eq!(result.match_pct(), 50.0);
    }

    #[test]
    fn membership_exceptions_do_not_move_the_rate() {
        let old = dataset(json!([{"id": 1, "v": "x"}, {"id": 2, "v": "y"}]));
        let new = dataset(json!([{"id": 1, "v": "x"}, {"id": 3, "v": "z"}]));
        let rules = FieldRuleSet::new().with_include_missing_records(true);
        let result = reconcile(&old, &new, &rules).expect("run");
        assert_eq!(result.primary_key(), ["id"]);
        assert_eq!(result.match_pct(), 100.0);
        assert_eq!(result.stats().membership_exceptions, 2);
        let first = &result.exceptions()[0];
        assert_eq!(first.change_type, Some(ChangeType::DeletedRecord));
        assert_eq!(first.summary.as_deref(), Some("record deleted"));
        assert_eq!(first.old, ExceptionValue::Exists);
        assert_eq!(first.key_value("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn failures_name_their_stage() {
        let old = dataset(json!([{"a": 1}]));
        let new = dataset(json!([{"b": 1}]));
        let err = reconcile(&old, &new, &FieldRuleSet::new()).unwrap_err();
        assert_eq!(err.stage(), Stage::KeyDetection);

        let err = Reconciler::new(&FieldRuleSet::new())
            .with_key(KeySelection::Explicit(Vec::new()))
            .run(&old, &old)
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Configuration);
    }
}
