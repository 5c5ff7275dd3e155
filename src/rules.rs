//! Field comparison rules and the global reconciliation policy.
//!
//! Rule files are YAML (JSON works too) in the shape:
//!
//! ```yaml
//! pair_name: inventory
//! pk: [id]
//! ignore_nulls: false
//! include_missing_records: true
//! fields:
//!   name:   { type: string, fuzzy_match: 90 }
//!   price:  { type: decimal, tolerance: 0.01 }
//!   vendor: { type: ignore }
//! ```
//!
//! The loosely-typed `type` tag and its options are resolved exactly once into
//! a closed [`FieldRule`], so the comparator never inspects strings while
//! scanning rows. Rules that cannot be honoured as written fall back to
//! [`FieldRule::Exact`] and are reported through [`FieldRuleSet::warnings`],
//! or rejected outright when the set is built in strict mode.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::Context;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};

/// Similarity metric used by fuzzy rules. All metrics score on 0–100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyMetric {
    /// Normalised insertion/deletion distance.
    #[default]
    Indel,
    Levenshtein,
    JaroWinkler,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    Ignore,
    Exact,
    Fuzzy {
        threshold: f64,
        metric: FuzzyMetric,
        case_insensitive: bool,
    },
    Tolerance {
        epsilon: f64,
    },
}

impl FieldRule {
    pub fn is_ignored(&self) -> bool {
        matches!(self, FieldRule::Ignore)
    }
}

/// Declared field type from the rule file's `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    #[serde(alias = "numeric", alias = "float")]
    Decimal,
    Date,
    Boolean,
    Ignore,
    #[serde(other)]
    Unknown,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }
}

/// One `fields.<name>` entry exactly as written in the rule file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFieldRule {
    #[serde(rename = "type")]
    pub kind: Option<FieldType>,
    pub fuzzy_match: Option<f64>,
    pub tolerance: Option<f64>,
    pub metric: Option<FuzzyMetric>,
    pub case_insensitive: Option<bool>,
}

/// Rule file contents before resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub pair_name: Option<String>,
    pub pk: Vec<String>,
    pub ignore_nulls: bool,
    pub include_missing_records: bool,
    pub fields: BTreeMap<String, RawFieldRule>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub rule: FieldRule,
    pub declared: Option<FieldType>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRuleSet {
    fields: BTreeMap<String, FieldSpec>,
    ignore_nulls: bool,
    include_missing_records: bool,
    pair_name: Option<String>,
    key: Vec<String>,
    warnings: Vec<String>,
}

impl FieldRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RuleConfig, strict: bool) -> Result<Self> {
        let mut set = FieldRuleSet {
            ignore_nulls: config.ignore_nulls,
            include_missing_records: config.include_missing_records,
            pair_name: config
                .pair_name
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty()),
            key: config
                .pk
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            ..Default::default()
        };
        for (name, raw) in config.fields {
            let name = name.trim().to_string();
            let (spec, warning) = resolve_field(&name, &raw)?;
            if let Some(reason) = warning {
                if strict {
                    return Err(ReconError::InvalidRule {
                        field: name,
                        reason,
                    });
                }
                warn!("Field '{name}': {reason}");
                set.warnings.push(format!("{name}: {reason}"));
            }
            set.fields.insert(name, spec);
        }
        Ok(set)
    }

    pub fn from_yaml_str(text: &str, strict: bool) -> Result<Self> {
        let config: RuleConfig = serde_yaml::from_str(text)?;
        Self::from_config(config, strict)
    }

    pub fn load(path: &Path, strict: bool) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening rule file {path:?}"))?;
        let config: RuleConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(ReconError::from)
            .with_context(|| format!("Parsing rule file {path:?}"))?;
        Self::from_config(config, strict).with_context(|| format!("Resolving rules in {path:?}"))
    }

    pub fn with_rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        let entry = self.fields.entry(field.into()).or_insert(FieldSpec {
            rule,
            declared: None,
        });
        entry.rule = rule;
        self
    }

    pub fn with_declared_type(mut self, field: impl Into<String>, declared: FieldType) -> Self {
        let entry = self.fields.entry(field.into()).or_insert(FieldSpec {
            rule: FieldRule::Exact,
            declared: None,
        });
        entry.declared = Some(declared);
        self
    }

    pub fn with_ignore_nulls(mut self, ignore_nulls: bool) -> Self {
        self.ignore_nulls = ignore_nulls;
        self
    }

    pub fn with_include_missing_records(mut self, include: bool) -> Self {
        self.include_missing_records = include;
        self
    }

    pub fn with_key(mut self, key: Vec<String>) -> Self {
        self.key = key;
        self
    }

    /// Rule for `field`; fields without an entry compare exactly.
    pub fn rule_for(&self, field: &str) -> FieldRule {
        self.fields
            .get(field)
            .map(|spec| spec.rule)
            .unwrap_or(FieldRule::Exact)
    }

    pub fn declared_type(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).and_then(|spec| spec.declared)
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.rule_for(field).is_ignored()
    }

    pub fn configured_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn ignore_nulls(&self) -> bool {
        self.ignore_nulls
    }

    pub fn include_missing_records(&self) -> bool {
        self.include_missing_records
    }

    pub fn pair_name(&self) -> Option<&str> {
        self.pair_name.as_deref()
    }

    /// Explicit key from the rule file, empty when detection should run.
    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Resolves one raw entry. Returns the spec plus a warning when the entry was
/// downgraded to an exact comparison.
fn resolve_field(name: &str, raw: &RawFieldRule) -> Result<(FieldSpec, Option<String>)> {
    if let Some(threshold) = raw.fuzzy_match
        && !(0.0..=100.0).contains(&threshold)
    {
        return Err(ReconError::InvalidRule {
            field: name.to_string(),
            reason: format!("fuzzy_match must be between 0 and 100, got {threshold}"),
        });
    }
    if let Some(epsilon) = raw.tolerance
        && !(epsilon.is_finite() && epsilon >= 0.0)
    {
        return Err(ReconError::InvalidRule {
            field: name.to_string(),
            reason: format!("tolerance must be a finite, non-negative number, got {epsilon}"),
        });
    }

    let has_fuzzy_options = raw.metric.is_some() || raw.case_insensitive.is_some();
    let exact = |warning: Option<String>| -> Result<(FieldSpec, Option<String>)> {
        Ok((
            FieldSpec {
                rule: FieldRule::Exact,
                declared: raw.kind,
            },
            warning,
        ))
    };

    match raw.kind {
        Some(FieldType::Ignore) => Ok((
            FieldSpec {
                rule: FieldRule::Ignore,
                declared: Some(FieldType::Ignore),
            },
            None,
        )),
        Some(FieldType::String) => match raw.fuzzy_match {
            Some(threshold) => Ok((
                FieldSpec {
                    rule: FieldRule::Fuzzy {
                        threshold,
                        metric: raw.metric.unwrap_or_default(),
                        case_insensitive: raw.case_insensitive.unwrap_or(false),
                    },
                    declared: raw.kind,
                },
                raw.tolerance
                    .map(|_| "tolerance does not apply to string fields".to_string()),
            )),
            None if has_fuzzy_options => {
                exact(Some("fuzzy options given without fuzzy_match threshold".to_string()))
            }
            None if raw.tolerance.is_some() => {
                exact(Some("tolerance does not apply to string fields".to_string()))
            }
            None => exact(None),
        },
        Some(FieldType::Integer | FieldType::Decimal) => match raw.tolerance {
            Some(epsilon) => Ok((
                FieldSpec {
                    rule: FieldRule::Tolerance { epsilon },
                    declared: raw.kind,
                },
                raw.fuzzy_match
                    .map(|_| "fuzzy_match does not apply to numeric fields".to_string()),
            )),
            None if raw.fuzzy_match.is_some() => {
                exact(Some("fuzzy_match does not apply to numeric fields".to_string()))
            }
            None => exact(None),
        },
        Some(FieldType::Unknown) => exact(Some("unknown field type".to_string())),
        Some(FieldType::Date | FieldType::Boolean) | None => {
            if raw.fuzzy_match.is_some() {
                exact(Some("fuzzy_match requires type: string".to_string()))
            } else if raw.tolerance.is_some() {
                exact(Some("tolerance requires type: decimal or integer".to_string()))
            } else {
                exact(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT_NULL_CONFIG: &str = r#"
ignore_nulls: false
include_missing_records: false
fields:
  name: { type: string, fuzzy_match: 90 }
  price: { type: decimal, tolerance: 0.01 }
  date: { type: date, formats: ['%Y-%m-%d', '%d %b %Y'] }
  category: { type: string, fuzzy_match: 95 }
  vendor: { type: ignore }
"#;

    #[test]
    fn resolves_type_tags_into_rules() {
        let rules = FieldRuleSet::from_yaml_str(STRICT_NULL_CONFIG, true).expect("rules");
        assert_eq!(
            rules.rule_for("name"),
            FieldRule::Fuzzy {
                threshold: 90.0,
                metric: FuzzyMetric::Indel,
                case_insensitive: false
            }
        );
        assert_eq!(rules.rule_for("price"), FieldRule::Tolerance { epsilon: 0.01 });
        assert_eq!(rules.rule_for("date"), FieldRule::Exact);
        assert_eq!(rules.declared_type("date"), Some(FieldType::Date));
        assert!(rules.is_ignored("vendor"));
        assert_eq!(rules.rule_for("unlisted"), FieldRule::Exact);
        assert!(rules.warnings().is_empty());
    }

    #[test]
    fn numeric_alias_maps_to_decimal() {
        let rules =
            FieldRuleSet::from_yaml_str("fields:\n  qty: { type: numeric, tolerance: 1 }\n", false)
                .expect("rules");
        assert_eq!(rules.declared_type("qty"), Some(FieldType::Decimal));
        assert_eq!(rules.rule_for("qty"), FieldRule::Tolerance { epsilon: 1.0 });
    }

    #[test]
    fn fuzzy_options_without_threshold_fall_back_to_exact() {
        let yaml = "fields:\n  name: { type: string, metric: jaro_winkler }\n";
        let rules = FieldRuleSet::from_yaml_str(yaml, false).expect("lenient");
        assert_eq!(rules.rule_for("name"), FieldRule::Exact);
        assert_eq!(rules.warnings().len(), 1);

        let err = FieldRuleSet::from_yaml_str(yaml, true).unwrap_err();
        assert!(matches!(err, ReconError::InvalidRule { ref field, .. } if field == "name"));
    }

    #[test]
    fn untyped_fuzzy_match_compares_exactly() {
        let rules = FieldRuleSet::from_yaml_str("fields:\n  name: { fuzzy_match: 80 }\n", false)
            .expect("rules");
        assert_eq!(rules.rule_for("name"), FieldRule::Exact);
        assert_eq!(rules.warnings().len(), 1);
    }

    #[test]
    fn out_of_range_threshold_is_always_an_error() {
        let err = FieldRuleSet::from_yaml_str(
            "fields:\n  name: { type: string, fuzzy_match: 140 }\n",
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::InvalidRule { .. }));

        let err = FieldRuleSet::from_yaml_str(
            "fields:\n  price: { type: decimal, tolerance: -0.5 }\n",
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn header_fields_are_trimmed_and_normalized() {
        let yaml = "pair_name: ' Inventory '\npk: [' id ', '']\nignore_nulls: true\n";
        let rules = FieldRuleSet::from_yaml_str(yaml, false).expect("rules");
        assert_eq!(rules.pair_name(), Some("inventory"));
        assert_eq!(rules.key(), ["id"]);
        assert!(rules.ignore_nulls());
        assert!(!rules.include_missing_records());
    }

    #[test]
    fn unknown_type_tag_is_flagged() {
        let rules = FieldRuleSet::from_yaml_str("fields:\n  code: { type: currency }\n", false)
            .expect("rules");
        assert_eq!(rules.rule_for("code"), FieldRule::Exact);
        assert_eq!(rules.warnings(), ["code: unknown field type"]);
    }

    #[test]
    fn builder_overrides_rules() {
        let rules = FieldRuleSet::new()
            .with_rule("age", FieldRule::Tolerance { epsilon: 1.0 })
            .with_declared_type("age", FieldType::Integer)
            .with_rule("age", FieldRule::Ignore)
            .with_ignore_nulls(true);
        assert!(rules.is_ignored("age"));
        assert_eq!(rules.declared_type("age"), Some(FieldType::Integer));
        assert!(rules.ignore_nulls());
    }
}
