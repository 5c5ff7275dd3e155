mod common;

use common::{TestWorkspace, fixture_path};
use csv_reconcile::{
    FieldRule, FieldRuleSet, ReconError,
    error::Stage,
    rules::{FieldType, FuzzyMetric},
};

#[test]
fn loads_fixture_rule_file() {
    let rules = FieldRuleSet::load(&fixture_path("inventory_rules.yaml"), true).expect("rules");
    assert_eq!(rules.pair_name(), Some("inventory"));
    assert_eq!(rules.key(), ["id"]);
    assert!(!rules.ignore_nulls());
    assert!(rules.include_missing_records());
    assert_eq!(rules.rule_for("price"), FieldRule::Tolerance { epsilon: 0.01 });
    assert_eq!(rules.declared_type("updated"), Some(FieldType::Date));
    assert!(rules.is_ignored("vendor"));
    assert_eq!(rules.rule_for("qty"), FieldRule::Exact);
}

#[test]
fn json_rule_files_are_accepted() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "rules.json",
        r#"{"fields": {"name": {"type": "string", "fuzzy_match": 70, "metric": "jaro_winkler", "case_insensitive": true}}}"#,
    );
    let rules = FieldRuleSet::load(&path, true).expect("rules");
    assert_eq!(
        rules.rule_for("name"),
        FieldRule::Fuzzy {
            threshold: 70.0,
            metric: FuzzyMetric::JaroWinkler,
            case_insensitive: true
        }
    );
}

#[test]
fn malformed_yaml_is_a_configuration_error() {
    let err = FieldRuleSet::from_yaml_str("fields: [unclosed", false).unwrap_err();
    assert!(matches!(err, ReconError::ConfigParse(_)));
    assert_eq!(err.stage(), Stage::Configuration);
}

#[test]
fn strict_mode_rejects_rules_that_would_fall_back() {
    let yaml = "fields:\n  qty: { type: integer, fuzzy_match: 90 }\n";
    let lenient = FieldRuleSet::from_yaml_str(yaml, false).expect("lenient");
    assert_eq!(lenient.rule_for("qty"), FieldRule::Exact);
    assert_eq!(lenient.warnings().len(), 1);

    let err = FieldRuleSet::from_yaml_str(yaml, true).unwrap_err();
    assert!(err.to_string().contains("qty"));
}

#[test]
fn missing_rule_file_reports_path() {
    let workspace = TestWorkspace::new();
    let err = FieldRuleSet::load(&workspace.path().join("absent.yaml"), false).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}
