//! `compare` and `detect-key` commands: load both snapshots, run the engine
//! and write the JSON report plus an optional exceptions CSV.

use std::{io::Write, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::{CompareArgs, DetectKeyArgs, InputArgs},
    data::Value,
    dataset::Dataset,
    engine::{ComparisonResult, Reconciler, RunStats},
    exceptions::{Exception, ExceptionValue},
    io_utils::{self, LoadOptions},
    key::detect_primary_key,
    printable_delimiter,
    rules::FieldRuleSet,
};

const SYSTEM_NAME_SEPARATORS: [char; 3] = ['_', '-', ' '];

#[derive(Debug, Serialize)]
struct Report<'a> {
    system_name: &'a str,
    run_at: String,
    primary_key: &'a [String],
    match_pct: f64,
    num_exceptions: usize,
    exceptions: &'a [Exception],
    stats: &'a RunStats,
}

pub fn execute(args: &CompareArgs) -> Result<()> {
    let mut rules = match &args.rules {
        Some(path) => FieldRuleSet::load(path, args.strict_rules)?,
        None => FieldRuleSet::new(),
    };
    if args.ignore_nulls {
        rules = rules.with_ignore_nulls(true);
    }
    if args.include_missing_records {
        rules = rules.with_include_missing_records(true);
    }
    let key = args
        .key
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .collect::<Vec<_>>();
    if !key.is_empty() {
        rules = rules.with_key(key);
    }

    let system_name = match args.system.as_deref().or(rules.pair_name()) {
        Some(name) => name.trim().to_string(),
        None => derive_system_name(&args.input.old, &args.input.new),
    };
    let (old, new) = load_inputs(&args.input)?;
    info!(
        "Reconciling {:?} ({} row(s)) against {:?} ({} row(s)) for system '{system_name}'",
        args.input.old,
        old.len(),
        args.input.new,
        new.len()
    );

    let result = Reconciler::new(&rules)
        .with_summaries(!args.no_summary)
        .run(&old, &new)
        .map_err(|err| anyhow!("Reconciliation failed during {}: {err}", err.stage()))?;

    write_report(&result, &system_name, args.output.as_deref())?;
    if let Some(path) = &args.exceptions_csv {
        write_exceptions_csv(&result, path)
            .with_context(|| format!("Writing exceptions to {path:?}"))?;
        info!(
            "Wrote {} exception row(s) to {path:?}",
            result.exceptions().len()
        );
    }
    let skipped = result.stats().skipped_rows();
    if skipped > 0 {
        warn!("{skipped} row comparison(s) could not be evaluated and were reported as mismatches");
    }
    Ok(())
}

pub fn execute_detect_key(args: &DetectKeyArgs) -> Result<()> {
    let (old, new) = load_inputs(&args.input)?;
    let key = detect_primary_key(&old, &new);
    if key.is_empty() {
        return Err(anyhow!(
            "{:?} and {:?} share no columns; no key can be detected",
            args.input.old,
            args.input.new
        ));
    }
    println!("{}", key.iter().join(","));
    Ok(())
}

fn load_inputs(input: &InputArgs) -> Result<(Dataset, Dataset)> {
    if io_utils::is_dash(&input.old) && io_utils::is_dash(&input.new) {
        return Err(anyhow!("At most one input can be read from stdin"));
    }
    let old = load_side(
        &input.old,
        input.delimiter,
        input.old_encoding.as_deref(),
        &input.null_tokens,
    )?;
    let new = load_side(
        &input.new,
        input.delimiter,
        input.new_encoding.as_deref(),
        &input.null_tokens,
    )?;
    Ok((old, new))
}

fn load_side(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
    null_tokens: &[String],
) -> Result<Dataset> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let encoding = io_utils::resolve_encoding(encoding)?;
    info!(
        "Loading {path:?} with delimiter '{}' and encoding {}",
        printable_delimiter(delimiter),
        encoding.name()
    );
    let options = LoadOptions::new(delimiter, encoding, null_tokens);
    io_utils::load_dataset(path, &options)
}

fn write_report(result: &ComparisonResult, system_name: &str, output: Option<&Path>) -> Result<()> {
    let report = Report {
        system_name,
        run_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        primary_key: result.primary_key(),
        match_pct: result.match_pct(),
        num_exceptions: result.exceptions().len(),
        exceptions: result.exceptions(),
        stats: result.stats(),
    };
    let mut writer = io_utils::open_output(output)?;
    serde_json::to_writer_pretty(&mut writer, &report).context("Serializing report")?;
    writeln!(writer)?;
    writer.flush().context("Flushing report output")?;
    Ok(())
}

fn write_exceptions_csv(result: &ComparisonResult, path: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(Some(path), b',')?;
    let mut headers = result.primary_key().to_vec();
    headers.extend(
        ["field", "old", "new", "change_type", "summary"]
            .iter()
            .map(|h| h.to_string()),
    );
    writer.write_record(&headers)?;
    for exception in result.exceptions() {
        let mut row = exception
            .key
            .iter()
            .map(|(_, value)| csv_cell(value.as_ref()))
            .collect::<Vec<_>>();
        row.push(exception.field.clone());
        row.push(csv_exception_value(&exception.old));
        row.push(csv_exception_value(&exception.new));
        row.push(
            exception
                .change_type
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );
        row.push(exception.summary.clone().unwrap_or_default());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_cell(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}

fn csv_exception_value(value: &ExceptionValue) -> String {
    match value {
        ExceptionValue::Cell(cell) => csv_cell(cell.as_ref()),
        sentinel => sentinel.to_string(),
    }
}

/// System label shared by two snapshot file names, e.g. `inventory` for
/// `inventory_2024-01.csv` and `inventory_2024-02.csv`. The first separator
/// present in both stems splits off the prefix; on disagreement the old
/// file's prefix wins.
pub fn derive_system_name(old: &Path, new: &Path) -> String {
    let old_stem = file_stem(old);
    let new_stem = file_stem(new);
    let separator = SYSTEM_NAME_SEPARATORS
        .into_iter()
        .find(|sep| old_stem.contains(*sep) && new_stem.contains(*sep));
    let prefix = |stem: &str| {
        let head = match separator {
            Some(sep) => stem.split(sep).next().unwrap_or(stem),
            None => stem,
        };
        head.trim().to_lowercase()
    };
    let (old_name, new_name) = (prefix(&old_stem), prefix(&new_stem));
    if old_name != new_name {
        warn!("File system mismatch: '{old_name}' vs '{new_name}'; using '{old_name}'");
    }
    old_name
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
