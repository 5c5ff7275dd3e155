use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile two CSV snapshots record by record", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare two CSV snapshots and report field-level exceptions
    Compare(CompareArgs),
    /// Print the key that would be used to align two CSV snapshots
    DetectKey(DetectKeyArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Baseline CSV snapshot
    #[arg(long = "old")]
    pub old: PathBuf,
    /// CSV snapshot compared against the baseline
    #[arg(long = "new")]
    pub new: PathBuf,
    /// CSV delimiter character for both inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the old input (defaults to utf-8)
    #[arg(long = "old-encoding")]
    pub old_encoding: Option<String>,
    /// Character encoding of the new input (defaults to utf-8)
    #[arg(long = "new-encoding")]
    pub new_encoding: Option<String>,
    /// Cell text treated as null; repeatable, replaces the default token list
    #[arg(long = "null-token", action = clap::ArgAction::Append)]
    pub null_tokens: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Comma-separated key columns (detected when omitted)
    #[arg(short = 'k', long = "key", value_delimiter = ',')]
    pub key: Vec<String>,
    /// YAML or JSON rule file describing per-field comparison rules
    #[arg(short = 'r', long = "rules")]
    pub rules: Option<PathBuf>,
    /// Treat one-sided nulls as matches
    #[arg(long = "ignore-nulls")]
    pub ignore_nulls: bool,
    /// Report records present on only one side
    #[arg(long = "include-missing-records")]
    pub include_missing_records: bool,
    /// Reject rule entries that would otherwise fall back to exact comparison
    #[arg(long = "strict-rules")]
    pub strict_rules: bool,
    /// Skip generating per-exception summaries
    #[arg(long = "no-summary")]
    pub no_summary: bool,
    /// JSON report destination (stdout if omitted or '-')
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Also write exceptions as CSV to this path
    #[arg(long = "exceptions-csv")]
    pub exceptions_csv: Option<PathBuf>,
    /// System name recorded in the report (derived from file names otherwise)
    #[arg(long = "system")]
    pub system: Option<String>,
}

#[derive(Debug, Args)]
pub struct DetectKeyArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn compare_args_split_key_list() {
        let cli = Cli::parse_from([
            "csv-reconcile",
            "compare",
            "--old",
            "a.csv",
            "--new",
            "b.csv",
            "--key",
            "store,sku",
            "--null-token",
            "-",
        ]);
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.key, vec!["store", "sku"]);
        assert_eq!(args.input.null_tokens, vec!["-"]);
        assert!(!args.ignore_nulls);
    }
}
