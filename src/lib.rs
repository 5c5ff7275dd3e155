pub mod align;
pub mod cli;
pub mod compare;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod io_utils;
pub mod key;
pub mod rate;
pub mod report;
pub mod rules;
pub mod similarity;
pub mod summary;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    dataset::Dataset,
    engine::{ComparisonResult, KeySelection, Reconciler, reconcile},
    error::ReconError,
    rules::{FieldRule, FieldRuleSet},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare(args) => report::execute(&args),
        Commands::DetectKey(args) => report::execute_detect_key(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
