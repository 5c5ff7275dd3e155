//! Typed failures raised by the reconciliation pipeline.
//!
//! Every variant belongs to one [`Stage`] so callers can report where a run
//! stopped. Coercion problems and per-row failures never surface here: they are
//! resolved inside the comparator and the summary builder.

use std::fmt;

use thiserror::Error;

/// Which side of the reconciliation a record or column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Old,
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        }
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    KeyDetection,
    Alignment,
    Comparison,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configuration => write!(f, "configuration"),
            Stage::KeyDetection => write!(f, "key detection"),
            Stage::Alignment => write!(f, "alignment"),
            Stage::Comparison => write!(f, "comparison"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("reconciliation key is empty; supply --key or columns shared by both datasets")]
    EmptyKey,

    #[error("datasets share no common columns")]
    NoCommonColumns,

    #[error("key column '{column}' is missing from the {side} dataset")]
    MissingKeyColumn { side: Side, column: String },

    #[error("duplicate key {key} in the {side} dataset; key values must be unique per side")]
    DuplicateKey { side: Side, key: String },

    #[error("row {row} has {found} cell(s) but the dataset declares {expected} column(s)")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("duplicate column '{0}' in dataset header")]
    DuplicateColumn(String),

    #[error("column '{0}' is not present in both datasets")]
    UnknownColumn(String),

    #[error("invalid rule for field '{field}': {reason}")]
    InvalidRule { field: String, reason: String },

    #[error("rule configuration could not be parsed: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl ReconError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::EmptyKey | Self::InvalidRule { .. } | Self::ConfigParse(_) => {
                Stage::Configuration
            }
            Self::NoCommonColumns => Stage::KeyDetection,
            Self::MissingKeyColumn { .. }
            | Self::DuplicateKey { .. }
            | Self::RaggedRow { .. }
            | Self::DuplicateColumn(_) => Stage::Alignment,
            Self::UnknownColumn(_) => Stage::Comparison,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
