//! Human-readable descriptions of a single exception.
//!
//! Summaries are pure and infallible: a value that cannot be read as a number
//! or a date under the corresponding hint drops through to the text form.

use crate::{
    data::{Value, parse_temporal},
    exceptions::ChangeType,
};

const TEXT_PREVIEW_CHARS: usize = 30;

/// How the field's values should be described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryHint {
    Numeric,
    Date,
    Text,
}

pub fn summarize(old: Option<&Value>, new: Option<&Value>, hint: SummaryHint) -> String {
    let (old, new) = match (old, new) {
        (None, None) => return "no change".to_string(),
        (None, Some(new)) => return format!("added: {new}"),
        (Some(old), None) => return format!("removed: {old}"),
        (Some(old), Some(new)) => (old, new),
    };

    let specific = match hint {
        SummaryHint::Numeric => numeric_summary(old, new),
        SummaryHint::Date => date_summary(old, new),
        SummaryHint::Text => None,
    };
    specific.unwrap_or_else(|| {
        format!(
            "from '{}' to '{}'",
            truncate(&old.as_display()),
            truncate(&new.as_display())
        )
    })
}

pub fn summarize_membership(change_type: ChangeType) -> String {
    match change_type {
        ChangeType::DeletedRecord => "record deleted".to_string(),
        ChangeType::AddedRecord => "record added".to_string(),
    }
}

fn numeric_summary(old: &Value, new: &Value) -> Option<String> {
    let (a, b) = (old.to_f64()?, new.to_f64()?);
    if !(a.is_finite() && b.is_finite()) {
        return None;
    }
    let delta = b - a;
    Some(if a != 0.0 {
        let pct = delta / a * 100.0;
        format!("changed by {delta:+.2} ({pct:+.2}%)")
    } else {
        format!("changed by {delta:+.2}")
    })
}

fn date_summary(old: &Value, new: &Value) -> Option<String> {
    let a = parse_temporal(&old.as_display())?;
    let b = parse_temporal(&new.as_display())?;
    let days = b.signed_duration_since(a).num_seconds().div_euclid(86_400);
    Some(match days {
        0 => "same date, time changed".to_string(),
        1 => "shifted by 1 day".to_string(),
        -1 => "shifted by -1 day".to_string(),
        other => format!("shifted by {other:+} days"),
    })
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(TEXT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
