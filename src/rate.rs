/// Percentage of field-level comparisons among aligned records that produced
/// no exception, rounded to two decimals.
///
/// `total = aligned_records * active_fields`; an empty comparison space
/// scores `100.0`. Membership exceptions never enter this calculation.
pub fn match_rate(active_fields: usize, aligned_records: usize, field_exceptions: usize) -> f64 {
    let total = aligned_records.saturating_mul(active_fields);
    if total == 0 {
        return 100.0;
    }
    let agreed = total.saturating_sub(field_exceptions);
    round2(100.0 * agreed as f64 / total as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
