//! String similarity ratios on a 0–100 scale.

use crate::rules::FuzzyMetric;

/// Scores `a` against `b`. Symmetric for every metric; identical strings
/// always score 100.
pub fn similarity(a: &str, b: &str, metric: FuzzyMetric, case_insensitive: bool) -> f64 {
    if case_insensitive {
        return similarity(&a.to_lowercase(), &b.to_lowercase(), metric, false);
    }
    match metric {
        FuzzyMetric::Indel => indel_ratio(a, b),
        FuzzyMetric::Levenshtein => strsim::normalized_levenshtein(a, b) * 100.0,
        FuzzyMetric::JaroWinkler => strsim::jaro_winkler(a, b) * 100.0,
    }
}

/// `100 * (1 - indel / (|a| + |b|))` where `indel` is the minimum number of
/// single-character insertions and deletions turning `a` into `b`. Equivalent
/// to `200 * lcs / (|a| + |b|)`.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut previous = vec![0usize; short.len() + 1];
    let mut current = vec![0usize; short.len() + 1];
    for ch in long {
        for (j, other) in short.iter().enumerate() {
            current[j + 1] = if ch == other {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[short.len()]
}
