use std::cmp::Ordering;

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Pearson correlation coefficient.
///
/// `None` when the series differ in length, have fewer than two points, or
/// either one is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    let r = num / (den_x.sqrt() * den_y.sqrt());
    if den_x == 0.0 || den_y == 0.0 || !r.is_finite() {
        None
    } else {
        Some(r.clamp(-1.0, 1.0))
    }
}

/// Spearman rank correlation: Pearson over average ranks (ties share the
/// mean of the positions they span).
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    pearson(&ranks_with_ties(x), &ranks_with_ties(y))
}

fn ranks_with_ties(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && values[indices[j]] == values[indices[i]] {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &idx in &indices[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Best accuracy of a single-threshold classifier separating `positives`
/// (diverse) from `negatives` (constant).
///
/// A value is classified positive iff it is strictly greater than the
/// threshold, so higher scores are read as more diverse. Candidates are
/// negative infinity (everything positive) plus every distinct observed value.
/// Returns `(accuracy, threshold)`; ties keep the lowest threshold. Both groups
/// empty yields `(0.0, -inf)`. NaN values are left out.
pub fn optimal_classification_accuracy(positives: &[f64], negatives: &[f64]) -> (f64, f64) {
    let positives: Vec<f64> = positives.iter().copied().filter(|v| !v.is_nan()).collect();
    let negatives: Vec<f64> = negatives.iter().copied().filter(|v| !v.is_nan()).collect();
    let total = positives.len() + negatives.len();
    if total == 0 {
        return (0.0, f64::NEG_INFINITY);
    }

    let mut candidates: Vec<f64> = positives.iter().chain(&negatives).copied().collect();
    candidates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    candidates.dedup();

    let mut best = (positives.len() as f64 / total as f64, f64::NEG_INFINITY);
    for threshold in candidates {
        let true_pos = positives.iter().filter(|&&v| v > threshold).count();
        let true_neg = negatives.iter().filter(|&&v| v <= threshold).count();
        let accuracy = (true_pos + true_neg) as f64 / total as f64;
        if accuracy > best.0 {
            best = (accuracy, threshold);
        }
    }
    best
}

/// Counts of `values` in `bins` equal-width bins over `[low, high]`. The last
/// bin is closed; values outside the range are dropped. A degenerate range
/// puts everything in the first bin.
pub fn histogram(values: &[f64], low: f64, high: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    let width = (high - low) / bins as f64;
    for &v in values {
        if v < low || v > high {
            continue;
        }
        let bin = if width > 0.0 {
            (((v - low) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[bin] += 1;
    }
    counts
}

/// Minimum and maximum of a slice, ignoring NaN
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
