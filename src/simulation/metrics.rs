/// Percentile of an ascending slice, `q` in [0, 100], with linear
/// interpolation between neighbouring order statistics. NaN when empty.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

#[inline]
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (divides by n).
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HistogramBin {
    pub bin_low: f64,
    pub bin_high: f64,
    pub count: usize,
    /// count / total samples
    pub frequency: f64,
    pub is_profit: bool,
}

/// Equal-width histogram over [min, max]. The last bin is closed on the right.
/// A constant sample is spread over [v - 0.5, v + 0.5].
pub fn histogram(values: &[f64], n_bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || n_bins == 0 {
        return Vec::new();
    }
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / n_bins as f64;

    let mut counts = vec![0usize; n_bins];
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(n_bins - 1);
        counts[idx] += 1;
    }

    let total = values.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let bin_low = lo + width * i as f64;
            let bin_high = if i + 1 == n_bins { hi } else { lo + width * (i + 1) as f64 };
            HistogramBin {
                bin_low,
                bin_high,
                count,
                frequency: count as f64 / total,
                is_profit: bin_low >= 0.0,
            }
        })
        .collect()
}
