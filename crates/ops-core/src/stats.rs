//! Scalar statistics used by the uncertainty engines.
//!
//! All functions take plain slices; percentile/CVaR callers are expected to
//! pass ascending-sorted data.

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation; 0 for an empty slice.
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Percentile with linear interpolation over an ascending-sorted slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * (pct / 100.0);
    let f = k.floor() as usize;
    let c = (k.ceil() as usize).min(sorted.len() - 1);
    if f == c {
        return sorted[f];
    }
    sorted[f] * (c as f64 - k) + sorted[c] * (k - f as f64)
}

/// Conditional Value at Risk: mean of the worst `1 - confidence_pct/100`
/// fraction (highest values) of an ascending-sorted slice. The tail holds
/// at least one element.
pub fn cvar(sorted: &[f64], confidence_pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let tail_size = ((sorted.len() as f64 * (1.0 - confidence_pct / 100.0)).ceil() as usize).max(1);
    let tail = &sorted[sorted.len() - tail_size..];
    mean(tail)
}

/// Adjusted Fisher-Pearson sample skewness; 0 when n < 3 or the data is
/// constant. Positive = tail toward larger (worse, for minimization) values.
pub fn skewness(xs: &[f64], mean: f64, std_dev: f64) -> f64 {
    let n = xs.len();
    if std_dev == 0.0 || n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let sum_cubes: f64 = xs
        .iter()
        .map(|x| {
            let z = (x - mean) / std_dev;
            z * z * z
        })
        .sum();
    nf / ((nf - 1.0) * (nf - 2.0)) * sum_cubes
}

/// Pearson correlation coefficient; 0 when either series has no variance
/// or fewer than 2 points.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let ma = mean(&a[..n]);
    let mb = mean(&b[..n]);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for k in 0..n {
        let da = a[k] - ma;
        let db = b[k] - mb;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Round to 1 decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Round to 2 decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Round to 3 decimal places.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Round to 4 decimal places.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert!((percentile(&data, 90.0) - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_cvar_tail_mean() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        // Worst 10% of 10 points = the single largest value.
        assert_eq!(cvar(&data, 90.0), 10.0);
        // Worst 50% = mean of the top half.
        assert_eq!(cvar(&data, 50.0), 8.0);
        // CVaR dominates VaR at the same level.
        assert!(cvar(&data, 90.0) >= percentile(&data, 90.0));
    }

    #[test]
    fn test_skewness_symmetric_is_zero() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let m = mean(&data);
        let s = std_dev(&data);
        assert!(skewness(&data, m, s).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_perfect_anticorrelation() {
        let a = [1.0, 2.0, 3.0];
        let b = [6.0, 4.0, 2.0];
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_zero_variance_guard() {
        let a = [1.0, 1.0, 1.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(pearson(&a, &b), 0.0);
    }
}
