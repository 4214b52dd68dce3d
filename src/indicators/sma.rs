// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the last `period` closes, rolled forward one close at a
// time.  First value at index `period - 1`.
// =============================================================================

/// Compute the SMA series for `closes` over `period`.
///
/// Returns an empty `Vec` when `period == 0` or the input is shorter than
/// `period`. Element `k` of the output covers `closes[k..k + period]`.
///
/// A non-finite close ends the series: no value is produced for any window
/// that contains it or comes after it.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    if !sum.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        if !sum.is_finite() {
            break;
        }
        result.push(sum / period_f);
    }

    result
}
