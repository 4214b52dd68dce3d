// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Seeded with the mean of the first `period` closes, then
//
//     ema = prev + k * (close - prev),   k = 2 / (period + 1)
//
// so the first value lines up with the first SMA value at index
// `period - 1`.  This is TA-Lib's default seeding, which the `/ema` route
// reproduces.
// =============================================================================

/// EMA values for `closes`, the first aligned with index `period - 1`.
///
/// Empty for a zero period or fewer than `period` closes. Stops at the first
/// non-finite value.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let (head, tail) = closes.split_at(period);
    let seed = head.iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(tail.len() + 1);
    out.push(seed);

    let mut prev = seed;
    for &close in tail {
        let next = prev + k * (close - prev);
        if !next.is_finite() {
            break;
        }
        out.push(next);
        prev = next;
    }

    out
}
