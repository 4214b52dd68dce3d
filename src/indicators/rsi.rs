// =============================================================================
// Relative Strength Index (RSI), Wilder smoothing
// =============================================================================
//
// Gains and losses are the positive and negative parts of consecutive close
// differences.  The first averages are plain means over the first `period`
// differences; each later difference updates them as
//
//     avg = (avg * (period - 1) + x) / period
//
// and the index is `100 * avg_gain / (avg_gain + avg_loss)`.  A window with
// no movement at all (both averages zero) scores 0, as TA-Lib does.
// =============================================================================

/// RSI over `closes`, one value per close from index `period` onward.
///
/// Empty when `period` is zero or there are fewer than `period + 1` closes.
/// A non-finite value ends the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let mut moves = closes.windows(2).map(|w| split_move(w[1] - w[0]));
    let n = period as f64;

    let (mut avg_gain, mut avg_loss) = moves
        .by_ref()
        .take(period)
        .fold((0.0, 0.0), |(g, l), (up, down)| (g + up, l + down));
    avg_gain /= n;
    avg_loss /= n;

    let mut out = Vec::with_capacity(closes.len() - period);
    let Some(first) = strength_index(avg_gain, avg_loss) else {
        return out;
    };
    out.push(first);

    for (up, down) in moves {
        avg_gain = (avg_gain * (n - 1.0) + up) / n;
        avg_loss = (avg_loss * (n - 1.0) + down) / n;
        match strength_index(avg_gain, avg_loss) {
            Some(v) => out.push(v),
            None => break,
        }
    }

    out
}

/// `(gain, loss)` of one close-to-close move, both non-negative.
fn split_move(delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (delta, 0.0)
    } else {
        (0.0, -delta)
    }
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let total = avg_gain + avg_loss;
    let rsi = if total == 0.0 { 0.0 } else { 100.0 * avg_gain / total };
    rsi.is_finite().then_some(rsi)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (1..=n).map(|x| x as f64).collect()
    }

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn rsi_needs_period_plus_one_closes() {
        assert!(calculate_rsi(&ramp(14), 14).is_empty());
        assert_eq!(calculate_rsi(&ramp(15), 14).len(), 1);
    }

    #[test]
    fn rsi_only_gains_is_100() {
        let series = calculate_rsi(&ramp(30), 14);
        assert_eq!(series.len(), 16);
        assert!(series.iter().all(|&v| (v - 100.0).abs() < 1e-10));
    }

    #[test]
    fn rsi_only_losses_is_0() {
        let mut closes = ramp(30);
        closes.reverse();
        let series = calculate_rsi(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| v.abs() < 1e-10));
    }

    #[test]
    fn rsi_unchanged_closes_score_zero() {
        assert_eq!(calculate_rsi(&[100.0; 16], 14), vec![0.0, 0.0]);
    }

    #[test]
    fn rsi_flat_stretch_after_movement_keeps_last_balance() {
        // Once there has been movement, flat days decay both averages
        // equally and the ratio is unchanged.
        let mut closes = vec![10.0, 11.0, 10.0, 11.0];
        closes.extend([11.0; 5]);
        let series = calculate_rsi(&closes, 3);
        let first = series[0];
        assert!(series.iter().all(|&v| (v - first).abs() < 1e-9), "{series:?}");
    }

    #[test]
    fn rsi_wilder_reference_value() {
        // Wilder's worked example; first 14-period RSI is about 70.46.
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28,
        ];
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 1);
        assert!((series[0] - 70.464).abs() < 0.01, "got {}", series[0]);
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for v in calculate_rsi(&closes, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_stops_at_non_finite_close() {
        let mut closes = ramp(20);
        closes[17] = f64::NAN;
        // Values for indices 14..=16 are defined, the NaN move ends the series.
        assert_eq!(calculate_rsi(&closes, 14).len(), 3);
    }
}
