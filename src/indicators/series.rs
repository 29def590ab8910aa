//! Rolling-window series primitives
//!
//! Every function returns a vector the same length as its input. Positions
//! without a full window hold `f64::NAN`.

/// Simple moving average over `period` values
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = sum / period as f64;
        }
    }
    out
}

/// Exponential moving average with span `period`
///
/// alpha = 2/(n+1), seeded with the first value (no warmup).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let alpha = 2.0 / (period as f64 + 1.0);

    let mut prev: Option<f64> = None;
    for value in values {
        let next = match prev {
            Some(p) => p + alpha * (value - p),
            None => *value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Relative Strength Index from rolling average gain and loss
///
/// The first bar counts as a zero move. RS is taken as 0 when the average
/// loss is 0, so a window with no down moves reads 0 rather than undefined.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    let avg_gain = sma(&gains, period);
    let avg_loss = sma(&losses, period);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(gain, loss)| {
            if gain.is_nan() || loss.is_nan() {
                return f64::NAN;
            }
            let rs = if *loss == 0.0 { 0.0 } else { gain / loss };
            100.0 - 100.0 / (1.0 + rs)
        })
        .collect()
}

/// True range per bar; the first bar uses high - low
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            if i == 0 {
                return range;
            }
            let prev_close = closes[i - 1];
            range
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .collect()
}

/// Average true range as a rolling mean of true range
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    sma(&true_range(highs, lows, closes), period)
}

/// Simple returns over `lookback` bars
pub fn pct_change(values: &[f64], lookback: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if lookback == 0 || i < lookback {
                f64::NAN
            } else {
                values[i] / values[i - lookback] - 1.0
            }
        })
        .collect()
}

/// Difference over `lookback` bars
pub fn diff(values: &[f64], lookback: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if lookback == 0 || i < lookback {
                f64::NAN
            } else {
                values[i] - values[i - lookback]
            }
        })
        .collect()
}

/// Sample standard deviation (n - 1) over `period` values
///
/// Any NaN inside the window yields NaN.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period < 2 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (period - 1) as f64;
        out[i] = variance.sqrt();
    }
    out
}
