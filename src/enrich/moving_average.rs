/// Trailing moving average over `window` points.
///
/// Position `i` averages `values[i + 1 - window..=i]`. The first
/// `window - 1` positions have no full window and are `None`; a zero window
/// yields all `None`.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let mut result = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }

        if i + 1 >= window {
            result.push(Some(sum / window as f64));
        } else {
            result.push(None);
        }
    }

    result
}
