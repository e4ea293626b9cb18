use std::time::Duration;

/// Arithmetic mean; `None` for an empty sample set so callers cannot
/// mistake "no signal" for a zero rate.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |best, v| match best {
        Some(b) if b >= v => Some(b),
        _ => Some(v),
    })
}

pub fn mean_duration(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<Duration>() / samples.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_uniform_values_is_that_value() {
        assert_eq!(mean(&[42.0, 42.0, 42.0]), Some(42.0));
    }

    #[test]
    fn empty_sets_have_no_reduction() {
        assert_eq!(mean(&[]), None);
        assert_eq!(max(&[]), None);
        assert_eq!(mean_duration(&[]), None);
    }

    #[test]
    fn max_ignores_ordering() {
        assert_eq!(max(&[50.0, 70.0, 60.0]), Some(70.0));
    }

    #[test]
    fn duration_mean_rounds_down_to_nanos() {
        let samples = [Duration::from_millis(10), Duration::from_millis(20)];
        assert_eq!(mean_duration(&samples), Some(Duration::from_millis(15)));
    }
}
