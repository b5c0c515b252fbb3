//! Numeric conversion helpers for clock values.

use num_traits::cast::cast;

/// Convert a millisecond clock reading to `f64`, accepting precision loss
/// above 2^53 in this one place.
#[must_use]
pub fn ms_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_values_convert() {
        assert!((ms_to_f64(1_250) - 1_250.0).abs() < f64::EPSILON);
        assert!((ms_to_f64(u64::MAX) - 1.844_674_407_370_955_2e19).abs() < 1e4);
    }
}
