//! Call-scoped accumulators for the streaming calculator calls.
//!
//! Each call owns its accumulator as a local value; nothing here is shared or
//! synchronised.

use quill_tonic_core::{Error, Result};

/// Running average over a client stream.
///
/// The sum is kept exactly in an `i128`, so the only rounding happens in the
/// final division regardless of how many numbers were pushed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Average {
    count: u64,
    sum: i128,
}

impl Average {
    pub fn push(&mut self, number: i64) {
        self.count += 1;
        self.sum += i128::from(number);
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The average of every number pushed so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if nothing was pushed.
    pub fn finish(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(Error::invalid_argument(
                "At least one number is required to compute an average",
            ));
        }

        Ok(self.sum as f64 / self.count as f64)
    }
}

/// Maximum of every number seen so far on a bidirectional stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunningMax {
    max: Option<i64>,
}

impl RunningMax {
    /// Folds `number` in and returns the maximum including it.
    pub fn push(&mut self, number: i64) -> i64 {
        let max = self.max.map_or(number, |max| max.max(number));
        self.max = Some(max);
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_one_to_ten() {
        let mut avg = Average::default();
        (1..=10).for_each(|n| avg.push(n));
        assert_eq!(avg.count(), 10);
        assert_eq!(avg.finish().unwrap(), 5.5);
    }

    #[test]
    fn average_with_no_input_is_invalid_argument() {
        let err = Average::default().finish().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn average_does_not_overflow_on_extremes() {
        let mut avg = Average::default();
        for _ in 0..1_000 {
            avg.push(i64::MAX);
        }
        assert_eq!(avg.finish().unwrap(), i64::MAX as f64);

        let mut mixed = Average::default();
        [i64::MIN, i64::MAX, 1].into_iter().for_each(|n| mixed.push(n));
        assert_eq!(mixed.finish().unwrap(), 0.0);
    }

    #[test]
    fn running_max_follows_the_prefix_maximum() {
        let inputs = [1, 2, 100, 4, 5, 30, 7, 8, 9, 10];
        let mut max = RunningMax::default();
        let outputs: Vec<_> = inputs.iter().map(|&n| max.push(n)).collect();
        assert_eq!(outputs, [1, 2, 100, 100, 100, 100, 100, 100, 100, 100]);
    }

    #[test]
    fn running_max_handles_negative_first_value() {
        let mut max = RunningMax::default();
        assert_eq!(max.push(-5), -5);
        assert_eq!(max.push(-7), -5);
        assert_eq!(max.push(-1), -1);
    }
}
