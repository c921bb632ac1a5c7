//! Prime factorisation by trial division.
//!
//! Factors are produced in non-decreasing order, so multiplying them back
//! together reconstructs the input. The search is resumable: each call to
//! [`PrimeFactors::poll_next`] performs at most `budget` trial divisions and
//! reports [`FactorStatus::Pending`] if no factor turned up, letting an async
//! caller yield and check for cancellation between slices of work.

/// Result of one bounded step of the factor search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactorStatus {
    /// The next factor in non-decreasing order.
    Ready { factor: u64 },
    /// The trial budget ran out before a factor was found.
    Pending,
    /// The remainder reached one; there are no more factors.
    Done,
}

/// Resumable trial-division state for a single number.
#[derive(Clone, Debug)]
pub struct PrimeFactors {
    remaining: u64,
    divisor: u64,
}

impl PrimeFactors {
    /// Starts factorising `number`. Zero and one have no prime factors.
    pub const fn new(number: u64) -> Self {
        Self {
            remaining: if number == 0 { 1 } else { number },
            divisor: 2,
        }
    }

    /// Runs at most `budget` trial divisions looking for the next factor.
    pub fn poll_next(&mut self, budget: u32) -> FactorStatus {
        for _ in 0..budget.max(1) {
            if self.remaining <= 1 {
                return FactorStatus::Done;
            }

            if self.remaining % self.divisor == 0 {
                self.remaining /= self.divisor;
                return FactorStatus::Ready {
                    factor: self.divisor,
                };
            }

            // No divisor up to the square root: the remainder is prime.
            if self.divisor.saturating_mul(self.divisor) > self.remaining {
                let factor = self.remaining;
                self.remaining = 1;
                return FactorStatus::Ready { factor };
            }

            self.divisor += 1;
        }

        if self.remaining <= 1 {
            FactorStatus::Done
        } else {
            FactorStatus::Pending
        }
    }
}

impl Iterator for PrimeFactors {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            match self.poll_next(u32::MAX) {
                FactorStatus::Ready { factor } => return Some(factor),
                FactorStatus::Pending => continue,
                FactorStatus::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_prime(n: u64) -> bool {
        n >= 2 && (2..).take_while(|d| d * d <= n).all(|d| n % d != 0)
    }

    #[test]
    fn factors_of_one_hundred() {
        assert_eq!(PrimeFactors::new(100).collect::<Vec<_>>(), vec![2, 2, 5, 5]);
    }

    #[test]
    fn one_and_zero_have_no_factors() {
        assert_eq!(PrimeFactors::new(1).count(), 0);
        assert_eq!(PrimeFactors::new(0).count(), 0);
    }

    #[test]
    fn factors_are_sorted_prime_and_multiply_back() {
        for n in (2..5_000).chain([120, 1_000_003, 600_851_475_143, 9_699_690]) {
            let factors: Vec<_> = PrimeFactors::new(n).collect();
            assert!(factors.windows(2).all(|w| w[0] <= w[1]), "{n}: {factors:?}");
            assert!(factors.iter().all(|&f| is_prime(f)), "{n}: {factors:?}");
            assert_eq!(factors.iter().product::<u64>(), n);
        }
    }

    #[test]
    fn large_prime_is_emitted_whole() {
        let p = 2_147_483_647; // 2^31 - 1
        assert_eq!(PrimeFactors::new(p).collect::<Vec<_>>(), vec![p]);
        assert_eq!(
            PrimeFactors::new(2 * p).collect::<Vec<_>>(),
            vec![2, p]
        );
    }

    #[test]
    fn small_budget_reports_pending_then_resumes() {
        // 10007 is prime; finding that takes ~100 trial divisions.
        let mut factors = PrimeFactors::new(10_007);
        assert_eq!(factors.poll_next(4), FactorStatus::Pending);

        let mut polls = 1;
        let factor = loop {
            polls += 1;
            match factors.poll_next(4) {
                FactorStatus::Ready { factor } => break factor,
                FactorStatus::Pending => continue,
                FactorStatus::Done => panic!("ran out of factors"),
            }
        };

        assert_eq!(factor, 10_007);
        assert!(polls > 2);
        assert_eq!(factors.poll_next(4), FactorStatus::Done);
    }
}
