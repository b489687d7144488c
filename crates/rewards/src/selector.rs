//! Weighted random selection.
//!
//! Draw `r` uniformly from `[0, total_weight)` and walk the candidates in
//! order, subtracting weights until `r` falls inside a candidate's span.
//! Selection probability is exactly proportional to weight, and a seeded RNG
//! makes the sequence reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Selection input errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    /// Nothing to choose from
    #[error("no candidates to select from")]
    Empty,

    /// A weight was zero, negative or not finite
    #[error("candidate {index} has invalid weight {weight}; weights must be > 0")]
    InvalidWeight {
        /// Position of the candidate
        index: usize,
        /// Offending weight
        weight: f64,
    },
}

/// Anything with a selection weight.
pub trait Weighted {
    /// Selection weight, must be > 0.
    fn weight(&self) -> f64;
}

impl Weighted for f64 {
    fn weight(&self) -> f64 {
        *self
    }
}

/// Weighted selector over an owned random source.
#[derive(Debug, Clone)]
pub struct WeightedSelector<R: Rng = StdRng> {
    rng: R,
}

impl WeightedSelector<StdRng> {
    /// Selector seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic selector.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> WeightedSelector<R> {
    /// Selector over the given random source.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Pick an index with probability proportional to its weight.
    pub fn select<T: Weighted>(&mut self, candidates: &[T]) -> Result<usize, SelectionError> {
        let total = total_weight(candidates)?;
        let r = self.rng.gen_range(0.0..total);
        Ok(pick_at(candidates, r))
    }

    /// Pick a candidate by reference.
    pub fn choose<'a, T: Weighted>(&mut self, candidates: &'a [T]) -> Result<&'a T, SelectionError> {
        let index = self.select(candidates)?;
        Ok(&candidates[index])
    }
}

/// Validate weights and return their sum.
pub fn total_weight<T: Weighted>(candidates: &[T]) -> Result<f64, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::Empty);
    }
    let mut total = 0.0;
    for (index, c) in candidates.iter().enumerate() {
        let weight = c.weight();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(SelectionError::InvalidWeight { index, weight });
        }
        total += weight;
    }
    Ok(total)
}

/// Walk the candidates with a draw `r` in `[0, total)`.
///
/// Rounding can leave `r` marginally past the last span; the last candidate
/// absorbs it.
pub fn pick_at<T: Weighted>(candidates: &[T], mut r: f64) -> usize {
    for (index, c) in candidates.iter().enumerate() {
        let weight = c.weight();
        if r < weight {
            return index;
        }
        r -= weight;
    }
    candidates.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_error() {
        let mut selector = WeightedSelector::seeded(1);
        let none: [f64; 0] = [];
        assert_eq!(selector.select(&none), Err(SelectionError::Empty));
    }

    #[test]
    fn test_zero_weight_is_error() {
        let mut selector = WeightedSelector::seeded(1);
        assert_eq!(
            selector.select(&[1.0, 0.0, 2.0]),
            Err(SelectionError::InvalidWeight { index: 1, weight: 0.0 })
        );
        assert!(selector.select(&[1.0, -3.0]).is_err());
        assert!(selector.select(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_pick_at_spans() {
        let weights = [1.0, 1.0, 2.0];
        assert_eq!(pick_at(&weights, 0.0), 0);
        assert_eq!(pick_at(&weights, 0.99), 0);
        assert_eq!(pick_at(&weights, 1.0), 1);
        assert_eq!(pick_at(&weights, 2.0), 2);
        assert_eq!(pick_at(&weights, 3.99), 2);
        assert_eq!(pick_at(&weights, 4.0), 2);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let mut a = WeightedSelector::seeded(42);
        let mut b = WeightedSelector::seeded(42);
        let xs: Vec<usize> = (0..50).map(|_| a.select(&weights).unwrap()).collect();
        let ys: Vec<usize> = (0..50).map(|_| b.select(&weights).unwrap()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_frequencies_converge_to_weights() {
        let weights = [1.0, 1.0, 2.0];
        let mut selector = WeightedSelector::seeded(7);
        let n = 200_000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            counts[selector.select(&weights).unwrap()] += 1;
        }
        let freq: Vec<f64> = counts.iter().map(|c| *c as f64 / n as f64).collect();
        assert!((freq[0] - 0.25).abs() < 0.01, "{freq:?}");
        assert!((freq[1] - 0.25).abs() < 0.01, "{freq:?}");
        assert!((freq[2] - 0.50).abs() < 0.01, "{freq:?}");
    }

    #[test]
    fn test_single_candidate_always_chosen() {
        let mut selector = WeightedSelector::seeded(3);
        for _ in 0..10 {
            assert_eq!(selector.select(&[0.5]).unwrap(), 0);
        }
    }
}
