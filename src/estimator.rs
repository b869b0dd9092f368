//! Attendee-count estimation.
//!
//! Counts come from one of three paths:
//! - amount-based, matching bracket: uniform draw from the bracket's range
//! - amount-based, no bracket: `max(2, round(amount / cost_per_person))`
//! - amount-based disabled: uniform draw from `min_attendees..=max_attendees`
//!
//! The random source is always passed in, so tests can use a seeded RNG.

use crate::constants::{
    ATTENDEE_SLOTS, DEFAULT_COST_PER_PERSON, DEFAULT_MAX_ATTENDEES, DEFAULT_MIN_ATTENDEES,
    FALLBACK_MIN_ATTENDEES,
};
use crate::models::AmountBracket;
use rand::Rng;
use thiserror::Error;

/// Reasons a bracket table is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BracketError {
    #[error("no brackets configured")]
    Empty,

    #[error("bracket {min}-{max}: amount range must satisfy 0 <= min < max")]
    InvalidRange { min: f64, max: f64 },

    #[error("bracket {min}-{max}: attendee range {low}..={high} must lie within 1..={limit}")]
    InvalidAttendees {
        min: f64,
        max: f64,
        low: usize,
        high: usize,
        limit: usize,
    },

    #[error("brackets overlap at {at}")]
    Overlap { at: f64 },

    #[error("gap between {from} and {to}")]
    Gap { from: f64, to: f64 },
}

/// Validated, sorted, contiguous set of amount brackets
#[derive(Debug, Clone, PartialEq)]
pub struct BracketTable {
    brackets: Vec<AmountBracket>,
}

impl BracketTable {
    /// Validate brackets: each range well-formed, no overlaps, no gaps.
    ///
    /// Edges are half-open, so neighbours must share a boundary exactly
    /// (`next.min_amount == prev.max_amount`).
    pub fn new(mut brackets: Vec<AmountBracket>) -> Result<Self, BracketError> {
        if brackets.is_empty() {
            return Err(BracketError::Empty);
        }

        for b in &brackets {
            if !(b.min_amount >= 0.0 && b.min_amount < b.max_amount) {
                return Err(BracketError::InvalidRange {
                    min: b.min_amount,
                    max: b.max_amount,
                });
            }
            if b.min_attendees < 1 || b.min_attendees > b.max_attendees || b.max_attendees > ATTENDEE_SLOTS {
                return Err(BracketError::InvalidAttendees {
                    min: b.min_amount,
                    max: b.max_amount,
                    low: b.min_attendees,
                    high: b.max_attendees,
                    limit: ATTENDEE_SLOTS,
                });
            }
        }

        brackets.sort_by(|a, b| a.min_amount.total_cmp(&b.min_amount));

        for pair in brackets.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.min_amount < prev.max_amount {
                return Err(BracketError::Overlap { at: next.min_amount });
            }
            if next.min_amount > prev.max_amount {
                return Err(BracketError::Gap {
                    from: prev.max_amount,
                    to: next.min_amount,
                });
            }
        }

        Ok(Self { brackets })
    }

    pub fn find(&self, amount: f64) -> Option<&AmountBracket> {
        self.brackets.iter().find(|b| b.contains(amount))
    }

    pub fn brackets(&self) -> &[AmountBracket] {
        &self.brackets
    }
}

/// Amount-based estimation settings
#[derive(Debug, Clone, PartialEq)]
pub struct AmountBased {
    pub brackets: BracketTable,
    pub cost_per_person: f64,
}

/// Which path produced an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
    Bracket,
    PerPerson,
    Uniform,
}

/// Stateless attendee-count estimator
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEstimator {
    min_attendees: usize,
    max_attendees: usize,
    amount_based: Option<AmountBased>,
}

impl Default for AttendanceEstimator {
    fn default() -> Self {
        Self {
            min_attendees: DEFAULT_MIN_ATTENDEES,
            max_attendees: DEFAULT_MAX_ATTENDEES,
            amount_based: None,
        }
    }
}

impl AttendanceEstimator {
    /// Uniform estimator over `min..=max` (bounds assumed validated)
    pub fn uniform(min_attendees: usize, max_attendees: usize) -> Self {
        Self {
            min_attendees,
            max_attendees,
            amount_based: None,
        }
    }

    /// Enable amount-based estimation
    pub fn with_amount_based(mut self, amount_based: AmountBased) -> Self {
        self.amount_based = Some(amount_based);
        self
    }

    pub fn is_amount_based(&self) -> bool {
        self.amount_based.is_some()
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.min_attendees, self.max_attendees)
    }

    /// Estimate the attendee count for `amount`
    pub fn estimate<R: Rng + ?Sized>(&self, amount: f64, rng: &mut R) -> usize {
        self.estimate_with_source(amount, rng).0
    }

    /// Estimate and report which path was taken
    pub fn estimate_with_source<R: Rng + ?Sized>(
        &self,
        amount: f64,
        rng: &mut R,
    ) -> (usize, EstimateSource) {
        let Some(amount_based) = &self.amount_based else {
            let count = rng.gen_range(self.min_attendees..=self.max_attendees);
            return (count, EstimateSource::Uniform);
        };

        if let Some(bracket) = amount_based.brackets.find(amount) {
            let count = rng.gen_range(bracket.min_attendees..=bracket.max_attendees);
            return (count, EstimateSource::Bracket);
        }

        (
            per_person_estimate(amount, amount_based.cost_per_person),
            EstimateSource::PerPerson,
        )
    }
}

/// `max(2, round(amount / cost_per_person))`, capped at the slot count
pub fn per_person_estimate(amount: f64, cost_per_person: f64) -> usize {
    let divisor = if cost_per_person > 0.0 {
        cost_per_person
    } else {
        DEFAULT_COST_PER_PERSON
    };
    let raw = (amount / divisor).round();
    let count = if raw.is_finite() && raw > 0.0 { raw as usize } else { 0 };
    count.clamp(FALLBACK_MIN_ATTENDEES, ATTENDEE_SLOTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn bracket(min: f64, max: f64, low: usize, high: usize) -> AmountBracket {
        AmountBracket {
            min_amount: min,
            max_amount: max,
            min_attendees: low,
            max_attendees: high,
        }
    }

    fn amount_based() -> AttendanceEstimator {
        let table = BracketTable::new(vec![
            bracket(5000.0, 10000.0, 3, 4),
            bracket(0.0, 5000.0, 2, 2),
            bracket(10000.0, 20000.0, 5, 6),
        ])
        .unwrap();
        AttendanceEstimator::default().with_amount_based(AmountBased {
            brackets: table,
            cost_per_person: 3000.0,
        })
    }

    #[test]
    fn test_uniform_estimates_stay_in_bounds() {
        let estimator = AttendanceEstimator::uniform(2, 8);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let count = estimator.estimate(1_000_000.0, &mut rng);
            assert!((2..=8).contains(&count));
        }
    }

    #[test]
    fn test_uniform_estimate_ignores_amount() {
        let estimator = AttendanceEstimator::uniform(4, 4);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(estimator.estimate(-50.0, &mut rng), 4);
        assert_eq!(estimator.estimate(0.0, &mut rng), 4);
    }

    #[test]
    fn test_bracket_boundaries_are_half_open() {
        let estimator = amount_based();
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(estimator.estimate(0.0, &mut rng), 2);
        assert_eq!(estimator.estimate(4999.0, &mut rng), 2);

        let (count, source) = estimator.estimate_with_source(5000.0, &mut rng);
        assert_eq!(source, EstimateSource::Bracket);
        assert!((3..=4).contains(&count));

        let (count, _) = estimator.estimate_with_source(9999.99, &mut rng);
        assert!((3..=4).contains(&count));

        let (count, _) = estimator.estimate_with_source(10000.0, &mut rng);
        assert!((5..=6).contains(&count));
    }

    #[test]
    fn test_amount_outside_brackets_uses_per_person_fallback() {
        let estimator = amount_based();
        let mut rng = StdRng::seed_from_u64(3);

        let (count, source) = estimator.estimate_with_source(20000.0, &mut rng);
        assert_eq!(source, EstimateSource::PerPerson);
        assert_eq!(count, 7); // round(20000 / 3000) = 7

        let (count, source) = estimator.estimate_with_source(-3000.0, &mut rng);
        assert_eq!(source, EstimateSource::PerPerson);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_per_person_estimate() {
        assert_eq!(per_person_estimate(0.0, 3000.0), 2);
        assert_eq!(per_person_estimate(-10.0, 3000.0), 2);
        assert_eq!(per_person_estimate(4000.0, 3000.0), 2);
        assert_eq!(per_person_estimate(12000.0, 3000.0), 4);
        assert_eq!(per_person_estimate(13600.0, 3000.0), 5);
        assert_eq!(per_person_estimate(90000.0, 3000.0), ATTENDEE_SLOTS);
    }

    #[test]
    fn test_bracket_table_rejects_overlap() {
        let err = BracketTable::new(vec![bracket(0.0, 5000.0, 2, 2), bracket(4000.0, 9000.0, 3, 4)])
            .unwrap_err();
        assert_eq!(err, BracketError::Overlap { at: 4000.0 });
    }

    #[test]
    fn test_bracket_table_rejects_gap() {
        let err = BracketTable::new(vec![bracket(0.0, 5000.0, 2, 2), bracket(5001.0, 9000.0, 3, 4)])
            .unwrap_err();
        assert_eq!(
            err,
            BracketError::Gap {
                from: 5000.0,
                to: 5001.0
            }
        );
    }

    #[test]
    fn test_bracket_table_rejects_bad_ranges() {
        assert_eq!(BracketTable::new(vec![]).unwrap_err(), BracketError::Empty);
        assert!(matches!(
            BracketTable::new(vec![bracket(5000.0, 5000.0, 2, 2)]).unwrap_err(),
            BracketError::InvalidRange { .. }
        ));
        assert!(matches!(
            BracketTable::new(vec![bracket(0.0, 5000.0, 3, 2)]).unwrap_err(),
            BracketError::InvalidAttendees { .. }
        ));
        assert!(matches!(
            BracketTable::new(vec![bracket(0.0, 5000.0, 2, 9)]).unwrap_err(),
            BracketError::InvalidAttendees { .. }
        ));
    }

    #[test]
    fn test_bracket_table_sorts_input() {
        let estimator = amount_based();
        let amount_based = estimator.amount_based.as_ref().unwrap();
        let mins: Vec<f64> = amount_based
            .brackets
            .brackets()
            .iter()
            .map(|b| b.min_amount)
            .collect();
        assert_eq!(mins, vec![0.0, 5000.0, 10000.0]);
    }
}
