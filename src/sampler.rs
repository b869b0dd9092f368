//! Attendee-id sampling from the reference roster.
//!
//! The primary slot is a weighted draw over a small set of candidate ids;
//! the remaining slots are drawn uniformly without replacement from the
//! rest of the roster. The result is sorted numerically and padded to
//! [`ATTENDEE_SLOTS`] entries.

use crate::constants::{ATTENDEE_SLOTS, DEFAULT_PRIMARY_ID_WEIGHTS, WEIGHT_SUM_TOLERANCE};
use crate::error::{Result, SaisonError};
use crate::models::AttendeeSlots;
use crate::roster::{Roster, numeric_id_order};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::trace;

/// Validated id → weight mapping for the primary slot
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryWeights {
    weights: Vec<(String, f64)>,
}

impl Default for PrimaryWeights {
    fn default() -> Self {
        Self {
            weights: DEFAULT_PRIMARY_ID_WEIGHTS
                .iter()
                .map(|(id, w)| (id.to_string(), *w))
                .collect(),
        }
    }
}

impl PrimaryWeights {
    /// Weights must be non-empty, finite, non-negative and sum to 1.0
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(SaisonError::configuration(
                "primary_id_weights must name at least one id",
            ));
        }
        if let Some((id, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(SaisonError::configuration(format!(
                "primary_id_weights['{}'] = {} must be a non-negative number",
                id, w
            )));
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SaisonError::configuration(format!(
                "primary_id_weights must sum to 1.0 (got {})",
                total
            )));
        }

        let mut weights: Vec<(String, f64)> = weights.into_iter().collect();
        weights.sort_by(|a, b| numeric_id_order(&a.0, &b.0));
        Ok(Self { weights })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(id, w)| (id.as_str(), *w))
    }
}

/// Draws attendee ids for one row at a time
#[derive(Debug, Clone, Default)]
pub struct RosterSampler {
    weights: PrimaryWeights,
}

impl RosterSampler {
    pub fn new(weights: PrimaryWeights) -> Self {
        Self { weights }
    }

    /// Weighted draw over the candidates present in the roster.
    ///
    /// Returns `None` when no candidate with positive weight is in the roster.
    pub fn draw_primary<R: Rng + ?Sized>(&self, roster: &Roster, rng: &mut R) -> Option<String> {
        let candidates: Vec<(&str, f64)> = self
            .weights
            .iter()
            .filter(|(id, w)| *w > 0.0 && roster.contains(id))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let index = WeightedIndex::new(candidates.iter().map(|(_, w)| *w)).ok()?;
        Some(candidates[index.sample(rng)].0.to_string())
    }

    /// Pick `count` distinct ids, sorted numerically and padded to the slot count.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        roster: &Roster,
        rng: &mut R,
    ) -> Result<AttendeeSlots> {
        if count > roster.len() {
            return Err(SaisonError::InsufficientAttendees {
                requested: count,
                available: roster.len(),
            });
        }
        let count = count.min(ATTENDEE_SLOTS);
        if count == 0 {
            return Ok(AttendeeSlots::default());
        }

        let mut chosen: Vec<String> = Vec::with_capacity(count);
        if let Some(primary) = self.draw_primary(roster, rng) {
            chosen.push(primary);
        }

        let remaining: Vec<&str> = roster
            .ids()
            .filter(|id| !chosen.iter().any(|c| c == id))
            .collect();
        chosen.extend(
            remaining
                .choose_multiple(rng, count - chosen.len())
                .map(|id| id.to_string()),
        );

        chosen.sort_by(|a, b| numeric_id_order(a, b));
        trace!("Sampled attendees {:?}", chosen);
        Ok(AttendeeSlots::from_ids(chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attendee;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn roster(ids: &[&str]) -> Roster {
        Roster::new(
            ids.iter()
                .map(|id| Attendee {
                    id: id.to_string(),
                    name: format!("Person {}", id),
                    title: String::new(),
                    company: String::new(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn weights(pairs: &[(&str, f64)]) -> Result<PrimaryWeights> {
        PrimaryWeights::new(pairs.iter().map(|(id, w)| (id.to_string(), *w)).collect())
    }

    #[test]
    fn test_primary_draw_follows_default_weights() {
        let roster = roster(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        let sampler = RosterSampler::default();
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 1000;
        let twos = (0..draws)
            .filter(|_| sampler.draw_primary(&roster, &mut rng).as_deref() == Some("2"))
            .count();
        let share = twos as f64 / draws as f64;
        assert!((0.85..=0.95).contains(&share), "share of '2' was {}", share);
    }

    #[test]
    fn test_sample_is_sorted_distinct_and_padded() {
        let roster = roster(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"]);
        let sampler = RosterSampler::default();
        let mut rng = StdRng::seed_from_u64(9);

        for count in 1..=ATTENDEE_SLOTS {
            let slots = sampler.sample(count, &roster, &mut rng).unwrap();
            assert_eq!(slots.filled(), count);
            assert_eq!(slots.cells().count(), ATTENDEE_SLOTS);

            let ids: Vec<u64> = slots.ids().map(|id| id.parse().unwrap()).collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(ids, sorted);
            assert!(ids.contains(&1) || ids.contains(&2));
        }
    }

    #[test]
    fn test_whole_roster_can_be_drawn() {
        let roster = roster(&["3", "1", "2"]);
        let mut rng = StdRng::seed_from_u64(5);
        let slots = RosterSampler::default().sample(3, &roster, &mut rng).unwrap();
        assert_eq!(slots.ids().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_count_larger_than_roster_fails() {
        let roster = roster(&["1", "2"]);
        let mut rng = StdRng::seed_from_u64(5);
        let err = RosterSampler::default().sample(3, &roster, &mut rng).unwrap_err();
        match err {
            SaisonError::InsufficientAttendees {
                requested,
                available,
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientAttendees, got {:?}", other),
        }
    }

    #[test]
    fn test_candidates_missing_from_roster_fall_back_to_uniform() {
        let roster = roster(&["5", "6", "7"]);
        let sampler = RosterSampler::default();
        let mut rng = StdRng::seed_from_u64(11);
        assert!(sampler.draw_primary(&roster, &mut rng).is_none());

        let slots = sampler.sample(2, &roster, &mut rng).unwrap();
        assert_eq!(slots.filled(), 2);
        assert!(slots.ids().all(|id| roster.contains(id)));
    }

    #[test]
    fn test_only_present_candidate_is_drawn() {
        let roster = roster(&["1", "3", "4"]);
        let sampler = RosterSampler::default();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            assert_eq!(sampler.draw_primary(&roster, &mut rng).as_deref(), Some("1"));
        }
    }

    #[test]
    fn test_weights_validation() {
        assert!(weights(&[("2", 0.9), ("1", 0.1)]).is_ok());
        assert!(weights(&[("7", 1.0)]).is_ok());
        assert!(weights(&[]).is_err());
        assert!(weights(&[("2", 0.5), ("1", 0.4)]).is_err());
        assert!(weights(&[("2", 1.2), ("1", -0.2)]).is_err());
    }
}
