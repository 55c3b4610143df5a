//! Converts a raw candidate list into a strictly ordered priority sequence.
//!
//! The ranking blends a first-come-first-served component with a seeded
//! random component, so early registration is rewarded without making the
//! outcome fully deterministic from registration times alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::candidate::Candidate;

/// Weight of the first-come-first-served component in the final score.
pub const FCFS_SHARE: f64 = 0.7;
/// Weight of the random component in the final score.
pub const RANDOM_SHARE: f64 = 0.3;

/// A candidate with its computed ranking state. Produced once per round by
/// [rank_candidates]; `rank` 1 is the highest priority.
#[derive(Clone, Debug)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// drawn uniformly from [0, 1) with the run's seed, in input order
    pub random_score: f64,
    /// 1 = earliest `created`; ties broken by ascending user id
    pub fcfs_rank: usize,
    pub fcfs_weight: f64,
    pub final_score: f64,
    pub rank: usize,
}

/// Ranks candidates for one round. Pure and total: the same seed and the
/// same input order reproduce identical scores and ranks.
///
/// Ties are broken explicitly rather than by sort stability: equal `created`
/// timestamps fall back to ascending user id for the FCFS rank, and equal
/// final scores fall back to ascending user id for the overall rank.
pub fn rank_candidates(candidates: Vec<Candidate>, seed: u64) -> Vec<RankedCandidate> {
    let mut rng = StdRng::seed_from_u64(seed);

    // one draw per candidate, in input order
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let random_score: f64 = rng.gen();
            RankedCandidate {
                candidate,
                random_score,
                fcfs_rank: 0,
                fcfs_weight: 0.0,
                final_score: 0.0,
                rank: 0,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.candidate
            .created
            .cmp(&b.candidate.created)
            .then_with(|| a.candidate.user_id.cmp(&b.candidate.user_id))
    });
    for (idx, rc) in ranked.iter_mut().enumerate() {
        rc.fcfs_rank = idx + 1;
        rc.fcfs_weight = 1.0 / rc.fcfs_rank as f64;
        rc.final_score = FCFS_SHARE * rc.fcfs_weight + RANDOM_SHARE * rc.random_score;
    }

    ranked.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.candidate.user_id.cmp(&b.candidate.user_id))
    });
    for (idx, rc) in ranked.iter_mut().enumerate() {
        rc.rank = idx + 1;
    }

    ranked
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;
    use itertools::Itertools;

    use super::*;
    use crate::candidate::UserId;
    use crate::util::{build_dummy_candidates, candidate};

    #[test]
    fn test_rank_is_a_permutation() {
        let ranked = rank_candidates(build_dummy_candidates(10), 7);
        assert_eq!(ranked.len(), 10);

        let ranks: Vec<usize> = ranked.iter().map(|rc| rc.rank).sorted().collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());

        let fcfs_ranks: Vec<usize> = ranked.iter().map(|rc| rc.fcfs_rank).sorted().collect();
        assert_eq!(fcfs_ranks, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_rank_output_is_sorted_by_rank() {
        let ranked = rank_candidates(build_dummy_candidates(8), 3);
        assert!(ranked.windows(2).all(|w| w[0].rank + 1 == w[1].rank));
        assert!(ranked
            .windows(2)
            .all(|w| w[0].final_score >= w[1].final_score));
    }

    #[test]
    fn test_rank_deterministic_given_seed() {
        let first = rank_candidates(build_dummy_candidates(20), 42);
        let second = rank_candidates(build_dummy_candidates(20), 42);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.candidate.user_id, b.candidate.user_id);
            assert_eq!(a.rank, b.rank);
            assert!(approx_eq!(f64, a.random_score, b.random_score));
            assert!(approx_eq!(f64, a.final_score, b.final_score));
        }
    }

    #[test]
    fn test_different_seeds_draw_different_scores() {
        let first = rank_candidates(build_dummy_candidates(20), 1);
        let second = rank_candidates(build_dummy_candidates(20), 2);

        let same = first
            .iter()
            .sorted_by(|a, b| a.candidate.user_id.cmp(&b.candidate.user_id))
            .zip(
                second
                    .iter()
                    .sorted_by(|a, b| a.candidate.user_id.cmp(&b.candidate.user_id)),
            )
            .all(|(a, b)| a.random_score == b.random_score);
        assert!(!same);
    }

    #[test]
    fn test_earliest_created_always_ranks_first() {
        // fcfs_rank 1 scores at least 0.7, fcfs_rank 2 at most 0.35 + 0.3,
        // so the earliest registration wins every seed
        for seed in [0, 1, 42, 1848] {
            let ranked = rank_candidates(build_dummy_candidates(5), seed);
            let best = &ranked[0];
            assert_eq!(best.fcfs_rank, 1);
            assert_eq!(best.rank, 1);
        }
    }

    #[test]
    fn test_created_at_ties_break_by_user_id() {
        let candidates = vec![
            candidate("b", "2024-01-01 09:00:00", [None, None, None]),
            candidate("a", "2024-01-01 09:00:00", [None, None, None]),
            candidate("c", "2024-01-01 09:00:00", [None, None, None]),
        ];
        let ranked = rank_candidates(candidates, 5);

        let fcfs_order: Vec<(usize, UserId)> = ranked
            .iter()
            .map(|rc| (rc.fcfs_rank, rc.candidate.user_id.clone()))
            .sorted()
            .collect();
        assert_eq!(
            fcfs_order,
            vec![
                (1, UserId::from("a")),
                (2, UserId::from("b")),
                (3, UserId::from("c")),
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(rank_candidates(Vec::new(), 42).is_empty());
    }
}
