//! Main-stage (exam center) allotment.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::trace;

use crate::allotment::{AllotmentRecord, ManualOverride, Outcome, Source};
use crate::candidate::UserId;
use crate::capacity::CenterLedger;
use crate::ranking::RankedCandidate;
use crate::store::RoundId;

/// Runs one round of main-stage allotment against the given ledger.
///
/// Processing order determines who gets scarce seats and must not change:
/// manual overrides first (in the order given), then exclusion records for
/// `excluded ∪ locked`, then the remaining candidates in ascending rank,
/// scanning `pref1..pref3` first-fit. An unknown preference code behaves
/// like a full center. One record is emitted per candidate, plus one
/// [Source::ManualNotFound] record per override naming an unknown user.
pub fn allot(
    round: RoundId,
    ranked: &[RankedCandidate],
    ledger: &mut CenterLedger,
    manual: &[ManualOverride],
    excluded: &HashSet<UserId>,
    locked: &HashSet<UserId>,
) -> Vec<AllotmentRecord> {
    let by_user: HashMap<&UserId, &RankedCandidate> = ranked
        .iter()
        .map(|rc| (&rc.candidate.user_id, rc))
        .collect();
    assert_eq!(
        by_user.len(),
        ranked.len(),
        "ranked input contains duplicate user ids"
    );

    let mut records: Vec<AllotmentRecord> = Vec::with_capacity(ranked.len());
    let mut handled: HashSet<&UserId> = HashSet::new();

    // manual overrides draw from the same ledger the auto pass uses, so a
    // manual seat is gone before any rank is considered
    for mo in manual {
        match by_user.get(&mo.user_id) {
            None => {
                trace!("manual override names unknown user {}", mo.user_id);
                records.push(AllotmentRecord {
                    round,
                    rank: None,
                    user_id: mo.user_id.clone(),
                    outcome: Outcome::NoSeat,
                    source: Source::ManualNotFound,
                    prefs: [None, None, None],
                });
            }
            Some(rc) => {
                if handled.contains(&rc.candidate.user_id) {
                    trace!("duplicate manual override for user {}", mo.user_id);
                    continue;
                }
                // the lock invariant outranks the manual pass: locked and
                // excluded users fall through to the exclusion records below
                if locked.contains(&rc.candidate.user_id) || excluded.contains(&rc.candidate.user_id)
                {
                    continue;
                }

                let record = if ledger.remaining(&mo.center_code) > 0 {
                    ledger
                        .decrement(&mo.center_code)
                        .expect("seat availability was checked above");
                    AllotmentRecord {
                        round,
                        rank: Some(rc.rank),
                        user_id: rc.candidate.user_id.clone(),
                        outcome: Outcome::Assigned(mo.center_code.clone()),
                        source: Source::Manual,
                        prefs: rc.candidate.prefs.clone(),
                    }
                } else {
                    AllotmentRecord {
                        round,
                        rank: Some(rc.rank),
                        user_id: rc.candidate.user_id.clone(),
                        outcome: Outcome::NoCapacity,
                        source: Source::ManualFailed,
                        prefs: rc.candidate.prefs.clone(),
                    }
                };
                records.push(record);
                handled.insert(&rc.candidate.user_id);
            }
        }
    }

    // everyone else, best rank first
    for rc in ranked.iter().sorted_by_key(|rc| rc.rank) {
        if handled.contains(&rc.candidate.user_id) {
            continue;
        }

        if locked.contains(&rc.candidate.user_id) || excluded.contains(&rc.candidate.user_id) {
            records.push(AllotmentRecord {
                round,
                rank: Some(rc.rank),
                user_id: rc.candidate.user_id.clone(),
                outcome: Outcome::Excluded,
                source: Source::Excluded,
                prefs: rc.candidate.prefs.clone(),
            });
            continue;
        }

        let chosen = rc
            .candidate
            .preferences()
            .find(|code| ledger.remaining(code) > 0);
        let outcome = match chosen {
            Some(code) => {
                ledger
                    .decrement(code)
                    .expect("seat availability was checked above");
                Outcome::Assigned(code.to_owned())
            }
            None => Outcome::NoSeat,
        };
        records.push(AllotmentRecord {
            round,
            rank: Some(rc.rank),
            user_id: rc.candidate.user_id.clone(),
            outcome,
            source: Source::Auto,
            prefs: rc.candidate.prefs.clone(),
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use itertools::Itertools;

    use super::*;
    use crate::util::{build_center_ledger, candidate};

    fn rank(candidates: Vec<crate::candidate::Candidate>) -> Vec<RankedCandidate> {
        crate::ranking::rank_candidates(candidates, 42)
    }

    fn record_for<'a>(records: &'a [AllotmentRecord], user: &str) -> &'a AllotmentRecord {
        records
            .iter()
            .find(|r| r.user_id == UserId::from(user))
            .unwrap_or_else(|| panic!("no record for user {}", user))
    }

    #[test]
    fn test_single_seat_contention_follows_rank() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), None, None]),
            candidate("B", "2024-01-01 09:05:00", [Some("X"), None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 1)]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &HashSet::new(),
            &HashSet::new(),
        );
        assert_eq!(records.len(), 2);

        let winner = &ranked[0].candidate.user_id;
        let loser = &ranked[1].candidate.user_id;
        let winner_record = records.iter().find(|r| &r.user_id == winner).unwrap();
        let loser_record = records.iter().find(|r| &r.user_id == loser).unwrap();

        assert_eq!(winner_record.outcome, Outcome::Assigned("X".to_owned()));
        assert_eq!(winner_record.source, Source::Auto);
        assert_eq!(loser_record.outcome, Outcome::NoSeat);
        assert_eq!(loser_record.source, Source::Auto);
    }

    #[test]
    fn test_manual_override_consumes_seat_before_rank_one() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), None, None]),
            candidate("B", "2024-01-01 09:05:00", [Some("X"), None, None]),
        ]);
        // A has fcfs_rank 1 and therefore rank 1, yet B gets the seat
        assert_eq!(ranked[0].candidate.user_id, UserId::from("A"));

        let mut ledger = build_center_ledger(&[("X", 1)]);
        let manual = vec![ManualOverride {
            user_id: UserId::from("B"),
            center_code: "X".to_owned(),
        }];

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &manual,
            &HashSet::new(),
            &HashSet::new(),
        );

        let b = record_for(&records, "B");
        assert_eq!(b.outcome, Outcome::Assigned("X".to_owned()));
        assert_eq!(b.source, Source::Manual);

        let a = record_for(&records, "A");
        assert_eq!(a.outcome, Outcome::NoSeat);
        assert_eq!(a.source, Source::Auto);
    }

    #[test]
    fn test_manual_override_over_capacity_fails_explicitly() {
        let ranked = rank(vec![candidate(
            "A",
            "2024-01-01 09:00:00",
            [Some("Y"), None, None],
        )]);
        let mut ledger = build_center_ledger(&[("X", 0), ("Y", 1)]);
        let manual = vec![ManualOverride {
            user_id: UserId::from("A"),
            center_code: "X".to_owned(),
        }];

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &manual,
            &HashSet::new(),
            &HashSet::new(),
        );

        let a = record_for(&records, "A");
        assert_eq!(a.outcome, Outcome::NoCapacity);
        assert_eq!(a.source, Source::ManualFailed);
        // a failed override still removes the user from the auto pass
        assert_eq!(records.len(), 1);
        assert_eq!(ledger.remaining("Y"), 1);
    }

    #[test]
    fn test_manual_override_unknown_user_is_surfaced() {
        let ranked = rank(vec![candidate(
            "A",
            "2024-01-01 09:00:00",
            [Some("X"), None, None],
        )]);
        let mut ledger = build_center_ledger(&[("X", 1)]);
        let manual = vec![ManualOverride {
            user_id: UserId::from("ghost"),
            center_code: "X".to_owned(),
        }];

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &manual,
            &HashSet::new(),
            &HashSet::new(),
        );

        let ghost = record_for(&records, "ghost");
        assert_eq!(ghost.source, Source::ManualNotFound);
        assert_eq!(ghost.rank, None);
        // the override consumed nothing
        let a = record_for(&records, "A");
        assert_eq!(a.outcome, Outcome::Assigned("X".to_owned()));
    }

    #[test]
    fn test_manual_override_for_locked_user_yields_excluded() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), None, None]),
            candidate("B", "2024-01-01 09:05:00", [Some("X"), None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 1)]);
        let manual = vec![ManualOverride {
            user_id: UserId::from("A"),
            center_code: "X".to_owned(),
        }];
        let locked = HashSet::from([UserId::from("A")]);

        let records = allot(
            RoundId(2),
            &ranked,
            &mut ledger,
            &manual,
            &HashSet::new(),
            &locked,
        );

        let a = record_for(&records, "A");
        assert_eq!(a.outcome, Outcome::Excluded);
        assert_eq!(a.source, Source::Excluded);
        // the seat went to the next candidate
        let b = record_for(&records, "B");
        assert_eq!(b.outcome, Outcome::Assigned("X".to_owned()));
    }

    #[test]
    fn test_excluded_users_consume_no_capacity() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), None, None]),
            candidate("B", "2024-01-01 09:05:00", [Some("X"), None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 1)]);
        let excluded = HashSet::from([ranked[0].candidate.user_id.clone()]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &excluded,
            &HashSet::new(),
        );

        let excluded_record = records
            .iter()
            .find(|r| r.source == Source::Excluded)
            .unwrap();
        assert_eq!(excluded_record.outcome, Outcome::Excluded);

        let auto_record = records.iter().find(|r| r.source == Source::Auto).unwrap();
        assert_eq!(auto_record.outcome, Outcome::Assigned("X".to_owned()));
        assert_eq!(ledger.remaining("X"), 0);
    }

    #[test]
    fn test_preference_chain_falls_through() {
        let ranked = rank(vec![candidate(
            "A",
            "2024-01-01 09:00:00",
            [Some("FULL"), Some("UNKNOWN"), Some("Z")],
        )]);
        let mut ledger = build_center_ledger(&[("FULL", 0), ("Z", 1)]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &HashSet::new(),
            &HashSet::new(),
        );

        let a = record_for(&records, "A");
        // FULL has no seats, UNKNOWN is not in the capacity table: both skip
        assert_eq!(a.outcome, Outcome::Assigned("Z".to_owned()));
    }

    #[test]
    fn test_no_valid_preference_yields_no_seat() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [None, None, None]),
            candidate("B", "2024-01-01 09:05:00", [Some("UNKNOWN"), None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 5)]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &HashSet::new(),
            &HashSet::new(),
        );

        assert!(records
            .iter()
            .all(|r| r.outcome == Outcome::NoSeat && r.source == Source::Auto));
        assert_eq!(ledger.remaining("X"), 5);
    }

    #[test]
    fn test_capacity_conservation() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), Some("Y"), None]),
            candidate("B", "2024-01-01 09:01:00", [Some("X"), Some("Y"), None]),
            candidate("C", "2024-01-01 09:02:00", [Some("X"), Some("Y"), None]),
            candidate("D", "2024-01-01 09:03:00", [Some("Y"), None, None]),
            candidate("E", "2024-01-01 09:04:00", [Some("X"), None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 2), ("Y", 2)]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &HashSet::new(),
            &HashSet::new(),
        );

        for code in ["X", "Y"] {
            let assigned = records
                .iter()
                .filter(|r| r.outcome.assigned_code() == Some(code))
                .count();
            assert_eq!(
                ledger.initial(code) - ledger.remaining(code),
                assigned,
                "capacity not conserved for {}",
                code
            );
        }
        // 4 seats, 5 candidates: exactly one goes without
        assert_eq!(
            records.iter().filter(|r| r.outcome == Outcome::NoSeat).count(),
            1
        );
    }

    #[test]
    fn test_rerun_reproduces_identical_records() {
        let candidates = vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), Some("Y"), None]),
            candidate("B", "2024-01-01 09:01:00", [Some("X"), None, None]),
            candidate("C", "2024-01-01 09:02:00", [Some("Y"), Some("X"), None]),
        ];
        let manual = vec![ManualOverride {
            user_id: UserId::from("C"),
            center_code: "X".to_owned(),
        }];
        let excluded = HashSet::from([UserId::from("B")]);

        let run = |candidates: Vec<crate::candidate::Candidate>| {
            let ranked = rank(candidates);
            let mut ledger = build_center_ledger(&[("X", 1), ("Y", 1)]);
            allot(
                RoundId(1),
                &ranked,
                &mut ledger,
                &manual,
                &excluded,
                &HashSet::new(),
            )
        };

        let first = run(candidates.clone());
        let second = run(candidates);
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_record_per_candidate() {
        let ranked = rank(vec![
            candidate("A", "2024-01-01 09:00:00", [Some("X"), None, None]),
            candidate("B", "2024-01-01 09:01:00", [Some("X"), None, None]),
            candidate("C", "2024-01-01 09:02:00", [None, None, None]),
        ]);
        let mut ledger = build_center_ledger(&[("X", 1)]);
        let excluded = HashSet::from([UserId::from("B")]);

        let records = allot(
            RoundId(1),
            &ranked,
            &mut ledger,
            &[],
            &excluded,
            &HashSet::new(),
        );

        assert_eq!(records.len(), 3);
        let unique_users = records.iter().map(|r| r.user_id.clone()).unique().count();
        assert_eq!(unique_users, 3);
    }
}
