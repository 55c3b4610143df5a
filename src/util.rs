//! Contains a variety of helper functions which may be useful to have in
//! different modules, but are usually only part of the test modules and
//! benches, i.e., they are normally only invoked when running the unit
//! tests.

use chrono::NaiveDateTime;

use crate::candidate::{Candidate, UserId};
use crate::capacity::{CenterLedger, VenueLedger};

/// Parses a `%Y-%m-%d %H:%M:%S` timestamp; panics on anything else.
#[allow(dead_code)]
pub fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| panic!("invalid test timestamp {:?}", raw))
}

/// Builds a candidate with the given id, registration time and preferences.
#[allow(dead_code)]
pub fn candidate(user_id: &str, created: &str, prefs: [Option<&str>; 3]) -> Candidate {
    Candidate {
        user_id: UserId::from(user_id),
        created: ts(created),
        prefs: prefs.map(|p| p.map(|p| p.to_owned())),
        email: None,
    }
}

/// Builds `n` candidates `u0..u{n-1}` registered one minute apart, each
/// preferring centers `C1, C2, C3`.
#[allow(dead_code)]
pub fn build_dummy_candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| {
            let created = ts("2024-01-01 09:00:00") + chrono::Duration::minutes(i as i64);
            Candidate {
                user_id: UserId(format!("u{}", i)),
                created,
                prefs: [
                    Some("C1".to_owned()),
                    Some("C2".to_owned()),
                    Some("C3".to_owned()),
                ],
                email: None,
            }
        })
        .collect()
}

#[allow(dead_code)]
pub fn build_center_ledger(rows: &[(&str, usize)]) -> CenterLedger {
    CenterLedger::from_rows(rows.iter().map(|(code, cap)| ((*code).to_owned(), *cap)))
}

#[allow(dead_code)]
pub fn build_venue_ledger(rows: &[(&str, &str, usize)]) -> VenueLedger {
    VenueLedger::from_rows(
        rows.iter()
            .map(|(college, venue, seats)| ((*college).to_owned(), (*venue).to_owned(), *seats)),
    )
}
