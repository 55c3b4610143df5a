//! Remaining-seat ledgers for one allotment run.
//!
//! A ledger is built from a capacity table immediately before a run, mutated
//! in place while the engine consumes seats, and discarded afterwards. It is
//! never shared across runs and never persisted; the capacity files are
//! re-read for every run.

pub(crate) mod external;

use std::collections::BTreeMap;
use std::fmt;

/// Returned by [CenterLedger::decrement] when the resource has no seat left.
/// Callers are expected to check [CenterLedger::remaining] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityError(pub String);

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "no remaining capacity for resource {}", self.0)
    }
}

impl std::error::Error for CapacityError {}

/// Per-center remaining-seat counters for the main allotment stage.
///
/// Multiple capacity rows for the same center code are summed into one
/// effective capacity before any seat is handed out.
#[derive(Debug, Clone)]
pub struct CenterLedger {
    initial: BTreeMap<String, usize>,
    remaining: BTreeMap<String, usize>,
}

impl CenterLedger {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, usize)>) -> Self {
        let mut initial: BTreeMap<String, usize> = BTreeMap::new();
        for (code, capacity) in rows {
            *initial.entry(code).or_insert(0) += capacity;
        }
        let remaining = initial.clone();
        CenterLedger { initial, remaining }
    }

    /// Remaining seats for a center. Unknown codes report 0, so an invalid
    /// preference behaves exactly like a full center.
    pub fn remaining(&self, code: &str) -> usize {
        self.remaining.get(code).copied().unwrap_or(0)
    }

    /// Summed capacity the ledger started with.
    pub fn initial(&self, code: &str) -> usize {
        self.initial.get(code).copied().unwrap_or(0)
    }

    pub fn decrement(&mut self, code: &str) -> Result<(), CapacityError> {
        match self.remaining.get_mut(code) {
            Some(seats) if *seats > 0 => {
                *seats -= 1;
                Ok(())
            }
            _ => Err(CapacityError(code.to_owned())),
        }
    }

    /// All known center codes, in stable ascending order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.initial.keys().map(|code| code.as_str())
    }

    pub fn used(&self, code: &str) -> usize {
        self.initial(code) - self.remaining(code)
    }
}

/// Per-venue unit-slot queues for the lab allotment stage.
///
/// A venue of capacity N is N interchangeable unit slots; slots under a
/// college are consumed in ascending venue order (venue numbers compare as
/// the strings given in the capacity file).
#[derive(Debug, Clone)]
pub struct VenueLedger {
    initial: BTreeMap<(String, String), usize>,
    remaining: BTreeMap<(String, String), usize>,
}

impl VenueLedger {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, String, usize)>) -> Self {
        let mut initial: BTreeMap<(String, String), usize> = BTreeMap::new();
        for (college, venue, seats) in rows {
            *initial.entry((college, venue)).or_insert(0) += seats;
        }
        let remaining = initial.clone();
        VenueLedger { initial, remaining }
    }

    /// Consumes one unit slot under the given college and returns its venue
    /// number, or `None` when every venue of that college is exhausted.
    pub fn pop_next_slot(&mut self, college: &str) -> Option<String> {
        for ((col, venue), seats) in self.remaining.iter_mut() {
            if col == college && *seats > 0 {
                *seats -= 1;
                return Some(venue.clone());
            }
        }
        None
    }

    /// `(college, venue, summed capacity)` triples in stable order, including
    /// venues nothing was drawn from.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.initial
            .iter()
            .map(|((college, venue), capacity)| (college.as_str(), venue.as_str(), *capacity))
    }

    pub fn remaining_slots(&self, college: &str, venue: &str) -> usize {
        self.remaining
            .get(&(college.to_owned(), venue.to_owned()))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_rows_with_same_code_are_summed() {
        let ledger = CenterLedger::from_rows([
            ("C1".to_owned(), 2),
            ("C2".to_owned(), 1),
            ("C1".to_owned(), 3),
        ]);
        assert_eq!(ledger.remaining("C1"), 5);
        assert_eq!(ledger.initial("C1"), 5);
        assert_eq!(ledger.remaining("C2"), 1);
    }

    #[test]
    fn test_decrement_and_used() {
        let mut ledger = CenterLedger::from_rows([("C1".to_owned(), 2)]);
        ledger.decrement("C1").unwrap();
        assert_eq!(ledger.remaining("C1"), 1);
        assert_eq!(ledger.used("C1"), 1);
        ledger.decrement("C1").unwrap();
        assert_eq!(ledger.remaining("C1"), 0);

        let err = ledger.decrement("C1");
        assert_eq!(err, Err(CapacityError("C1".to_owned())));
        // a failed decrement does not change the ledger
        assert_eq!(ledger.used("C1"), 2);
    }

    #[test]
    fn test_unknown_code_behaves_like_full() {
        let mut ledger = CenterLedger::from_rows([("C1".to_owned(), 1)]);
        assert_eq!(ledger.remaining("NOPE"), 0);
        assert!(ledger.decrement("NOPE").is_err());
    }

    #[test]
    fn test_zero_capacity_is_valid_and_never_satisfiable() {
        let mut ledger = CenterLedger::from_rows([("C1".to_owned(), 0)]);
        assert_eq!(ledger.remaining("C1"), 0);
        assert!(ledger.decrement("C1").is_err());
    }

    #[test]
    fn test_venue_slots_pop_in_ascending_venue_order() {
        let mut ledger = VenueLedger::from_rows([
            ("COL1".to_owned(), "2".to_owned(), 1),
            ("COL1".to_owned(), "1".to_owned(), 2),
            ("COL2".to_owned(), "1".to_owned(), 1),
        ]);

        assert_eq!(ledger.pop_next_slot("COL1").as_deref(), Some("1"));
        assert_eq!(ledger.pop_next_slot("COL1").as_deref(), Some("1"));
        assert_eq!(ledger.pop_next_slot("COL1").as_deref(), Some("2"));
        assert_eq!(ledger.pop_next_slot("COL1"), None);
        // other colleges are untouched
        assert_eq!(ledger.remaining_slots("COL2", "1"), 1);
    }

    #[test]
    fn test_venue_rows_with_same_key_are_summed() {
        let ledger = VenueLedger::from_rows([
            ("COL1".to_owned(), "1".to_owned(), 1),
            ("COL1".to_owned(), "1".to_owned(), 2),
        ]);
        assert_eq!(ledger.remaining_slots("COL1", "1"), 3);
    }

    #[test]
    fn test_unknown_college_has_no_slots() {
        let mut ledger = VenueLedger::from_rows([("COL1".to_owned(), "1".to_owned(), 1)]);
        assert_eq!(ledger.pop_next_slot("COL9"), None);
    }
}
