//! Secondary (lab/venue) allotment.

use itertools::Itertools;

use crate::allotment::{AllotmentRecord, LabAllotmentRecord, Outcome, Source};
use crate::capacity::VenueLedger;
use crate::store::RoundId;

/// Runs the venue sub-stage against a main-stage snapshot.
///
/// The pool is restricted to candidates with a genuine center allotment;
/// the preference concept collapses to "any unit slot under the assigned
/// center", taken in the ledger's stable ascending venue order. Candidates
/// are served in ascending main-stage rank, and a college with no slot left
/// yields [Outcome::NoLabSeat].
pub fn allot(
    cc_round: RoundId,
    main_records: &[AllotmentRecord],
    ledger: &mut VenueLedger,
) -> Vec<LabAllotmentRecord> {
    let pool = main_records
        .iter()
        .filter(|r| r.outcome.is_assigned())
        .sorted_by_key(|r| r.rank);

    let mut records = Vec::new();
    for record in pool {
        let center = record
            .outcome
            .assigned_code()
            .expect("pool contains only assigned records");
        let venue = match ledger.pop_next_slot(center) {
            Some(venueno) => Outcome::Assigned(venueno),
            None => Outcome::NoLabSeat,
        };
        records.push(LabAllotmentRecord {
            cc_round,
            round: record.round,
            rank: record.rank.expect("assigned records carry a rank"),
            user_id: record.user_id.clone(),
            exam_center: center.to_owned(),
            venue,
            source: Source::CcAuto,
            prefs: record.prefs.clone(),
        });
    }
    records
}
