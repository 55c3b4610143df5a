//! Read-side reporting derived from allotment results: capacity-usage
//! summaries, outcome-distribution stats and duty-slip rows for the
//! document/mail collaborators. Nothing in here mutates engine state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::allotment::{AllotmentRecord, LabAllotmentRecord, Outcome, Source};
use crate::candidate::UserId;
use crate::capacity::{CenterLedger, VenueLedger};
use crate::store::RoundId;

/// One row of the main-stage capacity usage summary: the capacity table
/// joined against allotment counts per center.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CapacitySummaryRow {
    pub center_code: String,
    pub capacity: usize,
    pub used: usize,
    pub remaining: usize,
}

pub fn center_capacity_summary(
    ledger: &CenterLedger,
    records: &[AllotmentRecord],
) -> Vec<CapacitySummaryRow> {
    ledger
        .codes()
        .map(|code| {
            let capacity = ledger.initial(code);
            let used = records
                .iter()
                .filter(|r| r.outcome.assigned_code() == Some(code))
                .count();
            CapacitySummaryRow {
                center_code: code.to_owned(),
                capacity,
                used,
                remaining: capacity.saturating_sub(used),
            }
        })
        .collect()
}

/// One row of the lab capacity usage summary, keyed per (center, venue).
/// Venues nothing was drawn from are included with `used = 0`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabCapacitySummaryRow {
    pub exam_center: String,
    pub venueno: String,
    pub capacity: usize,
    pub used: usize,
    pub remaining: usize,
}

pub fn lab_capacity_summary(
    ledger: &VenueLedger,
    records: &[LabAllotmentRecord],
) -> Vec<LabCapacitySummaryRow> {
    ledger
        .entries()
        .map(|(college, venue, capacity)| {
            let used = records
                .iter()
                .filter(|r| r.exam_center == college && r.venue.assigned_code() == Some(venue))
                .count();
            LabCapacitySummaryRow {
                exam_center: college.to_owned(),
                venueno: venue.to_owned(),
                capacity,
                used,
                remaining: capacity.saturating_sub(used),
            }
        })
        .collect()
}

/// Outcome distribution of one main-stage round, written to the stats file.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RoundStats {
    pub round: RoundId,
    pub n_records: usize,
    pub n_assigned: usize,
    pub n_auto: usize,
    pub n_manual: usize,
    pub n_manual_failed: usize,
    pub n_manual_not_found: usize,
    pub n_excluded: usize,
    pub n_no_seat: usize,
}

pub fn round_stats(round: RoundId, records: &[AllotmentRecord]) -> RoundStats {
    let count_source = |source: Source| records.iter().filter(|r| r.source == source).count();
    RoundStats {
        round,
        n_records: records.len(),
        n_assigned: records.iter().filter(|r| r.is_genuine()).count(),
        n_auto: count_source(Source::Auto),
        n_manual: count_source(Source::Manual),
        n_manual_failed: count_source(Source::ManualFailed),
        n_manual_not_found: count_source(Source::ManualNotFound),
        n_excluded: count_source(Source::Excluded),
        n_no_seat: records
            .iter()
            .filter(|r| r.outcome == Outcome::NoSeat && r.source == Source::Auto)
            .count(),
    }
}

/// Outcome distribution of one lab round.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabRoundStats {
    pub cc_round: RoundId,
    pub n_eligible: usize,
    pub n_seated: usize,
    pub n_no_lab_seat: usize,
}

pub fn lab_round_stats(cc_round: RoundId, records: &[LabAllotmentRecord]) -> LabRoundStats {
    let n_seated = records.iter().filter(|r| r.venue.is_assigned()).count();
    LabRoundStats {
        cc_round,
        n_eligible: records.len(),
        n_seated,
        n_no_lab_seat: records.len() - n_seated,
    }
}

/// One duty slip handed to the document collaborator; `email` keys the mail
/// collaborator when present.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SlipRow {
    pub round_no: usize,
    pub rank: usize,
    pub user_id: String,
    pub allotted_center: String,
    pub pref1: Option<String>,
    pub pref2: Option<String>,
    pub pref3: Option<String>,
    pub email: Option<String>,
}

/// Builds one slip per successfully allotted candidate; everyone else gets
/// none.
pub fn build_slips(records: &[AllotmentRecord], emails: &HashMap<UserId, String>) -> Vec<SlipRow> {
    records
        .iter()
        .filter(|r| r.is_genuine())
        .map(|r| SlipRow {
            round_no: r.round.0,
            rank: r.rank.expect("assigned records carry a rank"),
            user_id: r.user_id.0.clone(),
            allotted_center: r
                .outcome
                .assigned_code()
                .expect("genuine records carry a center")
                .to_owned(),
            pref1: r.prefs[0].clone(),
            pref2: r.prefs[1].clone(),
            pref3: r.prefs[2].clone(),
            email: emails.get(&r.user_id).cloned(),
        })
        .collect()
}

/// One lab duty slip. Candidates without a lab seat get none.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LabSlipRow {
    pub cc_round_no: usize,
    pub user_id: String,
    pub exam_center: String,
    pub cc_venueno: String,
    pub email: Option<String>,
}

pub fn build_lab_slips(
    records: &[LabAllotmentRecord],
    emails: &HashMap<UserId, String>,
) -> Vec<LabSlipRow> {
    records
        .iter()
        .filter(|r| r.venue.is_assigned())
        .map(|r| LabSlipRow {
            cc_round_no: r.cc_round.0,
            user_id: r.user_id.0.clone(),
            exam_center: r.exam_center.clone(),
            cc_venueno: r
                .venue
                .assigned_code()
                .expect("filtered to assigned venues")
                .to_owned(),
            email: emails.get(&r.user_id).cloned(),
        })
        .collect()
}

/// Writes serializable rows as CSV. Any failure aborts the write; used for
/// the snapshot-grade exports where a partial file is worse than none.
pub fn write_csv_rows<S: Serialize>(path: &Path, rows: &[S]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes slip rows one at a time: a failure on one slip is reported and the
/// remaining slips are still written. Returns how many rows made it out.
pub fn write_slip_rows<S: Serialize>(
    path: &Path,
    rows: &[S],
    describe: impl Fn(&S) -> &str,
) -> Result<usize, Error> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut written = 0;
    for row in rows {
        match writer.serialize(row) {
            Ok(()) => written += 1,
            Err(e) => warn!("failed to write duty slip for {}: {}", describe(row), e),
        }
    }
    writer.flush()?;
    Ok(written)
}

/// Writes the stats file as pretty-printed JSON.
pub fn write_stats<S: Serialize>(path: &Path, stats: &S) -> Result<(), Error> {
    let stringified = serde_json::to_string_pretty(stats)?;
    let mut file = File::create(path)?;
    file.write_all(stringified.as_ref())?;
    Ok(())
}
