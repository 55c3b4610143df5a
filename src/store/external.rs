//! Flat CSV row formats of the snapshot records, and the conversions between
//! them and the internal types. The sentinel spellings live only here and in
//! [crate::allotment::Outcome]'s field encoding; internal code never matches
//! on strings.

use serde::{Deserialize, Serialize};

use crate::allotment::{AllotmentRecord, LabAllotmentRecord, Outcome, Source};
use crate::candidate::{UserId, ValidationError};
use crate::store::{RoundId, SnapshotRecord};

/// The persisted form of a main-stage [AllotmentRecord].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalAllotmentRow {
    pub round_no: usize,
    pub rank: Option<usize>,
    pub user_id: String,
    pub allotted_center: String,
    pub source: String,
    pub pref1: Option<String>,
    pub pref2: Option<String>,
    pub pref3: Option<String>,
}

impl SnapshotRecord for AllotmentRecord {
    type Row = ExternalAllotmentRow;

    const FILE_PREFIX: &'static str = "allotments";

    fn to_row(&self) -> ExternalAllotmentRow {
        ExternalAllotmentRow {
            round_no: self.round.0,
            rank: self.rank,
            user_id: self.user_id.0.clone(),
            allotted_center: self.outcome.to_field(),
            source: self.source.to_field().to_owned(),
            pref1: self.prefs[0].clone(),
            pref2: self.prefs[1].clone(),
            pref3: self.prefs[2].clone(),
        }
    }

    fn from_row(row: ExternalAllotmentRow) -> Result<AllotmentRecord, ValidationError> {
        Ok(AllotmentRecord {
            round: RoundId(row.round_no),
            rank: row.rank,
            user_id: UserId(row.user_id),
            outcome: Outcome::from_field(&row.allotted_center),
            source: Source::from_field(&row.source)?,
            prefs: [row.pref1, row.pref2, row.pref3],
        })
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn is_genuine(&self) -> bool {
        AllotmentRecord::is_genuine(self)
    }
}

/// The persisted form of a [LabAllotmentRecord].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalLabRow {
    pub cc_round_no: usize,
    pub round_no: usize,
    pub rank: usize,
    pub user_id: String,
    pub exam_center: String,
    pub cc_venueno: String,
    pub source: String,
    pub pref1: Option<String>,
    pub pref2: Option<String>,
    pub pref3: Option<String>,
}

impl SnapshotRecord for LabAllotmentRecord {
    type Row = ExternalLabRow;

    const FILE_PREFIX: &'static str = "cc_allotments";

    fn to_row(&self) -> ExternalLabRow {
        ExternalLabRow {
            cc_round_no: self.cc_round.0,
            round_no: self.round.0,
            rank: self.rank,
            user_id: self.user_id.0.clone(),
            exam_center: self.exam_center.clone(),
            cc_venueno: self.venue.to_field(),
            source: self.source.to_field().to_owned(),
            pref1: self.prefs[0].clone(),
            pref2: self.prefs[1].clone(),
            pref3: self.prefs[2].clone(),
        }
    }

    fn from_row(row: ExternalLabRow) -> Result<LabAllotmentRecord, ValidationError> {
        Ok(LabAllotmentRecord {
            cc_round: RoundId(row.cc_round_no),
            round: RoundId(row.round_no),
            rank: row.rank,
            user_id: UserId(row.user_id),
            exam_center: row.exam_center,
            venue: Outcome::from_field(&row.cc_venueno),
            source: Source::from_field(&row.source)?,
            prefs: [row.pref1, row.pref2, row.pref3],
        })
    }

    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn is_genuine(&self) -> bool {
        self.venue.is_assigned()
    }
}
