//! The two-stage allotment engine and its record types.
//!
//! [center] implements the main (exam center) stage, [lab] the secondary
//! lab/venue stage. Both are first-fit, priority-ordered, one-pass and
//! greedy: a seat, once taken, is never relinquished or reassigned within
//! the same run.

pub mod center;
pub(crate) mod external;
pub mod lab;

use std::fmt;

use crate::candidate::{UserId, ValidationError};
use crate::store::RoundId;

/// Sentinel spellings used at the snapshot/export boundary. Internal code
/// works with [Outcome] only.
pub static NOT_ALLOTTED_NO_SEAT: &str = "NOT_ALLOTTED_NO_SEAT";
pub static NOT_ALLOTTED_NO_CAPACITY: &str = "NOT_ALLOTTED_NO_CAPACITY";
pub static EXCLUDED_THIS_ROUND: &str = "EXCLUDED_THIS_ROUND";
pub static NO_LAB_SEAT: &str = "NO_LAB_SEAT";

/// What a candidate ended up with. `Assigned` is the only genuine outcome;
/// everything else is a reason-carrying sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// a real resource key: a center code (main stage) or venue number (lab
    /// stage)
    Assigned(String),
    /// no preferred resource had a seat left
    NoSeat,
    /// a manual override pointed at a resource without capacity
    NoCapacity,
    /// excluded this round, by the admin or by a prior-round lock
    Excluded,
    /// every venue under the assigned center was exhausted
    NoLabSeat,
}

impl Outcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Outcome::Assigned(_))
    }

    pub fn assigned_code(&self) -> Option<&str> {
        match self {
            Outcome::Assigned(code) => Some(code),
            _ => None,
        }
    }

    /// The flat string stored in snapshot and export columns.
    pub fn to_field(&self) -> String {
        match self {
            Outcome::Assigned(code) => code.clone(),
            Outcome::NoSeat => NOT_ALLOTTED_NO_SEAT.to_owned(),
            Outcome::NoCapacity => NOT_ALLOTTED_NO_CAPACITY.to_owned(),
            Outcome::Excluded => EXCLUDED_THIS_ROUND.to_owned(),
            Outcome::NoLabSeat => NO_LAB_SEAT.to_owned(),
        }
    }

    /// Inverse of [Self::to_field]: any non-sentinel value is an assigned
    /// resource key.
    pub fn from_field(raw: &str) -> Outcome {
        if raw == NOT_ALLOTTED_NO_SEAT {
            Outcome::NoSeat
        } else if raw == NOT_ALLOTTED_NO_CAPACITY {
            Outcome::NoCapacity
        } else if raw == EXCLUDED_THIS_ROUND {
            Outcome::Excluded
        } else if raw == NO_LAB_SEAT {
            Outcome::NoLabSeat
        } else {
            Outcome::Assigned(raw.to_owned())
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_field())
    }
}

/// How a record came to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// assigned (or refused) by the rank-ordered preference scan
    Auto,
    /// fixed by a manual override
    Manual,
    /// a manual override whose target had no capacity left
    ManualFailed,
    /// a manual override naming a user absent from this round's pool
    ManualNotFound,
    /// excluded this round; consumed no capacity
    Excluded,
    /// assigned by the lab/venue sub-stage
    CcAuto,
}

impl Source {
    pub fn to_field(self) -> &'static str {
        match self {
            Source::Auto => "AUTO",
            Source::Manual => "MANUAL",
            Source::ManualFailed => "MANUAL-FAILED",
            Source::ManualNotFound => "MANUAL-NOT-FOUND",
            Source::Excluded => "EXCLUDED",
            Source::CcAuto => "CC-AUTO",
        }
    }

    pub fn from_field(raw: &str) -> Result<Source, ValidationError> {
        match raw {
            "AUTO" => Ok(Source::Auto),
            "MANUAL" => Ok(Source::Manual),
            "MANUAL-FAILED" => Ok(Source::ManualFailed),
            "MANUAL-NOT-FOUND" => Ok(Source::ManualNotFound),
            "EXCLUDED" => Ok(Source::Excluded),
            "CC-AUTO" => Ok(Source::CcAuto),
            _ => Err(ValidationError(format!("unknown record source: {:?}", raw))),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_field())
    }
}

/// One main-stage outcome for one candidate in one round. `rank` is absent
/// only for [Source::ManualNotFound], where no ranked candidate exists.
#[derive(Clone, Debug, PartialEq)]
pub struct AllotmentRecord {
    pub round: RoundId,
    pub rank: Option<usize>,
    pub user_id: UserId,
    pub outcome: Outcome,
    pub source: Source,
    pub prefs: [Option<String>; 3],
}

impl AllotmentRecord {
    /// A genuine allotment locks the user out of later rounds' pools.
    pub fn is_genuine(&self) -> bool {
        self.outcome.is_assigned()
    }
}

/// One lab-stage outcome for one eligible candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct LabAllotmentRecord {
    pub cc_round: RoundId,
    /// the main-stage round the eligibility came from
    pub round: RoundId,
    pub rank: usize,
    pub user_id: UserId,
    pub exam_center: String,
    /// `Assigned(venueno)` or [Outcome::NoLabSeat]
    pub venue: Outcome,
    pub source: Source,
    pub prefs: [Option<String>; 3],
}

/// An admin-supplied fixed assignment, applied before auto allotment in the
/// order given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManualOverride {
    pub user_id: UserId,
    pub center_code: String,
}
