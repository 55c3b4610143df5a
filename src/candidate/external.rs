use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{Candidate, UserId, ValidationError};

/// ExternalCandidate is the CSV row format of [super::Candidate].
///
/// `email` and the preference columns may be absent from the file entirely;
/// empty cells are treated the same as absent ones.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalCandidate {
    pub user_id: String,
    pub pref1: Option<String>,
    pub pref2: Option<String>,
    pub pref3: Option<String>,
    pub created_at: String,
    pub email: Option<String>,
}

/// Timestamp formats accepted for `created_at`, tried in order. A date
/// without a time component is taken as midnight.
static CREATED_AT_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub(crate) fn parse_created_at(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = raw.trim();
    for format in CREATED_AT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time of day"));
    }
    Err(ValidationError(format!(
        "unparseable created_at value: {:?}",
        raw
    )))
}

fn normalize_pref(pref: Option<String>) -> Option<String> {
    pref.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty())
}

pub fn parse_candidates(path: &Path) -> Result<Vec<ExternalCandidate>, ValidationError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ValidationError(format!("failed to open users file {:?}: {}", path, e)))?;

    // missing required columns must fail the whole run before any allotment
    let headers = reader
        .headers()
        .map_err(|e| ValidationError(format!("failed to read users file header: {}", e)))?
        .clone();
    for required in ["user_id", "created_at"] {
        if !headers.iter().any(|h| h == required) {
            return Err(ValidationError(format!(
                "users file missing required column: {}",
                required
            )));
        }
    }

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: ExternalCandidate =
            row.map_err(|e| ValidationError(format!("malformed users row: {}", e)))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Converts external rows to [Candidate]s, preserving the input order (the
/// ranker's random draws depend on it). Duplicate user ids are rejected here
/// so the ranker and engine never see them.
pub fn convert_candidates(rows: Vec<ExternalCandidate>) -> Result<Vec<Candidate>, ValidationError> {
    let mut seen: HashSet<UserId> = HashSet::with_capacity(rows.len());
    let mut candidates = Vec::with_capacity(rows.len());

    for row in rows {
        let user_id = UserId(row.user_id.trim().to_owned());
        if user_id.0.is_empty() {
            return Err(ValidationError("users file contains an empty user_id".to_owned()));
        }
        if !seen.insert(user_id.clone()) {
            return Err(ValidationError(format!(
                "duplicate user_id in users file: {}",
                user_id
            )));
        }

        let created = parse_created_at(&row.created_at)?;
        candidates.push(Candidate {
            user_id,
            created,
            prefs: [
                normalize_pref(row.pref1),
                normalize_pref(row.pref2),
                normalize_pref(row.pref3),
            ],
            email: row.email.map(|e| e.trim().to_owned()).filter(|e| !e.is_empty()),
        });
    }

    Ok(candidates)
}
