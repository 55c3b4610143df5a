//! Contains structs and methods to define and handle candidates.
//!
//! Functions to load and convert the external candidate table, as well as the
//! external row definition, are part of [external]; the internal [Candidate]
//! is what the ranking and allotment modules operate on.

pub mod external;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A candidate's unique identifier within a round's input set.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        UserId(raw.to_owned())
    }
}

/// A candidate as the engine sees it. Immutable input: neither the ranker nor
/// the allotment engine mutates candidates.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub user_id: UserId,
    /// registration time, used for the first-come-first-served component of
    /// the ranking
    pub created: NaiveDateTime,
    /// ordered center preferences; a missing preference is skipped during
    /// allotment
    pub prefs: [Option<String>; 3],
    pub email: Option<String>,
}

impl Candidate {
    /// The non-empty preferences, in priority order.
    pub fn preferences(&self) -> impl Iterator<Item = &str> {
        self.prefs.iter().flatten().map(|p| p.as_str())
    }
}

/// An input table failed validation. Detected before ranking or allotment
/// begins; the run halts with no partial output.
#[derive(Debug, Clone)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

#[allow(dead_code)]
pub fn resource_path(filename: &str) -> PathBuf {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"));
    path.join("resources").join("test").join(filename)
}

pub fn load_candidates(path: PathBuf) -> Result<Vec<Candidate>, ValidationError> {
    let rows = external::parse_candidates(&path)?;
    external::convert_candidates(rows)
}

/// Maps user ids to email addresses for the mail collaborator. Candidates
/// without an email are simply absent.
pub fn email_map(candidates: &[Candidate]) -> HashMap<UserId, String> {
    candidates
        .iter()
        .filter_map(|c| {
            c.email
                .as_ref()
                .map(|email| (c.user_id.clone(), email.clone()))
        })
        .collect()
}
