//! Loaders for the override tables consumed by the main-stage engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::candidate::{UserId, ValidationError};

use super::ManualOverride;

/// One row of the manual override table. Row order is allocation order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalManualRow {
    pub user_id: String,
    pub center_code: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalExclusionRow {
    pub user_id: String,
}

fn open_reader(path: &Path, what: &str) -> Result<csv::Reader<std::fs::File>, ValidationError> {
    csv::Reader::from_path(path)
        .map_err(|e| ValidationError(format!("failed to open {} file {:?}: {}", what, path, e)))
}

pub fn load_manual_overrides(path: PathBuf) -> Result<Vec<ManualOverride>, ValidationError> {
    let mut reader = open_reader(&path, "manual override")?;
    let mut overrides = Vec::new();
    for row in reader.deserialize() {
        let row: ExternalManualRow =
            row.map_err(|e| ValidationError(format!("malformed manual override row: {}", e)))?;
        overrides.push(ManualOverride {
            user_id: UserId(row.user_id.trim().to_owned()),
            center_code: row.center_code.trim().to_owned(),
        });
    }
    Ok(overrides)
}

pub fn load_exclusions(path: PathBuf) -> Result<HashSet<UserId>, ValidationError> {
    let mut reader = open_reader(&path, "exclusion")?;
    let mut excluded = HashSet::new();
    for row in reader.deserialize() {
        let row: ExternalExclusionRow =
            row.map_err(|e| ValidationError(format!("malformed exclusion row: {}", e)))?;
        excluded.insert(UserId(row.user_id.trim().to_owned()));
    }
    Ok(excluded)
}
