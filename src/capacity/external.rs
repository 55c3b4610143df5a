use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::candidate::ValidationError;

use super::{CenterLedger, VenueLedger};

/// One row of the center capacity table. `venueno` is present when the file
/// tracks per-venue seats; main-stage capacity sums across all rows of the
/// same center regardless.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalCenterRow {
    pub center_code: String,
    pub venueno: Option<String>,
    pub capacity: usize,
}

/// One row of the lab venue capacity table; `tempvno` is the seat count of
/// that venue.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalLabVenueRow {
    pub collegecode: String,
    pub venueno: String,
    pub tempvno: usize,
}

fn check_columns(path: &Path, reader: &mut csv::Reader<std::fs::File>, required: &[&str]) -> Result<(), ValidationError> {
    let headers = reader
        .headers()
        .map_err(|e| ValidationError(format!("failed to read header of {:?}: {}", path, e)))?
        .clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(ValidationError(format!(
                "capacity file {:?} missing required column: {}",
                path, column
            )));
        }
    }
    Ok(())
}

pub fn load_center_capacities(path: PathBuf) -> Result<CenterLedger, ValidationError> {
    let mut reader = csv::Reader::from_path(&path)
        .map_err(|e| ValidationError(format!("failed to open centers file {:?}: {}", path, e)))?;
    check_columns(&path, &mut reader, &["center_code", "capacity"])?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: ExternalCenterRow =
            row.map_err(|e| ValidationError(format!("malformed centers row: {}", e)))?;
        rows.push((row.center_code.trim().to_owned(), row.capacity));
    }
    Ok(CenterLedger::from_rows(rows))
}

pub fn load_lab_venues(path: PathBuf) -> Result<VenueLedger, ValidationError> {
    let mut reader = csv::Reader::from_path(&path)
        .map_err(|e| ValidationError(format!("failed to open lab venue file {:?}: {}", path, e)))?;
    check_columns(&path, &mut reader, &["collegecode", "venueno", "tempvno"])?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: ExternalLabVenueRow =
            row.map_err(|e| ValidationError(format!("malformed lab venue row: {}", e)))?;
        rows.push((
            row.collegecode.trim().to_owned(),
            row.venueno.trim().to_owned(),
            row.tempvno,
        ));
    }
    Ok(VenueLedger::from_rows(rows))
}
