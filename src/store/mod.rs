//! Durable, by-round snapshots of allotment results.
//!
//! Each stage persists its rounds as `<prefix>_round_<n>.csv` files in the
//! data directory, with `<prefix>_latest.csv` mirroring the most recently
//! saved round. The storage medium is an implementation detail; the contract
//! is `save` / `load_latest` / `load_round` / `rollback_last` /
//! `locked_users`.
//!
//! Operations assume a single writer (one admin session at a time);
//! concurrent saves or rollbacks race and the result is undefined. This is a
//! documented limitation of the snapshot files, not something the store
//! detects.

pub mod external;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{Error, ErrorKind};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::candidate::{UserId, ValidationError};

/// An admin-supplied, positive round number.
#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default,
)]
pub struct RoundId(pub usize);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record type the store knows how to persist. Implemented by the main and
/// lab stage records; the two stages never share files thanks to distinct
/// prefixes.
pub trait SnapshotRecord: Sized + Clone {
    /// The flat CSV row format of this record.
    type Row: Serialize + DeserializeOwned;

    /// Distinguishes this stage's snapshot files within the data directory.
    const FILE_PREFIX: &'static str;

    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row) -> Result<Self, ValidationError>;

    fn user_id(&self) -> &UserId;
    /// Whether this record locks the user out of later rounds.
    fn is_genuine(&self) -> bool;
}

/// Stage-scoped store over a data directory.
#[derive(Debug, Clone)]
pub struct RoundStore<R: SnapshotRecord> {
    dir: PathBuf,
    _kind: PhantomData<R>,
}

impl<R: SnapshotRecord> RoundStore<R> {
    pub fn new(dir: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&dir)?;
        Ok(RoundStore {
            dir,
            _kind: PhantomData,
        })
    }

    fn round_path(&self, round: RoundId) -> PathBuf {
        self.dir
            .join(format!("{}_round_{}.csv", R::FILE_PREFIX, round.0))
    }

    fn latest_path(&self) -> PathBuf {
        self.dir.join(format!("{}_latest.csv", R::FILE_PREFIX))
    }

    fn write_rows(&self, path: &PathBuf, records: &[R]) -> Result<(), Error> {
        // write to a temp file and rename, so a failed write cannot corrupt
        // an existing snapshot
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for record in records {
                writer.serialize(record.to_row())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)
    }

    fn read_rows(&self, path: &PathBuf) -> Result<Vec<R>, Error> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let row: R::Row = row.map_err(|e| Error::new(ErrorKind::Other, e))?;
            let record =
                R::from_row(row).map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Writes (or overwrites) the round's snapshot and points `latest` at it.
    pub fn save(&self, round: RoundId, records: &[R]) -> Result<(), Error> {
        assert!(round.0 > 0, "round numbers are positive");
        self.write_rows(&self.round_path(round), records)?;
        self.write_rows(&self.latest_path(), records)
    }

    pub fn load_round(&self, round: RoundId) -> Result<Option<Vec<R>>, Error> {
        let path = self.round_path(round);
        if !path.exists() {
            return Ok(None);
        }
        self.read_rows(&path).map(Some)
    }

    pub fn load_latest(&self) -> Result<Option<Vec<R>>, Error> {
        let path = self.latest_path();
        if !path.exists() {
            return Ok(None);
        }
        self.read_rows(&path).map(Some)
    }

    /// All persisted round numbers of this stage, ascending.
    pub fn persisted_rounds(&self) -> Result<Vec<RoundId>, Error> {
        let mut rounds = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(round) = round_from_file_name(R::FILE_PREFIX, name) {
                    rounds.push(round);
                }
            }
        }
        rounds.sort();
        Ok(rounds)
    }

    /// Deletes the most recent persisted round and repoints `latest` at the
    /// next-most-recent surviving round, or clears it if none remain.
    /// Returns the deleted round number, or `None` if nothing was persisted.
    pub fn rollback_last(&self) -> Result<Option<RoundId>, Error> {
        let rounds = self.persisted_rounds()?;
        let last = match rounds.last() {
            Some(last) => *last,
            None => return Ok(None),
        };

        fs::remove_file(self.round_path(last))?;

        match rounds.iter().rev().nth(1) {
            Some(previous) => {
                let records = self.read_rows(&self.round_path(*previous))?;
                self.write_rows(&self.latest_path(), &records)?;
            }
            None => {
                let latest = self.latest_path();
                if latest.exists() {
                    fs::remove_file(latest)?;
                }
            }
        }
        Ok(Some(last))
    }

    /// Users holding a genuine allotment in any persisted round strictly
    /// before `before_round`. These users must never re-enter a later
    /// round's competitive pool.
    pub fn locked_users(&self, before_round: RoundId) -> Result<HashSet<UserId>, Error> {
        let mut locked = HashSet::new();
        for round in self.persisted_rounds()? {
            if round >= before_round {
                continue;
            }
            let records = self
                .load_round(round)?
                .expect("persisted_rounds listed this round");
            locked.extend(
                records
                    .iter()
                    .filter(|r| r.is_genuine())
                    .map(|r| r.user_id().clone()),
            );
        }
        Ok(locked)
    }
}

fn round_from_file_name(prefix: &str, name: &str) -> Option<RoundId> {
    let rest = name.strip_prefix(prefix)?.strip_prefix("_round_")?;
    let number = rest.strip_suffix(".csv")?;
    number.parse().ok().map(RoundId)
}
