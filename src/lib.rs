//! This crate assigns exam-duty candidates to examination centers, and in a
//! secondary pass to lab/venue seats at those centers, across successive
//! rounds. A seeded, fairness-oriented ranking orders the candidates; a
//! greedy, capacity-constrained engine assigns each to at most one seat,
//! honoring preferences, manual overrides, exclusions and prior-round
//! locks; every round is persisted as an on-disk snapshot.

use clap::Parser;
use log::{info, trace, warn};
use std::collections::{HashMap, HashSet};

use crate::config::{Cli, Mode, OutputPaths, StageArg};

pub mod allotment;
pub mod candidate;
pub mod capacity;
pub mod config;
pub mod logging;
pub mod ranking;
pub mod store;
pub mod util;

pub use allotment::{AllotmentRecord, LabAllotmentRecord, ManualOverride, Outcome, Source};
pub use candidate::{Candidate, UserId, ValidationError};
pub use capacity::{CapacityError, CenterLedger, VenueLedger};
pub use ranking::RankedCandidate;
pub use store::{RoundId, RoundStore, SnapshotRecord};

pub fn run_program() {
    #[cfg(debug_assertions)]
    info!("Debug mode enabled");

    let config: Cli = config::Cli::parse();

    trace!("Input config: {:?}", config);

    // Check that the output paths are valid
    let output_paths = config::check_output_paths(&config);

    // check that there are no misconfigurations
    config.check_config();

    match config.mode {
        Mode::Allot { round, seed } => run_allot(&config, &output_paths, RoundId(round), seed),
        Mode::Lab { cc_round } => run_lab(&config, &output_paths, RoundId(cc_round)),
        Mode::Rollback { stage } => run_rollback(&config, stage),
        Mode::Summary => run_summary(&config, &output_paths),
    }
}

fn run_allot(config: &Cli, output_paths: &OutputPaths, round: RoundId, seed: u64) {
    trace!("Loading candidates...");
    let candidates = candidate::load_candidates(
        config
            .input
            .users
            .clone()
            .expect("allot mode requires --users"),
    )
    .expect("loading users failed");
    info!("Loaded {} candidates", candidates.len());

    let mut ledger = capacity::external::load_center_capacities(
        config
            .input
            .centers
            .clone()
            .expect("allot mode requires --centers"),
    )
    .expect("loading center capacities failed");

    let manual = match &config.input.manual {
        Some(path) => allotment::external::load_manual_overrides(path.clone())
            .expect("loading manual overrides failed"),
        None => Vec::new(),
    };
    let excluded = match &config.input.excluded {
        Some(path) => {
            allotment::external::load_exclusions(path.clone()).expect("loading exclusions failed")
        }
        None => HashSet::new(),
    };

    let store: RoundStore<AllotmentRecord> =
        RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
    let locked = store
        .locked_users(round)
        .expect("reading prior round snapshots failed");
    info!(
        "{} users hold allotments from earlier rounds and are locked",
        locked.len()
    );

    let emails = candidate::email_map(&candidates);
    let ranked = ranking::rank_candidates(candidates, seed);

    info!(
        "Starting allotment in round={} n_candidates={} n_manual={} n_excluded={}",
        round,
        ranked.len(),
        manual.len(),
        excluded.len()
    );
    let records = allotment::center::allot(round, &ranked, &mut ledger, &manual, &excluded, &locked);

    // a failed persistence is fatal for the stage: nothing else is written
    store
        .save(round, &records)
        .expect("persisting round snapshot failed");

    let rows: Vec<_> = records.iter().map(|r| r.to_row()).collect();
    logging::write_csv_rows(&output_paths.allotment_output_path, &rows)
        .expect("writing allotment export failed");

    let summary = logging::center_capacity_summary(&ledger, &records);
    logging::write_csv_rows(&output_paths.summary_output_path, &summary)
        .expect("writing capacity summary failed");

    let stats = logging::round_stats(round, &records);
    logging::write_stats(&output_paths.stats_output_path, &stats)
        .expect("writing stats file failed");

    info!(
        "Round {} complete: {} of {} candidates assigned, {} without a seat",
        round, stats.n_assigned, stats.n_records, stats.n_no_seat
    );

    if !config.output_config.no_slips {
        let slips = logging::build_slips(&records, &emails);
        let written = logging::write_slip_rows(&output_paths.slips_output_path, &slips, |s| {
            s.user_id.as_str()
        })
        .expect("writing duty slips failed");
        info!("Wrote {} duty slips", written);
    }
}

fn run_lab(config: &Cli, output_paths: &OutputPaths, cc_round: RoundId) {
    let mut ledger = capacity::external::load_lab_venues(
        config
            .input
            .lab_venues
            .clone()
            .expect("lab mode requires --lab-venues"),
    )
    .expect("loading lab venues failed");

    let center_store: RoundStore<AllotmentRecord> =
        RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
    let main_records = center_store
        .load_latest()
        .expect("reading latest main-stage snapshot failed")
        .expect("no main-stage allotment found; run the allot mode first");

    // emails come from the same users file as the main stage; without it the
    // slips simply carry none
    let emails: HashMap<UserId, String> = match &config.input.users {
        Some(path) => {
            let candidates =
                candidate::load_candidates(path.clone()).expect("loading users failed");
            candidate::email_map(&candidates)
        }
        None => {
            warn!("no users file supplied; lab duty slips will not carry emails");
            HashMap::new()
        }
    };

    let records = allotment::lab::allot(cc_round, &main_records, &mut ledger);
    if records.is_empty() {
        warn!("No candidates with a valid exam center allotment; nothing to do");
        return;
    }

    let lab_store: RoundStore<LabAllotmentRecord> =
        RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
    lab_store
        .save(cc_round, &records)
        .expect("persisting cc round snapshot failed");

    let rows: Vec<_> = records.iter().map(|r| r.to_row()).collect();
    logging::write_csv_rows(&output_paths.allotment_output_path, &rows)
        .expect("writing cc allotment export failed");

    let summary = logging::lab_capacity_summary(&ledger, &records);
    logging::write_csv_rows(&output_paths.summary_output_path, &summary)
        .expect("writing cc capacity summary failed");

    let stats = logging::lab_round_stats(cc_round, &records);
    logging::write_stats(&output_paths.stats_output_path, &stats)
        .expect("writing stats file failed");

    info!(
        "CC round {} complete: {} of {} eligible candidates seated",
        cc_round, stats.n_seated, stats.n_eligible
    );

    if !config.output_config.no_slips {
        let slips = logging::build_lab_slips(&records, &emails);
        let written = logging::write_slip_rows(&output_paths.slips_output_path, &slips, |s| {
            s.user_id.as_str()
        })
        .expect("writing cc duty slips failed");
        info!("Wrote {} cc duty slips", written);
    }
}

fn run_rollback(config: &Cli, stage: StageArg) {
    match stage {
        StageArg::Center => {
            let store: RoundStore<AllotmentRecord> =
                RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
            match store.rollback_last().expect("rollback failed") {
                Some(round) => info!("Rolled back main-stage round {}", round),
                None => warn!("No persisted main-stage rounds to roll back"),
            }
        }
        StageArg::Lab => {
            let store: RoundStore<LabAllotmentRecord> =
                RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
            match store.rollback_last().expect("rollback failed") {
                Some(round) => info!("Rolled back cc round {}", round),
                None => warn!("No persisted cc rounds to roll back"),
            }
        }
    }
}

fn run_summary(config: &Cli, output_paths: &OutputPaths) {
    let ledger = capacity::external::load_center_capacities(
        config
            .input
            .centers
            .clone()
            .expect("summary mode requires --centers"),
    )
    .expect("loading center capacities failed");

    let store: RoundStore<AllotmentRecord> =
        RoundStore::new(config.input.data_dir.clone()).expect("opening round store failed");
    let records = store
        .load_latest()
        .expect("reading latest snapshot failed")
        .expect("no persisted allotment found; run the allot mode first");
    let round = records.first().map(|r| r.round).unwrap_or_default();

    let summary = logging::center_capacity_summary(&ledger, &records);
    logging::write_csv_rows(&output_paths.summary_output_path, &summary)
        .expect("writing capacity summary failed");

    let stats = logging::round_stats(round, &records);
    logging::write_stats(&output_paths.stats_output_path, &stats)
        .expect("writing stats file failed");

    info!(
        "Summary for round {}: {} of {} candidates assigned",
        round, stats.n_assigned, stats.n_records
    );
}
