use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub mode: Mode,

    #[clap(flatten)]
    pub input: Input,

    #[clap(flatten)]
    pub output_config: OutputConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Run one main-stage (exam center) allotment round and persist it.
    Allot {
        /// Round number under which the snapshot is persisted. Prior rounds
        /// with smaller numbers lock their successfully allotted users out
        /// of this round's pool.
        #[clap(long, short)]
        round: usize,

        /// Seed for the per-candidate random score. The same seed and the
        /// same users-file row order reproduce the identical ranking.
        #[clap(long, short, default_value("42"))]
        seed: u64,
    },

    /// Run the lab/venue sub-stage against the latest main-stage allotment.
    Lab {
        /// CC round number (a counter separate from the main rounds).
        #[clap(long, short)]
        cc_round: usize,
    },

    /// Delete the most recent persisted round of a stage and repoint
    /// "latest" at the surviving round, if any.
    Rollback {
        #[clap(arg_enum)]
        stage: StageArg,
    },

    /// Recompute the capacity and outcome summaries from the latest
    /// persisted snapshot, without allotting anything.
    Summary,
}

#[derive(clap::ArgEnum, Debug, Clone, Copy)]
pub enum StageArg {
    Center,
    Lab,
}

#[derive(clap::Args, Debug, Clone)]
pub struct Input {
    /// Candidate table (user_id, pref1, pref2, pref3, created_at[, email])
    #[clap(short = 'U', long, parse(from_os_str), value_name = "FILE")]
    pub users: Option<PathBuf>,

    /// Center capacity table (center_code[, venueno], capacity)
    #[clap(short = 'C', long, parse(from_os_str), value_name = "FILE")]
    pub centers: Option<PathBuf>,

    /// Lab venue capacity table (collegecode, venueno, tempvno)
    #[clap(short = 'L', long, parse(from_os_str), value_name = "FILE")]
    pub lab_venues: Option<PathBuf>,

    /// Manual center overrides (user_id, center_code), applied in file
    /// order before auto allotment
    #[clap(short = 'M', long, parse(from_os_str), value_name = "FILE")]
    pub manual: Option<PathBuf>,

    /// Users excluded from this round (user_id)
    #[clap(short = 'E', long, parse(from_os_str), value_name = "FILE")]
    pub excluded: Option<PathBuf>,

    /// Directory holding the persisted round snapshots
    #[clap(
        short = 'D',
        long,
        parse(from_os_str),
        value_name = "DIR",
        default_value("./data")
    )]
    pub data_dir: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OutputConfig {
    /// Sets the path for the allotment export, one row per candidate
    #[clap(
        long,
        parse(from_os_str),
        value_name = "FILE",
        default_value("./results/allotments.csv")
    )]
    pub allotment_output: PathBuf,

    /// Sets the path for the capacity usage summary
    #[clap(
        long,
        parse(from_os_str),
        value_name = "FILE",
        default_value("./results/capacity_summary.csv")
    )]
    pub summary_output: PathBuf,

    /// Sets the path for the stats file, containing the outcome distribution
    /// of the current run
    #[clap(
        long,
        parse(from_os_str),
        value_name = "FILE",
        default_value("./results/stats.json")
    )]
    pub stats_output: PathBuf,

    /// Sets the path for the duty slip rows handed to the document/mail
    /// collaborators
    #[clap(
        long,
        parse(from_os_str),
        value_name = "FILE",
        default_value("./results/duty_slips.csv")
    )]
    pub slips_output: PathBuf,

    /// Skip writing duty slip rows
    #[clap(long)]
    pub no_slips: bool,
}

impl Cli {
    /// Checks that the combination of selected inputs is valid for the
    /// chosen mode (where this is not already handled via clap attributes).
    pub fn check_config(&self) {
        match &self.mode {
            Mode::Allot { round, .. } => {
                assert!(*round > 0, "round numbers are positive");
                assert!(
                    self.input.users.is_some(),
                    "allot mode requires --users"
                );
                assert!(
                    self.input.centers.is_some(),
                    "allot mode requires --centers"
                );
            }
            Mode::Lab { cc_round } => {
                assert!(*cc_round > 0, "round numbers are positive");
                assert!(
                    self.input.lab_venues.is_some(),
                    "lab mode requires --lab-venues"
                );
            }
            Mode::Rollback { .. } => {}
            Mode::Summary => {
                assert!(
                    self.input.centers.is_some(),
                    "summary mode requires --centers"
                );
            }
        }
    }
}

fn check_output_path(path: &PathBuf, extension: &str) -> PathBuf {
    // did not supply an empty output path
    let mut parent = path.clone();
    assert!(parent.pop(), "Empty output path was supplied");
    // parent directories are created rather than required to pre-exist
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(&parent)
            .unwrap_or_else(|e| panic!("Could not create output directory {:?}: {}", parent, e));
    }
    assert_eq!(
        path.extension().and_then(OsStr::to_str),
        Some(extension),
        "output file needs to have \".{}\" extension (no capital letters)",
        extension
    );
    path.clone()
}

pub fn check_output_paths(config: &Cli) -> OutputPaths {
    OutputPaths {
        allotment_output_path: check_output_path(&config.output_config.allotment_output, "csv"),
        summary_output_path: check_output_path(&config.output_config.summary_output, "csv"),
        stats_output_path: check_output_path(&config.output_config.stats_output, "json"),
        slips_output_path: check_output_path(&config.output_config.slips_output, "csv"),
    }
}

pub struct OutputPaths {
    pub allotment_output_path: PathBuf,
    pub summary_output_path: PathBuf,
    pub stats_output_path: PathBuf,
    pub slips_output_path: PathBuf,
}
