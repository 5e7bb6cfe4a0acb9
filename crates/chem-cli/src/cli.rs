use std::path::PathBuf;

use chem_domain::{EmptyRoundPolicy, FilterThresholds, RunConfig};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "chem-cli",
          version,
          about = "Submit and inspect CNS drug-candidate discovery runs.",
          long_about = "Submit and inspect CNS drug-candidate discovery runs.\n\
                        Uses Postgres when DATABASE_URL is set, otherwise an in-memory store that \
                        only lives for the duration of the command.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a run and, unless --no-wait, execute it in this process until it finishes.
    Run(RunArgs),
    /// Show the status of a run.
    Status(RunRef),
    /// List the molecules of a run in discovery order.
    Molecules(RunRef),
    /// Show the agent trace of a run.
    Trace(TraceArgs),
    /// Show totals, failure breakdown and top molecules of a run.
    Summary(RunRef),
    /// Mark a non-terminal run as FAILED.
    Cancel(CancelArgs),
    /// List known runs, newest first.
    Runs,
    /// List the mutation rules of the configured catalog.
    Rules,
}

#[derive(Args, Debug)]
pub struct RunRef {
    /// Run identifier.
    pub run_id: Uuid,
}

#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Run identifier.
    pub run_id: Uuid,
    /// Print full entries as JSON instead of one line per entry.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Run identifier.
    pub run_id: Uuid,
    /// Reason recorded in the trace.
    #[arg(long, default_value = "cancelled by operator")]
    pub reason: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON run submission. Flags below override its fields.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seed structure (SMILES). Repeatable.
    #[arg(short, long = "seed", value_name = "SMILES")]
    pub seeds: Vec<String>,

    #[arg(short = 'r', long, value_name = "INT")]
    pub rounds: Option<u32>,

    #[arg(short = 'n', long, value_name = "INT")]
    pub candidates: Option<u32>,

    #[arg(short = 'k', long, value_name = "INT")]
    pub top_k: Option<u32>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Finish the run early after a round that produced nothing new.
    #[arg(long)]
    pub stop_on_empty: bool,

    /// Only register the run (PENDING) for an external worker.
    #[arg(long)]
    pub no_wait: bool,

    /// Seconds to wait for the run to finish.
    #[arg(long, default_value_t = 600, value_name = "SECS")]
    pub timeout: u64,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long, value_name = "FLOAT")]
    pub max_mw: Option<f64>,
    #[arg(long, value_name = "FLOAT")]
    pub max_logp: Option<f64>,
    #[arg(long, value_name = "INT")]
    pub max_hbd: Option<u32>,
    #[arg(long, value_name = "INT")]
    pub max_hba: Option<u32>,
    #[arg(long, value_name = "FLOAT")]
    pub max_tpsa: Option<f64>,
    #[arg(long, value_name = "INT")]
    pub max_rotb: Option<u32>,
    #[arg(long, value_name = "INT")]
    pub max_violations: Option<u32>,
}

impl FilterArgs {
    fn apply(&self, base: FilterThresholds) -> FilterThresholds {
        FilterThresholds { max_mw: self.max_mw.unwrap_or(base.max_mw),
                           max_logp: self.max_logp.unwrap_or(base.max_logp),
                           max_hbd: self.max_hbd.unwrap_or(base.max_hbd),
                           max_hba: self.max_hba.unwrap_or(base.max_hba),
                           max_tpsa: self.max_tpsa.unwrap_or(base.max_tpsa),
                           max_rotb: self.max_rotb.unwrap_or(base.max_rotb),
                           max_violations: self.max_violations.unwrap_or(base.max_violations) }
    }
}

impl RunArgs {
    /// Fusiona el fichero (si hay) con los flags. Sin fichero ni semillas
    /// no hay envío posible.
    pub fn to_config(&self, file: Option<RunConfig>) -> Result<RunConfig, String> {
        let mut config = match file {
            Some(config) => config,
            None if self.seeds.is_empty() => return Err("either --config or at least one --seed is required".into()),
            None => RunConfig::new(Vec::new(), 1, 10, 5),
        };
        if !self.seeds.is_empty() {
            config.seeds = self.seeds.clone();
        }
        config.num_rounds = self.rounds.unwrap_or(config.num_rounds);
        config.candidates_per_round = self.candidates.unwrap_or(config.candidates_per_round);
        config.top_k = self.top_k.unwrap_or(config.top_k);
        config.filters = self.filters.apply(config.filters);
        if self.stop_on_empty {
            config.empty_round_policy = EmptyRoundPolicy::Stop;
        }
        Ok(config)
    }
}
