//! Shower driver: partonic states in, hadron-level event records out.
//!
//! Reads a Les Houches file, hadronizes every state with the reference
//! hadronizer, and writes the result. In enriched mode each state is retried
//! from its checkpoint until the configured selection (by default a phi
//! meson above a pT threshold) accepts, and states that exhaust their retry
//! budget are left out of the output.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load `dps-config.yaml` (or `--config`), apply environment and CLI overrides
//! 3. Initialize structured logging
//! 4. Open the input, the hadronizer, and the output
//! 5. Run the sampling loop and log the result

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dps_assembly::Converting;
use dps_core::{DpsConfig, RunSummary, ShowerMode, logging};
use dps_records::{create_writer, open_lhe};
use dps_sampling::{
    AcceptAll, KinematicCuts, NoOpProgress, SamplingFailure, SamplingReport, Selection, ToyHadronizer, log_sampling_end,
    run_sampling,
};
use dps_types::Schema;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dps-shower", version, about = "Hadronize partonic states into event records")]
struct Cli {
    /// Les Houches event file to read.
    input: PathBuf,

    /// Event file to write.
    output: PathBuf,

    /// Stop after this many partonic states.
    #[arg(long)]
    events: Option<u64>,

    /// Production mode: normal or enriched.
    #[arg(long)]
    mode: Option<ShowerMode>,

    /// Minimum transverse momentum of the selected particle (GeV).
    #[arg(long)]
    min_pt: Option<f64>,

    /// Retry budget per partonic state in enriched mode.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Output record schema: rich or minimal.
    #[arg(long)]
    output_schema: Option<Schema>,

    /// Hadronizer random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Configuration file (default: ./dps-config.yaml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON run summary here.
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl Cli {
    /// Load configuration and apply the flags given on the command line.
    fn config(&self) -> anyhow::Result<DpsConfig> {
        let mut config = DpsConfig::load(self.config.as_deref()).context("failed to load configuration")?;
        let sampling = &mut config.sampling;
        if let Some(events) = self.events {
            sampling.max_events = Some(events);
        }
        if let Some(mode) = self.mode {
            sampling.mode = mode;
        }
        if let Some(attempts) = self.max_attempts {
            sampling.max_attempts = attempts;
        }
        if let Some(schema) = self.output_schema {
            sampling.output_schema = schema;
        }
        if let Some(min_pt) = self.min_pt {
            config.selection.cuts = KinematicCuts {
                min_pt,
                ..config.selection.cuts
            };
        }
        if let Some(seed) = self.seed {
            config.hadronizer.seed = seed;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration, the input, the hadronizer, or the
/// output cannot be set up, or if a stream fails mid-run.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    logging::init(&config.logging);
    info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        mode = ?config.sampling.mode,
        "dps-shower starting"
    );

    let mut summary = RunSummary::start("dps-shower", vec![cli.input.clone()], cli.output.clone());
    let result = run(&cli, &config);
    match &result {
        Ok(report) => {
            log_sampling_end(report);
            summary.complete(report)?;
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Shower run failed");
            match e.downcast_ref::<SamplingFailure>() {
                Some(failure) => {
                    log_sampling_end(&failure.report);
                    summary.fail_with(&format_args!("{e:#}"), &failure.report)?;
                }
                None => summary.fail(&format_args!("{e:#}")),
            }
        }
    }
    if let Some(path) = &cli.summary {
        summary.write(path)?;
        info!(path = %path.display(), "Run summary written");
    }
    result.map(|_| ())
}

fn run(cli: &Cli, config: &DpsConfig) -> anyhow::Result<SamplingReport> {
    let mut source = open_lhe(&cli.input).context("failed to open partonic input")?;
    let mut hadronizer =
        ToyHadronizer::new(config.hadronizer.clone()).context("hadronizer initialisation failed")?;
    let schema = config.sampling.output_schema;
    let writer = create_writer(&cli.output, schema).context("failed to create output")?;
    let mut writer = Converting::new(writer, schema);

    let selection: &dyn Selection = match config.sampling.mode {
        ShowerMode::Normal => &AcceptAll,
        ShowerMode::Enriched => {
            info!(
                pdg = config.selection.pdg_abs,
                min_pt = config.selection.cuts.min_pt,
                max_attempts = config.sampling.max_attempts,
                "Enriched sampling"
            );
            &config.selection
        }
    };

    let report = run_sampling(
        &mut source,
        &mut hadronizer,
        selection,
        &mut writer,
        &config.sampling.run_options(),
        config.tally(),
        &mut NoOpProgress,
    )?;
    Ok(report)
}
