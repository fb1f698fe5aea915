//! Mixer driver: two event streams in, composite events out.
//!
//! Each composite merges one primary event (typically normal production)
//! with one secondary event (typically enriched production). Secondary-driven
//! pairing is the default: the run ends when the secondary stream does, and
//! fails if the primary stream runs out first.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dps_assembly::{Converting, MixFailure, MixReport, PairingPolicy, log_mixing_end, run_mixing};
use dps_core::{DpsConfig, RunSummary, logging};
use dps_records::{create_writer, open_reader};
use dps_types::Schema;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dps-mixer", version, about = "Merge two event streams into composite events")]
struct Cli {
    /// Primary event file (consumed as needed).
    primary: PathBuf,

    /// Secondary event file (drives the run).
    secondary: PathBuf,

    /// Composite event file to write.
    output: PathBuf,

    /// Stop after this many composites.
    #[arg(long)]
    events: Option<u64>,

    /// Pairing policy: secondary-driven or lockstep.
    #[arg(long)]
    policy: Option<PairingPolicy>,

    /// Record schema of both inputs: rich or minimal.
    #[arg(long)]
    input_schema: Option<Schema>,

    /// Output record schema: rich or minimal.
    #[arg(long)]
    output_schema: Option<Schema>,

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
        let mixing = &mut config.mixing;
        if let Some(events) = self.events {
            mixing.max_events = Some(events);
        }
        if let Some(policy) = self.policy {
            mixing.policy = policy;
        }
        if let Some(schema) = self.input_schema {
            mixing.input_schema = schema;
        }
        if let Some(schema) = self.output_schema {
            mixing.output_schema = schema;
        }
        Ok(config)
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if an input cannot be read, the output cannot be
/// written, or the primary stream ends before the secondary stream.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;
    logging::init(&config.logging);
    info!(
        primary = %cli.primary.display(),
        secondary = %cli.secondary.display(),
        output = %cli.output.display(),
        policy = %config.mixing.policy,
        "dps-mixer starting"
    );

    let mut summary = RunSummary::start(
        "dps-mixer",
        vec![cli.primary.clone(), cli.secondary.clone()],
        cli.output.clone(),
    );
    let result = run(&cli, &config);
    match &result {
        Ok(report) => {
            log_mixing_end(report);
            summary.complete(report)?;
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Mixing run failed");
            match e.downcast_ref::<MixFailure>() {
                Some(failure) => {
                    log_mixing_end(&failure.report);
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

fn run(cli: &Cli, config: &DpsConfig) -> anyhow::Result<MixReport> {
    let mixing = &config.mixing;
    let mut primary = open_reader(&cli.primary, mixing.input_schema).context("failed to open primary input")?;
    let mut secondary =
        open_reader(&cli.secondary, mixing.input_schema).context("failed to open secondary input")?;
    let writer = create_writer(&cli.output, mixing.output_schema).context("failed to create output")?;
    let mut writer = Converting::new(writer, mixing.output_schema);

    let report = run_mixing(
        &mut primary,
        &mut secondary,
        &mut writer,
        &mixing.mix_options(),
        config.tally(),
    )?;
    Ok(report)
}
