mod simulation;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shiftjack_drivers::logging::init_logging;
use shiftjack_drivers::report::write_report;
use shiftjack_drivers::{parse_config_from_file, resolve_config_path, DEFAULT_CONFIG_PATH};

/// Plays batches of blackjack rounds and saves what was dealt.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Override the number of rounds to play
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Override the RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override where the batch report is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the label stored in the batch report
    #[arg(long)]
    label: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = CommandLineArgs::parse();
    let config_path = resolve_config_path(&args.config)?;
    let mut config = parse_config_from_file(&config_path)?;

    if let Some(rounds) = args.rounds {
        config.simulator.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.simulator.seed = Some(seed);
    }
    if let Some(output) = args.output {
        config.simulator.output = output;
    }
    if let Some(label) = args.label {
        config.simulator.label = Some(label);
    }
    config
        .validate()
        .with_context(|| format!("invalid overrides for {}", config_path.display()))?;

    init_logging(config.logging.level()?);

    let rule = config.rule.clone().into();
    let outcome = simulation::simulate(&rule, &config.simulator)?;

    write_report(&config.simulator.output, &outcome.report).with_context(|| {
        format!(
            "writing batch report to {}",
            config.simulator.output.display()
        )
    })?;
    simulation::print_summary(&outcome.report, &config.simulator.output);

    match outcome.error {
        Some(err) => Err(anyhow::Error::new(err)
            .context("batch ended early; the report holds the completed rounds")),
        None => Ok(()),
    }
}
