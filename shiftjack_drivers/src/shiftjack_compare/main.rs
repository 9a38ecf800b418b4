use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shiftjack::comparison::{compare_all, Comparison, DEFAULT_EPSILON};
use shiftjack_drivers::logging::init_logging;
use shiftjack_drivers::report::{read_report, write_json};
use tracing::{event, Level};

/// Measures how far batch reports drift from each other.
///
/// Every report is the reference for all reports listed after it.
#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// Batch report files, in comparison order
    #[arg(required = true, num_args = 2..)]
    reports: Vec<PathBuf>,

    /// Probability given to a value one side never saw
    #[arg(short, long, default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    /// Also write every comparison, distributions included, to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level, unless RUST_LOG is set
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> anyhow::Result<()> {
    let args = CommandLineArgs::parse();
    init_logging(args.log_level);

    let reports = args
        .reports
        .iter()
        .map(|path| read_report(path))
        .collect::<Result<Vec<_>, _>>()?;
    for report in &reports {
        event!(
            Level::INFO,
            label = report.label.as_deref().unwrap_or_default(),
            rounds = report.rounds(),
            "loaded report"
        );
    }

    let comparisons = compare_all(&reports, args.epsilon).context("comparing reports")?;
    for comparison in &comparisons {
        print_comparison(comparison);
    }

    if let Some(output) = &args.output {
        write_json(output, &comparisons)
            .with_context(|| format!("writing comparisons to {}", output.display()))?;
        println!("Comparisons written to {}", output.display());
    }
    Ok(())
}

fn print_comparison(comparison: &Comparison) {
    let [player_cards, dealer_cards, player_values, dealer_values] = comparison.scores();
    println!("{} -> {}", comparison.reference, comparison.candidate);
    println!("  player cards:        {:.6}", player_cards);
    println!("  dealer cards:        {:.6}", dealer_cards);
    println!("  player final values: {:.6}", player_values);
    println!("  dealer final values: {:.6}", dealer_values);
}
