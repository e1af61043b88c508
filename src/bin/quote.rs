//! One-shot premium quote from the command line
//!
//! Prices a single policyholder record (JSON file) against the persisted
//! frequency and severity artifacts and prints the premium breakdown.

use anyhow::Context;
use clap::Parser;
use premium_engine::{Expenses, PricingModels, RatingRecord};
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "quote", about = "Price a single policyholder from a JSON record")]
struct Args {
    /// Path to the policyholder record JSON
    record: PathBuf,

    /// Directory holding the fitted model artifacts
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Fixed expenses per policy
    #[arg(long, default_value_t = 25.0)]
    fixed_expenses: f64,

    /// Variable expenses as a share of the commercial premium
    #[arg(long, default_value_t = 0.20)]
    variable_expenses: f64,

    /// Tax as a share of the commercial premium
    #[arg(long, default_value_t = 0.05)]
    tax_rate: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let file = File::open(&args.record)
        .with_context(|| format!("opening record file {}", args.record.display()))?;
    let record: RatingRecord =
        serde_json::from_reader(file).context("parsing the policyholder record")?;
    record.validate_ranges()?;

    let expenses = Expenses::new(args.fixed_expenses, args.variable_expenses, args.tax_rate)?;
    let models = PricingModels::load_dir(&args.model_dir)
        .with_context(|| format!("loading model artifacts from {}", args.model_dir.display()))?;

    let quote = models.quote(&record, Some(&expenses))?;
    println!("Frequency:          {:.3}%", quote.frequency * 100.0);
    println!("Severity:           €{:.2}", quote.severity);
    println!("Pure Premium:       €{:.2}", quote.pure_premium);
    if let Some(commercial) = quote.commercial_premium {
        println!("Commercial Premium: €{:.2}", commercial);
    }

    Ok(())
}
