//! Premium Engine training pipeline
//!
//! Loads the train/validation/test splits, fits the frequency and severity
//! models in parallel, evaluates both on the held-out split and persists
//! the artifacts.

use anyhow::Context;
use clap::Parser;
use premium_engine::boost::BoostParams;
use premium_engine::record::load_split;
use premium_engine::{evaluate, Evaluation, FittedModel, ModelKind, Pool, Trainer};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(
    name = "premium_engine",
    about = "Train the frequency and severity pricing models"
)]
struct Args {
    /// Directory holding train.csv, valid.csv and test.csv
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory the fitted model artifacts are written to
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Maximum boosting rounds
    #[arg(long, default_value_t = 2000)]
    rounds: usize,

    /// Consecutive non-improving validation rounds before stopping
    #[arg(long, default_value_t = 50)]
    early_stopping: usize,

    /// Shrinkage applied to each boosting round
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Maximum tree depth
    #[arg(long, default_value_t = 4)]
    depth: usize,
}

/// Load, fit and evaluate one model kind end to end.
fn train_one(
    kind: ModelKind,
    data_dir: &Path,
    params: &BoostParams,
) -> anyhow::Result<(FittedModel, Evaluation)> {
    let split = load_split(data_dir, kind)
        .with_context(|| format!("loading the {} datasets from {}", kind, data_dir.display()))?;

    let train_pool = Pool::build(&split.train, kind)?;
    let val_pool = Pool::build(&split.valid, kind)?;
    let test_pool = Pool::build(&split.test, kind)?;

    let model = Trainer::new(params.clone()).train(&train_pool, &val_pool)?;
    let test_eval = evaluate(&model, &test_pool)?;
    log::info!(
        "{} model evaluated: ap_ratio={:.4}, {}={:.4}",
        kind,
        test_eval.ap_ratio,
        kind.metric_name(),
        test_eval.error_metric
    );

    Ok((model, test_eval))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let params = BoostParams {
        max_rounds: args.rounds,
        early_stopping_rounds: args.early_stopping,
        learning_rate: args.learning_rate,
        max_depth: args.depth,
        ..BoostParams::default()
    };

    std::fs::create_dir_all(&args.model_dir)
        .with_context(|| format!("creating model directory {}", args.model_dir.display()))?;

    let started = Instant::now();

    // The two models are statistically independent of each other; fit them
    // as parallel tasks with no shared state.
    let (frequency, severity) = rayon::join(
        || train_one(ModelKind::Frequency, &args.data_dir, &params),
        || train_one(ModelKind::Severity, &args.data_dir, &params),
    );
    let (frequency_model, _) = frequency.context("frequency model training failed")?;
    let (severity_model, _) = severity.context("severity model training failed")?;

    frequency_model.save(args.model_dir.join(ModelKind::Frequency.artifact_file()))?;
    severity_model.save(args.model_dir.join(ModelKind::Severity.artifact_file()))?;

    log::info!("pipeline finished in {:.1?}", started.elapsed());
    Ok(())
}
