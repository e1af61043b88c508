//! Model training and the fitted-model artifact

pub mod evaluate;

pub use evaluate::{evaluate, Evaluation};

use crate::boost::{BoostParams, Booster};
use crate::error::{Error, Result};
use crate::pool::{ModelKind, Pool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

/// Artifact schema version; bumped when the persisted layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

/// Fits a frequency or severity model against train/validation pools.
///
/// One `train` call is a coarse blocking unit of work; the frequency and
/// severity trainers share nothing and may run in parallel tasks.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    params: BoostParams,
}

impl Trainer {
    pub fn new(params: BoostParams) -> Self {
        Self { params }
    }

    /// Fit a model for the pools' kind with early stopping on the
    /// validation pool, returning the best-validation-round model.
    pub fn train(&self, train_pool: &Pool, val_pool: &Pool) -> Result<FittedModel> {
        let kind = train_pool.kind();
        if val_pool.kind() != kind {
            return Err(Error::training(format!(
                "train pool is {} but validation pool is {}",
                kind,
                val_pool.kind()
            )));
        }
        if train_pool.labels().is_none() {
            return Err(Error::training("training pool carries no labels"));
        }
        if val_pool.labels().is_none() {
            return Err(Error::training("validation pool carries no labels"));
        }
        // A severity pool made only of claim-free rows has zero total
        // weight; the weighted loss is degenerate on it.
        for (name, pool) in [("training", train_pool), ("validation", val_pool)] {
            if let Some(weights) = pool.weight() {
                if weights.iter().sum::<f64>() <= 0.0 {
                    return Err(Error::training(format!(
                        "severity {} pool has no positive-weight rows",
                        name
                    )));
                }
            }
        }

        let started = Instant::now();
        let outcome = Booster::fit(
            kind.loss(),
            &train_pool.dataset(),
            &val_pool.dataset(),
            &self.params,
        )?;
        log::info!(
            "{} model fit: kept round {} of {} (validation loss {:.6}) in {:.1?}",
            kind,
            outcome.best_round,
            outcome.rounds_grown,
            outcome.best_eval_loss,
            started.elapsed()
        );

        Ok(FittedModel {
            version: ARTIFACT_VERSION,
            kind,
            trained_at: Utc::now(),
            best_round: outcome.best_round,
            validation_loss: outcome.best_eval_loss,
            booster: outcome.booster,
        })
    }
}

/// An opaque, versioned, read-only fitted model keyed by kind.
///
/// Persisted as JSON; `f64` values survive the round trip exactly, so a
/// reloaded model reproduces bit-identical predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    version: u32,
    kind: ModelKind,
    trained_at: DateTime<Utc>,
    best_round: usize,
    validation_loss: f64,
    booster: Booster,
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn best_round(&self) -> usize {
        self.best_round
    }

    pub fn validation_loss(&self) -> f64 {
        self.validation_loss
    }

    /// Score a pool of the same kind; one prediction per row, in order.
    pub fn predict_pool(&self, pool: &Pool) -> Result<Vec<f64>> {
        if pool.kind() != self.kind {
            return Err(Error::domain(format!(
                "cannot score a {} pool with a {} model",
                pool.kind(),
                self.kind
            )));
        }
        Ok(self.booster.predict(&pool.dataset()))
    }

    /// Persist the artifact to a path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(&path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        log::info!(
            "{} model saved to {}",
            self.kind,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Reload an artifact, verifying that it is the expected kind and
    /// schema version.
    pub fn load<P: AsRef<Path>>(path: P, kind: ModelKind) -> Result<FittedModel> {
        let file = File::open(&path)?;
        let model: FittedModel = serde_json::from_reader(BufReader::new(file))?;
        if model.version != ARTIFACT_VERSION {
            return Err(Error::Artifact(format!(
                "artifact at {} has version {}, expected {}",
                path.as_ref().display(),
                model.version,
                ARTIFACT_VERSION
            )));
        }
        if model.kind != kind {
            return Err(Error::Artifact(format!(
                "artifact at {} is a {} model, expected {}",
                path.as_ref().display(),
                model.kind,
                kind
            )));
        }
        Ok(model)
    }
}
