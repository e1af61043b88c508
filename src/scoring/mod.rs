//! Inference: applying fitted models through the shared pool contract
//!
//! A scorer never builds features its own way: every record batch goes
//! through the same pool construction used at training time, which is what
//! keeps the train and serve feature schemas bit-identical.

use crate::error::{Error, Result};
use crate::pool::{ModelKind, Pool};
use crate::premium::{self, Expenses};
use crate::record::RatingRecord;
use crate::training::FittedModel;
use serde::Serialize;
use std::path::Path;

/// Applies one fitted model to record batches.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    model: &'a FittedModel,
}

impl<'a> Scorer<'a> {
    pub fn new(model: &'a FittedModel) -> Self {
        Self { model }
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    /// One prediction per input record, order-preserving.
    pub fn predict(&self, records: &[RatingRecord]) -> Result<Vec<f64>> {
        let pool = Pool::build(records, self.model.kind())?;
        self.model.predict_pool(&pool)
    }

    pub fn predict_one(&self, record: &RatingRecord) -> Result<f64> {
        Ok(self.predict(std::slice::from_ref(record))?[0])
    }
}

/// The two fitted models a pricing process serves from.
///
/// Constructed once at process start and passed to every request-scoped
/// call; there is no ambient "currently loaded model" state.
#[derive(Debug, Clone)]
pub struct PricingModels {
    frequency: FittedModel,
    severity: FittedModel,
}

impl PricingModels {
    pub fn new(frequency: FittedModel, severity: FittedModel) -> Result<Self> {
        if frequency.kind() != ModelKind::Frequency {
            return Err(Error::Artifact(format!(
                "expected a frequency model, got {}",
                frequency.kind()
            )));
        }
        if severity.kind() != ModelKind::Severity {
            return Err(Error::Artifact(format!(
                "expected a severity model, got {}",
                severity.kind()
            )));
        }
        Ok(Self {
            frequency,
            severity,
        })
    }

    /// Load both artifacts from a model directory, by their default file
    /// names.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Self::new(
            FittedModel::load(
                dir.join(ModelKind::Frequency.artifact_file()),
                ModelKind::Frequency,
            )?,
            FittedModel::load(
                dir.join(ModelKind::Severity.artifact_file()),
                ModelKind::Severity,
            )?,
        )
    }

    pub fn frequency(&self) -> &FittedModel {
        &self.frequency
    }

    pub fn severity(&self) -> &FittedModel {
        &self.severity
    }

    /// Price one record: both predictions from pools built on the same
    /// record, composed into the premium breakdown.
    pub fn quote(&self, record: &RatingRecord, expenses: Option<&Expenses>) -> Result<Quote> {
        let frequency = Scorer::new(&self.frequency).predict_one(record)?;
        let severity = Scorer::new(&self.severity).predict_one(record)?;
        let commercial_premium = match expenses {
            Some(expenses) => Some(premium::compose(frequency, severity, expenses)?.commercial),
            None => None,
        };
        Ok(Quote {
            frequency,
            severity,
            pure_premium: premium::pure_premium(frequency, severity),
            commercial_premium,
        })
    }
}

/// Priced quote for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    pub frequency: f64,
    pub severity: f64,
    pub pure_premium: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commercial_premium: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::BoostParams;
    use crate::training::tests::observations;
    use crate::training::Trainer;

    fn trained_models() -> PricingModels {
        let records = observations(120);
        let trainer = Trainer::new(BoostParams {
            max_rounds: 40,
            early_stopping_rounds: 10,
            learning_rate: 0.3,
            max_depth: 3,
            min_leaf_rows: 1,
            l2_reg: 1.0,
        });

        let freq_train = Pool::build(&records[..80], ModelKind::Frequency).unwrap();
        let freq_val = Pool::build(&records[80..], ModelKind::Frequency).unwrap();
        let sev_train = Pool::build(&records[..80], ModelKind::Severity).unwrap();
        let sev_val = Pool::build(&records[80..], ModelKind::Severity).unwrap();

        PricingModels::new(
            trainer.train(&freq_train, &freq_val).unwrap(),
            trainer.train(&sev_train, &sev_val).unwrap(),
        )
        .unwrap()
    }

    fn quote_record() -> RatingRecord {
        let mut record = observations(1).remove(0);
        record.exposure = None;
        record.claim_count = None;
        record.claims_cost = None;
        record
    }

    #[test]
    fn test_predict_is_order_preserving() {
        let models = trained_models();
        let scorer = Scorer::new(models.frequency());

        let mut quotes = observations(12);
        for r in &mut quotes {
            r.claim_count = None;
            r.claims_cost = None;
        }

        let batch = scorer.predict(&quotes).unwrap();
        assert_eq!(batch.len(), quotes.len());
        for (record, expected) in quotes.iter().zip(&batch) {
            assert_eq!(scorer.predict_one(record).unwrap(), *expected);
        }
    }

    #[test]
    fn test_quote_composes_both_models() {
        let models = trained_models();
        let expenses = Expenses::new(25.0, 0.20, 0.05).unwrap();
        let quote = models.quote(&quote_record(), Some(&expenses)).unwrap();

        assert!(quote.frequency > 0.0);
        assert_eq!(quote.pure_premium, quote.frequency * quote.severity);
        let commercial = quote.commercial_premium.unwrap();
        assert_eq!(commercial, (quote.pure_premium + 25.0) / 0.75);

        let bare = models.quote(&quote_record(), None).unwrap();
        assert!(bare.commercial_premium.is_none());
    }

    #[test]
    fn test_quote_survives_artifact_round_trip_exactly() {
        let models = trained_models();
        let dir = tempfile::tempdir().unwrap();
        models
            .frequency()
            .save(dir.path().join(ModelKind::Frequency.artifact_file()))
            .unwrap();
        models
            .severity()
            .save(dir.path().join(ModelKind::Severity.artifact_file()))
            .unwrap();

        let reloaded = PricingModels::load_dir(dir.path()).unwrap();
        let expenses = Expenses::new(25.0, 0.20, 0.05).unwrap();
        let record = quote_record();

        // Exact value equality, the round-trip law: reload must not move a
        // single bit of the composed premium.
        assert_eq!(
            models.quote(&record, Some(&expenses)).unwrap(),
            reloaded.quote(&record, Some(&expenses)).unwrap()
        );
    }

    #[test]
    fn test_pricing_models_rejects_swapped_kinds() {
        let models = trained_models();
        assert!(matches!(
            PricingModels::new(models.severity().clone(), models.frequency().clone()),
            Err(Error::Artifact(_))
        ));
    }
}
