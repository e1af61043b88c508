//! Model-ready pools: the one projection of rating records shared by
//! training and inference
//!
//! A pool carries the fixed factor columns plus exactly one auxiliary
//! column — the Poisson log-exposure offset for frequency models, the
//! claim-count regression weight for severity models — and optionally a
//! label column. The column layout is a constant of the crate, never
//! inferred from data, so the train-time and score-time feature schemas
//! cannot drift apart.

use crate::boost::{Dataset, FeatureColumn, Loss};
use crate::error::{Error, Result};
use crate::record::{RatingRecord, CATEGORICAL_FACTORS, CATEGORICAL_LEVELS, NUMERIC_FACTORS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two independently modeled quantities a pool (or model)
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Claim frequency: events per unit exposure, Poisson loss with a
    /// log-exposure offset.
    Frequency,
    /// Claim severity: average cost given a claim, squared-error loss
    /// weighted by claim count.
    Severity,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Frequency => "frequency",
            ModelKind::Severity => "severity",
        }
    }

    /// Loss function the trainer uses for this kind.
    pub fn loss(&self) -> Loss {
        match self {
            ModelKind::Frequency => Loss::Poisson,
            ModelKind::Severity => Loss::SquaredError,
        }
    }

    /// Error metric name reported for this kind.
    pub fn metric_name(&self) -> &'static str {
        match self {
            ModelKind::Frequency => "mean_poisson_deviance",
            ModelKind::Severity => "rmse",
        }
    }

    /// Default artifact file name for this kind's fitted model.
    pub fn artifact_file(&self) -> &'static str {
        match self {
            ModelKind::Frequency => "frequency_model.json",
            ModelKind::Severity => "severity_model.json",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, kind-tagged projection of one or more rating records.
#[derive(Debug, Clone)]
pub struct Pool {
    kind: ModelKind,
    rows: usize,
    /// Numeric columns first, categorical columns after, both in the
    /// order of [`NUMERIC_FACTORS`] and [`CATEGORICAL_FACTORS`].
    columns: Vec<FeatureColumn>,
    /// Offset (frequency) or weight (severity), one value per row.
    aux: Vec<f64>,
    labels: Option<Vec<f64>>,
}

impl Pool {
    /// Build a pool from a record batch.
    ///
    /// Frequency pools default a missing exposure to 1 (the quote-time
    /// convention: rate for one full policy year, offset 0) and reject a
    /// non-positive exposure. Severity pools default a missing claim count
    /// to 1; a claim count of 0 is a valid, inert weight-0 row. Labels are
    /// attached only when every record carries the target fields; a mixed
    /// batch is rejected.
    pub fn build(records: &[RatingRecord], kind: ModelKind) -> Result<Pool> {
        if records.is_empty() {
            return Err(Error::training("cannot build a pool from an empty record batch"));
        }
        let rows = records.len();

        let mut numeric: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); NUMERIC_FACTORS.len()];
        let mut categorical: Vec<Vec<u8>> =
            vec![Vec::with_capacity(rows); CATEGORICAL_FACTORS.len()];
        for record in records {
            for (column, value) in numeric.iter_mut().zip(record.numeric_factors()) {
                column.push(value);
            }
            for (column, code) in categorical.iter_mut().zip(record.categorical_codes()) {
                column.push(code);
            }
        }

        let mut columns = Vec::with_capacity(NUMERIC_FACTORS.len() + CATEGORICAL_FACTORS.len());
        columns.extend(numeric.into_iter().map(FeatureColumn::Numeric));
        columns.extend(
            categorical
                .into_iter()
                .zip(CATEGORICAL_LEVELS)
                .map(|(codes, levels)| FeatureColumn::Categorical { codes, levels }),
        );

        let (aux, labels) = match kind {
            ModelKind::Frequency => {
                let mut offsets = Vec::with_capacity(rows);
                for record in records {
                    let exposure = record.exposure.unwrap_or(1.0);
                    if exposure <= 0.0 {
                        return Err(Error::domain(format!(
                            "Exposure must be positive for a log offset, got {}",
                            exposure
                        )));
                    }
                    offsets.push(exposure.ln());
                }
                (offsets, frequency_labels(records)?)
            }
            ModelKind::Severity => {
                let weights = records
                    .iter()
                    .map(|r| f64::from(r.claim_count.unwrap_or(1)))
                    .collect();
                (weights, severity_labels(records)?)
            }
        };

        Ok(Pool { kind, rows, columns, aux, labels })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Log-exposure offsets; present on frequency pools only.
    pub fn offset(&self) -> Option<&[f64]> {
        match self.kind {
            ModelKind::Frequency => Some(&self.aux),
            ModelKind::Severity => None,
        }
    }

    /// Claim-count regression weights; present on severity pools only.
    pub fn weight(&self) -> Option<&[f64]> {
        match self.kind {
            ModelKind::Frequency => None,
            ModelKind::Severity => Some(&self.aux),
        }
    }

    pub fn labels(&self) -> Option<&[f64]> {
        self.labels.as_deref()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Borrowed view handed to the boosting capability. The offset becomes
    /// the baseline margin; the weight becomes the per-row loss weight.
    pub fn dataset(&self) -> Dataset<'_> {
        Dataset {
            columns: &self.columns,
            rows: self.rows,
            labels: self.labels.as_deref(),
            baseline: self.offset(),
            weights: self.weight(),
        }
    }
}

/// Frequency target: the observed claim count.
fn frequency_labels(records: &[RatingRecord]) -> Result<Option<Vec<f64>>> {
    let all: Option<Vec<f64>> = records
        .iter()
        .map(|r| r.claim_count.map(f64::from))
        .collect();
    match all {
        Some(labels) => Ok(Some(labels)),
        None if records.iter().all(|r| r.claim_count.is_none()) => Ok(None),
        None => Err(Error::MissingFeature("ClaimNb")),
    }
}

/// Severity target: average cost per claim, 0 for claim-free rows (which
/// stay in the pool as weight-0 rows).
fn severity_labels(records: &[RatingRecord]) -> Result<Option<Vec<f64>>> {
    let all: Option<Vec<f64>> = records
        .iter()
        .map(|r| match (r.claim_count, r.claims_cost) {
            (Some(count), Some(cost)) => Some(if count > 0 {
                cost / f64::from(count)
            } else {
                0.0
            }),
            _ => None,
        })
        .collect();
    match all {
        Some(labels) => Ok(Some(labels)),
        None if records.iter().all(|r| r.claims_cost.is_none()) => Ok(None),
        None => {
            let missing = if records
                .iter()
                .any(|r| r.claims_cost.is_some() && r.claim_count.is_none())
            {
                "ClaimNb"
            } else {
                "claims_cost"
            };
            Err(Error::MissingFeature(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AreaCode, FuelType, RegionCode, VehicleBrand};
    use approx::assert_relative_eq;

    fn record() -> RatingRecord {
        RatingRecord {
            vehicle_power: 6,
            vehicle_age: 4,
            driver_age: 40,
            density: 1200,
            bonus_malus: 60,
            brand: VehicleBrand::B12,
            fuel: FuelType::Diesel,
            region: RegionCode::R82,
            area: AreaCode::C,
            exposure: None,
            claim_count: None,
            claims_cost: None,
        }
    }

    fn observation(exposure: f64, claim_count: u32, claims_cost: f64) -> RatingRecord {
        RatingRecord {
            exposure: Some(exposure),
            claim_count: Some(claim_count),
            claims_cost: Some(claims_cost),
            ..record()
        }
    }

    #[test]
    fn test_frequency_defaults_to_full_year_offset() {
        let pool = Pool::build(&[record()], ModelKind::Frequency).unwrap();
        assert_eq!(pool.offset().unwrap(), &[0.0]);
        assert!(pool.weight().is_none());
        assert!(pool.labels().is_none());
    }

    #[test]
    fn test_frequency_offset_is_log_exposure() {
        let mut r = record();
        r.exposure = Some(0.5);
        let pool = Pool::build(&[r], ModelKind::Frequency).unwrap();
        assert_relative_eq!(pool.offset().unwrap()[0], 0.5_f64.ln());
    }

    #[test]
    fn test_frequency_rejects_non_positive_exposure() {
        let mut r = record();
        r.exposure = Some(0.0);
        assert!(matches!(
            Pool::build(&[r], ModelKind::Frequency),
            Err(Error::Domain(_))
        ));

        let mut r = record();
        r.exposure = Some(-0.25);
        assert!(matches!(
            Pool::build(&[r], ModelKind::Frequency),
            Err(Error::Domain(_))
        ));
    }

    #[test]
    fn test_severity_defaults_weight_to_one() {
        let pool = Pool::build(&[record()], ModelKind::Severity).unwrap();
        assert_eq!(pool.weight().unwrap(), &[1.0]);
        assert!(pool.offset().is_none());
        assert!(pool.labels().is_none());
    }

    #[test]
    fn test_severity_zero_claim_rows_stay_inert() {
        let rows = [observation(0.5, 2, 3000.0), observation(1.0, 0, 0.0)];
        let pool = Pool::build(&rows, ModelKind::Severity).unwrap();
        // The claim-free row is present with weight 0 and label 0, not dropped.
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.weight().unwrap(), &[2.0, 0.0]);
        assert_eq!(pool.labels().unwrap(), &[1500.0, 0.0]);
    }

    #[test]
    fn test_labels_attach_when_every_record_is_observed() {
        let rows = [observation(0.5, 1, 800.0), observation(0.9, 3, 2400.0)];

        let freq = Pool::build(&rows, ModelKind::Frequency).unwrap();
        assert_eq!(freq.labels().unwrap(), &[1.0, 3.0]);

        let sev = Pool::build(&rows, ModelKind::Severity).unwrap();
        assert_eq!(sev.labels().unwrap(), &[800.0, 800.0]);
    }

    #[test]
    fn test_mixed_label_batch_is_rejected() {
        let rows = [observation(0.5, 1, 800.0), record()];
        assert!(matches!(
            Pool::build(&rows, ModelKind::Frequency),
            Err(Error::MissingFeature("ClaimNb"))
        ));
        assert!(matches!(
            Pool::build(&rows, ModelKind::Severity),
            Err(Error::MissingFeature(_))
        ));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        assert!(matches!(
            Pool::build(&[], ModelKind::Frequency),
            Err(Error::Training(_))
        ));
    }

    #[test]
    fn test_column_layout_is_fixed() {
        let pool = Pool::build(&[record()], ModelKind::Frequency).unwrap();
        assert_eq!(pool.columns().len(), NUMERIC_FACTORS.len() + CATEGORICAL_FACTORS.len());
        // VehPower leads the numeric block
        match &pool.columns()[0] {
            FeatureColumn::Numeric(values) => assert_eq!(values, &[6.0]),
            other => panic!("expected numeric column, got {:?}", other),
        }
        // VehBrand leads the categorical block
        match &pool.columns()[NUMERIC_FACTORS.len()] {
            FeatureColumn::Categorical { codes, levels } => {
                assert_eq!(codes, &[VehicleBrand::B12.code()]);
                assert_eq!(*levels, VehicleBrand::ALL.len());
            }
            other => panic!("expected categorical column, got {:?}", other),
        }
    }

    #[test]
    fn test_build_does_not_mutate_records() {
        let rows = [observation(0.5, 1, 800.0)];
        let before = rows.clone();
        let _ = Pool::build(&rows, ModelKind::Frequency).unwrap();
        let _ = Pool::build(&rows, ModelKind::Severity).unwrap();
        assert_eq!(rows, before);
    }
}
