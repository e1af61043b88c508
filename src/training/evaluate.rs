//! Portfolio-level model evaluation
//!
//! Produces the actual-to-predicted calibration ratio and the
//! kind-appropriate error metric. Severity evaluation masks out rows with
//! zero weight: a claim-free row carries a placeholder severity target, and
//! letting it into the ratio or the RMSE would silently bias both toward
//! non-claims.

use super::FittedModel;
use crate::error::{Error, Result};
use crate::pool::{ModelKind, Pool};

/// Evaluation output for one model on one pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// sum(actual) / sum(predicted); near 1.0 for a well-calibrated model.
    pub ap_ratio: f64,
    /// Mean Poisson deviance (frequency) or RMSE over positive-weight rows
    /// (severity).
    pub error_metric: f64,
}

/// Score a fitted model against a labeled pool of the same kind.
pub fn evaluate(model: &FittedModel, pool: &Pool) -> Result<Evaluation> {
    let actual = pool
        .labels()
        .ok_or_else(|| Error::training("evaluation pool carries no labels"))?;
    let predicted = model.predict_pool(pool)?;

    match pool.kind() {
        ModelKind::Frequency => frequency_evaluation(actual, &predicted),
        ModelKind::Severity => {
            let weights = pool
                .weight()
                .ok_or_else(|| Error::training("severity pool carries no weights"))?;
            severity_evaluation(actual, &predicted, weights)
        }
    }
}

fn ap_ratio(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    let predicted_sum: f64 = predicted.iter().sum();
    if predicted_sum == 0.0 {
        return Err(Error::domain(
            "predicted total is zero; actual-to-predicted ratio is undefined",
        ));
    }
    Ok(actual.iter().sum::<f64>() / predicted_sum)
}

/// Calibration ratio plus mean Poisson deviance.
fn frequency_evaluation(actual: &[f64], predicted: &[f64]) -> Result<Evaluation> {
    let mut deviance_sum = 0.0;
    for (&y, &mu) in actual.iter().zip(predicted) {
        if mu <= 0.0 {
            return Err(Error::domain(format!(
                "Poisson deviance requires positive predictions, got {}",
                mu
            )));
        }
        // The y*ln(y/mu) term vanishes at y = 0.
        let link = if y > 0.0 { y * (y / mu).ln() } else { 0.0 };
        deviance_sum += 2.0 * (link - y + mu);
    }

    Ok(Evaluation {
        ap_ratio: ap_ratio(actual, predicted)?,
        error_metric: deviance_sum / actual.len() as f64,
    })
}

/// Calibration ratio plus RMSE, both restricted to positive-weight rows.
fn severity_evaluation(actual: &[f64], predicted: &[f64], weights: &[f64]) -> Result<Evaluation> {
    let mut masked_actual = Vec::new();
    let mut masked_predicted = Vec::new();
    for ((&y, &p), &w) in actual.iter().zip(predicted).zip(weights) {
        if w > 0.0 {
            masked_actual.push(y);
            masked_predicted.push(p);
        }
    }
    if masked_actual.is_empty() {
        return Err(Error::training(
            "severity evaluation has no positive-weight rows",
        ));
    }

    let squared_sum: f64 = masked_actual
        .iter()
        .zip(&masked_predicted)
        .map(|(&y, &p)| (y - p) * (y - p))
        .sum();

    Ok(Evaluation {
        ap_ratio: ap_ratio(&masked_actual, &masked_predicted)?,
        error_metric: (squared_sum / masked_actual.len() as f64).sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::BoostParams;
    use crate::training::Trainer;
    use approx::assert_relative_eq;

    #[test]
    fn test_ap_ratio_is_exactly_one_when_predictions_match() {
        let actual = [0.0, 1.0, 2.0, 0.0, 3.0];
        let result = frequency_evaluation(&actual, &actual).unwrap();
        assert_eq!(result.ap_ratio, 1.0);
        assert_relative_eq!(result.error_metric, 0.0);
    }

    #[test]
    fn test_frequency_deviance_penalizes_miscalibration() {
        let actual = [1.0, 1.0, 1.0, 1.0];
        let good = frequency_evaluation(&actual, &[1.0, 1.0, 1.0, 1.0]).unwrap();
        let bad = frequency_evaluation(&actual, &[0.2, 0.2, 0.2, 0.2]).unwrap();
        assert!(bad.error_metric > good.error_metric);
        assert_relative_eq!(bad.ap_ratio, 5.0);
    }

    #[test]
    fn test_frequency_rejects_non_positive_predictions() {
        assert!(frequency_evaluation(&[1.0], &[0.0]).is_err());
        assert!(frequency_evaluation(&[1.0], &[-0.5]).is_err());
    }

    #[test]
    fn test_severity_mask_excludes_zero_weight_rows() {
        // The second row is claim-free: its placeholder target and its
        // prediction must not reach the ratio or the RMSE.
        let actual = [1200.0, 0.0];
        let predicted = [1200.0, 700.0];
        let weights = [2.0, 0.0];
        let result = severity_evaluation(&actual, &predicted, &weights).unwrap();
        assert_eq!(result.ap_ratio, 1.0);
        assert_relative_eq!(result.error_metric, 0.0);
    }

    #[test]
    fn test_severity_rmse_over_masked_rows() {
        let actual = [100.0, 0.0, 200.0];
        let predicted = [110.0, 999.0, 190.0];
        let weights = [1.0, 0.0, 3.0];
        let result = severity_evaluation(&actual, &predicted, &weights).unwrap();
        assert_relative_eq!(result.error_metric, 10.0);
        assert_relative_eq!(result.ap_ratio, 300.0 / 300.0);
    }

    #[test]
    fn test_all_masked_severity_pool_is_an_error_not_zero() {
        let actual = [0.0, 0.0];
        let predicted = [500.0, 700.0];
        let weights = [0.0, 0.0];
        assert!(matches!(
            severity_evaluation(&actual, &predicted, &weights),
            Err(Error::Training(_))
        ));
    }

    #[test]
    fn test_evaluate_fitted_frequency_model_is_roughly_calibrated() {
        use crate::training::tests::observations;

        let records = observations(150);
        let train = Pool::build(&records[..100], ModelKind::Frequency).unwrap();
        let val = Pool::build(&records[100..], ModelKind::Frequency).unwrap();
        let trainer = Trainer::new(BoostParams {
            max_rounds: 60,
            early_stopping_rounds: 10,
            learning_rate: 0.2,
            max_depth: 3,
            min_leaf_rows: 1,
            l2_reg: 1.0,
        });
        let model = trainer.train(&train, &val).unwrap();

        let result = evaluate(&model, &train).unwrap();
        assert!(
            result.ap_ratio > 0.5 && result.ap_ratio < 2.0,
            "portfolio calibration off: {}",
            result.ap_ratio
        );
        assert!(result.error_metric.is_finite());
    }

    #[test]
    fn test_evaluate_requires_labels() {
        use crate::training::tests::observations;

        let records = observations(60);
        let train = Pool::build(&records[..40], ModelKind::Frequency).unwrap();
        let val = Pool::build(&records[40..], ModelKind::Frequency).unwrap();
        let model = Trainer::default().train(&train, &val).unwrap();

        let mut quotes = observations(10);
        for r in &mut quotes {
            r.claim_count = None;
            r.claims_cost = None;
        }
        let unlabeled = Pool::build(&quotes, ModelKind::Frequency).unwrap();
        assert!(matches!(
            evaluate(&model, &unlabeled),
            Err(Error::Training(_))
        ));
    }
}
