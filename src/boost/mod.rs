//! Gradient-boosting capability behind the trainer
//!
//! This is the callable fit the pricing core delegates to: Newton boosting
//! on depth-limited regression trees, with the two losses the pricing
//! protocols need. A Poisson booster models a rate through a log link and
//! accepts a per-row baseline margin (the exposure offset); a squared-error
//! booster accepts per-row weights. Fitting monitors an eval set and keeps
//! the model from the best validation round, not the last one.
//!
//! The backend parallelizes split search across features; thread count
//! changes wall-clock time only, never the fitted model.

pub mod tree;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
pub use tree::{Split, Tree};
use tree::GrowParams;

/// Rate floor used for the Poisson bias when the training batch has no
/// claims at all.
const ZERO_RATE_FLOOR: f64 = 1e-9;

/// Minimum eval-loss improvement that counts as progress.
const EVAL_TOLERANCE: f64 = 1e-12;

/// One feature column in the model-ready representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureColumn {
    Numeric(Vec<f64>),
    Categorical { codes: Vec<u8>, levels: usize },
}

impl FeatureColumn {
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::Numeric(values) => values.len(),
            FeatureColumn::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Borrowed view of a pool handed to the booster.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub columns: &'a [FeatureColumn],
    pub rows: usize,
    pub labels: Option<&'a [f64]>,
    /// Fixed additive margin per row (the log-exposure offset).
    pub baseline: Option<&'a [f64]>,
    /// Per-row loss weight (the claim count).
    pub weights: Option<&'a [f64]>,
}

impl Dataset<'_> {
    fn weight(&self, row: usize) -> f64 {
        self.weights.map_or(1.0, |w| w[row])
    }

    fn baseline_margin(&self, row: usize) -> f64 {
        self.baseline.map_or(0.0, |b| b[row])
    }
}

/// Loss function driving gradient and prediction semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// Poisson deviance with a log link; the fitted mean is
    /// `exp(baseline + margin)`, so a log-exposure baseline turns the count
    /// model into a rate model.
    Poisson,
    /// Squared error with per-row weights.
    SquaredError,
}

impl Loss {
    /// Gradient and hessian of the per-row loss at the current margin.
    fn grad_hess(&self, margin: f64, label: f64, weight: f64) -> (f64, f64) {
        match self {
            Loss::Poisson => {
                let mu = margin.exp();
                (mu - label, mu)
            }
            Loss::SquaredError => (weight * (margin - label), weight),
        }
    }

    /// Map a raw margin to the prediction scale.
    pub fn transform(&self, margin: f64) -> f64 {
        match self {
            Loss::Poisson => margin.exp(),
            Loss::SquaredError => margin,
        }
    }

    /// Loss-minimizing constant margin for the training batch.
    fn base_margin(&self, data: &Dataset<'_>, labels: &[f64]) -> f64 {
        match self {
            Loss::Poisson => {
                let label_sum: f64 = labels.iter().sum();
                let exposure_sum: f64 = match data.baseline {
                    Some(baseline) => baseline.iter().map(|b| b.exp()).sum(),
                    None => labels.len() as f64,
                };
                let rate = label_sum / exposure_sum;
                if rate > 0.0 {
                    rate.ln()
                } else {
                    ZERO_RATE_FLOOR.ln()
                }
            }
            Loss::SquaredError => {
                let mut weight_sum = 0.0;
                let mut weighted_labels = 0.0;
                for (row, label) in labels.iter().enumerate() {
                    let w = data.weight(row);
                    weight_sum += w;
                    weighted_labels += w * label;
                }
                if weight_sum > 0.0 {
                    weighted_labels / weight_sum
                } else {
                    0.0
                }
            }
        }
    }

    /// Mean validation loss over a margin vector.
    fn eval(&self, margins: &[f64], labels: &[f64], weights: Option<&[f64]>) -> f64 {
        let mut loss_sum = 0.0;
        let mut weight_sum = 0.0;
        for (row, (&margin, &label)) in margins.iter().zip(labels).enumerate() {
            let w = weights.map_or(1.0, |ws| ws[row]);
            let row_loss = match self {
                Loss::Poisson => {
                    // Unit deviance; the y*ln(y/mu) term vanishes at y = 0.
                    let mu = margin.exp();
                    let link = if label > 0.0 {
                        label * (label / mu).ln()
                    } else {
                        0.0
                    };
                    2.0 * (link - label + mu)
                }
                Loss::SquaredError => {
                    let diff = margin - label;
                    diff * diff
                }
            };
            loss_sum += w * row_loss;
            weight_sum += w;
        }
        if weight_sum > 0.0 {
            loss_sum / weight_sum
        } else {
            0.0
        }
    }
}

/// Boosting hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostParams {
    /// Maximum boosting rounds.
    pub max_rounds: usize,
    /// Consecutive non-improving eval rounds before stopping.
    pub early_stopping_rounds: usize,
    /// Shrinkage applied to each tree's contribution.
    pub learning_rate: f64,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum rows per leaf.
    pub min_leaf_rows: usize,
    /// L2 regularization on leaf values.
    pub l2_reg: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            max_rounds: 2000,
            early_stopping_rounds: 50,
            learning_rate: 0.1,
            max_depth: 4,
            min_leaf_rows: 1,
            l2_reg: 1.0,
        }
    }
}

/// Result of one fit call.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// The model truncated to the best validation round.
    pub booster: Booster,
    /// Round (tree count) with the lowest eval loss; 0 means the constant
    /// baseline model was never beaten.
    pub best_round: usize,
    /// Eval loss at the best round.
    pub best_eval_loss: f64,
    /// Rounds actually grown before stopping.
    pub rounds_grown: usize,
}

/// A fitted boosting ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    loss: Loss,
    base_margin: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl Booster {
    /// Fit an ensemble with early stopping against `eval_set`.
    ///
    /// Grows one tree per round on the gradients of `loss`, monitors the
    /// eval loss, stops after `early_stopping_rounds` rounds without
    /// improvement and discards the trees grown after the best round.
    pub fn fit(
        loss: Loss,
        train: &Dataset<'_>,
        eval_set: &Dataset<'_>,
        params: &BoostParams,
    ) -> Result<FitOutcome> {
        let train_labels = train
            .labels
            .ok_or_else(|| Error::training("training pool carries no labels"))?;
        let eval_labels = eval_set
            .labels
            .ok_or_else(|| Error::training("validation pool carries no labels"))?;
        if train.rows == 0 || eval_set.rows == 0 {
            return Err(Error::training("cannot fit on an empty pool"));
        }

        let grow = GrowParams {
            max_depth: params.max_depth,
            min_leaf_rows: params.min_leaf_rows,
            l2_reg: params.l2_reg,
        };

        let base_margin = loss.base_margin(train, train_labels);
        let mut booster = Booster {
            loss,
            base_margin,
            learning_rate: params.learning_rate,
            trees: Vec::new(),
        };

        let mut train_margins: Vec<f64> = (0..train.rows)
            .map(|row| base_margin + train.baseline_margin(row))
            .collect();
        let mut eval_margins: Vec<f64> = (0..eval_set.rows)
            .map(|row| base_margin + eval_set.baseline_margin(row))
            .collect();

        let mut best_eval_loss = loss.eval(&eval_margins, eval_labels, eval_set.weights);
        let mut best_round = 0usize;
        let mut stale_rounds = 0usize;

        let mut grad = vec![0.0; train.rows];
        let mut hess = vec![0.0; train.rows];

        for round in 1..=params.max_rounds {
            for row in 0..train.rows {
                let (g, h) =
                    loss.grad_hess(train_margins[row], train_labels[row], train.weight(row));
                grad[row] = g;
                hess[row] = h;
            }

            let tree = Tree::fit(train.columns, &grad, &hess, &grow);
            for (row, margin) in train_margins.iter_mut().enumerate() {
                *margin += params.learning_rate * tree.predict_row(train.columns, row);
            }
            for (row, margin) in eval_margins.iter_mut().enumerate() {
                *margin += params.learning_rate * tree.predict_row(eval_set.columns, row);
            }
            booster.trees.push(tree);

            let eval_loss = loss.eval(&eval_margins, eval_labels, eval_set.weights);
            if eval_loss + EVAL_TOLERANCE < best_eval_loss {
                best_eval_loss = eval_loss;
                best_round = round;
                stale_rounds = 0;
            } else {
                stale_rounds += 1;
            }

            if round % 100 == 0 {
                log::debug!(
                    "round {}: eval loss {:.6} (best {:.6} at round {})",
                    round,
                    eval_loss,
                    best_eval_loss,
                    best_round
                );
            }
            if stale_rounds >= params.early_stopping_rounds {
                break;
            }
        }

        let rounds_grown = booster.trees.len();
        booster.trees.truncate(best_round);

        Ok(FitOutcome {
            booster,
            best_round,
            best_eval_loss,
            rounds_grown,
        })
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw margins: base margin + baseline offset + shrunken tree values.
    pub fn margins(&self, data: &Dataset<'_>) -> Vec<f64> {
        (0..data.rows)
            .map(|row| {
                let mut margin = self.base_margin + data.baseline_margin(row);
                for tree in &self.trees {
                    margin += self.learning_rate * tree.predict_row(data.columns, row);
                }
                margin
            })
            .collect()
    }

    /// Predictions on the response scale, one per row, order-preserving.
    pub fn predict(&self, data: &Dataset<'_>) -> Vec<f64> {
        self.margins(data)
            .into_iter()
            .map(|margin| self.loss.transform(margin))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn numeric_columns(values: Vec<f64>) -> Vec<FeatureColumn> {
        vec![FeatureColumn::Numeric(values)]
    }

    fn dataset<'a>(
        columns: &'a [FeatureColumn],
        labels: Option<&'a [f64]>,
        baseline: Option<&'a [f64]>,
        weights: Option<&'a [f64]>,
    ) -> Dataset<'a> {
        Dataset {
            columns,
            rows: columns[0].len(),
            labels,
            baseline,
            weights,
        }
    }

    fn quick_params() -> BoostParams {
        BoostParams {
            max_rounds: 200,
            early_stopping_rounds: 20,
            learning_rate: 0.3,
            max_depth: 2,
            min_leaf_rows: 1,
            l2_reg: 0.0,
        }
    }

    #[test]
    fn test_poisson_fit_orders_rate_groups() {
        let columns = numeric_columns(vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]);
        let labels = [0.0, 0.0, 0.0, 0.0, 3.0, 2.0, 3.0, 4.0];
        let train = dataset(&columns, Some(&labels[..]), None, None);

        let outcome = Booster::fit(Loss::Poisson, &train, &train, &quick_params()).unwrap();
        let predictions = outcome.booster.predict(&train);

        for p in &predictions {
            assert!(*p > 0.0, "Poisson predictions must be positive");
        }
        let low: f64 = predictions[..4].iter().sum::<f64>() / 4.0;
        let high: f64 = predictions[4..].iter().sum::<f64>() / 4.0;
        assert!(high > low * 5.0, "high-rate group must dominate: {} vs {}", high, low);
    }

    #[test]
    fn test_baseline_offset_scales_poisson_predictions() {
        let columns = numeric_columns(vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]);
        let labels = [0.0, 1.0, 0.0, 1.0, 3.0, 2.0, 3.0, 4.0];
        let train = dataset(&columns, Some(&labels[..]), None, None);
        let outcome = Booster::fit(Loss::Poisson, &train, &train, &quick_params()).unwrap();

        let full_year = outcome.booster.predict(&dataset(&columns, None, None, None));
        let half_offsets = vec![0.5_f64.ln(); 8];
        let half_year =
            outcome
                .booster
                .predict(&dataset(&columns, None, Some(&half_offsets[..]), None));

        for (half, full) in half_year.iter().zip(&full_year) {
            assert_relative_eq!(*half, 0.5 * full, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_zero_weight_rows_are_inert_by_arithmetic() {
        assert_eq!(Loss::SquaredError.grad_hess(5.0, 123.0, 0.0), (0.0, 0.0));

        // All the weight sits on the 10.0 labels; the weight-0 rows carry an
        // absurd target that must not move the fit.
        let columns = numeric_columns(vec![1.0, 2.0, 3.0, 4.0]);
        let labels = [10.0, 10.0, 9999.0, 9999.0];
        let weights = [1.0, 1.0, 0.0, 0.0];
        let train = dataset(&columns, Some(&labels[..]), None, Some(&weights[..]));

        let outcome = Booster::fit(Loss::SquaredError, &train, &train, &quick_params()).unwrap();
        for p in outcome.booster.predict(&train) {
            assert_relative_eq!(p, 10.0, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_early_stopping_keeps_best_round_not_last() {
        // Training labels alternate around the mean; the eval labels sit at
        // the mean exactly. Every tree fits training noise and degrades the
        // eval loss, so the best model is the round-0 constant.
        let columns = numeric_columns((0..8).map(f64::from).collect());
        let train_labels = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let eval_labels = [0.5; 8];
        let train = dataset(&columns, Some(&train_labels[..]), None, None);
        let eval_set = dataset(&columns, Some(&eval_labels[..]), None, None);

        let params = BoostParams {
            max_rounds: 100,
            early_stopping_rounds: 5,
            ..quick_params()
        };
        let outcome = Booster::fit(Loss::SquaredError, &train, &eval_set, &params).unwrap();

        assert_eq!(outcome.best_round, 0);
        assert_eq!(outcome.rounds_grown, 5);
        assert_eq!(outcome.booster.n_trees(), 0);
        for p in outcome.booster.predict(&eval_set) {
            assert_relative_eq!(p, 0.5);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let columns = numeric_columns(vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
        let labels = [2.0, 7.0, 1.0, 8.0, 2.0, 8.0, 1.0, 8.0];
        let train = dataset(&columns, Some(&labels[..]), None, None);

        let a = Booster::fit(Loss::SquaredError, &train, &train, &quick_params()).unwrap();
        let b = Booster::fit(Loss::SquaredError, &train, &train, &quick_params()).unwrap();
        assert_eq!(a.booster, b.booster);
    }

    #[test]
    fn test_serde_round_trip_reproduces_predictions_exactly() {
        let columns = numeric_columns(vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]);
        let labels = [0.0, 0.0, 1.0, 0.0, 3.0, 2.0, 3.0, 4.0];
        let train = dataset(&columns, Some(&labels[..]), None, None);
        let outcome = Booster::fit(Loss::Poisson, &train, &train, &quick_params()).unwrap();

        let json = serde_json::to_string(&outcome.booster).unwrap();
        let reloaded: Booster = serde_json::from_str(&json).unwrap();

        let scoring = dataset(&columns, None, None, None);
        assert_eq!(outcome.booster.predict(&scoring), reloaded.predict(&scoring));
    }

    #[test]
    fn test_fit_requires_labels() {
        let columns = numeric_columns(vec![1.0, 2.0]);
        let labels = [1.0, 2.0];
        let labeled = dataset(&columns, Some(&labels[..]), None, None);
        let unlabeled = dataset(&columns, None, None, None);

        assert!(matches!(
            Booster::fit(Loss::Poisson, &unlabeled, &labeled, &quick_params()),
            Err(Error::Training(_))
        ));
        assert!(matches!(
            Booster::fit(Loss::Poisson, &labeled, &unlabeled, &quick_params()),
            Err(Error::Training(_))
        ));
    }
}
