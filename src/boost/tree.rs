//! Depth-limited regression trees fit to Newton gradients
//!
//! Each boosting round fits one tree to the per-row gradient/hessian pairs
//! of the loss. Numeric features split on a threshold, categorical features
//! split one-vs-rest on a level code. Split selection is deterministic for
//! a given input regardless of thread count: features are searched in
//! parallel, then reduced with a stable tie-break on feature index.

use super::FeatureColumn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Minimum gain for a split to be worth taking.
const MIN_GAIN: f64 = 1e-12;

/// A single split decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Split {
    /// Numeric: rows with value strictly below the cut go left.
    Threshold { feature: usize, cut: f64 },
    /// Categorical one-vs-rest: rows matching the level code go left.
    Level { feature: usize, level: u8 },
}

impl Split {
    fn goes_left(&self, columns: &[FeatureColumn], row: usize) -> bool {
        // The feature index always points at a column of the matching
        // variant: splits are only ever built from these same columns.
        match self {
            Split::Threshold { feature, cut } => match &columns[*feature] {
                FeatureColumn::Numeric(values) => values[row] < *cut,
                FeatureColumn::Categorical { .. } => false,
            },
            Split::Level { feature, level } => match &columns[*feature] {
                FeatureColumn::Categorical { codes, .. } => codes[row] == *level,
                FeatureColumn::Numeric(_) => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Branch {
        split: Split,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Growth limits for one tree, derived from the boosting parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowParams {
    pub max_depth: usize,
    pub min_leaf_rows: usize,
    pub l2_reg: f64,
}

/// One regression tree in the ensemble. Leaf values are raw Newton steps;
/// the booster applies the learning rate when accumulating margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    /// Fit a tree to the given gradients and hessians over all rows.
    pub(crate) fn fit(
        columns: &[FeatureColumn],
        grad: &[f64],
        hess: &[f64],
        params: &GrowParams,
    ) -> Tree {
        let rows: Vec<usize> = (0..grad.len()).collect();
        let mut nodes = Vec::new();
        let root = grow(columns, &rows, grad, hess, params, 0, &mut nodes);
        Tree { nodes, root }
    }

    /// Value for a single row of the given columns.
    pub fn predict_row(&self, columns: &[FeatureColumn], row: usize) -> f64 {
        let mut index = self.root;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Branch { split, left, right } => {
                    index = if split.goes_left(columns, row) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Newton leaf value: the loss-minimizing constant for the node.
fn leaf_value(g_sum: f64, h_sum: f64, l2_reg: f64) -> f64 {
    let denom = h_sum + l2_reg;
    if denom > 0.0 {
        -g_sum / denom
    } else {
        0.0
    }
}

/// Structure score used in the split gain.
fn score(g_sum: f64, h_sum: f64, l2_reg: f64) -> f64 {
    let denom = h_sum + l2_reg;
    if denom > 0.0 {
        g_sum * g_sum / denom
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    gain: f64,
    split_feature: usize,
    split: SplitKind,
}

#[derive(Debug, Clone, Copy)]
enum SplitKind {
    Threshold(f64),
    Level(u8),
}

/// Recursively grow a subtree over `rows`, returning the arena index of its
/// root node.
fn grow(
    columns: &[FeatureColumn],
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
    params: &GrowParams,
    depth: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let g_sum: f64 = rows.iter().map(|&r| grad[r]).sum();
    let h_sum: f64 = rows.iter().map(|&r| hess[r]).sum();

    let make_leaf = |nodes: &mut Vec<Node>| {
        nodes.push(Node::Leaf {
            value: leaf_value(g_sum, h_sum, params.l2_reg),
        });
        nodes.len() - 1
    };

    if depth >= params.max_depth || rows.len() < 2 * params.min_leaf_rows.max(1) {
        return make_leaf(nodes);
    }

    let Some(candidate) = best_split(columns, rows, grad, hess, g_sum, h_sum, params) else {
        return make_leaf(nodes);
    };

    let split = match candidate.split {
        SplitKind::Threshold(cut) => Split::Threshold {
            feature: candidate.split_feature,
            cut,
        },
        SplitKind::Level(level) => Split::Level {
            feature: candidate.split_feature,
            level,
        },
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| split.goes_left(columns, r));

    let left = grow(columns, &left_rows, grad, hess, params, depth + 1, nodes);
    let right = grow(columns, &right_rows, grad, hess, params, depth + 1, nodes);
    nodes.push(Node::Branch { split, left, right });
    nodes.len() - 1
}

/// Best split across all features, or None when no split clears the gain
/// and minimum-leaf constraints.
fn best_split(
    columns: &[FeatureColumn],
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
    g_sum: f64,
    h_sum: f64,
    params: &GrowParams,
) -> Option<Candidate> {
    let parent_score = score(g_sum, h_sum, params.l2_reg);

    let per_feature: Vec<Option<Candidate>> = columns
        .par_iter()
        .enumerate()
        .map(|(feature, column)| match column {
            FeatureColumn::Numeric(values) => {
                best_numeric_split(feature, values, rows, grad, hess, g_sum, h_sum, parent_score, params)
            }
            FeatureColumn::Categorical { codes, levels } => best_level_split(
                feature,
                codes,
                *levels,
                rows,
                grad,
                hess,
                g_sum,
                h_sum,
                parent_score,
                params,
            ),
        })
        .collect();

    // Stable reduction: strictly greater gain wins, ties keep the earlier
    // feature, so the result does not depend on rayon scheduling.
    per_feature
        .into_iter()
        .flatten()
        .fold(None, |best: Option<Candidate>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
}

#[allow(clippy::too_many_arguments)]
fn best_numeric_split(
    feature: usize,
    values: &[f64],
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
    g_sum: f64,
    h_sum: f64,
    parent_score: f64,
    params: &GrowParams,
) -> Option<Candidate> {
    let mut ordered: Vec<(f64, f64, f64)> =
        rows.iter().map(|&r| (values[r], grad[r], hess[r])).collect();
    ordered.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut best: Option<Candidate> = None;
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    for i in 0..ordered.len() - 1 {
        g_left += ordered[i].1;
        h_left += ordered[i].2;

        // Only boundaries between distinct values are valid cuts.
        if ordered[i].0 == ordered[i + 1].0 {
            continue;
        }
        let n_left = i + 1;
        let n_right = ordered.len() - n_left;
        if n_left < params.min_leaf_rows || n_right < params.min_leaf_rows {
            continue;
        }

        let gain = score(g_left, h_left, params.l2_reg)
            + score(g_sum - g_left, h_sum - h_left, params.l2_reg)
            - parent_score;
        if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
            let cut = (ordered[i].0 + ordered[i + 1].0) / 2.0;
            best = Some(Candidate {
                gain,
                split_feature: feature,
                split: SplitKind::Threshold(cut),
            });
        }
    }
    best
}

#[allow(clippy::too_many_arguments)]
fn best_level_split(
    feature: usize,
    codes: &[u8],
    levels: usize,
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
    g_sum: f64,
    h_sum: f64,
    parent_score: f64,
    params: &GrowParams,
) -> Option<Candidate> {
    let mut g_level = vec![0.0; levels];
    let mut h_level = vec![0.0; levels];
    let mut n_level = vec![0usize; levels];
    for &r in rows {
        let code = codes[r] as usize;
        g_level[code] += grad[r];
        h_level[code] += hess[r];
        n_level[code] += 1;
    }

    let mut best: Option<Candidate> = None;
    for level in 0..levels {
        let n_left = n_level[level];
        let n_right = rows.len() - n_left;
        if n_left < params.min_leaf_rows || n_right < params.min_leaf_rows {
            continue;
        }

        let gain = score(g_level[level], h_level[level], params.l2_reg)
            + score(g_sum - g_level[level], h_sum - h_level[level], params.l2_reg)
            - parent_score;
        if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
            best = Some(Candidate {
                gain,
                split_feature: feature,
                split: SplitKind::Level(level as u8),
            });
        }
    }
    best
}
