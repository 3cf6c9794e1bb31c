//! Gradient-boosted regression trees.
//!
//! Squared-loss boosting: start from the target mean, then repeatedly fit a
//! depth-limited tree to the residuals and add a shrunken copy of its
//! predictions. Splits are exact (every distinct threshold of every feature
//! is considered), which is affordable at the row counts the imputer sees.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result, ensure};

/// Boosting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    /// Number of boosting rounds.
    /// Default: 200
    pub n_estimators: usize,

    /// Shrinkage applied to each tree.
    /// Default: 0.1
    pub learning_rate: f64,

    /// Default: 3
    pub max_depth: usize,

    /// Default: 1
    pub min_samples_leaf: usize,

    /// Share of rows held out for diagnostics, in [0, 1).
    /// Default: 0.3
    pub holdout_fraction: f64,

    /// Seed of the holdout shuffle.
    /// Default: 0
    pub seed: u64,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            holdout_fraction: 0.3,
            seed: 0,
        }
    }
}

impl RegressorConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(self.n_estimators > 0, "imputer.n_estimators", "must be positive")?;
        ensure(
            self.learning_rate > 0.0 && self.learning_rate <= 1.0,
            "imputer.learning_rate",
            format!("must be in (0, 1], got {}", self.learning_rate),
        )?;
        ensure(self.max_depth > 0, "imputer.max_depth", "must be positive")?;
        ensure(
            self.min_samples_leaf > 0,
            "imputer.min_samples_leaf",
            "must be positive",
        )?;
        ensure(
            (0.0..1.0).contains(&self.holdout_fraction),
            "imputer.holdout_fraction",
            format!("must be in [0, 1), got {}", self.holdout_fraction),
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    fn fit(rows: &[&[f64]], targets: &[f64], config: &RegressorConfig) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.grow(rows, targets, indices, 0, config);
        tree
    }

    fn grow(
        &mut self,
        rows: &[&[f64]],
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        config: &RegressorConfig,
    ) -> usize {
        let id = self.nodes.len();
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len().max(1) as f64;
        self.nodes.push(Node::Leaf(mean));

        if depth >= config.max_depth || indices.len() < 2 * config.min_samples_leaf {
            return id;
        }
        let Some(split) = best_split(rows, targets, &indices, config.min_samples_leaf) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][split.feature] <= split.threshold);

        let left = self.grow(rows, targets, left_rows, depth + 1, config);
        let right = self.grow(rows, targets, right_rows, depth + 1, config);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn predict(&self, sample: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Split maximising the reduction in squared error.
fn best_split(
    rows: &[&[f64]],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| targets[i]).sum();
    let baseline = total * total / n as f64;
    let n_features = rows.first()?.len();

    let mut best: Option<BestSplit> = None;
    let mut order = indices.to_vec();

    for feature in 0..n_features {
        order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        for position in 0..n - 1 {
            left_sum += targets[order[position]];
            let left_n = position + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let here = rows[order[position]][feature];
            let next = rows[order[position + 1]][feature];
            if next <= here {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
                - baseline;
            if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}

/// Boosted ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    base: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    /// Fit on equal-width rows.
    pub fn fit<S: AsRef<[f64]>>(
        samples: &[S],
        targets: &[f64],
        config: &RegressorConfig,
    ) -> Result<Self> {
        config.validate()?;
        if samples.is_empty() {
            return Err(PipelineError::InsufficientSamples {
                stage: "gradient boosting",
                count: 0,
                minimum_required: 1,
            });
        }
        if samples.len() != targets.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: samples.len(),
                got: targets.len(),
            });
        }

        let rows: Vec<&[f64]> = samples.iter().map(|s| s.as_ref()).collect();
        let n_features = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(PipelineError::FeatureMismatch {
                expected: n_features,
                got: bad.len(),
            });
        }

        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&predictions)
                .map(|(t, p)| t - p)
                .collect();
            let tree = RegressionTree::fit(&rows, &residuals, config);
            for (prediction, row) in predictions.iter_mut().zip(&rows) {
                *prediction += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            base,
            learning_rate: config.learning_rate,
            n_features,
            trees,
        })
    }

    pub fn predict(&self, sample: &[f64]) -> Result<f64> {
        if sample.len() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict(sample)).sum::<f64>())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Seeded shuffle of `0..n` into (train, holdout) index sets.
///
/// The holdout takes `ceil(n × fraction)` rows; the train side keeps at least
/// one row.
pub fn holdout_split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let holdout = ((n as f64 * fraction).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(holdout);
    (train, indices)
}

/// Root mean squared error. `NaN` when empty.
pub fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.is_empty() {
        return f64::NAN;
    }
    let ss: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    (ss / predicted.len() as f64).sqrt()
}
