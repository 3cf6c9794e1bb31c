//! Isolation forest outlier gate.
//!
//! Each tree isolates samples with random axis-aligned splits; anomalies sit
//! on short paths. The anomaly score of a sample is
//! `2^(−E[h(x)] / c(ψ))` where `h` is the path length, `ψ` the per-tree
//! subsample size and `c` the mean path length of an unsuccessful binary
//! search tree lookup. Scores near 1 are anomalies, scores well under 0.5
//! are normal.

use log::info;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::descriptor::RouteDescriptor;
use crate::error::{OptionExt, PipelineError, Result, ensure};

/// Euler-Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Score threshold used with [`Contamination::Auto`].
const AUTO_THRESHOLD: f64 = 0.5;

/// How the inlier/outlier threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contamination {
    /// Scores above 0.5 are outliers.
    Auto,
    /// The given fraction of training samples is labelled outlier.
    Fraction(f64),
}

/// Configuration for the outlier filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Number of isolation trees.
    /// Default: 100
    pub n_estimators: usize,

    /// Subsample size per tree (capped by the training set size).
    /// Default: 256
    pub max_samples: usize,

    /// Threshold selection.
    /// Default: Auto
    pub contamination: Contamination,

    /// RNG seed. Tree `i` is seeded with `seed + i`.
    /// Default: 0
    pub seed: u64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: Contamination::Auto,
            seed: 0,
        }
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(
            self.n_estimators > 0,
            "outliers.n_estimators",
            "must be positive",
        )?;
        ensure(
            self.max_samples >= 2,
            "outliers.max_samples",
            format!("must be at least 2, got {}", self.max_samples),
        )?;
        if let Contamination::Fraction(fraction) = self.contamination {
            ensure(
                fraction > 0.0 && fraction <= 0.5,
                "outliers.contamination",
                format!("must be in (0, 0.5], got {}", fraction),
            )?;
        }
        Ok(())
    }
}

/// Label assigned by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Inlier,
    Outlier,
}

impl Verdict {
    /// `1` for inliers, `-1` for outliers.
    pub fn as_label(&self) -> i8 {
        match self {
            Verdict::Inlier => 1,
            Verdict::Outlier => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree stored as an arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(samples: &[&[f64]], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(samples.to_vec(), 0, height_limit, rng);
        tree
    }

    /// Grow the subtree for `samples` and return its node index.
    fn grow(
        &mut self,
        samples: Vec<&[f64]>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let index = self.nodes.len();
        if depth >= height_limit || samples.len() <= 1 {
            self.nodes.push(Node::Leaf {
                size: samples.len(),
            });
            return index;
        }

        // Features that still vary within this node
        let n_features = samples[0].len();
        let candidates: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|feature| {
                let (min, max) = samples.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
                    (lo.min(s[feature]), hi.max(s[feature]))
                });
                (max > min).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            self.nodes.push(Node::Leaf {
                size: samples.len(),
            });
            return index;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);
        let (left_samples, right_samples): (Vec<&[f64]>, Vec<&[f64]>) =
            samples.into_iter().partition(|s| s[feature] <= threshold);

        // Reserve the slot, then fill children
        self.nodes.push(Node::Leaf { size: 0 });
        let left = self.grow(left_samples, depth + 1, height_limit, rng);
        let right = self.grow(right_samples, depth + 1, height_limit, rng);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Mean path length of an unsuccessful search in a binary search tree of `n`
/// nodes; normalises isolation depths.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted isolation forest. Immutable once fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_features: usize,
    subsample_size: usize,
    /// Scores strictly above this are outliers.
    threshold: f64,
}

impl IsolationForest {
    /// Fit on a set of equal-width samples.
    pub fn fit<S: AsRef<[f64]> + Sync>(samples: &[S], config: &OutlierConfig) -> Result<Self> {
        config.validate()?;
        let rows: Vec<&[f64]> = samples.iter().map(AsRef::as_ref).collect();
        let n_features = rows
            .first()
            .map(|r| r.len())
            .ok_or_insufficient_samples("isolation forest", 0, 2)?;
        if rows.len() < 2 {
            return Err(PipelineError::InsufficientSamples {
                stage: "isolation forest",
                count: rows.len(),
                minimum_required: 2,
            });
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(PipelineError::FeatureMismatch {
                expected: n_features,
                got: bad.len(),
            });
        }

        let subsample_size = config.max_samples.min(rows.len());
        let height_limit = (subsample_size as f64).log2().ceil() as usize;

        let build_tree = |tree_index: usize| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(tree_index as u64));
            let subsample: Vec<&[f64]> = index::sample(&mut rng, rows.len(), subsample_size)
                .into_iter()
                .map(|i| rows[i])
                .collect();
            IsolationTree::build(&subsample, height_limit, &mut rng)
        };

        #[cfg(feature = "parallel")]
        let trees: Vec<IsolationTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(build_tree)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let trees: Vec<IsolationTree> = (0..config.n_estimators).map(build_tree).collect();

        let mut forest = Self {
            trees,
            n_features,
            subsample_size,
            threshold: AUTO_THRESHOLD,
        };

        if let Contamination::Fraction(fraction) = config.contamination {
            let scores: Vec<f64> = rows.iter().map(|r| forest.score_unchecked(r)).collect();
            forest.threshold = percentile(&scores, 100.0 * (1.0 - fraction));
        }

        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    pub fn score(&self, sample: &[f64]) -> Result<f64> {
        if sample.len() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.score_unchecked(sample))
    }

    fn score_unchecked(&self, sample: &[f64]) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| t.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.subsample_size))
    }

    /// Label one sample.
    pub fn predict(&self, sample: &[f64]) -> Result<Verdict> {
        let score = self.score(sample)?;
        Ok(if score > self.threshold {
            Verdict::Outlier
        } else {
            Verdict::Inlier
        })
    }

    /// Score threshold separating inliers from outliers.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Result of gating descriptors through the filter.
#[derive(Debug, Clone)]
pub struct OutlierReport {
    pub inliers: Vec<RouteDescriptor>,
    pub retained: usize,
    pub discarded: usize,
}

/// Fit the filter on descriptors of the reference subset.
pub fn train_outlier_filter(
    reference: &[RouteDescriptor],
    config: &OutlierConfig,
) -> Result<IsolationForest> {
    let samples: Vec<[f64; crate::DESCRIPTOR_LEN]> =
        reference.iter().map(RouteDescriptor::features).collect();
    let forest = IsolationForest::fit(&samples, config)?;
    info!(
        "[Outliers] Trained {} trees on {} descriptors (threshold {:.4})",
        config.n_estimators,
        samples.len(),
        forest.threshold()
    );
    Ok(forest)
}

/// Drop descriptors the filter labels outlier.
pub fn remove_outliers(
    descriptors: Vec<RouteDescriptor>,
    forest: &IsolationForest,
) -> Result<OutlierReport> {
    let total = descriptors.len();
    let mut inliers = Vec::with_capacity(total);
    for descriptor in descriptors {
        if forest.predict(&descriptor.features())? == Verdict::Inlier {
            inliers.push(descriptor);
        }
    }

    let retained = inliers.len();
    let discarded = total - retained;
    info!(
        "[Outliers] Retained {} descriptors, discarded {} outliers",
        retained, discarded
    );

    Ok(OutlierReport {
        inliers,
        retained,
        discarded,
    })
}

/// Linear-interpolation percentile (`q` in 0..=100).
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
