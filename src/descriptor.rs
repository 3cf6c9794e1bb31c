//! Route descriptors.
//!
//! Reduces a variable-length route segment to a fixed-width shape vector:
//! - median and sample standard deviation of relative x and y
//! - positional samples at 20/50/80% of each coordinate sequence
//! - least-squares coefficients of `y = a·x² + b·x + c`
//!
//! The positional samples index into the time-ordered sequence; they are not
//! quantiles of sorted values. A route that drifts out and comes back gets a
//! different descriptor from one that only goes out, which is what route-shape
//! clustering needs.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::RouteKey;
use crate::routes::RouteSegment;

/// Number of numeric features in a descriptor.
pub const DESCRIPTOR_LEN: usize = 13;

/// Feature names, in [`RouteDescriptor::features`] order.
pub const FEATURE_NAMES: [&str; DESCRIPTOR_LEN] = [
    "x_median", "x_std", "x_20", "x_50", "x_80", "y_median", "y_std", "y_20", "y_50", "y_80",
    "coef_a", "coef_b", "coef_c",
];

/// Positions sampled along each coordinate sequence.
const SAMPLE_POSITIONS: [f64; 3] = [0.2, 0.5, 0.8];

/// Fixed-width shape summary of one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub week: u8,
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
    pub x_median: f64,
    pub x_std: f64,
    /// Clamped to be non-negative.
    pub x_20: f64,
    /// Clamped to be non-negative.
    pub x_50: f64,
    /// Clamped to be non-negative.
    pub x_80: f64,
    pub y_median: f64,
    pub y_std: f64,
    pub y_20: f64,
    pub y_50: f64,
    pub y_80: f64,
    pub coef_a: f64,
    pub coef_b: f64,
    pub coef_c: f64,
}

impl RouteDescriptor {
    /// Compute the descriptor of a segment.
    ///
    /// Returns `None` for an empty segment. Short or collinear segments still
    /// produce coefficients; fit quality is not checked.
    pub fn from_segment(segment: &RouteSegment) -> Option<Self> {
        if segment.is_empty() {
            return None;
        }

        let xs: Vec<f64> = segment.points.iter().map(|p| p.relative_x).collect();
        let ys: Vec<f64> = segment.points.iter().map(|p| p.relative_y).collect();

        let [x_20, x_50, x_80] =
            SAMPLE_POSITIONS.map(|p| positional_sample(&xs, p).map_or(0.0, |v| v.max(0.0)));
        let [y_20, y_50, y_80] = SAMPLE_POSITIONS.map(|p| positional_sample(&ys, p).unwrap_or(0.0));
        let [coef_a, coef_b, coef_c] = quadratic_fit(&xs, &ys);

        Some(Self {
            week: segment.week,
            game_id: segment.key.game_id,
            play_id: segment.key.play_id,
            player_id: segment.key.player_id,
            x_median: median(&xs),
            x_std: sample_std(&xs),
            x_20,
            x_50,
            x_80,
            y_median: median(&ys),
            y_std: sample_std(&ys),
            y_20,
            y_50,
            y_80,
            coef_a,
            coef_b,
            coef_c,
        })
    }

    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.game_id, self.play_id, self.player_id)
    }

    /// Numeric features without identifiers.
    pub fn features(&self) -> [f64; DESCRIPTOR_LEN] {
        [
            self.x_median,
            self.x_std,
            self.x_20,
            self.x_50,
            self.x_80,
            self.y_median,
            self.y_std,
            self.y_20,
            self.y_50,
            self.y_80,
            self.coef_a,
            self.coef_b,
            self.coef_c,
        ]
    }
}

/// Compute descriptors for every segment with at least `min_points` points.
///
/// Output order follows input order.
pub fn compute_descriptors(segments: &[RouteSegment], min_points: usize) -> Vec<RouteDescriptor> {
    let eligible: Vec<&RouteSegment> = segments
        .iter()
        .filter(|s| s.len() >= min_points)
        .collect();

    let skipped = segments.len() - eligible.len();
    if skipped > 0 {
        debug!(
            "[Descriptors] Skipping {} segments shorter than {} points",
            skipped, min_points
        );
    }

    #[cfg(feature = "parallel")]
    let descriptors: Vec<RouteDescriptor> = eligible
        .par_iter()
        .filter_map(|s| RouteDescriptor::from_segment(s))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let descriptors: Vec<RouteDescriptor> = eligible
        .iter()
        .filter_map(|s| RouteDescriptor::from_segment(s))
        .collect();

    info!(
        "[Descriptors] Computed {} route descriptors ({} too short)",
        descriptors.len(),
        skipped
    );

    descriptors
}

/// Value at ordinal position `floor(len × p)` of the sequence as given.
///
/// Order-dependent by construction: the sequence is never sorted.
pub fn positional_sample(values: &[f64], p: f64) -> Option<f64> {
    let index = (values.len() as f64 * p).floor();
    if index < 0.0 {
        return None;
    }
    values.get(index as usize).copied()
}

/// Median with midpoint interpolation for even lengths. `NaN` when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (n − 1). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1.0)).sqrt()
}

/// Least-squares fit of `y = a·x² + b·x + c`, returned as `[a, b, c]`.
///
/// Solved through an SVD of the column-scaled Vandermonde matrix; singular
/// directions are zeroed, so rank-deficient input yields the minimum-norm
/// solution instead of failing.
pub fn quadratic_fit(xs: &[f64], ys: &[f64]) -> [f64; 3] {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return [0.0; 3];
    }

    let mut design = DMatrix::from_fn(n, 3, |row, col| xs[row].powi(2 - col as i32));
    let mut scales = [1.0; 3];
    for (col, scale) in scales.iter_mut().enumerate() {
        let norm = design.column(col).norm();
        if norm > 0.0 {
            *scale = norm;
            design.column_mut(col).unscale_mut(norm);
        }
    }

    let rhs = DVector::from_column_slice(&ys[..n]);
    let svd = design.svd(true, true);
    let rcond = n as f64 * f64::EPSILON * svd.singular_values.max();

    match svd.solve(&rhs, rcond) {
        Ok(solution) => [
            solution[0] / scales[0],
            solution[1] / scales[1],
            solution[2] / scales[2],
        ],
        Err(_) => [0.0; 3],
    }
}
