//! Affinity propagation.
//!
//! Exchanges "responsibility" and "availability" messages between all pairs
//! of samples until a stable set of exemplars emerges. The number of
//! clusters is not fixed in advance; it follows from the preference placed on
//! the similarity diagonal (lower preference, fewer exemplars).
//!
//! Similarities are negative squared Euclidean distances. A tiny seeded
//! perturbation breaks ties between identical samples so the run is
//! deterministic for a given seed.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::ClusteringConfig;
use crate::error::{PipelineError, Result};

/// Outcome of an affinity propagation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityResult {
    /// Sample indices of the exemplars, ascending. Cluster `k` is
    /// represented by `exemplars[k]`.
    pub exemplars: Vec<usize>,
    /// Cluster index of each sample.
    pub labels: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

/// Run affinity propagation over equal-width samples.
pub fn affinity_propagation(
    samples: &[&[f64]],
    config: &ClusteringConfig,
) -> Result<AffinityResult> {
    config.validate()?;
    let n = samples.len();
    if n == 0 {
        return Err(PipelineError::InsufficientSamples {
            stage: "affinity propagation",
            count: 0,
            minimum_required: 1,
        });
    }
    if n == 1 {
        return Ok(AffinityResult {
            exemplars: vec![0],
            labels: vec![0],
            iterations: 0,
            converged: true,
        });
    }

    let similarity = similarity_matrix(samples, config.preference, config.seed);
    let damping = config.damping;

    let mut responsibility = vec![0.0; n * n];
    let mut availability = vec![0.0; n * n];
    // Ring buffer of exemplar indicators over the last `convergence_iter` rounds
    let mut history = vec![false; n * config.convergence_iter];
    let mut column_sums = vec![0.0; n];

    let mut converged = false;
    let mut iterations = 0;

    for it in 0..config.max_iter {
        iterations = it + 1;

        update_responsibilities(&similarity, &availability, &mut responsibility, n, damping);
        update_availabilities(
            &responsibility,
            &mut availability,
            &mut column_sums,
            n,
            damping,
        );

        let slot = it % config.convergence_iter;
        let mut exemplar_count = 0;
        for i in 0..n {
            let is_exemplar = availability[i * n + i] + responsibility[i * n + i] > 0.0;
            history[i * config.convergence_iter + slot] = is_exemplar;
            if is_exemplar {
                exemplar_count += 1;
            }
        }

        if it >= config.convergence_iter {
            let stable = (0..n).all(|i| {
                let row = &history[i * config.convergence_iter..(i + 1) * config.convergence_iter];
                let votes = row.iter().filter(|&&v| v).count();
                votes == 0 || votes == config.convergence_iter
            });
            if stable && exemplar_count > 0 {
                converged = true;
                break;
            }
        }
    }

    let candidates: Vec<usize> = (0..n)
        .filter(|&i| availability[i * n + i] + responsibility[i * n + i] > 0.0)
        .collect();

    if candidates.is_empty() {
        return Err(PipelineError::NoExemplars { iterations });
    }
    if !converged {
        warn!(
            "[Clustering] Affinity propagation did not converge after {} iterations; \
             exemplars may be degenerate",
            iterations
        );
    }

    let (exemplars, labels) = refine_exemplars(&similarity, n, candidates);
    debug!(
        "[Clustering] {} exemplars after {} iterations",
        exemplars.len(),
        iterations
    );

    Ok(AffinityResult {
        exemplars,
        labels,
        iterations,
        converged,
    })
}

/// Row-major `n × n` similarity with the preference on the diagonal.
fn similarity_matrix(samples: &[&[f64]], preference: f64, seed: u64) -> Vec<f64> {
    let n = samples.len();
    let mut similarity = vec![0.0; n * n];
    for i in 0..n {
        for k in 0..n {
            similarity[i * n + k] = if i == k {
                preference
            } else {
                -squared_distance(samples[i], samples[k])
            };
        }
    }

    // Remove degeneracies: scale-relative noise plus a tiny absolute floor
    let mut rng = StdRng::seed_from_u64(seed);
    for value in similarity.iter_mut() {
        let noise = standard_normal(&mut rng);
        *value += (f64::EPSILON * *value + f64::MIN_POSITIVE * 100.0) * noise;
    }

    similarity
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Box-Muller standard normal sample.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// r(i,k) ← s(i,k) − max_{k'≠k} (a(i,k') + s(i,k')), damped.
fn update_responsibilities(
    similarity: &[f64],
    availability: &[f64],
    responsibility: &mut [f64],
    n: usize,
    damping: f64,
) {
    let update_row = |(i, row): (usize, &mut [f64])| {
        let s = &similarity[i * n..(i + 1) * n];
        let a = &availability[i * n..(i + 1) * n];

        let mut best = 0;
        let mut first = f64::NEG_INFINITY;
        let mut second = f64::NEG_INFINITY;
        for k in 0..n {
            let value = a[k] + s[k];
            if value > first {
                second = first;
                first = value;
                best = k;
            } else if value > second {
                second = value;
            }
        }

        for k in 0..n {
            let competitor = if k == best { second } else { first };
            let fresh = s[k] - competitor;
            row[k] = damping * row[k] + (1.0 - damping) * fresh;
        }
    };

    #[cfg(feature = "parallel")]
    responsibility
        .par_chunks_mut(n)
        .enumerate()
        .for_each(update_row);

    #[cfg(not(feature = "parallel"))]
    responsibility.chunks_mut(n).enumerate().for_each(update_row);
}

/// a(i,k) ← min(0, r(k,k) + Σ_{i'∉{i,k}} max(0, r(i',k))) for i ≠ k,
/// a(k,k) ← Σ_{i'≠k} max(0, r(i',k)), damped.
fn update_availabilities(
    responsibility: &[f64],
    availability: &mut [f64],
    column_sums: &mut [f64],
    n: usize,
    damping: f64,
) {
    let clipped = |i: usize, k: usize| {
        let r = responsibility[i * n + k];
        if i == k { r } else { r.max(0.0) }
    };

    column_sums.iter_mut().for_each(|v| *v = 0.0);
    for i in 0..n {
        for (k, sum) in column_sums.iter_mut().enumerate() {
            *sum += clipped(i, k);
        }
    }
    let column_sums: &[f64] = column_sums;

    let update_row = |(i, row): (usize, &mut [f64])| {
        for k in 0..n {
            let without_self = column_sums[k] - clipped(i, k);
            let fresh = if i == k {
                without_self
            } else {
                without_self.min(0.0)
            };
            row[k] = damping * row[k] + (1.0 - damping) * fresh;
        }
    };

    #[cfg(feature = "parallel")]
    availability
        .par_chunks_mut(n)
        .enumerate()
        .for_each(update_row);

    #[cfg(not(feature = "parallel"))]
    availability.chunks_mut(n).enumerate().for_each(update_row);
}

/// Assign samples to candidate exemplars, re-elect each cluster's most
/// central member as its exemplar, and relabel against the sorted exemplars.
fn refine_exemplars(
    similarity: &[f64],
    n: usize,
    mut exemplars: Vec<usize>,
) -> (Vec<usize>, Vec<usize>) {
    let assign = |exemplars: &[usize]| -> Vec<usize> {
        let mut labels: Vec<usize> = (0..n)
            .map(|i| argmax(exemplars.iter().map(|&k| similarity[i * n + k])))
            .collect();
        for (cluster, &exemplar) in exemplars.iter().enumerate() {
            labels[exemplar] = cluster;
        }
        labels
    };

    let labels = assign(&exemplars);
    for (cluster, exemplar) in exemplars.iter_mut().enumerate() {
        let members: Vec<usize> = (0..n).filter(|&i| labels[i] == cluster).collect();
        let centre = argmax(
            members
                .iter()
                .map(|&j| members.iter().map(|&i| similarity[i * n + j]).sum::<f64>()),
        );
        *exemplar = members[centre];
    }

    let labels = assign(&exemplars);
    let mut sorted: Vec<usize> = labels.iter().map(|&c| exemplars[c]).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let labels = labels
        .iter()
        .map(|&c| sorted.binary_search(&exemplars[c]).unwrap_or(0))
        .collect();

    (sorted, labels)
}

/// Index of the first maximum.
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, value) in values.enumerate() {
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}
