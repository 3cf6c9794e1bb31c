//! Route clustering.
//!
//! Affinity propagation elects exemplar routes on the reference week; every
//! other route is then assigned to its nearest exemplar. The fitted model is
//! just the exemplar set, so it serializes as a plain list of descriptors and
//! the lookup index is rebuilt on load.

mod affinity;
mod exemplars;

pub use affinity::{AffinityResult, affinity_propagation};
pub use exemplars::{Exemplar, ExemplarIndex};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::descriptor::{DESCRIPTOR_LEN, RouteDescriptor};
use crate::error::{OptionExt, Result, ensure};
use crate::{ClusterId, RouteKey};

/// Affinity propagation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Weight of the previous message in each update, in [0.5, 1).
    /// Default: 0.9
    pub damping: f64,

    /// Self-similarity placed on the diagonal. Lower values elect fewer
    /// exemplars.
    /// Default: -50.0
    pub preference: f64,

    /// Default: 200
    pub max_iter: usize,

    /// Rounds the exemplar set must stay unchanged to declare convergence.
    /// Default: 15
    pub convergence_iter: usize,

    /// Seed for the tie-breaking perturbation.
    /// Default: 0
    pub seed: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            damping: 0.9,
            preference: -50.0,
            max_iter: 200,
            convergence_iter: 15,
            seed: 0,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(
            (0.5..1.0).contains(&self.damping),
            "clustering.damping",
            format!("must be in [0.5, 1), got {}", self.damping),
        )?;
        ensure(
            self.preference.is_finite(),
            "clustering.preference",
            "must be finite",
        )?;
        ensure(self.max_iter > 0, "clustering.max_iter", "must be positive")?;
        ensure(
            self.convergence_iter > 0,
            "clustering.convergence_iter",
            "must be positive",
        )?;
        Ok(())
    }
}

/// A descriptor with its cluster label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredRoute {
    pub descriptor: RouteDescriptor,
    pub cluster: ClusterId,
}

impl ClusteredRoute {
    pub fn key(&self) -> RouteKey {
        self.descriptor.key()
    }
}

/// Serialized form of a [`RouteClusterer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemplarSet {
    pub exemplars: Vec<[f64; DESCRIPTOR_LEN]>,
}

/// Trained clustering model: the elected exemplars and their lookup index.
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "ExemplarSet", into = "ExemplarSet")]
pub struct RouteClusterer {
    exemplars: Vec<[f64; DESCRIPTOR_LEN]>,
    index: ExemplarIndex,
}

impl From<ExemplarSet> for RouteClusterer {
    fn from(set: ExemplarSet) -> Self {
        Self::from_exemplars(set.exemplars)
    }
}

impl From<RouteClusterer> for ExemplarSet {
    fn from(clusterer: RouteClusterer) -> Self {
        Self {
            exemplars: clusterer.exemplars,
        }
    }
}

impl Clone for RouteClusterer {
    fn clone(&self) -> Self {
        Self::from_exemplars(self.exemplars.clone())
    }
}

impl RouteClusterer {
    /// Fit on reference descriptors.
    ///
    /// Fails with [`crate::PipelineError::NoExemplars`] when message passing
    /// elects nothing.
    pub fn fit(reference: &[RouteDescriptor], config: &ClusteringConfig) -> Result<Self> {
        let samples: Vec<[f64; DESCRIPTOR_LEN]> =
            reference.iter().map(RouteDescriptor::features).collect();
        let rows: Vec<&[f64]> = samples.iter().map(|s| s.as_slice()).collect();
        let result = affinity_propagation(&rows, config)?;

        let exemplars: Vec<[f64; DESCRIPTOR_LEN]> =
            result.exemplars.iter().map(|&i| samples[i]).collect();

        info!(
            "[Clustering] Fitted {} clusters on {} routes ({} iterations{})",
            exemplars.len(),
            samples.len(),
            result.iterations,
            if result.converged { "" } else { ", not converged" }
        );

        Ok(Self::from_exemplars(exemplars))
    }

    /// Rebuild a model from a stored exemplar list. Cluster ids follow list
    /// order.
    pub fn from_exemplars(exemplars: Vec<[f64; DESCRIPTOR_LEN]>) -> Self {
        let index = ExemplarIndex::build(&exemplars);
        Self { exemplars, index }
    }

    pub fn n_clusters(&self) -> usize {
        self.exemplars.len()
    }

    pub fn exemplars(&self) -> &[[f64; DESCRIPTOR_LEN]] {
        &self.exemplars
    }

    /// Label of the nearest exemplar.
    pub fn assign(&self, features: &[f64; DESCRIPTOR_LEN]) -> Result<ClusterId> {
        self.index
            .nearest(features)
            .ok_or_insufficient_samples("cluster assignment", 0, 1)
    }

    /// Label every descriptor. Deterministic for a given model.
    pub fn assign_all(&self, descriptors: Vec<RouteDescriptor>) -> Result<Vec<ClusteredRoute>> {
        let mut clustered = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let cluster = self.assign(&descriptor.features())?;
            clustered.push(ClusteredRoute {
                descriptor,
                cluster,
            });
        }

        let sizes = cluster_sizes(&clustered);
        let mut largest: Vec<(ClusterId, usize)> = sizes.into_iter().collect();
        largest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        largest.truncate(5);
        info!(
            "[Clustering] Assigned {} routes to {} clusters; largest: {:?}",
            clustered.len(),
            self.n_clusters(),
            largest
        );

        Ok(clustered)
    }
}

/// Number of routes per cluster.
pub fn cluster_sizes(routes: &[ClusteredRoute]) -> BTreeMap<ClusterId, usize> {
    let mut sizes = BTreeMap::new();
    for route in routes {
        *sizes.entry(route.cluster).or_insert(0) += 1;
    }
    sizes
}
