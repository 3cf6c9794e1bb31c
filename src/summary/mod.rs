//! Cluster summaries.
//!
//! Turns route-level cluster assignments into the cluster-level tables the
//! feature assembler joins on:
//! - the dominant route shape of each cluster
//! - the reception zone of each cluster, observed or imputed
//! - the set of plays whose route-runners were all clustered

mod imputation;
mod shapes;
mod zones;

pub use imputation::impute_missing_zones;
pub use shapes::{ClusterRouteShape, dominant_route_shapes};
pub use zones::{ReceptionZone, reception_zones};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::clustering::ClusteredRoute;
use crate::error::{Result, ensure};
use crate::{PlayKey, PlayerPlay, RouteKey};

/// Reception-zone geometry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceptionZoneConfig {
    /// A bound closer than this to the mean is considered collapsed.
    /// Default: 1.0
    pub spread_threshold: f64,

    /// Half-width substituted for a collapsed bound.
    /// Default: 3.0
    pub default_half_width: f64,

    /// Half-width around the predicted mean of an imputed zone.
    /// Default: 3.0
    pub imputed_half_width: f64,
}

impl Default for ReceptionZoneConfig {
    fn default() -> Self {
        Self {
            spread_threshold: 1.0,
            default_half_width: 3.0,
            imputed_half_width: 3.0,
        }
    }
}

impl ReceptionZoneConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(
            self.spread_threshold >= 0.0,
            "zones.spread_threshold",
            format!("must be >= 0, got {}", self.spread_threshold),
        )?;
        ensure(
            self.default_half_width > 0.0,
            "zones.default_half_width",
            format!("must be positive, got {}", self.default_half_width),
        )?;
        ensure(
            self.imputed_half_width > 0.0,
            "zones.imputed_half_width",
            format!("must be positive, got {}", self.imputed_half_width),
        )?;
        Ok(())
    }
}

/// Plays in which every route-runner has a cluster, sorted.
///
/// A single unclustered route-runner removes the whole play.
pub fn complete_plays(participation: &[PlayerPlay], clustered: &[ClusteredRoute]) -> Vec<PlayKey> {
    let assigned: HashSet<RouteKey> = clustered.iter().map(ClusteredRoute::key).collect();

    let mut plays = BTreeSet::new();
    let mut incomplete = BTreeSet::new();
    for player in participation.iter().filter(|p| p.ran_route) {
        let key = player.route_key();
        plays.insert(key.play());
        if !assigned.contains(&key) {
            incomplete.insert(key.play());
        }
    }

    info!(
        "[Plays] {} complete plays, {} incomplete plays excluded",
        plays.len() - incomplete.len(),
        incomplete.len()
    );

    plays.difference(&incomplete).copied().collect()
}
