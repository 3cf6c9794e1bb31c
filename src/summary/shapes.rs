use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::clustering::ClusteredRoute;
use crate::error::Result;
use crate::{ClusterId, PlayerPlay, RouteKey, RouteShape};

/// Most frequent route shape of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRouteShape {
    pub cluster: ClusterId,
    pub route_mode: RouteShape,
}

/// Mode of the raw route label within each cluster, mapped to its shape.
///
/// Routes without a label are ignored. Ties go to the label seen first in
/// route order. Clusters whose members carry no label at all get no row.
pub fn dominant_route_shapes(
    participation: &[PlayerPlay],
    clustered: &[ClusteredRoute],
) -> Result<Vec<ClusterRouteShape>> {
    let labels: HashMap<RouteKey, &str> = participation
        .iter()
        .filter_map(|p| p.route_ran.as_deref().map(|label| (p.route_key(), label)))
        .collect();

    // Per cluster: label -> (count, first seen)
    let mut tallies: BTreeMap<ClusterId, HashMap<&str, (usize, usize)>> = BTreeMap::new();
    for (position, route) in clustered.iter().enumerate() {
        let Some(label) = labels.get(&route.key()) else {
            continue;
        };
        tallies
            .entry(route.cluster)
            .or_default()
            .entry(label)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut shapes = Vec::with_capacity(tallies.len());
    for (cluster, tally) in tallies {
        let Some((label, _)) = tally
            .into_iter()
            .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        else {
            continue;
        };
        let route_mode = RouteShape::from_route_label(label)?;
        debug!("[Clustering] {} -> {} ({})", cluster, route_mode, label);
        shapes.push(ClusterRouteShape {
            cluster,
            route_mode,
        });
    }

    info!("[Clustering] Labelled {} clusters with a route shape", shapes.len());
    Ok(shapes)
}
