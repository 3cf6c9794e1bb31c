use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::ReceptionZoneConfig;
use crate::clustering::ClusteredRoute;
use crate::routes::RouteSegment;
use crate::{ClusterId, PipelineConfig, RouteKey};

/// Where, relative to the pre-snap anchor, a cluster's routes are caught.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceptionZone {
    pub cluster: ClusterId,
    pub relative_x_min: f64,
    pub relative_x_max: f64,
    pub relative_x_mean: f64,
    pub relative_y_min: f64,
    pub relative_y_max: f64,
    pub relative_y_mean: f64,
    /// Mean route frame index at reception.
    #[serde(rename = "route_frameId_mean")]
    pub route_frame_mean: f64,
    /// `route_frame_mean` in seconds.
    pub route_time_mean: f64,
    /// Receptions the zone was computed from; zero when imputed.
    #[serde(default)]
    pub observations: usize,
}

impl ReceptionZone {
    /// Zone built from observed reception points with collapsed bounds
    /// widened.
    fn observed(
        cluster: ClusterId,
        points: &[(f64, f64, f64)],
        zones: &ReceptionZoneConfig,
        seconds_per_frame: f64,
    ) -> Self {
        let n = points.len() as f64;
        let (x_min, x_max, x_mean) = bounds(points.iter().map(|p| p.0), n);
        let (y_min, y_max, y_mean) = bounds(points.iter().map(|p| p.1), n);
        let frame_mean = points.iter().map(|p| p.2).sum::<f64>() / n;

        let (relative_x_min, relative_x_max) = widen(x_min, x_max, x_mean, zones);
        let (relative_y_min, relative_y_max) = widen(y_min, y_max, y_mean, zones);

        Self {
            cluster,
            relative_x_min,
            relative_x_max,
            relative_x_mean: x_mean,
            relative_y_min,
            relative_y_max,
            relative_y_mean: y_mean,
            route_frame_mean: frame_mean,
            route_time_mean: frame_mean * seconds_per_frame,
            observations: points.len(),
        }
    }

    /// Zone centred on predicted means.
    pub fn imputed(
        cluster: ClusterId,
        x_mean: f64,
        y_mean: f64,
        frame_mean: f64,
        half_width: f64,
        seconds_per_frame: f64,
    ) -> Self {
        Self {
            cluster,
            relative_x_min: x_mean - half_width,
            relative_x_max: x_mean + half_width,
            relative_x_mean: x_mean,
            relative_y_min: y_mean - half_width,
            relative_y_max: y_mean + half_width,
            relative_y_mean: y_mean,
            route_frame_mean: frame_mean,
            route_time_mean: frame_mean * seconds_per_frame,
            observations: 0,
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>, n: f64) -> (f64, f64, f64) {
    let (min, max, sum) = values.fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
    );
    (min, max, sum / n)
}

fn widen(min: f64, max: f64, mean: f64, zones: &ReceptionZoneConfig) -> (f64, f64) {
    let min = if (mean - min).abs() < zones.spread_threshold {
        mean - zones.default_half_width
    } else {
        min
    };
    let max = if (max - mean).abs() < zones.spread_threshold {
        mean + zones.default_half_width
    } else {
        max
    };
    (min, max)
}

/// Observed reception zone of every cluster with at least one targeted,
/// clustered route that reached the reception event. Sorted by cluster.
pub fn reception_zones(
    segments: &[RouteSegment],
    clustered: &[ClusteredRoute],
    config: &PipelineConfig,
) -> Vec<ReceptionZone> {
    let clusters: HashMap<RouteKey, ClusterId> =
        clustered.iter().map(|r| (r.key(), r.cluster)).collect();

    let mut receptions: BTreeMap<ClusterId, Vec<(f64, f64, f64)>> = BTreeMap::new();
    for segment in segments.iter().filter(|s| s.targeted) {
        let Some(&cluster) = clusters.get(&segment.key) else {
            continue;
        };
        for point in segment
            .points
            .iter()
            .filter(|p| p.event.as_deref() == Some(config.reception_event.as_str()))
        {
            receptions.entry(cluster).or_default().push((
                point.relative_x,
                point.relative_y,
                point.route_frame_id as f64,
            ));
        }
    }

    let zones: Vec<ReceptionZone> = receptions
        .iter()
        .map(|(&cluster, points)| {
            ReceptionZone::observed(cluster, points, &config.zones, config.seconds_per_frame)
        })
        .collect();

    info!(
        "[Zones] Observed reception zones for {} clusters from {} receptions",
        zones.len(),
        zones.iter().map(|z| z.observations).sum::<usize>()
    );

    zones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapsed_bounds_are_widened() {
        let zones = ReceptionZoneConfig::default();
        let zone = ReceptionZone::observed(
            ClusterId(0),
            &[(10.0, 2.0, 20.0), (10.4, 8.0, 30.0)],
            &zones,
            0.1,
        );
        // x spread of 0.2 around the mean collapses to mean ± 3
        assert!((zone.relative_x_min - 7.2).abs() < 1e-9);
        assert!((zone.relative_x_max - 13.2).abs() < 1e-9);
        // y spread of 3 is kept
        assert_eq!(zone.relative_y_min, 2.0);
        assert_eq!(zone.relative_y_max, 8.0);
        assert!((zone.route_time_mean - 2.5).abs() < 1e-9);
        assert_eq!(zone.observations, 2);
    }
}
