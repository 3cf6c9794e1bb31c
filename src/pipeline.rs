//! Stage orchestration.
//!
//! Trained models are plain values passed between stages: fit once with
//! [`train_models`], then apply the same frozen handle to any number of
//! weeks with [`apply_models`] or [`run_with_models`].

use log::info;
use serde::{Deserialize, Serialize};

use crate::clustering::{ClusteredRoute, RouteClusterer};
use crate::descriptor::{RouteDescriptor, compute_descriptors};
use crate::error::{PipelineError, Result};
use crate::normalize::{normalize_play_direction, orient_routes};
use crate::outliers::{IsolationForest, remove_outliers, train_outlier_filter};
use crate::routes::{ExtractionStats, RouteSegment, extract_routes, route_runner_frames};
use crate::summary::{
    ClusterRouteShape, ReceptionZone, complete_plays, dominant_route_shapes,
    impute_missing_zones, reception_zones,
};
use crate::{ClusterId, PipelineConfig, PlayKey, PlayerPlay, RouteKey, TrackingFrame};

/// One row of the route assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub week: u8,
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
    pub cluster: ClusterId,
}

impl ClusterAssignment {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.game_id, self.play_id, self.player_id)
    }
}

impl From<&ClusteredRoute> for ClusterAssignment {
    fn from(route: &ClusteredRoute) -> Self {
        Self {
            week: route.descriptor.week,
            game_id: route.descriptor.game_id,
            play_id: route.descriptor.play_id,
            player_id: route.descriptor.player_id,
            cluster: route.cluster,
        }
    }
}

/// The three tables consumed by feature assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTables {
    pub assignments: Vec<ClusterAssignment>,
    pub route_shapes: Vec<ClusterRouteShape>,
    pub reception_zones: Vec<ReceptionZone>,
}

/// Frozen models shared by every apply call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModels {
    pub outliers: IsolationForest,
    pub clusterer: RouteClusterer,
}

/// Segments and descriptors of every route-runner.
#[derive(Debug, Clone)]
pub struct PreparedRoutes {
    pub segments: Vec<RouteSegment>,
    pub descriptors: Vec<RouteDescriptor>,
    pub stats: ExtractionStats,
}

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct ClusteringRun {
    pub models: TrainedModels,
    pub tables: ClusterTables,
    pub complete_plays: Vec<PlayKey>,
    pub stats: ExtractionStats,
}

/// Normalise, extract and describe every route.
pub fn prepare_routes(
    tracking: &[TrackingFrame],
    participation: &[PlayerPlay],
    config: &PipelineConfig,
) -> PreparedRoutes {
    let runners = route_runner_frames(tracking.to_vec(), participation);
    let normalized = normalize_play_direction(&runners);
    let oriented = orient_routes(normalized, config.direction_max_route_frame);
    let (segments, stats) = extract_routes(&oriented, participation, config);
    let descriptors = compute_descriptors(&segments, config.min_route_points);

    PreparedRoutes {
        segments,
        descriptors,
        stats,
    }
}

/// Fit the outlier filter and clusterer on the reference week.
pub fn train_models(
    descriptors: &[RouteDescriptor],
    config: &PipelineConfig,
) -> Result<TrainedModels> {
    let reference: Vec<RouteDescriptor> = descriptors
        .iter()
        .filter(|d| d.week == config.reference_week)
        .cloned()
        .collect();
    if reference.is_empty() {
        return Err(PipelineError::InsufficientSamples {
            stage: "reference week",
            count: 0,
            minimum_required: 1,
        });
    }
    info!(
        "[Pipeline] Training on {} routes from week {}",
        reference.len(),
        config.reference_week
    );

    let outliers = train_outlier_filter(&reference, &config.outliers)?;
    let report = remove_outliers(reference, &outliers)?;
    let clusterer = RouteClusterer::fit(&report.inliers, &config.clustering)?;

    Ok(TrainedModels {
        outliers,
        clusterer,
    })
}

/// Drop outliers and assign the rest to clusters.
pub fn apply_models(
    descriptors: Vec<RouteDescriptor>,
    models: &TrainedModels,
) -> Result<Vec<ClusteredRoute>> {
    let report = remove_outliers(descriptors, &models.outliers)?;
    models.clusterer.assign_all(report.inliers)
}

/// Build the cluster tables from clustered routes.
pub fn summarize(
    segments: &[RouteSegment],
    clustered: &[ClusteredRoute],
    participation: &[PlayerPlay],
    config: &PipelineConfig,
) -> Result<ClusterTables> {
    let route_shapes = dominant_route_shapes(participation, clustered)?;
    let observed = reception_zones(segments, clustered, config);
    let reception_zones = impute_missing_zones(clustered, observed, config)?;

    Ok(ClusterTables {
        assignments: clustered.iter().map(ClusterAssignment::from).collect(),
        route_shapes,
        reception_zones,
    })
}

/// Train on the reference week and summarise every week.
pub fn run_clustering(
    tracking: &[TrackingFrame],
    participation: &[PlayerPlay],
    config: &PipelineConfig,
) -> Result<ClusteringRun> {
    config.validate()?;
    let prepared = prepare_routes(tracking, participation, config);
    let models = train_models(&prepared.descriptors, config)?;
    let (tables, complete_plays) = summarize_with(&prepared, participation, &models, config)?;

    Ok(ClusteringRun {
        models,
        tables,
        complete_plays,
        stats: prepared.stats,
    })
}

/// Apply frozen models to new tracking data.
pub fn run_with_models(
    tracking: &[TrackingFrame],
    participation: &[PlayerPlay],
    models: &TrainedModels,
    config: &PipelineConfig,
) -> Result<(ClusterTables, Vec<PlayKey>)> {
    config.validate()?;
    let prepared = prepare_routes(tracking, participation, config);
    summarize_with(&prepared, participation, models, config)
}

fn summarize_with(
    prepared: &PreparedRoutes,
    participation: &[PlayerPlay],
    models: &TrainedModels,
    config: &PipelineConfig,
) -> Result<(ClusterTables, Vec<PlayKey>)> {
    let clustered = apply_models(prepared.descriptors.clone(), models)?;
    let tables = summarize(&prepared.segments, &clustered, participation, config)?;
    let complete = complete_plays(participation, &clustered);
    Ok((tables, complete))
}
