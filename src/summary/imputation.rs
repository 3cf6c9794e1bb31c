//! Regression fallback for clusters without a direct reception.
//!
//! Each zone mean is regressed on route descriptors: every clustered route of
//! an observed cluster is a training row labelled with its cluster's mean,
//! and a missing cluster is predicted from the average descriptor of its
//! members.

use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

use super::ReceptionZone;
use crate::clustering::ClusteredRoute;
use crate::descriptor::DESCRIPTOR_LEN;
use crate::error::{PipelineError, Result};
use crate::regression::{GradientBoostingRegressor, holdout_split, rmse};
use crate::{ClusterId, PipelineConfig};

const TARGETS: [&str; 3] = ["relative_x_mean", "relative_y_mean", "route_frameId_mean"];

fn target_values(zone: &ReceptionZone) -> [f64; 3] {
    [
        zone.relative_x_mean,
        zone.relative_y_mean,
        zone.route_frame_mean,
    ]
}

/// Append an imputed zone for every clustered cluster lacking an observed
/// one. Output is sorted by cluster.
pub fn impute_missing_zones(
    clustered: &[ClusteredRoute],
    observed: Vec<ReceptionZone>,
    config: &PipelineConfig,
) -> Result<Vec<ReceptionZone>> {
    let known: BTreeMap<ClusterId, [f64; 3]> = observed
        .iter()
        .map(|z| (z.cluster, target_values(z)))
        .collect();

    let missing: BTreeSet<ClusterId> = clustered
        .iter()
        .map(|r| r.cluster)
        .filter(|c| !known.contains_key(c))
        .collect();

    if missing.is_empty() {
        info!("[Imputation] Every cluster has an observed reception zone");
        return Ok(observed);
    }

    let mut rows: Vec<[f64; DESCRIPTOR_LEN]> = Vec::new();
    let mut targets: Vec<[f64; 3]> = Vec::new();
    for route in clustered {
        if let Some(values) = known.get(&route.cluster) {
            rows.push(route.descriptor.features());
            targets.push(*values);
        }
    }
    if rows.is_empty() {
        return Err(PipelineError::InsufficientSamples {
            stage: "reception zone imputation",
            count: 0,
            minimum_required: 1,
        });
    }

    let queries: Vec<(ClusterId, [f64; DESCRIPTOR_LEN])> = missing
        .iter()
        .map(|&cluster| (cluster, member_mean(clustered, cluster)))
        .collect();

    let imputer = &config.imputer;
    let (train, holdout) = holdout_split(rows.len(), imputer.holdout_fraction, imputer.seed);
    let train_rows: Vec<[f64; DESCRIPTOR_LEN]> = train.iter().map(|&i| rows[i]).collect();

    let mut predictions = vec![[0.0; 3]; queries.len()];
    for (field, name) in TARGETS.iter().enumerate() {
        let train_targets: Vec<f64> = train.iter().map(|&i| targets[i][field]).collect();
        let model = GradientBoostingRegressor::fit(&train_rows, &train_targets, imputer)?;

        let train_rmse = rmse(&predict_all(&model, &train_rows)?, &train_targets);
        if holdout.is_empty() {
            info!("[Imputation] {}: train RMSE {:.4}", name, train_rmse);
        } else {
            let holdout_rows: Vec<[f64; DESCRIPTOR_LEN]> =
                holdout.iter().map(|&i| rows[i]).collect();
            let holdout_targets: Vec<f64> = holdout.iter().map(|&i| targets[i][field]).collect();
            let holdout_rmse = rmse(&predict_all(&model, &holdout_rows)?, &holdout_targets);
            info!(
                "[Imputation] {}: train RMSE {:.4}, holdout RMSE {:.4}",
                name, train_rmse, holdout_rmse
            );
        }

        for (prediction, (_, features)) in predictions.iter_mut().zip(&queries) {
            prediction[field] = model.predict(features)?;
        }
    }

    if known.len() < 2 {
        warn!(
            "[Imputation] Only {} observed cluster(s); imputed zones collapse to its mean",
            known.len()
        );
    }

    let mut zones = observed;
    for ((cluster, _), [x_mean, y_mean, frame_mean]) in queries.into_iter().zip(predictions) {
        zones.push(ReceptionZone::imputed(
            cluster,
            x_mean,
            y_mean,
            frame_mean,
            config.zones.imputed_half_width,
            config.seconds_per_frame,
        ));
    }
    zones.sort_by_key(|z| z.cluster);

    info!(
        "[Imputation] Imputed reception zones for {} clusters",
        missing.len()
    );

    Ok(zones)
}

fn predict_all(
    model: &GradientBoostingRegressor,
    rows: &[[f64; DESCRIPTOR_LEN]],
) -> Result<Vec<f64>> {
    rows.iter().map(|r| model.predict(r)).collect()
}

/// Mean descriptor of a cluster's members.
fn member_mean(clustered: &[ClusteredRoute], cluster: ClusterId) -> [f64; DESCRIPTOR_LEN] {
    let mut sum = [0.0; DESCRIPTOR_LEN];
    let mut count = 0usize;
    for route in clustered.iter().filter(|r| r.cluster == cluster) {
        for (acc, value) in sum.iter_mut().zip(route.descriptor.features()) {
            *acc += value;
        }
        count += 1;
    }
    sum.map(|v| v / count.max(1) as f64)
}
