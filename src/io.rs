//! CSV and JSON boundary.
//!
//! Input tables use the camelCase column names of the tracking dataset; the
//! cluster tables keep the same join keys so downstream consumers can join
//! them unchanged. Literal `NA` and empty cells are read as nulls; nulls are
//! written as empty cells.

use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::assembly::{OrpspTarget, PlayContext, PlayFeatureRow, Player};
use crate::error::{PipelineError, Result};
use crate::pipeline::{ClusterAssignment, ClusterTables, TrainedModels};
use crate::summary::{ClusterRouteShape, ReceptionZone};
use crate::{MAX_WEEKS, PlayKey, PlayerPlay, TrackingFrame};

pub const PLAYER_PLAY_FILE: &str = "player_play.csv";
pub const PLAYS_FILE: &str = "plays.csv";
pub const PLAYERS_FILE: &str = "players.csv";
pub const CLUSTERS_ROUTE_FILE: &str = "clusters_route.csv";
pub const CLUSTERS_ROUTE_MODE_FILE: &str = "clusters_route_mode.csv";
pub const CLUSTERS_RECEPTION_ZONE_FILE: &str = "clusters_reception_zone.csv";
pub const COMPLETE_PLAYS_FILE: &str = "complete_plays.csv";
pub const ORPSP_FEATURES_FILE: &str = "orpsp_features.csv";
pub const ORPSP_TARGET_FILE: &str = "orpsp_target.csv";
pub const MODELS_FILE: &str = "models.json";

/// Name of the tracking file of one week.
pub fn tracking_file(week: u8) -> String {
    format!("tracking_week_{}.csv", week)
}

/// Null-aware field deserializers.
pub mod na {
    use serde::{Deserialize, Deserializer, de::Error};
    use std::fmt::Display;
    use std::str::FromStr;

    fn is_null(value: &str) -> bool {
        let value = value.trim();
        value.is_empty() || value == "NA"
    }

    /// Parse a nullable cell.
    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) if !is_null(&value) => {
                value.trim().parse().map(Some).map_err(D::Error::custom)
            }
            _ => Ok(None),
        }
    }

    fn parse_flag(value: &str) -> Option<bool> {
        match value.trim() {
            "1" | "TRUE" | "True" | "true" => Some(true),
            "0" | "FALSE" | "False" | "false" => Some(false),
            _ => None,
        }
    }

    /// Parse a nullable boolean flag.
    pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) if !is_null(&value) => parse_flag(&value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid flag `{}`", value))),
            _ => Ok(None),
        }
    }

    /// Parse a boolean flag; null reads as `false`.
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional_flag(deserializer)?.unwrap_or(false))
    }
}

/// Read every row of a headed CSV file.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    info!("[IO] Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Write rows with a header line.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("[IO] Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Read the tracking files of weeks `1..=weeks`, tagging each row.
pub fn read_tracking_weeks(dir: &Path, weeks: u8) -> Result<Vec<TrackingFrame>> {
    if !(1..=MAX_WEEKS).contains(&weeks) {
        return Err(PipelineError::InvalidWeekRange {
            requested: weeks,
            available: MAX_WEEKS,
        });
    }

    let mut tracking = Vec::new();
    for week in 1..=weeks {
        let mut frames: Vec<TrackingFrame> = read_csv(&dir.join(tracking_file(week)))?;
        for frame in &mut frames {
            frame.week = week;
        }
        tracking.append(&mut frames);
    }
    Ok(tracking)
}

pub fn read_player_plays(dir: &Path) -> Result<Vec<PlayerPlay>> {
    read_csv(&dir.join(PLAYER_PLAY_FILE))
}

pub fn read_plays(dir: &Path) -> Result<Vec<PlayContext>> {
    read_csv(&dir.join(PLAYS_FILE))
}

pub fn read_players(dir: &Path) -> Result<Vec<Player>> {
    read_csv(&dir.join(PLAYERS_FILE))
}

/// Write the assignment, route-shape and reception-zone tables.
pub fn write_cluster_tables(dir: &Path, tables: &ClusterTables) -> Result<()> {
    write_csv(&dir.join(CLUSTERS_ROUTE_FILE), &tables.assignments)?;
    write_csv(&dir.join(CLUSTERS_ROUTE_MODE_FILE), &tables.route_shapes)?;
    write_csv(
        &dir.join(CLUSTERS_RECEPTION_ZONE_FILE),
        &tables.reception_zones,
    )?;
    Ok(())
}

pub fn read_cluster_tables(dir: &Path) -> Result<ClusterTables> {
    let assignments: Vec<ClusterAssignment> = read_csv(&dir.join(CLUSTERS_ROUTE_FILE))?;
    let route_shapes: Vec<ClusterRouteShape> = read_csv(&dir.join(CLUSTERS_ROUTE_MODE_FILE))?;
    let reception_zones: Vec<ReceptionZone> =
        read_csv(&dir.join(CLUSTERS_RECEPTION_ZONE_FILE))?;
    Ok(ClusterTables {
        assignments,
        route_shapes,
        reception_zones,
    })
}

pub fn write_complete_plays(dir: &Path, plays: &[PlayKey]) -> Result<()> {
    write_csv(&dir.join(COMPLETE_PLAYS_FILE), plays)
}

pub fn read_complete_plays(dir: &Path) -> Result<Vec<PlayKey>> {
    read_csv(&dir.join(COMPLETE_PLAYS_FILE))
}

pub fn write_play_features(dir: &Path, rows: &[PlayFeatureRow]) -> Result<()> {
    write_csv(&dir.join(ORPSP_FEATURES_FILE), rows)
}

pub fn write_targets(dir: &Path, targets: &[OrpspTarget]) -> Result<()> {
    write_csv(&dir.join(ORPSP_TARGET_FILE), targets)
}

/// Persist trained models as JSON.
pub fn save_models(path: &Path, models: &TrainedModels) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, models)?;
    info!("[IO] Saved models to {}", path.display());
    Ok(())
}

pub fn load_models(path: &Path) -> Result<TrainedModels> {
    let reader = BufReader::new(File::open(path)?);
    let models = serde_json::from_reader(reader)?;
    Ok(models)
}
