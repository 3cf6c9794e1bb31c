//! # presnap
//!
//! Pre-snap route analytics for player tracking data.
//!
//! This library provides:
//! - Play-direction and route-direction normalisation of tracking frames
//! - Route segment extraction relative to each receiver's pre-snap anchor
//! - Fixed-width route descriptors (quadratic fit + positional percentiles)
//! - Isolation-forest outlier rejection
//! - Affinity-propagation route clustering with a nearest-exemplar index
//! - Per-cluster route-shape labels and reception zones, with regression
//!   imputation for clusters that were never targeted
//! - Play-level feature assembly for the open-receiver (ORPSP) classifier
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon
//! - **`cli`** - Build the `presnap-cli` binary
//!
//! ## Quick Start
//!
//! ```rust
//! use presnap::synthetic::SyntheticScenario;
//! use presnap::{PipelineConfig, pipeline};
//!
//! let dataset = SyntheticScenario::small().generate();
//! let config = PipelineConfig::default();
//!
//! let run = pipeline::run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();
//! assert!(!run.tables.assignments.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// Unified error handling
pub mod error;
pub use error::{OptionExt, PipelineError, Result};

// Closed set of route-shape categories
pub mod shape;
pub use shape::RouteShape;

// Stage 1: field and route orientation
pub mod normalize;
pub use normalize::{OrientedFrame, RouteDirection};

// Stage 2: route segments relative to the pre-snap anchor
pub mod routes;
pub use routes::{RoutePoint, RouteSegment};

// Stage 3: fixed-width route descriptors
pub mod descriptor;
pub use descriptor::{DESCRIPTOR_LEN, RouteDescriptor};

// Stage 4: isolation forest outlier gate
pub mod outliers;
pub use outliers::{Contamination, IsolationForest, OutlierConfig, Verdict};

// Stage 5: affinity propagation + exemplar lookup
pub mod clustering;
pub use clustering::{ClusteredRoute, ClusteringConfig, RouteClusterer};

// Gradient-boosted trees for reception-zone imputation
pub mod regression;
pub use regression::{GradientBoostingRegressor, RegressorConfig};

// Stage 6: route-shape labels, reception zones, completeness
pub mod summary;
pub use summary::{ClusterRouteShape, ReceptionZone, ReceptionZoneConfig};

// Stage 7: play-level feature rows and ORPSP targets
pub mod assembly;
pub use assembly::{OrpspTarget, PlayFeatureRow};

// Stage orchestration with explicit model handles
pub mod pipeline;
pub use pipeline::{ClusterTables, TrainedModels};

// CSV row-set boundary
pub mod io;

// Deterministic synthetic data for tests, benches and demos
pub mod synthetic;

// ============================================================================
// Constants
// ============================================================================

/// Field length in yards, end line to end line.
pub const FIELD_LENGTH: f64 = 120.0;

/// Field width in yards, sideline to sideline.
pub const FIELD_WIDTH: f64 = 53.3;

/// Tracking sample duration in seconds (10 Hz).
pub const SECONDS_PER_FRAME: f64 = 0.1;

/// Number of weeks available in the tracking dataset.
pub const MAX_WEEKS: u8 = 9;

// ============================================================================
// Core Types
// ============================================================================

/// Identifies a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayKey {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
}

impl PlayKey {
    pub fn new(game_id: i64, play_id: i64) -> Self {
        Self { game_id, play_id }
    }
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.game_id, self.play_id)
    }
}

/// Identifies one player's participation in one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
}

impl RouteKey {
    pub fn new(game_id: i64, play_id: i64, player_id: i64) -> Self {
        Self {
            game_id,
            play_id,
            player_id,
        }
    }

    /// The play this route belongs to.
    pub fn play(&self) -> PlayKey {
        PlayKey::new(self.game_id, self.play_id)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_id, self.play_id, self.player_id)
    }
}

/// Cluster label assigned by a trained [`RouteClusterer`].
///
/// Only meaningful for the model that produced it; refitting yields an
/// unrelated id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub usize);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster({})", self.0)
    }
}

/// Snap phase of a tracking frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramePhase {
    #[serde(rename = "BEFORE_SNAP")]
    BeforeSnap,
    /// The snap frame itself; neither an anchor nor part of a route.
    #[serde(rename = "SNAP")]
    Snap,
    #[serde(rename = "AFTER_SNAP")]
    AfterSnap,
}

/// Direction the offense is moving along x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayDirection {
    Left,
    Right,
}

/// One tracking sample for a player (or the ball) in one frame of a play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingFrame {
    /// Week of the season; set by the reader from the source file.
    #[serde(default)]
    pub week: u8,
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    /// `None` for the ball.
    #[serde(rename = "nflId", deserialize_with = "io::na::option", default)]
    pub player_id: Option<i64>,
    #[serde(rename = "frameId")]
    pub frame_id: i64,
    #[serde(rename = "frameType")]
    pub frame_phase: FramePhase,
    #[serde(rename = "playDirection")]
    pub play_direction: PlayDirection,
    pub x: f64,
    pub y: f64,
    /// Orientation in degrees.
    #[serde(rename = "o", deserialize_with = "io::na::option", default)]
    pub orientation: Option<f64>,
    #[serde(deserialize_with = "io::na::option", default)]
    pub event: Option<String>,
}

impl TrackingFrame {
    /// Key of the player's participation, or `None` for the ball.
    pub fn route_key(&self) -> Option<RouteKey> {
        self.player_id
            .map(|player_id| RouteKey::new(self.game_id, self.play_id, player_id))
    }

    /// Key of the play.
    pub fn play_key(&self) -> PlayKey {
        PlayKey::new(self.game_id, self.play_id)
    }

    /// Whether the frame carries the given event tag.
    pub fn has_event(&self, event: &str) -> bool {
        self.event.as_deref() == Some(event)
    }
}

/// One player's participation flags for one play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPlay {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
    #[serde(rename = "wasRunningRoute", deserialize_with = "io::na::flag", default)]
    pub ran_route: bool,
    #[serde(
        rename = "wasTargettedReceiver",
        deserialize_with = "io::na::flag",
        default
    )]
    pub was_targeted: bool,
    #[serde(rename = "routeRan", deserialize_with = "io::na::option", default)]
    pub route_ran: Option<String>,
}

impl PlayerPlay {
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.game_id, self.play_id, self.player_id)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for every pipeline stage.
///
/// The route frame cap, the zone spread threshold and the outlier
/// contamination are all tunable; a shorter cap (30) and a wider spread
/// threshold (3 yards) are common alternatives to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest route frame index (offset from snap) kept in a route segment.
    /// Default: 50
    pub max_route_frame: i64,

    /// Largest route frame index considered when classifying route direction.
    /// Default: 50
    pub direction_max_route_frame: i64,

    /// Minimum points a segment needs to produce a descriptor.
    /// Default: 3
    pub min_route_points: usize,

    /// Week whose descriptors train the outlier filter and the clusterer.
    /// Default: 1
    pub reference_week: u8,

    /// Event tag marking the frame the pass reaches the receiver.
    /// Default: "pass_arrived"
    pub reception_event: String,

    /// Duration of one tracking frame in seconds.
    /// Default: 0.1
    pub seconds_per_frame: f64,

    pub outliers: OutlierConfig,
    pub clustering: ClusteringConfig,
    pub zones: ReceptionZoneConfig,
    pub imputer: RegressorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_route_frame: 50,
            direction_max_route_frame: 50,
            min_route_points: 3,
            reference_week: 1,
            reception_event: "pass_arrived".to_string(),
            seconds_per_frame: SECONDS_PER_FRAME,
            outliers: OutlierConfig::default(),
            clustering: ClusteringConfig::default(),
            zones: ReceptionZoneConfig::default(),
            imputer: RegressorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Check every parameter range. Configuration errors are never recovered.
    pub fn validate(&self) -> Result<()> {
        use error::ensure;

        ensure(
            self.max_route_frame >= 0,
            "max_route_frame",
            format!("must be >= 0, got {}", self.max_route_frame),
        )?;
        ensure(
            self.direction_max_route_frame >= 0,
            "direction_max_route_frame",
            format!("must be >= 0, got {}", self.direction_max_route_frame),
        )?;
        ensure(
            self.min_route_points >= 1,
            "min_route_points",
            "must be at least 1",
        )?;
        ensure(
            (1..=MAX_WEEKS).contains(&self.reference_week),
            "reference_week",
            format!(
                "must be between 1 and {}, got {}",
                MAX_WEEKS, self.reference_week
            ),
        )?;
        ensure(
            !self.reception_event.is_empty(),
            "reception_event",
            "must not be empty",
        )?;
        ensure(
            self.seconds_per_frame > 0.0,
            "seconds_per_frame",
            format!("must be positive, got {}", self.seconds_per_frame),
        )?;
        self.outliers.validate()?;
        self.clustering.validate()?;
        self.zones.validate()?;
        self.imputer.validate()?;
        Ok(())
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
