//! Coordinate normalisation.
//!
//! Two reflections bring every route into one canonical frame:
//! - Field orientation: left-directed plays are rotated 180° so offense
//!   always moves toward increasing x.
//! - Route orientation: routes that break toward decreasing y are mirrored
//!   across the field width so both sides of the formation share one shape
//!   family.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{FIELD_LENGTH, FIELD_WIDTH, FramePhase, PlayDirection, RouteKey, TrackingFrame};

/// Lateral direction of a route after the snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteDirection {
    /// y increased between the pre-snap anchor and the classification frame.
    Leftward,
    /// y stayed the same or decreased.
    Rightward,
}

/// A tracking frame tagged with its player's route direction.
///
/// `route_direction` is `None` when the player had no pre-snap frame or no
/// post-snap frame within the classification bound, and for the ball.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedFrame {
    pub frame: TrackingFrame,
    pub route_direction: Option<RouteDirection>,
}

/// Rotate a position 180° about the field centre.
///
/// Applying it twice returns the original coordinates.
pub fn reflect_field(x: f64, y: f64) -> (f64, f64) {
    (FIELD_LENGTH - x, FIELD_WIDTH - y)
}

/// Mirror a lateral coordinate across the field width.
pub fn mirror_y(y: f64) -> f64 {
    FIELD_WIDTH - y
}

/// Rotate left-directed plays so every play progresses toward increasing x.
pub fn normalize_play_direction(frames: &[TrackingFrame]) -> Vec<TrackingFrame> {
    frames
        .iter()
        .map(|frame| {
            let mut frame = frame.clone();
            if frame.play_direction == PlayDirection::Left {
                let (x, y) = reflect_field(frame.x, frame.y);
                frame.x = x;
                frame.y = y;
            }
            frame
        })
        .collect()
}

/// Classify each player's route direction.
///
/// Compares the y of the last before-snap frame with the y of the last
/// after-snap frame whose route frame index is within `max_route_frame`.
/// Players missing either frame are absent from the result.
pub fn classify_route_directions(
    frames: &[TrackingFrame],
    max_route_frame: i64,
) -> HashMap<RouteKey, RouteDirection> {
    // Last before-snap (frame_id, y) per player
    let mut anchors: HashMap<RouteKey, (i64, f64)> = HashMap::new();
    for frame in frames {
        if frame.frame_phase != FramePhase::BeforeSnap {
            continue;
        }
        let Some(key) = frame.route_key() else {
            continue;
        };
        anchors
            .entry(key)
            .and_modify(|anchor| {
                if frame.frame_id > anchor.0 {
                    *anchor = (frame.frame_id, frame.y);
                }
            })
            .or_insert((frame.frame_id, frame.y));
    }

    // Last after-snap (frame_id, y) within the bound per player
    let mut latest: HashMap<RouteKey, (i64, f64)> = HashMap::new();
    for frame in frames {
        if frame.frame_phase != FramePhase::AfterSnap {
            continue;
        }
        let Some(key) = frame.route_key() else {
            continue;
        };
        let Some(&(anchor_frame, _)) = anchors.get(&key) else {
            continue;
        };
        let route_frame_id = frame.frame_id - anchor_frame - 1;
        if route_frame_id > max_route_frame {
            continue;
        }
        latest
            .entry(key)
            .and_modify(|last| {
                if frame.frame_id > last.0 {
                    *last = (frame.frame_id, frame.y);
                }
            })
            .or_insert((frame.frame_id, frame.y));
    }

    let directions: HashMap<RouteKey, RouteDirection> = latest
        .into_iter()
        .filter_map(|(key, (_, y))| {
            let (_, y_start) = anchors.get(&key)?;
            let direction = if y > *y_start {
                RouteDirection::Leftward
            } else {
                RouteDirection::Rightward
            };
            Some((key, direction))
        })
        .collect();

    debug!(
        "[Normalize] Classified {} of {} anchored players",
        directions.len(),
        anchors.len()
    );

    directions
}

/// Tag frames with their player's route direction without moving them.
pub fn attach_route_directions(
    frames: Vec<TrackingFrame>,
    directions: &HashMap<RouteKey, RouteDirection>,
) -> Vec<OrientedFrame> {
    frames
        .into_iter()
        .map(|frame| {
            let route_direction = frame
                .route_key()
                .and_then(|key| directions.get(&key).copied());
            OrientedFrame {
                frame,
                route_direction,
            }
        })
        .collect()
}

/// Mirror the y of every frame belonging to a rightward route.
///
/// Frames with an unknown direction keep their coordinates; they are dropped
/// later by route extraction rather than defaulted here.
pub fn mirror_rightward_routes(frames: Vec<OrientedFrame>) -> Vec<OrientedFrame> {
    frames
        .into_iter()
        .map(|mut oriented| {
            if oriented.route_direction == Some(RouteDirection::Rightward) {
                oriented.frame.y = mirror_y(oriented.frame.y);
            }
            oriented
        })
        .collect()
}

/// Classify route directions and mirror rightward routes.
///
/// Expects frames already passed through [`normalize_play_direction`].
pub fn orient_routes(frames: Vec<TrackingFrame>, max_route_frame: i64) -> Vec<OrientedFrame> {
    let directions = classify_route_directions(&frames, max_route_frame);
    mirror_rightward_routes(attach_route_directions(frames, &directions))
}
