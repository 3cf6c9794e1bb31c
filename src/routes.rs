//! Route segment extraction.
//!
//! Restricts oriented tracking to the post-snap window of each route-runner,
//! re-expressed relative to the player's last pre-snap position. Targeted
//! receivers are cut at the reception frame so post-catch movement never
//! reaches the route-shape features.

use log::info;
use std::collections::{HashMap, HashSet};

use crate::normalize::{OrientedFrame, RouteDirection};
use crate::{FramePhase, PipelineConfig, PlayerPlay, RouteKey, TrackingFrame};

/// One post-snap sample of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePoint {
    pub frame_id: i64,
    /// Zero-based offset from the snap.
    pub route_frame_id: i64,
    pub relative_x: f64,
    pub relative_y: f64,
    pub event: Option<String>,
}

/// The ordered post-snap trajectory of one route-runner in one play.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    pub week: u8,
    pub key: RouteKey,
    pub direction: RouteDirection,
    pub targeted: bool,
    /// Points in arrival order.
    pub points: Vec<RoutePoint>,
}

impl RouteSegment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point tagged with `event`.
    pub fn point_with_event(&self, event: &str) -> Option<&RoutePoint> {
        self.points
            .iter()
            .find(|p| p.event.as_deref() == Some(event))
    }
}

/// Counts from one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub segments: usize,
    /// Route-runners with no before-snap frame.
    pub missing_anchor: usize,
    /// Route-runners whose route direction could not be classified.
    pub missing_direction: usize,
    /// Route-runners left with no post-snap point inside the window.
    pub empty_window: usize,
}

/// Keep only frames of players flagged as running a route on that play.
pub fn route_runner_frames(
    frames: Vec<TrackingFrame>,
    participation: &[PlayerPlay],
) -> Vec<TrackingFrame> {
    let runners: HashSet<RouteKey> = participation
        .iter()
        .filter(|p| p.ran_route)
        .map(PlayerPlay::route_key)
        .collect();

    frames
        .into_iter()
        .filter(|f| f.route_key().is_some_and(|key| runners.contains(&key)))
        .collect()
}

/// Extract one segment per route-runner.
///
/// Players without a pre-snap anchor or without a route direction are
/// dropped; segments come back sorted by (week, game, play, player).
///
/// Input frames must already be in frame order per player, as the tracking
/// files are. Anchors are found by frame id, but segment points keep input
/// order, which the positional descriptor samples depend on.
pub fn extract_routes(
    frames: &[OrientedFrame],
    participation: &[PlayerPlay],
    config: &PipelineConfig,
) -> (Vec<RouteSegment>, ExtractionStats) {
    let runners: HashMap<RouteKey, &PlayerPlay> = participation
        .iter()
        .filter(|p| p.ran_route)
        .map(|p| (p.route_key(), p))
        .collect();

    let mut by_route: HashMap<RouteKey, Vec<&OrientedFrame>> = HashMap::new();
    for oriented in frames {
        if let Some(key) = oriented.frame.route_key() {
            if runners.contains_key(&key) {
                by_route.entry(key).or_default().push(oriented);
            }
        }
    }

    let mut stats = ExtractionStats::default();
    let mut segments = Vec::with_capacity(by_route.len());

    for (key, route_frames) in by_route {
        // Anchor: last before-snap frame
        let Some(anchor) = route_frames
            .iter()
            .filter(|f| f.frame.frame_phase == FramePhase::BeforeSnap)
            .max_by_key(|f| f.frame.frame_id)
        else {
            stats.missing_anchor += 1;
            continue;
        };
        let anchor = &anchor.frame;

        let Some(direction) = route_frames.iter().find_map(|f| f.route_direction) else {
            stats.missing_direction += 1;
            continue;
        };

        let mut points: Vec<RoutePoint> = route_frames
            .iter()
            .filter(|f| f.frame.frame_phase == FramePhase::AfterSnap)
            .map(|f| RoutePoint {
                frame_id: f.frame.frame_id,
                route_frame_id: f.frame.frame_id - anchor.frame_id - 1,
                relative_x: f.frame.x - anchor.x,
                relative_y: f.frame.y - anchor.y,
                event: f.frame.event.clone(),
            })
            .filter(|p| p.route_frame_id <= config.max_route_frame)
            .collect();

        let targeted = runners.get(&key).is_some_and(|p| p.was_targeted);
        if targeted {
            let reception = points
                .iter()
                .filter(|p| p.event.as_deref() == Some(config.reception_event.as_str()))
                .map(|p| p.route_frame_id)
                .min();
            if let Some(reception_frame_id) = reception {
                points.retain(|p| p.route_frame_id <= reception_frame_id);
            }
        }

        if points.is_empty() {
            stats.empty_window += 1;
            continue;
        }

        segments.push(RouteSegment {
            week: anchor.week,
            key,
            direction,
            targeted,
            points,
        });
    }

    segments.sort_by_key(|s| (s.week, s.key));
    stats.segments = segments.len();

    info!(
        "[Routes] Extracted {} route segments ({} without anchor, {} without direction, {} empty)",
        stats.segments, stats.missing_anchor, stats.missing_direction, stats.empty_window
    );

    (segments, stats)
}
