//! Play-level feature assembly.
//!
//! Joins play context, cluster tables and pre-snap positions into one row per
//! route-runner of every complete play, then derives reception-zone geometry
//! and per-play route composition. Plays are kept or dropped whole: if any
//! route-runner of a play lacks a reception zone, a start position or a
//! player-table row, or the play lacks context or a ball position, none of
//! its rows are emitted. A cluster without a shape label yields a row with
//! no route shape.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::io::na;
use crate::normalize::{RouteDirection, classify_route_directions, normalize_play_direction};
use crate::pipeline::{ClusterAssignment, ClusterTables};
use crate::summary::ReceptionZone;
use crate::{
    ClusterId, FIELD_LENGTH, FIELD_WIDTH, FramePhase, PipelineConfig, PlayDirection, PlayKey,
    PlayerPlay, RouteKey, RouteShape, TrackingFrame,
};

/// One row of the play table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayContext {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    pub down: u8,
    #[serde(rename = "yardsToGo")]
    pub yards_to_go: i64,
    /// Yard line in field coordinates, before play-direction normalisation.
    #[serde(rename = "absoluteYardlineNumber")]
    pub absolute_yardline_number: f64,
    #[serde(
        rename = "offenseFormation",
        deserialize_with = "na::option",
        default
    )]
    pub offense_formation: Option<String>,
    #[serde(
        rename = "receiverAlignment",
        deserialize_with = "na::option",
        default
    )]
    pub receiver_alignment: Option<String>,
    #[serde(rename = "playAction", deserialize_with = "na::flag", default)]
    pub play_action: bool,
    /// `C`, `I`, `IN`, `S` or `R`; absent for non-pass plays.
    #[serde(rename = "passResult", deserialize_with = "na::option", default)]
    pub pass_result: Option<String>,
    #[serde(rename = "qbSpike", deserialize_with = "na::optional_flag", default)]
    pub qb_spike: Option<bool>,
    #[serde(rename = "timeToSack", deserialize_with = "na::option", default)]
    pub time_to_sack: Option<f64>,
    #[serde(
        rename = "prePenaltyYardsGained",
        deserialize_with = "na::option",
        default
    )]
    pub pre_penalty_yards_gained: Option<f64>,
}

impl PlayContext {
    pub fn key(&self) -> PlayKey {
        PlayKey::new(self.game_id, self.play_id)
    }
}

/// One row of the player table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "nflId")]
    pub player_id: i64,
    #[serde(deserialize_with = "na::option", default)]
    pub position: Option<String>,
}

/// Counts of routes in one play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteComposition {
    /// Indexed by [`RouteShape::index`].
    pub shapes: [usize; RouteShape::COUNT],
    pub routes: usize,
    /// Zones behind the yard line.
    pub zone_negative: usize,
    /// Zones in `[0, 5)` yards past the yard line.
    pub zone_5: usize,
    pub zone_10: usize,
    pub zone_20: usize,
    /// Zones 20 or more yards past the yard line.
    pub zone_inf: usize,
}

impl RouteComposition {
    fn add(&mut self, shape: Option<RouteShape>, zone_from_yard_line: f64) {
        if let Some(shape) = shape {
            self.shapes[shape.index()] += 1;
        }
        self.routes += 1;
        match zone_from_yard_line {
            d if d < 0.0 => self.zone_negative += 1,
            d if d < 5.0 => self.zone_5 += 1,
            d if d < 10.0 => self.zone_10 += 1,
            d if d < 20.0 => self.zone_20 += 1,
            _ => self.zone_inf += 1,
        }
    }

    pub fn count(&self, shape: RouteShape) -> usize {
        self.shapes[shape.index()]
    }
}

/// Feature row of one route-runner in one complete play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayFeatureRow {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
    pub down: u8,
    #[serde(rename = "yardsToGo")]
    pub yards_to_go: i64,
    /// Yard line in normalised coordinates.
    #[serde(rename = "absoluteYardlineNumber")]
    pub absolute_yardline_number: f64,
    #[serde(rename = "offenseFormation")]
    pub offense_formation: Option<String>,
    #[serde(rename = "receiverAlignment")]
    pub receiver_alignment: Option<String>,
    #[serde(rename = "playAction")]
    pub play_action: bool,
    pub cluster: ClusterId,
    /// `None` when no route in the cluster carried a shape label.
    pub route_mode: Option<RouteShape>,
    pub relative_x_mean: f64,
    /// Sign follows the route's lateral direction.
    pub relative_y_mean: f64,
    pub route_time_mean: f64,
    pub x: f64,
    pub y: f64,
    pub o: Option<f64>,
    pub route_direction: Option<RouteDirection>,
    pub x_ball: f64,
    pub y_ball: f64,
    pub position: Option<String>,
    pub x_recep_zone: f64,
    pub y_recep_zone: f64,
    pub dis_recep_zone: f64,
    pub dir_recep_zone: f64,
    pub recep_zone_dis_out_of_bounds: f64,
    pub recep_zone_dis_yard_line: f64,
    pub dis_ball_to_recep_zone: f64,
    pub dir_ball_to_recep_zone: f64,
    pub dis_out_of_bounds: f64,
    pub dis_back_of_endzone: f64,
    pub dis_yard_line: f64,
    pub nb_straight: usize,
    pub nb_shortstraight: usize,
    pub nb_early45angle: usize,
    pub nb_late45angle: usize,
    #[serde(rename = "nb_90angle")]
    pub nb_angle90: usize,
    pub nb_flat: usize,
    pub nb_screen: usize,
    pub nb_wheelangle: usize,
    pub nb_routes: usize,
    pub nb_recep_zone_negative: usize,
    pub nb_recep_zone_5: usize,
    pub nb_recep_zone_10: usize,
    pub nb_recep_zone_20: usize,
    pub nb_recep_zone_inf: usize,
}

impl PlayFeatureRow {
    pub fn key(&self) -> RouteKey {
        RouteKey::new(self.game_id, self.play_id, self.player_id)
    }

    fn set_composition(&mut self, composition: &RouteComposition) {
        self.nb_straight = composition.count(RouteShape::Straight);
        self.nb_shortstraight = composition.count(RouteShape::ShortStraight);
        self.nb_early45angle = composition.count(RouteShape::Early45Angle);
        self.nb_late45angle = composition.count(RouteShape::Late45Angle);
        self.nb_angle90 = composition.count(RouteShape::Angle90);
        self.nb_flat = composition.count(RouteShape::Flat);
        self.nb_screen = composition.count(RouteShape::Screen);
        self.nb_wheelangle = composition.count(RouteShape::WheelAngle);
        self.nb_routes = composition.routes;
        self.nb_recep_zone_negative = composition.zone_negative;
        self.nb_recep_zone_5 = composition.zone_5;
        self.nb_recep_zone_10 = composition.zone_10;
        self.nb_recep_zone_20 = composition.zone_20;
        self.nb_recep_zone_inf = composition.zone_inf;
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Euclidean distance between two points.
pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
}

/// Bearing from the first point to the second in degrees, in [0, 360).
///
/// Zero points along +y; angles grow toward +x.
pub fn bearing(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x2 - x1).atan2(y2 - y1).to_degrees() + 360.0) % 360.0
}

/// Distance from a lateral coordinate to the nearest sideline.
pub fn distance_to_sideline(y: f64) -> f64 {
    let half = FIELD_WIDTH / 2.0;
    let y = y.abs();
    (half * (y / half).floor() - y.rem_euclid(half)).abs()
}

/// Keep a position inside the field; overshoot lands just short of the far
/// boundary.
pub fn clamp_to_field(x: f64, y: f64) -> (f64, f64) {
    let x = if x > FIELD_LENGTH {
        FIELD_LENGTH - 0.01
    } else {
        x.max(0.0)
    };
    let y = if y > FIELD_WIDTH {
        FIELD_WIDTH - 0.01
    } else {
        y.max(0.0)
    };
    (x, y)
}

// ============================================================================
// Assembly
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct StartPosition {
    frame_id: i64,
    x: f64,
    y: f64,
    o: Option<f64>,
    direction: PlayDirection,
}

/// Last before-snap position of every player and the ball, field-normalised.
fn start_positions(frames: &[TrackingFrame]) -> HashMap<(PlayKey, Option<i64>), StartPosition> {
    let mut starts: HashMap<(PlayKey, Option<i64>), StartPosition> = HashMap::new();
    for frame in frames
        .iter()
        .filter(|f| f.frame_phase == FramePhase::BeforeSnap)
    {
        let start = StartPosition {
            frame_id: frame.frame_id,
            x: frame.x,
            y: frame.y,
            o: frame.orientation,
            direction: frame.play_direction,
        };
        starts
            .entry((frame.play_key(), frame.player_id))
            .and_modify(|s| {
                if start.frame_id > s.frame_id {
                    *s = start;
                }
            })
            .or_insert(start);
    }
    starts
}

/// Build feature rows for every route-runner of the complete plays.
///
/// A play appears with all of its route-runners or not at all. Rows come
/// back sorted by (game, play, player).
pub fn assemble_play_features(
    complete: &[PlayKey],
    plays: &[PlayContext],
    players: &[Player],
    tables: &ClusterTables,
    tracking: &[TrackingFrame],
    config: &PipelineConfig,
) -> Vec<PlayFeatureRow> {
    let complete: HashSet<PlayKey> = complete.iter().copied().collect();

    let contexts: HashMap<PlayKey, &PlayContext> = plays
        .iter()
        .filter(|p| complete.contains(&p.key()))
        .map(|p| (p.key(), p))
        .collect();
    let shapes: HashMap<ClusterId, RouteShape> = tables
        .route_shapes
        .iter()
        .map(|s| (s.cluster, s.route_mode))
        .collect();
    let zones: HashMap<ClusterId, &ReceptionZone> = tables
        .reception_zones
        .iter()
        .map(|z| (z.cluster, z))
        .collect();
    let positions: HashMap<i64, Option<&str>> = players
        .iter()
        .map(|p| (p.player_id, p.position.as_deref()))
        .collect();

    let frames: Vec<TrackingFrame> = tracking
        .iter()
        .filter(|f| complete.contains(&f.play_key()))
        .cloned()
        .collect();
    let frames = normalize_play_direction(&frames);
    let directions = classify_route_directions(&frames, config.direction_max_route_frame);
    let starts = start_positions(&frames);

    let mut runners: BTreeMap<PlayKey, Vec<&ClusterAssignment>> = BTreeMap::new();
    for assignment in &tables.assignments {
        let play = assignment.key().play();
        if complete.contains(&play) {
            runners.entry(play).or_default().push(assignment);
        }
    }

    let mut rows = Vec::new();
    let mut assembled = 0usize;
    let mut dropped = 0usize;

    'plays: for (play, assignments) in &runners {
        let (Some(context), Some(ball)) = (contexts.get(play), starts.get(&(*play, None))) else {
            dropped += 1;
            continue;
        };

        let mut play_rows = Vec::with_capacity(assignments.len());
        let mut composition = RouteComposition::default();

        for assignment in assignments {
            let key = assignment.key();
            let (Some(zone), Some(start), Some(position)) = (
                zones.get(&assignment.cluster),
                starts.get(&(*play, Some(key.player_id))),
                positions.get(&key.player_id),
            ) else {
                debug!("[Plays] {} lacks a zone, start or player row", key);
                dropped += 1;
                continue 'plays;
            };
            let route_mode = shapes.get(&assignment.cluster).copied();

            let yard_line = match start.direction {
                PlayDirection::Left => FIELD_LENGTH - context.absolute_yardline_number,
                PlayDirection::Right => context.absolute_yardline_number,
            };
            let route_direction = directions.get(&key).copied();
            let relative_y_mean = if route_direction == Some(RouteDirection::Rightward) {
                -zone.relative_y_mean
            } else {
                zone.relative_y_mean
            };

            let (x_zone, y_zone) =
                clamp_to_field(start.x + zone.relative_x_mean, start.y + relative_y_mean);
            composition.add(route_mode, x_zone - yard_line);

            play_rows.push(PlayFeatureRow {
                game_id: key.game_id,
                play_id: key.play_id,
                player_id: key.player_id,
                down: context.down,
                yards_to_go: context.yards_to_go,
                absolute_yardline_number: yard_line,
                offense_formation: context.offense_formation.clone(),
                receiver_alignment: context.receiver_alignment.clone(),
                play_action: context.play_action,
                cluster: assignment.cluster,
                route_mode,
                relative_x_mean: zone.relative_x_mean,
                relative_y_mean,
                route_time_mean: zone.route_time_mean,
                x: start.x,
                y: start.y,
                o: start.o,
                route_direction,
                x_ball: ball.x,
                y_ball: ball.y,
                position: position.map(str::to_string),
                x_recep_zone: x_zone,
                y_recep_zone: y_zone,
                dis_recep_zone: distance(start.x, start.y, x_zone, y_zone),
                dir_recep_zone: bearing(start.x, start.y, x_zone, y_zone),
                recep_zone_dis_out_of_bounds: distance_to_sideline(y_zone),
                recep_zone_dis_yard_line: (yard_line - x_zone).abs(),
                dis_ball_to_recep_zone: distance(ball.x, ball.y, x_zone, y_zone),
                dir_ball_to_recep_zone: bearing(ball.x, ball.y, x_zone, y_zone),
                dis_out_of_bounds: distance_to_sideline(start.y),
                dis_back_of_endzone: (FIELD_LENGTH - start.x).abs(),
                dis_yard_line: (yard_line - start.x).abs(),
                nb_straight: 0,
                nb_shortstraight: 0,
                nb_early45angle: 0,
                nb_late45angle: 0,
                nb_angle90: 0,
                nb_flat: 0,
                nb_screen: 0,
                nb_wheelangle: 0,
                nb_routes: 0,
                nb_recep_zone_negative: 0,
                nb_recep_zone_5: 0,
                nb_recep_zone_10: 0,
                nb_recep_zone_20: 0,
                nb_recep_zone_inf: 0,
            });
        }

        for row in &mut play_rows {
            row.set_composition(&composition);
        }
        rows.extend(play_rows);
        assembled += 1;
    }
    rows.sort_by_key(PlayFeatureRow::key);

    info!(
        "[Plays] Assembled {} feature rows over {} plays",
        rows.len(),
        assembled
    );
    if dropped > 0 {
        info!(
            "[Plays] Dropped {} complete plays with a route-runner missing from an input table",
            dropped
        );
    }

    rows
}

// ============================================================================
// Targets
// ============================================================================

/// Whether a route-runner got open on a passing play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrpspTarget {
    #[serde(rename = "gameId")]
    pub game_id: i64,
    #[serde(rename = "playId")]
    pub play_id: i64,
    #[serde(rename = "nflId")]
    pub player_id: i64,
    pub orpsp_target: u8,
}

/// Label route-runners of complete passing plays.
///
/// Plays qualify with a pass result, no QB spike, and either no sack or a
/// sack after more than 4 seconds. On completions, incompletions and
/// interceptions only the targeted receiver is labelled; on sacks and
/// scrambles every route-runner is. The label is 1 for a completion gaining
/// more than 2 yards before penalties.
pub fn orpsp_targets(
    complete: &[PlayKey],
    plays: &[PlayContext],
    participation: &[PlayerPlay],
) -> Vec<OrpspTarget> {
    let complete: HashSet<PlayKey> = complete.iter().copied().collect();

    let eligible: HashMap<PlayKey, &PlayContext> = plays
        .iter()
        .filter(|p| complete.contains(&p.key()))
        .filter(|p| p.pass_result.is_some())
        .filter(|p| p.qb_spike != Some(true))
        .filter(|p| p.time_to_sack.is_none_or(|t| t > 4.0))
        .map(|p| (p.key(), p))
        .collect();

    let mut targets: Vec<OrpspTarget> = participation
        .iter()
        .filter(|p| p.ran_route)
        .filter_map(|p| {
            let key = p.route_key();
            let play = eligible.get(&key.play())?;
            let result = play.pass_result.as_deref()?;
            let labelled = match result {
                "C" | "I" | "IN" => p.was_targeted,
                "S" | "R" => true,
                _ => false,
            };
            if !labelled {
                return None;
            }
            let open = result == "C" && play.pre_penalty_yards_gained.is_some_and(|y| y > 2.0);
            Some(OrpspTarget {
                game_id: key.game_id,
                play_id: key.play_id,
                player_id: key.player_id,
                orpsp_target: u8::from(open),
            })
        })
        .collect();
    targets.sort_by_key(|t| (t.game_id, t.play_id, t.player_id));

    let positives = targets.iter().filter(|t| t.orpsp_target == 1).count();
    info!(
        "[Plays] Labelled {} route-runners: {} open, {} not open",
        targets.len(),
        positives,
        targets.len() - positives
    );

    targets
}
