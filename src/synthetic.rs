//! Synthetic tracking data generator for tests, benchmarks and demos.
//!
//! Generates plays with known route templates run from both sides of the
//! formation in both play directions, so every normalisation branch is
//! exercised and the route labels double as ground truth for clustering.
//!
//! # Example
//!
//! ```rust
//! use presnap::synthetic::SyntheticScenario;
//!
//! let dataset = SyntheticScenario::small().generate();
//! assert!(!dataset.tracking.is_empty());
//! assert!(dataset.player_plays.iter().any(|p| p.was_targeted));
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

use crate::assembly::{PlayContext, Player};
use crate::error::Result;
use crate::io;
use crate::{FIELD_LENGTH, FIELD_WIDTH, FramePhase, PlayDirection, PlayerPlay, TrackingFrame};

// ============================================================================
// Types
// ============================================================================

/// Route a synthetic receiver runs. Offsets are in the offense's frame:
/// +x downfield, +y toward the break side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTemplate {
    Go,
    Hitch,
    Slant,
    Post,
    Out,
    Flat,
    Screen,
    Wheel,
}

impl RouteTemplate {
    pub const ALL: [RouteTemplate; 8] = [
        RouteTemplate::Go,
        RouteTemplate::Hitch,
        RouteTemplate::Slant,
        RouteTemplate::Post,
        RouteTemplate::Out,
        RouteTemplate::Flat,
        RouteTemplate::Screen,
        RouteTemplate::Wheel,
    ];

    /// Raw route label as it appears in the participation table.
    pub fn label(&self) -> &'static str {
        match self {
            RouteTemplate::Go => "GO",
            RouteTemplate::Hitch => "HITCH",
            RouteTemplate::Slant => "SLANT",
            RouteTemplate::Post => "POST",
            RouteTemplate::Out => "OUT",
            RouteTemplate::Flat => "FLAT",
            RouteTemplate::Screen => "SCREEN",
            RouteTemplate::Wheel => "WHEEL",
        }
    }

    /// Nominal stem length before the break, in yards.
    fn stem(&self) -> f64 {
        match self {
            RouteTemplate::Go => 0.0,
            RouteTemplate::Hitch => 6.0,
            RouteTemplate::Slant => 2.0,
            RouteTemplate::Post => 10.0,
            RouteTemplate::Out => 8.0,
            RouteTemplate::Flat => 0.0,
            RouteTemplate::Screen => 0.0,
            RouteTemplate::Wheel => 5.0,
        }
    }

    /// Offset after running `s` yards with the given stem.
    fn offset(&self, s: f64, stem: f64) -> (f64, f64) {
        let past = (s - stem).max(0.0);
        let up = s.min(stem);
        match self {
            RouteTemplate::Go => (s, 0.05 * s),
            RouteTemplate::Hitch => (up - (0.3 * past).min(2.0), 0.1 * past.min(5.0)),
            RouteTemplate::Slant | RouteTemplate::Post => (up + past * 0.707, past * 0.707),
            RouteTemplate::Out => (up, past),
            RouteTemplate::Flat => (0.3 * s, 0.95 * s),
            RouteTemplate::Screen => (-(0.2 * s).min(2.0), 0.5 * s),
            RouteTemplate::Wheel => (0.3 * up + past, 0.95 * up + 0.15 * past),
        }
    }
}

/// Generated tables, in the layout of the real dataset.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub tracking: Vec<TrackingFrame>,
    pub player_plays: Vec<PlayerPlay>,
    pub plays: Vec<PlayContext>,
    pub players: Vec<Player>,
}

/// Scenario configuration for generating synthetic data.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Number of games; game `g` lands in week `g % weeks + 1`.
    pub games: usize,
    pub plays_per_game: usize,
    pub weeks: u8,
    /// Route-runners per play (1 to 5).
    pub receivers_per_play: usize,
    /// Frames before the snap frame.
    pub before_snap_frames: usize,
    /// Frames after the snap frame.
    pub after_snap_frames: usize,
    /// Standard deviation of per-frame position noise in yards.
    pub position_noise_yards: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

// ============================================================================
// Generation Helpers
// ============================================================================

/// Yards covered per frame by a receiver at full speed.
const SPEED: f64 = 0.7;

/// Lateral alignments of the receiver slots, in offense coordinates.
const SLOTS: [f64; 5] = [8.0, 45.0, 15.0, 38.0, 22.0];

/// Box-Muller standard normal sample.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Map offense coordinates to field coordinates.
fn to_field(x: f64, y: f64, direction: PlayDirection) -> (f64, f64) {
    match direction {
        PlayDirection::Right => (x, y),
        PlayDirection::Left => (FIELD_LENGTH - x, FIELD_WIDTH - y),
    }
}

fn pick_pass_result(rng: &mut StdRng) -> Option<&'static str> {
    let roll: f64 = rng.r#gen();
    match roll {
        r if r < 0.45 => Some("C"),
        r if r < 0.65 => Some("I"),
        r if r < 0.68 => Some("IN"),
        r if r < 0.76 => Some("S"),
        r if r < 0.82 => Some("R"),
        _ => None,
    }
}

struct PlayFrames<'a> {
    game_id: i64,
    play_id: i64,
    week: u8,
    direction: PlayDirection,
    snap_frame: i64,
    reception_frame: Option<i64>,
    tracking: &'a mut Vec<TrackingFrame>,
}

impl PlayFrames<'_> {
    fn push(&mut self, player_id: Option<i64>, frame_id: i64, x: f64, y: f64, o: Option<f64>) {
        let frame_phase = match frame_id.cmp(&self.snap_frame) {
            std::cmp::Ordering::Less => FramePhase::BeforeSnap,
            std::cmp::Ordering::Equal => FramePhase::Snap,
            std::cmp::Ordering::Greater => FramePhase::AfterSnap,
        };
        let event = if frame_id == self.snap_frame {
            Some("ball_snap".to_string())
        } else if Some(frame_id) == self.reception_frame {
            Some("pass_arrived".to_string())
        } else {
            None
        };
        let (x, y) = to_field(x, y, self.direction);
        self.tracking.push(TrackingFrame {
            week: self.week,
            game_id: self.game_id,
            play_id: self.play_id,
            player_id,
            frame_id,
            frame_phase,
            play_direction: self.direction,
            x,
            y,
            orientation: o,
            event,
        });
    }
}

// ============================================================================
// Scenario Implementation
// ============================================================================

impl SyntheticScenario {
    /// Generate a complete synthetic dataset from this scenario.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let receivers = self.receivers_per_play.clamp(1, SLOTS.len());
        let weeks = self.weeks.max(1);
        let snap_frame = self.before_snap_frames as i64 + 1;
        let last_frame = snap_frame + self.after_snap_frames as i64;

        let mut dataset = SyntheticDataset {
            tracking: Vec::new(),
            player_plays: Vec::new(),
            plays: Vec::new(),
            players: Vec::new(),
        };

        for game in 0..self.games {
            let game_id = 2022090800 + game as i64;
            let week = (game % weeks as usize) as u8 + 1;
            let roster: Vec<i64> = (0..=receivers as i64)
                .map(|slot| 40000 + game as i64 * 10 + slot)
                .collect();
            for (slot, &player_id) in roster.iter().enumerate() {
                let position = match slot {
                    0 => "T",
                    1 | 2 => "WR",
                    3 => "TE",
                    _ => "RB",
                };
                dataset.players.push(Player {
                    player_id,
                    position: Some(position.to_string()),
                });
            }

            for play in 0..self.plays_per_game {
                let play_id = 50 + play as i64 * 25;
                let direction = if rng.gen_bool(0.5) {
                    PlayDirection::Right
                } else {
                    PlayDirection::Left
                };
                let line_of_scrimmage: f64 = rng.gen_range(25.0..85.0);
                let pass_result = pick_pass_result(&mut rng);
                let passing = pass_result.is_some();
                let target = rng.gen_range(0..receivers);
                let catch_route_frame: i64 = rng.gen_range(15..=30).min(self.after_snap_frames as i64);
                let throws = matches!(pass_result, Some("C" | "I" | "IN"));

                let mut frames = PlayFrames {
                    game_id,
                    play_id,
                    week,
                    direction,
                    snap_frame,
                    reception_frame: throws.then_some(snap_frame + catch_route_frame),
                    tracking: &mut dataset.tracking,
                };

                // Ball: still before the snap, then carried back with the drop
                let ball_y = FIELD_WIDTH / 2.0;
                for frame_id in 1..=last_frame {
                    let drop = ((frame_id - snap_frame).max(0) as f64 * 0.3).min(7.0);
                    frames.push(None, frame_id, line_of_scrimmage - drop, ball_y, None);
                }

                // Lineman: never runs a route
                let tackle_y = ball_y + 3.0;
                for frame_id in 1..=last_frame {
                    let o = rng.gen_range(0.0..360.0);
                    frames.push(Some(roster[0]), frame_id, line_of_scrimmage - 1.0, tackle_y, Some(o));
                }

                let mut completed_offset = 0.0;
                for receiver in 0..receivers {
                    let player_id = roster[receiver + 1];
                    let template = RouteTemplate::ALL[rng.gen_range(0..RouteTemplate::ALL.len())];
                    let stem = template.stem() + rng.gen_range(-1.0..1.0_f64).max(-template.stem());
                    let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    let x0 = line_of_scrimmage - if receiver == 4 { 5.0 } else { 1.0 };
                    let y0 = SLOTS[receiver] + rng.gen_range(-1.5..1.5);
                    let o = rng.gen_range(0.0..360.0);

                    for frame_id in 1..=last_frame {
                        let (x, y) = if frame_id <= snap_frame {
                            (
                                x0 + 0.05 * gaussian(&mut rng),
                                y0 + 0.05 * gaussian(&mut rng),
                            )
                        } else {
                            let s = (frame_id - snap_frame) as f64 * SPEED;
                            let (dx, dy) = template.offset(s, stem);
                            (
                                x0 + dx + self.position_noise_yards * gaussian(&mut rng),
                                y0 + side * dy + self.position_noise_yards * gaussian(&mut rng),
                            )
                        };
                        frames.push(Some(player_id), frame_id, x, y, Some(o));
                    }

                    if receiver == target && throws {
                        completed_offset =
                            template.offset(catch_route_frame as f64 * SPEED, stem).0;
                    }

                    dataset.player_plays.push(PlayerPlay {
                        game_id,
                        play_id,
                        player_id,
                        ran_route: passing,
                        was_targeted: throws && receiver == target,
                        route_ran: passing.then(|| template.label().to_string()),
                    });
                }

                dataset.player_plays.push(PlayerPlay {
                    game_id,
                    play_id,
                    player_id: roster[0],
                    ran_route: false,
                    was_targeted: false,
                    route_ran: None,
                });

                let absolute_yardline_number = match direction {
                    PlayDirection::Right => line_of_scrimmage,
                    PlayDirection::Left => FIELD_LENGTH - line_of_scrimmage,
                };
                let yards_gained = match pass_result {
                    Some("C") => Some(completed_offset + rng.gen_range(0.0..8.0) - 1.0),
                    Some("S") => Some(-rng.gen_range(1.0..9.0)),
                    Some(_) => Some(0.0),
                    None => Some(rng.gen_range(-2.0..8.0)),
                };

                dataset.plays.push(PlayContext {
                    game_id,
                    play_id,
                    down: rng.gen_range(1..=4),
                    yards_to_go: rng.gen_range(1..=15),
                    absolute_yardline_number,
                    offense_formation: Some(
                        ["SHOTGUN", "SINGLEBACK", "EMPTY"][rng.gen_range(0..3)].to_string(),
                    ),
                    receiver_alignment: Some(format!("{}x{}", receivers.div_ceil(2), receivers / 2)),
                    play_action: rng.gen_bool(0.25),
                    pass_result: pass_result.map(str::to_string),
                    qb_spike: passing.then_some(false),
                    time_to_sack: (pass_result == Some("S")).then(|| rng.gen_range(2.0..6.0)),
                    pre_penalty_yards_gained: yards_gained,
                });
            }
        }

        dataset
    }
}

impl SyntheticDataset {
    /// Write the dataset as CSV files in the layout [`crate::io`] reads.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let weeks = self.tracking.iter().map(|f| f.week).max().unwrap_or(0);
        for week in 1..=weeks {
            let frames: Vec<&TrackingFrame> =
                self.tracking.iter().filter(|f| f.week == week).collect();
            io::write_csv(&dir.join(io::tracking_file(week)), &frames)?;
        }
        io::write_csv(&dir.join(io::PLAYER_PLAY_FILE), &self.player_plays)?;
        io::write_csv(&dir.join(io::PLAYS_FILE), &self.plays)?;
        io::write_csv(&dir.join(io::PLAYERS_FILE), &self.players)?;
        Ok(())
    }
}

// ============================================================================
// Predefined Scenarios
// ============================================================================

impl SyntheticScenario {
    /// 6 games over 2 weeks, 12 plays each, 4 receivers. Enough week-1 routes
    /// to train every model.
    pub fn small() -> Self {
        Self {
            games: 6,
            plays_per_game: 12,
            weeks: 2,
            receivers_per_play: 4,
            before_snap_frames: 10,
            after_snap_frames: 40,
            position_noise_yards: 0.1,
            seed: 42,
        }
    }

    /// 16 games over 4 weeks, 30 plays each, 5 receivers. Benchmark baseline.
    pub fn standard() -> Self {
        Self {
            games: 16,
            plays_per_game: 30,
            weeks: 4,
            receivers_per_play: 5,
            before_snap_frames: 20,
            after_snap_frames: 50,
            position_noise_yards: 0.15,
            seed: 43,
        }
    }

    /// Custom game count with the small scenario's other settings.
    pub fn with_games(games: usize, seed: u64) -> Self {
        Self {
            games,
            seed,
            ..Self::small()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
