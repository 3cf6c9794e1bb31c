//! Tests for coordinate normalisation

use presnap::normalize::*;
use presnap::{FIELD_LENGTH, FIELD_WIDTH, FramePhase, PlayDirection, RouteKey, TrackingFrame};

fn frame(
    player: Option<i64>,
    frame_id: i64,
    phase: FramePhase,
    direction: PlayDirection,
    x: f64,
    y: f64,
) -> TrackingFrame {
    TrackingFrame {
        week: 1,
        game_id: 1,
        play_id: 1,
        player_id: player,
        frame_id,
        frame_phase: phase,
        play_direction: direction,
        x,
        y,
        orientation: None,
        event: None,
    }
}

/// Three before-snap frames at `y_start`, a snap frame, then `after` frames
/// moving linearly to `y_end`.
fn route(player: i64, y_start: f64, y_end: f64, after: i64) -> Vec<TrackingFrame> {
    let mut frames: Vec<TrackingFrame> = (1..=3)
        .map(|f| frame(Some(player), f, FramePhase::BeforeSnap, PlayDirection::Right, 30.0, y_start))
        .collect();
    frames.push(frame(Some(player), 4, FramePhase::Snap, PlayDirection::Right, 30.0, y_start));
    for i in 1..=after {
        let y = y_start + (y_end - y_start) * i as f64 / after as f64;
        frames.push(frame(
            Some(player),
            4 + i,
            FramePhase::AfterSnap,
            PlayDirection::Right,
            30.0 + i as f64,
            y,
        ));
    }
    frames
}

#[test]
fn test_reflect_field_is_involution() {
    for &(x, y) in &[(0.0, 0.0), (10.5, 20.25), (119.9, 53.2), (60.0, 26.65)] {
        let (x1, y1) = reflect_field(x, y);
        let (x2, y2) = reflect_field(x1, y1);
        assert!((x2 - x).abs() < 1e-9);
        assert!((y2 - y).abs() < 1e-9);
    }
}

#[test]
fn test_left_plays_are_rotated() {
    let frames = vec![
        frame(Some(1), 1, FramePhase::BeforeSnap, PlayDirection::Left, 10.0, 5.0),
        frame(Some(1), 1, FramePhase::BeforeSnap, PlayDirection::Right, 10.0, 5.0),
    ];
    let normalized = normalize_play_direction(&frames);

    assert!((normalized[0].x - (FIELD_LENGTH - 10.0)).abs() < 1e-9);
    assert!((normalized[0].y - (FIELD_WIDTH - 5.0)).abs() < 1e-9);
    assert_eq!(normalized[1].x, 10.0);
    assert_eq!(normalized[1].y, 5.0);
}

#[test]
fn test_increasing_y_is_leftward_and_kept() {
    let frames = route(7, 20.0, 25.0, 10);
    let directions = classify_route_directions(&frames, 50);
    assert_eq!(
        directions.get(&RouteKey::new(1, 1, 7)),
        Some(&RouteDirection::Leftward)
    );

    let oriented = orient_routes(frames.clone(), 50);
    for (before, after) in frames.iter().zip(&oriented) {
        assert_eq!(after.frame.y, before.y);
        assert_eq!(after.route_direction, Some(RouteDirection::Leftward));
    }
}

#[test]
fn test_decreasing_y_is_rightward_and_mirrored() {
    let frames = route(7, 20.0, 15.0, 10);
    let oriented = orient_routes(frames.clone(), 50);

    for (before, after) in frames.iter().zip(&oriented) {
        assert_eq!(after.route_direction, Some(RouteDirection::Rightward));
        assert!((after.frame.y - (FIELD_WIDTH - before.y)).abs() < 1e-9);
    }
}

#[test]
fn test_unchanged_y_is_rightward() {
    let frames = route(7, 20.0, 20.0, 5);
    let directions = classify_route_directions(&frames, 50);
    assert_eq!(
        directions.get(&RouteKey::new(1, 1, 7)),
        Some(&RouteDirection::Rightward)
    );
}

#[test]
fn test_direction_ignores_frames_past_the_bound() {
    // Anchor is frame 3; route frame = frame_id - 4. Frames 5..=6 go up, the
    // rest come back down below the start.
    let mut frames = route(7, 20.0, 10.0, 10);
    for f in frames.iter_mut() {
        if f.frame_id == 5 || f.frame_id == 6 {
            f.y = 25.0;
        }
    }

    let bounded = classify_route_directions(&frames, 2);
    assert_eq!(
        bounded.get(&RouteKey::new(1, 1, 7)),
        Some(&RouteDirection::Leftward)
    );

    let unbounded = classify_route_directions(&frames, 50);
    assert_eq!(
        unbounded.get(&RouteKey::new(1, 1, 7)),
        Some(&RouteDirection::Rightward)
    );
}

#[test]
fn test_ball_and_unanchored_players_get_no_direction() {
    let mut frames = route(7, 20.0, 25.0, 5);
    frames.push(frame(None, 1, FramePhase::BeforeSnap, PlayDirection::Right, 30.0, 26.0));
    frames.push(frame(None, 6, FramePhase::AfterSnap, PlayDirection::Right, 28.0, 30.0));
    // Player 8 only appears after the snap
    frames.push(frame(Some(8), 6, FramePhase::AfterSnap, PlayDirection::Right, 28.0, 10.0));

    let directions = classify_route_directions(&frames, 50);
    assert_eq!(directions.len(), 1);

    let oriented = orient_routes(frames, 50);
    for o in oriented.iter().filter(|o| o.frame.player_id != Some(7)) {
        assert_eq!(o.route_direction, None);
    }
    // Unknown direction leaves coordinates untouched
    let ball = oriented
        .iter()
        .find(|o| o.frame.player_id.is_none() && o.frame.frame_id == 6)
        .unwrap();
    assert_eq!(ball.frame.y, 30.0);
}
