//! Tests for route segment extraction

use presnap::normalize::orient_routes;
use presnap::routes::*;
use presnap::{FramePhase, PipelineConfig, PlayDirection, PlayerPlay, TrackingFrame};

fn frame(player: i64, frame_id: i64, phase: FramePhase, x: f64, y: f64) -> TrackingFrame {
    TrackingFrame {
        week: 1,
        game_id: 1,
        play_id: 1,
        player_id: Some(player),
        frame_id,
        frame_phase: phase,
        play_direction: PlayDirection::Right,
        x,
        y,
        orientation: Some(90.0),
        event: None,
    }
}

/// Anchor at frame 3 (x = 30, y = 20), snap at frame 4, then `after` frames
/// moving +1 yard in x and +0.5 in y per frame.
fn route(player: i64, after: i64) -> Vec<TrackingFrame> {
    let mut frames: Vec<TrackingFrame> = (1..=3)
        .map(|f| frame(player, f, FramePhase::BeforeSnap, 30.0, 20.0))
        .collect();
    frames.push(frame(player, 4, FramePhase::Snap, 30.0, 20.0));
    for i in 1..=after {
        frames.push(frame(
            player,
            4 + i,
            FramePhase::AfterSnap,
            30.0 + i as f64,
            20.0 + 0.5 * i as f64,
        ));
    }
    frames
}

fn runner(player: i64, targeted: bool) -> PlayerPlay {
    PlayerPlay {
        game_id: 1,
        play_id: 1,
        player_id: player,
        ran_route: true,
        was_targeted: targeted,
        route_ran: Some("SLANT".to_string()),
    }
}

#[test]
fn test_route_frames_are_bounded() {
    let config = PipelineConfig {
        max_route_frame: 5,
        ..Default::default()
    };
    let oriented = orient_routes(route(7, 20), 50);
    let (segments, stats) = extract_routes(&oriented, &[runner(7, false)], &config);

    assert_eq!(stats.segments, 1);
    let segment = &segments[0];
    assert!(segment.points.iter().all(|p| p.route_frame_id <= 5));
    // Route frames 1..=5 (the snap frame is never part of the route)
    assert_eq!(segment.len(), 5);
    assert_eq!(segment.points[0].route_frame_id, 1);
}

#[test]
fn test_offsets_are_relative_to_anchor() {
    let oriented = orient_routes(route(7, 6), 50);
    let (segments, _) = extract_routes(&oriented, &[runner(7, false)], &PipelineConfig::default());

    let first = &segments[0].points[0];
    assert!((first.relative_x - 1.0).abs() < 1e-9);
    assert!((first.relative_y - 0.5).abs() < 1e-9);
}

#[test]
fn test_points_keep_input_order() {
    // Anchor search is by frame id, so shuffled before-snap rows still find
    // frame 3; after-snap rows are taken as given.
    let mut frames = route(7, 4);
    frames.swap(0, 2);
    frames[4..].reverse();
    let oriented = orient_routes(frames, 50);
    let (segments, _) = extract_routes(&oriented, &[runner(7, false)], &PipelineConfig::default());

    let route_frames: Vec<i64> = segments[0].points.iter().map(|p| p.route_frame_id).collect();
    assert_eq!(route_frames, vec![4, 3, 2, 1]);
    assert!((segments[0].points[3].relative_x - 1.0).abs() < 1e-9);
}

#[test]
fn test_targeted_route_is_cut_at_reception() {
    let mut frames = route(7, 20);
    frames.extend(route(8, 20));
    for f in frames.iter_mut().filter(|f| f.frame_id == 12) {
        f.event = Some("pass_arrived".to_string());
    }

    let oriented = orient_routes(frames, 50);
    let (segments, _) = extract_routes(
        &oriented,
        &[runner(7, true), runner(8, false)],
        &PipelineConfig::default(),
    );

    let targeted = segments.iter().find(|s| s.key.player_id == 7).unwrap();
    let other = segments.iter().find(|s| s.key.player_id == 8).unwrap();

    // frame 12 -> route frame 8
    assert!(targeted.targeted);
    assert_eq!(targeted.points.last().unwrap().route_frame_id, 8);
    assert!(targeted.point_with_event("pass_arrived").is_some());
    assert_eq!(other.len(), 20);
}

#[test]
fn test_non_runners_are_ignored() {
    let mut frames = route(7, 5);
    frames.extend(route(9, 5));
    let blocker = PlayerPlay {
        ran_route: false,
        ..runner(9, false)
    };

    let kept = route_runner_frames(frames.clone(), &[runner(7, false), blocker.clone()]);
    assert!(kept.iter().all(|f| f.player_id == Some(7)));

    let oriented = orient_routes(frames, 50);
    let (segments, _) = extract_routes(
        &oriented,
        &[runner(7, false), blocker],
        &PipelineConfig::default(),
    );
    assert_eq!(segments.len(), 1);
}

#[test]
fn test_players_without_anchor_are_counted() {
    let frames: Vec<TrackingFrame> = route(7, 5)
        .into_iter()
        .filter(|f| f.frame_phase == FramePhase::AfterSnap)
        .collect();
    let oriented = orient_routes(frames, 50);
    let (segments, stats) = extract_routes(&oriented, &[runner(7, false)], &PipelineConfig::default());

    assert!(segments.is_empty());
    assert_eq!(stats.missing_anchor, 1);
    assert_eq!(stats.missing_direction, 0);
}

#[test]
fn test_segments_sorted_by_key() {
    let mut frames = route(9, 5);
    frames.extend(route(7, 5));
    frames.extend(route(8, 5));
    let oriented = orient_routes(frames, 50);
    let (segments, _) = extract_routes(
        &oriented,
        &[runner(7, false), runner(8, false), runner(9, false)],
        &PipelineConfig::default(),
    );
    let players: Vec<i64> = segments.iter().map(|s| s.key.player_id).collect();
    assert_eq!(players, vec![7, 8, 9]);
}
