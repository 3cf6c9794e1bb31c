//! Tests for cluster summaries

use presnap::summary::*;
use presnap::{
    ClusterId, ClusteredRoute, PipelineConfig, PipelineError, PlayKey, PlayerPlay,
    RouteDescriptor, RouteDirection, RouteKey, RoutePoint, RouteSegment, RouteShape,
};

fn descriptor(play: i64, player: i64, value: f64) -> RouteDescriptor {
    RouteDescriptor {
        week: 1,
        game_id: 1,
        play_id: play,
        player_id: player,
        x_median: value,
        x_std: 1.0,
        x_20: value * 0.2,
        x_50: value * 0.5,
        x_80: value * 0.8,
        y_median: 2.0,
        y_std: 0.5,
        y_20: 0.4,
        y_50: 1.0,
        y_80: 1.6,
        coef_a: 0.0,
        coef_b: 0.2,
        coef_c: 0.0,
    }
}

fn clustered(play: i64, player: i64, cluster: usize, value: f64) -> ClusteredRoute {
    ClusteredRoute {
        descriptor: descriptor(play, player, value),
        cluster: ClusterId(cluster),
    }
}

fn participant(play: i64, player: i64, ran_route: bool, label: Option<&str>) -> PlayerPlay {
    PlayerPlay {
        game_id: 1,
        play_id: play,
        player_id: player,
        ran_route,
        was_targeted: false,
        route_ran: label.map(str::to_string),
    }
}

/// Targeted segment caught at (x, y) on route frame `frame`.
fn caught(play: i64, player: i64, x: f64, y: f64, frame: i64) -> RouteSegment {
    let mut points: Vec<RoutePoint> = (0..frame)
        .map(|f| RoutePoint {
            frame_id: 20 + f,
            route_frame_id: f,
            relative_x: x * f as f64 / frame as f64,
            relative_y: y * f as f64 / frame as f64,
            event: None,
        })
        .collect();
    points.push(RoutePoint {
        frame_id: 20 + frame,
        route_frame_id: frame,
        relative_x: x,
        relative_y: y,
        event: Some("pass_arrived".to_string()),
    });
    RouteSegment {
        week: 1,
        key: RouteKey::new(1, play, player),
        direction: RouteDirection::Leftward,
        targeted: true,
        points,
    }
}

#[test]
fn test_mode_tie_goes_to_first_label() {
    let routes = vec![
        clustered(1, 1, 0, 5.0),
        clustered(1, 2, 0, 5.0),
        clustered(1, 3, 0, 5.0),
        clustered(1, 4, 0, 5.0),
        clustered(1, 5, 1, 9.0),
    ];
    let participation = vec![
        participant(1, 1, true, Some("SLANT")),
        participant(1, 2, true, Some("GO")),
        participant(1, 3, true, Some("GO")),
        participant(1, 4, true, Some("CROSS")),
        participant(1, 5, true, Some("out")),
    ];

    let shapes = dominant_route_shapes(&participation, &routes).unwrap();
    // SLANT and CROSS are distinct labels; GO has two votes
    assert_eq!(shapes[0].route_mode, RouteShape::Straight);
    assert_eq!(shapes[1].route_mode, RouteShape::Angle90);

    let tied = vec![
        participant(1, 1, true, Some("SLANT")),
        participant(1, 2, true, Some("GO")),
        participant(1, 3, true, Some("GO")),
        participant(1, 4, true, Some("SLANT")),
        participant(1, 5, true, None),
    ];
    let shapes = dominant_route_shapes(&tied, &routes).unwrap();
    assert_eq!(shapes.len(), 1);
    assert_eq!(shapes[0].cluster, ClusterId(0));
    assert_eq!(shapes[0].route_mode, RouteShape::Early45Angle);
}

#[test]
fn test_unknown_label_is_an_error() {
    let routes = vec![clustered(1, 1, 0, 5.0)];
    let participation = vec![participant(1, 1, true, Some("BANANA"))];
    assert!(matches!(
        dominant_route_shapes(&participation, &routes),
        Err(PipelineError::UnknownRoute(label)) if label == "BANANA"
    ));
}

#[test]
fn test_unobserved_cluster_gets_imputed_zone() {
    let config = PipelineConfig::default();

    let mut routes = Vec::new();
    let mut segments = Vec::new();
    for i in 0..50 {
        routes.push(clustered(i, 1, 0, 8.0 + (i % 7) as f64));
        segments.push(caught(
            i,
            1,
            10.0 + (i % 5) as f64,
            2.0 + (i % 3) as f64,
            20 + i % 4,
        ));
    }
    for i in 50..60 {
        routes.push(clustered(i, 2, 1, 1.0 + (i % 3) as f64));
    }

    let observed = reception_zones(&segments, &routes, &config);
    assert_eq!(observed.len(), 1);
    let zone = &observed[0];
    assert_eq!(zone.cluster, ClusterId(0));
    assert_eq!(zone.observations, 50);
    assert_eq!(zone.relative_x_min, 10.0);
    assert_eq!(zone.relative_x_max, 14.0);
    assert!((zone.relative_x_mean - 12.0).abs() < 1e-9);

    let zones = impute_missing_zones(&routes, observed.clone(), &config).unwrap();
    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0], observed[0]);

    let imputed = &zones[1];
    assert_eq!(imputed.cluster, ClusterId(1));
    assert_eq!(imputed.observations, 0);
    // One observed cluster: every prediction collapses to its means
    assert!((imputed.relative_x_mean - zone.relative_x_mean).abs() < 1e-6);
    assert!((imputed.relative_y_mean - zone.relative_y_mean).abs() < 1e-6);
    assert!((imputed.relative_x_min - (imputed.relative_x_mean - 3.0)).abs() < 1e-9);
    assert!((imputed.relative_x_max - (imputed.relative_x_mean + 3.0)).abs() < 1e-9);
    assert!((imputed.relative_y_min - (imputed.relative_y_mean - 3.0)).abs() < 1e-9);
    assert!((imputed.route_time_mean - imputed.route_frame_mean * 0.1).abs() < 1e-9);
}

#[test]
fn test_untargeted_segments_do_not_make_zones() {
    let routes = vec![clustered(1, 1, 0, 5.0)];
    let mut segment = caught(1, 1, 5.0, 1.0, 10);
    segment.targeted = false;
    assert!(reception_zones(&[segment], &routes, &PipelineConfig::default()).is_empty());
}

#[test]
fn test_imputation_without_observations_fails() {
    let routes = vec![clustered(1, 1, 0, 5.0)];
    assert!(matches!(
        impute_missing_zones(&routes, Vec::new(), &PipelineConfig::default()),
        Err(PipelineError::InsufficientSamples { .. })
    ));
    // Nothing missing, nothing to impute
    assert!(
        impute_missing_zones(&[], Vec::new(), &PipelineConfig::default())
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_play_with_unclustered_runner_is_incomplete() {
    let participation = vec![
        participant(1, 7, true, Some("GO")),
        participant(1, 8, true, Some("GO")),
        participant(1, 9, true, Some("GO")),
        participant(2, 7, true, Some("GO")),
        participant(2, 5, false, None),
        participant(3, 5, false, None),
    ];
    let routes = vec![
        clustered(1, 7, 0, 5.0),
        clustered(1, 8, 0, 5.0),
        clustered(2, 7, 0, 5.0),
    ];

    let complete = complete_plays(&participation, &routes);
    assert_eq!(complete, vec![PlayKey::new(1, 2)]);
}
