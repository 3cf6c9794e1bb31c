//! End-to-end tests for the clustering pipeline on synthetic data

use std::collections::HashSet;

use presnap::pipeline::*;
use presnap::synthetic::SyntheticScenario;
use presnap::{ClusterId, PipelineConfig, PipelineError, assembly, io};

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("presnap-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_small_scenario_end_to_end() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();
    let run = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();

    assert!(run.models.clusterer.n_clusters() > 1);
    assert!(!run.tables.assignments.is_empty());
    assert!(!run.complete_plays.is_empty());
    assert!(run.stats.segments >= run.tables.assignments.len());

    // Both weeks are clustered, not only the reference week
    let weeks: HashSet<u8> = run.tables.assignments.iter().map(|a| a.week).collect();
    assert!(weeks.contains(&1) && weeks.contains(&2));

    // Every cluster in use has exactly one shape and one zone
    let used: HashSet<ClusterId> = run.tables.assignments.iter().map(|a| a.cluster).collect();
    let shaped: HashSet<ClusterId> = run.tables.route_shapes.iter().map(|s| s.cluster).collect();
    let zoned: HashSet<ClusterId> = run.tables.reception_zones.iter().map(|z| z.cluster).collect();
    assert_eq!(used, shaped);
    assert_eq!(used, zoned);
    assert_eq!(run.tables.reception_zones.len(), used.len());
    assert!(run.tables.reception_zones.iter().any(|z| z.observations > 0));

    // Complete plays only contain route-runners with a cluster
    let assigned: HashSet<_> = run.tables.assignments.iter().map(|a| a.key()).collect();
    for runner in dataset.player_plays.iter().filter(|p| p.ran_route) {
        if run.complete_plays.contains(&runner.route_key().play()) {
            assert!(assigned.contains(&runner.route_key()));
        }
    }
}

#[test]
fn test_runs_are_deterministic() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();
    let a = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();
    let b = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();

    assert_eq!(a.tables, b.tables);
    assert_eq!(a.complete_plays, b.complete_plays);
}

#[test]
fn test_frozen_models_reproduce_tables() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();
    let run = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();

    let dir = temp_dir("models");
    let path = dir.join(io::MODELS_FILE);
    io::save_models(&path, &run.models).unwrap();
    let models = io::load_models(&path).unwrap();

    let (tables, complete) =
        run_with_models(&dataset.tracking, &dataset.player_plays, &models, &config).unwrap();
    assert_eq!(tables.assignments, run.tables.assignments);
    assert_eq!(tables.route_shapes, run.tables.route_shapes);
    assert_eq!(tables.reception_zones.len(), run.tables.reception_zones.len());
    assert_eq!(complete, run.complete_plays);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_models_apply_to_unseen_week() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();

    let prepared = prepare_routes(&dataset.tracking, &dataset.player_plays, &config);
    let models = train_models(&prepared.descriptors, &config).unwrap();

    let week_two: Vec<_> = dataset
        .tracking
        .iter()
        .filter(|f| f.week == 2)
        .cloned()
        .collect();
    let (tables, _) =
        run_with_models(&week_two, &dataset.player_plays, &models, &config).unwrap();

    assert!(!tables.assignments.is_empty());
    assert!(tables.assignments.iter().all(|a| a.week == 2));
    assert!(
        tables
            .assignments
            .iter()
            .all(|a| a.cluster.0 < models.clusterer.n_clusters())
    );
}

#[test]
fn test_missing_reference_week_fails() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig {
        reference_week: 3,
        ..Default::default()
    };
    assert!(matches!(
        run_clustering(&dataset.tracking, &dataset.player_plays, &config),
        Err(PipelineError::InsufficientSamples {
            stage: "reference week",
            ..
        })
    ));
}

#[test]
fn test_invalid_config_fails_before_work() {
    let dataset = SyntheticScenario::small().generate();
    let mut config = PipelineConfig::default();
    config.clustering.damping = 1.5;
    assert!(matches!(
        run_clustering(&dataset.tracking, &dataset.player_plays, &config),
        Err(PipelineError::InvalidParameter { .. })
    ));
}

#[test]
fn test_features_and_targets_from_run() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();
    let run = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();

    let rows = assembly::assemble_play_features(
        &run.complete_plays,
        &dataset.plays,
        &dataset.players,
        &run.tables,
        &dataset.tracking,
        &config,
    );
    assert!(!rows.is_empty());
    for row in &rows {
        assert!(run.complete_plays.contains(&row.key().play()));
        assert!((0.0..=120.0).contains(&row.x_recep_zone));
        assert!((0.0..=53.3).contains(&row.y_recep_zone));
        assert!((0.0..360.0).contains(&row.dir_recep_zone));
        assert!(row.nb_routes >= 1);
    }

    let targets = assembly::orpsp_targets(&run.complete_plays, &dataset.plays, &dataset.player_plays);
    assert!(!targets.is_empty());
    assert!(targets.iter().all(|t| t.orpsp_target <= 1));
}

#[test]
fn test_feature_table_keeps_plays_whole() {
    let dataset = SyntheticScenario::small().generate();
    let config = PipelineConfig::default();
    let run = run_clustering(&dataset.tracking, &dataset.player_plays, &config).unwrap();

    let runners_of = |play| {
        dataset
            .player_plays
            .iter()
            .filter(|p| p.ran_route && p.route_key().play() == play)
            .count()
    };

    // Forget one route-runner of the first complete play
    let first = run.complete_plays[0];
    let missing = dataset
        .player_plays
        .iter()
        .find(|p| p.ran_route && p.route_key().play() == first)
        .unwrap()
        .player_id;
    let players: Vec<_> = dataset
        .players
        .iter()
        .filter(|p| p.player_id != missing)
        .cloned()
        .collect();

    let rows = assembly::assemble_play_features(
        &run.complete_plays,
        &dataset.plays,
        &players,
        &run.tables,
        &dataset.tracking,
        &config,
    );
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.key().play() != first));

    // Every play left has each of its route-runners exactly once
    let mut per_play: std::collections::HashMap<_, usize> = Default::default();
    for row in &rows {
        *per_play.entry(row.key().play()).or_default() += 1;
    }
    for (play, count) in &per_play {
        assert_eq!(*count, runners_of(*play));
    }
    for row in &rows {
        assert_eq!(row.nb_routes, per_play[&row.key().play()]);
    }
}
