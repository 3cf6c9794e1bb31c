//! Tests for the isolation forest outlier gate

use presnap::outliers::*;
use presnap::{PipelineError, RouteDescriptor};

/// Deterministic grid of 2-D samples in [0, 1)².
fn grid(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            let x = (i % 10) as f64 / 10.0;
            let y = (i / 10) as f64 / (n / 10).max(1) as f64;
            vec![x, y]
        })
        .collect()
}

fn descriptor(player: i64, value: f64) -> RouteDescriptor {
    RouteDescriptor {
        week: 1,
        game_id: 1,
        play_id: 1,
        player_id: player,
        x_median: value,
        x_std: value,
        x_20: value,
        x_50: value,
        x_80: value,
        y_median: value,
        y_std: value,
        y_20: value,
        y_50: value,
        y_80: value,
        coef_a: value,
        coef_b: value,
        coef_c: value,
    }
}

#[test]
fn test_far_point_is_outlier() {
    let mut samples = grid(100);
    // Dense core around the centre
    samples.extend(std::iter::repeat_n(vec![0.5, 0.5], 30));
    samples.push(vec![25.0, -25.0]);
    let forest = IsolationForest::fit(&samples, &OutlierConfig::default()).unwrap();

    let far = forest.score(&[25.0, -25.0]).unwrap();
    let centre = forest.score(&[0.5, 0.5]).unwrap();
    assert!(far > centre);
    assert_eq!(forest.predict(&[25.0, -25.0]).unwrap(), Verdict::Outlier);
    assert_eq!(forest.predict(&[0.5, 0.5]).unwrap(), Verdict::Inlier);
}

#[test]
fn test_same_seed_same_scores() {
    let samples = grid(80);
    let config = OutlierConfig::default();
    let a = IsolationForest::fit(&samples, &config).unwrap();
    let b = IsolationForest::fit(&samples, &config).unwrap();
    for sample in &samples {
        assert_eq!(a.score(sample).unwrap(), b.score(sample).unwrap());
    }
}

#[test]
fn test_fraction_contamination_flags_that_share() {
    let samples = grid(200);
    let config = OutlierConfig {
        contamination: Contamination::Fraction(0.1),
        ..Default::default()
    };
    let forest = IsolationForest::fit(&samples, &config).unwrap();

    let outliers = samples
        .iter()
        .filter(|s| forest.predict(s).unwrap() == Verdict::Outlier)
        .count();
    // Ties at the threshold may shift the count slightly
    assert!((15..=25).contains(&outliers), "outliers = {}", outliers);
}

#[test]
fn test_width_mismatch_is_rejected() {
    let forest = IsolationForest::fit(&grid(20), &OutlierConfig::default()).unwrap();
    assert!(matches!(
        forest.score(&[1.0, 2.0, 3.0]),
        Err(PipelineError::FeatureMismatch {
            expected: 2,
            got: 3
        })
    ));

    let ragged = vec![vec![1.0, 2.0], vec![1.0]];
    assert!(matches!(
        IsolationForest::fit(&ragged, &OutlierConfig::default()),
        Err(PipelineError::FeatureMismatch { .. })
    ));
}

#[test]
fn test_too_few_samples() {
    let one = vec![vec![1.0, 2.0]];
    assert!(matches!(
        IsolationForest::fit(&one, &OutlierConfig::default()),
        Err(PipelineError::InsufficientSamples { count: 1, .. })
    ));
}

#[test]
fn test_serde_roundtrip_keeps_scores() {
    let samples = grid(50);
    let forest = IsolationForest::fit(&samples, &OutlierConfig::default()).unwrap();
    let json = serde_json::to_string(&forest).unwrap();
    let restored: IsolationForest = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, forest);
    assert_eq!(
        restored.score(&[0.3, 0.3]).unwrap(),
        forest.score(&[0.3, 0.3]).unwrap()
    );
}

#[test]
fn test_remove_outliers_drops_extreme_descriptor() {
    let mut reference: Vec<RouteDescriptor> = (0..60)
        .map(|i| descriptor(i, (i % 6) as f64 * 0.1))
        .collect();
    reference.push(descriptor(999, 500.0));
    let forest = train_outlier_filter(&reference, &OutlierConfig::default()).unwrap();

    let report = remove_outliers(reference, &forest).unwrap();

    assert!(report.inliers.iter().all(|d| d.player_id != 999));
    assert_eq!(report.retained + report.discarded, 61);
    assert_eq!(report.retained, report.inliers.len());
}
