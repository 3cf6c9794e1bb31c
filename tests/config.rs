//! Tests for pipeline configuration

use presnap::{Contamination, PipelineConfig, PipelineError};

#[test]
fn test_defaults() {
    let config = PipelineConfig::default();
    assert_eq!(config.max_route_frame, 50);
    assert_eq!(config.direction_max_route_frame, 50);
    assert_eq!(config.reference_week, 1);
    assert_eq!(config.reception_event, "pass_arrived");
    assert_eq!(config.outliers.n_estimators, 100);
    assert_eq!(config.outliers.contamination, Contamination::Auto);
    assert_eq!(config.clustering.damping, 0.9);
    assert_eq!(config.clustering.preference, -50.0);
    assert_eq!(config.zones.spread_threshold, 1.0);
    assert_eq!(config.zones.default_half_width, 3.0);
    assert_eq!(config.imputer.holdout_fraction, 0.3);
    assert!(config.validate().is_ok());
}

fn rejected(config: &PipelineConfig) -> &'static str {
    match config.validate() {
        Err(PipelineError::InvalidParameter { name, .. }) => name,
        other => panic!("expected InvalidParameter, got {:?}", other),
    }
}

#[test]
fn test_validate_rejects_out_of_range() {
    let mut config = PipelineConfig::default();
    config.clustering.damping = 1.0;
    assert_eq!(rejected(&config), "clustering.damping");

    let mut config = PipelineConfig::default();
    config.outliers.contamination = Contamination::Fraction(0.6);
    assert_eq!(rejected(&config), "outliers.contamination");

    let mut config = PipelineConfig::default();
    config.imputer.holdout_fraction = 1.0;
    assert_eq!(rejected(&config), "imputer.holdout_fraction");

    let mut config = PipelineConfig::default();
    config.max_route_frame = -1;
    assert_eq!(rejected(&config), "max_route_frame");

    let mut config = PipelineConfig::default();
    config.seconds_per_frame = 0.0;
    assert_eq!(rejected(&config), "seconds_per_frame");

    let mut config = PipelineConfig::default();
    config.reference_week = 10;
    assert_eq!(rejected(&config), "reference_week");
}

#[test]
fn test_partial_json_takes_defaults() {
    let json = r#"{
        "max_route_frame": 30,
        "outliers": { "contamination": { "fraction": 0.1 } },
        "zones": { "spread_threshold": 3.0 }
    }"#;
    let config: PipelineConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.max_route_frame, 30);
    assert_eq!(config.outliers.contamination, Contamination::Fraction(0.1));
    assert_eq!(config.outliers.n_estimators, 100);
    assert_eq!(config.zones.spread_threshold, 3.0);
    assert_eq!(config.zones.default_half_width, 3.0);
    assert_eq!(config.clustering, Default::default());
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("presnap-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "reference_week": 2 }"#).unwrap();
    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.reference_week, 2);

    std::fs::write(&path, r#"{ "clustering": { "damping": 0.2 } }"#).unwrap();
    assert!(matches!(
        PipelineConfig::load(&path),
        Err(PipelineError::InvalidParameter { .. })
    ));
    std::fs::remove_file(&path).unwrap();
}
