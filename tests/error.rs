//! Tests for error module

use presnap::error::{OptionExt, PipelineError};

#[test]
fn test_error_display() {
    let err = PipelineError::InsufficientSamples {
        stage: "outlier filter",
        count: 1,
        minimum_required: 2,
    };
    assert!(err.to_string().contains("outlier filter"));
    assert!(err.to_string().contains("got 1"));
}

#[test]
fn test_week_range_message() {
    let err = PipelineError::InvalidWeekRange {
        requested: 12,
        available: 9,
    };
    assert_eq!(err.to_string(), "weeks should be between 1 and 9, got 12");
}

#[test]
fn test_option_ext() {
    let none: Option<i32> = None;
    let result = none.ok_or_insufficient_samples("test", 0, 2);
    assert!(matches!(
        result,
        Err(PipelineError::InsufficientSamples {
            minimum_required: 2,
            ..
        })
    ));

    let some = Some(5).ok_or_insufficient_samples("test", 1, 1);
    assert_eq!(some.unwrap(), 5);
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: PipelineError = io.into();
    assert!(matches!(err, PipelineError::Io(_)));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_json_error_conversion() {
    let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: PipelineError = parse.into();
    assert!(matches!(err, PipelineError::Json(_)));
}
