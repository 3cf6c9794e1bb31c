//! Unified error handling for the pipeline.
//!
//! Only configuration problems and unusable inputs surface as errors.
//! Data gaps (players without a pre-snap anchor, unclustered route-runners,
//! degenerate trajectory fits) shrink the population instead and are logged
//! by the stage that drops them.

use thiserror::Error;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A tunable parameter is outside its accepted range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Requested more tracking weeks than the dataset provides.
    #[error("weeks should be between 1 and {available}, got {requested}")]
    InvalidWeekRange { requested: u8, available: u8 },

    /// A route label with no route-shape category.
    #[error("unknown route label: {0}")]
    UnknownRoute(String),

    /// A stage received too few rows to fit or apply a model.
    #[error("{stage} needs at least {minimum_required} samples, got {count}")]
    InsufficientSamples {
        stage: &'static str,
        count: usize,
        minimum_required: usize,
    },

    /// Affinity propagation finished without electing any exemplar.
    #[error("affinity propagation found no exemplars after {iterations} iterations")]
    NoExemplars { iterations: usize },

    /// A sample's width differs from the width the model was fit on.
    #[error("expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Conversion helpers from `Option` to pipeline errors.
pub trait OptionExt<T> {
    /// Map `None` to [`PipelineError::InsufficientSamples`].
    fn ok_or_insufficient_samples(
        self,
        stage: &'static str,
        count: usize,
        minimum_required: usize,
    ) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_samples(
        self,
        stage: &'static str,
        count: usize,
        minimum_required: usize,
    ) -> Result<T> {
        self.ok_or(PipelineError::InsufficientSamples {
            stage,
            count,
            minimum_required,
        })
    }
}

/// Reject a parameter that fails `ok`.
pub(crate) fn ensure(ok: bool, name: &'static str, reason: impl Into<String>) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(PipelineError::InvalidParameter {
            name,
            reason: reason.into(),
        })
    }
}
