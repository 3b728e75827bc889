use ndarray::{Array, Ix4};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("ONNX runtime error: {0}")]
    Runtime(#[from] ort::Error),
    #[error("Session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("Model returned an empty output tensor")]
    EmptyOutput,
}

/// A loaded binary classifier. Implementations are immutable once built and
/// are shared across requests.
pub trait ModelService: Send + Sync + 'static {
    /// Runs one inference on a `(1, 256, 256, 3)` batch and returns the score
    /// of its only element.
    fn predict(&self, input: Array<f32, Ix4>) -> Result<f32, ModelError>;
}
