//! Inference errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    /// Model bytes could not be turned into a runnable graph.
    #[error("cannot load model: {0}")]
    Load(String),

    /// Runtime session setup (execution providers, threads) failed.
    #[error("cannot configure session: {0}")]
    Session(String),

    /// Input tensor rejected before the run.
    #[error("invalid input tensor: {0}")]
    InvalidInput(String),

    #[error("model run failed: {0}")]
    Run(String),

    /// Output had an element type or shape the caller cannot read.
    #[error("unreadable output: {0}")]
    Output(String),

    /// The model does not declare an input or output the caller needs.
    #[error("model is missing {0}")]
    MissingTensor(String),

    #[error("cannot read model file: {0}")]
    Io(#[from] std::io::Error),
}
