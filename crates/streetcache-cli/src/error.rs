//! Error type for the command-line front end.

use streetcache::StreetError;

/// Errors raised while parsing input lines or driving the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing API key: pass --api-key or set {0}")]
    MissingApiKey(&'static str),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] StreetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CliResult<T> = Result<T, CliError>;
