//! Stack assembly error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while assembling or synthesizing a stack.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("resource already declared: {0}")]
    DuplicateResource(String),

    #[error("resource {resource} depends on undeclared {dependency}")]
    UnknownDependency { resource: String, dependency: String },

    #[error("output already declared: {0}")]
    DuplicateOutput(String),

    #[error("container asset directory not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("container asset directory {} has no Dockerfile", .0.display())]
    MissingDockerfile(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("asset walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("template serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Tier(#[from] sgtm_core::TierError),
}

pub type StackResult<T> = Result<T, StackError>;
