use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("io error walking {path}: {source}")]
    Walk { path: PathBuf, source: std::io::Error },

    #[error("invalid marker pattern: {0}")]
    Pattern(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob { pattern: String, source: glob::PatternError },
}
