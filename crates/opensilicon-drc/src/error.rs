use thiserror::Error;

use crate::rule::ConstraintType;

#[derive(Error, Debug)]
pub enum DrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{file}: rule file version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        file: String,
        found: u32,
        supported: u32,
    },

    #[error("Rule '{rule}' ({constraint}): {message}")]
    Compile {
        rule: String,
        constraint: ConstraintType,
        message: String,
    },

    #[error("Duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("Rules have not been compiled")]
    RulesNotCompiled,

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
