use std::path::PathBuf;
use std::result;

use thiserror::Error;

use crate::executor::job::JobHandle;

#[derive(Error, Debug)]
pub enum GalopError {
    #[error("job name '{0}' is already registered in this run")]
    DuplicateName(String),

    #[error("job '{job}' depends on {dependency}, which is not registered in this run")]
    DanglingDependency { job: String, dependency: JobHandle },

    #[error("job '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("job name '{0}' cannot be used as a script file name")]
    InvalidName(String),

    #[error("could not write submission script {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("submission of {script} failed: {reason}")]
    Submission { script: PathBuf, reason: String },

    #[error("no job identifier in {format} submit output: {output:?}")]
    UnparsableOutput { format: String, output: String },

    #[error("status query for job {id} failed: {reason}")]
    Query { id: String, reason: String },

    #[error("could not read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("{0}")]
    InvalidOption(String),

    #[error("{0} job(s) failed or were skipped")]
    JobsFailed(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GalopError {
    /// Only a rejected submit command is retried. Unparsable output may
    /// belong to a job the scheduler already accepted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GalopError::Submission { .. })
    }
}

pub type Result<T> = result::Result<T, GalopError>;
