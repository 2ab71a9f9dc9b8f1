use common::config::ConfigError;
use thiserror::Error;

use crate::{registry::ClaimRejection, transcript::ManualTranscript};

#[derive(Error, Debug)]
pub enum PatchError {
    /// Malformed or missing operator input. Recoverable by asking again.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A document did not have the shape the engine walks.
    #[error("unexpected patch structure at `{path}`: expected {expected}")]
    StructuralMismatch { path: String, expected: &'static str },

    /// A required file is missing or a target file already exists.
    #[error("{0}")]
    Precondition(String),

    /// The provisioning tool failed. `transcript` holds the commands the
    /// operator has to run by hand to finish.
    #[error("{step} failed: {reason}")]
    ExternalTool {
        step: String,
        reason: String,
        transcript: ManualTranscript,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PatchError>;

impl PatchError {
    pub fn mismatch(path: impl Into<String>, expected: &'static str) -> Self {
        PatchError::StructuralMismatch {
            path: path.into(),
            expected,
        }
    }

    pub fn transcript(&self) -> Option<&ManualTranscript> {
        match self {
            PatchError::ExternalTool { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

impl From<ConfigError> for PatchError {
    fn from(err: ConfigError) -> Self {
        PatchError::InvalidInput(err.to_string())
    }
}

impl From<ClaimRejection> for PatchError {
    fn from(err: ClaimRejection) -> Self {
        PatchError::InvalidInput(err.to_string())
    }
}
