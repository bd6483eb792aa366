use thiserror::Error;

use super::stage::Stage;

#[derive(Error, Debug)]
pub enum MasteringError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Analysis error: {0}")]
    Analysis(String),
    #[error("Stage '{stage}' failed: {message}")]
    StageExecution { stage: Stage, message: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasteringError {
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self::StageExecution {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MasteringError>;
