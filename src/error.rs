//! Error types for the progression engine

use thiserror::Error;

use crate::tables::AssignmentStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("User not found: {0}")]
    UserNotFound(u64),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(u64),

    #[error("Mission not found: {0}")]
    MissionNotFound(u64),

    #[error("Assignment {id} is {status:?}, only pending assignments can be completed")]
    NotPending { id: u64, status: AssignmentStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
