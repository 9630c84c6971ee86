//! Error types for the planning core.

use thiserror::Error;

/// Planning-core error type.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("controller unreachable: {0}")]
    ControllerUnreachable(String),

    #[error("map load failed: {0}")]
    MapLoad(String),

    #[error("planner start timed out waiting for cancellation to finish")]
    StartTimeout,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plan error: {0}")]
    Plan(#[from] nauka_plan::PlanError),
}

impl From<std::io::Error> for NavError {
    fn from(e: std::io::Error) -> Self {
        NavError::MapLoad(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
