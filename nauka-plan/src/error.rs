//! Error types for the plan model.

use thiserror::Error;

/// Plan-domain error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("requested time {time} outside plan bounds [{start}, {end}]")]
    OutOfRange { time: f64, start: f64, end: f64 },

    #[error("cannot access empty plan")]
    EmptyPlan,

    #[error("no Dubins path exists for the given configuration")]
    NoPath,

    #[error("unknown Dubins path type {0} in wire message")]
    UnknownPathType(u8),
}

pub type Result<T> = std::result::Result<T, PlanError>;
