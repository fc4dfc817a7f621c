use thiserror::Error;

/// Errors surfaced by the planning engine.
///
/// Only `UnknownBoatType`, `DataFormat`, `NoWindField`, `InvalidCourse` and
/// `Config` reach callers as hard failures. Missing wind coverage terminates a
/// leg instead of failing the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("unknown boat type: {0}")]
    UnknownBoatType(String),
    #[error("malformed polar table: {0}")]
    DataFormat(String),
    #[error("no wind field configured")]
    NoWindField,
    #[error("no wind coverage at ({lat:.6}, {lon:.6})")]
    NoWindCoverage { lat: f64, lon: f64 },
    #[error("a course needs at least 2 waypoints (got {waypoints})")]
    InvalidCourse { waypoints: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PlanningError>;
