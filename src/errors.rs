use thiserror::Error;

use crate::propagator::GravityModel;

pub type Result<T> = std::result::Result<T, TleError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TleError {

    #[error("malformed TLE record: {0}")]
    MalformedRecord(String),

    #[error("invalid time input: {0}")]
    InvalidTimeInput(String),

    #[error("propagation failed: {0}")]
    PropagationFailed(String),

    #[error("propagator was initialized with {initialized:?}, cannot propagate with {requested:?} (reset it first)")]
    GravityModelMismatch { initialized: GravityModel, requested: GravityModel },

    #[error("unknown gravity model {0}")]
    UnknownGravityModel(String),
}

macro_rules! malformed {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::TleError::MalformedRecord( format!( $fmt $(, $arg)* ))
    };
}
pub(crate) use malformed;

macro_rules! propagation_failed {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::TleError::PropagationFailed( format!( $fmt $(, $arg)* ))
    };
}
pub(crate) use propagation_failed;
