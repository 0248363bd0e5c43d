use thiserror::Error;

use crate::config::ConfigLoadError;
use crate::parameters::ParameterId;
use crate::parameters::ParameterKind;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error while loading config: {0}")]
    ConfigLoadError(#[from] ConfigLoadError),
    #[error("Error while driving the session: {0}")]
    SessionError(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Unknown parameter: {0}")]
    UnknownId(String),
    #[error("Parameter {id} expects a {expected} value")]
    TypeMismatch {
        id: ParameterId,
        expected: ParameterKind,
    },
    #[error("Parameter {0} cannot be NaN")]
    NotANumber(ParameterId),
    #[error("Parameter {0} has no option {1:?}")]
    UnknownOption(ParameterId, String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("The session task has stopped")]
    Closed,
    #[error("{0}")]
    Parameter(#[from] ParameterError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SessionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SessionError::Closed
    }
}
