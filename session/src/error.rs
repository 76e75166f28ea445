//! Session error taxonomy.

use canvas::graph::GraphError;
use gates::GateError;

use crate::api::ApiError;

/// Errors produced by gate session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An operation needs a loaded gate tree and none is loaded yet.
    #[error("no gate tree loaded")]
    NotLoaded,

    /// Launch parameters or settings could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The remote service call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A gate tree operation failed, including rejected transform edits.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The editor could not build the current gate's shape.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl SessionError {
    /// Validation messages when this error is a rejected transform edit.
    #[must_use]
    pub fn rejected_messages(&self) -> Option<&[String]> {
        match self {
            Self::Gate(GateError::InvalidTransform(messages)) => Some(messages),
            _ => None,
        }
    }
}
