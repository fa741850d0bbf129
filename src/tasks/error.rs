use thiserror::Error;

use super::types::Action;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to connect to docker: {0}")]
    Connect(#[source] bollard::errors::Error),

    /// The container to stop no longer exists.
    #[error("container {0} not found")]
    NotFound(String),

    #[error("{action} failed for {target}: {source}")]
    Docker {
        action: Action,
        target: String,
        #[source]
        source: bollard::errors::Error,
    },
}

impl RuntimeError {
    pub fn docker(action: Action, target: &str, source: bollard::errors::Error) -> Self {
        RuntimeError::Docker {
            action,
            target: target.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }

    /// Step that failed, if the error came from a runtime call.
    pub fn action(&self) -> Option<Action> {
        match self {
            RuntimeError::Docker { action, .. } => Some(*action),
            RuntimeError::NotFound(_) => Some(Action::Inspect),
            RuntimeError::Connect(_) => None,
        }
    }
}
