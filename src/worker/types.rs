use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::stats::Stats;
use crate::tasks::{
    docker::ContainerRuntime,
    error::RuntimeError,
    types::{State, Task},
};

/// Runs tasks on one machine.
///
/// The intake queue and task database are independently locked so request
/// handlers can enqueue and list while the background loop is inside a
/// runtime call.
pub struct Worker {
    pub name: String,
    pub(crate) queue: Mutex<VecDeque<Task>>,
    pub(crate) db: RwLock<HashMap<Uuid, Task>>,
    pub(crate) stats: RwLock<Option<Stats>>,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invalid state transition from {from} to {to} for task {id}")]
    InvalidTransition { id: Uuid, from: State, to: State },

    #[error("task {id} cannot be driven to {state}")]
    UnsupportedTarget { id: Uuid, state: State },

    #[error("task {id} has no container")]
    NoContainer { id: Uuid },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl WorkerError {
    /// Errors that do not indicate a fault, such as stopping a container
    /// that is already gone.
    pub fn is_soft(&self) -> bool {
        matches!(self, WorkerError::Runtime(e) if e.is_not_found())
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
