use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("no workers are available to handle tasks")]
    NoWorkersAvailable,

    #[error("no worker has capacity for task {0}")]
    NoCapacity(Uuid),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
