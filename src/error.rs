use crate::scheduler::Job;

/// Reasons a computation request is refused before any task is created.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("No pieces to fit were supplied")]
    NoTiles,

    #[error("No stock panels were supplied")]
    NoStockTiles,

    #[error("Task '{0}' is already running")]
    TaskAlreadyRunning(String),
}

impl RequestError {
    /// Stable numeric code reported to transports.
    pub fn code(&self) -> u32 {
        match self {
            RequestError::NoTiles => 1,
            RequestError::NoStockTiles => 2,
            RequestError::TaskAlreadyRunning(_) => 3,
        }
    }
}

/// Work unit submission failures. A rejected job is handed back so the
/// caller can retry it.
#[derive(thiserror::Error)]
pub enum ScheduleError {
    #[error("Work queue is full")]
    QueueFull(Job),

    #[error("Worker pool has shut down")]
    ShutDown(Job),
}

impl ScheduleError {
    pub fn into_job(self) -> Job {
        match self {
            ScheduleError::QueueFull(job) | ScheduleError::ShutDown(job) => job,
        }
    }
}

impl std::fmt::Debug for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::QueueFull(_) => write!(f, "QueueFull(..)"),
            ScheduleError::ShutDown(_) => write!(f, "ShutDown(..)"),
        }
    }
}
