//! Error types surfaced by the scheduling core.

use crate::conflict::Conflict;
use crate::persistence::PersistenceError;
use thiserror::Error;

/// Errors produced by booking and activity operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A referenced classroom, subject, teacher, booking or activity does not exist.
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Malformed time slot, academic period, text field or a duplicate activity.
    #[error("{0}")]
    Validation(String),

    /// One or more overlapping resource claims and no override flag was set.
    #[error("schedule conflicts detected: {} conflicts found", .0.len())]
    Conflict(Vec<Conflict>),

    /// A bulk request with `stop_on_first_error` hit a failing item.
    #[error("bulk schedule creation failed at booking #{index}: {message}")]
    BulkAborted { index: usize, message: String },

    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

impl ScheduleError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ScheduleError::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScheduleError::Validation(message.into())
    }

    /// Conflicts carried by a [`ScheduleError::Conflict`], empty otherwise.
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            ScheduleError::Conflict(conflicts) => conflicts,
            _ => &[],
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
