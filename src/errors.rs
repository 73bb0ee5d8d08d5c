//! Leader Election Error Hierarchy
//!
//! Errors are grouped by where they originate: the coordination backend
//! (driver), the election state machine, and configuration loading. None of
//! them ever crosses the notification boundary uncaught; the service funnels
//! them to [`crate::Contender::handle_error`].

use std::time::Duration;

use config::ConfigError;

use crate::LeaderInformation;
use crate::LeaderSessionId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Coordination backend failures (write, close, connectivity)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Election state machine failures and invariant violations
    #[error(transparent)]
    Election(#[from] ElectionError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures reported to the contender
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Durable write of the leader record failed
    #[error("Failed to write leader information: {0}")]
    WriteFailed(String),

    /// Durable write did not complete in time
    #[error("Leader information write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Driver was used after close()
    #[error("Election driver already closed")]
    Closed,

    /// Backend specific failure
    #[error("Coordination backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    /// start() invoked twice
    #[error("Election service for {resource} already started")]
    AlreadyStarted { resource: String },

    /// Operation on a closed service
    #[error("Election service for {resource} is closed")]
    Closed { resource: String },

    /// Stored leader record diverged from what this leader last wrote
    #[error("Leader information mismatch (expected: {expected:?}, observed: {observed:?})")]
    LeaderInformationMismatch {
        expected: Box<LeaderInformation>,
        observed: Box<LeaderInformation>,
    },

    /// Confirmation carried leader information minted for another session
    #[error("Session mismatch (confirmed: {confirmed}, carried: {carried:?})")]
    SessionMismatch {
        confirmed: LeaderSessionId,
        carried: Option<LeaderSessionId>,
    },
}

impl Error {
    /// Transient errors leave the election state untouched; callers may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Driver(DriverError::WriteFailed(_))
                | Error::Driver(DriverError::WriteTimeout(_))
                | Error::Driver(DriverError::Backend(_))
        )
    }
}
