//! Error taxonomy for the automation core (spec §7).
//!
//! A single enum, grouped by the four recovery classes, with an explicit
//! [`AutomationError::class`] accessor so `scheduler::completion::apply_completion`
//! can match on class once and dispatch to the four documented recovery
//! paths, instead of treating every error as a uniform retry.

use thiserror::Error;

pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Error, Debug)]
pub enum AutomationError {
    // --- Transient: db/exchange failures, queue-full, recovered panics. Retried by the caller. ---
    #[error("database error: {0}")]
    Database(String),

    #[error("exchange api error: {0}")]
    ExchangeApi(String),

    #[error("queue full: {0}")]
    QueueFull(String),

    #[error("operation timed out")]
    Timeout,

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    // --- Validation: bad inputs, insufficient sample. Aborts this invocation, no immediate retry. ---
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient sample: {0}")]
    InsufficientSample(String),

    // --- Invariant violation: compensated internally, never surfaced as a handler failure. ---
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    // --- Fatal: shutdown, misconfiguration. Propagated to the caller of Start/Stop. ---
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("catalog misconfiguration: {0}")]
    CatalogMisconfigured(String),

    #[error("shutting down")]
    ShuttingDown,

    #[error("task not found: {0}")]
    TaskNotFound(String),
}

/// The four recovery classes from spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Validation,
    InvariantViolation,
    Fatal,
}

impl AutomationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AutomationError::Database(_)
            | AutomationError::ExchangeApi(_)
            | AutomationError::QueueFull(_)
            | AutomationError::Timeout
            | AutomationError::HandlerPanicked(_) => ErrorClass::Transient,

            AutomationError::Validation(_) | AutomationError::InsufficientSample(_) => {
                ErrorClass::Validation
            }

            AutomationError::InvariantViolation(_) | AutomationError::StateConflict(_) => {
                ErrorClass::InvariantViolation
            }

            AutomationError::AlreadyRunning
            | AutomationError::NotRunning
            | AutomationError::CatalogMisconfigured(_)
            | AutomationError::ShuttingDown
            | AutomationError::TaskNotFound(_) => ErrorClass::Fatal,
        }
    }
}
