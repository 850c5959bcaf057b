//! The automation core (spec §1-§9): a time-driven task scheduler, six
//! domain sub-schedulers, and a parallel realtime execution engine.
//!
//! `qcat-cli` (or any other binary) wires concrete collaborators —
//! database, metrics sink, exchange client — and calls [`bootstrap::default_tasks`]
//! to populate an [`scheduler::AutomationScheduler`] with the fixed
//! catalog before calling `start`.

pub mod audit;
pub mod bootstrap;
pub mod db;
pub mod decision;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod health;
pub mod scheduler;
pub mod task;

pub use error::{AutomationError, AutomationResult};
