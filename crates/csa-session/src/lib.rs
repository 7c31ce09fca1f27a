//! Session Store (spec §4.7): resumable per-agent execution sessions
//! tracking phase, timeout, and error count.

pub mod model;
pub mod store;

pub use model::{HistoryEntry, Session, SessionPhase};
pub use store::{FinalOutcome, SessionFilters, SessionStore};
