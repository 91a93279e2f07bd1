//! Planner error types.

/// Errors the planner surfaces to its caller. `RouterNoPath` is
/// deliberately absent: a `NoPath` result from the router is absorbed into
/// a retraction request, never raised as an error.
/// `EmptyEmit` is likewise absent as an error value: `emit` on an empty
/// queue returns `Ok(())` having emitted nothing.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config conflict: {0}")]
    ConfigConflict(String),

    #[error("seal violation: {0}")]
    SealViolation(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
