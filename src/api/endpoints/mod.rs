//! API endpoint handlers.
//!
//! Handlers decode and bound-check the payload, run image work on the
//! blocking pool, and hand classification to the orchestrator.

pub mod analyze;
pub mod compress;
pub mod detect;
pub mod health;
