//! Session REST collaborator.
//!
//! The streaming core only needs session info and final metrics; creation
//! and deletion are provided for callers that manage the whole session.

pub mod client;
pub mod types;

pub use client::{HttpSessionApi, SessionApi};
pub use types::{CreatedSession, DEFAULT_HEIGHT_CM, ExerciseKind, FinalMetrics, SessionInfo};
