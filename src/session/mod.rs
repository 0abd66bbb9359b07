//! Session composition.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] with validation |
//! | `controller` | [`SessionController`] start/stop and live state |
//! | `options` | [`SessionOptions`] frame, cadence and liveness tuning |

// ============================================================================
// Submodules
// ============================================================================

pub mod builder;
pub mod controller;
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use controller::SessionController;
pub use options::SessionOptions;
