//! # Read Master Core
//!
//! Core types shared by the Read Master cache crates: the unified error type,
//! result aliases and tracing initialisation.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
pub use telemetry::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
