//! # revent-core
//!
//! Core types for the revent reactor. This crate is platform-agnostic
//! and contains no OS-specific code; everything touching file descriptors
//! lives in `revent-reactor`.
//!
//! ## Modules
//!
//! - `error` - Error types shared across the workspace
//! - `events` - I/O event bitmask (`EventSet`)
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod env;
pub mod error;
pub mod events;
pub mod kprint;

// Re-exports for convenience
pub use error::{ReactorError, ReactorResult};
pub use events::EventSet;
pub use kprint::{set_flush_enabled, set_log_level, LogLevel};
