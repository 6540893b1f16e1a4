//! Shared utilities for rewind.
//!
//! This crate provides common utilities used across the rewind workspace:
//! - Logging setup with tracing
//! - Path utilities and platform directories
//! - RAII-based timing for operation measurement

pub mod log;
pub mod path;
pub mod timing;

pub use log::{LogConfig, LogLevel, LogTarget};
pub use timing::TimingGuard;
