//! Command handlers for the rewind CLI.

pub mod history;
pub mod logging;
pub mod watch;

pub use history::*;
pub use logging::*;
pub use watch::*;
