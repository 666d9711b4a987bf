//! Module-gated logging macros.
//!
//! The monitoring loop runs once per second for the whole session, so the chatty modules
//! (`session::worker`, `sensing`) route their output through these macros and can be silenced
//! by flipping a single constant instead of raising `RUST_LOG` for the entire crate.
//!
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_info};
//!
//! log_info!("guard frozen: {}", reason);
//! ```
//!
//! Every message is tagged with the calling module path so the filtered output of
//! `env_logger` still shows where a line came from.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!(target: module_path!(), $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!(target: module_path!(), $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!(target: module_path!(), $($arg)*);
        }
    };
}

/// Per-frame diagnostics (rejected observations, coalesced frames). Off unless both the
/// module flag and `RUST_LOG=debug` allow it.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!(target: module_path!(), $($arg)*);
        }
    };
}
