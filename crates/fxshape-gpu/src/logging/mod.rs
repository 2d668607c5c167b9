//! Logging utilities.
//!
//! The crate logs through the `log` facade only. `init_logging` installs an
//! `env_logger` backend for hosts and tests that have none of their own.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
