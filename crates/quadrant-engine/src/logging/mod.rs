//! Logging setup.
//!
//! The crate itself only emits through the `log` facade; hosts call
//! [`init_logging`] to install `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
