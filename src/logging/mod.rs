//! Site and session tagged event logging.
//!
//! Everything goes through the `log` facade; `init_logger` installs
//! `env_logger` as the backend.

pub mod structured;

pub use structured::*;
