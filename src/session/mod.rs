//! Consent session module.
//!
//! Drives one page load from scan to recorded decision:
//! - `controller` - the session state machine and the public host-page API
//! - `language` - display language resolution
//! - `transport` - configuration fetch and consent audit report

pub mod controller;
pub mod language;
pub mod transport;

pub use controller::*;
pub use language::*;
pub use transport::*;
