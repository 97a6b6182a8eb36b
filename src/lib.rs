//! CMP Runtime - purpose-based consent enforcement for embedded site loaders
//!
//! This crate is the in-page half of a consent management platform. It keeps
//! every tracker a site has marked as gated from loading until the visitor
//! has consented to the tracker's purpose. The implementation prioritizes:
//!
//! 1. **Fail closed** - any configuration problem leaves everything blocked
//! 2. **Logging** - every decision point logged with site and session context
//! 3. **At-most-once** - a consented resource is activated exactly once
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `loader` - Embedding entry point (double-init guard, site id)
//! - `session` - Session state machine, language resolution, transport
//! - `gating` - Scanner, interception guard, evaluator, replay engine
//! - `config` - Runtime configuration model, validation, loader settings
//! - `storage` - Consent record, language preference, anonymous id
//! - `dom` - Host document seam and an in-memory document
//! - `ui` - View models, renderer seam, rights-request form
//! - `logging` - Structured logging with session context

pub mod config;
pub mod dom;
pub mod gating;
pub mod loader;
pub mod logging;
pub mod session;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod testing;

pub use config::{LoaderSettings, RuntimeConfiguration};
pub use dom::{Document, MemoryDocument};
pub use loader::{bootstrap, HostBindings, HostGlobals, LoaderError, MemoryGlobals};
pub use session::{Session, SessionError, SessionPhase};

/// Initialize the crate logger.
///
/// Safe to call more than once; only the first call installs a logger.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
