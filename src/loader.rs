//! Embedding entry point.
//!
//! The loader script runs once per page. A second copy of the tag on the same
//! page is a silent no-op; a tag without a usable site id does nothing but
//! log an error.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{LoaderSettings, SettingsError};
use crate::dom::Document;
use crate::session::{AuditSink, Session, SessionError};
use crate::storage::KeyValueStore;
use crate::ui::Renderer;

/// Global set by the first loader that initialises on a page.
pub const GLOBAL_MARKER: &str = "__cmpRuntimeLoaded";

/// Page-global namespace of the host.
pub trait HostGlobals {
    fn is_set(&self, name: &str) -> bool;

    fn set(&self, name: &str);
}

/// Globals for hosts without a shared page namespace.
#[derive(Debug, Default)]
pub struct MemoryGlobals {
    names: Mutex<HashSet<String>>,
}

impl MemoryGlobals {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostGlobals for MemoryGlobals {
    fn is_set(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    fn set(&self, name: &str) {
        self.names.lock().insert(name.to_string());
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Capabilities the host page hands to the runtime.
pub struct HostBindings {
    pub document: Arc<dyn Document>,
    pub store: Box<dyn KeyValueStore>,
    pub renderer: Box<dyn Renderer>,
    pub audit: Box<dyn AuditSink>,
}

/// Initialise the runtime for the loader tag at `script_src`.
///
/// Returns the booted session, waiting for its configuration, or `None` when
/// another loader already owns the page.
pub fn bootstrap(
    script_src: &str,
    globals: &dyn HostGlobals,
    host: HostBindings,
    browser_language: Option<&str>,
) -> Result<Option<Session>, LoaderError> {
    crate::init_logger();

    if globals.is_set(GLOBAL_MARKER) {
        log::debug!("LOADER_ALREADY_INITIALISED src={}", script_src);
        return Ok(None);
    }

    let settings = match LoaderSettings::from_script_src(script_src) {
        Ok(settings) => settings.with_browser_language(browser_language),
        Err(e) => {
            log::error!("LOADER_REFUSED src={} error={}", script_src, e);
            return Err(e.into());
        }
    };

    globals.set(GLOBAL_MARKER);

    let mut session = Session::new(
        settings,
        host.document,
        host.store,
        host.renderer,
        host.audit,
    );
    let request = session.boot()?;
    log::info!(
        "{} LOADER_READY config_url={}",
        session.context(),
        request.url
    );

    Ok(Some(session))
}
