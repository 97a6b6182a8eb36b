//! Event-line formatting for the runtime.
//!
//! Each line is `<context> <EVENT> key=value...`. The context carries the
//! site id and, once a session has booted, a short session id. The macros
//! expand to a unit block so they also work as match arms.

use std::fmt;

/// Logging context for one loader session.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub site_id: String,
    pub session_id: Option<String>,
}

impl LogContext {
    pub fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            session_id: None,
        }
    }

    pub fn with_session(&self, session_id: &str) -> Self {
        Self {
            site_id: self.site_id.clone(),
            session_id: Some(session_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_id {
            Some(sid) => write!(f, "[site={}] [session={}]", self.site_id, sid),
            None => write!(f, "[site={}]", self.site_id),
        }
    }
}

/// `key=value` pairs appended to an event line by the logging macros.
pub struct Fields<'a>(pub &'a [(&'static str, &'a dyn fmt::Debug)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.0 {
            write!(f, " {}={:?}", key, value)?;
        }
        Ok(())
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        log::info!(
            "{} {}{}",
            $ctx,
            $event,
            $crate::logging::structured::Fields(&[$((stringify!($key), &$value as &dyn ::std::fmt::Debug)),*])
        );
    }};
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        log::warn!(
            "{} {}{}",
            $ctx,
            $event,
            $crate::logging::structured::Fields(&[$((stringify!($key), &$value as &dyn ::std::fmt::Debug)),*])
        );
    }};
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        log::error!(
            "{} {}{}",
            $ctx,
            $event,
            $crate::logging::structured::Fields(&[$((stringify!($key), &$value as &dyn ::std::fmt::Debug)),*])
        );
    }};
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {{
        log::debug!(
            "{} {}{}",
            $ctx,
            $event,
            $crate::logging::structured::Fields(&[$((stringify!($key), &$value as &dyn ::std::fmt::Debug)),*])
        );
    }};
}
