//! Replay engine.
//!
//! Activates every pending resource whose purpose is now consented, exactly
//! once per resource for the life of the page. Resources are claimed (marked
//! replayed) under the state lock first; the DOM side effects run after the
//! lock is released, so a page callback fired by an activation can safely
//! query consent again.

use thiserror::Error;

use crate::dom::{Document, DomError};
use crate::logging::structured::LogContext;

use super::guard::ScriptGuard;
use super::resource::{PendingResource, ResourceKind, PURPOSE_ATTR, REPLAYED_ATTR};
use super::state::SharedState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("resource '{0}' has nothing to activate")]
    NothingToActivate(String),
}

/// Outcome of one replay pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub activated: Vec<String>,
    pub failed: Vec<String>,
    pub still_blocked: usize,
}

impl ReplayReport {
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty() && self.failed.is_empty()
    }
}

pub fn replay(
    doc: &dyn Document,
    state: &SharedState,
    guard: Option<&ScriptGuard>,
    ctx: &LogContext,
) -> ReplayReport {
    let claim = state.write().claim_replayable(ctx);

    let mut report = ReplayReport {
        still_blocked: claim.still_blocked,
        ..Default::default()
    };

    for resource in claim.ready {
        match activate(doc, &resource) {
            Ok(()) => {
                if resource.kind == ResourceKind::DynamicScript {
                    if let Some(guard) = guard {
                        guard.release(resource.node);
                    }
                }
                log::info!(
                    "{} REPLAY_ACTIVATED id={} kind={} purpose={}",
                    ctx,
                    resource.id,
                    resource.kind,
                    resource.purpose_tag
                );
                report.activated.push(resource.id);
            }
            Err(e) => {
                // Stays marked as replayed: no second attempt.
                log::warn!(
                    "{} REPLAY_FAILED id={} kind={} error={}",
                    ctx,
                    resource.id,
                    resource.kind,
                    e
                );
                report.failed.push(resource.id);
            }
        }
    }

    log::info!(
        "{} REPLAY_COMPLETE activated={} failed={} still_blocked={}",
        ctx,
        report.activated.len(),
        report.failed.len(),
        report.still_blocked
    );

    report
}

/// Perform the kind-specific side effect for one resource.
fn activate(doc: &dyn Document, resource: &PendingResource) -> Result<(), ReplayError> {
    match resource.kind {
        ResourceKind::Script => {
            if resource.source_url.is_none() && resource.inline_body.is_none() {
                return Err(ReplayError::NothingToActivate(resource.id.clone()));
            }

            let fresh = doc.create_element("script")?;
            doc.set_attribute(fresh, PURPOSE_ATTR, &resource.purpose_tag)?;
            doc.set_attribute(fresh, REPLAYED_ATTR, "true")?;
            if let Some(url) = &resource.source_url {
                doc.set_source(fresh, url)?;
            } else if let Some(body) = &resource.inline_body {
                doc.set_text(fresh, body)?;
            }

            match doc.parent(resource.node) {
                Some(parent) => doc.replace_child(parent, fresh, resource.node)?,
                None => doc.append_to_body(fresh)?,
            }
        }
        ResourceKind::DynamicScript | ResourceKind::Pixel | ResourceKind::Iframe => {
            let url = resource
                .source_url
                .as_deref()
                .ok_or_else(|| ReplayError::NothingToActivate(resource.id.clone()))?;
            doc.set_source(resource.node, url)?;
        }
    }
    Ok(())
}
