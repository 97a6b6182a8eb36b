//! Dynamic interception guard.
//!
//! Decorates element creation so scripts created after startup go through
//! the same gating as pre-marked markup. The purpose attribute is read when
//! the source is assigned, not when the element is created, because
//! frameworks commonly tag the element afterwards.
//!
//! # Decision Tree (on source assignment)
//! 1. No purpose, no decision yet -> blocked, value kept, warning logged
//! 2. No purpose, decision exists -> forwarded
//! 3. Purpose consented -> forwarded
//! 4. Purpose not consented -> withheld as a `dynamic-script` pending resource

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::dom::{Document, DomError, NodeId};
use crate::logging::structured::LogContext;

use super::resource::{purpose_of, PendingResource, ResourceKind, PURPOSE_ATTR};
use super::state::SharedState;

/// What happened to a guarded source assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAssignment {
    /// The real property was written.
    Forwarded,
    /// Held back until its purpose is consented.
    Withheld { pending_id: String },
    /// Unattributed script before any decision; never replayed.
    Blocked,
}

/// Element factory decorator installed for the rest of the page session.
#[derive(Clone)]
pub struct ScriptGuard {
    doc: Arc<dyn Document>,
    state: SharedState,
    ctx: LogContext,
    /// Guarded script -> last source value held back from the real property.
    guarded: Arc<Mutex<HashMap<NodeId, Option<String>>>>,
    sequence: Arc<AtomicU64>,
}

impl ScriptGuard {
    pub fn install(doc: Arc<dyn Document>, state: SharedState, ctx: &LogContext) -> Self {
        log::info!("{} GUARD_INSTALLED tag=script", ctx);
        Self {
            doc,
            state,
            ctx: ctx.clone(),
            guarded: Arc::new(Mutex::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create an element; scripts come back guarded.
    pub fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        let node = self.doc.create_element(tag)?;
        if tag.eq_ignore_ascii_case("script") {
            self.guarded.lock().insert(node, None);
        }
        Ok(node)
    }

    pub fn is_guarded(&self, node: NodeId) -> bool {
        self.guarded.lock().contains_key(&node)
    }

    /// Source value the page assigned but the guard held back.
    pub fn held_source(&self, node: NodeId) -> Option<String> {
        self.guarded.lock().get(&node).cloned().flatten()
    }

    /// The patched source setter.
    pub fn assign_source(&self, node: NodeId, url: &str) -> Result<SourceAssignment, DomError> {
        if !self.is_guarded(node) {
            self.doc.set_source(node, url)?;
            return Ok(SourceAssignment::Forwarded);
        }

        let purpose = purpose_of(self.doc.attribute(node, PURPOSE_ATTR));

        let (outcome, superseded) = {
            let mut state = self.state.write();
            let outcome = match purpose {
                None if !state.has_decision() => SourceAssignment::Blocked,
                None => SourceAssignment::Forwarded,
                Some(ref purpose) if state.is_consented(purpose) => SourceAssignment::Forwarded,
                Some(purpose) => {
                    // A second assignment before replay replaces the held value.
                    if let Some(existing) =
                        state.unreplayed_for_node_mut(node, ResourceKind::DynamicScript)
                    {
                        existing.source_url = Some(url.to_string());
                        SourceAssignment::Withheld {
                            pending_id: existing.id.clone(),
                        }
                    } else {
                        let pending_id = self.next_id();
                        state.register_pending(PendingResource {
                            id: pending_id.clone(),
                            kind: ResourceKind::DynamicScript,
                            purpose_tag: purpose,
                            source_url: Some(url.to_string()),
                            inline_body: None,
                            node,
                        });
                        SourceAssignment::Withheld { pending_id }
                    }
                }
            };

            // A direct write replaces any held entry for this node; replay
            // must not write the source a second time.
            let mut superseded = None;
            if outcome == SourceAssignment::Forwarded {
                if let Some(held) =
                    state.unreplayed_for_node_mut(node, ResourceKind::DynamicScript)
                {
                    let id = held.id.clone();
                    state.mark_replayed(&id);
                    superseded = Some(id);
                }
            }
            (outcome, superseded)
        };

        if let Some(id) = superseded {
            log::info!(
                "{} DYNAMIC_SCRIPT_SUPERSEDED id={} node={:?}",
                self.ctx,
                id,
                node
            );
        }

        match &outcome {
            SourceAssignment::Forwarded => {
                self.guarded.lock().insert(node, None);
                self.doc.set_source(node, url)?;
                log::debug!("{} DYNAMIC_SCRIPT_FORWARDED node={:?}", self.ctx, node);
            }
            SourceAssignment::Withheld { pending_id } => {
                self.guarded.lock().insert(node, Some(url.to_string()));
                log::info!(
                    "{} DYNAMIC_SCRIPT_WITHHELD id={} node={:?}",
                    self.ctx,
                    pending_id,
                    node
                );
            }
            SourceAssignment::Blocked => {
                self.guarded.lock().insert(node, Some(url.to_string()));
                log::warn!(
                    "{} DYNAMIC_SCRIPT_UNATTRIBUTED node={:?} action=blocked",
                    self.ctx,
                    node
                );
            }
        }

        Ok(outcome)
    }

    /// Forget the held value once the replay engine wrote the real source.
    pub(crate) fn release(&self, node: NodeId) {
        if let Some(held) = self.guarded.lock().get_mut(&node) {
            *held = None;
        }
    }

    fn next_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}",
            ResourceKind::DynamicScript,
            Utc::now().timestamp_millis(),
            seq
        )
    }
}
