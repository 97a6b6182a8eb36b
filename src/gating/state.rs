//! Per-session consent state.
//!
//! Owned by the session controller and shared with the interception guard.
//! One instance per session, never a global.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RuntimeConfiguration;
use crate::dom::NodeId;
use crate::logging::structured::LogContext;

use super::evaluator::{evaluate, Verdict};
use super::resource::{PendingResource, ResourceKind};

pub type SharedState = Arc<RwLock<ConsentState>>;

#[derive(Debug, Default)]
pub struct ConsentState {
    config: Option<Arc<RuntimeConfiguration>>,
    decisions: BTreeMap<String, bool>,
    decided: bool,
    pending: Vec<PendingResource>,
    replayed: HashSet<String>,
}

/// Resources claimed for activation by one replay pass.
#[derive(Debug, Default)]
pub struct ReplayClaim {
    pub ready: Vec<PendingResource>,
    pub still_blocked: usize,
}

impl ConsentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    pub fn configuration(&self) -> Option<Arc<RuntimeConfiguration>> {
        self.config.clone()
    }

    pub fn set_configuration(&mut self, config: RuntimeConfiguration) {
        self.config = Some(Arc::new(config));
    }

    pub fn decisions(&self) -> &BTreeMap<String, bool> {
        &self.decisions
    }

    /// Whether the visitor has expressed any decision yet.
    pub fn has_decision(&self) -> bool {
        self.decided
    }

    pub fn adopt_decisions(&mut self, decisions: BTreeMap<String, bool>) {
        self.decisions = decisions;
        self.decided = true;
    }

    pub fn clear_decisions(&mut self) {
        self.decisions.clear();
        self.decided = false;
    }

    pub fn evaluate(&self, purpose_tag: &str) -> Verdict {
        evaluate(self.config.as_deref(), &self.decisions, purpose_tag)
    }

    pub fn is_consented(&self, purpose_tag: &str) -> bool {
        self.evaluate(purpose_tag).allows()
    }

    pub fn register_pending(&mut self, resource: PendingResource) {
        self.pending.push(resource);
    }

    pub fn pending(&self) -> &[PendingResource] {
        &self.pending
    }

    /// Not-yet-replayed entry of `kind` for `node`, if any.
    pub fn unreplayed_for_node_mut(
        &mut self,
        node: NodeId,
        kind: ResourceKind,
    ) -> Option<&mut PendingResource> {
        let replayed = &self.replayed;
        self.pending
            .iter_mut()
            .find(|r| r.node == node && r.kind == kind && !replayed.contains(&r.id))
    }

    /// Record `id` as activated without going through a replay pass.
    ///
    /// Returns `false` if it was already marked.
    pub fn mark_replayed(&mut self, id: &str) -> bool {
        self.replayed.insert(id.to_string())
    }

    pub fn is_replayed(&self, id: &str) -> bool {
        self.replayed.contains(id)
    }

    pub fn replayed_count(&self) -> usize {
        self.replayed.len()
    }

    /// Mark every consented, not-yet-replayed resource as replayed and hand
    /// it back for activation.
    ///
    /// Marking happens here, before any side effect, so a failing or
    /// reentrant activation can never run twice.
    pub fn claim_replayable(&mut self, ctx: &LogContext) -> ReplayClaim {
        let mut claim = ReplayClaim::default();

        for resource in &self.pending {
            if self.replayed.contains(&resource.id) {
                continue;
            }

            let verdict = evaluate(self.config.as_deref(), &self.decisions, &resource.purpose_tag);
            if verdict.allows() {
                self.replayed.insert(resource.id.clone());
                claim.ready.push(resource.clone());
                continue;
            }

            if verdict == Verdict::UnknownPurpose {
                log::warn!(
                    "{} UNKNOWN_PURPOSE id={} purpose={} blocked=permanent",
                    ctx,
                    resource.id,
                    resource.purpose_tag
                );
            }
            claim.still_blocked += 1;
        }

        claim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::config_with;

    fn resource(id: &str, purpose: &str, node: u64) -> PendingResource {
        PendingResource {
            id: id.to_string(),
            kind: ResourceKind::Pixel,
            purpose_tag: purpose.to_string(),
            source_url: Some(format!("https://t.example/{}.gif", id)),
            inline_body: None,
            node: NodeId(node),
        }
    }

    #[test]
    fn test_claim_marks_before_returning() {
        let ctx = LogContext::new("acme");
        let mut state = ConsentState::new();
        state.set_configuration(config_with(&[("analytics", false), ("essential", true)]));
        state.register_pending(resource("a", "analytics", 1));
        state.register_pending(resource("e", "essential", 2));
        state.register_pending(resource("g", "ghost", 3));

        let claim = state.claim_replayable(&ctx);
        assert_eq!(claim.ready.len(), 1);
        assert_eq!(claim.ready[0].id, "e");
        assert_eq!(claim.still_blocked, 2);
        assert!(state.is_replayed("e"));

        state.adopt_decisions(BTreeMap::from([
            ("analytics".to_string(), true),
            ("ghost".to_string(), true),
        ]));
        let claim = state.claim_replayable(&ctx);
        assert_eq!(
            claim.ready.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a"]
        );
        assert_eq!(claim.still_blocked, 1);

        let claim = state.claim_replayable(&ctx);
        assert!(claim.ready.is_empty());
        assert_eq!(state.replayed_count(), 2);
    }

    #[test]
    fn test_nothing_claimed_without_configuration() {
        let ctx = LogContext::new("acme");
        let mut state = ConsentState::new();
        state.adopt_decisions(BTreeMap::from([("analytics".to_string(), true)]));
        state.register_pending(resource("a", "analytics", 1));

        let claim = state.claim_replayable(&ctx);
        assert!(claim.ready.is_empty());
        assert_eq!(claim.still_blocked, 1);
    }

    #[test]
    fn test_clear_decisions() {
        let mut state = ConsentState::new();
        state.adopt_decisions(BTreeMap::from([("analytics".to_string(), true)]));
        assert!(state.has_decision());
        state.clear_decisions();
        assert!(!state.has_decision());
        assert!(state.decisions().is_empty());
    }
}
