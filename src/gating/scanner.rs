//! Resource scanner.
//!
//! Walks the document once at startup and records every pre-marked,
//! consent-gated element. Read-only: nothing is mutated, nothing is fetched.
//!
//! Selection rules:
//! - `<script type="text/plain" data-purpose=..>` -> `script`
//! - `<img data-src=.. data-purpose=..>` -> `pixel`
//! - `<iframe data-src=.. data-purpose=..>` -> `iframe`
//!
//! Elements without a purpose are not collected. Elements with a purpose the
//! configuration does not know are collected; rejecting them is the
//! evaluator's job.

use crate::dom::Document;
use crate::logging::structured::LogContext;

use super::resource::{
    purpose_of, PendingResource, ResourceKind, DEFERRED_SRC_ATTR, NEUTRALIZED_SCRIPT_TYPE,
    PURPOSE_ATTR,
};

pub fn scan(doc: &dyn Document, ctx: &LogContext) -> Vec<PendingResource> {
    let mut found = Vec::new();

    for node in doc.elements_by_tag("script") {
        let neutralized = doc
            .attribute(node, "type")
            .map(|t| t.trim().eq_ignore_ascii_case(NEUTRALIZED_SCRIPT_TYPE))
            .unwrap_or(false);
        if !neutralized {
            continue;
        }
        let Some(purpose) = purpose_of(doc.attribute(node, PURPOSE_ATTR)) else {
            continue;
        };

        let source_url = doc
            .attribute(node, "src")
            .or_else(|| doc.attribute(node, DEFERRED_SRC_ATTR))
            .filter(|s| !s.is_empty());
        let inline_body = doc.text(node).filter(|t| !t.trim().is_empty());

        found.push(PendingResource {
            id: resource_id(ResourceKind::Script, found.len(), &purpose),
            kind: ResourceKind::Script,
            purpose_tag: purpose,
            source_url,
            inline_body,
            node,
        });
    }

    for (tag, kind) in [("img", ResourceKind::Pixel), ("iframe", ResourceKind::Iframe)] {
        for node in doc.elements_by_tag(tag) {
            let Some(source_url) = doc
                .attribute(node, DEFERRED_SRC_ATTR)
                .filter(|s| !s.trim().is_empty())
            else {
                continue;
            };
            let Some(purpose) = purpose_of(doc.attribute(node, PURPOSE_ATTR)) else {
                continue;
            };

            found.push(PendingResource {
                id: resource_id(kind, found.len(), &purpose),
                kind,
                purpose_tag: purpose,
                source_url: Some(source_url),
                inline_body: None,
                node,
            });
        }
    }

    for resource in &found {
        log::debug!(
            "{} RESOURCE_SCANNED id={} kind={} purpose={}",
            ctx,
            resource.id,
            resource.kind,
            resource.purpose_tag
        );
    }
    log::info!("{} SCAN_COMPLETE pending={}", ctx, found.len());

    found
}

fn resource_id(kind: ResourceKind, position: usize, purpose: &str) -> String {
    format!("{}-{}-{}", kind, position, purpose)
}
