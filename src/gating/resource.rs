//! Pending resources and the markup conventions that produce them.
//!
//! The attribute names and the neutralized script type are the contract with
//! site authors and must not change without a version bump.

use std::fmt;

use serde::Serialize;

use crate::dom::NodeId;

/// `type` value that keeps a script from executing until it is replayed.
pub const NEUTRALIZED_SCRIPT_TYPE: &str = "text/plain";

/// Attribute naming the purpose a resource belongs to.
pub const PURPOSE_ATTR: &str = "data-purpose";

/// Attribute holding the deferred source of an image or iframe.
pub const DEFERRED_SRC_ATTR: &str = "data-src";

/// Marker set on scripts the runtime created during replay.
pub const REPLAYED_ATTR: &str = "data-cmp-replayed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Script,
    DynamicScript,
    Pixel,
    Iframe,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::DynamicScript => "dynamic-script",
            ResourceKind::Pixel => "pixel",
            ResourceKind::Iframe => "iframe",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side-effecting resource held back until its purpose is consented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResource {
    pub id: String,
    pub kind: ResourceKind,
    pub purpose_tag: String,
    pub source_url: Option<String>,
    pub inline_body: Option<String>,
    pub node: NodeId,
}

/// Normalized purpose attribute; blank counts as absent.
pub fn purpose_of(raw: Option<String>) -> Option<String> {
    raw.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}
