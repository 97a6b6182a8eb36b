//! The document seam between the runtime and its host page.

use serde_json::Value;
use thiserror::Error;

/// Opaque handle to an element owned by the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("host rejected the mutation: {0}")]
    Rejected(String),
}

/// Operations the runtime needs from the host page.
///
/// All methods take `&self`: the document is shared with arbitrary page
/// scripts, so bindings are expected to use interior mutability the way
/// browser handles do.
pub trait Document {
    /// Connected elements with tag `tag`, in document order.
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId>;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError>;

    /// Inline text body of the element.
    fn text(&self, node: NodeId) -> Option<String>;

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError>;

    /// Create a detached element.
    fn create_element(&self, tag: &str) -> Result<NodeId, DomError>;

    /// Write the real, network-triggering source property of a script,
    /// image or iframe.
    fn set_source(&self, node: NodeId, url: &str) -> Result<(), DomError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Put `new` where `old` currently sits under `parent`.
    fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError>;

    fn append_to_body(&self, node: NodeId) -> Result<(), DomError>;

    /// Fire a custom event host-page listeners can subscribe to.
    fn dispatch_event(&self, name: &str, detail: &Value);
}
