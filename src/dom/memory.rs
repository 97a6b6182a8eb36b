//! In-memory tree document.
//!
//! Models just enough browser behaviour to observe what the runtime lets
//! through: every source write that would hit the network and every inline
//! script that would execute is recorded as `NetworkActivity`.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::Value;

use crate::gating::resource::NEUTRALIZED_SCRIPT_TYPE;

use super::document::{Document, DomError, NodeId};

/// Side effect the host page would have performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkActivity {
    Fetch { node: NodeId, tag: String, url: String },
    InlineExecution { node: NodeId, body: String },
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        }
    }

    fn is_neutralized_script(&self) -> bool {
        self.tag == "script"
            && self
                .attributes
                .get("type")
                .map(|t| t.trim().eq_ignore_ascii_case(NEUTRALIZED_SCRIPT_TYPE))
                .unwrap_or(false)
    }

    fn loads_source(&self) -> bool {
        match self.tag.as_str() {
            "script" => !self.is_neutralized_script(),
            "img" | "iframe" => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Tree {
    elements: HashMap<NodeId, Element>,
    next_id: u64,
    root: NodeId,
    body: NodeId,
    activity: Vec<NetworkActivity>,
    events: Vec<(String, Value)>,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self {
            elements: HashMap::new(),
            next_id: 0,
            root: NodeId(0),
            body: NodeId(0),
            activity: Vec::new(),
            events: Vec::new(),
        };
        tree.root = tree.alloc("html");
        tree.body = tree.alloc("body");
        let (root, body) = (tree.root, tree.body);
        tree.link(root, body);
        tree
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, Element::new(tag));
        id
    }

    fn get(&self, node: NodeId) -> Result<&Element, DomError> {
        self.elements.get(&node).ok_or(DomError::UnknownNode(node))
    }

    fn get_mut(&mut self, node: NodeId) -> Result<&mut Element, DomError> {
        self.elements
            .get_mut(&node)
            .ok_or(DomError::UnknownNode(node))
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.elements.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.elements.get_mut(&node).and_then(|e| e.parent.take());
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    fn write_source(&mut self, node: NodeId, url: &str) -> Result<(), DomError> {
        let element = self.get_mut(node)?;
        element.attributes.insert("src".to_string(), url.to_string());
        if element.loads_source() {
            let tag = element.tag.clone();
            self.activity.push(NetworkActivity::Fetch {
                node,
                tag,
                url: url.to_string(),
            });
        }
        Ok(())
    }

    fn on_connected(&mut self, node: NodeId) {
        let Some(element) = self.elements.get(&node) else {
            return;
        };
        if element.tag == "script" && !element.is_neutralized_script() {
            if let Some(body) = element.text.clone() {
                self.activity
                    .push(NetworkActivity::InlineExecution { node, body });
            }
        }
    }

    fn collect(&self, node: NodeId, tag: &str, out: &mut Vec<NodeId>) {
        if let Some(element) = self.elements.get(&node) {
            if element.tag == tag {
                out.push(node);
            }
            for child in &element.children {
                self.collect(*child, tag, out);
            }
        }
    }
}

/// Thread-safe in-memory document.
#[derive(Debug)]
pub struct MemoryDocument {
    tree: Mutex<Tree>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
        }
    }

    pub fn body(&self) -> NodeId {
        self.tree.lock().body
    }

    /// Parse-time insertion of an element into the body, as page markup would.
    ///
    /// `src` is applied last so a neutralizing `type` is already in place.
    pub fn insert(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.insert_with_text(tag, attributes, None)
    }

    pub fn insert_with_text(
        &self,
        tag: &str,
        attributes: &[(&str, &str)],
        text: Option<&str>,
    ) -> NodeId {
        let mut tree = self.tree.lock();
        let node = tree.alloc(tag);
        let mut source = None;
        if let Some(element) = tree.elements.get_mut(&node) {
            for (name, value) in attributes {
                if *name == "src" {
                    source = Some(value.to_string());
                } else {
                    element
                        .attributes
                        .insert(name.to_string(), value.to_string());
                }
            }
            element.text = text.map(|t| t.to_string());
        }
        let body = tree.body;
        tree.link(body, node);
        if let Some(url) = source {
            let _ = tree.write_source(node, &url);
        }
        tree.on_connected(node);
        node
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .lock()
            .elements
            .get(&node)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    pub fn activity(&self) -> Vec<NetworkActivity> {
        self.tree.lock().activity.clone()
    }

    /// URLs fetched so far, in order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.activity()
            .into_iter()
            .filter_map(|a| match a {
                NetworkActivity::Fetch { url, .. } => Some(url),
                NetworkActivity::InlineExecution { .. } => None,
            })
            .collect()
    }

    pub fn inline_executions(&self) -> Vec<String> {
        self.activity()
            .into_iter()
            .filter_map(|a| match a {
                NetworkActivity::InlineExecution { body, .. } => Some(body),
                NetworkActivity::Fetch { .. } => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.tree.lock().events.clone()
    }
}

impl Document for MemoryDocument {
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let tree = self.tree.lock();
        let mut out = Vec::new();
        tree.collect(tree.root, &tag.to_ascii_lowercase(), &mut out);
        out
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.lock().elements.get(&node).map(|e| e.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .lock()
            .elements
            .get(&node)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.lock();
        if name == "src" {
            return tree.write_source(node, value);
        }
        tree.get_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.tree
            .lock()
            .elements
            .get(&node)
            .and_then(|e| e.text.clone())
    }

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.tree.lock().get_mut(node)?.text = Some(text.to_string());
        Ok(())
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, DomError> {
        Ok(self.tree.lock().alloc(tag))
    }

    fn set_source(&self, node: NodeId, url: &str) -> Result<(), DomError> {
        self.tree.lock().write_source(node, url)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.lock().elements.get(&node).and_then(|e| e.parent)
    }

    fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.lock();
        tree.get(new)?;
        let position = tree
            .get(parent)?
            .children
            .iter()
            .position(|c| *c == old)
            .ok_or(DomError::NotAChild { parent, child: old })?;

        tree.detach(new);
        // Detaching `new` may have shifted siblings under the same parent.
        let position = tree
            .get(parent)?
            .children
            .iter()
            .position(|c| *c == old)
            .unwrap_or(position);

        tree.get_mut(parent)?.children[position] = new;
        tree.get_mut(old)?.parent = None;
        tree.get_mut(new)?.parent = Some(parent);
        tree.on_connected(new);
        Ok(())
    }

    fn append_to_body(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.lock();
        tree.get(node)?;
        tree.detach(node);
        let body = tree.body;
        tree.link(body, node);
        tree.on_connected(node);
        Ok(())
    }

    fn dispatch_event(&self, name: &str, detail: &Value) {
        self.tree
            .lock()
            .events
            .push((name.to_string(), detail.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutralized_script_does_not_fetch() {
        let doc = MemoryDocument::new();
        doc.insert(
            "script",
            &[("src", "https://t.example/a.js"), ("type", "text/plain")],
        );
        assert!(doc.fetched_urls().is_empty());

        doc.insert("img", &[("src", "https://t.example/p.gif")]);
        assert_eq!(doc.fetched_urls(), vec!["https://t.example/p.gif"]);
    }

    #[test]
    fn test_elements_in_document_order() {
        let doc = MemoryDocument::new();
        let a = doc.insert("script", &[]);
        let _img = doc.insert("img", &[]);
        let b = doc.insert("SCRIPT", &[]);
        let detached = doc.create_element("script").unwrap();

        let scripts = doc.elements_by_tag("script");
        assert_eq!(scripts, vec![a, b]);
        assert!(!scripts.contains(&detached));
    }

    #[test]
    fn test_replace_child_keeps_position() {
        let doc = MemoryDocument::new();
        let first = doc.insert("div", &[]);
        let old = doc.insert("script", &[("type", "text/plain")]);
        let last = doc.insert("div", &[]);

        let new = doc.create_element("script").unwrap();
        doc.set_text(new, "window.loaded = true;").unwrap();
        doc.replace_child(doc.body(), new, old).unwrap();

        assert_eq!(doc.children(doc.body()), vec![first, new, last]);
        assert_eq!(doc.parent(old), None);
        assert_eq!(doc.inline_executions(), vec!["window.loaded = true;"]);
    }

    #[test]
    fn test_replace_child_rejects_stranger() {
        let doc = MemoryDocument::new();
        let orphan = doc.create_element("script").unwrap();
        let new = doc.create_element("script").unwrap();
        assert_eq!(
            doc.replace_child(doc.body(), new, orphan),
            Err(DomError::NotAChild {
                parent: doc.body(),
                child: orphan
            })
        );
    }

    #[test]
    fn test_unknown_node() {
        let doc = MemoryDocument::new();
        assert_eq!(
            doc.set_source(NodeId(999), "https://x"),
            Err(DomError::UnknownNode(NodeId(999)))
        );
    }
}
