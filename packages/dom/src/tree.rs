//! # Page Tree
//!
//! The live tree the engine edits. Element nodes carry a tag, an
//! attribute map, and an inline style map; text nodes carry content.
//!
//! ## Design Principles
//!
//! 1. **Arena-addressed**: nodes are referenced by [`NodeId`], never by
//!    pointer, so the engine can hold ids across mutations
//! 2. **Tolerant reads**: every accessor returns `Option`/empty for a
//!    stale or mismatched id instead of panicking
//! 3. **Explicit mutation**: all writes go through the tree, which is
//!    the single owner of node storage

use std::collections::HashMap;
use thiserror::Error;

/// Handle to a node in a [`PageTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element {
        tag: String,
        attributes: HashMap<String, String>,
        styles: HashMap<String, String>,
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone)]
struct NodeSlot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Node is not an element")]
    NotAnElement,

    #[error("Would create cycle")]
    CycleDetected,
}

/// Arena tree of element and text nodes.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<NodeSlot>,
    root: NodeId,
}

impl PageTree {
    /// Create a tree with a single root element.
    pub fn new(root_tag: impl Into<String>) -> Self {
        let root_slot = NodeSlot {
            data: NodeData::Element {
                tag: root_tag.into(),
                attributes: HashMap::new(),
                styles: HashMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root_slot],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached element node.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.into(),
            attributes: HashMap::new(),
            styles: HashMap::new(),
        })
    }

    /// Allocate a detached text node.
    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text {
            content: content.into(),
        })
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.0)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes.get_mut(id.0)
    }

    /// Attach `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Attach `child` under `parent` at `index` (clamped).
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        if self.slot(child).is_none() {
            return Err(TreeError::NodeNotFound(child));
        }
        match self.slot(parent).map(|s| &s.data) {
            None => return Err(TreeError::NodeNotFound(parent)),
            Some(NodeData::Text { .. }) => return Err(TreeError::NotAnElement),
            Some(NodeData::Element { .. }) => {}
        }
        // Reparenting into the node's own subtree is not allowed.
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(TreeError::CycleDetected);
        }
        self.detach(child);

        let slot = self.slot_mut(parent).expect("checked above");
        let index = index.min(slot.children.len());
        slot.children.insert(index, child);
        self.slot_mut(child).expect("checked above").parent = Some(parent);
        Ok(())
    }

    /// Unlink a node from its parent. The subtree stays intact but is no
    /// longer reachable from the root.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.slot(node).and_then(|s| s.parent) else {
            return;
        };
        if let Some(parent_slot) = self.slot_mut(parent) {
            parent_slot.children.retain(|c| *c != node);
        }
        if let Some(slot) = self.slot_mut(node) {
            slot.parent = None;
        }
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.slot(current).and_then(|s| s.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node).and_then(|s| s.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|s| s.children.as_slice()).unwrap_or(&[])
    }

    /// Ancestors from the immediate parent up to the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Pre-order descendants of a node, the node itself excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Element count of the subtree rooted at `node`, the node included.
    pub fn subtree_size(&self, node: NodeId) -> usize {
        let own = usize::from(self.is_element(node));
        own + self
            .descendants(node)
            .iter()
            .filter(|d| self.is_element(**d))
            .count()
    }

    /// All attached element nodes, in pre-order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.is_element(self.root) {
            out.push(self.root);
        }
        out.extend(
            self.descendants(self.root)
                .into_iter()
                .filter(|d| self.is_element(*d)),
        );
        out
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.slot(node).map(|s| &s.data),
            Some(NodeData::Element { .. })
        )
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(
            self.slot(node).map(|s| &s.data),
            Some(NodeData::Text { .. })
        )
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn text_content(&self, node: NodeId) -> Option<&str> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Text { content }) => Some(content.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Element { attributes, .. }) => {
                attributes.get(name).map(|v| v.as_str())
            }
            _ => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Option<&HashMap<String, String>> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Element { attributes, .. }) => Some(attributes),
            _ => None,
        }
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TreeError> {
        match self.slot_mut(node).map(|s| &mut s.data) {
            Some(NodeData::Element { attributes, .. }) => {
                attributes.insert(name.into(), value.into());
                Ok(())
            }
            Some(NodeData::Text { .. }) => Err(TreeError::NotAnElement),
            None => Err(TreeError::NodeNotFound(node)),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(NodeData::Element { attributes, .. }) =
            self.slot_mut(node).map(|s| &mut s.data)
        {
            attributes.remove(name);
        }
    }

    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Element { styles, .. }) => styles.get(name).map(|v| v.as_str()),
            _ => None,
        }
    }

    pub fn set_style(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TreeError> {
        match self.slot_mut(node).map(|s| &mut s.data) {
            Some(NodeData::Element { styles, .. }) => {
                styles.insert(name.into(), value.into());
                Ok(())
            }
            Some(NodeData::Text { .. }) => Err(TreeError::NotAnElement),
            None => Err(TreeError::NodeNotFound(node)),
        }
    }

    pub fn remove_style(&mut self, node: NodeId, name: &str) {
        if let Some(NodeData::Element { styles, .. }) = self.slot_mut(node).map(|s| &mut s.data) {
            styles.remove(name);
        }
    }

    /// Whitespace-split classes of the node's `class` attribute.
    pub fn classes(&self, node: NodeId) -> Vec<&str> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).contains(&class)
    }

    /// Concatenated content of the node's immediate text children,
    /// trimmed. Nested element text does not contribute.
    pub fn direct_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            if let Some(content) = self.text_content(*child) {
                out.push_str(content);
            }
        }
        out.trim().to_string()
    }

    /// Replace the node's immediate text children wholesale with a
    /// single text node at the position of the first one (appended when
    /// none existed). Element children are untouched.
    pub fn set_direct_text(
        &mut self,
        node: NodeId,
        text: impl Into<String>,
    ) -> Result<(), TreeError> {
        if !self.is_element(node) {
            return match self.slot(node) {
                Some(_) => Err(TreeError::NotAnElement),
                None => Err(TreeError::NodeNotFound(node)),
            };
        }
        let text_children: Vec<NodeId> = self
            .children(node)
            .iter()
            .copied()
            .filter(|c| self.is_text(*c))
            .collect();
        let position = self
            .children(node)
            .iter()
            .position(|c| self.is_text(*c))
            .unwrap_or_else(|| self.children(node).len());
        for child in text_children {
            self.detach(child);
        }
        let text_node = self.create_text(text);
        self.insert_child(node, position, text_node)
    }

    /// Index of the node among same-tag siblings, or `None` when it has
    /// no same-tag sibling.
    pub fn same_tag_index(&self, node: NodeId) -> Option<usize> {
        let tag = self.tag(node)?;
        let parent = self.parent(node)?;
        let same_tag: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|c| self.tag(*c) == Some(tag))
            .collect();
        if same_tag.len() <= 1 {
            return None;
        }
        same_tag.iter().position(|c| *c == node)
    }
}
