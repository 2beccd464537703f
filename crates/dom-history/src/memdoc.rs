#![forbid(unsafe_code)]

//! In-memory tree document.
//!
//! A small arena-backed [`TreeDocument`] used by hosts that have no real
//! DOM, and by the test suite. Every mutation, whatever its origin, is
//! appended to an internal log ([`drain_mutations`](MemDocument::drain_mutations))
//! and forwarded to an optional synchronous observer, which is how the
//! recorder hears about edits.
//!
//! Detached nodes stay in the arena, so [`NodeId`]s held by history entries
//! remain valid across undo/redo. Inserting an already-attached node moves
//! it, reported as a removal followed by an insertion.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use crate::command::{CommandError, CommandResult};
use crate::document::{AttributeChange, Mutation, NodeId, TreeDocument};

type Observer = Box<dyn FnMut(&Mutation) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Root,
    Element { tag: String },
    Text,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Keyed by (namespace, local name); BTreeMap keeps snapshots stable.
    attributes: BTreeMap<(Option<String>, String), String>,
    text: Option<String>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            text: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<NodeId, NodeData>,
    next_id: u64,
    log: Vec<Mutation>,
}

impl Inner {
    fn node(&self, id: NodeId) -> Result<&NodeData, CommandError> {
        self.nodes.get(&id).ok_or(CommandError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, CommandError> {
        self.nodes.get_mut(&id).ok_or(CommandError::NodeNotFound(id))
    }

    fn next_sibling_of(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent?;
        let children = &self.nodes.get(&parent)?.children;
        let pos = children.iter().position(|c| *c == node)?;
        children.get(pos + 1).copied()
    }

    fn is_ancestor(&self, maybe_ancestor: NodeId, of: NodeId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == maybe_ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Detach `node` from its parent, returning the removal notification.
    fn detach(&mut self, node: NodeId) -> Result<Option<Mutation>, CommandError> {
        let Some(old_parent) = self.node(node)?.parent else {
            return Ok(None);
        };
        let old_next_sibling = self.next_sibling_of(node);
        let parent_data = self.node_mut(old_parent)?;
        parent_data.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;
        Ok(Some(Mutation::NodeRemoved {
            old_parent,
            old_next_sibling,
            node,
            related: Some(old_parent),
        }))
    }
}

/// Arena-backed in-memory document.
pub struct MemDocument {
    inner: Mutex<Inner>,
    // Separate lock so the observer can call back into the document's
    // queries without deadlocking.
    observer: Mutex<Option<Observer>>,
    root: NodeId,
}

impl Default for MemDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemDocument {
    /// Create a document holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = Inner::default();
        let root = NodeId::new(0);
        inner.nodes.insert(root, NodeData::new(NodeKind::Root));
        inner.next_id = 1;
        Self {
            inner: Mutex::new(inner),
            observer: Mutex::new(None),
            root,
        }
    }

    /// The document root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element node.
    pub fn create_element(&self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Element { tag: tag.into() }))
    }

    /// Create a detached text node.
    pub fn create_text(&self, value: impl Into<String>) -> NodeId {
        let mut data = NodeData::new(NodeKind::Text);
        data.text = Some(value.into());
        self.alloc(data)
    }

    /// Install the synchronous mutation observer, replacing any previous
    /// one. The observer runs on the mutating thread, after the change is
    /// applied and the document lock released.
    pub fn set_observer(&self, observer: impl FnMut(&Mutation) + Send + 'static) {
        *self.lock_observer() = Some(Box::new(observer));
    }

    /// Remove the mutation observer.
    pub fn clear_observer(&self) {
        *self.lock_observer() = None;
    }

    /// Take all logged mutations since the last drain.
    pub fn drain_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.lock().log)
    }

    /// Deterministic serialization of the attached tree, for comparing
    /// document states byte for byte.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let inner = self.lock();
        let mut out = String::new();
        Self::write_node(&inner, self.root, &mut out);
        out
    }

    fn write_node(inner: &Inner, id: NodeId, out: &mut String) {
        let Some(data) = inner.nodes.get(&id) else {
            return;
        };
        match &data.kind {
            NodeKind::Root => out.push_str("(#document"),
            NodeKind::Element { tag } => {
                let _ = write!(out, "({tag}");
            }
            NodeKind::Text => {
                let _ = write!(out, "\"{}\"", data.text.as_deref().unwrap_or(""));
                return;
            }
        }
        for ((namespace, name), value) in &data.attributes {
            match namespace {
                Some(ns) => {
                    let _ = write!(out, " @{ns}|{name}=\"{value}\"");
                }
                None => {
                    let _ = write!(out, " @{name}=\"{value}\"");
                }
            }
        }
        if let Some(text) = &data.text {
            let _ = write!(out, " \"{text}\"");
        }
        for child in &data.children {
            out.push(' ');
            Self::write_node(inner, *child, out);
        }
        out.push(')');
    }

    fn alloc(&self, data: NodeData) -> NodeId {
        let mut inner = self.lock();
        let id = NodeId::new(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, data);
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observer(&self) -> std::sync::MutexGuard<'_, Option<Observer>> {
        self.observer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log and deliver mutations. Must be called with the inner lock
    /// already released.
    fn notify(&self, mutations: Vec<Mutation>) {
        if mutations.is_empty() {
            return;
        }
        {
            let mut inner = self.lock();
            inner.log.extend(mutations.iter().cloned());
        }
        let mut observer = self.lock_observer();
        if let Some(observer) = observer.as_mut() {
            for mutation in &mutations {
                observer(mutation);
            }
        }
    }
}

impl std::fmt::Debug for MemDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemDocument")
            .field("nodes", &inner.nodes.len())
            .field("pending_mutations", &inner.log.len())
            .finish()
    }
}

impl TreeDocument for MemDocument {
    fn insert_before(
        &self,
        parent: NodeId,
        node: NodeId,
        next_sibling: Option<NodeId>,
    ) -> CommandResult {
        let mut emitted = Vec::new();
        {
            let mut inner = self.lock();
            inner.node(parent)?;
            inner.node(node)?;
            if inner.is_ancestor(node, parent) {
                return Err(CommandError::WouldCycle {
                    ancestor: node,
                    node: parent,
                });
            }
            // Validate the reference sibling before touching anything, so a
            // failed insert leaves the tree untouched.
            if let Some(sibling) = next_sibling {
                if sibling == node {
                    return Err(CommandError::InvalidState(
                        "cannot insert a node before itself".to_string(),
                    ));
                }
                if inner.node(sibling)?.parent != Some(parent) {
                    return Err(CommandError::NotAChild {
                        parent,
                        node: sibling,
                    });
                }
            }

            if let Some(removal) = inner.detach(node)? {
                emitted.push(removal);
            }

            let position = match next_sibling {
                Some(sibling) => {
                    let children = &inner.node(parent)?.children;
                    children.iter().position(|c| *c == sibling).ok_or(
                        CommandError::NotAChild {
                            parent,
                            node: sibling,
                        },
                    )?
                }
                None => inner.node(parent)?.children.len(),
            };
            inner.node_mut(parent)?.children.insert(position, node);
            inner.node_mut(node)?.parent = Some(parent);
            emitted.push(Mutation::NodeInserted {
                parent,
                next_sibling,
                node,
            });
        }
        self.notify(emitted);
        Ok(())
    }

    fn remove_node(&self, parent: NodeId, node: NodeId) -> CommandResult {
        let removal = {
            let mut inner = self.lock();
            inner.node(parent)?;
            if inner.node(node)?.parent != Some(parent) {
                return Err(CommandError::NotAChild { parent, node });
            }
            inner.detach(node)?
        };
        self.notify(removal.into_iter().collect());
        Ok(())
    }

    fn set_attribute(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> CommandResult {
        let mutation = {
            let mut inner = self.lock();
            let key = (namespace.map(str::to_string), name.to_string());
            let prev = inner
                .node_mut(element)?
                .attributes
                .insert(key, value.to_string());
            Mutation::AttributeChanged {
                element,
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                change: if prev.is_some() {
                    AttributeChange::Modified
                } else {
                    AttributeChange::Added
                },
                prev_value: prev,
                new_value: Some(value.to_string()),
            }
        };
        self.notify(vec![mutation]);
        Ok(())
    }

    fn remove_attribute(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        name: &str,
    ) -> CommandResult {
        let mutation = {
            let mut inner = self.lock();
            let key = (namespace.map(str::to_string), name.to_string());
            let Some(prev) = inner.node_mut(element)?.attributes.remove(&key) else {
                return Ok(());
            };
            Mutation::AttributeChanged {
                element,
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                change: AttributeChange::Removed,
                prev_value: Some(prev),
                new_value: None,
            }
        };
        self.notify(vec![mutation]);
        Ok(())
    }

    fn set_text(&self, node: NodeId, value: &str) -> CommandResult {
        let mutation = {
            let mut inner = self.lock();
            let data = inner.node_mut(node)?;
            let prev_value = data.text.take().unwrap_or_default();
            data.text = Some(value.to_string());
            Mutation::TextChanged {
                node,
                prev_value,
                new_value: value.to_string(),
            }
        };
        self.notify(vec![mutation]);
        Ok(())
    }

    fn contains(&self, node: NodeId) -> bool {
        self.lock().nodes.contains_key(&node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.lock().next_sibling_of(node)
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.lock().nodes.get(&node)?.text.clone()
    }

    fn node_label(&self, node: NodeId) -> String {
        let inner = self.lock();
        let Some(data) = inner.nodes.get(&node) else {
            return format!("node {node}");
        };
        match &data.kind {
            NodeKind::Root => "#document".to_string(),
            NodeKind::Text => "#text".to_string(),
            NodeKind::Element { tag } => {
                match data.attributes.get(&(None, "id".to_string())) {
                    Some(id) => format!("{tag} \"{id}\""),
                    None => tag.clone(),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
