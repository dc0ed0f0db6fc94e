//! Client-side mirror of a rendered page.
//!
//! Contract:
//! - The mirror holds the DOM a tree describes: fragments are flattened and
//!   components rendered once, when a subtree enters the mirror.
//! - Only nodes with a non-empty hid are addressable by patches.
//! - Batches apply in order and move the mirror from `from` to `to == from.next()`.
//! - A failing patch leaves the earlier patches of its batch applied and the
//!   version unchanged; callers resync with fresh markup.

use core_types::RenderVersion;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::slice;
use std::sync::Arc;
use vdom::traverse::for_each_dom_node;
use vdom::{Hid, Node, NodeData, Patch, PatchOp, is_attribute_prop};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomPatchError {
    MissingHid(Hid),
    EmptyHid(PatchOp),
    DuplicateHid(Hid),
    WrongNodeKind(Hid),
    VersionMismatch {
        expected: RenderVersion,
        got: RenderVersion,
    },
    NonMonotonicVersion {
        from: RenderVersion,
        to: RenderVersion,
    },
    InvalidParent(Hid),
    MissingRoot,
}

impl fmt::Display for DomPatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomPatchError::MissingHid(hid) => write!(f, "no node with hid {hid}"),
            DomPatchError::EmptyHid(op) => write!(f, "{op} targets an unaddressable node"),
            DomPatchError::DuplicateHid(hid) => write!(f, "hid {hid} is already in use"),
            DomPatchError::WrongNodeKind(hid) => write!(f, "node {hid} has the wrong kind"),
            DomPatchError::VersionMismatch { expected, got } => {
                write!(f, "version mismatch: at {expected}, batch starts at {got}")
            }
            DomPatchError::NonMonotonicVersion { from, to } => {
                write!(f, "batch {from} -> {to} is not a single step")
            }
            DomPatchError::InvalidParent(hid) => write!(f, "node {hid} cannot take this child"),
            DomPatchError::MissingRoot => write!(f, "mirror is empty"),
        }
    }
}

impl std::error::Error for DomPatchError {}

/// Live form state the client keeps outside the attribute set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub selected: Option<bool>,
}

pub struct DomStore {
    version: RenderVersion,
    arena: DomArena,
    focused: Option<Hid>,
}

impl DomStore {
    /// Mirror the DOM described by `tree` at `RenderVersion::INITIAL`.
    pub fn from_tree(tree: &Node) -> Result<Self, DomPatchError> {
        let mut arena = DomArena::new();
        let built = arena.build(slice::from_ref(tree))?;
        for (offset, index) in built.into_iter().enumerate() {
            arena.attach(DOCUMENT, offset, index);
        }
        Ok(Self {
            version: RenderVersion::INITIAL,
            arena,
            focused: None,
        })
    }

    pub fn version(&self) -> RenderVersion {
        self.version
    }

    pub fn apply(
        &mut self,
        from: RenderVersion,
        to: RenderVersion,
        patches: &[Patch],
    ) -> Result<(), DomPatchError> {
        if self.version != from {
            return Err(DomPatchError::VersionMismatch {
                expected: self.version,
                got: from,
            });
        }
        if to != from.next() {
            return Err(DomPatchError::NonMonotonicVersion { from, to });
        }
        for patch in patches {
            self.apply_one(patch)?;
        }
        self.version = to;
        Ok(())
    }

    fn apply_one(&mut self, patch: &Patch) -> Result<(), DomPatchError> {
        let op = patch.op();
        log::trace!(target: "livetree.dom_store", "apply {op} -> {:?}", patch.target());
        match patch {
            Patch::SetText { hid, text } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.set_text(index, hid, text)?;
            }
            Patch::SetAttr { hid, key, value } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.element_mut(index, hid)?.attrs.insert(key.clone(), value.clone());
            }
            Patch::RemoveAttr { hid, key } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.element_mut(index, hid)?.attrs.remove(key);
            }
            Patch::InsertNode {
                parent_id,
                index,
                node,
            } => {
                let parent = self.arena.lookup(parent_id, op)?;
                if !self.arena.nodes[parent].allows_children() {
                    return Err(DomPatchError::InvalidParent(parent_id.clone()));
                }
                let built = self.arena.build(slice::from_ref(node))?;
                for (offset, child) in built.into_iter().enumerate() {
                    self.arena.attach(parent, index + offset, child);
                }
            }
            Patch::RemoveNode { hid } => {
                let index = self.arena.lookup(hid, op)?;
                self.remove_subtree(index);
            }
            Patch::MoveNode {
                hid,
                parent_id,
                index,
            } => {
                let child = self.arena.lookup(hid, op)?;
                let parent = self.arena.lookup(parent_id, op)?;
                if !self.arena.nodes[parent].allows_children()
                    || self.arena.is_ancestor_or_self(child, parent)
                {
                    return Err(DomPatchError::InvalidParent(parent_id.clone()));
                }
                self.arena.detach(child);
                self.arena.attach(parent, *index, child);
            }
            Patch::ReplaceNode { hid, node } => {
                let old = self.arena.lookup(hid, op)?;
                let Some(parent) = self.arena.nodes[old].parent else {
                    return Err(DomPatchError::InvalidParent(hid.clone()));
                };
                let at = self.arena.detach(old).unwrap_or(0);
                self.arena.unindex(old);
                let built = self.arena.build(slice::from_ref(node))?;
                for (offset, child) in built.into_iter().enumerate() {
                    self.arena.attach(parent, at + offset, child);
                }
            }
            Patch::SetValue { hid, value } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.element_mut(index, hid)?.form.value = Some(value.clone());
            }
            Patch::SetChecked { hid, checked } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.element_mut(index, hid)?.form.checked = Some(*checked);
            }
            Patch::SetSelected { hid, selected } => {
                let index = self.arena.lookup(hid, op)?;
                self.arena.element_mut(index, hid)?.form.selected = Some(*selected);
            }
            Patch::Focus { hid } => {
                self.arena.lookup(hid, op)?;
                self.focused = Some(hid.clone());
            }
        }
        if self
            .focused
            .as_ref()
            .is_some_and(|hid| !self.arena.live.contains_key(hid))
        {
            self.focused = None;
        }
        Ok(())
    }

    fn remove_subtree(&mut self, index: usize) {
        self.arena.detach(index);
        self.arena.unindex(index);
    }

    pub fn contains(&self, hid: &Hid) -> bool {
        self.arena.live.contains_key(hid)
    }

    /// Number of addressable nodes.
    pub fn hid_count(&self) -> usize {
        self.arena.live.len()
    }

    pub fn attribute(&self, hid: &Hid, name: &str) -> Option<&str> {
        let index = *self.arena.live.get(hid)?;
        match &self.arena.nodes[index].kind {
            RecordKind::Element(element) => element.attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn form_state(&self, hid: &Hid) -> Option<&FormState> {
        let index = *self.arena.live.get(hid)?;
        match &self.arena.nodes[index].kind {
            RecordKind::Element(element) => Some(&element.form),
            _ => None,
        }
    }

    pub fn focused(&self) -> Option<&Hid> {
        self.focused.as_ref()
    }

    /// Rebuild a tree from the mirror. A single top-level node comes back as
    /// itself, several as a fragment.
    pub fn materialize(&self) -> Result<Node, DomPatchError> {
        let top = &self.arena.nodes[DOCUMENT].children;
        match top.as_slice() {
            [] => Err(DomPatchError::MissingRoot),
            [only] => Ok(self.arena.materialize(*only)),
            many => Ok(Node::fragment(
                many.iter().map(|index| self.arena.materialize(*index)),
            )),
        }
    }
}

const DOCUMENT: usize = 0;

struct DomArena {
    nodes: Vec<NodeRecord>,
    live: HashMap<Hid, usize>,
}

impl DomArena {
    fn new() -> Self {
        Self {
            nodes: vec![NodeRecord {
                hid: Hid::EMPTY,
                kind: RecordKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            live: HashMap::new(),
        }
    }

    fn lookup(&self, hid: &Hid, op: PatchOp) -> Result<usize, DomPatchError> {
        if hid.is_empty() {
            return Err(DomPatchError::EmptyHid(op));
        }
        self.live
            .get(hid)
            .copied()
            .ok_or_else(|| DomPatchError::MissingHid(hid.clone()))
    }

    /// Create detached records for the DOM nodes of `nodes`, returning the
    /// top-level ones in order.
    fn build(&mut self, nodes: &[Node]) -> Result<Vec<usize>, DomPatchError> {
        let mut built = Vec::new();
        let mut failure = None;
        for_each_dom_node(nodes, &mut |node| {
            if failure.is_some() {
                return;
            }
            match self.build_one(node) {
                Ok(index) => built.push(index),
                Err(err) => failure = Some(err),
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(built),
        }
    }

    fn build_one(&mut self, node: &Node) -> Result<usize, DomPatchError> {
        let kind = match &node.data {
            NodeData::Element(element) => RecordKind::Element(ElementRecord {
                tag: Arc::clone(&element.tag),
                attrs: element
                    .props
                    .iter()
                    .filter(|(name, _)| is_attribute_prop(name))
                    .filter_map(|(name, value)| {
                        value.to_dom_attr().map(|value| (name.clone(), value))
                    })
                    .collect(),
                form: FormState::default(),
            }),
            NodeData::Text(text) => RecordKind::Text(text.clone()),
            NodeData::Raw(raw) => RecordKind::Raw(raw.clone()),
            NodeData::Fragment(_) | NodeData::Component(_) => {
                debug_assert!(false, "traversal yields DOM nodes only");
                return Err(DomPatchError::WrongNodeKind(node.hid.clone()));
            }
        };
        let index = self.push(node.hid.clone(), kind)?;
        if let NodeData::Element(element) = &node.data {
            let children = self.build(&element.children)?;
            for (offset, child) in children.into_iter().enumerate() {
                self.attach(index, offset, child);
            }
        }
        Ok(index)
    }

    fn push(&mut self, hid: Hid, kind: RecordKind) -> Result<usize, DomPatchError> {
        let index = self.nodes.len();
        if !hid.is_empty() {
            if self.live.contains_key(&hid) {
                return Err(DomPatchError::DuplicateHid(hid));
            }
            self.live.insert(hid.clone(), index);
        }
        self.nodes.push(NodeRecord {
            hid,
            kind,
            parent: None,
            children: Vec::new(),
        });
        Ok(index)
    }

    /// Insert a detached node at `position` among `parent`'s children; positions
    /// past the end append.
    fn attach(&mut self, parent: usize, position: usize, child: usize) {
        debug_assert!(self.nodes[child].parent.is_none(), "child already attached");
        let siblings = &mut self.nodes[parent].children;
        let at = position.min(siblings.len());
        siblings.insert(at, child);
        self.nodes[child].parent = Some(parent);
    }

    /// Detach `index` from its parent, returning its former position.
    fn detach(&mut self, index: usize) -> Option<usize> {
        let parent = self.nodes[index].parent.take()?;
        let siblings = &mut self.nodes[parent].children;
        let at = siblings.iter().position(|child| *child == index)?;
        siblings.remove(at);
        Some(at)
    }

    fn is_ancestor_or_self(&self, ancestor: usize, mut node: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn element_mut(&mut self, index: usize, hid: &Hid) -> Result<&mut ElementRecord, DomPatchError> {
        match &mut self.nodes[index].kind {
            RecordKind::Element(element) => Ok(element),
            _ => Err(DomPatchError::WrongNodeKind(hid.clone())),
        }
    }

    fn set_text(&mut self, index: usize, hid: &Hid, text: &str) -> Result<(), DomPatchError> {
        match &mut self.nodes[index].kind {
            RecordKind::Text(existing) => {
                existing.clear();
                existing.push_str(text);
                return Ok(());
            }
            RecordKind::Element(_) => {}
            RecordKind::Raw(_) | RecordKind::Document => {
                return Err(DomPatchError::WrongNodeKind(hid.clone()));
            }
        }
        let old = std::mem::take(&mut self.nodes[index].children);
        for child in old {
            self.nodes[child].parent = None;
            self.unindex(child);
        }
        let text = self.push(Hid::EMPTY, RecordKind::Text(text.to_string()))?;
        self.attach(index, 0, text);
        Ok(())
    }

    /// Drop the hids of a detached subtree from the index.
    fn unindex(&mut self, index: usize) {
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            let record = &self.nodes[current];
            if !record.hid.is_empty() {
                self.live.remove(&record.hid);
            }
            stack.extend(self.nodes[current].children.iter().copied());
        }
    }

    fn materialize(&self, index: usize) -> Node {
        let record = &self.nodes[index];
        let mut node = match &record.kind {
            RecordKind::Element(element) => {
                let mut node = Node::element(Arc::clone(&element.tag));
                for (name, value) in &element.attrs {
                    node = node.with_prop(name.as_str(), value.as_str());
                }
                node.with_children(record.children.iter().map(|child| self.materialize(*child)))
            }
            RecordKind::Text(text) => Node::text(text.as_str()),
            RecordKind::Raw(raw) => Node::raw(raw.as_str()),
            RecordKind::Document => {
                Node::fragment(record.children.iter().map(|child| self.materialize(*child)))
            }
        };
        node.hid = record.hid.clone();
        node
    }
}

struct NodeRecord {
    hid: Hid,
    kind: RecordKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl NodeRecord {
    fn allows_children(&self) -> bool {
        matches!(self.kind, RecordKind::Element(_))
    }
}

enum RecordKind {
    Document,
    Element(ElementRecord),
    Text(String),
    Raw(String),
}

struct ElementRecord {
    tag: Arc<str>,
    attrs: BTreeMap<String, String>,
    form: FormState,
}
