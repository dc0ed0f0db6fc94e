//! Tree diffing to ordered patch lists.
//!
//! Contract:
//! - `prev` is the tree the client currently shows; `next` is the freshly rendered
//!   tree. Every matched `next` node receives the `hid` of its `prev` counterpart,
//!   even when no patch is emitted for it.
//! - Output order is deterministic: pre-order over `next`, props in name order,
//!   keyed removals after all keyed inserts/moves of the same parent.
//! - Kind or tag changes, and raw payload changes, are coarse `ReplaceNode`s.
//! - Event-handler props and `"key"` never produce attribute patches.
//! - Bool props follow DOM presence: `true` sets an empty attribute, `false`
//!   removes it, or emits nothing when it was not present.
//! - Insertions are emitted by the parent; a node that only exists in `next` is
//!   never patched on its own.
//! - Components are rendered on both sides on every call and their outputs diffed.
//!   Their output is never stamped, so patches inside it carry empty hids.
//!
//! Complexity: linear in the nodes visited on both sides, except keyed child lists,
//! which additionally pay O(k) per moved or inserted child to track live positions.

use crate::hid::{HidGenerator, HidPolicy, assign_with_policy};
use crate::node::{Hid, Node, NodeData, PropValue, Props, is_attribute_prop};
use crate::patch::{Patch, PatchSink};
use std::collections::HashMap;

/// Fresh-id stamping for subtrees that enter the DOM through a patch payload.
#[derive(Clone, Copy, Debug)]
pub struct Stamp<'a> {
    pub generator: &'a HidGenerator,
    pub policy: HidPolicy,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiffOptions<'a> {
    /// When set, `InsertNode`/`ReplaceNode` payloads are stamped before emission so
    /// the retained `next` tree and the client agree on the new ids.
    pub stamp: Option<Stamp<'a>>,
}

pub fn diff(prev: Option<&Node>, next: Option<&mut Node>) -> Vec<Patch> {
    diff_with(prev, next, &DiffOptions::default())
}

pub fn diff_with(
    prev: Option<&Node>,
    next: Option<&mut Node>,
    options: &DiffOptions<'_>,
) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_into(prev, next, options, &mut patches);
    log::debug!(target: "livetree.diff", "diff produced {} patches", patches.len());
    patches
}

pub fn diff_into<S>(
    prev: Option<&Node>,
    next: Option<&mut Node>,
    options: &DiffOptions<'_>,
    sink: &mut S,
) where
    S: PatchSink + ?Sized,
{
    let mut differ = Differ { options, sink };
    differ.diff_node(prev, next, &Hid::EMPTY);
}

struct Differ<'o, 'a, S: ?Sized> {
    options: &'o DiffOptions<'a>,
    sink: &'o mut S,
}

/// Entry in the simulated live child list of a keyed parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Prev(usize),
    Next(usize),
}

impl<S: PatchSink + ?Sized> Differ<'_, '_, S> {
    fn diff_node(&mut self, prev: Option<&Node>, next: Option<&mut Node>, parent: &Hid) {
        match (prev, next) {
            (None, _) => {}
            (Some(prev), None) => self.sink.push(Patch::RemoveNode {
                hid: prev.hid.clone(),
            }),
            (Some(prev), Some(next)) => self.diff_pair(prev, next, parent),
        }
    }

    fn diff_pair(&mut self, prev: &Node, next: &mut Node, parent: &Hid) {
        log::trace!(
            target: "livetree.diff",
            "visit {} {:?} under {:?}",
            next.kind(),
            prev.hid,
            parent
        );
        let replace = match (&prev.data, &next.data) {
            (NodeData::Element(old), NodeData::Element(new)) => old.tag != new.tag,
            (NodeData::Raw(old), NodeData::Raw(new)) => {
                next.hid = prev.hid.clone();
                old != new
            }
            _ => prev.kind() != next.kind(),
        };
        if replace {
            self.replace(prev, next);
            return;
        }

        next.hid = prev.hid.clone();
        match (&prev.data, &mut next.data) {
            (NodeData::Text(old), NodeData::Text(new)) => {
                if old != new {
                    let hid = if prev.hid.is_empty() {
                        parent.clone()
                    } else {
                        prev.hid.clone()
                    };
                    self.sink.push(Patch::SetText {
                        hid,
                        text: new.clone(),
                    });
                }
            }
            (NodeData::Element(old), NodeData::Element(new)) => {
                self.diff_props(&prev.hid, &old.props, &new.props);
                self.diff_children(&old.children, &mut new.children, &prev.hid);
            }
            (NodeData::Fragment(old), NodeData::Fragment(new)) => {
                self.diff_children(old, new, parent);
            }
            (NodeData::Component(old), NodeData::Component(new)) => {
                if let (Some(old), Some(new)) = (old, new) {
                    let before = old.render();
                    let mut after = new.render();
                    self.diff_node(Some(&before), Some(&mut after), parent);
                }
            }
            (NodeData::Raw(_), NodeData::Raw(_)) => {}
            _ => debug_assert!(false, "kind mismatch must be replaced"),
        }
    }

    fn replace(&mut self, prev: &Node, next: &mut Node) {
        self.stamp(next);
        self.sink.push(Patch::ReplaceNode {
            hid: prev.hid.clone(),
            node: next.clone(),
        });
    }

    fn insert(&mut self, parent: &Hid, index: usize, node: &mut Node) {
        self.stamp(node);
        self.sink.push(Patch::InsertNode {
            parent_id: parent.clone(),
            index,
            node: node.clone(),
        });
    }

    fn stamp(&self, node: &mut Node) {
        if let Some(stamp) = self.options.stamp {
            assign_with_policy(node, stamp.generator, stamp.policy);
        }
    }

    fn diff_props(&mut self, hid: &Hid, prev: &Props, next: &Props) {
        for (key, old) in prev {
            if !is_attribute_prop(key) {
                continue;
            }
            match next.get(key) {
                None => self.sink.push(Patch::RemoveAttr {
                    hid: hid.clone(),
                    key: key.clone(),
                }),
                Some(new) if new != old => self.set_attr(hid, key, Some(old), new),
                Some(_) => {}
            }
        }
        for (key, new) in next {
            if !is_attribute_prop(key) || prev.contains_key(key) {
                continue;
            }
            self.set_attr(hid, key, None, new);
        }
    }

    fn set_attr(&mut self, hid: &Hid, key: &str, old: Option<&PropValue>, new: &PropValue) {
        match new.to_dom_attr() {
            Some(value) => self.sink.push(Patch::SetAttr {
                hid: hid.clone(),
                key: key.to_string(),
                value,
            }),
            None if matches!(new, PropValue::Bool(false)) => {
                if old.and_then(PropValue::to_dom_attr).is_some() {
                    self.sink.push(Patch::RemoveAttr {
                        hid: hid.clone(),
                        key: key.to_string(),
                    });
                }
            }
            None => log::trace!(
                target: "livetree.diff",
                "dropping prop {key} on {hid:?}: no attribute form"
            ),
        }
    }

    fn diff_children(&mut self, prev: &[Node], next: &mut [Node], parent: &Hid) {
        let keyed = prev.iter().chain(next.iter()).any(Node::has_key);
        if keyed {
            self.diff_keyed(prev, next, parent);
        } else {
            self.diff_positional(prev, next, parent);
        }
    }

    fn diff_positional(&mut self, prev: &[Node], next: &mut [Node], parent: &Hid) {
        let len = prev.len().max(next.len());
        for index in 0..len {
            match (prev.get(index), next.get_mut(index)) {
                (Some(old), Some(new)) => self.diff_node(Some(old), Some(new), parent),
                (None, Some(new)) => self.insert(parent, index, new),
                (Some(old), None) => self.sink.push(Patch::RemoveNode {
                    hid: old.hid.clone(),
                }),
                (None, None) => {}
            }
        }
    }

    /// Keyed reconciliation.
    ///
    /// A matched child stays in place while its previous index keeps increasing
    /// along `next`; any other matched child is moved, and every new child is
    /// inserted, directly after the child placed before it. Unkeyed children in a
    /// keyed list never match. Unmatched previous children are removed last.
    fn diff_keyed(&mut self, prev: &[Node], next: &mut [Node], parent: &Hid) {
        let prev_keys: HashMap<&str, usize> = prev
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.key_str().map(|key| (key, index)))
            .collect();
        let mut matched = vec![false; prev.len()];
        let mut live: Vec<Slot> = (0..prev.len()).map(Slot::Prev).collect();
        let mut kept_up_to = 0usize;
        let mut placed: Option<Slot> = None;

        for (index, child) in next.iter_mut().enumerate() {
            let found = child
                .key_str()
                .and_then(|key| prev_keys.get(key).copied())
                .filter(|&old_index| !matched[old_index]);
            match found {
                Some(old_index) => {
                    matched[old_index] = true;
                    let slot = Slot::Prev(old_index);
                    if old_index < kept_up_to {
                        if let Some(at) = live.iter().position(|s| *s == slot) {
                            live.remove(at);
                        }
                        let to = insertion_point(&live, placed);
                        live.insert(to, slot);
                        self.sink.push(Patch::MoveNode {
                            hid: prev[old_index].hid.clone(),
                            parent_id: parent.clone(),
                            index: to,
                        });
                    } else {
                        kept_up_to = old_index;
                    }
                    placed = Some(slot);
                    self.diff_node(Some(&prev[old_index]), Some(child), parent);
                }
                None => {
                    let slot = Slot::Next(index);
                    let to = insertion_point(&live, placed);
                    live.insert(to, slot);
                    self.insert(parent, to, child);
                    placed = Some(slot);
                }
            }
        }

        for (old, _) in prev.iter().zip(&matched).filter(|(_, matched)| !**matched) {
            self.sink.push(Patch::RemoveNode {
                hid: old.hid.clone(),
            });
        }
    }
}

fn insertion_point(live: &[Slot], placed: Option<Slot>) -> usize {
    placed
        .and_then(|slot| live.iter().position(|s| *s == slot))
        .map_or(0, |at| at + 1)
}
