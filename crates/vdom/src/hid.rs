//! Hydration-id allocation and tree stamping.
//!
//! Ids are only ever placed on Element nodes. Text, fragment, raw and component
//! nodes stay unaddressable; component output is produced at render time and is
//! not reachable from the tree that holds the component.

use crate::node::{Hid, Node, NodeData};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Monotonic id source, shared by every render pass of one session.
#[derive(Debug, Default)]
pub struct HidGenerator {
    counter: Mutex<u64>,
}

impl HidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume numbering after `issued` ids have already been handed out.
    pub fn starting_after(issued: u64) -> Self {
        Self {
            counter: Mutex::new(issued),
        }
    }

    pub fn next(&self) -> Hid {
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        Hid::from(format!("h{}", *counter))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        *self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Which elements receive hydration ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HidPolicy {
    /// Only elements carrying an event-handler prop.
    #[default]
    Interactive,
    /// Every element, so any node can be patched directly.
    All,
}

/// Stamp interactive elements that do not have an id yet.
pub fn assign_hids(root: &mut Node, generator: &HidGenerator) {
    assign_with_policy(root, generator, HidPolicy::Interactive);
}

/// Stamp every element that does not have an id yet.
pub fn assign_all_hids(root: &mut Node, generator: &HidGenerator) {
    assign_with_policy(root, generator, HidPolicy::All);
}

pub fn assign_with_policy(root: &mut Node, generator: &HidGenerator, policy: HidPolicy) {
    fn walk(node: &mut Node, generator: &HidGenerator, policy: HidPolicy, assigned: &mut usize) {
        let eligible = match &node.data {
            NodeData::Element(_) => match policy {
                HidPolicy::All => true,
                HidPolicy::Interactive => node.is_interactive(),
            },
            _ => false,
        };
        // only assign if currently unset
        if eligible && node.hid.is_empty() {
            node.hid = generator.next();
            *assigned += 1;
        }
        if let Some(children) = node.children_mut() {
            for child in children {
                walk(child, generator, policy, assigned);
            }
        }
    }

    let mut assigned = 0usize;
    walk(root, generator, policy, &mut assigned);
    log::trace!(target: "livetree.hid", "assigned {assigned} ids ({policy:?})");
}

/// Copy ids from `src` onto a tree of the same shape.
///
/// Returns `false` as soon as two corresponding nodes have different child
/// counts. `dst` may already be partially stamped at that point; callers must
/// clear and reassign rather than trust it.
pub fn copy_hids(src: &Node, dst: &mut Node) -> bool {
    dst.hid = src.hid.clone();
    let src_children = src.children();
    let Some(dst_children) = dst.children_mut() else {
        return src_children.is_empty();
    };
    if src_children.len() != dst_children.len() {
        log::debug!(
            target: "livetree.hid",
            "copy_hids shape mismatch under {:?}: {} vs {} children",
            src.hid,
            src_children.len(),
            dst_children.len()
        );
        return false;
    }
    src_children
        .iter()
        .zip(dst_children.iter_mut())
        .all(|(src, dst)| copy_hids(src, dst))
}

pub fn find_by_hid<'a>(node: &'a Node, hid: &Hid) -> Option<&'a Node> {
    if hid.is_empty() {
        return None;
    }
    if node.hid == *hid {
        return Some(node);
    }
    node.children()
        .iter()
        .find_map(|child| find_by_hid(child, hid))
}

/// Build the `hid -> node` index of a stamped tree. Unstamped nodes are skipped.
pub fn collect_hids(root: &Node) -> HashMap<Hid, &Node> {
    fn walk<'a>(node: &'a Node, out: &mut HashMap<Hid, &'a Node>) {
        if !node.hid.is_empty() {
            out.insert(node.hid.clone(), node);
        }
        for child in node.children() {
            walk(child, out);
        }
    }

    let mut out = HashMap::new();
    walk(root, &mut out);
    out
}

/// Reset every id in the tree to the unhydrated state.
pub fn clear_hids(node: &mut Node) {
    node.hid = Hid::EMPTY;
    if let Some(children) = node.children_mut() {
        for child in children {
            clear_hids(child);
        }
    }
}
