//! Patch protocol shared by the diff engine and patch consumers.
//!
//! Invariants:
//! - Patches are applied in emission order.
//! - Nodes are addressed by hydration id; `InsertNode`/`MoveNode` indices are
//!   positions in the parent's live child list at the time the patch is applied
//!   (for moves: after the moved node has been detached). Fragments and components
//!   among the siblings shift these positions, since they own no DOM node.
//! - `SetText` may target an element; the applier then replaces its text content.
//! - `SetValue`, `SetChecked`, `SetSelected` and `Focus` are produced by
//!   controlled-input runtime code, never by the diff engine.

use crate::node::{Hid, Node};
use std::fmt;

/// Operation code. Values `0x01..=0x0B` are the transport encoding.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatchOp {
    SetText = 0x01,
    SetAttr = 0x02,
    RemoveAttr = 0x03,
    InsertNode = 0x04,
    RemoveNode = 0x05,
    MoveNode = 0x06,
    ReplaceNode = 0x07,
    SetValue = 0x08,
    SetChecked = 0x09,
    SetSelected = 0x0A,
    Focus = 0x0B,
}

impl PatchOp {
    pub const ALL: [PatchOp; 11] = [
        PatchOp::SetText,
        PatchOp::SetAttr,
        PatchOp::RemoveAttr,
        PatchOp::InsertNode,
        PatchOp::RemoveNode,
        PatchOp::MoveNode,
        PatchOp::ReplaceNode,
        PatchOp::SetValue,
        PatchOp::SetChecked,
        PatchOp::SetSelected,
        PatchOp::Focus,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::SetText),
            0x02 => Some(Self::SetAttr),
            0x03 => Some(Self::RemoveAttr),
            0x04 => Some(Self::InsertNode),
            0x05 => Some(Self::RemoveNode),
            0x06 => Some(Self::MoveNode),
            0x07 => Some(Self::ReplaceNode),
            0x08 => Some(Self::SetValue),
            0x09 => Some(Self::SetChecked),
            0x0A => Some(Self::SetSelected),
            0x0B => Some(Self::Focus),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SetText => "SetText",
            Self::SetAttr => "SetAttr",
            Self::RemoveAttr => "RemoveAttr",
            Self::InsertNode => "InsertNode",
            Self::RemoveNode => "RemoveNode",
            Self::MoveNode => "MoveNode",
            Self::ReplaceNode => "ReplaceNode",
            Self::SetValue => "SetValue",
            Self::SetChecked => "SetChecked",
            Self::SetSelected => "SetSelected",
            Self::Focus => "Focus",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name for a raw op code; unrecognized codes map to `"Unknown"`.
pub fn op_name(code: u8) -> &'static str {
    PatchOp::from_code(code).map_or("Unknown", PatchOp::name)
}

/// One DOM mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    /// Replace the text of a text node, or the text content of an element.
    SetText { hid: Hid, text: String },
    SetAttr { hid: Hid, key: String, value: String },
    RemoveAttr { hid: Hid, key: String },
    /// Insert `node` (and its subtree) into `parent_id` at `index`.
    InsertNode {
        parent_id: Hid,
        index: usize,
        node: Node,
    },
    /// Remove a node and its subtree.
    RemoveNode { hid: Hid },
    /// Detach a node and reinsert it under `parent_id` at `index`.
    MoveNode {
        hid: Hid,
        parent_id: Hid,
        index: usize,
    },
    /// Replace a node and its subtree with `node`.
    ReplaceNode { hid: Hid, node: Node },
    SetValue { hid: Hid, value: String },
    SetChecked { hid: Hid, checked: bool },
    SetSelected { hid: Hid, selected: bool },
    Focus { hid: Hid },
}

impl Patch {
    pub fn op(&self) -> PatchOp {
        match self {
            Patch::SetText { .. } => PatchOp::SetText,
            Patch::SetAttr { .. } => PatchOp::SetAttr,
            Patch::RemoveAttr { .. } => PatchOp::RemoveAttr,
            Patch::InsertNode { .. } => PatchOp::InsertNode,
            Patch::RemoveNode { .. } => PatchOp::RemoveNode,
            Patch::MoveNode { .. } => PatchOp::MoveNode,
            Patch::ReplaceNode { .. } => PatchOp::ReplaceNode,
            Patch::SetValue { .. } => PatchOp::SetValue,
            Patch::SetChecked { .. } => PatchOp::SetChecked,
            Patch::SetSelected { .. } => PatchOp::SetSelected,
            Patch::Focus { .. } => PatchOp::Focus,
        }
    }

    /// The node this patch addresses; the parent for `InsertNode`.
    pub fn target(&self) -> &Hid {
        match self {
            Patch::InsertNode { parent_id, .. } => parent_id,
            Patch::SetText { hid, .. }
            | Patch::SetAttr { hid, .. }
            | Patch::RemoveAttr { hid, .. }
            | Patch::RemoveNode { hid }
            | Patch::MoveNode { hid, .. }
            | Patch::ReplaceNode { hid, .. }
            | Patch::SetValue { hid, .. }
            | Patch::SetChecked { hid, .. }
            | Patch::SetSelected { hid, .. }
            | Patch::Focus { hid } => hid,
        }
    }
}

/// Destination for emitted patches.
pub trait PatchSink {
    fn push(&mut self, patch: Patch);

    fn extend_from_slice(&mut self, patches: &[Patch]) {
        for patch in patches {
            self.push(patch.clone());
        }
    }
}

impl PatchSink for Vec<Patch> {
    fn push(&mut self, patch: Patch) {
        Vec::push(self, patch);
    }

    fn extend_from_slice(&mut self, patches: &[Patch]) {
        Vec::extend_from_slice(self, patches);
    }
}
