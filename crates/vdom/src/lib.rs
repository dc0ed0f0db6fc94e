//! Reconciliation core: node trees, hydration ids, diffing and the patch protocol.

pub mod diff;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod hid;
pub mod render;
pub mod traverse;

mod node;
mod patch;

pub use crate::diff::{DiffOptions, Stamp, diff, diff_into, diff_with};
pub use crate::hid::{
    HidGenerator, HidPolicy, assign_all_hids, assign_hids, assign_with_policy, clear_hids,
    collect_hids, copy_hids, find_by_hid,
};
pub use crate::node::{
    Element, HandlerRef, Hid, KEY_PROP, Node, NodeData, NodeKind, PropValue, Props, Render,
    is_attribute_prop, is_event_prop, kind_name,
};
pub use crate::patch::{Patch, PatchOp, PatchSink, op_name};
pub use crate::render::{RenderOptions, render_html, render_into};
