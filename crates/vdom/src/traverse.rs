use crate::node::{Node, NodeData};
use std::slice;

/// Visit the nodes that exist in the DOM for `nodes`: fragments are inlined,
/// components are rendered, absent components contribute nothing.
pub fn for_each_dom_node(nodes: &[Node], f: &mut dyn FnMut(&Node)) {
    for node in nodes {
        match &node.data {
            NodeData::Fragment(children) => for_each_dom_node(children, f),
            NodeData::Component(Some(render)) => {
                let output = render.render();
                for_each_dom_node(slice::from_ref(&output), f);
            }
            NodeData::Component(None) => {}
            NodeData::Element(_) | NodeData::Text(_) | NodeData::Raw(_) => f(node),
        }
    }
}

/// Number of DOM nodes `node` contributes to its parent.
pub fn dom_width(node: &Node) -> usize {
    let mut width = 0usize;
    for_each_dom_node(slice::from_ref(node), &mut |_| width += 1);
    width
}
