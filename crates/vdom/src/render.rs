//! Initial full-page markup.
//!
//! Every node carrying a hydration id is serialized with the id attribute so the
//! client can index its DOM before the first patch arrives.

use crate::node::{Node, NodeData, PropValue, is_attribute_prop};
use memchr::memchr3;
use std::borrow::Cow;

#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Attribute that carries the hydration id.
    pub hid_attribute: Cow<'static, str>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hid_attribute: Cow::Borrowed("data-hid"),
        }
    }
}

pub fn render_html(node: &Node, options: &RenderOptions) -> String {
    let mut out = String::new();
    render_into(node, options, &mut out);
    out
}

pub fn render_into(node: &Node, options: &RenderOptions, out: &mut String) {
    match &node.data {
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.props {
                if !is_attribute_prop(name) {
                    continue;
                }
                match value.to_dom_attr() {
                    Some(_) if matches!(value, PropValue::Bool(true)) => {
                        out.push(' ');
                        out.push_str(name);
                    }
                    Some(text) => push_attr(out, name, &text),
                    None => {}
                }
            }
            if !node.hid.is_empty() {
                push_attr(out, &options.hid_attribute, node.hid.as_str());
            }
            out.push('>');
            if is_void_element(&element.tag) && element.children.is_empty() {
                return;
            }
            for child in &element.children {
                render_into(child, options, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        NodeData::Text(text) => push_escaped(out, text, Context::Text),
        NodeData::Raw(raw) => out.push_str(raw),
        NodeData::Fragment(children) => {
            for child in children {
                render_into(child, options, out);
            }
        }
        NodeData::Component(Some(render)) => {
            let output = render.render();
            render_into(&output, options, out);
        }
        NodeData::Component(None) => {}
    }
}

pub fn is_void_element(tag: &str) -> bool {
    const VOID: [&str; 14] = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];
    VOID.iter().any(|name| name.eq_ignore_ascii_case(tag))
}

#[derive(Clone, Copy)]
enum Context {
    Text,
    Attribute,
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    push_escaped(out, value, Context::Attribute);
    out.push('"');
}

fn push_escaped(out: &mut String, text: &str, context: Context) {
    let bytes = text.as_bytes();
    let mut start = 0usize;
    loop {
        let rest = &bytes[start..];
        let found = match context {
            Context::Text => memchr3(b'&', b'<', b'>', rest),
            Context::Attribute => memchr3(b'&', b'<', b'"', rest),
        };
        let Some(rel) = found else {
            break;
        };
        let pos = start + rel;
        out.push_str(&text[start..pos]);
        out.push_str(match bytes[pos] {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            _ => "&quot;",
        });
        start = pos + 1;
    }
    out.push_str(&text[start..]);
}
