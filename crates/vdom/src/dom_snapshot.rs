use crate::node::{Node, NodeData, is_attribute_prop};
use crate::traverse::for_each_dom_node;
use std::fmt::{self, Write};
use std::slice;

/// Deterministic serialization of the DOM a tree describes, for test comparisons.
/// Not a stable format.
///
/// Equivalence rules:
/// - Fragments are inlined and components rendered before comparison.
/// - Element tags must match; attributes compare by name and stringified value,
///   in name order. A `true` bool is an empty attribute. Event handlers, the key
///   prop, `false` bools and non-stringifiable values are not part of the DOM.
/// - Text and raw payloads must match exactly.
/// - Hydration ids can be ignored by options.
#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    pub ignore_hids: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self { ignore_hids: true }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(root: &Node, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(slice::from_ref(root), &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn walk_snapshot(nodes: &[Node], options: &DomSnapshotOptions, depth: usize, out: &mut Vec<String>) {
    for_each_dom_node(nodes, &mut |node| {
        let mut line = "  ".repeat(depth);
        match &node.data {
            NodeData::Element(element) => {
                let _ = write!(&mut line, "<{}", element.tag);
                if !options.ignore_hids && !node.hid.is_empty() {
                    let _ = write!(&mut line, " #{}", node.hid);
                }
                for (name, value) in &element.props {
                    if !is_attribute_prop(name) {
                        continue;
                    }
                    if let Some(text) = value.to_dom_attr() {
                        let _ = write!(&mut line, " {name}={text:?}");
                    }
                }
                line.push('>');
                out.push(line);
                walk_snapshot(&element.children, options, depth + 1, out);
            }
            NodeData::Text(text) => {
                let _ = write!(&mut line, "{text:?}");
                out.push(line);
            }
            NodeData::Raw(raw) => {
                let _ = write!(&mut line, "#raw {raw:?}");
                out.push(line);
            }
            NodeData::Fragment(_) | NodeData::Component(_) => {}
        }
    });
}

#[derive(Debug)]
pub struct DomMismatch {
    line: usize,
    expected: String,
    actual: String,
    expected_snapshot: DomSnapshot,
    actual_snapshot: DomSnapshot,
}

impl fmt::Display for DomMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DOM mismatch at line {}", self.line + 1)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        writeln!(f, "expected tree:\n{}", self.expected_snapshot)?;
        writeln!(f, "actual tree:\n{}", self.actual_snapshot)?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch {}

pub fn assert_dom_eq(expected: &Node, actual: &Node, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!("{mismatch}");
    }
}

pub fn compare_dom(
    expected: &Node,
    actual: &Node,
    options: DomSnapshotOptions,
) -> Result<(), Box<DomMismatch>> {
    let expected_snapshot = DomSnapshot::new(expected, options);
    let actual_snapshot = DomSnapshot::new(actual, options);
    let left = expected_snapshot.as_lines();
    let right = actual_snapshot.as_lines();
    let missing = "<missing>";
    let first_diff = (0..left.len().max(right.len())).find(|&i| left.get(i) != right.get(i));
    let Some(line) = first_diff else {
        return Ok(());
    };
    let expected = left.get(line).map_or(missing, String::as_str).to_string();
    let actual = right.get(line).map_or(missing, String::as_str).to_string();
    Err(Box::new(DomMismatch {
        line,
        expected,
        actual,
        expected_snapshot,
        actual_snapshot,
    }))
}
