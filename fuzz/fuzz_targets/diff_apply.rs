#![no_main]

use dom_store::DomStore;
use libfuzzer_sys::fuzz_target;
use vdom::dom_snapshot::{DomSnapshotOptions, assert_dom_eq};
use vdom::{
    DiffOptions, HidGenerator, HidPolicy, Node, RenderOptions, Stamp, assign_all_hids, diff,
    diff_with, render_html,
};

const LEAF_TAGS: [&str; 2] = ["span", "b"];
const CONTAINER_TAGS: [&str; 2] = ["div", "ul"];

struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Bytes<'_> {
    fn byte(&mut self) -> u8 {
        let value = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        value
    }

    fn below(&mut self, n: u8) -> u8 {
        self.byte() % n.max(1)
    }
}

/// Trees whose patches always address stamped nodes.
fn addressable(bytes: &mut Bytes<'_>, depth: usize) -> Node {
    let choice = bytes.byte();
    if depth == 0 || choice % 3 == 0 {
        let tag = LEAF_TAGS[usize::from(choice >> 2) % LEAF_TAGS.len()];
        let mut node = Node::element(tag).with_child(Node::text(format!("t{}", bytes.below(4))));
        if choice & 0x80 != 0 {
            node = node.with_prop("class", i64::from(bytes.below(3)));
        }
        return node;
    }
    let tag = CONTAINER_TAGS[usize::from(choice >> 2) % CONTAINER_TAGS.len()];
    let keyed = choice & 0x40 != 0;
    let count = bytes.below(5);
    Node::element(tag).with_children((0..count).map(|i| {
        let child = addressable(bytes, depth - 1);
        if keyed {
            child.with_key(format!("k{}", bytes.below(8).wrapping_add(i * 8)))
        } else {
            child
        }
    }))
}

/// Any node shape, including fragments, raw markup and components.
fn anything(bytes: &mut Bytes<'_>, depth: usize) -> Node {
    match bytes.below(if depth == 0 { 2 } else { 5 }) {
        0 => Node::text(format!("x{}", bytes.below(3))),
        1 => Node::raw(format!("<i>{}</i>", bytes.below(2))),
        2 => {
            let count = bytes.below(4);
            Node::fragment((0..count).map(|_| anything(bytes, depth - 1)))
        }
        3 => {
            let label = bytes.below(3);
            Node::component(move || Node::element("b").with_child(Node::text(label.to_string())))
        }
        _ => {
            let count = bytes.below(4);
            let mut node = Node::element(["p", "q"][usize::from(bytes.below(2))]);
            if bytes.below(2) == 0 {
                node = node.on("click", "h");
            }
            if bytes.below(3) == 0 {
                node = node.with_key(format!("{}", bytes.below(4)));
            }
            node.with_children((0..count).map(|_| anything(bytes, depth - 1)))
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut bytes = Bytes { data, pos: 0 };

    let generator = HidGenerator::new();
    let mut prev = addressable(&mut bytes, 3);
    assign_all_hids(&mut prev, &generator);
    let mut next = addressable(&mut bytes, 3);
    let options = DiffOptions {
        stamp: Some(Stamp {
            generator: &generator,
            policy: HidPolicy::All,
        }),
    };
    let patches = diff_with(Some(&prev), Some(&mut next), &options);
    if let Ok(mut mirror) = DomStore::from_tree(&prev) {
        let from = mirror.version();
        mirror
            .apply(from, from.next(), &patches)
            .unwrap_or_else(|e| panic!("patch failed: {e}\n{patches:#?}"));
        let actual = mirror.materialize().expect("root survives");
        assert_dom_eq(&next, &actual, DomSnapshotOptions { ignore_hids: false });
    }

    let mut a = anything(&mut bytes, 4);
    assign_all_hids(&mut a, &generator);
    let mut b = anything(&mut bytes, 4);
    let _ = diff(Some(&a), Some(&mut b));
    let _ = render_html(&b, &RenderOptions::default());
});
