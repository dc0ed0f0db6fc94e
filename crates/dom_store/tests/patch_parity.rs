use core_types::SessionId;
use dom_store::DomStore;
use session::{Session, SessionConfig};
use std::sync::Arc;
use vdom::dom_snapshot::{DomSnapshotOptions, compare_dom};
use vdom::{HidPolicy, Node, NodeData, PropValue, clear_hids};

const LEAF_TAGS: [&str; 3] = ["span", "b", "em"];
const CONTAINER_TAGS: [&str; 3] = ["div", "section", "ul"];
const STEPS: usize = 5;
const MAX_DEPTH: usize = 3;

fn fuzz_seed_count() -> usize {
    if let Ok(value) = std::env::var("LIVETREE_FUZZ_SEEDS")
        && let Ok(parsed) = value.parse::<usize>()
        && parsed > 0
    {
        return parsed;
    }
    if std::env::var("CI").is_ok() { 50 } else { 200 }
}

fn fuzz_seed_base() -> u64 {
    if let Ok(value) = std::env::var("LIVETREE_FUZZ_SEED") {
        if let Ok(parsed) = u64::from_str_radix(value.trim_start_matches("0x"), 16) {
            return parsed;
        }
        if let Ok(parsed) = value.parse::<u64>() {
            return parsed;
        }
    }
    0x2f6b_51d0_93c4_e8a7
}

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = (max - min) as u32;
        min + (self.next_u32() % span) as usize
    }

    fn one_in(&mut self, n: usize) -> bool {
        self.gen_range(0, n) == 0
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.gen_range(0, items.len())]
    }
}

/// Random trees whose every patch target is addressable: text only appears as
/// the single child of a leaf element, and leaf/container tags never overlap.
struct TreeGen {
    rng: Lcg,
    keys: u64,
    texts: u64,
}

impl TreeGen {
    fn new(seed: u64) -> Self {
        Self {
            rng: Lcg::new(seed),
            keys: 0,
            texts: 0,
        }
    }

    fn fresh_key(&mut self) -> String {
        self.keys += 1;
        format!("k{}", self.keys)
    }

    fn fresh_text(&mut self) -> String {
        self.texts += 1;
        format!("text {}", self.texts)
    }

    fn leaf(&mut self) -> Node {
        let tag = self.rng.pick(&LEAF_TAGS);
        let mut node = Node::element(tag).with_child(Node::text(self.fresh_text()));
        if self.rng.one_in(3) {
            node = node.with_prop("class", "hot");
        }
        node
    }

    fn container(&mut self, depth: usize) -> Node {
        let tag = self.rng.pick(&CONTAINER_TAGS);
        let keyed = self.rng.one_in(2);
        let count = self.rng.gen_range(0, 5);
        let mut node = Node::element(tag);
        if self.rng.one_in(4) {
            node = node.with_prop("data-depth", depth as i64);
        }
        let children: Vec<Node> = (0..count).map(|_| self.child(depth, keyed)).collect();
        node.with_children(children)
    }

    fn child(&mut self, depth: usize, keyed: bool) -> Node {
        let node = if depth == 0 || self.rng.one_in(2) {
            self.leaf()
        } else {
            self.container(depth - 1)
        };
        if keyed && !self.rng.one_in(8) {
            let key = self.fresh_key();
            node.with_key(key)
        } else {
            node
        }
    }

    fn mutate(&mut self, node: &mut Node, depth: usize) {
        let is_leaf = node.tag().is_some_and(|tag| LEAF_TAGS.contains(&tag));
        if is_leaf {
            if self.rng.one_in(3) {
                let text = self.fresh_text();
                if let Some(children) = node.children_mut() {
                    children[0] = Node::text(text);
                }
            }
            if self.rng.one_in(5) {
                self.toggle_class(node);
            }
            if self.rng.one_in(4) {
                cycle_hidden(node);
            }
            if self.rng.one_in(12) {
                let tag = self.rng.pick(&LEAF_TAGS);
                set_tag(node, tag);
            }
            return;
        }

        if self.rng.one_in(15) {
            let tag = self.rng.pick(&CONTAINER_TAGS);
            set_tag(node, tag);
        }
        if self.rng.one_in(6) {
            self.toggle_class(node);
        }
        if self.rng.one_in(6) {
            cycle_hidden(node);
        }
        let keyed = node.children().iter().any(Node::has_key);
        let Some(children) = node.children_mut() else {
            return;
        };
        if keyed && children.len() > 1 && self.rng.one_in(3) {
            for i in (1..children.len()).rev() {
                let j = self.rng.gen_range(0, i + 1);
                children.swap(i, j);
            }
        }
        if !children.is_empty() && self.rng.one_in(4) {
            let at = self.rng.gen_range(0, children.len());
            children.remove(at);
        }
        if self.rng.one_in(4) {
            let child = self.child(depth.saturating_sub(1), keyed);
            let at = if keyed {
                self.rng.gen_range(0, children.len() + 1)
            } else {
                children.len()
            };
            children.insert(at, child);
        }
        if !keyed && !children.is_empty() && self.rng.one_in(8) {
            let at = self.rng.gen_range(0, children.len());
            children[at] = self.child(depth.saturating_sub(1), false);
        }
        for child in children.iter_mut() {
            if self.rng.one_in(2) {
                self.mutate(child, depth.saturating_sub(1));
            }
        }
    }

    fn toggle_class(&mut self, node: &mut Node) {
        if let NodeData::Element(element) = &mut node.data {
            if element.props.remove("class").is_none() {
                element
                    .props
                    .insert("class".to_string(), PropValue::from("hot"));
            }
        }
    }
}

/// Absent, then `true`, then `false`, then absent again.
fn cycle_hidden(node: &mut Node) {
    if let NodeData::Element(element) = &mut node.data {
        match element.props.get("hidden") {
            None => {
                element.props.insert("hidden".to_string(), PropValue::Bool(true));
            }
            Some(PropValue::Bool(true)) => {
                element.props.insert("hidden".to_string(), PropValue::Bool(false));
            }
            Some(_) => {
                element.props.remove("hidden");
            }
        }
    }
}

fn set_tag(node: &mut Node, tag: &str) {
    if let NodeData::Element(element) = &mut node.data {
        element.tag = Arc::from(tag);
    }
}

fn run_seed(seed: u64) -> Result<(), String> {
    let config = SessionConfig {
        hid_policy: HidPolicy::All,
        stamp_inserted: true,
        ..SessionConfig::default()
    };
    let session = Session::new(SessionId(seed), config);
    let page = session.page("/parity");
    let mut generator = TreeGen::new(seed);

    let root = generator.container(MAX_DEPTH);
    page.render_initial(root);
    let shown = page.tree().ok_or("no tree after initial render")?;
    let mut mirror = DomStore::from_tree(&shown).map_err(|e| format!("mirror: {e}"))?;

    for step in 0..STEPS {
        let mut next = page.tree().ok_or("no tree")?;
        clear_hids(&mut next);
        generator.mutate(&mut next, MAX_DEPTH);

        let batch = page.update(next).map_err(|e| e.to_string())?;
        mirror
            .apply(batch.from, batch.to, &batch.patches)
            .map_err(|e| format!("step {step}: {e}\npatches: {:#?}", batch.patches))?;

        let expected = page.tree().ok_or("no tree")?;
        let actual = mirror.materialize().map_err(|e| e.to_string())?;
        compare_dom(&expected, &actual, DomSnapshotOptions { ignore_hids: false })
            .map_err(|e| format!("step {step}: {e}\npatches: {:#?}", batch.patches))?;
    }
    Ok(())
}

#[test]
fn patch_parity_random_trees() {
    let base = fuzz_seed_base();
    let count = fuzz_seed_count();
    for i in 0..count as u64 {
        let seed = base ^ i.wrapping_mul(0x9e3779b97f4a7c15);
        if let Err(message) = run_seed(seed) {
            panic!("patch parity failed for seed 0x{seed:016x} (LIVETREE_FUZZ_SEED to replay):\n{message}");
        }
    }
}

#[test]
fn patch_parity_keyed_rotation() {
    let config = SessionConfig {
        hid_policy: HidPolicy::All,
        ..SessionConfig::default()
    };
    let session = Session::new(SessionId(1), config);
    let page = session.page("/list");
    let list = |keys: &[&str]| {
        Node::element("ul").with_children(keys.iter().map(|key| {
            Node::element("li")
                .with_key(*key)
                .with_child(Node::text(key.to_uppercase()))
        }))
    };
    page.render_initial(list(&["a", "b", "c"]));
    let mut mirror = DomStore::from_tree(&page.tree().expect("rendered")).expect("mirror");

    for keys in [&["c", "a", "b"][..], &["b", "x", "c"], &["x"], &[]] {
        let batch = page.update(list(keys)).expect("rendered");
        mirror
            .apply(batch.from, batch.to, &batch.patches)
            .expect("batch applies");
        let actual = mirror.materialize().expect("root");
        compare_dom(
            &page.tree().expect("rendered"),
            &actual,
            DomSnapshotOptions { ignore_hids: false },
        )
        .unwrap_or_else(|e| panic!("{keys:?}: {e}"));
    }
}
