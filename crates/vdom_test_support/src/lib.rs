use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use vdom::{HidGenerator, HidPolicy, Node, PropValue, assign_with_policy};

/// One diff scenario: a stamped `prev` tree, an unstamped `next` tree and the
/// expected patch op sequence.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffFixture {
    pub name: String,
    #[serde(default)]
    pub policy: FixturePolicy,
    pub prev: FixtureNode,
    pub next: FixtureNode,
    pub expect: FixtureExpect,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixturePolicy {
    #[default]
    All,
    Interactive,
}

impl From<FixturePolicy> for HidPolicy {
    fn from(policy: FixturePolicy) -> Self {
        match policy {
            FixturePolicy::All => HidPolicy::All,
            FixturePolicy::Interactive => HidPolicy::Interactive,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureExpect {
    /// Op names in emission order, e.g. `"MoveNode"`.
    pub ops: Vec<String>,
    /// Targeted hids in emission order (the parent for inserts), when checked.
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    /// Whether diffing `next` against its reconciled self yields no patches.
    /// When false, the second diff must repeat `ops`.
    #[serde(default = "default_true")]
    pub rediff_clean: bool,
}

fn default_true() -> bool {
    true
}

/// Tree node as written in fixture files. Exactly one of `tag`, `text`, `raw`
/// or `fragment` must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureNode {
    pub tag: Option<String>,
    pub text: Option<String>,
    pub raw: Option<String>,
    #[serde(default)]
    pub fragment: bool,
    pub key: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, FixtureValue>,
    /// Event names; each becomes an `on<event>` handler prop.
    #[serde(default)]
    pub on: Vec<String>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum FixtureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&FixtureValue> for PropValue {
    fn from(value: &FixtureValue) -> Self {
        match value {
            FixtureValue::Bool(v) => PropValue::Bool(*v),
            FixtureValue::Int(v) => PropValue::Int(*v),
            FixtureValue::Float(v) => PropValue::Float(*v),
            FixtureValue::Str(v) => PropValue::Str(v.clone()),
        }
    }
}

impl FixtureNode {
    pub fn to_node(&self, path: &Path) -> Node {
        let set = [
            self.tag.is_some(),
            self.text.is_some(),
            self.raw.is_some(),
            self.fragment,
        ]
        .iter()
        .filter(|set| **set)
        .count();
        assert_eq!(
            set, 1,
            "fixture node in {path:?} must set exactly one of tag/text/raw/fragment: {self:?}"
        );
        let children = || self.children.iter().map(|child| child.to_node(path));
        let mut node = if let Some(tag) = &self.tag {
            let mut node = Node::element(tag.as_str());
            for (name, value) in &self.attrs {
                node = node.with_prop(name.as_str(), PropValue::from(value));
            }
            for event in &self.on {
                node = node.on(event, format!("{tag}.{event}"));
            }
            node.with_children(children())
        } else if let Some(text) = &self.text {
            Node::text(text.as_str())
        } else if let Some(raw) = &self.raw {
            Node::raw(raw.as_str())
        } else {
            Node::fragment(children())
        };
        if let Some(key) = &self.key {
            node = node.with_key(key.as_str());
        }
        node
    }
}

impl DiffFixture {
    /// `prev` stamped with a fresh generator under the fixture policy.
    pub fn prev_tree(&self) -> Node {
        let mut tree = self.prev.to_node(&self.path);
        let generator = HidGenerator::new();
        assign_with_policy(&mut tree, &generator, self.policy.into());
        tree
    }

    pub fn next_tree(&self) -> Node {
        self.next.to_node(&self.path)
    }
}

pub fn fixtures_dir(manifest_dir: &str, sub: &str) -> PathBuf {
    Path::new(manifest_dir).join("tests").join("fixtures").join(sub)
}

/// Load every `*.toml` fixture in `dir`, sorted by file name.
pub fn load_diff_fixtures(dir: &Path) -> Vec<DiffFixture> {
    let entries = fs::read_dir(dir)
        .unwrap_or_else(|err| panic!("failed to read fixture dir {dir:?}: {err}"));
    let mut paths = entries
        .map(|entry| {
            entry
                .unwrap_or_else(|err| panic!("failed to read entry in {dir:?}: {err}"))
                .path()
        })
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect::<Vec<_>>();
    paths.sort();
    assert!(!paths.is_empty(), "no fixtures found in {dir:?}");
    paths.into_iter().map(|path| load_diff_fixture(&path)).collect()
}

pub fn load_diff_fixture(path: &Path) -> DiffFixture {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read fixture {path:?}: {err}"));
    let mut fixture: DiffFixture = toml::from_str(&content)
        .unwrap_or_else(|err| panic!("failed to parse fixture {path:?}: {err}"));
    fixture.path = path.to_path_buf();
    fixture
}

pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    let mut out = String::new();
    let missing = "<missing>";
    let mismatch = (0..max).find(|&i| expected.get(i) != actual.get(i));
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for line_idx in start..end {
            let left = expected
                .get(line_idx)
                .map(String::as_str)
                .unwrap_or(missing);
            let right = actual.get(line_idx).map(String::as_str).unwrap_or(missing);
            let marker = if line_idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {left}", line_idx + 1);
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {right}", line_idx + 1);
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}
