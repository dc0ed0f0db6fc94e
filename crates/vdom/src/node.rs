//! Server-side node tree.
//!
//! A tree is rebuilt from scratch on every render. Apart from `hid`, nodes are
//! treated as immutable once constructed; the diff engine copies `hid` forward
//! from the previous tree and hydration passes stamp fresh ones.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Hydration identifier addressing one live DOM node (`"h1"`, `"h2"`, ...).
///
/// The empty value means "not hydrated"; it is the state of every freshly built
/// node and of nodes that are never individually addressable (text, fragments).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hid(Option<Arc<str>>);

impl Hid {
    /// Unassigned identity.
    pub const EMPTY: Hid = Hid(None);

    pub fn new(value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        if value.is_empty() {
            return Self::EMPTY;
        }
        Hid(Some(Arc::from(value)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl From<&str> for Hid {
    fn from(value: &str) -> Self {
        Hid::new(value)
    }
}

impl From<String> for Hid {
    fn from(value: String) -> Self {
        Hid::new(value)
    }
}

impl fmt::Debug for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => write!(f, "Hid({value})"),
            None => f.write_str("Hid(<empty>)"),
        }
    }
}

impl fmt::Display for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node discriminant. Values are stable and may be persisted or transmitted.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element = 0,
    Text = 1,
    Fragment = 2,
    Component = 3,
    Raw = 4,
}

impl NodeKind {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Element),
            1 => Some(Self::Text),
            2 => Some(Self::Fragment),
            3 => Some(Self::Component),
            4 => Some(Self::Raw),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Element => "Element",
            Self::Text => "Text",
            Self::Fragment => "Fragment",
            Self::Component => "Component",
            Self::Raw => "Raw",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name for a raw kind value; out-of-range values map to `"Unknown"`.
pub fn kind_name(value: u8) -> &'static str {
    NodeKind::from_u8(value).map_or("Unknown", NodeKind::name)
}

/// Reference to an event handler registered with the surrounding runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerRef(pub Arc<str>);

impl HandlerRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        HandlerRef(name.into())
    }
}

/// Prop value attached to an element.
#[derive(Clone, Debug)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Handler(HandlerRef),
    /// A value with no attribute representation; kept for equality only.
    Opaque(Arc<str>),
}

impl PropValue {
    /// Attribute text for this value, or `None` when it cannot be stringified.
    pub fn to_attr_value(&self) -> Option<String> {
        match self {
            PropValue::Str(value) => Some(value.clone()),
            PropValue::Bool(value) => Some(value.to_string()),
            PropValue::Int(value) => Some(value.to_string()),
            PropValue::Float(value) => Some(value.to_string()),
            PropValue::Handler(_) | PropValue::Opaque(_) => None,
        }
    }

    /// The attribute as it exists in a DOM: `true` is present and empty, `false`
    /// is absent, everything else is [`PropValue::to_attr_value`].
    pub fn to_dom_attr(&self) -> Option<String> {
        match self {
            PropValue::Bool(true) => Some(String::new()),
            PropValue::Bool(false) => None,
            other => other.to_attr_value(),
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            // NaN compares equal to itself so identical trees never diff.
            (PropValue::Float(a), PropValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (PropValue::Handler(a), PropValue::Handler(b)) => a == b,
            (PropValue::Opaque(a), PropValue::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<HandlerRef> for PropValue {
    fn from(value: HandlerRef) -> Self {
        PropValue::Handler(value)
    }
}

/// Element props, ordered by name.
pub type Props = BTreeMap<String, PropValue>;

/// Name of the prop carrying the reconciliation key.
pub const KEY_PROP: &str = "key";

/// Event-handler props are named `on<event>`, matched case-insensitively.
pub fn is_event_prop(name: &str) -> bool {
    name.len() > 2 && name.as_bytes()[..2].eq_ignore_ascii_case(b"on")
}

/// Props that surface as DOM attributes (everything except events and the key).
pub fn is_attribute_prop(name: &str) -> bool {
    name != KEY_PROP && !is_event_prop(name)
}

/// A renderable unit. Rendering is stateless; every call builds a fresh tree.
pub trait Render: Send + Sync {
    fn render(&self) -> Node;
}

impl<F> Render for F
where
    F: Fn() -> Node + Send + Sync,
{
    fn render(&self) -> Node {
        self()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: Arc<str>,
    pub props: Props,
    pub children: Vec<Node>,
}

#[derive(Clone)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Fragment(Vec<Node>),
    Component(Option<Arc<dyn Render>>),
    Raw(String),
}

impl fmt::Debug for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeData::Element(element) => f.debug_tuple("Element").field(element).finish(),
            NodeData::Text(text) => f.debug_tuple("Text").field(text).finish(),
            NodeData::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            NodeData::Component(component) => f
                .debug_tuple("Component")
                .field(&component.as_ref().map(|_| "<render>"))
                .finish(),
            NodeData::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
        }
    }
}

impl PartialEq for NodeData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeData::Element(a), NodeData::Element(b)) => a == b,
            (NodeData::Text(a), NodeData::Text(b)) => a == b,
            (NodeData::Fragment(a), NodeData::Fragment(b)) => a == b,
            // Components compare by identity; their output is only known after rendering.
            (NodeData::Component(a), NodeData::Component(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (NodeData::Raw(a), NodeData::Raw(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub hid: Hid,
    pub key: Option<Arc<str>>,
    pub data: NodeData,
}

impl Node {
    fn from_data(data: NodeData) -> Self {
        Self {
            hid: Hid::EMPTY,
            key: None,
            data,
        }
    }

    pub fn element(tag: impl Into<Arc<str>>) -> Self {
        Self::from_data(NodeData::Element(Element {
            tag: tag.into(),
            props: Props::new(),
            children: Vec::new(),
        }))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::from_data(NodeData::Text(text.into()))
    }

    pub fn raw(html: impl Into<String>) -> Self {
        Self::from_data(NodeData::Raw(html.into()))
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Self::from_data(NodeData::Fragment(children.into_iter().collect()))
    }

    pub fn component(render: impl Render + 'static) -> Self {
        Self::from_data(NodeData::Component(Some(Arc::new(render))))
    }

    pub fn component_ref(render: Option<Arc<dyn Render>>) -> Self {
        Self::from_data(NodeData::Component(render))
    }

    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets a prop on an element. Setting `"key"` also sets the reconciliation key.
    /// Ignored on non-element nodes.
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == KEY_PROP {
            if let Some(key) = value.to_attr_value() {
                self.key = Some(Arc::from(key));
            }
        }
        if let NodeData::Element(element) = &mut self.data {
            element.props.insert(name, value);
        }
        self
    }

    /// Attaches an event handler prop (`on` + `event`).
    pub fn on(self, event: &str, handler: impl Into<Arc<str>>) -> Self {
        let name = if is_event_prop(event) {
            event.to_string()
        } else {
            format!("on{event}")
        };
        self.with_prop(name, HandlerRef::new(handler))
    }

    pub fn with_child(mut self, child: Node) -> Self {
        if let Some(children) = self.children_mut() {
            children.push(child);
        }
        self
    }

    pub fn with_children(mut self, extra: impl IntoIterator<Item = Node>) -> Self {
        if let Some(children) = self.children_mut() {
            children.extend(extra);
        }
        self
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Fragment(_) => NodeKind::Fragment,
            NodeData::Component(_) => NodeKind::Component,
            NodeData::Raw(_) => NodeKind::Raw,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element(element) => Some(&element.tag),
            _ => None,
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match &self.data {
            NodeData::Element(element) => Some(&element.props),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.data {
            NodeData::Element(element) => &element.children,
            NodeData::Fragment(children) => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.data {
            NodeData::Element(element) => Some(&mut element.children),
            NodeData::Fragment(children) => Some(children),
            _ => None,
        }
    }

    /// Reconciliation key, if set and non-empty.
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn has_key(&self) -> bool {
        self.key_str().is_some()
    }

    /// An element carrying at least one event-handler prop.
    pub fn is_interactive(&self) -> bool {
        match &self.data {
            NodeData::Element(element) => element.props.keys().any(|name| is_event_prop(name)),
            _ => false,
        }
    }
}
