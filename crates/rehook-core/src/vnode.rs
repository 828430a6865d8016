//! The virtual node model.
//!
//! A [`VNode`] is an immutable description of part of the UI, produced fresh by
//! every component invocation. Nodes are built with [`h`] (or the [`h!`](crate::h!)
//! macro), which extracts the `key` prop and normalizes children.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::component::Component;
use crate::events::{event_prop, Event, EventHandler};
use crate::target::{NodeRef, NodeRefTarget};

/// Sibling identity used by the reconciler to match children across renders.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(Rc::from(s))
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Self(Rc::from(s.as_str()))
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(n: $ty) -> Self {
                Self(Rc::from(n.to_string()))
            }
        })*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

/// A single prop value.
///
/// Handlers, refs and `Any` values compare by identity; everything else
/// compares structurally.
#[derive(Clone)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Class(Vec<String>),
    Style(BTreeMap<String, String>),
    Handler(EventHandler),
    Ref(NodeRefTarget),
    Nodes(Vec<VNode>),
    Any(Rc<dyn Any>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Text form used by targets that store attributes as strings.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Class(classes) => Some(classes.join(" ")),
            Self::Style(style) => Some(
                style
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Self::Handler(_) | Self::Ref(_) | Self::Nodes(_) | Self::Any(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Style(a), Self::Style(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
            (Self::Ref(a), Self::Ref(b)) => a.ptr_eq(b),
            (Self::Nodes(a), Self::Nodes(b)) => a == b,
            (Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Class(c) => f.debug_tuple("Class").field(c).finish(),
            Self::Style(s) => f.debug_tuple("Style").field(s).finish(),
            Self::Handler(h) => write!(f, "{h:?}"),
            Self::Ref(r) => write!(f, "{r:?}"),
            Self::Nodes(n) => f.debug_tuple("Nodes").field(n).finish(),
            Self::Any(_) => f.write_str("Any(...)"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for PropValue {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

macro_rules! prop_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(n: $ty) -> Self {
                Self::Int(n as i64)
            }
        })*
    };
}

prop_from_int!(i32, i64, u32, u64, usize);

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<f32> for PropValue {
    fn from(n: f32) -> Self {
        Self::Float(n as f64)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        Self::Handler(handler)
    }
}

impl From<NodeRefTarget> for PropValue {
    fn from(target: NodeRefTarget) -> Self {
        Self::Ref(target)
    }
}

impl From<Vec<VNode>> for PropValue {
    fn from(nodes: Vec<VNode>) -> Self {
        Self::Nodes(nodes)
    }
}

/// Name-to-value props of an element or component invocation.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    values: BTreeMap<String, PropValue>,
}

/// Prop name holding a component's children.
pub const CHILDREN_PROP: &str = "children";
/// Prop name holding a node's sibling key; extracted by [`h`].
pub const KEY_PROP: &str = "key";
/// Prop name holding an element ref.
pub const REF_PROP: &str = "ref";

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prop.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Register an event handler under `on<event>`.
    pub fn on<F: Fn(&Event) + 'static>(self, event: &str, handler: F) -> Self {
        self.with(event_prop(event), EventHandler::new(handler))
    }

    /// Set the sibling key. [`h`] moves it out of the props.
    pub fn key(self, key: impl Into<Key>) -> Self {
        let key: Key = key.into();
        self.with(KEY_PROP, key.as_str())
    }

    pub fn class<I, S>(self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = classes.into_iter().map(Into::into).collect();
        self.with("class", PropValue::Class(classes))
    }

    /// Add one style entry, merging with entries already set.
    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match self.values.get_mut("style") {
            Some(PropValue::Style(style)) => {
                style.insert(name.into(), value.into());
            }
            _ => {
                let mut style = BTreeMap::new();
                style.insert(name.into(), value.into());
                self.values.insert("style".to_string(), PropValue::Style(style));
            }
        }
        self
    }

    pub fn node_ref(self, target: impl Into<NodeRefTarget>) -> Self {
        self.with(REF_PROP, target.into())
    }

    /// Store an arbitrary value, compared by identity.
    pub fn any<T: Any>(self, name: impl Into<String>, value: T) -> Self {
        self.with(name, PropValue::Any(Rc::new(value)))
    }

    /// Store the children passed to a component.
    pub fn children(self, children: Vec<VNode>) -> Self {
        self.with(CHILDREN_PROP, PropValue::Nodes(children))
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn get_handler(&self, name: &str) -> Option<&EventHandler> {
        self.get(name).and_then(PropValue::as_handler)
    }

    pub fn get_any<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(PropValue::downcast_ref::<T>)
    }

    /// Children passed to a component, empty when none were given.
    pub fn get_children(&self) -> &[VNode] {
        match self.get(CHILDREN_PROP) {
            Some(PropValue::Nodes(nodes)) => nodes,
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<PropValue> {
        self.values.remove(name)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

/// A node in the virtual tree.
#[derive(Clone, Debug, PartialEq)]
pub enum VNode {
    Element(ElementNode),
    Text(TextNode),
    Component(ComponentNode),
    /// Siblings grouped without a wrapping element.
    Fragment(FragmentNode),
    /// A host node created outside the reconciler, inserted as-is.
    Opaque(NodeRef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub props: Props,
    pub children: Vec<VNode>,
    pub key: Option<Key>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextNode {
    pub content: String,
}

/// A group of siblings that materializes into its children's host nodes
/// directly inside the surrounding element.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentNode {
    pub children: Vec<VNode>,
    pub key: Option<Key>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComponentNode {
    pub component: Component,
    pub props: Props,
    pub key: Option<Key>,
}

impl VNode {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(TextNode {
            content: content.into(),
        })
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::Element(el) => el.key.as_ref(),
            Self::Component(c) => c.key.as_ref(),
            Self::Fragment(f) => f.key.as_ref(),
            Self::Text(_) | Self::Opaque(_) => None,
        }
    }

    /// Replace the key of an element, component or fragment node. Text and opaque
    /// nodes carry no key and are returned unchanged.
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        match &mut self {
            Self::Element(el) => el.key = Some(key.into()),
            Self::Component(c) => c.key = Some(key.into()),
            Self::Fragment(f) => f.key = Some(key.into()),
            Self::Text(_) | Self::Opaque(_) => {}
        }
        self
    }
}

impl From<Component> for VNode {
    fn from(component: Component) -> Self {
        Self::Component(ComponentNode {
            component,
            props: Props::new(),
            key: None,
        })
    }
}

impl From<&str> for VNode {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for VNode {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

/// A child passed to [`h`] before normalization.
///
/// Lists are flattened, `Empty` values (from `None` and `false`) are dropped,
/// strings and numbers become text nodes, and components become zero-prop
/// invocations.
pub enum Child {
    Node(VNode),
    List(Vec<Child>),
    Empty,
}

impl Child {
    fn flatten_into(self, out: &mut Vec<VNode>) {
        match self {
            Self::Node(node) => out.push(node),
            Self::List(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
            Self::Empty => {}
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Self::Node(node)
    }
}

impl From<&VNode> for Child {
    fn from(node: &VNode) -> Self {
        Self::Node(node.clone())
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Self::Node(VNode::text(s))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Self::Node(VNode::text(s))
    }
}

impl From<&String> for Child {
    fn from(s: &String) -> Self {
        Self::Node(VNode::text(s.clone()))
    }
}

macro_rules! child_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(n: $ty) -> Self {
                Self::Node(VNode::text(n.to_string()))
            }
        })*
    };
}

child_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Child {
    fn from(b: bool) -> Self {
        if b {
            Self::Node(VNode::text("true"))
        } else {
            Self::Empty
        }
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Component> for Child {
    fn from(component: Component) -> Self {
        Self::Node(component.into())
    }
}

impl From<NodeRef> for Child {
    fn from(node: NodeRef) -> Self {
        Self::Node(VNode::Opaque(node))
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// What [`h`] builds: a host element or a component invocation.
pub enum NodeType {
    Tag(String),
    Component(Component),
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        Self::Tag(tag.to_owned())
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        Self::Tag(tag)
    }
}

impl From<Component> for NodeType {
    fn from(component: Component) -> Self {
        Self::Component(component)
    }
}

impl From<&Component> for NodeType {
    fn from(component: &Component) -> Self {
        Self::Component(component.clone())
    }
}

/// Normalize a list of children.
pub fn normalize_children<I, C>(children: I) -> Vec<VNode>
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    let mut out = Vec::new();
    for child in children {
        child.into().flatten_into(&mut out);
    }
    out
}

fn extract_key(props: &mut Props) -> Option<Key> {
    match props.take(KEY_PROP)? {
        PropValue::Str(s) => Some(Key::from(s)),
        PropValue::Int(n) => Some(Key::from(n)),
        other => {
            tracing::warn!(key = ?other, "ignoring non-string, non-integer key");
            None
        }
    }
}

/// Group `children` without a wrapping element.
///
/// Lets a component return several siblings. A keyed fragment moves as one
/// unit among its siblings.
///
/// ```
/// use rehook_core::{fragment, VNode};
///
/// let node = fragment(["a", "b"]);
/// let VNode::Fragment(group) = node else { unreachable!() };
/// assert_eq!(group.children.len(), 2);
/// ```
pub fn fragment<I, C>(children: I) -> VNode
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    VNode::Fragment(FragmentNode {
        children: normalize_children(children),
        key: None,
    })
}

/// Build a virtual node.
///
/// For elements the children become the element's children. For components
/// they are passed through the `children` prop.
///
/// ```
/// use rehook_core::{h, Props, VNode};
///
/// let node = h("ul", Props::new().class(["list"]), ["a", "b"]);
/// let VNode::Element(el) = node else { unreachable!() };
/// assert_eq!(el.children.len(), 2);
/// ```
pub fn h<I, C>(ty: impl Into<NodeType>, props: Props, children: I) -> VNode
where
    I: IntoIterator<Item = C>,
    C: Into<Child>,
{
    let mut props = props;
    let key = extract_key(&mut props);
    let children = normalize_children(children);
    match ty.into() {
        NodeType::Tag(tag) => VNode::Element(ElementNode {
            tag,
            props,
            children,
            key,
        }),
        NodeType::Component(component) => {
            if !children.is_empty() {
                props = props.children(children);
            }
            VNode::Component(ComponentNode {
                component,
                props,
                key,
            })
        }
    }
}

/// Build a virtual node from heterogeneous children.
///
/// ```
/// use rehook_core::{h, Props};
///
/// let count = 3;
/// let node = h!("p", Props::new(), "Count: ", count, None::<&str>);
/// # let _ = node;
/// ```
#[macro_export]
macro_rules! h {
    ($ty:expr) => {
        $crate::h($ty, $crate::Props::new(), ::std::iter::empty::<$crate::Child>())
    };
    ($ty:expr, $props:expr $(, $child:expr)* $(,)?) => {{
        let children: ::std::vec::Vec<$crate::Child> =
            ::std::vec![$($crate::Child::from($child)),*];
        $crate::h($ty, $props, children)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: VNode) -> ElementNode {
        match node {
            VNode::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn key_is_extracted_from_props() {
        let el = element(h("li", Props::new().key("a").with("id", "x"), [""; 0]));
        assert_eq!(el.key, Some(Key::from("a")));
        assert!(!el.props.contains(KEY_PROP));
        assert_eq!(el.props.get_str("id"), Some("x"));
    }

    #[test]
    fn integer_keys() {
        let el = element(h("li", Props::new().with("key", 7), [""; 0]));
        assert_eq!(el.key, Some(Key::from("7")));
    }

    #[test]
    fn children_are_flattened_and_filtered() {
        let items = vec!["a", "b"];
        let el = element(crate::h!(
            "div",
            Props::new(),
            "head",
            items,
            None::<VNode>,
            false,
            1.5,
            Some("tail")
        ));
        let texts: Vec<_> = el
            .children
            .iter()
            .map(|c| match c {
                VNode::Text(t) => t.content.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["head", "a", "b", "1.5", "tail"]);
    }

    #[test]
    fn component_children_go_to_props() {
        let component = Component::new("Wrapper", |props: &Props| {
            Ok(h("div", Props::new(), props.get_children().to_vec()))
        });
        let node = h(&component, Props::new().key(1), ["inner"]);
        let VNode::Component(c) = node else {
            panic!("expected component");
        };
        assert_eq!(c.key, Some(Key::from("1")));
        assert_eq!(c.props.get_children(), &[VNode::text("inner")]);
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler = EventHandler::new(|_| {});
        let a = Props::new().with("onclick", handler.clone());
        let b = Props::new().with("onclick", handler);
        let c = Props::new().on("click", |_| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fragments_keep_their_children_grouped() {
        let el = element(crate::h!(
            "ul",
            Props::new(),
            "head",
            fragment(["a", "b"]).with_key("group")
        ));
        assert_eq!(el.children.len(), 2);
        let VNode::Fragment(group) = &el.children[1] else {
            panic!("expected fragment");
        };
        assert_eq!(group.key, Some(Key::from("group")));
        assert_eq!(group.children, [VNode::text("a"), VNode::text("b")]);
    }

    #[test]
    fn style_entries_merge() {
        let props = Props::new().style("color", "red").style("margin", "0");
        let Some(PropValue::Style(style)) = props.get("style") else {
            panic!("missing style");
        };
        assert_eq!(style.len(), 2);
    }
}
