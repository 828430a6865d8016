//! An in-memory render target.
//!
//! [`MemoryTarget`] keeps a small node tree and a log of every operation the
//! reconciler issued, which makes it the target of choice for tests and for
//! headless use. Clones share the same tree, so a test can keep one handle
//! while the runtime owns another.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::events::{event_name, Event, EventHandler};
use crate::target::{NodeRef, RenderTarget};
use crate::vnode::PropValue;

/// Escape markup special characters in a string.
pub fn escape_markup(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One logged target operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateElement { node: NodeRef, tag: String },
    CreateText { node: NodeRef, content: String },
    SetProperty { node: NodeRef, name: String },
    RemoveProperty { node: NodeRef, name: String },
    Insert { parent: NodeRef, child: NodeRef, before: Option<NodeRef> },
    Remove { parent: NodeRef, child: NodeRef },
    Move { parent: NodeRef, child: NodeRef, before: Option<NodeRef> },
    SetText { node: NodeRef, content: String },
    Release { node: NodeRef },
}

impl Op {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::CreateElement { .. } | Self::CreateText { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Self::Move { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. })
    }
}

#[derive(Debug)]
enum NodeKind {
    Element(String),
    Text(String),
    Opaque(String),
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    attributes: BTreeMap<String, PropValue>,
    style: BTreeMap<String, String>,
    listeners: HashMap<String, EventHandler>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    released: bool,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            listeners: HashMap::new(),
            parent: None,
            children: Vec::new(),
            released: false,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryDom {
    nodes: HashMap<NodeRef, MemoryNode>,
    next_id: u64,
    ops: Vec<Op>,
}

impl MemoryDom {
    fn alloc(&mut self, kind: NodeKind) -> NodeRef {
        self.next_id += 1;
        let node = NodeRef::from_raw(self.next_id);
        self.nodes.insert(node, MemoryNode::new(kind));
        node
    }

    fn detach(&mut self, child: NodeRef) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|c| *c != child);
        }
    }

    fn attach(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>) {
        self.detach(child);
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            tracing::warn!(%parent, "insert into unknown node");
            return;
        };
        let index = before
            .and_then(|b| parent_node.children.iter().position(|c| *c == b))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
    }

    fn write_text(&self, node: NodeRef, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        if let NodeKind::Text(content) = &n.kind {
            out.push_str(content);
        }
        for child in &n.children {
            self.write_text(*child, out);
        }
    }

    fn write_markup(&self, node: NodeRef, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(content) => out.push_str(&escape_markup(content)),
            NodeKind::Element(tag) | NodeKind::Opaque(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &n.attributes {
                    if let Some(text) = value.to_attribute() {
                        out.push_str(&format!(" {name}=\"{}\"", escape_markup(&text)));
                    }
                }
                if !n.style.is_empty() {
                    let style = PropValue::Style(n.style.clone()).to_attribute().unwrap_or_default();
                    out.push_str(&format!(" style=\"{}\"", escape_markup(&style)));
                }
                out.push('>');
                for child in &n.children {
                    self.write_markup(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

/// A render target backed by an in-memory node tree.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    dom: Rc<RefCell<MemoryDom>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element to mount a root into.
    pub fn create_container(&self, tag: &str) -> NodeRef {
        self.dom.borrow_mut().alloc(NodeKind::Element(tag.to_owned()))
    }

    /// Create a node outside the reconciler, for use as a [`VNode::Opaque`](crate::VNode::Opaque).
    pub fn create_opaque(&self, label: &str) -> NodeRef {
        self.dom.borrow_mut().alloc(NodeKind::Opaque(label.to_owned()))
    }

    pub fn ops(&self) -> Vec<Op> {
        self.dom.borrow().ops.clone()
    }

    /// Return and clear the operation log.
    pub fn take_ops(&self) -> Vec<Op> {
        std::mem::take(&mut self.dom.borrow_mut().ops)
    }

    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.dom
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.dom.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn tag(&self, node: NodeRef) -> Option<String> {
        match &self.dom.borrow().nodes.get(&node)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.dom.borrow().write_text(node, &mut out);
        out
    }

    /// Markup for the children of `node`.
    pub fn inner_markup(&self, node: NodeRef) -> String {
        let dom = self.dom.borrow();
        let mut out = String::new();
        if let Some(n) = dom.nodes.get(&node) {
            for child in &n.children {
                dom.write_markup(*child, &mut out);
            }
        }
        out
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<PropValue> {
        self.dom.borrow().nodes.get(&node)?.attributes.get(name).cloned()
    }

    pub fn style(&self, node: NodeRef, name: &str) -> Option<String> {
        self.dom.borrow().nodes.get(&node)?.style.get(name).cloned()
    }

    pub fn has_listener(&self, node: NodeRef, event: &str) -> bool {
        self.dom
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|n| n.listeners.contains_key(event))
    }

    pub fn is_released(&self, node: NodeRef) -> bool {
        self.dom.borrow().nodes.get(&node).is_some_and(|n| n.released)
    }

    /// First descendant of `root` (depth first) with the given tag.
    pub fn find(&self, root: NodeRef, tag: &str) -> Option<NodeRef> {
        self.find_all(root, tag).into_iter().next()
    }

    /// All descendants of `root` with the given tag, in document order.
    pub fn find_all(&self, root: NodeRef, tag: &str) -> Vec<NodeRef> {
        let dom = self.dom.borrow();
        let mut found = Vec::new();
        let mut stack: Vec<NodeRef> = dom
            .nodes
            .get(&root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            let Some(n) = dom.nodes.get(&node) else {
                continue;
            };
            if matches!(&n.kind, NodeKind::Element(t) if t == tag) {
                found.push(node);
            }
            stack.extend(n.children.iter().rev().copied());
        }
        found
    }

    /// Dispatch an event on `node`, bubbling to ancestors until a handler
    /// stops propagation. Returns `true` if any handler ran.
    pub fn dispatch(&self, node: NodeRef, event: &str) -> bool {
        self.deliver(Event::new(event, node))
    }

    pub fn dispatch_with(&self, node: NodeRef, event: &str, value: impl Into<PropValue>) -> bool {
        self.deliver(Event::new(event, node).with_value(value))
    }

    fn deliver(&self, event: Event) -> bool {
        let mut handled = false;
        let mut current = Some(event.target());
        while let Some(node) = current {
            // Handlers may trigger updates that mutate the tree, so nothing
            // stays borrowed while they run.
            let (handler, parent) = {
                let dom = self.dom.borrow();
                let Some(n) = dom.nodes.get(&node) else {
                    break;
                };
                (n.listeners.get(event.name()).cloned(), n.parent)
            };
            if let Some(handler) = handler {
                event.set_current_target(node);
                handler.call(&event);
                handled = true;
                if event.is_propagation_stopped() {
                    break;
                }
            }
            current = parent;
        }
        handled
    }
}

impl RenderTarget for MemoryTarget {
    fn create_element(&mut self, tag: &str) -> NodeRef {
        let mut dom = self.dom.borrow_mut();
        let node = dom.alloc(NodeKind::Element(tag.to_owned()));
        dom.ops.push(Op::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&mut self, content: &str) -> NodeRef {
        let mut dom = self.dom.borrow_mut();
        let node = dom.alloc(NodeKind::Text(content.to_owned()));
        dom.ops.push(Op::CreateText {
            node,
            content: content.to_owned(),
        });
        node
    }

    fn set_property(&mut self, node: NodeRef, name: &str, value: &PropValue) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::SetProperty {
            node,
            name: name.to_owned(),
        });
        let Some(n) = dom.nodes.get_mut(&node) else {
            return;
        };
        match (event_name(name), value) {
            (Some(event), PropValue::Handler(handler)) => {
                n.listeners.insert(event, handler.clone());
            }
            (_, PropValue::Style(style)) => {
                n.style.extend(style.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {
                n.attributes.insert(name.to_owned(), value.clone());
            }
        }
    }

    fn remove_property(&mut self, node: NodeRef, name: &str, previous: &PropValue) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::RemoveProperty {
            node,
            name: name.to_owned(),
        });
        let Some(n) = dom.nodes.get_mut(&node) else {
            return;
        };
        match (event_name(name), previous) {
            (Some(event), PropValue::Handler(_)) => {
                n.listeners.remove(&event);
            }
            (_, PropValue::Style(style)) => {
                for key in style.keys() {
                    n.style.remove(key);
                }
            }
            _ => {
                n.attributes.remove(name);
            }
        }
    }

    fn insert_child(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::Insert {
            parent,
            child,
            before,
        });
        dom.attach(parent, child, before);
    }

    fn remove_child(&mut self, parent: NodeRef, child: NodeRef) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::Remove { parent, child });
        dom.detach(child);
    }

    fn move_child(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::Move {
            parent,
            child,
            before,
        });
        dom.attach(parent, child, before);
    }

    fn set_text_content(&mut self, node: NodeRef, content: &str) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::SetText {
            node,
            content: content.to_owned(),
        });
        if let Some(n) = dom.nodes.get_mut(&node) {
            n.kind = NodeKind::Text(content.to_owned());
        }
    }

    fn release(&mut self, node: NodeRef) {
        let mut dom = self.dom.borrow_mut();
        dom.ops.push(Op::Release { node });
        if let Some(n) = dom.nodes.get_mut(&node) {
            n.listeners.clear();
            n.released = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn insert_move_remove() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let a = target.create_text("a");
        let b = target.create_text("b");
        target.insert_child(root, a, None);
        target.insert_child(root, b, None);
        assert_eq!(target.text(root), "ab");

        target.move_child(root, b, Some(a));
        assert_eq!(target.text(root), "ba");

        target.remove_child(root, b);
        assert_eq!(target.children(root), vec![a]);
        assert_eq!(target.ops().iter().filter(|op| op.is_move()).count(), 1);
    }

    #[test]
    fn markup_escapes_text_and_attributes() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let p = target.create_element("p");
        target.set_property(p, "title", &PropValue::from("a \"b\""));
        let text = target.create_text("1 < 2");
        target.insert_child(p, text, None);
        target.insert_child(root, p, None);
        assert_eq!(
            target.inner_markup(root),
            "<p title=\"a &quot;b&quot;\">1 &lt; 2</p>"
        );
    }

    #[test]
    fn style_merges_and_clears() {
        let mut target = MemoryTarget::new();
        let div = target.create_element("div");
        let mut style = BTreeMap::new();
        style.insert("color".to_string(), "red".to_string());
        style.insert("margin".to_string(), "0".to_string());
        target.set_property(div, "style", &PropValue::Style(style));

        let mut removed = BTreeMap::new();
        removed.insert("margin".to_string(), "0".to_string());
        target.remove_property(div, "style", &PropValue::Style(removed));

        assert_eq!(target.style(div, "color").as_deref(), Some("red"));
        assert_eq!(target.style(div, "margin"), None);
    }

    #[test]
    fn events_bubble_until_stopped() {
        let mut target = MemoryTarget::new();
        let outer = target.create_element("div");
        let inner = target.create_element("button");
        target.insert_child(outer, inner, None);

        let outer_hits = Rc::new(Cell::new(0));
        let hits = outer_hits.clone();
        target.set_property(
            outer,
            "onclick",
            &PropValue::Handler(EventHandler::new(move |_| hits.set(hits.get() + 1))),
        );
        assert!(target.dispatch(inner, "click"));
        assert_eq!(outer_hits.get(), 1);

        target.set_property(
            inner,
            "onclick",
            &PropValue::Handler(EventHandler::new(|event| event.stop_propagation())),
        );
        assert!(target.dispatch(inner, "click"));
        assert_eq!(outer_hits.get(), 1);
        assert!(!target.dispatch(outer, "input"));
    }

    #[test]
    fn released_nodes_drop_listeners() {
        let mut target = MemoryTarget::new();
        let button = target.create_element("button");
        target.set_property(
            button,
            "onclick",
            &PropValue::Handler(EventHandler::new(|_| {})),
        );
        assert!(target.has_listener(button, "click"));
        target.release(button);
        assert!(!target.has_listener(button, "click"));
        assert!(target.is_released(button));
    }
}
