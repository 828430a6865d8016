//! Keyed reconciliation of rendered trees against committed ones.
//!
//! The reconciler owns the association between virtual nodes and target
//! nodes: every [`Committed`] node records the [`NodeRef`] it was materialized
//! into. Diffing a new [`Rendered`] tree against the committed one issues the
//! minimal set of [`RenderTarget`] operations and yields the next committed
//! tree.
//!
//! Children are matched by key first, then positionally among unkeyed
//! siblings. Fragments contribute their children's host nodes directly to the
//! enclosing element, so placement happens once per host element over the
//! flattened node list: reused nodes that are out of order are moved only
//! after all creates, updates and removals, and only those outside the
//! longest run already in order.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::component::ComponentId;
use crate::target::{NodeRef, NodeRefTarget, RenderTarget};
use crate::vnode::{Key, PropValue, Props};

/// Output of a render pass: a virtual tree with every component expanded.
#[derive(Debug)]
pub(crate) enum Rendered {
    Element(RenderedElement),
    Text(String),
    Component(RenderedComponent),
    Fragment(RenderedFragment),
    Opaque(NodeRef),
}

#[derive(Debug)]
pub(crate) struct RenderedElement {
    pub(crate) tag: String,
    pub(crate) props: Props,
    pub(crate) key: Option<Key>,
    pub(crate) children: Vec<Rendered>,
}

#[derive(Debug)]
pub(crate) struct RenderedComponent {
    pub(crate) id: ComponentId,
    pub(crate) key: Option<Key>,
    pub(crate) child: Box<Rendered>,
}

#[derive(Debug)]
pub(crate) struct RenderedFragment {
    pub(crate) key: Option<Key>,
    pub(crate) children: Vec<Rendered>,
}

impl Rendered {
    fn key(&self) -> Option<&Key> {
        match self {
            Self::Element(el) => el.key.as_ref(),
            Self::Component(c) => c.key.as_ref(),
            Self::Fragment(f) => f.key.as_ref(),
            Self::Text(_) | Self::Opaque(_) => None,
        }
    }
}

/// A rendered tree after it has been applied to the target.
#[derive(Debug)]
pub(crate) enum Committed {
    Element(CommittedElement),
    Text { content: String, node: NodeRef },
    Component(CommittedComponent),
    Fragment(CommittedFragment),
    Opaque(NodeRef),
}

#[derive(Debug)]
pub(crate) struct CommittedElement {
    tag: String,
    props: Props,
    key: Option<Key>,
    node: NodeRef,
    children: Vec<Committed>,
}

#[derive(Debug)]
pub(crate) struct CommittedComponent {
    id: ComponentId,
    key: Option<Key>,
    child: Box<Committed>,
}

#[derive(Debug)]
pub(crate) struct CommittedFragment {
    key: Option<Key>,
    children: Vec<Committed>,
}

impl Committed {
    /// The top-level target nodes of this subtree, in document order.
    pub(crate) fn nodes(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.collect_nodes(&mut out);
        out
    }

    pub(crate) fn first_node(&self) -> Option<NodeRef> {
        match self {
            Self::Element(el) => Some(el.node),
            Self::Text { node, .. } | Self::Opaque(node) => Some(*node),
            Self::Component(c) => c.child.first_node(),
            Self::Fragment(f) => f.children.iter().find_map(Committed::first_node),
        }
    }

    fn collect_nodes(&self, out: &mut Vec<NodeRef>) {
        match self {
            Self::Element(el) => out.push(el.node),
            Self::Text { node, .. } | Self::Opaque(node) => out.push(*node),
            Self::Component(c) => c.child.collect_nodes(out),
            Self::Fragment(f) => {
                for child in &f.children {
                    child.collect_nodes(out);
                }
            }
        }
    }

    fn key(&self) -> Option<&Key> {
        match self {
            Self::Element(el) => el.key.as_ref(),
            Self::Component(c) => c.key.as_ref(),
            Self::Fragment(f) => f.key.as_ref(),
            Self::Text { .. } | Self::Opaque(_) => None,
        }
    }
}

fn nodes_of(children: &[Committed]) -> Vec<NodeRef> {
    let mut out = Vec::new();
    for child in children {
        child.collect_nodes(&mut out);
    }
    out
}

enum Patched {
    Reused(Committed),
    Replaced { fresh: Committed, stale: Committed },
}

/// A ref to notify once the target is no longer borrowed.
pub(crate) type RefUpdate = (NodeRefTarget, Option<NodeRef>);

pub(crate) struct Reconciler<'t, T: RenderTarget> {
    target: &'t mut T,
    refs: Vec<RefUpdate>,
    mutations: usize,
}

impl<'t, T: RenderTarget> Reconciler<'t, T> {
    pub(crate) fn new(target: &'t mut T) -> Self {
        Self {
            target,
            refs: Vec::new(),
            mutations: 0,
        }
    }

    /// Ref updates to apply and the number of target mutations issued.
    ///
    /// Detaches come first so a ref that moved to a new element ends up
    /// attached.
    pub(crate) fn finish(mut self) -> (Vec<RefUpdate>, usize) {
        self.refs.sort_by_key(|(_, node)| node.is_some());
        (self.refs, self.mutations)
    }

    /// Bring `container`'s content from `previous` to `next`.
    pub(crate) fn reconcile(
        &mut self,
        container: NodeRef,
        previous: Option<Committed>,
        next: Rendered,
    ) -> Committed {
        let Some(previous) = previous else {
            let fresh = self.materialize(next);
            for node in fresh.nodes() {
                self.insert(container, node, None);
            }
            return fresh;
        };
        let before = previous.nodes();
        match self.patch(container, previous, next) {
            Patched::Reused(committed) => {
                self.place(container, &before, std::slice::from_ref(&committed));
                committed
            }
            Patched::Replaced { fresh, stale } => {
                let anchor = stale.first_node();
                for node in fresh.nodes() {
                    self.insert(container, node, anchor);
                }
                self.discard(container, stale);
                fresh
            }
        }
    }

    /// Remove a committed tree from `container`.
    pub(crate) fn remove(&mut self, container: NodeRef, committed: Committed) {
        self.discard(container, committed);
    }

    /// Patch `old` into `new`. `parent` is the host node the subtree's
    /// top-level nodes live in.
    fn patch(&mut self, parent: NodeRef, old: Committed, new: Rendered) -> Patched {
        match (old, new) {
            (Committed::Text { content, node }, Rendered::Text(next)) => {
                if content != next {
                    self.target.set_text_content(node, &next);
                    self.mutations += 1;
                }
                Patched::Reused(Committed::Text {
                    content: next,
                    node,
                })
            }
            (Committed::Element(old), Rendered::Element(new)) if old.tag == new.tag => {
                let CommittedElement {
                    props,
                    node,
                    children,
                    ..
                } = old;
                self.update_props(node, &props, &new.props);
                let children = self.diff_children(node, children, new.children);
                Patched::Reused(Committed::Element(CommittedElement {
                    tag: new.tag,
                    props: new.props,
                    key: new.key,
                    node,
                    children,
                }))
            }
            (Committed::Fragment(old), Rendered::Fragment(new)) => {
                let children = self.diff_group(parent, old.children, new.children);
                Patched::Reused(Committed::Fragment(CommittedFragment {
                    key: new.key,
                    children,
                }))
            }
            (Committed::Opaque(old), Rendered::Opaque(new)) if old == new => {
                Patched::Reused(Committed::Opaque(old))
            }
            (Committed::Component(old), Rendered::Component(new)) if old.id == new.id => {
                let wrap = |child: Committed| {
                    Committed::Component(CommittedComponent {
                        id: new.id,
                        key: new.key,
                        child: Box::new(child),
                    })
                };
                match self.patch(parent, *old.child, *new.child) {
                    Patched::Reused(child) => Patched::Reused(wrap(child)),
                    Patched::Replaced { fresh, stale } => Patched::Replaced {
                        fresh: wrap(fresh),
                        stale,
                    },
                }
            }
            (old, new) => Patched::Replaced {
                fresh: self.materialize(new),
                stale: old,
            },
        }
    }

    fn materialize(&mut self, node: Rendered) -> Committed {
        match node {
            Rendered::Text(content) => {
                let node = self.target.create_text(&content);
                self.mutations += 1;
                Committed::Text { content, node }
            }
            Rendered::Opaque(node) => Committed::Opaque(node),
            Rendered::Element(el) => {
                let node = self.target.create_element(&el.tag);
                self.mutations += 1;
                self.update_props(node, &Props::new(), &el.props);
                let mut children = Vec::with_capacity(el.children.len());
                for child in el.children {
                    let child = self.materialize(child);
                    for host in child.nodes() {
                        self.insert(node, host, None);
                    }
                    children.push(child);
                }
                Committed::Element(CommittedElement {
                    tag: el.tag,
                    props: el.props,
                    key: el.key,
                    node,
                    children,
                })
            }
            Rendered::Fragment(f) => Committed::Fragment(CommittedFragment {
                key: f.key,
                children: f
                    .children
                    .into_iter()
                    .map(|child| self.materialize(child))
                    .collect(),
            }),
            Rendered::Component(c) => {
                let child = self.materialize(*c.child);
                Committed::Component(CommittedComponent {
                    id: c.id,
                    key: c.key,
                    child: Box::new(child),
                })
            }
        }
    }

    fn update_props(&mut self, node: NodeRef, old: &Props, new: &Props) {
        for (name, previous) in old.iter() {
            if new.contains(name) {
                continue;
            }
            match previous {
                PropValue::Ref(target) => self.refs.push((target.clone(), None)),
                _ => {
                    self.target.remove_property(node, name, previous);
                    self.mutations += 1;
                }
            }
        }

        for (name, value) in new.iter() {
            let previous = old.get(name);
            if previous == Some(value) {
                continue;
            }
            match (previous, value) {
                (previous, PropValue::Ref(target)) => {
                    if let Some(PropValue::Ref(old_target)) = previous {
                        self.refs.push((old_target.clone(), None));
                    }
                    self.refs.push((target.clone(), Some(node)));
                }
                (Some(PropValue::Style(before)), PropValue::Style(after)) => {
                    let removed: BTreeMap<String, String> = before
                        .iter()
                        .filter(|(k, _)| !after.contains_key(*k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if !removed.is_empty() {
                        self.target.remove_property(node, name, &PropValue::Style(removed));
                        self.mutations += 1;
                    }
                    let changed: BTreeMap<String, String> = after
                        .iter()
                        .filter(|(k, v)| before.get(*k) != Some(*v))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if !changed.is_empty() {
                        self.target.set_property(node, name, &PropValue::Style(changed));
                        self.mutations += 1;
                    }
                }
                (Some(previous), _) if std::mem::discriminant(previous) != std::mem::discriminant(value) => {
                    if let PropValue::Ref(old_target) = previous {
                        self.refs.push((old_target.clone(), None));
                    } else {
                        self.target.remove_property(node, name, previous);
                        self.mutations += 1;
                    }
                    self.target.set_property(node, name, value);
                    self.mutations += 1;
                }
                _ => {
                    self.target.set_property(node, name, value);
                    self.mutations += 1;
                }
            }
        }
    }

    /// Diff an element's children and put its host nodes in order.
    fn diff_children(
        &mut self,
        parent: NodeRef,
        old: Vec<Committed>,
        new: Vec<Rendered>,
    ) -> Vec<Committed> {
        let before = nodes_of(&old);
        let result = self.diff_group(parent, old, new);
        self.place(parent, &before, &result);
        result
    }

    /// Match and patch one sibling group, removing what is left over.
    /// New nodes are created but not inserted; see [`Self::place`].
    fn diff_group(
        &mut self,
        parent: NodeRef,
        old: Vec<Committed>,
        new: Vec<Rendered>,
    ) -> Vec<Committed> {
        let mut keyed: HashMap<Key, (usize, Committed)> = HashMap::new();
        let mut unkeyed: VecDeque<(usize, Committed)> = VecDeque::new();
        let mut stale: Vec<(usize, Committed)> = Vec::new();

        for (index, child) in old.into_iter().enumerate() {
            match child.key().cloned() {
                Some(key) if keyed.contains_key(&key) => {
                    tracing::warn!(%key, "duplicate key among siblings");
                    stale.push((index, child));
                }
                Some(key) => {
                    keyed.insert(key, (index, child));
                }
                None => unkeyed.push_back((index, child)),
            }
        }

        // Pass 1: match and patch, creating what has no counterpart.
        let mut result = Vec::with_capacity(new.len());
        for child in new {
            let matched = match child.key() {
                Some(key) => keyed.remove(key),
                None => unkeyed.pop_front(),
            };
            match matched {
                Some((index, previous)) => match self.patch(parent, previous, child) {
                    Patched::Reused(committed) => result.push(committed),
                    Patched::Replaced { fresh, stale: replaced } => {
                        result.push(fresh);
                        stale.push((index, replaced));
                    }
                },
                None => result.push(self.materialize(child)),
            }
        }

        // Pass 2: remove everything left over, in old order.
        stale.extend(keyed.into_values());
        stale.extend(unkeyed);
        stale.sort_by_key(|(index, _)| *index);
        for (_, child) in stale {
            self.discard(parent, child);
        }

        result
    }

    /// Order `parent`'s host nodes to match `children`. `before` lists the
    /// nodes in their order prior to this diff; nodes absent from it are new.
    fn place(&mut self, parent: NodeRef, before: &[NodeRef], children: &[Committed]) {
        let desired = nodes_of(children);
        let present: HashSet<NodeRef> = desired.iter().copied().collect();
        let current: HashMap<NodeRef, usize> = before
            .iter()
            .filter(|node| present.contains(*node))
            .enumerate()
            .map(|(index, node)| (*node, index))
            .collect();
        let sources: Vec<Option<usize>> = desired.iter().map(|node| current.get(node).copied()).collect();
        let stable = stable_positions(&sources);

        // Pass 3: insert new nodes, anchored on nodes that will not move.
        let mut anchor = None;
        for position in (0..desired.len()).rev() {
            let node = desired[position];
            if sources[position].is_none() {
                self.insert(parent, node, anchor);
                anchor = Some(node);
            } else if stable[position] {
                anchor = Some(node);
            }
        }

        // Pass 4: deferred moves.
        for position in (0..desired.len()).rev() {
            if sources[position].is_some() && !stable[position] {
                let next = desired.get(position + 1).copied();
                self.target.move_child(parent, desired[position], next);
                self.mutations += 1;
            }
        }
    }

    fn insert(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>) {
        self.target.insert_child(parent, child, before);
        self.mutations += 1;
    }

    fn discard(&mut self, parent: NodeRef, stale: Committed) {
        let nodes = stale.nodes();
        self.release(&stale);
        for node in nodes {
            self.target.remove_child(parent, node);
            self.mutations += 1;
        }
    }

    fn release(&mut self, node: &Committed) {
        match node {
            Committed::Element(el) => {
                for child in &el.children {
                    self.release(child);
                }
                for (_, value) in el.props.iter() {
                    if let PropValue::Ref(target) = value {
                        self.refs.push((target.clone(), None));
                    }
                }
                self.target.release(el.node);
            }
            Committed::Text { node, .. } | Committed::Opaque(node) => self.target.release(*node),
            Committed::Component(c) => self.release(&c.child),
            Committed::Fragment(f) => {
                for child in &f.children {
                    self.release(child);
                }
            }
        }
    }
}

/// Marks the positions whose old indices form a longest increasing
/// subsequence. Those nodes are already in relative order and stay put.
fn stable_positions(sources: &[Option<usize>]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; sources.len()];
    for (position, source) in sources.iter().enumerate() {
        let Some(index) = *source else {
            continue;
        };
        let slot = tails.partition_point(|&p| sources[p].is_some_and(|i| i < index));
        if slot > 0 {
            predecessor[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut stable = vec![false; sources.len()];
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        stable[position] = true;
        cursor = predecessor[position];
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTarget, Op};

    fn text(s: &str) -> Rendered {
        Rendered::Text(s.to_string())
    }

    fn li(key: Option<&str>, label: &str) -> Rendered {
        Rendered::Element(RenderedElement {
            tag: "li".to_string(),
            props: Props::new(),
            key: key.map(Key::from),
            children: vec![text(label)],
        })
    }

    fn ul(children: Vec<Rendered>) -> Rendered {
        Rendered::Element(RenderedElement {
            tag: "ul".to_string(),
            props: Props::new(),
            key: None,
            children,
        })
    }

    fn keyed(labels: &[&str]) -> Rendered {
        ul(labels.iter().map(|l| li(Some(l), l)).collect())
    }

    fn unkeyed(labels: &[&str]) -> Rendered {
        ul(labels.iter().map(|l| li(None, l)).collect())
    }

    fn group(key: Option<&str>, labels: &[&str]) -> Rendered {
        Rendered::Fragment(RenderedFragment {
            key: key.map(Key::from),
            children: labels.iter().map(|l| li(Some(l), l)).collect(),
        })
    }

    fn commit(target: &mut MemoryTarget, container: NodeRef, previous: Option<Committed>, next: Rendered) -> Committed {
        let mut reconciler = Reconciler::new(target);
        let committed = reconciler.reconcile(container, previous, next);
        let _ = reconciler.finish();
        committed
    }

    #[test]
    fn lis_marks_longest_run() {
        assert_eq!(stable_positions(&[Some(2), Some(0), Some(1)]), [false, true, true]);
        assert_eq!(stable_positions(&[Some(0), None, Some(1)]), [true, false, true]);
        assert_eq!(stable_positions(&[Some(3), Some(2), Some(1), Some(0)]).iter().filter(|s| **s).count(), 1);
    }

    #[test]
    fn keyed_rotation_moves_one_node() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(&mut target, root, None, keyed(&["a", "b", "c"]));
        target.take_ops();

        let second = commit(&mut target, root, Some(first), keyed(&["c", "a", "b"]));
        let ops = target.take_ops();
        assert_eq!(ops.iter().filter(|op| op.is_create()).count(), 0);
        assert_eq!(ops.iter().filter(|op| op.is_remove()).count(), 0);
        assert_eq!(ops.iter().filter(|op| op.is_move()).count(), 1);
        assert_eq!(target.text(second.first_node().unwrap()), "cab");
    }

    #[test]
    fn unkeyed_append_inserts_once() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(&mut target, root, None, unkeyed(&["x", "y"]));
        target.take_ops();

        let second = commit(&mut target, root, Some(first), unkeyed(&["x", "y", "z"]));
        let ops = target.take_ops();
        let inserts: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, Op::Insert { parent, .. } if *parent == second.first_node().unwrap()))
            .collect();
        assert_eq!(inserts.len(), 1);
        assert!(!ops.iter().any(|op| op.is_move() || op.is_remove()));
        assert_eq!(target.text(second.first_node().unwrap()), "xyz");
    }

    #[test]
    fn keyed_insert_remove_and_reverse() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let mut committed = commit(&mut target, root, None, keyed(&["a", "b", "c", "d"]));

        for labels in [
            &["d", "c", "b", "a"][..],
            &["c", "e", "a"][..],
            &["a", "f", "c", "e"][..],
            &[][..],
            &["z"][..],
        ] {
            committed = commit(&mut target, root, Some(committed), keyed(labels));
            assert_eq!(target.text(committed.first_node().unwrap()), labels.concat());
        }
    }

    #[test]
    fn type_change_replaces_node() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(&mut target, root, None, unkeyed(&["a"]));
        let old_node = first.first_node().unwrap();

        let next = Rendered::Element(RenderedElement {
            tag: "ol".to_string(),
            props: Props::new(),
            key: None,
            children: vec![text("a")],
        });
        let second = commit(&mut target, root, Some(first), next);
        assert_ne!(second.first_node().unwrap(), old_node);
        assert!(target.is_released(old_node));
        assert_eq!(target.children(root), vec![second.first_node().unwrap()]);
    }

    #[test]
    fn text_updates_in_place() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(&mut target, root, None, text("0"));
        target.take_ops();
        let second = commit(&mut target, root, Some(first), text("1"));
        assert_eq!(
            target.take_ops(),
            vec![Op::SetText {
                node: second.first_node().unwrap(),
                content: "1".to_string()
            }]
        );
    }

    #[test]
    fn props_are_diffed() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let element = |props: Props| {
            Rendered::Element(RenderedElement {
                tag: "div".to_string(),
                props,
                key: None,
                children: Vec::new(),
            })
        };
        let first = commit(
            &mut target,
            root,
            None,
            element(Props::new().with("id", "a").with("title", "t").style("color", "red")),
        );
        target.take_ops();

        let second = commit(
            &mut target,
            root,
            Some(first),
            element(Props::new().with("id", "b").style("color", "red")),
        );
        let node = second.first_node().unwrap();
        let ops = target.take_ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(target.attribute(node, "id"), Some(PropValue::from("b")));
        assert_eq!(target.attribute(node, "title"), None);
        assert_eq!(target.style(node, "color").as_deref(), Some("red"));
    }

    #[test]
    fn refs_attach_and_detach() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<Option<NodeRef>>>> = Rc::default();
        let log = seen.clone();
        let target_ref = NodeRefTarget::callback(move |node| log.borrow_mut().push(node));

        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let element = Rendered::Element(RenderedElement {
            tag: "input".to_string(),
            props: Props::new().node_ref(target_ref),
            key: None,
            children: Vec::new(),
        });

        let mut reconciler = Reconciler::new(&mut target);
        let committed = reconciler.reconcile(root, None, element);
        for (target, node) in reconciler.finish().0 {
            target.attach(node);
        }

        let mut reconciler = Reconciler::new(&mut target);
        reconciler.remove(root, committed);
        for (target, node) in reconciler.finish().0 {
            target.attach(node);
        }
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_some());
        assert_eq!(seen[1], None);
    }

    #[test]
    fn fragment_children_sit_between_siblings() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let tree = |labels: &[&str]| ul(vec![li(None, "<"), group(None, labels), li(None, ">")]);

        let mut committed = commit(&mut target, root, None, tree(&["a", "b"]));
        assert_eq!(target.text(root), "<ab>");

        for labels in [&["b", "c", "a"][..], &[][..], &["d"][..]] {
            committed = commit(&mut target, root, Some(committed), tree(labels));
            assert_eq!(target.text(root), format!("<{}>", labels.concat()));
        }
    }

    #[test]
    fn keyed_fragments_move_as_units() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(
            &mut target,
            root,
            None,
            ul(vec![group(Some("x"), &["a", "b"]), group(Some("y"), &["c", "d"])]),
        );
        target.take_ops();

        commit(
            &mut target,
            root,
            Some(first),
            ul(vec![group(Some("y"), &["c", "d"]), group(Some("x"), &["a", "b"])]),
        );
        let ops = target.take_ops();
        assert!(!ops.iter().any(|op| op.is_create() || op.is_remove()));
        assert_eq!(ops.iter().filter(|op| op.is_move()).count(), 2);
        assert_eq!(target.text(root), "cdab");
    }

    #[test]
    fn fragment_root_is_placed_in_the_container() {
        let mut target = MemoryTarget::new();
        let root = target.create_container("root");
        let first = commit(&mut target, root, None, group(None, &["a", "b"]));
        assert_eq!(target.children(root).len(), 2);

        let second = commit(&mut target, root, Some(first), group(None, &["b", "a", "c"]));
        assert_eq!(target.text(root), "bac");
        assert_eq!(second.nodes(), target.children(root));

        let mut reconciler = Reconciler::new(&mut target);
        reconciler.remove(root, second);
        let _ = reconciler.finish();
        assert!(target.children(root).is_empty());
    }
}
