//! The render target abstraction.
//!
//! The reconciler never touches a concrete node tree. It issues the primitive
//! operations of [`RenderTarget`] against opaque [`NodeRef`] handles, which
//! lets the same runtime drive a browser DOM binding, a terminal renderer or
//! the in-memory [`MemoryTarget`](crate::MemoryTarget) used in tests.

use std::rc::Rc;

use crate::hooks::RefHandle;
use crate::vnode::PropValue;

/// Opaque handle to a node owned by a render target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeRef(u64);

impl NodeRef {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Primitive node operations the reconciler needs from a host.
///
/// Text, class and style props arrive as [`PropValue`]s; targets decide how to
/// apply them. `set_property` with a [`PropValue::Style`] merges the listed
/// entries into the node's style; `remove_property` with a style clears only
/// the listed entries.
pub trait RenderTarget {
    fn create_element(&mut self, tag: &str) -> NodeRef;

    fn create_text(&mut self, content: &str) -> NodeRef;

    fn set_property(&mut self, node: NodeRef, name: &str, value: &PropValue);

    fn remove_property(&mut self, node: NodeRef, name: &str, previous: &PropValue);

    /// Insert `child` under `parent`, before `before` or at the end.
    fn insert_child(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>);

    fn remove_child(&mut self, parent: NodeRef, child: NodeRef);

    /// Move an existing child of `parent` so it sits before `before`, or last.
    fn move_child(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>);

    fn set_text_content(&mut self, node: NodeRef, content: &str);

    /// Called once for every node leaving the tree, before it is detached.
    fn release(&mut self, _node: NodeRef) {}
}

/// Receiver of a rendered element's handle, set through the `ref` prop.
///
/// The reconciler passes `Some(node)` once the element exists and `None` when
/// it leaves the tree or the ref is replaced.
#[derive(Clone)]
pub enum NodeRefTarget {
    Callback(Rc<dyn Fn(Option<NodeRef>)>),
    Cell(RefHandle<Option<NodeRef>>),
}

impl NodeRefTarget {
    pub fn callback<F: Fn(Option<NodeRef>) + 'static>(f: F) -> Self {
        Self::Callback(Rc::new(f))
    }

    pub(crate) fn attach(&self, node: Option<NodeRef>) {
        match self {
            Self::Callback(f) => f(node),
            Self::Cell(cell) => cell.set(node),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callback(a), Self::Callback(b)) => Rc::ptr_eq(a, b),
            (Self::Cell(a), Self::Cell(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for NodeRefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("NodeRefTarget::Callback(...)"),
            Self::Cell(cell) => write!(f, "NodeRefTarget::Cell({:?})", *cell.borrow()),
        }
    }
}

impl From<RefHandle<Option<NodeRef>>> for NodeRefTarget {
    fn from(cell: RefHandle<Option<NodeRef>>) -> Self {
        Self::Cell(cell)
    }
}
