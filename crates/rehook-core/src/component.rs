//! Components: named render functions with a stable identity.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RenderError;
use crate::vnode::{h, Child, Props, VNode};

/// What a component render returns.
pub type Render = Result<VNode, RenderError>;

/// Unique identifier for a component definition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_component_id() -> ComponentId {
    ComponentId(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
}

type RenderFn = Rc<dyn Fn(&Props) -> Render>;
type PropsEq = Rc<dyn Fn(&Props, &Props) -> bool>;

struct ComponentInner {
    id: ComponentId,
    name: &'static str,
    render: RenderFn,
    /// Present on memoized definitions.
    props_eq: Option<PropsEq>,
}

/// A component definition.
///
/// Cloning is cheap and preserves identity: two nodes built from clones of
/// the same `Component` are the same component type to the reconciler.
/// The `#[component]` attribute creates one definition per thread and returns
/// clones of it.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Component {
    pub fn new<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props) -> Render + 'static,
    {
        Self {
            inner: Rc::new(ComponentInner {
                id: next_component_id(),
                name,
                render: Rc::new(render),
                props_eq: None,
            }),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Build an invocation of this component.
    pub fn with_props(&self, props: Props) -> VNode {
        h(self, props, std::iter::empty::<Child>())
    }

    pub(crate) fn call(&self, props: &Props) -> Render {
        (self.inner.render)(props)
    }

    /// The props comparison of a memoized component.
    pub(crate) fn props_eq(&self) -> Option<&dyn Fn(&Props, &Props) -> bool> {
        self.inner.props_eq.as_deref()
    }

    pub fn is_memo(&self) -> bool {
        self.inner.props_eq.is_some()
    }
}

/// A memoized version of `component`.
///
/// When its parent re-renders, an instance of the returned component skips
/// its render function and reuses its previous output if the new props equal
/// the previous ones, its own state has not changed and every context it read
/// still resolves to the same provided value. Its descendants are still
/// visited, so their own updates are not lost.
///
/// The result is a distinct component type with its own id.
///
/// ```
/// use rehook_core::{memo, Component, VNode};
///
/// let row = Component::new("Row", |_| Ok(VNode::text("row")));
/// let pure_row = memo(&row);
/// assert!(pure_row.is_memo());
/// assert_ne!(pure_row, row);
/// ```
pub fn memo(component: &Component) -> Component {
    memo_with(component, |previous, next| previous == next)
}

/// Like [`memo`], with a custom comparison. `equal(previous, next)` returning
/// `true` allows the render to be skipped.
pub fn memo_with<F>(component: &Component, equal: F) -> Component
where
    F: Fn(&Props, &Props) -> bool + 'static,
{
    Component {
        inner: Rc::new(ComponentInner {
            id: next_component_id(),
            name: component.inner.name,
            render: Rc::clone(&component.inner.render),
            props_eq: Some(Rc::new(equal)),
        }),
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Component::new("A", |_| Ok(VNode::text("a")));
        let b = a.clone();
        let c = Component::new("A", |_| Ok(VNode::text("a")));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.name(), "A");
    }

    #[test]
    fn call_renders() {
        let greet = Component::new("Greet", |props: &Props| {
            Ok(VNode::text(format!(
                "hello {}",
                props.get_str("name").unwrap_or("?")
            )))
        });
        let out = greet.call(&Props::new().with("name", "ana")).unwrap();
        assert_eq!(out, VNode::text("hello ana"));
    }

    #[test]
    fn memo_shares_render_but_not_identity() {
        let plain = Component::new("Label", |props: &Props| {
            Ok(VNode::text(props.get_str("text").unwrap_or_default().to_string()))
        });
        let pure = memo(&plain);
        assert!(!plain.is_memo());
        assert!(pure.is_memo());
        assert_ne!(plain, pure);
        assert_eq!(pure.name(), "Label");

        let props = Props::new().with("text", "hi");
        assert_eq!(pure.call(&props).unwrap(), VNode::text("hi"));
        let equal = pure.props_eq().unwrap();
        assert!(equal(&props, &Props::new().with("text", "hi")));
        assert!(!equal(&props, &Props::new().with("text", "ho")));

        let loose = memo_with(&plain, |_, _| true);
        assert!(loose.props_eq().unwrap()(&props, &Props::new()));
    }
}
