//! Error and suspense boundaries.
//!
//! A boundary is a component that registers a recovery handler while it
//! renders. When a descendant's render fails (or suspends on a pending
//! [`Resource`](crate::Resource)), the failure travels up the tree as a
//! [`RenderError`](crate::RenderError) until the nearest boundary of the
//! matching kind replaces its subtree with a fallback.

use std::rc::Rc;

use crate::component::{Component, Render};
use crate::error::ComponentError;
use crate::invoker::current_frame;
use crate::vnode::{Key, Props, VNode};

type Fallback = Rc<dyn Fn(&ComponentError) -> VNode>;
type ErrorCallback = Rc<dyn Fn(&ComponentError)>;

#[derive(Clone)]
pub(crate) enum Boundary {
    Error {
        fallback: Fallback,
        on_error: Option<ErrorCallback>,
    },
    Suspense {
        fallback: VNode,
    },
}

struct ErrorBoundaryProps {
    fallback: Fallback,
    on_error: Option<ErrorCallback>,
}

struct SuspenseProps {
    fallback: VNode,
}

const BOUNDARY_PROP: &str = "boundary";

thread_local! {
    static ERROR_BOUNDARY: Component = Component::new("ErrorBoundary", render_error_boundary);
    static SUSPENSE: Component = Component::new("Suspense", render_suspense);
}

fn render_error_boundary(props: &Props) -> Render {
    let frame = current_frame("error_boundary");
    if let Some(config) = props.get_any::<ErrorBoundaryProps>(BOUNDARY_PROP) {
        frame.instance.set_boundary(Boundary::Error {
            fallback: Rc::clone(&config.fallback),
            on_error: config.on_error.clone(),
        });
    }
    Ok(only_child(props))
}

fn render_suspense(props: &Props) -> Render {
    let frame = current_frame("suspense");
    if let Some(config) = props.get_any::<SuspenseProps>(BOUNDARY_PROP) {
        frame.instance.set_boundary(Boundary::Suspense {
            fallback: config.fallback.clone(),
        });
    }
    Ok(only_child(props))
}

fn only_child(props: &Props) -> VNode {
    props
        .get_children()
        .first()
        .cloned()
        .unwrap_or_else(|| VNode::text(""))
}

/// Builder for an error boundary.
///
/// ```
/// use rehook_core::{h, ErrorBoundary, Props, VNode};
///
/// let guarded = ErrorBoundary::new(|err| VNode::text(format!("failed: {}", err.message())))
///     .on_error(|err| eprintln!("{err}"))
///     .wrap(h("div", Props::new(), ["content"]));
/// # let _ = guarded;
/// ```
pub struct ErrorBoundary {
    fallback: Fallback,
    on_error: Option<ErrorCallback>,
    key: Option<Key>,
}

impl ErrorBoundary {
    pub fn new<F>(fallback: F) -> Self
    where
        F: Fn(&ComponentError) -> VNode + 'static,
    {
        Self {
            fallback: Rc::new(fallback),
            on_error: None,
            key: None,
        }
    }

    /// Called with each caught failure, before the fallback renders.
    pub fn on_error<F: Fn(&ComponentError) + 'static>(mut self, f: F) -> Self {
        self.on_error = Some(Rc::new(f));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn wrap(self, child: impl Into<VNode>) -> VNode {
        let props = Props::new()
            .any(
                BOUNDARY_PROP,
                ErrorBoundaryProps {
                    fallback: self.fallback,
                    on_error: self.on_error,
                },
            )
            .children(vec![child.into()]);
        let node = ERROR_BOUNDARY.with(|c| c.with_props(props));
        match self.key {
            Some(key) => node.with_key(key),
            None => node,
        }
    }
}

/// Render `child`, replacing it with `fallback(error)` when anything below
/// fails.
pub fn error_boundary<F>(child: impl Into<VNode>, fallback: F) -> VNode
where
    F: Fn(&ComponentError) -> VNode + 'static,
{
    ErrorBoundary::new(fallback).wrap(child)
}

/// Render `child`, showing `fallback` while anything below is waiting on a
/// pending resource. The subtree renders again once the resource settles.
pub fn suspense(fallback: impl Into<VNode>, child: impl Into<VNode>) -> VNode {
    let props = Props::new()
        .any(
            BOUNDARY_PROP,
            SuspenseProps {
                fallback: fallback.into(),
            },
        )
        .children(vec![child.into()]);
    SUSPENSE.with(|c| c.with_props(props))
}
