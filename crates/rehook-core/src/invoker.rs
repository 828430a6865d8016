//! Component invocation and render-pass expansion.
//!
//! A render pass walks the root [`VNode`] and invokes every component it
//! meets, producing a [`Rendered`] tree in which component nodes carry their
//! output. While a component runs, its instance is the *active frame*: hooks
//! called from the render function read and write that instance's records.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::boundary::Boundary;
use crate::component::Component;
use crate::context::{ContextId, ProvidedContext};
use crate::error::{ComponentError, HookError, RenderError};
use crate::lifecycle::PendingEffect;
use crate::reconciler::{Rendered, RenderedComponent, RenderedElement, RenderedFragment};
use crate::runtime::{Shared, UpdateHandle};
use crate::store::{panic_message, HookKind, Instance, InstanceKey, PathSegment};
use crate::vnode::{ComponentNode, Props, VNode};

thread_local! {
    static ACTIVE: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// The instance currently being rendered.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) shared: Rc<Shared>,
    pub(crate) instance: Rc<Instance>,
}

impl Frame {
    /// Read the next hook record of the active instance.
    pub(crate) fn slot<T: Any>(&self, kind: HookKind, init: impl FnOnce() -> T) -> Rc<T> {
        let (value, violation) = self.instance.next_slot(kind, init);
        if let Some(err) = violation {
            self.shared.report_hook_error(&self.instance, &err);
        }
        value
    }

    pub(crate) fn queue_effect(&self, effect: PendingEffect) {
        self.shared.pass.borrow_mut().effects.push(effect);
    }

    pub(crate) fn lookup_context(&self, id: ContextId) -> Option<Rc<dyn Any>> {
        find_context(&self.shared, id)
    }

    pub(crate) fn handle(&self) -> UpdateHandle {
        UpdateHandle::new(&self.shared.scheduler)
    }
}

/// The innermost value provided for `id` on the current render path.
fn find_context(shared: &Shared, id: ContextId) -> Option<Rc<dyn Any>> {
    shared
        .pass
        .borrow()
        .contexts
        .iter()
        .rev()
        .find(|provided| provided.id == id)
        .map(|provided| Rc::clone(&provided.value))
}

/// The active frame, or a panic naming the offending hook.
pub(crate) fn current_frame(hook: &'static str) -> Frame {
    ACTIVE
        .with(|active| active.borrow().last().cloned())
        .unwrap_or_else(|| panic!("{}", HookError::InvalidContext { hook }))
}

/// Returns `true` while a component render function is running.
pub fn is_rendering() -> bool {
    ACTIVE.with(|active| !active.borrow().is_empty())
}

struct FrameGuard;

impl FrameGuard {
    fn enter(frame: Frame) -> Self {
        ACTIVE.with(|active| active.borrow_mut().push(frame));
        Self
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// Bookkeeping collected during one render pass.
#[derive(Default)]
pub(crate) struct PassState {
    /// Instances rendered in this pass, in visit order.
    pub(crate) visited: Vec<InstanceKey>,
    pub(crate) visited_set: HashSet<InstanceKey>,
    /// Instances rendered into a subtree a boundary then replaced with its
    /// fallback. They are unmounted at commit unless visited again.
    pub(crate) discarded: Vec<InstanceKey>,
    pub(crate) effects: Vec<PendingEffect>,
    contexts: Vec<ProvidedContext>,
}

/// Pass bookkeeping lengths taken before a component's output is expanded.
#[derive(Clone, Copy)]
struct PassMark {
    contexts: usize,
    effects: usize,
    visited: usize,
}

pub(crate) struct Invoker<'a> {
    shared: &'a Rc<Shared>,
}

impl<'a> Invoker<'a> {
    pub(crate) fn new(shared: &'a Rc<Shared>) -> Self {
        Self { shared }
    }

    /// Expand the root node. The pass state is returned even on failure so
    /// instances created by a failed pass can be reclaimed.
    pub(crate) fn render_root(&self, root: &VNode) -> (Result<Rendered, RenderError>, PassState) {
        *self.shared.pass.borrow_mut() = PassState::default();
        let mut path = Vec::new();
        let result = self.expand(root, None, &mut path);
        let pass = std::mem::take(&mut *self.shared.pass.borrow_mut());
        (result, pass)
    }

    fn expand(
        &self,
        node: &VNode,
        parent: Option<&InstanceKey>,
        path: &mut Vec<PathSegment>,
    ) -> Result<Rendered, RenderError> {
        match node {
            VNode::Text(text) => Ok(Rendered::Text(text.content.clone())),
            VNode::Opaque(handle) => Ok(Rendered::Opaque(*handle)),
            VNode::Element(el) => Ok(Rendered::Element(RenderedElement {
                tag: el.tag.clone(),
                props: el.props.clone(),
                key: el.key.clone(),
                children: self.expand_children(&el.children, parent, path)?,
            })),
            VNode::Fragment(fragment) => Ok(Rendered::Fragment(RenderedFragment {
                key: fragment.key.clone(),
                children: self.expand_children(&fragment.children, parent, path)?,
            })),
            VNode::Component(invocation) => {
                let key = InstanceKey::derive(
                    parent,
                    path,
                    invocation.component.id(),
                    invocation.key.as_ref(),
                );
                self.invoke(invocation, key)
            }
        }
    }

    fn expand_children(
        &self,
        children: &[VNode],
        parent: Option<&InstanceKey>,
        path: &mut Vec<PathSegment>,
    ) -> Result<Vec<Rendered>, RenderError> {
        let mut expanded = Vec::with_capacity(children.len());
        for (index, child) in children.iter().enumerate() {
            path.push(match child.key() {
                Some(key) => PathSegment::Key(key.clone()),
                None => PathSegment::Index(index),
            });
            let result = self.expand(child, parent, path);
            path.pop();
            expanded.push(result?);
        }
        Ok(expanded)
    }

    fn invoke(&self, invocation: &ComponentNode, key: InstanceKey) -> Result<Rendered, RenderError> {
        let component = &invocation.component;
        let instance = self.shared.store.borrow_mut().get_or_create(&key, component);
        self.visit(&key);

        let vnode = match self.reusable(component, &instance, &invocation.props) {
            Some(vnode) => {
                tracing::trace!(instance = %key, "props unchanged, reusing previous output");
                vnode
            }
            None => self.render(component, &instance, &invocation.props)?,
        };

        let provided = instance.take_provided();
        let boundary = instance.take_boundary();
        let mark = {
            let mut pass = self.shared.pass.borrow_mut();
            let mark = PassMark {
                contexts: pass.contexts.len(),
                effects: pass.effects.len(),
                visited: pass.visited.len(),
            };
            pass.contexts.extend(provided);
            mark
        };

        let mut path = Vec::new();
        let expanded = self.expand(&vnode, Some(&key), &mut path);
        self.shared.pass.borrow_mut().contexts.truncate(mark.contexts);

        let child = match (expanded, boundary) {
            (Ok(child), _) => child,
            (Err(err), Some(boundary)) => self.recover(&instance, boundary, err, mark)?,
            (Err(err), None) => return Err(err),
        };

        Ok(Rendered::Component(RenderedComponent {
            id: component.id(),
            key: invocation.key.clone(),
            child: Box::new(child),
        }))
    }

    /// The previous output of a memoized instance, if it may be reused.
    fn reusable(&self, component: &Component, instance: &Instance, props: &Props) -> Option<VNode> {
        let equal = component.props_eq()?;
        if instance.is_dirty() || !instance.contexts_unchanged(|id| find_context(self.shared, id)) {
            return None;
        }
        instance.reusable_output(props, equal)
    }

    /// Run the render function with `instance` as the active frame.
    fn render(
        &self,
        component: &Component,
        instance: &Rc<Instance>,
        props: &Props,
    ) -> Result<VNode, RenderError> {
        instance.begin_render();
        let output = {
            let _frame = FrameGuard::enter(Frame {
                shared: Rc::clone(self.shared),
                instance: Rc::clone(instance),
            });
            panic::catch_unwind(AssertUnwindSafe(|| component.call(props)))
        };
        if let Some(err) = instance.end_render() {
            self.shared.report_hook_error(instance, &err);
        }

        let output = match output {
            Ok(output) => output,
            Err(payload) => Err(RenderError::Failed(ComponentError::Panicked {
                component: component.name().to_string(),
                message: panic_message(payload.as_ref()),
            })),
        };
        let vnode = output.map_err(|err| match err {
            RenderError::Failed(err) => RenderError::Failed(err.attribute(component.name())),
            other => other,
        })?;
        if component.is_memo() {
            instance.record_render(props, &vnode);
        }
        Ok(vnode)
    }

    /// Offer a failure from below to the boundary registered by `instance`.
    fn recover(
        &self,
        instance: &Instance,
        boundary: Boundary,
        err: RenderError,
        mark: PassMark,
    ) -> Result<Rendered, RenderError> {
        let key = instance.key();
        let fallback = match (boundary, err) {
            (Boundary::Error { fallback, on_error }, RenderError::Failed(error)) => {
                tracing::error!(boundary = %key, "{error}");
                if let Some(on_error) = on_error {
                    on_error(&error);
                }
                fallback(&error)
            }
            (Boundary::Suspense { fallback }, RenderError::Suspended(suspension)) => {
                tracing::debug!(boundary = %key, "subtree suspended, rendering fallback");
                if instance.arm(&suspension) {
                    let handle = UpdateHandle::new(&self.shared.scheduler);
                    suspension.subscribe(Box::new(move || {
                        handle.request_render();
                    }));
                }
                fallback
            }
            (_, err) => return Err(err),
        };

        // The discarded subtree neither commits effects nor stays mounted.
        {
            let mut pass = self.shared.pass.borrow_mut();
            pass.effects.truncate(mark.effects);
            let dropped: Vec<InstanceKey> = pass.visited.drain(mark.visited..).collect();
            for dropped_key in &dropped {
                pass.visited_set.remove(dropped_key);
            }
            pass.discarded.extend(dropped);
        }
        let mut path = Vec::new();
        self.expand(&fallback, Some(&key.scoped("fallback")), &mut path)
    }

    fn visit(&self, key: &InstanceKey) {
        let mut pass = self.shared.pass.borrow_mut();
        if pass.visited_set.insert(key.clone()) {
            pass.visited.push(key.clone());
        } else {
            tracing::warn!(
                instance = %key,
                "instance rendered twice in one pass; check for duplicate sibling keys"
            );
        }
    }
}
