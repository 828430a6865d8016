//! Per-instance hook storage.
//!
//! Every mounted component instance owns an ordered list of hook records.
//! Hooks are identified purely by their position in the call sequence: the
//! n-th hook call of a render reads the n-th record. The store keeps one
//! [`Instance`] per [`InstanceKey`] and creates it the first time that key is
//! rendered.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::boundary::Boundary;
use crate::component::{Component, ComponentId};
use crate::context::{ContextId, ProvidedContext};
use crate::error::HookError;
use crate::resource::Suspension;
use crate::scheduler::TaskId;
use crate::vnode::{Key, Props, VNode};

/// One step from a parent instance down to an invocation: the child index
/// inside an element or fragment, or the child's key when it has one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PathSegment {
    Index(usize),
    Key(Key),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => write!(f, "[{}]", key.as_str()),
        }
    }
}

/// Stable identity of a component instance across renders.
///
/// Derived from the parent instance, the path of the invocation inside the
/// parent's output and the component id. Keyed children contribute their key
/// to the path instead of their index, so a component keeps its identity when
/// it, or any keyed element around it, is reordered among its siblings.
///
/// Unkeyed siblings are identified by position: inserting an unkeyed sibling
/// before them shifts their identity and resets their state.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(Rc<str>);

impl InstanceKey {
    pub(crate) fn derive(
        parent: Option<&InstanceKey>,
        path: &[PathSegment],
        component: ComponentId,
        key: Option<&Key>,
    ) -> Self {
        let mut out = parent.map(|p| p.0.to_string()).unwrap_or_default();
        out.push('/');
        let positional = match (key, path.split_last()) {
            (Some(key), Some((PathSegment::Key(last), rest))) if last == key => rest,
            _ => path,
        };
        let segments: Vec<String> = positional.iter().map(PathSegment::to_string).collect();
        out.push_str(&segments.join("."));
        out.push(':');
        out.push_str(&component.to_string());
        if let Some(key) = key {
            out.push('#');
            out.push_str(key.as_str());
        }
        Self(Rc::from(out))
    }

    pub(crate) fn scoped(&self, scope: &str) -> Self {
        Self(Rc::from(format!("{}!{scope}", self.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceKey({})", self.0)
    }
}

/// The kind of record a hook slot holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HookKind {
    State,
    Reducer,
    Effect,
    LayoutEffect,
    Memo,
    Ref,
    Id,
}

impl HookKind {
    pub fn hook_name(self) -> &'static str {
        match self {
            Self::State => "use_state",
            Self::Reducer => "use_reducer",
            Self::Effect => "use_effect",
            Self::LayoutEffect => "use_layout_effect",
            Self::Memo => "use_memo",
            Self::Ref => "use_ref",
            Self::Id => "use_id",
        }
    }

    fn is_effect(self) -> bool {
        matches!(self, Self::Effect | Self::LayoutEffect)
    }
}

/// Metadata about a hook for debugging purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMeta {
    /// The hook kind stored in the slot.
    pub kind: HookKind,
    /// The type of value stored (from `std::any::type_name`).
    pub value_type: &'static str,
}

struct HookEntry {
    meta: HookMeta,
    value: Rc<dyn Any>,
}

/// A cleanup returned by an effect.
pub(crate) struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub(crate) fn new<F: FnOnce() + 'static>(f: F) -> Self {
        Self(Box::new(f))
    }

    /// Run the cleanup, logging instead of propagating a panic.
    pub(crate) fn run(self, instance: &InstanceKey) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(self.0)) {
            tracing::error!(
                %instance,
                "effect cleanup panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// State of one effect slot.
#[derive(Default)]
pub(crate) struct EffectRecord {
    pub(crate) deps: Option<Box<dyn Any>>,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) initialized: bool,
}

impl EffectRecord {
    /// Whether an effect with `next` deps must run again.
    ///
    /// Absent deps always run; deps equal to the previous ones skip.
    pub(crate) fn should_run<D: PartialEq + 'static>(&self, next: Option<&D>) -> bool {
        if !self.initialized {
            return true;
        }
        match (next, &self.deps) {
            (Some(next), Some(prev)) => prev.downcast_ref::<D>() != Some(next),
            _ => true,
        }
    }
}

/// A mounted component instance.
pub(crate) struct Instance {
    key: InstanceKey,
    component: ComponentId,
    name: &'static str,
    hooks: RefCell<Vec<HookEntry>>,
    cursor: Cell<usize>,
    expected_count: Cell<Option<usize>>,
    render_count: Cell<usize>,
    unmounted: Cell<bool>,
    tasks: RefCell<Vec<TaskId>>,
    provided: RefCell<Vec<ProvidedContext>>,
    boundary: RefCell<Option<Boundary>>,
    /// Set when this instance's own state changed since its last render.
    dirty: Cell<bool>,
    /// Props and output of the last successful render, for memoized skips.
    last_render: RefCell<Option<(Props, VNode)>>,
    /// Context values read by the last render.
    consumed: RefCell<Vec<(ContextId, Option<Rc<dyn Any>>)>>,
    /// The suspension a boundary instance is already waiting on.
    armed: RefCell<Option<Suspension>>,
}

impl Instance {
    fn new(key: InstanceKey, component: &Component) -> Self {
        Self {
            key,
            component: component.id(),
            name: component.name(),
            hooks: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            expected_count: Cell::new(None),
            render_count: Cell::new(0),
            unmounted: Cell::new(false),
            tasks: RefCell::new(Vec::new()),
            provided: RefCell::new(Vec::new()),
            boundary: RefCell::new(None),
            dirty: Cell::new(false),
            last_render: RefCell::new(None),
            consumed: RefCell::new(Vec::new()),
            armed: RefCell::new(None),
        }
    }

    pub(crate) fn key(&self) -> &InstanceKey {
        &self.key
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn component(&self) -> ComponentId {
        self.component
    }

    /// Reset the cursor and per-invocation registrations.
    pub(crate) fn begin_render(&self) {
        self.cursor.set(0);
        self.dirty.set(false);
        self.provided.borrow_mut().clear();
        self.boundary.borrow_mut().take();
        self.consumed.borrow_mut().clear();
        self.last_render.borrow_mut().take();
    }

    /// Finish an invocation, reporting a hook count that differs from the
    /// previous render.
    pub(crate) fn end_render(&self) -> Option<HookError> {
        let current = self.cursor.get();
        let mismatch = self
            .expected_count
            .get()
            .filter(|previous| *previous != current)
            .map(|previous| HookError::CountMismatch { previous, current });
        self.expected_count.set(Some(current));
        self.render_count.set(self.render_count.get() + 1);
        mismatch
    }

    pub(crate) fn render_count(&self) -> usize {
        self.render_count.get()
    }

    /// Get or create the record at the cursor and advance it.
    ///
    /// A record of a different kind or type is replaced with a freshly
    /// initialized one and the violation is returned for reporting. A
    /// replaced effect record has its pending cleanup run first.
    pub(crate) fn next_slot<T: Any>(
        &self,
        kind: HookKind,
        init: impl FnOnce() -> T,
    ) -> (Rc<T>, Option<HookError>) {
        let index = self.cursor.get();
        self.cursor.set(index + 1);

        let mut violation = None;
        let mut displaced = None;
        if let Some(entry) = self.hooks.borrow().get(index) {
            if entry.meta.kind == kind {
                if let Ok(value) = Rc::clone(&entry.value).downcast::<T>() {
                    return (value, None);
                }
            }
            violation = Some(HookError::OrderViolation {
                index,
                previous: entry.meta.kind.hook_name(),
                current: kind.hook_name(),
            });
            if entry.meta.kind.is_effect() {
                displaced = take_cleanup(&entry.value);
            }
        }
        if let Some(cleanup) = displaced {
            cleanup.run(&self.key);
        }

        let value = Rc::new(init());
        let entry = HookEntry {
            meta: HookMeta {
                kind,
                value_type: type_name::<T>(),
            },
            value: value.clone(),
        };
        let mut hooks = self.hooks.borrow_mut();
        if index < hooks.len() {
            hooks[index] = entry;
        } else {
            hooks.push(entry);
        }
        (value, violation)
    }

    pub(crate) fn hook_meta(&self) -> Vec<HookMeta> {
        self.hooks.borrow().iter().map(|e| e.meta.clone()).collect()
    }

    pub(crate) fn is_unmounted(&self) -> bool {
        self.unmounted.get()
    }

    pub(crate) fn track_task(&self, task: TaskId) {
        self.tasks.borrow_mut().push(task);
    }

    pub(crate) fn forget_task(&self, task: TaskId) {
        self.tasks.borrow_mut().retain(|t| *t != task);
    }

    pub(crate) fn provide(&self, context: ProvidedContext) {
        self.provided.borrow_mut().push(context);
    }

    pub(crate) fn take_provided(&self) -> Vec<ProvidedContext> {
        std::mem::take(&mut *self.provided.borrow_mut())
    }

    pub(crate) fn set_boundary(&self, boundary: Boundary) {
        *self.boundary.borrow_mut() = Some(boundary);
    }

    pub(crate) fn take_boundary(&self) -> Option<Boundary> {
        self.boundary.borrow_mut().take()
    }

    /// Mark the instance unmounted and return its outstanding tasks and
    /// effect cleanups (in hook order).
    pub(crate) fn teardown(&self) -> (Vec<TaskId>, Vec<Cleanup>) {
        self.unmounted.set(true);
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let cleanups = self
            .hooks
            .borrow()
            .iter()
            .filter(|entry| entry.meta.kind.is_effect())
            .filter_map(|entry| take_cleanup(&entry.value))
            .collect();
        (tasks, cleanups)
    }

    /// Flag a state change made outside a render.
    pub(crate) fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn record_render(&self, props: &Props, output: &VNode) {
        *self.last_render.borrow_mut() = Some((props.clone(), output.clone()));
    }

    /// The output of the last render if it was rendered with props equal
    /// to `props` under `equal`.
    pub(crate) fn reusable_output(
        &self,
        props: &Props,
        equal: &dyn Fn(&Props, &Props) -> bool,
    ) -> Option<VNode> {
        let last = self.last_render.borrow();
        let (previous, output) = last.as_ref()?;
        equal(previous, props).then(|| output.clone())
    }

    pub(crate) fn record_context(&self, id: ContextId, value: Option<Rc<dyn Any>>) {
        self.consumed.borrow_mut().push((id, value));
    }

    /// Whether every context read by the last render still resolves to the
    /// same provided value.
    pub(crate) fn contexts_unchanged(
        &self,
        lookup: impl Fn(ContextId) -> Option<Rc<dyn Any>>,
    ) -> bool {
        self.consumed.borrow().iter().all(|(id, seen)| {
            match (seen, lookup(*id)) {
                (None, None) => true,
                (Some(seen), Some(now)) => Rc::ptr_eq(seen, &now),
                _ => false,
            }
        })
    }

    /// Remember `suspension` as the one this boundary waits on. Returns
    /// `false` if it was already armed with the same pending suspension.
    pub(crate) fn arm(&self, suspension: &Suspension) -> bool {
        let mut armed = self.armed.borrow_mut();
        if armed
            .as_ref()
            .is_some_and(|current| current.same_source(suspension) && !current.is_settled())
        {
            return false;
        }
        *armed = Some(suspension.clone());
        true
    }
}

fn take_cleanup(value: &Rc<dyn Any>) -> Option<Cleanup> {
    let record = Rc::clone(value).downcast::<RefCell<EffectRecord>>().ok()?;
    let cleanup = record.borrow_mut().cleanup.take();
    cleanup
}

/// All live instances, by key.
#[derive(Default)]
pub(crate) struct HookStore {
    instances: HashMap<InstanceKey, Rc<Instance>>,
}

impl HookStore {
    pub(crate) fn get_or_create(&mut self, key: &InstanceKey, component: &Component) -> Rc<Instance> {
        if let Some(instance) = self.instances.get(key) {
            if instance.component() == component.id() {
                return Rc::clone(instance);
            }
        }
        tracing::debug!(instance = %key, component = component.name(), "creating instance");
        let instance = Rc::new(Instance::new(key.clone(), component));
        self.instances.insert(key.clone(), Rc::clone(&instance));
        instance
    }

    pub(crate) fn get(&self, key: &InstanceKey) -> Option<Rc<Instance>> {
        self.instances.get(key).cloned()
    }

    pub(crate) fn remove(&mut self, key: &InstanceKey) -> Option<Rc<Instance>> {
        self.instances.remove(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn keys(&self) -> Vec<InstanceKey> {
        let mut keys: Vec<_> = self.instances.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PathSegment::{Index, Key as Keyed};

    fn component(name: &'static str) -> Component {
        Component::new(name, |_| Ok(VNode::text("")))
    }

    #[test]
    fn instance_keys() {
        let root = InstanceKey::derive(None, &[], ComponentId(1), None);
        assert_eq!(root.as_str(), "/:c1");

        let child = InstanceKey::derive(Some(&root), &[Index(0), Index(2)], ComponentId(5), None);
        assert_eq!(child.as_str(), "/:c1/0.2:c5");

        let x = Key::from("x");
        let keyed = InstanceKey::derive(Some(&root), &[Index(0), Keyed(x.clone())], ComponentId(5), Some(&x));
        assert_eq!(keyed.as_str(), "/:c1/0:c5#x");

        let unkeyed_at_root = InstanceKey::derive(Some(&root), &[], ComponentId(5), Some(&x));
        assert_eq!(unkeyed_at_root.as_str(), "/:c1/:c5#x");
    }

    #[test]
    fn keyed_ancestors_contribute_their_key() {
        let root = InstanceKey::derive(None, &[], ComponentId(1), None);
        let row = |key: &str, index: usize| {
            InstanceKey::derive(
                Some(&root),
                &[Index(0), Keyed(Key::from(key)), Index(index)],
                ComponentId(7),
                None,
            )
        };
        assert_eq!(row("a", 0).as_str(), "/:c1/0.[a].0:c7");
        assert_ne!(row("a", 0), row("b", 0));
        assert_eq!(row("a", 0), row("a", 0));
    }

    #[test]
    fn slots_persist_across_renders() {
        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));

        instance.begin_render();
        let (cell, violation) = instance.next_slot(HookKind::State, || RefCell::new(42));
        assert!(violation.is_none());
        *cell.borrow_mut() = 100;
        assert!(instance.end_render().is_none());

        instance.begin_render();
        let (cell, _) = instance.next_slot(HookKind::State, || RefCell::new(0));
        assert_eq!(*cell.borrow(), 100);
        assert!(instance.end_render().is_none());
        assert_eq!(instance.render_count(), 2);
    }

    #[test]
    fn order_violation_reinitializes_slot() {
        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));

        instance.begin_render();
        instance.next_slot(HookKind::State, || RefCell::new(1));
        instance.end_render();

        instance.begin_render();
        let (value, violation) = instance.next_slot(HookKind::Ref, || RefCell::new("fresh"));
        assert_eq!(*value.borrow(), "fresh");
        assert_eq!(
            violation,
            Some(HookError::OrderViolation {
                index: 0,
                previous: "use_state",
                current: "use_ref",
            })
        );
    }

    #[test]
    fn displaced_effect_runs_its_cleanup() {
        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));
        let cleaned = Rc::new(Cell::new(false));

        instance.begin_render();
        let (record, _) = instance.next_slot(HookKind::Effect, || RefCell::new(EffectRecord::default()));
        let flag = cleaned.clone();
        record.borrow_mut().cleanup = Some(Cleanup::new(move || flag.set(true)));
        instance.end_render();

        instance.begin_render();
        let (_, violation) = instance.next_slot(HookKind::State, || RefCell::new(0));
        assert!(violation.is_some());
        assert!(cleaned.get());
        let (_, cleanups) = instance.teardown();
        assert!(cleanups.is_empty());
    }

    #[test]
    fn boundaries_arm_once_per_pending_suspension() {
        use crate::resource::Resource;

        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));
        let first = Resource::<u8>::pending();
        let second = Resource::<u8>::pending();

        assert!(instance.arm(&first.suspension()));
        assert!(!instance.arm(&first.suspension()));
        assert!(instance.arm(&second.suspension()));

        second.resolve(1);
        assert!(instance.arm(&second.suspension()));
    }

    #[test]
    fn count_mismatch_is_reported() {
        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));

        instance.begin_render();
        instance.next_slot(HookKind::State, || RefCell::new(1));
        instance.next_slot(HookKind::State, || RefCell::new(2));
        instance.end_render();

        instance.begin_render();
        instance.next_slot(HookKind::State, || RefCell::new(1));
        assert_eq!(
            instance.end_render(),
            Some(HookError::CountMismatch {
                previous: 2,
                current: 1
            })
        );
    }

    #[test]
    fn teardown_collects_cleanups_in_order() {
        let instance = Instance::new(InstanceKey::derive(None, &[], ComponentId(1), None), &component("A"));
        let log = Rc::new(RefCell::new(Vec::new()));

        instance.begin_render();
        for name in ["first", "second"] {
            let (record, _) = instance.next_slot(HookKind::Effect, || RefCell::new(EffectRecord::default()));
            let log = log.clone();
            record.borrow_mut().cleanup = Some(Cleanup::new(move || log.borrow_mut().push(name)));
        }
        instance.end_render();

        let (_, cleanups) = instance.teardown();
        for cleanup in cleanups {
            cleanup.run(instance.key());
        }
        assert!(instance.is_unmounted());
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn effect_dependency_gating() {
        let mut record = EffectRecord::default();
        assert!(record.should_run(Some(&1)));
        record.initialized = true;
        record.deps = Some(Box::new(1));
        assert!(!record.should_run(Some(&1)));
        assert!(record.should_run(Some(&2)));
        assert!(record.should_run::<i32>(None));

        record.deps = Some(Box::new(()));
        assert!(!record.should_run(Some(&())));
    }

    #[test]
    fn store_replaces_instance_of_other_component() {
        let mut store = HookStore::default();
        let key = InstanceKey::derive(None, &[], ComponentId(1), None);
        let a = store.get_or_create(&key, &component("A"));
        let again = store.get_or_create(&key, &component("B"));
        assert!(!Rc::ptr_eq(&a, &again));
        assert_eq!(store.len(), 1);
    }
}
