//! React-style hooks for component state and side effects.
//!
//! Hooks give a component function persistent state across renders. Each
//! call reads the next record of the instance currently being rendered, so
//! hooks are identified by their position in the call sequence.
//!
//! # Quick Start
//!
//! ```ignore
//! use rehook::prelude::*;
//!
//! #[component]
//! fn counter() -> Render {
//!     let (count, set_count) = use_state(|| 0);
//!
//!     use_effect(move || tracing::info!(count, "count changed"), Some(count));
//!
//!     Ok(h!(
//!         "button",
//!         Props::new().on("click", move |_| set_count.update(|n| n + 1)),
//!         "Count: ",
//!         count
//!     ))
//! }
//! ```
//!
//! # Available Hooks
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_state`] | State with a `(value, setter)` API |
//! | [`use_reducer`] | State updated by dispatching actions |
//! | [`use_effect`] | Side effects after commit when dependencies change |
//! | [`use_effect_cleanup`] | Effects with a cleanup function |
//! | [`use_layout_effect`] | Effects run synchronously right after mutation |
//! | [`use_mount`] / [`use_unmount`] | One-time setup and teardown |
//! | [`use_memo`] | Memoized computations |
//! | [`use_callback`] | Memoized callbacks |
//! | [`use_ref`] | Mutable value that doesn't trigger re-renders |
//! | [`use_id`] | Identifier stable for the instance's lifetime |
//! | [`use_context`](crate::use_context) | Nearest provided context value |
//! | [`use_transition`] | Low-priority updates with a pending flag |
//! | [`use_deferred_value`] | A value that lags behind during bursts |
//! | [`use_imperative_handle`] | A value exposed to the parent through a ref |
//! | [`use_sync_external_store`] | Subscription to a store outside the runtime |
//!
//! # Dependencies
//!
//! Effects and memos take `deps: Option<D>`:
//!
//! - `None` ([`EVERY_RENDER`]) runs on every render.
//! - `Some(())` ([`ONCE`]) runs once, on mount.
//! - `Some(deps)` runs when `deps` differs from the previous render's.
//!
//! # Rules of Hooks
//!
//! Hooks must be called in the **exact same order** on every render: never
//! inside conditionals, loops or after an early return, and never from event
//! handlers, effects or async tasks.
//!
//! Calling a hook outside a render panics:
//!
//! ```text
//! `use_state` called outside of a component render; hooks can only be called
//! while a component is being invoked (not from event handlers, effects or async tasks)
//! ```
//!
//! With `RuntimeConfig::debug` enabled, order and count changes between
//! renders are logged as warnings; the affected record is reinitialized
//! rather than reused:
//!
//! ```text
//! hook order mismatch at index 1: previous render called `use_effect`,
//! this render called `use_state`; hooks must be called in the same order every render
//! ```

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::invoker::current_frame;
use crate::lifecycle::{EffectFn, PendingEffect};
use crate::runtime::UpdateHandle;
use crate::scheduler::Scheduler;
use crate::store::{Cleanup, EffectRecord, HookKind, Instance};
use crate::target::NodeRef;

/// Dependencies that re-run an effect on every render.
pub const EVERY_RENDER: Option<()> = None;

/// Dependencies that run an effect once, on mount.
pub const ONCE: Option<()> = Some(());

// ============================================================================
// State
// ============================================================================

/// Updates a value created by [`use_state`] and schedules a re-render.
///
/// Setting a value equal to the current one does nothing. After the owning
/// instance unmounts the setter is a silent no-op.
pub struct Setter<T> {
    cell: Rc<RefCell<T>>,
    instance: Weak<Instance>,
    scheduler: Weak<Scheduler>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            instance: Weak::clone(&self.instance),
            scheduler: Weak::clone(&self.scheduler),
        }
    }
}

impl<T: PartialEq + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.apply(|_| value);
    }

    /// Compute the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.apply(f);
    }

    fn apply(&self, f: impl FnOnce(&T) -> T) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        if instance.is_unmounted() {
            tracing::debug!(instance = %instance.key(), "ignoring state update after unmount");
            return;
        }
        let next = f(&self.cell.borrow());
        if *self.cell.borrow() == next {
            return;
        }
        *self.cell.borrow_mut() = next;
        instance.mark_dirty();
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.request_render();
        }
    }
}

impl<T: Clone> Setter<T> {
    /// The latest value, including updates not yet rendered.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

/// Create or retrieve a state value with a setter.
///
/// The initializer only runs on the first render of the instance.
///
/// # Example
///
/// ```ignore
/// #[component]
/// fn toggle() -> Render {
///     let (on, set_on) = use_state(|| false);
///     Ok(h!("button", Props::new().on("click", move |_| set_on.update(|v| !v)),
///         if on { "on" } else { "off" }))
/// }
/// ```
pub fn use_state<T, I>(init: I) -> (T, Setter<T>)
where
    T: Clone + PartialEq + 'static,
    I: FnOnce() -> T,
{
    let frame = current_frame("use_state");
    let cell = frame.slot(HookKind::State, || RefCell::new(init()));
    let value = cell.borrow().clone();
    let setter = Setter {
        cell,
        instance: Rc::downgrade(&frame.instance),
        scheduler: Rc::downgrade(&frame.shared.scheduler),
    };
    (value, setter)
}

struct ReducerSlot<S, A> {
    state: RefCell<S>,
    reducer: RefCell<Option<Rc<dyn Fn(&S, A) -> S>>>,
}

/// Sends actions to a reducer created by [`use_reducer`].
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.0)(action)
    }
}

/// State managed by a reducer function.
///
/// The reducer from the latest render is the one that handles dispatched
/// actions. A reduction producing an equal state does not re-render.
///
/// # Example
///
/// ```ignore
/// enum Action { Add(i32), Reset }
///
/// let (total, dispatch) = use_reducer(
///     |total: &i32, action: Action| match action {
///         Action::Add(n) => total + n,
///         Action::Reset => 0,
///     },
///     || 0,
/// );
/// ```
pub fn use_reducer<S, A, R, I>(reducer: R, init: I) -> (S, Dispatch<A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
    R: Fn(&S, A) -> S + 'static,
    I: FnOnce() -> S,
{
    let frame = current_frame("use_reducer");
    let slot = frame.slot(HookKind::Reducer, || ReducerSlot::<S, A> {
        state: RefCell::new(init()),
        reducer: RefCell::new(None),
    });
    *slot.reducer.borrow_mut() = Some(Rc::new(reducer));
    let value = slot.state.borrow().clone();

    let instance = Rc::downgrade(&frame.instance);
    let scheduler = Rc::downgrade(&frame.shared.scheduler);
    let dispatch = Dispatch(Rc::new(move |action: A| {
        let Some(instance) = instance.upgrade() else {
            return;
        };
        if instance.is_unmounted() {
            return;
        }
        let Some(reducer) = slot.reducer.borrow().clone() else {
            return;
        };
        let next = reducer(&slot.state.borrow(), action);
        if *slot.state.borrow() == next {
            return;
        }
        *slot.state.borrow_mut() = next;
        instance.mark_dirty();
        if let Some(scheduler) = scheduler.upgrade() {
            scheduler.request_render();
        }
    }));
    (value, dispatch)
}

// ============================================================================
// Effects
// ============================================================================

fn effect_hook<D>(hook: &'static str, kind: HookKind, deps: Option<D>, run: EffectFn)
where
    D: PartialEq + 'static,
{
    let frame = current_frame(hook);
    let record = frame.slot(kind, || RefCell::new(EffectRecord::default()));
    if !record.borrow().should_run(deps.as_ref()) {
        return;
    }
    frame.queue_effect(PendingEffect {
        instance: Rc::clone(&frame.instance),
        record,
        deps: deps.map(|deps| Box::new(deps) as Box<dyn Any>),
        run,
        layout: kind == HookKind::LayoutEffect,
    });
}

/// Run a side effect after the render commits, when `deps` change.
///
/// Passive effects run after the commit, off the render path. The previous
/// run's cleanup (if any) runs first.
///
/// # Example
///
/// ```ignore
/// let (query, _) = use_state(|| String::from("rust"));
/// use_effect({
///     let query = query.clone();
///     move || tracing::debug!(%query, "searching")
/// }, Some(query));
/// ```
pub fn use_effect<F, D>(effect: F, deps: Option<D>)
where
    F: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook(
        "use_effect",
        HookKind::Effect,
        deps,
        Box::new(move || {
            effect();
            None
        }),
    );
}

/// Like [`use_effect`], with a cleanup that runs before the next run and on
/// unmount.
///
/// # Example
///
/// ```ignore
/// use_effect_cleanup(move || {
///     let subscription = feed.subscribe(id);
///     move || subscription.cancel()
/// }, Some(id));
/// ```
pub fn use_effect_cleanup<F, C, D>(effect: F, deps: Option<D>)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook(
        "use_effect_cleanup",
        HookKind::Effect,
        deps,
        Box::new(move || Some(Cleanup::new(effect()))),
    );
}

/// Run an effect synchronously right after the target is mutated, before
/// control returns to whoever triggered the update.
pub fn use_layout_effect<F, D>(effect: F, deps: Option<D>)
where
    F: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook(
        "use_layout_effect",
        HookKind::LayoutEffect,
        deps,
        Box::new(move || {
            effect();
            None
        }),
    );
}

pub fn use_layout_effect_cleanup<F, C, D>(effect: F, deps: Option<D>)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
    D: PartialEq + 'static,
{
    effect_hook(
        "use_layout_effect_cleanup",
        HookKind::LayoutEffect,
        deps,
        Box::new(move || Some(Cleanup::new(effect()))),
    );
}

/// Run an effect once when the component mounts; its cleanup runs on unmount.
///
/// # Example
///
/// ```ignore
/// use_mount(|| {
///     tracing::info!("mounted");
///     || tracing::info!("unmounted")
/// });
/// ```
pub fn use_mount<F, C>(effect: F)
where
    F: FnOnce() -> C + 'static,
    C: FnOnce() + 'static,
{
    use_effect_cleanup(effect, ONCE);
}

/// Run `f` when the component unmounts.
pub fn use_unmount<F: FnOnce() + 'static>(f: F) {
    use_effect_cleanup(move || f, ONCE);
}

// ============================================================================
// Memoization
// ============================================================================

struct MemoSlot<T, D> {
    value: Option<T>,
    deps: Option<D>,
}

/// Memoize a computation based on dependencies.
///
/// The compute function only runs when `deps` change (or on every render
/// when `deps` is `None`).
///
/// # Example
///
/// ```ignore
/// let total = use_memo(|| items.iter().sum::<i32>(), Some(items.clone()));
/// ```
pub fn use_memo<T, F, D>(compute: F, deps: Option<D>) -> T
where
    T: Clone + 'static,
    F: FnOnce() -> T,
    D: PartialEq + 'static,
{
    let frame = current_frame("use_memo");
    let slot = frame.slot(HookKind::Memo, || {
        RefCell::new(MemoSlot::<T, D> {
            value: None,
            deps: None,
        })
    });

    {
        let cached = slot.borrow();
        let fresh = matches!((&cached.deps, &deps), (Some(prev), Some(next)) if prev == next);
        if fresh {
            if let Some(value) = &cached.value {
                return value.clone();
            }
        }
    }

    let value = compute();
    let mut cached = slot.borrow_mut();
    cached.value = Some(value.clone());
    cached.deps = deps;
    value
}

/// Memoize a callback so its identity only changes with `deps`.
pub fn use_callback<F, D>(callback: F, deps: Option<D>) -> F
where
    F: Clone + 'static,
    D: PartialEq + 'static,
{
    use_memo(move || callback, deps)
}

// ============================================================================
// Refs and identifiers
// ============================================================================

/// Handle to a ref value created by [`use_ref`].
pub struct RefHandle<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> RefHandle<T> {
    /// A standalone ref, not tied to any component.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Get a reference to the current value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Get a mutable reference to the current value.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Set the value directly.
    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> RefHandle<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

/// Create or retrieve a mutable value that persists across renders.
///
/// Mutating a ref never triggers a render.
///
/// # Example
///
/// ```ignore
/// let renders = use_ref(|| 0);
/// *renders.borrow_mut() += 1;
/// ```
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> RefHandle<T> {
    let frame = current_frame("use_ref");
    let inner = frame.slot(HookKind::Ref, || RefCell::new(init()));
    RefHandle { inner }
}

/// Publish a value built by `create` through `target` while the component
/// is mounted, so a parent holding the ref can call into its child.
///
/// The value is set after mutation, like a layout effect, rebuilt when `deps`
/// change and cleared on unmount.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone)]
/// struct FieldApi { clear: Setter<String> }
///
/// let (text, set_text) = use_state(String::new);
/// use_imperative_handle(&api_ref, move || FieldApi { clear: set_text }, ONCE);
/// ```
pub fn use_imperative_handle<H, F, D>(target: &RefHandle<Option<H>>, create: F, deps: Option<D>)
where
    H: 'static,
    F: FnOnce() -> H + 'static,
    D: PartialEq + 'static,
{
    let target = target.clone();
    effect_hook(
        "use_imperative_handle",
        HookKind::LayoutEffect,
        deps,
        Box::new(move || {
            target.set(Some(create()));
            Some(Cleanup::new(move || target.set(None)))
        }),
    );
}

/// A ref to receive an element's node handle through the `ref` prop.
pub fn use_node_ref() -> RefHandle<Option<NodeRef>> {
    use_ref(|| None)
}

/// An identifier unique within the runtime and stable for the instance's
/// lifetime, like `rehook-3`.
pub fn use_id() -> String {
    let frame = current_frame("use_id");
    let id = frame.slot(HookKind::Id, || {
        format!("{}-{}", frame.shared.config.id_prefix, frame.shared.next_id())
    });
    id.as_ref().clone()
}

/// Re-renders its component on demand, created by [`use_force_update`].
#[derive(Clone)]
pub struct ForceUpdate {
    instance: Weak<Instance>,
    handle: UpdateHandle,
}

impl ForceUpdate {
    /// Schedule a render of the owning component, even if it is memoized
    /// and its props are unchanged. Does nothing after unmount.
    pub fn request_render(&self) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        if instance.is_unmounted() {
            return;
        }
        instance.mark_dirty();
        self.handle.request_render();
    }
}

/// A handle that re-renders the component on demand.
pub fn use_force_update() -> ForceUpdate {
    let frame = current_frame("use_force_update");
    ForceUpdate {
        instance: Rc::downgrade(&frame.instance),
        handle: frame.handle(),
    }
}

// ============================================================================
// Priorities
// ============================================================================

/// Starts low-priority updates, created by [`use_transition`].
#[derive(Clone)]
pub struct Transition {
    set_pending: Setter<bool>,
    handle: UpdateHandle,
    instance: Weak<Instance>,
}

impl Transition {
    /// Mark the transition pending and run `f` on the low-priority lane.
    /// The pending flag clears once `f` has run.
    pub fn start<F: FnOnce() + 'static>(&self, f: F) {
        self.set_pending.set(true);
        let set_pending = self.set_pending.clone();
        let task = self.handle.defer(move || {
            f();
            set_pending.set(false);
        });
        if let (Some(task), Some(instance)) = (task, self.instance.upgrade()) {
            instance.track_task(task);
        }
    }
}

/// A pending flag and a way to start low-priority updates.
///
/// # Example
///
/// ```ignore
/// let (pending, transition) = use_transition();
/// let on_input = move |_: &Event| {
///     let set_results = set_results.clone();
///     transition.start(move || set_results.set(expensive_search()));
/// };
/// ```
pub fn use_transition() -> (bool, Transition) {
    let frame = current_frame("use_transition");
    let (pending, set_pending) = use_state(|| false);
    let transition = Transition {
        set_pending,
        handle: frame.handle(),
        instance: Rc::downgrade(&frame.instance),
    };
    (pending, transition)
}

/// Returns `value` after a low-priority delay, so urgent renders can show
/// the previous value while the new one catches up.
pub fn use_deferred_value<T>(value: T) -> T
where
    T: Clone + PartialEq + 'static,
{
    let frame = current_frame("use_deferred_value");
    let (deferred, set_deferred) = use_state(|| value.clone());
    let handle = frame.handle();
    let next = value.clone();
    use_effect_cleanup(
        move || {
            let task = handle.defer(move || set_deferred.set(next));
            move || {
                if let Some(task) = task {
                    handle.cancel(task);
                }
            }
        },
        Some(value),
    );
    deferred
}

// ============================================================================
// External stores
// ============================================================================

/// Read a value owned outside the runtime and re-render when it changes.
///
/// `get_snapshot` is called on every render and must return equal values
/// while the store is unchanged. `subscribe` runs once, after mount: it
/// receives a callback to invoke on every store change and returns the
/// unsubscribe function, called on unmount. The component re-renders only
/// when the snapshot differs from the one it last rendered.
///
/// # Example
///
/// ```ignore
/// let online = use_sync_external_store(
///     move |changed| {
///         let id = network.on_change(move || changed());
///         move || network.remove_listener(id)
///     },
///     move || network.is_online(),
/// );
/// ```
pub fn use_sync_external_store<T, S, U, G>(subscribe: S, get_snapshot: G) -> T
where
    T: Clone + PartialEq + 'static,
    S: FnOnce(Rc<dyn Fn()>) -> U + 'static,
    U: FnOnce() + 'static,
    G: Fn() -> T + 'static,
{
    let get_snapshot: Rc<dyn Fn() -> T> = Rc::new(get_snapshot);
    let value = get_snapshot();

    let rendered = use_ref(|| value.clone());
    rendered.set(value.clone());
    let getter = use_ref(|| Rc::clone(&get_snapshot));
    getter.set(get_snapshot);
    let force = use_force_update();

    use_effect_cleanup(
        move || {
            let changed: Rc<dyn Fn()> = Rc::new(move || {
                let latest = (getter.get())();
                if *rendered.borrow() != latest {
                    force.request_render();
                }
            });
            // The store may have changed between render and subscription.
            changed();
            subscribe(changed)
        },
        ONCE,
    );
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "`use_state` called outside of a component render")]
    fn use_state_outside_render_panics() {
        let _ = use_state(|| 0);
    }

    #[test]
    #[should_panic(expected = "`use_effect` called outside of a component render")]
    fn use_effect_outside_render_panics() {
        use_effect(|| {}, ONCE);
    }

    #[test]
    fn standalone_ref_handle() {
        let handle = RefHandle::new(1);
        let other = handle.clone();
        other.set(2);
        assert_eq!(handle.get(), 2);
        assert!(handle.ptr_eq(&other));
    }
}
