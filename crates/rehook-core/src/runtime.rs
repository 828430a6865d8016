//! The runtime: owns the render target, the hook store and the scheduler,
//! and drives render passes.
//!
//! A flush applies the queued updates, then performs at most one render pass:
//!
//! 1. Invoke every component reachable from the root, collecting a
//!    [`Rendered`](crate::reconciler::Rendered) tree and pending effects.
//! 2. Reconcile that tree against the committed one, mutating the target.
//! 3. Unmount instances the pass no longer reached.
//! 4. Notify refs, run layout effects and queue passive effects.
//!
//! A pass that fails (an unhandled component error or suspension) commits
//! nothing: the target keeps showing the last committed tree.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::config::RuntimeConfig;
use crate::error::{HookError, RuntimeError};
use crate::invoker::{Invoker, PassState};
use crate::lifecycle::{commit_effects, discard_pass, unmount_instance, unmount_stale};
use crate::reconciler::{Committed, Reconciler, RefUpdate};
use crate::scheduler::{Lane, Phase, Scheduler, Task, TaskId};
use crate::store::{panic_message, HookMeta, HookStore, Instance, InstanceKey};
use crate::target::{NodeRef, RenderTarget};
use crate::vnode::VNode;

/// Counters describing the work done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Render passes committed.
    pub passes: u64,
    /// Target mutations issued by the last committed pass.
    pub last_mutations: usize,
    /// Hook order violations and count mismatches seen.
    pub hook_warnings: u64,
    /// Instances unmounted.
    pub unmounted: u64,
    /// Instances currently mounted.
    pub instances: usize,
}

/// State shared between the runtime and the handles it gives out.
pub(crate) struct Shared {
    pub(crate) config: RuntimeConfig,
    pub(crate) scheduler: Rc<Scheduler>,
    pub(crate) store: RefCell<HookStore>,
    pub(crate) pass: RefCell<PassState>,
    pub(crate) stats: RefCell<Stats>,
    next_id: Cell<u64>,
}

impl Shared {
    pub(crate) fn report_hook_error(&self, instance: &Instance, err: &HookError) {
        self.stats.borrow_mut().hook_warnings += 1;
        if self.config.debug {
            tracing::warn!(instance = %instance.key(), component = instance.name(), "{err}");
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

/// Schedules work on a runtime from outside a render: event handlers,
/// effects and async tasks.
///
/// Holds the scheduler weakly; once the runtime is dropped every method is a
/// no-op.
#[derive(Clone)]
pub struct UpdateHandle {
    scheduler: Weak<Scheduler>,
}

impl UpdateHandle {
    pub(crate) fn new(scheduler: &Rc<Scheduler>) -> Self {
        Self {
            scheduler: Rc::downgrade(scheduler),
        }
    }

    /// Re-render the tree in the next flush. Returns `false` if the runtime
    /// is gone.
    pub fn request_render(&self) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return false;
        };
        scheduler.request_render();
        true
    }

    /// Run `f` at the start of the next flush.
    pub fn schedule_update<F: FnOnce() + 'static>(&self, f: F) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return false;
        };
        scheduler.enqueue_update(Box::new(f));
        true
    }

    /// Run `f` on the low-priority lane.
    pub fn defer<F: FnOnce() + 'static>(&self, f: F) -> Option<TaskId> {
        let scheduler = self.scheduler.upgrade()?;
        Some(scheduler.queue(Lane::Low, Box::new(f)))
    }

    pub fn cancel(&self, task: TaskId) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|scheduler| scheduler.cancel(task))
    }

    pub fn is_alive(&self) -> bool {
        self.scheduler.strong_count() > 0
    }
}

impl fmt::Debug for UpdateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

struct Root {
    container: NodeRef,
    vnode: VNode,
    committed: Option<Committed>,
    /// Instances reached by the last committed pass, in visit order.
    mounted: Vec<InstanceKey>,
}

/// Renders a component tree into a [`RenderTarget`] and keeps it up to date.
///
/// # Example
///
/// ```
/// use rehook_core::{h, MemoryTarget, Props, Runtime, RuntimeConfig};
///
/// let target = MemoryTarget::new();
/// let container = target.create_container("main");
/// let runtime = Runtime::new(target.clone(), RuntimeConfig::default());
/// runtime.mount(container, h!("p", Props::new(), "hello")).unwrap();
/// assert_eq!(target.inner_markup(container), "<p>hello</p>");
/// ```
pub struct Runtime<T: RenderTarget> {
    shared: Rc<Shared>,
    target: RefCell<T>,
    root: RefCell<Option<Root>>,
}

impl<T: RenderTarget> Runtime<T> {
    pub fn new(target: T, config: RuntimeConfig) -> Self {
        let scheduler = Rc::new(Scheduler::new(&config));
        Self {
            shared: Rc::new(Shared {
                config,
                scheduler,
                store: RefCell::new(HookStore::default()),
                pass: RefCell::new(PassState::default()),
                stats: RefCell::new(Stats::default()),
                next_id: Cell::new(0),
            }),
            target: RefCell::new(target),
            root: RefCell::new(None),
        }
    }

    /// Render `root` into `container` synchronously.
    ///
    /// If the first pass fails nothing is mounted and the error is returned.
    pub fn mount(&self, container: NodeRef, root: impl Into<VNode>) -> Result<(), RuntimeError> {
        if self.root.borrow().is_some() {
            return Err(RuntimeError::AlreadyMounted);
        }
        *self.root.borrow_mut() = Some(Root {
            container,
            vnode: root.into(),
            committed: None,
            mounted: Vec::new(),
        });
        tracing::debug!(%container, "mounting root");

        self.shared.scheduler.request_render();
        let result = self.flush();
        if result.is_err() {
            self.root.borrow_mut().take();
        }
        result
    }

    /// Queue `f` to run at the start of the next flush.
    pub fn schedule_update<F: FnOnce() + 'static>(&self, f: F) {
        self.shared.scheduler.enqueue_update(Box::new(f));
    }

    /// Re-render the whole tree in the next flush.
    pub fn request_render(&self) {
        self.shared.scheduler.request_render();
    }

    /// Flush the pending batch now, if there is one.
    ///
    /// Does nothing while a flush is already running, so it is safe to call
    /// from layout effects.
    pub fn flush_sync(&self) -> Result<(), RuntimeError> {
        if self.shared.scheduler.has_pending_batch() {
            self.flush()?;
        }
        Ok(())
    }

    /// Run `f`, then flush whatever it scheduled before returning.
    ///
    /// Every update made inside `f` lands in one batch and one render pass.
    ///
    /// ```
    /// use rehook_core::{MemoryTarget, Runtime, RuntimeConfig};
    ///
    /// let target = MemoryTarget::new();
    /// let container = target.create_container("body");
    /// let runtime = Runtime::new(target, RuntimeConfig::default());
    /// runtime.mount(container, "idle").unwrap();
    ///
    /// let value = runtime.flush_sync_with(|| 42).unwrap();
    /// assert_eq!(value, 42);
    /// ```
    pub fn flush_sync_with<R>(&self, f: impl FnOnce() -> R) -> Result<R, RuntimeError> {
        let value = f();
        self.flush_sync()?;
        Ok(value)
    }

    /// Do the most urgent piece of pending work. Returns `false` when idle.
    ///
    /// Priority order: the update batch, then passive effects, then one
    /// low-priority task.
    pub fn tick(&self) -> Result<bool, RuntimeError> {
        if self.tick_urgent()? {
            return Ok(true);
        }
        Ok(self.run_low_priority())
    }

    /// Flush the update batch if one is pending, otherwise run the queued
    /// passive effects. Returns `false` if neither had work.
    pub fn tick_urgent(&self) -> Result<bool, RuntimeError> {
        if self.shared.scheduler.has_pending_batch() {
            self.flush()?;
            return Ok(true);
        }
        let passive = self.shared.scheduler.take_passive();
        if passive.is_empty() {
            return Ok(false);
        }
        for task in passive {
            run_task(task);
        }
        Ok(true)
    }

    /// Run one low-priority task. Returns `false` if the lane was empty.
    pub fn run_low_priority(&self) -> bool {
        match self.shared.scheduler.pop_low() {
            Some(task) => {
                run_task(task);
                true
            }
            None => false,
        }
    }

    /// Tick until there is no work left.
    pub fn run_until_idle(&self) -> Result<(), RuntimeError> {
        while self.tick()? {}
        Ok(())
    }

    /// Remove the rendered tree from the target and unmount every instance.
    pub fn unmount_all(&self) -> Result<(), RuntimeError> {
        let Some(root) = self.root.borrow_mut().take() else {
            return Err(RuntimeError::NotMounted);
        };
        tracing::debug!(container = %root.container, "unmounting root");

        if let Some(committed) = root.committed {
            let refs = {
                let mut target = self.target.borrow_mut();
                let mut reconciler = Reconciler::new(&mut *target);
                reconciler.remove(root.container, committed);
                reconciler.finish().0
            };
            apply_refs(refs);
        }

        for key in &root.mounted {
            unmount_instance(&self.shared, key);
        }
        let leftover = self.shared.store.borrow().keys();
        for key in &leftover {
            unmount_instance(&self.shared, key);
        }
        self.shared.scheduler.clear();
        self.shared.stats.borrow_mut().instances = 0;
        Ok(())
    }

    /// A handle for scheduling work from outside a render.
    pub fn handle(&self) -> UpdateHandle {
        UpdateHandle::new(&self.shared.scheduler)
    }

    pub fn target(&self) -> Ref<'_, T> {
        self.target.borrow()
    }

    pub fn stats(&self) -> Stats {
        self.shared.stats.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.scheduler.phase()
    }

    /// `true` when no batch or task is pending.
    pub fn is_idle(&self) -> bool {
        let scheduler = &self.shared.scheduler;
        scheduler.phase() == Phase::Idle
            && scheduler.pending_tasks(Lane::Passive) == 0
            && scheduler.pending_tasks(Lane::Low) == 0
    }

    /// `true` when low-priority tasks are queued.
    pub fn has_low_priority_work(&self) -> bool {
        self.shared.scheduler.pending_tasks(Lane::Low) > 0
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Keys of all live instances, sorted.
    pub fn instance_keys(&self) -> Vec<InstanceKey> {
        self.shared.store.borrow().keys()
    }

    /// The hooks recorded by an instance, in call order.
    ///
    /// Useful for devtools-style inspection.
    pub fn hook_debug_info(&self, key: &InstanceKey) -> Option<Vec<HookMeta>> {
        self.shared
            .store
            .borrow()
            .get(key)
            .map(|instance| instance.hook_meta())
    }

    /// Register a callback invoked whenever new work is armed.
    ///
    /// Hosts use it to wake their loop; see `rehook::shell::run_local`.
    pub fn set_waker<F: Fn() + 'static>(&self, waker: F) {
        self.shared.scheduler.set_waker(Rc::new(waker));
    }

    fn flush(&self) -> Result<(), RuntimeError> {
        let updates = self.shared.scheduler.begin_flush().inspect_err(|err| {
            tracing::error!("{err}");
        })?;
        for update in updates {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(update)) {
                tracing::error!("update panicked: {}", panic_message(payload.as_ref()));
            }
        }

        let result = if self.shared.scheduler.take_render_request() {
            self.render_pass()
        } else {
            Ok(())
        };
        self.shared.scheduler.end_flush();
        result
    }

    fn render_pass(&self) -> Result<(), RuntimeError> {
        let (container, vnode, mounted) = {
            let root = self.root.borrow();
            let Some(root) = root.as_ref() else {
                return Ok(());
            };
            (root.container, root.vnode.clone(), root.mounted.clone())
        };

        let (result, pass) = Invoker::new(&self.shared).render_root(&vnode);
        let rendered = match result {
            Ok(rendered) => rendered,
            Err(err) => {
                let mounted: HashSet<_> = mounted.into_iter().collect();
                discard_pass(&self.shared, pass.visited.iter().chain(&pass.discarded), &mounted);
                let err = RuntimeError::from(err);
                tracing::error!("render pass failed, keeping the last committed tree: {err}");
                return Err(err);
            }
        };

        let previous = self
            .root
            .borrow_mut()
            .as_mut()
            .and_then(|root| root.committed.take());
        let (committed, refs, mutations) = {
            let mut target = self.target.borrow_mut();
            let mut reconciler = Reconciler::new(&mut *target);
            let committed = reconciler.reconcile(container, previous, rendered);
            let (refs, mutations) = reconciler.finish();
            (committed, refs, mutations)
        };

        let PassState {
            visited,
            visited_set,
            discarded,
            effects,
            ..
        } = pass;
        if let Some(root) = self.root.borrow_mut().as_mut() {
            root.committed = Some(committed);
            root.mounted = visited;
        }

        // Instances behind a boundary fallback that were mounted go with the
        // stale ones; those first created by this pass are reclaimed after.
        let unmounted = unmount_stale(&self.shared, &mounted, &visited_set)
            + unmount_stale(&self.shared, &discarded, &visited_set);
        apply_refs(refs);
        let effect_count = effects.len();
        commit_effects(&self.shared, effects);

        let passes = {
            let mut stats = self.shared.stats.borrow_mut();
            stats.passes += 1;
            stats.last_mutations = mutations;
            stats.instances = self.shared.store.borrow().len();
            stats.passes
        };
        tracing::debug!(
            pass = passes,
            mutations,
            unmounted,
            effects = effect_count,
            "render pass committed"
        );
        Ok(())
    }
}

impl<T: RenderTarget> Drop for Runtime<T> {
    fn drop(&mut self) {
        // Run outstanding cleanups; a never-mounted runtime has none.
        if self.root.borrow().is_some() {
            let _ = self.unmount_all();
        }
    }
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        tracing::error!("scheduled task panicked: {}", panic_message(payload.as_ref()));
    }
}

fn apply_refs(refs: Vec<RefUpdate>) {
    for (target, node) in refs {
        target.attach(node);
    }
}
