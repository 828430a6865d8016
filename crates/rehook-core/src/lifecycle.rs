//! Effect execution and instance teardown.
//!
//! After a pass commits, layout effects run immediately and passive effects
//! are queued on the scheduler's passive lane. Instances that were rendered by
//! the previous pass but not by this one are unmounted: their pending tasks
//! are cancelled and their effect cleanups run in hook order.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::runtime::Shared;
use crate::scheduler::Lane;
use crate::store::{panic_message, Cleanup, EffectRecord, Instance, InstanceKey};

pub(crate) type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// An effect whose dependencies changed during a render, waiting for commit.
pub(crate) struct PendingEffect {
    pub(crate) instance: Rc<Instance>,
    pub(crate) record: Rc<RefCell<EffectRecord>>,
    pub(crate) deps: Option<Box<dyn Any>>,
    pub(crate) run: EffectFn,
    pub(crate) layout: bool,
}

/// Record the committed dependencies, run layout effects and queue passive
/// ones.
pub(crate) fn commit_effects(shared: &Shared, effects: Vec<PendingEffect>) {
    let mut passive = Vec::new();
    for effect in effects {
        let PendingEffect {
            instance,
            record,
            deps,
            run,
            layout,
        } = effect;
        {
            let mut record = record.borrow_mut();
            record.deps = deps;
            record.initialized = true;
        }
        if layout {
            run_effect(&instance, &record, run);
        } else {
            passive.push((instance, record, run));
        }
    }

    for (instance, record, run) in passive {
        let weak = Rc::downgrade(&instance);
        let own_id = Rc::new(Cell::new(None));
        let task_id = Rc::clone(&own_id);
        let id = shared.scheduler.queue(
            Lane::Passive,
            Box::new(move || {
                let Some(instance) = weak.upgrade() else {
                    return;
                };
                if let Some(id) = task_id.get() {
                    instance.forget_task(id);
                }
                if !instance.is_unmounted() {
                    run_effect(&instance, &record, run);
                }
            }),
        );
        own_id.set(Some(id));
        instance.track_task(id);
    }
}

/// Run the previous cleanup, then the effect, keeping its new cleanup.
pub(crate) fn run_effect(instance: &Instance, record: &RefCell<EffectRecord>, run: EffectFn) {
    let previous = record.borrow_mut().cleanup.take();
    if let Some(cleanup) = previous {
        cleanup.run(instance.key());
    }
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(cleanup) => record.borrow_mut().cleanup = cleanup,
        Err(payload) => tracing::error!(
            instance = %instance.key(),
            component = instance.name(),
            "effect panicked: {}",
            panic_message(payload.as_ref())
        ),
    }
}

/// Unmount every previously visited instance missing from `current`, in the
/// previous visit order. Returns the number unmounted.
pub(crate) fn unmount_stale(
    shared: &Shared,
    previous: &[InstanceKey],
    current: &HashSet<InstanceKey>,
) -> usize {
    previous
        .iter()
        .filter(|key| !current.contains(*key))
        .filter(|key| unmount_instance(shared, key))
        .count()
}

/// Tear down one instance. Returns `false` if it was not mounted.
pub(crate) fn unmount_instance(shared: &Shared, key: &InstanceKey) -> bool {
    let Some(instance) = shared.store.borrow_mut().remove(key) else {
        return false;
    };
    tracing::debug!(instance = %key, component = instance.name(), "unmounting");
    let (tasks, cleanups) = instance.teardown();
    for task in tasks {
        shared.scheduler.cancel(task);
    }
    for cleanup in cleanups {
        cleanup.run(key);
    }
    shared.stats.borrow_mut().unmounted += 1;
    true
}

/// Reclaim instances first created by a pass that did not commit.
pub(crate) fn discard_pass<'a>(
    shared: &Shared,
    visited: impl IntoIterator<Item = &'a InstanceKey>,
    mounted: &HashSet<InstanceKey>,
) {
    for key in visited.into_iter().filter(|key| !mounted.contains(*key)) {
        unmount_instance(shared, key);
    }
}
