//! Runtime host - drives a [`Runtime`] from a single-threaded tokio executor.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use futures_util::FutureExt;
use rehook_core::{RenderTarget, Resource, Runtime, RuntimeError};
use tokio::sync::Notify;

/// Initialize a `tracing` subscriber that prints to stderr.
///
/// Safe to call more than once; later calls do nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Drive `runtime` until `until` completes.
///
/// The loop sleeps until the scheduler arms new work, then flushes batches
/// and runs passive effects until nothing urgent is left, yielding to other
/// local tasks in between. Low-priority work runs after
/// [`RuntimeConfig::low_priority_delay`](rehook_core::RuntimeConfig) of
/// quiet.
///
/// Must be awaited inside a [`tokio::task::LocalSet`].
///
/// # Errors
///
/// Stops with the first error a flush returns, such as
/// [`RuntimeError::RenderLoopDetected`].
pub async fn run_local<T, F>(runtime: Rc<Runtime<T>>, until: F) -> Result<(), RuntimeError>
where
    T: RenderTarget + 'static,
    F: Future,
{
    let notify = Rc::new(Notify::new());
    let signal = Rc::clone(&notify);
    runtime.set_waker(move || signal.notify_one());

    tokio::select! {
        result = drive(&runtime, &notify) => result,
        _ = until => {
            tracing::debug!("host loop stopped");
            Ok(())
        }
    }
}

async fn drive<T: RenderTarget>(runtime: &Runtime<T>, notify: &Notify) -> Result<(), RuntimeError> {
    let delay = runtime.config().low_priority_delay;
    loop {
        while runtime.tick_urgent()? {
            tokio::task::yield_now().await;
        }

        if runtime.has_low_priority_work() {
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(delay) => {
                    runtime.run_low_priority();
                }
            }
        } else {
            notify.notified().await;
        }
    }
}

/// Start `future` on the local task set and return a [`Resource`] that
/// settles with its output.
///
/// An `Err` output, or a panic inside the future, rejects the resource.
/// Suspense boundaries waiting on it re-render once it settles.
///
/// Must be called inside a [`tokio::task::LocalSet`].
pub fn spawn_resource<T, E, F>(future: F) -> Resource<T>
where
    T: Clone + 'static,
    E: Display,
    F: Future<Output = Result<T, E>> + 'static,
{
    let resource = Resource::pending();
    let settle = resource.clone();
    tokio::task::spawn_local(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => settle.resolve(value),
            Ok(Err(err)) => settle.reject(err.to_string()),
            Err(_) => {
                tracing::error!("resource task panicked");
                settle.reject("resource task panicked");
            }
        }
    });
    resource
}
