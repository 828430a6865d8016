//! Rehook - a lightweight hooks-based UI runtime with keyed reconciliation.
//!
//! Components are plain functions that return a virtual node tree. Rehook
//! invokes them, keeps their hook state between renders, diffs each new tree
//! against the previous one and applies the minimal set of mutations to a
//! [`RenderTarget`](core::RenderTarget).
//!
//! # Quick Start
//!
//! ```ignore
//! use rehook::prelude::*;
//!
//! #[component]
//! fn counter() -> Render {
//!     let (count, set_count) = use_state(|| 0);
//!     Ok(h!(
//!         "button",
//!         Props::new().on("click", move |_| set_count.update(|n| n + 1)),
//!         "Clicked ", count, " times"
//!     ))
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     rehook::init_tracing();
//!     let target = MemoryTarget::new();
//!     let container = target.create_container("body");
//!     let runtime = Rc::new(Runtime::new(target, RuntimeConfig::default()));
//!     runtime.mount(container, counter()).unwrap();
//!
//!     tokio::task::LocalSet::new()
//!         .run_until(rehook::run_local(runtime, tokio::signal::ctrl_c()))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! # State Management with Hooks
//!
//! See the [`rehook_core::hooks`] module for comprehensive documentation.
//!
//! ## Available Hooks
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_state`] | Simple state with `(value, setter)` tuple |
//! | [`use_reducer`] | State driven by actions |
//! | [`use_ref`] | Mutable reference (doesn't trigger re-renders) |
//! | [`use_effect`] | Side effects when dependencies change |
//! | [`use_effect_cleanup`] | Effects with cleanup functions |
//! | [`use_layout_effect`] | Effects run right after the target is mutated |
//! | [`use_mount`] | One-time effect on first render |
//! | [`use_memo`] | Memoized expensive computations |
//! | [`use_callback`] | Memoized callbacks |
//! | [`use_context`] | Values provided by an ancestor |
//! | [`use_transition`] | Low-priority updates |
//! | [`use_sync_external_store`] | Values owned outside the runtime |
//!
//! ## Rules of Hooks
//!
//! Hooks must be called in the **same order** on every render:
//!
//! - ✅ Call hooks at the top level of your component function
//! - ❌ Don't call hooks inside conditionals (`if`/`match`)
//! - ❌ Don't call hooks inside loops
//! - ❌ Don't call hooks after early returns
//! - ❌ Don't call hooks in event handlers or effects
//!
//! [`use_state`]: prelude::use_state
//! [`use_reducer`]: prelude::use_reducer
//! [`use_ref`]: prelude::use_ref
//! [`use_effect`]: prelude::use_effect
//! [`use_effect_cleanup`]: prelude::use_effect_cleanup
//! [`use_layout_effect`]: prelude::use_layout_effect
//! [`use_mount`]: prelude::use_mount
//! [`use_memo`]: prelude::use_memo
//! [`use_callback`]: prelude::use_callback
//! [`use_context`]: prelude::use_context
//! [`use_transition`]: prelude::use_transition
//! [`use_sync_external_store`]: prelude::use_sync_external_store

pub mod shell;

pub mod prelude {
    //! Common imports for rehook applications.
    pub use crate::shell::{run_local, spawn_resource};
    pub use rehook_core::{
        create_context, error_boundary, fragment, h, memo, memo_with, suspense, use_callback,
        use_context, use_deferred_value, use_effect, use_effect_cleanup, use_force_update,
        use_id, use_imperative_handle, use_layout_effect, use_layout_effect_cleanup, use_memo,
        use_mount, use_node_ref, use_reducer, use_ref, use_state, use_sync_external_store,
        use_transition, use_unmount, Child, Component, ComponentError, Context, ErrorBoundary,
        Event, Key, MemoryTarget, NodeRef, PropValue, Props, RefHandle, Render, RenderError,
        RenderTarget, Resource, Runtime, RuntimeConfig, RuntimeError, Setter, VNode,
        EVERY_RENDER, ONCE,
    };
    pub use rehook_macros::component;
    pub use std::rc::Rc;
}

// Re-export core types at crate root
pub use rehook_core::{Component, Render, RenderTarget, Runtime, RuntimeConfig, RuntimeError, VNode};
pub use rehook_macros::component;
pub use shell::{init_tracing, run_local, spawn_resource};

pub use rehook_core as core;
