//! Core runtime for rehook: virtual nodes, hooks, keyed reconciliation and
//! batched updates.

pub mod boundary;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod hooks;
pub mod memory;
pub mod resource;
pub mod runtime;
pub mod store;
pub mod target;
pub mod vnode;

mod invoker;
mod lifecycle;
mod reconciler;
mod scheduler;

// Re-export the node model for `h!` and component bodies
pub use component::{memo, memo_with, Component, ComponentId, Render};
pub use vnode::{
    fragment, h, normalize_children, Child, ComponentNode, ElementNode, FragmentNode, Key,
    NodeType, PropValue, Props, TextNode, VNode,
};

// Re-export hooks for ergonomic state management
pub use context::{create_context, use_context, Context};
pub use hooks::{
    use_callback, use_deferred_value, use_effect, use_effect_cleanup, use_force_update, use_id,
    use_imperative_handle, use_layout_effect, use_layout_effect_cleanup, use_memo, use_mount,
    use_node_ref, use_reducer, use_ref, use_state, use_sync_external_store, use_transition,
    use_unmount, Dispatch, ForceUpdate, RefHandle, Setter, Transition, EVERY_RENDER, ONCE,
};

pub use boundary::{error_boundary, suspense, ErrorBoundary};
pub use config::RuntimeConfig;
pub use error::{ComponentError, HookError, RenderError, RuntimeError};
pub use events::{Event, EventHandler};
pub use invoker::is_rendering;
pub use memory::{MemoryTarget, Op};
pub use resource::{Resource, Suspension};
pub use runtime::{Runtime, Stats, UpdateHandle};
pub use scheduler::{Lane, Phase, TaskId};
pub use store::{HookKind, HookMeta, InstanceKey};
pub use target::{NodeRef, NodeRefTarget, RenderTarget};
