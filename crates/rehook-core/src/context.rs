//! Context: values provided by an ancestor and read by any descendant.

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::{Component, Render};
use crate::invoker::current_frame;
use crate::vnode::{Props, VNode};

/// Unique identifier for a context created with [`create_context`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A value provided for a subtree.
#[derive(Clone)]
pub(crate) struct ProvidedContext {
    pub(crate) id: ContextId,
    pub(crate) value: Rc<dyn Any>,
}

const CONTEXT_PROP: &str = "context";

thread_local! {
    static PROVIDER: Component = Component::new("ContextProvider", render_provider);
}

fn render_provider(props: &Props) -> Render {
    let frame = current_frame("Context::provider");
    if let Some(provided) = props.get_any::<ProvidedContext>(CONTEXT_PROP) {
        frame.instance.provide(provided.clone());
    }
    Ok(props
        .get_children()
        .first()
        .cloned()
        .unwrap_or_else(|| VNode::text("")))
}

/// A typed context with a default value.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

/// Create a context whose consumers see `default` when no provider is above
/// them.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, PartialEq)]
/// struct Theme { dark: bool }
///
/// thread_local! {
///     static THEME: Context<Theme> = create_context(Theme { dark: false });
/// }
///
/// #[component]
/// fn app() -> Render {
///     let theme = THEME.with(Clone::clone);
///     Ok(theme.provider(Theme { dark: true }, toolbar()))
/// }
///
/// #[component]
/// fn toolbar() -> Render {
///     let theme = use_context(&THEME.with(Clone::clone));
///     Ok(h!("div", Props::new(), if theme.dark { "dark" } else { "light" }))
/// }
/// ```
pub fn create_context<T: Clone + 'static>(default: T) -> Context<T> {
    Context {
        id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
        default: Rc::new(default),
    }
}

impl<T: Clone + 'static> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Provide `value` to every descendant of `child`.
    pub fn provider(&self, value: T, child: impl Into<VNode>) -> VNode {
        let provided = ProvidedContext {
            id: self.id,
            value: Rc::new(value),
        };
        let props = Props::new()
            .any(CONTEXT_PROP, provided)
            .children(vec![child.into()]);
        PROVIDER.with(|c| c.with_props(props))
    }
}

/// Read the nearest provided value of `context`, or its default.
///
/// # Panics
///
/// Panics when called outside a component render.
pub fn use_context<T: Clone + 'static>(context: &Context<T>) -> T {
    let frame = current_frame("use_context");
    let provided = frame.lookup_context(context.id);
    frame.instance.record_context(context.id, provided.clone());
    provided
        .and_then(|value| value.downcast_ref::<T>().cloned())
        .unwrap_or_else(|| (*context.default).clone())
}
