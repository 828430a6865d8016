//! Error types for the runtime, component invocation and the hook store.

use std::time::Duration;

use thiserror::Error;

use crate::resource::Suspension;

/// A failure raised while a component was producing its tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The component returned an error.
    #[error("component `{component}` failed: {message}")]
    Failed { component: String, message: String },

    /// The component panicked while rendering.
    #[error("component `{component}` panicked: {message}")]
    Panicked { component: String, message: String },

    /// A resource read by the component was rejected.
    #[error("resource rejected: {message}")]
    Rejected { message: String },
}

impl ComponentError {
    /// Create a failure with the given message.
    ///
    /// The component name is filled in by the invoker when the error leaves
    /// the component that produced it.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed {
            component: String::new(),
            message: message.into(),
        }
    }

    /// The human readable failure message.
    pub fn message(&self) -> &str {
        match self {
            Self::Failed { message, .. }
            | Self::Panicked { message, .. }
            | Self::Rejected { message } => message,
        }
    }

    /// Name of the component that failed, when known.
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Failed { component, .. } | Self::Panicked { component, .. }
                if !component.is_empty() =>
            {
                Some(component)
            }
            _ => None,
        }
    }

    pub(crate) fn attribute(self, name: &str) -> Self {
        match self {
            Self::Failed { component, message } if component.is_empty() => Self::Failed {
                component: name.to_owned(),
                message,
            },
            other => other,
        }
    }
}

/// The non-success outcomes of a component render.
///
/// `Suspended` is caught by the nearest suspense boundary, `Failed` by the
/// nearest error boundary.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("render suspended on a pending resource")]
    Suspended(Suspension),

    #[error(transparent)]
    Failed(#[from] ComponentError),
}

impl RenderError {
    /// Shorthand for a plain component failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(ComponentError::new(message))
    }
}

/// Violations of the hook-ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error(
        "`{hook}` called outside of a component render; hooks can only be called \
         while a component is being invoked (not from event handlers, effects or async tasks)"
    )]
    InvalidContext { hook: &'static str },

    #[error(
        "hook order mismatch at index {index}: previous render called `{previous}`, \
         this render called `{current}`; hooks must be called in the same order every render"
    )]
    OrderViolation {
        index: usize,
        previous: &'static str,
        current: &'static str,
    },

    #[error(
        "hook count mismatch: previous render called {previous} hooks, this render called \
         {current}; check for hooks inside conditionals, loops or after early returns"
    )]
    CountMismatch { previous: usize, current: usize },
}

/// Errors surfaced by [`Runtime`](crate::Runtime) operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(
        "render loop detected: more than {limit} passes within {window:?} ({passes} so far); \
         check effects and setters that update state on every render"
    )]
    RenderLoopDetected {
        passes: u32,
        limit: u32,
        window: Duration,
    },

    #[error(transparent)]
    ComponentRender(#[from] ComponentError),

    #[error("a component suspended with no suspense boundary above it")]
    UnhandledSuspension,

    #[error("no root is mounted")]
    NotMounted,

    #[error("a root is already mounted; call unmount_all first")]
    AlreadyMounted,
}

impl From<RenderError> for RuntimeError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Suspended(_) => Self::UnhandledSuspension,
            RenderError::Failed(err) => Self::ComponentRender(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_failure_is_attributed_once() {
        let err = ComponentError::new("boom").attribute("Widget");
        assert_eq!(err.component(), Some("Widget"));
        assert_eq!(err.message(), "boom");

        let err = err.attribute("Outer");
        assert_eq!(err.component(), Some("Widget"));
    }

    #[test]
    fn render_error_maps_to_runtime_error() {
        let err: RuntimeError = RenderError::failed("nope").into();
        assert!(matches!(err, RuntimeError::ComponentRender(_)));
    }

    #[test]
    fn hook_errors_name_the_hooks() {
        let err = HookError::OrderViolation {
            index: 1,
            previous: "use_state",
            current: "use_ref",
        };
        let text = err.to_string();
        assert!(text.contains("index 1"));
        assert!(text.contains("use_state"));
        assert!(text.contains("use_ref"));
    }
}
