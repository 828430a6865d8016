//! Event handler values and the event object passed to them.
//!
//! Handlers are attached to elements through `on<event>` props (for example
//! `onclick`). The runtime treats them as ordinary prop values; render targets
//! decide how to deliver events. [`MemoryTarget`](crate::MemoryTarget)
//! delivers them by bubbling from the target node to its ancestors.

use std::cell::Cell;
use std::rc::Rc;

use crate::target::NodeRef;
use crate::vnode::PropValue;

/// Prefix shared by every event prop name.
pub const EVENT_PROP_PREFIX: &str = "on";

/// Returns `true` if a prop with this name carries an event handler.
pub fn is_event_prop(name: &str) -> bool {
    name.len() > EVENT_PROP_PREFIX.len() && name.starts_with(EVENT_PROP_PREFIX)
}

/// Event name for an event prop (`onClick` and `onclick` both map to `click`).
pub fn event_name(prop: &str) -> Option<String> {
    is_event_prop(prop).then(|| prop[EVENT_PROP_PREFIX.len()..].to_ascii_lowercase())
}

/// Prop name used to register a handler for `event`.
pub fn event_prop(event: &str) -> String {
    format!("{EVENT_PROP_PREFIX}{}", event.to_ascii_lowercase())
}

/// A cloneable event handler.
///
/// Two handlers are equal only if they are the same allocation, so a handler
/// recreated on every render is always seen as changed.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new<F: Fn(&Event) + 'static>(f: F) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the handler.
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventHandler(...)")
    }
}

impl<F: Fn(&Event) + 'static> From<F> for EventHandler {
    fn from(f: F) -> Self {
        Self::new(f)
    }
}

/// An event being delivered to handlers.
#[derive(Debug)]
pub struct Event {
    name: String,
    target: NodeRef,
    current_target: Cell<NodeRef>,
    value: Option<PropValue>,
    stopped: Cell<bool>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeRef) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: Cell::new(target),
            value: None,
            stopped: Cell::new(false),
        }
    }

    /// Attach a payload, such as the new value of an input.
    pub fn with_value(mut self, value: impl Into<PropValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> NodeRef {
        self.target
    }

    /// The node whose handler is currently running.
    pub fn current_target(&self) -> NodeRef {
        self.current_target.get()
    }

    pub fn value(&self) -> Option<&PropValue> {
        self.value.as_ref()
    }

    /// Stop delivery to ancestors once the current handler returns.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(crate) fn set_current_target(&self, node: NodeRef) {
        self.current_target.set(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn event_prop_names() {
        assert!(is_event_prop("onclick"));
        assert!(!is_event_prop("on"));
        assert!(!is_event_prop("class"));
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_prop("Input"), "oninput");
    }

    #[test]
    fn handler_identity() {
        let a = EventHandler::new(|_| {});
        let b = a.clone();
        let c = EventHandler::new(|_| {});
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn handler_receives_event() {
        let seen = Rc::new(Cell::new(0));
        let seen_in = seen.clone();
        let handler = EventHandler::new(move |event| {
            assert_eq!(event.name(), "click");
            seen_in.set(seen_in.get() + 1);
        });
        handler.call(&Event::new("click", NodeRef::from_raw(1)));
        assert_eq!(seen.get(), 1);
    }
}
