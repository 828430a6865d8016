//! Asynchronous values that suspend rendering while pending.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ComponentError, RenderError};

enum State<T> {
    Pending,
    Ready(T),
    Rejected(String),
}

struct Inner<T> {
    state: RefCell<State<T>>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
}

trait Settle {
    fn is_settled(&self) -> bool;
    fn wait(&self, waiter: Box<dyn FnOnce()>);
}

impl<T> Settle for Inner<T> {
    fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), State::Pending)
    }

    fn wait(&self, waiter: Box<dyn FnOnce()>) {
        self.waiters.borrow_mut().push(waiter);
    }
}

/// A pending read that suspended a render.
///
/// Carried by [`RenderError::Suspended`]; the suspense boundary that catches
/// it subscribes to be told when the resource settles.
#[derive(Clone)]
pub struct Suspension {
    source: Rc<dyn Settle>,
}

impl Suspension {
    /// Run `waiter` once the resource settles (immediately if it already has).
    pub fn subscribe(&self, waiter: Box<dyn FnOnce()>) {
        if self.source.is_settled() {
            waiter();
        } else {
            self.source.wait(waiter);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.source.is_settled()
    }

    /// Whether both suspensions wait on the same resource.
    pub(crate) fn same_source(&self, other: &Suspension) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("settled", &self.source.is_settled())
            .finish()
    }
}

/// A value that becomes available later.
///
/// Components call [`Resource::read`] and propagate its error with `?`:
/// while pending the render suspends, once rejected it fails.
pub struct Resource<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Resource<T> {
    /// A resource that has not settled yet.
    pub fn pending() -> Self {
        Self::with_state(State::Pending)
    }

    pub fn ready(value: T) -> Self {
        Self::with_state(State::Ready(value))
    }

    fn with_state(state: State<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn resolve(&self, value: T) {
        self.settle(State::Ready(value));
    }

    pub fn reject(&self, message: impl Into<String>) {
        self.settle(State::Rejected(message.into()));
    }

    fn settle(&self, state: State<T>) {
        {
            let mut current = self.inner.state.borrow_mut();
            if !matches!(*current, State::Pending) {
                tracing::warn!("resource settled twice; keeping the first outcome");
                return;
            }
            *current = state;
        }
        let waiters = std::mem::take(&mut *self.inner.waiters.borrow_mut());
        for waiter in waiters {
            waiter();
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.inner.is_settled()
    }

    /// The value, or the error that suspends or fails the calling render.
    pub fn read(&self) -> Result<T, RenderError> {
        match &*self.inner.state.borrow() {
            State::Ready(value) => Ok(value.clone()),
            State::Rejected(message) => Err(RenderError::Failed(ComponentError::Rejected {
                message: message.clone(),
            })),
            State::Pending => Err(RenderError::Suspended(self.suspension())),
        }
    }

    pub fn suspension(&self) -> Suspension {
        let source: Rc<dyn Settle> = self.inner.clone();
        Suspension { source }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.state.borrow() {
            State::Pending => f.write_str("Resource::Pending"),
            State::Ready(value) => f.debug_tuple("Resource::Ready").field(value).finish(),
            State::Rejected(message) => f.debug_tuple("Resource::Rejected").field(message).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn pending_read_suspends_until_resolved() {
        let resource = Resource::<u32>::pending();
        let Err(RenderError::Suspended(suspension)) = resource.read() else {
            panic!("expected suspension");
        };

        let woken = Rc::new(Cell::new(false));
        let flag = woken.clone();
        suspension.subscribe(Box::new(move || flag.set(true)));
        assert!(!woken.get());

        resource.resolve(7);
        assert!(woken.get());
        assert_eq!(resource.read().unwrap(), 7);
    }

    #[test]
    fn rejection_fails_the_read() {
        let resource = Resource::<u32>::pending();
        resource.reject("offline");
        resource.resolve(1);
        match resource.read() {
            Err(RenderError::Failed(ComponentError::Rejected { message })) => {
                assert_eq!(message, "offline")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn settled_suspension_wakes_immediately() {
        let resource = Resource::ready("x".to_string());
        let woken = Rc::new(Cell::new(false));
        let flag = woken.clone();
        resource.suspension().subscribe(Box::new(move || flag.set(true)));
        assert!(woken.get());
    }
}
