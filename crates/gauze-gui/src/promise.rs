//! Single-threaded promises for the asynchronous legs of the pipeline.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Error;

enum PromiseState<T> {
    Pending,
    Resolved(Rc<T>),
    Rejected(Error),
}

struct PromiseInner<T> {
    state: PromiseState<T>,
    callbacks: Vec<Box<dyn FnOnce(Result<&T, &Error>)>>,
}

/// A single-threaded settled-once value with multi-subscriber completion
/// callbacks.
///
/// Cheap to clone; all clones observe the same settlement. Subscribing after
/// settlement invokes the callback immediately. Rejections are delivered to
/// every subscriber; a promise nobody subscribes to is inert, so callers who
/// fire an operation without awaiting it are never affected by its failure.
pub struct Promise<T> {
    inner: Rc<RefCell<PromiseInner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Promise<T> {
    pub fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                state: PromiseState::Pending,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn resolved(value: T) -> Self {
        let promise = Self::pending();
        promise.resolve(value);
        promise
    }

    pub fn rejected(error: Error) -> Self {
        let promise = Self::pending();
        promise.reject(error);
        promise
    }

    /// Settle with a value. A second settlement attempt is ignored.
    pub fn resolve(&self, value: T) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, PromiseState::Pending) {
                return;
            }
            inner.state = PromiseState::Resolved(Rc::new(value));
            std::mem::take(&mut inner.callbacks)
        };
        let value = match &self.inner.borrow().state {
            PromiseState::Resolved(value) => Rc::clone(value),
            _ => return,
        };
        for callback in callbacks {
            callback(Ok(value.as_ref()));
        }
    }

    /// Settle with an error. A second settlement attempt is ignored.
    pub fn reject(&self, error: Error) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, PromiseState::Pending) {
                return;
            }
            inner.state = PromiseState::Rejected(error.clone());
            std::mem::take(&mut inner.callbacks)
        };
        for callback in callbacks {
            callback(Err(&error));
        }
    }

    /// Subscribe to settlement. Fires immediately if already settled.
    pub fn then(&self, callback: impl FnOnce(Result<&T, &Error>) + 'static) {
        let mut callback = Some(callback);
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match &inner.state {
                PromiseState::Pending => {
                    inner.callbacks.push(Box::new(callback.take().unwrap()));
                    None
                }
                PromiseState::Resolved(value) => Some(Ok(Rc::clone(value))),
                PromiseState::Rejected(error) => Some(Err(error.clone())),
            }
        };
        match settled {
            Some(Ok(value)) => (callback.take().unwrap())(Ok(value.as_ref())),
            Some(Err(error)) => (callback.take().unwrap())(Err(&error)),
            None => {}
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, PromiseState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().state, PromiseState::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.borrow().state, PromiseState::Rejected(_))
    }

    /// The resolved value, if any
    pub fn value(&self) -> Option<Rc<T>> {
        match &self.inner.borrow().state {
            PromiseState::Resolved(value) => Some(Rc::clone(value)),
            _ => None,
        }
    }

    /// The rejection error, if any
    pub fn error(&self) -> Option<Error> {
        match &self.inner.borrow().state {
            PromiseState::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }
}
