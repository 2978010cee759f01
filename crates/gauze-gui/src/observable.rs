//! Multi-subscriber event streams with synchronous, registration-order delivery.

use std::cell::RefCell;
use std::rc::Rc;

/// Key returned by [`Observable::add`], used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Entry<T> {
    id: ObserverId,
    once: bool,
    callback: Rc<RefCell<dyn FnMut(&T)>>,
}

struct ObservableInner<T> {
    next_id: u64,
    observers: Vec<Entry<T>>,
}

/// A multi-subscriber notification stream.
///
/// Delivery is synchronous and in registration order. The handle is cheap to
/// clone; all clones share the same subscriber list. Observers may subscribe
/// or unsubscribe from within a notification - the in-flight notification
/// keeps delivering to the subscriber snapshot it started with.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    /// Subscribe a callback, returning its removal key
    pub fn add(&self, callback: impl FnMut(&T) + 'static) -> ObserverId {
        self.add_entry(callback, false)
    }

    /// Subscribe a callback that is removed after its first delivery
    pub fn add_once(&self, callback: impl FnMut(&T) + 'static) -> ObserverId {
        self.add_entry(callback, true)
    }

    fn add_entry(&self, callback: impl FnMut(&T) + 'static, once: bool) -> ObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push(Entry {
            id,
            once,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    /// Unsubscribe; returns false if the observer was already gone
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.observers.len();
        inner.observers.retain(|entry| entry.id != id);
        inner.observers.len() != before
    }

    /// Notify every observer, in registration order
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<(ObserverId, bool, Rc<RefCell<dyn FnMut(&T)>>)> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|entry| (entry.id, entry.once, Rc::clone(&entry.callback)))
            .collect();

        for (id, once, callback) in snapshot {
            (callback.borrow_mut())(value);
            if once {
                self.remove(id);
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Drop every observer
    pub fn clear(&self) {
        self.inner.borrow_mut().observers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_registration_order_delivery() {
        let observable: Observable<u32> = Observable::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Rc::clone(&order);
            observable.add(move |value| order.borrow_mut().push(format!("{tag}{value}")));
        }

        observable.notify(&1);
        assert_eq!(*order.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_remove() {
        let observable: Observable<()> = Observable::new();
        let count = Rc::new(RefCell::new(0));

        let count2 = Rc::clone(&count);
        let id = observable.add(move |_| *count2.borrow_mut() += 1);

        observable.notify(&());
        assert!(observable.remove(id));
        assert!(!observable.remove(id));
        observable.notify(&());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_add_once() {
        let observable: Observable<()> = Observable::new();
        let count = Rc::new(RefCell::new(0));

        let count2 = Rc::clone(&count);
        observable.add_once(move |_| *count2.borrow_mut() += 1);

        observable.notify(&());
        observable.notify(&());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(observable.observer_count(), 0);
    }

    #[test]
    fn test_reentrant_subscription() {
        let observable: Observable<()> = Observable::new();
        let count = Rc::new(RefCell::new(0));

        let outer = observable.clone();
        let count2 = Rc::clone(&count);
        observable.add(move |_| {
            let count3 = Rc::clone(&count2);
            outer.add(move |_| *count3.borrow_mut() += 1);
        });

        // The observer added during the first notification must not receive it
        observable.notify(&());
        assert_eq!(*count.borrow(), 0);
        observable.notify(&());
        assert_eq!(*count.borrow(), 1);
    }
}
