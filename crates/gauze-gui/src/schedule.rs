//! The cooperative scheduling substrate the host run-loop drives.
//!
//! Everything asynchronous in this crate is a non-blocking deferred
//! continuation: debounced operations land in the next-turn queue, press
//! animations land in the virtual-time timeout queue. The host pumps both
//! from its frame loop (`run_once` per frame, `advance` with the frame
//! delta); tests pump them explicitly, which makes every async interleaving
//! in the pipeline deterministic.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Key returned by [`Scheduler::set_timeout`], used to cancel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Timeout {
    id: TimerId,
    due_ms: f64,
    callback: Box<dyn FnOnce()>,
}

struct SchedulerInner {
    queue: VecDeque<Box<dyn FnOnce()>>,
    timeouts: Vec<Timeout>,
    now_ms: f64,
    next_timer_id: u64,
}

/// Single-threaded cooperative scheduler handle.
///
/// Cheap to clone; all clones share the same queues. One *turn* is one
/// [`run_once`](Self::run_once) call: it drains exactly the callbacks that
/// were deferred before the call, so work deferred while draining runs in
/// the next turn. This is the boundary the debouncing contract is defined
/// against.
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                queue: VecDeque::new(),
                timeouts: Vec::new(),
                now_ms: 0.0,
                next_timer_id: 0,
            })),
        }
    }

    /// Defer a single-shot callback to the next turn
    pub fn defer(&self, callback: impl FnOnce() + 'static) {
        self.inner.borrow_mut().queue.push_back(Box::new(callback));
    }

    /// Run one turn: everything deferred before this call, nothing deferred
    /// during it. Returns the number of callbacks run.
    pub fn run_once(&self) -> usize {
        let batch: Vec<Box<dyn FnOnce()>> = {
            let mut inner = self.inner.borrow_mut();
            inner.queue.drain(..).collect()
        };
        let count = batch.len();
        for callback in batch {
            callback();
        }
        count
    }

    /// Pump turns until the queue stays empty. Returns the total number of
    /// callbacks run. Bails out (with a diagnostic) if the queue never
    /// drains, which would mean a callback re-deferring itself forever.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..10_000 {
            let ran = self.run_once();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        log::warn!("scheduler did not settle after 10000 turns, giving up");
        total
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> f64 {
        self.inner.borrow().now_ms
    }

    /// Schedule a callback `delay_ms` of virtual time from now
    pub fn set_timeout(&self, delay_ms: f64, callback: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_timer_id);
        inner.next_timer_id += 1;
        let due_ms = inner.now_ms + delay_ms.max(0.0);
        inner.timeouts.push(Timeout {
            id,
            due_ms,
            callback: Box::new(callback),
        });
        id
    }

    /// Cancel a pending timeout; returns false if it already fired or was
    /// cancelled
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.timeouts.len();
        inner.timeouts.retain(|timeout| timeout.id != id);
        inner.timeouts.len() != before
    }

    /// Advance virtual time, firing due timeouts in due order (insertion
    /// order on ties)
    pub fn advance(&self, delta_ms: f64) {
        let target = self.inner.borrow().now_ms + delta_ms.max(0.0);

        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let due_index = inner
                    .timeouts
                    .iter()
                    .enumerate()
                    .filter(|(_, timeout)| timeout.due_ms <= target)
                    .min_by(|(ia, a), (ib, b)| a.due_ms.total_cmp(&b.due_ms).then(ia.cmp(ib)))
                    .map(|(index, _)| index);

                match due_index {
                    Some(index) => {
                        let timeout = inner.timeouts.remove(index);
                        inner.now_ms = inner.now_ms.max(timeout.due_ms);
                        Some(timeout.callback)
                    }
                    None => {
                        inner.now_ms = target;
                        None
                    }
                }
            };

            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_turn_boundary() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log2 = Rc::clone(&log);
        let inner_scheduler = scheduler.clone();
        scheduler.defer(move || {
            log2.borrow_mut().push("first");
            let log3 = Rc::clone(&log2);
            inner_scheduler.defer(move || log3.borrow_mut().push("second"));
        });

        // A callback deferred during a turn runs in the next turn
        assert_eq!(scheduler.run_once(), 1);
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(scheduler.run_once(), 1);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(scheduler.run_once(), 0);
    }

    #[test]
    fn test_run_until_idle() {
        let scheduler = Scheduler::new();
        let count = Rc::new(RefCell::new(0));

        let count2 = Rc::clone(&count);
        let chained = scheduler.clone();
        scheduler.defer(move || {
            *count2.borrow_mut() += 1;
            let count3 = Rc::clone(&count2);
            chained.defer(move || *count3.borrow_mut() += 1);
        });

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_timeout_ordering_and_cancel() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_a = Rc::clone(&log);
        scheduler.set_timeout(50.0, move || log_a.borrow_mut().push("late"));
        let log_b = Rc::clone(&log);
        scheduler.set_timeout(10.0, move || log_b.borrow_mut().push("early"));
        let log_c = Rc::clone(&log);
        let cancelled = scheduler.set_timeout(20.0, move || log_c.borrow_mut().push("never"));

        assert!(scheduler.clear_timeout(cancelled));
        scheduler.advance(100.0);
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert_eq!(scheduler.now_ms(), 100.0);
    }

    #[test]
    fn test_timeout_fired_during_advance_can_chain() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(RefCell::new(false));

        let fired2 = Rc::clone(&fired);
        let chained = scheduler.clone();
        scheduler.set_timeout(10.0, move || {
            let fired3 = Rc::clone(&fired2);
            chained.set_timeout(10.0, move || *fired3.borrow_mut() = true);
        });

        scheduler.advance(30.0);
        assert!(*fired.borrow());
    }
}
