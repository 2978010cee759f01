//! Coalescing of invalidation bursts into single deferred executions.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::promise::Promise;
use crate::schedule::Scheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Scheduled,
    Running,
}

struct DebounceState<A> {
    phase: Phase,
    /// Argument for the next run; later invocations overwrite it
    pending_arg: Option<A>,
    /// Completion of the scheduled or in-flight run
    current: Option<Promise<()>>,
    /// Completion of the trailing re-run requested while running
    next: Option<Promise<()>>,
}

/// A debounced asynchronous operation bound to one owner.
///
/// Invoking it any number of times within one scheduling turn executes the
/// wrapped operation exactly once, on the next turn, with the argument of the
/// *last* invocation. Invocations that arrive while a run is in flight
/// schedule exactly one trailing re-run (the operation reads state that
/// changed under it). Every invocation returns the completion promise of the
/// run it was folded into; the operation's rejection propagates there and
/// nowhere else.
///
/// Instances are per-operation, per-owner - never shared between owners.
pub struct Debounced<A = ()> {
    scheduler: Scheduler,
    operation: Rc<dyn Fn(A) -> Promise<()>>,
    state: Rc<RefCell<DebounceState<A>>>,
}

impl<A: 'static> Debounced<A> {
    /// Wrap `operation`. The operation returns the promise of its own
    /// asynchronous completion; synchronous operations return
    /// `Promise::resolved(())`.
    pub fn new(
        scheduler: &Scheduler,
        operation: impl Fn(A) -> Promise<()> + 'static,
    ) -> Self {
        Self {
            scheduler: scheduler.clone(),
            operation: Rc::new(operation),
            state: Rc::new(RefCell::new(DebounceState {
                phase: Phase::Idle,
                pending_arg: None,
                current: None,
                next: None,
            })),
        }
    }

    /// Request an execution with `arg`; coalesces with other requests in the
    /// same turn (last argument wins)
    pub fn invoke(&self, arg: A) -> Promise<()> {
        let mut state = self.state.borrow_mut();
        state.pending_arg = Some(arg);

        match state.phase {
            Phase::Idle => {
                let completion = Promise::pending();
                state.current = Some(completion.clone());
                state.phase = Phase::Scheduled;
                drop(state);
                self.schedule_run();
                completion
            }
            Phase::Scheduled => state
                .current
                .clone()
                .unwrap_or_else(Promise::pending),
            Phase::Running => state
                .next
                .get_or_insert_with(Promise::pending)
                .clone(),
        }
    }

    /// The completion the caller can await: the scheduled/in-flight run, or
    /// the trailing re-run if one is already requested. `None` when idle.
    pub fn completion(&self) -> Option<Promise<()>> {
        let state = self.state.borrow();
        state.next.clone().or_else(|| state.current.clone())
    }

    pub fn is_idle(&self) -> bool {
        self.state.borrow().phase == Phase::Idle
    }

    fn schedule_run(&self) {
        let state = Rc::downgrade(&self.state);
        let operation = Rc::clone(&self.operation);
        let scheduler = self.scheduler.clone();
        self.scheduler
            .defer(move || Self::run(state, operation, scheduler));
    }

    fn run(
        state_weak: Weak<RefCell<DebounceState<A>>>,
        operation: Rc<dyn Fn(A) -> Promise<()>>,
        scheduler: Scheduler,
    ) {
        let Some(state_rc) = state_weak.upgrade() else {
            return;
        };

        let (arg, completion) = {
            let mut state = state_rc.borrow_mut();
            state.phase = Phase::Running;
            let completion = state.current.clone().unwrap_or_else(Promise::pending);
            match state.pending_arg.take() {
                Some(arg) => (arg, completion),
                None => {
                    // Nothing left to do (cannot normally happen)
                    state.phase = Phase::Idle;
                    state.current = None;
                    drop(state);
                    completion.resolve(());
                    return;
                }
            }
        };

        let run_promise = operation(arg);

        let state_weak2 = state_weak.clone();
        run_promise.then(move |result| {
            // Settle the completion first: awaiting callers observe the run
            // before any trailing re-run is scheduled
            match result {
                Ok(()) => completion.resolve(()),
                Err(error) => completion.reject(error.clone()),
            }

            let Some(state_rc) = state_weak2.upgrade() else {
                return;
            };
            let rerun = {
                let mut state = state_rc.borrow_mut();
                if state.pending_arg.is_some() {
                    state.current = Some(
                        state.next.take().unwrap_or_else(Promise::pending),
                    );
                    state.phase = Phase::Scheduled;
                    true
                } else {
                    state.phase = Phase::Idle;
                    state.current = None;
                    state.next = None;
                    false
                }
            };
            if rerun {
                let operation = Rc::clone(&operation);
                let scheduler2 = scheduler.clone();
                let state_weak3 = state_weak2.clone();
                scheduler.defer(move || Self::run(state_weak3, operation, scheduler2));
            }
        });
    }
}

impl Debounced<()> {
    /// [`invoke`](Self::invoke) for argument-less operations
    pub fn trigger(&self) -> Promise<()> {
        self.invoke(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counting_op(
        scheduler: &Scheduler,
        runs: &Rc<RefCell<Vec<String>>>,
    ) -> Debounced<String> {
        let runs = Rc::clone(runs);
        Debounced::new(scheduler, move |arg: String| {
            runs.borrow_mut().push(arg);
            Promise::resolved(())
        })
    }

    #[test]
    fn test_same_turn_calls_coalesce_to_last_argument() {
        let scheduler = Scheduler::new();
        let runs = Rc::new(RefCell::new(Vec::new()));
        let debounced = counting_op(&scheduler, &runs);

        debounced.invoke("a".into());
        debounced.invoke("b".into());
        let completion = debounced.invoke("c".into());

        assert!(runs.borrow().is_empty());
        scheduler.run_until_idle();
        assert_eq!(*runs.borrow(), vec!["c"]);
        assert!(completion.is_resolved());
        assert!(debounced.is_idle());
    }

    #[test]
    fn test_separate_turns_run_separately() {
        let scheduler = Scheduler::new();
        let runs = Rc::new(RefCell::new(Vec::new()));
        let debounced = counting_op(&scheduler, &runs);

        debounced.invoke("a".into());
        scheduler.run_until_idle();
        debounced.invoke("b".into());
        scheduler.run_until_idle();
        assert_eq!(*runs.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_invocation_while_running_schedules_one_rerun() {
        let scheduler = Scheduler::new();
        let runs = Rc::new(RefCell::new(Vec::<String>::new()));
        let pending_ops: Rc<RefCell<Vec<Promise<()>>>> = Rc::new(RefCell::new(Vec::new()));

        let runs2 = Rc::clone(&runs);
        let pending2 = Rc::clone(&pending_ops);
        let debounced = Debounced::new(&scheduler, move |arg: String| {
            runs2.borrow_mut().push(arg);
            let op = Promise::pending();
            pending2.borrow_mut().push(op.clone());
            op
        });

        debounced.invoke("first".into());
        scheduler.run_until_idle();
        assert_eq!(*runs.borrow(), vec!["first"]);

        // Two invocations while the first run is still in flight
        let rerun_a = debounced.invoke("second".into());
        let rerun_b = debounced.invoke("third".into());

        // Completing the first run schedules exactly one trailing re-run
        pending_ops.borrow_mut().remove(0).resolve(());
        scheduler.run_until_idle();
        assert_eq!(*runs.borrow(), vec!["first", "third"]);

        pending_ops.borrow_mut().remove(0).resolve(());
        assert!(rerun_a.is_resolved());
        assert!(rerun_b.is_resolved());
    }

    #[test]
    fn test_rejection_reaches_awaiting_caller_only() {
        let scheduler = Scheduler::new();
        let debounced: Debounced = Debounced::new(&scheduler, |()| {
            Promise::rejected(Error::RenderFailed("boom".into()))
        });

        // Fire-and-forget caller: nothing to observe, nothing panics
        debounced.trigger();
        // Awaiting caller gets the rejection
        let completion = debounced.trigger();
        scheduler.run_until_idle();
        assert_eq!(completion.error(), Some(Error::RenderFailed("boom".into())));
    }

    #[test]
    fn test_completion_tracks_pending_run() {
        let scheduler = Scheduler::new();
        let debounced: Debounced =
            Debounced::new(&scheduler, |()| Promise::resolved(()));

        assert!(debounced.completion().is_none());
        let completion = debounced.trigger();
        let observed = debounced.completion().expect("a run is scheduled");
        scheduler.run_until_idle();
        assert!(completion.is_resolved());
        assert!(observed.is_resolved());
        assert!(debounced.completion().is_none());
    }

    #[test]
    fn test_dropped_owner_is_a_safe_no_op() {
        let scheduler = Scheduler::new();
        let runs = Rc::new(RefCell::new(Vec::new()));
        let debounced = counting_op(&scheduler, &runs);

        debounced.invoke("a".into());
        drop(debounced);
        scheduler.run_until_idle();
        assert!(runs.borrow().is_empty());
    }
}
