//! Delayed tasks with reschedule/cancel.
//!
//! Autosave, search and the hover grace delay all need "run this later unless something newer
//! comes along". [`Scheduler`] is the timer capability (browser `setTimeout` in the app, a
//! virtual clock in tests) and [`Debouncer`] is the single-owner "reset on every call" wrapper.

use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

pub(crate) type Task = LocalBoxFuture<'static, ()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) i32);

pub trait Scheduler: Clone + 'static {
    /// Run `task` after `delay_ms`. `None` when no timer could be installed.
    fn schedule(&self, delay_ms: u32, task: Task) -> Option<TimerId>;

    /// Cancelling an already-fired or unknown timer does nothing.
    fn cancel(&self, id: TimerId);
}

/// `window.setTimeout`; the task is spawned on the Leptos local executor when it fires.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowScheduler;

impl Scheduler for WindowScheduler {
    fn schedule(&self, delay_ms: u32, task: Task) -> Option<TimerId> {
        use wasm_bindgen::JsCast;

        let win = web_sys::window()?;
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            leptos::task::spawn_local(task);
        });
        win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            i32::try_from(delay_ms).unwrap_or(i32::MAX),
        )
        .ok()
        .map(TimerId)
    }

    fn cancel(&self, id: TimerId) {
        if let Some(win) = web_sys::window() {
            win.clear_timeout_with_handle(id.0);
        }
    }
}

/// At most one pending task; every `reschedule` supersedes the previous one.
#[derive(Clone)]
pub struct Debouncer<S: Scheduler> {
    scheduler: S,
    pending: Rc<Cell<Option<TimerId>>>,
    // Bumped on every reschedule/cancel so a task that already left the timer queue
    // but has not started yet still sees that it was superseded.
    generation: Rc<Cell<u64>>,
}

impl<S: Scheduler> Debouncer<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: Rc::new(Cell::new(None)),
            generation: Rc::new(Cell::new(0)),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn reschedule<F>(&self, delay_ms: u32, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.cancel();
        let generation = self.generation.get();
        let current = self.generation.clone();
        let pending = self.pending.clone();
        let wrapped = async move {
            if current.get() != generation {
                return;
            }
            pending.set(None);
            task.await;
        }
        .boxed_local();
        self.pending.set(self.scheduler.schedule(delay_ms, wrapped));
    }

    pub fn cancel(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Scheduler, Task, TimerId};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Entry {
        due: u64,
        id: TimerId,
        task: Task,
    }

    #[derive(Default)]
    struct Clock {
        now: u64,
        next_id: i32,
        queue: Vec<Entry>,
    }

    /// Virtual-clock scheduler. Nothing runs until [`ManualScheduler::advance`].
    #[derive(Clone, Default)]
    pub(crate) struct ManualScheduler {
        clock: Rc<RefCell<Clock>>,
    }

    impl ManualScheduler {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn now(&self) -> u64 {
            self.clock.borrow().now
        }

        pub(crate) fn pending(&self) -> usize {
            self.clock.borrow().queue.len()
        }

        /// Move the clock forward, running every task that falls due (in due order) to completion.
        pub(crate) fn advance(&self, ms: u64) {
            let target = self.now() + ms;
            loop {
                let next = {
                    let mut clock = self.clock.borrow_mut();
                    let idx = clock
                        .queue
                        .iter()
                        .enumerate()
                        .filter(|(_, e)| e.due <= target)
                        .min_by_key(|(_, e)| (e.due, e.id.0))
                        .map(|(i, _)| i);
                    idx.map(|i| {
                        let entry = clock.queue.remove(i);
                        clock.now = entry.due;
                        entry.task
                    })
                };
                match next {
                    Some(task) => futures::executor::block_on(task),
                    None => break,
                }
            }
            self.clock.borrow_mut().now = target;
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&self, delay_ms: u32, task: Task) -> Option<TimerId> {
            let mut clock = self.clock.borrow_mut();
            clock.next_id += 1;
            let id = TimerId(clock.next_id);
            let due = clock.now + u64::from(delay_ms);
            clock.queue.push(Entry { due, id, task });
            Some(id)
        }

        fn cancel(&self, id: TimerId) {
            self.clock.borrow_mut().queue.retain(|e| e.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualScheduler;
    use super::*;

    #[test]
    fn test_reschedule_supersedes_pending_task() {
        let clock = ManualScheduler::new();
        let debouncer = Debouncer::new(clock.clone());
        let fired = Rc::new(Cell::new(0u32));

        for i in 1..=5 {
            let fired = fired.clone();
            debouncer.reschedule(500, async move { fired.set(i) });
            clock.advance(100);
        }
        assert!(debouncer.is_pending());
        assert_eq!(fired.get(), 0);
        assert_eq!(clock.pending(), 1);

        clock.advance(500);
        assert_eq!(fired.get(), 5);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_cancel_drops_pending_task() {
        let clock = ManualScheduler::new();
        let debouncer = Debouncer::new(clock.clone());
        let fired = Rc::new(Cell::new(false));

        let f = fired.clone();
        debouncer.reschedule(200, async move { f.set(true) });
        debouncer.cancel();
        clock.advance(1_000);

        assert!(!fired.get());
        assert!(!debouncer.is_pending());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_manual_scheduler_runs_tasks_in_due_order() {
        let clock = ManualScheduler::new();
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));

        for (delay, tag) in [(300, "c"), (100, "a"), (200, "b")] {
            let order = order.clone();
            clock.schedule(delay, async move { order.borrow_mut().push(tag) }.boxed_local());
        }
        clock.advance(250);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(clock.now(), 250);

        clock.advance(50);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }
}
