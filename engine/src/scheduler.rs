use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// One-shot timers. The browser client implements this over
/// `gloo_timers::callback::Timeout`; tests use [`ManualTimer`].
pub trait TimerBackend {
    type Handle;

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Self::Handle;

    /// Cancel a timer. Called at most once per handle, possibly after it fired.
    fn clear_timeout(&self, handle: Self::Handle);
}

/// Trailing-edge debounce: every `schedule` call cancels the pending task and
/// starts the window again, so a burst runs once with its last closure.
pub struct RenderScheduler<T: TimerBackend> {
    inner: Rc<Inner<T>>,
}

struct Inner<T: TimerBackend> {
    timer: T,
    window: Duration,
    handle: RefCell<Option<T::Handle>>,
    /// Bumped on every schedule and cancel; a firing task whose generation is
    /// stale does nothing.
    generation: Cell<u64>,
    armed: Cell<bool>,
}

impl<T> RenderScheduler<T>
where
    T: TimerBackend + 'static,
{
    pub fn new(timer: T, window: Duration) -> Self {
        Self {
            inner: Rc::new(Inner {
                timer,
                window,
                handle: RefCell::new(None),
                generation: Cell::new(0),
                armed: Cell::new(false),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn is_pending(&self) -> bool {
        self.inner.armed.get()
    }

    pub fn schedule(&self, run: impl FnOnce() + 'static) {
        self.cancel();

        let generation = self.inner.generation.get();
        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        self.inner.armed.set(true);
        let handle = self.inner.timer.set_timeout(
            self.inner.window,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.generation.get() != generation || !inner.armed.get() {
                    return;
                }
                // The spent handle stays in the slot until the next schedule or
                // cancel; timers must not be dropped from inside their own callback.
                inner.armed.set(false);
                drop(inner);
                run();
            }),
        );
        *self.inner.handle.borrow_mut() = Some(handle);
    }

    pub fn cancel(&self) {
        self.inner
            .generation
            .set(self.inner.generation.get().wrapping_add(1));
        self.inner.armed.set(false);
        let handle = self.inner.handle.borrow_mut().take();
        if let Some(handle) = handle {
            self.inner.timer.clear_timeout(handle);
        }
    }
}

impl<T: TimerBackend> Drop for RenderScheduler<T> {
    fn drop(&mut self) {
        self.inner.armed.set(false);
        self.inner
            .generation
            .set(self.inner.generation.get().wrapping_add(1));
        if let Some(handle) = self.inner.handle.borrow_mut().take() {
            self.inner.timer.clear_timeout(handle);
        }
    }
}

impl<T: TimerBackend> fmt::Debug for RenderScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("window", &self.inner.window)
            .field("pending", &self.inner.armed.get())
            .finish()
    }
}

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct Clock {
    now: Duration,
    next_id: u64,
    tasks: BTreeMap<u64, (Duration, Task)>,
}

/// Deterministic fake clock. Clones share the same queue, so a test can keep
/// one and hand another to the code under test.
#[derive(Clone, Default)]
pub struct ManualTimer {
    clock: Rc<RefCell<Clock>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    /// Number of timers that have neither fired nor been cleared.
    pub fn pending(&self) -> usize {
        self.clock.borrow().tasks.len()
    }

    /// Move the clock forward, firing due timers in deadline order.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let next = {
                let clock = self.clock.borrow();
                clock
                    .tasks
                    .iter()
                    .filter(|(_, (due, _))| *due <= target)
                    .min_by_key(|(id, (due, _))| (*due, **id))
                    .map(|(id, _)| *id)
            };
            let Some(id) = next else {
                break;
            };
            let task = {
                let mut clock = self.clock.borrow_mut();
                let Some((due, task)) = clock.tasks.remove(&id) else {
                    break;
                };
                clock.now = due;
                task
            };
            task();
        }
        self.clock.borrow_mut().now = target;
    }
}

impl TimerBackend for ManualTimer {
    type Handle = u64;

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> u64 {
        let mut clock = self.clock.borrow_mut();
        clock.next_id += 1;
        let id = clock.next_id;
        let due = clock.now + delay;
        clock.tasks.insert(id, (due, task));
        id
    }

    fn clear_timeout(&self, handle: u64) {
        self.clock.borrow_mut().tasks.remove(&handle);
    }
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.borrow();
        f.debug_struct("ManualTimer")
            .field("now", &clock.now)
            .field("pending", &clock.tasks.len())
            .finish()
    }
}
