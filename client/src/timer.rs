use std::time::Duration;

use gloo_timers::callback::Timeout;

use parcelmap_engine::scheduler::TimerBackend;

/// `setTimeout` through gloo. Dropping a `Timeout` clears it.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlooTimer;

impl TimerBackend for GlooTimer {
    type Handle = Timeout;

    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Timeout {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Timeout::new(millis, task)
    }

    fn clear_timeout(&self, handle: Timeout) {
        drop(handle);
    }
}
