//! Timer source used for debounced updates.
//!
//! The engine never sleeps or spawns. It asks a [`Timers`] implementation to
//! run a callback after a delay and cancels that request by token. Hosts plug
//! in their event loop; [`ManualTimers`] drives a virtual clock for tests and
//! headless use.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Identifies one timer request so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Tokens are unique per process and increase with each request.
    pub fn next() -> TimerToken {
        static TIMER_COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerToken(TIMER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub type TimerAction = Box<dyn FnOnce(TimerToken)>;

/// Something that can run a callback later, on the same thread.
pub trait Timers {
    /// Schedule `action` to run once after `delay`.
    fn request_timer(&self, delay: Duration, action: TimerAction) -> TimerToken;

    /// Drop a pending timer. Unknown or already fired tokens are ignored.
    fn cancel_timer(&self, token: TimerToken);
}

struct Timer {
    action: TimerAction,
    deadline: Duration,
}

/// A [`Timers`] implementation on a virtual clock that only moves when told to.
///
/// ```rust
/// use std::{cell::Cell, rc::Rc, time::Duration};
/// use floem_form::timer::{ManualTimers, Timers};
///
/// let timers = ManualTimers::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = fired.clone();
/// timers.request_timer(Duration::from_millis(50), Box::new(move |_| flag.set(true)));
///
/// timers.advance(Duration::from_millis(49));
/// assert!(!fired.get());
/// timers.advance(Duration::from_millis(1));
/// assert!(fired.get());
/// ```
#[derive(Default)]
pub struct ManualTimers {
    now: Cell<Duration>,
    timers: RefCell<HashMap<TimerToken, Timer>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Move the clock forward by `by`, firing every timer that comes due on
    /// the way in deadline order. Timers requested by a firing callback run in
    /// the same call if their deadline is also reached.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some((token, timer)) = self.take_next_due(target) {
            self.now.set(timer.deadline.max(self.now.get()));
            (timer.action)(token);
        }
        self.now.set(target);
    }

    /// Fire every pending timer, however far away its deadline is.
    pub fn run_all(&self) {
        let last = self
            .timers
            .borrow()
            .values()
            .map(|timer| timer.deadline)
            .max();
        if let Some(last) = last {
            self.advance(last.saturating_sub(self.now.get()));
        }
    }

    fn take_next_due(&self, target: Duration) -> Option<(TimerToken, Timer)> {
        let mut timers = self.timers.borrow_mut();
        let token = timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= target)
            .min_by_key(|(token, timer)| (timer.deadline, **token))
            .map(|(token, _)| *token)?;
        timers.remove(&token).map(|timer| (token, timer))
    }
}

impl Timers for ManualTimers {
    fn request_timer(&self, delay: Duration, action: TimerAction) -> TimerToken {
        let token = TimerToken::next();
        let deadline = self.now.get() + delay;
        self.timers
            .borrow_mut()
            .insert(token, Timer { action, deadline });
        token
    }

    fn cancel_timer(&self, token: TimerToken) {
        self.timers.borrow_mut().remove(&token);
    }
}

impl fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimers")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}
