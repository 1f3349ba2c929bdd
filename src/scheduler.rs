//! Decides when store changes reach the render snapshot.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use crate::timer::{TimerToken, Timers};

/// How store notifications are forwarded to the render snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Forward every notification synchronously.
    Immediate,
    /// Keep the latest notification until [`Scheduler::checkpoint`].
    #[default]
    Deferred,
    /// Forward only the last notification once the window has passed without
    /// another one. Each notification restarts the window.
    Debounced(Duration),
}

/// A policy together with what it needs to run. Only debouncing needs a
/// timer source.
pub(crate) enum Mode {
    Immediate,
    Deferred,
    Debounced {
        window: Duration,
        timers: Rc<dyn Timers>,
    },
}

impl Mode {
    pub(crate) fn policy(&self) -> UpdatePolicy {
        match self {
            Mode::Immediate => UpdatePolicy::Immediate,
            Mode::Deferred => UpdatePolicy::Deferred,
            Mode::Debounced { window, .. } => UpdatePolicy::Debounced(*window),
        }
    }
}

struct SchedulerInner<S> {
    mode: Mode,
    forward: Box<dyn Fn(S)>,
    pending: RefCell<Option<S>>,
    timer: Cell<Option<TimerToken>>,
    cancelled: Cell<bool>,
}

impl<S: 'static> SchedulerInner<S> {
    fn forward_pending(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some(snapshot) = pending {
            (self.forward)(snapshot);
        }
    }

    fn fire(&self, token: TimerToken) {
        if self.cancelled.get() || self.timer.get() != Some(token) {
            tracing::trace!(?token, "ignoring stale debounce timer");
            return;
        }
        self.timer.set(None);
        self.forward_pending();
    }
}

/// Applies an [`UpdatePolicy`] between a store and whatever renders it.
pub struct Scheduler<S: 'static> {
    inner: Rc<SchedulerInner<S>>,
}

impl<S: 'static> Scheduler<S> {
    /// Forward every notification synchronously.
    pub fn immediate(forward: impl Fn(S) + 'static) -> Self {
        Self::from_mode(Mode::Immediate, forward)
    }

    /// Hold the latest notification until [`Scheduler::checkpoint`].
    pub fn deferred(forward: impl Fn(S) + 'static) -> Self {
        Self::from_mode(Mode::Deferred, forward)
    }

    /// Forward the last notification once `window` passes quietly, using
    /// `timers` to wait.
    pub fn debounced(
        window: Duration,
        timers: Rc<dyn Timers>,
        forward: impl Fn(S) + 'static,
    ) -> Self {
        Self::from_mode(Mode::Debounced { window, timers }, forward)
    }

    pub(crate) fn from_mode(mode: Mode, forward: impl Fn(S) + 'static) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                mode,
                forward: Box::new(forward),
                pending: RefCell::new(None),
                timer: Cell::new(None),
                cancelled: Cell::new(false),
            }),
        }
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.inner.mode.policy()
    }

    /// Feed a store notification through the policy.
    pub fn notify(&self, snapshot: S) {
        let inner = &self.inner;
        if inner.cancelled.get() {
            return;
        }
        match &inner.mode {
            Mode::Immediate => (inner.forward)(snapshot),
            Mode::Deferred => {
                *inner.pending.borrow_mut() = Some(snapshot);
            }
            Mode::Debounced { window, timers } => {
                *inner.pending.borrow_mut() = Some(snapshot);
                if let Some(token) = inner.timer.take() {
                    timers.cancel_timer(token);
                }
                let owner: Weak<SchedulerInner<S>> = Rc::downgrade(inner);
                let token = timers.request_timer(
                    *window,
                    Box::new(move |token| match owner.upgrade() {
                        Some(inner) => inner.fire(token),
                        None => tracing::trace!(?token, "debounce timer outlived its scheduler"),
                    }),
                );
                inner.timer.set(Some(token));
            }
        }
    }

    /// Forward whatever a deferred scheduler is holding. Other policies have
    /// nothing to do here.
    pub fn checkpoint(&self) {
        if matches!(self.inner.mode, Mode::Deferred) && !self.inner.cancelled.get() {
            self.inner.forward_pending();
        }
    }

    /// Whether a notification is waiting to be forwarded.
    pub fn has_pending(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// Drop anything pending, clear the debounce timer and ignore every later
    /// notification.
    pub fn cancel(&self) {
        let inner = &self.inner;
        inner.cancelled.set(true);
        if let (Some(token), Mode::Debounced { timers, .. }) = (inner.timer.take(), &inner.mode) {
            timers.cancel_timer(token);
        }
        inner.pending.borrow_mut().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }
}

impl<S: 'static> fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy())
            .field("pending", &self.has_pending())
            .field("cancelled", &self.inner.cancelled.get())
            .finish()
    }
}
