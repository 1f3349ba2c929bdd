use std::{fmt, rc::Rc, time::Duration};

use crate::{
    scheduler::{Mode, UpdatePolicy},
    timer::Timers,
    validation::Schema,
    value::Value,
};

/// Configures a [`Form`](crate::Form).
///
/// ```rust
/// use std::{rc::Rc, time::Duration};
/// use floem_form::{FormOptions, ManualTimers, UpdatePolicy, Value};
/// use serde_json::json;
///
/// let timers = Rc::new(ManualTimers::new());
/// let options = FormOptions::new()
///     .initial_values(json!({ "name": "", "age": 0 }))
///     .debounced(Duration::from_millis(300), timers);
/// assert_eq!(options.policy(), UpdatePolicy::Debounced(Duration::from_millis(300)));
/// ```
pub struct FormOptions {
    pub(crate) initial_values: Value,
    pub(crate) initial_errors: Value,
    pub(crate) initial_touched: Value,
    pub(crate) controlled: bool,
    pub(crate) debounce: Option<(Duration, Rc<dyn Timers>)>,
    pub(crate) watch: Option<Rc<dyn Fn(&Value)>>,
    pub(crate) schema: Option<Rc<dyn Schema>>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            initial_values: Value::map(),
            initial_errors: Value::map(),
            initial_touched: Value::map(),
            controlled: false,
            debounce: None,
            watch: None,
            schema: None,
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_values(mut self, values: impl Into<Value>) -> Self {
        self.initial_values = values.into();
        self
    }

    pub fn initial_errors(mut self, errors: impl Into<Value>) -> Self {
        self.initial_errors = errors.into();
        self
    }

    pub fn initial_touched(mut self, touched: impl Into<Value>) -> Self {
        self.initial_touched = touched.into();
        self
    }

    /// Forward every change to the render snapshot as it happens.
    pub fn controlled(mut self, controlled: bool) -> Self {
        self.controlled = controlled;
        self
    }

    /// Coalesce changes within `window` into one render snapshot, waiting on
    /// `timers`. The host drives the timers, typically from its event loop.
    /// A zero window turns debouncing off.
    pub fn debounced(mut self, window: Duration, timers: Rc<dyn Timers>) -> Self {
        self.debounce = (!window.is_zero()).then_some((window, timers));
        self
    }

    /// Called with the new values tree whenever values change.
    pub fn watch(mut self, watch: impl Fn(&Value) + 'static) -> Self {
        self.watch = Some(Rc::new(watch));
        self
    }

    pub fn validation_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schema = Some(Rc::new(schema));
        self
    }

    /// The update policy these options select. `controlled` wins over
    /// `debounced`.
    pub fn policy(&self) -> UpdatePolicy {
        match (self.controlled, &self.debounce) {
            (true, _) => UpdatePolicy::Immediate,
            (false, Some((window, _))) => UpdatePolicy::Debounced(*window),
            (false, None) => UpdatePolicy::Deferred,
        }
    }

    pub(crate) fn take_mode(&mut self) -> Mode {
        match (self.controlled, self.debounce.take()) {
            (true, _) => Mode::Immediate,
            (false, Some((window, timers))) => Mode::Debounced { window, timers },
            (false, None) => Mode::Deferred,
        }
    }
}

impl fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOptions")
            .field("initial_values", &self.initial_values)
            .field("policy", &self.policy())
            .field("watch", &self.watch.is_some())
            .field("schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}
