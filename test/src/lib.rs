//! Testing utilities for Floem Form.
//!
//! This crate provides headless input elements and trackers for driving a
//! [`Form`] without a UI.
//!
//! # Example
//!
//! ```rust
//! use floem_form_test::prelude::*;
//! use serde_json::json;
//!
//! let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "name": "" })));
//! let name = harness.field("name", MockInput::text(""));
//! harness.form.mount();
//!
//! name.type_text("Ada");
//! assert_eq!(harness.form.values().lookup("name"), Some(&Value::from("Ada")));
//! ```

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    path::PathBuf,
    rc::Rc,
    time::Duration,
};

use floem_form::{
    Element, ElementEvent, EventKind, FieldKind, FileList, Form, FormOptions, FormState,
    Listener, ListenerId, ManualTimers, Schema, Snapshot, Subscription, ValidateOptions,
    ValidationError, Value,
};
use futures::{FutureExt, channel::oneshot, future::LocalBoxFuture};

/// Prelude module for convenient imports in tests.
pub mod prelude {
    pub use super::{FormHarness, GatedSchema, MockInput, RenderTracker};
    pub use floem_form::prelude::*;
    pub use floem_form::{FieldPath, FormPhase, UpdatePolicy};
}

/// A headless input element.
///
/// Property writes made by the form are counted and never dispatch events.
/// The user-action methods (`type_text`, `toggle`, ...) change the element
/// and dispatch the event a real element would.
pub struct MockInput {
    kind: FieldKind,
    value: RefCell<String>,
    checked: Cell<bool>,
    files: RefCell<FileList>,
    options: RefCell<Vec<Rc<MockInput>>>,
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
    programmatic_writes: Cell<usize>,
}

impl MockInput {
    fn new(kind: FieldKind, value: &str) -> Self {
        Self {
            kind,
            value: RefCell::new(value.to_string()),
            checked: Cell::new(false),
            files: RefCell::new(FileList::default()),
            options: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            programmatic_writes: Cell::new(0),
        }
    }

    pub fn text(value: &str) -> Rc<Self> {
        Rc::new(Self::new(FieldKind::Text, value))
    }

    pub fn number(value: &str) -> Rc<Self> {
        Rc::new(Self::new(FieldKind::Number, value))
    }

    pub fn date(value: &str) -> Rc<Self> {
        Rc::new(Self::new(FieldKind::Date, value))
    }

    pub fn select(value: &str) -> Rc<Self> {
        Rc::new(Self::new(FieldKind::Select, value))
    }

    pub fn checkbox(checked: bool) -> Rc<Self> {
        let input = Self::new(FieldKind::Checkbox, "on");
        input.checked.set(checked);
        Rc::new(input)
    }

    pub fn file() -> Rc<Self> {
        Rc::new(Self::new(FieldKind::File, ""))
    }

    /// A radio group with one option per value. Listeners attach to the
    /// group; events carry the picked option as their target.
    pub fn radio_group(values: &[&str]) -> Rc<Self> {
        let group = Rc::new(Self::new(FieldKind::Radio, ""));
        let options = values
            .iter()
            .map(|value| Rc::new(Self::new(FieldKind::Radio, value)))
            .collect();
        *group.options.borrow_mut() = options;
        group
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The option of a radio group with the given value.
    pub fn option(&self, value: &str) -> Option<Rc<MockInput>> {
        self.options
            .borrow()
            .iter()
            .find(|option| *option.value.borrow() == value)
            .cloned()
    }

    /// Values of the checked options of a radio group.
    pub fn checked_options(&self) -> Vec<String> {
        self.options
            .borrow()
            .iter()
            .filter(|option| option.checked.get())
            .map(|option| option.value.borrow().clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// How many times the form wrote a native property.
    pub fn programmatic_writes(&self) -> usize {
        self.programmatic_writes.get()
    }

    fn dispatch(self: &Rc<Self>, kind: EventKind, target: Rc<MockInput>) {
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        let event = ElementEvent { kind, target };
        for listener in listeners {
            listener(&event);
        }
    }

    /// Replace the text and fire `Input`.
    pub fn type_text(self: &Rc<Self>, text: &str) {
        *self.value.borrow_mut() = text.to_string();
        self.dispatch(EventKind::Input, self.clone());
    }

    /// Replace the text and fire `Change`, like picking from a select.
    pub fn change_text(self: &Rc<Self>, text: &str) {
        *self.value.borrow_mut() = text.to_string();
        self.dispatch(EventKind::Change, self.clone());
    }

    pub fn toggle(self: &Rc<Self>, checked: bool) {
        self.checked.set(checked);
        self.dispatch(EventKind::Change, self.clone());
    }

    /// Check one option of a radio group. Like a browser that has not
    /// repainted yet, sibling options are left as they were.
    pub fn select_option(self: &Rc<Self>, value: &str) {
        let Some(option) = self.option(value) else {
            panic!("radio group has no option {value:?}");
        };
        option.checked.set(true);
        self.dispatch(EventKind::Change, option);
    }

    pub fn choose_files(self: &Rc<Self>, paths: &[&str]) {
        *self.files.borrow_mut() = FileList::new(paths.iter().map(PathBuf::from));
        self.dispatch(EventKind::Change, self.clone());
    }

    pub fn blur(self: &Rc<Self>) {
        self.dispatch(EventKind::Blur, self.clone());
    }
}

impl Element for MockInput {
    fn value(&self) -> String {
        self.value.borrow().clone()
    }

    fn set_value(&self, value: &str) {
        self.programmatic_writes.set(self.programmatic_writes.get() + 1);
        if self.kind == FieldKind::File && value.is_empty() {
            *self.files.borrow_mut() = FileList::default();
        }
        *self.value.borrow_mut() = value.to_string();
    }

    fn checked(&self) -> bool {
        self.checked.get()
    }

    fn set_checked(&self, checked: bool) {
        self.programmatic_writes.set(self.programmatic_writes.get() + 1);
        self.checked.set(checked);
    }

    fn files(&self) -> FileList {
        self.files.borrow().clone()
    }

    fn options(&self) -> Vec<Rc<dyn Element>> {
        self.options
            .borrow()
            .iter()
            .map(|option| option.clone() as Rc<dyn Element>)
            .collect()
    }

    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(i, _, _)| *i != id);
    }
}

/// Records every snapshot a form lets through to rendering.
#[derive(Clone)]
pub struct RenderTracker {
    snapshots: Rc<RefCell<Vec<Snapshot>>>,
    subscription: Rc<Subscription<FormState>>,
}

impl RenderTracker {
    pub fn attach(form: &Form) -> Self {
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let sink = snapshots.clone();
        let subscription = form.on_render(move |snapshot| sink.borrow_mut().push(snapshot.clone()));
        Self {
            snapshots,
            subscription: Rc::new(subscription),
        }
    }

    pub fn count(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.snapshots.borrow().last().cloned()
    }

    /// The rendered values trees, oldest first.
    pub fn values(&self) -> Vec<Value> {
        self.snapshots
            .borrow()
            .iter()
            .map(|snapshot| snapshot.values.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.snapshots.borrow_mut().clear();
    }

    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}

type Gate = oneshot::Sender<Result<(), ValidationError>>;

/// A schema whose checks stay pending until the test releases them.
///
/// Clones share their state, so a test can hand one clone to the form and
/// keep another to release checks and inspect what was validated.
#[derive(Clone, Default)]
pub struct GatedSchema {
    gates: Rc<RefCell<VecDeque<Gate>>>,
    seen: Rc<RefCell<Vec<Value>>>,
}

impl GatedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks started but not released yet.
    pub fn pending(&self) -> usize {
        self.gates.borrow().len()
    }

    /// The values trees every check was started with.
    pub fn seen(&self) -> Vec<Value> {
        self.seen.borrow().clone()
    }

    /// Finish the oldest pending check with `result`.
    pub fn release(&self, result: Result<(), ValidationError>) {
        let gate = self.gates.borrow_mut().pop_front();
        match gate {
            Some(gate) => {
                let _ = gate.send(result);
            }
            None => panic!("no validation is waiting to be released"),
        }
    }
}

impl Schema for GatedSchema {
    fn validate(
        &self,
        values: &Value,
        _options: ValidateOptions,
    ) -> LocalBoxFuture<'static, Result<(), ValidationError>> {
        let (gate, released) = oneshot::channel();
        self.gates.borrow_mut().push_back(gate);
        self.seen.borrow_mut().push(values.clone());
        async move { released.await.unwrap_or(Ok(())) }.boxed_local()
    }
}

/// A form on a manual clock with a render tracker attached.
pub struct FormHarness {
    pub form: Form,
    pub timers: Rc<ManualTimers>,
    pub renders: RenderTracker,
}

impl FormHarness {
    pub fn new(options: FormOptions) -> Self {
        Self::build(options, Rc::new(ManualTimers::new()))
    }

    /// A harness whose form debounces renders by `millis` on the harness
    /// clock.
    pub fn debounced(options: FormOptions, millis: u64) -> Self {
        let timers = Rc::new(ManualTimers::new());
        let options = options.debounced(Duration::from_millis(millis), timers.clone());
        Self::build(options, timers)
    }

    fn build(options: FormOptions, timers: Rc<ManualTimers>) -> Self {
        let form = Form::new(options);
        let renders = RenderTracker::attach(&form);
        Self {
            form,
            timers,
            renders,
        }
    }

    /// Register `path` with the input's kind and attach the input. Binds
    /// right away when the form is already mounted.
    pub fn field(&self, path: &str, input: Rc<MockInput>) -> Rc<MockInput> {
        let descriptor = self
            .form
            .register(path, input.kind())
            .unwrap_or_else(|err| panic!("failed to register {path:?}: {err}"));
        descriptor.element_ref().attach(&input);
        if self.form.is_mounted() {
            self.form.bind_field(&descriptor);
        }
        input
    }

    pub fn advance(&self, millis: u64) {
        self.timers.advance(Duration::from_millis(millis));
    }
}
