//! The form controller.
//!
//! A [`Form`] owns the authoritative state store, the field registry, the
//! update scheduler and the validation pipeline, and exposes the operations a
//! host calls: registering fields, writing and resetting values, errors and
//! touched flags, submitting, and the mount/unmount lifecycle.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use futures::{FutureExt, future::LocalBoxFuture};
use serde::de::DeserializeOwned;

use crate::{
    element::FieldKind,
    error::{FormError, PathError},
    options::FormOptions,
    path::{self, FieldPath},
    registry::{BindingDescriptor, FieldRegistry},
    scheduler::{Scheduler, UpdatePolicy},
    store::{Store, Subscription},
    validation::ValidationPipeline,
    value::Value,
};

/// The three parallel trees of a form.
#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Value::map(), Value::map(), Value::map())
    }
}

impl FormState {
    pub fn new(values: Value, errors: Value, touched: Value) -> Self {
        Self {
            values,
            errors,
            touched,
        }
    }

    pub fn with_values(&self, values: Value) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }

    pub fn with_errors(&self, errors: Value) -> Self {
        Self {
            errors,
            ..self.clone()
        }
    }

    pub fn with_touched(&self, touched: Value) -> Self {
        Self {
            touched,
            ..self.clone()
        }
    }
}

/// An immutable state as handed to renderers.
pub type Snapshot = Rc<FormState>;

/// The reset baseline, captured once when the form is built.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialState {
    pub values: Value,
    pub errors: Value,
    pub touched: Value,
}

impl InitialState {
    fn to_state(&self) -> FormState {
        FormState::new(
            self.values.clone(),
            self.errors.clone(),
            self.touched.clone(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormPhase {
    Idle,
    Validating,
    Resetting,
    TornDown,
}

/// How a submit ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Valid,
    Invalid,
    /// The form was unmounted before validation finished. The handler did not
    /// run and nothing was written.
    TornDown,
}

/// Which elements to re-sync after a controller write.
enum Resync<'a> {
    None,
    All,
    Under(&'a FieldPath),
}

/// Marks the form as validating until dropped, including when the future
/// holding it is dropped mid-run.
struct ValidationRun<'a>(&'a Cell<usize>);

impl<'a> ValidationRun<'a> {
    fn start(count: &'a Cell<usize>) -> Self {
        count.set(count.get() + 1);
        Self(count)
    }
}

impl Drop for ValidationRun<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

struct FormInner {
    initial: InitialState,
    store: Store<FormState>,
    registry: FieldRegistry,
    scheduler: Scheduler<Snapshot>,
    pipeline: ValidationPipeline,
    watch: Option<Rc<dyn Fn(&Value)>>,
    rendered: Store<FormState>,
    subscription: RefCell<Option<Subscription<FormState>>>,
    last_values: RefCell<Value>,
    validating: Cell<usize>,
    resetting: Cell<bool>,
    mounted: Cell<bool>,
    torn_down: Cell<bool>,
}

impl FormInner {
    fn is_live(&self, op: &'static str) -> bool {
        if self.torn_down.get() {
            tracing::debug!(op, "form is torn down, ignoring");
            return false;
        }
        true
    }

    fn on_commit(&self, snapshot: &Snapshot) {
        if self.torn_down.get() {
            return;
        }
        tracing::trace!("form state committed");

        let values_changed = !self.last_values.borrow().ptr_eq(&snapshot.values);
        if values_changed {
            *self.last_values.borrow_mut() = snapshot.values.clone();
            if let Some(watch) = &self.watch {
                watch(&snapshot.values);
                // A commit made by `watch` has already been scheduled.
                if !Rc::ptr_eq(&self.store.get(), snapshot) {
                    return;
                }
            }
        }
        self.scheduler.notify(snapshot.clone());
    }

    fn render(&self, snapshot: Snapshot) {
        if self.torn_down.get() {
            return;
        }
        if matches!(self.scheduler.policy(), UpdatePolicy::Debounced(_)) {
            let written = self.registry.reconcile(&snapshot.values);
            if written > 0 {
                tracing::trace!(written, "re-synced elements after debounce");
            }
        }
        self.rendered.set_shared(snapshot);
    }

    fn apply(&self, resync: Resync<'_>, producer: impl FnOnce(&FormState) -> FormState) {
        self.store.update(producer);
        match resync {
            Resync::None => {}
            Resync::All => self.registry.sync_all(&self.store.get().values),
            Resync::Under(path) => self.registry.sync_under(path, &self.store.get().values),
        }
        self.scheduler.checkpoint();
    }

    fn registered_touched(&self, base: &Value, flag: impl Fn(&FieldPath) -> Value) -> Value {
        self.registry
            .paths()
            .iter()
            .fold(base.clone(), |touched, path| {
                path::set(&touched, path, flag(path))
            })
    }
}

/// A form instance. Cloning gives another handle to the same form.
///
/// ```rust
/// use floem_form::{FieldKind, Form, FormOptions, Value};
/// use serde_json::json;
///
/// let form = Form::new(FormOptions::new().initial_values(json!({ "name": "" })));
/// form.register("name", FieldKind::Text).unwrap();
/// form.set_field_value("name", "Ada").unwrap();
/// assert_eq!(form.values().lookup("name"), Some(&Value::from("Ada")));
///
/// form.reset_form();
/// assert_eq!(form.values().lookup("name"), Some(&Value::from("")));
/// ```
#[derive(Clone)]
pub struct Form {
    inner: Rc<FormInner>,
}

impl Form {
    pub fn new(mut options: FormOptions) -> Self {
        let mode = options.take_mode();
        let policy = mode.policy();
        let initial = InitialState {
            values: options.initial_values,
            errors: options.initial_errors,
            touched: options.initial_touched,
        };
        let state = initial.to_state();

        let inner = Rc::new_cyclic(|weak: &Weak<FormInner>| {
            let owner = weak.clone();
            let scheduler = Scheduler::from_mode(mode, move |snapshot: Snapshot| {
                if let Some(inner) = owner.upgrade() {
                    inner.render(snapshot);
                }
            });
            FormInner {
                last_values: RefCell::new(state.values.clone()),
                rendered: Store::new(state.clone()),
                store: Store::new(state),
                initial,
                registry: FieldRegistry::new(),
                scheduler,
                pipeline: ValidationPipeline::new(options.schema),
                watch: options.watch,
                subscription: RefCell::new(None),
                validating: Cell::new(0),
                resetting: Cell::new(false),
                mounted: Cell::new(false),
                torn_down: Cell::new(false),
            }
        });

        let owner = Rc::downgrade(&inner);
        let subscription = inner.store.subscribe(move |snapshot| {
            if let Some(inner) = owner.upgrade() {
                inner.on_commit(snapshot);
            }
        });
        *inner.subscription.borrow_mut() = Some(subscription);

        tracing::debug!(?policy, "form created");
        Self { inner }
    }

    pub fn initial(&self) -> &InitialState {
        &self.inner.initial
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.inner.scheduler.policy()
    }

    pub fn phase(&self) -> FormPhase {
        let inner = &self.inner;
        if inner.torn_down.get() {
            FormPhase::TornDown
        } else if inner.resetting.get() {
            FormPhase::Resetting
        } else if inner.validating.get() > 0 {
            FormPhase::Validating
        } else {
            FormPhase::Idle
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// The authoritative state, including changes not yet rendered.
    pub fn state(&self) -> Snapshot {
        self.inner.store.get()
    }

    /// The last snapshot the update policy let through.
    pub fn rendered(&self) -> Snapshot {
        self.inner.rendered.get()
    }

    /// Called with every snapshot the update policy lets through.
    pub fn on_render(&self, f: impl Fn(&Snapshot) + 'static) -> Subscription<FormState> {
        self.inner.rendered.subscribe(f)
    }

    pub fn values(&self) -> Value {
        self.state().values.clone()
    }

    pub fn errors(&self) -> Value {
        self.state().errors.clone()
    }

    pub fn touched(&self) -> Value {
        self.state().touched.clone()
    }

    /// The values tree read back into a typed host value.
    pub fn values_as<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        self.state().values.deserialize_into()
    }

    pub fn field(&self, path: &str) -> Option<Rc<BindingDescriptor>> {
        let path = FieldPath::parse(path).ok()?;
        self.inner.registry.get(&path)
    }

    pub fn registered_paths(&self) -> Vec<FieldPath> {
        self.inner.registry.paths()
    }

    /// Register a field and hand out its binding descriptor. The host attaches
    /// its element to [`BindingDescriptor::element_ref`] and then calls
    /// [`Form::bind_field`] or [`Form::mount`].
    ///
    /// A field with no value yet is stored as [`Value::Undefined`].
    pub fn register(
        &self,
        path: &str,
        kind: FieldKind,
    ) -> Result<Rc<BindingDescriptor>, PathError> {
        let path = FieldPath::parse(path)?;
        let inner = &self.inner;
        if !inner.is_live("register") {
            return Ok(BindingDescriptor::detached(path, kind));
        }

        let descriptor = inner.registry.register(path.clone(), kind)?;
        if !path::has(&inner.store.get().values, &path) {
            inner
                .store
                .update(|state| state.with_values(path::set(&state.values, &path, Value::Undefined)));
        }
        Ok(descriptor)
    }

    /// Push the current value onto the descriptor's element and start
    /// listening to it. Returns `false` when there is no live element.
    pub fn bind_field(&self, descriptor: &Rc<BindingDescriptor>) -> bool {
        let inner = &self.inner;
        if !inner.is_live("bind_field") {
            return false;
        }
        let values = inner.store.get().values.clone();
        descriptor.sync(&path::get(&values, descriptor.path()).cloned().unwrap_or_default());
        inner.registry.bind(descriptor, &inner.store)
    }

    pub fn unbind_field(&self, descriptor: &BindingDescriptor) {
        self.inner.registry.unbind(descriptor);
    }

    /// Sync every attached element with the current values and bind it.
    pub fn mount(&self) {
        let inner = &self.inner;
        if !inner.is_live("mount") {
            return;
        }
        inner.mounted.set(true);
        inner.registry.sync_all(&inner.store.get().values);
        let bound = inner.registry.bind_all(&inner.store);
        tracing::debug!(bound, fields = inner.registry.len(), "form mounted");
    }

    /// Tear the form down: clear the debounce timer, stop listening to the
    /// store and unbind every field. Every later operation is a no-op.
    pub fn unmount(&self) {
        let inner = &self.inner;
        if !inner.is_live("unmount") {
            return;
        }
        inner.scheduler.cancel();
        if let Some(subscription) = inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        inner.registry.clear();
        inner.mounted.set(false);
        inner.torn_down.set(true);
        tracing::debug!("form unmounted");
    }

    pub fn set_form(&self, state: FormState) {
        if self.inner.is_live("set_form") {
            self.inner.apply(Resync::All, |_| state);
        }
    }

    pub fn update_form(&self, f: impl FnOnce(&FormState) -> FormState) {
        if self.inner.is_live("update_form") {
            self.inner.apply(Resync::All, f);
        }
    }

    /// Restore all three trees to the initial state.
    pub fn reset_form(&self) {
        let inner = &self.inner;
        if !inner.is_live("reset_form") {
            return;
        }
        inner.resetting.set(true);
        inner.apply(Resync::All, |_| inner.initial.to_state());
        inner.resetting.set(false);
    }

    pub fn set_fields_value(&self, values: impl Into<Value>) {
        let values = values.into();
        if self.inner.is_live("set_fields_value") {
            self.inner.apply(Resync::All, |state| state.with_values(values));
        }
    }

    pub fn update_fields_value(&self, f: impl FnOnce(&Value) -> Value) {
        if self.inner.is_live("update_fields_value") {
            self.inner
                .apply(Resync::All, |state| state.with_values(f(&state.values)));
        }
    }

    pub fn set_field_value(&self, path: &str, value: impl Into<Value>) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        let value = value.into();
        if self.inner.is_live("set_field_value") {
            self.inner.apply(Resync::Under(&path), |state| {
                state.with_values(path::set(&state.values, &path, value))
            });
        }
        Ok(())
    }

    pub fn reset_fields_value(&self) {
        let inner = &self.inner;
        if inner.is_live("reset_fields_value") {
            inner.apply(Resync::All, |state| {
                state.with_values(inner.initial.values.clone())
            });
        }
    }

    /// Restore one value from the initial values, or `Undefined` when it had
    /// none.
    pub fn reset_field_value(&self, path: &str) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        let inner = &self.inner;
        if inner.is_live("reset_field_value") {
            let initial = path::get(&inner.initial.values, &path)
                .cloned()
                .unwrap_or_default();
            inner.apply(Resync::Under(&path), |state| {
                state.with_values(path::set(&state.values, &path, initial))
            });
        }
        Ok(())
    }

    pub fn set_fields_touched(&self, touched: impl Into<Value>) {
        let touched = touched.into();
        if self.inner.is_live("set_fields_touched") {
            self.inner
                .apply(Resync::None, |state| state.with_touched(touched));
        }
    }

    pub fn update_fields_touched(&self, f: impl FnOnce(&Value) -> Value) {
        if self.inner.is_live("update_fields_touched") {
            self.inner
                .apply(Resync::None, |state| state.with_touched(f(&state.touched)));
        }
    }

    pub fn set_field_touched(&self, path: &str, touched: bool) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        if self.inner.is_live("set_field_touched") {
            self.inner.apply(Resync::None, |state| {
                state.with_touched(path::set(&state.touched, &path, Value::Bool(touched)))
            });
        }
        Ok(())
    }

    /// Restore the initial touched tree, with every registered field that
    /// has no initial flag set to `false`.
    pub fn reset_fields_touched(&self) {
        let inner = &self.inner;
        if !inner.is_live("reset_fields_touched") {
            return;
        }
        let initial = &inner.initial.touched;
        let touched = inner.registered_touched(initial, |path| {
            path::get(initial, path)
                .cloned()
                .unwrap_or(Value::Bool(false))
        });
        inner.apply(Resync::None, |state| state.with_touched(touched));
    }

    pub fn reset_field_touched(&self, path: &str) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        let inner = &self.inner;
        if inner.is_live("reset_field_touched") {
            let initial = path::get(&inner.initial.touched, &path)
                .cloned()
                .unwrap_or(Value::Bool(false));
            inner.apply(Resync::None, |state| {
                state.with_touched(path::set(&state.touched, &path, initial))
            });
        }
        Ok(())
    }

    pub fn set_fields_error(&self, errors: impl Into<Value>) {
        let errors = errors.into();
        if self.inner.is_live("set_fields_error") {
            self.inner.apply(Resync::None, |state| state.with_errors(errors));
        }
    }

    pub fn update_fields_error(&self, f: impl FnOnce(&Value) -> Value) {
        if self.inner.is_live("update_fields_error") {
            self.inner
                .apply(Resync::None, |state| state.with_errors(f(&state.errors)));
        }
    }

    pub fn set_field_error(&self, path: &str, message: impl Into<Value>) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        let message = message.into();
        if self.inner.is_live("set_field_error") {
            self.inner.apply(Resync::None, |state| {
                state.with_errors(path::set(&state.errors, &path, message))
            });
        }
        Ok(())
    }

    pub fn reset_fields_error(&self) {
        let inner = &self.inner;
        if inner.is_live("reset_fields_error") {
            inner.apply(Resync::None, |state| {
                state.with_errors(inner.initial.errors.clone())
            });
        }
    }

    pub fn reset_field_error(&self, path: &str) -> Result<(), PathError> {
        let path = FieldPath::parse(path)?;
        let inner = &self.inner;
        if inner.is_live("reset_field_error") {
            let initial = path::get(&inner.initial.errors, &path)
                .cloned()
                .unwrap_or_default();
            inner.apply(Resync::None, |state| {
                state.with_errors(path::set(&state.errors, &path, initial))
            });
        }
        Ok(())
    }

    /// Validate the current values and write the resulting errors.
    ///
    /// Resolves to whether the values were valid. Resolves to `false` without
    /// writing anything when the form is torn down before or during the run.
    pub fn validate(&self) -> LocalBoxFuture<'static, bool> {
        let form = self.clone();
        async move {
            let inner = &form.inner;
            if !inner.is_live("validate") {
                return false;
            }
            let values = inner.store.get().values.clone();
            let run = ValidationRun::start(&inner.validating);
            let outcome = inner.pipeline.validate(&values).await;
            drop(run);
            if !inner.is_live("validate") {
                return false;
            }
            inner.apply(Resync::None, |state| state.with_errors(outcome.errors));
            outcome.is_valid
        }
        .boxed_local()
    }

    /// Validate and hand the values to `handler` with their validity.
    ///
    /// The values that are validated and passed to `handler` are the ones
    /// current when `submit` is called. Edits made while validation runs are
    /// kept; only `errors` and `touched` are written when it finishes, and
    /// every registered field is marked touched whatever the outcome.
    pub fn submit(
        &self,
        handler: impl FnOnce(&Value, bool) + 'static,
    ) -> LocalBoxFuture<'static, SubmitOutcome> {
        let form = self.clone();
        async move {
            let inner = &form.inner;
            if !inner.is_live("submit") {
                return SubmitOutcome::TornDown;
            }
            inner.scheduler.checkpoint();
            let values = inner.store.get().values.clone();

            let run = ValidationRun::start(&inner.validating);
            let outcome = inner.pipeline.validate(&values).await;
            drop(run);
            if !inner.is_live("submit") {
                return SubmitOutcome::TornDown;
            }

            let touched = inner.registered_touched(&inner.store.get().touched, |_| Value::Bool(true));
            let is_valid = outcome.is_valid;
            inner.apply(Resync::None, |state| FormState {
                values: state.values.clone(),
                errors: outcome.errors,
                touched,
            });

            tracing::debug!(is_valid, "form submitted");
            handler(&values, is_valid);
            if is_valid {
                SubmitOutcome::Valid
            } else {
                SubmitOutcome::Invalid
            }
        }
        .boxed_local()
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("phase", &self.phase())
            .field("policy", &self.policy())
            .field("fields", &self.inner.registry.len())
            .field("state", &self.state())
            .finish()
    }
}
