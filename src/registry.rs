//! Field registry: one binding per field path, linking the path to a
//! host-owned element.
//!
//! Element events flow into the store through listeners attached by
//! [`FieldRegistry::bind`]. Store values flow back onto elements through the
//! `sync_*` methods, which write native properties directly and mute the
//! descriptor's own listener while doing so.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

use crate::{
    element::{Element, ElementEvent, ElementRef, EventKind, FieldKind, Listener, ListenerId},
    error::PathError,
    form::FormState,
    path::{self, FieldPath},
    store::Store,
    value::Value,
};

struct Attachment {
    element: Weak<dyn Element>,
    listeners: SmallVec<[ListenerId; 2]>,
}

/// The binding between one field path and its element.
pub struct BindingDescriptor {
    path: FieldPath,
    kind: FieldKind,
    element: ElementRef,
    attachment: RefCell<Option<Attachment>>,
    syncing: Cell<bool>,
}

impl BindingDescriptor {
    fn new(path: FieldPath, kind: FieldKind) -> Self {
        Self {
            path,
            kind,
            element: ElementRef::new(),
            attachment: RefCell::new(None),
            syncing: Cell::new(false),
        }
    }

    /// A descriptor that belongs to no registry and is never bound.
    pub(crate) fn detached(path: FieldPath, kind: FieldKind) -> Rc<Self> {
        Rc::new(Self::new(path, kind))
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The handle the host attaches its element to.
    pub fn element_ref(&self) -> &ElementRef {
        &self.element
    }

    /// Whether listeners are currently attached to an element.
    pub fn is_bound(&self) -> bool {
        self.attachment.borrow().is_some()
    }

    /// Whether the element is missing or already dropped.
    pub fn is_stale(&self) -> bool {
        !self.element.is_attached()
    }

    /// Attach listeners. Returns `false` when there is no live element yet.
    fn bind(self: &Rc<Self>, store: &Store<FormState>) -> bool {
        if self.is_bound() {
            return true;
        }
        let Some(element) = self.element.current() else {
            tracing::trace!(path = %self.path, "no element to bind yet");
            return false;
        };

        let descriptor = Rc::downgrade(self);
        let store = store.downgrade();
        let listener: Listener = Rc::new(move |event| {
            if let (Some(descriptor), Some(store)) = (descriptor.upgrade(), store.upgrade()) {
                descriptor.handle_event(&store, event);
            }
        });

        let mut listeners = SmallVec::new();
        listeners.push(element.add_listener(self.kind.value_event(), listener.clone()));
        listeners.push(element.add_listener(EventKind::Blur, listener));
        *self.attachment.borrow_mut() = Some(Attachment {
            element: Rc::downgrade(&element),
            listeners,
        });
        true
    }

    /// Detach listeners. Safe to call repeatedly and after the element is gone.
    fn unbind(&self) {
        let Some(attachment) = self.attachment.borrow_mut().take() else {
            return;
        };
        if let Some(element) = attachment.element.upgrade() {
            for id in attachment.listeners {
                element.remove_listener(id);
            }
        }
    }

    fn handle_event(&self, store: &Store<FormState>, event: &ElementEvent) {
        if self.syncing.get() {
            return;
        }

        if event.kind == EventKind::Blur {
            store.update(|state| {
                state.with_touched(path::set(&state.touched, &self.path, Value::Bool(true)))
            });
            return;
        }
        if event.kind != self.kind.value_event() {
            return;
        }

        let Some(value) = coerce(self.kind, &*event.target) else {
            tracing::trace!(
                path = %self.path,
                raw = %event.target.value(),
                "rejected element value, keeping the previous one"
            );
            return;
        };
        tracing::trace!(path = %self.path, %value, "element changed");
        store.update(|state| {
            state.with_values(path::set(&state.values, &self.path, value.clone()))
        });

        // Other options of the group may still show as checked.
        if self.kind == FieldKind::Radio {
            self.sync(&value);
        }
    }

    /// Push an authoritative value onto the element without triggering its
    /// listener. Does nothing when the element is gone.
    pub fn sync(&self, value: &Value) {
        let Some(element) = self.element.current() else {
            tracing::trace!(path = %self.path, "skipping write to a stale element");
            return;
        };
        self.syncing.set(true);
        write_element(self.kind, &element, value);
        self.syncing.set(false);
    }

    /// Whether the element already shows `value`. Missing elements count as
    /// up to date.
    pub fn reflects(&self, value: &Value) -> bool {
        let Some(element) = self.element.current() else {
            return true;
        };
        match self.kind {
            FieldKind::Checkbox => element.checked() == value.is_truthy(),
            FieldKind::Radio => radio_targets(&element)
                .iter()
                .all(|option| option.checked() == radio_selected(&**option, value)),
            FieldKind::File => !value.is_nullish() || element.files().is_empty(),
            FieldKind::Number => parse_number(&element.value()).as_ref() == Some(value),
            FieldKind::Text | FieldKind::Date | FieldKind::Select => {
                element.value() == value.to_display_string()
            }
        }
    }
}

impl fmt::Debug for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingDescriptor")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("bound", &self.is_bound())
            .field("stale", &self.is_stale())
            .finish()
    }
}

fn coerce(kind: FieldKind, target: &dyn Element) -> Option<Value> {
    match kind {
        FieldKind::Checkbox => Some(Value::Bool(target.checked())),
        FieldKind::Radio => target.checked().then(|| Value::from(target.value())),
        FieldKind::Number => parse_number(&target.value()),
        FieldKind::File => Some(Value::Files(target.files())),
        FieldKind::Text | FieldKind::Date | FieldKind::Select => Some(Value::from(target.value())),
    }
}

/// Empty text clears the field; anything that is not a finite number is
/// rejected.
fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Value::Undefined);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::Number)
}

fn radio_targets(element: &Rc<dyn Element>) -> Vec<Rc<dyn Element>> {
    let options = element.options();
    if options.is_empty() {
        vec![element.clone()]
    } else {
        options
    }
}

fn radio_selected(option: &dyn Element, value: &Value) -> bool {
    !value.is_nullish() && option.value() == value.to_display_string()
}

fn write_element(kind: FieldKind, element: &Rc<dyn Element>, value: &Value) {
    match kind {
        FieldKind::Checkbox => element.set_checked(value.is_truthy()),
        FieldKind::Radio => {
            for option in radio_targets(element) {
                option.set_checked(radio_selected(&*option, value));
            }
        }
        // Picked files cannot be written back, only cleared.
        FieldKind::File => {
            if value.is_nullish() {
                element.set_value("");
            }
        }
        FieldKind::Number | FieldKind::Text | FieldKind::Date | FieldKind::Select => {
            element.set_value(&value.to_display_string())
        }
    }
}

struct Entry {
    current: Rc<BindingDescriptor>,
    /// Replaced descriptors that stay bound until `current` binds.
    retired: Vec<Rc<BindingDescriptor>>,
}

/// All registered fields of one form, in registration order.
#[derive(Default)]
pub struct FieldRegistry {
    fields: RefCell<IndexMap<FieldPath, Entry, FxBuildHasher>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path`, replacing any earlier descriptor for the same path.
    ///
    /// A path that is an ancestor or a descendant of another registered path
    /// is rejected.
    pub fn register(
        &self,
        path: FieldPath,
        kind: FieldKind,
    ) -> Result<Rc<BindingDescriptor>, PathError> {
        let mut fields = self.fields.borrow_mut();
        if let Some(existing) = fields.keys().find(|p| **p != path && p.overlaps(&path)) {
            return Err(PathError::Overlaps {
                path: path.to_string(),
                existing: existing.to_string(),
            });
        }

        let descriptor = Rc::new(BindingDescriptor::new(path.clone(), kind));
        match fields.get_mut(&path) {
            Some(entry) => {
                let previous = std::mem::replace(&mut entry.current, descriptor.clone());
                if previous.is_bound() {
                    entry.retired.push(previous);
                }
                tracing::debug!(%path, ?kind, "re-registered field");
            }
            None => {
                tracing::debug!(%path, ?kind, "registered field");
                fields.insert(
                    path,
                    Entry {
                        current: descriptor.clone(),
                        retired: Vec::new(),
                    },
                );
            }
        }
        Ok(descriptor)
    }

    pub fn get(&self, path: &FieldPath) -> Option<Rc<BindingDescriptor>> {
        self.fields.borrow().get(path).map(|entry| entry.current.clone())
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    fn descriptors(&self) -> Vec<Rc<BindingDescriptor>> {
        self.fields
            .borrow()
            .values()
            .map(|entry| entry.current.clone())
            .collect()
    }

    /// Attach the descriptor's listeners so element events reach `store`.
    ///
    /// Once the new descriptor is attached, any descriptor it replaced for
    /// the same path is unbound.
    pub fn bind(&self, descriptor: &Rc<BindingDescriptor>, store: &Store<FormState>) -> bool {
        if !descriptor.bind(store) {
            return false;
        }
        let retired = self
            .fields
            .borrow_mut()
            .get_mut(descriptor.path())
            .filter(|entry| Rc::ptr_eq(&entry.current, descriptor))
            .map(|entry| std::mem::take(&mut entry.retired))
            .unwrap_or_default();
        for old in retired {
            old.unbind();
        }
        true
    }

    pub fn unbind(&self, descriptor: &BindingDescriptor) {
        descriptor.unbind();
    }

    /// Bind every registered field that has a live element. Returns how many
    /// fields are bound afterwards.
    pub fn bind_all(&self, store: &Store<FormState>) -> usize {
        self.descriptors()
            .iter()
            .filter(|descriptor| self.bind(descriptor, store))
            .count()
    }

    pub fn unbind_all(&self) {
        let descriptors: Vec<_> = self
            .fields
            .borrow()
            .values()
            .flat_map(|entry| std::iter::once(&entry.current).chain(&entry.retired))
            .cloned()
            .collect();
        for descriptor in descriptors {
            descriptor.unbind();
        }
    }

    /// Unbind everything and forget all fields.
    pub fn clear(&self) {
        self.unbind_all();
        self.fields.borrow_mut().clear();
    }

    /// Write `value` onto the element registered at exactly `path`.
    pub fn sync_to_element(&self, path: &FieldPath, value: &Value) {
        if let Some(descriptor) = self.get(path) {
            descriptor.sync(value);
        }
    }

    /// Re-sync every field at, above or below `prefix` from `values`.
    pub fn sync_under(&self, prefix: &FieldPath, values: &Value) {
        for descriptor in self.descriptors() {
            if descriptor.path().overlaps(prefix) {
                descriptor.sync(&value_at(values, descriptor.path()));
            }
        }
    }

    /// Re-sync every registered field from `values`.
    pub fn sync_all(&self, values: &Value) {
        for descriptor in self.descriptors() {
            descriptor.sync(&value_at(values, descriptor.path()));
        }
    }

    /// Re-sync only the fields whose element disagrees with `values`.
    /// Returns how many elements were written.
    pub fn reconcile(&self, values: &Value) -> usize {
        let mut written = 0;
        for descriptor in self.descriptors() {
            let value = value_at(values, descriptor.path());
            if !descriptor.reflects(&value) {
                descriptor.sync(&value);
                written += 1;
            }
        }
        written
    }
}

fn value_at(values: &Value, path: &FieldPath) -> Value {
    path::get(values, path).cloned().unwrap_or_default()
}
