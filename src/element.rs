//! The contract between the form engine and host-owned input elements.
//!
//! The engine never creates elements. The host mounts something input-like,
//! implements [`Element`] for it and attaches it to the [`ElementRef`] handed
//! out at registration. The engine only keeps weak references, reads and
//! writes native properties, and attaches listeners by [`EventKind`].
//!
//! Property setters must not dispatch events: that is how programmatic
//! writes are told apart from user input.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::value::FileList;

/// Events the engine listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Every edit of a text-like element.
    Input,
    /// A committed change: toggles, selections, picked files.
    Change,
    /// Focus left the element.
    Blur,
}

/// How raw element values are coerced into form values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Checkbox,
    Radio,
    Date,
    File,
    Select,
}

impl FieldKind {
    /// Map an HTML-style `type` attribute. Unknown types are text.
    pub fn from_type_attr(ty: &str) -> Self {
        match ty.to_ascii_lowercase().as_str() {
            "number" | "range" => FieldKind::Number,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "date" | "datetime-local" | "month" | "week" | "time" => FieldKind::Date,
            "file" => FieldKind::File,
            "select" | "select-one" => FieldKind::Select,
            _ => FieldKind::Text,
        }
    }

    /// The event that carries a new value for this kind of field.
    pub fn value_event(self) -> EventKind {
        match self {
            FieldKind::Text | FieldKind::Number | FieldKind::Date => EventKind::Input,
            FieldKind::Checkbox | FieldKind::Radio | FieldKind::File | FieldKind::Select => {
                EventKind::Change
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ListenerId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An event delivered by the host to an attached listener.
#[derive(Clone)]
pub struct ElementEvent {
    pub kind: EventKind,
    /// The element the event originated from. For a radio group this is the
    /// option that was picked, not the group itself.
    pub target: Rc<dyn Element>,
}

impl fmt::Debug for ElementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementEvent")
            .field("kind", &self.kind)
            .field("value", &self.target.value())
            .field("checked", &self.target.checked())
            .finish()
    }
}

pub type Listener = Rc<dyn Fn(&ElementEvent)>;

/// A live, host-owned input element.
pub trait Element {
    fn value(&self) -> String;

    /// Write the native value property. Must not dispatch events.
    fn set_value(&self, value: &str);

    fn checked(&self) -> bool {
        false
    }

    /// Write the native checked property. Must not dispatch events.
    fn set_checked(&self, _checked: bool) {}

    fn files(&self) -> FileList {
        FileList::default()
    }

    /// The options of a radio group. Empty for single elements.
    fn options(&self) -> Vec<Rc<dyn Element>> {
        Vec::new()
    }

    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}

/// A weak handle to whatever element the host attached for a field.
///
/// Cloning shares the handle. [`ElementRef::current`] is `None` before the host
/// attaches an element and after that element is dropped.
#[derive(Clone, Default)]
pub struct ElementRef {
    current: Rc<RefCell<Option<Weak<dyn Element>>>>,
}

impl ElementRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<E: Element + 'static>(&self, element: &Rc<E>) {
        let element: Rc<dyn Element> = element.clone();
        *self.current.borrow_mut() = Some(Rc::downgrade(&element));
    }

    pub fn detach(&self) {
        *self.current.borrow_mut() = None;
    }

    pub fn current(&self) -> Option<Rc<dyn Element>> {
        self.current.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_attached(&self) -> bool {
        self.current().is_some()
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}
