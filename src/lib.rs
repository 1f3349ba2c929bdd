//! # Floem Form
//! Floem Form keeps the state of an input form in one place and keeps host-owned input elements
//! in step with it. Values, validation errors and touched flags live in three parallel trees that
//! are addressed by dot paths such as `address.0.city`.
//!
//! ## Example: Sign-up form
//! ```rust
//! use floem_form::prelude::*;
//! use futures::executor::block_on;
//! use serde_json::json;
//!
//! let form = Form::new(
//!     FormOptions::new()
//!         .initial_values(json!({ "email": "", "newsletter": false }))
//!         .validation_schema(|values: &Value| match values.lookup("email").and_then(Value::as_str) {
//!             Some(email) if email.contains('@') => Ok(()),
//!             _ => Err(ValidationError::single("email", "enter a valid email")),
//!         }),
//! );
//!
//! form.register("email", FieldKind::Text).unwrap();
//! form.register("newsletter", FieldKind::Checkbox).unwrap();
//!
//! let outcome = block_on(form.submit(|values, is_valid| {
//!     println!("submitted {values} valid={is_valid}");
//! }));
//! assert_eq!(outcome, SubmitOutcome::Invalid);
//! assert_eq!(form.errors().lookup("email"), Some(&Value::from("enter a valid email")));
//! assert_eq!(form.touched().lookup("email"), Some(&Value::Bool(true)));
//! ```
//!
//! ## State trees
//!
//! Every tree is a [`Value`]. Maps and lists are persistent collections, so writing one path
//! copies only the ancestors of that path and shares everything else with the previous tree.
//! The free functions in [`path`] read and write trees without ever mutating them:
//!
//! ```rust
//! use floem_form::{path, FieldPath, Value};
//! use serde_json::json;
//!
//! let before = Value::from(json!({ "name": "Ada", "address": { "city": "Oslo" } }));
//! let after = path::set(&before, &FieldPath::parse("name").unwrap(), Value::from("Grace"));
//!
//! let address = FieldPath::parse("address").unwrap();
//! assert!(path::get(&after, &address).unwrap().ptr_eq(path::get(&before, &address).unwrap()));
//! assert_eq!(before.lookup("name"), Some(&Value::from("Ada")));
//! ```
//!
//! [`Value::Undefined`] is a value of its own. A path holding `Undefined` is present, which is
//! different from a path that was never written.
//!
//! ## Elements
//!
//! The form never creates input elements. The host implements [`Element`] for whatever it
//! renders and attaches it to the [`ElementRef`] of the descriptor returned by
//! [`Form::register`]. After [`Form::mount`] (or [`Form::bind_field`]) user edits flow into the
//! store, and controller writes such as [`Form::set_field_value`] or [`Form::reset_form`] flow
//! back onto the elements without firing their listeners.
//!
//! ## Rendering
//!
//! [`Form::state`] is always current. [`Form::rendered`] is what the update policy has let
//! through so far:
//!
//! - [`FormOptions::controlled`] forwards every change as it happens.
//! - [`FormOptions::debounced`] forwards only the last change once the window passes quietly.
//! - Otherwise changes are forwarded at controller calls and around submit.
//!
//! Subscribe with [`Form::on_render`] to redraw from the forwarded snapshots.
//!
//! ## Validation
//!
//! A [`Schema`] checks the whole values tree and reports every issue it finds. Issue paths may
//! use bracket notation (`friends[0].name`); they are folded into the errors tree in order, so
//! a later issue for the same field replaces an earlier one.

pub mod element;
pub mod error;
pub mod form;
pub mod options;
pub mod path;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod validation;
pub mod value;

pub use element::{Element, ElementEvent, ElementRef, EventKind, FieldKind, Listener, ListenerId};
pub use error::{FormError, PathError};
pub use form::{Form, FormPhase, FormState, InitialState, Snapshot, SubmitOutcome};
pub use options::FormOptions;
pub use path::{FieldPath, Segment};
pub use registry::{BindingDescriptor, FieldRegistry};
pub use scheduler::{Scheduler, UpdatePolicy};
pub use store::{Store, Subscription, WeakStore};
pub use timer::{ManualTimers, TimerToken, Timers};
pub use validation::{Schema, ValidateOptions, ValidationError, ValidationIssue};
pub use value::{FileList, Value};

pub mod prelude {
    pub use crate::element::{Element, ElementRef, EventKind, FieldKind};
    pub use crate::validation::{Schema, ValidationError, ValidationIssue};
    pub use crate::{Form, FormOptions, FormState, SubmitOutcome, Value};
}
