//! End-to-end tests driving a form through headless elements.
//!
//! These tests verify that:
//! - User edits reach the values tree with the right coercion per field kind
//! - Controller writes reach the elements without echoing back
//! - Submit folds schema issues into errors and touches every field
//! - Reset restores the initial trees

use floem_form_test::prelude::*;
use futures::executor::block_on;
use serde_json::json;

fn email_schema(values: &Value) -> Result<(), ValidationError> {
    match values.lookup("email").and_then(Value::as_str) {
        Some(email) if email.contains('@') => Ok(()),
        _ => Err(ValidationError::single("email", "email must contain @")),
    }
}

#[test]
fn test_typing_updates_values() {
    let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "name": "", "age": 0 })));
    let name = harness.field("name", MockInput::text(""));
    let age = harness.field("age", MockInput::number("0"));
    harness.form.mount();

    name.type_text("Ada");
    assert_eq!(harness.form.values().lookup("name"), Some(&Value::from("Ada")));

    age.type_text("36");
    assert_eq!(harness.form.values().lookup("age"), Some(&Value::from(36)));
}

#[test]
fn test_checkbox_change_sets_bool() {
    let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "subscribe": false })));
    let subscribe = harness.field("subscribe", MockInput::checkbox(false));
    harness.form.mount();

    subscribe.toggle(true);
    assert_eq!(
        harness.form.values().lookup("subscribe"),
        Some(&Value::Bool(true))
    );

    subscribe.toggle(false);
    assert_eq!(
        harness.form.values().lookup("subscribe"),
        Some(&Value::Bool(false))
    );
}

#[test]
fn test_radio_selection_syncs_the_group() {
    let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "color": "red" })));
    let color = harness.field("color", MockInput::radio_group(&["red", "blue"]));
    harness.form.mount();

    // Mount pushes the current value onto the options.
    assert_eq!(color.checked_options(), vec!["red"]);

    color.select_option("blue");
    assert_eq!(harness.form.values().lookup("color"), Some(&Value::from("blue")));
    assert!(!color.option("red").unwrap().checked());
    assert!(color.option("blue").unwrap().checked());
}

#[test]
fn test_submit_with_invalid_email() {
    let harness = FormHarness::new(
        FormOptions::new()
            .initial_values(json!({ "email": "", "name": "" }))
            .validation_schema(email_schema),
    );
    let email = harness.field("email", MockInput::text(""));
    harness.field("name", MockInput::text(""));
    harness.form.mount();

    email.type_text("not-an-email");

    let received = std::rc::Rc::new(std::cell::Cell::new(None));
    let sink = received.clone();
    let outcome = block_on(harness.form.submit(move |_, is_valid| sink.set(Some(is_valid))));

    assert_eq!(outcome, SubmitOutcome::Invalid);
    assert_eq!(received.get(), Some(false));

    let state = harness.form.state();
    let message = state.errors.lookup("email").and_then(Value::as_str).unwrap();
    assert!(!message.is_empty());
    assert_eq!(state.touched.lookup("email"), Some(&Value::Bool(true)));
    assert_eq!(state.touched.lookup("name"), Some(&Value::Bool(true)));

    // The failed submit is rendered right away.
    assert_eq!(harness.renders.last().unwrap().errors, state.errors);
}

#[test]
fn test_submit_with_valid_email_clears_errors() {
    let harness = FormHarness::new(
        FormOptions::new()
            .initial_values(json!({ "email": "" }))
            .initial_errors(json!({ "email": "stale" }))
            .validation_schema(email_schema),
    );
    let email = harness.field("email", MockInput::text(""));
    harness.form.mount();

    email.type_text("ada@example.com");
    let outcome = block_on(harness.form.submit(|values, is_valid| {
        assert!(is_valid);
        assert_eq!(values.lookup("email"), Some(&Value::from("ada@example.com")));
    }));

    assert_eq!(outcome, SubmitOutcome::Valid);
    assert_eq!(harness.form.errors(), Value::map());
}

#[test]
fn test_reset_form_restores_initial_state() {
    let harness = FormHarness::new(
        FormOptions::new()
            .initial_values(json!({ "name": "", "age": 0, "tags": ["a"] }))
            .initial_errors(json!({}))
            .initial_touched(json!({ "name": false })),
    );
    let name = harness.field("name", MockInput::text(""));
    let age = harness.field("age", MockInput::number("0"));
    harness.form.mount();

    name.type_text("Ada");
    name.blur();
    age.type_text("42");
    harness.form.set_field_value("tags.1", "b").unwrap();
    harness.form.set_field_error("age", "too old").unwrap();

    harness.form.reset_form();

    let initial = harness.form.initial().clone();
    let state = harness.form.state();
    assert_eq!(state.values, initial.values);
    assert_eq!(state.errors, initial.errors);
    assert_eq!(state.touched, initial.touched);
    assert!(state.values.ptr_eq(&initial.values));

    // Elements follow the reset.
    assert_eq!(name.value(), "");
    assert_eq!(age.value(), "0");
}

#[test]
fn test_set_field_value_does_not_echo() {
    let harness = FormHarness::new(FormOptions::new().controlled(true).initial_values(json!({ "name": "" })));
    let name = harness.field("name", MockInput::text(""));
    harness.form.mount();
    harness.renders.clear();

    harness.form.set_field_value("name", "Grace").unwrap();
    assert_eq!(name.value(), "Grace");
    // One commit, one render: the element write did not loop back.
    assert_eq!(harness.renders.count(), 1);
    assert_eq!(harness.form.values().lookup("name"), Some(&Value::from("Grace")));
}

#[test]
fn test_blur_marks_touched() {
    let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "name": "" })));
    let name = harness.field("name", MockInput::text(""));
    harness.form.mount();

    assert_eq!(harness.form.touched().lookup("name"), None);
    name.blur();
    assert_eq!(harness.form.touched().lookup("name"), Some(&Value::Bool(true)));
}

#[test]
fn test_number_field_rejects_garbage() {
    let harness = FormHarness::new(FormOptions::new().initial_values(json!({ "age": 30 })));
    let age = harness.field("age", MockInput::number(""));
    harness.form.mount();
    assert_eq!(age.value(), "30");

    age.type_text("31");
    age.type_text("thirty-one");
    assert_eq!(harness.form.values().lookup("age"), Some(&Value::from(31)));

    age.type_text("  ");
    assert_eq!(harness.form.values().lookup("age"), Some(&Value::Undefined));
}

#[test]
fn test_file_date_and_select_fields() {
    let harness = FormHarness::new(FormOptions::new());
    let avatar = harness.field("avatar", MockInput::file());
    let birthday = harness.field("birthday", MockInput::date(""));
    let country = harness.field("country", MockInput::select("no"));
    harness.form.mount();

    avatar.choose_files(&["/tmp/a.png", "/tmp/b.png"]);
    birthday.type_text("1815-12-10");
    country.change_text("uk");

    let values = harness.form.values();
    let files = values.lookup("avatar").and_then(Value::as_files).unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(values.lookup("birthday"), Some(&Value::from("1815-12-10")));
    assert_eq!(values.lookup("country"), Some(&Value::from("uk")));

    harness.form.reset_field_value("avatar").unwrap();
    assert!(avatar.files().is_empty());
}

#[test]
fn test_nested_paths_and_typed_values() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Address {
        city: String,
    }
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        addresses: Vec<Address>,
    }

    let harness = FormHarness::new(
        FormOptions::new().initial_values(json!({ "name": "", "addresses": [{ "city": "" }] })),
    );
    let name = harness.field("name", MockInput::text(""));
    let city = harness.field("addresses.0.city", MockInput::text(""));
    harness.form.mount();

    name.type_text("Ada");
    city.type_text("London");

    assert_eq!(
        harness.form.values_as::<Person>().unwrap(),
        Person {
            name: "Ada".into(),
            addresses: vec![Address {
                city: "London".into()
            }],
        }
    );
}
