//! End-to-end scenarios driven through the public prelude.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use formtree::form::BoxedValidationFuture;
use formtree::prelude::*;
use futures::executor::LocalPool;
use futures_timer::Delay;
use serde_json::json;

fn required(control: &Control) -> Option<ValidationErrors> {
    match control.value() {
        Value::String(text) if text.is_empty() => Some(validation_error("required", true)),
        Value::Null => Some(validation_error("required", true)),
        _ => None,
    }
}

fn leaf(value: Value) -> FormControl {
    FormControl::new(value, ControlOptions::default())
}

#[test]
fn required_name_gates_group_status() {
    let name = FormControl::new("", ControlOptions::new().with_validator(required));
    let form = FormGroup::new(
        [("name", name.clone()), ("age", leaf(json!(0)))],
        ControlOptions::default(),
    );

    assert_eq!(form.status(), ControlStatus::Invalid);
    assert_eq!(
        Value::Object(form.errors()),
        json!({"name": {"required": true}})
    );

    name.set_value("Ann");
    assert_eq!(form.status(), ControlStatus::Valid);
    assert!(form.errors().is_empty());
}

#[test]
fn remove_at_reindexes_and_notifies_once() {
    let array = FormArray::new([leaf(json!(1)), leaf(json!(2))], ControlOptions::default());
    let mut changes = array.collection_changes();

    array.remove_at(0).expect("index in range");

    assert_eq!(array.value(), json!([2]));
    assert_eq!(
        changes.try_next().ok().flatten(),
        Some(CollectionChange::Removed(vec![ChildKey::Index(0)]))
    );
    assert!(changes.try_next().is_err());
}

#[test]
fn debounced_async_validation_only_sees_the_latest_value() {
    let mut pool = LocalPool::new();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let recorded = calls.clone();
    let username = FormControl::new(
        "first",
        ControlOptions::new()
            .with_async_validator(move |control: &Control| -> BoxedValidationFuture {
                let value = control.value();
                let recorded = recorded.clone();
                Box::pin(async move {
                    recorded.borrow_mut().push(value.clone());
                    Ok::<_, anyhow::Error>(
                        (value == "second").then(|| validation_error("taken", true)),
                    )
                })
            })
            .with_debounce(Duration::from_millis(100))
            .with_spawner(pool.spawner()),
    );

    pool.run_until(Delay::new(Duration::from_millis(50)));
    username.set_value("second");
    assert!(username.pending());
    pool.run_until(Delay::new(Duration::from_millis(150)));

    assert_eq!(*calls.borrow(), vec![json!("second")]);
    assert_eq!(username.status(), ControlStatus::Invalid);
    assert!(username.has_error("taken", None));
}

#[test]
fn disabling_a_group_disables_children_and_clears_errors() {
    let first = FormControl::new("", ControlOptions::new().with_validator(required));
    let second = leaf(json!("filled"));
    let form = FormGroup::new(
        [("first", first.clone()), ("second", second.clone())],
        ControlOptions::default(),
    );
    assert!(form.invalid());

    form.mark_disabled();

    assert!(first.disabled());
    assert!(second.disabled());
    assert_eq!(form.status(), ControlStatus::Disabled);
    assert!(form.errors().is_empty());
}

#[test]
fn reset_state_restores_value_and_disabled_flag() {
    let a = leaf(json!(0));
    let form = FormGroup::new([("a", a.clone())], ControlOptions::default());
    a.set_value(42);
    a.mark_touched();
    assert!(form.dirty());
    assert!(form.touched());

    form.reset_state([("a", ControlState::new(1).disabled(true))]);

    assert_eq!(a.value(), json!(1));
    assert!(a.disabled());
    assert!(form.pristine());
    assert!(!form.touched());
}

#[test]
fn nested_paths_resolve_through_groups_and_arrays() {
    let street = leaf(json!("Main"));
    let lines = FormArray::new([street.clone()], ControlOptions::default());
    let address = FormGroup::new([("lines", lines)], ControlOptions::default());
    let form = FormGroup::new([("address", address)], ControlOptions::default());

    let found = form.control("address.lines.0").expect("path exists");
    assert_eq!(found, *street.as_control());
    assert_eq!(found.root(), *form.as_control());
    assert_eq!(
        form.control("address.street"),
        Err(FormError::ControlNotFound {
            path: "address.street".to_string()
        })
    );
}
