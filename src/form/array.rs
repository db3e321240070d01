use std::ops::Deref;

use futures::channel::mpsc::UnboundedReceiver;
use serde_json::Value;

use super::control::{Children, Control, parse_index};
use super::error::{FormError, FormResult};
use super::events::{ChildKey, CollectionChange};
use super::options::{ControlOptions, ControlState, ResetOptions, UpdateOptions};

/// Children addressed by position; the value reduces to an array.
///
/// Positions shift on insert and removal. Setting a longer value grows the array with
/// new leaves; a shorter value never shrinks it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormArray(pub(crate) Control);

impl FormArray {
    pub fn new<I, C>(controls: I, options: ControlOptions) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Control>,
    {
        let controls = controls.into_iter().map(Into::into).collect::<Vec<_>>();
        Self(Control::build(
            Children::Array(controls),
            Value::Array(Vec::new()),
            options,
        ))
    }

    /// Resolves a dot-delimited path whose first segment is an index.
    pub fn control(&self, path: &str) -> FormResult<Control> {
        let first = path.split('.').next().unwrap_or_default();
        parse_index(first)?;
        self.0.find(path)
    }

    pub fn at(&self, index: usize) -> Option<Control> {
        self.0.child_controls().get(index).cloned()
    }

    pub fn controls(&self) -> Vec<Control> {
        self.0.child_controls()
    }

    pub fn len(&self) -> usize {
        self.0.child_controls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, index: usize, control: impl Into<Control>) {
        self.insert_with(index, control, UpdateOptions::default());
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert_with(&self, index: usize, control: impl Into<Control>, options: UpdateOptions) {
        let control = control.into();
        self.release_existing(&control);
        control.attach_to(&self.0);
        let index = self.0.with_children_mut(|children| match children {
            Children::Array(items) => {
                let index = index.min(items.len());
                items.insert(index, control);
                index
            }
            _ => index,
        });
        self.structure_changed(CollectionChange::Added(vec![ChildKey::Index(index)]), options);
    }

    pub fn add(&self, control: impl Into<Control>) {
        self.add_all(std::iter::once(control));
    }

    pub fn add_all<I, C>(&self, controls: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Control>,
    {
        self.add_all_with(controls, UpdateOptions::default());
    }

    pub fn add_all_with<I, C>(&self, controls: I, options: UpdateOptions)
    where
        I: IntoIterator<Item = C>,
        C: Into<Control>,
    {
        let mut keys = Vec::new();
        for control in controls {
            let control = control.into();
            self.release_existing(&control);
            control.attach_to(&self.0);
            let index = self.0.with_children_mut(|children| match children {
                Children::Array(items) => {
                    items.push(control);
                    items.len() - 1
                }
                _ => 0,
            });
            keys.push(ChildKey::Index(index));
        }
        self.structure_changed(CollectionChange::Added(keys), options);
    }

    pub fn remove_at(&self, index: usize) -> FormResult<Control> {
        self.remove_at_with(index, UpdateOptions::default())
    }

    pub fn remove_at_with(&self, index: usize, options: UpdateOptions) -> FormResult<Control> {
        let removed = self.0.with_children_mut(|children| match children {
            Children::Array(items) if index < items.len() => Some(items.remove(index)),
            _ => None,
        });
        let removed = removed.ok_or_else(|| FormError::not_found(index.to_string()))?;
        removed.detach();
        removed.cancel_pending_work();
        self.structure_changed(
            CollectionChange::Removed(vec![ChildKey::Index(index)]),
            options,
        );
        Ok(removed)
    }

    pub fn remove(&self, control: &Control) -> FormResult<()> {
        self.remove_with(control, UpdateOptions::default())
    }

    pub fn remove_with(&self, control: &Control, options: UpdateOptions) -> FormResult<()> {
        let index = self
            .0
            .child_controls()
            .iter()
            .position(|candidate| candidate.ptr_eq(control))
            .ok_or_else(|| FormError::not_found("<unknown control>"))?;
        self.remove_at_with(index, options).map(drop)
    }

    pub fn clear(&self) {
        self.clear_with(UpdateOptions::default());
    }

    pub fn clear_with(&self, options: UpdateOptions) {
        let removed = self.0.with_children_mut(|children| match children {
            Children::Array(items) => std::mem::take(items),
            _ => Vec::new(),
        });
        for control in &removed {
            control.detach();
            control.cancel_pending_work();
        }
        let keys = (0..removed.len()).map(ChildKey::Index).collect();
        self.structure_changed(CollectionChange::Removed(keys), options);
    }

    pub fn reset_state(&self, state: Vec<ControlState>) {
        self.reset_state_with(state, UpdateOptions::default());
    }

    /// Resets each child to the state at its index; children past the end reset to `null`.
    pub fn reset_state_with(&self, state: Vec<ControlState>, options: UpdateOptions) {
        if state.is_empty() {
            self.0.reset_with(ResetOptions {
                update_parent: options.update_parent,
                emit_event: options.emit_event,
                ..ResetOptions::default()
            });
            return;
        }

        let mut state = state.into_iter();
        for child in self.controls() {
            let ControlState { value, disabled } = state.next().unwrap_or_default();
            child.reset_with(ResetOptions {
                value,
                disabled,
                remove_focus: false,
                update_parent: false,
                emit_event: options.emit_event,
            });
        }
        self.0.update_pristine_with(options.update_parent);
        self.0.update_touched_with(options);
        self.0.update_value_and_validity_with(options);
    }

    pub fn collection_changes(&self) -> UnboundedReceiver<CollectionChange> {
        self.0.0.collection_changes.subscribe()
    }

    pub fn as_control(&self) -> &Control {
        &self.0
    }

    /// Takes `control` out of its current position when it already sits in this array.
    fn release_existing(&self, control: &Control) {
        if self.0.key_of(control).is_some() {
            self.0.release_child(control);
        }
    }

    fn structure_changed(&self, change: CollectionChange, options: UpdateOptions) {
        self.0.update_value_and_validity_with(options);
        self.0.update_touched_with(options);
        self.0.update_pristine_with(options.update_parent);
        if options.emit_event {
            self.0.0.collection_changes.emit(change);
        }
    }
}

impl Deref for FormArray {
    type Target = Control;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FormArray> for Control {
    fn from(array: FormArray) -> Self {
        array.0
    }
}
