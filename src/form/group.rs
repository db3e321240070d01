use std::collections::HashMap;
use std::ops::Deref;

use futures::channel::mpsc::UnboundedReceiver;
use indexmap::IndexMap;
use serde_json::Value;

use super::control::{Children, Control};
use super::error::{FormError, FormResult};
use super::events::{ChildKey, CollectionChange};
use super::options::{ControlOptions, ControlState, ResetOptions, UpdateOptions};

/// Children keyed by name; the value reduces to an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormGroup(pub(crate) Control);

impl FormGroup {
    pub fn new<I, K, C>(controls: I, options: ControlOptions) -> Self
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Control>,
    {
        let controls = controls
            .into_iter()
            .map(|(name, control)| (name.into(), control.into()))
            .collect::<IndexMap<String, Control>>();
        Self(Control::build(
            Children::Group(controls),
            Value::Object(Default::default()),
            options,
        ))
    }

    /// Resolves a dot-delimited path such as `address.lines.0`.
    pub fn control(&self, path: &str) -> FormResult<Control> {
        self.0.find(path)
    }

    pub fn controls(&self) -> Vec<(String, Control)> {
        self.0
            .children()
            .into_iter()
            .map(|(key, control)| (key.to_string(), control))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.child_controls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_all<I, K, C>(&self, controls: I)
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Control>,
    {
        self.add_all_with(controls, UpdateOptions::default());
    }

    /// Inserts named children; a name already in use replaces the previous child.
    pub fn add_all_with<I, K, C>(&self, controls: I, options: UpdateOptions)
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Control>,
    {
        let mut keys = Vec::new();
        for (name, control) in controls {
            let name = name.into();
            let control = control.into();
            if let Some(ChildKey::Name(current)) = self.0.key_of(&control)
                && current != name
            {
                self.0.release_child(&control);
            }
            control.attach_to(&self.0);
            let replaced = self.0.with_children_mut(|children| match children {
                Children::Group(map) => map.insert(name.clone(), control.clone()),
                _ => None,
            });
            if let Some(replaced) = replaced
                && !replaced.ptr_eq(&control)
            {
                replaced.detach();
                replaced.cancel_pending_work();
            }
            keys.push(ChildKey::Name(name));
        }
        self.0.update_value_and_validity_with(options);
        self.0.update_touched_with(options);
        self.0.update_pristine_with(options.update_parent);
        if options.emit_event {
            self.0
                .0
                .collection_changes
                .emit(CollectionChange::Added(keys));
        }
    }

    pub fn remove_control(&self, name: &str) -> FormResult<Control> {
        self.remove_control_with(name, UpdateOptions::default())
    }

    pub fn remove_control_with(&self, name: &str, options: UpdateOptions) -> FormResult<Control> {
        let removed = self.0.with_children_mut(|children| match children {
            Children::Group(map) => map.shift_remove(name),
            _ => None,
        });
        let removed = removed.ok_or_else(|| FormError::not_found(name))?;
        removed.detach();
        removed.cancel_pending_work();
        self.0.update_value_and_validity_with(options);
        self.0.update_touched_with(options);
        self.0.update_pristine_with(options.update_parent);
        if options.emit_event {
            self.0
                .0
                .collection_changes
                .emit(CollectionChange::Removed(vec![ChildKey::Name(name.to_string())]));
        }
        Ok(removed)
    }

    pub fn reset_state<I, K>(&self, state: I)
    where
        I: IntoIterator<Item = (K, ControlState)>,
        K: Into<String>,
    {
        self.reset_state_with(state, UpdateOptions::default());
    }

    /// Resets every child to its entry in `state` and recomputes this group once.
    ///
    /// Children without an entry are reset to `null` and keep their enabled flag.
    pub fn reset_state_with<I, K>(&self, state: I, options: UpdateOptions)
    where
        I: IntoIterator<Item = (K, ControlState)>,
        K: Into<String>,
    {
        let mut state = state
            .into_iter()
            .map(|(name, state)| (name.into(), state))
            .collect::<HashMap<String, ControlState>>();
        if state.is_empty() {
            self.0.reset_with(ResetOptions {
                update_parent: options.update_parent,
                emit_event: options.emit_event,
                ..ResetOptions::default()
            });
            return;
        }

        for (name, child) in self.controls() {
            let ControlState { value, disabled } = state.remove(&name).unwrap_or_default();
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
}

impl Deref for FormGroup {
    type Target = Control;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FormGroup> for Control {
    fn from(group: FormGroup) -> Self {
        group.0
    }
}
