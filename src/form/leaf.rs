use std::ops::Deref;

use futures::channel::mpsc::UnboundedReceiver;
use serde_json::Value;

use super::control::{Children, Control};
use super::options::ControlOptions;

/// A single editable value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormControl(pub(crate) Control);

impl FormControl {
    pub fn new(value: impl Into<Value>, options: ControlOptions) -> Self {
        Self(Control::build(Children::Leaf, value.into(), options))
    }

    pub fn empty() -> Self {
        Self::new(Value::Null, ControlOptions::default())
    }

    pub fn focus(&self) {
        self.0.set_focused(true);
    }

    pub fn unfocus(&self) {
        self.0.set_focused(false);
    }

    pub fn has_focus(&self) -> bool {
        self.0.focused()
    }

    pub fn focus_changes(&self) -> UnboundedReceiver<bool> {
        self.0.0.focus_changes.subscribe()
    }

    pub fn as_control(&self) -> &Control {
        &self.0
    }
}

impl Default for FormControl {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for FormControl {
    type Target = Control;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FormControl> for Control {
    fn from(control: FormControl) -> Self {
        control.0
    }
}
