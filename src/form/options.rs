use std::rc::Rc;
use std::time::Duration;

use futures::task::LocalSpawn;
use serde_json::Value;

use super::validation::{AsyncValidator, Validator};

/// Executor used to run debounced async validation.
pub type Spawner = Rc<dyn LocalSpawn>;

pub const DEFAULT_ASYNC_DEBOUNCE: Duration = Duration::from_millis(250);

/// Construction-time configuration shared by every control variant.
#[derive(Clone)]
pub struct ControlOptions {
    pub validators: Vec<Rc<dyn Validator>>,
    pub async_validators: Vec<Rc<dyn AsyncValidator>>,
    pub async_validators_debounce: Duration,
    pub disabled: bool,
    pub touched: bool,
    pub spawner: Option<Spawner>,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            async_validators: Vec::new(),
            async_validators_debounce: DEFAULT_ASYNC_DEBOUNCE,
            disabled: false,
            touched: false,
            spawner: None,
        }
    }
}

impl ControlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Rc::new(validator));
        self
    }

    pub fn with_async_validator(mut self, validator: impl AsyncValidator + 'static) -> Self {
        self.async_validators.push(Rc::new(validator));
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.async_validators_debounce = debounce;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_touched(mut self, touched: bool) -> Self {
        self.touched = touched;
        self
    }

    pub fn with_spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }
}

impl std::fmt::Debug for ControlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlOptions")
            .field("validators", &self.validators.len())
            .field("async_validators", &self.async_validators.len())
            .field("async_validators_debounce", &self.async_validators_debounce)
            .field("disabled", &self.disabled)
            .field("touched", &self.touched)
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}

/// Controls how far a single mutation travels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UpdateOptions {
    /// Continue the recomputation walk into the parent chain.
    pub update_parent: bool,
    /// Publish value/status/touch notifications for this step.
    pub emit_event: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            update_parent: true,
            emit_event: true,
        }
    }
}

impl UpdateOptions {
    /// Propagates to ancestors without publishing notifications.
    pub const fn silent() -> Self {
        Self {
            update_parent: true,
            emit_event: false,
        }
    }

    /// Publishes notifications but stops at this control.
    pub const fn local() -> Self {
        Self {
            update_parent: false,
            emit_event: true,
        }
    }

    pub const fn with_update_parent(mut self, update_parent: bool) -> Self {
        self.update_parent = update_parent;
        self
    }

    pub const fn with_emit_event(mut self, emit_event: bool) -> Self {
        self.emit_event = emit_event;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResetOptions {
    pub value: Value,
    /// `Some` applies a disable/enable transition after the value is set.
    pub disabled: Option<bool>,
    pub remove_focus: bool,
    pub update_parent: bool,
    pub emit_event: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            value: Value::Null,
            disabled: None,
            remove_focus: false,
            update_parent: true,
            emit_event: true,
        }
    }
}

impl ResetOptions {
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_remove_focus(mut self, remove_focus: bool) -> Self {
        self.remove_focus = remove_focus;
        self
    }

    pub(crate) fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            update_parent: self.update_parent,
            emit_event: self.emit_event,
        }
    }
}

/// Per-child reset target used by `reset_state`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlState {
    pub value: Value,
    pub disabled: Option<bool>,
}

impl ControlState {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            disabled: None,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }
}
