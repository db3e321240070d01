use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use futures::stream::FuturesUnordered;
use futures::task::LocalSpawnExt;
use futures_timer::Delay;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use super::array::FormArray;
use super::error::{FormError, FormResult};
use super::events::{ChildKey, CollectionChange, EventStream};
use super::group::FormGroup;
use super::leaf::FormControl;
use super::options::{ControlOptions, ResetOptions, Spawner, UpdateOptions};
use super::validation::{AsyncValidator, ValidationErrors, Validator, merge_errors};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlStatus {
    Valid,
    Invalid,
    Pending,
    Disabled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ControlKind {
    Leaf,
    Group,
    Array,
}

pub(crate) enum Children {
    Leaf,
    Group(IndexMap<String, Control>),
    Array(Vec<Control>),
}

impl Children {
    fn kind(&self) -> ControlKind {
        match self {
            Children::Leaf => ControlKind::Leaf,
            Children::Group(_) => ControlKind::Group,
            Children::Array(_) => ControlKind::Array,
        }
    }
}

struct ControlState {
    value: Value,
    status: ControlStatus,
    errors: ValidationErrors,
    touched: bool,
    pristine: bool,
    focused: bool,
    parent: Weak<ControlNode>,
    disposed: bool,
}

pub(crate) struct ControlNode {
    kind: ControlKind,
    state: RefCell<ControlState>,
    children: RefCell<Children>,
    validators: Vec<Rc<dyn Validator>>,
    async_validators: Vec<Rc<dyn AsyncValidator>>,
    debounce: Duration,
    spawner: Option<Spawner>,
    generation: Cell<u64>,
    async_run: RefCell<Option<AbortHandle>>,
    pub(crate) value_changes: EventStream<Value>,
    pub(crate) status_changes: EventStream<ControlStatus>,
    pub(crate) touch_changes: EventStream<bool>,
    pub(crate) focus_changes: EventStream<bool>,
    pub(crate) collection_changes: EventStream<CollectionChange>,
}

/// Shared handle to a node of the control tree.
///
/// Cloning the handle does not copy the control. A container owns its children; the
/// child's link back to its parent is weak and only used for upward propagation.
#[derive(Clone)]
pub struct Control(pub(crate) Rc<ControlNode>);

impl Control {
    pub(crate) fn build(children: Children, value: Value, options: ControlOptions) -> Self {
        let kind = children.kind();
        let ControlOptions {
            validators,
            async_validators,
            async_validators_debounce,
            disabled,
            touched,
            spawner,
        } = options;
        let leaf_disabled = disabled && kind == ControlKind::Leaf;

        let control = Self(Rc::new(ControlNode {
            kind,
            state: RefCell::new(ControlState {
                value,
                status: if leaf_disabled {
                    ControlStatus::Disabled
                } else {
                    ControlStatus::Valid
                },
                errors: ValidationErrors::new(),
                touched,
                pristine: true,
                focused: false,
                parent: Weak::new(),
                disposed: false,
            }),
            children: RefCell::new(children),
            validators,
            async_validators,
            debounce: async_validators_debounce,
            spawner,
            generation: Cell::new(0),
            async_run: RefCell::new(None),
            value_changes: EventStream::default(),
            status_changes: EventStream::default(),
            touch_changes: EventStream::default(),
            focus_changes: EventStream::default(),
            collection_changes: EventStream::default(),
        }));

        for child in control.child_controls() {
            child.attach_to(&control);
        }
        if kind != ControlKind::Leaf {
            let any_touched = control.any_child(Control::touched);
            let any_dirty = control.any_child(Control::dirty);
            let mut state = control.0.state.borrow_mut();
            state.touched = touched || any_touched;
            state.pristine = !any_dirty;
        }

        let quiet = UpdateOptions {
            update_parent: false,
            emit_event: false,
        };
        control.update_value_and_validity_with(quiet);
        if disabled && kind != ControlKind::Leaf {
            control.mark_disabled_with(quiet);
        }
        control
    }

    pub fn kind(&self) -> ControlKind {
        self.0.kind
    }

    pub fn as_leaf(&self) -> Option<FormControl> {
        (self.kind() == ControlKind::Leaf).then(|| FormControl(self.clone()))
    }

    pub fn as_group(&self) -> Option<FormGroup> {
        (self.kind() == ControlKind::Group).then(|| FormGroup(self.clone()))
    }

    pub fn as_array(&self) -> Option<FormArray> {
        (self.kind() == ControlKind::Array).then(|| FormArray(self.clone()))
    }

    /// Identity comparison: true when both handles point at the same node.
    pub fn ptr_eq(&self, other: &Control) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn value(&self) -> Value {
        self.0.state.borrow().value.clone()
    }

    /// Snapshot of the whole subtree, disabled children included.
    pub fn raw_value(&self) -> Value {
        match &*self.0.children.borrow() {
            Children::Leaf => self.value(),
            Children::Group(map) => Value::Object(
                map.iter()
                    .map(|(name, child)| (name.clone(), child.raw_value()))
                    .collect(),
            ),
            Children::Array(items) => Value::Array(items.iter().map(Control::raw_value).collect()),
        }
    }

    pub fn status(&self) -> ControlStatus {
        self.0.state.borrow().status
    }

    pub fn valid(&self) -> bool {
        self.status() == ControlStatus::Valid
    }

    pub fn invalid(&self) -> bool {
        self.status() == ControlStatus::Invalid
    }

    pub fn pending(&self) -> bool {
        self.status() == ControlStatus::Pending
    }

    pub fn disabled(&self) -> bool {
        self.status() == ControlStatus::Disabled
    }

    pub fn enabled(&self) -> bool {
        !self.disabled()
    }

    /// Own errors plus, for containers, one entry per enabled child with errors.
    ///
    /// The mapping is a copy; mutating it has no effect on the control.
    pub fn errors(&self) -> ValidationErrors {
        let mut errors = self.0.state.borrow().errors.clone();
        for (key, child) in self.children() {
            if !child.enabled() {
                continue;
            }
            let child_errors = child.errors();
            if !child_errors.is_empty() {
                errors.insert(key.to_string(), Value::Object(child_errors));
            }
        }
        errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// Looks up `code` on this control, or on the descendant at `path`.
    pub fn error(&self, code: &str, path: Option<&str>) -> Option<Value> {
        let target = match path {
            Some(path) => self.find(path).ok()?,
            None => self.clone(),
        };
        target.errors().get(code).cloned()
    }

    pub fn has_error(&self, code: &str, path: Option<&str>) -> bool {
        self.error(code, path).is_some()
    }

    pub fn touched(&self) -> bool {
        self.0.state.borrow().touched
    }

    pub fn pristine(&self) -> bool {
        self.0.state.borrow().pristine
    }

    pub fn dirty(&self) -> bool {
        !self.pristine()
    }

    pub fn is_disposed(&self) -> bool {
        self.0.state.borrow().disposed
    }

    pub fn parent(&self) -> Option<Control> {
        self.0.state.borrow().parent.upgrade().map(Control)
    }

    pub fn root(&self) -> Control {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn async_validators_debounce(&self) -> Duration {
        self.0.debounce
    }

    pub fn value_changes(&self) -> futures::channel::mpsc::UnboundedReceiver<Value> {
        self.0.value_changes.subscribe()
    }

    pub fn status_changes(&self) -> futures::channel::mpsc::UnboundedReceiver<ControlStatus> {
        self.0.status_changes.subscribe()
    }

    pub fn touch_changes(&self) -> futures::channel::mpsc::UnboundedReceiver<bool> {
        self.0.touch_changes.subscribe()
    }

    /// Resolves a dot-delimited path of names and indices below this control.
    pub fn find(&self, path: &str) -> FormResult<Control> {
        let mut current = self.clone();
        for segment in path.split('.') {
            current = current.child(segment).map_err(|error| match error {
                FormError::ControlNotFound { .. } => FormError::not_found(path),
                other => other,
            })?;
        }
        Ok(current)
    }

    /// True when `name` addresses a direct child of this control.
    pub fn contains(&self, name: &str) -> bool {
        self.child(name).is_ok()
    }

    fn child(&self, segment: &str) -> FormResult<Control> {
        match &*self.0.children.borrow() {
            Children::Leaf => Err(FormError::not_found(segment)),
            Children::Group(map) => map
                .get(segment)
                .cloned()
                .ok_or_else(|| FormError::not_found(segment)),
            Children::Array(items) => {
                let index = parse_index(segment)?;
                items
                    .get(index)
                    .cloned()
                    .ok_or_else(|| FormError::not_found(segment))
            }
        }
    }

    pub(crate) fn children(&self) -> Vec<(ChildKey, Control)> {
        match &*self.0.children.borrow() {
            Children::Leaf => Vec::new(),
            Children::Group(map) => map
                .iter()
                .map(|(name, child)| (ChildKey::Name(name.clone()), child.clone()))
                .collect(),
            Children::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, child)| (ChildKey::Index(index), child.clone()))
                .collect(),
        }
    }

    pub(crate) fn child_controls(&self) -> Vec<Control> {
        match &*self.0.children.borrow() {
            Children::Leaf => Vec::new(),
            Children::Group(map) => map.values().cloned().collect(),
            Children::Array(items) => items.clone(),
        }
    }

    pub(crate) fn with_children_mut<R>(&self, f: impl FnOnce(&mut Children) -> R) -> R {
        f(&mut self.0.children.borrow_mut())
    }

    fn any_child(&self, predicate: impl Fn(&Control) -> bool) -> bool {
        self.child_controls().iter().any(predicate)
    }

    /// Takes ownership of `self` on behalf of `parent`, releasing any previous owner first.
    pub(crate) fn attach_to(&self, parent: &Control) {
        if let Some(previous) = self.parent()
            && !previous.ptr_eq(parent)
        {
            previous.release_child(self);
        }
        self.0.state.borrow_mut().parent = Rc::downgrade(&parent.0);
    }

    pub(crate) fn detach(&self) {
        self.0.state.borrow_mut().parent = Weak::new();
    }

    /// Key under which `child` currently sits in this container.
    pub(crate) fn key_of(&self, child: &Control) -> Option<ChildKey> {
        self.children()
            .into_iter()
            .find_map(|(key, candidate)| candidate.ptr_eq(child).then_some(key))
    }

    pub(crate) fn release_child(&self, child: &Control) {
        let removed = self.with_children_mut(|children| match children {
            Children::Leaf => None,
            Children::Group(map) => {
                let name = map
                    .iter()
                    .find_map(|(name, candidate)| candidate.ptr_eq(child).then(|| name.clone()))?;
                map.shift_remove(&name);
                Some(ChildKey::Name(name))
            }
            Children::Array(items) => {
                let index = items.iter().position(|candidate| candidate.ptr_eq(child))?;
                items.remove(index);
                Some(ChildKey::Index(index))
            }
        });
        if let Some(key) = removed {
            debug!(child = %key, "released child for a move");
            self.update_value_and_validity();
            self.0
                .collection_changes
                .emit(CollectionChange::Removed(vec![key]));
        }
    }

    pub fn set_value(&self, value: impl Into<Value>) {
        self.set_value_with(value, UpdateOptions::default());
    }

    /// Stores a new value (leaf) or distributes slices of it to the children (containers).
    ///
    /// A value set through this path marks the affected controls dirty.
    pub fn set_value_with(&self, value: impl Into<Value>, options: UpdateOptions) {
        self.apply_value(value.into(), options, true);
    }

    pub fn patch_value(&self, value: impl Into<Value>) {
        self.patch_value_with(value, UpdateOptions::default());
    }

    /// Like `set_value_with`, but children absent from `value` are left untouched.
    pub fn patch_value_with(&self, value: impl Into<Value>, options: UpdateOptions) {
        let value = value.into();
        match self.kind() {
            ControlKind::Leaf => self.apply_value(value, options, true),
            ControlKind::Group => {
                let local = options.with_update_parent(false);
                if let Value::Object(map) = &value {
                    for (name, child) in self.children() {
                        if let Some(slice) = map.get(&name.to_string()) {
                            child.patch_value_with(slice.clone(), local);
                        }
                    }
                }
                self.update_value_and_validity_with(options);
                self.update_pristine_with(options.update_parent);
            }
            ControlKind::Array => {
                let local = options.with_update_parent(false);
                if let Value::Array(items) = &value {
                    for (child, slice) in self.child_controls().iter().zip(items) {
                        child.patch_value_with(slice.clone(), local);
                    }
                }
                self.update_value_and_validity_with(options);
                self.update_pristine_with(options.update_parent);
            }
        }
    }

    pub(crate) fn apply_value(&self, value: Value, options: UpdateOptions, mark_dirty: bool) {
        let local = options.with_update_parent(false);
        match self.kind() {
            ControlKind::Leaf => {
                {
                    let mut state = self.0.state.borrow_mut();
                    if state.value == value {
                        return;
                    }
                    state.value = value;
                }
                if mark_dirty {
                    self.mark_dirty_with(options.with_emit_event(false));
                }
                self.update_value_and_validity_with(options);
            }
            ControlKind::Group => {
                let map = match value {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                for (name, child) in self.children() {
                    let slice = map.get(&name.to_string()).cloned().unwrap_or(Value::Null);
                    child.apply_value(slice, local, mark_dirty);
                }
                self.update_value_and_validity_with(options);
                if mark_dirty {
                    self.update_pristine_with(options.update_parent);
                }
            }
            ControlKind::Array => {
                let children = self.child_controls();
                match value {
                    Value::Array(items) => {
                        let existing = children.len();
                        let mut items = items.into_iter();
                        for child in &children {
                            match items.next() {
                                Some(slice) => child.apply_value(slice, local, mark_dirty),
                                None => break,
                            }
                        }
                        let grown = items
                            .map(|slice| FormControl::new(slice, ControlOptions::default()).0)
                            .collect::<Vec<_>>();
                        if grown.is_empty() {
                            self.update_value_and_validity_with(options);
                        } else {
                            trace!(existing, added = grown.len(), "array grew from incoming value");
                            FormArray(self.clone()).add_all_with(grown, options);
                        }
                    }
                    _ => {
                        for child in &children {
                            child.apply_value(Value::Null, local, mark_dirty);
                        }
                        self.update_value_and_validity_with(options);
                    }
                }
                if mark_dirty {
                    self.update_pristine_with(options.update_parent);
                }
            }
        }
    }

    pub fn update_value_and_validity(&self) {
        self.update_value_and_validity_with(UpdateOptions::default());
    }

    /// Recomputes value, errors and status, schedules async validation, notifies, and
    /// continues into the parent chain when asked to.
    ///
    /// Validators run without any interior borrow held. If a synchronous validator
    /// panics, the control keeps its freshly reduced value and the status it held before
    /// validators ran.
    pub fn update_value_and_validity_with(&self, options: UpdateOptions) {
        self.cancel_async_validation();
        self.set_initial_status();
        self.update_value();

        if self.enabled() {
            let errors = self.run_validators();
            let status = self.calculate_status(&errors);
            {
                let mut state = self.0.state.borrow_mut();
                state.errors = errors;
                state.status = status;
            }
            if matches!(status, ControlStatus::Valid | ControlStatus::Pending) {
                self.run_async_validators();
            }
        }

        let (value, status) = {
            let state = self.0.state.borrow();
            (state.value.clone(), state.status)
        };
        trace!(kind = ?self.kind(), ?status, "recomputed control");
        if options.emit_event {
            self.0.value_changes.emit(value);
            self.0.status_changes.emit(status);
        }

        if options.update_parent && let Some(parent) = self.parent() {
            parent.update_value_and_validity_with(options);
        }
    }

    fn set_initial_status(&self) {
        let status = if self.all_controls_disabled() {
            ControlStatus::Disabled
        } else {
            ControlStatus::Valid
        };
        self.0.state.borrow_mut().status = status;
    }

    fn update_value(&self) {
        if self.kind() == ControlKind::Leaf {
            return;
        }
        let value = self.reduce_value();
        self.0.state.borrow_mut().value = value;
    }

    fn reduce_value(&self) -> Value {
        let include_all = self.disabled();
        match &*self.0.children.borrow() {
            Children::Leaf => self.value(),
            Children::Group(map) => Value::Object(
                map.iter()
                    .filter(|(_, child)| include_all || child.enabled())
                    .map(|(name, child)| (name.clone(), child.value()))
                    .collect(),
            ),
            Children::Array(items) => Value::Array(
                items
                    .iter()
                    .filter(|child| include_all || child.enabled())
                    .map(Control::value)
                    .collect(),
            ),
        }
    }

    fn all_controls_disabled(&self) -> bool {
        match &*self.0.children.borrow() {
            Children::Leaf => self.0.state.borrow().status == ControlStatus::Disabled,
            Children::Group(map) => !map.is_empty() && map.values().all(Control::disabled),
            Children::Array(items) => !items.is_empty() && items.iter().all(Control::disabled),
        }
    }

    fn any_child_has_status(&self, status: ControlStatus) -> bool {
        self.any_child(|child| child.status() == status)
    }

    fn calculate_status(&self, own_errors: &ValidationErrors) -> ControlStatus {
        if self.all_controls_disabled() {
            ControlStatus::Disabled
        } else if !own_errors.is_empty() {
            ControlStatus::Invalid
        } else if self.async_run_in_flight() || self.any_child_has_status(ControlStatus::Pending) {
            ControlStatus::Pending
        } else if self.any_child_has_status(ControlStatus::Invalid) {
            ControlStatus::Invalid
        } else {
            ControlStatus::Valid
        }
    }

    fn run_validators(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for validator in &self.0.validators {
            if let Some(result) = validator.validate(self) {
                merge_errors(&mut errors, result);
            }
        }
        errors
    }

    fn async_run_in_flight(&self) -> bool {
        self.0.async_run.borrow().is_some()
    }

    fn cancel_async_validation(&self) {
        self.0.generation.set(self.0.generation.get().wrapping_add(1));
        if let Some(handle) = self.0.async_run.borrow_mut().take() {
            trace!("cancelled in-flight async validation");
            handle.abort();
        }
    }

    fn run_async_validators(&self) {
        if self.0.async_validators.is_empty() {
            return;
        }
        let Some(spawner) = self.0.spawner.clone() else {
            warn!("async validators configured without a spawner; skipping async validation");
            return;
        };

        let previous = {
            let mut state = self.0.state.borrow_mut();
            std::mem::replace(&mut state.status, ControlStatus::Pending)
        };
        let generation = self.0.generation.get();
        let (handle, registration) = AbortHandle::new_pair();
        let run = Abortable::new(
            run_async_validation(Rc::downgrade(&self.0), generation, self.0.debounce),
            registration,
        );
        let spawned = spawner.as_ref().spawn_local(async move {
            let _ = run.await;
        });
        match spawned {
            Ok(()) => {
                debug!(generation, debounce = ?self.0.debounce, "scheduled async validation");
                *self.0.async_run.borrow_mut() = Some(handle);
            }
            Err(error) => {
                warn!(%error, "failed to spawn async validation");
                self.0.state.borrow_mut().status = previous;
            }
        }
    }

    pub fn set_errors(&self, errors: ValidationErrors) {
        self.set_errors_with(errors, true);
    }

    /// Replaces this control's own errors, bypassing validators.
    ///
    /// Ancestors refresh their rolled-up status; no value is recomputed.
    pub fn set_errors_with(&self, errors: ValidationErrors, mark_dirty: bool) {
        let status = self.calculate_status(&errors);
        {
            let mut state = self.0.state.borrow_mut();
            state.errors = errors;
            state.status = status;
        }
        self.0.status_changes.emit(status);
        self.refresh_ancestor_status();
        if mark_dirty {
            self.mark_dirty_with(UpdateOptions::silent());
        }
    }

    /// Drops one manual error code, keeping the others.
    pub fn remove_error(&self, code: &str) {
        let mut errors = self.0.state.borrow().errors.clone();
        if errors.remove(code).is_some() {
            self.set_errors_with(errors, false);
        }
    }

    fn refresh_ancestor_status(&self) {
        let mut current = self.parent();
        while let Some(control) = current {
            let own_errors = control.0.state.borrow().errors.clone();
            let status = control.calculate_status(&own_errors);
            control.0.state.borrow_mut().status = status;
            control.0.status_changes.emit(status);
            current = control.parent();
        }
    }

    pub fn mark_touched(&self) {
        self.mark_touched_with(UpdateOptions::default());
    }

    /// Sets the flag and, when asked, walks every ancestor even if this control was
    /// already touched.
    pub fn mark_touched_with(&self, options: UpdateOptions) {
        let changed = !std::mem::replace(&mut self.0.state.borrow_mut().touched, true);
        if changed && options.emit_event {
            self.0.touch_changes.emit(true);
        }
        if options.update_parent && let Some(parent) = self.parent() {
            parent.mark_touched_with(options);
        }
    }

    pub fn mark_all_touched(&self) {
        self.mark_all_touched_with(UpdateOptions::default());
    }

    /// Touches this control and every descendant; only this call walks the ancestors.
    pub fn mark_all_touched_with(&self, options: UpdateOptions) {
        self.mark_touched_with(options);
        for child in self.child_controls() {
            child.mark_all_touched_with(options.with_update_parent(false));
        }
    }

    pub fn mark_untouched(&self) {
        self.mark_untouched_with(UpdateOptions::default());
    }

    /// Clears the flag on the whole subtree, then lets ancestors recompute theirs.
    pub fn mark_untouched_with(&self, options: UpdateOptions) {
        let changed = std::mem::replace(&mut self.0.state.borrow_mut().touched, false);
        for child in self.child_controls() {
            child.mark_untouched_with(options.with_update_parent(false));
        }
        if changed && options.emit_event {
            self.0.touch_changes.emit(false);
        }
        if options.update_parent && let Some(parent) = self.parent() {
            parent.update_touched_with(options);
        }
    }

    pub(crate) fn update_touched_with(&self, options: UpdateOptions) {
        let touched = self.any_child(Control::touched);
        let changed = {
            let mut state = self.0.state.borrow_mut();
            std::mem::replace(&mut state.touched, touched) != touched
        };
        if changed && options.emit_event {
            self.0.touch_changes.emit(touched);
        }
        if options.update_parent && let Some(parent) = self.parent() {
            parent.update_touched_with(options);
        }
    }

    pub fn mark_dirty(&self) {
        self.mark_dirty_with(UpdateOptions::default());
    }

    /// Marks this control and, when asked, every ancestor dirty. Never cascades down.
    pub fn mark_dirty_with(&self, options: UpdateOptions) {
        self.0.state.borrow_mut().pristine = false;
        if options.update_parent && let Some(parent) = self.parent() {
            parent.mark_dirty_with(options);
        }
    }

    pub fn mark_pristine(&self) {
        self.mark_pristine_with(UpdateOptions::default());
    }

    pub fn mark_pristine_with(&self, options: UpdateOptions) {
        self.0.state.borrow_mut().pristine = true;
        for child in self.child_controls() {
            child.mark_pristine_with(options.with_update_parent(false));
        }
        if options.update_parent && let Some(parent) = self.parent() {
            parent.update_pristine_with(true);
        }
    }

    pub(crate) fn update_pristine_with(&self, update_parent: bool) {
        if self.kind() != ControlKind::Leaf {
            let pristine = !self.any_child(Control::dirty);
            self.0.state.borrow_mut().pristine = pristine;
        }
        if update_parent && let Some(parent) = self.parent() {
            parent.update_pristine_with(true);
        }
    }

    pub fn mark_disabled(&self) {
        self.mark_disabled_with(UpdateOptions::default());
    }

    /// Disables the whole subtree: errors are cleared and validators are skipped.
    pub fn mark_disabled_with(&self, options: UpdateOptions) {
        for child in self.child_controls() {
            child.mark_disabled_with(options.with_update_parent(true));
        }
        self.cancel_async_validation();
        {
            let mut state = self.0.state.borrow_mut();
            state.errors.clear();
            state.status = ControlStatus::Disabled;
        }
        if options.emit_event {
            self.0.status_changes.emit(ControlStatus::Disabled);
        }
        self.update_ancestors(options);
    }

    pub fn mark_enabled(&self) {
        self.mark_enabled_with(UpdateOptions::default());
    }

    /// Enables the whole subtree and recomputes from scratch.
    pub fn mark_enabled_with(&self, options: UpdateOptions) {
        for child in self.child_controls() {
            child.mark_enabled_with(options.with_update_parent(true));
        }
        if self.enabled() {
            return;
        }
        self.0.state.borrow_mut().status = ControlStatus::Valid;
        self.update_value_and_validity_with(options);
    }

    fn update_ancestors(&self, options: UpdateOptions) {
        if options.update_parent && let Some(parent) = self.parent() {
            parent.update_value_and_validity_with(options);
        }
    }

    pub fn reset(&self) {
        self.reset_with(ResetOptions::default());
    }

    /// Pristine, untouched, new value, then the optional enable/disable transition.
    pub fn reset_with(&self, reset: ResetOptions) {
        let options = reset.update_options();
        self.mark_pristine_with(options);
        self.mark_untouched_with(options);
        self.apply_value(reset.value, options, false);
        match reset.disabled {
            Some(true) => self.mark_disabled_with(options),
            Some(false) => self.mark_enabled_with(options),
            None => {}
        }
        if reset.remove_focus {
            self.unfocus_subtree();
        }
    }

    pub(crate) fn set_focused(&self, focused: bool) {
        self.0.state.borrow_mut().focused = focused;
        self.0.focus_changes.emit(focused);
    }

    pub(crate) fn focused(&self) -> bool {
        self.0.state.borrow().focused
    }

    fn unfocus_subtree(&self) {
        if self.kind() == ControlKind::Leaf {
            if self.focused() {
                self.set_focused(false);
            }
            return;
        }
        for child in self.child_controls() {
            child.unfocus_subtree();
        }
    }

    /// Closes every notification stream of the subtree and cancels pending async work.
    pub fn dispose(&self) {
        {
            let mut state = self.0.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
        }
        let children = self.with_children_mut(|children| match children {
            Children::Leaf => Vec::new(),
            Children::Group(map) => map.drain(..).map(|(_, child)| child).collect(),
            Children::Array(items) => items.drain(..).collect(),
        });
        for child in children {
            child.detach();
            child.dispose();
        }
        self.cancel_async_validation();
        self.0.value_changes.close();
        self.0.status_changes.close();
        self.0.touch_changes.close();
        self.0.focus_changes.close();
        self.0.collection_changes.close();
        debug!(kind = ?self.kind(), "disposed control");
    }

    pub(crate) fn cancel_pending_work(&self) {
        self.cancel_async_validation();
    }

    fn upgrade_current(node: &Weak<ControlNode>, generation: u64) -> Option<Control> {
        let node = node.upgrade()?;
        (node.generation.get() == generation).then_some(Control(node))
    }
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Control {}

impl Debug for Control {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Control")
            .field("kind", &self.0.kind)
            .field("value", &state.value)
            .field("status", &state.status)
            .field("errors", &state.errors)
            .field("touched", &state.touched)
            .field("pristine", &state.pristine)
            .finish()
    }
}

async fn run_async_validation(node: Weak<ControlNode>, generation: u64, debounce: Duration) {
    if !debounce.is_zero() {
        Delay::new(debounce).await;
    }
    let Some(control) = Control::upgrade_current(&node, generation) else {
        debug!(generation, "async validation superseded during debounce");
        return;
    };

    debug!(
        generation,
        validators = control.0.async_validators.len(),
        "running async validators"
    );
    let mut runs = control
        .0
        .async_validators
        .iter()
        .map(|validator| validator.validate(&control))
        .collect::<FuturesUnordered<_>>();
    drop(control);

    let mut errors = ValidationErrors::new();
    while let Some(result) = runs.next().await {
        match result {
            Ok(Some(found)) => merge_errors(&mut errors, found),
            Ok(None) => {}
            Err(error) => warn!(%error, "async validator failed; treating it as no error"),
        }
    }

    let Some(control) = Control::upgrade_current(&node, generation) else {
        debug!(generation, "discarded stale async validation result");
        return;
    };
    control.0.async_run.borrow_mut().take();
    debug!(generation, errors = errors.len(), "applying async validation result");
    control.set_errors(errors);
}

pub(crate) fn parse_index(segment: &str) -> FormResult<usize> {
    segment.parse::<usize>().map_err(|_| FormError::InvalidIndex {
        segment: segment.to_string(),
    })
}
