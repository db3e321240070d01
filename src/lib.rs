//! Reactive state tree for hierarchical forms.
//!
//! A tree is built from [`form::FormControl`] leaves, [`form::FormGroup`]s keyed by name and
//! [`form::FormArray`]s keyed by position. Value changes recompute upward to the root; group
//! and array values are pushed downward to the children. Async validators are debounced and
//! superseded by newer changes.

pub mod form;
pub mod prelude;
