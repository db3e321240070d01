mod array;
mod control;
mod error;
mod events;
mod group;
mod leaf;
mod model;
mod options;
mod validation;


pub use array::FormArray;
pub use control::{Control, ControlKind, ControlStatus};
pub use error::{FormError, FormResult};
pub use events::{ChildKey, CollectionChange, EventStream};
pub use formtree_derive::FormModel;
pub use group::FormGroup;
pub use leaf::FormControl;
pub use model::{FieldKey, FormModel};
pub use options::{
    ControlOptions, ControlState, DEFAULT_ASYNC_DEBOUNCE, ResetOptions, Spawner, UpdateOptions,
};
pub use serde_json::Value;
pub use validation::{
    AsyncValidator, BoxedValidationFuture, ValidationErrors, Validator, validation_error,
};
