pub use crate::form::{
    AsyncValidator, ChildKey, CollectionChange, Control, ControlKind, ControlOptions,
    ControlState, ControlStatus, FieldKey, FormArray, FormControl, FormError, FormGroup,
    FormModel, FormResult, ResetOptions, UpdateOptions, ValidationErrors, Validator, Value,
    validation_error,
};
