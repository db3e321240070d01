use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};

use super::control::Control;

/// Error mapping produced by validators: error code to arbitrary payload.
pub type ValidationErrors = Map<String, Value>;

pub type BoxedValidationFuture = LocalBoxFuture<'static, anyhow::Result<Option<ValidationErrors>>>;

/// Synchronous validator. `None` or an empty mapping means no error contributed.
pub trait Validator {
    fn validate(&self, control: &Control) -> Option<ValidationErrors>;
}

impl<F> Validator for F
where
    F: Fn(&Control) -> Option<ValidationErrors>,
{
    fn validate(&self, control: &Control) -> Option<ValidationErrors> {
        (self)(control)
    }
}

/// Asynchronous validator.
///
/// The returned future must own whatever it needs from the control; it runs detached
/// from the call that scheduled it. A failed future contributes no error.
pub trait AsyncValidator {
    fn validate(&self, control: &Control) -> BoxedValidationFuture;
}

impl<F> AsyncValidator for F
where
    F: Fn(&Control) -> BoxedValidationFuture,
{
    fn validate(&self, control: &Control) -> BoxedValidationFuture {
        (self)(control)
    }
}

/// Builds a single-entry error mapping.
pub fn validation_error(code: impl Into<String>, payload: impl Into<Value>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.insert(code.into(), payload.into());
    errors
}

/// Last-wins merge of `next` into `target`.
pub(crate) fn merge_errors(target: &mut ValidationErrors, next: ValidationErrors) {
    for (code, payload) in next {
        target.insert(code, payload);
    }
}
