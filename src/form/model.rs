use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::control::Control;
use super::error::{FormError, FormResult};
use super::group::FormGroup;
use super::leaf::FormControl;
use super::options::ControlOptions;

/// Typed name of a model field, generated by `#[derive(FormModel)]`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub trait FormModel {
    type Fields;

    fn fields() -> Self::Fields;

    fn field_keys() -> &'static [FieldKey];
}

impl FormGroup {
    /// Builds a group with one leaf per model field, seeded from the model's serde form.
    pub fn from_model<T>(model: &T, options: ControlOptions) -> FormResult<Self>
    where
        T: FormModel + Serialize,
    {
        let value =
            serde_json::to_value(model).map_err(|error| FormError::Model(error.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(FormError::Model(
                "model must serialize to an object".to_string(),
            ));
        };
        let controls = T::field_keys()
            .iter()
            .map(|key| {
                let value = fields.remove(key.as_str()).unwrap_or(Value::Null);
                (key.as_str(), FormControl::new(value, ControlOptions::default()))
            })
            .collect::<Vec<_>>();
        Ok(Self::new(controls, options))
    }

    /// Reads the full snapshot, disabled fields included, back into `T`.
    pub fn model<T>(&self) -> FormResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.raw_value())
            .map_err(|error| FormError::Model(error.to_string()))
    }

    pub fn field(&self, key: FieldKey) -> FormResult<Control> {
        self.control(key.as_str())
    }
}
