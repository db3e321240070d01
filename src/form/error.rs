use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("control not found: {path}")]
    ControlNotFound { path: String },
    #[error("`{segment}` is not a valid array index")]
    InvalidIndex { segment: String },
    #[error("form value does not match the model: {0}")]
    Model(String),
}

impl FormError {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::ControlNotFound { path: path.into() }
    }
}

pub type FormResult<T> = Result<T, FormError>;
