use thiserror::Error;

/// Errors raised by the diagram model itself. I/O, XML parsing and
/// configuration errors live at the application boundary and are
/// wrapped in `anyhow` instead.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CoreError {
    #[error("invalid {field}: value must not be empty")]
    InvalidElement { field: &'static str },

    #[error("no such {kind} with id '{id}'")]
    NotFound { kind: &'static str, id: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
