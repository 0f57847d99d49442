use keyconnect_device::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] keyconnect_device::Error),

    /// Caller payload failed a shape, type or business rule
    #[error("{0}")]
    Validation(String),

    /// Backend answered with a non-success status
    #[error("{0}")]
    Backend(String),

    #[error("Method not found")]
    MethodNotFound,

    #[error("Permissions not granted")]
    PermissionDenied,

    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Device(e) => e.kind(),
            Error::Validation(_) | Error::MethodNotFound => ErrorKind::ParamValidation,
            Error::Backend(_) => ErrorKind::BackendFailure,
            Error::PermissionDenied | Error::Http(_) | Error::Json(_) => ErrorKind::Unclassified,
        }
    }

    /// True for failures that leave the device session in doubt
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Device(_))
    }
}

impl Classify for Error {
    fn kind(&self) -> ErrorKind {
        Error::kind(self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
