use std::{any::Any, borrow::Cow, fmt::Display};

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Status codes carried by [`Error::Status`], numbered like gRPC codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Code {
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("{code}: {message}")]
    Status {
        code: Code,
        message: Cow<'static, str>,
    },
    #[error("service error: {0}")]
    Service(BoxError),
    #[error("invocation panicked: {0}")]
    Panicked(String),
    #[error("bridge dropped before a terminal signal")]
    Disconnected,
    #[error("no runtime to drive the call: {0}")]
    Runtime(String),
}

impl Error {
    pub fn status(code: Code, message: impl Into<Cow<'static, str>>) -> Self {
        Error::Status {
            code,
            message: message.into(),
        }
    }
    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::status(Code::InvalidArgument, message)
    }
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::status(Code::Internal, message)
    }
    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::status(Code::Unavailable, message)
    }
    pub fn service(error: impl Into<BoxError>) -> Self {
        Error::Service(error.into())
    }
    /// Build from the payload of a caught panic
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Error::Panicked(message)
    }
    /// The status code this error maps to when it has to cross a transport
    pub fn code(&self) -> Code {
        match self {
            Error::Status { code, .. } => *code,
            Error::Service(_) => Code::Unknown,
            Error::Panicked(_) => Code::Internal,
            Error::Disconnected => Code::Unavailable,
            Error::Runtime(_) => Code::Unavailable,
        }
    }
}
