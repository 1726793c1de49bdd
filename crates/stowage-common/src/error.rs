use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFault {
    pub code: String,
    pub message: String,
    pub status: Option<u16>,
}

impl BackendFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for BackendFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for BackendFault {}

#[derive(Debug, Error)]
pub enum StowageError {
    #[error("invalid encryption customer key: expected 32 bytes, got {0}")]
    InvalidEncryptionKey(usize),
    #[error("object is not a multipart object: {0}")]
    NotPartObject(String),
    #[error("multipart upload id missing: {0}")]
    MissingUploadId(String),
    #[error("object not exist: {0}")]
    ObjectNotExist(#[source] BackendFault),
    #[error("permission denied: {0}")]
    PermissionDenied(#[source] BackendFault),
    #[error("unexpected backend fault: {0}")]
    Unexpected(#[source] BackendFault),
    #[error("invalid list mode: {0}")]
    InvalidListMode(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid config: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidEncryptionKey,
    NotPartObject,
    MissingUploadId,
    ObjectNotExist,
    PermissionDenied,
    Unexpected,
    InvalidListMode,
    InvalidArgument,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEncryptionKey => "InvalidEncryptionKey",
            Self::NotPartObject => "NotPartObject",
            Self::MissingUploadId => "MissingUploadId",
            Self::ObjectNotExist => "ObjectNotExist",
            Self::PermissionDenied => "PermissionDenied",
            Self::Unexpected => "Unexpected",
            Self::InvalidListMode => "InvalidListMode",
            Self::InvalidArgument => "InvalidArgument",
            Self::Config => "Config",
        }
    }

    /// Maps a backend fault code onto the taxonomy. Only the three
    /// backend-facing kinds can come out of here.
    pub fn from_fault_code(code: &str) -> Self {
        match code {
            "NoSuchKey" | "NoSuchUpload" | "NotFound" => Self::ObjectNotExist,
            "AccessDenied" | "Forbidden" | "AllAccessDisabled" | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch" => Self::PermissionDenied,
            _ => Self::Unexpected,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StowageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEncryptionKey(_) => ErrorKind::InvalidEncryptionKey,
            Self::NotPartObject(_) => ErrorKind::NotPartObject,
            Self::MissingUploadId(_) => ErrorKind::MissingUploadId,
            Self::ObjectNotExist(_) => ErrorKind::ObjectNotExist,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Unexpected(_) => ErrorKind::Unexpected,
            Self::InvalidListMode(_) => ErrorKind::InvalidListMode,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.fault().is_none()
    }

    pub fn fault(&self) -> Option<&BackendFault> {
        match self {
            Self::ObjectNotExist(fault) | Self::PermissionDenied(fault) | Self::Unexpected(fault) => {
                Some(fault)
            }
            _ => None,
        }
    }

    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::ObjectNotExist
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::Unexpected(BackendFault::new("MalformedResponse", message))
    }
}

impl From<BackendFault> for StowageError {
    fn from(fault: BackendFault) -> Self {
        match ErrorKind::from_fault_code(&fault.code) {
            ErrorKind::ObjectNotExist => Self::ObjectNotExist(fault),
            ErrorKind::PermissionDenied => Self::PermissionDenied(fault),
            _ => Self::Unexpected(fault),
        }
    }
}

/// Idempotence rule for delete-like operations: a target the backend no
/// longer knows about counts as deleted.
pub fn ignore_not_exist(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_exist() => Ok(()),
        other => other,
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;
