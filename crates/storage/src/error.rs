#![forbid(unsafe_code)]

use rt_core::{MalformedTree, StoreFault, TreeError};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    UnknownId,
    Malformed(MalformedTree),
    Unavailable(StoreFault),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownId => write!(f, "unknown id"),
            Self::Malformed(err) => write!(f, "malformed tree: {err}"),
            Self::Unavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Malformed(err) => Some(err),
            Self::Unavailable(err) => Some(err),
            Self::InvalidInput(_) | Self::UnknownId => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<TreeError> for StoreError {
    fn from(value: TreeError) -> Self {
        match value {
            TreeError::NotFound => Self::UnknownId,
            TreeError::InvalidInput(message) => Self::InvalidInput(message),
            TreeError::Malformed(err) => Self::Malformed(err),
            TreeError::StoreUnavailable(fault) => match fault.into_inner().downcast::<rusqlite::Error>() {
                Ok(err) => Self::Sql(*err),
                Err(other) => Self::Unavailable(StoreFault::from_boxed(other)),
            },
        }
    }
}
