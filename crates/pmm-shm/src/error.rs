use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShmError {
    #[error("cannot allocate shared buffer '{key}': {source}")]
    Allocation {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot attach shared buffer '{key}': {source}")]
    Attach {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot destroy shared buffer '{key}': {source}")]
    Destroy {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("shared buffer '{0}' is detached")]
    Detached(String),
    #[error("invalid buffer key: {0:?}")]
    InvalidKey(String),
}

impl ShmError {
    pub(crate) fn allocation(key: impl ToString, source: io::Error) -> Self {
        ShmError::Allocation {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn attach(key: impl ToString, source: io::Error) -> Self {
        ShmError::Attach {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn destroy(key: impl ToString, source: io::Error) -> Self {
        ShmError::Destroy {
            key: key.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ShmError>;
