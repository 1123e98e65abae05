//! Error types for the build step.

use std::path::PathBuf;

use levelbake_codec::DecodeError;
use thiserror::Error;

/// Errors raised while loading, re-baking or storing level assets.
#[derive(Debug, Error)]
pub enum Error {
    /// A codec operation failed on the named asset.
    #[error("{key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: DecodeError,
    },

    /// The store holds no asset under this key.
    #[error("missing asset {0}")]
    MissingAsset(String),

    /// Filesystem access failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration or job manifest could not be used.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn codec(key: impl Into<String>, source: DecodeError) -> Self {
        Self::Codec {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for build-step operations.
pub type Result<T> = std::result::Result<T, Error>;
