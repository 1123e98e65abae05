//! Error types for codec operations.

use thiserror::Error;

/// Errors produced while decoding, encoding or re-baking level data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// A buffer is too short or its header contradicts itself.
    #[error("malformed {context}: {reason}")]
    MalformedRecord {
        context: &'static str,
        reason: String,
    },

    /// The texture remap table does not match the chunk's texture count.
    #[error("texture remap has {actual} pairs but the chunk declares {expected} textures")]
    RemapCountMismatch { expected: usize, actual: usize },

    /// The verification pass of a strict decomposition had to flip an axis.
    #[error("decomposition resolved by sign flip on axes {axes:?}")]
    DecompositionAmbiguous { axes: [bool; 3] },

    /// A value does not fit the integer width of its fixed-point field.
    #[error("{value} at scale {scale} does not fit in a {bits}-bit field")]
    EncodeOverflow { value: f64, scale: f64, bits: u32 },
}

impl DecodeError {
    pub(crate) fn malformed(context: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            context,
            reason: reason.into(),
        }
    }

    pub(crate) fn truncated(context: &'static str, needed: usize, available: usize) -> Self {
        Self::malformed(
            context,
            format!("needs {needed} bytes, buffer holds {available}"),
        )
    }
}

/// Result alias for codec operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
