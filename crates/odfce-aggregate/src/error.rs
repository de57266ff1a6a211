//! Error type of a symbol pass.

use odfce_format::FormatError;
use odfce_storage::StorageError;
use odfce_types::OdfceError;
use thiserror::Error;

/// Errors that abort one symbol's pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// Data, addressing or integrity error in the core.
    #[error(transparent)]
    Core(#[from] OdfceError),

    /// Blob or key-value store error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CSV chunk rendering failed.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Result alias for pass operations.
pub type PassResult<T> = std::result::Result<T, PassError>;
