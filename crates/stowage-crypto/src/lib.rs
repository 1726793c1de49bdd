pub mod digest;
pub mod sse;

pub use sse::{CustomerKey, SSE_CUSTOMER_ALGORITHM_AES256};

use stowage_common::StowageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

impl From<CryptoError> for StowageError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyLength(len) => StowageError::InvalidEncryptionKey(len),
        }
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
