use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

use crate::{CryptoError, Result};

pub const SSE_CUSTOMER_ALGORITHM_AES256: &str = "AES256";

const CUSTOMER_KEY_SIZE: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct CustomerKey {
    algorithm: String,
    key: String,
    key_md5: String,
}

impl CustomerKey {
    pub fn new(algorithm: impl Into<String>, key: &[u8]) -> Result<Self> {
        if key.len() != CUSTOMER_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }

        Ok(Self {
            algorithm: algorithm.into(),
            key: STANDARD.encode(key),
            key_md5: STANDARD.encode(Md5::digest(key)),
        })
    }

    pub fn aes256(key: &[u8]) -> Result<Self> {
        Self::new(SSE_CUSTOMER_ALGORITHM_AES256, key)
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn key_md5(&self) -> &str {
        &self.key_md5
    }
}

impl fmt::Debug for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomerKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .field("key_md5", &self.key_md5)
            .finish()
    }
}
