use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stowage_common::StowageError;
use stowage_crypto::CustomerKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerSideEncryption {
    Aes256,
    Kms {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        #[serde(default)]
        bucket_key_enabled: bool,
    },
}

impl ServerSideEncryption {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
            Self::Kms { .. } => "aws:kms",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListMode {
    #[default]
    Dir,
    Prefix,
    Part,
    /// Block-level listing. Known to the abstraction, not supported by a
    /// bucket/key backend.
    Block,
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dir => "dir",
            Self::Prefix => "prefix",
            Self::Part => "part",
            Self::Block => "block",
        };
        f.write_str(name)
    }
}

impl FromStr for ListMode {
    type Err = StowageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dir" => Ok(Self::Dir),
            "prefix" => Ok(Self::Prefix),
            "part" => Ok(Self::Part),
            "block" => Ok(Self::Block),
            other => Err(StowageError::InvalidListMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub mode: ListMode,
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub offset: Option<u64>,
    pub size: Option<u64>,
    pub customer_key: Option<CustomerKey>,
}

impl ReadOptions {
    /// HTTP range for the requested window. Fails when the window's last
    /// byte does not fit in a `u64`.
    pub fn range(&self) -> Result<Option<String>, StowageError> {
        match (self.offset, self.size) {
            (None, None) => Ok(None),
            (Some(offset), None) => Ok(Some(format!("bytes={offset}-"))),
            (offset, Some(size)) => {
                let offset = offset.unwrap_or(0);
                let last = offset.checked_add(size.saturating_sub(1)).ok_or_else(|| {
                    StowageError::InvalidArgument(format!(
                        "read window at offset {offset} with size {size} overflows"
                    ))
                })?;
                Ok(Some(format!("bytes={offset}-{last}")))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub content_type: Option<String>,
    pub content_md5: Option<String>,
    pub storage_class: Option<String>,
    pub encryption: Option<ServerSideEncryption>,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct StatOptions {
    pub multipart_id: Option<String>,
    pub dir: bool,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub multipart_id: Option<String>,
    pub dir: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MultipartOptions {
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub encryption: Option<ServerSideEncryption>,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct PartOptions {
    pub content_md5: Option<String>,
    pub customer_key: Option<CustomerKey>,
}
