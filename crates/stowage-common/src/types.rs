use std::fmt;
use std::ops::BitOr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectMode(u8);

impl ObjectMode {
    pub const READ: Self = Self(1);
    pub const DIR: Self = Self(1 << 1);
    pub const PART: Self = Self(1 << 2);
    pub const LINK: Self = Self(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_read(&self) -> bool {
        self.contains(Self::READ)
    }

    pub const fn is_dir(&self) -> bool {
        self.contains(Self::DIR)
    }

    pub const fn is_part(&self) -> bool {
        self.contains(Self::PART)
    }

    pub const fn is_link(&self) -> bool {
        self.contains(Self::LINK)
    }
}

impl BitOr for ObjectMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ObjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ, "read"),
            (Self::DIR, "dir"),
            (Self::PART, "part"),
            (Self::LINK, "link"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_side_encryption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_kms_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_bucket_key_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_customer_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse_customer_key_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: String,
    pub path: String,
    pub mode: ObjectMode,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    #[serde(default)]
    pub system_metadata: SystemMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    multipart_id: Option<String>,
}

impl Object {
    pub fn new(id: impl Into<String>, path: impl Into<String>, mode: ObjectMode) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            mode,
            content_length: None,
            content_type: None,
            last_modified: None,
            etag: None,
            system_metadata: SystemMetadata::default(),
            link_target: None,
            multipart_id: None,
        }
    }

    pub fn dir(id: impl Into<String>, path: impl Into<String>) -> Self {
        let mut object = Self::new(id, path, ObjectMode::DIR);
        object.content_length = Some(0);
        object
    }

    pub fn link(id: impl Into<String>, path: impl Into<String>, target: impl Into<String>) -> Self {
        let mut object = Self::new(id, path, ObjectMode::READ | ObjectMode::LINK);
        object.content_length = Some(0);
        object.link_target = Some(target.into());
        object
    }

    pub fn part(id: impl Into<String>, path: impl Into<String>, multipart_id: impl Into<String>) -> Self {
        let mut object = Self::new(id, path, ObjectMode::PART);
        object.multipart_id = Some(multipart_id.into());
        object
    }

    pub fn multipart_id(&self) -> Result<&str> {
        self.multipart_id
            .as_deref()
            .ok_or_else(|| StowageError::MissingUploadId(self.path.clone()))
    }

    pub fn has_multipart_id(&self) -> bool {
        self.multipart_id.is_some()
    }

    pub fn set_multipart_id(&mut self, multipart_id: impl Into<String>) {
        self.multipart_id = Some(multipart_id.into());
    }

    pub fn mark_completed(&mut self, etag: Option<String>) {
        self.mode.remove(ObjectMode::PART);
        self.mode.insert(ObjectMode::READ);
        self.multipart_id = None;
        if etag.is_some() {
            self.etag = etag;
        }
    }
}

/// One uploaded chunk of a multipart upload. `index` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub index: u32,
    pub size: u64,
    pub etag: String,
}
