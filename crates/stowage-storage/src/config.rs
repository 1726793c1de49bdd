use serde::{Deserialize, Serialize};
use stowage_common::{Result, StowageError};

use crate::options::ServerSideEncryption;
use crate::path::PathResolver;

pub const DEFAULT_PAGE_SIZE: i32 = 200;
pub const MAX_PAGE_SIZE: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<ServerSideEncryption>,
}

fn default_work_dir() -> String {
    "/".to_string()
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            work_dir: default_work_dir(),
            page_size: DEFAULT_PAGE_SIZE,
            default_storage_class: None,
            encryption: None,
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn from_env() -> Result<Option<Self>> {
        let Some(bucket) = env_value("STOWAGE_BUCKET") else {
            return Ok(None);
        };

        let mut config = Self::new(bucket);
        if let Some(work_dir) = env_value("STOWAGE_WORK_DIR") {
            config.work_dir = work_dir;
        }
        if let Some(page_size) = env_value("STOWAGE_PAGE_SIZE") {
            config.page_size = page_size.parse::<i32>().map_err(|err| {
                StowageError::Config(format!("invalid STOWAGE_PAGE_SIZE `{page_size}`: {err}"))
            })?;
        }
        config.default_storage_class = env_value("STOWAGE_STORAGE_CLASS");

        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(StowageError::Config("bucket name is empty".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(StowageError::Config(format!(
                "page size must be within 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        PathResolver::new(&self.work_dir)?;
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
