use std::sync::Arc;

use async_trait::async_trait;
use stowage_common::Result;
use tracing::debug;

use crate::TRACING_TARGET_STORAGE;
use crate::backend::BackendClient;
use crate::config::StorageConfig;
use crate::cursor::BucketCursor;
use crate::pager::{PageFetcher, PageStatus, Pager};
use crate::storage::Storage;

pub type StoragePager = Pager<BucketPages>;

#[derive(Clone)]
pub struct Service {
    client: Arc<dyn BackendClient>,
    template: StorageConfig,
}

impl Service {
    /// `template` supplies work dir, page size and encryption defaults for
    /// every storage handed out; its bucket is replaced per call.
    pub fn new(client: Arc<dyn BackendClient>, template: StorageConfig) -> Self {
        Self { client, template }
    }

    pub fn list(&self) -> StoragePager {
        Pager::new(
            BucketPages {
                client: Arc::clone(&self.client),
                template: self.template.clone(),
            },
            BucketCursor,
        )
    }

    pub fn get(&self, name: &str) -> Result<Storage> {
        let mut config = self.template.clone();
        config.bucket = name.to_string();
        Storage::new(Arc::clone(&self.client), config)
    }
}

pub struct BucketPages {
    client: Arc<dyn BackendClient>,
    template: StorageConfig,
}

#[async_trait]
impl PageFetcher for BucketPages {
    type Cursor = BucketCursor;
    type Item = Storage;

    async fn fetch(&self, _cursor: &mut BucketCursor, page: &mut Vec<Storage>) -> Result<PageStatus> {
        let output = self.client.list_buckets().await?;
        debug!(target: TRACING_TARGET_STORAGE, buckets = output.buckets.len(), "listed buckets");

        for bucket in output.buckets {
            let mut config = self.template.clone();
            config.bucket = bucket.name;
            page.push(Storage::new(Arc::clone(&self.client), config)?);
        }
        Ok(PageStatus::Done)
    }
}
