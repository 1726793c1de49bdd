#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use stowage_storage::{MemoryBackend, Storage, StorageConfig, WriteOptions};
use tracing_subscriber::EnvFilter;

pub const BUCKET: &str = "test-bucket";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup(backend: MemoryBackend, work_dir: &str, page_size: i32) -> (Arc<MemoryBackend>, Storage) {
    init_tracing();
    let backend = Arc::new(backend.with_bucket(BUCKET));
    let config = StorageConfig::new(BUCKET)
        .with_work_dir(work_dir)
        .with_page_size(page_size);
    let storage = Storage::new(backend.clone(), config).unwrap();
    (backend, storage)
}

pub async fn write(storage: &Storage, path: &str, body: &str) {
    let data = Bytes::copy_from_slice(body.as_bytes());
    let size = data.len() as u64;
    storage
        .write(path, data, size, WriteOptions::default())
        .await
        .unwrap();
}
