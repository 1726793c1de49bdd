pub mod backend;
pub mod config;
pub mod cursor;
pub mod listing;
#[cfg(feature = "memory")]
pub mod memory;
pub mod multipart;
pub mod options;
pub mod pager;
pub mod path;
pub mod service;
pub mod storage;

pub const TRACING_TARGET_STORAGE: &str = "stowage_storage::storage";
pub const TRACING_TARGET_LISTING: &str = "stowage_storage::listing";
pub const TRACING_TARGET_MULTIPART: &str = "stowage_storage::multipart";
pub const TRACING_TARGET_PAGER: &str = "stowage_storage::pager";

pub use backend::{BackendClient, BackendResult};
pub use config::StorageConfig;
pub use listing::{ObjectPager, ObjectPages};
#[cfg(feature = "memory")]
pub use memory::{BackendCall, BackendOp, MemoryBackend};
pub use multipart::{MultipartLimits, PartPager, PartPages};
pub use options::{
    DeleteOptions, ListMode, ListOptions, MultipartOptions, PartOptions, ReadOptions,
    ServerSideEncryption, StatOptions, WriteOptions,
};
pub use pager::{PageFetcher, PageStatus, Pager};
pub use path::PathResolver;
pub use service::{BucketPages, Service, StoragePager};
pub use storage::{LINK_TARGET_METADATA, Storage, StorageMeta};
