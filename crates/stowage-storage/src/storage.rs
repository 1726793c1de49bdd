use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use stowage_common::error::ignore_not_exist;
use stowage_common::{Object, ObjectMode, Result, StowageError, SystemMetadata};
use stowage_crypto::CustomerKey;
use tracing::{debug, instrument};

use crate::TRACING_TARGET_STORAGE;
use crate::backend::{
    AbortMultipartUploadRequest, BackendClient, DeleteObjectRequest, GetObjectRequest,
    HeadObjectRequest, HeadObjectResponse, ListPartsRequest, PutObjectRequest,
};
use crate::config::StorageConfig;
use crate::cursor::{DirCursor, ObjectCursor, PrefixCursor, UploadCursor};
use crate::listing::{ObjectPager, ObjectPages};
use crate::multipart::MultipartLimits;
use crate::options::{
    DeleteOptions, ListMode, ListOptions, ReadOptions, ServerSideEncryption, StatOptions,
    WriteOptions,
};
use crate::pager::Pager;
use crate::path::PathResolver;

pub(crate) const DELIMITER: &str = "/";

/// User metadata key holding the absolute key a link object points at.
pub const LINK_TARGET_METADATA: &str = "stowage-link-target";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageMeta {
    pub name: String,
    pub work_dir: String,
    pub limits: MultipartLimits,
}

pub(crate) struct StorageInner {
    pub client: Arc<dyn BackendClient>,
    pub bucket: String,
    pub paths: PathResolver,
    pub page_size: i32,
    pub default_storage_class: Option<String>,
    pub encryption: Option<ServerSideEncryption>,
}

impl StorageInner {
    /// Encryption for a new object: an explicit choice wins, then the
    /// configured default unless a customer key is supplied.
    pub fn encryption_for(
        &self,
        explicit: Option<ServerSideEncryption>,
        customer_key: Option<&CustomerKey>,
    ) -> Result<Option<ServerSideEncryption>> {
        match (explicit, customer_key) {
            (Some(_), Some(_)) => Err(StowageError::InvalidArgument(
                "server side encryption and customer key are mutually exclusive".to_string(),
            )),
            (Some(sse), None) => Ok(Some(sse)),
            (None, Some(_)) => Ok(None),
            (None, None) => Ok(self.encryption.clone()),
        }
    }

    pub fn storage_class_for(&self, explicit: Option<String>) -> Option<String> {
        explicit.or_else(|| self.default_storage_class.clone())
    }
}

#[derive(Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("bucket", &self.inner.bucket)
            .field("work_dir", &self.inner.paths.work_dir())
            .finish()
    }
}

impl std::fmt::Display for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stowage://{}{}", self.inner.bucket, self.inner.paths.work_dir())
    }
}

impl Storage {
    pub fn new(client: Arc<dyn BackendClient>, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let paths = PathResolver::new(&config.work_dir)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                client,
                bucket: config.bucket,
                paths,
                page_size: config.page_size,
                default_storage_class: config.default_storage_class,
                encryption: config.encryption,
            }),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    pub fn paths(&self) -> &PathResolver {
        &self.inner.paths
    }

    pub fn metadata(&self) -> StorageMeta {
        StorageMeta {
            name: self.inner.bucket.clone(),
            work_dir: self.inner.paths.work_dir().to_string(),
            limits: MultipartLimits::default(),
        }
    }

    #[instrument(skip(self, opts), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn read(&self, path: &str, opts: ReadOptions) -> Result<Bytes> {
        if opts.size == Some(0) {
            return Ok(Bytes::new());
        }
        let range = opts.range()?;

        let key = self.inner.paths.absolute(path);
        let output = self
            .inner
            .client
            .get_object(GetObjectRequest {
                bucket: self.inner.bucket.clone(),
                key,
                range,
                customer_key: opts.customer_key,
            })
            .await?;

        debug!(target: TRACING_TARGET_STORAGE, path, size = output.body.len(), "read object");
        Ok(output.body)
    }

    #[instrument(skip(self, data, opts), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn write(&self, path: &str, data: Bytes, size: u64, opts: WriteOptions) -> Result<u64> {
        if size > MultipartLimits::WRITE_SIZE_MAXIMUM {
            return Err(StowageError::InvalidArgument(format!(
                "write size {size} exceeds maximum {}",
                MultipartLimits::WRITE_SIZE_MAXIMUM
            )));
        }
        check_payload_size(&data, size)?;

        let encryption = self
            .inner
            .encryption_for(opts.encryption, opts.customer_key.as_ref())?;
        let key = self.inner.paths.absolute(path);
        let output = self
            .inner
            .client
            .put_object(PutObjectRequest {
                bucket: self.inner.bucket.clone(),
                key,
                body: data,
                content_length: size,
                content_type: opts.content_type,
                content_md5: opts.content_md5,
                storage_class: self.inner.storage_class_for(opts.storage_class),
                encryption,
                customer_key: opts.customer_key,
                metadata: HashMap::new(),
            })
            .await?;

        debug!(target: TRACING_TARGET_STORAGE, path, size, etag = ?output.etag, "wrote object");
        Ok(size)
    }

    #[instrument(skip(self, opts), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn stat(&self, path: &str, opts: StatOptions) -> Result<Object> {
        let key = self.inner.paths.absolute(path);

        if let Some(multipart_id) = opts.multipart_id {
            self.inner
                .client
                .list_parts(ListPartsRequest {
                    bucket: self.inner.bucket.clone(),
                    key: key.clone(),
                    upload_id: multipart_id.clone(),
                    max_parts: 1,
                    part_number_marker: None,
                })
                .await?;
            return Ok(Object::part(key, path, multipart_id));
        }

        let key = if opts.dir { format!("{key}{DELIMITER}") } else { key };
        let output = self
            .inner
            .client
            .head_object(HeadObjectRequest {
                bucket: self.inner.bucket.clone(),
                key: key.clone(),
                customer_key: opts.customer_key,
            })
            .await?;

        let mode = if opts.dir { ObjectMode::DIR } else { ObjectMode::READ };
        Ok(head_to_object(key, path.to_string(), mode, output))
    }

    #[instrument(skip(self, opts), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn delete(&self, path: &str, opts: DeleteOptions) -> Result<()> {
        let key = self.inner.paths.absolute(path);

        if let Some(upload_id) = opts.multipart_id {
            return self.inner.abort_upload(key, upload_id).await;
        }

        let key = if opts.dir { format!("{key}{DELIMITER}") } else { key };
        let result = self
            .inner
            .client
            .delete_object(DeleteObjectRequest {
                bucket: self.inner.bucket.clone(),
                key: key.clone(),
            })
            .await
            .map_err(StowageError::from);
        if let Err(err) = &result
            && err.is_not_exist()
        {
            debug!(target: TRACING_TARGET_STORAGE, key, "object already deleted");
        }
        ignore_not_exist(result)
    }

    pub fn list(&self, path: &str, opts: ListOptions) -> Result<ObjectPager> {
        let prefix = self.inner.paths.absolute(path);
        let page_size = self.inner.page_size;

        let cursor = match opts.mode {
            ListMode::Prefix => ObjectCursor::Prefix(PrefixCursor::new(prefix, page_size)),
            ListMode::Dir => ObjectCursor::Dir(DirCursor::new(prefix, page_size, DELIMITER)),
            ListMode::Part => ObjectCursor::Uploads(UploadCursor::new(prefix, page_size)),
            mode @ ListMode::Block => {
                return Err(StowageError::InvalidListMode(mode.to_string()));
            }
        };

        debug!(target: TRACING_TARGET_STORAGE, path, mode = %opts.mode, "start listing");
        Ok(Pager::new(ObjectPages::new(Arc::clone(&self.inner)), cursor))
    }

    #[instrument(skip(self), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn create_dir(&self, path: &str) -> Result<Object> {
        let key = format!("{}{DELIMITER}", self.inner.paths.absolute(path));
        self.inner
            .client
            .put_object(PutObjectRequest {
                bucket: self.inner.bucket.clone(),
                key: key.clone(),
                body: Bytes::new(),
                content_length: 0,
                storage_class: self.inner.default_storage_class.clone(),
                encryption: self.inner.encryption.clone(),
                ..Default::default()
            })
            .await?;

        Ok(Object::dir(key, path))
    }

    /// Creates a zero-length object at `path` whose user metadata records
    /// the absolute key of `link_target`, which need not exist.
    #[instrument(skip(self), target = TRACING_TARGET_STORAGE, fields(bucket = %self.inner.bucket))]
    pub async fn create_link(&self, path: &str, link_target: &str) -> Result<Object> {
        let key = self.inner.paths.absolute(path);
        let target_key = self.inner.paths.absolute(link_target);
        self.inner
            .client
            .put_object(PutObjectRequest {
                bucket: self.inner.bucket.clone(),
                key: key.clone(),
                body: Bytes::new(),
                content_length: 0,
                storage_class: self.inner.default_storage_class.clone(),
                encryption: self.inner.encryption.clone(),
                metadata: HashMap::from([(LINK_TARGET_METADATA.to_string(), target_key.clone())]),
                ..Default::default()
            })
            .await?;

        debug!(target: TRACING_TARGET_STORAGE, path, target_key = %target_key, "created link");
        Ok(Object::link(key, path, target_key))
    }
}

impl StorageInner {
    pub async fn abort_upload(&self, key: String, upload_id: String) -> Result<()> {
        let result = self
            .client
            .abort_multipart_upload(AbortMultipartUploadRequest {
                bucket: self.bucket.clone(),
                key: key.clone(),
                upload_id: upload_id.clone(),
            })
            .await
            .map_err(StowageError::from);
        if let Err(err) = &result
            && err.is_not_exist()
        {
            debug!(target: TRACING_TARGET_STORAGE, key, upload_id, "multipart upload already gone");
        }
        ignore_not_exist(result)
    }
}

pub(crate) fn check_payload_size(data: &Bytes, size: u64) -> Result<()> {
    if data.len() as u64 != size {
        return Err(StowageError::InvalidArgument(format!(
            "declared size {size} does not match payload length {}",
            data.len()
        )));
    }
    Ok(())
}

fn head_to_object(id: String, path: String, mode: ObjectMode, mut head: HeadObjectResponse) -> Object {
    let link_target = head.metadata.remove(LINK_TARGET_METADATA);
    let mode = if link_target.is_some() { mode | ObjectMode::LINK } else { mode };
    let mut object = Object::new(id, path, mode);
    object.link_target = link_target;
    object.content_length = Some(head.content_length);
    object.content_type = head.content_type;
    object.last_modified = head.last_modified;
    object.etag = head.etag;
    object.system_metadata = SystemMetadata {
        storage_class: head.storage_class,
        server_side_encryption: head.server_side_encryption,
        sse_kms_key_id: head.sse_kms_key_id,
        sse_bucket_key_enabled: head.bucket_key_enabled,
        sse_customer_algorithm: head.sse_customer_algorithm,
        sse_customer_key_md5: head.sse_customer_key_md5,
        checksum_sha256: head.checksum_sha256,
    };
    object
}
