use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use stowage_common::{Object, Part, Result, StowageError};
use tracing::{debug, info, instrument};

use crate::TRACING_TARGET_MULTIPART;
use crate::backend::{
    CompleteMultipartUploadRequest, CompletedPart, CreateMultipartUploadRequest, ListPartsRequest,
    UploadPartRequest,
};
use crate::cursor::PartCursor;
use crate::options::{MultipartOptions, PartOptions};
use crate::pager::{PageFetcher, PageStatus, Pager};
use crate::storage::{Storage, StorageInner, check_payload_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MultipartLimits {
    pub number_maximum: u32,
    pub size_minimum: u64,
    pub size_maximum: u64,
    pub write_size_maximum: u64,
}

impl MultipartLimits {
    pub const NUMBER_MAXIMUM: u32 = 10_000;
    pub const SIZE_MINIMUM: u64 = 5 * 1024 * 1024;
    pub const SIZE_MAXIMUM: u64 = 5 * 1024 * 1024 * 1024;
    pub const WRITE_SIZE_MAXIMUM: u64 = 5 * 1024 * 1024 * 1024;
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            number_maximum: Self::NUMBER_MAXIMUM,
            size_minimum: Self::SIZE_MINIMUM,
            size_maximum: Self::SIZE_MAXIMUM,
            write_size_maximum: Self::WRITE_SIZE_MAXIMUM,
        }
    }
}

pub type PartPager = Pager<PartPages>;

pub struct PartPages {
    inner: Arc<StorageInner>,
}

#[async_trait]
impl PageFetcher for PartPages {
    type Cursor = PartCursor;
    type Item = Part;

    async fn fetch(&self, cursor: &mut PartCursor, page: &mut Vec<Part>) -> Result<PageStatus> {
        debug!(
            target: TRACING_TARGET_MULTIPART,
            key = %cursor.key,
            upload_id = %cursor.upload_id,
            token = %cursor.continuation_token(),
            "listing parts"
        );
        let output = self
            .inner
            .client
            .list_parts(ListPartsRequest {
                bucket: self.inner.bucket.clone(),
                key: cursor.key.clone(),
                upload_id: cursor.upload_id.clone(),
                max_parts: cursor.max_parts,
                part_number_marker: cursor.part_number_marker,
            })
            .await?;

        let status = if !output.is_truncated {
            PageStatus::Done
        } else {
            match output.next_part_number_marker {
                Some(marker) if marker > 0 => {
                    cursor.part_number_marker = Some(marker);
                    PageStatus::Continue
                }
                _ => {
                    return Err(StowageError::malformed_response(
                        "truncated part listing without a part number marker",
                    ));
                }
            }
        };

        for entry in output.parts {
            page.push(Part {
                index: part_index(entry.part_number)?,
                size: entry.size,
                etag: entry.etag,
            });
        }
        Ok(status)
    }
}

/// Backend part number for a zero-based index.
fn part_number(index: u32) -> Result<i32> {
    if index >= MultipartLimits::NUMBER_MAXIMUM {
        return Err(StowageError::InvalidArgument(format!(
            "part index {index} out of range 0..{}",
            MultipartLimits::NUMBER_MAXIMUM
        )));
    }
    // index < 10000, so the cast and the increment are lossless.
    Ok(index as i32 + 1)
}

fn part_index(part_number: i32) -> Result<u32> {
    match u32::try_from(part_number) {
        Ok(number) if (1..=MultipartLimits::NUMBER_MAXIMUM).contains(&number) => Ok(number - 1),
        _ => Err(StowageError::malformed_response(format!(
            "part number {part_number} out of range"
        ))),
    }
}

fn ensure_part(object: &Object) -> Result<&str> {
    if !object.mode.is_part() {
        return Err(StowageError::NotPartObject(object.path.clone()));
    }
    object.multipart_id()
}

impl Storage {
    #[instrument(skip(self, opts), target = TRACING_TARGET_MULTIPART, fields(bucket = %self.inner.bucket))]
    pub async fn create_multipart(&self, path: &str, opts: MultipartOptions) -> Result<Object> {
        let encryption = self
            .inner
            .encryption_for(opts.encryption, opts.customer_key.as_ref())?;
        let key = self.inner.paths.absolute(path);

        let output = self
            .inner
            .client
            .create_multipart_upload(CreateMultipartUploadRequest {
                bucket: self.inner.bucket.clone(),
                key: key.clone(),
                content_type: opts.content_type,
                storage_class: self.inner.storage_class_for(opts.storage_class),
                encryption,
                customer_key: opts.customer_key,
            })
            .await?;

        let upload_id = output
            .upload_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StowageError::malformed_response("create multipart returned no upload id"))?;

        info!(target: TRACING_TARGET_MULTIPART, key, upload_id, "multipart upload created");
        Ok(Object::part(key, path, upload_id))
    }

    #[instrument(
        skip(self, object, data, opts),
        target = TRACING_TARGET_MULTIPART,
        fields(bucket = %self.inner.bucket, key = %object.id)
    )]
    pub async fn write_multipart(
        &self,
        object: &Object,
        index: u32,
        data: Bytes,
        size: u64,
        opts: PartOptions,
    ) -> Result<Part> {
        let upload_id = ensure_part(object)?;
        let part_number = part_number(index)?;
        if size > MultipartLimits::SIZE_MAXIMUM {
            return Err(StowageError::InvalidArgument(format!(
                "part size {size} exceeds maximum {}",
                MultipartLimits::SIZE_MAXIMUM
            )));
        }
        check_payload_size(&data, size)?;

        let output = self
            .inner
            .client
            .upload_part(UploadPartRequest {
                bucket: self.inner.bucket.clone(),
                key: object.id.clone(),
                upload_id: upload_id.to_string(),
                part_number,
                body: data,
                content_length: size,
                content_md5: opts.content_md5,
                customer_key: opts.customer_key,
            })
            .await?;

        let etag = output
            .etag
            .ok_or_else(|| StowageError::malformed_response("upload part returned no etag"))?;

        debug!(target: TRACING_TARGET_MULTIPART, index, size, etag, "uploaded part");
        Ok(Part { index, size, etag })
    }

    pub fn list_multipart(&self, object: &Object) -> Result<PartPager> {
        let upload_id = ensure_part(object)?;
        let cursor = PartCursor::new(object.id.clone(), upload_id, self.inner.page_size);
        Ok(Pager::new(
            PartPages {
                inner: Arc::clone(&self.inner),
            },
            cursor,
        ))
    }

    /// Completes the upload from `parts`, which must be in strictly
    /// ascending index order. On success `object` becomes readable and
    /// loses its upload id.
    #[instrument(
        skip(self, object, parts),
        target = TRACING_TARGET_MULTIPART,
        fields(bucket = %self.inner.bucket, key = %object.id, parts = parts.len())
    )]
    pub async fn complete_multipart(&self, object: &mut Object, parts: &[Part]) -> Result<()> {
        let upload_id = ensure_part(object)?.to_string();
        if parts.is_empty() {
            return Err(StowageError::InvalidArgument(
                "complete multipart requires at least one part".to_string(),
            ));
        }
        if parts.windows(2).any(|pair| pair[0].index >= pair[1].index) {
            return Err(StowageError::InvalidArgument(
                "parts must be in strictly ascending index order".to_string(),
            ));
        }

        let completed = parts
            .iter()
            .map(|part| {
                Ok(CompletedPart {
                    part_number: part_number(part.index)?,
                    etag: part.etag.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .inner
            .client
            .complete_multipart_upload(CompleteMultipartUploadRequest {
                bucket: self.inner.bucket.clone(),
                key: object.id.clone(),
                upload_id: upload_id.clone(),
                parts: completed,
            })
            .await?;

        info!(target: TRACING_TARGET_MULTIPART, upload_id, etag = ?output.etag, "multipart upload completed");
        object.content_length = Some(parts.iter().map(|part| part.size).sum());
        object.mark_completed(output.etag);
        Ok(())
    }

    #[instrument(skip(self, object), target = TRACING_TARGET_MULTIPART, fields(bucket = %self.inner.bucket, key = %object.id))]
    pub async fn abort_multipart(&self, object: &Object) -> Result<()> {
        let upload_id = ensure_part(object)?;
        self.inner
            .abort_upload(object.id.clone(), upload_id.to_string())
            .await
    }
}
