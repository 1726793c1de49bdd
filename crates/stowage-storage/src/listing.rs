use std::sync::Arc;

use async_trait::async_trait;
use stowage_common::{Object, ObjectMode, Result, StowageError};
use tracing::debug;

use crate::TRACING_TARGET_LISTING;
use crate::backend::{
    ListMultipartUploadsRequest, ListMultipartUploadsResponse, ListObjectsRequest,
    ListObjectsResponse, ObjectEntry,
};
use crate::cursor::{DirCursor, ObjectCursor, PrefixCursor, UploadCursor};
use crate::pager::{PageFetcher, PageStatus, Pager};
use crate::storage::{DELIMITER, StorageInner};

pub type ObjectPager = Pager<ObjectPages>;

pub struct ObjectPages {
    inner: Arc<StorageInner>,
}

impl ObjectPages {
    pub(crate) fn new(inner: Arc<StorageInner>) -> Self {
        Self { inner }
    }

    async fn fetch_prefix(
        &self,
        cursor: &mut PrefixCursor,
        page: &mut Vec<Object>,
    ) -> Result<PageStatus> {
        let output = self
            .inner
            .client
            .list_objects(ListObjectsRequest {
                bucket: self.inner.bucket.clone(),
                prefix: cursor.prefix.clone(),
                delimiter: None,
                max_keys: cursor.max_keys,
                continuation_token: cursor.continuation_token.clone(),
            })
            .await?;

        let status = advance_objects(cursor, &output)?;
        page.extend(output.entries.into_iter().map(|entry| self.entry_to_object(entry)));
        Ok(status)
    }

    async fn fetch_dir(&self, cursor: &mut DirCursor, page: &mut Vec<Object>) -> Result<PageStatus> {
        let output = self
            .inner
            .client
            .list_objects(ListObjectsRequest {
                bucket: self.inner.bucket.clone(),
                prefix: cursor.inner.prefix.clone(),
                delimiter: Some(cursor.delimiter.clone()),
                max_keys: cursor.inner.max_keys,
                continuation_token: cursor.inner.continuation_token.clone(),
            })
            .await?;

        let status = advance_objects(&mut cursor.inner, &output)?;
        let prefix = cursor.inner.prefix.as_str();

        let mut objects: Vec<Object> = output
            .common_prefixes
            .into_iter()
            .map(|key| {
                let path = self.inner.paths.relative(&key);
                Object::dir(key, path)
            })
            .collect();
        objects.extend(
            output
                .entries
                .into_iter()
                .filter(|entry| entry.key != prefix)
                .map(|entry| self.entry_to_object(entry)),
        );
        objects.sort_by(|a, b| a.id.cmp(&b.id));

        page.extend(objects);
        Ok(status)
    }

    async fn fetch_uploads(
        &self,
        cursor: &mut UploadCursor,
        page: &mut Vec<Object>,
    ) -> Result<PageStatus> {
        let output = self
            .inner
            .client
            .list_multipart_uploads(ListMultipartUploadsRequest {
                bucket: self.inner.bucket.clone(),
                prefix: cursor.prefix.clone(),
                max_uploads: cursor.max_uploads,
                key_marker: cursor.key_marker.clone(),
                upload_id_marker: cursor.upload_id_marker.clone(),
            })
            .await?;

        let status = advance_uploads(cursor, &output)?;
        page.extend(output.uploads.into_iter().map(|upload| {
            let path = self.inner.paths.relative(&upload.key);
            let mut object = Object::part(upload.key, path, upload.upload_id);
            object.last_modified = upload.initiated;
            object.system_metadata.storage_class = upload.storage_class;
            object
        }));
        Ok(status)
    }

    fn entry_to_object(&self, entry: ObjectEntry) -> Object {
        let path = self.inner.paths.relative(&entry.key);
        let mode = if entry.key.ends_with(DELIMITER) {
            ObjectMode::DIR
        } else {
            ObjectMode::READ
        };

        let mut object = Object::new(entry.key, path, mode);
        object.content_length = Some(entry.size);
        object.etag = entry.etag;
        object.last_modified = entry.last_modified;
        object.system_metadata.storage_class = entry.storage_class;
        object
    }
}

#[async_trait]
impl PageFetcher for ObjectPages {
    type Cursor = ObjectCursor;
    type Item = Object;

    async fn fetch(&self, cursor: &mut ObjectCursor, page: &mut Vec<Object>) -> Result<PageStatus> {
        debug!(
            target: TRACING_TARGET_LISTING,
            bucket = %self.inner.bucket,
            token = %cursor.continuation_token(),
            "listing page"
        );
        match cursor {
            ObjectCursor::Prefix(cursor) => self.fetch_prefix(cursor, page).await,
            ObjectCursor::Dir(cursor) => self.fetch_dir(cursor, page).await,
            ObjectCursor::Uploads(cursor) => self.fetch_uploads(cursor, page).await,
        }
    }
}

fn advance_objects(cursor: &mut PrefixCursor, output: &ListObjectsResponse) -> Result<PageStatus> {
    if !output.is_truncated {
        return Ok(PageStatus::Done);
    }
    match output.next_continuation_token.as_deref() {
        Some(token) if !token.is_empty() => {
            cursor.continuation_token = Some(token.to_string());
            Ok(PageStatus::Continue)
        }
        _ => Err(StowageError::malformed_response(
            "truncated object listing without a continuation token",
        )),
    }
}

fn advance_uploads(
    cursor: &mut UploadCursor,
    output: &ListMultipartUploadsResponse,
) -> Result<PageStatus> {
    if !output.is_truncated {
        return Ok(PageStatus::Done);
    }
    match output.next_key_marker.as_deref() {
        Some(key) if !key.is_empty() => {
            cursor.key_marker = Some(key.to_string());
            cursor.upload_id_marker = output.next_upload_id_marker.clone();
            Ok(PageStatus::Continue)
        }
        _ => Err(StowageError::malformed_response(
            "truncated upload listing without a key marker",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_listing_without_token_is_malformed() {
        let mut cursor = PrefixCursor::new("a/", 2);
        let output = ListObjectsResponse {
            is_truncated: true,
            ..Default::default()
        };
        let err = advance_objects(&mut cursor, &output).unwrap_err();
        assert_eq!(err.fault().map(|f| f.code.as_str()), Some("MalformedResponse"));
        assert_eq!(cursor.continuation_token, None);
    }

    #[test]
    fn upload_markers_advance_together() {
        let mut cursor = UploadCursor::new("a/", 2);
        let output = ListMultipartUploadsResponse {
            next_key_marker: Some("a/k".to_string()),
            next_upload_id_marker: Some("u2".to_string()),
            is_truncated: true,
            ..Default::default()
        };
        assert_eq!(advance_uploads(&mut cursor, &output).unwrap(), PageStatus::Continue);
        assert_eq!(cursor.continuation_token(), "a/k/u2");

        let done = ListMultipartUploadsResponse::default();
        assert_eq!(advance_uploads(&mut cursor, &done).unwrap(), PageStatus::Done);
        assert_eq!(cursor.continuation_token(), "a/k/u2");
    }
}
