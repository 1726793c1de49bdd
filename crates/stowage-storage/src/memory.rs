use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use stowage_common::BackendFault;
use stowage_crypto::CustomerKey;
use stowage_crypto::digest::{content_md5, md5_hex};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::backend::*;
use crate::options::ServerSideEncryption;

const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    ListBuckets,
    ListObjects,
    ListMultipartUploads,
    ListParts,
    HeadObject,
    GetObject,
    PutObject,
    DeleteObject,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub op: BackendOp,
    pub bucket: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    storage_class: Option<String>,
    encryption: Option<ServerSideEncryption>,
    customer_key: Option<(String, String)>,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredPart {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Upload {
    initiated: DateTime<Utc>,
    content_type: Option<String>,
    storage_class: Option<String>,
    encryption: Option<ServerSideEncryption>,
    customer_key: Option<(String, String)>,
    parts: BTreeMap<i32, StoredPart>,
}

#[derive(Debug, Clone)]
struct Bucket {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
    // keyed by (key, upload_id), which is also the listing order
    uploads: BTreeMap<(String, String), Upload>,
}

impl Bucket {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            objects: BTreeMap::new(),
            uploads: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    calls: Vec<BackendCall>,
    faults: HashMap<BackendOp, VecDeque<BackendFault>>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    min_part_size: u64,
    strict_delete: bool,
}

enum ListEntry {
    Object(String),
    Prefix(String),
}

impl ListEntry {
    fn marker(&self) -> &str {
        match self {
            Self::Object(key) => key,
            Self::Prefix(prefix) => prefix,
        }
    }
}

fn fault(code: &str, status: u16, message: impl Into<String>) -> BackendFault {
    BackendFault::new(code, message).with_status(status)
}

fn no_such_bucket(bucket: &str) -> BackendFault {
    fault("NoSuchBucket", 404, format!("bucket {bucket} does not exist"))
}

fn no_such_upload(upload_id: &str) -> BackendFault {
    fault("NoSuchUpload", 404, format!("upload {upload_id} does not exist"))
}

fn quoted_md5(data: &[u8]) -> String {
    format!("\"{}\"", md5_hex(data))
}

fn limit(max: i32) -> usize {
    let max = if max > 0 { max } else { DEFAULT_MAX_KEYS };
    usize::try_from(max).unwrap_or(usize::MAX)
}

fn customer_key_parts(key: Option<&CustomerKey>) -> Option<(String, String)> {
    key.map(|key| (key.algorithm().to_string(), key.key_md5().to_string()))
}

fn check_customer_key(
    stored: Option<&(String, String)>,
    supplied: Option<&CustomerKey>,
) -> BackendResult<()> {
    match (stored, supplied) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(fault(
            "InvalidRequest",
            400,
            "the object was stored using a customer provided key",
        )),
        (None, Some(_)) => Err(fault(
            "InvalidRequest",
            400,
            "the object was not stored using a customer provided key",
        )),
        (Some((_, md5)), Some(key)) if md5 == key.key_md5() => Ok(()),
        (Some(_), Some(_)) => Err(fault("AccessDenied", 403, "customer provided key does not match")),
    }
}

fn check_encryption_request(
    encryption: Option<&ServerSideEncryption>,
    customer_key: Option<&CustomerKey>,
) -> BackendResult<()> {
    if encryption.is_some() && customer_key.is_some() {
        return Err(fault(
            "InvalidArgument",
            400,
            "server side encryption cannot be combined with a customer provided key",
        ));
    }
    Ok(())
}

fn check_content_md5(expected: Option<&str>, data: &[u8]) -> BackendResult<()> {
    match expected {
        Some(expected) if expected != content_md5(data) => Err(fault(
            "BadDigest",
            400,
            "the Content-MD5 you specified did not match what we received",
        )),
        _ => Ok(()),
    }
}

fn apply_range(data: &Bytes, range: Option<&str>) -> BackendResult<Bytes> {
    let Some(range) = range else {
        return Ok(data.clone());
    };
    let invalid = || fault("InvalidRange", 416, format!("the requested range {range} is not satisfiable"));

    let (start, end) = range
        .strip_prefix("bytes=")
        .and_then(|bounds| bounds.split_once('-'))
        .ok_or_else(invalid)?;
    let start: u64 = start.parse().map_err(|_| invalid())?;
    let len = data.len() as u64;
    if start >= len {
        return Err(invalid());
    }
    let end = if end.is_empty() {
        len - 1
    } else {
        end.parse::<u64>().map_err(|_| invalid())?.min(len - 1)
    };
    if end < start {
        return Err(invalid());
    }

    Ok(data.slice(start as usize..=end as usize))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, name: impl Into<String>) -> Self {
        self.state.get_mut().buckets.insert(name.into(), Bucket::new());
        self
    }

    pub fn with_min_part_size(mut self, size: u64) -> Self {
        self.min_part_size = size;
        self
    }

    pub fn with_strict_delete(mut self) -> Self {
        self.strict_delete = true;
        self
    }

    /// Makes the next call of `op` fail with `fault`. Queued faults are
    /// consumed in order.
    pub async fn fail_next(&self, op: BackendOp, fault: BackendFault) {
        let mut state = self.state.lock().await;
        state.faults.entry(op).or_default().push_back(fault);
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: BackendOp) -> usize {
        let state = self.state.lock().await;
        state.calls.iter().filter(|call| call.op == op).count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn object_keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .buckets
            .get(bucket)
            .map(|bucket| bucket.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let state = self.state.lock().await;
        let object = state.buckets.get(bucket)?.objects.get(key)?;
        Some(object.data.clone())
    }

    pub async fn upload_count(&self, bucket: &str) -> usize {
        let state = self.state.lock().await;
        state.buckets.get(bucket).map_or(0, |bucket| bucket.uploads.len())
    }

    async fn begin(
        &self,
        op: BackendOp,
        bucket: Option<&str>,
        key: Option<&str>,
    ) -> BackendResult<MutexGuard<'_, State>> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall {
            op,
            bucket: bucket.map(str::to_string),
            key: key.map(str::to_string),
        });
        if let Some(fault) = state.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(fault);
        }
        Ok(state)
    }
}

fn bucket_mut<'a>(state: &'a mut State, bucket: &str) -> BackendResult<&'a mut Bucket> {
    state.buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn list_buckets(&self) -> BackendResult<ListBucketsResponse> {
        let state = self.begin(BackendOp::ListBuckets, None, None).await?;
        let buckets = state
            .buckets
            .iter()
            .map(|(name, bucket)| BucketEntry {
                name: name.clone(),
                created: Some(bucket.created),
            })
            .collect();
        Ok(ListBucketsResponse { buckets })
    }

    async fn list_objects(&self, req: ListObjectsRequest) -> BackendResult<ListObjectsResponse> {
        let mut state = self
            .begin(BackendOp::ListObjects, Some(&req.bucket), Some(&req.prefix))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        let delimiter = req.delimiter.as_deref().filter(|d| !d.is_empty());

        let mut entries = Vec::new();
        let mut prefixes = BTreeSet::new();
        for key in bucket.objects.keys().filter(|key| key.starts_with(&req.prefix)) {
            let suffix = &key[req.prefix.len()..];
            match delimiter.and_then(|d| suffix.find(d).map(|idx| idx + d.len())) {
                Some(end) => {
                    prefixes.insert(format!("{}{}", req.prefix, &suffix[..end]));
                }
                None => entries.push(ListEntry::Object(key.clone())),
            }
        }
        entries.extend(prefixes.into_iter().map(ListEntry::Prefix));
        entries.sort_by(|a, b| a.marker().cmp(b.marker()));

        // Grouping happens before the marker filter so a prefix is never
        // repeated on a later page.
        if let Some(token) = req.continuation_token.as_deref() {
            entries.retain(|entry| entry.marker() > token);
        }

        let limit = limit(req.max_keys);
        let is_truncated = entries.len() > limit;
        entries.truncate(limit);

        let next_continuation_token = if is_truncated {
            entries.last().map(|entry| entry.marker().to_string())
        } else {
            None
        };

        let mut response = ListObjectsResponse {
            is_truncated,
            next_continuation_token,
            ..Default::default()
        };
        for entry in entries {
            match entry {
                ListEntry::Prefix(prefix) => response.common_prefixes.push(prefix),
                ListEntry::Object(key) => {
                    let object = &bucket.objects[&key];
                    response.entries.push(ObjectEntry {
                        size: object.data.len() as u64,
                        etag: Some(object.etag.clone()),
                        last_modified: Some(object.last_modified),
                        storage_class: Some(
                            object
                                .storage_class
                                .clone()
                                .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string()),
                        ),
                        key,
                    });
                }
            }
        }
        Ok(response)
    }

    async fn list_multipart_uploads(
        &self,
        req: ListMultipartUploadsRequest,
    ) -> BackendResult<ListMultipartUploadsResponse> {
        let mut state = self
            .begin(BackendOp::ListMultipartUploads, Some(&req.bucket), Some(&req.prefix))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;

        let after_marker = |key: &str, upload_id: &str| match (
            req.key_marker.as_deref(),
            req.upload_id_marker.as_deref(),
        ) {
            (None, _) => true,
            (Some(key_marker), None) => key > key_marker,
            (Some(key_marker), Some(id_marker)) => (key, upload_id) > (key_marker, id_marker),
        };

        let mut uploads: Vec<UploadEntry> = bucket
            .uploads
            .iter()
            .filter(|((key, _), _)| key.starts_with(&req.prefix))
            .filter(|((key, upload_id), _)| after_marker(key, upload_id))
            .map(|((key, upload_id), upload)| UploadEntry {
                key: key.clone(),
                upload_id: upload_id.clone(),
                initiated: Some(upload.initiated),
                storage_class: upload.storage_class.clone(),
            })
            .collect();

        let limit = limit(req.max_uploads);
        let is_truncated = uploads.len() > limit;
        uploads.truncate(limit);

        let (next_key_marker, next_upload_id_marker) = match uploads.last() {
            Some(last) if is_truncated => (Some(last.key.clone()), Some(last.upload_id.clone())),
            _ => (None, None),
        };

        Ok(ListMultipartUploadsResponse {
            uploads,
            next_key_marker,
            next_upload_id_marker,
            is_truncated,
        })
    }

    async fn list_parts(&self, req: ListPartsRequest) -> BackendResult<ListPartsResponse> {
        let mut state = self
            .begin(BackendOp::ListParts, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        let upload = bucket
            .uploads
            .get(&(req.key.clone(), req.upload_id.clone()))
            .ok_or_else(|| no_such_upload(&req.upload_id))?;

        let marker = req.part_number_marker.unwrap_or(0);
        let mut parts: Vec<PartEntry> = upload
            .parts
            .range(marker + 1..)
            .map(|(number, part)| PartEntry {
                part_number: *number,
                size: part.data.len() as u64,
                etag: part.etag.clone(),
                last_modified: Some(part.last_modified),
            })
            .collect();

        let limit = limit(req.max_parts);
        let is_truncated = parts.len() > limit;
        parts.truncate(limit);
        let next_part_number_marker = if is_truncated {
            parts.last().map(|part| part.part_number)
        } else {
            None
        };

        Ok(ListPartsResponse {
            parts,
            next_part_number_marker,
            is_truncated,
        })
    }

    async fn head_object(&self, req: HeadObjectRequest) -> BackendResult<HeadObjectResponse> {
        let mut state = self
            .begin(BackendOp::HeadObject, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        let object = bucket
            .objects
            .get(&req.key)
            .ok_or_else(|| fault("NotFound", 404, "Not Found"))?;
        check_customer_key(object.customer_key.as_ref(), req.customer_key.as_ref())?;

        let (sse_kms_key_id, bucket_key_enabled) = match &object.encryption {
            Some(ServerSideEncryption::Kms {
                key_id,
                bucket_key_enabled,
                ..
            }) => (key_id.clone(), Some(*bucket_key_enabled)),
            _ => (None, None),
        };

        Ok(HeadObjectResponse {
            content_length: object.data.len() as u64,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.last_modified),
            storage_class: object.storage_class.clone(),
            server_side_encryption: object
                .encryption
                .as_ref()
                .map(|sse| sse.algorithm().to_string()),
            sse_kms_key_id,
            bucket_key_enabled,
            sse_customer_algorithm: object.customer_key.as_ref().map(|(alg, _)| alg.clone()),
            sse_customer_key_md5: object.customer_key.as_ref().map(|(_, md5)| md5.clone()),
            checksum_sha256: None,
            metadata: object.metadata.clone(),
        })
    }

    async fn get_object(&self, req: GetObjectRequest) -> BackendResult<GetObjectResponse> {
        let mut state = self
            .begin(BackendOp::GetObject, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        let object = bucket.objects.get(&req.key).ok_or_else(|| {
            fault("NoSuchKey", 404, format!("the specified key {} does not exist", req.key))
        })?;
        check_customer_key(object.customer_key.as_ref(), req.customer_key.as_ref())?;

        let body = apply_range(&object.data, req.range.as_deref())?;
        Ok(GetObjectResponse {
            content_length: body.len() as u64,
            body,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
        })
    }

    async fn put_object(&self, req: PutObjectRequest) -> BackendResult<PutObjectResponse> {
        let mut state = self
            .begin(BackendOp::PutObject, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        check_encryption_request(req.encryption.as_ref(), req.customer_key.as_ref())?;
        check_content_md5(req.content_md5.as_deref(), &req.body)?;

        let etag = quoted_md5(&req.body);
        bucket.objects.insert(
            req.key,
            StoredObject {
                data: req.body,
                etag: etag.clone(),
                content_type: req.content_type,
                last_modified: Utc::now(),
                storage_class: req.storage_class,
                encryption: req.encryption,
                customer_key: customer_key_parts(req.customer_key.as_ref()),
                metadata: req.metadata,
            },
        );
        Ok(PutObjectResponse { etag: Some(etag) })
    }

    async fn delete_object(&self, req: DeleteObjectRequest) -> BackendResult<()> {
        let mut state = self
            .begin(BackendOp::DeleteObject, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        if bucket.objects.remove(&req.key).is_none() && self.strict_delete {
            return Err(fault(
                "NoSuchKey",
                404,
                format!("the specified key {} does not exist", req.key),
            ));
        }
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        req: CreateMultipartUploadRequest,
    ) -> BackendResult<CreateMultipartUploadResponse> {
        let mut state = self
            .begin(BackendOp::CreateMultipartUpload, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        check_encryption_request(req.encryption.as_ref(), req.customer_key.as_ref())?;

        let upload_id = Uuid::new_v4().to_string();
        bucket.uploads.insert(
            (req.key, upload_id.clone()),
            Upload {
                initiated: Utc::now(),
                content_type: req.content_type,
                storage_class: req.storage_class,
                encryption: req.encryption,
                customer_key: customer_key_parts(req.customer_key.as_ref()),
                parts: BTreeMap::new(),
            },
        );
        Ok(CreateMultipartUploadResponse {
            upload_id: Some(upload_id),
        })
    }

    async fn upload_part(&self, req: UploadPartRequest) -> BackendResult<UploadPartResponse> {
        let mut state = self
            .begin(BackendOp::UploadPart, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        if !(1..=10_000).contains(&req.part_number) {
            return Err(fault(
                "InvalidArgument",
                400,
                "part number must be an integer between 1 and 10000, inclusive",
            ));
        }
        let upload = bucket
            .uploads
            .get_mut(&(req.key.clone(), req.upload_id.clone()))
            .ok_or_else(|| no_such_upload(&req.upload_id))?;
        check_customer_key(upload.customer_key.as_ref(), req.customer_key.as_ref())?;
        check_content_md5(req.content_md5.as_deref(), &req.body)?;

        let etag = quoted_md5(&req.body);
        upload.parts.insert(
            req.part_number,
            StoredPart {
                data: req.body,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(UploadPartResponse { etag: Some(etag) })
    }

    async fn complete_multipart_upload(
        &self,
        req: CompleteMultipartUploadRequest,
    ) -> BackendResult<CompleteMultipartUploadResponse> {
        let mut state = self
            .begin(BackendOp::CompleteMultipartUpload, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        let upload_key = (req.key.clone(), req.upload_id.clone());
        let upload = bucket
            .uploads
            .get(&upload_key)
            .ok_or_else(|| no_such_upload(&req.upload_id))?;

        if req.parts.is_empty() {
            return Err(fault(
                "MalformedXML",
                400,
                "the XML you provided was not well-formed",
            ));
        }
        if req
            .parts
            .windows(2)
            .any(|pair| pair[0].part_number >= pair[1].part_number)
        {
            return Err(fault(
                "InvalidPartOrder",
                400,
                "the list of parts was not in ascending order",
            ));
        }

        let mut body = BytesMut::new();
        let mut digests = Vec::with_capacity(req.parts.len() * 16);
        for (position, completed) in req.parts.iter().enumerate() {
            let part = upload
                .parts
                .get(&completed.part_number)
                .filter(|part| part.etag == completed.etag)
                .ok_or_else(|| {
                    fault(
                        "InvalidPart",
                        400,
                        format!("part {} could not be found", completed.part_number),
                    )
                })?;
            let is_last = position + 1 == req.parts.len();
            if !is_last && (part.data.len() as u64) < self.min_part_size {
                return Err(fault(
                    "EntityTooSmall",
                    400,
                    "your proposed upload is smaller than the minimum allowed size",
                ));
            }
            body.extend_from_slice(&part.data);
            digests.extend_from_slice(&Md5::digest(&part.data));
        }

        let etag = format!("\"{}-{}\"", md5_hex(&digests), req.parts.len());
        let Some(upload) = bucket.uploads.remove(&upload_key) else {
            return Err(no_such_upload(&req.upload_id));
        };
        bucket.objects.insert(
            req.key,
            StoredObject {
                data: body.freeze(),
                etag: etag.clone(),
                content_type: upload.content_type,
                last_modified: Utc::now(),
                storage_class: upload.storage_class,
                encryption: upload.encryption,
                customer_key: upload.customer_key,
                metadata: HashMap::new(),
            },
        );
        Ok(CompleteMultipartUploadResponse { etag: Some(etag) })
    }

    async fn abort_multipart_upload(&self, req: AbortMultipartUploadRequest) -> BackendResult<()> {
        let mut state = self
            .begin(BackendOp::AbortMultipartUpload, Some(&req.bucket), Some(&req.key))
            .await?;
        let bucket = bucket_mut(&mut state, &req.bucket)?;
        bucket
            .uploads
            .remove(&(req.key, req.upload_id.clone()))
            .map(|_| ())
            .ok_or_else(|| no_such_upload(&req.upload_id))
    }
}
