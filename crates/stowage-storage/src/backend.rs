use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use stowage_common::BackendFault;
use stowage_crypto::CustomerKey;

use crate::options::ServerSideEncryption;

pub type BackendResult<T> = std::result::Result<T, BackendFault>;

#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListObjectsResponse {
    pub entries: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsRequest {
    pub bucket: String,
    pub prefix: String,
    pub max_uploads: i32,
    pub key_marker: Option<String>,
    pub upload_id_marker: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadEntry {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsResponse {
    pub uploads: Vec<UploadEntry>,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListPartsRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub max_parts: i32,
    pub part_number_marker: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PartEntry {
    pub part_number: i32,
    pub size: u64,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPartsResponse {
    pub parts: Vec<PartEntry>,
    pub next_part_number_marker: Option<i32>,
    pub is_truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BucketEntry {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadObjectRequest {
    pub bucket: String,
    pub key: String,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct HeadObjectResponse {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
    pub bucket_key_enabled: Option<bool>,
    pub sse_customer_algorithm: Option<String>,
    pub sse_customer_key_md5: Option<String>,
    pub checksum_sha256: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
    pub range: Option<String>,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct GetObjectResponse {
    pub body: Bytes,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub content_md5: Option<String>,
    pub storage_class: Option<String>,
    pub encryption: Option<ServerSideEncryption>,
    pub customer_key: Option<CustomerKey>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectResponse {
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteObjectRequest {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
    pub encryption: Option<ServerSideEncryption>,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateMultipartUploadResponse {
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadPartRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    /// One-based backend part number.
    pub part_number: i32,
    pub body: Bytes,
    pub content_length: u64,
    pub content_md5: Option<String>,
    pub customer_key: Option<CustomerKey>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadPartResponse {
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadResponse {
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AbortMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn list_buckets(&self) -> BackendResult<ListBucketsResponse>;
    async fn list_objects(&self, req: ListObjectsRequest) -> BackendResult<ListObjectsResponse>;
    async fn list_multipart_uploads(
        &self,
        req: ListMultipartUploadsRequest,
    ) -> BackendResult<ListMultipartUploadsResponse>;
    async fn list_parts(&self, req: ListPartsRequest) -> BackendResult<ListPartsResponse>;
    async fn head_object(&self, req: HeadObjectRequest) -> BackendResult<HeadObjectResponse>;
    async fn get_object(&self, req: GetObjectRequest) -> BackendResult<GetObjectResponse>;
    async fn put_object(&self, req: PutObjectRequest) -> BackendResult<PutObjectResponse>;
    async fn delete_object(&self, req: DeleteObjectRequest) -> BackendResult<()>;
    async fn create_multipart_upload(
        &self,
        req: CreateMultipartUploadRequest,
    ) -> BackendResult<CreateMultipartUploadResponse>;
    async fn upload_part(&self, req: UploadPartRequest) -> BackendResult<UploadPartResponse>;
    async fn complete_multipart_upload(
        &self,
        req: CompleteMultipartUploadRequest,
    ) -> BackendResult<CompleteMultipartUploadResponse>;
    async fn abort_multipart_upload(&self, req: AbortMultipartUploadRequest) -> BackendResult<()>;
}
