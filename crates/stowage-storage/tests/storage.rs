mod common;

use std::sync::Arc;

use bytes::Bytes;
use stowage_common::{BackendFault, ErrorKind};
use stowage_crypto::CustomerKey;
use stowage_crypto::digest::content_md5;
use stowage_storage::{
    BackendOp, DeleteOptions, MemoryBackend, MultipartOptions, ReadOptions, ServerSideEncryption,
    Service, StatOptions, StorageConfig, WriteOptions,
};

use common::{BUCKET, setup, write};

#[tokio::test]
async fn write_then_read_and_stat() {
    let (backend, storage) = setup(MemoryBackend::new(), "/data", 200);
    let body = Bytes::from_static(b"0123456789");
    let written = storage
        .write(
            "notes.txt",
            body.clone(),
            10,
            WriteOptions {
                content_type: Some("text/plain".to_string()),
                content_md5: Some(content_md5(&body)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(written, 10);
    assert_eq!(backend.object_keys(BUCKET).await, vec!["data/notes.txt"]);

    let all = storage.read("notes.txt", ReadOptions::default()).await.unwrap();
    assert_eq!(all, body);

    let window = storage
        .read(
            "notes.txt",
            ReadOptions {
                offset: Some(2),
                size: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(window, Bytes::from_static(b"234"));

    let object = storage.stat("notes.txt", StatOptions::default()).await.unwrap();
    assert!(object.mode.is_read());
    assert_eq!(object.id, "data/notes.txt");
    assert_eq!(object.path, "notes.txt");
    assert_eq!(object.content_length, Some(10));
    assert_eq!(object.content_type.as_deref(), Some("text/plain"));
    assert!(object.etag.is_some());
}

#[tokio::test]
async fn zero_size_read_skips_backend() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);
    let data = storage
        .read(
            "anything",
            ReadOptions {
                size: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(data.is_empty());
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn overflowing_read_window_is_rejected_locally() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);
    write(&storage, "k", "payload").await;
    backend.clear_calls().await;

    let err = storage
        .read(
            "k",
            ReadOptions {
                offset: Some(u64::MAX),
                size: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn missing_objects_map_to_not_exist() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/", 200);

    let err = storage.read("nope", ReadOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotExist);
    assert_eq!(err.fault().unwrap().code, "NoSuchKey");

    let err = storage.stat("nope", StatOptions::default()).await.unwrap_err();
    assert!(err.is_not_exist());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (backend, storage) = setup(MemoryBackend::new().with_strict_delete(), "/", 200);
    write(&storage, "once", "x").await;

    storage.delete("once", DeleteOptions::default()).await.unwrap();
    storage.delete("once", DeleteOptions::default()).await.unwrap();
    assert_eq!(backend.call_count(BackendOp::DeleteObject).await, 2);
    assert!(backend.object_keys(BUCKET).await.is_empty());
}

#[tokio::test]
async fn delete_surfaces_other_faults() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);
    backend
        .fail_next(
            BackendOp::DeleteObject,
            BackendFault::new("AccessDenied", "no").with_status(403),
        )
        .await;

    let err = storage.delete("k", DeleteOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn dir_markers_can_be_created_stated_and_deleted() {
    let (backend, storage) = setup(MemoryBackend::new(), "/root/", 200);
    let dir = storage.create_dir("photos").await.unwrap();
    assert!(dir.mode.is_dir());
    assert_eq!(dir.id, "root/photos/");
    assert_eq!(backend.object_keys(BUCKET).await, vec!["root/photos/"]);

    let stat = storage
        .stat(
            "photos",
            StatOptions {
                dir: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(stat.mode.is_dir());
    assert_eq!(stat.content_length, Some(0));

    storage
        .delete(
            "photos",
            DeleteOptions {
                dir: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(backend.object_keys(BUCKET).await.is_empty());
}

#[tokio::test]
async fn links_record_their_target_and_stat_as_links() {
    let (backend, storage) = setup(MemoryBackend::new(), "/work/", 200);
    write(&storage, "v2/model.bin", "weights").await;

    let link = storage.create_link("current", "v2/model.bin").await.unwrap();
    assert!(link.mode.is_link() && link.mode.is_read());
    assert_eq!(link.id, "work/current");
    assert_eq!(link.link_target.as_deref(), Some("work/v2/model.bin"));
    assert_eq!(backend.object_data(BUCKET, "work/current").await.unwrap(), Bytes::new());

    let stat = storage.stat("current", StatOptions::default()).await.unwrap();
    assert!(stat.mode.is_link() && stat.mode.is_read());
    assert_eq!(stat.link_target.as_deref(), Some("work/v2/model.bin"));
    assert_eq!(stat.content_length, Some(0));

    let plain = storage.stat("v2/model.bin", StatOptions::default()).await.unwrap();
    assert!(!plain.mode.is_link());
    assert!(plain.link_target.is_none());

    // A link may point at a key that does not exist yet.
    let dangling = storage.create_link("next", "v3/model.bin").await.unwrap();
    assert_eq!(dangling.link_target.as_deref(), Some("work/v3/model.bin"));
}

#[tokio::test]
async fn declared_size_must_match_payload() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);
    let err = storage
        .write("k", Bytes::from_static(b"abc"), 2, WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn customer_key_round_trip() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/", 200);
    let key = CustomerKey::aes256(&[42u8; 32]).unwrap();

    storage
        .write(
            "secret",
            Bytes::from_static(b"classified"),
            10,
            WriteOptions {
                customer_key: Some(key.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = storage.read("secret", ReadOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);

    let data = storage
        .read(
            "secret",
            ReadOptions {
                customer_key: Some(key.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(data, Bytes::from_static(b"classified"));

    let object = storage
        .stat(
            "secret",
            StatOptions {
                customer_key: Some(key.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(object.system_metadata.sse_customer_algorithm.as_deref(), Some("AES256"));
    assert_eq!(
        object.system_metadata.sse_customer_key_md5.as_deref(),
        Some(key.key_md5())
    );
}

#[tokio::test]
async fn short_customer_key_is_rejected_locally() {
    let err: stowage_common::StowageError = CustomerKey::aes256(&[1u8; 16]).unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::InvalidEncryptionKey);
}

#[tokio::test]
async fn conflicting_encryption_fails_without_backend_call() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);
    let key = CustomerKey::aes256(&[3u8; 32]).unwrap();

    let err = storage
        .write(
            "both",
            Bytes::from_static(b"x"),
            1,
            WriteOptions {
                encryption: Some(ServerSideEncryption::Aes256),
                customer_key: Some(key.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = storage
        .create_multipart(
            "both",
            MultipartOptions {
                encryption: Some(ServerSideEncryption::Aes256),
                customer_key: Some(key),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn configured_encryption_and_storage_class_apply_by_default() {
    common::init_tracing();
    let backend = Arc::new(MemoryBackend::new().with_bucket(BUCKET));
    let mut config = StorageConfig::new(BUCKET);
    config.default_storage_class = Some("STANDARD_IA".to_string());
    config.encryption = Some(ServerSideEncryption::Kms {
        key_id: Some("key-1".to_string()),
        context: None,
        bucket_key_enabled: true,
    });
    let storage = stowage_storage::Storage::new(backend.clone(), config).unwrap();

    write(&storage, "enc", "v").await;
    let object = storage.stat("enc", StatOptions::default()).await.unwrap();
    let meta = &object.system_metadata;
    assert_eq!(meta.server_side_encryption.as_deref(), Some("aws:kms"));
    assert_eq!(meta.sse_kms_key_id.as_deref(), Some("key-1"));
    assert_eq!(meta.sse_bucket_key_enabled, Some(true));
    assert_eq!(meta.storage_class.as_deref(), Some("STANDARD_IA"));

    // A customer key replaces the configured default.
    let key = CustomerKey::aes256(&[9u8; 32]).unwrap();
    storage
        .write(
            "sse-c",
            Bytes::from_static(b"v"),
            1,
            WriteOptions {
                customer_key: Some(key),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn metadata_and_display() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/base", 200);
    let meta = storage.metadata();
    assert_eq!(meta.name, BUCKET);
    assert_eq!(meta.work_dir, "/base/");
    assert_eq!(meta.limits.number_maximum, 10_000);
    assert_eq!(storage.to_string(), format!("stowage://{BUCKET}/base/"));
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let err = stowage_storage::Storage::new(backend.clone(), StorageConfig::new("b").with_work_dir("rel"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = stowage_storage::Storage::new(backend, StorageConfig::new("b").with_page_size(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn service_lists_and_opens_buckets() {
    common::init_tracing();
    let backend = Arc::new(MemoryBackend::new().with_bucket("alpha").with_bucket("beta"));
    let service = Service::new(backend.clone(), StorageConfig::new("template").with_work_dir("/w"));

    let storages = service.list().try_collect().await.unwrap();
    let names: Vec<_> = storages.iter().map(|s| s.bucket().to_string()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert!(storages.iter().all(|s| s.paths().work_dir() == "/w/"));
    assert_eq!(backend.call_count(BackendOp::ListBuckets).await, 1);

    let beta = service.get("beta").unwrap();
    write(&beta, "f", "1").await;
    assert_eq!(backend.object_keys("beta").await, vec!["w/f"]);
}

#[tokio::test]
async fn bucket_listing_failure_is_reported_once() {
    common::init_tracing();
    let backend = Arc::new(MemoryBackend::new().with_bucket("alpha"));
    backend
        .fail_next(
            BackendOp::ListBuckets,
            BackendFault::new("InvalidAccessKeyId", "bad key").with_status(403),
        )
        .await;
    let service = Service::new(backend, StorageConfig::new("template"));

    let mut pager = service.list();
    assert_eq!(pager.next().await.unwrap_err().kind(), ErrorKind::PermissionDenied);
    assert!(pager.next().await.unwrap().is_none());
}
