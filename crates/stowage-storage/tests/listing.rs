mod common;

use std::sync::Arc;

use futures::StreamExt;
use stowage_common::{BackendFault, ErrorKind, ObjectMode};
use stowage_storage::{
    BackendOp, ListMode, ListOptions, MemoryBackend, MultipartOptions, Service, StorageConfig,
};

use common::{BUCKET, setup, write};

fn mode(mode: ListMode) -> ListOptions {
    ListOptions { mode }
}

#[tokio::test]
async fn prefix_listing_spans_pages_in_order() {
    let (backend, storage) = setup(MemoryBackend::new(), "/work", 2);
    for name in ["e", "a", "d", "b", "c"] {
        write(&storage, &format!("logs/{name}"), name).await;
    }
    backend.clear_calls().await;

    let mut pager = storage.list("logs/", mode(ListMode::Prefix)).unwrap();
    let mut paths = Vec::new();
    while let Some(object) = pager.next().await.unwrap() {
        assert!(object.mode.is_read());
        assert_eq!(object.content_length, Some(1));
        paths.push(object.path);
    }

    assert_eq!(paths, vec!["logs/a", "logs/b", "logs/c", "logs/d", "logs/e"]);
    assert_eq!(backend.call_count(BackendOp::ListObjects).await, 3);
    assert_eq!(pager.pages_fetched(), 3);
}

#[tokio::test]
async fn listing_fetches_only_what_is_consumed() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 2);
    for name in ["a", "b", "c", "d"] {
        write(&storage, name, name).await;
    }
    backend.clear_calls().await;

    let mut pager = storage.list("", mode(ListMode::Prefix)).unwrap();
    assert_eq!(backend.call_count(BackendOp::ListObjects).await, 0);

    let first = pager.next().await.unwrap().unwrap();
    assert_eq!(first.id, "a");
    pager.next().await.unwrap();
    assert_eq!(backend.call_count(BackendOp::ListObjects).await, 1);
    assert_eq!(pager.cursor().continuation_token(), "b");
}

#[tokio::test]
async fn dir_listing_groups_children_and_skips_own_marker() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/work/", 200);
    write(&storage, "a", "1").await;
    write(&storage, "dir/b", "2").await;
    write(&storage, "dir/c", "3").await;
    storage.create_dir("dir").await.unwrap();

    let top = storage
        .list("", ListOptions::default())
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let top: Vec<_> = top.iter().map(|o| (o.path.as_str(), o.mode)).collect();
    assert_eq!(top, vec![("a", ObjectMode::READ), ("dir/", ObjectMode::DIR)]);

    let children = storage
        .list("dir/", mode(ListMode::Dir))
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let ids: Vec<_> = children.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["work/dir/b", "work/dir/c"]);
}

#[tokio::test]
async fn prefix_listing_reports_dir_markers_as_dirs() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/", 200);
    storage.create_dir("x").await.unwrap();
    write(&storage, "x/y", "1").await;

    let objects = storage
        .list("x", mode(ListMode::Prefix))
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(objects.len(), 2);
    assert!(objects[0].mode.is_dir());
    assert_eq!(objects[0].path, "x/");
    assert!(objects[1].mode.is_read());
}

#[tokio::test]
async fn block_mode_is_rejected_without_backend_call() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 200);

    let err = storage.list("", mode(ListMode::Block)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidListMode);
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn part_listing_yields_in_flight_uploads() {
    let (backend, storage) = setup(MemoryBackend::new(), "/work", 2);
    let mut ids = Vec::new();
    for name in ["big-1", "big-2", "big-2"] {
        let object = storage
            .create_multipart(name, MultipartOptions::default())
            .await
            .unwrap();
        ids.push(object.multipart_id().unwrap().to_string());
    }
    backend.clear_calls().await;

    let uploads = storage
        .list("big-", mode(ListMode::Part))
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(uploads.len(), 3);
    assert!(uploads.iter().all(|o| o.mode.is_part()));
    assert_eq!(uploads[0].path, "big-1");
    let mut listed: Vec<_> = uploads
        .iter()
        .map(|o| o.multipart_id().unwrap().to_string())
        .collect();
    listed.sort();
    ids.sort();
    assert_eq!(listed, ids);
    assert_eq!(backend.call_count(BackendOp::ListMultipartUploads).await, 2);
}

#[tokio::test]
async fn backend_failure_mid_listing_ends_sequence() {
    let (backend, storage) = setup(MemoryBackend::new(), "/", 2);
    for name in ["a", "b", "c", "d", "e"] {
        write(&storage, name, name).await;
    }

    let mut pager = storage.list("", mode(ListMode::Prefix)).unwrap();
    assert_eq!(pager.next().await.unwrap().unwrap().id, "a");
    assert_eq!(pager.next().await.unwrap().unwrap().id, "b");

    backend
        .fail_next(
            BackendOp::ListObjects,
            BackendFault::new("AccessDenied", "denied").with_status(403),
        )
        .await;
    let err = pager.next().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.fault().unwrap().status, Some(403));

    assert!(pager.next().await.unwrap().is_none());
    assert_eq!(backend.call_count(BackendOp::ListObjects).await, 2);
}

#[tokio::test]
async fn listing_as_stream() {
    let (_backend, storage) = setup(MemoryBackend::new(), "/", 1);
    for name in ["a", "b", "c"] {
        write(&storage, name, name).await;
    }

    let paths: Vec<String> = storage
        .list("", mode(ListMode::Prefix))
        .unwrap()
        .into_stream()
        .map(|object| object.unwrap().path)
        .collect()
        .await;
    assert_eq!(paths, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn missing_bucket_surfaces_as_unexpected() {
    common::init_tracing();
    let service = Service::new(Arc::new(MemoryBackend::new()), StorageConfig::new(BUCKET));
    let storage = service.get("absent").unwrap();

    let err = storage
        .list("", ListOptions::default())
        .unwrap()
        .next()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(err.fault().unwrap().code, "NoSuchBucket");
}
