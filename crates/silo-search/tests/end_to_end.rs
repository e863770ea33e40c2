//! Upload → index → search → deliver, over the in-memory channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use silo_ingest::{FilterPolicy, Forwarder, IngestWorker, RetryPolicy};
use silo_search::{DeliveryCoordinator, DeliveryStatus, SearchEngine, SearchQuery};
use silo_shared::memory::InMemoryChannel;
use silo_shared::{ChatId, Upload, UploadMetadata};
use silo_store::{IndexStore, StoreOptions};

fn upload(name: &str, caption: Option<&str>, content: &[u8]) -> Upload {
    Upload::new(
        UploadMetadata {
            file_name: name.to_string(),
            caption: caption.map(str::to_string),
            size_bytes: content.len() as u64,
            mime_type: "image/jpeg".to_string(),
        },
        content.to_vec(),
    )
}

#[tokio::test]
async fn cat_meme_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(InMemoryChannel::new());
    let store = Arc::new(
        IndexStore::open(dir.path().join("index.json"), StoreOptions::default()).unwrap(),
    );

    let retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    let forwarder = Forwarder::new(channel.clone(), store.clone(), retry.clone());
    let (_stop_tx, stop_rx) = watch::channel(false);
    let (handle, worker) = IngestWorker::new(
        8,
        FilterPolicy::default(),
        forwarder,
        store.clone(),
        retry,
        stop_rx,
    );
    let worker = tokio::spawn(worker.run());

    // Upload is accepted, forwarded, and indexed with sequence number 1.
    let outcome = handle
        .submit(upload("cat_meme.jpg", Some("funny cat"), b"jpeg bytes"))
        .await
        .unwrap();
    assert_eq!(outcome.sequence_no, 1);

    // A keyword query finds exactly that record.
    let engine = SearchEngine::new(store.clone(), 50);
    let page = engine
        .query(&SearchQuery::from_text("cat", 10))
        .await
        .unwrap();
    assert_eq!(page.matches.len(), 1);
    assert_eq!(page.matches[0].storage_ref, outcome.storage_ref);
    assert_eq!(page.matches[0].file_name, "cat_meme.jpg");
    assert!(page.is_end());

    // Delivery copies the stored object to the requesting chat.
    let coordinator = DeliveryCoordinator::new(channel.clone(), 5, Duration::from_millis(1));
    let reports = coordinator
        .deliver(ChatId(1234), page.matches)
        .run_to_completion()
        .await;
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        reports[0].status,
        DeliveryStatus::Delivered { .. }
    ));
    assert_eq!(
        channel.copies().await,
        vec![(outcome.storage_ref, ChatId(1234))]
    );

    drop(handle);
    worker.await.unwrap();
}
