//! Lifecycle orchestration: cache semantics, delete idempotence, batch
//! behavior and embedding enqueue.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use vcon_application::plugins::PluginManager;
use vcon_application::use_cases::VconService;
use vcon_domain::entities::EmbeddingContentType;
use vcon_domain::entities::{Attachment, Dialog, Encoding, Party, Vcon};
use vcon_domain::error::Error;
use vcon_domain::ports::{EmbeddingQueue, VconRepository};
use vcon_domain::value_objects::{RequestContext, VconUpdate};

use crate::support::{CountingCache, MemoryRepository, RecordingQueue};

fn sample_vcon(subject: &str) -> Vcon {
    let mut vcon = Vcon::new();
    vcon.subject = Some(subject.to_owned());
    vcon.parties.push(Party {
        name: Some("Alice".to_owned()),
        ..Party::default()
    });
    vcon
}

struct Fixture {
    service: VconService,
    repository: Arc<MemoryRepository>,
    cache: Arc<CountingCache>,
    queue: Arc<RecordingQueue>,
}

fn fixture() -> Fixture {
    let repository = MemoryRepository::new();
    let cache = CountingCache::new();
    let queue = RecordingQueue::new();
    let service = VconService::new(
        Arc::clone(&repository) as _,
        Arc::clone(&queue) as _,
        Arc::new(PluginManager::empty()),
        Some(Arc::clone(&cache) as _),
    );
    Fixture {
        service,
        repository,
        cache,
        queue,
    }
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("hello world");
    let uuid = vcon.uuid;

    let metadata = f.service.create(vcon, &ctx).await.unwrap();
    assert_eq!(metadata.uuid, uuid);
    assert!(metadata.updated_at >= metadata.created_at);

    let fetched = f.service.get(&uuid, &ctx).await.unwrap();
    assert_eq!(fetched.uuid, uuid);
    assert_eq!(fetched.subject.as_deref(), Some("hello world"));
    assert_eq!(fetched.parties[0].name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn duplicate_uuid_is_a_conflict() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("first");
    let dup = Vcon {
        subject: Some("second".to_owned()),
        ..vcon.clone()
    };
    f.service.create(vcon, &ctx).await.unwrap();
    let err = f.service.create(dup, &ctx).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[tokio::test]
async fn update_invalidates_the_cached_copy() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("before");
    let uuid = vcon.uuid;
    f.service.create(vcon, &ctx).await.unwrap();

    // Populate the cache, then update behind it.
    f.service.get(&uuid, &ctx).await.unwrap();
    assert!(f.cache.contains(&format!("vcon:{uuid}")).await);

    f.service
        .update(
            &uuid,
            VconUpdate {
                subject: Some("after".to_owned()),
                ..VconUpdate::default()
            },
            &ctx,
        )
        .await
        .unwrap();

    // A read immediately after the commit must see the new state.
    let fetched = f.service.get(&uuid, &ctx).await.unwrap();
    assert_eq!(fetched.subject.as_deref(), Some("after"));
}

#[tokio::test]
async fn delete_is_not_found_the_second_time() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("gone");
    let uuid = vcon.uuid;
    f.service.create(vcon, &ctx).await.unwrap();

    f.service.delete(&uuid, &ctx).await.unwrap();
    let err = f.service.delete(&uuid, &ctx).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = f.service.get(&uuid, &ctx).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn delete_invalidates_cache_and_purges_tasks() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("cached then deleted");
    let uuid = vcon.uuid;
    f.service.create(vcon, &ctx).await.unwrap();
    f.service.get(&uuid, &ctx).await.unwrap();

    let deletes_before = f.cache.deletes.load(Ordering::SeqCst);
    f.service.delete(&uuid, &ctx).await.unwrap();
    assert!(f.cache.deletes.load(Ordering::SeqCst) > deletes_before);
    assert!(!f.cache.contains(&format!("vcon:{uuid}")).await);
    assert_eq!(f.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn create_enqueues_eligible_content_only() {
    let f = fixture();
    let ctx = RequestContext::now();
    let mut vcon = sample_vcon("a subject");
    vcon.dialog.push(Dialog::text("spoken words"));
    let mut encoded = Dialog::text("eyJiYXNlNjQi");
    encoded.encoding = Some(Encoding::Base64url);
    vcon.dialog.push(encoded);

    f.service.create(vcon, &ctx).await.unwrap();

    let enqueued = f.queue.enqueued.lock().await;
    let refs: Vec<&str> = enqueued.iter().map(|t| t.content_reference.as_str()).collect();
    assert_eq!(refs, vec!["subject", "dialog_0"]);
}

#[tokio::test]
async fn update_enqueues_only_the_appended_children() {
    let f = fixture();
    let ctx = RequestContext::now();
    let mut vcon = sample_vcon("subject");
    vcon.dialog.push(Dialog::text("original"));
    let uuid = vcon.uuid;
    f.service.create(vcon, &ctx).await.unwrap();
    f.queue.enqueued.lock().await.clear();

    f.service
        .add_dialog(&uuid, Dialog::text("appended"), &ctx)
        .await
        .unwrap();

    let enqueued = f.queue.enqueued.lock().await;
    assert_eq!(enqueued.len(), 1);
    assert_eq!(enqueued[0].content_type, EmbeddingContentType::Dialog);
    assert_eq!(enqueued[0].content_reference, "dialog_1");
    assert_eq!(enqueued[0].content_text, "appended");
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let f = fixture();
    let ctx = RequestContext::now();
    let vcon = sample_vcon("x");
    let uuid = vcon.uuid;
    f.service.create(vcon, &ctx).await.unwrap();

    let err = f
        .service
        .update(&uuid, VconUpdate::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn tenant_id_is_derived_from_the_tenant_attachment() {
    let f = fixture();
    let ctx = RequestContext::now();
    let mut vcon = sample_vcon("tenant test");
    vcon.attachments.push(Attachment {
        attachment_type: Some("tenant".to_owned()),
        encoding: Some(Encoding::Json),
        body: Some(r#"{"id":"acme"}"#.to_owned()),
        ..Attachment::default()
    });

    let metadata = f.service.create(vcon, &ctx).await.unwrap();
    assert_eq!(metadata.tenant_id.as_deref(), Some("acme"));
}

#[tokio::test]
async fn batch_create_is_best_effort() {
    let f = fixture();
    let ctx = RequestContext::now();
    let first = sample_vcon("one");
    let duplicate = Vcon {
        subject: Some("dup".to_owned()),
        ..first.clone()
    };
    let third = sample_vcon("three");
    let third_uuid = third.uuid;

    let report = f
        .service
        .create_batch(vec![first, duplicate, third], &ctx)
        .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert!(report.items[1].error.is_some());
    // The failure did not roll back the later item.
    assert!(f.repository.get(&third_uuid).await.unwrap().is_some());
}

#[tokio::test]
async fn cache_outage_degrades_to_the_store() {
    // No cache configured at all behaves like an unavailable backend.
    let repository = MemoryRepository::new();
    let queue = RecordingQueue::new();
    let service = VconService::new(
        Arc::clone(&repository) as _,
        queue as _,
        Arc::new(PluginManager::empty()),
        None,
    );
    let ctx = RequestContext::now();
    let vcon = sample_vcon("no cache");
    let uuid = vcon.uuid;
    service.create(vcon, &ctx).await.unwrap();
    assert_eq!(
        service.get(&uuid, &ctx).await.unwrap().subject.as_deref(),
        Some("no cache")
    );
}
