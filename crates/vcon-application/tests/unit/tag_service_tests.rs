//! Tag subsystem semantics over the distinguished attachment.

use std::collections::BTreeMap;
use std::sync::Arc;

use vcon_application::plugins::PluginManager;
use vcon_application::use_cases::{TagService, VconService};
use vcon_domain::entities::{Party, Vcon};
use vcon_domain::error::Error;
use vcon_domain::ports::VconRepository;
use vcon_domain::tags::parse_tags_body;
use vcon_domain::value_objects::{RequestContext, UniqueTagsOptions};

use crate::support::{CountingCache, MemoryRepository, MemoryTagRepository, RecordingQueue};

struct Fixture {
    vcons: VconService,
    tags: TagService,
    repository: Arc<MemoryRepository>,
}

fn fixture() -> Fixture {
    let repository = MemoryRepository::new();
    let cache = CountingCache::new();
    let tag_repo = Arc::new(MemoryTagRepository {
        repository: Arc::clone(&repository),
    });
    let vcons = VconService::new(
        Arc::clone(&repository) as _,
        RecordingQueue::new() as _,
        Arc::new(PluginManager::empty()),
        Some(Arc::clone(&cache) as _),
    );
    let tags = TagService::new(tag_repo as _, Some(cache as _));
    Fixture {
        vcons,
        tags,
        repository,
    }
}

async fn seeded_vcon(f: &Fixture, subject: &str) -> uuid::Uuid {
    let mut vcon = Vcon::new();
    vcon.subject = Some(subject.to_owned());
    vcon.parties.push(Party {
        name: Some("Caller".to_owned()),
        ..Party::default()
    });
    let uuid = vcon.uuid;
    f.vcons.create(vcon, &RequestContext::now()).await.unwrap();
    uuid
}

#[tokio::test]
async fn set_and_get_round_trip() {
    let f = fixture();
    let uuid = seeded_vcon(&f, "tagged").await;

    f.tags.set(&uuid, "department", "sales", true).await.unwrap();
    f.tags.set(&uuid, "priority", "high", true).await.unwrap();

    let all = f.tags.get_all(&uuid).await.unwrap();
    assert_eq!(all.get("department").map(String::as_str), Some("sales"));
    assert_eq!(all.get("priority").map(String::as_str), Some("high"));

    // The attachment body is exactly a JSON array of "key:value" strings.
    let vcon = f.repository.get(&uuid).await.unwrap().unwrap();
    let attachment = vcon.attachment_of_type("tags").unwrap();
    let parsed = parse_tags_body(attachment.body.as_deref().unwrap()).unwrap();
    assert_eq!(parsed, all);
}

#[tokio::test]
async fn set_without_overwrite_conflicts_on_existing_key() {
    let f = fixture();
    let uuid = seeded_vcon(&f, "x").await;
    f.tags.set(&uuid, "department", "sales", false).await.unwrap();
    let err = f
        .tags
        .set(&uuid, "department", "support", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    // Overwrite replaces.
    let all = f.tags.set(&uuid, "department", "support", true).await.unwrap();
    assert_eq!(all.get("department").map(String::as_str), Some("support"));
}

#[tokio::test]
async fn update_merges_or_replaces() {
    let f = fixture();
    let uuid = seeded_vcon(&f, "x").await;
    f.tags.set(&uuid, "a", "1", true).await.unwrap();

    let mut incoming = BTreeMap::new();
    incoming.insert("b".to_owned(), "2".to_owned());

    let merged = f.tags.update(&uuid, incoming.clone(), true).await.unwrap();
    assert_eq!(merged.len(), 2);

    let replaced = f.tags.update(&uuid, incoming, false).await.unwrap();
    assert_eq!(replaced.len(), 1);
    assert!(replaced.contains_key("b"));
}

#[tokio::test]
async fn remove_and_remove_all() {
    let f = fixture();
    let uuid = seeded_vcon(&f, "x").await;
    f.tags.set(&uuid, "a", "1", true).await.unwrap();
    f.tags.set(&uuid, "b", "2", true).await.unwrap();

    let left = f.tags.remove(&uuid, "a").await.unwrap();
    assert_eq!(left.len(), 1);

    f.tags.remove_all(&uuid).await.unwrap();
    assert!(f.tags.get_all(&uuid).await.unwrap().is_empty());

    // The attachment itself is gone once the tag set is empty.
    let vcon = f.repository.get(&uuid).await.unwrap().unwrap();
    assert!(vcon.attachment_of_type("tags").is_none());
}

#[tokio::test]
async fn search_by_tags_uses_and_semantics() {
    let f = fixture();
    let a = seeded_vcon(&f, "a").await;
    let b = seeded_vcon(&f, "b").await;
    let c = seeded_vcon(&f, "c").await;

    f.tags.set(&a, "department", "sales", true).await.unwrap();
    f.tags.set(&a, "priority", "high", true).await.unwrap();
    f.tags.set(&b, "department", "sales", true).await.unwrap();
    f.tags.set(&b, "priority", "low", true).await.unwrap();
    f.tags.set(&c, "department", "support", true).await.unwrap();
    f.tags.set(&c, "priority", "high", true).await.unwrap();

    let mut wanted = BTreeMap::new();
    wanted.insert("department".to_owned(), "sales".to_owned());
    wanted.insert("priority".to_owned(), "high".to_owned());

    let hits = f.tags.search(&wanted, 50).await.unwrap();
    assert_eq!(hits, vec![a]);
}

#[tokio::test]
async fn unique_tags_reports_keys_values_and_counts() {
    let f = fixture();
    let a = seeded_vcon(&f, "a").await;
    let b = seeded_vcon(&f, "b").await;
    f.tags.set(&a, "department", "sales", true).await.unwrap();
    f.tags.set(&b, "department", "sales", true).await.unwrap();
    f.tags.set(&b, "priority", "low", true).await.unwrap();

    let report = f
        .tags
        .unique(&UniqueTagsOptions {
            include_counts: true,
            ..UniqueTagsOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.keys, vec!["department".to_owned(), "priority".to_owned()]);
    assert_eq!(
        report.tags_by_key.get("department"),
        Some(&vec!["sales".to_owned()])
    );
    let counts = report.counts_per_value.unwrap();
    assert_eq!(counts["department"]["sales"], 2);
}

#[tokio::test]
async fn tag_keys_with_colons_are_rejected() {
    let f = fixture();
    let uuid = seeded_vcon(&f, "x").await;
    let err = f.tags.set(&uuid, "a:b", "v", true).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn tags_of_unknown_vcon_is_not_found() {
    let f = fixture();
    let err = f.tags.get_all(&uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
