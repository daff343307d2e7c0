//! Hook pipeline composition and failure isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use vcon_application::plugins::PluginManager;
use vcon_application::use_cases::VconService;
use vcon_domain::entities::{Party, Vcon};
use vcon_domain::error::{Error, Result};
use vcon_domain::ports::VconRepository;
use vcon_domain::ports::plugin::VconPlugin;
use vcon_domain::value_objects::RequestContext;

use crate::support::{MemoryRepository, RecordingQueue};

/// Stamps an extension in beforeCreate so pipeline mutation is observable.
struct StampingPlugin;

#[async_trait]
impl VconPlugin for StampingPlugin {
    fn name(&self) -> &str {
        "stamper"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn before_create(&self, mut vcon: Vcon, _ctx: &RequestContext) -> Result<Vcon> {
        vcon.extensions
            .get_or_insert_with(Vec::new)
            .push("stamped".to_owned());
        Ok(vcon)
    }
}

/// Denies every read and delete (legal hold).
struct HoldPlugin;

#[async_trait]
impl VconPlugin for HoldPlugin {
    fn name(&self) -> &str {
        "legal-hold"
    }

    fn version(&self) -> &str {
        "0.2.0"
    }

    async fn before_delete(&self, _uuid: &Uuid, _ctx: &RequestContext) -> Result<()> {
        Err(Error::internal("record is under legal hold"))
    }
}

/// Counts afterCreate invocations and always fails.
struct FlakyObserver {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl VconPlugin for FlakyObserver {
    fn name(&self) -> &str {
        "flaky-observer"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    async fn after_create(&self, _vcon: &Vcon, _ctx: &RequestContext) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::internal("observer blew up"))
    }
}

fn sample_vcon() -> Vcon {
    let mut vcon = Vcon::new();
    vcon.parties.push(Party {
        name: Some("Alice".to_owned()),
        ..Party::default()
    });
    vcon
}

fn service_with(plugins: Vec<Arc<dyn VconPlugin>>) -> (VconService, Arc<MemoryRepository>) {
    let repository = MemoryRepository::new();
    let service = VconService::new(
        Arc::clone(&repository) as _,
        RecordingQueue::new() as _,
        Arc::new(PluginManager::new(plugins)),
        None,
    );
    (service, repository)
}

#[tokio::test]
async fn before_create_pipeline_mutates_the_document() {
    let (service, repository) = service_with(vec![Arc::new(StampingPlugin)]);
    let vcon = sample_vcon();
    let uuid = vcon.uuid;
    service.create(vcon, &RequestContext::now()).await.unwrap();

    let stored = repository.get(&uuid).await.unwrap().unwrap();
    assert_eq!(stored.extensions, Some(vec!["stamped".to_owned()]));
}

#[tokio::test]
async fn before_delete_failure_aborts_with_the_plugin_named() {
    let (service, repository) = service_with(vec![Arc::new(HoldPlugin)]);
    let vcon = sample_vcon();
    let uuid = vcon.uuid;
    service.create(vcon, &RequestContext::now()).await.unwrap();

    let err = service.delete(&uuid, &RequestContext::now()).await.unwrap_err();
    match err {
        Error::Hook { plugin, .. } => assert_eq!(plugin, "legal-hold"),
        other => panic!("expected hook error, got {other}"),
    }
    // The delete never happened.
    assert!(repository.get(&uuid).await.unwrap().is_some());
}

#[tokio::test]
async fn after_create_failures_are_swallowed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (service, repository) = service_with(vec![Arc::new(FlakyObserver {
        calls: Arc::clone(&calls),
    })]);
    let vcon = sample_vcon();
    let uuid = vcon.uuid;

    // The failing observer ran but the create still succeeded.
    service.create(vcon, &RequestContext::now()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(repository.get(&uuid).await.unwrap().is_some());
}

#[tokio::test]
async fn hooks_run_in_registration_order() {
    struct Appender(&'static str);

    #[async_trait]
    impl VconPlugin for Appender {
        fn name(&self) -> &str {
            self.0
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn before_create(&self, mut vcon: Vcon, _ctx: &RequestContext) -> Result<Vcon> {
            vcon.extensions
                .get_or_insert_with(Vec::new)
                .push(self.0.to_owned());
            Ok(vcon)
        }
    }

    let (service, repository) = service_with(vec![
        Arc::new(Appender("first")),
        Arc::new(Appender("second")),
    ]);
    let vcon = sample_vcon();
    let uuid = vcon.uuid;
    service.create(vcon, &RequestContext::now()).await.unwrap();

    let stored = repository.get(&uuid).await.unwrap().unwrap();
    assert_eq!(
        stored.extensions,
        Some(vec!["first".to_owned(), "second".to_owned()])
    );
}

#[tokio::test]
async fn plugin_tool_dispatch_finds_the_owner() {
    struct Tooled;

    #[async_trait]
    impl VconPlugin for Tooled {
        fn name(&self) -> &str {
            "tooled"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn tools(&self) -> Vec<vcon_domain::ports::plugin::PluginTool> {
            vec![vcon_domain::ports::plugin::PluginTool {
                name: "echo".to_owned(),
                description: "echo the arguments".to_owned(),
                input_schema: serde_json::json!({"type": "object"}),
            }]
        }

        async fn handle_tool_call(
            &self,
            _name: &str,
            args: serde_json::Value,
            _ctx: &RequestContext,
        ) -> Result<serde_json::Value> {
            Ok(args)
        }
    }

    let manager = PluginManager::new(vec![Arc::new(Tooled)]);
    let out = manager
        .handle_tool_call("echo", serde_json::json!({"x": 1}), &RequestContext::now())
        .await
        .unwrap();
    assert_eq!(out, serde_json::json!({"x": 1}));

    let err = manager
        .handle_tool_call("missing", serde_json::json!({}), &RequestContext::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
