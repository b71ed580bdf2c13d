//! Exercise dry-run requests against the in-memory API server.
use std::sync::atomic::AtomicU16;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use dryproof_client_utils::is_conflict;
use dryproof_client_utils::is_not_found;
use dryproof_client_utils::is_transport;
use dryproof_client_utils::RejectedError;
use dryproof_client_utils::TransportError;
use dryproof_context::Context;
use dryproof_rest::fixture::ApiServer;
use dryproof_rest::Api;
use dryproof_rest::DynamicObject;
use dryproof_rest::IRest;
use dryproof_rest::PatchType;
use dryproof_rest::Request;
use dryproof_rest::Resource;
use dryproof_rest::Response;
use dryproof_rest::Rest;
use dryproof_rest::Verb;

use crate::ConvergentUpdater;
use crate::DryRunExecutor;
use crate::DryRunFailed;
use crate::MissingName;
use crate::MutationVerb;
use crate::UpdaterBackoff;

/// Set of fixtures to use in tests.
struct Fixtures {
    api: Api<DynamicObject>,
    context: Context,
    executor: DryRunExecutor,
    server: ApiServer,
    updater: ConvergentUpdater,
}

impl Fixtures {
    fn new() -> Fixtures {
        let server = ApiServer::new();
        let rest = Rest::from(server.clone());
        let updater = ConvergentUpdater::new(UpdaterBackoff {
            jitter: 0.0,
            max_delay: 1,
            start_delay: 1,
            ..Default::default()
        });
        Fixtures {
            api: Api::namespaced(rest.clone(), "widgets", "ns1"),
            context: Context::fixture(),
            executor: DryRunExecutor::new(rest),
            server,
            updater,
        }
    }
}

/// REST transport that can never reach the server.
#[derive(Clone, Default)]
struct Unreachable {
    calls: Arc<AtomicU16>,
}

#[async_trait::async_trait]
impl IRest for Unreachable {
    async fn execute(&self, _: Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let error = anyhow::anyhow!("tcp connect error: connection refused");
        Err(error.context(TransportError))
    }
}

fn widget(name: &str) -> DynamicObject {
    let mut widget = DynamicObject::new(name, "ns1");
    widget.data.insert("spec".into(), json!({"size": 3}));
    widget
}

#[tokio::test]
async fn create_is_not_persisted() {
    let fixtures = Fixtures::new();
    fixtures
        .executor
        .create(&fixtures.context, "widgets", "ns1", &widget("w1"), None)
        .await
        .unwrap();

    let error = fixtures.api.get("w1").await.unwrap_err();
    assert!(is_not_found(&error));
    assert!(fixtures.server.is_empty());

    let requests = fixtures.server.requests();
    assert_eq!(requests[0].verb, Verb::Post);
    assert_eq!(requests[0].path.render(), "namespaces/ns1/widgets");
    assert!(requests[0].is_dry_run());
}

#[tokio::test]
async fn create_twice_is_idempotent() {
    let fixtures = Fixtures::new();
    for _ in 0..2 {
        fixtures
            .executor
            .create(&fixtures.context, "widgets", "ns1", &widget("w1"), None)
            .await
            .unwrap();
    }
    let error = fixtures.api.get("w1").await.unwrap_err();
    assert!(is_not_found(&error));
}

#[tokio::test]
async fn create_rejection_is_surfaced() {
    let fixtures = Fixtures::new();
    fixtures.server.reject("widgets", "spec.size: must be even");
    let error = fixtures
        .executor
        .create(&fixtures.context, "widgets", "ns1", &widget("w1"), None)
        .await
        .unwrap_err();

    let rejected = error.downcast_ref::<RejectedError>().unwrap();
    assert_eq!(rejected.code, 422);
    assert_eq!(rejected.message, "spec.size: must be even");
    let failed = error.downcast_ref::<DryRunFailed>().unwrap();
    assert_eq!(failed.verb, MutationVerb::Create);
    assert_eq!(failed.name, "w1");
    assert_eq!(fixtures.server.requests().len(), 1);
}

#[tokio::test]
async fn create_existing_is_rejected() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();
    let error = fixtures
        .executor
        .create(&fixtures.context, "widgets", "ns1", &widget("w1"), None)
        .await
        .unwrap_err();
    assert!(!is_conflict(&error));
    let rejected = error.downcast_ref::<RejectedError>().unwrap();
    assert_eq!(rejected.reason, "AlreadyExists");
}

#[tokio::test]
async fn create_subresource_path() {
    let fixtures = Fixtures::new();
    fixtures
        .executor
        .create(
            &fixtures.context,
            "widgets",
            "ns1",
            &widget("w1"),
            Some("status"),
        )
        .await
        .unwrap();
    let requests = fixtures.server.requests();
    assert_eq!(requests[0].path.render(), "namespaces/ns1/widgets/status");
    assert!(requests[0].is_dry_run());
}

#[tokio::test]
async fn update_label_is_not_persisted() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();

    let api = &fixtures.api;
    let context = &fixtures.context;
    let executor = &fixtures.executor;
    fixtures
        .updater
        .run(context, || async move {
            let mut widget = api.get("w1").await?;
            widget
                .metadata_mut()
                .labels
                .insert("key".into(), "42".into());
            executor
                .update(context, "widgets", "w1", "ns1", &widget, None)
                .await
        })
        .await
        .unwrap();

    let widget = fixtures.api.get("w1").await.unwrap();
    assert!(!widget.metadata.labels.contains_key("key"));

    let update = fixtures
        .server
        .requests()
        .into_iter()
        .find(|request| request.verb == Verb::Put)
        .unwrap();
    assert_eq!(update.path.render(), "namespaces/ns1/widgets/w1");
    assert!(update.is_dry_run());
}

#[tokio::test]
async fn update_retries_injected_conflicts() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();
    fixtures.server.inject_conflicts(2);

    let api = &fixtures.api;
    let context = &fixtures.context;
    let executor = &fixtures.executor;
    fixtures
        .updater
        .run(context, || async move {
            let widget = api.get("w1").await?;
            executor
                .update(context, "widgets", "w1", "ns1", &widget, None)
                .await
        })
        .await
        .unwrap();

    let puts = fixtures
        .server
        .requests()
        .into_iter()
        .filter(|request| request.verb == Verb::Put)
        .count();
    assert_eq!(puts, 3);
}

#[tokio::test]
async fn update_stale_version_converges() {
    let fixtures = Fixtures::new();
    let stale = fixtures.api.create(&widget("w1")).await.unwrap();
    fixtures.server.touch("widgets", "ns1", "w1");

    let api = &fixtures.api;
    let context = &fixtures.context;
    let executor = &fixtures.executor;
    let stale = &stale;
    let attempts = std::sync::atomic::AtomicU16::new(0);
    let attempts = &attempts;
    fixtures
        .updater
        .run(context, || async move {
            // The first attempt submits the version read before the concurrent change.
            let first = attempts.fetch_add(1, std::sync::atomic::Ordering::Relaxed) == 0;
            let widget = match first {
                true => stale.clone(),
                false => api.get("w1").await?,
            };
            executor
                .update(context, "widgets", "w1", "ns1", &widget, None)
                .await
        })
        .await
        .unwrap();
    assert_eq!(attempts.load(std::sync::atomic::Ordering::Relaxed), 2);
}

#[tokio::test]
async fn update_missing_is_not_found() {
    let fixtures = Fixtures::new();
    let error = fixtures
        .executor
        .update(&fixtures.context, "widgets", "w1", "ns1", &widget("w1"), None)
        .await
        .unwrap_err();
    assert!(is_not_found(&error));
}

#[tokio::test]
async fn patch_is_not_persisted() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();
    let patches = [
        (PatchType::Merge, br#"{"metadata": {"labels": {"key": "42"}}}"#.to_vec()),
        (
            PatchType::StrategicMerge,
            br#"{"metadata": {"labels": {"key": "42"}}}"#.to_vec(),
        ),
        (
            PatchType::Json,
            br#"[{"op": "add", "path": "/metadata/labels", "value": {"key": "42"}}]"#.to_vec(),
        ),
    ];
    for (patch_type, patch) in patches {
        fixtures
            .executor
            .patch(
                &fixtures.context,
                "widgets",
                "w1",
                "ns1",
                patch_type,
                &patch,
                None,
            )
            .await
            .unwrap();
    }

    let widget = fixtures.api.get("w1").await.unwrap();
    assert!(!widget.metadata.labels.contains_key("key"));
    let content_types: Vec<String> = fixtures
        .server
        .requests()
        .into_iter()
        .filter(|request| request.verb == Verb::Patch)
        .map(|request| {
            assert!(request.is_dry_run());
            request.body.unwrap().content_type
        })
        .collect();
    assert_eq!(
        content_types,
        vec![
            "application/merge-patch+json",
            "application/strategic-merge-patch+json",
            "application/json-patch+json",
        ],
    );
}

#[tokio::test]
async fn invalid_patch_is_rejected() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();
    let patch = br#"[{"op": "remove", "path": "/spec/missing"}]"#;
    let error = fixtures
        .executor
        .patch(
            &fixtures.context,
            "widgets",
            "w1",
            "ns1",
            PatchType::Json,
            patch,
            None,
        )
        .await
        .unwrap_err();
    let rejected = error.downcast_ref::<RejectedError>().unwrap();
    assert_eq!(rejected.code, 422);
}

#[tokio::test]
async fn directive_applied_for_every_kind() {
    let kinds = [
        "virtualmachineinstances",
        "virtualmachines",
        "virtualmachineinstancemigrations",
        "virtualmachineinstancepresets",
        "virtualmachineinstancereplicasets",
    ];
    let fixtures = Fixtures::new();
    for kind in kinds {
        fixtures
            .server
            .insert(kind, json!({"metadata": {"name": "r1", "namespace": "ns1"}}));
        let body = widget("r2");
        let patch = br#"{"metadata": {"labels": {"key": "42"}}}"#;
        let context = &fixtures.context;
        fixtures
            .executor
            .create(context, kind, "ns1", &body, None)
            .await
            .unwrap();
        let current = fixtures.server.object(kind, "ns1", "r1").unwrap();
        fixtures
            .executor
            .update(context, kind, "r1", "ns1", &current, None)
            .await
            .unwrap();
        fixtures
            .executor
            .patch(context, kind, "r1", "ns1", PatchType::Merge, patch, None)
            .await
            .unwrap();
        assert_eq!(fixtures.server.object(kind, "ns1", "r1"), Some(current));
        assert!(fixtures.server.object(kind, "ns1", "r2").is_none());
    }

    let requests = fixtures.server.requests();
    assert_eq!(requests.len(), kinds.len() * 3);
    assert!(requests.iter().all(|request| request.is_dry_run()));
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let transport = Unreachable::default();
    let executor = DryRunExecutor::new(Rest::from(transport.clone()));
    let context = Context::fixture();
    let updater = ConvergentUpdater::new(UpdaterBackoff {
        jitter: 0.0,
        max_delay: 1,
        start_delay: 1,
        ..Default::default()
    });

    let executor = &executor;
    let context = &context;
    let error = updater
        .run(context, || async move {
            executor
                .update(context, "widgets", "w1", "ns1", &widget("w1"), None)
                .await
        })
        .await
        .unwrap_err();

    assert_eq!(transport.calls.load(Ordering::Relaxed), 1);
    assert!(is_transport(&error));
    assert!(!is_conflict(&error));
    let failed = error.downcast_ref::<DryRunFailed>().unwrap();
    assert_eq!(failed.verb, MutationVerb::Update);
    assert_eq!(failed.name, "w1");
}

#[tokio::test]
async fn transport_failure_on_create_and_patch() {
    let transport = Unreachable::default();
    let executor = DryRunExecutor::new(Rest::from(transport.clone()));
    let context = Context::fixture();

    let error = executor
        .create(&context, "widgets", "ns1", &widget("w1"), None)
        .await
        .unwrap_err();
    assert!(is_transport(&error));
    assert!(error.downcast_ref::<DryRunFailed>().is_some());

    let patch = br#"{"metadata": {"labels": {"key": "42"}}}"#;
    let error = executor
        .patch(&context, "widgets", "w1", "ns1", PatchType::Merge, patch, None)
        .await
        .unwrap_err();
    assert!(is_transport(&error));
    assert_eq!(
        error.downcast_ref::<DryRunFailed>().unwrap().verb,
        MutationVerb::Patch,
    );
    assert_eq!(transport.calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn empty_name_is_rejected_before_sending() {
    let fixtures = Fixtures::new();
    fixtures.api.create(&widget("w1")).await.unwrap();
    let context = &fixtures.context;

    let error = fixtures
        .executor
        .update(context, "widgets", "", "ns1", &widget("w1"), None)
        .await
        .unwrap_err();
    let missing = error.downcast_ref::<MissingName>().unwrap();
    assert_eq!(missing.kind, "widgets");

    let patch = br#"{"metadata": {"labels": {"key": "42"}}}"#;
    let error = fixtures
        .executor
        .patch(context, "widgets", "", "ns1", PatchType::Merge, patch, None)
        .await
        .unwrap_err();
    assert!(error.downcast_ref::<MissingName>().is_some());

    let sent = fixtures
        .server
        .requests()
        .into_iter()
        .filter(|request| request.verb != Verb::Post)
        .count();
    assert_eq!(sent, 0);
}
