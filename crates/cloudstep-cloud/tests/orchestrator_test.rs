mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use cloudstep_cloud::{
    ApiError, CancelScope, DeployAction, DeployError, DeployTarget, Operation, OperationStatus,
    Orchestrator, Poller, PromoteError,
};
use common::{Call, FakePlane};

const NAME: &str = "apps/p/services/default/versions/v1";

fn target() -> DeployTarget<Value> {
    DeployTarget {
        parent: "apps/p/services/default".to_owned(),
        id: "v1".to_owned(),
        name: NAME.to_owned(),
        resource: json!({"runtime": "go122"}),
    }
}

fn orchestrator(plane: &FakePlane<Value>) -> Orchestrator<&FakePlane<Value>> {
    Orchestrator::with_poller(plane, Poller::new(Duration::from_secs(1)))
}

fn done(payload: Value) -> Operation {
    Operation::succeeded("operations/deploy", payload)
}

#[tokio::test(start_paused = true)]
async fn absent_resource_is_created() {
    let plane = FakePlane::new().with_polls([Ok(done(json!({"id": "v1"})))]);

    let deployed = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(deployed.action, DeployAction::Created);
    assert_eq!(
        plane.calls(),
        vec![
            Call::GetResource(NAME.to_owned()),
            Call::Create {
                parent: "apps/p/services/default".to_owned(),
                id: "v1".to_owned(),
                body: json!({"runtime": "go122"}),
            },
            Call::GetOperation("operations/deploy".to_owned()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn present_resource_is_updated() {
    let plane = FakePlane::new()
        .with_existing(json!({"id": "v1"}))
        .with_polls([Ok(done(json!({"id": "v1"})))]);

    let deployed = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(deployed.action, DeployAction::Updated);
    let calls = plane.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::Update { name, .. } if name == NAME)));
    assert!(!calls.iter().any(|c| matches!(c, Call::Create { .. })));
}

#[tokio::test]
async fn lookup_failure_is_not_treated_as_absent() {
    let plane = FakePlane::new().with_lookup_error(ApiError::Status {
        url: NAME.to_owned(),
        status: 403,
        message: "caller lacks permission".to_owned(),
    });

    let err = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Lookup { .. }));
    assert_eq!(plane.calls(), vec![Call::GetResource(NAME.to_owned())]);
}

#[tokio::test(start_paused = true)]
async fn success_returns_final_resource() {
    let plane = FakePlane::new().with_polls([
        Ok(Operation::pending("operations/deploy")),
        Ok(done(json!({"id": "v1", "servingStatus": "SERVING"}))),
    ]);

    let deployed = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(deployed.resource["servingStatus"], "SERVING");
}

#[tokio::test(start_paused = true)]
async fn empty_success_payload_refetches_resource() {
    let plane = FakePlane::new().with_polls([Ok(done(Value::Null))]);

    let deployed = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(deployed.resource, json!({"runtime": "go122"}));
    assert_eq!(plane.calls().last(), Some(&Call::GetResource(NAME.to_owned())));
}

#[tokio::test(start_paused = true)]
async fn remote_failure_surfaces_code() {
    let plane = FakePlane::new().with_polls([Ok(Operation::failed(
        "operations/deploy",
        OperationStatus {
            code: 3,
            message: "invalid runtime".to_owned(),
            details: vec![json!({"field": "runtime"})],
        },
    ))]);

    let err = orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap_err();

    assert!(!err.is_cancellation());
    let status = err.remote_status().unwrap();
    assert_eq!(status.code, 3);
    assert_eq!(status.message, "invalid runtime");
}

#[tokio::test]
async fn submit_done_immediately_needs_no_poll() {
    let plane = FakePlane::new().with_submit(done(json!({"id": "v1"})));

    orchestrator(&plane)
        .deploy(&target(), &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(plane.operation_polls(), 0);
}

#[tokio::test]
async fn cancelled_scope_makes_no_calls() {
    let plane = FakePlane::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = orchestrator(&plane)
        .deploy(&target(), &CancelScope::new(token))
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert!(plane.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn promote_routes_all_traffic_to_version() {
    let plane = FakePlane::<Value>::new()
        .with_polls([Ok(Operation::succeeded("operations/split", json!({})))]);

    orchestrator(&plane)
        .promote("apps/p/services/default", "v1", &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(
        plane.calls(),
        vec![
            Call::TrafficSplit {
                service: "apps/p/services/default".to_owned(),
                allocations: BTreeMap::from([("v1".to_owned(), 1.0)]),
            },
            Call::GetOperation("operations/split".to_owned()),
        ]
    );
}

#[tokio::test]
async fn promote_failure_is_reported() {
    let plane = FakePlane::<Value>::new().with_traffic(Operation::failed(
        "operations/split",
        OperationStatus {
            code: 9,
            message: "version not ready".to_owned(),
            details: Vec::new(),
        },
    ));

    let err = orchestrator(&plane)
        .promote("apps/p/services/default", "v1", &CancelScope::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PromoteError::Wait { .. }));
    assert_eq!(err.remote_status().map(|s| s.code), Some(9));
}

#[tokio::test]
async fn lookup_only_reads() {
    let plane = FakePlane::new().with_existing(json!({"id": "v1"}));
    let orchestrator = orchestrator(&plane);

    let action = orchestrator
        .lookup(NAME, &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(action, DeployAction::Updated);
    assert_eq!(plane.calls(), vec![Call::GetResource(NAME.to_owned())]);
}

#[tokio::test(start_paused = true)]
async fn submit_uses_the_given_action() {
    let plane = FakePlane::new()
        .with_existing(json!({"id": "v1"}))
        .with_submit(done(json!({"id": "v1"})));

    let deployed = orchestrator(&plane)
        .submit(&target(), DeployAction::Updated, &CancelScope::default())
        .await
        .unwrap();

    assert_eq!(deployed.action, DeployAction::Updated);
    assert_eq!(
        plane.calls(),
        vec![Call::Update {
            name: NAME.to_owned(),
            body: json!({"runtime": "go122"}),
        }]
    );
}
