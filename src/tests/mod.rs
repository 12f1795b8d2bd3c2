use std::{
    collections::HashMap,
    fs,
    sync::{Arc, Mutex},
};

use hyper::{Body, Request, Response};
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service};
use serde_json::json;
use test_case::test_case;
use tower_test::mock::{self, Handle};

use crate::{
    client::ClientSource,
    config::DevEnvConfig,
    model::{Dev, Space, User},
    resources::deployments::{self, WorkloadMode},
    Context, DevEnvError, DevEnvironments,
};

const SECRETS: &str = "/api/v1/namespaces/alice/secrets";
const PVCS: &str = "/api/v1/namespaces/alice/persistentvolumeclaims";
const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/alice/deployments";
const SERVICES: &str = "/api/v1/namespaces/alice/services";
const INGRESSES: &str = "/apis/networking.k8s.io/v1/namespaces/alice/ingresses";

#[derive(Clone, Debug)]
struct RecordedCall {
    call: String,
    body: Vec<u8>,
}

/// Stand-in API server. Objects listed in `existing` are returned on GET,
/// every other GET is a 404; writes echo their body back.
#[derive(Clone, Default)]
struct MockCluster {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    existing: HashMap<String, serde_json::Value>,
    fail_on: Option<String>,
    gone_on_delete: bool,
}

impl MockCluster {
    fn with_existing(mut self, path: String, object: serde_json::Value) -> Self {
        self.existing.insert(path, object);
        self
    }

    fn failing_on(mut self, call: String) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.call.clone())
            .collect()
    }

    fn body_of(&self, call: &str) -> serde_json::Value {
        let calls = self.calls.lock().unwrap();
        let recorded = calls
            .iter()
            .find(|c| c.call == call)
            .unwrap_or_else(|| panic!("no call {} was made", call));
        serde_json::from_slice(&recorded.body).unwrap()
    }
}

fn status_body(code: u16, reason: &str, message: &str) -> Vec<u8> {
    let status = if code < 400 { "Success" } else { "Failure" };
    serde_json::to_vec(&json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": status,
        "message": message,
        "reason": reason,
        "code": code
    }))
    .unwrap()
}

async fn mock_k8s_handler(
    mut handle: Handle<Request<Body>, Response<Body>>,
    cluster: MockCluster,
) {
    while let Some((request, send)) = handle.next_request().await {
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();
        let call = format!("{} {}", method, path);
        let body = hyper::body::to_bytes(request.into_body())
            .await
            .unwrap()
            .to_vec();
        cluster.calls.lock().unwrap().push(RecordedCall {
            call: call.clone(),
            body: body.clone(),
        });

        let (status, body) = if cluster.fail_on.as_deref() == Some(call.as_str()) {
            (500, status_body(500, "InternalError", "mock failure"))
        } else {
            match method.as_str() {
                "GET" => match cluster.existing.get(&path) {
                    Some(object) => (200, serde_json::to_vec(object).unwrap()),
                    None => (404, status_body(404, "NotFound", "not found")),
                },
                "POST" => (201, body),
                "PUT" => (200, body),
                "DELETE" if cluster.gone_on_delete => {
                    (404, status_body(404, "NotFound", "not found"))
                }
                "DELETE" => (200, status_body(200, "", "")),
                _ => panic!("Unexpected API request {}", call),
            }
        };

        send.send_response(
            Response::builder()
                .status(status)
                .body(Body::from(body))
                .unwrap(),
        );
    }
}

fn make_environments(cluster: &MockCluster) -> DevEnvironments {
    let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    let _spawned = tokio::spawn(mock_k8s_handler(handle, cluster.clone()));
    DevEnvironments::new(
        ClientSource::from_service(mock_service, "default"),
        DevEnvConfig::default(),
        &Context::empty(),
    )
}

fn unreachable_environments() -> DevEnvironments {
    DevEnvironments::new(
        ClientSource::Kubeconfig("src/tests/fixtures/missing-kubeconfig".into()),
        DevEnvConfig::default(),
        &Context::empty(),
    )
}

fn user() -> User {
    User {
        id: "u-42".into(),
        github_id: "Alice".into(),
    }
}

fn dev_with_volumes(volumes: &[&str]) -> Dev {
    let manifest = fs::read_to_string("src/tests/fixtures/dev.yml").unwrap();
    let mut dev = Dev::from_yaml(&manifest).unwrap();
    dev.volumes = volumes.iter().map(|v| v.to_string()).collect();
    dev
}

fn live_deployment(dev: &Dev) -> serde_json::Value {
    let space = Space::for_user(&user());
    let mut deployment =
        deployments::translate(dev, &space, WorkloadMode::Development, &Default::default())
            .unwrap();
    deployment.metadata.resource_version = Some("17".into());
    serde_json::to_value(&deployment).unwrap()
}

#[tokio::test]
async fn dev_mode_on_creates_resources_in_order() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    environments
        .dev_mode_on(&user(), &dev_with_volumes(&["/data"]))
        .await
        .unwrap_or_else(|e| panic!("dev mode on failed: {}", e.message));

    let expected = vec![
        format!("GET {SECRETS}/web-secret"),
        format!("POST {SECRETS}"),
        format!("GET {PVCS}/pvc-web-0"),
        format!("POST {PVCS}"),
        format!("GET {PVCS}/pvc-web-1"),
        format!("POST {PVCS}"),
        format!("GET {DEPLOYMENTS}/web"),
        format!("POST {DEPLOYMENTS}"),
        format!("GET {SERVICES}/web"),
        format!("POST {SERVICES}"),
        format!("GET {INGRESSES}/web"),
        format!("POST {INGRESSES}"),
    ];
    assert_eq!(cluster.calls(), expected);
}

#[tokio::test]
async fn dev_mode_on_creates_data_volumes_in_index_order() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    environments
        .dev_mode_on(&user(), &dev_with_volumes(&["/data", "/cache"]))
        .await
        .unwrap();

    let volume_gets: Vec<String> = cluster
        .calls()
        .into_iter()
        .filter(|c| c.starts_with(&format!("GET {PVCS}")))
        .collect();
    assert_eq!(
        volume_gets,
        vec![
            format!("GET {PVCS}/pvc-web-0"),
            format!("GET {PVCS}/pvc-web-1"),
            format!("GET {PVCS}/pvc-web-2"),
        ]
    );
}

#[tokio::test]
async fn dev_mode_on_rejects_more_than_two_volumes_before_any_call() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    let result = environments
        .dev_mode_on(&user(), &dev_with_volumes(&["/a", "/b", "/c"]))
        .await;

    assert_eq!(
        result,
        Err(DevEnvError {
            message: "the maximum number of volumes is 2".into(),
            code: 400,
        })
    );
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn dev_mode_on_stops_at_first_failure() {
    let cluster = MockCluster::default().failing_on(format!("POST {PVCS}"));
    let environments = make_environments(&cluster);

    let err = environments
        .dev_mode_on(&user(), &dev_with_volumes(&["/data"]))
        .await
        .unwrap_err();

    assert_eq!(err.code, 500);
    assert_eq!(
        err.message,
        "failed to create RESOURCE: pvc, NAME: pvc-web-0, NAMESPACE: alice, ERROR: mock failure"
    );
    assert_eq!(
        cluster.calls(),
        vec![
            format!("GET {SECRETS}/web-secret"),
            format!("POST {SECRETS}"),
            format!("GET {PVCS}/pvc-web-0"),
            format!("POST {PVCS}"),
        ]
    );
}

#[tokio::test]
async fn dev_mode_on_keeps_existing_secret_and_volumes() {
    let cluster = MockCluster::default()
        .with_existing(
            format!("{SECRETS}/web-secret"),
            json!({ "apiVersion": "v1", "kind": "Secret", "metadata": { "name": "web-secret" } }),
        )
        .with_existing(
            format!("{PVCS}/pvc-web-0"),
            json!({ "apiVersion": "v1", "kind": "PersistentVolumeClaim", "metadata": { "name": "pvc-web-0" } }),
        );
    let environments = make_environments(&cluster);

    environments
        .dev_mode_on(&user(), &dev_with_volumes(&[]))
        .await
        .unwrap();

    let calls = cluster.calls();
    assert!(!calls.contains(&format!("POST {SECRETS}")));
    assert!(!calls.contains(&format!("POST {PVCS}")));
    assert!(calls.contains(&format!("POST {DEPLOYMENTS}")));
}

#[tokio::test]
async fn dev_mode_on_deploys_idle_workload_with_volumes_mounted() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    environments
        .dev_mode_on(&user(), &dev_with_volumes(&["/data"]))
        .await
        .unwrap();

    let deployment: Deployment =
        serde_json::from_value(cluster.body_of(&format!("POST {DEPLOYMENTS}"))).unwrap();
    let labels = deployment.metadata.labels.unwrap();
    assert_eq!(labels.get("dev-env.io/mode"), Some(&"development".to_string()));
    let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
    let claims: Vec<String> = pod_spec
        .volumes
        .unwrap()
        .into_iter()
        .filter_map(|v| v.persistent_volume_claim.map(|c| c.claim_name))
        .collect();
    assert_eq!(claims, vec!["pvc-web-0", "pvc-web-1"]);
    assert_eq!(pod_spec.containers[0].command.as_ref().unwrap()[0], "sh");
}

#[tokio::test]
async fn run_image_never_touches_secrets_or_volumes() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    environments
        .run_image(&user(), &dev_with_volumes(&["/data"]))
        .await
        .unwrap();

    assert_eq!(
        cluster.calls(),
        vec![
            format!("GET {DEPLOYMENTS}/web"),
            format!("POST {DEPLOYMENTS}"),
            format!("GET {SERVICES}/web"),
            format!("POST {SERVICES}"),
            format!("GET {INGRESSES}/web"),
            format!("POST {INGRESSES}"),
        ]
    );
}

#[tokio::test]
async fn run_image_replaces_live_workload_and_service() {
    let dev = dev_with_volumes(&[]);
    let cluster = MockCluster::default()
        .with_existing(format!("{DEPLOYMENTS}/web"), live_deployment(&dev))
        .with_existing(
            format!("{SERVICES}/web"),
            json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "web", "resourceVersion": "3" },
                "spec": { "clusterIP": "10.0.0.12" }
            }),
        );
    let environments = make_environments(&cluster);

    environments.run_image(&user(), &dev).await.unwrap();

    let deployment: Deployment =
        serde_json::from_value(cluster.body_of(&format!("PUT {DEPLOYMENTS}/web"))).unwrap();
    assert_eq!(deployment.metadata.resource_version, Some("17".into()));
    let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
    assert_eq!(
        container.command,
        Some(vec!["yarn".to_string(), "start".to_string()])
    );

    let service: Service =
        serde_json::from_value(cluster.body_of(&format!("PUT {SERVICES}/web"))).unwrap();
    assert_eq!(service.metadata.resource_version, Some("3".into()));
    assert_eq!(service.spec.unwrap().cluster_ip, Some("10.0.0.12".into()));
}

#[tokio::test]
async fn run_image_stops_at_first_failure() {
    let cluster = MockCluster::default().failing_on(format!("POST {SERVICES}"));
    let environments = make_environments(&cluster);

    let err = environments
        .run_image(&user(), &dev_with_volumes(&[]))
        .await
        .unwrap_err();

    assert!(err.message.starts_with("failed to create RESOURCE: service"));
    assert!(!cluster
        .calls()
        .iter()
        .any(|c| c.contains("/ingresses")));
}

#[tokio::test]
async fn dev_mode_off_destroys_resources_in_reverse_order() {
    let dev = dev_with_volumes(&["/data"]);
    let cluster =
        MockCluster::default().with_existing(format!("{DEPLOYMENTS}/web"), live_deployment(&dev));
    let environments = make_environments(&cluster);

    environments.dev_mode_off(&user(), &dev, true).await.unwrap();

    assert_eq!(
        cluster.calls(),
        vec![
            format!("GET {DEPLOYMENTS}/web"),
            format!("DELETE {INGRESSES}/web"),
            format!("DELETE {SERVICES}/web"),
            format!("DELETE {DEPLOYMENTS}/web"),
            format!("DELETE {PVCS}/pvc-web-0"),
            format!("DELETE {PVCS}/pvc-web-1"),
            format!("DELETE {SECRETS}/web-secret"),
        ]
    );
}

#[tokio::test]
async fn dev_mode_off_uses_live_manifest_over_given_one() {
    let live = dev_with_volumes(&["/data", "/cache"]);
    let cluster =
        MockCluster::default().with_existing(format!("{DEPLOYMENTS}/web"), live_deployment(&live));
    let environments = make_environments(&cluster);

    let stale = dev_with_volumes(&[]);
    environments.dev_mode_off(&user(), &stale, false).await.unwrap();

    let volume_deletes: Vec<String> = cluster
        .calls()
        .into_iter()
        .filter(|c| c.starts_with(&format!("DELETE {PVCS}")))
        .collect();
    assert_eq!(
        volume_deletes,
        vec![
            format!("DELETE {PVCS}/pvc-web-0"),
            format!("DELETE {PVCS}/pvc-web-1"),
            format!("DELETE {PVCS}/pvc-web-2"),
        ]
    );
}

#[tokio::test]
async fn dev_mode_off_falls_back_to_given_manifest_without_live_workload() {
    let cluster = MockCluster::default();
    let environments = make_environments(&cluster);

    environments
        .dev_mode_off(&user(), &dev_with_volumes(&["/data"]), false)
        .await
        .unwrap();

    let calls = cluster.calls();
    assert_eq!(calls[0], format!("GET {DEPLOYMENTS}/web"));
    assert!(calls.contains(&format!("DELETE {PVCS}/pvc-web-1")));
}

#[tokio::test]
async fn dev_mode_off_treats_missing_resources_as_removed() {
    let cluster = MockCluster {
        gone_on_delete: true,
        ..Default::default()
    };
    let environments = make_environments(&cluster);

    let result = environments
        .dev_mode_off(&user(), &dev_with_volumes(&[]), true)
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(cluster.calls().len(), 6);
}

#[tokio::test]
async fn dev_mode_off_stops_at_first_failure() {
    let cluster = MockCluster::default().failing_on(format!("DELETE {SERVICES}/web"));
    let environments = make_environments(&cluster);

    let err = environments
        .dev_mode_off(&user(), &dev_with_volumes(&["/data"]), true)
        .await
        .unwrap_err();

    assert_eq!(
        err.message,
        "failed to delete RESOURCE: service, NAME: web, NAMESPACE: alice, ERROR: mock failure"
    );
    assert_eq!(
        cluster.calls(),
        vec![
            format!("GET {DEPLOYMENTS}/web"),
            format!("DELETE {INGRESSES}/web"),
            format!("DELETE {SERVICES}/web"),
        ]
    );
}

#[test_case("up" ; "for dev mode on")]
#[test_case("run" ; "for run image")]
#[test_case("down" ; "for dev mode off")]
#[tokio::test]
async fn client_failure_is_wrapped(operation: &str) {
    let environments = unreachable_environments();
    let dev = dev_with_volumes(&[]);

    let result = match operation {
        "up" => environments.dev_mode_on(&user(), &dev).await,
        "run" => environments.run_image(&user(), &dev).await,
        _ => environments.dev_mode_off(&user(), &dev, false).await,
    };

    let err = result.unwrap_err();
    assert!(
        err.message.starts_with("error getting k8s client: "),
        "unexpected message: {}",
        err.message
    );
    assert!(err.message.len() > "error getting k8s client: ".len());
}
