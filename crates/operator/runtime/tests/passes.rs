//! Repeated reconciliation passes through the runtime entry point

use operator_pods::testing::{ApiOp, ImmediateReadyWatcher, InMemoryPodApi};
use operator_pods::DomainPresenceInfo;
use operator_runtime::{DomainReconciler, EngineConfig, OperatorConfig};
use operator_types::{
    ClusterOverrides, Domain, DomainSpec, WlsClusterConfig, WlsDomainConfig, WlsServerConfig,
};
use std::sync::Arc;

fn domain(image: &str) -> Domain {
    let mut spec = DomainSpec::new("domain1", "base_domain", "admin-server", 7001);
    spec.image = image.into();
    spec.clusters.insert(
        "cluster-1".into(),
        ClusterOverrides {
            replicas: Some(2),
            ..Default::default()
        },
    );
    Domain::new("default", spec)
}

fn setup() -> (Arc<InMemoryPodApi>, DomainReconciler, Arc<DomainPresenceInfo>) {
    let api = Arc::new(InMemoryPodApi::new());
    let config = OperatorConfig {
        engine: EngineConfig {
            max_concurrent_cycles: 2,
        },
        ..Default::default()
    };
    let reconciler = DomainReconciler::new(api.clone(), Arc::new(ImmediateReadyWatcher::new()), config);
    let scan = WlsDomainConfig::new("base_domain")
        .with_standalone_server(WlsServerConfig::new("admin-server", 7001))
        .with_cluster(
            WlsClusterConfig::new("cluster-1")
                .with_server(WlsServerConfig::new("ms1", 8001))
                .with_server(WlsServerConfig::new("ms2", 8001))
                .with_server(WlsServerConfig::new("ms3", 8001)),
        );
    let info = Arc::new(DomainPresenceInfo::new(domain("weblogic:12.2.1.3"), scan));
    (api, reconciler, info)
}

#[tokio::test]
async fn test_steady_state_after_first_pass() {
    let (api, reconciler, info) = setup();

    let first = reconciler.reconcile(info.clone()).await.unwrap();
    assert_eq!(first.running_servers, vec!["admin-server", "ms1", "ms2"]);
    api.clear_calls();

    let second = reconciler.reconcile(info.clone()).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(api.ops(), vec![ApiOp::Read; 3]);
}

#[tokio::test]
async fn test_image_change_replaces_every_pod() {
    let (api, reconciler, info) = setup();
    reconciler.reconcile(info.clone()).await.unwrap();
    api.clear_calls();

    info.set_domain(domain("weblogic:12.2.1.4"));
    reconciler.reconcile(info.clone()).await.unwrap();

    assert_eq!(api.count(ApiOp::Delete), 3);
    assert_eq!(api.count(ApiOp::Create), 3);
    for name in ["domain1-admin-server", "domain1-ms1", "domain1-ms2"] {
        let live = api.pod(name, "default").unwrap();
        assert_eq!(live.spec.containers[0].image, "weblogic:12.2.1.4");
    }
}

#[tokio::test]
async fn test_admin_restart_cycles_only_the_admin_pod() {
    let (api, reconciler, info) = setup();
    reconciler.reconcile(info.clone()).await.unwrap();
    api.clear_calls();

    info.request_admin_restart();
    reconciler.reconcile(info.clone()).await.unwrap();

    let deleted: Vec<String> = api
        .calls()
        .into_iter()
        .filter(|c| c.op == ApiOp::Delete)
        .map(|c| c.name)
        .collect();
    assert_eq!(deleted, vec!["domain1-admin-server"]);
    assert!(!info.take_admin_restart());
}
