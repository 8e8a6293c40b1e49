//! Driver lifecycle: initialize provisions the isolated namespace and
//! applies policies; close is best-effort and always safe.

use pulsar_bench_driver::testing::{test_driver, MockCluster};
use pulsar_bench_driver::{
    AdminGateway, BacklogQuota, DataPlaneGateway, DriverError, PersistencePolicy, ProvisionStage,
    SubscriptionMode, SubscriptionSpec, TenantInfo,
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("pulsar_bench_driver=debug")
        .try_init()
        .ok();
}

#[tokio::test]
async fn test_initialize_provisions_isolated_namespace() {
    init_tracing();
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);

    driver.initialize().await.unwrap();

    assert_eq!(cluster.tenants(), vec!["benchmark"]);
    assert_eq!(
        cluster.tenant_info("benchmark"),
        Some(TenantInfo::allowing_cluster("local"))
    );
    assert_eq!(
        cluster.namespaces_under("benchmark"),
        vec!["benchmark/ns-000001"]
    );

    let policies = cluster.namespace_policies("benchmark/ns-000001").unwrap();
    assert_eq!(policies.persistence, Some(PersistencePolicy::new(1, 1, 1)));
    assert_eq!(policies.backlog_quota, Some(BacklogQuota::unlimited()));
    assert_eq!(policies.deduplication, Some(false));

    assert_eq!(
        driver.topic_name_prefix().unwrap(),
        "persistent://benchmark/ns-000001/test"
    );
}

#[tokio::test]
async fn test_topic_prefix_requires_initialize() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);

    assert!(matches!(
        driver.topic_name_prefix(),
        Err(DriverError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_initialize_fails_when_namespace_creation_fails() {
    let cluster = MockCluster::new();
    cluster.fail_create_namespace();
    let driver = test_driver(&cluster);

    let err = driver.initialize().await.unwrap_err();
    assert_eq!(err.stage, ProvisionStage::CreatingNamespace);
    // The tenant stage had already completed.
    assert_eq!(cluster.tenants(), vec!["benchmark"]);
    // The driver never became usable.
    assert!(matches!(
        driver.topic_name_prefix(),
        Err(DriverError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_initialize_fails_when_policy_application_fails() {
    let cluster = MockCluster::new();
    cluster.fail_set_persistence();
    let driver = test_driver(&cluster);

    let err = driver.initialize().await.unwrap_err();
    assert_eq!(err.stage, ProvisionStage::ApplyingPolicies);
}

#[tokio::test]
async fn test_close_without_initialize_is_safe() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);

    driver.close().await;
}

#[tokio::test]
async fn test_close_after_failed_initialize_is_safe() {
    let cluster = MockCluster::new();
    cluster.fail_create_namespace();
    let driver = test_driver(&cluster);

    assert!(driver.initialize().await.is_err());
    driver.close().await;
}

#[tokio::test]
async fn test_initialize_sweeps_stale_resources() {
    let cluster = MockCluster::new();

    // Leftovers from a prior aborted run: a namespace with a topic that
    // still has a subscription.
    let admin = cluster.admin();
    admin
        .create_tenant("benchmark", &TenantInfo::allowing_cluster("local"))
        .await
        .unwrap();
    admin
        .create_namespace("benchmark/ns-stale")
        .await
        .unwrap();
    cluster
        .data_plane()
        .subscribe(&SubscriptionSpec {
            topic: "persistent://benchmark/ns-stale/test-0".to_string(),
            subscription: "sub-1".to_string(),
            mode: SubscriptionMode::Failover,
            priority_level: 0,
            receiver_queue_size: 1000,
            max_total_receiver_queue_size_across_partitions: 50000,
        })
        .await
        .unwrap();
    assert_eq!(cluster.topics().len(), 1);

    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    assert!(cluster.topics().is_empty());
    assert!(cluster
        .subscriptions_on("persistent://benchmark/ns-stale/test-0")
        .is_empty());
}

#[tokio::test]
async fn test_second_initialize_is_noop() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);

    driver.initialize().await.unwrap();
    driver.initialize().await.unwrap();

    assert_eq!(
        cluster.namespaces_under("benchmark"),
        vec!["benchmark/ns-000001"]
    );
}
