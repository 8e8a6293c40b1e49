//! Cleanup sweep: full teardown, error tolerance, idempotence.

use std::sync::Arc;

use pulsar_bench_driver::testing::{test_driver, MockCluster};
use pulsar_bench_driver::ConsumerCallback;

fn noop_callback() -> ConsumerCallback {
    Arc::new(|_payload: &[u8], _publish_nanos: u64| {})
}

#[tokio::test]
async fn test_close_sweeps_topics_and_subscriptions() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    driver.create_topic(&topic, 4).await.unwrap();
    let handle = driver
        .create_consumer(&topic, "sub-1", None, noop_callback())
        .await;
    handle.ready().await.unwrap();
    assert_eq!(cluster.topics().len(), 4);

    driver.close().await;

    assert!(cluster.topics().is_empty());
    for i in 0..4 {
        assert!(cluster
            .subscriptions_on(&format!("{topic}-partition-{i}"))
            .is_empty());
    }
}

#[tokio::test]
async fn test_sweep_continues_past_deletion_failures() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    driver.create_topic(&topic, 3).await.unwrap();
    let handle = driver
        .create_consumer(&topic, "sub-1", None, noop_callback())
        .await;
    handle.ready().await.unwrap();

    let stuck = format!("{topic}-partition-1");
    cluster.fail_delete_topic(&stuck);

    // Never errors, and the failure on one topic does not stop the rest.
    driver.close().await;

    assert_eq!(cluster.topics(), vec![stuck]);
}

#[tokio::test]
async fn test_second_sweep_finds_nothing_left() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    driver.create_topic(&topic, 2).await.unwrap();
    let handle = driver
        .create_consumer(&topic, "sub-1", None, noop_callback())
        .await;
    handle.ready().await.unwrap();

    driver.close().await;
    assert!(cluster.topics().is_empty());

    // Running the sweep again has no residual side effects.
    driver.close().await;
    assert!(cluster.topics().is_empty());
    assert_eq!(
        cluster.namespaces_under("benchmark"),
        vec!["benchmark/ns-000001"]
    );
}
