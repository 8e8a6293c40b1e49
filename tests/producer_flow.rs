//! Producer creation from the shared template and publish passthrough.

use pulsar_bench_driver::testing::{test_driver, MockCluster};
use pulsar_bench_driver::DriverError;

#[tokio::test]
async fn test_producer_publishes_to_its_topic() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    let producer = driver.create_producer(&topic).await.unwrap();
    assert_eq!(producer.topic(), topic);

    producer.send(Some("key-1"), b"hello").await.unwrap();
    producer.send(None, b"world").await.unwrap();
    producer.close().await;

    let published = cluster.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].topic, topic);
    assert_eq!(published[0].key.as_deref(), Some("key-1"));
    assert_eq!(published[0].payload, b"hello");
    assert_eq!(published[1].key, None);
}

#[tokio::test]
async fn test_partitioned_producer_routes_round_robin() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    driver.create_topic(&topic, 2).await.unwrap();

    let producer = driver.create_producer(&topic).await.unwrap();
    producer.send(None, b"a").await.unwrap();
    producer.send(None, b"b").await.unwrap();

    let published = cluster.published();
    assert_eq!(published[0].topic, format!("{topic}-partition-0"));
    assert_eq!(published[1].topic, format!("{topic}-partition-1"));
}

#[tokio::test]
async fn test_producer_creation_failure_propagates() {
    let cluster = MockCluster::new();
    let driver = test_driver(&cluster);
    driver.initialize().await.unwrap();
    cluster.fail_create_producer();

    let topic = format!("{}-0", driver.topic_name_prefix().unwrap());
    let err = driver.create_producer(&topic).await.unwrap_err();
    assert!(matches!(err, DriverError::Produce { .. }));
}
