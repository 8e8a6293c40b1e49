//! In-memory messaging cluster implementing both gateway traits.
//!
//! The mock models the administrative state the orchestration core
//! manipulates (tenants, namespaces with applied policies, partitioned
//! topics, subscriptions) and a minimal data plane: subscriptions are fed
//! by channels, publishes route to the active failover consumer of every
//! subscription on the target physical topic, and acknowledgments are
//! counted. Fault injection hooks cover the error paths the driver has
//! to tolerate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::admin::{AdminGateway, BacklogQuota, PersistencePolicy, TenantInfo};
use crate::data_plane::{
    AckToken, ConsumerInstance, DataPlaneGateway, Delivery, ProducerInstance, ProducerSpec,
    SubscriptionSpec,
};
use crate::error::{AdminError, AdminResult, DataPlaneError, DataPlaneResult};

/// Policies applied to a mock namespace, for assertions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespacePolicies {
    pub persistence: Option<PersistencePolicy>,
    pub backlog_quota: Option<BacklogQuota>,
    pub deduplication: Option<bool>,
}

/// A record sent through a mock producer, in send order.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRecord {
    /// Physical topic the record was routed to.
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct AdminState {
    tenants: BTreeMap<String, TenantInfo>,
    namespaces: BTreeMap<String, NamespacePolicies>,
    /// Partitioned-topic metadata: logical topic name to partition count.
    partitioned: BTreeMap<String, u32>,
    /// Every physical topic known to the cluster.
    physical_topics: BTreeSet<String>,
    /// Subscriptions per physical topic.
    subscriptions: BTreeMap<String, BTreeSet<String>>,
}

struct SenderEntry {
    topic: String,
    subscription: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct DataState {
    next_consumer_id: u64,
    senders: BTreeMap<u64, SenderEntry>,
    published: Vec<PublishedRecord>,
}

#[derive(Default)]
struct FaultPlan {
    fail_metadata: BTreeSet<String>,
    fail_subscribe: BTreeSet<String>,
    fail_delete_topic: BTreeSet<String>,
    fail_create_namespace: bool,
    fail_set_persistence: bool,
    fail_create_producer: bool,
}

struct Counters {
    create_tenant_calls: AtomicU64,
    acks: AtomicU64,
    next_ack_token: AtomicU64,
    publish_clock_ms: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            create_tenant_calls: AtomicU64::new(0),
            acks: AtomicU64::new(0),
            next_ack_token: AtomicU64::new(0),
            // Arbitrary stable epoch for producer-side publish timestamps.
            publish_clock_ms: AtomicU64::new(1_700_000_000_000),
        }
    }
}

struct Inner {
    admin: Mutex<AdminState>,
    data: Mutex<DataState>,
    faults: Mutex<FaultPlan>,
    counters: Counters,
    partitioned_creates: Mutex<Vec<(String, u32)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `topic` is a full name like `persistent://tenant/local/name`; checks
/// whether it lives in `namespace` (`tenant/local`).
fn in_namespace(topic: &str, namespace: &str) -> bool {
    let rest = topic.split_once("://").map(|(_, r)| r).unwrap_or(topic);
    rest.starts_with(namespace)
        && rest[namespace.len()..].starts_with('/')
}

impl Inner {
    /// Deliver to the active failover consumer of every subscription on
    /// the physical topic. Returns the number of consumers reached.
    fn route(&self, topic: &str, payload: &[u8], publish_time_ms: u64) -> usize {
        let data = lock(&self.data);
        // Lowest consumer id per subscription is the active one; senders
        // iterate in id order.
        let mut active: BTreeMap<&str, &SenderEntry> = BTreeMap::new();
        for entry in data.senders.values() {
            if entry.topic == topic && !entry.tx.is_closed() {
                active.entry(entry.subscription.as_str()).or_insert(entry);
            }
        }
        let mut delivered = 0;
        for entry in active.values() {
            let token = AckToken(self.counters.next_ack_token.fetch_add(1, Ordering::SeqCst));
            let delivery = Delivery {
                payload: payload.to_vec(),
                publish_time_ms,
                ack: token,
            };
            if entry.tx.send(delivery).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

/// In-memory cluster handle. Cloning shares the same cluster state.
#[derive(Clone)]
pub struct MockCluster {
    inner: Arc<Inner>,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                admin: Mutex::new(AdminState::default()),
                data: Mutex::new(DataState::default()),
                faults: Mutex::new(FaultPlan::default()),
                counters: Counters::default(),
                partitioned_creates: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn admin(&self) -> Arc<dyn AdminGateway> {
        Arc::new(self.clone())
    }

    pub fn data_plane(&self) -> Arc<dyn DataPlaneGateway> {
        Arc::new(self.clone())
    }

    // Fault injection ----------------------------------------------------

    /// Make partition-metadata lookups for `topic` fail.
    pub fn fail_partition_metadata(&self, topic: &str) {
        lock(&self.inner.faults).fail_metadata.insert(topic.to_string());
    }

    /// Make subscribe calls on the physical `topic` fail.
    pub fn fail_subscribe(&self, topic: &str) {
        lock(&self.inner.faults).fail_subscribe.insert(topic.to_string());
    }

    /// Make deletions of the physical `topic` fail.
    pub fn fail_delete_topic(&self, topic: &str) {
        lock(&self.inner.faults)
            .fail_delete_topic
            .insert(topic.to_string());
    }

    pub fn fail_create_namespace(&self) {
        lock(&self.inner.faults).fail_create_namespace = true;
    }

    pub fn fail_set_persistence(&self) {
        lock(&self.inner.faults).fail_set_persistence = true;
    }

    pub fn fail_create_producer(&self) {
        lock(&self.inner.faults).fail_create_producer = true;
    }

    // Stimulus -----------------------------------------------------------

    /// Publish directly to a physical topic, as if a broker delivered the
    /// message. Returns the number of consumers it reached.
    pub fn publish(&self, topic: &str, payload: &[u8], publish_time_ms: u64) -> usize {
        self.inner.route(topic, payload, publish_time_ms)
    }

    // Inspection ---------------------------------------------------------

    pub fn tenants(&self) -> Vec<String> {
        lock(&self.inner.admin).tenants.keys().cloned().collect()
    }

    pub fn tenant_info(&self, tenant: &str) -> Option<TenantInfo> {
        lock(&self.inner.admin).tenants.get(tenant).cloned()
    }

    pub fn namespaces_under(&self, tenant: &str) -> Vec<String> {
        let prefix = format!("{tenant}/");
        lock(&self.inner.admin)
            .namespaces
            .keys()
            .filter(|ns| ns.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn namespace_policies(&self, namespace: &str) -> Option<NamespacePolicies> {
        lock(&self.inner.admin).namespaces.get(namespace).cloned()
    }

    /// All physical topics currently known to the cluster.
    pub fn topics(&self) -> Vec<String> {
        lock(&self.inner.admin)
            .physical_topics
            .iter()
            .cloned()
            .collect()
    }

    pub fn subscriptions_on(&self, topic: &str) -> Vec<String> {
        lock(&self.inner.admin)
            .subscriptions
            .get(topic)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every `create_partitioned_topic` call in order.
    pub fn partitioned_create_calls(&self) -> Vec<(String, u32)> {
        lock(&self.inner.partitioned_creates).clone()
    }

    pub fn create_tenant_calls(&self) -> u64 {
        self.inner.counters.create_tenant_calls.load(Ordering::SeqCst)
    }

    pub fn ack_count(&self) -> u64 {
        self.inner.counters.acks.load(Ordering::SeqCst)
    }

    /// Records sent through mock producers, in send order.
    pub fn published(&self) -> Vec<PublishedRecord> {
        lock(&self.inner.data).published.clone()
    }
}

#[async_trait::async_trait]
impl AdminGateway for MockCluster {
    async fn list_tenants(&self) -> AdminResult<Vec<String>> {
        Ok(self.tenants())
    }

    async fn create_tenant(&self, tenant: &str, info: &TenantInfo) -> AdminResult<()> {
        self.inner
            .counters
            .create_tenant_calls
            .fetch_add(1, Ordering::SeqCst);
        let mut admin = lock(&self.inner.admin);
        if admin.tenants.contains_key(tenant) {
            return Err(AdminError::Conflict(format!("tenant {tenant}")));
        }
        admin.tenants.insert(tenant.to_string(), info.clone());
        Ok(())
    }

    async fn create_namespace(&self, namespace: &str) -> AdminResult<()> {
        if lock(&self.inner.faults).fail_create_namespace {
            return Err(AdminError::Operation(
                "injected namespace creation failure".to_string(),
            ));
        }
        let mut admin = lock(&self.inner.admin);
        let tenant = namespace.split('/').next().unwrap_or(namespace);
        if !admin.tenants.contains_key(tenant) {
            return Err(AdminError::NotFound(format!("tenant {tenant}")));
        }
        if admin.namespaces.contains_key(namespace) {
            return Err(AdminError::Conflict(format!("namespace {namespace}")));
        }
        admin
            .namespaces
            .insert(namespace.to_string(), NamespacePolicies::default());
        Ok(())
    }

    async fn set_persistence(
        &self,
        namespace: &str,
        policy: &PersistencePolicy,
    ) -> AdminResult<()> {
        if lock(&self.inner.faults).fail_set_persistence {
            return Err(AdminError::Operation(
                "injected persistence failure".to_string(),
            ));
        }
        let mut admin = lock(&self.inner.admin);
        let policies = admin
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| AdminError::NotFound(format!("namespace {namespace}")))?;
        policies.persistence = Some(policy.clone());
        Ok(())
    }

    async fn set_backlog_quota(&self, namespace: &str, quota: &BacklogQuota) -> AdminResult<()> {
        let mut admin = lock(&self.inner.admin);
        let policies = admin
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| AdminError::NotFound(format!("namespace {namespace}")))?;
        policies.backlog_quota = Some(quota.clone());
        Ok(())
    }

    async fn set_deduplication_status(&self, namespace: &str, enabled: bool) -> AdminResult<()> {
        let mut admin = lock(&self.inner.admin);
        let policies = admin
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| AdminError::NotFound(format!("namespace {namespace}")))?;
        policies.deduplication = Some(enabled);
        Ok(())
    }

    async fn list_namespaces(&self, tenant: &str) -> AdminResult<Vec<String>> {
        Ok(self.namespaces_under(tenant))
    }

    async fn list_topics(&self, namespace: &str) -> AdminResult<Vec<String>> {
        Ok(lock(&self.inner.admin)
            .physical_topics
            .iter()
            .filter(|topic| in_namespace(topic, namespace))
            .cloned()
            .collect())
    }

    async fn list_subscriptions(&self, topic: &str) -> AdminResult<Vec<String>> {
        Ok(self.subscriptions_on(topic))
    }

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        _force: bool,
    ) -> AdminResult<()> {
        let mut admin = lock(&self.inner.admin);
        let subs = admin
            .subscriptions
            .get_mut(topic)
            .ok_or_else(|| AdminError::NotFound(format!("topic {topic}")))?;
        if !subs.remove(subscription) {
            return Err(AdminError::NotFound(format!(
                "subscription {subscription} on {topic}"
            )));
        }
        Ok(())
    }

    async fn delete_topic(&self, topic: &str, _force: bool) -> AdminResult<()> {
        if lock(&self.inner.faults).fail_delete_topic.contains(topic) {
            return Err(AdminError::Operation(format!(
                "injected deletion failure for {topic}"
            )));
        }
        let mut admin = lock(&self.inner.admin);
        if !admin.physical_topics.remove(topic) {
            return Err(AdminError::NotFound(format!("topic {topic}")));
        }
        admin.subscriptions.remove(topic);
        drop(admin);
        // Force deletion disconnects any live consumers on the topic.
        lock(&self.inner.data)
            .senders
            .retain(|_, entry| entry.topic != topic);
        Ok(())
    }

    async fn partitioned_topic_metadata(&self, topic: &str) -> AdminResult<u32> {
        if lock(&self.inner.faults).fail_metadata.contains(topic) {
            return Err(AdminError::Operation(format!(
                "injected metadata failure for {topic}"
            )));
        }
        Ok(lock(&self.inner.admin)
            .partitioned
            .get(topic)
            .copied()
            .unwrap_or(0))
    }

    async fn create_partitioned_topic(&self, topic: &str, partitions: u32) -> AdminResult<()> {
        lock(&self.inner.partitioned_creates).push((topic.to_string(), partitions));
        let mut admin = lock(&self.inner.admin);
        if admin.partitioned.contains_key(topic) {
            return Err(AdminError::Conflict(format!("topic {topic}")));
        }
        admin.partitioned.insert(topic.to_string(), partitions);
        for i in 0..partitions {
            admin.physical_topics.insert(format!("{topic}-partition-{i}"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DataPlaneGateway for MockCluster {
    async fn create_producer(
        &self,
        spec: &ProducerSpec,
    ) -> DataPlaneResult<Box<dyn ProducerInstance>> {
        if lock(&self.inner.faults).fail_create_producer {
            return Err(DataPlaneError::Client(
                "injected producer creation failure".to_string(),
            ));
        }
        {
            // First use auto-creates non-partitioned topics; partitioned
            // topics already have their partition components materialized.
            let mut admin = lock(&self.inner.admin);
            if !admin.partitioned.contains_key(&spec.topic) {
                admin.physical_topics.insert(spec.topic.clone());
            }
        }
        Ok(Box::new(MockProducer {
            inner: Arc::clone(&self.inner),
            topic: spec.topic.clone(),
            round_robin: AtomicU64::new(0),
        }))
    }

    async fn subscribe(
        &self,
        spec: &SubscriptionSpec,
    ) -> DataPlaneResult<Arc<dyn ConsumerInstance>> {
        if lock(&self.inner.faults).fail_subscribe.contains(&spec.topic) {
            return Err(DataPlaneError::Client(format!(
                "injected subscribe failure for {}",
                spec.topic
            )));
        }

        {
            let mut admin = lock(&self.inner.admin);
            admin.physical_topics.insert(spec.topic.clone());
            admin
                .subscriptions
                .entry(spec.topic.clone())
                .or_default()
                .insert(spec.subscription.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut data = lock(&self.inner.data);
            let id = data.next_consumer_id;
            data.next_consumer_id += 1;
            data.senders.insert(
                id,
                SenderEntry {
                    topic: spec.topic.clone(),
                    subscription: spec.subscription.clone(),
                    tx,
                },
            );
            id
        };

        Ok(Arc::new(MockConsumer {
            inner: Arc::clone(&self.inner),
            id,
            rx: tokio::sync::Mutex::new(rx),
        }))
    }
}

struct MockProducer {
    inner: Arc<Inner>,
    topic: String,
    round_robin: AtomicU64,
}

#[async_trait::async_trait]
impl ProducerInstance for MockProducer {
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> DataPlaneResult<()> {
        // Round-robin across partitions the way a partitioned producer
        // routes keyless messages.
        let partitions = lock(&self.inner.admin)
            .partitioned
            .get(&self.topic)
            .copied()
            .unwrap_or(0);
        let physical = if partitions > 0 {
            let next = self.round_robin.fetch_add(1, Ordering::SeqCst);
            format!("{}-partition-{}", self.topic, next % u64::from(partitions))
        } else {
            self.topic.clone()
        };

        let publish_time_ms = self
            .inner
            .counters
            .publish_clock_ms
            .fetch_add(1, Ordering::SeqCst);

        lock(&self.inner.data).published.push(PublishedRecord {
            topic: physical.clone(),
            key: key.map(|k| k.to_string()),
            payload: payload.to_vec(),
        });
        self.inner.route(&physical, payload, publish_time_ms);
        Ok(())
    }

    async fn close(&self) -> DataPlaneResult<()> {
        Ok(())
    }
}

struct MockConsumer {
    inner: Arc<Inner>,
    id: u64,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
}

#[async_trait::async_trait]
impl ConsumerInstance for MockConsumer {
    async fn recv(&self) -> DataPlaneResult<Delivery> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(DataPlaneError::Closed)
    }

    async fn ack(&self, _token: AckToken) -> DataPlaneResult<()> {
        self.inner.counters.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> DataPlaneResult<()> {
        lock(&self.inner.data).senders.remove(&self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_plane::SubscriptionMode;

    fn spec(topic: &str, subscription: &str) -> SubscriptionSpec {
        SubscriptionSpec {
            topic: topic.to_string(),
            subscription: subscription.to_string(),
            mode: SubscriptionMode::Failover,
            priority_level: 0,
            receiver_queue_size: 1000,
            max_total_receiver_queue_size_across_partitions: 50000,
        }
    }

    #[test]
    fn test_in_namespace() {
        assert!(in_namespace(
            "persistent://benchmark/ns-000001/test-0",
            "benchmark/ns-000001"
        ));
        assert!(!in_namespace(
            "persistent://benchmark/ns-000002/test-0",
            "benchmark/ns-000001"
        ));
        // Prefix of a longer namespace name must not match.
        assert!(!in_namespace(
            "persistent://benchmark/ns-0000011/test-0",
            "benchmark/ns-000001"
        ));
    }

    #[tokio::test]
    async fn test_failover_routes_to_single_consumer_per_subscription() {
        let cluster = MockCluster::new();
        let topic = "persistent://benchmark/ns-000001/t";

        let first = cluster.subscribe(&spec(topic, "sub-a")).await.unwrap();
        let _second = cluster.subscribe(&spec(topic, "sub-a")).await.unwrap();
        let third = cluster.subscribe(&spec(topic, "sub-b")).await.unwrap();

        // One active consumer per subscription: two deliveries total.
        assert_eq!(cluster.publish(topic, b"m", 1), 2);

        let delivery = first.recv().await.unwrap();
        assert_eq!(delivery.payload, b"m");
        let delivery = third.recv().await.unwrap();
        assert_eq!(delivery.publish_time_ms, 1);
    }

    #[tokio::test]
    async fn test_closed_consumer_stops_receiving() {
        let cluster = MockCluster::new();
        let topic = "persistent://benchmark/ns-000001/t";
        let consumer = cluster.subscribe(&spec(topic, "sub")).await.unwrap();

        consumer.close().await.unwrap();
        assert_eq!(cluster.publish(topic, b"m", 1), 0);
        assert!(matches!(
            consumer.recv().await,
            Err(DataPlaneError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_partitioned_create_conflict() {
        let cluster = MockCluster::new();
        let topic = "persistent://benchmark/ns-000001/t";
        cluster.create_partitioned_topic(topic, 2).await.unwrap();
        let err = cluster.create_partitioned_topic(topic, 2).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
        assert_eq!(cluster.partitioned_create_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_producer_round_robins_partitions() {
        let cluster = MockCluster::new();
        let topic = "persistent://benchmark/ns-000001/t";
        cluster.create_partitioned_topic(topic, 2).await.unwrap();

        let producer = cluster
            .create_producer(&ProducerSpec {
                topic: topic.to_string(),
                batching_enabled: true,
                batching_max_publish_delay_ms: 1,
                batching_max_bytes: 128 * 1024,
                batching_max_messages: u32::MAX,
                block_if_queue_full: true,
                pending_queue_size: 1000,
                max_pending_messages_across_partitions: 50000,
                batching_partition_switch_frequency_by_publish_delay: 10,
            })
            .await
            .unwrap();

        producer.send(None, b"a").await.unwrap();
        producer.send(None, b"b").await.unwrap();
        producer.send(None, b"c").await.unwrap();

        let published = cluster.published();
        assert_eq!(published[0].topic, format!("{topic}-partition-0"));
        assert_eq!(published[1].topic, format!("{topic}-partition-1"));
        assert_eq!(published[2].topic, format!("{topic}-partition-0"));
    }
}
