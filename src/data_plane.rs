//! Data-plane gateway traits and delivery types.
//!
//! [`DataPlaneGateway`] is the seam to the messaging client proper: it
//! constructs physical producers and subscriptions. The wire protocol
//! behind it is an external collaborator; this crate only defines the
//! contract the orchestration core drives, and ships an in-memory
//! implementation for tests ([`MockCluster`](crate::testing::MockCluster)).

use std::sync::Arc;

use crate::error::DataPlaneResult;

/// Harness-supplied message callback: `(payload_bytes, publish_timestamp_nanos)`.
///
/// The timestamp is the broker's millisecond publish time converted to
/// nanoseconds; its resolution stays bounded to milliseconds.
pub type ConsumerCallback = Arc<dyn Fn(&[u8], u64) + Send + Sync>;

/// Subscription semantics requested from the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    Exclusive,
    Shared,
    /// Exactly one active consumer per partition among the subscriber
    /// group; preserves per-partition ordering while allowing benchmark
    /// workers to scale out horizontally.
    Failover,
}

/// One physical subscription request.
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    /// Physical topic name (a partition component, or the topic itself
    /// when non-partitioned).
    pub topic: String,
    pub subscription: String,
    pub mode: SubscriptionMode,
    pub priority_level: i32,
    pub receiver_queue_size: u32,
    pub max_total_receiver_queue_size_across_partitions: u32,
}

/// One physical producer request, instantiated from the driver-wide
/// producer template.
#[derive(Debug, Clone)]
pub struct ProducerSpec {
    pub topic: String,
    pub batching_enabled: bool,
    pub batching_max_publish_delay_ms: u64,
    pub batching_max_bytes: u32,
    pub batching_max_messages: u32,
    pub block_if_queue_full: bool,
    pub pending_queue_size: u32,
    pub max_pending_messages_across_partitions: u32,
    pub batching_partition_switch_frequency_by_publish_delay: u32,
}

/// Opaque per-message acknowledgment token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckToken(pub u64);

/// A message handed to the adapter by a physical consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    /// Broker publish time in milliseconds since the epoch.
    pub publish_time_ms: u64,
    pub ack: AckToken,
}

/// One physical producer bound to one topic.
#[async_trait::async_trait]
pub trait ProducerInstance: Send + Sync {
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> DataPlaneResult<()>;

    async fn close(&self) -> DataPlaneResult<()>;
}

/// One physical consumer on one subscription.
///
/// `recv` yields deliveries in arrival order; it returns
/// [`DataPlaneError::Closed`](crate::error::DataPlaneError::Closed) once
/// the consumer is closed and drained.
#[async_trait::async_trait]
pub trait ConsumerInstance: Send + Sync {
    async fn recv(&self) -> DataPlaneResult<Delivery>;

    async fn ack(&self, token: AckToken) -> DataPlaneResult<()>;

    async fn close(&self) -> DataPlaneResult<()>;
}

/// Facade over producer/consumer construction.
#[async_trait::async_trait]
pub trait DataPlaneGateway: Send + Sync {
    async fn create_producer(
        &self,
        spec: &ProducerSpec,
    ) -> DataPlaneResult<Box<dyn ProducerInstance>>;

    async fn subscribe(&self, spec: &SubscriptionSpec)
        -> DataPlaneResult<Arc<dyn ConsumerInstance>>;
}
