//! The driver facade exposed to the benchmark harness.
//!
//! Lifecycle: construct with [`PulsarDriver::new`], call
//! [`initialize`](PulsarDriver::initialize) once, create topics,
//! producers and consumers during the run, then
//! [`close`](PulsarDriver::close). All state is owned by the driver
//! instance; the gateways are injected so the same orchestration runs
//! against a real cluster or the in-memory test cluster.

use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::admin::AdminGateway;
use crate::cleanup::CleanupCoordinator;
use crate::config::DriverConfig;
use crate::data_plane::{ConsumerCallback, DataPlaneGateway};
use crate::error::{DriverError, DriverResult, SetupError};
use crate::fanout::{ConsumerFanout, ConsumerHandle};
use crate::producer::{ProducerFactory, ProducerHandle};
use crate::provision::{IsolationIdSource, TopicProvisioner, UuidIdSource};

pub struct PulsarDriver {
    config: DriverConfig,
    provisioner: TopicProvisioner,
    producers: ProducerFactory,
    fanout: ConsumerFanout,
    cleanup: CleanupCoordinator,
    /// Provisioned namespace; written exactly once by `initialize`.
    namespace: OnceLock<String>,
}

impl PulsarDriver {
    /// Build a driver with the default (random) namespace isolation
    /// suffix source.
    pub fn new(
        config: DriverConfig,
        admin: Arc<dyn AdminGateway>,
        data_plane: Arc<dyn DataPlaneGateway>,
    ) -> Self {
        Self::with_id_source(config, admin, data_plane, Arc::new(UuidIdSource))
    }

    /// Build a driver with an explicit isolation-suffix source. Tests use
    /// this to get deterministic namespace names.
    pub fn with_id_source(
        config: DriverConfig,
        admin: Arc<dyn AdminGateway>,
        data_plane: Arc<dyn DataPlaneGateway>,
        ids: Arc<dyn IsolationIdSource>,
    ) -> Self {
        let provisioner =
            TopicProvisioner::new(Arc::clone(&admin), config.client.clone(), ids);
        let producers = ProducerFactory::new(Arc::clone(&data_plane), config.producer.clone());
        let fanout = ConsumerFanout::new(
            Arc::clone(&admin),
            Arc::clone(&data_plane),
            config.consumer.clone(),
        );
        let cleanup = CleanupCoordinator::new(admin, config.client.tenant());
        Self {
            config,
            provisioner,
            producers,
            fanout,
            cleanup,
            namespace: OnceLock::new(),
        }
    }

    /// Provision the isolated namespace and sweep resources left behind by
    /// prior aborted runs.
    ///
    /// Any provisioning failure other than the tolerated tenant-creation
    /// conflict aborts with a [`SetupError`] and the driver stays
    /// unusable. The trailing sweep is best-effort and cannot fail
    /// initialization.
    pub async fn initialize(&self) -> Result<(), SetupError> {
        if self.namespace.get().is_some() {
            warn!("Driver already initialized, skipping provisioning");
            return Ok(());
        }
        info!("Pulsar driver configuration: {:?}", self.config);

        let namespace = self.provisioner.provision().await?;
        // A concurrent initialize cannot race this: the lifecycle is
        // initialize -> operate -> close. Losing the set would only leak
        // one extra namespace into the sweep scope.
        let _ = self.namespace.set(namespace);

        self.cleanup.sweep().await;
        Ok(())
    }

    /// Scope identifier for the topics of this run:
    /// `<topic-type>://<namespace>/test`.
    pub fn topic_name_prefix(&self) -> DriverResult<String> {
        let namespace = self.namespace.get().ok_or(DriverError::NotInitialized)?;
        Ok(format!(
            "{}://{namespace}/test",
            self.config.client.topic_type
        ))
    }

    /// Create `topic` with `partitions` partitions. A single partition
    /// needs no administrative call; the topic is provisioned implicitly
    /// as non-partitioned on first use.
    pub async fn create_topic(&self, topic: &str, partitions: u32) -> DriverResult<()> {
        self.provisioner
            .create_topic(topic, partitions)
            .await
            .map_err(DriverError::Admin)
    }

    /// Topic visibility is immediate through the metadata service; nothing
    /// to propagate.
    pub async fn notify_topic_creation(&self, _topic: &str, _partitions: u32) -> DriverResult<()> {
        Ok(())
    }

    /// Create a producer bound to `topic` from the shared template.
    pub async fn create_producer(&self, topic: &str) -> DriverResult<ProducerHandle> {
        self.producers.create_producer(topic).await
    }

    /// Create a logical consumer on `topic` with failover subscription
    /// semantics.
    ///
    /// `partition_hint` is accepted for interface compatibility and
    /// ignored; partition assignment always comes from topic metadata.
    /// The handle is returned before all physical subscriptions are
    /// established; see [`ConsumerHandle::ready`].
    pub async fn create_consumer(
        &self,
        topic: &str,
        subscription: &str,
        _partition_hint: Option<u32>,
        callback: ConsumerCallback,
    ) -> ConsumerHandle {
        self.fanout
            .create_consumer(topic, subscription, callback)
            .await
    }

    /// Best-effort teardown: sweep all benchmark-owned resources.
    ///
    /// Never fails, and is safe to call when `initialize` was never
    /// invoked or failed partway.
    pub async fn close(&self) {
        info!("Shutting down Pulsar benchmark driver");
        self.cleanup.sweep().await;
        info!("Pulsar benchmark driver successfully shut down");
    }
}
