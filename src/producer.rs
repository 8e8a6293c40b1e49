//! Producer construction from the shared configuration template.

use std::sync::Arc;

use tracing::debug;

use crate::config::ProducerConfig;
use crate::data_plane::{DataPlaneGateway, ProducerInstance, ProducerSpec};
use crate::error::{DriverError, DriverResult};

/// Instantiates one physical producer per topic from an immutable
/// template captured at driver construction.
pub struct ProducerFactory {
    data_plane: Arc<dyn DataPlaneGateway>,
    template: ProducerConfig,
}

impl ProducerFactory {
    pub fn new(data_plane: Arc<dyn DataPlaneGateway>, template: ProducerConfig) -> Self {
        Self {
            data_plane,
            template,
        }
    }

    /// Create a producer bound to `topic`. Failures propagate as-is.
    pub async fn create_producer(&self, topic: &str) -> DriverResult<ProducerHandle> {
        let spec = self.spec_for(topic);
        let inner = self
            .data_plane
            .create_producer(&spec)
            .await
            .map_err(|source| DriverError::Produce {
                topic: topic.to_string(),
                source,
            })?;
        Ok(ProducerHandle {
            topic: topic.to_string(),
            inner,
        })
    }

    fn spec_for(&self, topic: &str) -> ProducerSpec {
        let t = &self.template;
        ProducerSpec {
            topic: topic.to_string(),
            batching_enabled: t.batching_enabled,
            batching_max_publish_delay_ms: t.batching_max_publish_delay_ms,
            batching_max_bytes: t.batching_max_bytes,
            // Batch sizing is bounded by bytes and publish delay only.
            batching_max_messages: u32::MAX,
            block_if_queue_full: t.block_if_queue_full,
            pending_queue_size: t.pending_queue_size,
            max_pending_messages_across_partitions: t.max_pending_messages_across_partitions,
            batching_partition_switch_frequency_by_publish_delay: t
                .batching_partition_switch_frequency_by_publish_delay,
        }
    }
}

/// One physical producer bound to one topic.
pub struct ProducerHandle {
    topic: String,
    inner: Box<dyn ProducerInstance>,
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl ProducerHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `payload` with an optional routing key.
    pub async fn send(&self, key: Option<&str>, payload: &[u8]) -> DriverResult<()> {
        self.inner
            .send(key, payload)
            .await
            .map_err(|source| DriverError::Produce {
                topic: self.topic.clone(),
                source,
            })
    }

    /// Close the underlying producer. Close failures are logged only.
    pub async fn close(&self) {
        if let Err(e) = self.inner.close().await {
            debug!("Error closing producer on {}: {e}", self.topic);
        }
    }
}
