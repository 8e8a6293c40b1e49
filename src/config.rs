//! Driver configuration model.
//!
//! The configuration is loaded once (typically from the harness-supplied
//! YAML file) and owned immutably by the driver for its whole lifetime.
//! Field names follow the camelCase convention of the existing benchmark
//! configuration files, and every field has a default so partial files
//! load cleanly. Unknown keys are tolerated.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level driver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverConfig {
    pub client: ClientConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
}

impl DriverConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read driver configuration file: {path:?}"))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse driver configuration YAML")
    }
}

/// Service endpoints, TLS/auth options, namespace scope and persistence
/// knobs for the cluster the benchmark runs against.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Binary-protocol service URL (`pulsar://` or `pulsar+ssl://`).
    pub service_url: String,
    /// Admin REST endpoint (`http://` or `https://`).
    pub http_url: String,
    /// Cluster name the benchmark tenant is allowed on.
    pub cluster_name: String,
    /// `<tenant>/<namespace>` prefix; the isolation suffix is appended at
    /// initialize time.
    pub namespace_prefix: String,
    pub topic_type: TopicType,
    pub io_threads: u32,
    pub connections_per_broker: u32,
    pub listener_threads: u32,
    pub tls_allow_insecure_connection: bool,
    pub tls_enable_hostname_verification: bool,
    pub tls_trust_certs_file_path: Option<String>,
    /// Authentication plugin name; only token authentication is honored by
    /// the bundled HTTP admin gateway.
    pub auth_plugin: Option<String>,
    pub auth_data: Option<String>,
    pub persistence: PersistenceConfig,
}

impl ClientConfig {
    /// The tenant component of `namespace_prefix`. This is the cleanup
    /// scope: every namespace under it is swept.
    pub fn tenant(&self) -> &str {
        self.namespace_prefix
            .split('/')
            .next()
            .unwrap_or(&self.namespace_prefix)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: "pulsar://localhost:6650".to_string(),
            http_url: "http://localhost:8080".to_string(),
            cluster_name: "local".to_string(),
            namespace_prefix: "benchmark/ns".to_string(),
            topic_type: TopicType::Persistent,
            io_threads: 8,
            connections_per_broker: 8,
            listener_threads: default_listener_threads(),
            tls_allow_insecure_connection: false,
            tls_enable_hostname_verification: false,
            tls_trust_certs_file_path: None,
            auth_plugin: None,
            auth_data: None,
            persistence: PersistenceConfig::default(),
        }
    }
}

fn default_listener_threads() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Topic persistence domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TopicType {
    #[serde(rename = "persistent")]
    Persistent,
    #[serde(rename = "non-persistent")]
    NonPersistent,
}

impl std::fmt::Display for TopicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::NonPersistent => write!(f, "non-persistent"),
        }
    }
}

/// Replication and deduplication parameters applied to the provisioned
/// namespace.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfig {
    pub ensemble_size: u32,
    pub write_quorum: u32,
    pub ack_quorum: u32,
    pub deduplication_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            ensemble_size: 1,
            write_quorum: 1,
            ack_quorum: 1,
            deduplication_enabled: false,
        }
    }
}

/// Shared template every producer is instantiated from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProducerConfig {
    pub batching_enabled: bool,
    pub batching_max_publish_delay_ms: u64,
    pub batching_max_bytes: u32,
    pub block_if_queue_full: bool,
    pub pending_queue_size: u32,
    pub max_pending_messages_across_partitions: u32,
    pub batching_partition_switch_frequency_by_publish_delay: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            batching_enabled: true,
            batching_max_publish_delay_ms: 1,
            batching_max_bytes: 128 * 1024,
            block_if_queue_full: true,
            pending_queue_size: 1000,
            max_pending_messages_across_partitions: 50000,
            batching_partition_switch_frequency_by_publish_delay: 10,
        }
    }
}

/// Receiver queue sizing and acknowledgment behavior for consumers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumerConfig {
    pub receiver_queue_size: u32,
    pub max_total_receiver_queue_size_across_partitions: u32,
    pub ack_mode: AckMode,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            receiver_queue_size: 1000,
            max_total_receiver_queue_size_across_partitions: 50000,
            ack_mode: AckMode::FireAndForget,
        }
    }
}

/// How message acknowledgments are issued after the consumer callback.
///
/// Acknowledgment success is not part of this adapter's correctness
/// contract; the mode only controls whether failures are observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AckMode {
    /// Acknowledge asynchronously; failures are neither retried nor
    /// reported anywhere.
    #[default]
    FireAndForget,
    /// Await each acknowledgment and log failures at warn level.
    LogFailures,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.client.namespace_prefix, "benchmark/ns");
        assert_eq!(config.client.tenant(), "benchmark");
        assert_eq!(config.client.topic_type, TopicType::Persistent);
        assert_eq!(config.producer.pending_queue_size, 1000);
        assert_eq!(config.consumer.ack_mode, AckMode::FireAndForget);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let config = DriverConfig::from_yaml(
            r#"
client:
  serviceUrl: pulsar://broker.example.com:6650
  httpUrl: http://broker.example.com:8080
  namespacePrefix: benchmark/custom
  persistence:
    ensembleSize: 3
    writeQuorum: 3
    ackQuorum: 2
producer:
  batchingEnabled: false
"#,
        )
        .unwrap();

        assert_eq!(config.client.service_url, "pulsar://broker.example.com:6650");
        assert_eq!(config.client.tenant(), "benchmark");
        assert_eq!(config.client.persistence.ensemble_size, 3);
        assert_eq!(config.client.persistence.ack_quorum, 2);
        assert!(!config.producer.batching_enabled);
        // Untouched sections keep their defaults.
        assert_eq!(config.consumer.receiver_queue_size, 1000);
    }

    #[test]
    fn test_unknown_keys_tolerated() {
        let config = DriverConfig::from_yaml(
            r#"
client:
  clusterName: us-west
  someFutureKnob: 42
"#,
        )
        .unwrap();
        assert_eq!(config.client.cluster_name, "us-west");
    }

    #[test]
    fn test_topic_type_parsing_and_display() {
        let config = DriverConfig::from_yaml("client:\n  topicType: non-persistent\n").unwrap();
        assert_eq!(config.client.topic_type, TopicType::NonPersistent);
        assert_eq!(config.client.topic_type.to_string(), "non-persistent");
    }

    #[test]
    fn test_ack_mode_parsing() {
        let config = DriverConfig::from_yaml("consumer:\n  ackMode: logFailures\n").unwrap();
        assert_eq!(config.consumer.ack_mode, AckMode::LogFailures);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.yaml");
        std::fs::write(&path, "client:\n  namespacePrefix: benchmark/file\n").unwrap();

        let config = DriverConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.client.namespace_prefix, "benchmark/file");
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let err = DriverConfig::from_yaml_file("/nonexistent/driver.yaml").unwrap_err();
        assert!(err.to_string().contains("configuration file"));
    }
}
