//! Test infrastructure for driving the adapter without a real cluster.
//!
//! This module provides an in-memory cluster model implementing both
//! gateway traits, a deterministic isolation-suffix source, and helpers
//! for building test drivers. It is used by this crate's own test suite
//! and is exported so downstream integrations can reuse it.

pub mod cluster;
pub mod ids;

use std::sync::Arc;

use crate::config::DriverConfig;
use crate::driver::PulsarDriver;

pub use cluster::{MockCluster, NamespacePolicies, PublishedRecord};
pub use ids::SequentialIdSource;

/// Driver wired to the given mock cluster, with default configuration and
/// deterministic namespace suffixes (`000001`, `000002`, ...).
pub fn test_driver(cluster: &MockCluster) -> PulsarDriver {
    test_driver_with_config(cluster, DriverConfig::default())
}

/// Like [`test_driver`], with explicit configuration.
pub fn test_driver_with_config(cluster: &MockCluster, config: DriverConfig) -> PulsarDriver {
    PulsarDriver::with_id_source(
        config,
        cluster.admin(),
        cluster.data_plane(),
        Arc::new(SequentialIdSource::new()),
    )
}
