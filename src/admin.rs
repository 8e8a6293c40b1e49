//! Administrative gateway trait and admin-plane data types.
//!
//! [`AdminGateway`] is the seam between the orchestration core and the
//! cluster's admin API. The bundled implementations are
//! [`HttpAdminGateway`](crate::http_admin::HttpAdminGateway) for real
//! clusters and [`MockCluster`](crate::testing::MockCluster) for tests.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{AdminError, AdminResult};

/// Tenant ownership record: administrative roles plus the clusters the
/// tenant is allowed to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    pub admin_roles: BTreeSet<String>,
    pub allowed_clusters: BTreeSet<String>,
}

impl TenantInfo {
    /// Tenant info with no admin roles and a single allowed cluster.
    pub fn allowing_cluster(cluster: &str) -> Self {
        Self {
            admin_roles: BTreeSet::new(),
            allowed_clusters: BTreeSet::from([cluster.to_string()]),
        }
    }
}

/// BookKeeper replication parameters for a namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistencePolicy {
    pub bookkeeper_ensemble: u32,
    pub bookkeeper_write_quorum: u32,
    pub bookkeeper_ack_quorum: u32,
    pub managed_ledger_max_mark_delete_rate: f64,
}

impl PersistencePolicy {
    pub fn new(ensemble: u32, write_quorum: u32, ack_quorum: u32) -> Self {
        Self {
            bookkeeper_ensemble: ensemble,
            bookkeeper_write_quorum: write_quorum,
            bookkeeper_ack_quorum: ack_quorum,
            managed_ledger_max_mark_delete_rate: 1.0,
        }
    }
}

/// What the broker does to producers once a subscription's backlog exceeds
/// the quota limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    ProducerRequestHold,
    ProducerException,
    ConsumerBacklogEviction,
}

/// Limit on retained unacknowledged data per subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklogQuota {
    pub limit: i64,
    pub policy: RetentionPolicy,
}

impl BacklogQuota {
    /// Effectively unlimited backlog; producers only fail if the limit is
    /// somehow reached.
    pub fn unlimited() -> Self {
        Self {
            limit: i64::MAX,
            policy: RetentionPolicy::ProducerException,
        }
    }
}

/// Facade over tenant/namespace/topic/subscription administration.
///
/// Implementations map transport-level responses onto [`AdminError`];
/// notably, "already exists" must surface as [`AdminError::Conflict`] so
/// callers can distinguish benign creation races from real failures.
#[async_trait::async_trait]
pub trait AdminGateway: Send + Sync {
    async fn list_tenants(&self) -> AdminResult<Vec<String>>;

    async fn create_tenant(&self, tenant: &str, info: &TenantInfo) -> AdminResult<()>;

    /// Create a namespace named `<tenant>/<local>`. Namespace names are
    /// unique per driver instance, so any failure here is fatal to
    /// provisioning.
    async fn create_namespace(&self, namespace: &str) -> AdminResult<()>;

    async fn set_persistence(
        &self,
        namespace: &str,
        policy: &PersistencePolicy,
    ) -> AdminResult<()>;

    async fn set_backlog_quota(&self, namespace: &str, quota: &BacklogQuota) -> AdminResult<()>;

    async fn set_deduplication_status(&self, namespace: &str, enabled: bool) -> AdminResult<()>;

    async fn list_namespaces(&self, tenant: &str) -> AdminResult<Vec<String>>;

    /// List the physical topics in a namespace (partition components are
    /// enumerated individually).
    async fn list_topics(&self, namespace: &str) -> AdminResult<Vec<String>>;

    async fn list_subscriptions(&self, topic: &str) -> AdminResult<Vec<String>>;

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> AdminResult<()>;

    async fn delete_topic(&self, topic: &str, force: bool) -> AdminResult<()>;

    /// Partition count of `topic`; 0 denotes a non-partitioned topic.
    async fn partitioned_topic_metadata(&self, topic: &str) -> AdminResult<u32>;

    async fn create_partitioned_topic(&self, topic: &str, partitions: u32) -> AdminResult<()>;

    /// Create `tenant` with `cluster` in its allowed set if it does not
    /// exist yet. A creation conflict is success: multiple benchmark
    /// workers initialize concurrently against the same tenant, and
    /// exactly one of them wins the creation race.
    async fn ensure_tenant(&self, tenant: &str, cluster: &str) -> AdminResult<()> {
        if self.list_tenants().await?.iter().any(|t| t == tenant) {
            return Ok(());
        }
        match self
            .create_tenant(tenant, &TenantInfo::allowing_cluster(cluster))
            .await
        {
            Err(AdminError::Conflict(_)) => {
                tracing::debug!("Tenant {tenant} was created concurrently by another worker");
                Ok(())
            }
            other => other,
        }
    }
}
