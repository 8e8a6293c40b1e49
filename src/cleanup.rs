//! Best-effort cleanup of benchmark-owned resources.
//!
//! The sweep enumerates every namespace under the benchmark tenant and
//! force-deletes all subscriptions and topics it finds. Nothing here ever
//! propagates an error: a failed enumeration or deletion is logged and
//! the sweep moves on. It runs at the end of initialization (clearing
//! leftovers from prior aborted runs) and again at shutdown.

use std::sync::Arc;

use tracing::{info, warn};

use crate::admin::AdminGateway;

pub struct CleanupCoordinator {
    admin: Arc<dyn AdminGateway>,
    tenant: String,
}

impl CleanupCoordinator {
    pub fn new(admin: Arc<dyn AdminGateway>, tenant: impl Into<String>) -> Self {
        Self {
            admin,
            tenant: tenant.into(),
        }
    }

    /// Delete all retained subscriptions and topics under the benchmark
    /// tenant. Never fails.
    pub async fn sweep(&self) {
        info!(
            "Starting to delete all retained topics and subscriptions under tenant {}",
            self.tenant
        );

        let namespaces = match self.admin.list_namespaces(&self.tenant).await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!("Failed to enumerate namespaces under {}: {e}", self.tenant);
                return;
            }
        };

        for namespace in namespaces {
            let topics = match self.admin.list_topics(&namespace).await {
                Ok(topics) => topics,
                Err(e) => {
                    warn!("Failed to enumerate topics in {namespace}: {e}");
                    continue;
                }
            };

            for topic in topics {
                match self.admin.list_subscriptions(&topic).await {
                    Ok(subscriptions) => {
                        for subscription in subscriptions {
                            if let Err(e) = self
                                .admin
                                .delete_subscription(&topic, &subscription, true)
                                .await
                            {
                                warn!(
                                    "Failed to delete subscription {subscription} on {topic}: {e}"
                                );
                            }
                        }
                    }
                    Err(e) => warn!("Failed to enumerate subscriptions on {topic}: {e}"),
                }

                if let Err(e) = self.admin.delete_topic(&topic, true).await {
                    warn!("Failed to delete topic {topic}: {e}");
                }
            }
        }

        info!("Finished deleting retained topics and subscriptions");
    }
}
