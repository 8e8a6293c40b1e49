//! Admin gateway over the cluster's HTTP admin API.
//!
//! Thin REST binding: every trait method maps onto one `/admin/v2` call,
//! with 409 responses surfaced as [`AdminError::Conflict`] so the
//! provisioning layer can tell benign creation races from real failures.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::admin::{AdminGateway, BacklogQuota, PersistencePolicy, TenantInfo};
use crate::config::ClientConfig;
use crate::error::{AdminError, AdminResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpAdminGateway {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpAdminGateway {
    /// Build a gateway for the admin endpoint in `config`.
    ///
    /// When the endpoint is HTTPS the TLS options are honored; token
    /// authentication is applied when the configured auth plugin is the
    /// token plugin.
    pub fn new(config: &ClientConfig) -> AdminResult<Self> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);
        if config.http_url.starts_with("https") && config.tls_allow_insecure_connection {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        let auth_token = auth_token(config.auth_plugin.as_deref(), config.auth_data.as_deref());

        debug!("Created admin gateway for HTTP URL {}", config.http_url);
        Ok(Self {
            http,
            base_url: config.http_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/admin/v2/{path}", self.base_url)
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> AdminResult<Response> {
        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            Err(AdminError::Conflict(operation.to_string()))
        } else if status == StatusCode::NOT_FOUND {
            Err(AdminError::NotFound(operation.to_string()))
        } else {
            Err(AdminError::Unexpected {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// REST path for a full topic name:
/// `persistent://tenant/ns/topic` becomes `persistent/tenant/ns/topic`.
/// Names without a domain scheme default to the persistent domain.
fn topic_path(topic: &str) -> String {
    match topic.split_once("://") {
        Some((domain, rest)) => format!("{domain}/{rest}"),
        None => format!("persistent/{topic}"),
    }
}

/// Bearer token to attach, if the configured plugin is token-based.
fn auth_token(plugin: Option<&str>, data: Option<&str>) -> Option<String> {
    let plugin = plugin?;
    if plugin.eq_ignore_ascii_case("token") || plugin.ends_with("AuthenticationToken") {
        data.map(|d| d.to_string())
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct PartitionedTopicMetadata {
    partitions: u32,
}

#[async_trait::async_trait]
impl AdminGateway for HttpAdminGateway {
    async fn list_tenants(&self) -> AdminResult<Vec<String>> {
        let response = self
            .execute("list tenants", self.http.get(self.url("tenants")))
            .await?;
        Ok(response.json().await?)
    }

    async fn create_tenant(&self, tenant: &str, info: &TenantInfo) -> AdminResult<()> {
        self.execute(
            &format!("create tenant {tenant}"),
            self.http
                .put(self.url(&format!("tenants/{tenant}")))
                .json(info),
        )
        .await?;
        Ok(())
    }

    async fn create_namespace(&self, namespace: &str) -> AdminResult<()> {
        self.execute(
            &format!("create namespace {namespace}"),
            self.http
                .put(self.url(&format!("namespaces/{namespace}")))
                .json(&serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn set_persistence(
        &self,
        namespace: &str,
        policy: &PersistencePolicy,
    ) -> AdminResult<()> {
        self.execute(
            &format!("set persistence on {namespace}"),
            self.http
                .post(self.url(&format!("namespaces/{namespace}/persistence")))
                .json(policy),
        )
        .await?;
        Ok(())
    }

    async fn set_backlog_quota(&self, namespace: &str, quota: &BacklogQuota) -> AdminResult<()> {
        self.execute(
            &format!("set backlog quota on {namespace}"),
            self.http
                .post(self.url(&format!("namespaces/{namespace}/backlogQuota")))
                .json(quota),
        )
        .await?;
        Ok(())
    }

    async fn set_deduplication_status(&self, namespace: &str, enabled: bool) -> AdminResult<()> {
        self.execute(
            &format!("set deduplication on {namespace}"),
            self.http
                .post(self.url(&format!("namespaces/{namespace}/deduplication")))
                .json(&enabled),
        )
        .await?;
        Ok(())
    }

    async fn list_namespaces(&self, tenant: &str) -> AdminResult<Vec<String>> {
        let response = self
            .execute(
                &format!("list namespaces under {tenant}"),
                self.http.get(self.url(&format!("namespaces/{tenant}"))),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn list_topics(&self, namespace: &str) -> AdminResult<Vec<String>> {
        let response = self
            .execute(
                &format!("list topics in {namespace}"),
                self.http
                    .get(self.url(&format!("persistent/{namespace}"))),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn list_subscriptions(&self, topic: &str) -> AdminResult<Vec<String>> {
        let response = self
            .execute(
                &format!("list subscriptions on {topic}"),
                self.http
                    .get(self.url(&format!("{}/subscriptions", topic_path(topic)))),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_subscription(
        &self,
        topic: &str,
        subscription: &str,
        force: bool,
    ) -> AdminResult<()> {
        self.execute(
            &format!("delete subscription {subscription} on {topic}"),
            self.http
                .delete(self.url(&format!(
                    "{}/subscription/{subscription}",
                    topic_path(topic)
                )))
                .query(&[("force", force)]),
        )
        .await?;
        Ok(())
    }

    async fn delete_topic(&self, topic: &str, force: bool) -> AdminResult<()> {
        self.execute(
            &format!("delete topic {topic}"),
            self.http
                .delete(self.url(&topic_path(topic)))
                .query(&[("force", force)]),
        )
        .await?;
        Ok(())
    }

    async fn partitioned_topic_metadata(&self, topic: &str) -> AdminResult<u32> {
        let response = self
            .execute(
                &format!("partition metadata for {topic}"),
                self.http
                    .get(self.url(&format!("{}/partitions", topic_path(topic)))),
            )
            .await?;
        let metadata: PartitionedTopicMetadata = response.json().await?;
        Ok(metadata.partitions)
    }

    async fn create_partitioned_topic(&self, topic: &str, partitions: u32) -> AdminResult<()> {
        self.execute(
            &format!("create partitioned topic {topic}"),
            self.http
                .put(self.url(&format!("{}/partitions", topic_path(topic))))
                .json(&partitions),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_path_with_domain() {
        assert_eq!(
            topic_path("persistent://benchmark/ns-1/test-0"),
            "persistent/benchmark/ns-1/test-0"
        );
        assert_eq!(
            topic_path("non-persistent://benchmark/ns-1/test-0"),
            "non-persistent/benchmark/ns-1/test-0"
        );
    }

    #[test]
    fn test_topic_path_defaults_to_persistent() {
        assert_eq!(
            topic_path("benchmark/ns-1/test-0"),
            "persistent/benchmark/ns-1/test-0"
        );
    }

    #[test]
    fn test_url_building() {
        let config = ClientConfig {
            http_url: "http://broker:8080/".to_string(),
            ..ClientConfig::default()
        };
        let gateway = HttpAdminGateway::new(&config).unwrap();
        assert_eq!(gateway.url("tenants"), "http://broker:8080/admin/v2/tenants");
    }

    #[test]
    fn test_auth_token_for_token_plugin() {
        assert_eq!(
            auth_token(
                Some("org.apache.pulsar.client.impl.auth.AuthenticationToken"),
                Some("secret")
            ),
            Some("secret".to_string())
        );
        assert_eq!(auth_token(Some("token"), Some("secret")), Some("secret".to_string()));
        assert_eq!(auth_token(Some("tls"), Some("secret")), None);
        assert_eq!(auth_token(None, Some("secret")), None);
    }
}
