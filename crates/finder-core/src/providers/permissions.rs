use crate::model::Address;
use async_trait::async_trait;

/// Snapshot of the addresses holding the curated permission. The engine
/// reads this once per iteration; it never mutates the set.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn eligible_population(&self) -> anyhow::Result<Vec<Address>>;
}

pub struct HttpPermissionSource {
    pub endpoint: String,
    pub permission_id: String,
    pub client: reqwest::Client,
}

impl HttpPermissionSource {
    pub fn new(endpoint: &str, permission_id: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            permission_id: permission_id.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PermissionSource for HttpPermissionSource {
    async fn eligible_population(&self) -> anyhow::Result<Vec<Address>> {
        let url = format!(
            "{}/permissions/{}/recipients",
            self.endpoint, self.permission_id
        );
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("permission snapshot error: {}", resp.status());
        }
        let recipients: Vec<Address> = resp.json().await?;
        tracing::debug!(count = recipients.len(), "fetched permission snapshot");
        Ok(recipients)
    }
}
