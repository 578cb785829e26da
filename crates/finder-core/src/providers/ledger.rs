use crate::model::Address;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;

/// Writes the final integer weights to the external ledger. A failed push
/// is reported to the caller and never rolls back local scoring state.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn push_weights(&self, weights: &BTreeMap<Address, u8>) -> anyhow::Result<()>;
}

pub struct HttpLedgerWriter {
    pub endpoint: String,
    pub permission_id: String,
    pub client: reqwest::Client,
}

impl HttpLedgerWriter {
    pub fn new(endpoint: &str, permission_id: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            permission_id: permission_id.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LedgerWriter for HttpLedgerWriter {
    async fn push_weights(&self, weights: &BTreeMap<Address, u8>) -> anyhow::Result<()> {
        if weights.is_empty() {
            anyhow::bail!("no weights to push");
        }

        // Recipients as address/weight pairs, matching the permission
        // update call's map encoding.
        let recipients: Vec<(String, u8)> =
            weights.iter().map(|(a, w)| (a.clone(), *w)).collect();
        let url = format!(
            "{}/permissions/{}/weights",
            self.endpoint, self.permission_id
        );
        let body = json!({
            "permission_id": self.permission_id,
            "recipients": recipients,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("ledger weight update failed: {}", resp.status());
        }

        for (address, weight) in weights {
            tracing::info!(%address, weight, "ledger weight set");
        }
        Ok(())
    }
}
