use crate::model::Submission;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of timestamped submissions. The memory API pages by offset with
/// ascending ids; auth internals live behind this seam.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn fetch_since(&self, from: DateTime<Utc>) -> anyhow::Result<Vec<Submission>>;
}

pub struct HttpSubmissionSource {
    pub base_url: String,
    pub page_limit: u32,
    pub bearer_token: String,
    pub client: reqwest::Client,
}

impl HttpSubmissionSource {
    pub fn new(base_url: &str, page_limit: u32, bearer_token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            page_limit,
            bearer_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SubmissionSource for HttpSubmissionSource {
    /// Pages through `/predictions/list` until a short page signals the
    /// end. Pages sort ascending by id so re-fetches are stable.
    async fn fetch_since(&self, from: DateTime<Utc>) -> anyhow::Result<Vec<Submission>> {
        let url = format!("{}/predictions/list", self.base_url);
        let from_str = from.to_rfc3339();
        let mut all: Vec<Submission> = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let limit = self.page_limit.to_string();
            let offset_str = offset.to_string();
            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("from", from_str.as_str()),
                    ("limit", limit.as_str()),
                    ("offset", offset_str.as_str()),
                    ("sort_by", "id"),
                    ("sort_order", "asc"),
                ])
                .header("Authorization", format!("Bearer {}", self.bearer_token))
                .send()
                .await?;

            if !resp.status().is_success() {
                anyhow::bail!("submission API error: {}", resp.status());
            }

            let page: Vec<Submission> = resp.json().await?;
            let page_len = page.len();
            all.extend(page);
            tracing::debug!(fetched = all.len(), offset, "fetched submission page");

            if page_len < self.page_limit as usize {
                break;
            }
            offset += self.page_limit;
        }

        tracing::info!(total = all.len(), since = %from_str, "finished fetching submissions");
        Ok(all)
    }
}
