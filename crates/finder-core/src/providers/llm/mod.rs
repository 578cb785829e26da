use async_trait::async_trait;

/// Chat-completion seam for the judging oracle.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
    fn provider_name(&self) -> &'static str;
}

pub mod openai;
