//! Retry for transient I/O at the call sites that own it. Scoring
//! functions are pure and are never retried from in here.

use crate::config::RetrySettings;
use std::future::Future;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            multiplier: s.multiplier,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` up to `max_attempts` times, sleeping
    /// `base_delay * multiplier^attempt` between failures.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut delay = self.base_delay;
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt < self.max_attempts {
                        tracing::warn!(
                            %label,
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, retrying"
                        );
                        sleep(delay).await;
                        delay = delay.mul_f64(self.multiplier.max(1.0));
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("retry ran zero attempts"))
            .context(format!("{} failed after {} attempts", label, self.max_attempts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out = quick(3)
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("flaky")
                }
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let out: anyhow::Result<()> = quick(2)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("down")
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
