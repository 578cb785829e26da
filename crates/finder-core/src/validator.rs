//! Batch Validator: judges submissions concurrently in fixed-size batches.
//!
//! A batch is fully awaited before the next one starts, which bounds peak
//! outstanding requests against the judging oracle to `batch_size`. A
//! failing item degrades to `None` in its slot; callers decide whether that
//! means "skip" or "maximal penalty". There is no mid-batch cancellation.

use crate::model::{Submission, Verdict};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SubmissionJudge: Send + Sync {
    async fn judge(&self, submission: &Submission) -> anyhow::Result<Verdict>;
}

/// Results indexed by original item position, regardless of completion
/// order. Progress is reported once per completed batch, not per item.
pub async fn validate_all(
    items: &[Submission],
    judge: Arc<dyn SubmissionJudge>,
    batch_size: usize,
) -> Vec<Option<Verdict>> {
    let batch_size = batch_size.max(1);
    let mut results: Vec<Option<Verdict>> = Vec::with_capacity(items.len());
    let total_batches = items.len().div_ceil(batch_size);

    for (batch_no, batch) in items.chunks(batch_size).enumerate() {
        let mut handles = Vec::with_capacity(batch.len());
        for item in batch {
            let judge = judge.clone();
            let item = item.clone();
            handles.push(tokio::spawn(async move { judge.judge(&item).await }));
        }

        for (offset, h) in handles.into_iter().enumerate() {
            let submission_id = batch[offset].id;
            let verdict = match h.await {
                Ok(Ok(v)) => Some(v),
                Ok(Err(e)) => {
                    tracing::warn!(submission_id, error = %e, "judge call failed");
                    None
                }
                Err(e) => {
                    tracing::warn!(submission_id, error = %e, "judge task panicked");
                    None
                }
            };
            results.push(verdict);
        }

        tracing::info!(
            batch = batch_no + 1,
            total_batches,
            judged = results.len(),
            total = items.len(),
            "validation batch complete"
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Score;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::time::{sleep, Duration};

    fn sub(id: i64) -> Submission {
        Submission {
            id,
            inserted_by_address: "addr".into(),
            inserted_at: Utc::now(),
            prediction: format!("p{}", id),
            full_post: format!("post {}", id),
            topic: None,
            url: None,
            context: None,
        }
    }

    struct RecordingJudge {
        fail_id: Option<i64>,
        spans: Mutex<Vec<(i64, Instant, Instant)>>,
    }

    #[async_trait]
    impl SubmissionJudge for RecordingJudge {
        async fn judge(&self, submission: &Submission) -> anyhow::Result<Verdict> {
            let start = Instant::now();
            sleep(Duration::from_millis(20)).await;
            let end = Instant::now();
            self.spans.lock().unwrap().push((submission.id, start, end));
            if self.fail_id == Some(submission.id) {
                anyhow::bail!("malformed judge output");
            }
            Ok(Verdict {
                score: Score::Valid(50),
                rationale: None,
            })
        }
    }

    #[tokio::test]
    async fn seventeen_items_run_as_two_batches_with_failure_slot() {
        let items: Vec<Submission> = (0..17).map(sub).collect();
        let judge = Arc::new(RecordingJudge {
            fail_id: Some(5),
            spans: Mutex::new(Vec::new()),
        });

        let results = validate_all(&items, judge.clone(), 16).await;

        assert_eq!(results.len(), 17);
        assert!(results[5].is_none());
        for (i, r) in results.iter().enumerate() {
            if i != 5 {
                assert!(r.is_some(), "index {} should have a verdict", i);
            }
        }

        // The 17th item belongs to the second batch and must not start
        // until every first-batch call has finished.
        let spans = judge.spans.lock().unwrap();
        let last_start = spans.iter().find(|(id, _, _)| *id == 16).unwrap().1;
        let first_batch_end = spans
            .iter()
            .filter(|(id, _, _)| *id < 16)
            .map(|(_, _, end)| *end)
            .max()
            .unwrap();
        assert!(last_start >= first_batch_end);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let judge = Arc::new(RecordingJudge {
            fail_id: None,
            spans: Mutex::new(Vec::new()),
        });
        let results = validate_all(&[], judge, 16).await;
        assert!(results.is_empty());
    }
}
