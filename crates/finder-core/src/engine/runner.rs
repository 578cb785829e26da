use crate::config::EngineConfig;
use crate::model::{
    Address, IterationSummary, QualityScore, ValidationSummary,
};
use crate::providers::ledger::LedgerWriter;
use crate::providers::permissions::PermissionSource;
use crate::providers::submissions::SubmissionSource;
use crate::retry::RetryPolicy;
use crate::scoring::{blend, score_round, to_percentages, PenaltyParams};
use crate::storage::Store;
use crate::validator::{validate_all, SubmissionJudge};
use crate::{report, sampler, volume};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Orchestrates one scoring pipeline: fetch, deltas, persistence, finder
/// reconciliation, round scoring, blending, ledger push. Single-threaded
/// control flow; the only concurrency lives inside the batch validator.
pub struct Engine {
    pub store: Store,
    pub submissions: Arc<dyn SubmissionSource>,
    pub permissions: Arc<dyn PermissionSource>,
    pub ledger: Arc<dyn LedgerWriter>,
    pub config: EngineConfig,
}

impl Engine {
    fn retry(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.schedule.retry)
    }

    /// Runs a complete iteration. With `dry_run` every read and computation
    /// happens and identical figures are printed, but nothing is written,
    /// not to the store and not to the ledger.
    pub async fn run_iteration(&self, dry_run: bool) -> anyhow::Result<IterationSummary> {
        let run_timestamp = Utc::now();
        let retry = self.retry();
        tracing::info!(%run_timestamp, dry_run, "starting iteration");

        // Fetch strictly since the last stored iteration; a wider window
        // would double count volume.
        let from = match self.store.last_iteration()? {
            Some(last) => last.run_timestamp,
            None => self.config.schedule.initial_start_date,
        };
        let submissions = retry
            .run("fetch submissions", || self.submissions.fetch_since(from))
            .await?;

        let window_counts = volume::count_by_address(&submissions);
        let previous_totals = self.store.previous_address_totals()?;
        let mut current_totals = previous_totals.clone();
        for (address, count) in &window_counts {
            *current_totals.entry(address.clone()).or_default() += count;
        }
        let deltas = volume::compute_deltas(&current_totals, &previous_totals);
        tracing::info!(
            fetched = submissions.len(),
            addresses = deltas.len(),
            "computed volume deltas"
        );

        let eligible = retry
            .run("fetch permission snapshot", || {
                self.permissions.eligible_population()
            })
            .await?;

        let iteration_id = if dry_run {
            tracing::info!(
                submissions = submissions.len(),
                deltas = deltas.len(),
                "dry run: would store iteration"
            );
            None
        } else {
            let id = self.store.store_iteration(
                run_timestamp,
                submissions.len(),
                &deltas,
                &current_totals,
            )?;
            tracing::info!(iteration_id = id, "stored iteration");
            Some(id)
        };

        let active: HashSet<Address> = window_counts.keys().cloned().collect();
        match iteration_id {
            Some(id) => {
                self.store.reconcile_finders(id, &active, &eligible)?;
                tracing::info!(
                    permitted = eligible.len(),
                    active = active.len(),
                    "reconciled finder status"
                );
            }
            None => tracing::info!(
                permitted = eligible.len(),
                active = active.len(),
                "dry run: would reconcile finder status"
            ),
        }

        // Latest completed round drives quality; an interrupted round has
        // no completed_at and is invisible here.
        let mut final_weights: BTreeMap<Address, u8> = BTreeMap::new();
        let mut weights_pushed = false;

        if let Some(round) = self.store.latest_completed_round()? {
            let evaluations = self.store.round_evaluations(round.id)?;
            let params = PenaltyParams::from(&self.config.scoring);
            let quality = score_round(&evaluations, &eligible, &params);

            let quality_shares: BTreeMap<Address, f64> = quality
                .iter()
                .map(|(a, s)| (a.clone(), s.final_score))
                .collect();
            let blended = blend(
                &quality_shares,
                &deltas,
                self.config.scoring.quality_weight,
                self.config.scoring.quantity_weight,
            );
            final_weights = to_percentages(&blended);

            report::console::print_score_table(&quality, &blended, &deltas);

            if let Some(id) = iteration_id {
                self.store
                    .insert_final_scores(round.id, Some(id), &quality, &blended)?;
            }

            if final_weights.values().any(|w| *w > 0) {
                if dry_run {
                    tracing::info!(
                        recipients = final_weights.len(),
                        "dry run: would push ledger weights"
                    );
                } else {
                    // A failed push is reported, never rolled back into
                    // local scoring state.
                    match retry
                        .run("push ledger weights", || {
                            self.ledger.push_weights(&final_weights)
                        })
                        .await
                    {
                        Ok(()) => {
                            weights_pushed = true;
                            tracing::info!(
                                recipients = final_weights.len(),
                                "ledger weights updated"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "ledger weight update failed");
                        }
                    }
                }
            } else {
                tracing::info!("no nonzero weights this round, skipping ledger push");
            }
        } else {
            tracing::info!("no completed evaluation round yet, scores unavailable");
        }

        let summary = IterationSummary {
            iteration_id,
            run_timestamp,
            submissions_fetched: submissions.len(),
            deltas,
            final_weights,
            weights_pushed,
            dry_run,
        };
        report::console::print_iteration_summary(&summary);
        Ok(summary)
    }

    /// Re-scores one completed round. Pure over the persisted evaluations,
    /// the permission snapshot and the configured constants, so repeated
    /// calls return identical output.
    pub async fn score_round(
        &self,
        round_id: i64,
    ) -> anyhow::Result<BTreeMap<Address, QualityScore>> {
        let round = self
            .store
            .round(round_id)?
            .ok_or_else(|| anyhow::anyhow!("unknown round {}", round_id))?;
        if round.completed_at.is_none() {
            anyhow::bail!("round {} is not completed and cannot be scored", round_id);
        }

        let evaluations = self.store.round_evaluations(round_id)?;
        let eligible = self
            .retry()
            .run("fetch permission snapshot", || {
                self.permissions.eligible_population()
            })
            .await?;
        let params = PenaltyParams::from(&self.config.scoring);
        Ok(score_round(&evaluations, &eligible, &params))
    }

    /// Automated validation round: fetch over the lookback window, sample
    /// fairly, judge in bounded batches, persist once per batch so partial
    /// progress survives interruption, then complete the round.
    pub async fn run_validation(
        &self,
        judge: Arc<dyn SubmissionJudge>,
        evaluator: &str,
    ) -> anyhow::Result<ValidationSummary> {
        let retry = self.retry();
        let from =
            Utc::now() - chrono::Duration::hours(self.config.schedule.validation_lookback_hours as i64);
        let submissions = retry
            .run("fetch submissions", || self.submissions.fetch_since(from))
            .await?;

        let evaluated = self.store.evaluated_submission_ids()?;
        let sampled = sampler::sample(
            &submissions,
            self.config.scoring.sample_size,
            &evaluated,
            self.config.scoring.seed,
        );
        if sampled.is_empty() {
            anyhow::bail!("no unevaluated submissions in the lookback window");
        }
        tracing::info!(
            pool = submissions.len(),
            sampled = sampled.len(),
            "sampled submissions for validation"
        );

        let round_id = self.store.create_round(evaluator)?;
        let batch_size = self.config.scoring.batch_size;
        let mut evaluated_count = 0usize;
        let mut invalid = 0usize;
        let mut failed = 0usize;

        for batch in sampled.chunks(batch_size) {
            let verdicts = validate_all(batch, judge.clone(), batch_size).await;
            for (submission, verdict) in batch.iter().zip(verdicts) {
                match verdict {
                    Some(v) => {
                        if v.score.is_invalid() {
                            invalid += 1;
                        } else {
                            evaluated_count += 1;
                        }
                        self.store.insert_evaluation(
                            round_id,
                            submission.id,
                            &submission.inserted_by_address,
                            v.score,
                            v.rationale.as_deref(),
                        )?;
                    }
                    None => failed += 1,
                }
            }
        }

        self.store.complete_round(round_id)?;
        let summary = ValidationSummary {
            round_id,
            sampled: sampled.len(),
            evaluated: evaluated_count,
            invalid,
            failed,
        };
        tracing::info!(
            round_id,
            evaluated = summary.evaluated,
            invalid = summary.invalid,
            failed = summary.failed,
            "validation round complete"
        );
        Ok(summary)
    }
}
