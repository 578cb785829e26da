//! Penalty Scorer: converts one completed round's valid/invalid outcomes
//! into a population-normalized quality score per address.
//!
//! Pure function of the persisted evaluations, the eligible population and
//! the configured constants; re-running against the same round always
//! produces identical output.

use crate::config::ScoringSettings;
use crate::model::{Address, EvaluationRow, QualityScore, Score};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct PenaltyParams {
    pub min_score: u8,
    pub max_score: u8,
    /// Base penalty magnitude P.
    pub base: f64,
    /// Escalation factor r.
    pub escalation: f64,
}

impl From<&ScoringSettings> for PenaltyParams {
    fn from(s: &ScoringSettings) -> Self {
        Self {
            min_score: s.min_score,
            max_score: s.max_score,
            base: s.penalty_base,
            escalation: s.penalty_escalation,
        }
    }
}

/// Geometric-series escalating penalty for `k` invalid submissions:
/// 0 at k=0, `P*k` when r==1, otherwise `P*(r^k - 1)/(r - 1)`. Each
/// additional invalid submission costs more than the last.
pub fn penalty(params: &PenaltyParams, k: u32) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let p = params.base;
    let r = params.escalation;
    if (r - 1.0).abs() < f64::EPSILON {
        p * k as f64
    } else {
        p * (r.powi(k as i32) - 1.0) / (r - 1.0)
    }
}

/// Scores one completed round over the union of evaluated addresses and the
/// eligible population. Eligible addresses without any evaluations are
/// scored at zero rather than omitted; dropping them would shrink the
/// normalization denominator and inflate everyone else's share.
pub fn score_round(
    evaluations: &[EvaluationRow],
    eligible: &[Address],
    params: &PenaltyParams,
) -> BTreeMap<Address, QualityScore> {
    let mut valid: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
    let mut invalid: BTreeMap<&str, u32> = BTreeMap::new();
    for e in evaluations {
        match e.score {
            Score::Valid(v) => valid.entry(e.address.as_str()).or_default().push(v),
            Score::Invalid => *invalid.entry(e.address.as_str()).or_default() += 1,
        }
    }

    let range = (params.max_score - params.min_score) as f64;
    let mut scores: BTreeMap<Address, QualityScore> = BTreeMap::new();

    let evaluated_addresses: Vec<&str> = valid.keys().chain(invalid.keys()).copied().collect();
    for address in evaluated_addresses {
        let valid_scores = valid.get(address).map(Vec::as_slice).unwrap_or(&[]);
        let invalid_count = invalid.get(address).copied().unwrap_or(0);

        let base = if valid_scores.is_empty() {
            0.0
        } else {
            let mean =
                valid_scores.iter().map(|v| *v as f64).sum::<f64>() / valid_scores.len() as f64;
            (mean - params.min_score as f64) / range
        };
        let pen = penalty(params, invalid_count);

        scores.insert(
            address.to_string(),
            QualityScore {
                base,
                invalid_count,
                penalty: pen,
                final_score: (base - pen).clamp(0.0, 1.0),
            },
        );
    }

    for address in eligible {
        scores
            .entry(address.clone())
            .or_insert_with(QualityScore::zero);
    }

    // Normalize shares to sum 1.0. A zero total is a valid terminal state
    // meaning no rewardable quality this round.
    let total: f64 = scores.values().map(|s| s.final_score).sum();
    if total > 0.0 {
        for s in scores.values_mut() {
            s.final_score /= total;
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PenaltyParams {
        PenaltyParams {
            min_score: 0,
            max_score: 100,
            base: 0.1,
            escalation: 1.5,
        }
    }

    fn eval(address: &str, submission_id: i64, score: Score) -> EvaluationRow {
        EvaluationRow {
            round_id: 1,
            submission_id,
            address: address.into(),
            score,
            rationale: None,
        }
    }

    #[test]
    fn penalty_zero_at_zero_invalids() {
        assert_eq!(penalty(&params(), 0), 0.0);
    }

    #[test]
    fn penalty_is_non_decreasing_and_escalating() {
        let p = params();
        let mut prev = 0.0;
        let mut prev_step = 0.0;
        for k in 1..10 {
            let cur = penalty(&p, k);
            assert!(cur > prev);
            let step = cur - prev;
            assert!(step > prev_step, "each invalid must cost more than the last");
            prev = cur;
            prev_step = step;
        }
    }

    #[test]
    fn penalty_is_linear_when_escalation_is_one() {
        let p = PenaltyParams {
            escalation: 1.0,
            ..params()
        };
        assert!((penalty(&p, 4) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn scores_sum_to_one_when_any_nonzero() {
        let evals = vec![
            eval("a", 1, Score::Valid(80)),
            eval("a", 2, Score::Valid(60)),
            eval("b", 3, Score::Valid(40)),
            eval("b", 4, Score::Invalid),
        ];
        let scores = score_round(&evals, &["a".into(), "b".into(), "c".into()], &params());

        let sum: f64 = scores.values().map(|s| s.final_score).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(scores["c"], QualityScore::zero());
        assert_eq!(scores["b"].invalid_count, 1);
        assert!((scores["b"].penalty - 0.1).abs() < 1e-12);
    }

    #[test]
    fn all_invalid_population_stays_at_zero() {
        let evals = vec![eval("a", 1, Score::Invalid), eval("a", 2, Score::Invalid)];
        let scores = score_round(&evals, &["a".into(), "b".into()], &params());
        assert!(scores.values().all(|s| s.final_score == 0.0));
        let sum: f64 = scores.values().map(|s| s.final_score).sum();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn penalty_can_wipe_out_base_but_not_go_negative() {
        let evals = vec![
            eval("a", 1, Score::Valid(20)),
            eval("a", 2, Score::Invalid),
            eval("a", 3, Score::Invalid),
            eval("a", 4, Score::Invalid),
            eval("a", 5, Score::Invalid),
            eval("b", 6, Score::Valid(50)),
        ];
        let scores = score_round(&evals, &[], &params());
        // base 0.2 against penalty 0.1*(1.5^4-1)/0.5 = 0.8125
        assert_eq!(scores["a"].final_score, 0.0);
        assert!((scores["b"].final_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rerunning_the_same_round_is_bit_identical() {
        let evals = vec![
            eval("b", 3, Score::Valid(33)),
            eval("a", 1, Score::Valid(91)),
            eval("a", 2, Score::Invalid),
        ];
        let eligible = vec!["a".to_string(), "b".to_string(), "idle".to_string()];
        let first = score_round(&evals, &eligible, &params());
        let second = score_round(&evals, &eligible, &params());
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn evaluated_address_missing_from_population_is_still_scored() {
        let evals = vec![eval("a", 1, Score::Valid(70))];
        let scores = score_round(&evals, &["b".into()], &params());
        assert!((scores["a"].final_score - 1.0).abs() < 1e-9);
        assert_eq!(scores["b"], QualityScore::zero());
    }
}
