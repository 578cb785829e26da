use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SS58 wallet address of a finder. Kept as text; the chain SDK owns
/// checksum validation.
pub type Address = String;

/// Integer sentinel used at rest and on the wire for invalid submissions.
pub const INVALID_SCORE_SENTINEL: i64 = -999;

/// A timestamped prediction pulled from the memory API, attributed to the
/// wallet that inserted it. Field names follow the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub inserted_by_address: Address,
    pub inserted_at: DateTime<Utc>,
    /// Extracted prediction text.
    pub prediction: String,
    /// Full post the prediction was extracted from.
    pub full_post: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Outcome of judging a single submission. The original stored `-999` as a
/// duck-typed sentinel; here validity is a tagged variant and the sentinel
/// only exists at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Score {
    /// Quality score in 0..=100.
    Valid(u8),
    /// Not a valid prediction (spam, no future claim, unverifiable).
    Invalid,
}

impl Score {
    pub fn to_stored(self) -> i64 {
        match self {
            Score::Valid(v) => v as i64,
            Score::Invalid => INVALID_SCORE_SENTINEL,
        }
    }

    pub fn from_stored(raw: i64) -> anyhow::Result<Self> {
        match raw {
            INVALID_SCORE_SENTINEL => Ok(Score::Invalid),
            0..=100 => Ok(Score::Valid(raw as u8)),
            other => anyhow::bail!("stored score out of range: {}", other),
        }
    }

    pub fn is_invalid(self) -> bool {
        matches!(self, Score::Invalid)
    }
}

/// Judge output for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub score: Score,
    pub rationale: Option<String>,
}

/// One run of the extraction pipeline. Immutable after creation, ordered by
/// `run_timestamp`.
#[derive(Debug, Clone)]
pub struct IterationRow {
    pub id: i64,
    pub run_timestamp: DateTime<Utc>,
    pub submissions_fetched: u64,
}

/// One evaluation round. Open while `completed_at` is None; only completed
/// rounds are visible to scoring.
#[derive(Debug, Clone)]
pub struct RoundRow {
    pub id: i64,
    pub evaluator: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A persisted judgment of one submission within a round.
#[derive(Debug, Clone)]
pub struct EvaluationRow {
    pub round_id: i64,
    pub submission_id: i64,
    pub address: Address,
    pub score: Score,
    pub rationale: Option<String>,
}

/// Registry row for a finder address. Append-only; flags toggle, rows are
/// never deleted so history stays queryable.
#[derive(Debug, Clone)]
pub struct FinderRow {
    pub address: Address,
    pub active: bool,
    pub has_permission: bool,
    pub last_active_iteration_id: Option<i64>,
}

/// Per-address quality breakdown for one scored round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub base: f64,
    pub invalid_count: u32,
    pub penalty: f64,
    /// Population-normalized share; sums to 1.0 across the round unless
    /// everyone scored zero.
    pub final_score: f64,
}

impl QualityScore {
    pub fn zero() -> Self {
        Self {
            base: 0.0,
            invalid_count: 0,
            penalty: 0.0,
            final_score: 0.0,
        }
    }
}

/// What one `run_iteration` computed, and whether it was allowed to write.
#[derive(Debug, Clone, Serialize)]
pub struct IterationSummary {
    /// None on dry runs (nothing was persisted).
    pub iteration_id: Option<i64>,
    pub run_timestamp: DateTime<Utc>,
    pub submissions_fetched: usize,
    pub deltas: BTreeMap<Address, u64>,
    /// Integer reward weights that were (or would have been) pushed.
    pub final_weights: BTreeMap<Address, u8>,
    pub weights_pushed: bool,
    pub dry_run: bool,
}

/// Outcome of one automated validation round.
#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub round_id: i64,
    pub sampled: usize,
    pub evaluated: usize,
    pub invalid: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_roundtrips_through_storage_form() {
        assert_eq!(Score::Valid(73).to_stored(), 73);
        assert_eq!(Score::Invalid.to_stored(), INVALID_SCORE_SENTINEL);
        assert_eq!(Score::from_stored(73).unwrap(), Score::Valid(73));
        assert_eq!(
            Score::from_stored(INVALID_SCORE_SENTINEL).unwrap(),
            Score::Invalid
        );
    }

    #[test]
    fn score_rejects_out_of_range() {
        assert!(Score::from_stored(101).is_err());
        assert!(Score::from_stored(-1).is_err());
    }
}
