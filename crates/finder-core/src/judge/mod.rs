//! LLM judge: validity gate plus seven-dimension quality scoring. The
//! model must answer with a bare JSON object; anything else is a per-item
//! failure handled upstream by the batch validator.

use crate::config::JudgeSettings;
use crate::model::{Score, Submission, Verdict};
use crate::providers::llm::LlmClient;
use crate::validator::SubmissionJudge;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str = r#"You evaluate predictions for validity, and if valid, for quality across a set of dimensions.

VALIDITY GATE
A valid prediction is a verifiable claim about an uncertain future outcome that matters beyond those who control it.

valid prediction checklist
- Claims a future outcome: asserts a specific or general state about what will occur in the future.
- Outcome is uncertain: the prediction is non-trivial and non-obvious.
- Outcome is verifiable in principle: an observer could examine future evidence and make a reasonable judgement whether the prediction held true.
- Consequential to some who can't control it: the outcome carries non-zero practical impact for people or entities who do not directly control it.

Conditional predictions ("if X then Y") are valid.

QUALITY SCORING (0-100 per dimension)
Consequentiality: how significant are the stakes of the outcome?
Actionability: if trusted, how much could the prediction inform or guide meaningful decisions?
Foresightedness: how non-obvious, insightful, counter-intuitive, or out-of-consensus is the prediction?
Resolution clarity: how specific is the claimed outcome and timeline?
Verifiability: how easy/difficult is it to verify the prediction, from deterministic and objective (good) to ambiguous or narrative (bad)?
Conviction: how confident is the prediction? Verbal hedging is a significant reduction in quality.
Temporal horizon: expected duration until resolution; shorter is better, judged relative to the prediction's domain.

OUTPUT FORMAT
Return ONLY a valid JSON object. Do not include markdown code fences, backticks, or any other formatting.

{
 "valid": boolean,
 "scores": {
   "consequentiality": int,
   "actionability": int,
   "foresightedness": int,
   "resolution_clarity": int,
   "verifiability": int,
   "conviction": int,
   "temporal_horizon": int
 },
 "brief_rationale": string (max 100 words)
}

If invalid, the rationale should explain why and scores may be null. If valid, the rationale focuses on the dimensions scored notably high or low."#;

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    valid: bool,
    #[serde(default)]
    scores: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    brief_rationale: Option<String>,
}

#[derive(Clone)]
pub struct JudgeService {
    client: Arc<dyn LlmClient>,
    dimension_weights: BTreeMap<String, f64>,
}

impl JudgeService {
    pub fn new(client: Arc<dyn LlmClient>, settings: &JudgeSettings) -> Self {
        Self {
            client,
            dimension_weights: settings.dimension_weights.clone(),
        }
    }

    fn user_prompt(submission: &Submission) -> String {
        format!(
            "PREDICTION: {}\nTOPIC: {}\nFULL POST: {}",
            submission.prediction,
            submission.topic.as_deref().unwrap_or("unknown"),
            submission.full_post
        )
    }

    /// Parses the judge's JSON answer into a verdict. Valid predictions
    /// score as the weighted average of the dimension scores, rounded and
    /// clamped to 0..=100.
    pub fn parse_response(&self, raw: &str) -> anyhow::Result<Verdict> {
        let trimmed = strip_code_fences(raw.trim());
        let resp: JudgeResponse = serde_json::from_str(trimmed)
            .map_err(|e| anyhow::anyhow!("unparsable judge output: {} ({})", e, trimmed))?;

        if !resp.valid {
            return Ok(Verdict {
                score: Score::Invalid,
                rationale: resp.brief_rationale,
            });
        }

        let scores = resp
            .scores
            .ok_or_else(|| anyhow::anyhow!("judge marked valid but returned no scores"))?;

        let mut weighted = 0.0;
        for (dimension, score) in &scores {
            let weight = self.dimension_weights.get(dimension).copied().unwrap_or(0.0);
            weighted += score * weight;
        }
        let value = weighted.round().clamp(0.0, 100.0) as u8;

        Ok(Verdict {
            score: Score::Valid(value),
            rationale: resp.brief_rationale,
        })
    }
}

#[async_trait]
impl SubmissionJudge for JudgeService {
    async fn judge(&self, submission: &Submission) -> anyhow::Result<Verdict> {
        let raw = self
            .client
            .complete(SYSTEM_PROMPT, &Self::user_prompt(submission))
            .await?;
        self.parse_response(&raw)
    }
}

/// Some models wrap their answer in fences despite instructions; accept
/// the object inside rather than failing the item.
fn strip_code_fences(text: &str) -> &str {
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
