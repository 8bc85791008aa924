use serde::Deserialize;
use serde_json::Value;

use talk_core::model::{Correction, FluencyScore};

use super::FluencyAnalysis;
use crate::error::CoachError;

pub(crate) const SYSTEM_PROMPT: &str =
    "You are a helpful English fluency analyzer. Always respond with valid JSON.";

/// Build the coaching prompt for one learner message.
pub(crate) fn coaching_prompt(text: &str) -> String {
    format!(
        r#"You are TalkBuddy, a friendly English conversation coach for non-native learners.

Text to analyze: "{text}"

Reply to the message naturally in simple English, point out grammar, structure or
vocabulary problems politely, suggest a corrected version even when the original
is understandable, and ask a friendly follow-up question.

Respond with a JSON object in exactly this format:
{{
  "score": 8,
  "corrected": "The corrected version of the text",
  "feedback": "Brief, encouraging explanation of improvements",
  "corrections": [
    {{ "original": "incorrect phrase", "corrected": "correct phrase", "type": "grammar" }}
  ],
  "reply": "Conversational response that ends with a follow-up question"
}}

Scores run from 1 to 10:
- 9-10: near-native fluency
- 7-8: minor tweaks needed
- 5-6: some areas to improve
- 3-4: work on structure
- 1-2: keep practicing"#
    )
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    score: Option<Value>,
    corrected: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    corrections: Option<Vec<Value>>,
    reply: Option<String>,
}

/// Slice the outermost `{ .. }` out of a model reply that may wrap the
/// object in prose or markdown fences.
#[must_use]
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// Turn a model reply into a `FluencyAnalysis`.
///
/// Score is clamped into 1..=10 and may be a number or numeric string.
/// Malformed correction entries are dropped.
///
/// # Errors
///
/// Returns `CoachError::Parse` if no JSON object can be read and
/// `CoachError::MissingField` if score, corrected text or reply is absent.
pub fn parse_analysis(reply: &str) -> Result<FluencyAnalysis, CoachError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| CoachError::Parse("no json object in reply".into()))?;
    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| CoachError::Parse(e.to_string()))?;

    let score = raw
        .score
        .as_ref()
        .and_then(score_value)
        .ok_or(CoachError::MissingField("score"))?;
    let corrected = non_blank(raw.corrected).ok_or(CoachError::MissingField("corrected"))?;
    let reply = non_blank(raw.reply).ok_or(CoachError::MissingField("reply"))?;
    let corrections = raw
        .corrections
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Correction>(v).ok())
        .collect();

    Ok(FluencyAnalysis {
        score: FluencyScore::clamped(score),
        corrected,
        feedback: raw.feedback.unwrap_or_default().trim().to_owned(),
        corrections,
        reply,
    })
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
