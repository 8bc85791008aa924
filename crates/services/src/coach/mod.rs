//! Fluency analysis of learner messages.
//!
//! `CoachService` asks a chat-completions API for a structured analysis and
//! degrades to `HeuristicAnalyzer` whenever the API is unavailable or its
//! reply cannot be used, so `FluencyAnalyzer::analyze` never fails.

use async_trait::async_trait;
use serde::Serialize;

use talk_core::model::{Correction, FluencyScore};

mod client;
mod heuristic;
mod parse;

pub use client::{CoachConfig, CoachService, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use heuristic::HeuristicAnalyzer;
pub use parse::{extract_json_object, parse_analysis};

/// Score, corrected text and conversational reply for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FluencyAnalysis {
    pub score: FluencyScore,
    pub corrected: String,
    pub feedback: String,
    pub corrections: Vec<Correction>,
    pub reply: String,
}

#[async_trait]
pub trait FluencyAnalyzer: Send + Sync {
    /// Analyze a learner message. Implementations fall back internally
    /// instead of returning errors.
    async fn analyze(&self, text: &str) -> FluencyAnalysis;
}
