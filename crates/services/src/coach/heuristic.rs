use async_trait::async_trait;

use talk_core::model::FluencyScore;

use super::{FluencyAnalysis, FluencyAnalyzer};

const BASE_SCORE: i32 = 7;

const TOPIC_REPLIES: [(&[&str], &str); 6] = [
    (
        &["food", "eat", "cook"],
        "Food is such a great topic! What's your favorite dish to cook or eat? I'd love to hear about the flavors you enjoy!",
    ),
    (
        &["work", "job"],
        "Work can be such an interesting topic! What do you enjoy most about your job? What makes a good day at work for you?",
    ),
    (
        &["travel", "trip", "visit"],
        "Travel stories are always exciting! Where would you love to visit next? What's the most beautiful place you've been to?",
    ),
    (
        &["family", "friend"],
        "Family and friends are so important! Tell me about someone special in your life. What makes them amazing?",
    ),
    (
        &["hobby", "like", "enjoy"],
        "I love hearing about people's interests! What got you started with that hobby? How does it make you feel when you do it?",
    ),
    (
        &["book", "read", "movie"],
        "That sounds interesting! What kind of stories do you enjoy most? Have you discovered anything amazing recently?",
    ),
];

/// Offline analysis based on surface checks of capitalization,
/// punctuation and length.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn analyze_text(&self, text: &str) -> FluencyAnalysis {
        let text = text.trim();
        let mut score = BASE_SCORE;
        let mut issues: Vec<&str> = Vec::new();

        if text.chars().count() < 5 {
            score -= 2;
            issues.push("Very short response");
        }
        if !text.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            score -= 1;
            issues.push("Should start with capital letter");
        }
        if !text.ends_with(['.', '!', '?']) {
            score -= 1;
            issues.push("Missing punctuation at end");
        }
        if has_lowercase_i_am(text) {
            score -= 1;
            issues.push("'I' should be capitalized");
        }

        let score = FluencyScore::clamped(f64::from(score));
        let feedback = if issues.is_empty() {
            "Excellent work!".to_owned()
        } else {
            format!(
                "Just a few small things to polish: {}. You're doing well!",
                issues.join(", ")
            )
        };

        FluencyAnalysis {
            score,
            corrected: text.to_owned(),
            feedback,
            corrections: Vec::new(),
            reply: reply_for(text, score).to_owned(),
        }
    }
}

#[async_trait]
impl FluencyAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, text: &str) -> FluencyAnalysis {
        self.analyze_text(text)
    }
}

/// True when "i am" appears in any casing but never as "I am".
fn has_lowercase_i_am(text: &str) -> bool {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();
    let mut any = false;
    let mut proper = false;
    for pair in words.windows(2) {
        if pair[0].eq_ignore_ascii_case("i") && pair[1].eq_ignore_ascii_case("am") {
            any = true;
            if pair[0] == "I" && pair[1] == "am" {
                proper = true;
            }
        }
    }
    any && !proper
}

fn reply_for(text: &str, score: FluencyScore) -> &'static str {
    let lower = text.to_lowercase();
    if let Some(reply) = TOPIC_REPLIES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|&(_, reply)| reply)
    {
        return reply;
    }
    match score.value() {
        7.. => "You're doing fantastic! Your English is really flowing well. What's something you're excited about these days?",
        5..=6 => "Great progress! I can see you're getting more comfortable with English. What would you like to practice talking about?",
        _ => "You're doing great, keep going! Every conversation helps you improve. What's something that makes you happy?",
    }
}
