//! Script templates handed to the speech collaborator

use serde::{Deserialize, Serialize};

use crate::session::{OrderField, OrderRecord, Persona};

/// Words too common to count toward teach-back coverage
const STOP_WORDS: &[&str] = &[
    "about", "also", "been", "being", "does", "each", "from", "have", "into", "just", "like",
    "more", "once", "only", "over", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "under", "until", "very", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your",
];

/// How many missing key words a feedback turn mentions
const MAX_MISSING: usize = 3;

/// The script the persona speaks next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum ScriptTemplate {
    Greeting { persona: Persona },
    AskField { field: OrderField },
    ConfirmOrder { order: OrderRecord },
    LearnSummary { title: String, summary: String },
    QuizQuestion { title: String, question: String },
    TeachBackPrompt { title: String },
    TeachBackFeedback {
        title: String,
        /// Percentage of the summary's key words the learner used
        coverage: u8,
        missing: Vec<String>,
    },
    ChooseTopic { titles: Vec<String> },
    Reprompt { reason: String },
}

impl ScriptTemplate {
    /// Render the utterance text
    pub fn render(&self) -> String {
        match self {
            ScriptTemplate::Greeting { persona: Persona::Barista } => {
                "Hi, welcome in! What can I get started for you today?".to_string()
            }
            ScriptTemplate::Greeting { persona: Persona::Tutor } => {
                "Hi! I'm your study coach. Pick a topic and we can learn it, quiz on it, or you can teach it back to me.".to_string()
            }
            ScriptTemplate::AskField { field } => match field {
                OrderField::DrinkType => "What would you like to drink?".to_string(),
                OrderField::Size => "What size would you like: small, medium, or large?".to_string(),
                OrderField::Milk => "What kind of milk would you like?".to_string(),
                OrderField::Extras => "Any extras, like syrup or an extra shot?".to_string(),
                OrderField::Name => "Can I get a name for the order?".to_string(),
            },
            ScriptTemplate::ConfirmOrder { order } => {
                format!("Perfect, that's {}. It'll be ready shortly!", order.describe())
            }
            ScriptTemplate::LearnSummary { title, summary } => {
                format!("Let's learn about {title}. {summary}")
            }
            ScriptTemplate::QuizQuestion { title, question } => {
                format!("Quiz time on {title}. {question}")
            }
            ScriptTemplate::TeachBackPrompt { title } => {
                format!("Your turn to teach. Explain {title} to me in your own words.")
            }
            ScriptTemplate::TeachBackFeedback {
                title,
                coverage,
                missing,
            } => {
                let opener = match *coverage {
                    c if c >= 80 => "Great explanation",
                    c if c >= 50 => "Good start",
                    _ => "Nice try",
                };
                if missing.is_empty() {
                    format!("{opener}! You covered the key ideas of {title}.")
                } else {
                    format!(
                        "{opener}! You covered about {coverage} percent of {title}. Try to mention {}.",
                        missing.join(", ")
                    )
                }
            }
            ScriptTemplate::ChooseTopic { titles } => {
                format!("Which topic would you like? I can cover {}.", titles.join(", "))
            }
            ScriptTemplate::Reprompt { reason } => {
                format!("Sorry, I didn't quite get that ({reason}). Could you say it another way?")
            }
        }
    }
}

/// Key words of a summary, in order of first appearance
fn key_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 4 && !STOP_WORDS.contains(&w.as_str()))
    {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

/// Loose stem so "loops" matches "looping" and "repeat" matches "repeats"
fn stem(word: &str) -> String {
    word.chars().take(4).collect()
}

/// Compare a teach-back explanation to the topic summary.
///
/// Returns the coverage percentage and up to three key words that were not
/// mentioned.
pub fn assess_explanation(summary: &str, explanation: &str) -> (u8, Vec<String>) {
    let expected = key_words(summary);
    if expected.is_empty() {
        return (100, Vec::new());
    }

    let said: Vec<String> = explanation
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| stem(&w.to_lowercase()))
        .collect();

    let (hit, missed): (Vec<_>, Vec<_>) = expected
        .into_iter()
        .partition(|word| said.contains(&stem(word)));

    let total = hit.len() + missed.len();
    let coverage = (hit.len() * 100 / total) as u8;
    (coverage, missed.into_iter().take(MAX_MISSING).collect())
}
