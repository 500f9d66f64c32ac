//! Intents and the built-in rule classifier
//!
//! Intents normally come from the external conversation engine. The rule
//! classifier covers the phrasings the personas prompt for, so the daemon can
//! also be driven with raw utterances.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::session::{FieldValue, OrderField, Persona, TutorMode};

/// What the user meant by an utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Change the tutor mode
    SwitchMode { mode: TutorMode },
    /// Change the tutor topic; `topic` is a spoken phrase, resolved against the content
    SwitchTopic { topic: String },
    /// Write a named field directly
    SetField { field: String, value: FieldValue },
    /// Ask the barista to revisit a field; the next answer fills it
    FocusField { field: String },
    /// Anything else: an answer to whatever was last asked
    Answer { text: String },
}

impl Intent {
    pub fn answer(text: impl Into<String>) -> Self {
        Intent::Answer { text: text.into() }
    }

    fn set(field: OrderField, value: impl Into<FieldValue>) -> Self {
        Intent::SetField {
            field: field.as_str().to_string(),
            value: value.into(),
        }
    }
}

/// Turns an utterance into an intent
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, persona: Persona, utterance: &str) -> SessionResult<Intent>;
}

static MODE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{MODE_NAME}\b")).expect("valid regex"));

static FROM_MODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bfrom\s+(?:the\s+)?{MODE_NAME}\b")).expect("valid regex")
});

/// Optional lead-in before a switch request ("ok, let's", "can we")
const LEAD_IN: &str = r"^\s*(?:(?:ok(?:ay)?|so|now|hey|please),?\s+)?(?:(?:let'?s|can\s+we|could\s+we|can\s+you|i\s+want\s+to|i'?d\s+like\s+to)\s+)?";

const MODE_NAME: &str = r"(?:learn(?:ing)?|quiz|teach[\s_-]?back)";

static SWITCH_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){LEAD_IN}(?:(?:switch|change|go|move)\s+(?:back\s+)?(?:from\s+(?:the\s+)?{MODE_NAME}(?:\s+mode)?\s+)?to\b|quiz\s+me\b|(?:the\s+)?{MODE_NAME}\s+mode\b)"
    ))
    .expect("valid regex")
});

static TOPIC_SWITCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){LEAD_IN}(?:learn\s+about|teach\s+me\s+about|talk\s+about|study|(?:switch|change)\s+(?:the\s+)?topic\s+to|(?:switch|change|go|move)\s+(?:on\s+)?to|(?:the\s+)?topic\s*(?:is|:))\s+(?:the\s+)?(.+?)[.!?]*\s*$"
    ))
    .expect("valid regex")
});

static FOCUS_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:actually,?\s+)?(?:change|fix|update|correct)\s+(?:the\s+|my\s+)?(drink|size|milk|extras?|name)\b",
    )
    .expect("valid regex")
});

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:my\s+name\s+is|name\s+is|name's|it'?s\s+for|this\s+is\s+for|for)\s+|name\s*:\s*)([a-z][a-z' -]*?)[.!]*\s*$",
    )
    .expect("valid regex")
});

static DRINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:i'?d\s+like|i\s+would\s+like|i\s+want|i'?ll\s+have|can\s+i\s+(?:get|have)|could\s+i\s+(?:get|have)|give\s+me|let\s+me\s+get)\s+(?:an?\s+)?(.+?)[.!?]*(?:\s+please)?\s*$",
    )
    .expect("valid regex")
});

static SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:an?\s+)?(small|medium|large|regular|tall|grande|venti)(?:\s+(?:size|one|please))*[.!]*\s*$")
        .expect("valid regex")
});

static MILK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:with\s+)?([a-z]+(?:\s+[a-z]+)?)\s+milk(?:\s+please)?[.!]*\s*$")
        .expect("valid regex")
});

static EXTRAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(no\s+extras?|no\s+extras?,?\s+thanks)|(?:add|extras?\s*:)\s+(.+?))[.!]*\s*$")
        .expect("valid regex")
});

/// Keyword and pattern classifier for both personas.
///
/// Switch intents are checked before answers, so an utterance that reads as
/// both is treated as a switch. Switch phrasing only counts at the start of an
/// utterance; the same words inside an explanation are part of the answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_tutor(&self, utterance: &str) -> SessionResult<Intent> {
        if SWITCH_WORDS.is_match(utterance) {
            let without_origin = FROM_MODE.replace_all(utterance, "");
            let targets: BTreeSet<TutorMode> = MODE_MENTION
                .find_iter(&without_origin)
                .filter_map(|m| m.as_str().parse().ok())
                .collect();

            match targets.len() {
                0 => {}
                1 => {
                    let mode = targets.into_iter().next().unwrap_or_default();
                    return Ok(Intent::SwitchMode { mode });
                }
                _ => {
                    return Err(SessionError::AmbiguousIntent {
                        candidates: targets.iter().map(|m| m.to_string()).collect(),
                    })
                }
            }
        }

        if let Some(caps) = TOPIC_SWITCH.captures(utterance) {
            let topic = caps[1].trim().to_string();
            if !topic.is_empty() {
                return Ok(Intent::SwitchTopic { topic });
            }
        }

        Ok(Intent::answer(utterance.trim()))
    }

    fn classify_barista(&self, utterance: &str) -> Intent {
        if let Some(caps) = FOCUS_FIELD.captures(utterance) {
            let field = match caps[1].to_lowercase().as_str() {
                "drink" => OrderField::DrinkType,
                "size" => OrderField::Size,
                "milk" => OrderField::Milk,
                "name" => OrderField::Name,
                _ => OrderField::Extras,
            };
            return Intent::FocusField {
                field: field.as_str().to_string(),
            };
        }

        if let Some(caps) = NAME.captures(utterance) {
            return Intent::set(OrderField::Name, caps[1].trim());
        }

        if let Some(caps) = DRINK.captures(utterance) {
            return Intent::set(OrderField::DrinkType, caps[1].trim().to_lowercase());
        }

        if let Some(caps) = SIZE.captures(utterance) {
            return Intent::set(OrderField::Size, caps[1].to_lowercase());
        }

        if let Some(caps) = MILK.captures(utterance) {
            return Intent::set(OrderField::Milk, normalize_milk(&caps[1]));
        }

        if let Some(caps) = EXTRAS.captures(utterance) {
            return match caps.get(2) {
                Some(extras) => Intent::set(OrderField::Extras, extras.as_str()),
                None => Intent::set(OrderField::Extras, FieldValue::List(Vec::new())),
            };
        }

        Intent::answer(utterance.trim())
    }
}

impl IntentClassifier for RuleClassifier {
    fn classify(&self, persona: Persona, utterance: &str) -> SessionResult<Intent> {
        match persona {
            Persona::Barista => Ok(self.classify_barista(utterance)),
            Persona::Tutor => self.classify_tutor(utterance),
        }
    }
}

/// "Oat", "oat milk" and "no milk" all name the milk choice
pub fn normalize_milk(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let lowered = lowered.strip_suffix(" milk").unwrap_or(&lowered).trim();
    match lowered {
        "no" | "without" => "none".to_string(),
        other => other.to_string(),
    }
}
