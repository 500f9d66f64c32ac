//! Barista order record

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// A field of the order record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderField {
    #[serde(rename = "drinkType")]
    DrinkType,
    #[serde(rename = "size")]
    Size,
    #[serde(rename = "milk")]
    Milk,
    #[serde(rename = "extras")]
    Extras,
    #[serde(rename = "name")]
    Name,
}

impl OrderField {
    /// Prompt order used when asking for the next field
    pub const ALL: [OrderField; 5] = [
        OrderField::DrinkType,
        OrderField::Size,
        OrderField::Milk,
        OrderField::Extras,
        OrderField::Name,
    ];

    /// Fields that must be non-empty for the order to be complete.
    /// `extras` may legitimately stay empty.
    pub const REQUIRED: [OrderField; 4] = [
        OrderField::DrinkType,
        OrderField::Size,
        OrderField::Milk,
        OrderField::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::DrinkType => "drinkType",
            OrderField::Size => "size",
            OrderField::Milk => "milk",
            OrderField::Extras => "extras",
            OrderField::Name => "name",
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderField {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| SessionError::InvalidField { field: s.to_string() })
    }
}

/// Value written into a session field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// In-progress drink order.
///
/// Serializes to the exchanged order shape:
/// `{"drinkType", "size", "milk", "extras", "name"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub drink_type: String,
    pub size: String,
    pub milk: String,
    pub extras: Vec<String>,
    pub name: String,
    /// Set once the customer has answered the extras question, even with "none"
    #[serde(skip)]
    extras_answered: bool,
}

impl OrderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field. Later writes overwrite earlier ones.
    ///
    /// The value is validated before anything is touched, so a failed call
    /// leaves the record unchanged.
    pub fn set(&mut self, field: OrderField, value: FieldValue) -> SessionResult<()> {
        match field {
            OrderField::Extras => {
                let extras = match value {
                    FieldValue::Text(text) => parse_extras(&text),
                    FieldValue::List(items) => items
                        .into_iter()
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect(),
                };
                self.extras = extras;
                self.extras_answered = true;
            }
            OrderField::DrinkType => self.drink_type = text_value(field, value)?,
            OrderField::Size => self.size = text_value(field, value)?,
            OrderField::Milk => self.milk = text_value(field, value)?,
            OrderField::Name => self.name = text_value(field, value)?,
        }
        Ok(())
    }

    /// Whether a field has been given by the customer
    pub fn is_filled(&self, field: OrderField) -> bool {
        match field {
            OrderField::DrinkType => !self.drink_type.is_empty(),
            OrderField::Size => !self.size.is_empty(),
            OrderField::Milk => !self.milk.is_empty(),
            OrderField::Extras => self.extras_answered || !self.extras.is_empty(),
            OrderField::Name => !self.name.is_empty(),
        }
    }

    /// Current value of a field
    pub fn value(&self, field: OrderField) -> FieldValue {
        match field {
            OrderField::DrinkType => FieldValue::Text(self.drink_type.clone()),
            OrderField::Size => FieldValue::Text(self.size.clone()),
            OrderField::Milk => FieldValue::Text(self.milk.clone()),
            OrderField::Extras => FieldValue::List(self.extras.clone()),
            OrderField::Name => FieldValue::Text(self.name.clone()),
        }
    }

    /// True iff every required field is non-empty
    pub fn is_complete(&self) -> bool {
        OrderField::REQUIRED
            .iter()
            .all(|field| self.is_filled(*field))
    }

    /// The next field to ask for, in prompt order
    pub fn next_missing(&self) -> Option<OrderField> {
        OrderField::ALL
            .into_iter()
            .find(|field| !self.is_filled(*field))
    }

    /// One-line description used in the confirmation utterance
    pub fn describe(&self) -> String {
        let mut out = format!("a {} {} with {} milk", self.size, self.drink_type, self.milk);
        if !self.extras.is_empty() {
            out.push_str(&format!(", plus {}", self.extras.join(" and ")));
        }
        out.push_str(&format!(", for {}", self.name));
        out
    }
}

fn text_value(field: OrderField, value: FieldValue) -> SessionResult<String> {
    let text = match value {
        FieldValue::Text(text) => text.trim().to_string(),
        FieldValue::List(_) => {
            return Err(SessionError::InvalidValue {
                field: field.to_string(),
                reason: "expected text, got a list".into(),
            })
        }
    };
    if text.is_empty() {
        return Err(SessionError::InvalidValue {
            field: field.to_string(),
            reason: "value is empty".into(),
        });
    }
    Ok(text)
}

/// Turn a spoken extras answer into a list.
///
/// "no extras", "none" and similar yield an empty list; otherwise the answer
/// is split on commas and "and".
pub fn parse_extras(text: &str) -> Vec<String> {
    let lowered = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    const NONE_ANSWERS: [&str; 7] = [
        "no extras",
        "no extra",
        "none",
        "nothing",
        "no",
        "no thanks",
        "nothing else",
    ];
    if lowered.is_empty() || NONE_ANSWERS.contains(&lowered.as_str()) {
        return Vec::new();
    }

    lowered
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(|part| {
            let part = part.trim();
            let part = part.strip_prefix("with ").unwrap_or(part);
            part.trim().to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}
