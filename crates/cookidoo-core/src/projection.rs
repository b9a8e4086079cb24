//! Read-only views over a coordinator payload
//!
//! Backends disagree on field names, so every lookup here falls back across
//! a few candidates and treats anything unexpected as "unknown" rather than
//! an error.

use crate::traits::Payload;
use serde::Serialize;
use serde_json::{Map, Value, json};

const NAME_KEYS: [&str; 2] = ["title", "name"];

/// Headline of today's payload
///
/// First non-blank string among `title`, `name`, then `recipe.title`,
/// `recipe.name`, trimmed. `None` means unknown.
pub fn today_title(payload: &Payload) -> Option<String> {
    first_name(payload).or_else(|| {
        payload
            .get("recipe")
            .and_then(Value::as_object)
            .and_then(first_name)
    })
}

/// Attribute block exposing the whole payload
pub fn today_attributes(payload: &Payload) -> Value {
    json!({ "raw": payload })
}

/// Sub-object `name` of a multi-endpoint payload, or the payload itself
///
/// A single-endpoint payload has no `today`/`week` keys, so it is returned
/// as-is.
pub fn section<'a>(payload: &'a Payload, name: &str) -> &'a Payload {
    payload
        .get(name)
        .and_then(Value::as_object)
        .unwrap_or(payload)
}

/// Today's plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodayView {
    pub title: Option<String>,
    pub date: Option<String>,
    pub recipes: Vec<String>,
}

impl TodayView {
    pub fn from_payload(payload: &Payload) -> Self {
        Self {
            title: today_title(payload),
            date: string_field(payload, "date"),
            recipes: recipe_names(payload),
        }
    }
}

/// One day of the week plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayView {
    pub date: Option<String>,
    pub recipes: Vec<String>,
}

/// The week plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeekView {
    pub days: Vec<DayView>,
}

impl WeekView {
    pub fn from_payload(payload: &Payload) -> Self {
        let days = payload
            .get("days")
            .and_then(Value::as_array)
            .map(|days| {
                days.iter()
                    .filter_map(Value::as_object)
                    .map(|day| DayView {
                        date: string_field(day, "date"),
                        recipes: recipe_names(day),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { days }
    }

    /// Total number of recipes across all days
    pub fn recipe_count(&self) -> usize {
        self.days.iter().map(|day| day.recipes.len()).sum()
    }
}

fn first_name(object: &Map<String, Value>) -> Option<String> {
    NAME_KEYS
        .iter()
        .find_map(|key| string_field(object, key))
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Entries may be plain strings or objects carrying a title/name
fn recipe_names(object: &Map<String, Value>) -> Vec<String> {
    object
        .get("recipes")
        .and_then(Value::as_array)
        .map(|recipes| {
            recipes
                .iter()
                .filter_map(|recipe| match recipe {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Object(obj) => first_name(obj),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
