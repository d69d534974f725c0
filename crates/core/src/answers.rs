//! The creator's answers to the thumbnail questionnaire.
//!
//! A closed set of known fields plus an `extra` map for questions added later,
//! kept in a `BTreeMap` so prompt assembly stays deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum topic length in characters.
pub const MAX_TOPIC_LENGTH: usize = 500;

/// Maximum length for audience, emotion, style, and each key element.
pub const MAX_FIELD_LENGTH: usize = 200;

/// Maximum number of key elements.
pub const MAX_KEY_ELEMENTS: usize = 10;

/// Maximum length of literal thumbnail text.
pub const MAX_LITERAL_TEXT_LENGTH: usize = 60;

/// Maximum number of free-form extra answers.
pub const MAX_EXTRA_ANSWERS: usize = 20;

pub const DEFAULT_AUDIENCE: &str = "general YouTube viewers";
pub const DEFAULT_EMOTION: &str = "excited";
pub const DEFAULT_STYLE: &str = "bold and vibrant";

/// Styles cycled through when producing variations.
pub const STYLE_ROTATION: &[&str] = &[
    "bold and vibrant",
    "clean and minimal",
    "cinematic and dramatic",
    "playful illustrated",
];

/// Emotions cycled through when producing variations.
pub const EMOTION_ROTATION: &[&str] = &["excited", "curious", "shocked", "inspired"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What text, if any, should be rendered on the thumbnail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TextPolicy {
    /// Render exactly this string.
    Literal(String),
    /// Derive a short label from the topic.
    #[default]
    Auto,
    /// Render no text at all.
    #[serde(rename = "none")]
    NoText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationAnswers {
    pub topic: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub key_elements: Vec<String>,
    #[serde(default)]
    pub text: TextPolicy,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl GenerationAnswers {
    /// Answers carrying only a topic; everything else uses defaults.
    pub fn from_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            audience: None,
            emotion: None,
            style: None,
            key_elements: Vec::new(),
            text: TextPolicy::Auto,
            extra: BTreeMap::new(),
        }
    }

    pub fn audience(&self) -> &str {
        non_blank(&self.audience).unwrap_or(DEFAULT_AUDIENCE)
    }

    pub fn emotion(&self) -> &str {
        non_blank(&self.emotion).unwrap_or(DEFAULT_EMOTION)
    }

    pub fn style(&self) -> &str {
        non_blank(&self.style).unwrap_or(DEFAULT_STYLE)
    }

    /// Key elements with blanks removed.
    pub fn present_key_elements(&self) -> impl Iterator<Item = &str> {
        self.key_elements
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }

    /// Check required fields and length limits.
    pub fn validate(&self) -> Result<(), CoreError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(CoreError::Validation("topic is required".to_string()));
        }
        if topic.chars().count() > MAX_TOPIC_LENGTH {
            return Err(CoreError::Validation(format!(
                "topic exceeds maximum length of {MAX_TOPIC_LENGTH} characters"
            )));
        }

        for (name, value) in [
            ("audience", &self.audience),
            ("emotion", &self.emotion),
            ("style", &self.style),
        ] {
            if let Some(value) = value {
                validate_field_length(name, value)?;
            }
        }

        if self.key_elements.len() > MAX_KEY_ELEMENTS {
            return Err(CoreError::Validation(format!(
                "at most {MAX_KEY_ELEMENTS} key elements are allowed (got {})",
                self.key_elements.len()
            )));
        }
        for element in &self.key_elements {
            validate_field_length("key element", element)?;
        }

        if let TextPolicy::Literal(text) = &self.text {
            let text = text.trim();
            if text.is_empty() {
                return Err(CoreError::Validation(
                    "literal thumbnail text must not be empty".to_string(),
                ));
            }
            if text.chars().count() > MAX_LITERAL_TEXT_LENGTH {
                return Err(CoreError::Validation(format!(
                    "thumbnail text exceeds maximum length of {MAX_LITERAL_TEXT_LENGTH} characters"
                )));
            }
        }

        if self.extra.len() > MAX_EXTRA_ANSWERS {
            return Err(CoreError::Validation(format!(
                "at most {MAX_EXTRA_ANSWERS} additional answers are allowed"
            )));
        }
        for (key, value) in &self.extra {
            validate_field_length(key, value)?;
        }
        Ok(())
    }

    /// Deterministically perturb the answers for variation `index`.
    ///
    /// Index 0 is unchanged, odd indices rotate the style, even indices rotate
    /// the emotion, so neighbouring variations never share both.
    pub fn variation(&self, index: usize) -> Self {
        let mut varied = self.clone();
        if index == 0 {
            return varied;
        }
        if index % 2 == 1 {
            let steps = index.div_ceil(2);
            varied.style = Some(rotate(STYLE_ROTATION, self.style(), steps).to_string());
        } else {
            let steps = index / 2;
            varied.emotion = Some(rotate(EMOTION_ROTATION, self.emotion(), steps).to_string());
        }
        varied
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_field_length(name: &str, value: &str) -> Result<(), CoreError> {
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(CoreError::Validation(format!(
            "{name} exceeds maximum length of {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Step `steps` places through `options` starting after `current`.
/// A value not in the list starts from the first option.
fn rotate<'a>(options: &[&'a str], current: &str, steps: usize) -> &'a str {
    match options.iter().position(|o| o.eq_ignore_ascii_case(current)) {
        Some(pos) => options[(pos + steps) % options.len()],
        None => options[(steps - 1) % options.len()],
    }
}
