//! Builds the multi-part generation request from answers and collected images.
//!
//! Assembly is pure: the same inputs always produce the same parts, and no
//! I/O happens here.

use std::sync::LazyLock;

use regex::Regex;

use crate::answers::{GenerationAnswers, TextPolicy};
use crate::provider::{AssembledRequest, RequestPart};
use crate::references::ReferenceImage;
use crate::types::ImagePayload;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;
pub const THUMBNAIL_ASPECT_RATIO: &str = "16:9";

/// Maximum number of words in an auto-derived label.
pub const MAX_LABEL_WORDS: usize = 3;

/// Maximum length of an auto-derived label in characters.
pub const MAX_LABEL_LENGTH: usize = 30;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'+#-]*").expect("valid regex"));

/// Words that never make a good thumbnail label on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "by", "can", "do", "for", "from", "how", "i", "in", "is", "it",
    "my", "of", "on", "or", "the", "this", "that", "to", "what", "why", "with", "you", "your",
];

// ---------------------------------------------------------------------------
// Label derivation
// ---------------------------------------------------------------------------

/// Derive a short uppercase label from a topic.
///
/// Stopwords are skipped; if nothing is left the leading words of the topic
/// are used as-is. Empty when the topic has no letters or digits.
pub fn derive_label(topic: &str) -> String {
    let words: Vec<&str> = WORD_RE.find_iter(topic).map(|m| m.as_str()).collect();
    let significant: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    let chosen = if significant.is_empty() { &words } else { &significant };

    let mut label = String::new();
    for word in chosen.iter().take(MAX_LABEL_WORDS) {
        let candidate_len = label.chars().count() + word.chars().count() + usize::from(!label.is_empty());
        if !label.is_empty() && candidate_len > MAX_LABEL_LENGTH {
            break;
        }
        if !label.is_empty() {
            label.push(' ');
        }
        label.push_str(word);
    }
    let label = label.to_uppercase();
    label.chars().take(MAX_LABEL_LENGTH).collect()
}

/// The sentence describing what text may appear on the thumbnail.
pub fn text_directive(policy: &TextPolicy, topic: &str) -> String {
    match policy {
        TextPolicy::Literal(text) => format!(
            "Render exactly this text on the thumbnail, spelled exactly as given, in large bold \
             legible letters: \"{}\". Do not add any other text.",
            text.trim()
        ),
        TextPolicy::Auto => {
            let label = derive_label(topic);
            if label.is_empty() {
                return text_directive(&TextPolicy::NoText, topic);
            }
            format!(
                "Render this short label on the thumbnail in large bold legible letters: \"{label}\". \
                 Do not add any other text."
            )
        }
        TextPolicy::NoText => "Do not render any text, letters, numbers, captions, logos or \
                               watermarks anywhere in the image."
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn system_directive(answers: &GenerationAnswers) -> String {
    format!(
        "You are an expert YouTube thumbnail designer. Create one eye-catching thumbnail image.\n\
         Target emotion: {emotion}. A viewer should feel {emotion} at first glance.\n\
         Target audience: {audience}.\n\
         Visual style: {style}.\n\
         {text}",
        emotion = answers.emotion(),
        audience = answers.audience(),
        style = answers.style(),
        text = text_directive(&answers.text, &answers.topic),
    )
}

fn topic_block(answers: &GenerationAnswers) -> String {
    let mut block = format!("Video topic: {}", answers.topic.trim());

    let elements: Vec<&str> = answers.present_key_elements().collect();
    if !elements.is_empty() {
        block.push_str(&format!("\nKey elements to include: {}", elements.join(", ")));
    }

    let extra: Vec<String> = answers
        .extra
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("- {key}: {}", value.trim()))
        .collect();
    if !extra.is_empty() {
        block.push_str("\nAdditional context:\n");
        block.push_str(&extra.join("\n"));
    }

    block.push_str(&format!(
        "\nComposition requirements:\n\
         - Aspect ratio {THUMBNAIL_ASPECT_RATIO}, exactly {THUMBNAIL_WIDTH}x{THUMBNAIL_HEIGHT} pixels.\n\
         - High contrast and saturated colors that stand out in a crowded feed.\n\
         - One clear focal point that stays readable at small sizes."
    ));
    block
}

fn reference_context(position: usize, reference: &ReferenceImage) -> String {
    format!(
        "Reference thumbnail {position}: \"{}\". Use it only as inspiration for composition \
         and color; do not copy it.",
        reference.title.trim()
    )
}

const IDENTITY_DIRECTIVE: &str = "The image above is the creator's own photo. Feature the person \
     shown prominently and preserve their face and identity exactly; do not alter their facial \
     features.";

fn closing_directive() -> String {
    format!(
        "Final requirement: output a single {THUMBNAIL_ASPECT_RATIO} image of exactly \
         {THUMBNAIL_WIDTH}x{THUMBNAIL_HEIGHT} pixels."
    )
}

/// Assemble the ordered request parts.
///
/// Order: system directive, topic and constraints, each reference followed by
/// its context line, the user image with the identity directive, and a closing
/// dimension directive.
pub fn assemble(
    answers: &GenerationAnswers,
    references: &[ReferenceImage],
    user_image: Option<&ImagePayload>,
) -> AssembledRequest {
    let mut parts = Vec::with_capacity(3 + references.len() * 2 + 2);
    parts.push(RequestPart::Text(system_directive(answers)));
    parts.push(RequestPart::Text(topic_block(answers)));

    for (i, reference) in references.iter().enumerate() {
        parts.push(RequestPart::InlineImage(reference.image.clone()));
        parts.push(RequestPart::Text(reference_context(i + 1, reference)));
    }

    if let Some(image) = user_image {
        parts.push(RequestPart::InlineImage(image.clone()));
        parts.push(RequestPart::Text(IDENTITY_DIRECTIVE.to_string()));
    }

    parts.push(RequestPart::Text(closing_directive()));

    AssembledRequest {
        parts,
        aspect_ratio: THUMBNAIL_ASPECT_RATIO,
        width: THUMBNAIL_WIDTH,
        height: THUMBNAIL_HEIGHT,
    }
}
