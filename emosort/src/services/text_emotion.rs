//! Text-derived emotion labels
//!
//! Clip names come from captions, so the Chinese part of a clip's file stem
//! is the spoken line. That text is classified by a [`TextClassifier`] and
//! the raw label is folded onto the audio model's vocabulary.

use crate::models::top_label;
use crate::services::emotion_client::{ServiceError, TextClassifier};

/// Raw text-classifier label → audio emotion vocabulary
const LABEL_MAPPING: &[(&str, &str)] = &[
    ("恐惧", "恐惧"),
    ("愤怒", "生气"),
    ("厌恶", "厌恶"),
    ("喜好", "开心"),
    ("悲伤", "难过"),
    ("高兴", "开心"),
    ("惊讶", "吃惊"),
];

/// CJK Unified Ideographs block
pub fn is_chinese_char(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

pub fn contains_chinese(text: &str) -> bool {
    text.chars().any(is_chinese_char)
}

/// Keep only the Chinese characters of `text`
pub fn chinese_text(text: &str) -> String {
    text.chars().filter(|c| is_chinese_char(*c)).collect()
}

/// Fold a raw classifier label; unknown labels pass through
pub fn map_text_label(raw: &str) -> &str {
    LABEL_MAPPING
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}

/// Text emotion for one clip stem
///
/// Stems without Chinese characters yield an empty label and never reach
/// the classifier.
pub async fn text_emotion_for_stem(
    classifier: &dyn TextClassifier,
    stem: &str,
) -> Result<String, ServiceError> {
    if !contains_chinese(stem) {
        return Ok(String::new());
    }

    let text = chinese_text(stem);
    let ranked = classifier.classify(&text).await?;
    let top = top_label(&ranked).ok_or(ServiceError::EmptyResult)?;

    Ok(map_text_label(&top.label).to_string())
}
