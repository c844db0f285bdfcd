//! Entity mention record emitted by the NER backend.

use serde::{Deserialize, Serialize};

/// One scored entity mention found in a message's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    /// The entity name exactly as it appears in the text.
    pub text: String,

    /// Raw model category label (e.g. `"PER"`, `"LOC"`), already stripped
    /// of any `B-`/`I-` prefix.
    pub category_label: String,

    /// Model confidence in `[0, 1]`.
    pub score: f64,
}

impl EntityMention {
    /// Build a mention, clamping the score into `[0, 1]`.
    pub fn new(text: impl Into<String>, category_label: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            category_label: category_label.into(),
            score: score.clamp(0.0, 1.0),
        }
    }
}
