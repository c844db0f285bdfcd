//! Named-entity-recognition backends.
//!
//! The model itself is a black box behind [`NerBackend`]; the rest of the
//! pipeline only sees scored [`EntityMention`] lists and the backend's label
//! vocabulary.

pub mod pattern;
pub mod runner;

use std::collections::BTreeSet;

use crate::error::{NerError, Result};
use crate::model::entity::EntityMention;

/// A named-entity-recognition model.
pub trait NerBackend {
    /// Identifier of the underlying model (hub name, path, or builtin id).
    fn model_id(&self) -> &str;

    /// Raw label vocabulary of the model, `B-`/`I-`-prefixed where the
    /// model uses IOB-style tagging (e.g. `"B-PER"`, `"I-LOC"`, `"O"`).
    fn label_vocabulary(&self) -> Vec<String>;

    /// Run inference over a single text.
    fn infer(&self, text: &str) -> Result<Vec<EntityMention>>;

    /// Run inference over a whole batch of texts, one result list per input,
    /// in input order.
    fn infer_batch(&self, texts: &[&str]) -> Result<Vec<Vec<EntityMention>>> {
        texts.iter().map(|t| self.infer(t)).collect()
    }
}

/// Reduce a raw label vocabulary to the set of category labels.
///
/// Only the suffix after the first `-` matters: `B-PER` and `I-PER` both
/// contribute `PER`; labels without a `-` (like `O`) contribute nothing.
pub fn category_universe<I, S>(vocabulary: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    vocabulary
        .into_iter()
        .filter_map(|label| {
            label
                .as_ref()
                .split_once('-')
                .map(|(_, suffix)| suffix.to_string())
        })
        .collect()
}

/// Construct a backend from its model id string.
///
/// Loading real transformer checkpoints is out of scope; the only shipped
/// backend is the builtin heuristic one.
pub fn backend_for(model_id: &str) -> Result<Box<dyn NerBackend>> {
    match model_id {
        "builtin:pattern" | "pattern" => Ok(Box::new(pattern::PatternNer::new())),
        other => Err(NerError::Config(format!(
            "Unknown NER model '{other}' (supported: builtin:pattern)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_universe_strips_prefixes() {
        let universe = category_universe(["B-PER", "I-PER", "B-LOC", "O"]);
        let expected: BTreeSet<String> = ["PER", "LOC"].iter().map(|s| s.to_string()).collect();
        assert_eq!(universe, expected);
    }

    #[test]
    fn test_only_first_dash_splits() {
        let universe = category_universe(["B-PER-X"]);
        assert!(universe.contains("PER-X"));
    }

    #[test]
    fn test_backend_for_unknown_model_is_config_error() {
        assert!(matches!(
            backend_for("saattrupdan/nbailab-base-ner-scandi"),
            Err(NerError::Config(_))
        ));
    }

    #[test]
    fn test_backend_for_builtin_ids() {
        assert!(backend_for("builtin:pattern").is_ok());
        assert!(backend_for("pattern").is_ok());
    }
}
