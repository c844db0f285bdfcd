//! Built-in heuristic NER backend.
//!
//! A regex + gazetteer baseline over capitalized spans. It exists so the
//! binary works end-to-end without an external model; accuracy is whatever a
//! capitalization heuristic buys. Real models plug in via
//! [`crate::ner::NerBackend`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::model::entity::EntityMention;
use crate::ner::NerBackend;

/// Capitalized span: one or more capitalized words, apostrophes and hyphens
/// allowed inside a word.
static RE_CAP_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Lu}[\p{L}'’-]*(?:[ \t]\p{Lu}[\p{L}'’-]*)*").expect("valid span regex")
});

/// Capitalized function words that start sentences but are never entities.
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "A", "An", "The", "This", "That", "These", "Those", "I", "It", "He", "She", "We", "You",
        "They", "My", "Our", "Your", "His", "Her", "Its", "Their", "If", "In", "On", "At", "As",
        "And", "Or", "But", "So", "To", "Of", "For", "From", "With", "When", "Where", "What",
        "Who", "How", "Why", "Is", "Are", "Was", "Were", "Be", "Been", "Do", "Does", "Did",
        "Not", "No", "Yes", "Dear", "Hi", "Hello", "Thanks", "Thank", "Regards", "Best",
        "Sincerely", "Cheers", "Please", "Re", "Fwd",
    ]
    .into_iter()
    .collect()
});

/// Honorifics preceding person names.
const PERSON_TITLES: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "Prof", "Sir", "Madam"];

/// Organization-indicating words inside a span.
const ORG_WORDS: &[&str] = &[
    "Inc", "Ltd", "LLC", "Corp", "Corporation", "Company", "University", "Institute",
    "Association", "Museum", "Library", "Archive", "Archives", "Foundation", "Society",
    "Department", "Committee", "Council",
];

/// Prepositions that mark the following span as a place.
const PLACE_PREPOSITIONS: &[&str] = &["in", "at", "near", "from", "to", "via"];

/// Heuristic pattern-based NER backend.
#[derive(Debug, Default)]
pub struct PatternNer;

impl PatternNer {
    pub fn new() -> Self {
        Self
    }

    /// Classify one capitalized span given the lowercased word before it.
    fn classify(span: &str, preceding_word: Option<&str>) -> (&'static str, f64) {
        let words: Vec<&str> = span.split_whitespace().collect();

        if words
            .iter()
            .any(|w| ORG_WORDS.contains(&w.trim_end_matches('.')))
        {
            return ("ORG", 0.9);
        }
        if let Some(first) = words.first() {
            if PERSON_TITLES.contains(&first.trim_end_matches('.')) {
                return ("PER", 0.9);
            }
        }
        if let Some(prev) = preceding_word {
            if PLACE_PREPOSITIONS.contains(&prev) {
                return ("LOC", 0.85);
            }
        }
        if words.len() >= 2 {
            // Multiword capitalized spans with no other signal read as names
            return ("PER", 0.7);
        }
        ("MISC", 0.55)
    }
}

impl NerBackend for PatternNer {
    fn model_id(&self) -> &str {
        "builtin:pattern"
    }

    fn label_vocabulary(&self) -> Vec<String> {
        [
            "O", "B-PER", "I-PER", "B-LOC", "I-LOC", "B-ORG", "I-ORG", "B-MISC", "I-MISC",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn infer(&self, text: &str) -> Result<Vec<EntityMention>> {
        let mut mentions = Vec::new();

        for m in RE_CAP_SPAN.find_iter(text) {
            // Trim leading stopwords off the span ("The British Museum")
            let mut words: Vec<&str> = m.as_str().split_whitespace().collect();
            while let Some(first) = words.first() {
                if STOPWORDS.contains(first) {
                    words.remove(0);
                } else {
                    break;
                }
            }
            if words.is_empty() {
                continue;
            }
            let span = words.join(" ");

            let preceding = text[..m.start()]
                .split_whitespace()
                .next_back()
                .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase());

            let (label, score) = Self::classify(&span, preceding.as_deref());
            mentions.push(EntityMention::new(span, label, score));
        }

        Ok(mentions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_for(text: &str) -> Vec<(String, String)> {
        PatternNer::new()
            .infer(text)
            .unwrap()
            .into_iter()
            .map(|m| (m.text, m.category_label))
            .collect()
    }

    #[test]
    fn test_place_after_preposition() {
        let found = labels_for("We met in Paris last June.");
        assert!(found.contains(&("Paris".to_string(), "LOC".to_string())));
    }

    #[test]
    fn test_person_with_title() {
        let found = labels_for("Please forward this to Dr. Ada Lovelace soon.");
        assert!(found
            .iter()
            .any(|(text, label)| text.contains("Ada Lovelace") && label == "PER"));
    }

    #[test]
    fn test_organization_suffix() {
        let found = labels_for("Contact Stanford University about the archive.");
        assert!(found
            .iter()
            .any(|(text, label)| text.contains("University") && label == "ORG"));
    }

    #[test]
    fn test_sentence_start_stopword_is_dropped() {
        let found = labels_for("The meeting went well.");
        assert!(!found.iter().any(|(text, _)| text == "The"));
    }

    #[test]
    fn test_scores_within_unit_interval() {
        for m in PatternNer::new()
            .infer("Mr Smith visited the Louvre Museum in Paris with Jane Doe.")
            .unwrap()
        {
            assert!((0.0..=1.0).contains(&m.score), "score {} out of range", m.score);
        }
    }

    #[test]
    fn test_vocabulary_reduces_to_four_categories() {
        let universe = crate::ner::category_universe(PatternNer::new().label_vocabulary());
        assert_eq!(universe.len(), 4);
        assert!(universe.contains("PER"));
        assert!(universe.contains("MISC"));
    }
}
