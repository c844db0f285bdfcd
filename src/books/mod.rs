//! Persisted entity books.

pub mod store;

use std::collections::{BTreeMap, BTreeSet};

use crate::model::entity::EntityMention;

/// Reduce filtered per-message mentions to the unique `(name, label)` pairs
/// that get merged into the entity books.
pub fn unique_entities(
    entities: &BTreeMap<String, Vec<EntityMention>>,
) -> BTreeSet<(String, String)> {
    entities
        .values()
        .flatten()
        .map(|m| (m.text.clone(), m.category_label.clone()))
        .collect()
}
