//! Category-partitioned entity-book files.
//!
//! On-disk layout: `<root>/<CategoryDirName>/EntityBook`, a UTF-8 text file
//! whose record separator is a line consisting of `--`, with a trailing
//! separator always written. The store is conceptually append-only across
//! runs, but each run rewrites every book wholesale: load, merge in memory,
//! dedup, sort, overwrite. Concurrent runs against the same root are unsafe
//! (last writer wins) and out of scope.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::CategoryMap;
use crate::error::{NerError, Result};

/// File name of the record file inside each category directory.
pub const BOOK_FILE_NAME: &str = "EntityBook";

/// The record delimiter line.
const RECORD_DELIMITER: &str = "--";

/// In-memory entity books for one run, keyed by category directory name.
#[derive(Debug)]
pub struct EntityBooks {
    root: PathBuf,
    books: BTreeMap<String, Vec<String>>,
}

impl EntityBooks {
    /// Load the books for the given category directory names.
    ///
    /// A missing category *directory* is fatal (the run could never be
    /// persisted, so it must fail before inference); a missing record file
    /// inside an existing directory just starts that category empty.
    pub fn load<I, S>(root: impl AsRef<Path>, categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.as_ref().to_path_buf();
        let mut books = BTreeMap::new();

        for category in categories {
            let dir = root.join(category.as_ref());
            if !dir.is_dir() {
                return Err(NerError::MissingCategoryDir(dir));
            }
            let file = dir.join(BOOK_FILE_NAME);
            let names = if file.is_file() {
                let contents =
                    std::fs::read_to_string(&file).map_err(|e| NerError::io(&file, e))?;
                parse_book(&contents)
            } else {
                Vec::new()
            };
            debug!(
                category = category.as_ref(),
                entries = names.len(),
                "Loaded entity book"
            );
            books.insert(category.as_ref().to_string(), names);
        }

        Ok(Self { root, books })
    }

    /// Current (possibly unsorted) names for one category.
    pub fn names(&self, category: &str) -> Option<&[String]> {
        self.books.get(category).map(Vec::as_slice)
    }

    /// Merge newly found `(name, category_label)` pairs into the books,
    /// then dedup and sort every category.
    ///
    /// Returns the per-category count of genuinely new names; the same is
    /// logged at debug level.
    pub fn merge(
        &mut self,
        new_entities: &BTreeSet<(String, String)>,
        category_map: &CategoryMap,
    ) -> BTreeMap<String, usize> {
        // Prior unique counts, captured before any append
        let prior: BTreeMap<String, usize> = self
            .books
            .iter()
            .map(|(cat, names)| (cat.clone(), names.iter().collect::<BTreeSet<_>>().len()))
            .collect();

        for (name, label) in new_entities {
            match category_map.directory(label) {
                Some(category) => match self.books.get_mut(category) {
                    Some(names) => names.push(name.clone()),
                    None => warn!(
                        category,
                        "Category directory was not loaded, dropping entity"
                    ),
                },
                // Unreachable after startup validation, kept as a guard
                None => warn!(
                    label = %label,
                    name = %name,
                    "No category mapping for label, dropping entity"
                ),
            }
        }

        let mut added = BTreeMap::new();
        for (category, names) in &mut self.books {
            let unique: BTreeSet<String> = names.drain(..).collect();
            let count = unique.len() - prior.get(category).copied().unwrap_or(0);
            *names = unique.into_iter().collect();
            debug!(category = %category, new_names = count, "Merged entity book");
            added.insert(category.clone(), count);
        }
        added
    }

    /// Persist every book: sorted unique names, each followed by a delimiter
    /// line. Full-file overwrite.
    pub fn save(&self) -> Result<()> {
        for (category, names) in &self.books {
            let file = self.root.join(category).join(BOOK_FILE_NAME);
            let mut contents = String::new();
            let mut sorted: Vec<&String> = names.iter().collect();
            sorted.sort();
            sorted.dedup();
            for name in sorted {
                contents.push_str(name);
                contents.push('\n');
                contents.push_str(RECORD_DELIMITER);
                contents.push('\n');
            }
            std::fs::write(&file, contents).map_err(|e| NerError::io(&file, e))?;
        }
        Ok(())
    }

    /// Merge then persist in one step.
    pub fn merge_and_save(
        &mut self,
        new_entities: &BTreeSet<(String, String)>,
        category_map: &CategoryMap,
    ) -> Result<BTreeMap<String, usize>> {
        let added = self.merge(new_entities, category_map);
        self.save()?;
        Ok(added)
    }
}

/// Split a book file into trimmed names on `--` delimiter lines, dropping
/// empty and whitespace-only records.
fn parse_book(contents: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut record = String::new();

    for line in contents.lines() {
        if line.trim() == RECORD_DELIMITER {
            let name = record.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
            record.clear();
        } else {
            if !record.is_empty() {
                record.push('\n');
            }
            record.push_str(line);
        }
    }
    // A final record without a trailing delimiter still counts
    let name = record.trim();
    if !name.is_empty() {
        names.push(name.to_string());
    }

    names
}
