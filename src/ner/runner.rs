//! Entity extraction over a collected mailbox.
//!
//! One whole-batch inference call is attempted first; any batch failure
//! discards partial results and falls back to per-message inference, where
//! individual failures only skip that message. No inference error ever
//! surfaces to the caller.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::model::entity::EntityMention;
use crate::model::message::MailMessage;
use crate::ner::NerBackend;

/// Result of one extraction pass.
///
/// `entities` contains exactly the identifiers that succeeded: all of them
/// when the batch path succeeds, everything except `skipped` otherwise.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Message identifier to its (unfiltered) entity mentions.
    pub entities: BTreeMap<String, Vec<EntityMention>>,

    /// Identifiers whose per-message inference failed.
    pub skipped: Vec<String>,
}

/// Run NER over every collected text.
///
/// `progress` is invoked with `(done, total)` as messages complete during the
/// per-message fallback, and once at the end of a successful batch.
pub fn run_extraction(
    backend: &dyn NerBackend,
    texts: &BTreeMap<String, String>,
    progress: Option<&dyn Fn(u64, u64)>,
) -> RunOutcome {
    let total = texts.len() as u64;
    let ids: Vec<&String> = texts.keys().collect();
    let contents: Vec<&str> = texts.values().map(String::as_str).collect();

    info!(messages = total, model = backend.model_id(), "Running NER on mbox text content");

    match backend.infer_batch(&contents) {
        Ok(results) if results.len() == ids.len() => {
            if let Some(cb) = progress {
                cb(total, total);
            }
            RunOutcome {
                entities: ids
                    .into_iter()
                    .cloned()
                    .zip(results)
                    .collect(),
                skipped: Vec::new(),
            }
        }
        Ok(results) => {
            warn!(
                expected = ids.len(),
                got = results.len(),
                "Batch inference returned a mismatched result count, \
                 falling back to per-message inference"
            );
            per_message_fallback(backend, texts, progress)
        }
        Err(err) => {
            warn!(
                error = %err,
                "An exception happened while running the mbox contents through \
                 the NER model, will run NER on each message individually"
            );
            per_message_fallback(backend, texts, progress)
        }
    }
}

/// Infer every message individually, skipping the ones that fail.
fn per_message_fallback(
    backend: &dyn NerBackend,
    texts: &BTreeMap<String, String>,
    progress: Option<&dyn Fn(u64, u64)>,
) -> RunOutcome {
    let total = texts.len() as u64;
    let mut outcome = RunOutcome::default();

    for (done, (msg_id, text)) in texts.iter().enumerate() {
        match backend.infer(text) {
            Ok(mentions) => {
                outcome.entities.insert(msg_id.clone(), mentions);
            }
            Err(err) => {
                debug!(
                    msg_id = %msg_id,
                    error = %err,
                    "NER failed for message"
                );
                outcome.skipped.push(msg_id.clone());
            }
        }
        if let Some(cb) = progress {
            cb(done as u64 + 1, total);
        }
    }

    if !outcome.skipped.is_empty() {
        info!(count = outcome.skipped.len(), "Number of messages where NER failed");
    }

    outcome
}

/// Log the headers of every skipped message at debug level.
///
/// Headers come from the collector's message map — a side lookup, never a
/// re-scan of the mailbox.
pub fn report_skipped(skipped: &[String], messages: &BTreeMap<String, MailMessage>) {
    if skipped.is_empty() || !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    debug!("Printing headers of messages where NER failed:");
    for msg_id in skipped {
        match messages.get(msg_id) {
            Some(message) => debug!(msg_id = %msg_id, headers = ?message.headers),
            None => debug!(msg_id = %msg_id, "No collected message for skipped id"),
        }
    }
}

/// Drop mentions scoring below the threshold. Inclusive at the boundary:
/// `score == threshold` is retained.
pub fn filter_by_threshold(
    entities: BTreeMap<String, Vec<EntityMention>>,
    threshold: f64,
) -> BTreeMap<String, Vec<EntityMention>> {
    entities
        .into_iter()
        .map(|(msg_id, mentions)| {
            (
                msg_id,
                mentions
                    .into_iter()
                    .filter(|m| m.score >= threshold)
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NerError, Result};

    /// Stub backend: batch optionally fails, per-message fails for listed texts.
    struct StubNer {
        batch_fails: bool,
        failing_texts: Vec<String>,
    }

    impl StubNer {
        fn mention_for(text: &str) -> Vec<EntityMention> {
            vec![EntityMention::new(text.to_string(), "LOC", 0.9)]
        }
    }

    impl NerBackend for StubNer {
        fn model_id(&self) -> &str {
            "stub"
        }

        fn label_vocabulary(&self) -> Vec<String> {
            vec!["O".into(), "B-LOC".into(), "I-LOC".into()]
        }

        fn infer(&self, text: &str) -> Result<Vec<EntityMention>> {
            if self.failing_texts.iter().any(|t| t == text) {
                return Err(NerError::Inference(format!("cannot process '{text}'")));
            }
            Ok(Self::mention_for(text))
        }

        fn infer_batch(&self, texts: &[&str]) -> Result<Vec<Vec<EntityMention>>> {
            if self.batch_fails {
                return Err(NerError::BatchInference("batch exploded".into()));
            }
            texts.iter().map(|t| self.infer(t)).collect()
        }
    }

    fn texts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_batch_success_covers_all_identifiers() {
        let backend = StubNer {
            batch_fails: false,
            failing_texts: vec![],
        };
        let input = texts(&[("<a@b>", "Paris"), ("<c@d>", "Oslo")]);
        let outcome = run_extraction(&backend, &input, None);
        assert_eq!(outcome.entities.len(), 2);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.entities["<a@b>"][0].text, "Paris");
    }

    #[test]
    fn test_batch_failure_falls_back_and_skips() {
        let backend = StubNer {
            batch_fails: true,
            failing_texts: vec!["bad text".to_string()],
        };
        let input = texts(&[("<a@b>", "Paris"), ("<bad@id>", "bad text")]);
        let outcome = run_extraction(&backend, &input, None);
        assert_eq!(outcome.entities.len(), 1);
        assert!(outcome.entities.contains_key("<a@b>"));
        assert_eq!(outcome.skipped, vec!["<bad@id>".to_string()]);
    }

    #[test]
    fn test_threshold_filter_is_inclusive_at_boundary() {
        let mut entities = BTreeMap::new();
        entities.insert(
            "<a@b>".to_string(),
            vec![
                EntityMention::new("keep", "LOC", 0.8),
                EntityMention::new("drop", "LOC", 0.799),
            ],
        );
        let filtered = filter_by_threshold(entities, 0.8);
        let kept = &filtered["<a@b>"];
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "keep");
    }

    #[test]
    fn test_progress_reports_during_fallback() {
        let backend = StubNer {
            batch_fails: true,
            failing_texts: vec![],
        };
        let input = texts(&[("<a@b>", "one"), ("<c@d>", "two")]);
        let seen = std::cell::RefCell::new(Vec::new());
        let cb = |done: u64, total: u64| seen.borrow_mut().push((done, total));
        run_extraction(&backend, &input, Some(&cb));
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 2)]);
    }
}
