//! Mailbox text collection.
//!
//! Walks every message in an MBOX once, derives a stable identifier per
//! message, selects its representative `text/plain` part, and decodes it.

use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::extract::decode::decode_text;
use crate::model::message::MailMessage;
use crate::parser::mbox::MboxReader;
use crate::parser::message::parse_message;

/// Length of the raw-message preview logged when a message-id is synthesized.
const PREVIEW_LEN: usize = 50;

/// Decoded texts and their source messages, keyed by message identifier.
///
/// `messages` is a side map kept for diagnostics (header lookups for skipped
/// identifiers); it is never re-scanned from the mailbox.
#[derive(Debug, Default)]
pub struct Collected {
    /// Message identifier to decoded `text/plain` content.
    pub texts: BTreeMap<String, String>,

    /// Message identifier to the parsed source message.
    pub messages: BTreeMap<String, MailMessage>,
}

/// Collect decoded text content from every message in the mailbox.
///
/// Takes an already-open reader so callers scan the mailbox without opening
/// it a second time. Messages without a qualifying `text/plain` part
/// contribute no entry to either map. When a multipart message carries
/// several `text/plain` parts, the last one encountered during the walk
/// wins; downstream consumers depend on that output shape.
pub fn collect(reader: &MboxReader) -> Result<Collected> {
    let mut collected = Collected::default();

    reader.for_each_message(&mut |raw| {
        let message = parse_message(raw);
        let msg_id = message_identifier(&message, raw);

        let text = if message.is_multipart() {
            // Last text/plain part wins
            message
                .walk()
                .into_iter()
                .filter(|part| part.content_type() == "text/plain")
                .next_back()
                .map(decode_text)
        } else if message.content_type() == "text/plain" {
            Some(decode_text(&message))
        } else {
            None
        };

        if let Some(text) = text {
            collected.texts.insert(msg_id.clone(), text);
            collected.messages.insert(msg_id, message);
        }
        true
    })?;

    Ok(collected)
}

/// Derive the message identifier: the trimmed `message-id` header, or a
/// freshly generated UUID when the header is absent.
fn message_identifier(message: &MailMessage, raw: &[u8]) -> String {
    match message.header("message-id") {
        Some(id) => id.trim().to_string(),
        None => {
            let msg_id = Uuid::new_v4().to_string();
            let preview: String = String::from_utf8_lossy(raw)
                .chars()
                .take(PREVIEW_LEN)
                .collect();
            warn!(
                preview = %preview,
                generated_id = %msg_id,
                "No message-id in message, creating a random one"
            );
            msg_id
        }
    }
}
