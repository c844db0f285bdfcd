//! Streaming MBOX splitter.
//!
//! Reads an MBOX file line-by-line and hands each raw message (separator
//! line included) to a callback. Never loads the whole file into memory.
//! Tolerant of malformed input: mixed line endings, `From ` lines without a
//! preceding blank line (logged), truncated messages at EOF, a UTF-8 BOM at
//! the start of the file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{NerError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Streaming MBOX reader.
///
/// The mailbox is opened read-only and never mutated.
#[derive(Debug)]
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
}

impl MboxReader {
    /// Create a reader for the given MBOX file.
    ///
    /// Verifies that the file exists, but does NOT validate that it is
    /// actually an MBOX.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NerError::MailboxNotFound(path.clone())
            } else {
                NerError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over every message, invoking `callback` with the raw bytes of
    /// each one. Returning `false` from the callback aborts the scan.
    ///
    /// Returns the number of messages visited.
    pub fn for_each_message(&self, callback: &mut dyn FnMut(&[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| NerError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(16 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_line_was_empty = true;
        let mut first_line = true;

        loop {
            line_buf.clear();
            let line_len = {
                let buf = reader.fill_buf().map_err(|e| NerError::io(&self.path, e))?;
                if buf.is_empty() {
                    break; // EOF
                }
                let consume_len = match buf.iter().position(|&b| b == b'\n') {
                    Some(pos) => pos + 1,
                    None => buf.len(),
                };
                line_buf.extend_from_slice(&buf[..consume_len]);
                reader.consume(consume_len);
                consume_len as u64
            };

            if is_mbox_separator(&line_buf) && (first_line || prev_line_was_empty) {
                if !message_buf.is_empty() {
                    if !callback(&message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if is_mbox_separator(&line_buf) {
                warn!(offset, "Found 'From ' separator without preceding blank line");
                if !message_buf.is_empty() {
                    if !callback(&message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else {
                message_buf.extend_from_slice(&line_buf);
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            offset += line_len;
        }

        // Flush the last message
        if !message_buf.is_empty() && callback(&message_buf) {
            count += 1;
        }

        Ok(count)
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start of the file
    let line = if line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n")); // lowercase
        assert!(!is_mbox_separator(b">From user@example.com\n")); // escaped
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(is_blank_line(b"  \n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_split_two_messages() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("two.mbox");
        let mut f = File::create(&path).unwrap();
        write!(
            f,
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Subject: one\n\nBody one.\n\n\
             From b@example.com Thu Jan 01 00:00:01 2024\n\
             Subject: two\n\nBody two.\n"
        )
        .unwrap();
        drop(f);

        let reader = MboxReader::open(&path).unwrap();
        let mut subjects = Vec::new();
        let count = reader
            .for_each_message(&mut |raw| {
                let text = String::from_utf8_lossy(raw).to_string();
                subjects.push(text.lines().nth(1).unwrap().to_string());
                true
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(subjects, vec!["Subject: one", "Subject: two"]);
    }

    #[test]
    fn test_escaped_from_is_not_a_separator() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("escaped.mbox");
        std::fs::write(
            &path,
            "From a@example.com Thu Jan 01 00:00:00 2024\n\
             Subject: one\n\n>From the body, not a separator\n",
        )
        .unwrap();

        let reader = MboxReader::open(&path).unwrap();
        let mut count = 0;
        reader
            .for_each_message(&mut |_| {
                count += 1;
                true
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_mbox() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.mbox");
        std::fs::write(&path, "").unwrap();

        let reader = MboxReader::open(&path).unwrap();
        let count = reader.for_each_message(&mut |_| true).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_missing_file_is_mailbox_not_found() {
        let err = MboxReader::open("/nonexistent/nowhere.mbox").unwrap_err();
        assert!(matches!(err, NerError::MailboxNotFound(_)));
    }
}
