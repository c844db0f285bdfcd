//! RFC 5322 message parsing: header unfolding and multipart splitting.
//!
//! Produces [`MailMessage`] values whose part payloads are the *raw*
//! transfer-encoded bytes. Nothing here decodes content; that is the job of
//! [`crate::extract::decode`].

use tracing::warn;

use crate::model::message::MailMessage;

/// Parse one raw MBOX message (the `From ` separator line may be present)
/// into a [`MailMessage`], descending into multipart bodies.
pub fn parse_message(raw: &[u8]) -> MailMessage {
    parse_entity(skip_from_line(raw))
}

/// Parse a bare RFC 5322 entity (headers + body, no `From ` line).
fn parse_entity(data: &[u8]) -> MailMessage {
    let (header_bytes, body) = split_header_body(data);
    let headers = unfold_headers(&String::from_utf8_lossy(header_bytes));

    let mut message = MailMessage {
        headers,
        body: body.to_vec(),
        parts: Vec::new(),
    };

    if message.is_multipart() {
        match message
            .header("content-type")
            .and_then(extract_boundary)
        {
            Some(boundary) => {
                message.parts = split_multipart(body, &boundary)
                    .into_iter()
                    .map(|segment| parse_entity(&segment))
                    .collect();
            }
            None => {
                warn!(
                    content_type = %message.content_type(),
                    "Multipart message without a boundary parameter, keeping raw body"
                );
            }
        }
    }

    message
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    };

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Split an entity into its header block and body at the first blank line.
fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < data.len() {
        let line_end = match data[pos..].iter().position(|&b| b == b'\n') {
            Some(p) => pos + p + 1,
            None => data.len(),
        };
        let line = &data[pos..line_end];
        if line == b"\n" || line == b"\r\n" {
            return (&data[..pos], &data[line_end..]);
        }
        pos = line_end;
    }
    // No blank line: the whole entity is headers
    (data, &[])
}

/// Unfold headers: join continuation lines (starting with space or tab) with
/// the previous header.
///
/// Returns a list of `(lowercase_name, value)` pairs in document order.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Extract the `boundary=` parameter from a `Content-Type` header value.
fn extract_boundary(content_type: &str) -> Option<String> {
    let idx = content_type.find("boundary=")?;
    let rest = &content_type[idx + "boundary=".len()..];
    if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next().map(str::to_string)
    } else {
        rest.split([';', ' ', '\t'])
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Split a multipart body into its raw part segments.
///
/// The preamble (before the first delimiter) and epilogue (after the closing
/// `--boundary--`) are discarded per RFC 2046.
fn split_multipart(body: &[u8], boundary: &str) -> Vec<Vec<u8>> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");

    let mut segments: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    let mut pos = 0;
    while pos <= body.len() {
        let line_end = match body[pos..].iter().position(|&b| b == b'\n') {
            Some(p) => pos + p + 1,
            None => body.len(),
        };
        if pos == body.len() {
            break;
        }
        let line = &body[pos..line_end];
        let trimmed = trim_line(line);

        if trimmed == closing.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(strip_trailing_newline(segment));
            }
            break;
        } else if trimmed == delimiter.as_bytes() {
            if let Some(segment) = current.take() {
                segments.push(strip_trailing_newline(segment));
            }
            current = Some(Vec::new());
        } else if let Some(segment) = current.as_mut() {
            segment.extend_from_slice(line);
        }

        pos = line_end;
    }

    // Tolerate a missing closing delimiter
    if let Some(segment) = current.take() {
        segments.push(strip_trailing_newline(segment));
    }

    segments
}

/// Strip the trailing CR/LF of a line for delimiter comparison.
fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// The newline before a boundary delimiter belongs to the delimiter, not to
/// the part content.
fn strip_trailing_newline(mut segment: Vec<u8>) -> Vec<u8> {
    if segment.ends_with(b"\n") {
        segment.pop();
        if segment.ends_with(b"\r") {
            segment.pop();
        }
    }
    segment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From a@b.com Thu Jan 01 00:00:00 2024\n\
                    Message-ID: <x@y>\n\
                    Content-Type: text/plain; charset=utf-8\n\
                    \n\
                    Hello there.\n";
        let msg = parse_message(raw);
        assert_eq!(msg.header("message-id"), Some("<x@y>"));
        assert_eq!(msg.content_type(), "text/plain");
        assert!(!msg.is_multipart());
        assert_eq!(msg.body, b"Hello there.\n");
    }

    #[test]
    fn test_extract_boundary_forms() {
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=\"xyz 1\"").as_deref(),
            Some("xyz 1")
        );
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=abc; charset=utf-8").as_deref(),
            Some("abc")
        );
        assert_eq!(extract_boundary("multipart/mixed"), None);
    }

    #[test]
    fn test_parse_multipart_message() {
        let raw = b"Content-Type: multipart/alternative; boundary=SEP\n\
                    Message-ID: <m@p>\n\
                    \n\
                    preamble is ignored\n\
                    --SEP\n\
                    Content-Type: text/plain\n\
                    \n\
                    plain body\n\
                    --SEP\n\
                    Content-Type: text/html\n\
                    \n\
                    <p>html body</p>\n\
                    --SEP--\n\
                    epilogue is ignored\n";
        let msg = parse_message(raw);
        assert!(msg.is_multipart());
        assert_eq!(msg.parts.len(), 2);
        assert_eq!(msg.parts[0].content_type(), "text/plain");
        assert_eq!(msg.parts[0].body, b"plain body");
        assert_eq!(msg.parts[1].content_type(), "text/html");
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=OUTER\n\
                    \n\
                    --OUTER\n\
                    Content-Type: multipart/alternative; boundary=INNER\n\
                    \n\
                    --INNER\n\
                    Content-Type: text/plain\n\
                    \n\
                    inner plain\n\
                    --INNER--\n\
                    --OUTER\n\
                    Content-Type: text/plain\n\
                    \n\
                    outer plain\n\
                    --OUTER--\n";
        let msg = parse_message(raw);
        assert_eq!(msg.parts.len(), 2);
        assert!(msg.parts[0].is_multipart());
        let walked = msg.walk();
        let plains: Vec<_> = walked
            .iter()
            .filter(|p| p.content_type() == "text/plain")
            .collect();
        assert_eq!(plains.len(), 2);
        assert_eq!(plains[0].body, b"inner plain");
        assert_eq!(plains[1].body, b"outer plain");
    }

    #[test]
    fn test_missing_closing_delimiter_is_tolerated() {
        let raw = b"Content-Type: multipart/mixed; boundary=B\n\
                    \n\
                    --B\n\
                    Content-Type: text/plain\n\
                    \n\
                    truncated part\n";
        let msg = parse_message(raw);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.parts[0].body, b"truncated part");
    }
}
