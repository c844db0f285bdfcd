//! Decoded plain-text extraction for a single message part.
//!
//! Exactly one decode path is chosen deterministically from the part's
//! declared `Content-Type` charset and `Content-Transfer-Encoding`. Decoding
//! is best-effort by contract: undecodable bytes become replacement
//! characters and unknown transfer encodings fall back to the raw payload,
//! so extraction never fails a message outright.

use tracing::{debug, warn};

use crate::model::message::MailMessage;

/// Produce the decoded text content of one message part.
pub fn decode_text(part: &MailMessage) -> String {
    let charset = part.header("content-type").and_then(resolve_charset);
    if charset.is_none() {
        debug!("No charset in Content-Type header, interpreting payload as 7-bit text");
    }

    let encoding = part
        .header("content-transfer-encoding")
        .map(|e| e.trim().to_lowercase());

    match encoding.as_deref() {
        Some("quoted-printable") => {
            let bytes = decode_quoted_printable(&part.body);
            decode_with_charset(charset.as_deref(), &bytes)
        }
        Some("base64") => {
            let bytes = decode_base64(&part.body);
            decode_with_charset(charset.as_deref(), &bytes)
        }
        Some("8bit") => decode_with_charset(charset.as_deref(), &part.body),
        Some(other) => {
            // Best-effort passthrough, not a hard failure
            warn!(encoding = other, "Unknown Content-Transfer-Encoding");
            String::from_utf8_lossy(&part.body).into_owned()
        }
        None => decode_with_charset(charset.as_deref(), &part.body),
    }
}

/// Extract the `charset=` parameter from a raw `Content-Type` value.
///
/// Quoted values take the quoted substring; bare values take the token up to
/// the first whitespace. A trailing `;` on a bare token is kept as-is; such
/// a label fails charset lookup and falls back to lossy UTF-8.
pub fn resolve_charset(content_type: &str) -> Option<String> {
    let idx = content_type.find("charset=")?;
    let rest = &content_type[idx + "charset=".len()..];
    if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next().map(str::to_string)
    } else {
        rest.split_whitespace().next().map(str::to_string)
    }
}

/// Decode bytes under a named charset, or as 7-bit/UTF-8 when none is given.
///
/// Invalid sequences become replacement characters rather than errors.
fn decode_with_charset(charset: Option<&str>, bytes: &[u8]) -> String {
    match charset {
        None => String::from_utf8_lossy(bytes).into_owned(),
        Some(label) => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            }
            None => {
                warn!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        },
    }
}

/// Decode a quoted-printable body (RFC 2045 §6.7).
///
/// Soft line breaks (`=` at end of line) are removed; `=XX` hex escapes are
/// decoded; malformed escapes pass through literally.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'=' => {
                // Soft line break: "=\r\n" or "=\n"
                if input.get(i + 1) == Some(&b'\r') && input.get(i + 2) == Some(&b'\n') {
                    i += 3;
                } else if input.get(i + 1) == Some(&b'\n') {
                    i += 2;
                } else if i + 2 < input.len() {
                    match hex_pair(input[i + 1], input[i + 2]) {
                        Some(byte) => {
                            result.push(byte);
                            i += 3;
                        }
                        None => {
                            result.push(b'=');
                            i += 1;
                        }
                    }
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode a base64 body, ignoring whitespace and any stray non-alphabet
/// bytes (tolerant by design: mail in the wild is rarely pristine).
pub fn decode_base64(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len() / 4 * 3);
    let mut quad = [0u8; 4];
    let mut qi = 0;

    for &b in input {
        let val = match b {
            b'A'..=b'Z' => b - b'A',
            b'a'..=b'z' => b - b'a' + 26,
            b'0'..=b'9' => b - b'0' + 52,
            b'+' => 62,
            b'/' => 63,
            b'=' => {
                // Padding terminates the final quad
                break;
            }
            _ => continue,
        };
        quad[qi] = val;
        qi += 1;
        if qi == 4 {
            result.push((quad[0] << 2) | (quad[1] >> 4));
            result.push((quad[1] << 4) | (quad[2] >> 2));
            result.push((quad[2] << 6) | quad[3]);
            qi = 0;
        }
    }

    // Flush a partial final quad (2 chars -> 1 byte, 3 chars -> 2 bytes)
    if qi >= 2 {
        result.push((quad[0] << 2) | (quad[1] >> 4));
    }
    if qi == 3 {
        result.push((quad[1] << 4) | (quad[2] >> 2));
    }

    result
}
