//! In-memory mail message: unfolded headers, raw body bytes, nested parts.

/// A parsed mail message or MIME part.
///
/// Headers are stored unfolded as `(lowercase_name, value)` pairs in
/// document order. The body is kept as the *raw, undecoded* payload bytes;
/// transfer-encoding and charset handling happen later in
/// [`crate::extract::decode`], driven by the declared headers. Multipart
/// messages carry their sub-parts recursively.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Unfolded headers, names lowercased, in original order.
    pub headers: Vec<(String, String)>,

    /// Raw payload bytes (for multipart containers: everything between the
    /// header block and the first boundary is not retained).
    pub body: Vec<u8>,

    /// Sub-parts of a multipart message, in document order.
    pub parts: Vec<MailMessage>,
}

impl MailMessage {
    /// First value for a header name (case-insensitive lookup).
    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == lower)
            .map(|(_, v)| v.as_str())
    }

    /// The `type/subtype` of the `Content-Type` header, lowercased, with
    /// parameters stripped. Defaults to `text/plain` when the header is
    /// absent, matching RFC 2045 semantics.
    pub fn content_type(&self) -> String {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
            .unwrap_or_else(|| "text/plain".to_string())
    }

    /// Whether this message declares a `multipart/*` content type.
    pub fn is_multipart(&self) -> bool {
        self.content_type().starts_with("multipart/")
    }

    /// Depth-first walk over all parts, containers included, self excluded.
    ///
    /// Mirrors the walk order used when selecting the representative
    /// `text/plain` part: later parts overwrite earlier ones.
    pub fn walk(&self) -> Vec<&MailMessage> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.push(part);
            out.extend(part.walk());
        }
        out
    }
}
