//! Splices payloads into the captured request line.

use crate::request::BaseRequest;
use tracing::warn;

/// Headers that describe a body or connection reuse; templated requests carry neither.
const DROPPED_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection", "proxy-connection"];

/// `path` with a guaranteed trailing slash.
pub fn directory_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Prefix plus payload, with at most one leading `/` removed from the payload.
pub fn target_path(prefix: &str, payload: &str) -> String {
    let payload = payload.strip_prefix('/').unwrap_or(payload);
    format!("{}{}", prefix, payload)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatedRequest {
    pub target_path: String,
    pub bytes: Vec<u8>,
}

/// Per-run request builder. The prefix is fixed when the templater is created.
///
/// The payload replaces the path at its parsed position inside the request target rather
/// than the first textual match, so a path that recurs in the query string cannot be
/// substituted in the wrong place. Recurrences are still reported through `ambiguous`.
#[derive(Debug, Clone)]
pub struct Templater {
    prefix: String,
    path_start: usize,
    path_len: usize,
    request_line: String,
    headers: Vec<String>,
    ambiguous: bool,
}

impl Templater {
    pub fn new(base: &BaseRequest) -> Self {
        let line = base.request_line();
        // the version token ("HTTP/1.1") is not part of the target
        let without_version = line.trim_end().rsplit_once(char::is_whitespace).map(|(head, _)| head).unwrap_or(line);
        let occurrences = without_version.matches(base.path()).count();
        let ambiguous = occurrences > 1;
        if ambiguous {
            warn!(path = base.path(), occurrences, "path recurs in request line; substituting at the request target only");
        }
        let headers = base
            .header_lines()
            .iter()
            .filter(|h| {
                let name = h.split(':').next().unwrap_or("").trim().to_ascii_lowercase();
                !DROPPED_HEADERS.contains(&name.as_str())
            })
            .cloned()
            .collect();
        Templater {
            prefix: directory_prefix(base.path()),
            path_start: base.path_start(),
            path_len: base.path().len(),
            request_line: line.to_string(),
            headers,
            ambiguous,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True when the captured path appears more than once in the request line.
    pub fn ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn build(&self, payload: &str) -> TemplatedRequest {
        let target_path = target_path(&self.prefix, payload);
        let line = &self.request_line;
        let mut out = String::with_capacity(line.len() + target_path.len() + 64 * (self.headers.len() + 1));
        out.push_str(&line[..self.path_start]);
        out.push_str(&target_path);
        out.push_str(&line[self.path_start + self.path_len..]);
        out.push_str("\r\n");
        for h in &self.headers {
            out.push_str(h);
            out.push_str("\r\n");
        }
        out.push_str("Connection: close\r\n\r\n");
        TemplatedRequest { target_path, bytes: out.into_bytes() }
    }
}
