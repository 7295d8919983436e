//! Minimal HTTP/1.x response head parsing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    /// Index of the first body byte, i.e. just past the blank line ending the headers.
    pub body_offset: usize,
}

/// Byte index just past the header terminator (`\r\n\r\n` or a bare `\n\n`).
pub fn find_head_end(raw: &[u8]) -> Option<usize> {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parse the status line. A response whose headers never terminate gets a body offset
/// equal to its length (no body).
pub fn parse_response(raw: &[u8]) -> Option<ResponseHead> {
    let line_end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len());
    let line = std::str::from_utf8(&raw[..line_end]).ok()?.trim_end();
    let mut parts = line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    let status = code.parse::<u16>().ok()?;
    let body_offset = find_head_end(raw).unwrap_or(raw.len());
    Some(ResponseHead { status, body_offset })
}

/// Host capability that locates the status code and body in a raw response.
pub trait ParseResponse: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Option<ResponseHead>;
}

/// HTTP/1.x status line and header terminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http1Parser;

impl ParseResponse for Http1Parser {
    fn parse(&self, raw: &[u8]) -> Option<ResponseHead> {
        parse_response(raw)
    }
}

/// Case-insensitive lookup of a header value in a response head.
pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|l| {
        let (k, v) = l.split_once(':')?;
        if k.trim().eq_ignore_ascii_case(name) {
            Some(v.trim())
        } else {
            None
        }
    })
}
