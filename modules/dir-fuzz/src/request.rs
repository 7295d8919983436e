//! Captured base request: service descriptor plus the parsed request head.

use crate::error::FuzzError;
use pathfuzz_core::HttpService;
use url::Url;

/// Immutable capture of the request a run is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRequest {
    service: HttpService,
    lines: Vec<String>,
    method: String,
    target: String,
    path: String,
    path_start: usize,
}

impl BaseRequest {
    /// Parse the head of a raw HTTP/1.x request. Anything after the first blank line is
    /// ignored since templated requests never carry a body.
    pub fn capture(service: HttpService, raw: &[u8]) -> Result<Self, FuzzError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_start_matches(['\r', '\n']);
        let head = match (text.find("\r\n\r\n"), text.find("\n\n")) {
            (Some(a), Some(b)) => &text[..a.min(b)],
            (Some(a), None) => &text[..a],
            (None, Some(b)) => &text[..b],
            (None, None) => text,
        };
        let mut lines: Vec<String> = head.lines().map(|l| l.to_string()).collect();
        // offsets below are taken from the method's first byte
        if let Some(first) = lines.first_mut() {
            *first = first.trim().to_string();
        }
        let request_line = lines
            .first()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| FuzzError::InvalidRequest("empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || !parts[2].starts_with("HTTP/") {
            return Err(FuzzError::InvalidRequest(format!("malformed request line: {:?}", request_line)));
        }
        let method = parts[0].to_string();
        let target = parts[1].to_string();
        let (path, offset) = path_of_target(&target)?;
        let target_start = request_line
            .find(char::is_whitespace)
            .and_then(|m| request_line[m..].find(|c: char| !c.is_whitespace()).map(|t| m + t))
            .ok_or_else(|| FuzzError::InvalidRequest(format!("malformed request line: {:?}", request_line)))?;
        let path_start = target_start + offset;

        Ok(BaseRequest { service, lines, method, target, path, path_start })
    }

    pub fn service(&self) -> &HttpService {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path component of the request target, without query or fragment.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Byte offset of `path()` inside `request_line()`.
    pub fn path_start(&self) -> usize {
        self.path_start
    }

    pub fn request_line(&self) -> &str {
        &self.lines[0]
    }

    /// Header lines following the request line, verbatim.
    pub fn header_lines(&self) -> &[String] {
        &self.lines[1..]
    }

    pub fn url(&self) -> String {
        if self.target.starts_with('/') {
            format!("{}{}", self.service, self.target)
        } else {
            self.target.clone()
        }
    }
}

/// Path of an origin-form or absolute-form target, with its byte offset in the target.
fn path_of_target(target: &str) -> Result<(String, usize), FuzzError> {
    let offset = if target.starts_with('/') {
        0
    } else if let Some(sep) = target.find("://") {
        Url::parse(target).map_err(|e| FuzzError::InvalidRequest(format!("bad request target {:?}: {}", target, e)))?;
        let authority_start = sep + 3;
        match target[authority_start..].find(['/', '?', '#']) {
            Some(i) if target[authority_start + i..].starts_with('/') => authority_start + i,
            _ => return Err(FuzzError::InvalidRequest(format!("request target {:?} has no path", target))),
        }
    } else {
        return Err(FuzzError::InvalidRequest(format!("unsupported request target {:?}", target)));
    };
    let rest = &target[offset..];
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    Ok((rest[..end].to_string(), offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathfuzz_core::Scheme;

    fn svc() -> HttpService {
        HttpService::new(Scheme::Https, "shop.example", 443)
    }

    #[test]
    fn parses_origin_form() {
        let raw = b"GET /api/v1?debug=1 HTTP/1.1\r\nHost: shop.example\r\nCookie: a=b\r\n\r\n";
        let req = BaseRequest::capture(svc(), raw).unwrap();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/api/v1");
        assert_eq!(req.path_start(), 4);
        assert_eq!(req.request_line(), "GET /api/v1?debug=1 HTTP/1.1");
        assert_eq!(req.header_lines(), ["Host: shop.example", "Cookie: a=b"]);
        assert_eq!(req.url(), "https://shop.example/api/v1?debug=1");
    }

    #[test]
    fn ignores_body_and_accepts_bare_newlines() {
        let raw = b"POST /form HTTP/1.0\nHost: x\nContent-Length: 3\n\nabc";
        let req = BaseRequest::capture(svc(), raw).unwrap();
        assert_eq!(req.path(), "/form");
        assert_eq!(req.header_lines().len(), 2);
    }

    #[test]
    fn parses_absolute_form() {
        let raw = b"GET http://proxy.test:8080/admin/panel#frag HTTP/1.1\r\nHost: proxy.test\r\n\r\n";
        let req = BaseRequest::capture(svc(), raw).unwrap();
        assert_eq!(req.path(), "/admin/panel");
        assert_eq!(&req.request_line()[req.path_start()..req.path_start() + 12], "/admin/panel");
        assert_eq!(req.url(), "http://proxy.test:8080/admin/panel#frag");
    }

    #[test]
    fn surrounding_whitespace_on_request_line_is_dropped() {
        let raw = b" \tGET /a/b HTTP/1.1 \r\nHost: x\r\n\r\n";
        let req = BaseRequest::capture(svc(), raw).unwrap();
        assert_eq!(req.request_line(), "GET /a/b HTTP/1.1");
        assert_eq!(req.path_start(), 4);
        assert_eq!(&req.request_line()[req.path_start()..], "/a/b HTTP/1.1");
    }

    #[test]
    fn rejects_garbage() {
        assert!(BaseRequest::capture(svc(), b"").is_err());
        assert!(BaseRequest::capture(svc(), b"hello\r\n\r\n").is_err());
        assert!(BaseRequest::capture(svc(), b"OPTIONS * HTTP/1.1\r\n\r\n").is_err());
        assert!(BaseRequest::capture(svc(), b"GET http://host HTTP/1.1\r\n\r\n").is_err());
    }
}
