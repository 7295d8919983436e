use crate::error::ClassifyError;
use crate::http::ResponseHead;
use std::fmt;

/// Presentation bucket for a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Success,
    RedirectAuth,
    NotFound,
    Neutral,
}

impl Bucket {
    /// `None` means no response was received.
    pub fn of(status: Option<u16>) -> Bucket {
        match status {
            Some(200 | 204) => Bucket::Success,
            Some(301 | 302 | 401 | 403) => Bucket::RedirectAuth,
            Some(404) => Bucket::NotFound,
            _ => Bucket::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Success => "success",
            Bucket::RedirectAuth => "redirect/auth",
            Bucket::NotFound => "not-found",
            Bucket::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: u16,
    pub body_length: usize,
}

pub fn body_length(raw_len: usize, body_offset: usize) -> Result<usize, ClassifyError> {
    raw_len
        .checked_sub(body_offset)
        .ok_or(ClassifyError::MalformedResponse { body_offset, len: raw_len })
}

pub fn classify(raw: &[u8], head: ResponseHead) -> Result<Classification, ClassifyError> {
    let body_length = body_length(raw.len(), head.body_offset)?;
    Ok(Classification { status: head.status, body_length })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets() {
        assert_eq!(Bucket::of(Some(200)), Bucket::Success);
        assert_eq!(Bucket::of(Some(204)), Bucket::Success);
        for s in [301, 302, 401, 403] {
            assert_eq!(Bucket::of(Some(s)), Bucket::RedirectAuth);
        }
        assert_eq!(Bucket::of(Some(404)), Bucket::NotFound);
        assert_eq!(Bucket::of(Some(500)), Bucket::Neutral);
        assert_eq!(Bucket::of(Some(307)), Bucket::Neutral);
        assert_eq!(Bucket::of(None), Bucket::Neutral);
        assert_eq!(Bucket::NotFound.to_string(), "not-found");
    }

    #[test]
    fn length_from_offset() {
        let raw = vec![b'a'; 350];
        let c = classify(&raw, ResponseHead { status: 200, body_offset: 120 }).unwrap();
        assert_eq!(c, Classification { status: 200, body_length: 230 });
        assert_eq!(body_length(350, 350), Ok(0));
    }

    #[test]
    fn offset_past_end_is_malformed() {
        let raw = vec![0u8; 10];
        let err = classify(&raw, ResponseHead { status: 200, body_offset: 11 }).unwrap_err();
        assert_eq!(err, ClassifyError::MalformedResponse { body_offset: 11, len: 10 });
    }
}
