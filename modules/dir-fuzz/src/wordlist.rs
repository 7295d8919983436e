//! Newline-delimited wordlists.

use crate::error::FuzzError;
use std::path::Path;

/// Payloads used until a wordlist is imported.
pub const DEFAULT_PAYLOADS: &[&str] = &["admin", "login", "api", "dev", "test", "backup", "config", ".env"];

pub fn default_wordlist() -> Vec<String> {
    DEFAULT_PAYLOADS.iter().map(|s| s.to_string()).collect()
}

/// Read a wordlist file. Order and duplicates are preserved; blank lines are dropped.
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<String>, FuzzError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| FuzzError::Io { path: path.to_path_buf(), source })?;
    Ok(parse(&String::from_utf8_lossy(&bytes)))
}

pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn drops_blank_lines_keeps_order_and_duplicates() {
        let words = parse("admin\n\n  \nlogin\r\nadmin\n.git/config\n");
        assert_eq!(words, vec!["admin", "login", "admin", ".git/config"]);
    }

    #[test]
    fn interior_whitespace_untouched() {
        assert_eq!(parse("my dir\n"), vec!["my dir"]);
    }

    #[test]
    fn load_from_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "one").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "/two").unwrap();
        let words = load(f.path()).unwrap();
        assert_eq!(words, vec!["one", "/two"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, FuzzError::Io { .. }));
    }

    #[test]
    fn default_list_matches_constant() {
        assert_eq!(default_wordlist().len(), DEFAULT_PAYLOADS.len());
        assert_eq!(default_wordlist()[7], ".env");
    }
}
