use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FuzzConfig {
    pub timeout_ms: Option<u64>,
    pub qps: Option<u32>,
    pub wordlist: Option<PathBuf>,
    pub format: Option<String>,
    pub insecure: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub fuzz: Option<FuzzConfig>,
}

/// Load `path`, or `./pathfuzz.yaml` when no path is given and the file exists.
/// A missing default file is not an error; an unreadable or invalid explicit one is.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new("pathfuzz.yaml");
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_fuzz_section() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "fuzz:\n  timeout_ms: 2500\n  qps: 5\n  wordlist: words.txt\n  format: jsonl\n").unwrap();
        let cfg = load_config(Some(f.path())).unwrap().unwrap();
        let fuzz = cfg.fuzz.unwrap();
        assert_eq!(fuzz.timeout_ms, Some(2500));
        assert_eq!(fuzz.qps, Some(5));
        assert_eq!(fuzz.wordlist, Some(PathBuf::from("words.txt")));
        assert_eq!(fuzz.format.as_deref(), Some("jsonl"));
        assert_eq!(fuzz.insecure, None);
    }

    #[test]
    fn explicit_missing_file_is_error() {
        assert!(load_config(Some(Path::new("/no/such/pathfuzz.yaml"))).is_err());
    }
}
