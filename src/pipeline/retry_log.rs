use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    Forbidden,
    FetchFailed,
    InsertFailed,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::Forbidden => "forbidden",
            RetryReason::FetchFailed => "fetch_failed",
            RetryReason::InsertFailed => "insert_failed",
        }
    }
}

/// Append-only list of URLs that need another pass. One tab-separated line
/// per failure: timestamp, reason, URL.
pub struct RetryLog {
    path: PathBuf,
}

impl RetryLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write failures are logged and swallowed; losing a retry line must not
    /// stop the run.
    pub fn record(&self, url: &str, reason: RetryReason) {
        let line = format!(
            "{}\t{}\t{}\n",
            chrono::Utc::now().to_rfc3339(),
            reason.as_str(),
            url
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(%url, "Could not write retry log {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = RetryLog::new(dir.path().join("retry.log"));

        log.record("https://example.gov/a", RetryReason::Forbidden);
        log.record("https://example.gov/b", RetryReason::FetchFailed);

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\tforbidden\thttps://example.gov/a"));
        assert!(lines[1].ends_with("\tfetch_failed\thttps://example.gov/b"));
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let log = RetryLog::new(dir.path().join("missing").join("retry.log"));
        log.record("https://example.gov/a", RetryReason::InsertFailed);
        assert!(!log.path().exists());
    }
}
