use crate::domain::Prediction;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CSV header written when a conflict log file is created.
const CSV_HEADER: &str = "timestamp,prompt,primary,primaryConfidence,secondary,secondaryConfidence";

/// Where classifier conflicts are recorded.
///
/// `Console` emits a structured warning per conflict; `File` appends CSV
/// rows (prompt field double-quoted) to the given path, writing the header
/// when the file is first created. Logging never fails the routing path —
/// write errors are reported and swallowed.
pub enum ConflictLog {
    /// Emit conflicts as `tracing` warnings.
    Console,
    /// Append conflicts to a CSV file.
    File {
        /// Path of the CSV file.
        path: PathBuf,
        /// Cached handle, opened on first use.
        handle: Mutex<Option<File>>,
    },
}

impl Default for ConflictLog {
    fn default() -> Self {
        Self::Console
    }
}

impl ConflictLog {
    /// A console sink.
    pub fn console() -> Self {
        Self::Console
    }

    /// A CSV file sink at `path`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            handle: Mutex::new(None),
        }
    }

    /// Records one conflict between the two classifiers.
    pub fn record(&self, prompt: &str, primary: &Prediction, secondary: &Prediction) {
        match self {
            Self::Console => {
                warn!(
                    prompt,
                    primary = %primary.domain,
                    primary_confidence = primary.confidence,
                    secondary = %secondary.domain,
                    secondary_confidence = secondary.confidence,
                    "domain classifiers disagree"
                );
            }
            Self::File { path, handle } => {
                let row = format!(
                    "{},\"{}\",{},{},{},{}\n",
                    Utc::now().to_rfc3339(),
                    prompt,
                    primary.domain,
                    primary.confidence,
                    secondary.domain,
                    secondary.confidence,
                );
                let mut guard = handle.lock();
                if guard.is_none() {
                    match Self::open(path) {
                        Ok(file) => *guard = Some(file),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "cannot open conflict log");
                            return;
                        }
                    }
                }
                if let Some(file) = guard.as_mut() {
                    if let Err(e) = file.write_all(row.as_bytes()) {
                        warn!(path = %path.display(), error = %e, "cannot append to conflict log");
                    }
                }
            }
        }
    }

    /// Opens the CSV file for appending, writing the header if the file is
    /// new or empty.
    fn open(path: &Path) -> std::io::Result<File> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{CSV_HEADER}")?;
        }
        Ok(file)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn prediction(domain: &str, confidence: f64) -> Prediction {
        Prediction {
            domain: domain.to_string(),
            confidence,
        }
    }

    #[test]
    fn file_sink_writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflicts.csv");
        let log = ConflictLog::file(&path);

        log.record("is it soccer", &prediction("sports", 0.9), &prediction("movies", 0.3));
        log.record("or a film", &prediction("movies", 0.8), &prediction("sports", 0.7));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains("\"is it soccer\",sports,0.9,movies,0.3"));
        assert!(lines[2].contains("\"or a film\",movies,0.8,sports,0.7"));
    }

    #[test]
    fn file_sink_appends_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conflicts.csv");

        {
            let log = ConflictLog::file(&path);
            log.record("one", &prediction("a", 1.0), &prediction("b", 1.0));
        }
        {
            let log = ConflictLog::file(&path);
            log.record("two", &prediction("a", 1.0), &prediction("b", 1.0));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        // One header, two rows.
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(
            contents.lines().filter(|l| *l == CSV_HEADER).count(),
            1
        );
    }

    #[test]
    fn console_sink_never_panics() {
        let log = ConflictLog::console();
        log.record("prompt", &prediction("a", 0.5), &prediction("b", 0.6));
    }
}
