//! Append-only progress trail for external monitoring.
//!
//! One log file per conference, plain timestamped lines, never parsed back
//! in. The file is opened per write so an interrupted run leaves nothing
//! held open and every line that was written survives.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

pub struct ProgressReporter {
    path: PathBuf,
}

impl ProgressReporter {
    pub fn new(dir: &Path, conference_key: &str) -> Self {
        Self {
            path: dir.join(format!("{conference_key}_progress.log")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Logging failures are reported but never
    /// propagate — a full disk must not kill the run.
    pub fn record(&self, message: &str) {
        let line = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = result {
            warn!(path = %self.path.display(), error = %err, "progress line dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_appended_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ProgressReporter::new(dir.path(), "kdd");

        reporter.record("tier openalex: 10/50 enriched");
        reporter.record("tier openalex finished");

        let contents = std::fs::read_to_string(reporter.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("tier openalex: 10/50 enriched"));
        assert!(lines[1].ends_with("tier openalex finished"));
    }

    #[test]
    fn recording_never_panics_on_a_bad_path() {
        let reporter = ProgressReporter::new(Path::new("/nonexistent-dir-for-test"), "kdd");
        reporter.record("dropped");
    }
}
