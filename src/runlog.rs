use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::info;

/// Append-only run log. Every run outcome lands here; the control surface
/// exposes the tail. Lines also go to the tracing subscriber.
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl RunLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append a timestamped line. Write failures are swallowed: losing a log
    /// line must never fail a run.
    pub fn append(&self, message: &str) {
        info!("{message}");
        let line = format!("[{}] {message}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }

    /// Last `n` lines of the log file.
    pub fn tail(&self, n: usize) -> io::Result<Vec<String>> {
        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;
        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sf6-tracker-test-{name}-{}.log", std::process::id()))
    }

    #[test]
    fn tail_returns_most_recent_lines() {
        let path = temp_log_path("tail");
        let _ = std::fs::remove_file(&path);
        let log = RunLog::open(&path).unwrap();

        for i in 0..5 {
            log.append(&format!("line {i}"));
        }

        let tail = log.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail[0].ends_with("line 3"));
        assert!(tail[1].ends_with("line 4"));

        let all = log.tail(100).unwrap();
        assert_eq!(all.len(), 5);

        let _ = std::fs::remove_file(&path);
    }
}
