//! Daily-rotated JSON-lines audit log.
//!
//! Entries go to `<stem>-YYYY-MM-DD.<ext>` beside the configured path. The
//! open file handle lives behind a mutex and the UTC date is re-checked under
//! that lock before every write, so concurrent writers never straddle a
//! rotation.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AuditError;
use crate::traits::{AuditEntry, AuditSink, RealTimeProvider, TimeProvider};

const DEFAULT_EXTENSION: &str = "log";

struct OpenLog {
    date: NaiveDate,
    file: File,
}

/// Per-tool call counts over recent daily files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    /// Number of days inspected, including today.
    pub days: u32,
    /// Total entries found.
    pub total_calls: u64,
    /// Entries flagged high risk.
    pub high_risk_calls: u64,
    /// Entries per tool name.
    pub by_tool: BTreeMap<String, u64>,
}

/// [`AuditSink`] writing to daily files.
pub struct FileAuditLogger {
    dir: PathBuf,
    stem: String,
    extension: String,
    clock: Arc<dyn TimeProvider>,
    current: Mutex<Option<OpenLog>>,
}

impl FileAuditLogger {
    /// Create a logger for `path`. No file is touched until the first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let stem = path
            .file_stem()
            .map_or_else(|| "audit".to_string(), |s| s.to_string_lossy().into_owned());
        let extension = path.extension().map_or_else(
            || DEFAULT_EXTENSION.to_string(),
            |s| s.to_string_lossy().into_owned(),
        );
        Self {
            dir,
            stem,
            extension,
            clock: Arc::new(RealTimeProvider),
            current: Mutex::new(None),
        }
    }

    /// Use a custom clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Directory holding the daily files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `date`.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}",
            self.stem,
            date.format("%Y-%m-%d"),
            self.extension
        ))
    }

    fn date_of(&self, file_name: &str) -> Option<NaiveDate> {
        let rest = file_name.strip_prefix(&self.stem)?.strip_prefix('-')?;
        let date = rest.strip_suffix(&self.extension)?.strip_suffix('.')?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    fn io_error(path: &Path, err: &std::io::Error) -> AuditError {
        AuditError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    fn open(&self, date: NaiveDate) -> Result<File, AuditError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, &e))?;
        let path = self.path_for(date);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Self::io_error(&path, &e))?;
        debug!(path = %path.display(), "Opened audit log");
        Ok(file)
    }

    /// Delete dated files older than `retention_days`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the directory cannot be read. Individual
    /// deletion failures are logged and skipped.
    pub fn cleanup_old_logs(&self, retention_days: u32) -> Result<usize, AuditError> {
        let today = self.clock.now().date_naive();
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return Ok(0);
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(Self::io_error(&self.dir, &err)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date) = self.date_of(&name.to_string_lossy()) else {
                continue;
            };
            if date >= cutoff {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %entry.path().display(), error = %err, "Failed to delete old audit log"),
            }
        }
        if removed > 0 {
            info!(removed, retention_days, "Deleted old audit logs");
        }
        Ok(removed)
    }

    /// Count entries in the last `days` daily files, today included.
    ///
    /// Missing files and unparseable lines are skipped.
    #[must_use]
    pub fn stats(&self, days: u32) -> AuditStats {
        let today = self.clock.now().date_naive();
        let mut stats = AuditStats {
            days,
            ..AuditStats::default()
        };

        for offset in 0..days {
            let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            let Ok(file) = File::open(self.path_for(date)) else {
                continue;
            };
            for line in BufReader::new(file).lines().map_while(Result::ok) {
                let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) else {
                    continue;
                };
                stats.total_calls += 1;
                if entry.high_risk {
                    stats.high_risk_calls += 1;
                }
                *stats.by_tool.entry(entry.tool).or_default() += 1;
            }
        }
        stats
    }
}

impl AuditSink for FileAuditLogger {
    fn log_tool_call(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry).map_err(|e| AuditError::Io {
            path: self.dir.display().to_string(),
            message: e.to_string(),
        })?;
        line.push('\n');

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let today = self.clock.now().date_naive();
        if current.as_ref().map(|log| log.date) != Some(today) {
            let file = self.open(today)?;
            *current = Some(OpenLog { date: today, file });
        }

        let Some(log) = current.as_mut() else {
            return Ok(());
        };
        let path = self.path_for(log.date);
        log.file
            .write_all(line.as_bytes())
            .and_then(|()| log.file.flush())
            .map_err(|e| Self::io_error(&path, &e))
    }
}

impl std::fmt::Debug for FileAuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditLogger")
            .field("dir", &self.dir)
            .field("stem", &self.stem)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}
