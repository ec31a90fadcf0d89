//! Daily rotating file sink
//!
//! Records are appended to `<path>/<name>.<YYYYMMDD>`, one file per local
//! calendar day. `<path>/<name>` is kept as a symlink to the file currently
//! being written, and at most `keep` dated files survive rotation.

use crate::core::error::{HookError, Result};
use crate::core::formatter::Formatter;
use crate::core::log_level::LogLevel;
use crate::core::log_record::LogRecord;
use crate::core::settings::Settings;
use crate::core::sink::Sink;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const HOOK_TYPE: &str = "file";

/// Settings every file hook must provide
pub const REQUIRED_SETTINGS: &[&str] = &["name"];

/// Dated files kept when `keep` is not set
pub const DEFAULT_KEEP: usize = 7;

/// Levels written when `levels` is not set
pub const DEFAULT_FILE_LEVELS: [LogLevel; 2] = [LogLevel::Info, LogLevel::Error];

const DATE_SUFFIX: &str = "%Y%m%d";
const GZ_EXTENSION: &str = "gz";

/// Resolved settings for a file sink
#[derive(Debug, Clone, PartialEq)]
pub struct FileHookConfig {
    /// Directory holding the log files; the working directory when unset
    pub path: Option<PathBuf>,
    pub name: String,
    /// Dated files to keep, `0` keeps everything
    pub keep: usize,
    pub levels: Vec<LogLevel>,
    /// Gzip a day's file once the next day starts
    pub compress: bool,
}

impl FileHookConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: None,
            name: name.into(),
            keep: DEFAULT_KEEP,
            levels: DEFAULT_FILE_LEVELS.to_vec(),
            compress: false,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: &[LogLevel]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Read `name`, `path`, `keep`, `levels` and `compress`.
    ///
    /// # Errors
    ///
    /// - `MissingSetting` without `name`
    /// - `PathNotFound` if `path` is given but is not an existing directory
    /// - `Config` for a non-integer `keep` or an unknown level name
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self> {
        settings.require(REQUIRED_SETTINGS)?;
        let mut config = Self::new(settings.required("name")?);

        if let Some(path) = settings.get("path") {
            if !Path::new(path).is_dir() {
                return Err(HookError::path_not_found(path));
            }
            config.path = Some(PathBuf::from(path));
        }

        if let Some(keep) = settings.parse_int::<usize>("keep")? {
            config.keep = keep;
        }

        if let Some(raw) = settings.get("levels") {
            config.levels = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<LogLevel>()
                        .map_err(|e| HookError::config(settings.hook(), e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
        }

        if let Some(compress) = settings.flag("compress") {
            config.compress = compress;
        }

        Ok(config)
    }

    fn dir(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Stable path of the link to the active file
    pub fn link_path(&self) -> PathBuf {
        self.dir().join(&self.name)
    }

    pub fn dated_path(&self, date: NaiveDate) -> PathBuf {
        self.dir()
            .join(format!("{}.{}", self.name, date.format(DATE_SUFFIX)))
    }
}

/// File sink rotating once per local day.
///
/// The file is opened lazily on the first accepted record. The day is taken
/// from the record's own timestamp, so a record always lands in the file of
/// the day it was created.
///
/// # Examples
///
/// ```no_run
/// use log_hooks::hooks::file::{FileHookConfig, FileSink};
/// use log_hooks::TextFormatter;
/// use std::sync::Arc;
///
/// let config = FileHookConfig::new("app.log")
///     .with_path("/var/log/app")
///     .with_keep(14)
///     .with_compression(true);
/// let sink = FileSink::new(config, Arc::new(TextFormatter::new()));
/// ```
pub struct FileSink {
    config: FileHookConfig,
    formatter: Arc<dyn Formatter>,
    writer: Option<BufWriter<File>>,
    current_date: Option<NaiveDate>,
}

impl FileSink {
    pub fn new(config: FileHookConfig, formatter: Arc<dyn Formatter>) -> Self {
        Self {
            config,
            formatter,
            writer: None,
            current_date: None,
        }
    }

    pub fn config(&self) -> &FileHookConfig {
        &self.config
    }

    /// Date of the file currently open, if any
    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current_date
    }

    fn open(&mut self, date: NaiveDate) -> Result<()> {
        let path = self.config.dated_path(date);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                HookError::delivery(HOOK_TYPE, format!("failed to open '{}': {}", path.display(), e))
            })?;

        self.writer = Some(BufWriter::new(file));
        self.current_date = Some(date);
        self.update_link(&path);
        Ok(())
    }

    /// Close the current day's file and start `date`'s
    fn rotate(&mut self, date: NaiveDate) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                HookError::rotation(
                    self.config.link_path().display().to_string(),
                    format!("failed to flush before rotation: {}", e),
                )
            })?;
        }

        if let Some(previous) = self.current_date.take() {
            if self.config.compress {
                let path = self.config.dated_path(previous);
                if let Err(e) = compress_file(&path) {
                    tracing::warn!(
                        target: "log_hooks",
                        path = %path.display(),
                        error = %e,
                        "failed to compress rotated log file"
                    );
                }
            }
        }

        self.open(date)?;
        self.prune();
        Ok(())
    }

    #[cfg(unix)]
    fn update_link(&self, target: &Path) {
        let link = self.config.link_path();
        if fs::symlink_metadata(&link).is_ok() {
            if let Err(e) = fs::remove_file(&link) {
                tracing::warn!(
                    target: "log_hooks",
                    link = %link.display(),
                    error = %e,
                    "failed to replace log file link"
                );
                return;
            }
        }

        // Relative target so the directory can be moved as a whole
        let target = target.file_name().map(Path::new).unwrap_or(target);
        if let Err(e) = std::os::unix::fs::symlink(target, &link) {
            tracing::warn!(
                target: "log_hooks",
                link = %link.display(),
                error = %e,
                "failed to create log file link"
            );
        }
    }

    #[cfg(not(unix))]
    fn update_link(&self, _target: &Path) {}

    /// Dated files of this sink, newest first
    fn generations(&self) -> Vec<(NaiveDate, PathBuf)> {
        let prefix = format!("{}.", self.config.name);
        let entries = match fs::read_dir(self.config.dir()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    target: "log_hooks",
                    dir = %self.config.dir().display(),
                    error = %e,
                    "failed to list log directory"
                );
                return Vec::new();
            }
        };

        let mut found: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let suffix = file_name.to_str()?.strip_prefix(&prefix)?;
                let stamp = suffix
                    .strip_suffix(&format!(".{}", GZ_EXTENSION))
                    .unwrap_or(suffix);
                let date = NaiveDate::parse_from_str(stamp, DATE_SUFFIX).ok()?;
                Some((date, entry.path()))
            })
            .collect();

        found.sort_by(|a, b| b.0.cmp(&a.0));
        found
    }

    fn prune(&self) {
        if self.config.keep == 0 {
            return;
        }

        let mut kept_dates = Vec::new();
        for (date, path) in self.generations() {
            if !kept_dates.contains(&date) {
                kept_dates.push(date);
            }
            if kept_dates.len() <= self.config.keep {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(
                    target: "log_hooks",
                    path = %path.display(),
                    error = %e,
                    "failed to remove expired log file"
                );
            }
        }
    }
}

impl Sink for FileSink {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        let date = record.timestamp.with_timezone(&Local).date_naive();

        match self.current_date {
            None => {
                self.open(date)?;
                self.prune();
            }
            // Older records (e.g. stamped just before midnight) stay in the current file
            Some(current) if date > current => {
                if let Err(e) = self.rotate(date) {
                    tracing::warn!(
                        target: "log_hooks",
                        error = %e,
                        "log rotation failed, continuing with a fresh file"
                    );
                    if self.writer.is_none() {
                        self.open(date)?;
                    }
                }
            }
            Some(_) => {}
        }

        let bytes = self.formatter.format(record)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| HookError::delivery(HOOK_TYPE, "writer not initialized"))?;
        writer.write_all(&bytes).map_err(|e| {
            HookError::delivery(HOOK_TYPE, format!("failed to write log record: {}", e))
        })?;
        // Each record is flushed so the file is readable while the day runs
        writer.flush().map_err(|e| {
            HookError::delivery(HOOK_TYPE, format!("failed to flush: {}", e))
        })
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        HOOK_TYPE
    }

    fn levels(&self) -> &[LogLevel] {
        &self.config.levels
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

/// Gzip `path` to `path.gz`, removing the original only once the archive is
/// complete.
///
/// An existing `path.gz` is kept and the new data is appended to it as an
/// additional gzip member.
fn compress_file(path: &Path) -> Result<()> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(format!(".{}", GZ_EXTENSION));
    let gz_path = PathBuf::from(gz_name);

    let mut tmp_name = gz_path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let mut output = BufWriter::with_capacity(64 * 1024, File::create(&tmp_path)?);
        if gz_path.exists() {
            io::copy(&mut File::open(&gz_path)?, &mut output)?;
        }
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&buffer[..read])?;
        }
        encoder.finish()?.flush()?;
        fs::rename(&tmp_path, &gz_path)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(HookError::rotation(path.display().to_string(), e.to_string()));
    }

    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(
            target: "log_hooks",
            path = %path.display(),
            error = %e,
            "compressed log file but could not remove the original"
        );
    }
    Ok(())
}
