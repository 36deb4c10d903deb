//! Log sources: where navigation log records come from.
//!
//! Every source yields records parsed from `logcat -v epoch` lines:
//!
//! ```text
//!  1700000000.123456  1234  5678 I opkrspddist: 500
//! ```
//!
//! A source reports [`SourceEvent::Exhausted`] when its stream ends. The service then
//! closes it, waits the reconnect backoff and reopens it from the timestamp of the last
//! record it saw, so records are never replayed twice.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use navi_core::{LogRecord, NaviError, NaviResult};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Timestamp of the newest record seen, `(sec, nsec)`.
pub type ResumePoint = (i64, i64);

/// One read from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A parsed record.
    Record(LogRecord),
    /// A line that is not a log record; skipped by the service.
    Malformed(String),
    /// The stream ended; the source must be reopened.
    Exhausted,
}

/// A reopenable stream of log records.
#[async_trait]
pub trait LogSource: Send {
    /// Human-readable description for diagnostics.
    fn describe(&self) -> String;

    /// Open (or reopen) the stream, resuming after `resume` when given.
    ///
    /// Failing here is fatal for the service.
    async fn open(&mut self, resume: Option<ResumePoint>) -> NaviResult<()>;

    /// Wait for the next record. Must be cancel-safe.
    async fn next_event(&mut self) -> SourceEvent;

    /// Release the underlying stream.
    async fn close(&mut self);

    /// Whether reopening after exhaustion can yield new records.
    fn reopens(&self) -> bool {
        true
    }
}

/// Why a line is not a log record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Line ended before the named field.
    #[error("missing {0}")]
    MissingField(&'static str),
    /// A numeric field did not parse.
    #[error("invalid {field}: '{value}'")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
    /// No `": "` between tag and message.
    #[error("missing tag separator")]
    MissingTagSeparator,
}

/// Parse one `logcat -v epoch` line.
///
/// Fractional seconds may carry any number of digits; they are scaled to nanoseconds.
pub fn parse_epoch_line(line: &str, id: u64) -> Result<LogRecord, LineError> {
    let mut rest = line;

    let (sec, nsec) = parse_epoch_stamp(next_field(&mut rest, "timestamp")?)?;
    let pid = parse_number::<i32>("pid", next_field(&mut rest, "pid")?)?;
    let tid = parse_number::<i32>("tid", next_field(&mut rest, "tid")?)?;
    let priority_field = next_field(&mut rest, "priority")?;
    let mut chars = priority_field.chars();
    let priority = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(LineError::InvalidNumber {
                field: "priority",
                value: priority_field.to_string(),
            })
        }
    };

    let body = rest.trim_start();
    let (tag, message) = match body.split_once(": ") {
        Some(split) => split,
        None => body
            .strip_suffix(':')
            .map(|tag| (tag, ""))
            .ok_or(LineError::MissingTagSeparator)?,
    };

    Ok(LogRecord {
        id,
        sec,
        nsec,
        pid,
        tid,
        priority,
        tag: tag.trim_end().to_string(),
        message: message.to_string(),
    })
}

fn next_field<'a>(rest: &mut &'a str, name: &'static str) -> Result<&'a str, LineError> {
    let trimmed = rest.trim_start();
    let end = trimmed
        .find(char::is_whitespace)
        .ok_or(LineError::MissingField(name))?;
    let (value, tail) = trimmed.split_at(end);
    *rest = tail;
    Ok(value)
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, LineError> {
    value.parse().map_err(|_| LineError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_epoch_stamp(stamp: &str) -> Result<(i64, i64), LineError> {
    let (sec, frac) = stamp.split_once('.').unwrap_or((stamp, ""));
    let sec = parse_number::<i64>("timestamp", sec)?;
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LineError::InvalidNumber {
            field: "timestamp",
            value: stamp.to_string(),
        });
    }
    let digits: String = frac.chars().take(9).collect();
    let nsec = if digits.is_empty() {
        0
    } else {
        parse_number::<i64>("timestamp", &digits)? * 10_i64.pow(9 - digits.len() as u32)
    };
    Ok((sec, nsec))
}

/// Format a resume point for `logcat -T` in epoch form.
pub fn format_resume_point((sec, nsec): ResumePoint) -> String {
    format!("{}.{:06}", sec, nsec / 1_000)
}

/// Shared line reader: parsing, id assignment and resume filtering.
///
/// Lines are read as raw bytes and decoded lossily; logcat interleaves output from every
/// process on the device and not all of it is UTF-8.
///
/// `logcat -v epoch` prints microseconds only, so a record sharing the resume point's
/// microsecond is indistinguishable from the one already processed and is dropped
/// after a reopen.
struct LineReader {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    // Survives cancellation of `next_event` mid-line.
    buf: Vec<u8>,
    resume: Option<ResumePoint>,
}

impl LineReader {
    fn new(reader: Box<dyn AsyncBufRead + Send + Unpin>, resume: Option<ResumePoint>) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            resume,
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut bytes = std::mem::take(&mut self.buf);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn next_event(&mut self, next_id: &mut u64) -> SourceEvent {
        loop {
            let line = match self.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return SourceEvent::Exhausted,
                Err(e) => {
                    warn!(error = %e, "Log stream read failed");
                    return SourceEvent::Exhausted;
                }
            };

            let record = match parse_epoch_line(&line, *next_id) {
                Ok(record) => record,
                Err(e) => {
                    debug!(error = %e, line = %line, "Skipping non-record line");
                    return SourceEvent::Malformed(line);
                }
            };

            if let Some(resume) = self.resume {
                if (record.sec, record.nsec) <= resume {
                    continue;
                }
                self.resume = None;
            }

            *next_id += 1;
            return SourceEvent::Record(record);
        }
    }
}

/// Spawns `logcat` and reads its stdout.
pub struct LogcatSource {
    command: String,
    args: Vec<String>,
    child: Option<Child>,
    reader: Option<LineReader>,
    next_id: u64,
}

impl LogcatSource {
    /// Create a source running `command args...`.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            child: None,
            reader: None,
            next_id: 0,
        }
    }
}

#[async_trait]
impl LogSource for LogcatSource {
    fn describe(&self) -> String {
        format!("{} {}", self.command, self.args.join(" "))
    }

    async fn open(&mut self, resume: Option<ResumePoint>) -> NaviResult<()> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(point) = resume {
            command.arg("-T").arg(format_resume_point(point));
        }

        let mut child = command.spawn().map_err(|e| NaviError::SourceUnavailable {
            source_name: self.describe(),
            message: e.to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| NaviError::SourceUnavailable {
            source_name: self.describe(),
            message: "stdout not captured".to_string(),
        })?;

        info!(source = %self.describe(), ?resume, "Opened logcat");
        self.reader = Some(LineReader::new(Box::new(BufReader::new(stdout)), resume));
        self.child = Some(child);
        Ok(())
    }

    async fn next_event(&mut self) -> SourceEvent {
        match self.reader.as_mut() {
            Some(reader) => reader.next_event(&mut self.next_id).await,
            None => SourceEvent::Exhausted,
        }
    }

    async fn close(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "logcat already exited");
            }
        }
    }
}

/// Reads a captured log file, or stdin when no path is given.
pub struct FileSource {
    path: Option<PathBuf>,
    reader: Option<LineReader>,
    next_id: u64,
}

impl FileSource {
    /// Read `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            reader: None,
            next_id: 0,
        }
    }

    /// Read standard input.
    pub fn stdin() -> Self {
        Self {
            path: None,
            reader: None,
            next_id: 0,
        }
    }
}

#[async_trait]
impl LogSource for FileSource {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "stdin".to_string(),
        }
    }

    async fn open(&mut self, resume: Option<ResumePoint>) -> NaviResult<()> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = match &self.path {
            Some(path) => {
                let file = File::open(path).await.map_err(|e| NaviError::SourceUnavailable {
                    source_name: self.describe(),
                    message: e.to_string(),
                })?;
                Box::new(BufReader::new(file))
            }
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };
        debug!(source = %self.describe(), ?resume, "Opened log file");
        self.reader = Some(LineReader::new(reader, resume));
        Ok(())
    }

    async fn next_event(&mut self) -> SourceEvent {
        match self.reader.as_mut() {
            Some(reader) => reader.next_event(&mut self.next_id).await,
            None => SourceEvent::Exhausted,
        }
    }

    async fn close(&mut self) {
        self.reader = None;
    }

    // A closed stdin stays closed.
    fn reopens(&self) -> bool {
        self.path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_epoch_line() {
        let record =
            parse_epoch_line("  1700000000.123456  1234  5678 I opkrspddist: 500", 3).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.sec, 1_700_000_000);
        assert_eq!(record.nsec, 123_456_000);
        assert_eq!(record.pid, 1234);
        assert_eq!(record.tid, 5678);
        assert_eq!(record.priority, 'I');
        assert_eq!(record.tag, "opkrspddist");
        assert_eq!(record.message, "500");
    }

    #[test]
    fn test_parse_keeps_message_colons_and_trims_padded_tag() {
        let record = parse_epoch_line("5.1 1 2 D opkrsigntype   : 131: extra", 0).unwrap();
        assert_eq!(record.tag, "opkrsigntype");
        assert_eq!(record.message, "131: extra");
        assert_eq!(record.nsec, 100_000_000);
    }

    #[test]
    fn test_parse_empty_message() {
        let record = parse_epoch_line("5.000000001 1 2 W tag:", 0).unwrap();
        assert_eq!(record.tag, "tag");
        assert_eq!(record.message, "");
        assert_eq!(record.nsec, 1);
    }

    #[test]
    fn test_parse_rejects_non_records() {
        assert_eq!(
            parse_epoch_line("--------- beginning of main", 0),
            Err(LineError::InvalidNumber {
                field: "timestamp",
                value: "---------".into()
            })
        );
        assert_eq!(parse_epoch_line("", 0), Err(LineError::MissingField("timestamp")));
        assert_eq!(
            parse_epoch_line("5.0 1 2 I no separator here", 0),
            Err(LineError::MissingTagSeparator)
        );
        assert!(parse_epoch_line("5.0 x 2 I tag: 1", 0).is_err());
        assert!(parse_epoch_line("5.0 1 2 INFO tag: 1", 0).is_err());
    }

    #[test]
    fn test_format_resume_point() {
        assert_eq!(format_resume_point((1_700_000_000, 123_456_789)), "1700000000.123456");
        assert_eq!(format_resume_point((5, 0)), "5.000000");
    }

    #[tokio::test]
    async fn test_file_source_reads_until_exhausted() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "--------- beginning of main").unwrap();
        writeln!(file, "100.000000 1 2 I opkrspddist: 500").unwrap();
        writeln!(file, "101.000000 1 2 I opkrsigntype: 131").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::file(file.path());
        source.open(None).await.unwrap();
        assert!(matches!(source.next_event().await, SourceEvent::Malformed(_)));
        let SourceEvent::Record(first) = source.next_event().await else {
            panic!("expected record");
        };
        let SourceEvent::Record(second) = source.next_event().await else {
            panic!("expected record");
        };
        assert_eq!((first.id, second.id), (0, 1));
        assert_eq!(source.next_event().await, SourceEvent::Exhausted);
    }

    #[tokio::test]
    async fn test_reopen_resumes_after_last_record() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "100.000000 1 2 I opkrspddist: 500").unwrap();
        writeln!(file, "101.000000 1 2 I opkrsigntype: 131").unwrap();
        writeln!(file, "102.000000 1 2 I opkrspdlimit: 60").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::file(file.path());
        source.open(Some((101, 0))).await.unwrap();
        let SourceEvent::Record(record) = source.next_event().await else {
            panic!("expected record");
        };
        assert_eq!(record.tag, "opkrspdlimit");
        assert_eq!(source.next_event().await, SourceEvent::Exhausted);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_skipped_not_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"100.000000 1 2 I opkrspddist: 500\n").unwrap();
        file.write_all(b"\xff\xfe\n").unwrap();
        file.write_all(b"100.500000 1 2 I other: caf\xe9\r\n").unwrap();
        file.write_all(b"101.000000 1 2 I opkrsigntype: 131").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::file(file.path());
        source.open(None).await.unwrap();
        assert!(matches!(source.next_event().await, SourceEvent::Record(_)));
        assert!(matches!(source.next_event().await, SourceEvent::Malformed(_)));
        let SourceEvent::Record(lossy) = source.next_event().await else {
            panic!("expected record");
        };
        assert_eq!(lossy.message, "caf\u{fffd}");
        let SourceEvent::Record(sign) = source.next_event().await else {
            panic!("expected record");
        };
        assert_eq!((sign.tag.as_str(), sign.message.as_str()), ("opkrsigntype", "131"));
        assert_eq!(source.next_event().await, SourceEvent::Exhausted);
    }

    #[tokio::test]
    async fn test_reopen_drops_records_sharing_the_resume_microsecond() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "100.000001 1 2 I opkrspddist: 500").unwrap();
        writeln!(file, "100.000001 1 2 I opkrsigntype: 131").unwrap();
        writeln!(file, "100.000002 1 2 I opkrspdlimit: 60").unwrap();
        file.flush().unwrap();

        let mut source = FileSource::file(file.path());
        source.open(Some((100, 1_000))).await.unwrap();
        let SourceEvent::Record(record) = source.next_event().await else {
            panic!("expected record");
        };
        assert_eq!(record.tag, "opkrspdlimit");
    }

    #[test]
    fn test_stdin_does_not_reopen() {
        assert!(!FileSource::stdin().reopens());
        assert!(FileSource::file("/tmp/capture.log").reopens());
        assert!(LogcatSource::new("logcat", vec![]).reopens());
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let mut source = FileSource::file("/nonexistent/capture.log");
        let err = source.open(None).await.unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_missing_logcat_binary_is_fatal() {
        let mut source = LogcatSource::new("/nonexistent/logcat", vec!["-v".into(), "epoch".into()]);
        let err = source.open(None).await.unwrap_err();
        assert!(matches!(err, NaviError::SourceUnavailable { .. }));
    }
}
