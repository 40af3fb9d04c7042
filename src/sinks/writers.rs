use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{AppError, AppResult, SinkError};
use crate::metrics::Completion;

use super::format::{RESPONSE_DELIMITER, timing_line};

const TIMING_LOG: &str = "timing log";
const RESPONSE_LOG: &str = "response log";

/// How a log file is opened.
///
/// The process that owns the run truncates; worker processes append to the
/// file their supervisor already created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Truncate,
    Append,
}

async fn open_file(kind: &'static str, path: &Path, mode: OpenMode) -> AppResult<File> {
    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Truncate => options.write(true).create(true).truncate(true),
        OpenMode::Append => options.append(true).create(true),
    };
    options.open(path).await.map_err(|source| {
        AppError::sink(SinkError::Open {
            kind,
            path: path.to_path_buf(),
            source,
        })
    })
}

fn write_error(kind: &'static str) -> impl FnOnce(std::io::Error) -> AppError {
    move |source| AppError::sink(SinkError::Write { kind, source })
}

#[derive(Debug)]
pub struct TimingLog {
    writer: BufWriter<File>,
}

impl TimingLog {
    /// Opens the timing log.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub async fn open(path: &Path, mode: OpenMode) -> AppResult<Self> {
        let file = open_file(TIMING_LOG, path, mode).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn record(&mut self, completion: &Completion) -> AppResult<()> {
        self.writer
            .write_all(timing_line(completion).as_bytes())
            .await
            .map_err(write_error(TIMING_LOG))
    }

    /// Flushes buffered records.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush fails.
    pub async fn flush(&mut self) -> AppResult<()> {
        self.writer.flush().await.map_err(write_error(TIMING_LOG))
    }
}

#[derive(Debug)]
pub struct ResponseLog {
    writer: BufWriter<File>,
}

impl ResponseLog {
    /// Opens the response log.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub async fn open(path: &Path, mode: OpenMode) -> AppResult<Self> {
        let file = open_file(RESPONSE_LOG, path, mode).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends a body (possibly empty) followed by the delimiter line.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub async fn record(&mut self, body: Option<&[u8]>) -> AppResult<()> {
        if let Some(body) = body {
            self.writer
                .write_all(body)
                .await
                .map_err(write_error(RESPONSE_LOG))?;
        }
        self.writer
            .write_all(RESPONSE_DELIMITER)
            .await
            .map_err(write_error(RESPONSE_LOG))
    }

    /// Flushes buffered bodies.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush fails.
    pub async fn flush(&mut self) -> AppResult<()> {
        self.writer.flush().await.map_err(write_error(RESPONSE_LOG))
    }
}

/// Paths of the optional per-request logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkPaths {
    pub timing_log: Option<PathBuf>,
    pub response_log: Option<PathBuf>,
}

/// The optional per-request logs of one process.
#[derive(Debug, Default)]
pub struct RunSinks {
    timing: Option<TimingLog>,
    responses: Option<ResponseLog>,
}

impl RunSinks {
    /// Opens every configured log. Called before any request goes out so an
    /// unopenable path is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be opened.
    pub async fn open(paths: &SinkPaths, mode: OpenMode) -> AppResult<Self> {
        let timing = match paths.timing_log.as_deref() {
            Some(path) => Some(TimingLog::open(path, mode).await?),
            None => None,
        };
        let responses = match paths.response_log.as_deref() {
            Some(path) => Some(ResponseLog::open(path, mode).await?),
            None => None,
        };
        Ok(Self { timing, responses })
    }

    /// Whether runners need to keep response bodies.
    #[must_use]
    pub fn wants_bodies(&self) -> bool {
        self.responses.is_some()
    }

    /// Writes a completion to every open log.
    ///
    /// # Errors
    ///
    /// Returns an error when a write fails.
    pub async fn record(&mut self, completion: &Completion) -> AppResult<()> {
        if let Some(timing) = self.timing.as_mut() {
            timing.record(completion).await?;
        }
        if let Some(responses) = self.responses.as_mut() {
            responses.record(completion.body.as_deref()).await?;
        }
        Ok(())
    }

    /// Flushes every open log.
    ///
    /// # Errors
    ///
    /// Returns an error when a flush fails.
    pub async fn flush(&mut self) -> AppResult<()> {
        if let Some(timing) = self.timing.as_mut() {
            timing.flush().await?;
        }
        if let Some(responses) = self.responses.as_mut() {
            responses.flush().await?;
        }
        Ok(())
    }
}
