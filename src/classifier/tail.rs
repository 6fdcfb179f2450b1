//! # LogTail: incremental reader of the agent log.
//!
//! Keeps the byte offset of the last consumed newline. Each call to
//! [`LogTail::read_new_lines`] seeks there and reads only the appended bytes.
//!
//! ## Rules
//! - A missing file yields no lines (the agent may not have created it yet).
//! - A trailing line without `\n` is buffered until its newline arrives.
//! - The file counts as rotated (the gateway restarted and recreated it) when it
//!   is shorter than the offset or its first bytes changed; reading restarts at zero.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::error::SupervisorError;

/// Bytes from the start of the file kept to recognize a recreated log.
const HEAD_LEN: usize = 64;

pub struct LogTail {
    path: PathBuf,
    /// Bytes of the file already read.
    offset: u64,
    /// Complete lines returned since the last rewind.
    lines: usize,
    /// Bytes after the last newline.
    partial: Vec<u8>,
    /// First bytes of the file as first read.
    head: Vec<u8>,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            lines: 0,
            partial: Vec::new(),
            head: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete lines consumed so far.
    pub fn cursor(&self) -> usize {
        self.lines
    }

    /// Bytes of the file consumed so far, including a buffered partial line.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Forgets the read position.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.lines = 0;
        self.partial.clear();
        self.head.clear();
    }

    /// Deletes the log file (if any) and resets the cursor.
    pub async fn discard(&mut self) -> Result<(), SupervisorError> {
        self.reset();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Returns complete lines appended since the previous call.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, SupervisorError> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        self.read_appended(&mut file).await.map_err(|e| self.io_error(e))
    }

    async fn read_appended(&mut self, file: &mut File) -> io::Result<Vec<String>> {
        let len = file.metadata().await?.len();
        if self.rotated(file, len).await? {
            debug!(
                path = %self.path.display(),
                offset = self.offset,
                len,
                lines = self.lines,
                "agent log rotated, rewinding"
            );
            self.reset();
        }
        if len <= self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut fresh = Vec::new();
        file.take(len - self.offset).read_to_end(&mut fresh).await?;
        if self.offset == 0 {
            self.head = fresh[..fresh.len().min(HEAD_LEN)].to_vec();
        }
        self.offset += fresh.len() as u64;
        self.partial.extend_from_slice(&fresh);

        let Some(end) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(end + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        let lines: Vec<String> = String::from_utf8_lossy(&complete)
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        self.lines += lines.len();
        Ok(lines)
    }

    async fn rotated(&self, file: &mut File, len: u64) -> io::Result<bool> {
        if len < self.offset {
            return Ok(true);
        }
        if self.head.is_empty() {
            return Ok(false);
        }
        let mut head = vec![0; self.head.len()];
        file.seek(SeekFrom::Start(0)).await?;
        file.read_exact(&mut head).await?;
        Ok(head != self.head)
    }

    fn io_error(&self, source: io::Error) -> SupervisorError {
        SupervisorError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
