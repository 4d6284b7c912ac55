//! Streaming parser for bulk operation result files.
//!
//! A result file is JSON Lines. Nested connections are flattened: each child
//! object is written on its own line after its parent and carries the
//! parent's id in a linkage field (`__parentId`). The parser rebuilds the
//! hierarchy from line order alone; a child is attached to the most recent
//! parent line, and the linkage value itself is never compared.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};
use crate::types::ReportRecord;

/// Field that marks a line as a child of the preceding parent.
pub const DEFAULT_LINKAGE_FIELD: &str = "__parentId";

/// Offending lines are truncated to this many bytes in errors.
const MAX_ERROR_LINE: usize = 200;

/// Incremental JSONL parser that groups child lines under their parent.
#[derive(Debug)]
pub struct JsonlParser<P, C> {
    linkage_field: String,
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already known to hold no newline.
    scanned: usize,
    line_number: usize,
    records: Vec<ReportRecord<P, C>>,
}

impl<P, C> Default for JsonlParser<P, C>
where
    P: DeserializeOwned,
    C: DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> JsonlParser<P, C>
where
    P: DeserializeOwned,
    C: DeserializeOwned,
{
    /// A parser using the default linkage field.
    pub fn new() -> Self {
        Self::with_linkage_field(DEFAULT_LINKAGE_FIELD)
    }

    /// A parser using a custom linkage field.
    pub fn with_linkage_field(field: impl Into<String>) -> Self {
        Self {
            linkage_field: field.into(),
            buffer: Vec::new(),
            scanned: 0,
            line_number: 0,
            records: Vec::new(),
        }
    }

    /// Parse a complete document.
    pub fn parse_str(input: &str) -> Result<Vec<ReportRecord<P, C>>> {
        let mut parser = Self::new();
        parser.feed(input.as_bytes())?;
        parser.finish()
    }

    /// Feed a chunk of the body. Lines may span chunk boundaries.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            let line = self.buffer[start..end].to_vec();
            start = end + 1;
            search_from = start;
            if let Err(err) = self.push_bytes(&line) {
                self.buffer.drain(..start);
                self.scanned = 0;
                return Err(err);
            }
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        Ok(())
    }

    /// Process one line.
    pub fn push_line(&mut self, line: &str) -> Result<()> {
        self.line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let mut value: Value = serde_json::from_str(trimmed)
            .map_err(|e| self.parse_error(trimmed, e.to_string()))?;

        let is_child = value
            .as_object_mut()
            .and_then(|object| object.remove(&self.linkage_field))
            .is_some_and(|linkage| !linkage.is_null());

        if is_child {
            let child: C = serde_json::from_value(value).map_err(|e| self.parse_error(trimmed, e.to_string()))?;
            match self.records.last_mut() {
                Some(record) => record.children.push(child),
                None => return Err(self.parse_error(trimmed, "child line before any parent".to_string())),
            }
        } else {
            let parent: P = serde_json::from_value(value).map_err(|e| self.parse_error(trimmed, e.to_string()))?;
            self.records.push(ReportRecord {
                parent,
                children: Vec::new(),
            });
        }

        Ok(())
    }

    /// Flush a trailing unterminated line and return every record.
    pub fn finish(mut self) -> Result<Vec<ReportRecord<P, C>>> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            self.push_bytes(&line)?;
        }
        Ok(self.records)
    }

    /// Lines seen so far, including blank ones.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Records completed so far.
    pub fn records(&self) -> &[ReportRecord<P, C>] {
        &self.records
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.push_line(line),
            Err(e) => {
                self.line_number += 1;
                Err(self.parse_error(&String::from_utf8_lossy(bytes), e.to_string()))
            }
        }
    }

    fn parse_error(&self, line: &str, message: String) -> Error {
        let mut line = line.to_string();
        if line.len() > MAX_ERROR_LINE {
            let mut cut = MAX_ERROR_LINE;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
        }
        Error::new(ErrorKind::Parse {
            line_number: self.line_number,
            line,
            message,
        })
    }
}
