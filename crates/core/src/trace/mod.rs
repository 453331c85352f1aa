// Uopgen
// Copyright (C) 2025 The Uopgen Authors

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Execution-trace log parsing
//!
//! A trace file starts with a header of `# label: text` comment lines
//! terminated by a blank line, followed by one event per line as
//! space-separated `timestamp eventcode [arg]` fields. Comment lines between
//! events annotate the next event. `start time` and `end time` header values
//! hold epoch seconds and are rendered as UTC timestamps on parse.
//!
//! Event timestamps are decimal epoch seconds; they are held as integer
//! nanoseconds so elapsed times between events stay exact.

pub mod report;

pub use report::{
    format_elapsed, render_chronological, render_raw, render_summary, summarize, StatEntry,
    TraceSummary,
};

use chrono::{TimeZone, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from locating or parsing a trace log
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("no trace files found under '{path}'")]
    NoTraceFiles { path: String },
}

/// Event kind, matching the emitting runtime's event enum by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    Init,
    Fini,
    Enter,
    Exit,
    LoopEnter,
    LoopExit,
    LoopException,
    LoopError,
    Op,
}

/// All event kinds in wire order
pub const EVENT_KINDS: [EventKind; 9] = [
    EventKind::Init,
    EventKind::Fini,
    EventKind::Enter,
    EventKind::Exit,
    EventKind::LoopEnter,
    EventKind::LoopExit,
    EventKind::LoopException,
    EventKind::LoopError,
    EventKind::Op,
];

impl EventKind {
    /// Decode a wire event code
    pub fn from_code(code: u8) -> Option<Self> {
        EVENT_KINDS.get(code as usize).copied()
    }

    /// The wire event code
    pub fn code(self) -> u8 {
        match self {
            EventKind::Init => 0,
            EventKind::Fini => 1,
            EventKind::Enter => 2,
            EventKind::Exit => 3,
            EventKind::LoopEnter => 4,
            EventKind::LoopExit => 5,
            EventKind::LoopException => 6,
            EventKind::LoopError => 7,
            EventKind::Op => 8,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Fini => "fini",
            EventKind::Enter => "enter",
            EventKind::Exit => "exit",
            EventKind::LoopEnter => "loop enter",
            EventKind::LoopExit => "loop exit",
            EventKind::LoopException => "loop exception",
            EventKind::LoopError => "loop error",
            EventKind::Op => "op",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One comment line, either structured `label: text` info or free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Info { label: String, text: String },
    Comment(String),
}

/// One timestamped event with the comment lines that preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    /// Timestamp field exactly as written in the log
    pub raw_timestamp: String,
    /// Nanoseconds since the epoch
    pub timestamp_ns: i64,
    pub kind: EventKind,
    /// Set only for `op` events
    pub opcode: Option<u8>,
    pub annotations: Vec<Annotation>,
}

/// A parsed trace: header block plus the event stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceLog {
    pub header: Vec<Annotation>,
    pub events: Vec<TraceEvent>,
}

/// Parse a trace log from text
pub fn parse_str(source: &str) -> Result<TraceLog, TraceError> {
    let mut header = Vec::new();
    let mut events: Vec<TraceEvent> = Vec::new();
    let mut pending: Vec<Annotation> = Vec::new();
    let mut in_header = true;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            if in_header {
                in_header = false;
                continue;
            }
            return Err(TraceError::Malformed {
                line: line_no,
                message: "blank line in the event stream".to_string(),
            });
        }
        if in_header {
            if !line.starts_with('#') {
                return Err(TraceError::Malformed {
                    line: line_no,
                    message: format!("header line does not start with '#': {line}"),
                });
            }
            header.push(parse_annotation(line, line_no)?);
            continue;
        }
        if line.starts_with('#') {
            pending.push(parse_annotation(line, line_no)?);
            continue;
        }
        events.push(parse_event(line, line_no, std::mem::take(&mut pending))?);
    }

    tracing::debug!(events = events.len(), "parsed trace log");
    Ok(TraceLog { header, events })
}

/// Load and parse a trace log from a file or directory
pub fn load<P: AsRef<Path>>(path: P) -> Result<TraceLog, TraceError> {
    let resolved = resolve_trace_path(path)?;
    let text = std::fs::read_to_string(&resolved).map_err(|source| TraceError::Io {
        path: resolved.display().to_string(),
        source,
    })?;
    parse_str(&text)
}

/// Resolve a trace path: a file is taken as given, a directory yields its
/// newest `*.trace` by timestamp-suffixed file name.
pub fn resolve_trace_path<P: AsRef<Path>>(path: P) -> Result<PathBuf, TraceError> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let entries = std::fs::read_dir(path).map_err(|source| TraceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|source| TraceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let candidate = entry.path();
        let Some(name) = candidate.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".trace") {
            continue;
        }
        let ranked = (timestamp_suffix(name).unwrap_or(0), candidate);
        if best.as_ref().map(|b| *b < ranked).unwrap_or(true) {
            best = Some(ranked);
        }
    }
    match best {
        Some((_, found)) => {
            tracing::debug!(path = %found.display(), "resolved trace file");
            Ok(found)
        }
        None => Err(TraceError::NoTraceFiles {
            path: path.display().to_string(),
        }),
    }
}

/// Extract the numeric suffix from a `name-1234.trace` file name
fn timestamp_suffix(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(".trace")?;
    let (before, digits) = stem.rsplit_once('-')?;
    if before.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn parse_annotation(line: &str, line_no: usize) -> Result<Annotation, TraceError> {
    let comment = line[1..].trim();
    let Some((label, text)) = comment.split_once(':') else {
        return Ok(Annotation::Comment(line.to_string()));
    };
    let label = label.trim();
    let text = text.trim();
    if label.is_empty() || text.is_empty() {
        return Ok(Annotation::Comment(line.to_string()));
    }
    let text = if label == "start time" || label == "end time" {
        render_epoch(text, line_no)?
    } else {
        text.to_string()
    };
    Ok(Annotation::Info {
        label: label.to_string(),
        text,
    })
}

fn render_epoch(text: &str, line_no: usize) -> Result<String, TraceError> {
    let first = text.split_whitespace().next().unwrap_or(text);
    let seconds: i64 = first.parse().map_err(|_| TraceError::Malformed {
        line: line_no,
        message: format!("'{first}' is not an epoch timestamp"),
    })?;
    let stamp = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| TraceError::Malformed {
            line: line_no,
            message: format!("epoch timestamp {seconds} is out of range"),
        })?;
    Ok(format!("{} UTC", stamp.format("%Y-%m-%d %H:%M:%S")))
}

fn parse_event(
    line: &str,
    line_no: usize,
    annotations: Vec<Annotation>,
) -> Result<TraceEvent, TraceError> {
    let malformed = |message: String| TraceError::Malformed {
        line: line_no,
        message,
    };
    let mut fields = line.split_whitespace();
    let ts_text = fields.next().unwrap_or_default();
    let code_text = fields
        .next()
        .ok_or_else(|| malformed("event line has no event code".to_string()))?;
    let arg_text = fields.next();
    if fields.next().is_some() {
        return Err(malformed(format!("too many fields in event line '{line}'")));
    }

    let timestamp_ns = parse_timestamp_ns(ts_text)
        .ok_or_else(|| malformed(format!("timestamp '{ts_text}' is not a decimal timestamp")))?;
    let code: u8 = code_text
        .parse()
        .map_err(|_| malformed(format!("event code '{code_text}' is not an integer")))?;
    let kind = EventKind::from_code(code)
        .ok_or_else(|| malformed(format!("unknown event code {code}")))?;

    let opcode = match (kind, arg_text) {
        (EventKind::Op, Some(text)) => Some(
            text.parse::<u8>()
                .map_err(|_| malformed(format!("opcode '{text}' is not a small integer")))?,
        ),
        (EventKind::Op, None) => return Err(malformed("op event has no opcode".to_string())),
        (_, Some(text)) => {
            return Err(malformed(format!(
                "unexpected argument '{text}' on a {} event",
                kind.name()
            )))
        }
        (_, None) => None,
    };

    Ok(TraceEvent {
        raw_timestamp: ts_text.to_string(),
        timestamp_ns,
        kind,
        opcode,
        annotations,
    })
}

/// Parse decimal epoch seconds into nanoseconds, truncating past nine
/// fractional digits.
fn parse_timestamp_ns(text: &str) -> Option<i64> {
    let (secs, frac) = match text.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (text, ""),
    };
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = secs.parse().ok()?;
    let mut nanos: i64 = 0;
    for (i, digit) in frac.bytes().take(9).enumerate() {
        nanos += ((digit - b'0') as i64) * 10_i64.pow(8 - i as u32);
    }
    secs.checked_mul(1_000_000_000)?.checked_add(nanos)
}
