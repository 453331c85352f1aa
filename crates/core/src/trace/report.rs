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

//! Trace report rendering
//!
//! Three views over a parsed [`TraceLog`]: a chronological listing with the
//! elapsed time to the next event, a normalized raw passthrough, and an
//! aggregated summary with counts and mean elapsed times per event kind,
//! opcode, and function.

use super::{Annotation, EventKind, TraceEvent, TraceLog};
use crate::targets::OpcodeMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Format elapsed nanoseconds as microseconds with thousands separators and
/// one truncated decimal digit.
pub fn format_elapsed(elapsed_ns: i64) -> String {
    let elapsed_ns = elapsed_ns.max(0);
    let whole = elapsed_ns / 1_000;
    let dec = (elapsed_ns % 1_000) / 100;
    format!("{:>5}.{} µs", group_thousands(whole as u64), dec)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn aligned_annotation(entry: &Annotation) -> String {
    match entry {
        Annotation::Info { label, text } => format!("# {:<20} {}", format!("{label}:"), text),
        Annotation::Comment(line) => line.clone(),
    }
}

fn normalized_annotation(entry: &Annotation) -> String {
    match entry {
        Annotation::Info { label, text } => format!("# {label}: {text}"),
        Annotation::Comment(line) => line.clone(),
    }
}

fn op_display(event: &TraceEvent, opmap: Option<&OpcodeMap>) -> String {
    match (event.kind, event.opcode) {
        (EventKind::Op, Some(op)) => {
            let name = opmap.and_then(|map| map.name_of(op)).unwrap_or("???");
            format!("{name} ({op})")
        }
        _ => String::new(),
    }
}

fn format_event_lines(
    event: &TraceEvent,
    elapsed_ns: Option<i64>,
    opmap: Option<&OpcodeMap>,
) -> Vec<String> {
    let elapsed = elapsed_ns.map(format_elapsed).unwrap_or_default();
    let data = op_display(event, opmap);
    let mut line = format!("{:<15} {:<15} {}", elapsed, event.kind.name(), data)
        .trim_end()
        .to_string();

    let mut out = Vec::new();
    if let Some((last, rest)) = event.annotations.split_last() {
        for entry in rest {
            out.push(aligned_annotation(entry));
        }
        match last {
            Annotation::Info { label, text } => {
                line = format!("{line:<50} # {label}: {text}");
            }
            Annotation::Comment(comment) => out.push(comment.clone()),
        }
    }
    out.push(line);
    out
}

/// Render the chronological view: the header info block, then one line per
/// event showing the elapsed time to the next event.
pub fn render_chronological(log: &TraceLog, opmap: Option<&OpcodeMap>) -> String {
    let div = "#".repeat(20);
    let mut lines: Vec<String> = log.header.iter().map(aligned_annotation).collect();
    lines.push(String::new());
    lines.push(div.clone());
    lines.push("# BEGIN TRACE".to_string());
    lines.push(div.clone());
    lines.push(String::new());

    for (i, event) in log.events.iter().enumerate() {
        let elapsed = log
            .events
            .get(i + 1)
            .map(|next| next.timestamp_ns - event.timestamp_ns);
        lines.extend(format_event_lines(event, elapsed, opmap));
    }
    if log.events.last().map(|e| e.kind) == Some(EventKind::Fini) {
        lines.push("fini".to_string());
    }

    lines.push(String::new());
    lines.push(div.clone());
    lines.push("# END TRACE".to_string());
    lines.push(div);
    lines.join("\n") + "\n"
}

/// Render the raw passthrough: normalized records, one per line
pub fn render_raw(log: &TraceLog) -> String {
    let mut lines: Vec<String> = log.header.iter().map(normalized_annotation).collect();
    lines.push(String::new());
    for event in &log.events {
        for entry in &event.annotations {
            lines.push(normalized_annotation(entry));
        }
        let mut line = format!("{} {}", event.raw_timestamp, event.kind.code());
        if let Some(op) = event.opcode {
            line.push_str(&format!(" {op}"));
        }
        lines.push(line);
    }
    lines.join("\n") + "\n"
}

/// Count and mean elapsed time for one summary key
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatEntry {
    pub count: u64,
    pub mean_elapsed_us: f64,
}

/// Aggregated trace statistics, keyed by event kind, opcode, and function
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceSummary {
    pub events: BTreeMap<String, StatEntry>,
    pub opcodes: BTreeMap<String, StatEntry>,
    pub functions: BTreeMap<String, StatEntry>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Acc {
    count: u64,
    sum_us: f64,
    samples: u64,
}

impl Acc {
    fn record(&mut self, elapsed_us: Option<f64>) {
        self.count += 1;
        if let Some(us) = elapsed_us {
            self.sum_us += us;
            self.samples += 1;
        }
    }

    fn entry(self) -> StatEntry {
        StatEntry {
            count: self.count,
            mean_elapsed_us: if self.samples == 0 {
                0.0
            } else {
                self.sum_us / self.samples as f64
            },
        }
    }
}

fn collect(accs: BTreeMap<String, Acc>) -> BTreeMap<String, StatEntry> {
    accs.into_iter().map(|(key, acc)| (key, acc.entry())).collect()
}

/// Aggregate a trace into per-event, per-opcode, and per-function statistics.
///
/// Function attribution comes from `func` annotations on `enter` events; each
/// `exit` closes the innermost open `enter`, and the function's elapsed time
/// spans the two. Enters with no `func` annotation, and exits with no open
/// enter, fall under `"?"`.
pub fn summarize(log: &TraceLog, opmap: Option<&OpcodeMap>) -> TraceSummary {
    let mut events: BTreeMap<String, Acc> = BTreeMap::new();
    let mut opcodes: BTreeMap<String, Acc> = BTreeMap::new();
    let mut functions: BTreeMap<String, Acc> = BTreeMap::new();
    let mut open: Vec<(String, i64)> = Vec::new();

    for (i, event) in log.events.iter().enumerate() {
        let elapsed_us = log
            .events
            .get(i + 1)
            .map(|next| (next.timestamp_ns - event.timestamp_ns) as f64 / 1_000.0);
        events
            .entry(event.kind.name().to_string())
            .or_default()
            .record(elapsed_us);

        if let (EventKind::Op, Some(op)) = (event.kind, event.opcode) {
            let key = opmap
                .and_then(|map| map.name_of(op))
                .map(str::to_string)
                .unwrap_or_else(|| op.to_string());
            opcodes.entry(key).or_default().record(elapsed_us);
        }

        match event.kind {
            EventKind::Enter => {
                let name = event
                    .annotations
                    .iter()
                    .find_map(|entry| match entry {
                        Annotation::Info { label, text } if label == "func" => Some(text.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "?".to_string());
                open.push((name, event.timestamp_ns));
            }
            EventKind::Exit => match open.pop() {
                Some((name, entered)) => {
                    let span_us = (event.timestamp_ns - entered) as f64 / 1_000.0;
                    functions.entry(name).or_default().record(Some(span_us));
                }
                None => functions.entry("?".to_string()).or_default().record(None),
            },
            _ => {}
        }
    }
    // Enters never closed by an exit still count, with no elapsed sample.
    for (name, _) in open {
        functions.entry(name).or_default().record(None);
    }

    TraceSummary {
        events: collect(events),
        opcodes: collect(opcodes),
        functions: collect(functions),
    }
}

/// Render a summary as an aligned text table
pub fn render_summary(summary: &TraceSummary) -> String {
    let mut lines = Vec::new();
    for (section, entries) in [
        ("events", &summary.events),
        ("opcodes", &summary.opcodes),
        ("functions", &summary.functions),
    ] {
        lines.push(format!("{section}:"));
        for (name, entry) in entries {
            lines.push(format!(
                "  {:<20} {:>8}  {}",
                name,
                entry.count,
                format_elapsed((entry.mean_elapsed_us * 1_000.0) as i64)
            ));
        }
    }
    lines.join("\n") + "\n"
}
