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

//! `uopgen trace`: render an execution trace log

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use uopgen_core::targets::OpcodeMap;
use uopgen_core::trace;

/// Rendering mode for a trace log
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceMode {
    /// One line per event with the elapsed time to the next
    Chrono,
    /// Normalized passthrough of the parsed records
    Raw,
    /// Aggregated counts and mean elapsed times
    Summary,
}

/// Arguments for the trace subcommand
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Trace file, or a directory holding timestamped `*.trace` files
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Rendering mode
    #[arg(long, value_enum, default_value_t = TraceMode::Chrono)]
    pub mode: TraceMode,

    /// Opcode map for resolving `op` event names
    #[arg(long, value_name = "JSON")]
    pub opmap: Option<PathBuf>,

    /// Emit the summary as JSON (summary mode only)
    #[arg(long)]
    pub json: bool,
}

/// Resolve, parse, and render the trace
pub fn run_trace(args: &TraceArgs) -> Result<u8> {
    let opmap = match &args.opmap {
        Some(path) => Some(OpcodeMap::load(path)?),
        None => None,
    };
    let resolved = trace::resolve_trace_path(&args.path)?;
    if !args.json {
        println!("reading from {}", resolved.display());
        println!();
    }
    let log = trace::load(&resolved)?;

    match args.mode {
        TraceMode::Chrono => print!("{}", trace::render_chronological(&log, opmap.as_ref())),
        TraceMode::Raw => print!("{}", trace::render_raw(&log)),
        TraceMode::Summary => {
            let summary = trace::summarize(&log, opmap.as_ref());
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", trace::render_summary(&summary));
            }
        }
    }
    Ok(0)
}
