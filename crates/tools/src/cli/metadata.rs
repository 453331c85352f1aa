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

//! `uopgen metadata`: generate the uop metadata header

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use uopgen_core::analysis::DEFAULT_INPUT;
use uopgen_core::metadata::{write_metadata, DEFAULT_OUTPUT};
use uopgen_core::{analyze_files, EscapePolicy};

/// Arguments for the metadata subcommand
#[derive(Args, Debug)]
pub struct MetadataArgs {
    /// Definition files to analyze
    #[arg(value_name = "INPUT", default_value = DEFAULT_INPUT)]
    pub inputs: Vec<PathBuf>,

    /// Where to write the generated header
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

/// Analyze the inputs and write the metadata header
pub fn run_metadata(args: &MetadataArgs) -> Result<u8> {
    let policy = EscapePolicy::new();
    let analysis = analyze_files(&args.inputs, &policy)?;

    let input_names: Vec<String> = args.inputs.iter().map(|p| p.display().to_string()).collect();
    let header = write_metadata(&analysis, &input_names);
    std::fs::write(&args.output, header)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;

    tracing::info!(uops = analysis.len(), output = %args.output.display(), "metadata header written");
    Ok(0)
}
