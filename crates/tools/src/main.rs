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

//! Uopgen CLI Tool
//!
//! Main entry point for the uopgen command-line interface.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use uopgen_tools::cli::init_logging;
use uopgen_tools::cli::metadata::{run_metadata, MetadataArgs};
use uopgen_tools::cli::targets::{run_targets, TargetsArgs};
use uopgen_tools::cli::trace::{run_trace, TraceArgs};
use uopgen_tools::cli::verify::{run_verify, VerifyArgs};

#[derive(Parser)]
#[command(name = "uopgen")]
#[command(about = "Analyzer and table generator for interpreter micro-op definitions")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check escaping-call safety in definition files
    Verify(VerifyArgs),
    /// Generate the uop metadata header
    Metadata(MetadataArgs),
    /// Generate the computed-goto jump table from an opcode map
    Targets(TargetsArgs),
    /// Render an execution trace log
    Trace(TraceArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Verify(args) => run_verify(args),
        Commands::Metadata(args) => run_metadata(args),
        Commands::Targets(args) => run_targets(args),
        Commands::Trace(args) => run_trace(args),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
