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

//! `uopgen targets`: generate the computed-goto jump table

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use uopgen_core::targets::{
    write_targets, write_unknowns, OpcodeMap, DEFAULT_TARGETS_OUTPUT, DEFAULT_UNKNOWNS_OUTPUT,
};

/// Arguments for the targets subcommand
#[derive(Args, Debug)]
pub struct TargetsArgs {
    /// Opcode map as a JSON object of name to number
    #[arg(value_name = "OPMAP")]
    pub opmap: PathBuf,

    /// Emit the unknown-opcode case block instead of the jump table
    #[arg(long)]
    pub unknowns: bool,

    /// Where to write the output (defaults depend on the mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Load the opcode map and write the requested artifact
pub fn run_targets(args: &TargetsArgs) -> Result<u8> {
    let map = OpcodeMap::load(&args.opmap)?;

    let (content, default_name, message) = if args.unknowns {
        (write_unknowns(&map), DEFAULT_UNKNOWNS_OUTPUT, "Unknown opcodes written into")
    } else {
        (write_targets(&map), DEFAULT_TARGETS_OUTPUT, "Jump table written into")
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_name));

    std::fs::write(&output, content)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    println!("{message} {}", output.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_opmap(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("opmap.json");
        std::fs::write(&path, r#"{"LOAD_FAST": 0, "RETURN_VALUE": 83}"#).unwrap();
        path
    }

    #[test]
    fn test_writes_the_jump_table() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("opcode_targets.h");
        let args = TargetsArgs {
            opmap: write_opmap(dir.path()),
            unknowns: false,
            output: Some(output.clone()),
        };
        assert_eq!(run_targets(&args).unwrap(), 0);

        let table = std::fs::read_to_string(&output).unwrap();
        assert!(table.starts_with("static void *opcode_targets[256] = {\n"));
        assert!(table.contains("&&TARGET_RETURN_VALUE"));
    }

    #[test]
    fn test_writes_the_unknown_opcode_block() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("unknown_opcodes.h");
        let args = TargetsArgs {
            opmap: write_opmap(dir.path()),
            unknowns: true,
            output: Some(output.clone()),
        };
        assert_eq!(run_targets(&args).unwrap(), 0);

        let block = std::fs::read_to_string(&output).unwrap();
        assert_eq!(block.matches("UNKNOWN_OPCODE(").count(), 254);
    }

    #[test]
    fn test_bad_opcode_map_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opmap.json");
        std::fs::write(&path, "not json").unwrap();
        let args = TargetsArgs {
            opmap: path,
            unknowns: false,
            output: Some(dir.path().join("out.h")),
        };
        assert!(run_targets(&args).is_err());
    }
}
