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

//! `uopgen verify`: escaping-call safety checks over definition files

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use uopgen_core::analysis::DEFAULT_INPUT;
use uopgen_core::{analyze_files, verify, verify_unmarked, EscapePolicy};

/// Arguments for the verify subcommand
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Definition files to check
    #[arg(value_name = "INPUT", default_value = DEFAULT_INPUT)]
    pub inputs: Vec<PathBuf>,

    /// Also flag escaping calls not wrapped in the escaping-call marker
    #[arg(long)]
    pub unmarked: bool,
}

/// Run the safety checks; exit 0 when clean, 1 when any finding surfaced
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let policy = EscapePolicy::new();
    let analysis = analyze_files(&args.inputs, &policy)?;

    let mut found = verify(&analysis, &policy)?;
    if args.unmarked {
        found.extend(verify_unmarked(&analysis, &policy));
    }

    for diagnostic in &found {
        println!("{diagnostic}");
    }
    if found.is_empty() {
        tracing::info!(uops = analysis.len(), "verification passed");
        Ok(0)
    } else {
        tracing::warn!(findings = found.len(), "verification failed");
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(path: &std::path::Path, unmarked: bool) -> VerifyArgs {
        VerifyArgs {
            inputs: vec![path.to_path_buf()],
            unmarked,
        }
    }

    #[test]
    fn test_unsafe_definitions_exit_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.c");
        std::fs::write(
            &path,
            "op(_T, (a -- )) {\n    if (c) {\n        Py_DECREF(a);\n        helper(a);\n    }\n}\n",
        )
        .unwrap();
        assert_eq!(run_verify(&args_for(&path, false)).unwrap(), 1);
    }

    #[test]
    fn test_safe_definitions_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.c");
        std::fs::write(&path, "op(_T, (a -- )) {\n    SYNC_SP();\n    helper(a);\n}\n").unwrap();
        assert_eq!(run_verify(&args_for(&path, false)).unwrap(), 0);
    }

    #[test]
    fn test_unmarked_scan_finds_bare_escaping_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defs.c");
        // Clean under the region rules; the call itself is still unmarked.
        std::fs::write(&path, "op(_T, (a -- )) {\n    res = helper(a);\n}\n").unwrap();
        assert_eq!(run_verify(&args_for(&path, false)).unwrap(), 0);
        assert_eq!(run_verify(&args_for(&path, true)).unwrap(), 1);
    }

    #[test]
    fn test_missing_input_is_a_hard_error() {
        let args = VerifyArgs {
            inputs: vec![PathBuf::from("/nonexistent/defs.c")],
            unmarked: false,
        };
        assert!(run_verify(&args).is_err());
    }
}
