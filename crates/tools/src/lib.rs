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

//! Uopgen Tools Library
//!
//! This crate provides the `uopgen` command-line interface over the core
//! analyzer: safety verification, metadata header generation, jump-table
//! generation, and trace rendering.

pub mod cli;

// Re-export the command entry points for embedding and tests.
pub use cli::metadata::{run_metadata, MetadataArgs};
pub use cli::targets::{run_targets, TargetsArgs};
pub use cli::trace::{run_trace, TraceArgs, TraceMode};
pub use cli::verify::{run_verify, VerifyArgs};
