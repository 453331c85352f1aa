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

//! Uopgen Core Library
//!
//! This crate analyzes micro-operation definitions written in a C-like
//! instruction DSL. It lexes and parses definition files into an [`analysis::Analysis`],
//! verifies that escaping calls inside handler bodies are safe with respect to
//! the in-memory stack, and generates the metadata header and jump tables the
//! interpreter build consumes. A standalone trace reader renders execution
//! logs produced by the instrumented interpreter.

pub mod analysis;
pub mod error;
pub mod escape;
pub mod lexer;
pub mod metadata;
pub mod stack;
pub mod targets;
pub mod trace;

// Re-export the types most callers need directly.
pub use analysis::{analyze_files, analyze_source, Analysis, Uop};
pub use error::{AnalysisError, AnalysisResult};
pub use escape::{verify, verify_unmarked, Diagnostic, EscapePolicy};
