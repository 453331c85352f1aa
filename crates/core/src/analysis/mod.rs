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

//! Instruction-definition analysis
//!
//! The [`uop`] module holds the in-memory model; the [`parser`] builds it
//! from definition source. An [`Analysis`] is constructed once per run and
//! read-only afterwards: every downstream pass (stack calculus, escape
//! verification, table emission) walks the same aggregate.

pub mod parser;
pub mod uop;

pub use parser::{analyze_files, analyze_source, Parser, DEFAULT_INPUT};
pub use uop::{Analysis, CacheEntry, Properties, StackEffect, StackItem, Uop, SPILL_OR_RELOAD, UNUSED};
