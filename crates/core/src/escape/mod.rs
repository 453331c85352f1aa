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

//! Escaping-call detection and safety verification
//!
//! Split in three: the [`policy`] decides which calls count as escaping,
//! the [`regions`] scanner locates them and their enclosing statements,
//! and the [`verifier`] classifies each region and reports violations.

pub mod policy;
pub mod regions;
pub mod verifier;

pub use policy::EscapePolicy;
pub use regions::{find_escaping_calls, EscapingCall};
pub use verifier::{check_escaping_call, check_unmarked_escapes, verify, verify_unmarked, verify_uop, Diagnostic};
