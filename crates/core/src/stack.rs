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

//! Symbolic stack-effect calculus
//!
//! Stack depths are not always integers: a variadic item contributes a
//! size expression such as `oparg`. A [`StackOffset`] keeps the popped and
//! pushed sizes symbolic and renders the net effect as a C expression only
//! at the end. Also derives the register-caching depth variants used by
//! the metadata tables.

use crate::analysis::{StackItem, Uop, SPILL_OR_RELOAD};

/// Net stack movement as two symbolic term lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackOffset {
    popped: Vec<String>,
    pushed: Vec<String>,
}

/// Element count an item contributes to the stack
fn item_size(item: &StackItem) -> String {
    item.size.clone().unwrap_or_else(|| "1".to_string())
}

/// Wrap an expression in parens unless it is a single name or number
fn maybe_parenthesize(expr: &str) -> String {
    if expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        expr.to_string()
    } else {
        format!("({})", expr)
    }
}

impl StackOffset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record an item leaving the stack
    pub fn pop(&mut self, item: &StackItem) {
        self.popped.push(item_size(item));
    }

    /// Record an item entering the stack
    pub fn push(&mut self, item: &StackItem) {
        self.pushed.push(item_size(item));
    }

    /// The opposite movement: pops become pushes and vice versa
    pub fn negated(&self) -> Self {
        Self {
            popped: self.pushed.clone(),
            pushed: self.popped.clone(),
        }
    }

    /// Cancel terms that appear on both sides
    pub fn simplify(&mut self) {
        let mut i = 0;
        while i < self.popped.len() {
            if let Some(j) = self.pushed.iter().position(|term| *term == self.popped[i]) {
                self.popped.remove(i);
                self.pushed.remove(j);
            } else {
                i += 1;
            }
        }
    }

    /// Render the net offset as a C expression
    ///
    /// Integer terms are summed; symbolic terms are appended with their
    /// sign. A pure symbolic result drops the integer zero, so a variadic
    /// pop renders as `-oparg`, not `0 - oparg`.
    pub fn as_c_expr(&self) -> String {
        let mut simplified = self.clone();
        simplified.simplify();
        let mut int_offset: i64 = 0;
        let mut symbol_offset = String::new();
        for term in &simplified.popped {
            match term.parse::<i64>() {
                Ok(value) => int_offset -= value,
                Err(_) => {
                    symbol_offset.push_str(" - ");
                    symbol_offset.push_str(&maybe_parenthesize(term));
                }
            }
        }
        for term in &simplified.pushed {
            match term.parse::<i64>() {
                Ok(value) => int_offset += value,
                Err(_) => {
                    symbol_offset.push_str(" + ");
                    symbol_offset.push_str(&maybe_parenthesize(term));
                }
            }
        }
        let mut expr = if !symbol_offset.is_empty() && int_offset == 0 {
            symbol_offset
        } else {
            format!("{}{}", int_offset, symbol_offset)
        };
        if let Some(rest) = expr.strip_prefix(" + ") {
            expr = rest.to_string();
        } else if let Some(rest) = expr.strip_prefix(" - ") {
            expr = format!("-{}", rest);
        }
        expr
    }
}

/// Number of values a uop pops at entry, as a C expression
///
/// Inputs are walked top-to-bottom; the walk stops at the first peek item
/// since everything below it stays on the stack.
pub fn popped_count(uop: &Uop) -> String {
    let mut offset = StackOffset::empty();
    for item in uop.stack.inputs.iter().rev() {
        if item.peek {
            break;
        }
        offset.pop(item);
    }
    offset.negated().as_c_expr()
}

/// Name of one register-caching variant
pub fn variant_name(name: &str, inputs: u8, outputs: u8) -> String {
    format!("{}_r{}{}", name, inputs, outputs)
}

/// Register-caching (entry, exit) depth pairs for a uop
///
/// `entry` counts stack slots held in registers when the variant starts,
/// `exit` when it ends. A variant with fewer cached slots than the uop
/// consumes runs in memory form and caches nothing on exit; variadic
/// items pin the corresponding side to depth zero. Pairs whose exit depth
/// would exceed the register file are dropped.
pub fn cache_depths(uop: &Uop) -> Vec<(u8, u8)> {
    let inputs = &uop.stack.inputs;
    let outputs = &uop.stack.outputs;
    let variadic_inputs = inputs.iter().any(StackItem::is_array);
    let variadic_outputs = outputs.iter().any(StackItem::is_array);
    let consumed = inputs.len() as i32;
    let produced = outputs.len() as i32;
    let max_entry = if variadic_inputs { 0 } else { 3 };
    let mut depths = Vec::new();
    for entry in 0..=max_entry {
        let exit = if entry < consumed || variadic_outputs {
            0
        } else {
            entry - consumed + produced
        };
        if exit > 3 {
            continue;
        }
        depths.push((entry as u8, exit as u8));
    }
    depths
}

/// The 4-slot caching table row for one uop
#[derive(Debug, Clone, PartialEq)]
pub struct CachingInfo {
    pub min_input: u8,
    pub max_input: u8,
    pub delta: i8,
    /// Variant name per entry depth, `"0"` where no variant exists
    pub variants: [String; 4],
}

impl CachingInfo {
    /// Build the row from explicit depth pairs
    ///
    /// Returns `None` for the spill/reload pseudo-uop, which gets its own
    /// 4x4 transition table, and when there are no variants at all.
    pub fn build(name: &str, depths: &[(u8, u8)]) -> Option<Self> {
        if name == SPILL_OR_RELOAD || depths.is_empty() {
            return None;
        }
        let mut variants: [String; 4] = std::array::from_fn(|_| "0".to_string());
        let mut delta: i8 = 0;
        for &(input, output) in depths {
            delta = output as i8 - input as i8;
            variants[input as usize] = variant_name(name, input, output);
        }
        let mut min_input = 4u8;
        let mut max_input = 0u8;
        for (i, variant) in variants.iter().enumerate() {
            if variant != "0" {
                max_input = i as u8;
                if (i as u8) < min_input {
                    min_input = i as u8;
                }
            }
        }
        Some(Self {
            min_input,
            max_input,
            delta,
            variants,
        })
    }

    /// Render as a C struct initializer
    pub fn to_c(&self) -> String {
        format!(
            "{{ {}, {}, {}, {{ {} }} }}",
            self.min_input,
            self.max_input,
            self.delta,
            self.variants.join(", ")
        )
    }
}
