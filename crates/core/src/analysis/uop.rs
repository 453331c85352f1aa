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

//! In-memory model of parsed instruction handlers

use crate::lexer::Token;
use std::collections::HashMap;

/// Placeholder item name for stack slots a handler does not touch
pub const UNUSED: &str = "unused";

/// The spill/reload pseudo-uop, excluded from per-uop cache-info generation
pub const SPILL_OR_RELOAD: &str = "_SPILL_OR_RELOAD";

/// One declared stack value in a handler's effect
#[derive(Debug, Clone, PartialEq)]
pub struct StackItem {
    /// Variable name bound in the handler body
    pub name: String,
    /// Symbolic element count for variadic items (`args[oparg]`)
    pub size: Option<String>,
    /// Read but left on the stack
    pub peek: bool,
}

impl StackItem {
    /// Create a plain single-slot item
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            peek: false,
        }
    }

    /// Create a variadic item with a symbolic element count
    pub fn with_size(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: Some(size.into()),
            peek: false,
        }
    }

    /// Check if this item spans a variable number of slots
    pub fn is_array(&self) -> bool {
        self.size.is_some()
    }
}

/// One inline-cache entry declared alongside the inputs (`counter/1`)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Cache field name, `unused` for padding
    pub name: String,
    /// Width in code units
    pub size: u8,
}

impl CacheEntry {
    /// Create a cache entry
    pub fn new(name: impl Into<String>, size: u8) -> Self {
        Self { name: name.into(), size }
    }
}

/// Declared stack effect: inputs and outputs, each listed bottom-to-top
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackEffect {
    pub inputs: Vec<StackItem>,
    pub outputs: Vec<StackItem>,
}

impl StackEffect {
    /// Build an effect, deriving peek marks
    ///
    /// Inputs and outputs that agree in name and shape from the bottom up
    /// form the peek prefix: those slots are read in place, not popped and
    /// re-pushed. Derivation stops at the first mismatch.
    pub fn new(mut inputs: Vec<StackItem>, mut outputs: Vec<StackItem>) -> Self {
        let shared = inputs.len().min(outputs.len());
        for i in 0..shared {
            if inputs[i].name == outputs[i].name && inputs[i].size == outputs[i].size {
                inputs[i].peek = true;
                outputs[i].peek = true;
            } else {
                break;
            }
        }
        Self { inputs, outputs }
    }
}

/// Static properties of a uop: annotated, or derived from its body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// Execution tier restriction, when annotated (`tier1`/`tier2`)
    pub tier: Option<u8>,
    /// Number of replicated specializations (`replicate(N)`)
    pub replicated: u32,
    /// Annotated side-effect free
    pub pure_uop: bool,
    /// Annotated as superseded by a hand-written replacement
    pub replaced: bool,
    /// Body references `oparg`
    pub uses_oparg: bool,
    /// Body adjusts the instruction pointer (`JUMPBY`)
    pub jumps: bool,
    /// Body may deoptimize (`DEOPT_IF`)
    pub deopts: bool,
    /// Body may take the error exit (`ERROR_IF`)
    pub errors: bool,
    /// Body may take a side exit (`EXIT_IF`)
    pub side_exits: bool,
    /// Body makes at least one escaping call
    pub escapes: bool,
}

/// One parsed instruction handler
///
/// Constructed once per source definition and read-only afterwards. The body
/// is exactly one brace-delimited block: `body[0]` is the opening brace and
/// braces are balanced, both enforced by the parser.
#[derive(Debug, Clone)]
pub struct Uop {
    /// Unique handler name
    pub name: String,
    /// Declared stack effect
    pub stack: StackEffect,
    /// Declared inline-cache entries
    pub caches: Vec<CacheEntry>,
    /// Annotated and derived properties
    pub properties: Properties,
    /// The handler body tokens, outer braces included
    pub body: Vec<Token>,
}

impl Uop {
    /// Create a uop
    pub fn new(name: impl Into<String>, stack: StackEffect, caches: Vec<CacheEntry>, properties: Properties, body: Vec<Token>) -> Self {
        Self {
            name: name.into(),
            stack,
            caches,
            properties,
            body,
        }
    }

    /// Check if this is a super-instruction (addresses multiple operand slots)
    pub fn is_super(&self) -> bool {
        self.body.iter().any(|t| t.is_identifier_named("oparg1"))
    }

    /// Check if this uop participates in generated tables
    pub fn is_viable(&self) -> bool {
        !self.properties.replaced && !self.name.contains("INSTRUMENTED") && self.named_cache_entries() <= 1
    }

    /// Count cache entries that carry a real name
    pub fn named_cache_entries(&self) -> usize {
        self.caches.iter().filter(|c| c.name != UNUSED).count()
    }
}

/// Aggregate of every uop parsed in one run
///
/// Built once by the parser, then treated as immutable by all downstream
/// passes. Iteration follows declaration order; table emission sorts by name
/// where the artifact requires it.
#[derive(Debug, Default)]
pub struct Analysis {
    uops: Vec<Uop>,
    by_name: HashMap<String, usize>,
}

impl Analysis {
    /// Create an empty analysis
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a uop name is already defined
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Look up a uop by name
    pub fn get(&self, name: &str) -> Option<&Uop> {
        self.by_name.get(name).map(|&i| &self.uops[i])
    }

    /// Add a uop; the caller has already rejected duplicates
    pub(crate) fn insert(&mut self, uop: Uop) {
        debug_assert!(!self.contains(&uop.name));
        self.by_name.insert(uop.name.clone(), self.uops.len());
        self.uops.push(uop);
    }

    /// Iterate uops in declaration order
    pub fn uops(&self) -> impl Iterator<Item = &Uop> {
        self.uops.iter()
    }

    /// Uops sorted by name, for name-keyed table emission
    pub fn sorted_by_name(&self) -> Vec<&Uop> {
        let mut sorted: Vec<&Uop> = self.uops.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted
    }

    /// Number of uops parsed
    pub fn len(&self) -> usize {
        self.uops.len()
    }

    /// Check if no uops were parsed
    pub fn is_empty(&self) -> bool {
        self.uops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn body(src: &str) -> Vec<Token> {
        tokenize(src, "test.c").unwrap()
    }

    fn plain_uop(name: &str, src: &str) -> Uop {
        Uop::new(name, StackEffect::default(), Vec::new(), Properties::default(), body(src))
    }

    #[test]
    fn test_peek_prefix_derivation() {
        let effect = StackEffect::new(vec![StackItem::new("a"), StackItem::new("b")], vec![StackItem::new("a")]);
        assert!(effect.inputs[0].peek);
        assert!(!effect.inputs[1].peek);
        assert!(effect.outputs[0].peek);
    }

    #[test]
    fn test_peek_stops_at_first_mismatch() {
        let effect = StackEffect::new(
            vec![StackItem::new("x"), StackItem::new("y"), StackItem::new("z")],
            vec![StackItem::new("x"), StackItem::new("res"), StackItem::new("z")],
        );
        assert!(effect.inputs[0].peek);
        assert!(!effect.inputs[1].peek);
        // A later name match does not resume the prefix.
        assert!(!effect.inputs[2].peek);
    }

    #[test]
    fn test_peek_requires_matching_shape() {
        let effect = StackEffect::new(vec![StackItem::with_size("args", "oparg")], vec![StackItem::new("args")]);
        assert!(!effect.inputs[0].peek);
        assert!(!effect.outputs[0].peek);
    }

    #[test]
    fn test_super_detection() {
        assert!(plain_uop("_LOAD_FAST_LOAD_FAST", "{ value = locals[oparg1]; }").is_super());
        assert!(!plain_uop("_LOAD_FAST", "{ value = locals[oparg]; }").is_super());
    }

    #[test]
    fn test_viability() {
        assert!(plain_uop("_BINARY_OP", "{ x; }").is_viable());
        assert!(!plain_uop("_INSTRUMENTED_CALL", "{ x; }").is_viable());

        let mut replaced = plain_uop("_CHECK_PERIODIC", "{ x; }");
        replaced.properties.replaced = true;
        assert!(!replaced.is_viable());

        let mut cached = plain_uop("_SPECIALIZE_TO_BOOL", "{ x; }");
        cached.caches = vec![CacheEntry::new("counter", 1), CacheEntry::new("version", 2)];
        assert!(!cached.is_viable());

        cached.caches[1].name = UNUSED.to_string();
        assert!(cached.is_viable());
    }

    #[test]
    fn test_analysis_ordering_and_lookup() {
        let mut analysis = Analysis::new();
        analysis.insert(plain_uop("_POP_TOP", "{ }"));
        analysis.insert(plain_uop("_GUARD_BOTH_INT", "{ }"));

        assert_eq!(analysis.len(), 2);
        assert!(analysis.contains("_POP_TOP"));
        assert!(analysis.get("_GUARD_BOTH_INT").is_some());
        assert!(analysis.get("_MISSING").is_none());

        let declared: Vec<&str> = analysis.uops().map(|u| u.name.as_str()).collect();
        assert_eq!(declared, vec!["_POP_TOP", "_GUARD_BOTH_INT"]);

        let sorted: Vec<&str> = analysis.sorted_by_name().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(sorted, vec!["_GUARD_BOTH_INT", "_POP_TOP"]);
    }
}
