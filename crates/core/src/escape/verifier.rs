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

//! Safety classification of escaping-call regions
//!
//! An escaping call may run arbitrary code, including code that reallocates
//! the evaluation stack. A region around such a call is safe only if the
//! stack was synchronized before the region begins and not dirtied again
//! afterwards. These checks are syntactic and conservative: they track
//! marker identifiers and output-variable writes, not real dataflow.
//!
//! Findings are accumulated, never thrown. A malformed body is the only
//! fatal condition; everything else is a [`Diagnostic`] so one run surfaces
//! every problem in the batch.

use crate::analysis::{Analysis, Uop};
use crate::error::AnalysisResult;
use crate::escape::policy::EscapePolicy;
use crate::escape::regions::{find_escaping_calls, EscapingCall};
use crate::lexer::{Token, TokenKind};
use std::fmt;

/// A single verification finding, attributed to a source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl Diagnostic {
    /// Attribute a finding to the token that triggered it
    pub fn at_token(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: token.file.clone(),
            line: token.line,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.file, self.line)
    }
}

/// Whether the stack is synchronized when control reaches the region
///
/// A sync marker anywhere before `region.start` tentatively marks the
/// region safe. A later write to one of the uop's declared output
/// variables revokes that: the flushed stack no longer reflects the
/// pending result.
fn is_region_synced(region: &EscapingCall<'_>, policy: &EscapePolicy) -> bool {
    let uop = region.uop;
    let mut synced = false;
    for i in 0..region.start {
        let tkn = &uop.body[i];
        if !tkn.is_identifier() {
            continue;
        }
        if policy.is_sync_marker(&tkn.text) {
            synced = true;
        } else if synced
            && uop.stack.outputs.iter().any(|out| out.name == tkn.text)
            && matches!(uop.body.get(i + 1), Some(next) if next.kind == TokenKind::Equals)
        {
            synced = false;
        }
    }
    synced
}

/// Check one escaping-call region, returning a diagnostic per violation
///
/// A uop with no stack inputs is vacuously safe: nothing has been consumed
/// from the stack, so nothing can be invalidated. Otherwise an unsynced
/// region must not contain a `goto`, a flow-control marker, or a
/// reference-release call anywhere strictly inside it.
pub fn check_escaping_call(region: &EscapingCall<'_>, policy: &EscapePolicy) -> Vec<Diagnostic> {
    let uop = region.uop;
    if uop.stack.inputs.is_empty() {
        return Vec::new();
    }
    if is_region_synced(region, policy) {
        return Vec::new();
    }
    let mut diagnostics = Vec::new();
    for tkn in &uop.body[region.start + 1..region.end] {
        if tkn.kind == TokenKind::Goto {
            diagnostics.push(Diagnostic::at_token(tkn, format!("`goto` in escaping {}", region)));
        } else if tkn.is_identifier() {
            if policy.is_flow_control(&tkn.text) {
                diagnostics.push(Diagnostic::at_token(tkn, format!("Exiting flow control in escaping {}", region)));
            }
            if policy.is_decref(&tkn.text) {
                diagnostics.push(Diagnostic::at_token(tkn, format!("DECREF in escaping {}", region)));
            }
        }
    }
    diagnostics
}

/// Verify every escaping-call region of one uop
pub fn verify_uop(uop: &Uop, policy: &EscapePolicy) -> AnalysisResult<Vec<Diagnostic>> {
    let regions = find_escaping_calls(uop, policy)?;
    let mut diagnostics = Vec::new();
    for region in &regions {
        diagnostics.extend(check_escaping_call(region, policy));
    }
    if !diagnostics.is_empty() {
        tracing::debug!(uop = %uop.name, findings = diagnostics.len(), "unsafe escaping calls");
    }
    Ok(diagnostics)
}

/// Verify a whole analysis, accumulating findings across all uops
pub fn verify(analysis: &Analysis, policy: &EscapePolicy) -> AnalysisResult<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for uop in analysis.uops() {
        diagnostics.extend(verify_uop(uop, policy)?);
    }
    Ok(diagnostics)
}

/// Scan the arguments of an `ESCAPING_CALL(...)` marker for violations
///
/// Returns the index of the closing paren so the caller can skip the
/// argument tokens; the marker vouches for everything inside it, except
/// jumps and releases which are never allowed there.
fn check_marked_call_args(uop: &Uop, open: usize, policy: &EscapePolicy, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut parens = 1;
    let mut i = open + 1;
    while i < uop.body.len() {
        let tkn = &uop.body[i];
        match tkn.kind {
            TokenKind::LParen => parens += 1,
            TokenKind::RParen => {
                parens -= 1;
                if parens == 0 {
                    return i;
                }
            }
            TokenKind::Goto => diagnostics.push(Diagnostic::at_token(tkn, "`goto` in 'ESCAPING_CALL'")),
            TokenKind::Identifier => {
                if policy.is_flow_control(&tkn.text) {
                    diagnostics.push(Diagnostic::at_token(tkn, "Exiting flow control in 'ESCAPING_CALL'"));
                }
                if policy.is_decref(&tkn.text) {
                    diagnostics.push(Diagnostic::at_token(tkn, "DECREF in 'ESCAPING_CALL'"));
                }
            }
            _ => {}
        }
        i += 1;
    }
    uop.body.len().saturating_sub(1)
}

/// Report escaping calls that are not wrapped in an `ESCAPING_CALL` marker
///
/// A hygiene pass, independent of stack-safety classification: every call
/// classified as escaping by the policy must be marked explicitly. Calls
/// inside a marker's argument list are vouched for and skipped.
pub fn check_unmarked_escapes(uop: &Uop, policy: &EscapePolicy) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut depth: i32 = -1;
    let mut i = 0;
    while i < uop.body.len() {
        let tkn = &uop.body[i];
        match tkn.kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => depth -= 1,
            TokenKind::Identifier => {
                if matches!(uop.body.get(i + 1), Some(next) if next.kind == TokenKind::LParen) {
                    if tkn.text == "ESCAPING_CALL" {
                        i = check_marked_call_args(uop, i + 1, policy, &mut diagnostics);
                    } else if policy.is_escaping(&tkn.text) {
                        diagnostics.push(Diagnostic::at_token(
                            tkn,
                            format!("Unmarked escaping function '{}' at depth {}", tkn.text, depth),
                        ));
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    diagnostics
}

/// Run the unmarked-escape scan over a whole analysis
pub fn verify_unmarked(analysis: &Analysis, policy: &EscapePolicy) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for uop in analysis.uops() {
        diagnostics.extend(check_unmarked_escapes(uop, policy));
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Properties, StackEffect, StackItem};
    use crate::lexer::tokenize;

    fn uop(src: &str, inputs: &[&str], outputs: &[&str]) -> Uop {
        let body = tokenize(src, "test.c").unwrap();
        let stack = StackEffect::new(
            inputs.iter().copied().map(StackItem::new).collect(),
            outputs.iter().copied().map(StackItem::new).collect(),
        );
        Uop::new("_TEST_UOP", stack, Vec::new(), Properties::default(), body)
    }

    fn diagnostics(src: &str, inputs: &[&str], outputs: &[&str]) -> Vec<Diagnostic> {
        verify_uop(&uop(src, inputs, outputs), &EscapePolicy::new()).unwrap()
    }

    #[test]
    fn test_no_inputs_is_vacuously_safe() {
        let found = diagnostics("{ if (c) { foo(); goto error; } }", &[], &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_unsynced_goto_is_reported() {
        let found = diagnostics("{ if (c) { foo(); goto error; } }", &["value"], &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].to_string(),
            "`goto` in escaping call to 'foo' in '_TEST_UOP' at test.c:1"
        );
    }

    #[test]
    fn test_unsynced_flow_control_is_reported() {
        let found = diagnostics("{ if (c) { ERROR_IF(true, error); foo(); } }", &["value"], &[]);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("Exiting flow control in escaping call to 'foo'"));
    }

    #[test]
    fn test_unsynced_decref_is_reported() {
        let found = diagnostics("{ if (c) { Py_DECREF(v); foo(); } }", &["value"], &[]);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("DECREF in escaping call to 'foo'"));
    }

    #[test]
    fn test_sync_marker_makes_region_safe() {
        let found = diagnostics("{ SYNC_SP(); if (c) { foo(); goto error; } }", &["value"], &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_decref_inputs_counts_as_sync() {
        let found = diagnostics("{ DECREF_INPUTS(); if (c) { foo(); goto error; } }", &["value"], &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_output_write_after_sync_revokes_safety() {
        let found = diagnostics(
            "{ SYNC_SP(); res = NULL; if (c) { foo(); goto error; } }",
            &["value"],
            &["res"],
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("`goto`"));
    }

    #[test]
    fn test_non_output_write_after_sync_keeps_safety() {
        let found = diagnostics(
            "{ SYNC_SP(); tmp = NULL; if (c) { foo(); goto error; } }",
            &["value"],
            &["res"],
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_output_read_after_sync_keeps_safety() {
        // Only a write revokes; a bare mention of the output does not.
        let found = diagnostics(
            "{ SYNC_SP(); use(res); if (c) { foo(); goto error; } }",
            &["value"],
            &["res"],
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_marked_call_in_unsynced_region() {
        // One region around the call inside the marker; the marker identifier
        // itself is the single flow-control violation. All on one line, so
        // the finding points at the line of the enclosing `if`.
        let src = "{ if (x) { ESCAPING_CALL(foo()); } }";
        let u = uop(src, &["value"], &[]);
        let found = verify_uop(&u, &EscapePolicy::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].message.starts_with("Exiting flow control"));
        assert_eq!(found[0].line, u.body[1].line);
    }

    #[test]
    fn test_tokens_outside_region_not_reported() {
        let found = diagnostics("{ if (c) { foo(); } goto error; }", &["value"], &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_findings_accumulate_across_regions() {
        let found = diagnostics(
            "{ if (a) { foo(); goto error; } if (b) { bar(); Py_DECREF(v); } }",
            &["value"],
            &[],
        );
        assert_eq!(found.len(), 2);
        assert!(found[0].message.starts_with("`goto`"));
        assert!(found[1].message.starts_with("DECREF"));
    }

    #[test]
    fn test_verifier_is_idempotent() {
        let u = uop("{ if (c) { foo(); goto error; } }", &["value"], &[]);
        let policy = EscapePolicy::new();
        let first = verify_uop(&u, &policy).unwrap();
        let second = verify_uop(&u, &policy).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_body_is_fatal() {
        let u = uop("foo();", &["value"], &[]);
        assert!(verify_uop(&u, &EscapePolicy::new()).is_err());
    }

    #[test]
    fn test_unmarked_call_at_top_level() {
        let found = check_unmarked_escapes(&uop("{ foo(); }", &[], &[]), &EscapePolicy::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_string(), "Unmarked escaping function 'foo' at depth 0 at test.c:1");
    }

    #[test]
    fn test_unmarked_call_reports_nesting_depth() {
        let found = check_unmarked_escapes(&uop("{ if (x) { bar(y); } }", &[], &[]), &EscapePolicy::new());
        assert_eq!(found.len(), 1);
        assert!(found[0].message.ends_with("at depth 1"));
    }

    #[test]
    fn test_marked_call_arguments_are_vouched_for() {
        let found = check_unmarked_escapes(&uop("{ ESCAPING_CALL(foo(x)); }", &[], &[]), &EscapePolicy::new());
        assert!(found.is_empty());
    }

    #[test]
    fn test_marked_call_rejects_decref_argument() {
        let found = check_unmarked_escapes(&uop("{ ESCAPING_CALL(Py_DECREF(x)); }", &[], &[]), &EscapePolicy::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "DECREF in 'ESCAPING_CALL'");
    }

    #[test]
    fn test_conventional_names_are_not_flagged() {
        let found = check_unmarked_escapes(
            &uop("{ PyLong_CheckExact(v); SYNC_SP(); restart_backoff_counter(c); }", &[], &[]),
            &EscapePolicy::new(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_verify_accumulates_across_uops() {
        let mut analysis = Analysis::new();
        analysis.insert(uop("{ if (a) { foo(); goto error; } }", &["value"], &[]));
        let mut second = uop("{ if (b) { bar(); goto error; } }", &["value"], &[]);
        second.name = "_OTHER_UOP".to_string();
        analysis.insert(second);
        let found = verify(&analysis, &EscapePolicy::new()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].message.contains("'_TEST_UOP'"));
        assert!(found[1].message.contains("'_OTHER_UOP'"));
    }
}
