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

//! Escaping-call region finder
//!
//! A single forward pass over a handler body locates every call classified
//! as escaping, together with the smallest enclosing statement or control
//! construct that must be checked around it. No grammar: brace depth, paren
//! depth, and a pending control-keyword marker are enough structure.

use crate::analysis::Uop;
use crate::error::{AnalysisError, AnalysisResult};
use crate::escape::policy::EscapePolicy;
use crate::lexer::{Token, TokenKind};
use std::fmt;

/// A candidate escaping call and the region to check around it
///
/// An ephemeral view over one uop's body: three token indices with
/// `start <= call <= end`. `start` is the opening keyword or brace of the
/// smallest enclosing statement, `end` its closing brace or semicolon.
/// Never build one from indices of different uops.
#[derive(Debug, Clone, Copy)]
pub struct EscapingCall<'a> {
    /// The uop whose body the indices point into
    pub uop: &'a Uop,
    /// Index of the region's opening token
    pub start: usize,
    /// Index of the call identifier
    pub call: usize,
    /// Index of the region's closing token
    pub end: usize,
}

impl<'a> EscapingCall<'a> {
    /// The region's opening token
    pub fn start_token(&self) -> &'a Token {
        &self.uop.body[self.start]
    }

    /// The call identifier token
    pub fn call_token(&self) -> &'a Token {
        &self.uop.body[self.call]
    }

    /// The region's closing token
    pub fn end_token(&self) -> &'a Token {
        &self.uop.body[self.end]
    }
}

impl fmt::Display for EscapingCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call to '{}' in '{}'", self.call_token().text, self.uop.name)
    }
}

/// Find the statement terminator for a call emitted at depth zero
fn scan_to_semi(uop: &Uop, call: usize) -> AnalysisResult<usize> {
    for i in call + 1..uop.body.len() {
        if uop.body[i].kind == TokenKind::Semi {
            return Ok(i);
        }
    }
    Err(AnalysisError::syntax(
        &uop.body[call],
        format!("call to '{}' in '{}' has no statement terminator", uop.body[call].text, uop.name),
    ))
}

/// Locate every escaping call in a uop's body, innermost-first per region
///
/// Calls found inside a depth-zero block are collected and flushed when the
/// block closes, popped LIFO so nested calls come out innermost-first, all
/// sharing the block's enclosing `start`/`end`. A call in a bare depth-zero
/// statement is emitted immediately, spanning that statement.
pub fn find_escaping_calls<'a>(uop: &'a Uop, policy: &EscapePolicy) -> AnalysisResult<Vec<EscapingCall<'a>>> {
    let body = &uop.body;
    match body.first() {
        Some(first) if first.kind == TokenKind::LBrace => {}
        Some(first) => {
            return Err(AnalysisError::syntax(first, format!("handler body of '{}' does not start with '{{'", uop.name)));
        }
        None => {
            return Err(AnalysisError::unexpected_eof("", format!("handler body of '{}' is empty", uop.name)));
        }
    }

    let mut regions: Vec<EscapingCall<'a>> = Vec::new();
    let mut calls: Vec<usize> = Vec::new();
    let mut pending_keyword: Option<usize> = None;
    let mut start: Option<usize> = None;
    let mut brace_depth: i32 = 0;
    let mut paren_depth: i32 = 0;
    let mut new_stmt = true;
    let mut first_in_stmt = 1;

    let mut i = 1;
    while i < body.len() {
        let tkn = &body[i];
        if new_stmt {
            new_stmt = false;
            first_in_stmt = i;
        }
        if tkn.is_control_keyword() {
            pending_keyword = Some(i);
        }
        match tkn.kind {
            TokenKind::LBrace => {
                if brace_depth == 0 {
                    start = Some(pending_keyword.unwrap_or(i));
                }
                pending_keyword = None;
                brace_depth += 1;
            }
            TokenKind::RBrace => {
                brace_depth -= 1;
                if brace_depth == 0 {
                    if let Some(region_start) = start.take() {
                        while let Some(call) = calls.pop() {
                            regions.push(EscapingCall {
                                uop,
                                start: region_start,
                                call,
                                end: i,
                            });
                        }
                    }
                }
                new_stmt = true;
            }
            TokenKind::LParen => paren_depth += 1,
            TokenKind::RParen => paren_depth = (paren_depth - 1).max(0),
            TokenKind::Semi => {
                new_stmt = true;
                // Semicolons inside a `for (...)` header are not statement
                // boundaries; the pending keyword must survive them.
                if paren_depth == 0 {
                    pending_keyword = None;
                }
            }
            TokenKind::Identifier => {
                let Some(next) = body.get(i + 1) else {
                    return Ok(regions);
                };
                if next.kind == TokenKind::LParen && policy.is_escaping(&tkn.text) {
                    if brace_depth > 0 {
                        calls.push(i);
                    } else {
                        let end = scan_to_semi(uop, i)?;
                        regions.push(EscapingCall {
                            uop,
                            start: first_in_stmt,
                            call: i,
                            end,
                        });
                        // Jump to the terminator and let the main loop do its
                        // statement bookkeeping on it.
                        i = end;
                        continue;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    tracing::debug!(uop = %uop.name, regions = regions.len(), "escaping-call scan complete");
    Ok(regions)
}
