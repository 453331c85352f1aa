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

//! Instruction-definition parser
//!
//! Builds the [`Analysis`] aggregate from definition source. Only the
//! definition forms are parsed:
//!
//! ```text
//! annotation* ("op" | "inst") "(" NAME "," "(" stack-effect ")" ")" block
//! ```
//!
//! where a stack effect is `inputs -- outputs`, each side a comma list of
//! `NAME`, `NAME[size]` (variadic) or, on the input side only, `NAME/NUM`
//! (an inline cache entry). `macro`, `family`, `pseudo` and `label`
//! declarations are recognized and skipped structurally. Any other
//! top-level token is ignored, so definitions can sit inside an ordinary
//! source file.

use crate::analysis::uop::{Analysis, CacheEntry, Properties, StackEffect, StackItem, Uop};
use crate::error::{AnalysisError, AnalysisErrorKind, AnalysisResult};
use crate::escape::policy::EscapePolicy;
use crate::lexer::{tokenize, Token, TokenKind};
use std::path::Path;

/// Default instruction-definition file, used when a CLI gives no inputs
pub const DEFAULT_INPUT: &str = "bytecodes.c";

/// One parsed stack-effect element before input/output placement
enum EffectItem {
    Value(StackItem),
    Cache(CacheEntry),
}

/// Token-stream parser over one definition source file
pub struct Parser<'p> {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
    policy: &'p EscapePolicy,
}

impl<'p> Parser<'p> {
    pub fn new(tokens: Vec<Token>, file: impl Into<String>, policy: &'p EscapePolicy) -> Self {
        Self {
            tokens,
            pos: 0,
            file: file.into(),
            policy,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_is(&self, kind: TokenKind) -> bool {
        matches!(self.peek(), Some(token) if token.kind == kind)
    }

    fn next_is_slash(&self) -> bool {
        matches!(self.peek(), Some(token) if token.kind == TokenKind::Other && token.text == "/")
    }

    fn at_definition_keyword(&self) -> bool {
        matches!(self.peek(), Some(token) if token.is_identifier_named("op") || token.is_identifier_named("inst"))
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> AnalysisResult<Token> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            Some(token) => Err(AnalysisError::syntax(token, format!("expected {}, found {}", what, token))),
            None => Err(AnalysisError::unexpected_eof(
                self.file.clone(),
                format!("unexpected end of '{}': expected {}", self.file, what),
            )),
        }
    }

    fn expect_identifier(&mut self, what: &str) -> AnalysisResult<Token> {
        self.expect_kind(TokenKind::Identifier, what)
    }

    /// Parse every definition in the token stream into `analysis`
    pub fn parse_into(&mut self, analysis: &mut Analysis) -> AnalysisResult<()> {
        while self.pos < self.tokens.len() {
            let token = &self.tokens[self.pos];
            if !token.is_identifier() {
                self.pos += 1;
                continue;
            }
            let text = token.text.clone();
            match text.as_str() {
                "macro" | "family" | "pseudo" => self.skip_declaration()?,
                "label" => self.skip_label()?,
                _ => {
                    let snapshot = self.pos;
                    let properties = self.parse_annotations()?;
                    if self.at_definition_keyword() {
                        let uop = self.parse_definition(properties, analysis)?;
                        tracing::debug!(uop = %uop.name, "parsed definition");
                        analysis.insert(uop);
                    } else {
                        // Not a definition after all; treat the identifier as
                        // ordinary source text.
                        self.pos = snapshot + 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Collect leading annotations into a fresh property set
    fn parse_annotations(&mut self) -> AnalysisResult<Properties> {
        let mut properties = Properties::default();
        loop {
            let Some(token) = self.peek() else { break };
            if !token.is_identifier() {
                break;
            }
            let text = token.text.clone();
            match text.as_str() {
                "pure" => {
                    properties.pure_uop = true;
                    self.pos += 1;
                }
                "replaced" => {
                    properties.replaced = true;
                    self.pos += 1;
                }
                "tier1" => {
                    properties.tier = Some(1);
                    self.pos += 1;
                }
                "tier2" => {
                    properties.tier = Some(2);
                    self.pos += 1;
                }
                "replicate" => {
                    self.pos += 1;
                    self.expect_kind(TokenKind::LParen, "'(' after 'replicate'")?;
                    let count = self.expect_kind(TokenKind::Number, "a replication count")?;
                    properties.replicated = count.text.parse().map_err(|_| {
                        AnalysisError::syntax(&count, format!("replication count '{}' is not an integer", count.text))
                    })?;
                    self.expect_kind(TokenKind::RParen, "')' after the replication count")?;
                }
                "specializing" | "split" | "no_save_ip" => {
                    // Recognized but carries no weight here.
                    tracing::debug!(annotation = %text, "ignoring annotation");
                    self.pos += 1;
                }
                _ => break,
            }
        }
        Ok(properties)
    }

    /// Parse one `op`/`inst` definition, the keyword already verified
    fn parse_definition(&mut self, mut properties: Properties, analysis: &Analysis) -> AnalysisResult<Uop> {
        self.pos += 1;
        self.expect_kind(TokenKind::LParen, "'(' after the definition keyword")?;
        let name = self.expect_identifier("a definition name")?;
        if analysis.contains(&name.text) {
            return Err(AnalysisError::at_token(
                AnalysisErrorKind::Duplicate,
                &name,
                format!("duplicate definition of '{}'", name.text),
            ));
        }
        self.expect_kind(TokenKind::Comma, "',' after the definition name")?;
        self.expect_kind(TokenKind::LParen, "'(' to open the stack effect")?;
        let (stack, caches) = self.parse_stack_effect()?;
        self.expect_kind(TokenKind::RParen, "')' to close the definition header")?;
        let body = self.capture_block()?;
        derive_body_properties(&mut properties, &body, self.policy);
        Ok(Uop::new(name.text, stack, caches, properties, body))
    }

    /// Parse `inputs -- outputs` up to and including the closing paren
    fn parse_stack_effect(&mut self) -> AnalysisResult<(StackEffect, Vec<CacheEntry>)> {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut caches = Vec::new();
        let mut seen_divider = false;
        loop {
            let Some(token) = self.peek() else {
                return Err(AnalysisError::unexpected_eof(
                    self.file.clone(),
                    format!("unexpected end of '{}' inside a stack effect", self.file),
                ));
            };
            match token.kind {
                TokenKind::RParen => {
                    if !seen_divider {
                        return Err(AnalysisError::syntax(token, "stack effect has no '--' divider"));
                    }
                    self.pos += 1;
                    break;
                }
                TokenKind::MinusMinus => {
                    if seen_divider {
                        return Err(AnalysisError::syntax(token, "stack effect has a second '--'"));
                    }
                    seen_divider = true;
                    self.pos += 1;
                }
                TokenKind::Comma => self.pos += 1,
                TokenKind::Identifier => match self.parse_effect_item(seen_divider)? {
                    EffectItem::Value(item) => {
                        if seen_divider {
                            outputs.push(item);
                        } else {
                            inputs.push(item);
                        }
                    }
                    EffectItem::Cache(entry) => caches.push(entry),
                },
                _ => {
                    return Err(AnalysisError::syntax(token, format!("unexpected {} in a stack effect", token)));
                }
            }
        }
        Ok((StackEffect::new(inputs, outputs), caches))
    }

    /// Parse one effect item: `NAME`, `NAME[size]` or `NAME/NUM`
    fn parse_effect_item(&mut self, in_outputs: bool) -> AnalysisResult<EffectItem> {
        let name = self.tokens[self.pos].clone();
        self.pos += 1;
        if self.next_is(TokenKind::LBracket) {
            self.pos += 1;
            let mut size = String::new();
            loop {
                let Some(part) = self.peek() else {
                    return Err(AnalysisError::unexpected_eof(
                        self.file.clone(),
                        format!("array size of '{}' never closes", name.text),
                    ));
                };
                if part.kind == TokenKind::RBracket {
                    self.pos += 1;
                    break;
                }
                size.push_str(&part.text);
                self.pos += 1;
            }
            if size.is_empty() {
                return Err(AnalysisError::syntax(&name, format!("array item '{}' has an empty size", name.text)));
            }
            return Ok(EffectItem::Value(StackItem::with_size(name.text, size)));
        }
        if self.next_is_slash() {
            if in_outputs {
                return Err(AnalysisError::syntax(
                    &name,
                    format!("cache entry '{}' not allowed after '--'", name.text),
                ));
            }
            self.pos += 1;
            let num = self.expect_kind(TokenKind::Number, "a cache entry size")?;
            let size = num.text.parse::<u8>().map_err(|_| {
                AnalysisError::syntax(&num, format!("cache entry size '{}' is not a small integer", num.text))
            })?;
            return Ok(EffectItem::Cache(CacheEntry::new(name.text, size)));
        }
        Ok(EffectItem::Value(StackItem::new(name.text)))
    }

    /// Capture a balanced brace block verbatim, outer braces included
    fn capture_block(&mut self) -> AnalysisResult<Vec<Token>> {
        let open = self.expect_kind(TokenKind::LBrace, "'{' to open a handler body")?;
        let open_line = open.line;
        let open_file = open.file.clone();
        let mut body = vec![open];
        let mut depth: i32 = 1;
        while depth > 0 {
            let Some(token) = self.peek() else {
                return Err(AnalysisError::unexpected_eof(
                    open_file,
                    format!("block opened at line {} never closes", open_line),
                ));
            };
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            body.push(token.clone());
            self.pos += 1;
        }
        Ok(body)
    }

    /// Skip a `macro`/`family`/`pseudo` declaration through its semicolon
    fn skip_declaration(&mut self) -> AnalysisResult<()> {
        let keyword = self.tokens[self.pos].clone();
        self.pos += 1;
        let mut depth: i32 = 0;
        while let Some(token) = self.peek() {
            let kind = token.kind;
            self.pos += 1;
            match kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                TokenKind::Semi if depth == 0 => {
                    tracing::debug!(construct = %keyword.text, "skipped declaration");
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(AnalysisError::unexpected_eof(
            keyword.file.clone(),
            format!("'{}' declaration at line {} never terminated", keyword.text, keyword.line),
        ))
    }

    /// Skip a `label(NAME) { ... }` definition
    fn skip_label(&mut self) -> AnalysisResult<()> {
        self.pos += 1;
        self.expect_kind(TokenKind::LParen, "'(' after 'label'")?;
        let name = self.expect_identifier("a label name")?;
        self.expect_kind(TokenKind::RParen, "')' after the label name")?;
        let _ = self.capture_block()?;
        tracing::debug!(label = %name.text, "skipped label definition");
        Ok(())
    }
}

/// Derive the body-dependent properties of a definition
fn derive_body_properties(properties: &mut Properties, body: &[Token], policy: &EscapePolicy) {
    for (i, token) in body.iter().enumerate() {
        if !token.is_identifier() {
            continue;
        }
        match token.text.as_str() {
            "oparg" => properties.uses_oparg = true,
            "JUMPBY" => properties.jumps = true,
            "DEOPT_IF" => properties.deopts = true,
            "EXIT_IF" => properties.side_exits = true,
            "ERROR_IF" => properties.errors = true,
            _ => {}
        }
        if !properties.escapes
            && matches!(body.get(i + 1), Some(next) if next.kind == TokenKind::LParen)
            && policy.is_escaping(&token.text)
        {
            properties.escapes = true;
        }
    }
}

/// Analyze definition source held in memory
pub fn analyze_source(source: &str, file: &str, policy: &EscapePolicy) -> AnalysisResult<Analysis> {
    let mut analysis = Analysis::new();
    parse_source_into(source, file, policy, &mut analysis)?;
    Ok(analysis)
}

/// Analyze one or more definition files into a single aggregate
pub fn analyze_files<P: AsRef<Path>>(paths: &[P], policy: &EscapePolicy) -> AnalysisResult<Analysis> {
    let mut analysis = Analysis::new();
    for path in paths {
        let path = path.as_ref();
        let name = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(&name, &e))?;
        tracing::info!(file = %name, "analyzing definitions");
        parse_source_into(&source, &name, policy, &mut analysis)?;
    }
    tracing::info!(uops = analysis.len(), "analysis complete");
    Ok(analysis)
}

fn parse_source_into(source: &str, file: &str, policy: &EscapePolicy, analysis: &mut Analysis) -> AnalysisResult<()> {
    let tokens = tokenize(source, file)?;
    Parser::new(tokens, file, policy).parse_into(analysis)
}
