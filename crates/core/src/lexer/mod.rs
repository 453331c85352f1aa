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

//! Lexical analyzer for instruction-definition sources
//!
//! Definition headers and the C-like handler bodies are tokenized uniformly
//! into one flat sequence. This is structural tokenization, not C parsing:
//! just enough classification to find statements, blocks, and calls.

pub mod token;

pub use token::{Token, TokenKind};

use crate::error::{AnalysisError, AnalysisResult};
use std::iter::Peekable;
use std::str::Chars;

/// Check if a character can start an identifier
fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier
fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Streaming tokenizer over one source file
pub struct Lexer<'a> {
    /// Remaining input
    chars: Peekable<Chars<'a>>,
    /// File name stamped on every token
    file: &'a str,
    /// Current 1-based line
    line: u32,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over a source string
    pub fn new(source: &'a str, file: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            file,
            line: 1,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> AnalysisResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.scan_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Consume the next character, tracking line numbers
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    /// Look at the next character without consuming it
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume the next character if it matches
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Create a token at the current line
    fn make_token(&self, kind: TokenKind, text: impl Into<String>) -> Token {
        Token::new(kind, text, self.file, self.line)
    }

    /// Scan the next token, skipping whitespace, comments, and preprocessor lines
    fn scan_token(&mut self) -> AnalysisResult<Option<Token>> {
        loop {
            let Some(c) = self.bump() else {
                return Ok(None);
            };

            return match c {
                c if c.is_whitespace() => continue,

                '/' if self.eat('/') => {
                    self.skip_to_line_end();
                    continue;
                }
                '/' if self.eat('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '#' => {
                    // Preprocessor directive: structurally opaque, drop the line.
                    self.skip_to_line_end();
                    continue;
                }

                '"' => self.scan_string_literal().map(Some),
                '\'' => self.scan_char_literal().map(Some),

                c if c.is_ascii_digit() => Ok(Some(self.scan_number(c))),
                c if is_identifier_start(c) => Ok(Some(self.scan_identifier(c))),

                c => {
                    if let Some(kind) = TokenKind::delimiter(c) {
                        Ok(Some(self.make_token(kind, c)))
                    } else {
                        self.scan_operator(c).map(Some)
                    }
                }
            };
        }
    }

    /// Skip the remainder of the current line
    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Skip a `/* ... */` comment, which may span lines
    fn skip_block_comment(&mut self) -> AnalysisResult<()> {
        let start_line = self.line;
        while let Some(c) = self.bump() {
            if c == '*' && self.eat('/') {
                return Ok(());
            }
        }
        Err(AnalysisError::lexical(self.file, start_line, "unterminated block comment"))
    }

    /// Scan a string literal, escape sequences included
    fn scan_string_literal(&mut self) -> AnalysisResult<Token> {
        let start_line = self.line;
        let mut text = String::from('"');
        while let Some(c) = self.bump() {
            text.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                '"' => return Ok(Token::new(TokenKind::StringLit, text, self.file, start_line)),
                _ => {}
            }
        }
        Err(AnalysisError::lexical(self.file, start_line, "unterminated string literal"))
    }

    /// Scan a character literal, escape sequences included
    fn scan_char_literal(&mut self) -> AnalysisResult<Token> {
        let start_line = self.line;
        let mut text = String::from('\'');
        while let Some(c) = self.bump() {
            text.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                '\'' => return Ok(Token::new(TokenKind::CharLit, text, self.file, start_line)),
                _ => {}
            }
        }
        Err(AnalysisError::lexical(self.file, start_line, "unterminated character literal"))
    }

    /// Scan a numeric literal (decimal, hex, float, suffixed)
    fn scan_number(&mut self, first: char) -> Token {
        let mut text = first.to_string();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        self.make_token(TokenKind::Number, text)
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self, first: char) -> Token {
        let mut text = first.to_string();
        while let Some(c) = self.peek() {
            if is_identifier_continue(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, text)
    }

    /// Scan an operator, merging multi-character forms into one token
    ///
    /// Only bare `=` and `--` get dedicated kinds; every other operator is
    /// `Other`. Compound assignments and comparisons must merge so that `<=`
    /// or `==` can never masquerade as an assignment.
    fn scan_operator(&mut self, first: char) -> AnalysisResult<Token> {
        let mut text = first.to_string();
        let kind = match first {
            '=' => {
                if self.eat('=') {
                    text.push('=');
                    TokenKind::Other
                } else {
                    TokenKind::Equals
                }
            }
            '-' => {
                if self.eat('-') {
                    text.push('-');
                    TokenKind::MinusMinus
                } else if self.eat('=') {
                    text.push('=');
                    TokenKind::Other
                } else if self.eat('>') {
                    text.push('>');
                    TokenKind::Other
                } else {
                    TokenKind::Other
                }
            }
            '+' => {
                if self.eat('+') {
                    text.push('+');
                } else if self.eat('=') {
                    text.push('=');
                }
                TokenKind::Other
            }
            '*' | '/' | '%' | '^' | '!' => {
                if self.eat('=') {
                    text.push('=');
                }
                TokenKind::Other
            }
            '<' | '>' => {
                if self.eat(first) {
                    text.push(first);
                }
                if self.eat('=') {
                    text.push('=');
                }
                TokenKind::Other
            }
            '&' | '|' => {
                if self.eat(first) {
                    text.push(first);
                } else if self.eat('=') {
                    text.push('=');
                }
                TokenKind::Other
            }
            '.' => {
                if self.eat('.') {
                    text.push('.');
                    if self.eat('.') {
                        text.push('.');
                    }
                }
                TokenKind::Other
            }
            ':' | '?' | '~' | '\\' => TokenKind::Other,
            _ => {
                return Err(AnalysisError::lexical(self.file, self.line, format!("unexpected character '{}'", first)));
            }
        };
        Ok(self.make_token(kind, text))
    }
}

/// Tokenize a whole source string in one call
pub fn tokenize(source: &str, file: &str) -> AnalysisResult<Vec<Token>> {
    Lexer::new(source, file).tokenize()
}
