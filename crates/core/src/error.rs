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

//! Analysis error types and handling
//!
//! Every structural problem with the input (lexical garbage, unbalanced
//! braces, a call with no statement terminator, duplicate definitions,
//! unreadable files) is fatal: the run aborts with one located message.
//! Safety findings are not errors; they are diagnostics accumulated by the
//! verifier.

use crate::lexer::Token;
use std::fmt;
use thiserror::Error;

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Main error type for loading and analyzing instruction definitions
#[derive(Error, Debug, Clone)]
pub struct AnalysisError {
    /// The kind of error
    pub kind: AnalysisErrorKind,
    /// File the error was detected in (the input path for I/O errors)
    pub file: String,
    /// 1-based line of the offending token, 0 when not line-addressable
    pub line: u32,
    /// Human-readable error message
    pub message: String,
}

impl AnalysisError {
    /// Create a new analysis error
    pub fn new(kind: AnalysisErrorKind, file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an error located at an existing token
    pub fn at_token(kind: AnalysisErrorKind, token: &Token, message: impl Into<String>) -> Self {
        Self::new(kind, token.file.clone(), token.line, message)
    }

    /// Create a lexical error
    pub fn lexical(file: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::Lexical, file, line, message)
    }

    /// Create a syntax error at a token
    pub fn syntax(token: &Token, message: impl Into<String>) -> Self {
        Self::at_token(AnalysisErrorKind::Syntax, token, message)
    }

    /// Create an unexpected-end-of-file error
    pub fn unexpected_eof(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AnalysisErrorKind::UnexpectedEof, file, 0, message)
    }

    /// Create an I/O error for an input path
    pub fn io(path: impl Into<String>, source: &std::io::Error) -> Self {
        let path = path.into();
        Self::new(AnalysisErrorKind::Io, path.clone(), 0, format!("failed to read '{}': {}", path, source))
    }

    /// Render the message in the project diagnostic format
    pub fn user_message(&self) -> String {
        if self.line == 0 {
            self.message.clone()
        } else {
            format!("{} at {}:{}", self.message, self.file, self.line)
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

/// Categories of analysis errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    /// Tokenization failure (bad character, unterminated literal or comment)
    #[error("lexical error")]
    Lexical,

    /// Structural violation in a definition or handler body
    #[error("syntax error")]
    Syntax,

    /// Input ended inside a definition
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// A uop name defined twice
    #[error("duplicate definition")]
    Duplicate,

    /// Input file could not be read
    #[error("i/o error")]
    Io,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenKind;

    #[test]
    fn test_located_message_format() {
        let err = AnalysisError::lexical("bytecodes.c", 7, "unterminated string literal");
        assert_eq!(err.user_message(), "unterminated string literal at bytecodes.c:7");
        assert_eq!(format!("{}", err), err.user_message());
    }

    #[test]
    fn test_error_at_token() {
        let token = Token::new(TokenKind::RBrace, "}", "bytecodes.c", 42);
        let err = AnalysisError::syntax(&token, "unbalanced '}'");

        assert_eq!(err.kind, AnalysisErrorKind::Syntax);
        assert_eq!(err.file, "bytecodes.c");
        assert_eq!(err.line, 42);
        assert_eq!(err.user_message(), "unbalanced '}' at bytecodes.c:42");
    }

    #[test]
    fn test_unlocated_message_has_no_suffix() {
        let err = AnalysisError::unexpected_eof("bytecodes.c", "definition never closed in 'bytecodes.c'");
        assert_eq!(err.user_message(), "definition never closed in 'bytecodes.c'");
    }

    #[test]
    fn test_kind_descriptions() {
        assert_eq!(format!("{}", AnalysisErrorKind::Lexical), "lexical error");
        assert_eq!(format!("{}", AnalysisErrorKind::Duplicate), "duplicate definition");
    }
}
