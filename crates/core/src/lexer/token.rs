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

//! Token definitions for the instruction-definition language

use std::fmt;

/// A classified lexical unit with its source location
///
/// Tokens are produced once by the lexer and never mutated; the uop whose
/// body contains them owns the sequence outright.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text that produced this token
    pub text: String,
    /// The file this token was read from
    pub file: String,
    /// The 1-based line the token starts on
    pub line: u32,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, text: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            file: file.into(),
            line,
        }
    }

    /// Check if this token is of a specific kind
    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Check if this token is a plain identifier (not a keyword)
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Check if this token is an identifier with the given text
    pub fn is_identifier_named(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == name
    }

    /// Check if this token opens a control construct (`if`/`while`/`for`/`do`)
    pub fn is_control_keyword(&self) -> bool {
        self.kind.is_control_keyword()
    }

    /// Render the source location as `file:line`
    pub fn location(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.text)
    }
}

/// Kinds of tokens in the instruction-definition language
///
/// The set is closed: structurally significant C punctuation and the four
/// control keywords get dedicated kinds, every other keyword collapses to
/// `Keyword` so it can never be mistaken for a call identifier, and every
/// operator without a dedicated kind collapses to `Other`. Note that `Equals`
/// is the single `=` assignment operator only; `==` lexes as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Names
    Identifier,
    Keyword,

    // Literals
    Number,
    StringLit,
    CharLit,

    // Delimiters
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,

    // Operators the analysis cares about
    Equals,
    MinusMinus,

    // Control keywords that open statement regions
    Goto,
    For,
    While,
    If,
    Do,

    // Everything else (operators, punctuation)
    Other,
}

impl TokenKind {
    /// Classify an identifier-shaped lexeme as a keyword kind, if it is one
    pub fn keyword(ident: &str) -> Option<Self> {
        match ident {
            "if" => Some(TokenKind::If),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "do" => Some(TokenKind::Do),
            "goto" => Some(TokenKind::Goto),
            // The remaining C keywords matter only insofar as they must not
            // be classified as call identifiers.
            "auto" | "break" | "case" | "char" | "const" | "continue" | "default" | "double" | "else" | "enum" | "extern" | "float" | "int" | "inline" | "long" | "register"
            | "restrict" | "return" | "short" | "signed" | "sizeof" | "static" | "struct" | "switch" | "typedef" | "union" | "unsigned" | "void" | "volatile" => Some(TokenKind::Keyword),
            _ => None,
        }
    }

    /// Classify a single delimiter character
    pub fn delimiter(c: char) -> Option<Self> {
        match c {
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ';' => Some(TokenKind::Semi),
            ',' => Some(TokenKind::Comma),
            _ => None,
        }
    }

    /// Check if this kind opens a control construct (`if`/`while`/`for`/`do`)
    pub fn is_control_keyword(&self) -> bool {
        matches!(self, TokenKind::If | TokenKind::While | TokenKind::For | TokenKind::Do)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::Number => "number",
            TokenKind::StringLit => "string",
            TokenKind::CharLit => "character",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semi => "';'",
            TokenKind::Comma => "','",
            TokenKind::Equals => "'='",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Goto => "'goto'",
            TokenKind::For => "'for'",
            TokenKind::While => "'while'",
            TokenKind::If => "'if'",
            TokenKind::Do => "'do'",
            TokenKind::Other => "operator",
        };
        write!(f, "{}", s)
    }
}
