//! SmartScript Lexer
//!
//! Tokenizes `.smscr` template source into a stream of tokens, one token at a time.
//! The lexer is modal: free text, the tag name right after `{$`, and the rest of a
//! tag body are scanned by different rules. The parser switches modes as it goes.
//!
//! # Example
//!
//! ```
//! use smscr_lexer::{Lexer, LexerMode, TokenKind};
//!
//! let mut lexer = Lexer::new("Hi {$= x $}");
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Text("Hi ".into()));
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::StartTag);
//! lexer.set_mode(LexerMode::TagName);
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::TagName("=".into()));
//! ```

pub mod lexer;
pub mod token;

pub use lexer::{Lexer, LexerMode};
pub use token::{Span, Token, TokenKind};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Lexer error at index {index} (line {line}, column {column}): {message}")]
pub struct LexerError {
    pub message: String,
    /// Character index of the offending input.
    pub index: usize,
    pub line: usize,
    pub column: usize,
}
