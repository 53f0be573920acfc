//! SmartScript Parser
//!
//! Parses `.smscr` template source into a document tree. The parser drives the
//! modal lexer from `smscr-lexer` and enforces `FOR`/`END` nesting.
//!
//! ```
//! use smscr_parser::{Node, Parser};
//!
//! let doc = Parser::parse("{$ FOR i 1 3 $}{$= i $}{$ END $}").unwrap();
//! assert!(matches!(doc.children[0], Node::ForLoop(_)));
//! assert_eq!(doc.to_string(), "{$ FOR i 1 3 $}{$= i $}{$ END $}");
//! ```

pub mod ast;
pub mod parser;

pub use ast::{DocumentNode, EchoNode, Element, ForLoopNode, Node, Operator, TextNode};
pub use parser::Parser;

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    /// Character index the error refers to.
    pub index: usize,
    pub line: usize,
    pub column: usize,
}
