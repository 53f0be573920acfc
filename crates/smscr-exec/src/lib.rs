//! SmartScript Executor
//!
//! Runs a parsed document against a [`RequestContext`], writing rendered output
//! through the context's header-on-first-write protocol.
//!
//! ```text
//! DocumentNode + RequestContext → execute() → HTTP response bytes
//! ```
//!
//! # Example
//!
//! ```
//! use smscr_exec::{execute, RequestContext};
//! use smscr_parser::Parser;
//!
//! let doc = Parser::parse("{$ FOR i 1 3 $}{$= i i * $} {$ END $}").unwrap();
//! let mut out = Vec::new();
//! execute(&doc, &mut RequestContext::standalone(&mut out)).unwrap();
//! assert!(String::from_utf8(out).unwrap().ends_with("\r\n\r\n1 4 9 "));
//! ```

pub mod context;
pub mod decimal_format;
pub mod engine;
pub mod functions;
pub mod multistack;
pub mod value;

pub use context::{Charset, RcCookie, RequestContext, SharedParameters, UnsupportedEncoding};
pub use decimal_format::{DecimalFormat, PatternError};
pub use engine::Engine;
pub use multistack::Multistack;
pub use value::{CoercionError, Value, ValueWrapper};

use smscr_parser::DocumentNode;

/// Template evaluation error. Any of these aborts the current request.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Format(#[from] PatternError),

    #[error("Variable '{0}' is not defined")]
    UnboundVariable(String),

    #[error("Not enough operands on the stack for '{0}'")]
    StackUnderflow(String),

    #[error("Unknown function '@{0}'")]
    UnknownFunction(String),

    #[error("'{0}' does not denote a value")]
    NotAValue(String),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Execute `document`, writing its output into `context`.
pub fn execute(document: &DocumentNode, context: &mut RequestContext<'_>) -> Result<(), ExecError> {
    Engine::new(context).execute(document)
}
