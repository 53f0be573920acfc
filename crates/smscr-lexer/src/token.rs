/// A position in source text, tracking line and column for error reporting.
///
/// `start` and `end` are character indices into the source, not byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// Token classification for SmartScript source.
///
/// Data-carrying variants embed their value directly (no separate `value` field on Token).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Free text outside of tags, with escapes already resolved.
    Text(String),

    // Tag body elements
    Double(f64),
    Integer(i32),
    String(String),
    Variable(String),
    /// Function name without the leading `@`.
    Function(String),
    Operator(char),

    // Tag structure
    StartTag, // {$
    EndTag,   // $}
    /// `=` or an identifier directly after `{$`.
    TagName(String),

    // End of input
    Eof,
}

impl TokenKind {
    /// Short, stable name of the token class, used in parser diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Text(_) => "TEXT",
            TokenKind::Double(_) => "DOUBLE",
            TokenKind::Integer(_) => "INTEGER",
            TokenKind::String(_) => "STRING",
            TokenKind::Variable(_) => "VARIABLE",
            TokenKind::Function(_) => "FUNCTION",
            TokenKind::Operator(_) => "OPERATOR",
            TokenKind::StartTag => "START_TAG",
            TokenKind::EndTag => "END_TAG",
            TokenKind::TagName(_) => "TAG_NAME",
            TokenKind::Eof => "EOF",
        }
    }
}

/// A token produced by the SmartScript lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Operators accepted inside tag bodies.
pub const OPERATORS: &[char] = &['+', '-', '*', '/', '^'];

/// Check if a character is a tag-body operator.
pub fn is_operator(c: char) -> bool {
    OPERATORS.contains(&c)
}
