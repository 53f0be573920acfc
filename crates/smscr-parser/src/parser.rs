//! Document parser for SmartScript.
//!
//! Pulls tokens from the modal lexer one at a time, switching its mode as tags
//! open and close, and builds a `DocumentNode`. Block structure (`FOR` ... `END`)
//! is tracked on an explicit stack of open containers.

use crate::ast::{DocumentNode, EchoNode, Element, ForLoopNode, Node, Operator, TextNode};
use crate::ParseError;
use smscr_lexer::{Lexer, LexerError, LexerMode, Span, Token, TokenKind};

/// A container that is still accepting children.
enum Container {
    Document(DocumentNode),
    ForLoop(ForLoopNode),
}

impl Container {
    fn push_child(&mut self, node: Node) {
        match self {
            Container::Document(doc) => doc.children.push(node),
            Container::ForLoop(for_loop) => for_loop.children.push(node),
        }
    }
}

/// SmartScript document parser.
pub struct Parser {
    lexer: Lexer,
    stack: Vec<Container>,
}

impl Parser {
    /// Create a new parser over the given source.
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
            stack: vec![Container::Document(DocumentNode::new())],
        }
    }

    /// Parse source code into a document tree.
    pub fn parse(source: &str) -> Result<DocumentNode, ParseError> {
        Parser::new(source).parse_document()
    }

    /// Parse a full document.
    fn parse_document(mut self) -> Result<DocumentNode, ParseError> {
        loop {
            let token = self.next()?;

            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Text(text) => self.top().push_child(Node::Text(TextNode::new(text))),
                TokenKind::StartTag => {
                    self.lexer.set_mode(LexerMode::TagName);
                    self.parse_tag()?;
                }
                other => {
                    return Err(self.error_at(
                        &token.span,
                        format!("Unexpected {} token outside of a tag", other.describe()),
                    ))
                }
            }
        }

        if self.stack.len() != 1 {
            return Err(self.error("Too few END tags".into()));
        }

        match self.stack.pop() {
            Some(Container::Document(doc)) => Ok(doc),
            _ => Err(self.error("Too few END tags".into())),
        }
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Parse everything after `{$` up to and including `$}`.
    fn parse_tag(&mut self) -> Result<(), ParseError> {
        let token = self.next()?;
        let name = match token.kind {
            TokenKind::TagName(name) => name,
            other => {
                return Err(self.error_at(
                    &token.span,
                    format!("Expected a tag name, got {}", other.describe()),
                ))
            }
        };
        self.lexer.set_mode(LexerMode::TagDef);

        if name == "=" {
            self.parse_echo()
        } else if name.eq_ignore_ascii_case("FOR") {
            self.parse_for()
        } else if name.eq_ignore_ascii_case("END") {
            self.parse_end(&token.span)
        } else {
            Err(self.error_at(&token.span, format!("Invalid tag name '{name}'")))
        }
    }

    /// `{$= element* $}`
    fn parse_echo(&mut self) -> Result<(), ParseError> {
        let mut elements = Vec::new();

        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::EndTag => break,
                TokenKind::Eof => return Err(self.error_at(&token.span, "Unterminated tag".into())),
                _ => elements.push(self.element(token, true)?),
            }
        }

        self.lexer.set_mode(LexerMode::Text);
        self.top().push_child(Node::Echo(EchoNode::new(elements)));
        Ok(())
    }

    /// `{$ FOR variable start end [step] $}`
    fn parse_for(&mut self) -> Result<(), ParseError> {
        let token = self.next()?;
        let variable = match token.kind {
            TokenKind::Variable(name) => name,
            other => {
                return Err(self.error_at(
                    &token.span,
                    format!(
                        "Expecting a variable on the first position in FOR tag but got {}",
                        other.describe()
                    ),
                ))
            }
        };

        let mut bounds = Vec::new();
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::EndTag => break,
                TokenKind::Eof => return Err(self.error_at(&token.span, "Unterminated tag".into())),
                _ => bounds.push(self.element(token, false)?),
            }
        }
        self.lexer.set_mode(LexerMode::Text);

        let mut bounds = bounds.into_iter();
        let (start, end, step) = match (bounds.next(), bounds.next(), bounds.next(), bounds.next()) {
            (Some(start), Some(end), step, None) => (start, end, step),
            _ => {
                return Err(self.error(format!(
                    "Invalid number of elements in FOR tag for variable '{variable}', expected 3 or 4"
                )))
            }
        };

        let for_loop = ForLoopNode::new(variable, start, end, step);
        self.stack.push(Container::ForLoop(for_loop));
        Ok(())
    }

    /// `{$ END $}` closes the innermost open loop.
    fn parse_end(&mut self, span: &Span) -> Result<(), ParseError> {
        let token = self.next()?;
        if token.kind != TokenKind::EndTag {
            return Err(self.error_at(&token.span, "Expected '$}' right after END".into()));
        }
        self.lexer.set_mode(LexerMode::Text);

        if !matches!(self.stack.last(), Some(Container::ForLoop(_))) {
            return Err(self.error_at(span, "Too many END tags".into()));
        }
        if let Some(Container::ForLoop(for_loop)) = self.stack.pop() {
            self.top().push_child(Node::ForLoop(for_loop));
        }
        Ok(())
    }

    /// Convert a tag-body token into an element. Functions and operators are only
    /// allowed in echo tags.
    fn element(&self, token: Token, in_echo: bool) -> Result<Element, ParseError> {
        let element = match token.kind {
            TokenKind::Variable(name) => Element::Variable(name),
            TokenKind::String(value) => Element::String(value),
            TokenKind::Integer(value) => Element::Integer(value),
            TokenKind::Double(value) => Element::Double(value),
            TokenKind::Function(name) if in_echo => Element::Function(name),
            TokenKind::Operator(symbol) if in_echo => match Operator::from_symbol(symbol) {
                Some(op) => Element::Operator(op),
                None => return Err(self.error_at(&token.span, format!("Unknown operator '{symbol}'"))),
            },
            other => {
                let tag = if in_echo { "ECHO" } else { "FOR" };
                return Err(self.error_at(
                    &token.span,
                    format!("Invalid element type {} in {tag} tag", other.describe()),
                ));
            }
        };
        Ok(element)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn next(&mut self) -> Result<Token, ParseError> {
        self.lexer.next_token().map_err(ParseError::from)
    }

    /// Innermost open container. The document is never popped before the end.
    fn top(&mut self) -> &mut Container {
        self.stack.last_mut().expect("container stack never empty")
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            index: self.lexer.position(),
            line: self.lexer.token().map_or(1, |t| t.span.line),
            column: self.lexer.token().map_or(1, |t| t.span.column),
        }
    }

    fn error_at(&self, span: &Span, message: String) -> ParseError {
        ParseError {
            message,
            index: span.start,
            line: span.line,
            column: span.column,
        }
    }
}

impl From<LexerError> for ParseError {
    fn from(e: LexerError) -> Self {
        ParseError {
            message: e.message,
            index: e.index,
            line: e.line,
            column: e.column,
        }
    }
}
