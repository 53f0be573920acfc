use crate::token::{is_operator, Span, Token, TokenKind};
use crate::LexerError;

/// Lexer mode determines which scanning rules apply to the next token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    /// Outside of tags: free text, `{$` opens a tag.
    Text,
    /// Directly after `{$`: expects `=` or an identifier.
    TagName,
    /// Rest of a tag body: elements and the closing `$}`.
    TagDef,
}

/// SmartScript source lexer.
///
/// Produces tokens lazily through [`Lexer::next_token`]. The mode is not switched
/// by the lexer itself; the parser sets it after reading `{$`, the tag name, and `$}`.
///
/// - `Vec<char>` source for index-based navigation
/// - Position tracking on every token
/// - Mode-aware scanning
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    mode: LexerMode,
    token: Option<Token>,
}

impl Lexer {
    /// Create a new lexer for the given source, starting in text mode.
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            mode: LexerMode::Text,
            token: None,
        }
    }

    /// Switch the lexer to another mode. Takes effect for the next token.
    pub fn set_mode(&mut self, mode: LexerMode) {
        self.mode = mode;
    }

    /// Last token produced, if any. Does not advance.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Index of the first character not yet consumed.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Produce the next token.
    ///
    /// Fails once the EOF token has already been handed out.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        if matches!(self.token, Some(Token { kind: TokenKind::Eof, .. })) {
            return Err(self.error("No more tokens available".into()));
        }

        let token = if self.is_at_end() {
            self.make_token(TokenKind::Eof, self.pos, self.line, self.column)
        } else {
            match self.mode {
                LexerMode::Text => self.scan_text()?,
                LexerMode::TagName => self.scan_tag_name()?,
                LexerMode::TagDef => self.scan_tag_def()?,
            }
        };

        self.token = Some(token.clone());
        Ok(token)
    }

    /// Drain the remaining input into a token vector, following the tag structure
    /// the way the parser would. Mostly useful for tests and tooling.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            match &token.kind {
                TokenKind::StartTag => lexer.set_mode(LexerMode::TagName),
                TokenKind::TagName(_) => lexer.set_mode(LexerMode::TagDef),
                TokenKind::EndTag => lexer.set_mode(LexerMode::Text),
                _ => {}
            }
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    // --- Text mode ---

    /// Scan free text up to the next `{$`, resolving `\\` and `\{` escapes.
    fn scan_text(&mut self) -> Result<Token, LexerError> {
        let (start, line, column) = (self.pos, self.line, self.column);

        if self.at_tag_open() {
            self.advance();
            self.advance();
            return Ok(self.make_token(TokenKind::StartTag, start, line, column));
        }

        let mut text = String::new();
        while !self.is_at_end() && !self.at_tag_open() {
            let c = self.peek();
            if c == '\\' {
                match self.peek_next() {
                    '\\' | '{' => {
                        text.push(self.peek_next());
                        self.advance();
                        self.advance();
                    }
                    _ => return Err(self.error("Invalid escape sequence in text".into())),
                }
            } else {
                text.push(c);
                self.advance();
            }
        }

        Ok(self.make_token(TokenKind::Text(text), start, line, column))
    }

    // --- Tag name mode ---

    /// Scan the tag name: `=` or an identifier.
    fn scan_tag_name(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Err(self.error("Unexpected end of input, expected a tag name".into()));
        }

        let (start, line, column) = (self.pos, self.line, self.column);
        if self.peek() == '=' {
            self.advance();
            return Ok(self.make_token(TokenKind::TagName("=".into()), start, line, column));
        }

        if self.peek().is_alphabetic() {
            let name = self.scan_identifier();
            return Ok(self.make_token(TokenKind::TagName(name), start, line, column));
        }

        Err(self.error(format!("Invalid tag name starting with '{}'", self.peek())))
    }

    // --- Tag body mode ---

    /// Scan one element of a tag body or the closing `$}`.
    fn scan_tag_def(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        if self.is_at_end() {
            return Ok(self.make_token(TokenKind::Eof, self.pos, self.line, self.column));
        }

        let (start, line, column) = (self.pos, self.line, self.column);
        let ch = self.peek();

        match ch {
            '$' if self.peek_next() == '}' => {
                self.advance();
                self.advance();
                Ok(self.make_token(TokenKind::EndTag, start, line, column))
            }

            c if c.is_alphabetic() => {
                let name = self.scan_identifier();
                Ok(self.make_token(TokenKind::Variable(name), start, line, column))
            }

            // A minus directly before a digit belongs to the number: `a-1` is `a` then `-1`.
            c if c.is_ascii_digit() || (c == '-' && self.peek_next().is_ascii_digit()) => {
                self.scan_number()
            }

            '"' => self.scan_string(),

            '@' => {
                self.advance(); // consume @
                if !self.peek().is_alphabetic() {
                    return Err(self.error("Invalid function name".into()));
                }
                let name = self.scan_identifier();
                Ok(self.make_token(TokenKind::Function(name), start, line, column))
            }

            c if is_operator(c) => {
                self.advance();
                Ok(self.make_token(TokenKind::Operator(c), start, line, column))
            }

            _ => Err(self.error(format!("Unexpected character in tag: '{ch}'"))),
        }
    }

    /// Scan an identifier: a letter followed by letters, digits, or underscores.
    fn scan_identifier(&mut self) -> String {
        let mut ident = String::new();
        ident.push(self.peek());
        self.advance();

        while !self.is_at_end()
            && (self.peek().is_alphabetic() || self.peek().is_ascii_digit() || self.peek() == '_')
        {
            ident.push(self.peek());
            self.advance();
        }

        ident
    }

    /// Scan an integer or double literal with an optional leading minus.
    /// A trailing `.` without digits reads as `.0`.
    fn scan_number(&mut self) -> Result<Token, LexerError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let mut text = String::new();

        if self.peek() == '-' {
            text.push('-');
            self.advance();
        }

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            text.push(self.peek());
            self.advance();
        }

        if self.peek() == '.' {
            text.push('.');
            self.advance();

            if self.peek().is_ascii_digit() {
                while !self.is_at_end() && self.peek().is_ascii_digit() {
                    text.push(self.peek());
                    self.advance();
                }
            } else {
                text.push('0');
            }

            let value: f64 = text.parse().map_err(|_| LexerError {
                message: format!("Invalid double number: '{text}'"),
                index: start,
                line,
                column,
            })?;
            return Ok(self.make_token(TokenKind::Double(value), start, line, column));
        }

        let value: i32 = text.parse().map_err(|_| LexerError {
            message: format!("Invalid integer number: '{text}'"),
            index: start,
            line,
            column,
        })?;
        Ok(self.make_token(TokenKind::Integer(value), start, line, column))
    }

    /// Scan a double-quoted string literal.
    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        self.advance(); // consume opening quote

        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\\' {
                let escaped = match self.peek_next() {
                    '\\' => '\\',
                    '"' => '"',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    _ => return Err(self.error("Invalid escape sequence in string".into())),
                };
                value.push(escaped);
                self.advance();
                self.advance();
            } else {
                value.push(self.peek());
                self.advance();
            }
        }

        if self.is_at_end() {
            return Err(LexerError {
                message: "Unterminated string".into(),
                index: start,
                line,
                column,
            });
        }

        self.advance(); // consume closing quote
        Ok(self.make_token(TokenKind::String(value), start, line, column))
    }

    // --- Helpers ---

    fn make_token(&self, kind: TokenKind, start: usize, line: usize, column: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos, line, column))
    }

    fn at_tag_open(&self) -> bool {
        self.peek() == '{' && self.peek_next() == '$'
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.pos]
        }
    }

    fn peek_next(&self) -> char {
        if self.pos + 1 >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.pos + 1]
        }
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            if self.chars[self.pos] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, message: String) -> LexerError {
        LexerError {
            message,
            index: self.pos,
            line: self.line,
            column: self.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: tokenize and return token kinds (ignoring spans).
    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    /// Helper: lex a single tag body in tag-definition mode.
    fn tag_body(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        lexer.set_mode(LexerMode::TagDef);
        let mut out = Vec::new();
        loop {
            let kind = lexer.next_token().unwrap().kind;
            if kind == TokenKind::Eof {
                return out;
            }
            out.push(kind);
        }
    }

    // =========================================================================
    // Text mode
    // =========================================================================

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(
            kinds("Hello, world!\n"),
            vec![TokenKind::Text("Hello, world!\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_text_escapes() {
        assert_eq!(
            kinds(r"a \{$ b \\ c"),
            vec![TokenKind::Text(r"a {$ b \ c".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_text_invalid_escape() {
        let err = Lexer::tokenize(r"abc\n").unwrap_err();
        assert!(err.message.contains("escape"));
        assert_eq!(err.index, 3);
    }

    #[test]
    fn test_text_trailing_backslash() {
        assert!(Lexer::tokenize("abc\\").is_err());
    }

    #[test]
    fn test_lone_brace_is_text() {
        assert_eq!(
            kinds("{ $ }"),
            vec![TokenKind::Text("{ $ }".into()), TokenKind::Eof]
        );
    }

    // =========================================================================
    // Tags
    // =========================================================================

    #[test]
    fn test_echo_tag() {
        assert_eq!(
            kinds("A{$= i 1 $}B"),
            vec![
                TokenKind::Text("A".into()),
                TokenKind::StartTag,
                TokenKind::TagName("=".into()),
                TokenKind::Variable("i".into()),
                TokenKind::Integer(1),
                TokenKind::EndTag,
                TokenKind::Text("B".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_for_tag_name_with_whitespace() {
        assert_eq!(
            kinds("{$  FOR i 1 10 $}"),
            vec![
                TokenKind::StartTag,
                TokenKind::TagName("FOR".into()),
                TokenKind::Variable("i".into()),
                TokenKind::Integer(1),
                TokenKind::Integer(10),
                TokenKind::EndTag,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tag_name_without_space_before_variable() {
        // `{$=i$}`: the tag name is only the `=`
        assert_eq!(
            kinds("{$=i$}"),
            vec![
                TokenKind::StartTag,
                TokenKind::TagName("=".into()),
                TokenKind::Variable("i".into()),
                TokenKind::EndTag,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_tag_name() {
        let err = Lexer::tokenize("{$ 1 $}").unwrap_err();
        assert!(err.message.contains("Invalid tag name"));
        assert_eq!(err.index, 3);
    }

    #[test]
    fn test_tag_name_at_end_of_input() {
        assert!(Lexer::tokenize("{$   ").is_err());
    }

    #[test]
    fn test_unterminated_tag_ends_with_eof() {
        assert_eq!(
            kinds("{$= a"),
            vec![
                TokenKind::StartTag,
                TokenKind::TagName("=".into()),
                TokenKind::Variable("a".into()),
                TokenKind::Eof,
            ]
        );
    }

    // =========================================================================
    // Tag bodies
    // =========================================================================

    #[test]
    fn test_identifiers() {
        assert_eq!(
            tag_body("a_1 Bcd9"),
            vec![
                TokenKind::Variable("a_1".into()),
                TokenKind::Variable("Bcd9".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tag_body("12 -3 4.25 -0.5 7."),
            vec![
                TokenKind::Integer(12),
                TokenKind::Integer(-3),
                TokenKind::Double(4.25),
                TokenKind::Double(-0.5),
                TokenKind::Double(7.0),
            ]
        );
    }

    #[test]
    fn test_minus_folds_into_number() {
        assert_eq!(
            tag_body("a-1"),
            vec![TokenKind::Variable("a".into()), TokenKind::Integer(-1)]
        );
    }

    #[test]
    fn test_minus_with_space_is_operator() {
        assert_eq!(
            tag_body("a - 1"),
            vec![
                TokenKind::Variable("a".into()),
                TokenKind::Operator('-'),
                TokenKind::Integer(1),
            ]
        );
    }

    #[test]
    fn test_integer_overflow() {
        let mut lexer = Lexer::new("99999999999");
        lexer.set_mode(LexerMode::TagDef);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tag_body("+ * / ^ -"),
            vec![
                TokenKind::Operator('+'),
                TokenKind::Operator('*'),
                TokenKind::Operator('/'),
                TokenKind::Operator('^'),
                TokenKind::Operator('-'),
            ]
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            tag_body("@sin @paramGet"),
            vec![
                TokenKind::Function("sin".into()),
                TokenKind::Function("paramGet".into()),
            ]
        );
    }

    #[test]
    fn test_invalid_function_name() {
        let mut lexer = Lexer::new("@1");
        lexer.set_mode(LexerMode::TagDef);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tag_body(r#""a\"b\\c\nd\re\tf""#),
            vec![TokenKind::String("a\"b\\c\nd\re\tf".into())]
        );
    }

    #[test]
    fn test_string_invalid_escape() {
        let mut lexer = Lexer::new(r#""a\qb""#);
        lexer.set_mode(LexerMode::TagDef);
        assert!(lexer.next_token().unwrap_err().message.contains("escape"));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        lexer.set_mode(LexerMode::TagDef);
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("Unterminated"));
        assert_eq!(err.index, 0);
    }

    #[test]
    fn test_unexpected_character_in_tag() {
        let mut lexer = Lexer::new("#");
        lexer.set_mode(LexerMode::TagDef);
        assert!(lexer.next_token().unwrap_err().message.contains("Unexpected character"));
    }

    // =========================================================================
    // EOF handling and spans
    // =========================================================================

    #[test]
    fn test_next_after_eof_fails() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Text("x".into()));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_last_token_is_remembered() {
        let mut lexer = Lexer::new("x");
        assert!(lexer.token().is_none());
        lexer.next_token().unwrap();
        assert_eq!(lexer.token().unwrap().kind, TokenKind::Text("x".into()));
    }

    #[test]
    fn test_span_line_column() {
        let toks = Lexer::tokenize("line one\n{$= x $}").unwrap();
        let x = toks
            .iter()
            .find(|t| t.kind == TokenKind::Variable("x".into()))
            .unwrap();
        assert_eq!(x.span.line, 2);
        assert_eq!(x.span.column, 5);
        assert_eq!(x.span.start, 13);
    }
}
