use crate::parser::ast::{SourceId, Span};
use phf_macros::phf_map;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// A token represents a single meaningful unit in the source code with its position.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The kind of token.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    Comma,
    Colon,
    Dot,
    Star,
    Amp,
    Equal,
    Arrow,
    Ellipsis,

    Identifier(String),
    String(String),
    /// A backtick-quoted field tag, such as `` `-` ``.
    Tag(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),

    Package,
    Import,
    As,
    Struct,
    Interface,
    Impl,
    Fn,
    Const,
    Let,
    Return,
    Cleanup,
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Ellipsis => write!(f, "..."),

            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Tag(s) => write!(f, "`{}`", s),
            TokenKind::Integer(i) => write!(f, "{}", i),
            TokenKind::Float(d) => write!(f, "{}", d),
            TokenKind::Boolean(b) => write!(f, "{}", b),

            TokenKind::Package => write!(f, "package"),
            TokenKind::Import => write!(f, "import"),
            TokenKind::As => write!(f, "as"),
            TokenKind::Struct => write!(f, "struct"),
            TokenKind::Interface => write!(f, "interface"),
            TokenKind::Impl => write!(f, "impl"),
            TokenKind::Fn => write!(f, "fn"),
            TokenKind::Const => write!(f, "const"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::Cleanup => write!(f, "cleanup"),
            TokenKind::Error => write!(f, "error"),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "package" => TokenKind::Package,
    "import" => TokenKind::Import,
    "as" => TokenKind::As,
    "struct" => TokenKind::Struct,
    "interface" => TokenKind::Interface,
    "impl" => TokenKind::Impl,
    "fn" => TokenKind::Fn,
    "const" => TokenKind::Const,
    "let" => TokenKind::Let,
    "return" => TokenKind::Return,
    "cleanup" => TokenKind::Cleanup,
    "error" => TokenKind::Error,
    "true" => TokenKind::Boolean(true),
    "false" => TokenKind::Boolean(false),
};

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Errors that can occur during lexical analysis.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar(usize),
    #[error("unterminated string")]
    UnterminatedString(usize),
    #[error("unterminated tag")]
    UnterminatedTag(usize),
    #[error("malformed number")]
    MalformedNumber(usize),
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedChar(pos)
            | LexError::UnterminatedString(pos)
            | LexError::UnterminatedTag(pos)
            | LexError::MalformedNumber(pos) => *pos,
        }
    }
}

/// A lexical analyzer that converts weft source code into a stream of tokens.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    position: usize,
    source: SourceId,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str, source: SourceId) -> Self {
        Self {
            input: input.chars().peekable(),
            position: 0,
            source,
        }
    }

    /// Collects all tokens from the input, separating successful tokens from errors.
    pub fn collect_all(&mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(err) => errors.push(err),
            }
        }

        (tokens, errors)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.input.peek() == Some(&expected) {
            self.input.next();
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if ch.is_whitespace() {
                self.input.next();
                self.position += 1;
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.input.next();
        self.position += 1;

        while let Some(&ch) = self.input.peek() {
            self.input.next();
            self.position += 1;
            if ch == '\n' {
                break;
            }
        }
    }

    fn parse_delimited(
        &mut self,
        close: char,
        start: usize,
        err: fn(usize) -> LexError,
    ) -> Result<String, LexError> {
        let mut value = String::new();

        loop {
            let ch = self.input.next().ok_or(err(start))?;
            self.position += 1;
            match ch {
                ch if ch == close => return Ok(value),
                '\\' => match self.input.next() {
                    Some(escaped) if escaped == close => {
                        self.position += 1;
                        value.push(escaped);
                    }
                    Some(escaped) => {
                        self.position += 1;
                        value.push('\\');
                        value.push(escaped);
                    }
                    None => return Err(err(start)),
                },
                ch => value.push(ch),
            }
        }
    }

    fn parse_number(&mut self, start: usize, first: char) -> Result<TokenKind, LexError> {
        let mut num_str = String::from(first);
        let mut has_decimal = false;

        while let Some(&ch) = self.input.peek() {
            match ch {
                // `1..` would swallow the ellipsis start, so a dot only joins
                // the number when a digit follows it.
                '.' if !has_decimal => {
                    let mut lookahead = self.input.clone();
                    lookahead.next();
                    if !matches!(lookahead.peek(), Some('0'..='9')) {
                        break;
                    }
                    has_decimal = true;
                    num_str.push(ch);
                    self.input.next();
                    self.position += 1;
                }
                '0'..='9' => {
                    num_str.push(ch);
                    self.input.next();
                    self.position += 1;
                }
                _ => break,
            }
        }

        if has_decimal {
            num_str
                .parse()
                .map(TokenKind::Float)
                .map_err(|_| LexError::MalformedNumber(start))
        } else {
            num_str
                .parse()
                .map(TokenKind::Integer)
                .map_err(|_| LexError::MalformedNumber(start))
        }
    }

    fn parse_identifier(&mut self, first: char) -> TokenKind {
        let mut result = String::from(first);
        while let Some(&ch) = self.input.peek() {
            if !is_ident_continue(ch) {
                break;
            }
            result.push(ch);
            self.input.next();
            self.position += 1;
        }
        KEYWORDS
            .get(result.as_str())
            .cloned()
            .unwrap_or(TokenKind::Identifier(result))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();

        let start = self.position;

        let ch = self.input.next()?;
        self.position += 1;

        let result = match ch {
            '(' => Ok(TokenKind::LeftParen),
            ')' => Ok(TokenKind::RightParen),
            '{' => Ok(TokenKind::LeftBrace),
            '}' => Ok(TokenKind::RightBrace),
            ',' => Ok(TokenKind::Comma),
            ':' => Ok(TokenKind::Colon),
            '*' => Ok(TokenKind::Star),
            '&' => Ok(TokenKind::Amp),
            '=' => Ok(TokenKind::Equal),

            '.' => {
                if self.match_next('.') {
                    if self.match_next('.') {
                        Ok(TokenKind::Ellipsis)
                    } else {
                        Err(LexError::UnexpectedChar(start))
                    }
                } else {
                    Ok(TokenKind::Dot)
                }
            }

            '-' => {
                if self.match_next('>') {
                    Ok(TokenKind::Arrow)
                } else {
                    Err(LexError::UnexpectedChar(start))
                }
            }

            '/' if self.input.peek() == Some(&'/') => {
                self.skip_line_comment();
                return self.next();
            }

            '"' => self
                .parse_delimited('"', start, LexError::UnterminatedString)
                .map(TokenKind::String),
            '`' => self
                .parse_delimited('`', start, LexError::UnterminatedTag)
                .map(TokenKind::Tag),

            '0'..='9' => self.parse_number(start, ch),

            ch if is_ident_start(ch) => Ok(self.parse_identifier(ch)),

            _ => Err(LexError::UnexpectedChar(start)),
        };

        let end = self.position;
        let span = Span {
            start,
            end,
            context: self.source,
        };
        Some(result.map(|kind| Token::new(kind, span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(input, SourceId::SYNTHETIC).collect_all();
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("fn NewConfig"),
            vec![
                TokenKind::Fn,
                TokenKind::Identifier("NewConfig".to_string())
            ]
        );
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            kinds("-> ... * &"),
            vec![
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::Star,
                TokenKind::Amp
            ]
        );
    }

    #[test]
    fn tag_literal() {
        assert_eq!(kinds("`-`"), vec![TokenKind::Tag("-".to_string())]);
    }

    #[test]
    fn string_literal() {
        assert_eq!(
            kinds("\"example.com/app\""),
            vec![TokenKind::String("example.com/app".to_string())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("42 3.5"),
            vec![TokenKind::Integer(42), TokenKind::Float(3.5)]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("fn // comment\nlet"),
            vec![TokenKind::Fn, TokenKind::Let]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        let (_, errors) = Lexer::new("\"oops", SourceId::SYNTHETIC).collect_all();
        assert_eq!(errors, vec![LexError::UnterminatedString(0)]);
    }

    #[test]
    fn spans_cover_tokens() {
        let (tokens, _) = Lexer::new("let x", SourceId::SYNTHETIC).collect_all();
        assert_eq!(tokens[0].span.start, 0);
        assert_eq!(tokens[0].span.end, 3);
        assert_eq!(tokens[1].span.start, 4);
        assert_eq!(tokens[1].span.end, 5);
    }
}
