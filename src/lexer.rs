use core::fmt;

pub use logos::Span;
use logos::{Logos, SpannedIter};
use num_bigint::BigInt;

/// Kinds of tokens the source is split into.
///
/// The rule set is compiled into the type by `logos`, so there is no runtime
/// table to share or mutate between scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos)]
#[logos(error = LexerError)]
pub enum TokenKind {
    // may span several lines
    #[regex(r"\s+")]
    Whitespace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex("0|[1-9][0-9]*")]
    Integer,
    // Only `\"` and `\\` are escapes, and raw line breaks are rejected
    #[regex(r#""([^\n"\\]|\\["\\])*""#)]
    String,
    #[regex(r"[a-zA-Z+\-*/_][a-zA-Z0-9+\-*/_?]*")]
    Atom,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Whitespace => write!(f, "whitespace"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::Integer => write!(f, "integer"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Atom => write!(f, "atom"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("unrecognized input")]
    UnrecognizedInput,
    /// Only from [`unescape_string`]. Text the tokenizer labels
    /// [`TokenKind::String`] always decodes.
    #[error("malformed string literal")]
    MalformedString,
    /// Only from [`parse_integer`]. Text the tokenizer labels
    /// [`TokenKind::Integer`] always decodes.
    #[error("malformed integer literal")]
    MalformedInteger,
}

/// A [`LexerError`] together with where it happened.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
#[error("{kind} at {}..{}", .span.start, .span.end)]
pub struct LexError {
    pub kind: LexerError,
    pub span: Span,
}

/// A token borrowing its raw text from the source it was lexed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

/// Splits source text into [`Token`]s.
///
/// A tokenizer is a plain value: every call to [`Tokenizer::tokenize`] starts
/// an independent scan, so any number of scans may run side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokenizer {
    skip_whitespace: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tokenizer that never yields [`TokenKind::Whitespace`].
    pub fn skipping_whitespace() -> Self {
        Self {
            skip_whitespace: true,
        }
    }

    pub fn tokenize<'src>(&self, source: &'src str) -> Tokens<'src> {
        Tokens {
            inner: TokenKind::lexer(source).spanned(),
            source,
            skip_whitespace: self.skip_whitespace,
        }
    }
}

/// Lazy token stream over one source string.
pub struct Tokens<'src> {
    inner: SpannedIter<'src, TokenKind>,
    source: &'src str,
    skip_whitespace: bool,
}

impl<'src> Iterator for Tokens<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (kind, span) = self.inner.next()?;
            match kind {
                Ok(TokenKind::Whitespace) if self.skip_whitespace => continue,
                Ok(kind) => {
                    return Some(Ok(Token {
                        kind,
                        text: &self.source[span.clone()],
                        span,
                    }))
                }
                Err(kind) => return Some(Err(LexError { kind, span })),
            }
        }
    }
}

/// Resolves the escapes of a string token's raw text (quotes included).
pub fn unescape_string(raw: &str) -> Result<Box<str>, LexerError> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or(LexerError::MalformedString)?;

    let mut string = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => string.push(escaped),
                _ => return Err(LexerError::MalformedString),
            },
            '"' | '\n' => return Err(LexerError::MalformedString),
            c => string.push(c),
        }
    }

    Ok(Box::from(string.as_str()))
}

/// Decodes the text of an integer token: `0`, or digits without a leading
/// zero. Signs are not part of the literal.
pub fn parse_integer(raw: &str) -> Result<BigInt, LexerError> {
    let well_formed = match raw.as_bytes() {
        [] => false,
        [b'0', _, ..] => false,
        digits => digits.iter().all(u8::is_ascii_digit),
    };
    if !well_formed {
        return Err(LexerError::MalformedInteger);
    }
    raw.parse().map_err(|_| LexerError::MalformedInteger)
}

/// Escapes a string value so that it lexes back to itself.
pub fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}
