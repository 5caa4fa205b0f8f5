//! Parsing starts where the lexer dropped off, and handles nested syntax by
//! recursive descent, producing the top-level [`Expression`]s of a program in
//! source order.
pub mod ast;

use crate::{
    lexer::{parse_integer, unescape_string, LexError, Span, Token, TokenKind, Tokenizer, Tokens},
    Expression, DEFAULT_MAX_DEPTH,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected {kind} at {}..{}", .span.start, .span.end)]
    UnexpectedToken { kind: TokenKind, span: Span },
    #[error("unterminated list opened at {}..{}", .open.start, .open.end)]
    UnterminatedList { open: Span },
    #[error("lists nested deeper than {limit} levels at {}..{}", .span.start, .span.end)]
    TooDeep { limit: usize, span: Span },
}

impl ParseError {
    /// Where in the source the error was detected
    pub fn span(&self) -> Span {
        match self {
            Self::Lex(err) => err.span.clone(),
            Self::UnexpectedToken { span, .. } | Self::TooDeep { span, .. } => span.clone(),
            Self::UnterminatedList { open } => open.clone(),
        }
    }
}

/// A single-use parser over one source string.
pub struct Parser<'src> {
    tokens: Tokens<'src>,
    max_depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(tokenizer: &Tokenizer, source: &'src str) -> Self {
        Self {
            tokens: tokenizer.tokenize(source),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limits how many lists may be nested inside each other.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Consumes the whole token stream. The first error aborts parsing.
    pub fn parse_program(mut self) -> Result<Vec<Expression>, ParseError> {
        let mut expressions = vec![];

        while let Some(token) = self.next_token()? {
            match token.kind {
                TokenKind::LParen => expressions.push(self.parse_list(token.span, 1)?),
                _ => expressions.push(leaf(token)?),
            }
        }

        tracing::debug!(expressions = expressions.len(), "parsed program");
        Ok(expressions)
    }

    fn parse_list(&mut self, open: Span, depth: usize) -> Result<Expression, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.max_depth,
                span: open,
            });
        }

        let mut values = vec![];
        loop {
            let Some(token) = self.next_token()? else {
                return Err(ParseError::UnterminatedList { open });
            };

            match token.kind {
                TokenKind::RParen => return Ok(Expression::List(values)),
                TokenKind::LParen => values.push(self.parse_list(token.span, depth + 1)?),
                _ => values.push(leaf(token)?),
            }
        }
    }

    // next token that is not whitespace
    fn next_token(&mut self) -> Result<Option<Token<'src>>, ParseError> {
        for token in self.tokens.by_ref() {
            let token = token?;
            if token.kind != TokenKind::Whitespace {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }
}

fn leaf(token: Token) -> Result<Expression, ParseError> {
    let malformed = |kind| LexError {
        kind,
        span: token.span.clone(),
    };

    match token.kind {
        TokenKind::Integer => parse_integer(token.text)
            .map(Expression::Integer)
            .map_err(|kind| malformed(kind).into()),
        TokenKind::String => unescape_string(token.text)
            .map(Expression::String)
            .map_err(|kind| malformed(kind).into()),
        TokenKind::Atom => Ok(Expression::Atom(Box::from(token.text))),
        kind @ (TokenKind::Whitespace | TokenKind::LParen | TokenKind::RParen) => {
            Err(ParseError::UnexpectedToken {
                kind,
                span: token.span.clone(),
            })
        }
    }
}
