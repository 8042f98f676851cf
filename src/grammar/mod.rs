use crate::error::{Error, SourceMetadata, Span, WantedSpec};

mod expr;
mod function;
pub mod lexer;
mod program;
mod statement;

use lexer::{Framing, Keyword, LexErrorKind, Token, TokenKind};

/// Predictive recursive-descent parser over the full token vector. All
/// decisions are made with at most three tokens of lookahead
/// (`kind(0)`..`kind(2)`).
pub struct Parser<'source> {
    tokens: Vec<Token<'source>>,
    index: usize,
    meta: &'source SourceMetadata<'source>,
    framing: Framing,
}

pub type ParseRes<T> = Result<T, ParseError>;
pub type ParseError = Error<ParseErrorKind>;

#[derive(Debug)]
pub enum ParseErrorKind {
    Lex(LexErrorKind),
    Expected {
        wanted: WantedSpec<TokenKind>,
        found: TokenKind,
    },
    UnexpectedEof {
        wanted: Option<WantedSpec<TokenKind>>,
    },
    ArraySizeTooSmall,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and set up the parser over the resulting vector.
    pub fn new(source: &'source SourceMetadata<'source>, framing: Framing) -> ParseRes<Self> {
        let tokens =
            lexer::tokenize(source, framing).map_err(|e| e.map_kind(ParseErrorKind::Lex))?;
        Ok(Self {
            tokens,
            index: 0,
            meta: source,
            framing,
        })
    }

    pub const fn framing(&self) -> Framing {
        self.framing
    }

    pub const fn metadata(&self) -> &'source SourceMetadata<'source> {
        self.meta
    }

    fn token(&self, offset: usize) -> Option<&Token<'source>> {
        self.tokens.get(self.index + offset)
    }

    /// Lookahead without consuming; `offset` 0 is the current token.
    pub fn kind(&self, offset: usize) -> Option<TokenKind> {
        self.token(offset).map(|tok| tok.kind)
    }

    /// Span of the current token, or a zero-width span at the end of the
    /// input once the tokens are exhausted.
    pub fn span(&self) -> Span {
        self.token(0).map_or_else(
            || Span::with_len(self.meta.input().len(), 0),
            |tok| tok.source.span,
        )
    }

    /// Source text of the current token. Only valid while `kind(0)` is
    /// `Some`.
    pub fn source(&self) -> &'source str {
        self.token(0).map(|tok| tok.source.source).unwrap_or("")
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Consume the current token if it has the wanted kind.
    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind(0) == Some(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require the current token to have the wanted kind and consume it,
    /// returning its span.
    pub fn expect(&mut self, kind: TokenKind) -> ParseRes<Span> {
        match self.kind(0) {
            Some(found) if found == kind => {
                let span = self.span();
                self.advance();
                Ok(span)
            }
            Some(found) => self.error_here(ParseErrorKind::Expected {
                wanted: WantedSpec::Specific(kind),
                found,
            }),
            None => self.error_here(ParseErrorKind::UnexpectedEof {
                wanted: Some(WantedSpec::Specific(kind)),
            }),
        }
    }

    pub fn keyword(&mut self, kw: Keyword) -> ParseRes<Span> {
        self.expect(TokenKind::Keyword(kw))
    }

    /// Reject the current token (or end of input) while looking for the
    /// described construct.
    pub fn unexpected<T>(&mut self, wanted: &'static str) -> ParseRes<T> {
        match self.kind(0) {
            Some(found) => self.error_here(ParseErrorKind::Expected {
                wanted: WantedSpec::Description(wanted),
                found,
            }),
            None => self.error_here(ParseErrorKind::UnexpectedEof {
                wanted: Some(WantedSpec::Description(wanted)),
            }),
        }
    }

    pub fn error_at<T>(&self, span: Span, kind: ParseErrorKind) -> ParseRes<T> {
        Err(ParseError::new(kind).with_source(span, self.meta))
    }

    fn error_here<T>(&self, kind: ParseErrorKind) -> ParseRes<T> {
        self.error_at(self.span(), kind)
    }

    /// Skip any number of newline tokens (offside framing only emits them;
    /// in braces framing this is a no-op).
    pub fn skip_newlines(&mut self) {
        while self.kind(0) == Some(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Consume a statement terminator: a semicolon, or in offside framing
    /// an end of line (a dedent or the end of input also closes the
    /// statement, without being consumed).
    pub fn terminator(&mut self) -> ParseRes<()> {
        if self.eat(TokenKind::Semi) {
            return Ok(());
        }
        if self.framing == Framing::Offside {
            if self.eat(TokenKind::Newline) {
                return Ok(());
            }
            if matches!(self.kind(0), None | Some(TokenKind::Dedent)) {
                return Ok(());
            }
        }
        self.unexpected("';' to end the statement")
    }

    pub fn parse<T>(&mut self) -> ParseRes<T>
    where
        T: Parse<'source>,
    {
        T::parse(self)
    }

    pub fn with_context<F, T>(&mut self, context: &'static str, mut cont: F) -> ParseRes<T>
    where
        F: FnMut(&mut Self) -> ParseRes<T>,
    {
        cont(self).map_err(|e| e.add_context(context))
    }
}

pub trait Parse<'source>: Sized {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self>;
}

use std::error;
impl error::Error for ParseErrorKind {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        if let Self::Lex(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

use std::fmt;
impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Lex(err) => write!(f, "error while lexing source: {}", err),
            Self::Expected { wanted, found } => {
                write!(f, "expected {}, but found {}", wanted, found)
            }
            Self::UnexpectedEof { wanted } => {
                write!(f, "unexpected end of input")?;
                if let Some(wanted) = wanted {
                    write!(f, ", expected {}", wanted)
                } else {
                    Ok(())
                }
            }
            Self::ArraySizeTooSmall => write!(f, "array size must be at least 1"),
        }
    }
}
