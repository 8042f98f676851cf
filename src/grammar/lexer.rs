use crate::error::{self, SourceMetadata, Span};
use std::fmt;
use thiserror::Error;

/// How the source delimits blocks and statements.
///
/// `Braces` is the C-style default: newlines are plain whitespace. In
/// `Offside` framing the lexer emits a `newline` token per physical line
/// plus `indent`/`dedent` tokens derived from the leading whitespace of
/// each non-blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Braces,
    Offside,
}

pub type LexError = error::Error<LexErrorKind>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unknown character {0:?}")]
    UnexpectedChar(char),
    #[error("integer literal does not fit in a signed 64-bit value")]
    IntegerOverflow,
    #[error("inconsistent indentation: no enclosing block at this width")]
    IndentationMismatch,
    #[error("stray '|' (did you mean '||'?)")]
    StrayPipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'source> {
    pub kind: TokenKind,
    pub source: Source<'source>,
}

/// The slice of input a token was produced from, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source<'source> {
    pub span: Span,
    pub source: &'source str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident,
    IntLit,
    Semi,
    Colon,
    Comma,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Op(Operator),
    Newline,
    Indent,
    Dedent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Return,
    Int,
    Bool,
    Void,
    True,
    False,
    If,
    Else,
    While,
    For,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Assign,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    Bang,
    Ampersand,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Keyword {
    fn from_ident(text: &str) -> Option<Self> {
        Some(match text {
            "return" => Self::Return,
            "int" => Self::Int,
            "bool" => Self::Bool,
            "void" => Self::Void,
            "true" => Self::True,
            "false" => Self::False,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Return => "return",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Void => "void",
            Self::True => "true",
            Self::False => "false",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::For => "for",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "keyword '{}'", self.as_str())
    }
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::EqualEqual => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::Bang => "!",
            Self::Ampersand => "&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "operator `{}`", self.as_str())
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Keyword(kw) => kw.fmt(f),
            Self::Ident => write!(f, "identifier"),
            Self::IntLit => write!(f, "integer literal"),
            Self::Semi => write!(f, "semicolon ';'"),
            Self::Colon => write!(f, "colon ':'"),
            Self::Comma => write!(f, "comma ','"),
            Self::OpenParen => write!(f, "opening parenthesis '('"),
            Self::CloseParen => write!(f, "closing parenthesis ')'"),
            Self::OpenBrace => write!(f, "opening brace '{{'"),
            Self::CloseBrace => write!(f, "closing brace '}}'"),
            Self::OpenBracket => write!(f, "opening bracket '['"),
            Self::CloseBracket => write!(f, "closing bracket ']'"),
            Self::Op(op) => op.fmt(f),
            Self::Newline => write!(f, "end of line"),
            Self::Indent => write!(f, "indented block"),
            Self::Dedent => write!(f, "end of indented block"),
        }
    }
}

/// Tab stops round the current indentation width up to the next multiple
/// of this.
const TAB_STOP: usize = 8;

/// Scan the whole input into a token vector. The vector end is the
/// end-of-input marker; in `Offside` framing any still-open indentation
/// levels are closed with trailing `Dedent` tokens.
pub fn tokenize<'s>(
    meta: &'s SourceMetadata<'s>,
    framing: Framing,
) -> Result<Vec<Token<'s>>, LexError> {
    Lexer::new(meta, framing).run()
}

struct Lexer<'s> {
    input: std::iter::Peekable<std::str::CharIndices<'s>>,
    meta: &'s SourceMetadata<'s>,
    framing: Framing,
    indent_stack: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token<'s>>,
}

impl<'s> Lexer<'s> {
    fn new(meta: &'s SourceMetadata<'s>, framing: Framing) -> Self {
        Self {
            input: meta.input().char_indices().peekable(),
            meta,
            framing,
            indent_stack: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token<'s>>, LexError> {
        loop {
            if self.framing == Framing::Offside && self.at_line_start {
                self.measure_indentation()?;
                self.at_line_start = false;
            }
            self.skip_blanks();
            match self.input.peek().copied() {
                None => break,
                Some((pos, '\n')) => {
                    self.advance();
                    if self.framing == Framing::Offside {
                        self.push(TokenKind::Newline, pos, 1);
                        self.at_line_start = true;
                    }
                }
                Some((pos, ch)) => self.scan_token(pos, ch)?,
            }
        }
        if self.framing == Framing::Offside {
            let end = self.meta.input().len();
            while self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                self.push(TokenKind::Dedent, end, 0);
            }
        }
        Ok(self.tokens)
    }

    /// Compare the leading whitespace of the current line against the
    /// indentation stack, emitting `Indent`/`Dedent` tokens as needed.
    /// Blank and comment-only lines leave the block structure alone.
    fn measure_indentation(&mut self) -> Result<(), LexError> {
        let line_start = self.current_offset();
        let mut width = 0usize;
        loop {
            match self.input.peek() {
                Some((_, ' ')) => {
                    width += 1;
                    self.advance();
                }
                Some((_, '\t')) => {
                    width = (width / TAB_STOP + 1) * TAB_STOP;
                    self.advance();
                }
                _ => break,
            }
        }
        let content = self.current_offset();
        let next = self.input.peek().map(|(_, ch)| *ch);
        match next {
            None => return Ok(()),
            Some('\n') => return Ok(()),
            Some('/') if self.rest().starts_with("//") => return Ok(()),
            Some(_) => {}
        }
        let top = self.indent_stack.last().copied().unwrap_or(0);
        if width > top {
            self.indent_stack.push(width);
            self.push_spanned(TokenKind::Indent, Span::with_len(line_start, content - line_start));
        } else if width < top {
            while self.indent_stack.last().copied().unwrap_or(0) > width {
                self.indent_stack.pop();
                self.push_spanned(TokenKind::Dedent, Span::with_len(content, 0));
            }
            if self.indent_stack.last().copied().unwrap_or(0) != width {
                return Err(self.error(content, LexErrorKind::IndentationMismatch));
            }
        }
        Ok(())
    }

    fn scan_token(&mut self, pos: usize, ch: char) -> Result<(), LexError> {
        match ch {
            'A'..='Z' | 'a'..='z' => self.identifier(pos),
            '0'..='9' => self.number(pos)?,
            ';' => self.single(pos, TokenKind::Semi),
            ':' => self.single(pos, TokenKind::Colon),
            ',' => self.single(pos, TokenKind::Comma),
            '(' => self.single(pos, TokenKind::OpenParen),
            ')' => self.single(pos, TokenKind::CloseParen),
            '{' => self.single(pos, TokenKind::OpenBrace),
            '}' => self.single(pos, TokenKind::CloseBrace),
            '[' => self.single(pos, TokenKind::OpenBracket),
            ']' => self.single(pos, TokenKind::CloseBracket),
            '+' => self.single(pos, TokenKind::Op(Operator::Plus)),
            '-' => self.single(pos, TokenKind::Op(Operator::Minus)),
            '*' => self.single(pos, TokenKind::Op(Operator::Star)),
            '/' => self.single(pos, TokenKind::Op(Operator::Slash)),
            '<' => self.single(pos, TokenKind::Op(Operator::Less)),
            '>' => self.single(pos, TokenKind::Op(Operator::Greater)),
            '=' => self.one_or_two(pos, '=', Operator::EqualEqual, Operator::Assign),
            '!' => self.one_or_two(pos, '=', Operator::NotEqual, Operator::Bang),
            '&' => self.one_or_two(pos, '&', Operator::AndAnd, Operator::Ampersand),
            '|' => {
                self.advance();
                if self.eat_char('|') {
                    self.push(TokenKind::Op(Operator::OrOr), pos, 2);
                } else {
                    return Err(self.error(pos, LexErrorKind::StrayPipe));
                }
            }
            other => return Err(self.error(pos, LexErrorKind::UnexpectedChar(other))),
        }
        Ok(())
    }

    fn identifier(&mut self, start: usize) {
        self.advance();
        while matches!(self.input.peek(), Some((_, ch)) if ch.is_ascii_alphanumeric()) {
            self.advance();
        }
        let end = self.current_offset();
        let text = &self.meta.input()[start..end];
        let kind = match Keyword::from_ident(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident,
        };
        self.push(kind, start, end - start);
    }

    fn number(&mut self, start: usize) -> Result<(), LexError> {
        self.advance();
        while matches!(self.input.peek(), Some((_, ch)) if ch.is_ascii_digit()) {
            self.advance();
        }
        let end = self.current_offset();
        let text = &self.meta.input()[start..end];
        if text.parse::<i64>().is_err() {
            return Err(self.error(start, LexErrorKind::IntegerOverflow));
        }
        self.push(TokenKind::IntLit, start, end - start);
        Ok(())
    }

    fn single(&mut self, pos: usize, kind: TokenKind) {
        self.advance();
        self.push(kind, pos, 1);
    }

    fn one_or_two(&mut self, pos: usize, second: char, double: Operator, single: Operator) {
        self.advance();
        if self.eat_char(second) {
            self.push(TokenKind::Op(double), pos, 2);
        } else {
            self.push(TokenKind::Op(single), pos, 1);
        }
    }

    /// Skip horizontal whitespace and line comments. Stops right before a
    /// newline so `run` can frame it.
    fn skip_blanks(&mut self) {
        loop {
            let next = self.input.peek().map(|(_, ch)| *ch);
            match next {
                Some(' ' | '\t' | '\r') => self.advance(),
                Some('/') if self.rest().starts_with("//") => {
                    while matches!(self.input.peek(), Some((_, ch)) if *ch != '\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if matches!(self.input.peek(), Some((_, c)) if *c == ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        self.input.next();
    }

    fn rest(&mut self) -> &'s str {
        let offset = self.current_offset();
        &self.meta.input()[offset..]
    }

    fn current_offset(&mut self) -> usize {
        self.input
            .peek()
            .map(|(x, _)| *x)
            .unwrap_or_else(|| self.meta.input().len())
    }

    fn push(&mut self, kind: TokenKind, offset: usize, len: usize) {
        self.push_spanned(kind, Span::with_len(offset, len));
    }

    fn push_spanned(&mut self, kind: TokenKind, span: Span) {
        let source = &self.meta.input()[span.offset..span.offset + span.len];
        self.tokens.push(Token {
            kind,
            source: Source { span, source },
        });
    }

    fn error(&self, position: usize, kind: LexErrorKind) -> LexError {
        LexError::new(kind).with_source(Span::new(position), self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let meta = SourceMetadata::new(source);
        tokenize(&meta, Framing::Braces)
            .expect("expected lexing to succeed")
            .into_iter()
            .map(|tok| tok.kind)
            .collect()
    }

    fn lex_offside(source: &str) -> Vec<TokenKind> {
        let meta = SourceMetadata::new(source);
        tokenize(&meta, Framing::Offside)
            .expect("expected lexing to succeed")
            .into_iter()
            .map(|tok| tok.kind)
            .collect()
    }

    fn lex_err(source: &str, framing: Framing) -> LexErrorKind {
        let meta = SourceMetadata::new(source);
        tokenize(&meta, framing)
            .expect_err("expected lexing to fail")
            .kind
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            lex("return int bool void true false if else while for main x1"),
            vec![
                TokenKind::Keyword(Keyword::Return),
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Keyword(Keyword::Bool),
                TokenKind::Keyword(Keyword::Void),
                TokenKind::Keyword(Keyword::True),
                TokenKind::Keyword(Keyword::False),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::While),
                TokenKind::Keyword(Keyword::For),
                TokenKind::Ident,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn greedy_operators() {
        assert_eq!(
            lex("= == != ! < > & && || + - * /"),
            vec![
                TokenKind::Op(Operator::Assign),
                TokenKind::Op(Operator::EqualEqual),
                TokenKind::Op(Operator::NotEqual),
                TokenKind::Op(Operator::Bang),
                TokenKind::Op(Operator::Less),
                TokenKind::Op(Operator::Greater),
                TokenKind::Op(Operator::Ampersand),
                TokenKind::Op(Operator::AndAnd),
                TokenKind::Op(Operator::OrOr),
                TokenKind::Op(Operator::Plus),
                TokenKind::Op(Operator::Minus),
                TokenKind::Op(Operator::Star),
                TokenKind::Op(Operator::Slash),
            ]
        );
    }

    #[test]
    fn adjacent_equals_split_greedily() {
        // `===` must lex as `==` then `=`
        assert_eq!(
            lex("==="),
            vec![
                TokenKind::Op(Operator::EqualEqual),
                TokenKind::Op(Operator::Assign),
            ]
        );
    }

    #[test]
    fn comments_and_newlines_are_discarded() {
        assert_eq!(
            lex("int x; // trailing note\n// a whole line\nx = 2;"),
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Ident,
                TokenKind::Op(Operator::Assign),
                TokenKind::IntLit,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn spans_lie_within_the_source() {
        let source = "int main() { return 1 + 2; }";
        let meta = SourceMetadata::new(source);
        for token in tokenize(&meta, Framing::Braces).unwrap() {
            let span = token.source.span;
            assert!(span.offset + span.len <= source.len());
            assert_eq!(token.source.source, &source[span.offset..span.offset + span.len]);
        }
    }

    #[test]
    fn lexemes_preserve_the_input() {
        // concatenating lexemes reproduces the input minus whitespace/comments
        let source = "int x = 5; // init\nreturn x == 5;";
        let meta = SourceMetadata::new(source);
        let glued: String = tokenize(&meta, Framing::Braces)
            .unwrap()
            .into_iter()
            .map(|tok| tok.source.source)
            .collect();
        let stripped: String = source
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect::<String>()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        assert_eq!(glued, stripped);
    }

    #[test]
    fn stray_pipe_is_rejected() {
        assert_eq!(lex_err("a | b", Framing::Braces), LexErrorKind::StrayPipe);
    }

    #[test]
    fn unknown_character_is_rejected() {
        assert_eq!(
            lex_err("int $;", Framing::Braces),
            LexErrorKind::UnexpectedChar('$')
        );
    }

    #[test]
    fn overflowing_literal_is_rejected() {
        assert_eq!(
            lex_err("99999999999999999999", Framing::Braces),
            LexErrorKind::IntegerOverflow
        );
    }

    #[test]
    fn offside_framing_emits_balanced_indents() {
        let kinds = lex_offside("while x:\n    x = 1\ny = 2\n");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
        assert!(kinds.contains(&TokenKind::Newline));
    }

    #[test]
    fn offside_flushes_dedents_at_eof() {
        // no trailing newline, two levels still open at the end
        let kinds = lex_offside("a:\n  b:\n    c = 1");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
    }

    #[test]
    fn offside_blank_and_comment_lines_are_inert() {
        let kinds = lex_offside("a:\n    x = 1\n\n    // note\n    y = 2\n");
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn offside_tabs_round_to_eight() {
        let kinds = lex_offside("a:\n\tx = 1\n        y = 2\n");
        // tab and eight spaces are the same level: one indent, one dedent
        let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn offside_rejects_mismatched_dedent() {
        assert_eq!(
            lex_err("a:\n        x = 1\n    y = 2\n", Framing::Offside),
            LexErrorKind::IndentationMismatch
        );
    }
}
