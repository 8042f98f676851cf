use super::lexer::{Keyword, TokenKind};
use super::{Parse, ParseRes, Parser};
use crate::ast::Program;

impl<'source> Parse<'source> for Program {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        let mut globals = Vec::new();
        let mut functions = Vec::new();
        loop {
            parser.skip_newlines();
            if parser.kind(0).is_none() {
                break;
            }
            // a top-level form is a function iff it starts `type ident (`
            let is_function = matches!(
                parser.kind(0),
                Some(TokenKind::Keyword(Keyword::Int | Keyword::Bool))
            ) && parser.kind(1) == Some(TokenKind::Ident)
                && parser.kind(2) == Some(TokenKind::OpenParen);
            if is_function {
                functions.push(parser.parse()?);
            } else {
                globals.push(parser.parse()?);
            }
        }
        Ok(Self { globals, functions })
    }
}
