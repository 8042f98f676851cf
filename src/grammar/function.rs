use super::lexer::{Keyword, Operator, TokenKind};
use super::statement::parse_scope;
use super::{Parse, ParseRes, Parser};
use crate::ast::{BaseType, Function, Param, Type};

/// `type := ('int' | 'bool') '*'*`
pub(super) fn parse_type(parser: &mut Parser) -> ParseRes<Type> {
    let base = match parser.kind(0) {
        Some(TokenKind::Keyword(Keyword::Int)) => BaseType::Int,
        Some(TokenKind::Keyword(Keyword::Bool)) => BaseType::Bool,
        _ => return parser.unexpected("type name ('int' or 'bool')"),
    };
    parser.advance();
    let mut ty = Type::new(base);
    while parser.eat(TokenKind::Op(Operator::Star)) {
        ty = ty.pointer_to();
    }
    Ok(ty)
}

impl<'source> Parse<'source> for Type {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parse_type(parser)
    }
}

impl<'source> Parse<'source> for Function {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing function", |parser| {
            let span = parser.span();
            let return_type = parse_type(parser)?;
            let name = parser.source().to_owned();
            parser.expect(TokenKind::Ident)?;
            parser.expect(TokenKind::OpenParen)?;

            let mut params = Vec::new();
            if parser.kind(0) != Some(TokenKind::CloseParen) {
                loop {
                    let ty = parse_type(parser)?;
                    let param_name = parser.source().to_owned();
                    parser.expect(TokenKind::Ident)?;
                    params.push(Param {
                        name: param_name,
                        ty,
                    });
                    if !parser.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            parser.expect(TokenKind::CloseParen)?;

            let body = parse_scope(parser)?;
            let span = span.until(body.span);
            Ok(Self {
                name,
                params,
                body,
                return_type,
                span,
            })
        })
    }
}
