use super::lexer::{Keyword, Operator, TokenKind};
use super::{Parse, ParseRes, Parser};
use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};

impl<'source> Parse<'source> for Expr {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing expression", parse_expr)
    }
}

pub(super) fn parse_expr(parser: &mut Parser) -> ParseRes<Expr> {
    parse_logical_or(parser)
}

/// One left-associative precedence layer: parse the tighter layer, then
/// fold in operands as long as the current operator belongs to this layer.
fn binary_layer<'s>(
    parser: &mut Parser<'s>,
    next: fn(&mut Parser<'s>) -> ParseRes<Expr>,
    pick: fn(Operator) -> Option<BinaryOp>,
) -> ParseRes<Expr> {
    let mut lhs = next(parser)?;
    while let Some(op) = current_operator(parser).and_then(pick) {
        parser.advance();
        let rhs = next(parser)?;
        let span = lhs.span.until(rhs.span);
        lhs = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        );
    }
    Ok(lhs)
}

fn current_operator(parser: &Parser) -> Option<Operator> {
    match parser.kind(0) {
        Some(TokenKind::Op(op)) => Some(op),
        _ => None,
    }
}

fn parse_logical_or(parser: &mut Parser) -> ParseRes<Expr> {
    binary_layer(parser, parse_logical_and, |op| match op {
        Operator::OrOr => Some(BinaryOp::LogicOr),
        _ => None,
    })
}

fn parse_logical_and(parser: &mut Parser) -> ParseRes<Expr> {
    binary_layer(parser, parse_comparison, |op| match op {
        Operator::AndAnd => Some(BinaryOp::LogicAnd),
        _ => None,
    })
}

fn parse_comparison(parser: &mut Parser) -> ParseRes<Expr> {
    binary_layer(parser, parse_additive, |op| match op {
        Operator::EqualEqual => Some(BinaryOp::Equals),
        Operator::NotEqual => Some(BinaryOp::NotEquals),
        Operator::Less => Some(BinaryOp::Less),
        Operator::Greater => Some(BinaryOp::Greater),
        _ => None,
    })
}

fn parse_additive(parser: &mut Parser) -> ParseRes<Expr> {
    binary_layer(parser, parse_term, |op| match op {
        Operator::Plus => Some(BinaryOp::Add),
        Operator::Minus => Some(BinaryOp::Subtract),
        _ => None,
    })
}

fn parse_term(parser: &mut Parser) -> ParseRes<Expr> {
    binary_layer(parser, parse_unary, |op| match op {
        Operator::Star => Some(BinaryOp::Multiply),
        Operator::Slash => Some(BinaryOp::Divide),
        _ => None,
    })
}

/// Prefix operators are right-associative: `**p` is `*(*p)`.
pub(super) fn parse_unary(parser: &mut Parser) -> ParseRes<Expr> {
    if let Some(op) = current_operator(parser).and_then(UnaryOp::from_operator) {
        let start = parser.span();
        parser.advance();
        let operand = parse_unary(parser)?;
        let span = start.until(operand.span);
        return Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ));
    }
    parse_factor(parser)
}

fn parse_factor(parser: &mut Parser) -> ParseRes<Expr> {
    match parser.kind(0) {
        Some(TokenKind::IntLit) => {
            // the lexer only accepts digit runs that fit in an i64
            let value = parser.source().parse().unwrap();
            let span = parser.span();
            parser.advance();
            Ok(Expr::new(ExprKind::IntLit(value), span))
        }
        Some(TokenKind::Keyword(Keyword::True)) => {
            let span = parser.span();
            parser.advance();
            Ok(Expr::new(ExprKind::BoolLit(true), span))
        }
        Some(TokenKind::Keyword(Keyword::False)) => {
            let span = parser.span();
            parser.advance();
            Ok(Expr::new(ExprKind::BoolLit(false), span))
        }
        Some(TokenKind::Ident) => match parser.kind(1) {
            Some(TokenKind::OpenParen) => parse_call(parser),
            Some(TokenKind::OpenBracket) => parse_array_access(parser),
            _ => {
                let name = parser.source().to_owned();
                let span = parser.span();
                parser.advance();
                Ok(Expr::new(ExprKind::Identifier(name), span))
            }
        },
        Some(TokenKind::OpenParen) => {
            parser.advance();
            let expr = parse_expr(parser)?;
            parser
                .expect(TokenKind::CloseParen)
                .map_err(|e| e.add_context("closing a parenthesised expression"))?;
            Ok(expr)
        }
        _ => parser.unexpected("literal, identifier or parenthesised expression"),
    }
}

fn parse_call(parser: &mut Parser) -> ParseRes<Expr> {
    parser.with_context("parsing function call", |parser| {
        let callee = parser.source().to_owned();
        let start = parser.span();
        parser.advance();
        parser.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();
        if parser.kind(0) != Some(TokenKind::CloseParen) {
            loop {
                args.push(parser.parse()?);
                if !parser.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = parser.expect(TokenKind::CloseParen)?;
        Ok(Expr::new(
            ExprKind::Call { callee, args },
            start.until(end),
        ))
    })
}

fn parse_array_access(parser: &mut Parser) -> ParseRes<Expr> {
    parser.with_context("parsing array access", |parser| {
        let name = parser.source().to_owned();
        let start = parser.span();
        parser.advance();
        parser.expect(TokenKind::OpenBracket)?;
        let index = parse_expr(parser)?;
        let end = parser.expect(TokenKind::CloseBracket)?;
        Ok(Expr::new(
            ExprKind::ArrayAccess {
                name,
                index: Box::new(index),
            },
            start.until(end),
        ))
    })
}
