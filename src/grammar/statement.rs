use super::expr::{parse_expr, parse_unary};
use super::function::parse_type;
use super::lexer::{Framing, Keyword, Operator, TokenKind};
use super::{Parse, ParseErrorKind, ParseRes, Parser};
use crate::ast::{Stmt, StmtKind};

impl<'source> Parse<'source> for Stmt {
    fn parse(parser: &mut Parser<'source>) -> ParseRes<Self> {
        parser.with_context("parsing statement", parse_stmt)
    }
}

fn parse_stmt(parser: &mut Parser) -> ParseRes<Stmt> {
    match parser.kind(0) {
        Some(TokenKind::Keyword(Keyword::Return)) => parse_return(parser),
        Some(TokenKind::Keyword(Keyword::Int | Keyword::Bool)) => parse_var_decl(parser),
        Some(TokenKind::Ident) => match parser.kind(1) {
            Some(TokenKind::Op(Operator::Assign)) => parse_assign(parser),
            Some(TokenKind::OpenBracket) => parse_array_assign(parser),
            _ => parse_expr_stmt(parser),
        },
        Some(TokenKind::Op(Operator::Star)) => parse_pointer_assign(parser),
        Some(TokenKind::OpenBrace | TokenKind::Colon) => parse_scope(parser),
        Some(TokenKind::Keyword(Keyword::If)) => parse_if(parser),
        Some(TokenKind::Keyword(Keyword::While)) => parse_while(parser),
        Some(TokenKind::Keyword(Keyword::For)) => parse_for(parser),
        _ => parse_expr_stmt(parser),
    }
}

fn parse_return(parser: &mut Parser) -> ParseRes<Stmt> {
    let start = parser.keyword(Keyword::Return)?;
    let expr = parse_expr(parser)?;
    let span = start.until(expr.span);
    parser.terminator()?;
    Ok(Stmt::new(StmtKind::Return(expr), span))
}

fn parse_var_decl(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing variable declaration", |parser| {
        let start = parser.span();
        let ty = parse_type(parser)?;
        let name = parser.source().to_owned();
        let mut end = parser.expect(TokenKind::Ident)?;
        let array_size = if parser.eat(TokenKind::OpenBracket) {
            let size_text = parser.source();
            let size_span = parser.span();
            parser.expect(TokenKind::IntLit)?;
            // the lexer only accepts digit runs that fit in an i64
            let size: i64 = size_text.parse().unwrap();
            if size < 1 {
                return parser.error_at(size_span, ParseErrorKind::ArraySizeTooSmall);
            }
            end = parser.expect(TokenKind::CloseBracket)?;
            Some(size)
        } else {
            None
        };
        let init = if parser.eat(TokenKind::Op(Operator::Assign)) {
            let expr = parse_expr(parser)?;
            end = expr.span;
            Some(expr)
        } else {
            None
        };
        parser.terminator()?;
        Ok(Stmt::new(
            StmtKind::VarDecl {
                name,
                ty,
                init,
                array_size,
            },
            start.until(end),
        ))
    })
}

fn parse_assign(parser: &mut Parser) -> ParseRes<Stmt> {
    let (name, start) = (parser.source().to_owned(), parser.span());
    parser.advance();
    parser.expect(TokenKind::Op(Operator::Assign))?;
    let value = parse_expr(parser)?;
    let span = start.until(value.span);
    parser.terminator()?;
    Ok(Stmt::new(StmtKind::Assign { name, value }, span))
}

fn parse_array_assign(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing array assignment", |parser| {
        let (name, start) = (parser.source().to_owned(), parser.span());
        parser.advance();
        parser.expect(TokenKind::OpenBracket)?;
        let index = parse_expr(parser)?;
        parser.expect(TokenKind::CloseBracket)?;
        parser.expect(TokenKind::Op(Operator::Assign))?;
        let value = parse_expr(parser)?;
        let span = start.until(value.span);
        parser.terminator()?;
        Ok(Stmt::new(
            StmtKind::ArrayAssign { name, index, value },
            span,
        ))
    })
}

/// `*p = e;` — the leading star is consumed here, so the recorded target
/// is the pointer expression itself.
fn parse_pointer_assign(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing pointer assignment", |parser| {
        let start = parser.expect(TokenKind::Op(Operator::Star))?;
        let target = parse_unary(parser)?;
        parser.expect(TokenKind::Op(Operator::Assign))?;
        let value = parse_expr(parser)?;
        let span = start.until(value.span);
        parser.terminator()?;
        Ok(Stmt::new(StmtKind::PointerAssign { target, value }, span))
    })
}

fn parse_expr_stmt(parser: &mut Parser) -> ParseRes<Stmt> {
    let expr = parse_expr(parser)?;
    let span = expr.span;
    parser.terminator()?;
    Ok(Stmt::new(StmtKind::Expr(expr), span))
}

/// A statement block: `{ stmt* }`, or in offside framing also
/// `: NEWLINE INDENT stmt* DEDENT`.
pub(super) fn parse_scope(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing statement block", |parser| {
        if parser.framing() == Framing::Offside && parser.kind(0) == Some(TokenKind::Colon) {
            let start = parser.expect(TokenKind::Colon)?;
            parser.expect(TokenKind::Newline)?;
            parser.skip_newlines();
            parser.expect(TokenKind::Indent)?;
            let mut statements = Vec::new();
            let end = loop {
                parser.skip_newlines();
                if parser.kind(0) == Some(TokenKind::Dedent) {
                    let end = parser.span();
                    parser.advance();
                    break end;
                }
                if parser.kind(0).is_none() {
                    return parser.unexpected("statement or end of indented block");
                }
                statements.push(parse_stmt(parser)?);
            };
            return Ok(Stmt::new(StmtKind::Scope(statements), start.until(end)));
        }

        let start = parser.expect(TokenKind::OpenBrace)?;
        let mut statements = Vec::new();
        let end = loop {
            parser.skip_newlines();
            if parser.kind(0) == Some(TokenKind::CloseBrace) {
                let end = parser.span();
                parser.advance();
                break end;
            }
            if parser.kind(0).is_none() {
                return parser.unexpected("statement or '}'");
            }
            statements.push(parse_stmt(parser)?);
        };
        Ok(Stmt::new(StmtKind::Scope(statements), start.until(end)))
    })
}

fn parse_if(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing if statement", |parser| {
        let start = parser.keyword(Keyword::If)?;
        parser.expect(TokenKind::OpenParen)?;
        let condition = parse_expr(parser)?;
        parser.expect(TokenKind::CloseParen)?;
        let then_branch = parse_stmt(parser)?;
        let mut span = start.until(then_branch.span);
        let else_branch = if parser.eat(TokenKind::Keyword(Keyword::Else)) {
            let stmt = parse_stmt(parser)?;
            span = start.until(stmt.span);
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ))
    })
}

fn parse_while(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing while loop", |parser| {
        let start = parser.keyword(Keyword::While)?;
        parser.expect(TokenKind::OpenParen)?;
        let condition = parse_expr(parser)?;
        parser.expect(TokenKind::CloseParen)?;
        let body = parse_stmt(parser)?;
        let span = start.until(body.span);
        Ok(Stmt::new(
            StmtKind::While {
                condition,
                body: Box::new(body),
            },
            span,
        ))
    })
}

fn parse_for(parser: &mut Parser) -> ParseRes<Stmt> {
    parser.with_context("parsing for loop", |parser| {
        let start = parser.keyword(Keyword::For)?;
        parser.expect(TokenKind::OpenParen)?;

        let init = if parser.kind(0) == Some(TokenKind::Semi) {
            None
        } else {
            Some(Box::new(parse_for_init(parser)?))
        };
        parser.expect(TokenKind::Semi)?;

        let condition = if parser.kind(0) == Some(TokenKind::Semi) {
            None
        } else {
            Some(parse_expr(parser)?)
        };
        parser.expect(TokenKind::Semi)?;

        let increment = if parser.kind(0) == Some(TokenKind::CloseParen) {
            None
        } else {
            Some(Box::new(parse_for_increment(parser)?))
        };
        parser.expect(TokenKind::CloseParen)?;

        let body = parse_stmt(parser)?;
        let span = start.until(body.span);
        Ok(Stmt::new(
            StmtKind::For {
                init,
                condition,
                increment,
                body: Box::new(body),
            },
            span,
        ))
    })
}

/// The initialiser of a for-loop header: a declaration with an
/// initialising expression, or a plain assignment. No terminator — the
/// header's own `;` follows.
fn parse_for_init(parser: &mut Parser) -> ParseRes<Stmt> {
    match parser.kind(0) {
        Some(TokenKind::Keyword(Keyword::Int | Keyword::Bool)) => {
            let start = parser.span();
            let ty = parse_type(parser)?;
            let name = parser.source().to_owned();
            parser.expect(TokenKind::Ident)?;
            parser.expect(TokenKind::Op(Operator::Assign))?;
            let init = parse_expr(parser)?;
            let span = start.until(init.span);
            Ok(Stmt::new(
                StmtKind::VarDecl {
                    name,
                    ty,
                    init: Some(init),
                    array_size: None,
                },
                span,
            ))
        }
        Some(TokenKind::Ident) => parse_header_assign(parser),
        _ => parser.unexpected("for-loop initialiser"),
    }
}

fn parse_for_increment(parser: &mut Parser) -> ParseRes<Stmt> {
    if parser.kind(0) == Some(TokenKind::Ident)
        && parser.kind(1) == Some(TokenKind::Op(Operator::Assign))
    {
        parse_header_assign(parser)
    } else {
        let expr = parse_expr(parser)?;
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }
}

fn parse_header_assign(parser: &mut Parser) -> ParseRes<Stmt> {
    let (name, start) = (parser.source().to_owned(), parser.span());
    parser.expect(TokenKind::Ident)?;
    parser.expect(TokenKind::Op(Operator::Assign))?;
    let value = parse_expr(parser)?;
    let span = start.until(value.span);
    Ok(Stmt::new(StmtKind::Assign { name, value }, span))
}
