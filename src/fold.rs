//! Constant folding. A pure AST -> AST rewrite: literal subtrees are
//! collapsed, everything else is rebuilt around its folded children. Calls
//! are never removed and the evaluation order of non-literal operands is
//! untouched.

use crate::ast::{BinaryOp, Expr, ExprKind, Function, Program, Stmt, StmtKind, UnaryOp};

pub fn fold_program(program: Program) -> Program {
    Program {
        globals: program.globals.into_iter().map(fold_stmt).collect(),
        functions: program.functions.into_iter().map(fold_function).collect(),
    }
}

fn fold_function(function: Function) -> Function {
    Function {
        body: fold_stmt(function.body),
        ..function
    }
}

pub fn fold_stmt(stmt: Stmt) -> Stmt {
    let span = stmt.span;
    let kind = match stmt.kind {
        StmtKind::Return(expr) => StmtKind::Return(fold_expr(expr)),
        StmtKind::Expr(expr) => StmtKind::Expr(fold_expr(expr)),
        StmtKind::VarDecl {
            name,
            ty,
            init,
            array_size,
        } => StmtKind::VarDecl {
            name,
            ty,
            init: init.map(fold_expr),
            array_size,
        },
        StmtKind::Assign { name, value } => StmtKind::Assign {
            name,
            value: fold_expr(value),
        },
        StmtKind::ArrayAssign { name, index, value } => StmtKind::ArrayAssign {
            name,
            index: fold_expr(index),
            value: fold_expr(value),
        },
        StmtKind::PointerAssign { target, value } => StmtKind::PointerAssign {
            target: fold_expr(target),
            value: fold_expr(value),
        },
        StmtKind::Scope(stmts) => StmtKind::Scope(stmts.into_iter().map(fold_stmt).collect()),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => StmtKind::If {
            condition: fold_expr(condition),
            then_branch: Box::new(fold_stmt(*then_branch)),
            else_branch: else_branch.map(|stmt| Box::new(fold_stmt(*stmt))),
        },
        StmtKind::While { condition, body } => StmtKind::While {
            condition: fold_expr(condition),
            body: Box::new(fold_stmt(*body)),
        },
        StmtKind::For {
            init,
            condition,
            increment,
            body,
        } => StmtKind::For {
            init: init.map(|stmt| Box::new(fold_stmt(*stmt))),
            condition: condition.map(fold_expr),
            increment: increment.map(|stmt| Box::new(fold_stmt(*stmt))),
            body: Box::new(fold_stmt(*body)),
        },
    };
    Stmt::new(kind, span)
}

pub fn fold_expr(expr: Expr) -> Expr {
    let span = expr.span;
    let kind = match expr.kind {
        ExprKind::Unary { op, operand } => {
            let operand = fold_expr(*operand);
            match (op, &operand.kind) {
                (UnaryOp::Not, ExprKind::BoolLit(value)) => ExprKind::BoolLit(!value),
                _ => ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = fold_expr(*lhs);
            let rhs = fold_expr(*rhs);
            match (&lhs.kind, &rhs.kind) {
                (&ExprKind::IntLit(a), &ExprKind::IntLit(b)) => {
                    match fold_int_binary(op, a, b) {
                        Some(kind) => kind,
                        None => rebuild(op, lhs, rhs),
                    }
                }
                (&ExprKind::BoolLit(a), &ExprKind::BoolLit(b)) => {
                    match fold_bool_binary(op, a, b) {
                        Some(kind) => kind,
                        None => rebuild(op, lhs, rhs),
                    }
                }
                _ => rebuild(op, lhs, rhs),
            }
        }
        ExprKind::ArrayAccess { name, index } => ExprKind::ArrayAccess {
            name,
            index: Box::new(fold_expr(*index)),
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee,
            args: args.into_iter().map(fold_expr).collect(),
        },
        kind @ (ExprKind::IntLit(_) | ExprKind::BoolLit(_) | ExprKind::Identifier(_)) => kind,
    };
    Expr::new(kind, span)
}

fn rebuild(op: BinaryOp, lhs: Expr, rhs: Expr) -> ExprKind {
    ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold_int_binary(op: BinaryOp, a: i64, b: i64) -> Option<ExprKind> {
    Some(match op {
        BinaryOp::Add => ExprKind::IntLit(a.wrapping_add(b)),
        BinaryOp::Subtract => ExprKind::IntLit(a.wrapping_sub(b)),
        BinaryOp::Multiply => ExprKind::IntLit(a.wrapping_mul(b)),
        // a division by zero keeps its runtime behaviour
        BinaryOp::Divide if b != 0 => ExprKind::IntLit(a.wrapping_div(b)),
        BinaryOp::Divide => return None,
        BinaryOp::Equals => ExprKind::BoolLit(a == b),
        BinaryOp::NotEquals => ExprKind::BoolLit(a != b),
        BinaryOp::Less => ExprKind::BoolLit(a < b),
        BinaryOp::Greater => ExprKind::BoolLit(a > b),
        // ill-typed on ints; the analyser rejects these before folding
        BinaryOp::LogicAnd | BinaryOp::LogicOr => return None,
    })
}

fn fold_bool_binary(op: BinaryOp, a: bool, b: bool) -> Option<ExprKind> {
    Some(match op {
        BinaryOp::LogicAnd => ExprKind::BoolLit(a && b),
        BinaryOp::LogicOr => ExprKind::BoolLit(a || b),
        BinaryOp::Equals => ExprKind::BoolLit(a == b),
        BinaryOp::NotEquals => ExprKind::BoolLit(a != b),
        _ => return None,
    })
}
