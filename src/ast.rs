use crate::error::Span;
use crate::grammar::lexer::Operator;
use std::fmt;

/// A HyLang data type: a base type plus a pointer-indirection count.
/// `int**` is `{ Int, 2 }`. Equality is structural on both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    pub base: BaseType,
    pub ptr_level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Int,
    Bool,
    Void,
}

impl Type {
    pub const INT: Self = Self::new(BaseType::Int);
    pub const BOOL: Self = Self::new(BaseType::Bool);
    pub const VOID: Self = Self::new(BaseType::Void);

    pub const fn new(base: BaseType) -> Self {
        Self { base, ptr_level: 0 }
    }

    /// The type obtained by taking this value's address.
    pub const fn pointer_to(self) -> Self {
        Self {
            base: self.base,
            ptr_level: self.ptr_level + 1,
        }
    }

    /// The type obtained by dereferencing, when this is a pointer.
    pub const fn pointee(self) -> Option<Self> {
        if self.ptr_level == 0 {
            None
        } else {
            Some(Self {
                base: self.base,
                ptr_level: self.ptr_level - 1,
            })
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.base {
            BaseType::Int => f.write_str("int")?,
            BaseType::Bool => f.write_str("bool")?,
            BaseType::Void => f.write_str("void")?,
        }
        for _ in 0..self.ptr_level {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!e`
    Not,
    /// `*e`
    Deref,
    /// `&e`
    AddressOf,
}

impl UnaryOp {
    pub const fn from_operator(op: Operator) -> Option<Self> {
        Some(match op {
            Operator::Bang => Self::Not,
            Operator::Star => Self::Deref,
            Operator::Ampersand => Self::AddressOf,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    Less,
    Greater,
    LogicAnd,
    LogicOr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LogicAnd => "&&",
            Self::LogicOr => "||",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(i64),
    BoolLit(bool),
    Identifier(String),
    ArrayAccess {
        name: String,
        index: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether the expression denotes a storage location that `&` may be
    /// applied to.
    pub const fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::ArrayAccess { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Return(Expr),
    Expr(Expr),
    VarDecl {
        name: String,
        ty: Type,
        init: Option<Expr>,
        array_size: Option<i64>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    ArrayAssign {
        name: String,
        index: Expr,
        value: Expr,
    },
    /// `*target = value;` — `target` is the pointer expression left after
    /// the leading `*` has been consumed.
    PointerAssign {
        target: Expr,
        value: Expr,
    },
    Scope(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
}

impl Stmt {
    pub const fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    /// Always a `StmtKind::Scope`.
    pub body: Stmt,
    pub return_type: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<Stmt>,
    pub functions: Vec<Function>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceMetadata;
    use crate::grammar::lexer::Framing;
    use crate::grammar::{Parse, ParseRes, Parser};

    fn parse_test<T>(source: &str) -> ParseRes<T>
    where
        T: for<'s> Parse<'s>,
    {
        let meta = SourceMetadata::new(source);
        let mut parser = Parser::new(&meta, Framing::Braces)?;
        parser.parse()
    }

    fn parse_ok<T>(source: &str) -> T
    where
        T: for<'s> Parse<'s>,
    {
        parse_test(source).expect("expected no failure")
    }

    mod expression {
        use super::*;

        #[test]
        fn literals() {
            assert!(matches!(parse_ok::<Expr>("12").kind, ExprKind::IntLit(12)));
            assert!(matches!(parse_ok::<Expr>("0").kind, ExprKind::IntLit(0)));
            assert!(matches!(
                parse_ok::<Expr>("true").kind,
                ExprKind::BoolLit(true)
            ));
            assert!(matches!(
                parse_ok::<Expr>("false").kind,
                ExprKind::BoolLit(false)
            ));
        }

        #[test]
        fn precedence_of_term_over_additive() {
            // 2+3*4 parses as 2+(3*4)
            let expr = parse_ok::<Expr>("2+3*4");
            let (lhs, rhs) = match expr.kind {
                ExprKind::Binary {
                    op: BinaryOp::Add,
                    lhs,
                    rhs,
                } => (lhs, rhs),
                other => panic!("expected addition at the root, got {:?}", other),
            };
            assert!(matches!(lhs.kind, ExprKind::IntLit(2)));
            assert!(matches!(
                rhs.kind,
                ExprKind::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            ));
        }

        #[test]
        fn binary_operators_are_left_associative() {
            // 1-2-3 parses as (1-2)-3
            let expr = parse_ok::<Expr>("1-2-3");
            let (lhs, rhs) = match expr.kind {
                ExprKind::Binary {
                    op: BinaryOp::Subtract,
                    lhs,
                    rhs,
                } => (lhs, rhs),
                other => panic!("expected subtraction at the root, got {:?}", other),
            };
            assert!(matches!(
                lhs.kind,
                ExprKind::Binary {
                    op: BinaryOp::Subtract,
                    ..
                }
            ));
            assert!(matches!(rhs.kind, ExprKind::IntLit(3)));
        }

        #[test]
        fn logical_operators_nest_under_or() {
            // a && b || c parses as (a && b) || c
            let expr = parse_ok::<Expr>("a && b || c");
            match expr.kind {
                ExprKind::Binary {
                    op: BinaryOp::LogicOr,
                    lhs,
                    ..
                } => assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary {
                        op: BinaryOp::LogicAnd,
                        ..
                    }
                )),
                other => panic!("expected `||` at the root, got {:?}", other),
            }
        }

        #[test]
        fn unary_operators_are_right_associative() {
            // **p parses as *(*p)
            let expr = parse_ok::<Expr>("**p");
            match expr.kind {
                ExprKind::Unary {
                    op: UnaryOp::Deref,
                    operand,
                } => assert!(matches!(
                    operand.kind,
                    ExprKind::Unary {
                        op: UnaryOp::Deref,
                        ..
                    }
                )),
                other => panic!("expected dereference at the root, got {:?}", other),
            }
        }

        #[test]
        fn address_of_and_not() {
            assert!(matches!(
                parse_ok::<Expr>("&x").kind,
                ExprKind::Unary {
                    op: UnaryOp::AddressOf,
                    ..
                }
            ));
            assert!(matches!(
                parse_ok::<Expr>("!x").kind,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    ..
                }
            ));
        }

        #[test]
        fn parenthesised_grouping() {
            // (2+3)*4 parses with the multiplication at the root
            let expr = parse_ok::<Expr>("(2+3)*4");
            assert!(matches!(
                expr.kind,
                ExprKind::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            ));
        }

        #[test]
        fn call_and_array_access() {
            match parse_ok::<Expr>("add(7, 35)").kind {
                ExprKind::Call { callee, args } => {
                    assert_eq!(callee, "add");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected a call, got {:?}", other),
            }
            match parse_ok::<Expr>("a[i + 1]").kind {
                ExprKind::ArrayAccess { name, index } => {
                    assert_eq!(name, "a");
                    assert!(matches!(
                        index.kind,
                        ExprKind::Binary {
                            op: BinaryOp::Add,
                            ..
                        }
                    ));
                }
                other => panic!("expected an array access, got {:?}", other),
            }
        }

        #[test]
        fn missing_operand_is_an_error() {
            assert!(parse_test::<Expr>("1 +").is_err());
            assert!(parse_test::<Expr>("(1").is_err());
        }
    }

    mod statement {
        use super::*;

        #[test]
        fn return_statement() {
            assert!(matches!(
                parse_ok::<Stmt>("return 42;").kind,
                StmtKind::Return(Expr {
                    kind: ExprKind::IntLit(42),
                    ..
                })
            ));
        }

        #[test]
        fn variable_declarations() {
            match parse_ok::<Stmt>("int x = 5;").kind {
                StmtKind::VarDecl {
                    name,
                    ty,
                    init,
                    array_size,
                } => {
                    assert_eq!(name, "x");
                    assert_eq!(ty, Type::INT);
                    assert!(init.is_some());
                    assert_eq!(array_size, None);
                }
                other => panic!("expected a declaration, got {:?}", other),
            }
            match parse_ok::<Stmt>("int* p;").kind {
                StmtKind::VarDecl { ty, init, .. } => {
                    assert_eq!(ty, Type::INT.pointer_to());
                    assert!(init.is_none());
                }
                other => panic!("expected a declaration, got {:?}", other),
            }
        }

        #[test]
        fn array_declaration_records_its_size() {
            match parse_ok::<Stmt>("int a[3];").kind {
                StmtKind::VarDecl {
                    name, array_size, ..
                } => {
                    assert_eq!(name, "a");
                    assert_eq!(array_size, Some(3));
                }
                other => panic!("expected a declaration, got {:?}", other),
            }
        }

        #[test]
        fn zero_length_array_is_rejected() {
            assert!(parse_test::<Stmt>("int a[0];").is_err());
        }

        #[test]
        fn assignments() {
            assert!(matches!(
                parse_ok::<Stmt>("x = 10;").kind,
                StmtKind::Assign { .. }
            ));
            assert!(matches!(
                parse_ok::<Stmt>("a[0] = 10;").kind,
                StmtKind::ArrayAssign { .. }
            ));
        }

        #[test]
        fn pointer_assignment_keeps_the_inner_expression() {
            match parse_ok::<Stmt>("*p = 99;").kind {
                StmtKind::PointerAssign { target, .. } => {
                    assert!(matches!(target.kind, ExprKind::Identifier(ref n) if n == "p"));
                }
                other => panic!("expected a pointer assignment, got {:?}", other),
            }
            // `**pp = 1;` leaves one dereference on the target
            match parse_ok::<Stmt>("**pp = 1;").kind {
                StmtKind::PointerAssign { target, .. } => {
                    assert!(matches!(
                        target.kind,
                        ExprKind::Unary {
                            op: UnaryOp::Deref,
                            ..
                        }
                    ));
                }
                other => panic!("expected a pointer assignment, got {:?}", other),
            }
        }

        #[test]
        fn if_with_and_without_else() {
            assert!(matches!(
                parse_ok::<Stmt>("if (x) { return 1; }").kind,
                StmtKind::If {
                    else_branch: None,
                    ..
                }
            ));
            assert!(matches!(
                parse_ok::<Stmt>("if (x) { return 1; } else { return 2; }").kind,
                StmtKind::If {
                    else_branch: Some(_),
                    ..
                }
            ));
        }

        #[test]
        fn while_and_for() {
            assert!(matches!(
                parse_ok::<Stmt>("while (x > 0) { x = x - 1; }").kind,
                StmtKind::While { .. }
            ));
            match parse_ok::<Stmt>("for (int i = 0; i < 10; i = i + 1) { print(i); }").kind {
                StmtKind::For {
                    init,
                    condition,
                    increment,
                    ..
                } => {
                    assert!(init.is_some());
                    assert!(condition.is_some());
                    assert!(increment.is_some());
                }
                other => panic!("expected a for loop, got {:?}", other),
            }
        }

        #[test]
        fn for_parts_may_be_empty() {
            assert!(matches!(
                parse_ok::<Stmt>("for (;;) { x = 1; }").kind,
                StmtKind::For {
                    init: None,
                    condition: None,
                    increment: None,
                    ..
                }
            ));
        }

        #[test]
        fn expression_statement() {
            assert!(matches!(
                parse_ok::<Stmt>("print(5);").kind,
                StmtKind::Expr(Expr {
                    kind: ExprKind::Call { .. },
                    ..
                })
            ));
        }

        #[test]
        fn missing_semicolon_is_an_error() {
            assert!(parse_test::<Stmt>("return 1").is_err());
        }
    }

    mod program {
        use super::*;

        #[test]
        fn function_definition() {
            let func = parse_ok::<Function>("int add(int a, int b) { return a + b; }");
            assert_eq!(func.name, "add");
            assert_eq!(func.return_type, Type::INT);
            assert_eq!(func.params.len(), 2);
            assert!(matches!(func.body.kind, StmtKind::Scope(_)));
        }

        #[test]
        fn functions_and_globals_are_split() {
            let program =
                parse_ok::<Program>("int x = 1; int main() { return x; } print(2);");
            assert_eq!(program.functions.len(), 1);
            assert_eq!(program.globals.len(), 2);
        }

        #[test]
        fn three_token_lookahead_separates_declarations_from_functions() {
            let program = parse_ok::<Program>("int x; int f() { return 0; }");
            assert_eq!(program.globals.len(), 1);
            assert_eq!(program.functions.len(), 1);
        }

        #[test]
        fn parsing_is_deterministic() {
            let source = "int main() { int a[3]; a[0] = 1; if (true) { return a[0]; } return 0; }";
            assert_eq!(parse_ok::<Program>(source), parse_ok::<Program>(source));
        }

        #[test]
        fn offside_framing_parses_indented_scopes() {
            let source = "int main():\n    int x = 5\n    return x\n";
            let meta = SourceMetadata::new(source);
            let mut parser = Parser::new(&meta, Framing::Offside).expect("lexing succeeds");
            let program: Program = parser.parse().expect("expected no failure");
            assert_eq!(program.functions.len(), 1);
            match &program.functions[0].body.kind {
                StmtKind::Scope(stmts) => assert_eq!(stmts.len(), 2),
                other => panic!("expected a scope body, got {:?}", other),
            }
        }
    }
}
