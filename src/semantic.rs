use crate::ast::{BinaryOp, Expr, ExprKind, Function, Program, Stmt, StmtKind, Type, UnaryOp};
use crate::error::{self, SourceMetadata};
use std::collections::HashMap;
use thiserror::Error;

pub type SemanticError = error::Error<SemanticErrorKind>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("undeclared variable '{0}'")]
    UndeclaredVariable(String),
    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),
    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),
    #[error("call to undefined function '{0}'")]
    UnknownFunction(String),
    #[error("'{name}' takes {expected} argument(s), but {found} were supplied")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("argument {index} of '{name}' must be '{expected}', but the value has type '{found}'")]
    ArgumentTypeMismatch {
        name: String,
        index: usize,
        expected: Type,
        found: Type,
    },
    #[error("'{0}' is an array and must be indexed to be used")]
    BareArrayReference(String),
    #[error("'{0}' is not an array")]
    NotAnArray(String),
    #[error("array index must be 'int', but has type '{0}'")]
    ArrayIndexNotInt(Type),
    #[error("cannot assign to array '{0}' without an index")]
    AssignToArray(String),
    #[error("cannot assign a value of type '{found}' to '{name}' of type '{expected}'")]
    AssignTypeMismatch {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("initialiser of '{name}' must be '{expected}', but has type '{found}'")]
    InitTypeMismatch {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("cannot dereference a value of type '{0}'")]
    NotAPointer(Type),
    #[error("cannot store a value of type '{found}' through a pointer to '{expected}'")]
    PointeeTypeMismatch { expected: Type, found: Type },
    #[error("can only take the address of a variable or array element")]
    InvalidAddressOf,
    #[error("operand of '!' must be 'bool', but has type '{0}'")]
    NotOperandNotBool(Type),
    #[error("operands of '{op}' must be 'int' ('{found}' given)")]
    ArithmeticOperandNotInt { op: BinaryOp, found: Type },
    #[error("operands of '{op}' must be 'bool' ('{found}' given)")]
    LogicOperandNotBool { op: BinaryOp, found: Type },
    #[error("operands of '{op}' must have the same type ('{lhs}' vs '{rhs}')")]
    EqualityTypeMismatch { op: BinaryOp, lhs: Type, rhs: Type },
    #[error("condition of '{0}' must be 'bool'")]
    ConditionNotBool(&'static str),
    #[error("return type mismatch: expected '{expected}', got '{found}'")]
    ReturnTypeMismatch { expected: Type, found: Type },
    #[error("top-level return statements must return 'int'")]
    GlobalReturnNotInt,
}

#[derive(Debug, Clone, Copy)]
struct VarSymbol {
    ty: Type,
    array_size: Option<i64>,
}

#[derive(Debug, Clone)]
struct Signature {
    return_type: Type,
    params: Vec<Type>,
}

/// Check scoping and typing rules over a parsed program. The AST is left
/// untouched; the first violation aborts the walk.
pub fn check(program: &Program, meta: &SourceMetadata) -> Result<(), SemanticError> {
    Analyzer::new(meta).check_program(program)
}

struct Analyzer<'a> {
    meta: &'a SourceMetadata<'a>,
    scopes: Vec<HashMap<String, VarSymbol>>,
    functions: HashMap<String, Signature>,
    current_return: Option<Type>,
}

impl<'a> Analyzer<'a> {
    fn new(meta: &'a SourceMetadata<'a>) -> Self {
        let mut functions = HashMap::new();
        // built-in
        functions.insert(
            "print".to_owned(),
            Signature {
                return_type: Type::VOID,
                params: vec![Type::INT],
            },
        );
        Self {
            meta,
            scopes: Vec::new(),
            functions,
            current_return: None,
        }
    }

    fn check_program(&mut self, program: &Program) -> Result<(), SemanticError> {
        // register every function first so forward references and
        // recursion resolve
        for function in &program.functions {
            self.register_function(function)?;
        }
        self.scopes.push(HashMap::new());
        for stmt in &program.globals {
            self.check_stmt(stmt)?;
        }
        for function in &program.functions {
            self.check_function(function)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn register_function(&mut self, function: &Function) -> Result<(), SemanticError> {
        if self.functions.contains_key(&function.name) {
            return self.error(
                function.span,
                SemanticErrorKind::DuplicateFunction(function.name.clone()),
            );
        }
        self.functions.insert(
            function.name.clone(),
            Signature {
                return_type: function.return_type,
                params: function.params.iter().map(|p| p.ty).collect(),
            },
        );
        Ok(())
    }

    fn check_function(&mut self, function: &Function) -> Result<(), SemanticError> {
        self.current_return = Some(function.return_type);
        self.scopes.push(HashMap::new());
        for param in &function.params {
            self.declare(function.span, &param.name, param.ty, None)?;
        }
        // the body is a scope statement and pushes its own layer, so
        // parameters sit just outside it
        self.check_stmt(&function.body)?;
        self.scopes.pop();
        self.current_return = None;
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), SemanticError> {
        match &stmt.kind {
            StmtKind::Return(expr) => {
                let found = self.check_expr(expr)?;
                match self.current_return {
                    None => {
                        if found != Type::INT {
                            return self.error(stmt.span, SemanticErrorKind::GlobalReturnNotInt);
                        }
                    }
                    Some(expected) => {
                        if found != expected {
                            return self.error(
                                stmt.span,
                                SemanticErrorKind::ReturnTypeMismatch { expected, found },
                            );
                        }
                    }
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.check_expr(expr).map(|_| ()),
            StmtKind::VarDecl {
                name,
                ty,
                init,
                array_size,
            } => {
                if let Some(init) = init {
                    let found = self.check_expr(init)?;
                    if found != *ty {
                        return self.error(
                            stmt.span,
                            SemanticErrorKind::InitTypeMismatch {
                                name: name.clone(),
                                expected: *ty,
                                found,
                            },
                        );
                    }
                }
                self.declare(stmt.span, name, *ty, *array_size)
            }
            StmtKind::Assign { name, value } => {
                let symbol = self.lookup(stmt.span, name)?;
                if symbol.array_size.is_some() {
                    return self.error(stmt.span, SemanticErrorKind::AssignToArray(name.clone()));
                }
                let found = self.check_expr(value)?;
                if found != symbol.ty {
                    return self.error(
                        stmt.span,
                        SemanticErrorKind::AssignTypeMismatch {
                            name: name.clone(),
                            expected: symbol.ty,
                            found,
                        },
                    );
                }
                Ok(())
            }
            StmtKind::ArrayAssign { name, index, value } => {
                let symbol = self.lookup(stmt.span, name)?;
                if symbol.array_size.is_none() {
                    return self.error(stmt.span, SemanticErrorKind::NotAnArray(name.clone()));
                }
                let index_ty = self.check_expr(index)?;
                if index_ty != Type::INT {
                    return self
                        .error(index.span, SemanticErrorKind::ArrayIndexNotInt(index_ty));
                }
                let found = self.check_expr(value)?;
                if found != symbol.ty {
                    return self.error(
                        stmt.span,
                        SemanticErrorKind::AssignTypeMismatch {
                            name: name.clone(),
                            expected: symbol.ty,
                            found,
                        },
                    );
                }
                Ok(())
            }
            StmtKind::PointerAssign { target, value } => {
                let target_ty = self.check_expr(target)?;
                let pointee = match target_ty.pointee() {
                    Some(pointee) => pointee,
                    None => {
                        return self
                            .error(target.span, SemanticErrorKind::NotAPointer(target_ty))
                    }
                };
                let found = self.check_expr(value)?;
                if found != pointee {
                    return self.error(
                        stmt.span,
                        SemanticErrorKind::PointeeTypeMismatch {
                            expected: pointee,
                            found,
                        },
                    );
                }
                Ok(())
            }
            StmtKind::Scope(stmts) => {
                self.scopes.push(HashMap::new());
                for stmt in stmts {
                    self.check_stmt(stmt)?;
                }
                self.scopes.pop();
                Ok(())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition, "if")?;
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                self.check_condition(condition, "while")?;
                self.check_stmt(body)
            }
            StmtKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init)?;
                }
                if let Some(condition) = condition {
                    self.check_condition(condition, "for")?;
                }
                if let Some(increment) = increment {
                    self.check_stmt(increment)?;
                }
                self.check_stmt(body)?;
                self.scopes.pop();
                Ok(())
            }
        }
    }

    fn check_condition(&mut self, condition: &Expr, construct: &'static str) -> Result<(), SemanticError> {
        let ty = self.check_expr(condition)?;
        if ty != Type::BOOL {
            return self.error(
                condition.span,
                SemanticErrorKind::ConditionNotBool(construct),
            );
        }
        Ok(())
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<Type, SemanticError> {
        match &expr.kind {
            ExprKind::IntLit(_) => Ok(Type::INT),
            ExprKind::BoolLit(_) => Ok(Type::BOOL),
            ExprKind::Identifier(name) => {
                let symbol = self.lookup(expr.span, name)?;
                if symbol.array_size.is_some() {
                    return self
                        .error(expr.span, SemanticErrorKind::BareArrayReference(name.clone()));
                }
                Ok(symbol.ty)
            }
            ExprKind::ArrayAccess { name, index } => {
                let symbol = self.lookup(expr.span, name)?;
                if symbol.array_size.is_none() {
                    return self.error(expr.span, SemanticErrorKind::NotAnArray(name.clone()));
                }
                let index_ty = self.check_expr(index)?;
                if index_ty != Type::INT {
                    return self
                        .error(index.span, SemanticErrorKind::ArrayIndexNotInt(index_ty));
                }
                Ok(symbol.ty)
            }
            ExprKind::Call { callee, args } => {
                let signature = match self.functions.get(callee) {
                    Some(signature) => signature.clone(),
                    None => {
                        return self
                            .error(expr.span, SemanticErrorKind::UnknownFunction(callee.clone()))
                    }
                };
                if args.len() != signature.params.len() {
                    return self.error(
                        expr.span,
                        SemanticErrorKind::WrongArgumentCount {
                            name: callee.clone(),
                            expected: signature.params.len(),
                            found: args.len(),
                        },
                    );
                }
                for (index, (arg, expected)) in
                    args.iter().zip(signature.params.iter()).enumerate()
                {
                    let found = self.check_expr(arg)?;
                    if found != *expected {
                        return self.error(
                            arg.span,
                            SemanticErrorKind::ArgumentTypeMismatch {
                                name: callee.clone(),
                                index: index + 1,
                                expected: *expected,
                                found,
                            },
                        );
                    }
                }
                Ok(signature.return_type)
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    let ty = self.check_expr(operand)?;
                    if ty != Type::BOOL {
                        return self.error(operand.span, SemanticErrorKind::NotOperandNotBool(ty));
                    }
                    Ok(Type::BOOL)
                }
                UnaryOp::Deref => {
                    let ty = self.check_expr(operand)?;
                    match ty.pointee() {
                        Some(pointee) => Ok(pointee),
                        None => self.error(operand.span, SemanticErrorKind::NotAPointer(ty)),
                    }
                }
                UnaryOp::AddressOf => {
                    if !operand.is_lvalue() {
                        return self.error(expr.span, SemanticErrorKind::InvalidAddressOf);
                    }
                    let ty = self.check_expr(operand)?;
                    Ok(ty.pointer_to())
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                match op {
                    BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                        for (side, ty) in [(lhs, lhs_ty), (rhs, rhs_ty)] {
                            if ty != Type::INT {
                                return self.error(
                                    side.span,
                                    SemanticErrorKind::ArithmeticOperandNotInt { op: *op, found: ty },
                                );
                            }
                        }
                        Ok(Type::INT)
                    }
                    BinaryOp::LogicAnd | BinaryOp::LogicOr => {
                        for (side, ty) in [(lhs, lhs_ty), (rhs, rhs_ty)] {
                            if ty != Type::BOOL {
                                return self.error(
                                    side.span,
                                    SemanticErrorKind::LogicOperandNotBool { op: *op, found: ty },
                                );
                            }
                        }
                        Ok(Type::BOOL)
                    }
                    BinaryOp::Equals | BinaryOp::NotEquals => {
                        if lhs_ty != rhs_ty {
                            return self.error(
                                expr.span,
                                SemanticErrorKind::EqualityTypeMismatch {
                                    op: *op,
                                    lhs: lhs_ty,
                                    rhs: rhs_ty,
                                },
                            );
                        }
                        Ok(Type::BOOL)
                    }
                    BinaryOp::Less | BinaryOp::Greater => {
                        for (side, ty) in [(lhs, lhs_ty), (rhs, rhs_ty)] {
                            if ty != Type::INT {
                                return self.error(
                                    side.span,
                                    SemanticErrorKind::ArithmeticOperandNotInt { op: *op, found: ty },
                                );
                            }
                        }
                        Ok(Type::BOOL)
                    }
                }
            }
        }
    }

    fn declare(
        &mut self,
        span: error::Span,
        name: &str,
        ty: Type,
        array_size: Option<i64>,
    ) -> Result<(), SemanticError> {
        let duplicate = self
            .scopes
            .last()
            .map_or(false, |scope| scope.contains_key(name));
        if duplicate {
            return self.error(span, SemanticErrorKind::DuplicateVariable(name.to_owned()));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), VarSymbol { ty, array_size });
        }
        Ok(())
    }

    fn lookup(&self, span: error::Span, name: &str) -> Result<VarSymbol, SemanticError> {
        for scope in self.scopes.iter().rev() {
            if let Some(symbol) = scope.get(name) {
                return Ok(*symbol);
            }
        }
        Err(SemanticError::new(SemanticErrorKind::UndeclaredVariable(name.to_owned()))
            .with_source(span, self.meta))
    }

    fn error<T>(&self, span: error::Span, kind: SemanticErrorKind) -> Result<T, SemanticError> {
        Err(SemanticError::new(kind).with_source(span, self.meta))
    }
}
