//! AArch64 back end: a stack machine over 16-byte slots. `x0` is the
//! expression accumulator; intermediate operands are spilled to the stack
//! and reloaded into `x1`. Locals live below the saved `x29`/`x30` pair
//! and are addressed relative to `x29`.

pub mod assembly;
mod output;

use crate::ast::{BinaryOp, Expr, ExprKind, Function, Program, Stmt, StmtKind, UnaryOp};
use crate::error::{self, SourceMetadata, Span};
use assembly::{Address, Branch, Condition, Data, Directive, Instruction, Label, Register};
pub use output::AssemblyOutput;
use std::collections::HashMap;
use thiserror::Error;

pub type CodegenError = error::Error<CodegenErrorKind>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenErrorKind {
    #[error("'{0}' has more than 8 arguments, which the calling convention does not support")]
    TooManyArguments(String),
    #[error("no stack slot for variable '{0}'")]
    UndeclaredVariable(String),
    #[error("cannot take the address of this expression")]
    InvalidAddressOf,
}

/// Every local occupies one 16-byte slot; arrays occupy one per element.
const SLOT_SIZE: i64 = 16;
/// Arguments beyond `x0`..`x7` are not supported.
const MAX_CALL_ARGS: usize = 8;

const X0: Register = Register::General(0);
const X1: Register = Register::General(1);

/// Lower a semantically checked program to assembly.
pub fn generate_program(
    program: &Program,
    meta: &SourceMetadata,
) -> Result<AssemblyOutput, CodegenError> {
    Generator::new(meta).run(program)
}

#[derive(Debug, Clone, Copy)]
struct VarInfo {
    /// Distance of the slot below `x29`, in bytes (positive).
    offset: i64,
}

struct Generator<'a> {
    meta: &'a SourceMetadata<'a>,
    output: AssemblyOutput,
    scopes: Vec<HashMap<String, VarInfo>>,
    stack_ptr: i64,
    labels: usize,
}

impl<'a> Generator<'a> {
    fn new(meta: &'a SourceMetadata<'a>) -> Self {
        Self {
            meta,
            output: AssemblyOutput::new(),
            scopes: Vec::new(),
            stack_ptr: 0,
            labels: 0,
        }
    }

    fn run(mut self, program: &Program) -> Result<AssemblyOutput, CodegenError> {
        self.output.push(Directive::Global("_main".to_owned()));
        self.output.push(Directive::Align(2));
        self.output.push(Directive::Data);
        self.output.push(Label::named("fmt"));
        self.output.push(Directive::Asciz("%d\\n".to_owned()));
        self.output.push(Directive::Text);

        let mut has_main = false;
        for function in &program.functions {
            if function.name == "main" {
                has_main = true;
            }
            self.function(function)?;
        }

        if !has_main && !program.globals.is_empty() {
            self.output.push(Label::named("_main"));
            self.prologue();
            self.stack_ptr = 0;
            self.scopes.push(HashMap::new());
            for stmt in &program.globals {
                self.stmt(stmt)?;
            }
            self.mov_imm(X0, 0);
            self.epilogue();
            self.scopes.pop();
        }

        Ok(self.output)
    }

    fn function(&mut self, function: &Function) -> Result<(), CodegenError> {
        if function.params.len() > MAX_CALL_ARGS {
            return self.error(
                function.span,
                CodegenErrorKind::TooManyArguments(function.name.clone()),
            );
        }
        self.output.push(Label::named(format!("_{}", function.name)));
        self.prologue();
        self.stack_ptr = 0;
        self.scopes.push(HashMap::new());

        for (index, param) in function.params.iter().enumerate() {
            self.output.push(Instruction::Str {
                register: Register::General(index as u8),
                address: Address::PreIndexed {
                    base: Register::StackPointer,
                    offset: -SLOT_SIZE,
                },
            });
            self.declare(&param.name, None);
        }

        self.stmt(&function.body)?;

        // implicit `return 0` for bodies that fall off the end
        self.mov_imm(X0, 0);
        self.epilogue();
        self.scopes.pop();
        Ok(())
    }

    fn prologue(&mut self) {
        self.output.push(Instruction::Stp {
            a: Register::FramePointer,
            b: Register::LinkRegister,
            address: Address::PreIndexed {
                base: Register::StackPointer,
                offset: -SLOT_SIZE,
            },
        });
        self.output.push(Instruction::Mov {
            target: Register::FramePointer,
            source: Data::Register(Register::StackPointer),
        });
    }

    fn epilogue(&mut self) {
        self.output.push(Instruction::Mov {
            target: Register::StackPointer,
            source: Data::Register(Register::FramePointer),
        });
        self.output.push(Instruction::Ldp {
            a: Register::FramePointer,
            b: Register::LinkRegister,
            address: Address::PostIndexed {
                base: Register::StackPointer,
                offset: SLOT_SIZE,
            },
        });
        self.output.push(Instruction::Ret);
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match &stmt.kind {
            StmtKind::Return(expr) => {
                self.expr(expr)?;
                self.epilogue();
                Ok(())
            }
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::VarDecl {
                name,
                init,
                array_size,
                ..
            } => {
                match init {
                    Some(init) => {
                        self.expr(init)?;
                        self.push_slot(X0);
                    }
                    None => {
                        let bytes = array_size.unwrap_or(1) * SLOT_SIZE;
                        self.output.push(Instruction::Sub {
                            target: Register::StackPointer,
                            lhs: Register::StackPointer,
                            rhs: Data::Immediate(bytes),
                        });
                    }
                }
                self.declare(name, *array_size);
                Ok(())
            }
            StmtKind::Assign { name, value } => {
                let var = self.find_var(stmt.span, name)?;
                self.expr(value)?;
                self.output.push(Instruction::Str {
                    register: X0,
                    address: Address::Offset {
                        base: Register::FramePointer,
                        offset: -var.offset,
                    },
                });
                Ok(())
            }
            StmtKind::ArrayAssign { name, index, value } => {
                let var = self.find_var(stmt.span, name)?;
                self.expr(value)?;
                self.push_slot(X0);
                self.element_address(var, index)?;
                self.pop_slot(X0);
                self.output.push(Instruction::Str {
                    register: X0,
                    address: Address::Base { base: X1 },
                });
                Ok(())
            }
            StmtKind::PointerAssign { target, value } => {
                self.expr(value)?;
                self.push_slot(X0);
                self.expr(target)?;
                self.pop_slot(X1);
                self.output.push(Instruction::Str {
                    register: X1,
                    address: Address::Base { base: X0 },
                });
                Ok(())
            }
            StmtKind::Scope(stmts) => {
                let saved = self.stack_ptr;
                self.scopes.push(HashMap::new());
                for stmt in stmts {
                    self.stmt(stmt)?;
                }
                self.leave_scope(saved);
                Ok(())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let label_else = self.new_label();
                let label_end = self.new_label();
                self.expr(condition)?;
                self.branch_if_zero(label_else.clone());
                self.stmt(then_branch)?;
                self.output.push(Branch::Unconditional {
                    label: label_end.clone(),
                });
                self.output.push(label_else);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch)?;
                }
                self.output.push(label_end);
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let label_head = self.new_label();
                let label_end = self.new_label();
                self.output.push(label_head.clone());
                self.expr(condition)?;
                self.branch_if_zero(label_end.clone());
                self.stmt(body)?;
                self.output.push(Branch::Unconditional { label: label_head });
                self.output.push(label_end);
                Ok(())
            }
            StmtKind::For {
                init,
                condition,
                increment,
                body,
            } => {
                let saved = self.stack_ptr;
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let label_head = self.new_label();
                let label_end = self.new_label();
                self.output.push(label_head.clone());
                if let Some(condition) = condition {
                    self.expr(condition)?;
                    self.branch_if_zero(label_end.clone());
                }
                self.stmt(body)?;
                if let Some(increment) = increment {
                    self.stmt(increment)?;
                }
                self.output.push(Branch::Unconditional { label: label_head });
                self.output.push(label_end);
                self.leave_scope(saved);
                Ok(())
            }
        }
    }

    /// Evaluate an expression into `x0`.
    fn expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match &expr.kind {
            ExprKind::IntLit(value) => {
                self.mov_imm(X0, *value);
                Ok(())
            }
            ExprKind::BoolLit(value) => {
                self.mov_imm(X0, i64::from(*value));
                Ok(())
            }
            ExprKind::Identifier(name) => {
                let var = self.find_var(expr.span, name)?;
                self.output.push(Instruction::Ldr {
                    register: X0,
                    address: Address::Offset {
                        base: Register::FramePointer,
                        offset: -var.offset,
                    },
                });
                Ok(())
            }
            ExprKind::ArrayAccess { name, index } => {
                let var = self.find_var(expr.span, name)?;
                self.element_address(var, index)?;
                self.output.push(Instruction::Ldr {
                    register: X0,
                    address: Address::Base { base: X1 },
                });
                Ok(())
            }
            ExprKind::Call { callee, args } => self.call(expr.span, callee, args),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    self.expr(operand)?;
                    self.output.push(Instruction::Cmp {
                        register: X0,
                        data: Data::Immediate(0),
                    });
                    self.output.push(Instruction::Cset {
                        target: X0,
                        condition: Condition::Equals,
                    });
                    Ok(())
                }
                UnaryOp::Deref => {
                    self.expr(operand)?;
                    self.output.push(Instruction::Ldr {
                        register: X0,
                        address: Address::Base { base: X0 },
                    });
                    Ok(())
                }
                UnaryOp::AddressOf => self.address_of(operand),
            },
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<(), CodegenError> {
        match op {
            BinaryOp::LogicAnd => {
                let label_false = self.new_label();
                let label_end = self.new_label();
                self.expr(lhs)?;
                self.branch_if_zero(label_false.clone());
                self.expr(rhs)?;
                self.branch_if_zero(label_false.clone());
                self.mov_imm(X0, 1);
                self.output.push(Branch::Unconditional {
                    label: label_end.clone(),
                });
                self.output.push(label_false);
                self.mov_imm(X0, 0);
                self.output.push(label_end);
                Ok(())
            }
            BinaryOp::LogicOr => {
                let label_true = self.new_label();
                let label_end = self.new_label();
                self.expr(lhs)?;
                self.branch_if_nonzero(label_true.clone());
                self.expr(rhs)?;
                self.branch_if_nonzero(label_true.clone());
                self.mov_imm(X0, 0);
                self.output.push(Branch::Unconditional {
                    label: label_end.clone(),
                });
                self.output.push(label_true);
                self.mov_imm(X0, 1);
                self.output.push(label_end);
                Ok(())
            }
            _ => {
                // rhs first, spilled while the lhs lands in x0
                self.expr(rhs)?;
                self.push_slot(X0);
                self.expr(lhs)?;
                self.pop_slot(X1);
                match op {
                    BinaryOp::Add => self.output.push(Instruction::Add {
                        target: X0,
                        lhs: X0,
                        rhs: Data::Register(X1),
                    }),
                    BinaryOp::Subtract => self.output.push(Instruction::Sub {
                        target: X0,
                        lhs: X0,
                        rhs: Data::Register(X1),
                    }),
                    BinaryOp::Multiply => self.output.push(Instruction::Mul {
                        target: X0,
                        lhs: X0,
                        rhs: X1,
                    }),
                    BinaryOp::Divide => self.output.push(Instruction::Sdiv {
                        target: X0,
                        lhs: X0,
                        rhs: X1,
                    }),
                    BinaryOp::Equals => self.compare(Condition::Equals),
                    BinaryOp::NotEquals => self.compare(Condition::NotEquals),
                    BinaryOp::Less => self.compare(Condition::LessThan),
                    BinaryOp::Greater => self.compare(Condition::GreaterThan),
                    BinaryOp::LogicAnd | BinaryOp::LogicOr => unreachable!("handled above"),
                };
                Ok(())
            }
        }
    }

    fn compare(&mut self, condition: Condition) -> &mut AssemblyOutput {
        self.output.push(Instruction::Cmp {
            register: X0,
            data: Data::Register(X1),
        });
        self.output.push(Instruction::Cset {
            target: X0,
            condition,
        })
    }

    fn call(&mut self, span: Span, callee: &str, args: &[Expr]) -> Result<(), CodegenError> {
        if callee == "print" {
            self.expr(&args[0])?;
            self.output.push(Instruction::Mov {
                target: X1,
                source: Data::Register(X0),
            });
            self.output.push(Instruction::Adrp {
                target: X0,
                symbol: "fmt".to_owned(),
            });
            self.output.push(Instruction::AddPageOffset {
                target: X0,
                symbol: "fmt".to_owned(),
            });
            self.output.push(Branch::Linked {
                symbol: "_printf".to_owned(),
            });
            return Ok(());
        }
        if args.len() > MAX_CALL_ARGS {
            return self.error(span, CodegenErrorKind::TooManyArguments(callee.to_owned()));
        }
        for arg in args {
            self.expr(arg)?;
            self.push_slot(X0);
        }
        for index in (0..args.len()).rev() {
            self.pop_slot(Register::General(index as u8));
        }
        self.output.push(Branch::Linked {
            symbol: format!("_{}", callee),
        });
        Ok(())
    }

    /// `&e`: emit the frame-relative address of the operand instead of its
    /// value.
    fn address_of(&mut self, operand: &Expr) -> Result<(), CodegenError> {
        match &operand.kind {
            ExprKind::Identifier(name) => {
                let var = self.find_var(operand.span, name)?;
                self.output.push(Instruction::Add {
                    target: X0,
                    lhs: Register::FramePointer,
                    rhs: Data::Immediate(-var.offset),
                });
                Ok(())
            }
            ExprKind::ArrayAccess { name, index } => {
                let var = self.find_var(operand.span, name)?;
                self.element_address(var, index)?;
                self.output.push(Instruction::Mov {
                    target: X0,
                    source: Data::Register(X1),
                });
                Ok(())
            }
            _ => self.error(operand.span, CodegenErrorKind::InvalidAddressOf),
        }
    }

    /// Leave the element's address in `x1` (clobbers `x0` with the scaled
    /// index on the way).
    fn element_address(&mut self, var: VarInfo, index: &Expr) -> Result<(), CodegenError> {
        self.expr(index)?;
        self.mov_imm(X1, SLOT_SIZE);
        self.output.push(Instruction::Mul {
            target: X0,
            lhs: X0,
            rhs: X1,
        });
        self.output.push(Instruction::Add {
            target: X1,
            lhs: Register::FramePointer,
            rhs: Data::Immediate(-var.offset),
        });
        self.output.push(Instruction::Add {
            target: X1,
            lhs: X1,
            rhs: Data::Register(X0),
        });
        Ok(())
    }

    fn leave_scope(&mut self, saved_stack_ptr: i64) {
        let delta = self.stack_ptr - saved_stack_ptr;
        if delta > 0 {
            self.output.push(Instruction::Add {
                target: Register::StackPointer,
                lhs: Register::StackPointer,
                rhs: Data::Immediate(delta),
            });
        }
        self.stack_ptr = saved_stack_ptr;
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, array_size: Option<i64>) {
        let size = array_size.unwrap_or(1) * SLOT_SIZE;
        self.stack_ptr += size;
        let offset = self.stack_ptr;
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), VarInfo { offset });
        }
    }

    fn find_var(&self, span: Span, name: &str) -> Result<VarInfo, CodegenError> {
        for scope in self.scopes.iter().rev() {
            if let Some(var) = scope.get(name) {
                return Ok(*var);
            }
        }
        Err(
            CodegenError::new(CodegenErrorKind::UndeclaredVariable(name.to_owned()))
                .with_source(span, self.meta),
        )
    }

    fn new_label(&mut self) -> Label {
        let label = Label::Numbered(self.labels);
        self.labels += 1;
        label
    }

    fn branch_if_zero(&mut self, label: Label) {
        self.output.push(Instruction::Cmp {
            register: X0,
            data: Data::Immediate(0),
        });
        self.output.push(Branch::Conditional {
            condition: Condition::Equals,
            label,
        });
    }

    fn branch_if_nonzero(&mut self, label: Label) {
        self.output.push(Instruction::Cmp {
            register: X0,
            data: Data::Immediate(0),
        });
        self.output.push(Branch::Conditional {
            condition: Condition::NotEquals,
            label,
        });
    }

    fn mov_imm(&mut self, target: Register, value: i64) {
        self.output.push(Instruction::Mov {
            target,
            source: Data::Immediate(value),
        });
    }

    fn push_slot(&mut self, register: Register) {
        self.output.push(Instruction::Str {
            register,
            address: Address::PreIndexed {
                base: Register::StackPointer,
                offset: -SLOT_SIZE,
            },
        });
    }

    fn pop_slot(&mut self, register: Register) {
        self.output.push(Instruction::Ldr {
            register,
            address: Address::PostIndexed {
                base: Register::StackPointer,
                offset: SLOT_SIZE,
            },
        });
    }

    fn error<T>(&self, span: Span, kind: CodegenErrorKind) -> Result<T, CodegenError> {
        Err(CodegenError::new(kind).with_source(span, self.meta))
    }
}
