//! Typed representation of the emitted AArch64 assembly. Everything the
//! generator produces goes through these enums and their `Display` impls,
//! so the textual output stays in one place.

use std::fmt;

#[derive(Debug, Clone)]
pub enum Assembly {
    Directive(Directive),
    Label(Label),
    Instruction(Instruction),
    Comment(String),
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Directive(directive) => write!(f, "\t.{}", directive),
            Self::Label(label) => write!(f, "{}:", label),
            Self::Instruction(instruction) => write!(f, "\t{}", instruction),
            Self::Comment(comment) => write!(f, "// {}", comment),
        }
    }
}

impl From<Instruction> for Assembly {
    fn from(instruction: Instruction) -> Self {
        Self::Instruction(instruction)
    }
}

impl From<Branch> for Assembly {
    fn from(branch: Branch) -> Self {
        Self::Instruction(Instruction::Branch(branch))
    }
}

impl From<Directive> for Assembly {
    fn from(directive: Directive) -> Self {
        Self::Directive(directive)
    }
}

impl From<Label> for Assembly {
    fn from(label: Label) -> Self {
        Self::Label(label)
    }
}

#[derive(Debug, Clone)]
pub enum Directive {
    Global(String),
    Align(usize),
    Data,
    Text,
    /// A NUL-terminated string constant; the payload is emitted verbatim,
    /// so escapes must already be written out (`%d\n` is `"%d\\n"`).
    Asciz(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Global(name) => write!(f, "global {}", name),
            Self::Align(alignment) => write!(f, "align {}", alignment),
            Self::Data => write!(f, "data"),
            Self::Text => write!(f, "text"),
            Self::Asciz(text) => write!(f, "asciz \"{}\"", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// A symbol such as `_main` or `fmt`.
    Named(String),
    /// A generated control-flow label `.L<n>`.
    Numbered(usize),
}

impl Label {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::Numbered(n) => write!(f, ".L{}", n),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Instruction {
    /// Return from a function
    Ret,
    /// Move data into a register
    Mov { target: Register, source: Data },
    /// Compare a register against some data, setting the condition flags
    Cmp { register: Register, data: Data },
    /// Set a register to 1 or 0 from the condition flags
    Cset {
        target: Register,
        condition: Condition,
    },
    Add {
        target: Register,
        lhs: Register,
        rhs: Data,
    },
    Sub {
        target: Register,
        lhs: Register,
        rhs: Data,
    },
    Mul {
        target: Register,
        lhs: Register,
        rhs: Register,
    },
    /// Signed division
    Sdiv {
        target: Register,
        lhs: Register,
        rhs: Register,
    },
    Str {
        register: Register,
        address: Address,
    },
    Ldr {
        register: Register,
        address: Address,
    },
    /// Store a pair of registers
    Stp {
        a: Register,
        b: Register,
        address: Address,
    },
    /// Load a pair of registers
    Ldp {
        a: Register,
        b: Register,
        address: Address,
    },
    /// Load the page address of a symbol (`adrp x0, sym@PAGE`)
    Adrp { target: Register, symbol: String },
    /// Add a symbol's offset within its page (`add x0, x0, sym@PAGEOFF`)
    AddPageOffset { target: Register, symbol: String },
    Branch(Branch),
}

#[derive(Debug, Clone)]
pub enum Branch {
    Unconditional {
        label: Label,
    },
    Conditional {
        condition: Condition,
        label: Label,
    },
    /// Branch with link (a call) to a symbol
    Linked {
        symbol: String,
    },
}

macro_rules! format_instr_args {
    () => { "" };
    ($arg:expr) => { "{}" };
    ($first:expr, $($rest:expr),+) => {
        concat!("{}, ", format_instr_args!($($rest),+))
    }
}

macro_rules! write_instruction {
    ($formatter:expr, $name:expr) => {
        $formatter.write_fmt(format_args!("{}", $name))
    };
    ($formatter:expr, $name:expr, $($args:expr),+) => {
        $formatter.write_fmt(format_args!(
            concat!("{:3} ", format_instr_args!($($args),+)),
            $name,
            $($args),+
        ))
    };
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ret => write_instruction!(f, "ret"),
            Self::Mov { target, source } => write_instruction!(f, "mov", target, source),
            Self::Cmp { register, data } => write_instruction!(f, "cmp", register, data),
            Self::Cset { target, condition } => write_instruction!(f, "cset", target, condition),
            Self::Add { target, lhs, rhs } => write_instruction!(f, "add", target, lhs, rhs),
            Self::Sub { target, lhs, rhs } => write_instruction!(f, "sub", target, lhs, rhs),
            Self::Mul { target, lhs, rhs } => write_instruction!(f, "mul", target, lhs, rhs),
            Self::Sdiv { target, lhs, rhs } => write_instruction!(f, "sdiv", target, lhs, rhs),
            Self::Str { register, address } => write_instruction!(f, "str", register, address),
            Self::Ldr { register, address } => write_instruction!(f, "ldr", register, address),
            Self::Stp { a, b, address } => write_instruction!(f, "stp", a, b, address),
            Self::Ldp { a, b, address } => write_instruction!(f, "ldp", a, b, address),
            Self::Adrp { target, symbol } => write!(f, "adrp {}, {}@PAGE", target, symbol),
            Self::AddPageOffset { target, symbol } => {
                write!(f, "add {}, {}, {}@PAGEOFF", target, target, symbol)
            }
            Self::Branch(branch) => branch.fmt(f),
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unconditional { label } => write_instruction!(f, "b", label),
            Self::Conditional { condition, label } => {
                write_instruction!(f, format!("b.{}", condition), label)
            }
            Self::Linked { symbol } => write_instruction!(f, "bl", symbol),
        }
    }
}

/// A read-only operand: a register or an immediate.
#[derive(Debug, Clone, Copy)]
pub enum Data {
    Register(Register),
    Immediate(i64),
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Register(register) => write!(f, "{}", register),
            Self::Immediate(value) => write!(f, "#{}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// `x0`..`x28`
    General(u8),
    /// `x29`
    FramePointer,
    /// `x30`
    LinkRegister,
    /// `sp`
    StackPointer,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::General(index) => write!(f, "x{}", index),
            Self::FramePointer => write!(f, "x29"),
            Self::LinkRegister => write!(f, "x30"),
            Self::StackPointer => write!(f, "sp"),
        }
    }
}

/// Addressing modes used by the loads and stores.
#[derive(Debug, Clone, Copy)]
pub enum Address {
    /// `[x0]`
    Base { base: Register },
    /// `[x29, #-16]`
    Offset { base: Register, offset: i64 },
    /// `[sp, #-16]!`
    PreIndexed { base: Register, offset: i64 },
    /// `[sp], #16`
    PostIndexed { base: Register, offset: i64 },
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Base { base } => write!(f, "[{}]", base),
            Self::Offset { base, offset } => write!(f, "[{}, #{}]", base, offset),
            Self::PreIndexed { base, offset } => write!(f, "[{}, #{}]!", base, offset),
            Self::PostIndexed { base, offset } => write!(f, "[{}], #{}", base, offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Equals => write!(f, "eq"),
            Self::NotEquals => write!(f, "ne"),
            Self::LessThan => write!(f, "lt"),
            Self::GreaterThan => write!(f, "gt"),
        }
    }
}
