//! Intermediate representation
//!
//! A lowered program is a flat list of instructions per definition plus one for the main script.
//! Operands are named storage locations ([Name]: declared variables and temporaries), immediates
//! and symbolic [Label]s. Structured control flow is gone, only labels, jumps and branches are
//! left.

use std::fmt;

use crate::symbols::{ScopeId, SymbolTable};
use crate::Type;

/// A storage location: a declared variable or a temporary
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

/// A jump target or the address of a string constant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

macro_rules! string_newtype {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

string_newtype!(Name);
string_newtype!(Label);

#[derive(Debug)]
pub struct Program {
    pub functions: Vec<FunctionDefinition>,
    pub main: FunctionDefinition,
    /// Scopes, temporaries, labels and string constants of the whole program
    pub symbols: SymbolTable,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.prototype.name == name)
    }

    pub fn skeleton(&self) -> Vec<FunctionPrototype> {
        self.functions.iter().map(|f| f.prototype.clone()).collect()
    }
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub prototype: FunctionPrototype,
    pub code: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct FunctionPrototype {
    pub name: String,
    pub parameters: Vec<(Name, Type)>,
    pub return_type: Type,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroTest {
    /// Take the first label if the operand is zero
    Zero,
    /// Take the first label if the operand is not zero
    NonZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Label(Label),
    /// Function prologue
    Enter,
    /// Function epilogue, returns to the caller
    Leave,
    Move {
        dst: Name,
        src: Name,
    },
    Set {
        dst: Name,
        value: i64,
    },
    Arithmetic {
        op: Arithmetic,
        dst: Name,
        lhs: Name,
        rhs: Name,
    },
    Jump(Label),
    BranchCompare {
        cmp: Comparison,
        lhs: Name,
        rhs: Name,
        if_true: Label,
        if_false: Label,
    },
    BranchZero {
        test: ZeroTest,
        src: Name,
        if_true: Label,
        if_false: Label,
    },
    /// Pass `src` as the `index`-th argument of the next call
    SetArgument {
        index: usize,
        src: Name,
    },
    Call(String),
    /// Fetch the value returned by the last call
    ReturnValue {
        dst: Name,
    },
    /// Set the return value of the current function
    Return {
        src: Name,
    },
    LoadString {
        dst: Name,
        label: Label,
    },
    PrintInt(Name),
    PrintString(Name),
    ReadInt(Name),
    IntToStr {
        dst: Name,
        src: Name,
    },
    StrToInt {
        dst: Name,
        src: Name,
    },
    Nop,
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arithmetic::Add => write!(f, "ADD"),
            Arithmetic::Sub => write!(f, "SUB"),
            Arithmetic::Mul => write!(f, "MUL"),
            Arithmetic::Div => write!(f, "DIV"),
            Arithmetic::Mod => write!(f, "MOD"),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Lt => write!(f, "lt"),
            Comparison::Le => write!(f, "le"),
            Comparison::Eq => write!(f, "eq"),
        }
    }
}

impl fmt::Display for ZeroTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZeroTest::Zero => write!(f, "eqz"),
            ZeroTest::NonZero => write!(f, "nez"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Enter => write!(f, "    ENTER"),
            Instruction::Leave => write!(f, "    LEAVE"),
            Instruction::Move { dst, src } => write!(f, "    MOVE {dst}, {src}"),
            Instruction::Set { dst, value } => write!(f, "    SET {dst}, {value}"),
            Instruction::Arithmetic { op, dst, lhs, rhs } => {
                write!(f, "    {op} {dst}, {lhs}, {rhs}")
            }
            Instruction::Jump(label) => write!(f, "    JUMP {label}"),
            Instruction::BranchCompare {
                cmp,
                lhs,
                rhs,
                if_true,
                if_false,
            } => write!(f, "    BRANCH_CMP {cmp} {lhs}, {rhs}, {if_true}, {if_false}"),
            Instruction::BranchZero {
                test,
                src,
                if_true,
                if_false,
            } => write!(f, "    BRANCH_ZERO {test} {src}, {if_true}, {if_false}"),
            Instruction::SetArgument { index, src } => write!(f, "    SET_ARG {index}, {src}"),
            Instruction::Call(name) => write!(f, "    CALL {name}"),
            Instruction::ReturnValue { dst } => write!(f, "    RETURN_VALUE {dst}"),
            Instruction::Return { src } => write!(f, "    RETURN {src}"),
            Instruction::LoadString { dst, label } => write!(f, "    LOAD_STRING {dst}, {label}"),
            Instruction::PrintInt(src) => write!(f, "    PRINT_INT {src}"),
            Instruction::PrintString(src) => write!(f, "    PRINT_STRING {src}"),
            Instruction::ReadInt(dst) => write!(f, "    READ_INT {dst}"),
            Instruction::IntToStr { dst, src } => write!(f, "    INT_TO_STR {dst}, {src}"),
            Instruction::StrToInt { dst, src } => write!(f, "    STR_TO_INT {dst}, {src}"),
            Instruction::Nop => write!(f, "    NOP"),
        }
    }
}

impl fmt::Display for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.code {
            writeln!(f, "{inst}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, text) in self.symbols.string_constants() {
            writeln!(f, "{label}: {text:?}")?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.main)
    }
}
