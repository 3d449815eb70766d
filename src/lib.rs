pub mod ast;
pub mod interp;
pub mod ir;
mod lowering;
pub mod symbols;
mod type_checking;
mod util;

use miette::Diagnostic;
use thiserror::Error;

pub use lowering::{lower, LoweringError};
pub use symbols::{ScopeId, SymbolError, SymbolTable};
pub use type_checking::{type_check, Returns, TypeCheckError, TypedProgram};
pub use util::Span;

/// Entry label of the main script; no definition may use this name
pub const ENTRY_POINT: &str = "main";

/// The value types of the source language
///
/// Types carry no data and are compared by kind only. There is no coercion
/// between them anywhere in the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str,
    Bool,
    None,
}

impl Type {
    pub fn is_int(self) -> bool {
        self == Type::Int
    }

    pub fn is_str(self) -> bool {
        self == Type::Str
    }

    pub fn is_bool(self) -> bool {
        self == Type::Bool
    }

    pub fn is_none(self) -> bool {
        self == Type::None
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "str"),
            Type::Bool => write!(f, "bool"),
            Type::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Type(#[from] TypeCheckError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lowering(#[from] LoweringError),
}

/// Type check a program and lower it to IR
///
/// Fails on the first error; nothing is lowered unless the whole program
/// type checks.
pub fn compile(program: ast::UntypedProgram) -> Result<ir::Program, CompileError> {
    let typed = type_check(program)?;
    Ok(lower(typed)?)
}
