//! Abstract syntax tree
//!
//! The tree is produced by an external parser and consumed by the type checker and the lowering
//! pass. Every node is generic over its type annotation: an [UntypedProgram] carries
//! [NoTypeContext] everywhere, the checker turns it into a [TypedAst] whose expressions carry
//! their [Type].

use std::fmt;

use crate::{Span, Type};

pub type Ident = String;

/// Placeholder annotation for a tree that has not been type checked yet
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoTypeContext;

pub type UntypedProgram = Program<NoTypeContext>;
pub type TypedAst = Program<Type>;

/// A whole program: the function/procedure definitions and the main script
#[derive(Debug, Clone, PartialEq)]
pub struct Program<T> {
    pub definitions: Vec<Definition<T>>,
    pub main: Block<T>,
}

/// A function or procedure definition
///
/// Procedures are definitions with return type [Type::None].
#[derive(Debug, Clone, PartialEq)]
pub struct Definition<T> {
    pub name: Ident,
    pub params: Vec<(Ident, Type)>,
    pub return_type: Type,
    pub body: Block<T>,
    pub name_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block<T> {
    pub statements: Vec<Statement<T>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement<T> {
    pub kind: StatementKind<T>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind<T> {
    /// `name: typ = init`
    Introduce {
        name: Ident,
        typ: Type,
        init: Expression<T>,
    },
    Assign {
        name: Ident,
        value: Expression<T>,
    },
    AddAssign {
        name: Ident,
        value: Expression<T>,
    },
    SubAssign {
        name: Ident,
        value: Expression<T>,
    },
    Pass,
    Print(Vec<Expression<T>>),
    /// `return expr`
    Return(Expression<T>),
    /// `return` without a value, only valid in procedures
    ReturnNone,
    /// A procedure call used as a statement
    Call {
        function: Ident,
        args: Vec<Expression<T>>,
    },
    IfElse {
        condition: Expression<T>,
        then_block: Block<T>,
        else_block: Block<T>,
    },
    While {
        condition: Expression<T>,
        body: Block<T>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression<T> {
    pub kind: ExpressionKind<T>,
    pub span: Span,
    pub typ: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind<T> {
    Int(i64),
    Str(String),
    Bool(bool),
    None,
    Var(Ident),
    Binary {
        op: BinaryOperation,
        lhs: Box<Expression<T>>,
        rhs: Box<Expression<T>>,
    },
    Not {
        inner: Box<Expression<T>>,
    },
    /// `input(prompt)`
    Input {
        prompt: Box<Expression<T>>,
    },
    /// `int(inner)`
    IntCast {
        inner: Box<Expression<T>>,
    },
    /// `str(inner)`
    StrCast {
        inner: Box<Expression<T>>,
    },
    Call {
        function: Ident,
        args: Vec<Expression<T>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    LessEq,
    Equals,
    And,
    Or,
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperation::Add => write!(f, "+"),
            BinaryOperation::Sub => write!(f, "-"),
            BinaryOperation::Mul => write!(f, "*"),
            BinaryOperation::Div => write!(f, "//"),
            BinaryOperation::Mod => write!(f, "%"),
            BinaryOperation::Less => write!(f, "<"),
            BinaryOperation::LessEq => write!(f, "<="),
            BinaryOperation::Equals => write!(f, "=="),
            BinaryOperation::And => write!(f, "and"),
            BinaryOperation::Or => write!(f, "or"),
        }
    }
}

impl<T> Program<T> {
    pub fn new(definitions: Vec<Definition<T>>, main: Block<T>) -> Self {
        Self { definitions, main }
    }
}

impl<T> Definition<T> {
    pub fn new(
        name: impl Into<Ident>,
        params: Vec<(Ident, Type)>,
        return_type: Type,
        body: Block<T>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            body,
            name_span: Span::default(),
        }
    }

    pub fn at(mut self, name_span: Span) -> Self {
        self.name_span = name_span;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_procedure(&self) -> bool {
        self.return_type.is_none()
    }
}

impl<T> Block<T> {
    pub fn new(statements: Vec<Statement<T>>) -> Self {
        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => first.span.join(last.span),
            _ => Span::default(),
        };
        Self { statements, span }
    }
}

impl<T> Statement<T> {
    pub fn new(kind: StatementKind<T>) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Statement<NoTypeContext> {
    pub fn introduce(name: impl Into<Ident>, typ: Type, init: Expression<NoTypeContext>) -> Self {
        Self::new(StatementKind::Introduce {
            name: name.into(),
            typ,
            init,
        })
    }

    pub fn assign(name: impl Into<Ident>, value: Expression<NoTypeContext>) -> Self {
        Self::new(StatementKind::Assign {
            name: name.into(),
            value,
        })
    }

    pub fn add_assign(name: impl Into<Ident>, value: Expression<NoTypeContext>) -> Self {
        Self::new(StatementKind::AddAssign {
            name: name.into(),
            value,
        })
    }

    pub fn sub_assign(name: impl Into<Ident>, value: Expression<NoTypeContext>) -> Self {
        Self::new(StatementKind::SubAssign {
            name: name.into(),
            value,
        })
    }

    pub fn pass() -> Self {
        Self::new(StatementKind::Pass)
    }

    pub fn print(args: Vec<Expression<NoTypeContext>>) -> Self {
        Self::new(StatementKind::Print(args))
    }

    pub fn ret(value: Expression<NoTypeContext>) -> Self {
        Self::new(StatementKind::Return(value))
    }

    pub fn ret_none() -> Self {
        Self::new(StatementKind::ReturnNone)
    }

    pub fn call(function: impl Into<Ident>, args: Vec<Expression<NoTypeContext>>) -> Self {
        Self::new(StatementKind::Call {
            function: function.into(),
            args,
        })
    }

    pub fn if_else(
        condition: Expression<NoTypeContext>,
        then_block: Block<NoTypeContext>,
        else_block: Block<NoTypeContext>,
    ) -> Self {
        Self::new(StatementKind::IfElse {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn while_loop(condition: Expression<NoTypeContext>, body: Block<NoTypeContext>) -> Self {
        Self::new(StatementKind::While { condition, body })
    }
}

impl<T> Expression<T> {
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Expression<NoTypeContext> {
    pub fn new(kind: ExpressionKind<NoTypeContext>) -> Self {
        Self {
            kind,
            span: Span::default(),
            typ: NoTypeContext,
        }
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExpressionKind::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExpressionKind::Str(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExpressionKind::Bool(value))
    }

    pub fn none() -> Self {
        Self::new(ExpressionKind::None)
    }

    pub fn var(name: impl Into<Ident>) -> Self {
        Self::new(ExpressionKind::Var(name.into()))
    }

    pub fn binary(op: BinaryOperation, lhs: Self, rhs: Self) -> Self {
        let span = lhs.span.join(rhs.span);
        Self::new(ExpressionKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
        .at(span)
    }

    pub fn not(inner: Self) -> Self {
        Self::new(ExpressionKind::Not {
            inner: Box::new(inner),
        })
    }

    pub fn input(prompt: Self) -> Self {
        Self::new(ExpressionKind::Input {
            prompt: Box::new(prompt),
        })
    }

    pub fn int_cast(inner: Self) -> Self {
        Self::new(ExpressionKind::IntCast {
            inner: Box::new(inner),
        })
    }

    pub fn str_cast(inner: Self) -> Self {
        Self::new(ExpressionKind::StrCast {
            inner: Box::new(inner),
        })
    }

    pub fn call(function: impl Into<Ident>, args: Vec<Self>) -> Self {
        Self::new(ExpressionKind::Call {
            function: function.into(),
            args,
        })
    }
}
