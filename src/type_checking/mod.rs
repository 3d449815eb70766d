//! Type checking
//!
//! This module checks an [ast::UntypedProgram] and turns it into a [TypedProgram]: the same tree
//! with every expression annotated with its [Type], plus the [SymbolTable] holding the scopes of
//! all definitions and the main script. The main interface is [type_check].
//!
//! Statements are checked flow-sensitively. Each one yields a [Returns] summary, blocks fold
//! these summaries with [Returns::sequence] and if/else merges its branches with
//! [Returns::merge_branches]. A definition is accepted only if its body always returns a value
//! of the declared return type.
//!
//! Checking stops at the first error.

use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::ast::{self, BinaryOperation, ExpressionKind, Ident, NoTypeContext, StatementKind};
use crate::symbols::{ScopeId, SymbolTable};
use crate::{Span, Type, ENTRY_POINT};

mod returns;

pub use returns::Returns;

#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum TypeCheckError {
    #[error("Variable '{name}' never introduced")]
    UndeclaredVariable {
        name: Ident,

        #[label("not declared")]
        span: Span,
    },

    #[error("Unknown function '{name}'")]
    UnknownFunction {
        name: Ident,

        #[label("no definition with this name")]
        span: Span,
    },

    #[error("'{name}' is already declared")]
    Redeclared {
        name: Ident,

        #[label("redeclared here")]
        span: Span,
    },

    #[error("Incorrect number of arguments for '{name}': expected {expected}, found {found}")]
    ArityMismatch {
        name: Ident,
        expected: usize,
        found: usize,

        #[label("this call")]
        span: Span,
    },

    #[error("Argument {index} of '{name}' has type {found}, expected {expected}")]
    ArgumentType {
        name: Ident,
        index: usize,
        expected: Type,
        found: Type,

        #[label("this argument")]
        span: Span,
    },

    #[error("Type mismatch. Expected {expected} but found {found}")]
    TypeMismatch {
        expected: Type,
        found: Type,

        #[label("this expression")]
        span: Span,
    },

    #[error("Wrong operand types for {op}: {lhs} and {rhs}, expected {expected}")]
    BinaryOperands {
        op: BinaryOperation,
        expected: Type,
        lhs: Type,
        rhs: Type,

        #[label("this operation")]
        span: Span,
    },

    #[error("Must compare values of the same type, found {lhs} and {rhs}")]
    IncomparableOperands {
        lhs: Type,
        rhs: Type,

        #[label("this comparison")]
        span: Span,
    },

    #[error("Wrong operand type for {operator}: expected {expected}, found {found}")]
    UnaryOperand {
        operator: &'static str,
        expected: Type,
        found: Type,

        #[label("this operand")]
        span: Span,
    },

    #[error("Cannot convert a value of type {found} to {target}")]
    #[diagnostic(help("only int, str and bool values can be converted"))]
    Conversion {
        target: Type,
        found: Type,

        #[label("this operand")]
        span: Span,
    },

    #[error("The {construct} condition has type {found}, expected bool")]
    NonBooleanCondition {
        construct: &'static str,
        found: Type,

        #[label("this condition")]
        span: Span,
    },

    #[error("Statement not reachable because of prior return")]
    Unreachable {
        #[label("never executed")]
        span: Span,
    },

    #[error("Body of '{name}' never returns")]
    NeverReturns {
        name: Ident,

        #[label("this body")]
        span: Span,
    },

    #[error("Body of '{name}' might not return")]
    #[diagnostic(help("every path through the body has to end in a return"))]
    MightNotReturn {
        name: Ident,

        #[label("this body")]
        span: Span,
    },

    #[error("Unexpected return statement")]
    #[diagnostic(help("the main script does not return"))]
    UnexpectedReturn {
        #[label("here")]
        span: Span,
    },

    #[error("Return type mismatch. Expected return of type {expected}, found {found}")]
    ReturnTypeMismatch {
        expected: Type,
        found: Type,

        #[label("this return")]
        span: Span,
    },

    #[error("Incompatible return types {expected} and {found}")]
    InconsistentReturns {
        expected: Type,
        found: Type,

        #[label("here")]
        span: Span,
    },

    #[error("'{name}' returns a value of type {returns} and cannot be called as a procedure")]
    NotAProcedure {
        name: Ident,
        returns: Type,

        #[label("this call")]
        span: Span,
    },
}

impl TypeCheckError {
    pub fn span(&self) -> Span {
        match self {
            TypeCheckError::UndeclaredVariable { span, .. }
            | TypeCheckError::UnknownFunction { span, .. }
            | TypeCheckError::Redeclared { span, .. }
            | TypeCheckError::ArityMismatch { span, .. }
            | TypeCheckError::ArgumentType { span, .. }
            | TypeCheckError::TypeMismatch { span, .. }
            | TypeCheckError::BinaryOperands { span, .. }
            | TypeCheckError::IncomparableOperands { span, .. }
            | TypeCheckError::UnaryOperand { span, .. }
            | TypeCheckError::Conversion { span, .. }
            | TypeCheckError::NonBooleanCondition { span, .. }
            | TypeCheckError::Unreachable { span }
            | TypeCheckError::NeverReturns { span, .. }
            | TypeCheckError::MightNotReturn { span, .. }
            | TypeCheckError::UnexpectedReturn { span }
            | TypeCheckError::ReturnTypeMismatch { span, .. }
            | TypeCheckError::InconsistentReturns { span, .. }
            | TypeCheckError::NotAProcedure { span, .. } => *span,
        }
    }
}

type Result<T> = std::result::Result<T, TypeCheckError>;

/// A type checked program, ready to be lowered
#[derive(Debug)]
pub struct TypedProgram {
    pub ast: ast::TypedAst,
    pub symbols: SymbolTable,
}

/// Check a program and annotate it with types
pub fn type_check(program: ast::UntypedProgram) -> Result<TypedProgram> {
    let mut functions = HashMap::with_capacity(program.definitions.len());
    for def in &program.definitions {
        let signature = Signature {
            params: def.params.iter().map(|(_, typ)| *typ).collect(),
            return_type: def.return_type,
        };
        if def.name == ENTRY_POINT || functions.insert(def.name.clone(), signature).is_some() {
            return Err(TypeCheckError::Redeclared {
                name: def.name.clone(),
                span: def.name_span,
            });
        }
    }

    let mut checker = TypeChecker {
        functions,
        symbols: SymbolTable::new(),
    };

    let mut definitions = Vec::with_capacity(program.definitions.len());
    for def in program.definitions {
        definitions.push(checker.check_definition(def)?);
    }
    let main = checker.check_script(program.main)?;

    Ok(TypedProgram {
        ast: ast::Program { definitions, main },
        symbols: checker.symbols,
    })
}

#[derive(Debug)]
struct Signature {
    params: Vec<Type>,
    return_type: Type,
}

/// What a `return` inside the statements being checked has to look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnContext {
    /// The main script, which must not return
    Script,
    /// A definition with this return type
    Definition(Type),
}

struct TypeChecker {
    functions: HashMap<Ident, Signature>,
    symbols: SymbolTable,
}

impl TypeChecker {
    fn check_definition(
        &mut self,
        def: ast::Definition<NoTypeContext>,
    ) -> Result<ast::Definition<Type>> {
        debug!(name = %def.name, arity = def.arity(), "type checking definition");

        let scope = self.symbols.add_scope(&def.name);
        for (param, typ) in &def.params {
            self.symbols
                .declare_formal(scope, param, *typ)
                .map_err(|_| TypeCheckError::Redeclared {
                    name: param.clone(),
                    span: def.name_span,
                })?;
        }

        let expected = ReturnContext::Definition(def.return_type);
        let (body, returns) = self.check_block(def.body, scope, expected)?;

        match returns {
            Returns::Always(typ) if typ == def.return_type => Ok(ast::Definition {
                name: def.name,
                params: def.params,
                return_type: def.return_type,
                body,
                name_span: def.name_span,
            }),
            Returns::Always(found) => Err(TypeCheckError::ReturnTypeMismatch {
                expected: def.return_type,
                found,
                span: body.span,
            }),
            Returns::Maybe(_) => Err(TypeCheckError::MightNotReturn {
                name: def.name,
                span: body.span,
            }),
            Returns::Never => Err(TypeCheckError::NeverReturns {
                name: def.name,
                span: body.span,
            }),
        }
    }

    fn check_script(&mut self, main: ast::Block<NoTypeContext>) -> Result<ast::Block<Type>> {
        debug!(statements = main.statements.len(), "type checking main script");

        let scope = self.symbols.add_scope(ENTRY_POINT);
        let (main, returns) = self.check_block(main, scope, ReturnContext::Script)?;

        // returns are rejected in the script, so there is nothing else to expect
        debug_assert_eq!(returns, Returns::Never);
        Ok(main)
    }

    fn check_block(
        &mut self,
        block: ast::Block<NoTypeContext>,
        scope: ScopeId,
        expected: ReturnContext,
    ) -> Result<(ast::Block<Type>, Returns)> {
        let mut returns = Returns::Never;
        let mut statements = Vec::with_capacity(block.statements.len());

        for stmt in block.statements {
            let span = stmt.span;
            let (stmt, stmt_returns) = self.check_statement(stmt, scope, expected)?;
            returns = returns.sequence(stmt_returns, span)?;
            statements.push(stmt);
        }

        let block = ast::Block {
            statements,
            span: block.span,
        };
        Ok((block, returns))
    }

    fn check_statement(
        &mut self,
        stmt: ast::Statement<NoTypeContext>,
        scope: ScopeId,
        expected: ReturnContext,
    ) -> Result<(ast::Statement<Type>, Returns)> {
        let span = stmt.span;
        let (kind, returns) = match stmt.kind {
            StatementKind::Introduce { name, typ, init } => {
                let init = self.check_expression(init, scope)?;
                assert_type_equal(typ, &init)?;

                self.symbols
                    .declare_local(scope, &name, typ)
                    .map_err(|_| TypeCheckError::Redeclared {
                        name: name.clone(),
                        span,
                    })?;

                (StatementKind::Introduce { name, typ, init }, Returns::Never)
            }
            StatementKind::Assign { name, value } => {
                let target = self.variable_type(scope, &name, span)?;
                let value = self.check_expression(value, scope)?;
                assert_type_equal(target, &value)?;
                (StatementKind::Assign { name, value }, Returns::Never)
            }
            StatementKind::AddAssign { name, value } => {
                let value = self.check_update(scope, &name, value, "+=", span)?;
                (StatementKind::AddAssign { name, value }, Returns::Never)
            }
            StatementKind::SubAssign { name, value } => {
                let value = self.check_update(scope, &name, value, "-=", span)?;
                (StatementKind::SubAssign { name, value }, Returns::Never)
            }
            StatementKind::Pass => (StatementKind::Pass, Returns::Never),
            StatementKind::Print(args) => {
                let args = args
                    .into_iter()
                    .map(|arg| self.check_expression(arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                (StatementKind::Print(args), Returns::Never)
            }
            StatementKind::Return(value) => {
                let ReturnContext::Definition(expected) = expected else {
                    return Err(TypeCheckError::UnexpectedReturn { span });
                };

                let value = self.check_expression(value, scope)?;
                if value.typ != expected {
                    return Err(TypeCheckError::ReturnTypeMismatch {
                        expected,
                        found: value.typ,
                        span: value.span,
                    });
                }

                (StatementKind::Return(value), Returns::Always(expected))
            }
            StatementKind::ReturnNone => match expected {
                ReturnContext::Script => return Err(TypeCheckError::UnexpectedReturn { span }),
                ReturnContext::Definition(Type::None) => {
                    (StatementKind::ReturnNone, Returns::Always(Type::None))
                }
                ReturnContext::Definition(expected) => {
                    return Err(TypeCheckError::ReturnTypeMismatch {
                        expected,
                        found: Type::None,
                        span,
                    })
                }
            },
            StatementKind::Call { function, args } => {
                let (args, returns) = self.check_call(&function, args, span, scope)?;
                if returns != Type::None {
                    return Err(TypeCheckError::NotAProcedure {
                        name: function,
                        returns,
                        span,
                    });
                }
                (StatementKind::Call { function, args }, Returns::Never)
            }
            StatementKind::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.check_condition(condition, scope, "if")?;
                let (then_block, then_returns) = self.check_block(then_block, scope, expected)?;
                let (else_block, else_returns) = self.check_block(else_block, scope, expected)?;
                let returns = then_returns.merge_branches(else_returns, span)?;

                let kind = StatementKind::IfElse {
                    condition,
                    then_block,
                    else_block,
                };
                (kind, returns)
            }
            StatementKind::While { condition, body } => {
                let condition = self.check_condition(condition, scope, "while")?;
                let (body, returns) = self.check_block(body, scope, expected)?;
                (StatementKind::While { condition, body }, returns.demote())
            }
        };

        Ok((ast::Statement { kind, span }, returns))
    }

    /// `name += value` and `name -= value` on integer variables
    fn check_update(
        &self,
        scope: ScopeId,
        name: &str,
        value: ast::Expression<NoTypeContext>,
        operator: &'static str,
        span: Span,
    ) -> Result<ast::Expression<Type>> {
        let target = self.variable_type(scope, name, span)?;
        if target != Type::Int {
            return Err(TypeCheckError::UnaryOperand {
                operator,
                expected: Type::Int,
                found: target,
                span,
            });
        }

        let value = self.check_expression(value, scope)?;
        assert_type_equal(target, &value)?;
        Ok(value)
    }

    fn check_condition(
        &self,
        condition: ast::Expression<NoTypeContext>,
        scope: ScopeId,
        construct: &'static str,
    ) -> Result<ast::Expression<Type>> {
        let condition = self.check_expression(condition, scope)?;
        if condition.typ != Type::Bool {
            return Err(TypeCheckError::NonBooleanCondition {
                construct,
                found: condition.typ,
                span: condition.span,
            });
        }
        Ok(condition)
    }

    fn check_expression(
        &self,
        expr: ast::Expression<NoTypeContext>,
        scope: ScopeId,
    ) -> Result<ast::Expression<Type>> {
        let span = expr.span;
        let (kind, typ) = match expr.kind {
            ExpressionKind::Int(i) => (ExpressionKind::Int(i), Type::Int),
            ExpressionKind::Str(s) => (ExpressionKind::Str(s), Type::Str),
            ExpressionKind::Bool(b) => (ExpressionKind::Bool(b), Type::Bool),
            ExpressionKind::None => (ExpressionKind::None, Type::None),
            ExpressionKind::Var(name) => {
                let typ = self.variable_type(scope, &name, span)?;
                (ExpressionKind::Var(name), typ)
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expression(*lhs, scope)?;
                let rhs = self.check_expression(*rhs, scope)?;

                let (operand, result) = match op {
                    BinaryOperation::Add
                    | BinaryOperation::Sub
                    | BinaryOperation::Mul
                    | BinaryOperation::Div
                    | BinaryOperation::Mod => (Type::Int, Type::Int),
                    BinaryOperation::Less | BinaryOperation::LessEq | BinaryOperation::Equals => {
                        if lhs.typ != rhs.typ {
                            return Err(TypeCheckError::IncomparableOperands {
                                lhs: lhs.typ,
                                rhs: rhs.typ,
                                span,
                            });
                        }
                        (Type::Int, Type::Bool)
                    }
                    BinaryOperation::And | BinaryOperation::Or => (Type::Bool, Type::Bool),
                };

                if lhs.typ != operand || rhs.typ != operand {
                    return Err(TypeCheckError::BinaryOperands {
                        op,
                        expected: operand,
                        lhs: lhs.typ,
                        rhs: rhs.typ,
                        span,
                    });
                }

                let kind = ExpressionKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                (kind, result)
            }
            ExpressionKind::Not { inner } => {
                let inner = self.check_expression(*inner, scope)?;
                assert_operand("not", Type::Bool, &inner)?;
                let kind = ExpressionKind::Not {
                    inner: Box::new(inner),
                };
                (kind, Type::Bool)
            }
            ExpressionKind::Input { prompt } => {
                let prompt = self.check_expression(*prompt, scope)?;
                assert_operand("input", Type::Str, &prompt)?;
                let kind = ExpressionKind::Input {
                    prompt: Box::new(prompt),
                };
                (kind, Type::Int)
            }
            ExpressionKind::IntCast { inner } => {
                let inner = self.check_expression(*inner, scope)?;
                assert_convertible(Type::Int, &inner)?;
                let kind = ExpressionKind::IntCast {
                    inner: Box::new(inner),
                };
                (kind, Type::Int)
            }
            ExpressionKind::StrCast { inner } => {
                let inner = self.check_expression(*inner, scope)?;
                assert_convertible(Type::Str, &inner)?;
                let kind = ExpressionKind::StrCast {
                    inner: Box::new(inner),
                };
                (kind, Type::Str)
            }
            ExpressionKind::Call { function, args } => {
                let (args, returns) = self.check_call(&function, args, span, scope)?;
                (ExpressionKind::Call { function, args }, returns)
            }
        };

        Ok(ast::Expression { kind, span, typ })
    }

    /// Check arity and argument types of a call, yielding the callee's return type
    fn check_call(
        &self,
        function: &str,
        args: Vec<ast::Expression<NoTypeContext>>,
        span: Span,
        scope: ScopeId,
    ) -> Result<(Vec<ast::Expression<Type>>, Type)> {
        let signature =
            self.functions
                .get(function)
                .ok_or_else(|| TypeCheckError::UnknownFunction {
                    name: function.to_string(),
                    span,
                })?;

        if args.len() != signature.params.len() {
            return Err(TypeCheckError::ArityMismatch {
                name: function.to_string(),
                expected: signature.params.len(),
                found: args.len(),
                span,
            });
        }

        let mut typed_args = Vec::with_capacity(args.len());
        for (index, (arg, &param)) in args.into_iter().zip(&signature.params).enumerate() {
            let arg = self.check_expression(arg, scope)?;
            if arg.typ != param {
                return Err(TypeCheckError::ArgumentType {
                    name: function.to_string(),
                    index,
                    expected: param,
                    found: arg.typ,
                    span: arg.span,
                });
            }
            typed_args.push(arg);
        }

        Ok((typed_args, signature.return_type))
    }

    fn variable_type(&self, scope: ScopeId, name: &str, span: Span) -> Result<Type> {
        self.symbols
            .lookup(scope, name)
            .ok()
            .and_then(|symbol| symbol.typ)
            .ok_or_else(|| TypeCheckError::UndeclaredVariable {
                name: name.to_string(),
                span,
            })
    }
}

fn assert_type_equal(expected: Type, expr: &ast::Expression<Type>) -> Result<()> {
    if expr.typ == expected {
        Ok(())
    } else {
        Err(TypeCheckError::TypeMismatch {
            expected,
            found: expr.typ,
            span: expr.span,
        })
    }
}

fn assert_operand(
    operator: &'static str,
    expected: Type,
    expr: &ast::Expression<Type>,
) -> Result<()> {
    if expr.typ == expected {
        Ok(())
    } else {
        Err(TypeCheckError::UnaryOperand {
            operator,
            expected,
            found: expr.typ,
            span: expr.span,
        })
    }
}

fn assert_convertible(target: Type, expr: &ast::Expression<Type>) -> Result<()> {
    match expr.typ {
        Type::Int | Type::Str | Type::Bool => Ok(()),
        Type::None => Err(TypeCheckError::Conversion {
            target,
            found: expr.typ,
            span: expr.span,
        }),
    }
}
