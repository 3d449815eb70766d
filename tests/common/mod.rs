#![allow(dead_code)]

use minipy::ast::{BinaryOperation, Block, Definition, Expression, Program, Statement};
use minipy::interp::{Interpreter, Tracer};
use minipy::{ir, Type, TypedProgram};
use tracing_subscriber::EnvFilter;

pub type Expr = Expression<minipy::ast::NoTypeContext>;
pub type Stmt = Statement<minipy::ast::NoTypeContext>;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn type_check(program: minipy::ast::UntypedProgram) -> TypedProgram {
    init_logging();
    minipy::type_check(program).unwrap()
}

pub fn compile(program: minipy::ast::UntypedProgram) -> ir::Program {
    init_logging();
    minipy::compile(program).unwrap()
}

/// Compile and run a program, returning what it printed
pub fn run_pipeline(program: minipy::ast::UntypedProgram, input: &[i64]) -> String {
    let program = compile(program);
    let mut interp = Interpreter::new(&program)
        .with_input(input.iter().copied())
        .with_step_limit(100_000);
    interp.run().unwrap().to_string()
}

/// Like [run_pipeline], but hands the tracer back for inspection
pub fn run_traced<T: Tracer>(program: minipy::ast::UntypedProgram, tracer: T) -> (String, T) {
    let program = compile(program);
    let mut interp = Interpreter::new(&program)
        .with_tracer(tracer)
        .with_step_limit(100_000);
    interp.run().unwrap();
    let output = interp.output().to_string();
    (output, interp.into_tracer())
}

pub fn script(statements: Vec<Stmt>) -> minipy::ast::UntypedProgram {
    Program::new(vec![], Block::new(statements))
}

pub fn program(
    definitions: Vec<Definition<minipy::ast::NoTypeContext>>,
    main: Vec<Stmt>,
) -> minipy::ast::UntypedProgram {
    Program::new(definitions, Block::new(main))
}

pub fn def(
    name: &str,
    params: &[(&str, Type)],
    return_type: Type,
    body: Vec<Stmt>,
) -> Definition<minipy::ast::NoTypeContext> {
    Definition::new(
        name,
        params
            .iter()
            .map(|(param, typ)| (param.to_string(), *typ))
            .collect(),
        return_type,
        Block::new(body),
    )
}

pub fn block(statements: Vec<Stmt>) -> Block<minipy::ast::NoTypeContext> {
    Block::new(statements)
}

pub fn int(value: i64) -> Expr {
    Expression::int(value)
}

pub fn var(name: &str) -> Expr {
    Expression::var(name)
}

pub fn bin(op: BinaryOperation, lhs: Expr, rhs: Expr) -> Expr {
    Expression::binary(op, lhs, rhs)
}
