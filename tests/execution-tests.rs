mod common;

use common::*;
use minipy::ast::{BinaryOperation as Op, Expression, Statement, UntypedProgram};
use minipy::interp::{CallLog, Interpreter, RuntimeError};
use minipy::Type;

fn compare_and_print(x: i64) -> UntypedProgram {
    script(vec![
        Statement::introduce("x", Type::Int, int(x)),
        Statement::introduce("y", Type::Int, int(4)),
        Statement::if_else(
            bin(Op::Less, var("x"), var("y")),
            block(vec![Statement::print(vec![var("x")])]),
            block(vec![Statement::print(vec![var("y")])]),
        ),
    ])
}

#[test]
fn both_branches_of_if_else() {
    assert_eq!(run_pipeline(compare_and_print(3), &[]), "3\n");
    assert_eq!(run_pipeline(compare_and_print(5), &[]), "4\n");
}

/// `def noisy() -> bool: print("called"); return True`
fn noisy() -> minipy::ast::Definition<minipy::ast::NoTypeContext> {
    def(
        "noisy",
        &[],
        Type::Bool,
        vec![
            Statement::print(vec![Expression::str("called")]),
            Statement::ret(Expression::bool(true)),
        ],
    )
}

#[test]
fn and_skips_its_right_operand() {
    let (output, calls) = run_traced(
        program(
            vec![noisy()],
            vec![
                Statement::introduce("a", Type::Bool, Expression::bool(false)),
                Statement::if_else(
                    bin(Op::And, var("a"), Expression::call("noisy", vec![])),
                    block(vec![Statement::print(vec![int(1)])]),
                    block(vec![Statement::print(vec![int(2)])]),
                ),
            ],
        ),
        CallLog::default(),
    );

    assert_eq!(output, "2\n");
    assert_eq!(calls.0, ["main"]);
}

#[test]
fn or_skips_its_right_operand() {
    let (output, calls) = run_traced(
        program(
            vec![noisy()],
            vec![Statement::print(vec![bin(
                Op::Or,
                Expression::bool(true),
                Expression::call("noisy", vec![]),
            )])],
        ),
        CallLog::default(),
    );

    assert_eq!(output, "True\n");
    assert_eq!(calls.0, ["main"]);
}

#[test]
fn right_operand_runs_when_needed() {
    let (output, calls) = run_traced(
        program(
            vec![noisy()],
            vec![Statement::print(vec![bin(
                Op::And,
                Expression::bool(true),
                Expression::call("noisy", vec![]),
            )])],
        ),
        CallLog::default(),
    );

    assert_eq!(output, "called\nTrue\n");
    assert_eq!(calls.0, ["main", "noisy"]);
}

#[test]
fn recursion() {
    let fib = def(
        "fib",
        &[("n", Type::Int)],
        Type::Int,
        vec![Statement::if_else(
            bin(Op::Less, var("n"), int(2)),
            block(vec![Statement::ret(var("n"))]),
            block(vec![Statement::ret(bin(
                Op::Add,
                Expression::call("fib", vec![bin(Op::Sub, var("n"), int(1))]),
                Expression::call("fib", vec![bin(Op::Sub, var("n"), int(2))]),
            ))]),
        )],
    );

    let output = run_pipeline(
        program(
            vec![fib],
            vec![Statement::print(vec![Expression::call("fib", vec![int(10)])])],
        ),
        &[],
    );
    assert_eq!(output, "55\n");
}

#[test]
fn nested_calls_keep_their_arguments() {
    let sub = def(
        "sub",
        &[("a", Type::Int), ("b", Type::Int)],
        Type::Int,
        vec![Statement::ret(bin(Op::Sub, var("a"), var("b")))],
    );

    // sub(sub(10, 3), sub(4, 6)) = 7 - (-2)
    let output = run_pipeline(
        program(
            vec![sub],
            vec![Statement::print(vec![Expression::call(
                "sub",
                vec![
                    Expression::call("sub", vec![int(10), int(3)]),
                    Expression::call("sub", vec![int(4), int(6)]),
                ],
            )])],
        ),
        &[],
    );
    assert_eq!(output, "9\n");
}

#[test]
fn printing_every_type() {
    let output = run_pipeline(
        script(vec![
            Statement::print(vec![
                int(1),
                Expression::str("a"),
                Expression::bool(true),
                Expression::none(),
            ]),
            Statement::print(vec![
                bin(Op::Less, int(1), int(2)),
                Expression::not(bin(Op::Less, int(1), int(2))),
            ]),
            Statement::print(vec![]),
        ]),
        &[],
    );
    assert_eq!(output, "1 a True None\nTrue False\n\n");
}

#[test]
fn procedures() {
    let greet = def(
        "greet",
        &[("name", Type::Str)],
        Type::None,
        vec![
            Statement::print(vec![Expression::str("hi"), var("name")]),
            Statement::ret_none(),
        ],
    );

    let output = run_pipeline(
        program(
            vec![greet],
            vec![
                Statement::call("greet", vec![Expression::str("bob")]),
                Statement::print(vec![Expression::call("greet", vec![Expression::str("amy")])]),
            ],
        ),
        &[],
    );
    assert_eq!(output, "hi bob\nhi amy\nNone\n");
}

#[test]
fn loops_and_updates() {
    let output = run_pipeline(
        script(vec![
            Statement::introduce("i", Type::Int, int(0)),
            Statement::introduce("total", Type::Int, int(0)),
            Statement::while_loop(
                bin(Op::Less, var("i"), int(5)),
                block(vec![
                    Statement::add_assign("total", var("i")),
                    Statement::add_assign("i", int(1)),
                ]),
            ),
            Statement::sub_assign("total", int(1)),
            Statement::print(vec![var("total")]),
        ]),
        &[],
    );
    assert_eq!(output, "9\n");
}

#[test]
fn arithmetic_floors() {
    let output = run_pipeline(
        script(vec![Statement::print(vec![
            bin(Op::Div, int(-7), int(2)),
            bin(Op::Mod, int(-7), int(2)),
            bin(Op::Mul, int(6), int(7)),
        ])]),
        &[],
    );
    assert_eq!(output, "-4 1 42\n");
}

#[test]
fn conversions() {
    let output = run_pipeline(
        script(vec![Statement::print(vec![
            Expression::str_cast(int(5)),
            bin(Op::Add, Expression::int_cast(Expression::str("17")), int(1)),
            Expression::str_cast(bin(Op::LessEq, int(1), int(0))),
            Expression::int_cast(Expression::bool(true)),
            Expression::int_cast(int(8)),
        ])]),
        &[],
    );
    assert_eq!(output, "5 18 False 1 8\n");
}

#[test]
fn input_prints_its_prompt() {
    let output = run_pipeline(
        script(vec![
            Statement::introduce("n", Type::Int, Expression::input(Expression::str("n? "))),
            Statement::print(vec![bin(Op::Mul, var("n"), int(2))]),
        ]),
        &[21],
    );
    assert_eq!(output, "n? 42\n");
}

#[test]
fn boolean_variables() {
    let output = run_pipeline(
        script(vec![
            Statement::introduce(
                "b",
                Type::Bool,
                bin(
                    Op::And,
                    Expression::not(bin(Op::Equals, int(1), int(2))),
                    Expression::bool(true),
                ),
            ),
            Statement::if_else(
                var("b"),
                block(vec![Statement::print(vec![Expression::str("yes")])]),
                block(vec![Statement::print(vec![Expression::str("no")])]),
            ),
            Statement::assign("b", Expression::not(var("b"))),
            Statement::print(vec![var("b")]),
        ]),
        &[],
    );
    assert_eq!(output, "yes\nFalse\n");
}

#[test]
fn runtime_errors() {
    let program = compile(script(vec![Statement::print(vec![bin(
        Op::Div,
        int(1),
        int(0),
    )])]));
    assert!(matches!(
        Interpreter::new(&program).run(),
        Err(RuntimeError::DivisionByZero { .. })
    ));

    let program = compile(script(vec![Statement::print(vec![Expression::int_cast(
        Expression::str("twelve"),
    )])]));
    assert_eq!(
        Interpreter::new(&program).run().unwrap_err(),
        RuntimeError::Conversion("twelve".to_string())
    );

    let program = compile(script(vec![Statement::while_loop(
        Expression::bool(true),
        block(vec![Statement::pass()]),
    )]));
    assert!(matches!(
        Interpreter::new(&program).with_step_limit(1_000).run(),
        Err(RuntimeError::StepLimit(1_000))
    ));
}
