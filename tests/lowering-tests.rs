mod common;

use common::*;
use minipy::ast::{BinaryOperation as Op, Expression, Statement};
use minipy::ir::{Comparison, Instruction, Label, Name};
use minipy::Type;

fn listing(code: &[Instruction]) -> Vec<String> {
    code.iter().map(ToString::to_string).collect()
}

#[test]
fn minimal() {
    let program = compile(script(vec![Statement::pass()]));

    assert!(program.functions.is_empty());
    assert_eq!(program.main.prototype.name, "main");
    assert_eq!(
        listing(&program.main.code),
        ["main:", "    ENTER", "    NOP", ".done5:", "    LEAVE"]
    );
}

#[test]
fn well_known_strings_come_first() {
    let program = compile(script(vec![]));

    let strings: Vec<(&str, &str)> = program.symbols.string_constants().collect();
    assert_eq!(
        strings,
        [
            (".str0", "\n"),
            (".str1", " "),
            (".str2", "True"),
            (".str3", "False"),
            (".str4", "None"),
        ]
    );
    assert!(program.to_string().starts_with(".str0: \"\\n\"\n"));
}

#[test]
fn if_else_on_a_comparison() {
    let program = compile(script(vec![
        Statement::introduce("x", Type::Int, int(3)),
        Statement::introduce("y", Type::Int, int(4)),
        Statement::if_else(
            bin(Op::Less, var("x"), var("y")),
            block(vec![Statement::print(vec![var("x")])]),
            block(vec![Statement::print(vec![var("y")])]),
        ),
    ]));

    assert_eq!(
        listing(&program.main.code),
        [
            "main:",
            "    ENTER",
            "    SET x, 3",
            "    SET y, 4",
            "    MOVE %t9, x",
            "    MOVE %t10, y",
            "    BRANCH_CMP lt %t9, %t10, .then6, .else7",
            ".then6:",
            "    MOVE %t11, x",
            "    PRINT_INT %t11",
            "    LOAD_STRING %t12, .str0",
            "    PRINT_STRING %t12",
            "    JUMP .endif8",
            ".else7:",
            "    MOVE %t13, y",
            "    PRINT_INT %t13",
            "    LOAD_STRING %t14, .str0",
            "    PRINT_STRING %t14",
            ".endif8:",
            ".done5:",
            "    LEAVE",
        ]
    );
}

#[test]
fn definitions_are_wrapped() {
    let program = compile(program(
        vec![def(
            "answer",
            &[("unused", Type::Bool)],
            Type::Int,
            vec![Statement::ret(int(42))],
        )],
        vec![],
    ));

    let answer = program.function("answer").unwrap();
    assert_eq!(answer.prototype.parameters, [(Name::from("unused"), Type::Bool)]);
    assert_eq!(answer.prototype.return_type, Type::Int);
    assert_eq!(program.skeleton().len(), 1);

    let code = &answer.code;
    assert_eq!(code[0], Instruction::Label(Label::from("answer")));
    assert_eq!(code[1], Instruction::Enter);
    assert_eq!(code[code.len() - 1], Instruction::Leave);

    let Instruction::Label(exit) = &code[code.len() - 2] else {
        panic!("expected the exit label before LEAVE")
    };
    assert!(exit.as_str().starts_with(".done"));

    // every return stores its value and leaves through the exit label
    let ret = code
        .iter()
        .position(|inst| matches!(inst, Instruction::Return { .. }))
        .unwrap();
    assert_eq!(code[ret + 1], Instruction::Jump(exit.clone()));

    // temporaries and labels live in the definition's own scope
    let scope = answer.prototype.scope;
    assert_eq!(program.symbols.owner(scope), "answer");
    assert!(program
        .symbols
        .symbols(scope)
        .iter()
        .any(|s| s.name.starts_with("%t")));
}

#[test]
fn string_literals_share_constants() {
    let program = compile(script(vec![
        Statement::print(vec![Expression::str("True")]),
        Statement::print(vec![Expression::bool(true)]),
        Statement::print(vec![Expression::str("hello"), Expression::str("hello")]),
    ]));

    let loads: Vec<&str> = program
        .main
        .code
        .iter()
        .filter_map(|inst| match inst {
            Instruction::LoadString { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();

    // the literal "True" and the printed boolean use the same constant
    assert_eq!(loads[0], ".str2");
    assert!(loads.contains(&".str3"));
    assert_eq!(program.symbols.string_constants().count(), 6);
}

#[test]
fn arguments_are_evaluated_before_they_are_passed() {
    let program = compile(program(
        vec![def(
            "add",
            &[("a", Type::Int), ("b", Type::Int)],
            Type::Int,
            vec![Statement::ret(bin(Op::Add, var("a"), var("b")))],
        )],
        vec![Statement::print(vec![Expression::call(
            "add",
            vec![
                Expression::call("add", vec![int(1), int(2)]),
                Expression::call("add", vec![int(3), int(4)]),
            ],
        )])],
    ));

    let protocol: Vec<String> = program
        .main
        .code
        .iter()
        .filter(|inst| {
            matches!(
                inst,
                Instruction::SetArgument { .. } | Instruction::Call(_)
            )
        })
        .map(|inst| inst.to_string().trim().split(' ').next().unwrap().to_string())
        .collect();

    assert_eq!(
        protocol,
        [
            "SET_ARG", "SET_ARG", "CALL", // add(1, 2)
            "SET_ARG", "SET_ARG", "CALL", // add(3, 4)
            "SET_ARG", "SET_ARG", "CALL", // outer add
        ]
    );
}

#[test]
fn short_circuit_conditions() {
    let program = compile(script(vec![
        Statement::introduce("a", Type::Bool, Expression::bool(false)),
        Statement::introduce("n", Type::Int, int(0)),
        Statement::while_loop(
            bin(
                Op::Or,
                var("a"),
                bin(Op::LessEq, var("n"), int(3)),
            ),
            block(vec![Statement::add_assign("n", int(2))]),
        ),
    ]));
    let code = &program.main.code;

    // `or` tests its left operand and skips straight into the body when it holds
    let Some(Instruction::BranchZero {
        src,
        if_true,
        if_false,
        ..
    }) = code
        .iter()
        .find(|inst| matches!(inst, Instruction::BranchZero { .. }))
    else {
        panic!("expected a branch on `a`")
    };
    assert_eq!(src, &Name::from("a"));
    assert!(if_true.as_str().starts_with(".body"));
    assert!(if_false.as_str().starts_with(".or"));

    assert!(code.iter().any(|inst| matches!(
        inst,
        Instruction::BranchCompare {
            cmp: Comparison::Le,
            ..
        }
    )));
    // the condition never materializes a value
    assert!(!code
        .iter()
        .any(|inst| matches!(inst, Instruction::Set { value: 1, .. })));
}

#[test]
fn boolean_values_are_materialized() {
    let program = compile(script(vec![Statement::introduce(
        "b",
        Type::Bool,
        Expression::not(bin(Op::Equals, int(1), int(2))),
    )]));

    let listing = listing(&program.main.code);
    assert!(listing.contains(&"    SET %t6, 1".to_string()));
    assert!(listing.contains(&"    SET %t6, 0".to_string()));
    assert!(listing.contains(&"    MOVE b, %t6".to_string()));
}

#[test]
fn compound_assignment() {
    let program = compile(script(vec![
        Statement::introduce("x", Type::Int, int(10)),
        Statement::sub_assign("x", int(3)),
    ]));

    assert_eq!(
        listing(&program.main.code)[3..6],
        ["    MOVE %t6, x", "    SET %t7, 3", "    SUB x, %t6, %t7"]
    );
}

#[test]
fn symbol_table_dump() {
    let program = compile(program(
        vec![def(
            "twice",
            &[("n", Type::Int)],
            Type::Int,
            vec![Statement::ret(bin(Op::Mul, var("n"), int(2)))],
        )],
        vec![Statement::print(vec![Expression::call("twice", vec![int(4)])])],
    ));

    let mut out = Vec::new();
    program.symbols.write_tree(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("twice"));
    assert!(out.contains("n: int (formal)"));
    assert!(out.contains("main"));
}
