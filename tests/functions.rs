mod common;

use common::{run_capture, run_error, run_program, try_run_with};
use php_core::ast::builder::AstBuilder;
use php_core::ast::{BinaryOp, MagicConstKind, StmtId};
use php_core::core::value::{Val, Visibility};
use php_core::vm::executor::ExecutionConfig;

/// `function fact($n) { if ($n <= 1) return 1; return $n * fact($n - 1); }`
fn factorial<'a>(b: &AstBuilder<'a>) -> StmtId<'a> {
    b.function(
        "fact",
        &[b.param("n")],
        &[
            b.if_(
                b.binary(b.var("n"), BinaryOp::LtEq, b.int(1)),
                &[b.ret(Some(b.int(1)))],
                None,
            ),
            b.ret(Some(b.binary(
                b.var("n"),
                BinaryOp::Mul,
                b.call("fact", &[b.binary(b.var("n"), BinaryOp::Minus, b.int(1))]),
            ))),
        ],
    )
}

fn greet<'a>(b: &AstBuilder<'a>) -> StmtId<'a> {
    b.function(
        "greet",
        &[b.param("name"), b.param_default("greeting", b.string("Hello"))],
        &[b.ret(Some(b.binary(
            b.binary(b.var("greeting"), BinaryOp::Concat, b.string(", ")),
            BinaryOp::Concat,
            b.var("name"),
        )))],
    )
}

#[test]
fn test_recursive_function() {
    let result = run_program(|b| vec![factorial(b), b.ret(Some(b.call("fact", &[b.int(10)])))]);
    assert_eq!(result, Val::Int(3628800));
}

#[test]
fn test_function_names_are_case_insensitive() {
    let out = run_capture(|b| vec![factorial(b), b.echo(&[b.call("FACT", &[b.int(4)])])]);
    assert_eq!(out, "24");
}

#[test]
fn test_default_and_extra_arguments() {
    let out = run_capture(|b| {
        vec![
            greet(b),
            b.echo(&[
                b.call("greet", &[b.string("Ann")]),
                b.string("|"),
                b.call("greet", &[b.string("Bo"), b.string("Hi")]),
                b.string("|"),
                b.call("greet", &[b.string("Cy"), b.string("Yo"), b.string("ignored")]),
            ]),
        ]
    });
    assert_eq!(out, "Hello, Ann|Hi, Bo|Yo, Cy");
}

#[test]
fn test_too_few_arguments() {
    let err = run_error(|b| vec![greet(b), b.expr_stmt(b.call("greet", &[]))]);
    assert_eq!(
        err.to_string(),
        "Too few arguments to function greet(), 0 passed and at least 1 expected"
    );

    let err = run_error(|b| vec![factorial(b), b.expr_stmt(b.call("fact", &[]))]);
    assert_eq!(
        err.to_string(),
        "Too few arguments to function fact(), 0 passed and exactly 1 expected"
    );
}

#[test]
fn test_undefined_function() {
    let err = run_error(|b| vec![b.expr_stmt(b.call("nope", &[]))]);
    assert_eq!(err.to_string(), "Call to undefined function nope()");
}

#[test]
fn test_function_redeclaration() {
    let err = run_error(|b| {
        vec![
            b.function("twice", &[], &[]),
            b.function("twice", &[], &[]),
        ]
    });
    assert_eq!(err.to_string(), "Cannot redeclare twice()");
}

#[test]
fn test_conditional_declaration_is_not_hoisted() {
    let out = run_capture(|b| {
        vec![
            b.if_(
                b.bool(true),
                &[b.function("late", &[], &[b.ret(Some(b.string("late")))])],
                None,
            ),
            b.echo(&[b.call("late", &[])]),
        ]
    });
    assert_eq!(out, "late");

    let err = run_error(|b| {
        vec![
            b.echo(&[b.call("late", &[])]),
            b.if_(
                b.bool(true),
                &[b.function("late", &[], &[b.ret(Some(b.string("late")))])],
                None,
            ),
        ]
    });
    assert_eq!(err.to_string(), "Call to undefined function late()");
}

#[test]
fn test_local_scope_is_isolated() {
    let out = run_capture(|b| {
        vec![
            b.function(
                "local",
                &[],
                &[
                    b.expr_stmt(b.assign(b.var("x"), b.string("inner"))),
                    b.ret(Some(b.var("x"))),
                ],
            ),
            b.expr_stmt(b.assign(b.var("x"), b.string("outer"))),
            b.echo(&[b.call("local", &[]), b.string(" "), b.var("x")]),
        ]
    });
    assert_eq!(out, "inner outer");
}

#[test]
fn test_nesting_limit() {
    let config = ExecutionConfig {
        max_call_depth: 10,
        ..ExecutionConfig::default()
    };
    let err = try_run_with(config, |b| {
        vec![
            b.function("forever", &[], &[b.ret(Some(b.call("forever", &[])))]),
            b.expr_stmt(b.call("forever", &[])),
        ]
    })
    .expect_err("unbounded recursion stops");
    assert_eq!(
        err.to_string(),
        "Maximum function nesting level of '10' reached, aborting!"
    );
}

#[test]
fn test_magic_constants() {
    let out = run_capture(|b| {
        b.set_line(42);
        let line = b.magic(MagicConstKind::Line);
        b.set_line(43);
        vec![
            b.function("where_am_i", &[], &[b.ret(Some(b.magic(MagicConstKind::Function)))]),
            b.class(
                "Locator",
                None,
                &[b.method(
                    "find",
                    &[],
                    &[b.ret(Some(b.binary(
                        b.binary(b.magic(MagicConstKind::Method), BinaryOp::Concat, b.string(" ")),
                        BinaryOp::Concat,
                        b.magic(MagicConstKind::Class),
                    )))],
                    Visibility::Public,
                )],
            ),
            b.echo(&[
                line,
                b.string(" "),
                b.call("where_am_i", &[]),
                b.string(" "),
                b.method_call(b.new_object(b.class_named("Locator"), &[]), "find", &[]),
                b.string(" ["),
                b.magic(MagicConstKind::Function),
                b.string("]"),
            ]),
        ]
    });
    assert_eq!(out, "42 where_am_i Locator::find Locator []");
}

#[test]
fn test_callbacks_by_name_and_by_array() {
    let out = run_capture(|b| {
        let cmp = |l: &str, r: &str| {
            b.ret(Some(b.binary(b.var(l), BinaryOp::Spaceship, b.var(r))))
        };
        vec![
            b.class(
                "Order",
                None,
                &[
                    b.static_method("desc", &[b.param("a"), b.param("b")], &[cmp("b", "a")], Visibility::Public),
                    b.method("asc", &[b.param("a"), b.param("b")], &[cmp("a", "b")], Visibility::Public),
                ],
            ),
            b.expr_stmt(b.assign(b.var("n"), b.array_list(&[b.int(2), b.int(3), b.int(1)]))),
            b.expr_stmt(b.call("usort", &[b.var("n"), b.string("Order::desc")])),
            b.echo(&[b.call("implode", &[b.string(""), b.var("n")])]),
            b.expr_stmt(b.call(
                "usort",
                &[b.var("n"), b.array_list(&[b.string("Order"), b.string("desc")])],
            )),
            b.echo(&[b.call("implode", &[b.string(""), b.var("n")])]),
            b.expr_stmt(b.call(
                "usort",
                &[
                    b.var("n"),
                    b.array_list(&[b.new_object(b.class_named("Order"), &[]), b.string("asc")]),
                ],
            )),
            b.echo(&[b.call("implode", &[b.string(""), b.var("n")])]),
        ]
    });
    assert_eq!(out, "321321123");
}

#[test]
fn test_invalid_callback() {
    let err = run_error(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("n"), b.array_list(&[b.int(2), b.int(1)]))),
            b.expr_stmt(b.call("usort", &[b.var("n"), b.int(5)])),
        ]
    });
    assert!(
        err.to_string().contains("must be a valid callback"),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_builtin_arity_error() {
    let err = run_error(|b| vec![b.echo(&[b.call("strlen", &[])])]);
    assert_eq!(err.to_string(), "strlen() expects exactly 1 argument, 0 given");
}
