mod common;

use common::{run_capture, run_diagnostics, run_error, run_program};
use php_core::ast::builder::AstBuilder;
use php_core::ast::{BinaryOp, CastKind, ExprId};
use php_core::core::value::Val;

/// `cond ? "T" : "F"`
fn tf<'a>(b: &AstBuilder<'a>, cond: ExprId<'a>) -> ExprId<'a> {
    b.ternary(cond, Some(b.string("T")), b.string("F"))
}

#[test]
fn test_loose_equality_table() {
    let out = run_capture(|b| {
        let eq = |l, r| tf(b, b.binary(l, BinaryOp::EqEq, r));
        vec![b.echo(&[
            eq(b.int(0), b.string("a")),
            eq(b.string("1"), b.string("01")),
            eq(b.string("10"), b.string("1e1")),
            eq(b.int(100), b.string("1e2")),
            eq(b.null(), b.bool(false)),
            eq(b.string("abc"), b.int(0)),
            eq(b.array_list(&[]), b.bool(false)),
            eq(b.null(), b.int(0)),
            eq(b.string(""), b.null()),
            eq(b.string("1"), b.string(" 1")),
        ])]
    });
    assert_eq!(out, "FTTTTFTTTT");
}

#[test]
fn test_identity_compares_types() {
    let out = run_capture(|b| {
        let same = |l, r| tf(b, b.binary(l, BinaryOp::EqEqEq, r));
        vec![b.echo(&[
            same(b.int(1), b.int(1)),
            same(b.int(1), b.float(1.0)),
            same(b.string("1"), b.int(1)),
            same(
                b.array_list(&[b.int(1), b.int(2)]),
                b.array_list(&[b.int(1), b.int(2)]),
            ),
            same(
                b.array_map(&[(b.int(1), b.int(2)), (b.int(0), b.int(1))]),
                b.array_list(&[b.int(1), b.int(2)]),
            ),
        ])]
    });
    assert_eq!(out, "TFFTF");
}

#[test]
fn test_ordering_and_spaceship() {
    let out = run_capture(|b| {
        vec![b.echo(&[
            b.binary(b.int(1), BinaryOp::Spaceship, b.int(2)),
            b.string(","),
            b.binary(b.string("b"), BinaryOp::Spaceship, b.string("a")),
            b.string(","),
            b.binary(b.float(1.5), BinaryOp::Spaceship, b.float(1.5)),
            b.string(","),
            tf(b, b.binary(b.string("abc"), BinaryOp::Lt, b.string("abd"))),
            tf(b, b.binary(b.string("10"), BinaryOp::Gt, b.string("9"))),
            tf(b, b.binary(b.null(), BinaryOp::Lt, b.int(-1))),
        ])]
    });
    assert_eq!(out, "-1,1,0,TTT");
}

#[test]
fn test_arithmetic_results() {
    let out = run_capture(|b| {
        let sep = || b.string(" ");
        vec![b.echo(&[
            b.binary(b.int(7), BinaryOp::Div, b.int(2)),
            sep(),
            b.binary(b.int(10), BinaryOp::Div, b.int(5)),
            sep(),
            b.binary(b.float(0.1), BinaryOp::Plus, b.float(0.2)),
            sep(),
            b.binary(b.constant("PHP_INT_MAX"), BinaryOp::Plus, b.int(1)),
            sep(),
            b.binary(b.int(-7), BinaryOp::Mod, b.int(3)),
            sep(),
            b.binary(b.int(2), BinaryOp::Pow, b.int(10)),
            sep(),
            b.binary(b.string("5"), BinaryOp::Mul, b.string("4")),
            sep(),
            b.binary(b.string("1.5"), BinaryOp::Plus, b.int(1)),
        ])]
    });
    assert_eq!(out, "3.5 2 0.3 9.2233720368548E+18 -1 1024 20 2.5");
}

#[test]
fn test_division_by_zero_warns() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![b.echo(&[b.binary(b.int(1), BinaryOp::Div, b.int(0))])]
    });
    assert_eq!(out, "INF");
    assert_eq!(diagnostics, vec!["Warning: Division by zero"]);
}

#[test]
fn test_modulo_by_zero_is_an_error() {
    let err = run_error(|b| vec![b.echo(&[b.binary(b.int(1), BinaryOp::Mod, b.int(0))])]);
    assert_eq!(err.to_string(), "Modulo by zero");
}

#[test]
fn test_array_operand_is_unsupported() {
    let err = run_error(|b| {
        vec![b.echo(&[b.binary(b.array_list(&[]), BinaryOp::Plus, b.int(1))])]
    });
    assert_eq!(err.to_string(), "Unsupported operand types: array + int");
}

#[test]
fn test_array_union_keeps_left_keys() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(
                b.var("u"),
                b.binary(
                    b.array_list(&[b.string("a"), b.string("b")]),
                    BinaryOp::Plus,
                    b.array_list(&[b.string("x"), b.string("y"), b.string("z")]),
                ),
            )),
            b.echo(&[b.call("implode", &[b.string(","), b.var("u")])]),
        ]
    });
    assert_eq!(out, "a,b,z");
}

#[test]
fn test_leading_numeric_string_notice() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            b.echo(&[b.binary(b.string("3 apples"), BinaryOp::Plus, b.int(2))]),
            b.echo(&[b.binary(b.string("apples"), BinaryOp::Plus, b.int(2))]),
        ]
    });
    assert_eq!(out, "52");
    assert_eq!(
        diagnostics,
        vec![
            "Notice: A non well formed numeric value encountered",
            "Warning: A non-numeric value encountered",
        ]
    );
}

#[test]
fn test_string_increment() {
    let out = run_capture(|b| {
        let bump = |start: &str| {
            vec![
                b.expr_stmt(b.assign(b.var("s"), b.string(start))),
                b.expr_stmt(b.pre_inc(b.var("s"))),
                b.echo(&[b.var("s"), b.string(" ")]),
            ]
        };
        ["a", "Az", "zz", "a9", "Zz9"]
            .into_iter()
            .flat_map(bump)
            .collect()
    });
    assert_eq!(out, "b Ba aaa b0 AAa0 ");
}

#[test]
fn test_increment_and_decrement_of_null() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("a"), b.null())),
            b.expr_stmt(b.post_inc(b.var("a"))),
            b.expr_stmt(b.assign(b.var("d"), b.null())),
            b.expr_stmt(b.post_dec(b.var("d"))),
            b.echo(&[
                b.var("a"),
                b.string(","),
                tf(b, b.call("is_null", &[b.var("d")])),
            ]),
        ]
    });
    assert_eq!(out, "1,T");
}

#[test]
fn test_post_increment_returns_old_value() {
    let result = run_program(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("i"), b.int(5))),
            b.expr_stmt(b.assign(b.var("old"), b.post_inc(b.var("i")))),
            b.ret(Some(b.binary(
                b.binary(b.var("old"), BinaryOp::Mul, b.int(10)),
                BinaryOp::Plus,
                b.var("i"),
            ))),
        ]
    });
    if let Val::Int(i) = result {
        assert_eq!(i, 56);
    } else {
        panic!("Expected integer result, got {:?}", result);
    }
}

#[test]
fn test_casts() {
    let out = run_capture(|b| {
        let sep = || b.string("|");
        vec![b.echo(&[
            b.cast(CastKind::Int, b.string("12abc")),
            sep(),
            b.cast(CastKind::Int, b.float(-12.9)),
            sep(),
            tf(b, b.cast(CastKind::Bool, b.string("0"))),
            tf(b, b.cast(CastKind::Bool, b.string("0.0"))),
            tf(b, b.cast(CastKind::Bool, b.array_list(&[]))),
            sep(),
            b.cast(CastKind::String, b.float(1.0)),
            sep(),
            b.call("count", &[b.cast(CastKind::Array, b.string("x"))]),
            sep(),
            b.cast(CastKind::Float, b.string("1e3")),
        ])]
    });
    assert_eq!(out, "12|-12|FTF|1|1|1000");
}

#[test]
fn test_concat_and_bitwise() {
    let out = run_capture(|b| {
        vec![b.echo(&[
            b.binary(b.string("a"), BinaryOp::Concat, b.float(1.5)),
            b.binary(b.string("-"), BinaryOp::Concat, b.bool(true)),
            b.binary(b.string("-"), BinaryOp::Concat, b.null()),
            b.string(" "),
            b.binary(b.int(6), BinaryOp::BitAnd, b.int(3)),
            b.binary(b.int(6), BinaryOp::BitOr, b.int(3)),
            b.binary(b.int(6), BinaryOp::BitXor, b.int(3)),
            b.binary(b.int(1), BinaryOp::ShiftLeft, b.int(4)),
            b.string(" "),
            b.binary(b.string("ab"), BinaryOp::BitOr, b.string("  ")),
        ])]
    });
    assert_eq!(out, "a1.5-1- 27516 ab");
}

#[test]
fn test_negative_shift_is_an_error() {
    let err = run_error(|b| {
        vec![b.echo(&[b.binary(b.int(1), BinaryOp::ShiftLeft, b.int(-1))])]
    });
    assert_eq!(err.to_string(), "Bit shift by negative number");
}

#[test]
fn test_short_circuit_skips_right_operand() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![b.echo(&[
            tf(b, b.binary(b.bool(false), BinaryOp::And, b.var("undefined"))),
            tf(b, b.binary(b.bool(true), BinaryOp::Or, b.var("undefined"))),
            tf(b, b.binary(b.bool(true), BinaryOp::LogicalXor, b.bool(true))),
        ])]
    });
    assert_eq!(out, "FTF");
    assert!(diagnostics.is_empty());
}
