mod common;

use common::{run_capture, run_diagnostics};
use php_core::ast::{AssignOp, BinaryOp, CastKind};

#[test]
fn test_reference_assignment_aliases_variables() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("a"), b.int(1))),
            b.expr_stmt(b.assign_ref(b.var("b"), b.var("a"))),
            b.expr_stmt(b.assign(b.var("b"), b.int(2))),
            b.echo(&[b.var("a")]),
            // Unsetting one name breaks the binding without touching the other
            b.unset(&[b.var("b")]),
            b.expr_stmt(b.assign(b.var("b"), b.int(3))),
            b.echo(&[b.var("a"), b.var("b")]),
        ]
    });
    assert_eq!(out, "223");
}

#[test]
fn test_reference_to_array_element() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("arr"), b.array_list(&[b.int(1), b.int(2)]))),
            b.expr_stmt(b.assign_ref(b.var("r"), b.dim(b.var("arr"), b.int(1)))),
            b.expr_stmt(b.assign(b.var("r"), b.int(9))),
            b.echo(&[b.dim(b.var("arr"), b.int(1)), b.string(" ")]),
            // A copied array shares the referenced slot
            b.expr_stmt(b.assign(b.var("copy"), b.var("arr"))),
            b.expr_stmt(b.assign(b.var("r"), b.int(5))),
            b.echo(&[b.dim(b.var("copy"), b.int(1)), b.dim(b.var("arr"), b.int(1))]),
            // Plain slots stay independent
            b.expr_stmt(b.assign(b.dim(b.var("copy"), b.int(0)), b.int(7))),
            b.echo(&[b.string(" "), b.dim(b.var("arr"), b.int(0))]),
        ]
    });
    assert_eq!(out, "9 55 1");
}

#[test]
fn test_reference_to_undefined_variable_creates_it_quietly() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            b.expr_stmt(b.assign_ref(b.var("r"), b.var("fresh"))),
            b.echo(&[b.call("is_null", &[b.var("fresh")])]),
            b.expr_stmt(b.assign(b.var("r"), b.string("set"))),
            b.echo(&[b.var("fresh")]),
        ]
    });
    assert_eq!(out, "1set");
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
}

#[test]
fn test_reference_to_object_property() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("o"), b.cast(CastKind::Object, b.array_list(&[])))),
            b.expr_stmt(b.assign(b.prop(b.var("o"), "p"), b.int(1))),
            b.expr_stmt(b.assign_ref(b.var("r"), b.prop(b.var("o"), "p"))),
            b.expr_stmt(b.assign_op(b.var("r"), AssignOp::Mul, b.int(7))),
            b.echo(&[b.prop(b.var("o"), "p")]),
        ]
    });
    assert_eq!(out, "7");
}

#[test]
fn test_foreach_by_reference_modifies_array() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(
                b.var("a"),
                b.array_list(&[b.int(1), b.int(2), b.int(3)]),
            )),
            b.foreach(
                b.var("a"),
                None,
                b.var("v"),
                true,
                &[b.expr_stmt(b.assign_op(b.var("v"), AssignOp::Mul, b.int(2)))],
            ),
            b.unset(&[b.var("v")]),
            b.echo(&[b.call("implode", &[b.string(","), b.var("a")])]),
        ]
    });
    assert_eq!(out, "2,4,6");
}

#[test]
fn test_foreach_by_reference_skips_removed_elements() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(
                b.var("a"),
                b.array_list(&[b.int(1), b.int(2), b.int(3)]),
            )),
            b.foreach(
                b.var("a"),
                Some(b.var("k")),
                b.var("v"),
                true,
                &[
                    b.if_(
                        b.binary(b.var("k"), BinaryOp::EqEq, b.int(0)),
                        &[b.unset(&[b.dim(b.var("a"), b.int(1))])],
                        None,
                    ),
                    b.echo(&[b.var("v")]),
                ],
            ),
        ]
    });
    assert_eq!(out, "13");
}

#[test]
fn test_by_reference_parameter() {
    let out = run_capture(|b| {
        vec![
            b.function(
                "add_one",
                &[b.param_ref("x")],
                &[b.expr_stmt(b.post_inc(b.var("x")))],
            ),
            b.expr_stmt(b.assign(b.var("n"), b.int(1))),
            b.expr_stmt(b.call("add_one", &[b.var("n")])),
            b.expr_stmt(b.call("add_one", &[b.var("n")])),
            b.expr_stmt(b.call("add_one", &[b.dim(b.var("counts"), b.string("new"))])),
            b.echo(&[b.var("n"), b.dim(b.var("counts"), b.string("new"))]),
        ]
    });
    assert_eq!(out, "31");
}

#[test]
fn test_by_reference_parameter_with_non_variable() {
    let (out, diagnostics) = run_diagnostics(|b| {
        vec![
            b.function(
                "add_one",
                &[b.param_ref("x")],
                &[b.expr_stmt(b.post_inc(b.var("x"))), b.ret(Some(b.var("x")))],
            ),
            b.echo(&[b.call("add_one", &[b.int(4)])]),
        ]
    });
    assert_eq!(out, "5");
    assert_eq!(diagnostics, vec!["Notice: Only variables should be passed by reference"]);
}

#[test]
fn test_by_value_parameter_does_not_leak_writes() {
    let out = run_capture(|b| {
        vec![
            b.function(
                "grow",
                &[b.param("items")],
                &[
                    b.expr_stmt(b.assign(b.append(b.var("items")), b.int(1))),
                    b.ret(Some(b.call("count", &[b.var("items")]))),
                ],
            ),
            b.expr_stmt(b.assign(b.var("list"), b.array_list(&[]))),
            b.echo(&[b.call("grow", &[b.var("list")]), b.call("count", &[b.var("list")])]),
        ]
    });
    assert_eq!(out, "10");
}

#[test]
fn test_global_statement_binds_to_global_scope() {
    let out = run_capture(|b| {
        vec![
            b.function(
                "bump",
                &[],
                &[
                    b.global(&["total", "created"]),
                    b.expr_stmt(b.post_inc(b.var("total"))),
                    b.expr_stmt(b.assign(b.var("created"), b.string("yes"))),
                ],
            ),
            b.expr_stmt(b.assign(b.var("total"), b.int(10))),
            b.expr_stmt(b.call("bump", &[])),
            b.expr_stmt(b.call("bump", &[])),
            b.echo(&[b.var("total"), b.var("created")]),
        ]
    });
    assert_eq!(out, "12yes");
}

#[test]
fn test_static_variables_persist_across_calls() {
    let out = run_capture(|b| {
        vec![
            b.function(
                "counter",
                &[],
                &[
                    b.static_var("n", Some(b.int(0))),
                    b.ret(Some(b.pre_inc(b.var("n")))),
                ],
            ),
            b.expr_stmt(b.call("counter", &[])),
            b.expr_stmt(b.call("counter", &[])),
            b.echo(&[b.call("counter", &[])]),
        ]
    });
    assert_eq!(out, "3");
}

#[test]
fn test_sort_through_reference_parameter() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(
                b.var("data"),
                b.array_map(&[
                    (b.string("b"), b.int(2)),
                    (b.string("a"), b.int(1)),
                    (b.string("c"), b.int(3)),
                ]),
            )),
            b.expr_stmt(b.assign(b.var("backup"), b.var("data"))),
            b.expr_stmt(b.call("ksort", &[b.var("data")])),
            b.echo(&[
                b.call("implode", &[b.string(""), b.call("array_keys", &[b.var("data")])]),
                b.string(" "),
                b.call("implode", &[b.string(""), b.call("array_keys", &[b.var("backup")])]),
            ]),
        ]
    });
    assert_eq!(out, "abc bac");
}
