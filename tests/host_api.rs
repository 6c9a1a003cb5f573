mod common;

use bumpalo::Bump;
use common::run_capture;
use php_core::ast::builder::AstBuilder;
use php_core::ast::{BinaryOp, UnaryOp};
use php_core::core::value::Val;
use php_core::vm::engine::{CapturingOutputWriter, VmError};
use php_core::vm::executor::Executor;
use php_core::vm::frame::ArgList;
use smallvec::smallvec;
use std::cell::RefCell;
use std::rc::Rc;

fn host_double(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    match args.first().map(Val::deref) {
        Some(Val::Int(i)) => Ok(Val::Int(i * 2)),
        other => Err(VmError::TypeError(format!(
            "host_double(): Argument #1 ($n) must be of type int, {} given",
            other.map_or_else(|| "null".to_string(), |v| v.type_name())
        ))),
    }
}

fn host_banner(executor: &mut Executor<'_>, _args: &mut ArgList) -> Result<Val, VmError> {
    executor.emit(b"[banner]")?;
    Ok(Val::Null)
}

#[test]
fn test_host_functions_and_calls_into_the_program() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let program = b.program(&[
        b.function(
            "add",
            &[b.param("a"), b.param("b")],
            &[b.ret(Some(b.binary(b.var("a"), BinaryOp::Plus, b.var("b"))))],
        ),
        b.expr_stmt(b.call("host_banner", &[])),
        b.echo(&[b.call("host_double", &[b.int(21)])]),
    ]);

    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = output.clone();
    let mut executor = Executor::new();
    executor
        .engine
        .set_output_writer(Box::new(CapturingOutputWriter::new(move |bytes| {
            sink.borrow_mut().extend_from_slice(bytes);
        })));

    assert!(executor.register_native(b"host_double", host_double, &[]));
    assert!(executor.register_native(b"host_banner", host_banner, &[]));
    assert!(!executor.register_native(b"STRLEN", host_double, &[]));

    executor.run(&program).expect("program runs");
    assert_eq!(output.borrow().as_slice(), b"[banner]42");

    let sum = executor
        .call_function(b"add", smallvec![Val::Int(2), Val::Int(5)])
        .expect("user function is callable from the host");
    assert_eq!(sum, Val::Int(7));

    let err = executor
        .call_function(b"missing", ArgList::new())
        .expect_err("unknown function");
    assert_eq!(err.to_string(), "Call to undefined function missing()");
}

#[test]
fn test_unary_operators_and_pre_decrement() {
    let out = run_capture(|b| {
        vec![
            b.expr_stmt(b.assign(b.var("n"), b.int(5))),
            b.echo(&[
                b.unary(UnaryOp::Minus, b.var("n")),
                b.string(" "),
                b.unary(UnaryOp::Plus, b.string("3.5")),
                b.string(" "),
                b.unary(UnaryOp::BitNot, b.int(0)),
                b.string(" "),
                b.cast(php_core::ast::CastKind::Int, b.unary(UnaryOp::Not, b.var("n"))),
                b.string(" "),
                b.pre_dec(b.var("n")),
            ]),
            b.nop(),
        ]
    });
    assert_eq!(out, "-5 3.5 -1 0 4");
}

#[test]
fn test_generators_are_not_executed() {
    let err = common::run_error(|b| vec![b.expr_stmt(b.yield_(None))]);
    assert!(matches!(err, VmError::Unsupported("generators")));
}
