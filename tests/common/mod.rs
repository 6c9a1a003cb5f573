//! Common test helpers
//!
//! Programs are built with the [`AstBuilder`] inside a closure so the arena
//! outlives every node, then run through `execute_program`.

#![allow(dead_code)]

use bumpalo::Bump;
use php_core::ast::StmtId;
use php_core::ast::builder::AstBuilder;
use php_core::core::value::Val;
use php_core::vm::engine::VmError;
use php_core::vm::executor::{ExecutionConfig, ExecutionResult, execute_program};

/// Build and run a program with an explicit configuration
pub fn try_run_with<F>(config: ExecutionConfig, build: F) -> Result<ExecutionResult, VmError>
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let stmts = build(&b);
    let program = b.program(&stmts);
    execute_program(&program, config)
}

/// Build and run a program with the default configuration
pub fn try_run<F>(build: F) -> Result<ExecutionResult, VmError>
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    try_run_with(ExecutionConfig::default(), build)
}

/// The program's `return` value. Panics if execution fails.
pub fn run_program<F>(build: F) -> Val
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    try_run(build).expect("program execution failed").value
}

/// Everything the program echoed. Panics if execution fails.
pub fn run_capture<F>(build: F) -> String
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    try_run(build).expect("program execution failed").stdout
}

/// Output and diagnostics, one "Level: message" line per diagnostic
pub fn run_diagnostics<F>(build: F) -> (String, Vec<String>)
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    let result = try_run(build).expect("program execution failed");
    let lines = result.stderr.lines().map(str::to_owned).collect();
    (result.stdout, lines)
}

/// The error a program fails with. Panics if it succeeds.
pub fn run_error<F>(build: F) -> VmError
where
    F: for<'a> FnOnce(&AstBuilder<'a>) -> Vec<StmtId<'a>>,
{
    match try_run(build) {
        Ok(result) => panic!("expected an error, program returned {:?}", result.value),
        Err(err) => err,
    }
}
