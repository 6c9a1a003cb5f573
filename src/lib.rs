//! Core of a PHP-compatible engine
//!
//! - [`core`]: the value model, ordered hash arrays and numeric string scanning
//! - [`runtime`]: classes, objects, the function table and request context
//! - [`vm`]: operators, type conversion and the tree-walking executor
//! - [`ast`]: the arena-allocated syntax tree the executor runs
//! - [`builtins`]: native functions registered into every executor

pub mod ast;
pub mod builtins;
pub mod core;
pub mod runtime;
pub mod vm;
