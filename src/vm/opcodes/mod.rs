//! Operator implementations
//!
//! Free functions over [`Val`](crate::core::value::Val), grouped by category.
//! Each takes the [`Engine`](crate::vm::engine::Engine) only to report
//! diagnostics and read the float precision.
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c

pub mod arithmetic;
pub mod bitwise;
pub mod comparison;
pub mod logical;
pub mod string;
