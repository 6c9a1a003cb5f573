pub(crate) mod array_access;
mod assign_op;
mod callable;
mod class_resolution;
pub mod engine;
pub mod executor;
mod expressions;
pub mod frame;
mod inc_dec;
mod object_helpers;
pub mod opcodes;
mod statements;
pub mod type_conversion;
mod variable_ops;
