pub mod class;
pub mod context;
pub mod function;
pub mod object;
