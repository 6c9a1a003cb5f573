//! String concatenation
//!
//! Reference: $PHP_SRC_PATH/Zend/zend_operators.c - concat_function

use crate::core::value::Val;
use crate::vm::engine::Engine;
use crate::vm::type_conversion::to_string_bytes;

/// `$a . $b`. Objects must already be cast by the caller when they have `__toString`.
pub fn concat(engine: &mut Engine, a: &Val, b: &Val) -> Val {
    let left = to_string_bytes(engine, a);
    let right = to_string_bytes(engine, b);
    if right.is_empty() {
        return Val::String(left);
    }
    if left.is_empty() {
        return Val::String(right);
    }
    let mut out = Vec::with_capacity(left.len() + right.len());
    out.extend_from_slice(&left);
    out.extend_from_slice(&right);
    Val::string(out)
}
