//! Logical operations
//!
//! `&&`, `||` and `??` take their right operand as a thunk so it is never
//! evaluated when the left side decides the result.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_short_circuiting,
//!   zend_compile_coalesce

use crate::core::value::Val;
use crate::vm::engine::VmError;

/// `!$a`
pub fn boolean_not(v: &Val) -> bool {
    !v.to_bool()
}

/// `$a xor $b`
pub fn logical_xor(a: &Val, b: &Val) -> bool {
    a.to_bool() ^ b.to_bool()
}

/// `$a && $b`
pub fn boolean_and<F>(left: &Val, right: F) -> Result<bool, VmError>
where
    F: FnOnce() -> Result<Val, VmError>,
{
    if !left.to_bool() {
        return Ok(false);
    }
    Ok(right()?.to_bool())
}

/// `$a || $b`
pub fn boolean_or<F>(left: &Val, right: F) -> Result<bool, VmError>
where
    F: FnOnce() -> Result<Val, VmError>,
{
    if left.to_bool() {
        return Ok(true);
    }
    Ok(right()?.to_bool())
}

/// `$a ?? $b`; `left` is `None` when the operand does not exist
pub fn coalesce<F>(left: Option<Val>, right: F) -> Result<Val, VmError>
where
    F: FnOnce() -> Result<Val, VmError>,
{
    match left {
        Some(v) if !v.is_null() => Ok(v.deref()),
        _ => right(),
    }
}
