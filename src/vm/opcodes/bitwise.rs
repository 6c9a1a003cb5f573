//! Bitwise operations
//!
//! ## PHP Semantics
//!
//! - Integer operands (after weak conversion) combine as i64
//! - Two strings combine byte by byte: `|` keeps the longer length,
//!   `&` and `^` truncate to the shorter
//! - `~` works on ints, floats (truncated) and strings
//! - Shifting by a negative amount throws ArithmeticError; shifting by 64
//!   or more yields 0 (or -1 for `>>` of a negative number)
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - bitwise_or_function,
//!   bitwise_and_function, bitwise_xor_function, bitwise_not_function,
//!   shift_left_function, shift_right_function

use crate::core::numeric::double_to_long;
use crate::core::value::Val;
use crate::vm::engine::{Engine, VmError};
use crate::vm::type_conversion::to_long_op;

#[derive(Debug, Clone, Copy)]
enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    fn symbol(self) -> &'static str {
        match self {
            BitOp::And => "&",
            BitOp::Or => "|",
            BitOp::Xor => "^",
        }
    }

    fn apply(self, a: i64, b: i64) -> i64 {
        match self {
            BitOp::And => a & b,
            BitOp::Or => a | b,
            BitOp::Xor => a ^ b,
        }
    }

    fn apply_bytes(self, a: &[u8], b: &[u8]) -> Vec<u8> {
        let (longer, shorter) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        match self {
            BitOp::Or => {
                let mut out = longer.to_vec();
                for (o, s) in out.iter_mut().zip(shorter) {
                    *o |= s;
                }
                out
            }
            BitOp::And => shorter.iter().zip(longer).map(|(x, y)| x & y).collect(),
            BitOp::Xor => shorter.iter().zip(longer).map(|(x, y)| x ^ y).collect(),
        }
    }
}

fn long_operands(
    engine: &mut Engine,
    op: &'static str,
    a: &Val,
    b: &Val,
) -> Result<(i64, i64), VmError> {
    let unsupported = || VmError::UnsupportedOperandTypes {
        op,
        left: a.type_name(),
        right: b.type_name(),
    };
    let x = to_long_op(engine, a).ok_or_else(unsupported)?;
    let y = to_long_op(engine, b).ok_or_else(unsupported)?;
    Ok((x, y))
}

fn bitwise(engine: &mut Engine, op: BitOp, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    match (&a, &b) {
        (Val::Int(x), Val::Int(y)) => Ok(Val::Int(op.apply(*x, *y))),
        (Val::String(x), Val::String(y)) => Ok(Val::string(op.apply_bytes(x, y))),
        _ => {
            let (x, y) = long_operands(engine, op.symbol(), &a, &b)?;
            Ok(Val::Int(op.apply(x, y)))
        }
    }
}

pub fn bitwise_and(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    bitwise(engine, BitOp::And, a, b)
}

pub fn bitwise_or(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    bitwise(engine, BitOp::Or, a, b)
}

pub fn bitwise_xor(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    bitwise(engine, BitOp::Xor, a, b)
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - bitwise_not_function
pub fn bitwise_not(a: &Val) -> Result<Val, VmError> {
    match a.deref() {
        Val::Int(i) => Ok(Val::Int(!i)),
        Val::Float(f) => Ok(Val::Int(!double_to_long(f))),
        Val::String(s) => Ok(Val::string(s.iter().map(|b| !b).collect::<Vec<u8>>())),
        other => Err(VmError::TypeError(format!(
            "Cannot perform bitwise not on {}",
            other.type_name()
        ))),
    }
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - shift_left_function
pub fn shift_left(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    let (x, y) = long_operands(engine, "<<", &a, &b)?;
    if y < 0 {
        return Err(VmError::ArithmeticError("Bit shift by negative number".into()));
    }
    if y >= 64 {
        return Ok(Val::Int(0));
    }
    Ok(Val::Int(x.wrapping_shl(y as u32)))
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - shift_right_function
pub fn shift_right(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    let (x, y) = long_operands(engine, ">>", &a, &b)?;
    if y < 0 {
        return Err(VmError::ArithmeticError("Bit shift by negative number".into()));
    }
    if y >= 64 {
        return Ok(Val::Int(if x < 0 { -1 } else { 0 }));
    }
    Ok(Val::Int(x >> y))
}
