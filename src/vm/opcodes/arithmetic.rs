//! Arithmetic operations
//!
//! Implements PHP arithmetic operations following Zend engine semantics.
//!
//! ## PHP Semantics
//!
//! PHP arithmetic operations perform automatic type juggling:
//! - Numeric strings are converted to integers/floats
//! - Booleans: true=1, false=0
//! - null converts to 0
//! - Arrays, objects and resources are unsupported operands, except
//!   `array + array` which is a key union
//!
//! Integer results that overflow i64 silently become floats.
//!
//! ## Operations
//!
//! - **Add**: `$a + $b` - Addition with type coercion
//! - **Sub**: `$a - $b` - Subtraction
//! - **Mul**: `$a * $b` - Multiplication
//! - **Div**: `$a / $b` - Division (int when exact, float otherwise)
//! - **Mod**: `$a % $b` - Modulo operation on integers
//! - **Pow**: `$a ** $b` - Exponentiation
//! - **Inc/Dec**: `++$a`, `--$a` including the alphanumeric string increment
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - add_function, sub_function,
//!   mul_function, div_function, mod_function, pow_function, increment_function
//! - PHP Manual: https://www.php.net/manual/en/language.operators.arithmetic.php

use crate::core::numeric::{Number, parse_numeric_str};
use crate::core::value::{Val, ValType, type_pair};
use crate::vm::engine::{Engine, VmError};
use crate::vm::type_conversion::{to_long_op, to_number_op};
use std::rc::Rc;

const LONG_LONG: u16 = type_pair(ValType::Long, ValType::Long);
const LONG_DOUBLE: u16 = type_pair(ValType::Long, ValType::Double);
const DOUBLE_LONG: u16 = type_pair(ValType::Double, ValType::Long);
const DOUBLE_DOUBLE: u16 = type_pair(ValType::Double, ValType::Double);
const ARRAY_ARRAY: u16 = type_pair(ValType::Array, ValType::Array);

/// Arithmetic operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Pow => "**",
        }
    }

    fn apply(self, engine: &mut Engine, a: Number, b: Number) -> Val {
        match (a, b) {
            (Number::Int(x), Number::Int(y)) => self.apply_int(engine, x, y),
            _ => self.apply_float(engine, a.to_f64(), b.to_f64()),
        }
    }

    fn apply_int(self, engine: &mut Engine, a: i64, b: i64) -> Val {
        match self {
            ArithOp::Add => a
                .checked_add(b)
                .map_or_else(|| Val::Float(a as f64 + b as f64), Val::Int),
            ArithOp::Sub => a
                .checked_sub(b)
                .map_or_else(|| Val::Float(a as f64 - b as f64), Val::Int),
            ArithOp::Mul => mul_long(a, b),
            ArithOp::Div => div_long(engine, a, b),
            ArithOp::Pow => pow_long(a, b),
        }
    }

    fn apply_float(self, engine: &mut Engine, a: f64, b: f64) -> Val {
        match self {
            ArithOp::Add => Val::Float(a + b),
            ArithOp::Sub => Val::Float(a - b),
            ArithOp::Mul => Val::Float(a * b),
            ArithOp::Div => {
                if b == 0.0 {
                    return division_by_zero(engine, a);
                }
                Val::Float(a / b)
            }
            ArithOp::Pow => Val::Float(a.powf(b)),
        }
    }
}

/// Multiply, detecting overflow by comparing the wrapped product with the float one
/// Reference: $PHP_SRC_PATH/Zend/zend_multiply.h - ZEND_SIGNED_MULTIPLY_LONG
fn mul_long(a: i64, b: i64) -> Val {
    let lres = a.wrapping_mul(b);
    let dres = a as f64 * b as f64;
    let delta = lres as f64 - dres;
    if dres + delta != dres {
        Val::Float(dres)
    } else {
        Val::Int(lres)
    }
}

fn division_by_zero(engine: &mut Engine, dividend: f64) -> Val {
    engine.warning("Division by zero");
    if dividend == 0.0 || dividend.is_nan() {
        Val::Float(f64::NAN)
    } else if dividend > 0.0 {
        Val::Float(f64::INFINITY)
    } else {
        Val::Float(f64::NEG_INFINITY)
    }
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - div_function_base
fn div_long(engine: &mut Engine, a: i64, b: i64) -> Val {
    if b == 0 {
        return division_by_zero(engine, a as f64);
    }
    if b == -1 && a == i64::MIN {
        return Val::Float(a as f64 / -1.0);
    }
    if a % b == 0 {
        Val::Int(a / b)
    } else {
        Val::Float(a as f64 / b as f64)
    }
}

/// Square-and-multiply; the first overflow switches to float
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - pow_function_base
fn pow_long(base: i64, exp: i64) -> Val {
    if exp < 0 {
        return Val::Float((base as f64).powf(exp as f64));
    }
    let mut result: i64 = 1;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            match result.checked_mul(b) {
                Some(r) => result = r,
                None => return Val::Float((base as f64).powf(exp as f64)),
            }
        }
        e >>= 1;
        if e > 0 {
            match b.checked_mul(b) {
                Some(sq) => b = sq,
                None => return Val::Float((base as f64).powf(exp as f64)),
            }
        }
    }
    Val::Int(result)
}

fn unsupported(op: &'static str, a: &Val, b: &Val) -> VmError {
    VmError::UnsupportedOperandTypes {
        op,
        left: a.type_name(),
        right: b.type_name(),
    }
}

/// Slow path: coerce both operands, left first
fn binary_numeric(engine: &mut Engine, op: ArithOp, a: &Val, b: &Val) -> Result<Val, VmError> {
    let x = to_number_op(engine, a).ok_or_else(|| unsupported(op.symbol(), a, b))?;
    let y = to_number_op(engine, b).ok_or_else(|| unsupported(op.symbol(), a, b))?;
    Ok(op.apply(engine, x, y))
}

fn fast_path(engine: &mut Engine, op: ArithOp, a: &Val, b: &Val) -> Option<Val> {
    match (type_pair(a.val_type(), b.val_type()), a, b) {
        (LONG_LONG, Val::Int(x), Val::Int(y)) => Some(op.apply_int(engine, *x, *y)),
        (LONG_DOUBLE, Val::Int(x), Val::Float(y)) => Some(op.apply_float(engine, *x as f64, *y)),
        (DOUBLE_LONG, Val::Float(x), Val::Int(y)) => Some(op.apply_float(engine, *x, *y as f64)),
        (DOUBLE_DOUBLE, Val::Float(x), Val::Float(y)) => Some(op.apply_float(engine, *x, *y)),
        _ => None,
    }
}

fn arith(engine: &mut Engine, op: ArithOp, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    if let Some(v) = fast_path(engine, op, &a, &b) {
        return Ok(v);
    }
    binary_numeric(engine, op, &a, &b)
}

/// `$a + $b`; two arrays produce the union, left keys winning
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - add_function_slow
pub fn add(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    if type_pair(a.val_type(), b.val_type()) == ARRAY_ARRAY {
        if let (Val::Array(left), Val::Array(right)) = (&a, &b) {
            if right.is_empty() || Rc::ptr_eq(left, right) {
                return Ok(Val::Array(left.clone()));
            }
            let mut union = left.clone();
            let data = Rc::make_mut(&mut union);
            for (key, val) in right.iter() {
                data.add(key.clone(), val.clone());
            }
            return Ok(Val::Array(union));
        }
    }
    arith(engine, ArithOp::Add, &a, &b)
}

pub fn sub(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    arith(engine, ArithOp::Sub, a, b)
}

pub fn mul(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    arith(engine, ArithOp::Mul, a, b)
}

/// Division by zero warns and yields ±INF (NAN for 0/0)
pub fn div(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    arith(engine, ArithOp::Div, a, b)
}

pub fn pow(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    arith(engine, ArithOp::Pow, a, b)
}

/// `$a % $b` on integers; zero divisor is fatal
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - mod_function
pub fn modulo(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    let (a, b) = (a.deref(), b.deref());
    let x = to_long_op(engine, &a).ok_or_else(|| unsupported("%", &a, &b))?;
    let y = to_long_op(engine, &b).ok_or_else(|| unsupported("%", &a, &b))?;
    if y == 0 {
        return Err(VmError::ModuloByZero);
    }
    if y == -1 {
        // i64::MIN % -1 traps on most hardware
        return Ok(Val::Int(0));
    }
    Ok(Val::Int(x % y))
}

/// Unary minus: `-$a` is `$a * -1`
pub fn negate(engine: &mut Engine, a: &Val) -> Result<Val, VmError> {
    mul(engine, a, &Val::Int(-1))
}

/// Unary plus: `+$a` is `$a * 1`
pub fn plus(engine: &mut Engine, a: &Val) -> Result<Val, VmError> {
    mul(engine, a, &Val::Int(1))
}

/// Perl-style string increment: "a" → "b", "Az" → "Ba", "zz" → "aaa"
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - increment_string
fn increment_string(s: &[u8]) -> Vec<u8> {
    #[derive(Clone, Copy)]
    enum Class {
        Lower,
        Upper,
        Digit,
    }

    let mut out = s.to_vec();
    let mut carry = false;
    let mut last = Class::Lower;
    for pos in (0..out.len()).rev() {
        let ch = out[pos];
        match ch {
            b'a'..=b'z' => {
                last = Class::Lower;
                carry = ch == b'z';
                out[pos] = if carry { b'a' } else { ch + 1 };
            }
            b'A'..=b'Z' => {
                last = Class::Upper;
                carry = ch == b'Z';
                out[pos] = if carry { b'A' } else { ch + 1 };
            }
            b'0'..=b'9' => {
                last = Class::Digit;
                carry = ch == b'9';
                out[pos] = if carry { b'0' } else { ch + 1 };
            }
            _ => {
                carry = false;
                break;
            }
        }
        if !carry {
            break;
        }
    }
    if carry {
        let lead = match last {
            Class::Lower => b'a',
            Class::Upper => b'A',
            Class::Digit => b'1',
        };
        out.insert(0, lead);
    }
    out
}

/// `++$a`, returning the new value
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - increment_function
pub fn increment(_engine: &mut Engine, v: &Val) -> Result<Val, VmError> {
    match v.deref() {
        Val::Undef | Val::Null => Ok(Val::Int(1)),
        Val::Int(i) => Ok(i
            .checked_add(1)
            .map_or(Val::Float(i as f64 + 1.0), Val::Int)),
        Val::Float(f) => Ok(Val::Float(f + 1.0)),
        b @ Val::Bool(_) => Ok(b),
        Val::String(s) => {
            if s.is_empty() {
                return Ok(Val::string("1"));
            }
            match parse_numeric_str(&s) {
                Some(p) => Ok(match p.number {
                    Number::Int(i) => i
                        .checked_add(1)
                        .map_or(Val::Float(i as f64 + 1.0), Val::Int),
                    Number::Float(f) => Val::Float(f + 1.0),
                }),
                None => Ok(Val::string(increment_string(&s))),
            }
        }
        other => Err(VmError::TypeError(format!(
            "Cannot increment {}",
            other.type_name()
        ))),
    }
}

/// `--$a`, returning the new value. null stays null, non-numeric strings are untouched.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - decrement_function
pub fn decrement(_engine: &mut Engine, v: &Val) -> Result<Val, VmError> {
    match v.deref() {
        Val::Undef | Val::Null => Ok(Val::Null),
        Val::Int(i) => Ok(i
            .checked_sub(1)
            .map_or(Val::Float(i as f64 - 1.0), Val::Int)),
        Val::Float(f) => Ok(Val::Float(f - 1.0)),
        b @ Val::Bool(_) => Ok(b),
        Val::String(s) => {
            if s.is_empty() {
                return Ok(Val::Int(-1));
            }
            match parse_numeric_str(&s) {
                Some(p) => Ok(match p.number {
                    Number::Int(i) => i
                        .checked_sub(1)
                        .map_or(Val::Float(i as f64 - 1.0), Val::Int),
                    Number::Float(f) => Val::Float(f - 1.0),
                }),
                None => Ok(Val::String(s)),
            }
        }
        other => Err(VmError::TypeError(format!(
            "Cannot decrement {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::{ArrayData, ArrayKey};

    #[test]
    fn test_add_overflow_promotes() {
        let mut engine = Engine::new();
        let result = add(&mut engine, &Val::Int(i64::MAX), &Val::Int(1)).unwrap();
        assert_eq!(result, Val::Float(i64::MAX as f64 + 1.0));
        let result = sub(&mut engine, &Val::Int(i64::MIN), &Val::Int(1)).unwrap();
        assert_eq!(result, Val::Float(i64::MIN as f64 - 1.0));
    }

    #[test]
    fn test_mul_overflow_promotes() {
        let mut engine = Engine::new();
        let result = mul(&mut engine, &Val::Int(i64::MAX), &Val::Int(2)).unwrap();
        assert_eq!(result, Val::Float(i64::MAX as f64 * 2.0));
        assert_eq!(mul(&mut engine, &Val::Int(-4), &Val::Int(5)).unwrap(), Val::Int(-20));
    }

    #[test]
    fn test_division_semantics() {
        let mut engine = Engine::new();
        assert_eq!(div(&mut engine, &Val::Int(7), &Val::Int(2)).unwrap(), Val::Float(3.5));
        assert_eq!(div(&mut engine, &Val::Int(6), &Val::Int(2)).unwrap(), Val::Int(3));
        assert_eq!(
            div(&mut engine, &Val::Int(i64::MIN), &Val::Int(-1)).unwrap(),
            Val::Float(9.223372036854775808e18)
        );
    }

    #[test]
    fn test_division_by_zero_warns() {
        let mut engine = Engine::new();
        engine.silence();
        let result = div(&mut engine, &Val::Int(1), &Val::Int(0)).unwrap();
        assert_eq!(result, Val::Float(f64::INFINITY));
        assert_eq!(
            engine.last_error.as_ref().map(|e| e.message.as_str()),
            Some("Division by zero")
        );
        let result = div(&mut engine, &Val::Int(-3), &Val::Float(0.0)).unwrap();
        assert_eq!(result, Val::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_modulo() {
        let mut engine = Engine::new();
        assert_eq!(modulo(&mut engine, &Val::Int(-7), &Val::Int(3)).unwrap(), Val::Int(-1));
        assert_eq!(modulo(&mut engine, &Val::Int(i64::MIN), &Val::Int(-1)).unwrap(), Val::Int(0));
        assert!(matches!(
            modulo(&mut engine, &Val::Int(1), &Val::Int(0)),
            Err(VmError::ModuloByZero)
        ));
    }

    #[test]
    fn test_pow() {
        let mut engine = Engine::new();
        assert_eq!(pow(&mut engine, &Val::Int(2), &Val::Int(10)).unwrap(), Val::Int(1024));
        assert_eq!(pow(&mut engine, &Val::Int(3), &Val::Int(0)).unwrap(), Val::Int(1));
        assert_eq!(pow(&mut engine, &Val::Int(2), &Val::Int(-1)).unwrap(), Val::Float(0.5));
        assert_eq!(
            pow(&mut engine, &Val::Int(2), &Val::Int(64)).unwrap(),
            Val::Float(18446744073709551616.0)
        );
    }

    #[test]
    fn test_numeric_strings() {
        let mut engine = Engine::new();
        assert_eq!(add(&mut engine, &Val::string("5"), &Val::string("1.5")).unwrap(), Val::Float(6.5));
        assert_eq!(add(&mut engine, &Val::Null, &Val::Bool(true)).unwrap(), Val::Int(1));
    }

    #[test]
    fn test_array_union_and_unsupported() {
        let mut engine = Engine::new();
        let left = Val::array(ArrayData::from_values([Val::Int(1)]));
        let right = Val::array(ArrayData::from_values([Val::Int(9), Val::Int(2)]));
        let union = add(&mut engine, &left, &right).unwrap();
        let arr = union.as_array().unwrap();
        assert_eq!(arr.find(&ArrayKey::Int(0)), Some(&Val::Int(1)));
        assert_eq!(arr.find(&ArrayKey::Int(1)), Some(&Val::Int(2)));

        let err = sub(&mut engine, &left, &Val::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operand types: array - int");
    }

    #[test]
    fn test_increment_strings() {
        let mut engine = Engine::new();
        let inc = |e: &mut Engine, s: &str| increment(e, &Val::string(s)).unwrap();
        assert_eq!(inc(&mut engine, "a"), Val::string("b"));
        assert_eq!(inc(&mut engine, "z"), Val::string("aa"));
        assert_eq!(inc(&mut engine, "Az"), Val::string("Ba"));
        assert_eq!(inc(&mut engine, "a9"), Val::string("b0"));
        assert_eq!(inc(&mut engine, "Zz"), Val::string("AAa"));
        assert_eq!(inc(&mut engine, "9"), Val::Int(10));
        assert_eq!(inc(&mut engine, ""), Val::string("1"));
    }

    #[test]
    fn test_increment_decrement_edges() {
        let mut engine = Engine::new();
        assert_eq!(increment(&mut engine, &Val::Null).unwrap(), Val::Int(1));
        assert_eq!(decrement(&mut engine, &Val::Null).unwrap(), Val::Null);
        assert_eq!(
            increment(&mut engine, &Val::Int(i64::MAX)).unwrap(),
            Val::Float(i64::MAX as f64 + 1.0)
        );
        assert_eq!(decrement(&mut engine, &Val::string("abc")).unwrap(), Val::string("abc"));
        assert!(increment(&mut engine, &Val::empty_array()).is_err());
    }
}
