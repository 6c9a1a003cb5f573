//! PHP type juggling and conversion
//!
//! ## PHP Type Juggling Rules
//!
//! ### To Integer
//! - `true` → 1, `false` → 0, null → 0
//! - Floats truncated toward zero; out-of-range values wrap modulo 2^64
//! - Strings use their numeric prefix: "12abc" → 12, "1e3" → 1000, "abc" → 0
//! - Arrays → 0 when empty, 1 otherwise
//!
//! ### In Arithmetic
//! - Leading-numeric strings: Notice "A non well formed numeric value encountered"
//! - Non-numeric strings: Warning "A non-numeric value encountered", value 0
//! - Arrays, objects and resources are rejected by the caller
//!
//! ### To String
//! - true → "1", false/null → ""
//! - Floats use `precision` significant digits
//! - Arrays → "Array" (with warning)
//! - Objects without a cast hook → "" (with recoverable error)
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - zval_get_long, zval_get_double,
//!   zval_get_string, zendi_smart_str* helpers
//! - PHP Manual: https://www.php.net/manual/en/language.types.type-juggling.php

use crate::core::array::{ArrayData, ArrayKey};
use crate::core::numeric::{
    Number, double_to_long, double_to_long_cap, format_float, scan_number_prefix,
};
use crate::core::value::Val;
use crate::runtime::object::Purpose;
use crate::vm::engine::{Engine, ErrorLevel, VmError};
use std::rc::Rc;

/// Convert any value to integer, silently (`(int)` cast)
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_long
pub fn to_long(v: &Val) -> i64 {
    match v {
        Val::Undef | Val::Null => 0,
        Val::Bool(b) => *b as i64,
        Val::Int(i) => *i,
        Val::Float(f) => double_to_long(*f),
        Val::String(s) => match scan_number_prefix(s) {
            Some(p) => match p.number {
                Number::Int(i) => i,
                Number::Float(f) => double_to_long_cap(f),
            },
            None => 0,
        },
        Val::Array(arr) => !arr.is_empty() as i64,
        Val::Object(_) => 1,
        Val::Resource(r) => r.handle,
        Val::Reference(r) => to_long(&r.borrow()),
    }
}

/// Convert any value to float, silently (`(float)` cast)
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_double
pub fn to_double(v: &Val) -> f64 {
    match v {
        Val::Undef | Val::Null => 0.0,
        Val::Bool(b) => *b as i64 as f64,
        Val::Int(i) => *i as f64,
        Val::Float(f) => *f,
        Val::String(s) => scan_number_prefix(s).map_or(0.0, |p| p.number.to_f64()),
        Val::Array(arr) => !arr.is_empty() as i64 as f64,
        Val::Object(_) => 1.0,
        Val::Resource(r) => r.handle as f64,
        Val::Reference(r) => to_double(&r.borrow()),
    }
}

/// Silent numeric value of a string: numeric prefix or 0
pub fn str_to_number(s: &[u8]) -> Number {
    scan_number_prefix(s).map_or(Number::Int(0), |p| p.number)
}

/// Numeric value of a string in arithmetic context, with diagnostics
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zendi_try_convert_scalar_to_number
fn str_to_number_noisy(engine: &mut Engine, s: &[u8]) -> Number {
    match scan_number_prefix(s) {
        Some(p) => {
            if s[p.len..]
                .iter()
                .any(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
            {
                engine.notice("A non well formed numeric value encountered");
            }
            p.number
        }
        None => {
            engine.warning("A non-numeric value encountered");
            Number::Int(0)
        }
    }
}

/// Operand of an arithmetic operator. `None` for arrays, objects and resources.
pub fn to_number_op(engine: &mut Engine, v: &Val) -> Option<Number> {
    match v {
        Val::Undef | Val::Null => Some(Number::Int(0)),
        Val::Bool(b) => Some(Number::Int(*b as i64)),
        Val::Int(i) => Some(Number::Int(*i)),
        Val::Float(f) => Some(Number::Float(*f)),
        Val::String(s) => Some(str_to_number_noisy(engine, s)),
        Val::Array(_) | Val::Object(_) | Val::Resource(_) => None,
        Val::Reference(r) => {
            let inner = r.borrow().clone();
            to_number_op(engine, &inner)
        }
    }
}

/// Operand of `%`, `<<`, `>>` and the bitwise operators. `None` when unsupported.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zendi_try_get_long
pub fn to_long_op(engine: &mut Engine, v: &Val) -> Option<i64> {
    match to_number_op(engine, v)? {
        Number::Int(i) => Some(i),
        Number::Float(f) => {
            if f.is_finite() && f.fract() != 0.0 {
                engine.deprecated(&format!(
                    "Implicit conversion from float {} to int loses precision",
                    float_repr(f)
                ));
            }
            Some(double_to_long(f))
        }
    }
}

/// Shortest text that reads back as the same float
pub fn float_repr(f: f64) -> String {
    for precision in 1..=17 {
        let text = format_float(f, precision);
        if text.parse::<f64>().ok() == Some(f) {
            return text;
        }
    }
    format_float(f, 17)
}

pub fn long_to_bytes(i: i64) -> Vec<u8> {
    i.to_string().into_bytes()
}

/// String form of a value. Objects only get here when they have no cast hook.
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_get_string
pub fn to_string_bytes(engine: &mut Engine, v: &Val) -> Rc<Vec<u8>> {
    match v {
        Val::String(s) => s.clone(),
        Val::Undef | Val::Null | Val::Bool(false) => Rc::new(Vec::new()),
        Val::Bool(true) => Rc::new(b"1".to_vec()),
        Val::Int(i) => Rc::new(long_to_bytes(*i)),
        Val::Float(f) => Rc::new(format_float(*f, engine.precision).into_bytes()),
        Val::Array(_) => {
            engine.warning("Array to string conversion");
            Rc::new(b"Array".to_vec())
        }
        Val::Object(o) => {
            let class = o.borrow().class_name_lossy();
            engine.report_error(
                ErrorLevel::RecoverableError,
                &format!("Object of class {} could not be converted to string", class),
            );
            Rc::new(Vec::new())
        }
        Val::Resource(r) => Rc::new(format!("Resource id #{}", r.handle).into_bytes()),
        Val::Reference(r) => {
            let inner = r.borrow().clone();
            to_string_bytes(engine, &inner)
        }
    }
}

/// Convert a value used as an array offset into a key
/// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_fetch_dimension_address_inner
pub fn to_array_key(engine: &mut Engine, v: &Val) -> Result<ArrayKey, VmError> {
    match v {
        Val::Undef | Val::Null => Ok(ArrayKey::str(b"")),
        Val::Bool(b) => Ok(ArrayKey::Int(*b as i64)),
        Val::Int(i) => Ok(ArrayKey::Int(*i)),
        Val::Float(f) => {
            let truncated = double_to_long(*f);
            if !f.is_finite() || f.fract() != 0.0 {
                engine.deprecated(&format!(
                    "Implicit conversion from float {} to int loses precision",
                    float_repr(*f)
                ));
            }
            Ok(ArrayKey::Int(truncated))
        }
        Val::String(s) => Ok(ArrayKey::numeric(s)),
        Val::Resource(r) => {
            engine.warning(&format!(
                "Resource ID#{} used as offset, casting to integer ({})",
                r.handle, r.handle
            ));
            Ok(ArrayKey::Int(r.handle))
        }
        Val::Array(_) | Val::Object(_) => Err(VmError::TypeError("Illegal offset type".into())),
        Val::Reference(r) => {
            let inner = r.borrow().clone();
            to_array_key(engine, &inner)
        }
    }
}

/// `(array)` cast
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - convert_to_array
pub fn to_array(v: &Val) -> Rc<ArrayData> {
    match v {
        Val::Array(arr) => arr.clone(),
        Val::Undef | Val::Null => Rc::new(ArrayData::new()),
        Val::Object(o) => Rc::new(o.borrow().properties_for(Purpose::ArrayCast)),
        Val::Reference(r) => to_array(&r.borrow()),
        scalar => Rc::new(ArrayData::from_values([scalar.clone()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::engine::CapturingErrorHandler;
    use std::cell::RefCell;

    fn engine_with_log() -> (Engine, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut engine = Engine::new();
        engine.set_error_handler(Box::new(CapturingErrorHandler::new(move |level, msg| {
            sink.borrow_mut().push(format!("{}: {}", level.label(), msg));
        })));
        (engine, log)
    }

    #[test]
    fn test_to_long_cast_rules() {
        assert_eq!(to_long(&Val::string("12abc")), 12);
        assert_eq!(to_long(&Val::string("1e3")), 1000);
        assert_eq!(to_long(&Val::string("abc")), 0);
        assert_eq!(to_long(&Val::Float(-7.9)), -7);
        assert_eq!(to_long(&Val::string("1e100")), i64::MAX);
        assert_eq!(to_long(&Val::Bool(true)), 1);
    }

    #[test]
    fn test_arithmetic_operand_diagnostics() {
        let (mut engine, log) = engine_with_log();
        assert_eq!(to_number_op(&mut engine, &Val::string("5 apples")), Some(Number::Int(5)));
        assert_eq!(to_number_op(&mut engine, &Val::string("apples")), Some(Number::Int(0)));
        assert_eq!(to_number_op(&mut engine, &Val::string(" 7 ")), Some(Number::Int(7)));
        assert_eq!(to_number_op(&mut engine, &Val::empty_array()), None);
        assert_eq!(
            *log.borrow(),
            vec![
                "Notice: A non well formed numeric value encountered".to_string(),
                "Warning: A non-numeric value encountered".to_string(),
            ]
        );
    }

    #[test]
    fn test_to_string_forms() {
        let (mut engine, log) = engine_with_log();
        assert_eq!(*to_string_bytes(&mut engine, &Val::Float(0.1)), b"0.1".to_vec());
        assert_eq!(*to_string_bytes(&mut engine, &Val::Float(-0.0)), b"-0".to_vec());
        assert_eq!(*to_string_bytes(&mut engine, &Val::Bool(false)), b"".to_vec());
        assert_eq!(*to_string_bytes(&mut engine, &Val::empty_array()), b"Array".to_vec());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_array_keys() {
        let (mut engine, log) = engine_with_log();
        assert_eq!(to_array_key(&mut engine, &Val::Null).unwrap(), ArrayKey::str(""));
        assert_eq!(to_array_key(&mut engine, &Val::Bool(true)).unwrap(), ArrayKey::Int(1));
        assert_eq!(to_array_key(&mut engine, &Val::string("08")).unwrap(), ArrayKey::str("08"));
        assert_eq!(to_array_key(&mut engine, &Val::string("8")).unwrap(), ArrayKey::Int(8));
        assert_eq!(to_array_key(&mut engine, &Val::Float(2.0)).unwrap(), ArrayKey::Int(2));
        assert!(log.borrow().is_empty());
        assert_eq!(to_array_key(&mut engine, &Val::Float(2.5)).unwrap(), ArrayKey::Int(2));
        assert_eq!(
            log.borrow().last().map(String::as_str),
            Some("Deprecated: Implicit conversion from float 2.5 to int loses precision")
        );
        assert!(matches!(
            to_array_key(&mut engine, &Val::empty_array()),
            Err(VmError::TypeError(_))
        ));
    }

    #[test]
    fn test_scalar_to_array_wraps() {
        let arr = to_array(&Val::Int(4));
        assert_eq!(arr.find(&ArrayKey::Int(0)), Some(&Val::Int(4)));
        assert!(to_array(&Val::Null).is_empty());
    }
}
