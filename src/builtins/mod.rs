//! Native functions
//!
//! A small standard library registered into every [`Executor`]. Each function
//! receives the evaluated arguments; positions declared by reference arrive as
//! `Val::Reference` cells.
//!
//! ## Parameter Coercion
//!
//! Scalar parameters follow the weak typing rules of internal functions:
//! `int`, `float`, `bool` and `string` convert into each other, `null` converts
//! with a deprecation. Under `strict_types` only `int` to `float` widening is
//! accepted and anything else fails with a `TypeError`.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_API.c` - zend_parse_arg_str_weak,
//!   zend_parse_arg_long_weak, zend_parse_arg_double_weak, zend_parse_arg_bool_weak

pub mod array;
pub mod string;
pub mod variable;

use crate::core::array::ArrayData;
use crate::core::numeric::{Number, double_to_long, parse_numeric_str, scan_number_prefix};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;
use crate::vm::type_conversion::float_repr;
use std::rc::Rc;

/// Bind every native function under its global name
pub fn register_all(executor: &mut Executor<'_>) {
    // Array functions
    executor.register_native(b"count", array::php_count, &[]);
    executor.register_native(b"sizeof", array::php_count, &[]);
    executor.register_native(b"array_keys", array::php_array_keys, &[]);
    executor.register_native(b"array_values", array::php_array_values, &[]);
    executor.register_native(b"in_array", array::php_in_array, &[]);
    executor.register_native(b"array_key_exists", array::php_array_key_exists, &[]);
    executor.register_native(b"key_exists", array::php_array_key_exists, &[]);
    executor.register_native(b"array_push", array::php_array_push, &[0]);
    executor.register_native(b"array_pop", array::php_array_pop, &[0]);
    executor.register_native(b"sort", array::php_sort, &[0]);
    executor.register_native(b"rsort", array::php_rsort, &[0]);
    executor.register_native(b"ksort", array::php_ksort, &[0]);
    executor.register_native(b"usort", array::php_usort, &[0]);
    executor.register_native(b"current", array::php_current, &[]);
    executor.register_native(b"pos", array::php_current, &[]);
    executor.register_native(b"key", array::php_key, &[]);
    executor.register_native(b"next", array::php_next, &[0]);
    executor.register_native(b"prev", array::php_prev, &[0]);
    executor.register_native(b"reset", array::php_reset, &[0]);
    executor.register_native(b"end", array::php_end, &[0]);
    executor.register_native(b"range", array::php_range, &[]);

    // String functions
    executor.register_native(b"strlen", string::php_strlen, &[]);
    executor.register_native(b"implode", string::php_implode, &[]);
    executor.register_native(b"join", string::php_implode, &[]);
    executor.register_native(b"str_repeat", string::php_str_repeat, &[]);
    executor.register_native(b"strtoupper", string::php_strtoupper, &[]);
    executor.register_native(b"strtolower", string::php_strtolower, &[]);

    // Variable functions
    executor.register_native(b"gettype", variable::php_gettype, &[]);
    executor.register_native(b"is_int", variable::php_is_int, &[]);
    executor.register_native(b"is_integer", variable::php_is_int, &[]);
    executor.register_native(b"is_long", variable::php_is_int, &[]);
    executor.register_native(b"is_float", variable::php_is_float, &[]);
    executor.register_native(b"is_double", variable::php_is_float, &[]);
    executor.register_native(b"is_string", variable::php_is_string, &[]);
    executor.register_native(b"is_bool", variable::php_is_bool, &[]);
    executor.register_native(b"is_array", variable::php_is_array, &[]);
    executor.register_native(b"is_null", variable::php_is_null, &[]);
    executor.register_native(b"is_numeric", variable::php_is_numeric, &[]);
    executor.register_native(b"intval", variable::php_intval, &[]);
    executor.register_native(b"floatval", variable::php_floatval, &[]);
    executor.register_native(b"doubleval", variable::php_floatval, &[]);
    executor.register_native(b"strval", variable::php_strval, &[]);
    executor.register_native(b"boolval", variable::php_boolval, &[]);
    executor.register_native(b"spl_object_id", variable::php_spl_object_id, &[]);

    tracing::debug!(
        functions = executor.context.functions.len(),
        "registered native functions"
    );
}

/// Parameter shape of one native function, for diagnostics
pub(crate) struct Signature {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub required: usize,
}

impl Signature {
    /// Fail unless the argument count fits; `variadic` lifts the upper bound
    pub(crate) fn check_arity(&self, args: &ArgList, variadic: bool) -> Result<(), VmError> {
        let given = args.len();
        if given < self.required {
            let qualifier = if self.required == self.params.len() && !variadic {
                "exactly"
            } else {
                "at least"
            };
            return Err(VmError::RuntimeError(format!(
                "{}() expects {} {} argument{}, {} given",
                self.name,
                qualifier,
                self.required,
                if self.required == 1 { "" } else { "s" },
                given
            )));
        }
        if !variadic && given > self.params.len() {
            let qualifier = if self.required == self.params.len() {
                "exactly"
            } else {
                "at most"
            };
            return Err(VmError::RuntimeError(format!(
                "{}() expects {} {} argument{}, {} given",
                self.name,
                qualifier,
                self.params.len(),
                if self.params.len() == 1 { "" } else { "s" },
                given
            )));
        }
        Ok(())
    }

    fn param(&self, index: usize) -> &'static str {
        self.params.get(index).copied().unwrap_or("args")
    }

    pub(crate) fn type_error(&self, index: usize, expected: &str, given: &Val) -> VmError {
        VmError::TypeError(format!(
            "{}(): Argument #{} (${}) must be of type {}, {} given",
            self.name,
            index + 1,
            self.param(index),
            expected,
            given.type_name()
        ))
    }

    pub(crate) fn value_error(&self, index: usize, what: &str) -> VmError {
        VmError::ValueError(format!(
            "{}(): Argument #{} (${}) {}",
            self.name,
            index + 1,
            self.param(index),
            what
        ))
    }

    fn null_deprecated(&self, executor: &mut Executor<'_>, index: usize, expected: &str) {
        executor.engine.deprecated(&format!(
            "{}(): Passing null to parameter #{} (${}) of type {} is deprecated",
            self.name,
            index + 1,
            self.param(index),
            expected
        ));
    }
}

/// Argument `index`, dereferenced; `None` when not passed
pub(crate) fn arg(args: &ArgList, index: usize) -> Option<Val> {
    args.get(index).map(Val::deref)
}

/// Validate and coerce a `string` parameter
/// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_parse_arg_str_weak
pub(crate) fn param_string(
    executor: &mut Executor<'_>,
    sig: &Signature,
    args: &ArgList,
    index: usize,
) -> Result<Rc<Vec<u8>>, VmError> {
    let value = arg(args, index).unwrap_or(Val::Null);
    match &value {
        Val::String(s) => Ok(s.clone()),
        Val::Object(obj) if obj.borrow().class.magic.to_string.is_some() => {
            executor.to_string_val(&value)
        }
        _ if executor.engine.strict_types => Err(sig.type_error(index, "string", &value)),
        Val::Undef | Val::Null => {
            sig.null_deprecated(executor, index, "string");
            Ok(Rc::new(Vec::new()))
        }
        Val::Bool(_) | Val::Int(_) | Val::Float(_) => executor.to_string_val(&value),
        _ => Err(sig.type_error(index, "string", &value)),
    }
}

/// Validate and coerce an `int` parameter
/// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_parse_arg_long_weak
pub(crate) fn param_int(
    executor: &mut Executor<'_>,
    sig: &Signature,
    args: &ArgList,
    index: usize,
) -> Result<i64, VmError> {
    let value = arg(args, index).unwrap_or(Val::Null);
    match &value {
        Val::Int(i) => Ok(*i),
        _ if executor.engine.strict_types => Err(sig.type_error(index, "int", &value)),
        Val::Undef | Val::Null => {
            sig.null_deprecated(executor, index, "int");
            Ok(0)
        }
        Val::Bool(b) => Ok(*b as i64),
        Val::Float(f) => float_param_to_int(executor, sig, index, *f, &value),
        Val::String(s) => match scan_number_prefix(s) {
            Some(prefix) => {
                if parse_numeric_str(s).is_none() {
                    executor
                        .engine
                        .warning("A non-numeric value encountered");
                }
                match prefix.number {
                    Number::Int(i) => Ok(i),
                    Number::Float(f) => float_param_to_int(executor, sig, index, f, &value),
                }
            }
            None => Err(sig.type_error(index, "int", &value)),
        },
        _ => Err(sig.type_error(index, "int", &value)),
    }
}

fn float_param_to_int(
    executor: &mut Executor<'_>,
    sig: &Signature,
    index: usize,
    f: f64,
    original: &Val,
) -> Result<i64, VmError> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(sig.type_error(index, "int", original));
    }
    if f.fract() != 0.0 {
        executor.engine.deprecated(&format!(
            "Implicit conversion from float {} to int loses precision",
            float_repr(f)
        ));
    }
    Ok(double_to_long(f))
}

/// Validate and coerce an `int|float` parameter
pub(crate) fn param_number(
    executor: &mut Executor<'_>,
    sig: &Signature,
    args: &ArgList,
    index: usize,
) -> Result<Number, VmError> {
    let value = arg(args, index).unwrap_or(Val::Null);
    match &value {
        Val::Int(i) => Ok(Number::Int(*i)),
        Val::Float(f) => Ok(Number::Float(*f)),
        _ if executor.engine.strict_types => Err(sig.type_error(index, "int|float", &value)),
        Val::Undef | Val::Null => {
            sig.null_deprecated(executor, index, "int|float");
            Ok(Number::Int(0))
        }
        Val::Bool(b) => Ok(Number::Int(*b as i64)),
        Val::String(s) => match parse_numeric_str(s) {
            Some(prefix) => Ok(prefix.number),
            None => Err(sig.type_error(index, "int|float", &value)),
        },
        _ => Err(sig.type_error(index, "int|float", &value)),
    }
}

/// Validate and coerce a `bool` parameter
/// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_parse_arg_bool_weak
pub(crate) fn param_bool(
    executor: &mut Executor<'_>,
    sig: &Signature,
    args: &ArgList,
    index: usize,
) -> Result<bool, VmError> {
    let value = arg(args, index).unwrap_or(Val::Null);
    match &value {
        Val::Bool(b) => Ok(*b),
        _ if executor.engine.strict_types => Err(sig.type_error(index, "bool", &value)),
        Val::Undef | Val::Null => {
            sig.null_deprecated(executor, index, "bool");
            Ok(false)
        }
        Val::Int(_) | Val::Float(_) | Val::String(_) => Ok(value.to_bool()),
        _ => Err(sig.type_error(index, "bool", &value)),
    }
}

/// An `array` parameter; no coercion in either mode
pub(crate) fn param_array(
    sig: &Signature,
    args: &ArgList,
    index: usize,
) -> Result<Rc<ArrayData>, VmError> {
    match arg(args, index).unwrap_or(Val::Null) {
        Val::Array(arr) => Ok(arr),
        other => Err(sig.type_error(index, "array", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    const SIG: Signature = Signature {
        name: "f",
        params: &["value", "flag"],
        required: 1,
    };

    #[test]
    fn test_arity_messages() {
        let none: ArgList = smallvec![];
        let err = SIG.check_arity(&none, false).unwrap_err();
        assert_eq!(err.to_string(), "f() expects at least 1 argument, 0 given");

        let three: ArgList = smallvec![Val::Int(1), Val::Int(2), Val::Int(3)];
        let err = SIG.check_arity(&three, false).unwrap_err();
        assert_eq!(err.to_string(), "f() expects at most 2 arguments, 3 given");
        assert!(SIG.check_arity(&three, true).is_ok());
    }

    #[test]
    fn test_param_int_weak_and_strict() {
        let mut executor = Executor::new();
        let args: ArgList = smallvec![Val::string("42")];
        assert_eq!(param_int(&mut executor, &SIG, &args, 0).unwrap(), 42);

        let args: ArgList = smallvec![Val::string("abc")];
        let err = param_int(&mut executor, &SIG, &args, 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "f(): Argument #1 ($value) must be of type int, string given"
        );

        executor.engine.strict_types = true;
        let args: ArgList = smallvec![Val::string("42")];
        assert!(matches!(
            param_int(&mut executor, &SIG, &args, 0),
            Err(VmError::TypeError(_))
        ));
    }

    #[test]
    fn test_param_string_coerces_scalars() {
        let mut executor = Executor::new();
        let args: ArgList = smallvec![Val::Int(7), Val::Bool(true)];
        assert_eq!(param_string(&mut executor, &SIG, &args, 0).unwrap().as_slice(), b"7");
        assert_eq!(param_string(&mut executor, &SIG, &args, 1).unwrap().as_slice(), b"1");

        let args: ArgList = smallvec![Val::empty_array()];
        assert!(param_string(&mut executor, &SIG, &args, 0).is_err());
    }

    #[test]
    fn test_param_array_rejects_scalars() {
        let args: ArgList = smallvec![Val::Int(1)];
        let err = param_array(&SIG, &args, 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "f(): Argument #1 ($value) must be of type array, int given"
        );
    }
}
