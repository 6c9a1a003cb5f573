//! Variable handling functions
//!
//! Type predicates and the explicit conversion functions. The conversions
//! follow the cast rules of [`type_conversion`](crate::vm::type_conversion).
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/ext/standard/type.c` - PHP_FUNCTION(gettype), PHP_FUNCTION(intval),
//!   PHP_FUNCTION(is_numeric)
//! - Zend: `$PHP_SRC_PATH/ext/spl/php_spl.c` - PHP_FUNCTION(spl_object_id)

use crate::builtins::{Signature, arg, param_int};
use crate::core::numeric::is_numeric_str;
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;
use crate::vm::type_conversion::{to_double, to_long};

/// The single `mixed $value` argument of a one-parameter function
fn value_arg(name: &'static str, args: &ArgList) -> Result<Val, VmError> {
    let sig = Signature {
        name,
        params: &["value"],
        required: 1,
    };
    sig.check_arity(args, false)?;
    Ok(arg(args, 0).unwrap_or(Val::Null))
}

/// gettype(mixed $value): string
pub fn php_gettype(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    let type_str = match value_arg("gettype", args)? {
        Val::Undef | Val::Null => "NULL",
        Val::Bool(_) => "boolean",
        Val::Int(_) => "integer",
        Val::Float(_) => "double",
        Val::String(_) => "string",
        Val::Array(_) => "array",
        Val::Object(_) => "object",
        Val::Resource(_) => "resource",
        Val::Reference(_) => "unknown type",
    };
    Ok(Val::from(type_str))
}

pub fn php_is_int(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(matches!(value_arg("is_int", args)?, Val::Int(_))))
}

pub fn php_is_float(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(matches!(value_arg("is_float", args)?, Val::Float(_))))
}

pub fn php_is_string(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(matches!(value_arg("is_string", args)?, Val::String(_))))
}

pub fn php_is_bool(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(matches!(value_arg("is_bool", args)?, Val::Bool(_))))
}

pub fn php_is_array(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(matches!(value_arg("is_array", args)?, Val::Array(_))))
}

pub fn php_is_null(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(value_arg("is_null", args)?.is_null()))
}

/// is_numeric(mixed $value): bool
///
/// Leading and trailing whitespace is allowed around numeric strings.
pub fn php_is_numeric(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    let numeric = match value_arg("is_numeric", args)? {
        Val::Int(_) | Val::Float(_) => true,
        Val::String(s) => is_numeric_str(&s),
        _ => false,
    };
    Ok(Val::Bool(numeric))
}

/// intval(mixed $value, int $base = 10): int
pub fn php_intval(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "intval",
        params: &["value", "base"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let value = arg(args, 0).unwrap_or(Val::Null);
    let base = if args.len() > 1 {
        param_int(executor, &SIG, args, 1)?
    } else {
        10
    };
    match &value {
        Val::String(s) if base != 10 => Ok(Val::Int(parse_with_base(s, base))),
        _ => Ok(Val::Int(to_long(&value))),
    }
}

/// `strtol` over a byte string: optional sign, an optional `0x`/`0o`/`0b`
/// prefix matching the base (any of them with base 0), then digits up to the
/// first invalid one. Overflow saturates.
/// Reference: $PHP_SRC_PATH/ext/standard/type.c - PHP_FUNCTION(intval)
fn parse_with_base(s: &[u8], base: i64) -> i64 {
    let mut rest = s.trim_ascii_start();
    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let prefix = |rest: &[u8], marker: u8| {
        rest.len() > 2 && rest[0] == b'0' && rest[1].eq_ignore_ascii_case(&marker)
    };
    let mut base = base;
    if (base == 16 || base == 0) && prefix(rest, b'x') {
        base = 16;
        rest = &rest[2..];
    } else if (base == 8 || base == 0) && prefix(rest, b'o') {
        base = 8;
        rest = &rest[2..];
    } else if (base == 2 || base == 0) && prefix(rest, b'b') {
        base = 2;
        rest = &rest[2..];
    } else if base == 0 {
        base = if rest.first() == Some(&b'0') { 8 } else { 10 };
    }
    if !(2..=36).contains(&base) {
        return 0;
    }

    let mut total: i64 = 0;
    for &byte in rest {
        let Some(digit) = (byte as char).to_digit(base as u32) else {
            break;
        };
        let next = total
            .checked_mul(base)
            .and_then(|t| if negative { t.checked_sub(digit as i64) } else { t.checked_add(digit as i64) });
        match next {
            Some(next) => total = next,
            None => return if negative { i64::MIN } else { i64::MAX },
        }
    }
    total
}

/// floatval(mixed $value): float
pub fn php_floatval(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Float(to_double(&value_arg("floatval", args)?)))
}

/// strval(mixed $value): string
pub fn php_strval(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    let value = value_arg("strval", args)?;
    Ok(Val::String(executor.to_string_val(&value)?))
}

/// boolval(mixed $value): bool
pub fn php_boolval(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    Ok(Val::Bool(value_arg("boolval", args)?.to_bool()))
}

/// spl_object_id(object $object): int
pub fn php_spl_object_id(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "spl_object_id",
        params: &["object"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    match arg(args, 0).unwrap_or(Val::Null) {
        Val::Object(obj) => Ok(Val::Int(obj.borrow().handle as i64)),
        other => Err(SIG.type_error(0, "object", &other)),
    }
}
