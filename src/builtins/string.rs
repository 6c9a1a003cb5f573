//! String functions
//!
//! Strings are byte strings; case mapping is ASCII-only and does not depend
//! on the locale.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/ext/standard/string.c` - PHP_FUNCTION(implode), php_implode,
//!   PHP_FUNCTION(str_repeat), zend_str_toupper, zend_str_tolower

use crate::builtins::{Signature, arg, param_int, param_string};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;

/// strlen(string $string): int
pub fn php_strlen(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "strlen",
        params: &["string"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let bytes = param_string(executor, &SIG, args, 0)?;
    Ok(Val::Int(bytes.len() as i64))
}

/// implode(array|string $separator = "", ?array $array = null): string
pub fn php_implode(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "implode",
        params: &["separator", "array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;

    let (separator, pieces) = match (arg(args, 0), arg(args, 1)) {
        (Some(Val::Array(pieces)), None) => (Vec::new(), pieces),
        (Some(Val::Array(_)), Some(other)) => {
            return Err(SIG.type_error(1, "?array", &other));
        }
        (Some(_), Some(Val::Array(pieces))) => {
            let separator = param_string(executor, &SIG, args, 0)?;
            (separator.to_vec(), pieces)
        }
        (Some(separator), None) => {
            return Err(VmError::TypeError(format!(
                "implode(): Argument #2 ($array) must be of type ?array, {} given",
                if separator.is_null() { "null".into() } else { separator.type_name() }
            )));
        }
        (_, Some(other)) => return Err(SIG.type_error(1, "?array", &other)),
        (None, None) => return Err(SIG.type_error(0, "array|string", &Val::Null)),
    };

    let mut joined = Vec::new();
    for (i, piece) in pieces.values().enumerate() {
        if i > 0 {
            joined.extend_from_slice(&separator);
        }
        let text = executor.to_string_val(piece)?;
        joined.extend_from_slice(&text);
    }
    Ok(Val::string(joined))
}

/// str_repeat(string $string, int $times): string
pub fn php_str_repeat(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "str_repeat",
        params: &["string", "times"],
        required: 2,
    };
    SIG.check_arity(args, false)?;
    let input = param_string(executor, &SIG, args, 0)?;
    let times = param_int(executor, &SIG, args, 1)?;
    if times < 0 {
        return Err(SIG.value_error(1, "must be greater than or equal to 0"));
    }
    let total = input.len().checked_mul(times as usize).ok_or_else(|| {
        VmError::RuntimeError("Result of str_repeat() is too big".into())
    })?;
    let mut repeated = Vec::with_capacity(total);
    for _ in 0..times {
        repeated.extend_from_slice(&input);
    }
    Ok(Val::string(repeated))
}

/// strtoupper(string $string): string
pub fn php_strtoupper(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "strtoupper",
        params: &["string"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let input = param_string(executor, &SIG, args, 0)?;
    Ok(Val::string(input.to_ascii_uppercase()))
}

/// strtolower(string $string): string
pub fn php_strtolower(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "strtolower",
        params: &["string"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let input = param_string(executor, &SIG, args, 0)?;
    Ok(Val::string(input.to_ascii_lowercase()))
}
