//! Array functions
//!
//! ## PHP Semantics
//!
//! - Functions taking an array by reference (`array_push`, `sort`, `next`, ...)
//!   separate a shared array before writing, like any other write
//! - Sorting is stable; `sort`/`rsort`/`usort` renumber the keys, `ksort` keeps them
//! - The internal pointer lives in the array, so `current()` on a copy sees
//!   the position the copy was taken at
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/ext/standard/array.c` - php_count_recursive, php_array_key_compare,
//!   php_usort, PHP_FUNCTION(range)

use crate::builtins::{Signature, arg, param_array, param_bool, param_int, param_number};
use crate::core::array::{ArrayData, ArrayKey};
use crate::core::numeric::Number;
use crate::core::value::Val;
use crate::vm::array_access::next_element_occupied;
use crate::vm::engine::{Engine, VmError};
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;
use crate::vm::opcodes::comparison::{compare, is_identical};
use crate::vm::type_conversion::{to_array_key, to_double, to_long, to_string_bytes};
use std::cmp::Ordering;
use std::rc::Rc;

const COUNT_RECURSIVE: i64 = 1;
const SORT_NUMERIC: i64 = 1;
const SORT_STRING: i64 = 2;
/// Largest array `range()` will build
const RANGE_MAX_ELEMENTS: usize = 1 << 27;

/// Run `f` on the array bound to by-reference argument `index`.
///
/// A non-reference argument (a literal passed where a variable was expected)
/// is worked on as a temporary copy.
fn with_array_arg<R>(
    sig: &Signature,
    args: &ArgList,
    index: usize,
    f: impl FnOnce(&mut ArrayData) -> R,
) -> Result<R, VmError> {
    match args.get(index) {
        Some(Val::Reference(cell)) => {
            let mut slot = cell.try_borrow_mut().map_err(|_| {
                VmError::RuntimeError("Cannot modify an array while it is being modified".into())
            })?;
            match &mut *slot {
                Val::Array(arr) => Ok(f(Rc::make_mut(arr))),
                other => Err(sig.type_error(index, "array", other)),
            }
        }
        Some(Val::Array(arr)) => {
            let mut copy = (**arr).clone();
            Ok(f(&mut copy))
        }
        Some(other) => Err(sig.type_error(index, "array", other)),
        None => Err(sig.type_error(index, "array", &Val::Null)),
    }
}

fn count_recursive(engine: &mut Engine, arr: &ArrayData) -> i64 {
    if arr.is_protected() {
        engine.warning("count(): Recursion detected");
        return 0;
    }
    arr.protect();
    let mut total = arr.len() as i64;
    for value in arr.values() {
        if let Val::Array(inner) = value.deref() {
            total += count_recursive(engine, &inner);
        }
    }
    arr.unprotect();
    total
}

/// count(Countable|array $value, int $mode = COUNT_NORMAL): int
pub fn php_count(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "count",
        params: &["value", "mode"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let mode = if args.len() > 1 {
        param_int(executor, &SIG, args, 1)?
    } else {
        0
    };
    match arg(args, 0).unwrap_or(Val::Null) {
        Val::Array(arr) if mode == COUNT_RECURSIVE => {
            Ok(Val::Int(count_recursive(&mut executor.engine, &arr)))
        }
        Val::Array(arr) => Ok(Val::Int(arr.len() as i64)),
        other => Err(SIG.type_error(0, "Countable|array", &other)),
    }
}

/// array_keys(array $array, mixed $filter_value = UNKNOWN, bool $strict = false): array
pub fn php_array_keys(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "array_keys",
        params: &["array", "filter_value", "strict"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let arr = param_array(&SIG, args, 0)?;
    let Some(filter) = arg(args, 1) else {
        return Ok(Val::array(ArrayData::from_values(
            arr.keys().map(ArrayKey::to_val),
        )));
    };
    let strict = if args.len() > 2 {
        param_bool(executor, &SIG, args, 2)?
    } else {
        false
    };

    let mut keys = ArrayData::new();
    for (key, value) in arr.iter() {
        let value = value.deref();
        let matched = if strict {
            is_identical(&mut executor.engine, &value, &filter)?
        } else {
            executor.loose_equals(&value, &filter)?
        };
        if matched {
            keys.append(key.to_val());
        }
    }
    Ok(Val::array(keys))
}

/// array_values(array $array): array
pub fn php_array_values(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "array_values",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let arr = param_array(&SIG, args, 0)?;
    Ok(Val::array(ArrayData::from_values(
        arr.values().map(Val::deref),
    )))
}

/// in_array(mixed $needle, array $haystack, bool $strict = false): bool
pub fn php_in_array(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "in_array",
        params: &["needle", "haystack", "strict"],
        required: 2,
    };
    SIG.check_arity(args, false)?;
    let needle = arg(args, 0).unwrap_or(Val::Null);
    let haystack = param_array(&SIG, args, 1)?;
    let strict = if args.len() > 2 {
        param_bool(executor, &SIG, args, 2)?
    } else {
        false
    };

    for value in haystack.values() {
        let value = value.deref();
        let found = if strict {
            is_identical(&mut executor.engine, &value, &needle)?
        } else {
            executor.loose_equals(&value, &needle)?
        };
        if found {
            return Ok(Val::Bool(true));
        }
    }
    Ok(Val::Bool(false))
}

/// array_key_exists(string|int|float|bool|resource|null $key, array $array): bool
pub fn php_array_key_exists(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "array_key_exists",
        params: &["key", "array"],
        required: 2,
    };
    SIG.check_arity(args, false)?;
    let arr = param_array(&SIG, args, 1)?;
    let key = arg(args, 0).unwrap_or(Val::Null);
    if matches!(key, Val::Array(_) | Val::Object(_)) {
        return Err(VmError::TypeError(
            "Illegal offset type for array_key_exists()".into(),
        ));
    }
    let key = to_array_key(&mut executor.engine, &key)?;
    Ok(Val::Bool(arr.exists(&key)))
}

/// array_push(array &$array, mixed ...$values): int
pub fn php_array_push(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "array_push",
        params: &["array", "values"],
        required: 1,
    };
    SIG.check_arity(args, true)?;
    let values: Vec<Val> = args.iter().skip(1).map(Val::deref).collect();
    with_array_arg(&SIG, args, 0, |arr| {
        for value in values {
            arr.append(value).ok_or_else(next_element_occupied)?;
        }
        Ok(Val::Int(arr.len() as i64))
    })?
}

/// array_pop(array &$array): mixed
pub fn php_array_pop(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "array_pop",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    with_array_arg(&SIG, args, 0, |arr| {
        let Some((key, value)) = arr.last().map(|(k, v)| (k.clone(), v.deref())) else {
            return Val::Null;
        };
        arr.delete(&key);
        arr.reset_pointer();
        value
    })
}

fn sort_flags(executor: &mut Executor<'_>, sig: &Signature, args: &ArgList) -> Result<i64, VmError> {
    if args.len() > 1 {
        param_int(executor, sig, args, 1)
    } else {
        Ok(0)
    }
}

/// Three-way comparison under a `SORT_*` flag
/// Reference: $PHP_SRC_PATH/ext/standard/array.c - php_get_data_compare_func
fn compare_with_flags(engine: &mut Engine, flags: i64, a: &Val, b: &Val) -> Result<Ordering, VmError> {
    let (a, b) = (a.deref(), b.deref());
    let result = match flags {
        SORT_NUMERIC => to_double(&a)
            .partial_cmp(&to_double(&b))
            .unwrap_or(Ordering::Equal),
        SORT_STRING => {
            let a = to_string_bytes(engine, &a);
            let b = to_string_bytes(engine, &b);
            a.cmp(&b)
        }
        _ => compare(engine, &a, &b)?.cmp(&0),
    };
    Ok(result)
}

/// Sort the by-reference array with a fallible comparator; the first error wins
fn sort_array_arg<F>(sig: &Signature, args: &ArgList, renumber: bool, mut cmp: F) -> Result<Val, VmError>
where
    F: FnMut((&ArrayKey, &Val), (&ArrayKey, &Val)) -> Result<Ordering, VmError>,
{
    let mut failure = None;
    with_array_arg(sig, args, 0, |arr| {
        arr.sort_by(
            |a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                cmp(a, b).unwrap_or_else(|err| {
                    failure = Some(err);
                    Ordering::Equal
                })
            },
            renumber,
        );
    })?;
    match failure {
        Some(err) => Err(err),
        None => Ok(Val::Bool(true)),
    }
}

/// sort(array &$array, int $flags = SORT_REGULAR): true
pub fn php_sort(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "sort",
        params: &["array", "flags"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let flags = sort_flags(executor, &SIG, args)?;
    let engine = &mut executor.engine;
    sort_array_arg(&SIG, args, true, |(_, a), (_, b)| {
        compare_with_flags(engine, flags, a, b)
    })
}

/// rsort(array &$array, int $flags = SORT_REGULAR): true
pub fn php_rsort(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "rsort",
        params: &["array", "flags"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let flags = sort_flags(executor, &SIG, args)?;
    let engine = &mut executor.engine;
    sort_array_arg(&SIG, args, true, |(_, a), (_, b)| {
        compare_with_flags(engine, flags, b, a)
    })
}

/// ksort(array &$array, int $flags = SORT_REGULAR): true
pub fn php_ksort(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "ksort",
        params: &["array", "flags"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let flags = sort_flags(executor, &SIG, args)?;
    let engine = &mut executor.engine;
    sort_array_arg(&SIG, args, false, |(a, _), (b, _)| {
        compare_with_flags(engine, flags, &a.to_val(), &b.to_val())
    })
}

/// usort(array &$array, callable $callback): true
///
/// The callback runs against a separated copy that is stored back once the
/// sort finishes, so the callback never observes a half-sorted array.
/// Reference: $PHP_SRC_PATH/ext/standard/array.c - php_usort
pub fn php_usort(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "usort",
        params: &["array", "callback"],
        required: 2,
    };
    SIG.check_arity(args, false)?;
    let callback = arg(args, 1).unwrap_or(Val::Null);
    let mut arr = param_array(&SIG, args, 0)?;

    let mut failure = None;
    Rc::make_mut(&mut arr).sort_by(
        |(_, a), (_, b)| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            let mut call_args = ArgList::new();
            call_args.push(a.deref());
            call_args.push(b.deref());
            match executor.call_value(&callback, call_args) {
                Ok(result) => to_long(&result).cmp(&0),
                Err(err) => {
                    failure = Some(err);
                    Ordering::Equal
                }
            }
        },
        true,
    );
    if let Some(err) = failure {
        return Err(err);
    }

    if let Some(Val::Reference(cell)) = args.first() {
        *cell.borrow_mut() = Val::Array(arr);
    }
    Ok(Val::Bool(true))
}

fn pointer_result(entry: Option<(&ArrayKey, &Val)>) -> Val {
    entry.map_or(Val::Bool(false), |(_, v)| v.deref())
}

/// current(array|object $array): mixed
pub fn php_current(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "current",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let arr = param_array(&SIG, args, 0)?;
    Ok(pointer_result(arr.current()))
}

/// key(array|object $array): int|string|null
pub fn php_key(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "key",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    let arr = param_array(&SIG, args, 0)?;
    Ok(arr.current().map_or(Val::Null, |(k, _)| k.to_val()))
}

/// next(array|object &$array): mixed
pub fn php_next(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "next",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    with_array_arg(&SIG, args, 0, |arr| pointer_result(arr.move_next()))
}

/// prev(array|object &$array): mixed
pub fn php_prev(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "prev",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    with_array_arg(&SIG, args, 0, |arr| pointer_result(arr.move_prev()))
}

/// reset(array|object &$array): mixed
pub fn php_reset(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "reset",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    with_array_arg(&SIG, args, 0, |arr| pointer_result(arr.reset_pointer()))
}

/// end(array|object &$array): mixed
pub fn php_end(_executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "end",
        params: &["array"],
        required: 1,
    };
    SIG.check_arity(args, false)?;
    with_array_arg(&SIG, args, 0, |arr| pointer_result(arr.move_end()))
}

/// range(string|int|float $start, string|int|float $end, int|float $step = 1): array
/// Reference: $PHP_SRC_PATH/ext/standard/array.c - PHP_FUNCTION(range)
pub fn php_range(executor: &mut Executor<'_>, args: &mut ArgList) -> Result<Val, VmError> {
    const SIG: Signature = Signature {
        name: "range",
        params: &["start", "end", "step"],
        required: 2,
    };
    SIG.check_arity(args, false)?;
    let step = if args.len() > 2 {
        param_number(executor, &SIG, args, 2)?
    } else {
        Number::Int(1)
    };
    let step_abs = match step {
        Number::Int(i) => Number::Int(i.saturating_abs()),
        Number::Float(f) => Number::Float(f.abs()),
    };
    if step_abs.to_f64() == 0.0 {
        return Err(SIG.value_error(2, "cannot be 0"));
    }

    let start = arg(args, 0).unwrap_or(Val::Null);
    let end = arg(args, 1).unwrap_or(Val::Null);

    if let (Some(a), Some(b)) = (single_byte(&start), single_byte(&end)) {
        let step = match step_abs {
            Number::Int(i) => i,
            Number::Float(f) => f as i64,
        };
        return Ok(Val::array(char_range(a, b, step)));
    }

    let low = param_number(executor, &SIG, args, 0)?;
    let high = param_number(executor, &SIG, args, 1)?;
    let values = match (low, high, step_abs) {
        (Number::Int(low), Number::Int(high), Number::Int(step)) => int_range(&SIG, low, high, step)?,
        (Number::Int(low), Number::Int(high), Number::Float(step)) if step.fract() == 0.0 => {
            int_range(&SIG, low, high, step as i64)?
        }
        (low, high, step) => float_range(&SIG, low.to_f64(), high.to_f64(), step.to_f64())?,
    };
    Ok(Val::array(values))
}

/// First byte of a non-numeric string bound of a character range
fn single_byte(v: &Val) -> Option<u8> {
    match v {
        Val::String(s) if !s.is_empty() && !crate::core::numeric::is_numeric_str(s) => Some(s[0]),
        _ => None,
    }
}

fn char_range(from: u8, to: u8, step: i64) -> ArrayData {
    let step = step.clamp(1, 255) as usize;
    let bytes: Vec<u8> = if from <= to {
        (from..=to).step_by(step).collect()
    } else {
        (to..=from).rev().step_by(step).collect()
    };
    ArrayData::from_values(bytes.into_iter().map(|b| Val::string(vec![b])))
}

fn int_range(sig: &Signature, low: i64, high: i64, step: i64) -> Result<ArrayData, VmError> {
    let span = low.abs_diff(high);
    if span != 0 && span < step as u64 {
        return Err(sig.value_error(2, "must not exceed the specified range"));
    }
    let count = span / step as u64 + 1;
    if count > RANGE_MAX_ELEMENTS as u64 {
        return Err(VmError::ValueError(
            "The supplied range exceeds the maximum array size".into(),
        ));
    }
    let mut arr = ArrayData::with_capacity(count as usize);
    let mut current = low as i128;
    for _ in 0..count {
        arr.append(Val::Int(current as i64));
        if low <= high {
            current += step as i128;
        } else {
            current -= step as i128;
        }
    }
    Ok(arr)
}

fn float_range(sig: &Signature, low: f64, high: f64, step: f64) -> Result<ArrayData, VmError> {
    if !low.is_finite() || !high.is_finite() {
        return Err(VmError::ValueError(
            "range(): Argument #1 ($start) must be a finite number, INF provided".into(),
        ));
    }
    let span = (high - low).abs();
    if span != 0.0 && span < step {
        return Err(sig.value_error(2, "must not exceed the specified range"));
    }
    // Tolerate rounding error in the last step
    let count = (span / step + 1e-9).floor() + 1.0;
    if count > RANGE_MAX_ELEMENTS as f64 {
        return Err(VmError::ValueError(
            "The supplied range exceeds the maximum array size".into(),
        ));
    }
    let direction = if low <= high { 1.0 } else { -1.0 };
    Ok(ArrayData::from_values(
        (0..count as usize).map(|i| Val::Float(low + direction * step * i as f64)),
    ))
}
