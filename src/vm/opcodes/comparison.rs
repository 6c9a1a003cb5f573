//! Comparison operations
//!
//! Loose (`==`, `<`, `<=>`) and strict (`===`) comparison following PHP 8.
//!
//! ## PHP Semantics
//!
//! - null and false compare as "falsy" against anything: `null == 0`,
//!   `null < true`, `false == []`
//! - null against a string compares against the empty string
//! - Two numeric strings compare as numbers (`"10" == "1e1"`); otherwise
//!   strings compare bytewise
//! - A number against a non-numeric string compares as strings
//!   (`0 == "a"` is false)
//! - Arrays compare by count, then key by key; a key missing on the right
//!   makes them uncomparable (result 1)
//! - Arrays are greater than any non-array
//! - Objects of the same class compare property by property; different
//!   classes are uncomparable (result 1)
//!
//! Deep comparison guards against self-referencing structures with the
//! container recursion flag and fails with a fatal error.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - zend_compare, zend_is_identical,
//!   zendi_smart_strcmp, zendi_smart_str_equals, compare_longs_to_string
//! - Zend: `$PHP_SRC_PATH/Zend/zend_hash.c` - zend_hash_compare
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_compare_objects

use crate::core::array::{ArrayData, ArrayKey};
use crate::core::numeric::{Number, parse_numeric_str};
use crate::core::value::{Val, ValType, type_pair};
use crate::runtime::object::ObjectRef;
use crate::vm::engine::{Engine, VmError};
use crate::vm::type_conversion::{long_to_bytes, str_to_number, to_string_bytes};
use std::cmp::Ordering;
use std::rc::Rc;

const LONG_LONG: u16 = type_pair(ValType::Long, ValType::Long);
const LONG_DOUBLE: u16 = type_pair(ValType::Long, ValType::Double);
const DOUBLE_LONG: u16 = type_pair(ValType::Double, ValType::Long);
const DOUBLE_DOUBLE: u16 = type_pair(ValType::Double, ValType::Double);
const ARRAY_ARRAY: u16 = type_pair(ValType::Array, ValType::Array);
const NULL_NULL: u16 = type_pair(ValType::Null, ValType::Null);
const NULL_FALSE: u16 = type_pair(ValType::Null, ValType::False);
const FALSE_NULL: u16 = type_pair(ValType::False, ValType::Null);
const FALSE_FALSE: u16 = type_pair(ValType::False, ValType::False);
const TRUE_TRUE: u16 = type_pair(ValType::True, ValType::True);
const NULL_TRUE: u16 = type_pair(ValType::Null, ValType::True);
const TRUE_NULL: u16 = type_pair(ValType::True, ValType::Null);
const STRING_STRING: u16 = type_pair(ValType::String, ValType::String);
const NULL_STRING: u16 = type_pair(ValType::Null, ValType::String);
const STRING_NULL: u16 = type_pair(ValType::String, ValType::Null);
const LONG_STRING: u16 = type_pair(ValType::Long, ValType::String);
const STRING_LONG: u16 = type_pair(ValType::String, ValType::Long);
const DOUBLE_STRING: u16 = type_pair(ValType::Double, ValType::String);
const STRING_DOUBLE: u16 = type_pair(ValType::String, ValType::Double);

const NESTING_ERROR: &str = "Nesting level too deep - recursive dependency?";

#[inline]
fn ordering_to_int(o: Ordering) -> i32 {
    match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// `a == b ? 0 : (a < b ? -1 : 1)`; NAN is never equal or smaller
#[inline]
fn threeway_double(a: f64, b: f64) -> i32 {
    if a == b {
        0
    } else if a < b {
        -1
    } else {
        1
    }
}

#[inline]
fn binary_strcmp(a: &[u8], b: &[u8]) -> i32 {
    ordering_to_int(a.cmp(b))
}

/// Treat Undef as Null so operator code never sees it
fn normalize(v: &Val) -> Val {
    match v.deref() {
        Val::Undef => Val::Null,
        other => other,
    }
}

/// Compare two strings, numerically when both are numeric
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zendi_smart_strcmp
pub fn smart_str_compare(s1: &[u8], s2: &[u8]) -> i32 {
    if let (Some(p1), Some(p2)) = (parse_numeric_str(s1), parse_numeric_str(s2)) {
        let (o1, o2) = (p1.overflow, p2.overflow);
        if o1 != 0 && o1 == o2 && p1.number.to_f64() - p2.number.to_f64() == 0.0 {
            // Both overflowed the same way: only the text can tell them apart
            return binary_strcmp(s1, s2);
        }
        return match (p1.number, p2.number) {
            (Number::Int(a), Number::Int(b)) => ordering_to_int(a.cmp(&b)),
            (Number::Int(a), Number::Float(b)) => {
                if o2 != 0 {
                    return -(o2 as i32);
                }
                threeway_double(a as f64, b)
            }
            (Number::Float(a), Number::Int(b)) => {
                if o1 != 0 {
                    return o1 as i32;
                }
                threeway_double(a, b as f64)
            }
            (Number::Float(a), Number::Float(b)) => {
                if a == b && !a.is_finite() {
                    return binary_strcmp(s1, s2);
                }
                threeway_double(a, b)
            }
        };
    }
    binary_strcmp(s1, s2)
}

/// String equality under `==`
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zendi_smart_str_equals
pub fn smart_str_equals(s1: &[u8], s2: &[u8]) -> bool {
    if s1 == s2 {
        return true;
    }
    let (Some(p1), Some(p2)) = (parse_numeric_str(s1), parse_numeric_str(s2)) else {
        return false;
    };
    let (o1, o2) = (p1.overflow, p2.overflow);
    if o1 != 0 && o1 == o2 && p1.number.to_f64() - p2.number.to_f64() == 0.0 {
        return false;
    }
    match (p1.number, p2.number) {
        (Number::Int(a), Number::Int(b)) => a == b,
        (Number::Int(a), Number::Float(b)) => o2 == 0 && a as f64 == b,
        (Number::Float(a), Number::Int(b)) => o1 == 0 && a == b as f64,
        (Number::Float(a), Number::Float(b)) => a.is_finite() && a == b,
    }
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - compare_longs_to_string
fn compare_long_to_string(l: i64, s: &[u8]) -> i32 {
    match parse_numeric_str(s) {
        Some(p) => match p.number {
            Number::Int(i) => ordering_to_int(l.cmp(&i)),
            Number::Float(d) => threeway_double(l as f64, d),
        },
        None => binary_strcmp(&long_to_bytes(l), s),
    }
}

/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - compare_doubles_to_string
fn compare_double_to_string(engine: &mut Engine, d: f64, s: &[u8]) -> i32 {
    match parse_numeric_str(s) {
        Some(p) => threeway_double(d, p.number.to_f64()),
        None => {
            let text = to_string_bytes(engine, &Val::Float(d));
            binary_strcmp(&text, s)
        }
    }
}

fn is_falsy_type(t: ValType) -> bool {
    t < ValType::True
}

/// Loose three-way comparison, the engine of `==`, `<`, `<=>`
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_compare
pub fn compare(engine: &mut Engine, a: &Val, b: &Val) -> Result<i32, VmError> {
    let (a, b) = (normalize(a), normalize(b));
    let (ta, tb) = (a.val_type(), b.val_type());

    match (type_pair(ta, tb), &a, &b) {
        (LONG_LONG, Val::Int(x), Val::Int(y)) => return Ok(ordering_to_int(x.cmp(y))),
        (LONG_DOUBLE, Val::Int(x), Val::Float(y)) => return Ok(threeway_double(*x as f64, *y)),
        (DOUBLE_LONG, Val::Float(x), Val::Int(y)) => return Ok(threeway_double(*x, *y as f64)),
        (DOUBLE_DOUBLE, Val::Float(x), Val::Float(y)) => return Ok(threeway_double(*x, *y)),
        (ARRAY_ARRAY, Val::Array(x), Val::Array(y)) => {
            return compare_arrays(engine, x, y);
        }
        (NULL_NULL | NULL_FALSE | FALSE_NULL | FALSE_FALSE | TRUE_TRUE, _, _) => return Ok(0),
        (NULL_TRUE, _, _) => return Ok(-1),
        (TRUE_NULL, _, _) => return Ok(1),
        (STRING_STRING, Val::String(x), Val::String(y)) => {
            if Rc::ptr_eq(x, y) {
                return Ok(0);
            }
            return Ok(smart_str_compare(x, y));
        }
        (NULL_STRING, _, Val::String(y)) => return Ok(if y.is_empty() { 0 } else { -1 }),
        (STRING_NULL, Val::String(x), _) => return Ok(if x.is_empty() { 0 } else { 1 }),
        (LONG_STRING, Val::Int(x), Val::String(y)) => return Ok(compare_long_to_string(*x, y)),
        (STRING_LONG, Val::String(x), Val::Int(y)) => {
            return Ok(-compare_long_to_string(*y, x));
        }
        (DOUBLE_STRING, Val::Float(x), Val::String(y)) => {
            if x.is_nan() {
                return Ok(1);
            }
            return Ok(compare_double_to_string(engine, *x, y));
        }
        (STRING_DOUBLE, Val::String(x), Val::Float(y)) => {
            if y.is_nan() {
                return Ok(1);
            }
            return Ok(-compare_double_to_string(engine, *y, x));
        }
        _ => {}
    }

    match (&a, &b) {
        (Val::Object(x), Val::Object(y)) => return compare_objects(engine, x, y),
        (Val::Object(o), other) => return compare_object_to_scalar(engine, o, other),
        (other, Val::Object(o)) => return Ok(-compare_object_to_scalar(engine, o, other)?),
        _ => {}
    }

    if is_falsy_type(ta) {
        return Ok(if b.to_bool() { -1 } else { 0 });
    }
    if ta == ValType::True {
        return Ok(if b.to_bool() { 0 } else { 1 });
    }
    if is_falsy_type(tb) {
        return Ok(if a.to_bool() { 1 } else { 0 });
    }
    if tb == ValType::True {
        return Ok(if a.to_bool() { 0 } else { -1 });
    }
    if ta == ValType::Array {
        return Ok(1);
    }
    if tb == ValType::Array {
        return Ok(-1);
    }

    // Resources and anything left compare by silent numeric value
    let x = silent_number(&a);
    let y = silent_number(&b);
    Ok(match (x, y) {
        (Number::Int(i), Number::Int(j)) => ordering_to_int(i.cmp(&j)),
        _ => threeway_double(x.to_f64(), y.to_f64()),
    })
}

fn silent_number(v: &Val) -> Number {
    match v {
        Val::Int(i) => Number::Int(*i),
        Val::Float(f) => Number::Float(*f),
        Val::String(s) => str_to_number(s),
        Val::Resource(r) => Number::Int(r.handle),
        other => Number::Int(other.to_bool() as i64),
    }
}

/// An object against a non-object, with the object on the left.
/// Callers that can run `__toString` cast before comparing with a string.
fn compare_object_to_scalar(engine: &mut Engine, o: &ObjectRef, other: &Val) -> Result<i32, VmError> {
    match other {
        Val::Null | Val::Undef => Ok(1),
        Val::Bool(b) => Ok(if *b { 0 } else { 1 }),
        Val::Int(_) | Val::Float(_) => {
            let target = if matches!(other, Val::Int(_)) { "int" } else { "float" };
            engine.warning(&format!(
                "Object of class {} could not be converted to {}",
                o.borrow().class_name_lossy(),
                target
            ));
            Ok(threeway_double(1.0, silent_number(other).to_f64()))
        }
        Val::Array(_) => Ok(1),
        Val::String(_) | Val::Resource(_) => Err(VmError::NotComparable),
        Val::Object(_) | Val::Reference(_) => unreachable!("normalized before dispatch"),
    }
}

/// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c - zend_std_compare_objects
pub fn compare_objects(engine: &mut Engine, a: &ObjectRef, b: &ObjectRef) -> Result<i32, VmError> {
    if Rc::ptr_eq(a, b) {
        return Ok(0);
    }
    let (same_class, left_slots, right_slots, left_dyn, right_dyn) = {
        let (x, y) = (a.borrow(), b.borrow());
        if x.is_protected() {
            return Err(VmError::RuntimeError(NESTING_ERROR.into()));
        }
        (
            Rc::ptr_eq(&x.class, &y.class) || x.class.lc_name == y.class.lc_name,
            x.slots.clone(),
            y.slots.clone(),
            x.dynamic.clone(),
            y.dynamic.clone(),
        )
    };
    if !same_class {
        return Ok(1);
    }

    a.borrow().protect();
    let result = (|| {
        for (l, r) in left_slots.iter().zip(&right_slots) {
            match (l.is_undef(), r.is_undef()) {
                (true, true) => continue,
                (false, false) => {}
                _ => return Ok(1),
            }
            let c = compare(engine, l, r)?;
            if c != 0 {
                return Ok(c);
            }
        }
        if left_dyn.is_empty() && right_dyn.is_empty() {
            return Ok(0);
        }
        let l: ArrayData = left_dyn
            .into_iter()
            .map(|(k, v)| (ArrayKey::numeric(&k), v))
            .collect();
        let r: ArrayData = right_dyn
            .into_iter()
            .map(|(k, v)| (ArrayKey::numeric(&k), v))
            .collect();
        compare_arrays(engine, &Rc::new(l), &Rc::new(r))
    })();
    a.borrow().unprotect();
    result
}

/// Loose array comparison (`==`, `<`): count first, then per key of the left array
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_compare_arrays
pub fn compare_arrays(
    engine: &mut Engine,
    a: &Rc<ArrayData>,
    b: &Rc<ArrayData>,
) -> Result<i32, VmError> {
    hash_compare(engine, a, b, false, &mut |engine, x, y| compare(engine, x, y))
}

/// Shared walk behind loose and strict array comparison
/// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_compare
fn hash_compare(
    engine: &mut Engine,
    a: &Rc<ArrayData>,
    b: &Rc<ArrayData>,
    ordered: bool,
    compare_values: &mut dyn FnMut(&mut Engine, &Val, &Val) -> Result<i32, VmError>,
) -> Result<i32, VmError> {
    if Rc::ptr_eq(a, b) {
        return Ok(0);
    }
    if a.len() != b.len() {
        return Ok(ordering_to_int(a.len().cmp(&b.len())));
    }
    if a.is_protected() {
        return Err(VmError::RuntimeError(NESTING_ERROR.into()));
    }

    let guard_b = !b.is_protected();
    a.protect();
    if guard_b {
        b.protect();
    }
    let result = hash_compare_entries(engine, a, b, ordered, compare_values);
    a.unprotect();
    if guard_b {
        b.unprotect();
    }
    result
}

fn hash_compare_entries(
    engine: &mut Engine,
    a: &ArrayData,
    b: &ArrayData,
    ordered: bool,
    compare_values: &mut dyn FnMut(&mut Engine, &Val, &Val) -> Result<i32, VmError>,
) -> Result<i32, VmError> {
    let mut right = b.iter();
    for (key, left_val) in a.iter() {
        let right_val = if ordered {
            let Some((right_key, right_val)) = right.next() else {
                return Ok(1);
            };
            if key != right_key {
                return Ok(match (key, right_key) {
                    (ArrayKey::Int(x), ArrayKey::Int(y)) => ordering_to_int(x.cmp(y)),
                    (ArrayKey::Str(x), ArrayKey::Str(y)) => {
                        match x.len().cmp(&y.len()) {
                            Ordering::Equal => binary_strcmp(x, y),
                            other => ordering_to_int(other),
                        }
                    }
                    (ArrayKey::Int(_), ArrayKey::Str(_)) => -1,
                    (ArrayKey::Str(_), ArrayKey::Int(_)) => 1,
                });
            }
            right_val
        } else {
            match b.find(key) {
                Some(v) => v,
                None => return Ok(1),
            }
        };

        let c = compare_values(engine, left_val, right_val)?;
        if c != 0 {
            return Ok(c);
        }
    }
    Ok(0)
}

/// `==`
pub fn equals(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    match (a, b) {
        (Val::Int(x), Val::Int(y)) => Ok(x == y),
        (Val::Float(x), Val::Float(y)) => Ok(x == y),
        (Val::String(x), Val::String(y)) => Ok(smart_str_equals(x, y)),
        _ => {
            let (a, b) = (normalize(a), normalize(b));
            if let (Val::String(x), Val::String(y)) = (&a, &b) {
                return Ok(smart_str_equals(x, y));
            }
            if let (Val::Float(x), Val::Float(y)) = (&a, &b) {
                return Ok(x == y);
            }
            Ok(compare(engine, &a, &b)? == 0)
        }
    }
}

/// `===`: same type and value; arrays need the same keys in the same order
/// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_is_identical
pub fn is_identical(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    let (a, b) = (normalize(a), normalize(b));
    Ok(match (&a, &b) {
        (Val::Null, Val::Null) => true,
        (Val::Bool(x), Val::Bool(y)) => x == y,
        (Val::Int(x), Val::Int(y)) => x == y,
        (Val::Float(x), Val::Float(y)) => x == y,
        (Val::String(x), Val::String(y)) => x == y,
        (Val::Array(x), Val::Array(y)) => {
            hash_compare(engine, x, y, true, &mut |engine, l, r| {
                Ok(if is_identical(engine, l, r)? { 0 } else { 1 })
            })? == 0
        }
        (Val::Object(x), Val::Object(y)) => Rc::ptr_eq(x, y),
        (Val::Resource(x), Val::Resource(y)) => Rc::ptr_eq(x, y),
        _ => false,
    })
}

pub fn not_identical(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    Ok(!is_identical(engine, a, b)?)
}

pub fn not_equals(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    Ok(!equals(engine, a, b)?)
}

/// `<`
pub fn is_smaller(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    Ok(compare(engine, a, b)? < 0)
}

/// `<=`
pub fn is_smaller_or_equal(engine: &mut Engine, a: &Val, b: &Val) -> Result<bool, VmError> {
    Ok(compare(engine, a, b)? <= 0)
}

/// `<=>`
pub fn spaceship(engine: &mut Engine, a: &Val, b: &Val) -> Result<Val, VmError> {
    Ok(Val::Int(compare(engine, a, b)? as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::class::{ClassDef, ClassFlags, PropFlags};
    use crate::runtime::object::ObjectData;

    fn cmp(a: Val, b: Val) -> i32 {
        compare(&mut Engine::new(), &a, &b).unwrap()
    }

    fn eq(a: Val, b: Val) -> bool {
        equals(&mut Engine::new(), &a, &b).unwrap()
    }

    #[test]
    fn test_null_and_bool_table() {
        assert_eq!(cmp(Val::Null, Val::Bool(false)), 0);
        assert_eq!(cmp(Val::Null, Val::Bool(true)), -1);
        assert_eq!(cmp(Val::Null, Val::Int(0)), 0);
        assert_eq!(cmp(Val::Null, Val::string("")), 0);
        assert_eq!(cmp(Val::Null, Val::string("0")), -1);
        assert_eq!(cmp(Val::Bool(true), Val::string("0")), 1);
        assert_eq!(cmp(Val::Bool(false), Val::empty_array()), 0);
    }

    #[test]
    fn test_numeric_strings() {
        assert_eq!(cmp(Val::string("10"), Val::string("1e1")), 0);
        assert!(eq(Val::string("10"), Val::string("1e1")));
        assert!(eq(Val::string("abc"), Val::string("abc")));
        assert!(!eq(Val::string("abc"), Val::string("ABC")));
        assert_eq!(cmp(Val::string("9"), Val::string("10")), -1);
        assert_eq!(cmp(Val::string("9a"), Val::string("10a")), 1);
    }

    #[test]
    fn test_number_against_non_numeric_string() {
        assert!(!eq(Val::Int(0), Val::string("a")));
        assert!(eq(Val::Int(1), Val::string("1.0")));
        assert_eq!(cmp(Val::Int(5), Val::string("abc")), -1);
        assert!(eq(Val::Float(1.5), Val::string("1.5")));
    }

    #[test]
    fn test_overflowed_numeric_strings_compare_as_text() {
        assert!(!eq(
            Val::string("9223372036854775808"),
            Val::string("9223372036854775809")
        ));
        assert_eq!(
            cmp(Val::string("9223372036854775808"), Val::string("9223372036854775809")),
            -1
        );
    }

    #[test]
    fn test_arrays() {
        assert_eq!(cmp(Val::empty_array(), Val::empty_array()), 0);
        let one = Val::array(ArrayData::from_values([Val::Int(1)]));
        assert_ne!(cmp(one.clone(), Val::empty_array()), 0);
        assert_eq!(cmp(one.clone(), Val::Int(100)), 1);
        assert_eq!(cmp(Val::Int(100), one), -1);
    }

    #[test]
    fn test_array_key_order_matters_only_for_identity() {
        let mut a = ArrayData::new();
        a.update(ArrayKey::str("x"), Val::Int(1));
        a.update(ArrayKey::str("y"), Val::Int(2));
        let mut b = ArrayData::new();
        b.update(ArrayKey::str("y"), Val::Int(2));
        b.update(ArrayKey::str("x"), Val::Int(1));
        let (a, b) = (Val::array(a), Val::array(b));
        let mut engine = Engine::new();
        assert!(equals(&mut engine, &a, &b).unwrap());
        assert!(!is_identical(&mut engine, &a, &b).unwrap());
        assert!(is_identical(&mut engine, &a, &a.clone()).unwrap());
    }

    #[test]
    fn test_identity_requires_same_type() {
        let mut engine = Engine::new();
        assert!(!is_identical(&mut engine, &Val::Int(1), &Val::Float(1.0)).unwrap());
        assert!(is_identical(&mut engine, &Val::string("a"), &Val::string("a")).unwrap());
        assert!(is_identical(&mut engine, &Val::Undef, &Val::Null).unwrap());
    }

    #[test]
    fn test_nan_is_never_equal() {
        assert!(!eq(Val::Float(f64::NAN), Val::Float(f64::NAN)));
    }

    #[test]
    fn test_objects() {
        let mut class = ClassDef::new(b"P", ClassFlags::empty());
        class.declare_property(b"v", PropFlags::PUBLIC, Val::Int(0));
        class.link(None).unwrap();
        let class = Rc::new(class);
        let a = ObjectData::new(1, class.clone()).into_ref();
        let b = ObjectData::new(2, class).into_ref();
        let mut engine = Engine::new();
        assert_eq!(compare_objects(&mut engine, &a, &b).unwrap(), 0);
        b.borrow_mut().write_property(b"v", Val::Int(3));
        assert_eq!(compare_objects(&mut engine, &a, &b).unwrap(), -1);
        let other = ObjectData::new(3, Rc::new(ClassDef::new(b"Q", ClassFlags::empty()))).into_ref();
        assert_eq!(compare_objects(&mut engine, &a, &other).unwrap(), 1);
        assert!(!is_identical(&mut engine, &Val::Object(a.clone()), &Val::Object(b)).unwrap());
        assert!(is_identical(&mut engine, &Val::Object(a.clone()), &Val::Object(a)).unwrap());
    }

    #[test]
    fn test_spaceship() {
        let mut engine = Engine::new();
        assert_eq!(spaceship(&mut engine, &Val::Int(1), &Val::Int(2)).unwrap(), Val::Int(-1));
        assert!(is_smaller(&mut engine, &Val::Int(1), &Val::Float(1.5)).unwrap());
        assert!(is_smaller_or_equal(&mut engine, &Val::Int(2), &Val::string("2")).unwrap());
    }
}
