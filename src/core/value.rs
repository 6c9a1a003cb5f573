use crate::core::array::ArrayData;
use crate::runtime::object::ObjectRef;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared mutable slot behind `$a =& $b`
pub type ValRef = Rc<RefCell<Val>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Runtime type tag used by the operators for type-pair dispatch.
/// Order matters: everything below `True` is falsy without inspection.
/// Reference: $PHP_SRC_PATH/Zend/zend_types.h - IS_UNDEF .. IS_REFERENCE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValType {
    Undef = 0,
    Null = 1,
    False = 2,
    True = 3,
    Long = 4,
    Double = 5,
    String = 6,
    Array = 7,
    Object = 8,
    Resource = 9,
    Reference = 10,
}

/// `(t1 << 8) | t2`, the key of every binary operator switch
#[inline]
pub const fn type_pair(t1: ValType, t2: ValType) -> u16 {
    ((t1 as u16) << 8) | (t2 as u16)
}

/// Opaque host resource (stream, handle, ...)
#[derive(Debug)]
pub struct ResourceData {
    pub handle: i64,
    pub type_tag: String,
}

#[derive(Debug, Clone, Default)]
pub enum Val {
    #[default]
    Undef,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<Vec<u8>>),  // PHP strings are byte arrays (COW)
    Array(Rc<ArrayData>), // COW: Rc::make_mut separates on first write
    Object(ObjectRef),
    Resource(Rc<ResourceData>),
    Reference(ValRef), // never wraps another Reference
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Undef, Val::Undef) => true,
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Float(a), Val::Float(b)) => a == b,
            (Val::String(a), Val::String(b)) => a == b,
            (Val::Array(a), Val::Array(b)) => Rc::ptr_eq(a, b) || a == b,
            (Val::Object(a), Val::Object(b)) => Rc::ptr_eq(a, b),
            (Val::Resource(a), Val::Resource(b)) => Rc::ptr_eq(a, b),
            (Val::Reference(a), Val::Reference(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            _ => false,
        }
    }
}

impl Val {
    pub fn string(bytes: impl Into<Vec<u8>>) -> Val {
        Val::String(Rc::new(bytes.into()))
    }

    pub fn array(data: ArrayData) -> Val {
        Val::Array(Rc::new(data))
    }

    pub fn empty_array() -> Val {
        Val::Array(Rc::new(ArrayData::new()))
    }

    /// Box a value into a fresh reference cell; an existing reference is reused.
    pub fn new_reference(v: Val) -> Val {
        match v {
            Val::Reference(r) => Val::Reference(r),
            Val::Undef => Val::Reference(Rc::new(RefCell::new(Val::Null))),
            other => Val::Reference(Rc::new(RefCell::new(other))),
        }
    }

    /// Read through a reference. Pure: never allocates a cell.
    pub fn deref(&self) -> Val {
        match self {
            Val::Reference(r) => r.borrow().clone(),
            v => v.clone(),
        }
    }

    pub fn val_type(&self) -> ValType {
        match self {
            Val::Undef => ValType::Undef,
            Val::Null => ValType::Null,
            Val::Bool(false) => ValType::False,
            Val::Bool(true) => ValType::True,
            Val::Int(_) => ValType::Long,
            Val::Float(_) => ValType::Double,
            Val::String(_) => ValType::String,
            Val::Array(_) => ValType::Array,
            Val::Object(_) => ValType::Object,
            Val::Resource(_) => ValType::Resource,
            Val::Reference(_) => ValType::Reference,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Val::Undef)
    }

    /// Null or absent, looking through references
    pub fn is_null(&self) -> bool {
        match self {
            Val::Undef | Val::Null => true,
            Val::Reference(r) => r.borrow().is_null(),
            _ => false,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Val::Reference(_))
    }

    pub fn as_array(&self) -> Option<&Rc<ArrayData>> {
        match self {
            Val::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Val::String(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    /// Type name as used in engine diagnostics ("int", "null", class name for objects)
    /// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_zval_type_name
    pub fn type_name(&self) -> String {
        match self {
            Val::Undef | Val::Null => "null".into(),
            Val::Bool(_) => "bool".into(),
            Val::Int(_) => "int".into(),
            Val::Float(_) => "float".into(),
            Val::String(_) => "string".into(),
            Val::Array(_) => "array".into(),
            Val::Object(o) => o.borrow().class_name_lossy(),
            Val::Resource(_) => "resource".into(),
            Val::Reference(r) => r.borrow().type_name(),
        }
    }

    /// Convert to boolean following zend_is_true.
    /// Objects are always truthy; callers with a cast hook consult it first.
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zend_is_true
    pub fn to_bool(&self) -> bool {
        match self {
            Val::Undef | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::String(s) => !(s.is_empty() || s.as_slice() == b"0"),
            Val::Array(arr) => !arr.is_empty(),
            Val::Object(_) => true,
            Val::Resource(r) => r.handle != 0,
            Val::Reference(r) => r.borrow().to_bool(),
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<f64> for Val {
    fn from(f: f64) -> Self {
        Val::Float(f)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::string(s.as_bytes())
    }
}

impl From<ArrayData> for Val {
    fn from(data: ArrayData) -> Self {
        Val::array(data)
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValType::Undef => "undef",
            ValType::Null => "null",
            ValType::False => "false",
            ValType::True => "true",
            ValType::Long => "int",
            ValType::Double => "float",
            ValType::String => "string",
            ValType::Array => "array",
            ValType::Object => "object",
            ValType::Resource => "resource",
            ValType::Reference => "reference",
        };
        f.write_str(name)
    }
}
