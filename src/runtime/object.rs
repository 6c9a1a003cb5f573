//! Object instances
//!
//! An object holds one slot per declared instance property (indexed by the
//! offset assigned at link time) plus an ordered map of dynamic properties.
//! Declared slots set to `Undef` have been unset and read as missing.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_read_property
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_get_properties_for

use crate::core::array::{ArrayData, ArrayKey};
use crate::core::value::Val;
use crate::runtime::class::{ClassDef, mangle_property_name};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<RefCell<ObjectData>>;

/// Why a caller wants the property table
/// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.h - zend_prop_purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Debug,
    ArrayCast,
    Serialize,
    VarExport,
    Json,
}

impl Purpose {
    fn mangles(self) -> bool {
        matches!(self, Purpose::ArrayCast | Purpose::Serialize)
    }
}

pub struct ObjectData {
    pub handle: u64,
    pub class: Rc<ClassDef>,
    pub slots: Vec<Val>,
    pub dynamic: IndexMap<Vec<u8>, Val>,
    /// Recursion guard for deep comparison and printing
    protected: Cell<bool>,
}

impl ObjectData {
    /// Fresh instance with declared defaults; the constructor is the caller's job
    pub fn new(handle: u64, class: Rc<ClassDef>) -> Self {
        let slots = class.default_properties.clone();
        Self {
            handle,
            class,
            slots,
            dynamic: IndexMap::new(),
            protected: Cell::new(false),
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn class_name_lossy(&self) -> String {
        self.class.name_lossy()
    }

    fn declared_offset(&self, name: &[u8]) -> Option<usize> {
        self.class
            .find_property(name)
            .filter(|p| !p.is_static())
            .map(|p| p.offset)
    }

    /// Declared slot first (case-insensitive), then the dynamic map.
    pub fn read_property(&self, name: &[u8]) -> Option<&Val> {
        if let Some(offset) = self.declared_offset(name) {
            if let Some(slot) = self.slots.get(offset).filter(|v| !v.is_undef()) {
                return Some(slot);
            }
            return None;
        }
        self.dynamic.get(name)
    }

    /// Mutable access to an existing property; `create` adds a missing one as null
    pub fn property_mut(&mut self, name: &[u8], create: bool) -> Option<&mut Val> {
        if let Some(offset) = self.declared_offset(name) {
            let slot = self.slots.get_mut(offset)?;
            if slot.is_undef() {
                if !create {
                    return None;
                }
                *slot = Val::Null;
            }
            return Some(slot);
        }
        if create {
            Some(self.dynamic.entry(name.to_vec()).or_insert(Val::Null))
        } else {
            self.dynamic.get_mut(name)
        }
    }

    /// Assign through an existing reference rather than rebinding it
    pub fn write_property(&mut self, name: &[u8], value: Val) {
        if let Some(slot) = self.property_mut(name, true) {
            match slot {
                Val::Reference(r) => *r.borrow_mut() = value,
                other => *other = value,
            }
        }
    }

    pub fn has_property(&self, name: &[u8]) -> bool {
        self.read_property(name).is_some()
    }

    pub fn unset_property(&mut self, name: &[u8]) {
        if let Some(offset) = self.declared_offset(name) {
            if let Some(slot) = self.slots.get_mut(offset) {
                *slot = Val::Undef;
            }
        } else {
            self.dynamic.shift_remove(name);
        }
    }

    /// Whether `name` is a declared instance property (set or unset)
    pub fn is_declared(&self, name: &[u8]) -> bool {
        self.declared_offset(name).is_some()
    }

    /// Visible properties in slot order, then dynamic ones in insertion order
    pub fn properties_for(&self, purpose: Purpose) -> ArrayData {
        let mut out = ArrayData::with_capacity(self.slots.len() + self.dynamic.len());
        for info in self.class.properties.values().filter(|p| !p.is_static()) {
            let Some(value) = self.slots.get(info.offset).filter(|v| !v.is_undef()) else {
                continue;
            };
            let name = if purpose.mangles() {
                let declaring = self.declaring_name(&info.declaring_class);
                mangle_property_name(info, &declaring)
            } else {
                info.name.clone()
            };
            out.update(ArrayKey::str(name), value.clone());
        }
        for (name, value) in &self.dynamic {
            out.update(ArrayKey::numeric(name), value.clone());
        }
        out
    }

    fn declaring_name(&self, lc_name: &[u8]) -> Vec<u8> {
        let mut current = Some(&self.class);
        while let Some(class) = current {
            if class.lc_name == lc_name {
                return class.name.clone();
            }
            current = class.parent.as_ref();
        }
        self.class.name.clone()
    }

    /// Shallow copy for `clone`: same class, copied slots, new handle
    pub fn duplicate(&self, handle: u64) -> Self {
        Self {
            handle,
            class: self.class.clone(),
            slots: self.slots.clone(),
            dynamic: self.dynamic.clone(),
            protected: Cell::new(false),
        }
    }

    pub fn protect(&self) {
        self.protected.set(true);
    }

    pub fn unprotect(&self) {
        self.protected.set(false);
    }

    pub fn is_protected(&self) -> bool {
        self.protected.get()
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class_name_lossy())
            .field("handle", &self.handle)
            .field("properties", &self.properties_for(Purpose::Debug))
            .finish()
    }
}
