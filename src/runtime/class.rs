//! Class definitions and linking
//!
//! ## PHP Semantics
//!
//! A class owns its property, method and constant tables. Inheritance is
//! resolved once by [`ClassDef::link`]:
//! - Inherited properties come first in parent order, then the class's own
//! - Instance and static properties are numbered separately
//! - A redeclared property keeps the parent's slot
//! - Methods, constants and magic-method slots the class does not redeclare
//!   are copied down from the parent
//!
//! Property and method names are case-insensitive in the class tables.
//! Constant names are case-sensitive.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_inheritance.c` - zend_do_inheritance
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_add_magic_method

use crate::core::value::{Val, Visibility};
use crate::runtime::function::FunctionId;
use crate::vm::engine::VmError;
use bitflags::bitflags;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

bitflags! {
    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.h - ZEND_ACC_* (class flags)
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ClassFlags: u32 {
        const ABSTRACT = 1 << 0;
        const FINAL = 1 << 1;
        const INTERFACE = 1 << 2;
        const TRAIT = 1 << 3;
        const LINKED = 1 << 4;
        const CONSTANTS_UPDATED = 1 << 5;
    }
}

bitflags! {
    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.h - ZEND_ACC_* (property flags)
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct PropFlags: u32 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const READONLY = 1 << 4;
    }
}

impl PropFlags {
    pub fn from_visibility(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Public => PropFlags::PUBLIC,
            Visibility::Protected => PropFlags::PROTECTED,
            Visibility::Private => PropFlags::PRIVATE,
        }
    }

    pub fn visibility(self) -> Visibility {
        if self.contains(PropFlags::PRIVATE) {
            Visibility::Private
        } else if self.contains(PropFlags::PROTECTED) {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyInfo {
    /// Name as declared
    pub name: Vec<u8>,
    pub flags: PropFlags,
    pub declared_type: Option<Vec<u8>>,
    /// Slot index, assigned at link time
    pub offset: usize,
    pub default: Val,
    /// Lowercase name of the declaring class
    pub declaring_class: Vec<u8>,
}

impl PropertyInfo {
    pub fn is_static(&self) -> bool {
        self.flags.contains(PropFlags::STATIC)
    }
}

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: Vec<u8>,
    pub func: FunctionId,
    pub visibility: Visibility,
    pub is_static: bool,
    pub declaring_class: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConstantEntry {
    pub value: Val,
    pub visibility: Visibility,
}

/// Magic methods resolved by name when declared
/// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_add_magic_method
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicMethods {
    pub construct: Option<FunctionId>,
    pub destruct: Option<FunctionId>,
    pub get: Option<FunctionId>,
    pub set: Option<FunctionId>,
    pub isset: Option<FunctionId>,
    pub unset: Option<FunctionId>,
    pub call: Option<FunctionId>,
    pub call_static: Option<FunctionId>,
    pub to_string: Option<FunctionId>,
    pub clone: Option<FunctionId>,
}

impl MagicMethods {
    fn slot_mut(&mut self, lc_name: &[u8]) -> Option<&mut Option<FunctionId>> {
        Some(match lc_name {
            b"__construct" => &mut self.construct,
            b"__destruct" => &mut self.destruct,
            b"__get" => &mut self.get,
            b"__set" => &mut self.set,
            b"__isset" => &mut self.isset,
            b"__unset" => &mut self.unset,
            b"__call" => &mut self.call,
            b"__callstatic" => &mut self.call_static,
            b"__tostring" => &mut self.to_string,
            b"__clone" => &mut self.clone,
            _ => return None,
        })
    }

    fn inherit(&mut self, parent: &MagicMethods) {
        let pairs = [
            (&mut self.construct, parent.construct),
            (&mut self.destruct, parent.destruct),
            (&mut self.get, parent.get),
            (&mut self.set, parent.set),
            (&mut self.isset, parent.isset),
            (&mut self.unset, parent.unset),
            (&mut self.call, parent.call),
            (&mut self.call_static, parent.call_static),
            (&mut self.to_string, parent.to_string),
            (&mut self.clone, parent.clone),
        ];
        for (slot, inherited) in pairs {
            if slot.is_none() {
                *slot = inherited;
            }
        }
    }
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: Vec<u8>,
    pub lc_name: Vec<u8>,
    pub flags: ClassFlags,
    pub parent: Option<Rc<ClassDef>>,
    /// Keyed by lowercase property name
    pub properties: IndexMap<Vec<u8>, PropertyInfo>,
    /// Keyed by lowercase method name
    pub methods: IndexMap<Vec<u8>, MethodEntry>,
    pub constants: IndexMap<Vec<u8>, ConstantEntry>,
    pub magic: MagicMethods,
    /// Instance slot defaults, indexed by `PropertyInfo::offset`
    pub default_properties: Vec<Val>,
    /// Static slots, indexed by `PropertyInfo::offset`
    pub static_members: RefCell<Vec<Val>>,
}

impl ClassDef {
    pub fn new(name: &[u8], flags: ClassFlags) -> Self {
        Self {
            name: name.to_vec(),
            lc_name: name.to_ascii_lowercase(),
            flags,
            parent: None,
            properties: IndexMap::new(),
            methods: IndexMap::new(),
            constants: IndexMap::new(),
            magic: MagicMethods::default(),
            default_properties: Vec::new(),
            static_members: RefCell::new(Vec::new()),
        }
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn is_linked(&self) -> bool {
        self.flags.contains(ClassFlags::LINKED)
    }

    pub fn declare_property(&mut self, name: &[u8], flags: PropFlags, default: Val) {
        let info = PropertyInfo {
            name: name.to_vec(),
            flags,
            declared_type: None,
            offset: 0,
            default,
            declaring_class: self.lc_name.clone(),
        };
        self.properties.insert(name.to_ascii_lowercase(), info);
    }

    /// Register a method, filling the magic slot when the name is reserved.
    pub fn declare_method(
        &mut self,
        name: &[u8],
        func: FunctionId,
        visibility: Visibility,
        is_static: bool,
    ) {
        let lc = name.to_ascii_lowercase();
        if let Some(slot) = self.magic.slot_mut(&lc) {
            *slot = Some(func);
        }
        self.methods.insert(
            lc,
            MethodEntry {
                name: name.to_vec(),
                func,
                visibility,
                is_static,
                declaring_class: self.lc_name.clone(),
            },
        );
    }

    pub fn declare_constant(&mut self, name: &[u8], value: Val, visibility: Visibility) {
        self.constants
            .insert(name.to_vec(), ConstantEntry { value, visibility });
    }

    /// Resolve inheritance and assign property slots. Re-linking is a no-op.
    /// Reference: $PHP_SRC_PATH/Zend/zend_inheritance.c - zend_do_inheritance
    pub fn link(&mut self, parent: Option<Rc<ClassDef>>) -> Result<(), VmError> {
        if self.is_linked() {
            return Ok(());
        }

        let own_properties = std::mem::take(&mut self.properties);
        let mut properties = IndexMap::with_capacity(own_properties.len());

        if let Some(parent) = &parent {
            if parent.flags.contains(ClassFlags::FINAL) {
                return Err(VmError::RuntimeError(format!(
                    "Class {} cannot extend final class {}",
                    self.name_lossy(),
                    parent.name_lossy()
                )));
            }
            if parent.flags.contains(ClassFlags::INTERFACE) {
                return Err(VmError::RuntimeError(format!(
                    "Class {} cannot extend interface {}",
                    self.name_lossy(),
                    parent.name_lossy()
                )));
            }

            for (lc, info) in &parent.properties {
                properties.insert(lc.clone(), info.clone());
            }
            for (name, constant) in &parent.constants {
                if !self.constants.contains_key(name) {
                    self.constants.insert(name.clone(), constant.clone());
                }
            }
            for (lc, method) in &parent.methods {
                if !self.methods.contains_key(lc) {
                    self.methods.insert(lc.clone(), method.clone());
                }
            }
            self.magic.inherit(&parent.magic);
        }

        // Redeclared names keep their inherited position
        for (lc, info) in own_properties {
            properties.insert(lc, info);
        }

        let mut instance_count = 0;
        let mut static_count = 0;
        for info in properties.values_mut() {
            if info.is_static() {
                info.offset = static_count;
                static_count += 1;
            } else {
                info.offset = instance_count;
                instance_count += 1;
            }
        }

        let mut defaults = vec![Val::Null; instance_count];
        let mut statics = vec![Val::Null; static_count];
        for info in properties.values() {
            if info.is_static() {
                statics[info.offset] = info.default.clone();
            } else {
                defaults[info.offset] = info.default.clone();
            }
        }

        tracing::debug!(
            class = %self.name_lossy(),
            parent = ?parent.as_ref().map(|p| p.name_lossy()),
            instance_slots = instance_count,
            static_slots = static_count,
            "linked class"
        );

        self.properties = properties;
        self.default_properties = defaults;
        self.static_members = RefCell::new(statics);
        self.parent = parent;
        self.flags |= ClassFlags::LINKED;
        Ok(())
    }

    pub fn find_property(&self, name: &[u8]) -> Option<&PropertyInfo> {
        self.properties.get(&name.to_ascii_lowercase())
    }

    pub fn find_method(&self, name: &[u8]) -> Option<&MethodEntry> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    /// Constant lookup; inherited constants were copied in at link time
    pub fn find_constant(&self, name: &[u8]) -> Option<&ConstantEntry> {
        self.constants.get(name)
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - instanceof_function
    pub fn instance_of(&self, lc_target: &[u8]) -> bool {
        if self.lc_name == lc_target {
            return true;
        }
        let mut current = self.parent.as_deref();
        while let Some(class) = current {
            if class.lc_name == lc_target {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }

    /// The class in this chain whose static slots hold `info`
    pub fn static_owner<'a>(self: &'a Rc<Self>, info: &PropertyInfo) -> &'a Rc<ClassDef> {
        let mut current = self;
        loop {
            if current.lc_name == info.declaring_class {
                return current;
            }
            match &current.parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    pub fn read_static(self: &Rc<Self>, name: &[u8]) -> Option<Val> {
        let info = self.find_property(name).filter(|p| p.is_static())?;
        let owner = self.static_owner(info);
        owner.static_members.borrow().get(info.offset).cloned()
    }

    /// Write a static slot; returns false when no such static exists
    pub fn write_static(self: &Rc<Self>, name: &[u8], value: Val) -> bool {
        let Some(info) = self.find_property(name).filter(|p| p.is_static()) else {
            return false;
        };
        let owner = self.static_owner(info);
        let mut statics = owner.static_members.borrow_mut();
        match statics.get_mut(info.offset) {
            Some(slot) => {
                match slot {
                    Val::Reference(r) => *r.borrow_mut() = value,
                    other => *other = value,
                }
                true
            }
            None => false,
        }
    }
}

/// Property name as exposed to array casts and serialization
/// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_mangle_property_name
pub fn mangle_property_name(info: &PropertyInfo, class_name: &[u8]) -> Vec<u8> {
    match info.flags.visibility() {
        Visibility::Public => info.name.clone(),
        Visibility::Protected => {
            let mut out = b"\0*\0".to_vec();
            out.extend_from_slice(&info.name);
            out
        }
        Visibility::Private => {
            let mut out = Vec::with_capacity(class_name.len() + info.name.len() + 2);
            out.push(0);
            out.extend_from_slice(class_name);
            out.push(0);
            out.extend_from_slice(&info.name);
            out
        }
    }
}
