//! Object operations
//!
//! Instantiation, cloning, property access with the magic accessor fallbacks,
//! and conversions to object.
//!
//! ## PHP Semantics
//!
//! - `__get`/`__set`/`__isset`/`__unset` run only for properties that do not
//!   exist on the object
//! - While an accessor runs for a given object and property name, further
//!   access to that same name from inside it uses the plain property table
//! - Readonly properties may be initialized once and never unset
//! - `(object)` of an array yields a `stdClass` with one property per
//!   element; of a scalar, a `stdClass` with a `scalar` property
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_read_property,
//!   zend_std_write_property, zend_std_has_property, zend_std_unset_property
//! - Zend: `$PHP_SRC_PATH/Zend/zend_objects.c` - zend_objects_clone_obj
//! - Zend: `$PHP_SRC_PATH/Zend/zend_operators.c` - convert_to_object

use crate::ast::{ClassRef, ExprId};
use crate::core::value::Val;
use crate::runtime::class::{ClassFlags, PropFlags};
use crate::runtime::function::FunctionId;
use crate::runtime::object::{ObjectData, ObjectRef};
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MagicKind {
    Get,
    Set,
    Isset,
    Unset,
}

/// An accessor currently running for one object and property name
/// Reference: $PHP_SRC_PATH/Zend/zend_object_handlers.c - zend_get_property_guard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MagicGuard {
    handle: u64,
    name: Vec<u8>,
    kind: MagicKind,
}

impl<'ast> Executor<'ast> {
    /// `new Class(...)`
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_NEW
    pub(crate) fn instantiate(
        &mut self,
        class_ref: ClassRef<'ast>,
        args: &'ast [ExprId<'ast>],
    ) -> Result<Val, VmError> {
        let class = self.resolve_class(class_ref)?;
        if class.flags.contains(ClassFlags::INTERFACE) {
            return Err(VmError::RuntimeError(format!(
                "Cannot instantiate interface {}",
                class.name_lossy()
            )));
        }
        if class.flags.contains(ClassFlags::ABSTRACT) {
            return Err(VmError::RuntimeError(format!(
                "Cannot instantiate abstract class {}",
                class.name_lossy()
            )));
        }

        let obj = ObjectData::new(self.engine.next_object_handle(), class.clone()).into_ref();
        tracing::trace!(class = %class.name_lossy(), "instantiated object");
        if let Some(ctor) = class.magic.construct {
            let args = self.eval_args(Some(ctor), args)?;
            self.invoke(ctor, args, Some(obj.clone()), Some(class))?;
        }
        Ok(Val::Object(obj))
    }

    /// `clone $v`: shallow copy, then `__clone` on the copy
    pub(crate) fn clone_object(&mut self, value: &Val) -> Result<Val, VmError> {
        let Val::Object(obj) = value else {
            return Err(VmError::RuntimeError(
                "__clone method called on non-object".into(),
            ));
        };
        let handle = self.engine.next_object_handle();
        let copy = obj.borrow().duplicate(handle).into_ref();
        let hook = copy.borrow().class.magic.clone;
        if let Some(hook) = hook {
            self.call_method(&copy, hook, ArgList::new())?;
        }
        Ok(Val::Object(copy))
    }

    /// Object a property write goes to; anything else is an error
    pub(crate) fn fetch_object_for_write(
        &mut self,
        target: ExprId<'ast>,
        property: &[u8],
    ) -> Result<ObjectRef, VmError> {
        match self.eval_expr(target)? {
            Val::Object(obj) => Ok(obj),
            other => Err(VmError::RuntimeError(format!(
                "Attempt to assign property \"{}\" on {}",
                String::from_utf8_lossy(property),
                other.type_name()
            ))),
        }
    }

    /// Accessor to run for `name`, unless one is already running for it
    fn magic_for(&self, obj: &ObjectRef, kind: MagicKind, name: &[u8]) -> Option<(FunctionId, MagicGuard)> {
        let data = obj.borrow();
        let func = match kind {
            MagicKind::Get => data.class.magic.get,
            MagicKind::Set => data.class.magic.set,
            MagicKind::Isset => data.class.magic.isset,
            MagicKind::Unset => data.class.magic.unset,
        }?;
        let guard = MagicGuard {
            handle: data.handle,
            name: name.to_vec(),
            kind,
        };
        (!self.magic_guards.contains(&guard)).then_some((func, guard))
    }

    fn call_magic(
        &mut self,
        obj: &ObjectRef,
        func: FunctionId,
        guard: MagicGuard,
        args: ArgList,
    ) -> Result<Val, VmError> {
        self.magic_guards.insert(guard.clone());
        let result = self.call_method(obj, func, args);
        self.magic_guards.remove(&guard);
        result
    }

    pub(crate) fn readonly_flag(obj: &ObjectRef, name: &[u8]) -> bool {
        obj.borrow()
            .class
            .find_property(name)
            .is_some_and(|p| !p.is_static() && p.flags.contains(PropFlags::READONLY))
    }

    /// `$obj->name` for reading
    pub(crate) fn read_property(&mut self, obj: &ObjectRef, name: &[u8]) -> Result<Val, VmError> {
        let found = obj.borrow().read_property(name).map(Val::deref);
        if let Some(value) = found {
            return Ok(value);
        }
        if let Some((getter, guard)) = self.magic_for(obj, MagicKind::Get, name) {
            let mut args = ArgList::new();
            args.push(Val::string(name));
            return self.call_magic(obj, getter, guard, args);
        }
        if Self::readonly_flag(obj, name) {
            return Err(VmError::RuntimeError(format!(
                "Typed property {}::${} must not be accessed before initialization",
                obj.borrow().class_name_lossy(),
                String::from_utf8_lossy(name)
            )));
        }
        self.engine.warning(&format!(
            "Undefined property: {}::${}",
            obj.borrow().class_name_lossy(),
            String::from_utf8_lossy(name)
        ));
        Ok(Val::Null)
    }

    /// `$obj->name = value`
    pub(crate) fn write_property(
        &mut self,
        obj: &ObjectRef,
        name: &[u8],
        value: Val,
    ) -> Result<(), VmError> {
        let exists = obj.borrow().has_property(name);
        if !exists {
            if let Some((setter, guard)) = self.magic_for(obj, MagicKind::Set, name) {
                let mut args = ArgList::new();
                args.push(Val::string(name));
                args.push(value);
                self.call_magic(obj, setter, guard, args)?;
                return Ok(());
            }
        } else if Self::readonly_flag(obj, name) {
            return Err(readonly_modified(obj, name));
        }
        let mut data = obj.try_borrow_mut().map_err(|_| {
            VmError::RuntimeError("Cannot modify an object while it is being modified".into())
        })?;
        data.write_property(name, value);
        Ok(())
    }

    /// `unset($obj->name)`
    pub(crate) fn unset_property(&mut self, obj: &ObjectRef, name: &[u8]) -> Result<(), VmError> {
        let exists = obj.borrow().has_property(name);
        if exists {
            if Self::readonly_flag(obj, name) {
                return Err(VmError::RuntimeError(format!(
                    "Cannot unset readonly property {}::${}",
                    obj.borrow().class_name_lossy(),
                    String::from_utf8_lossy(name)
                )));
            }
            obj.borrow_mut().unset_property(name);
            return Ok(());
        }
        if let Some((unsetter, guard)) = self.magic_for(obj, MagicKind::Unset, name) {
            let mut args = ArgList::new();
            args.push(Val::string(name));
            self.call_magic(obj, unsetter, guard, args)?;
        }
        Ok(())
    }

    /// Property value for isset/empty/`??`: `None` when it does not exist.
    /// A missing property asks `__isset`, then `__get` for the value.
    pub(crate) fn property_quiet(
        &mut self,
        obj: &ObjectRef,
        name: &[u8],
    ) -> Result<Option<Val>, VmError> {
        let found = obj.borrow().read_property(name).map(Val::deref);
        if found.is_some() {
            return Ok(found);
        }
        let Some((isset, guard)) = self.magic_for(obj, MagicKind::Isset, name) else {
            return Ok(None);
        };
        let mut args = ArgList::new();
        args.push(Val::string(name));
        if !self.call_magic(obj, isset, guard, args)?.to_bool() {
            return Ok(None);
        }
        match self.magic_for(obj, MagicKind::Get, name) {
            Some((getter, guard)) => {
                let mut args = ArgList::new();
                args.push(Val::string(name));
                self.call_magic(obj, getter, guard, args).map(Some)
            }
            None => Ok(Some(Val::Bool(true))),
        }
    }

    /// `(object)` cast
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - convert_to_object
    pub(crate) fn to_object(&mut self, value: Val) -> Result<Val, VmError> {
        if let Val::Object(_) = value {
            return Ok(value);
        }
        let class = self.lookup_class(b"stdClass")?;
        let mut obj = ObjectData::new(self.engine.next_object_handle(), class);
        match value {
            Val::Array(arr) => {
                for (key, v) in arr.iter() {
                    obj.dynamic.insert(key.to_bytes(), v.clone());
                }
            }
            Val::Undef | Val::Null => {}
            scalar => {
                obj.dynamic.insert(b"scalar".to_vec(), scalar);
            }
        }
        Ok(Val::Object(obj.into_ref()))
    }
}

/// Error for a write that would change a readonly property
pub(crate) fn readonly_modified(obj: &ObjectRef, name: &[u8]) -> VmError {
    VmError::RuntimeError(format!(
        "Cannot modify readonly property {}::${}",
        obj.borrow().class_name_lossy(),
        String::from_utf8_lossy(name)
    ))
}
