//! Class resolution and declaration
//!
//! Resolves `Name`, `self`, `parent`, `static` and dynamic class references,
//! declares classes from their syntax, and fetches class constants and static
//! property slots.
//!
//! ## PHP Semantics
//!
//! - `self` is the class whose method is running, `static` the class the call
//!   was made through (late static binding)
//! - Constant and property default expressions are evaluated once, at
//!   declaration; `self::OTHER` may name a constant declared earlier in the
//!   same class
//! - A class is registered only after it links successfully
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_execute_API.c` - zend_fetch_class
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_class_decl
//! - Zend: `$PHP_SRC_PATH/Zend/zend_API.c` - zend_update_class_constants

use crate::ast::{ClassDecl, ClassMember, ClassRef};
use crate::core::value::Val;
use crate::runtime::class::{ClassDef, ClassFlags, PropFlags};
use crate::runtime::function::Function;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use indexmap::IndexMap;
use std::rc::Rc;

/// Constants of a class whose declaration is still being evaluated
#[derive(Debug)]
pub(crate) struct PendingClass {
    lc_name: Vec<u8>,
    parent: Option<Rc<ClassDef>>,
    constants: IndexMap<Vec<u8>, Val>,
}

impl<'ast> Executor<'ast> {
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute_API.c - zend_fetch_class
    pub(crate) fn resolve_class(&mut self, class: ClassRef<'ast>) -> Result<Rc<ClassDef>, VmError> {
        match class {
            ClassRef::Named(name) => self.lookup_class(name),
            ClassRef::SelfRef => self.frame().class_scope.clone().ok_or_else(|| {
                VmError::RuntimeError("Cannot use \"self\" when no class scope is active".into())
            }),
            ClassRef::Parent => {
                let scope = self.frame().class_scope.clone().ok_or_else(|| {
                    VmError::RuntimeError(
                        "Cannot use \"parent\" when no class scope is active".into(),
                    )
                })?;
                scope.parent.clone().ok_or_else(|| {
                    VmError::RuntimeError(
                        "Cannot use \"parent\" when current class scope has no parent".into(),
                    )
                })
            }
            ClassRef::Static => self.frame().static_class.clone().ok_or_else(|| {
                VmError::RuntimeError("Cannot use \"static\" when no class scope is active".into())
            }),
            ClassRef::Dynamic(expr) => match self.eval_expr(expr)?.deref() {
                Val::Object(obj) => Ok(obj.borrow().class.clone()),
                Val::String(name) => self.lookup_class(&name),
                _ => Err(VmError::RuntimeError(
                    "Cannot use value as class name: must be a valid object or a string".into(),
                )),
            },
        }
    }

    pub(crate) fn lookup_class(&self, name: &[u8]) -> Result<Rc<ClassDef>, VmError> {
        self.context
            .find_class(name)
            .ok_or_else(|| VmError::UndefinedClass {
                name: String::from_utf8_lossy(name).into_owned(),
            })
    }

    /// Lowercase class name for `instanceof`; a named class need not exist
    pub(crate) fn class_ref_lc_name(&mut self, class: ClassRef<'ast>) -> Result<Vec<u8>, VmError> {
        match class {
            ClassRef::Named(name) => Ok(name.to_ascii_lowercase()),
            ClassRef::Dynamic(expr) => match self.eval_expr(expr)?.deref() {
                Val::Object(obj) => Ok(obj.borrow().class.lc_name.clone()),
                Val::String(name) => Ok(name.to_ascii_lowercase()),
                _ => Err(VmError::RuntimeError(
                    "Class name must be a valid object or a string".into(),
                )),
            },
            other => Ok(self.resolve_class(other)?.lc_name.clone()),
        }
    }

    /// Declare a class from its syntax. Running the same node twice is a no-op.
    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_compile_class_decl
    pub(crate) fn declare_class(&mut self, decl: &'ast ClassDecl<'ast>) -> Result<(), VmError> {
        if self.is_declared(decl) {
            return Ok(());
        }
        if self.context.find_class(decl.name).is_some() {
            return Err(VmError::RuntimeError(format!(
                "Cannot declare class {}, because the name is already in use",
                String::from_utf8_lossy(decl.name)
            )));
        }
        let parent = match decl.parent {
            Some(name) => Some(self.lookup_class(name)?),
            None => None,
        };

        let mut flags = ClassFlags::empty();
        if decl.modifiers.is_abstract {
            flags |= ClassFlags::ABSTRACT;
        }
        if decl.modifiers.is_final {
            flags |= ClassFlags::FINAL;
        }
        if decl.modifiers.is_interface {
            flags |= ClassFlags::INTERFACE;
        }
        let mut class = ClassDef::new(decl.name, flags);

        for member in decl.members {
            if let ClassMember::Method {
                name,
                params,
                body,
                visibility,
                is_static,
            } = member
            {
                let mut func = Function::user(name, *params, *body);
                func.scope = Some(class.lc_name.clone());
                func.is_static = *is_static;
                let id = self.context.add_function(func);
                class.declare_method(name, id, *visibility, *is_static);
            }
        }

        let previous = self.pending_class.replace(PendingClass {
            lc_name: class.lc_name.clone(),
            parent: parent.clone(),
            constants: IndexMap::new(),
        });
        let evaluated = self.evaluate_class_members(decl, &mut class);
        self.pending_class = previous;
        evaluated?;
        class.flags |= ClassFlags::CONSTANTS_UPDATED;

        class.link(parent)?;
        self.context.declare_class(class);
        self.mark_declared(decl);
        Ok(())
    }

    /// Constants first, in order, then property defaults
    /// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_update_class_constants
    fn evaluate_class_members(
        &mut self,
        decl: &'ast ClassDecl<'ast>,
        class: &mut ClassDef,
    ) -> Result<(), VmError> {
        for member in decl.members {
            if let ClassMember::Const {
                name,
                value,
                visibility,
            } = member
            {
                let value = self.eval_expr(*value)?.deref();
                if let Some(pending) = self.pending_class.as_mut() {
                    pending.constants.insert(name.to_vec(), value.clone());
                }
                class.declare_constant(name, value, *visibility);
            }
        }

        for member in decl.members {
            if let ClassMember::Property {
                name,
                default,
                visibility,
                is_static,
                is_readonly,
            } = member
            {
                let mut flags = PropFlags::from_visibility(*visibility);
                if *is_static {
                    flags |= PropFlags::STATIC;
                }
                if *is_readonly {
                    flags |= PropFlags::READONLY;
                }
                let value = match default {
                    Some(expr) => self.eval_expr(*expr)?.deref(),
                    // Readonly properties start uninitialized
                    None if *is_readonly => Val::Undef,
                    None => Val::Null,
                };
                class.declare_property(name, flags, value);
            }
        }
        Ok(())
    }

    /// `A::NAME`, including `A::class`
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_FETCH_CLASS_CONSTANT
    pub(crate) fn class_constant(
        &mut self,
        class: ClassRef<'ast>,
        name: &[u8],
    ) -> Result<Val, VmError> {
        if name.eq_ignore_ascii_case(b"class") {
            if let ClassRef::Named(n) = class {
                return Ok(Val::string(n.to_vec()));
            }
            let resolved = self.resolve_class(class)?;
            return Ok(Val::string(resolved.name.clone()));
        }

        if let Some(value) = self.pending_constant(class, name) {
            return Ok(value);
        }

        let resolved = self.resolve_class(class)?;
        match resolved.find_constant(name) {
            Some(entry) => Ok(entry.value.clone()),
            None => Err(VmError::UndefinedConstant {
                name: format!(
                    "{}::{}",
                    resolved.name_lossy(),
                    String::from_utf8_lossy(name)
                ),
            }),
        }
    }

    /// Constant visible from inside a class declaration that is not registered yet
    fn pending_constant(&self, class: ClassRef<'ast>, name: &[u8]) -> Option<Val> {
        let pending = self.pending_class.as_ref()?;
        let inherited = || {
            pending
                .parent
                .as_ref()?
                .find_constant(name)
                .map(|entry| entry.value.clone())
        };
        match class {
            ClassRef::SelfRef | ClassRef::Static => {
                pending.constants.get(name).cloned().or_else(inherited)
            }
            ClassRef::Named(n) if n.eq_ignore_ascii_case(&pending.lc_name) => {
                pending.constants.get(name).cloned().or_else(inherited)
            }
            ClassRef::Parent => inherited(),
            _ => None,
        }
    }

    /// Owner class and slot offset of a declared static property
    pub(crate) fn static_property(
        &self,
        class: &Rc<ClassDef>,
        name: &[u8],
    ) -> Result<(Rc<ClassDef>, usize), VmError> {
        let info = class
            .find_property(name)
            .filter(|p| p.is_static())
            .ok_or_else(|| {
                VmError::RuntimeError(format!(
                    "Access to undeclared static property {}::${}",
                    class.name_lossy(),
                    String::from_utf8_lossy(name)
                ))
            })?;
        Ok((class.static_owner(info).clone(), info.offset))
    }
}
