//! Variable operations module
//!
//! Reads, writes and reference bindings of storage locations.
//!
//! ## PHP Variable Semantics
//!
//! - Variables are created on first assignment
//! - Undefined variables produce a warning and read as null
//! - Writing through `$a[..]` creates missing arrays on the way (autovivification)
//! - Assigning onto a slot bound by reference writes through the reference;
//!   `=&` rebinds the slot instead
//!
//! ## Operations
//!
//! - **resolve_place**: evaluate the dimension and object parts of an lvalue
//!   once, producing a [`Place`]
//! - **with_place**: run a closure on the slot a place names, creating it on demand
//! - **assign_place** / **bind_ref** / **make_ref**: value and reference writes
//! - **unset_expr**, **bind_global**, **bind_static**, **destructure**
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_execute.c` - zend_fetch_dimension_address_W,
//!   zend_assign_to_variable, zend_assign_to_variable_reference
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_BIND_GLOBAL, ZEND_BIND_STATIC

use crate::ast::{Expr, ExprId, ListItem, StaticVar};
use crate::core::array::ArrayKey;
use crate::core::value::{Val, ValRef};
use crate::runtime::class::ClassDef;
use crate::runtime::object::ObjectRef;
use crate::vm::array_access::{next_element_occupied, undefined_key_message};
use crate::vm::engine::{Engine, VmError};
use crate::vm::executor::Executor;
use crate::vm::object_helpers::readonly_modified;
use crate::vm::type_conversion::{to_array_key, to_string_bytes};
use std::cell::RefCell;
use std::rc::Rc;

/// One `[...]` step of an lvalue
#[derive(Debug, Clone)]
pub(crate) enum Dim {
    Key(ArrayKey),
    Append,
}

#[derive(Debug, Clone)]
pub(crate) enum PlaceBase<'ast> {
    Var(&'ast [u8]),
    Property(ObjectRef, Vec<u8>),
    /// Owning class and slot offset of a static property
    Static(Rc<ClassDef>, usize),
    /// Function results and other temporaries; writes are discarded
    Temp(Val),
}

/// An lvalue with every sub-expression already evaluated
#[derive(Debug, Clone)]
pub(crate) struct Place<'ast> {
    pub base: PlaceBase<'ast>,
    pub dims: Vec<Dim>,
}

impl<'ast> Place<'ast> {
    fn new(base: PlaceBase<'ast>) -> Self {
        Self {
            base,
            dims: Vec::new(),
        }
    }
}

fn busy() -> VmError {
    VmError::RuntimeError("Cannot modify a value while it is being modified".into())
}

/// Store into a slot, writing through a reference binding
pub(crate) fn assign_into(slot: &mut Val, value: Val) -> Result<(), VmError> {
    match slot {
        Val::Reference(cell) => {
            *cell.try_borrow_mut().map_err(|_| busy())? = value;
        }
        other => *other = value,
    }
    Ok(())
}

/// Turn a slot into a reference binding (if it is not one yet) and return the cell
pub(crate) fn make_ref_slot(slot: &mut Val) -> ValRef {
    if let Val::Reference(cell) = slot {
        return cell.clone();
    }
    let value = match std::mem::take(slot) {
        Val::Undef => Val::Null,
        v => v,
    };
    let cell = Rc::new(RefCell::new(value));
    *slot = Val::Reference(cell.clone());
    cell
}

/// Walk `dims` below `slot` and hand the final slot to `f`.
///
/// `fresh` tells `f` whether the final slot was just created. With `create`
/// unset nothing is added and a missing step yields `Ok(None)`.
/// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_fetch_dimension_address_inner
fn with_slot<R, F>(
    engine: &mut Engine,
    slot: &mut Val,
    dims: &[Dim],
    create: bool,
    fresh: bool,
    f: F,
) -> Result<Option<R>, VmError>
where
    F: FnOnce(&mut Engine, &mut Val, bool) -> Result<R, VmError>,
{
    let Some((dim, rest)) = dims.split_first() else {
        return f(engine, slot, fresh).map(Some);
    };

    if let Val::Reference(cell) = slot {
        let cell = cell.clone();
        let mut inner = cell.try_borrow_mut().map_err(|_| busy())?;
        return with_slot(engine, &mut inner, dims, create, fresh, f);
    }

    match slot {
        Val::Undef | Val::Null => {
            if !create {
                return Ok(None);
            }
            *slot = Val::empty_array();
        }
        Val::Bool(false) => {
            if !create {
                return Ok(None);
            }
            engine.deprecated("Automatic conversion of false to array is deprecated");
            *slot = Val::empty_array();
        }
        Val::Array(_) => {}
        Val::String(_) => {
            return Err(VmError::RuntimeError(
                "Cannot use string offset as an array".into(),
            ));
        }
        Val::Object(obj) => {
            return Err(VmError::RuntimeError(format!(
                "Cannot use object of type {} as array",
                obj.borrow().class_name_lossy()
            )));
        }
        _ => {
            return Err(VmError::RuntimeError(
                "Cannot use a scalar value as an array".into(),
            ));
        }
    }
    let Val::Array(arr) = slot else {
        unreachable!("slot was just made an array");
    };

    if !create {
        match dim {
            Dim::Append => return Ok(None),
            Dim::Key(key) if !arr.exists(key) => return Ok(None),
            Dim::Key(_) => {}
        }
    }
    if Rc::strong_count(arr) > 1 {
        tracing::trace!(len = arr.len(), "separating shared array before write");
    }
    let data = Rc::make_mut(arr);

    let (child, inserted) = match dim {
        Dim::Append => {
            let idx = data.append(Val::Null).ok_or_else(next_element_occupied)?;
            let (child, _) = data.entry_mut(ArrayKey::Int(idx));
            (child, true)
        }
        Dim::Key(key) => data.entry_mut(key.clone()),
    };
    with_slot(engine, child, rest, create, inserted, f)
}

/// `$str[n] = v`: overwrite one byte, padding with spaces past the end
/// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_assign_to_string_offset
fn assign_string_offset(
    engine: &mut Engine,
    container: &mut Val,
    dim: &Dim,
    value: &Val,
) -> Result<(), VmError> {
    let Val::String(s) = container else {
        unreachable!("caller checked for a string");
    };
    let offset = match dim {
        Dim::Append => {
            return Err(VmError::RuntimeError(
                "[] operator not supported for strings".into(),
            ));
        }
        Dim::Key(ArrayKey::Int(i)) => *i,
        Dim::Key(ArrayKey::Str(_)) => {
            return Err(VmError::TypeError(
                "Cannot access offset of type string on string".into(),
            ));
        }
    };
    let len = s.len() as i64;
    let pos = if offset < 0 { offset + len } else { offset };
    if pos < 0 {
        engine.warning(&format!("Illegal string offset {}", offset));
        return Ok(());
    }

    let bytes = to_string_bytes(engine, value);
    let Some(&first) = bytes.first() else {
        return Err(VmError::RuntimeError(
            "Cannot assign an empty string to a string offset".into(),
        ));
    };
    if bytes.len() > 1 {
        engine.warning("Only the first byte will be assigned to the string offset");
    }

    let buf = Rc::make_mut(s);
    let pos = pos as usize;
    if pos >= buf.len() {
        buf.resize(pos + 1, b' ');
    }
    buf[pos] = first;
    Ok(())
}

/// Write the last dimension of an assignment into its container
fn assign_dim(engine: &mut Engine, container: &mut Val, dim: &Dim, value: Val) -> Result<(), VmError> {
    match container {
        Val::Reference(cell) => {
            let cell = cell.clone();
            let mut inner = cell.try_borrow_mut().map_err(|_| busy())?;
            assign_dim(engine, &mut inner, dim, value)
        }
        Val::String(_) => assign_string_offset(engine, container, dim, &value),
        _ => with_slot(
            engine,
            container,
            std::slice::from_ref(dim),
            true,
            false,
            |_, slot, _| assign_into(slot, value),
        )
        .map(|_| ()),
    }
}

fn unset_dim(container: &mut Val, dim: &Dim) -> Result<(), VmError> {
    match container {
        Val::Reference(cell) => {
            let cell = cell.clone();
            let mut inner = cell.try_borrow_mut().map_err(|_| busy())?;
            unset_dim(&mut inner, dim)
        }
        Val::Array(arr) => {
            let Dim::Key(key) = dim else {
                return Err(VmError::RuntimeError("Cannot use [] for unsetting".into()));
            };
            if arr.exists(key) {
                Rc::make_mut(arr).delete(key);
            }
            Ok(())
        }
        Val::String(_) => Err(VmError::RuntimeError("Cannot unset string offsets".into())),
        Val::Object(obj) => Err(VmError::RuntimeError(format!(
            "Cannot use object of type {} as array",
            obj.borrow().class_name_lossy()
        ))),
        _ => Ok(()),
    }
}

impl<'ast> Executor<'ast> {
    /// Value of `$name`, warning when it is undefined
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zval_undefined_cv
    pub(crate) fn read_variable(&mut self, name: &[u8]) -> Val {
        if let Some(v) = self.read_variable_quiet(name) {
            return v;
        }
        self.engine.warning(&format!(
            "Undefined variable ${}",
            String::from_utf8_lossy(name)
        ));
        Val::Null
    }

    pub(crate) fn read_variable_quiet(&self, name: &[u8]) -> Option<Val> {
        if name == b"this" {
            if let Some(this) = &self.frame().this {
                return Some(Val::Object(this.clone()));
            }
        }
        self.frame().lookup(name)
    }

    /// Evaluate the parts of an lvalue, left to right
    pub(crate) fn resolve_place(&mut self, expr: ExprId<'ast>) -> Result<Place<'ast>, VmError> {
        match expr {
            Expr::Variable { name, .. } => {
                if *name == b"this" {
                    return Err(VmError::RuntimeError("Cannot re-assign $this".into()));
                }
                Ok(Place::new(PlaceBase::Var(*name)))
            }
            Expr::ArrayDimFetch { array, dim, .. } => {
                let mut place = self.resolve_place(array)?;
                let dim = match dim {
                    Some(dim) => {
                        let key = self.eval_expr(dim)?;
                        Dim::Key(to_array_key(&mut self.engine, &key)?)
                    }
                    None => Dim::Append,
                };
                place.dims.push(dim);
                Ok(place)
            }
            Expr::PropertyFetch {
                target, property, ..
            } => {
                let obj = self.fetch_object_for_write(target, property)?;
                Ok(Place::new(PlaceBase::Property(obj, property.to_vec())))
            }
            Expr::StaticPropertyFetch {
                class, property, ..
            } => {
                let class = self.resolve_class(*class)?;
                let (owner, offset) = self.static_property(&class, property)?;
                Ok(Place::new(PlaceBase::Static(owner, offset)))
            }
            other => Ok(Place::new(PlaceBase::Temp(self.eval_expr(other)?))),
        }
    }

    /// Run `f` on the slot `base` + `dims` names. `Ok(None)` when `create` is
    /// unset and the slot does not exist.
    pub(crate) fn with_place<R, F>(
        &mut self,
        base: &PlaceBase<'ast>,
        dims: &[Dim],
        create: bool,
        f: F,
    ) -> Result<Option<R>, VmError>
    where
        F: FnOnce(&mut Engine, &mut Val, bool) -> Result<R, VmError>,
    {
        match base {
            PlaceBase::Var(name) => {
                let Executor {
                    engine,
                    frames,
                    globals,
                    ..
                } = self;
                let frame = match frames.last_mut() {
                    Some(frame) => frame,
                    None => globals,
                };
                let slot = if create {
                    frame.locals.entry(name.to_vec()).or_insert(Val::Undef)
                } else {
                    match frame.locals.get_mut(*name) {
                        Some(slot) => slot,
                        None => return Ok(None),
                    }
                };
                let fresh = slot.is_undef();
                with_slot(engine, slot, dims, create, fresh, f)
            }
            PlaceBase::Property(obj, name) => {
                // Every place write is indirect; only plain assignment may initialize
                if Self::readonly_flag(obj, name) {
                    return Err(readonly_modified(obj, name));
                }
                let mut data = obj.try_borrow_mut().map_err(|_| busy())?;
                let fresh = !data.has_property(name);
                let Some(slot) = data.property_mut(name, create) else {
                    return Ok(None);
                };
                with_slot(&mut self.engine, slot, dims, create, fresh, f)
            }
            PlaceBase::Static(owner, offset) => {
                let mut statics = owner.static_members.try_borrow_mut().map_err(|_| busy())?;
                let Some(slot) = statics.get_mut(*offset) else {
                    return Ok(None);
                };
                with_slot(&mut self.engine, slot, dims, create, false, f)
            }
            PlaceBase::Temp(value) => {
                let mut tmp = value.clone();
                with_slot(&mut self.engine, &mut tmp, dims, create, false, f)
            }
        }
    }

    /// Assign a value, handling string offsets in the last dimension
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_assign_to_variable
    pub(crate) fn assign_place(&mut self, place: &Place<'ast>, value: Val) -> Result<(), VmError> {
        match place.dims.split_last() {
            None => self
                .with_place(&place.base, &[], true, |_, slot, _| assign_into(slot, value))
                .map(|_| ()),
            Some((last, parents)) => self
                .with_place(&place.base, parents, true, |engine, container, _| {
                    assign_dim(engine, container, last, value)
                })
                .map(|_| ()),
        }
    }

    /// Current value of a place for read-modify-write, warning when it is missing
    pub(crate) fn read_place(&mut self, place: &Place<'ast>) -> Result<Val, VmError> {
        let current = self
            .with_place(&place.base, &place.dims, true, |_, slot, fresh| {
                Ok((!fresh).then(|| slot.deref()))
            })?
            .flatten();
        match current {
            Some(v) => Ok(v),
            None => {
                self.warn_missing(place);
                Ok(Val::Null)
            }
        }
    }

    fn warn_missing(&mut self, place: &Place<'ast>) {
        let message = match (place.dims.last(), &place.base) {
            (Some(Dim::Key(key)), _) => undefined_key_message(key),
            (Some(Dim::Append), _) => return,
            (None, PlaceBase::Var(name)) => {
                format!("Undefined variable ${}", String::from_utf8_lossy(name))
            }
            (None, PlaceBase::Property(obj, name)) => format!(
                "Undefined property: {}::${}",
                obj.borrow().class_name_lossy(),
                String::from_utf8_lossy(name)
            ),
            (None, _) => return,
        };
        self.engine.warning(&message);
    }

    /// Cell behind a place, converting the slot into a reference binding
    pub(crate) fn make_ref(&mut self, place: &Place<'ast>) -> Result<ValRef, VmError> {
        self.with_place(&place.base, &place.dims, true, |_, slot, _| {
            Ok(make_ref_slot(slot))
        })?
        .ok_or_else(|| VmError::RuntimeError("Cannot create a reference to this location".into()))
    }

    /// Rebind a place to an existing cell (`$a = &...`)
    pub(crate) fn bind_ref(&mut self, place: &Place<'ast>, cell: ValRef) -> Result<(), VmError> {
        self.with_place(&place.base, &place.dims, true, |_, slot, _| {
            *slot = Val::Reference(cell);
            Ok(())
        })
        .map(|_| ())
    }

    /// Assign to any lvalue expression, including `list()` and magic properties
    pub(crate) fn assign_to_expr(&mut self, var: ExprId<'ast>, value: Val) -> Result<(), VmError> {
        match var {
            Expr::List { items, .. } => self.destructure(items, &value),
            Expr::PropertyFetch {
                target, property, ..
            } => {
                let obj = self.fetch_object_for_write(target, property)?;
                self.write_property(&obj, property, value)
            }
            _ => {
                let place = self.resolve_place(var)?;
                self.assign_place(&place, value)
            }
        }
    }

    /// `$var = expr`
    pub(crate) fn eval_assign(&mut self, var: ExprId<'ast>, expr: ExprId<'ast>) -> Result<Val, VmError> {
        match var {
            Expr::List { .. } | Expr::PropertyFetch { .. } => {
                let value = self.eval_expr(expr)?;
                self.assign_to_expr(var, value.clone())?;
                Ok(value)
            }
            _ => {
                let place = self.resolve_place(var)?;
                let value = self.eval_expr(expr)?;
                self.assign_place(&place, value.clone())?;
                Ok(value)
            }
        }
    }

    /// `$var = &expr`
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_ASSIGN_REF
    pub(crate) fn eval_assign_ref(
        &mut self,
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
    ) -> Result<Val, VmError> {
        let cell = if expr.is_place() {
            let source = self.resolve_place(expr)?;
            self.make_ref(&source)?
        } else {
            match self.eval_inner(expr)? {
                Val::Reference(cell) => cell,
                value => {
                    self.engine
                        .notice("Only variables should be assigned by reference");
                    Rc::new(RefCell::new(value))
                }
            }
        };
        let target = self.resolve_place(var)?;
        self.bind_ref(&target, cell.clone())?;
        let value = cell.try_borrow().map_err(|_| busy())?.clone();
        Ok(value)
    }

    /// `list($a, 'k' => $b) = $value`
    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_compile_list_assign
    pub(crate) fn destructure(
        &mut self,
        items: &'ast [Option<ListItem<'ast>>],
        value: &Val,
    ) -> Result<(), VmError> {
        let array = value.as_array().cloned();
        for (index, item) in items.iter().enumerate() {
            let Some(item) = item else {
                continue;
            };
            let key = match item.key {
                Some(key) => {
                    let key = self.eval_expr(key)?;
                    to_array_key(&mut self.engine, &key)?
                }
                None => ArrayKey::Int(index as i64),
            };
            let element = match &array {
                Some(arr) => match arr.find(&key) {
                    Some(v) => v.deref(),
                    None => {
                        self.engine.warning(&undefined_key_message(&key));
                        Val::Null
                    }
                },
                None => Val::Null,
            };
            self.assign_to_expr(item.value, element)?;
        }
        Ok(())
    }

    /// `unset(...)` of one operand
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_UNSET_CV, ZEND_UNSET_DIM
    pub(crate) fn unset_expr(&mut self, expr: ExprId<'ast>) -> Result<(), VmError> {
        match expr {
            Expr::Variable { name, .. } => {
                if *name == b"this" {
                    return Err(VmError::RuntimeError("Cannot unset $this".into()));
                }
                self.frame_mut().locals.shift_remove(*name);
                Ok(())
            }
            Expr::ArrayDimFetch { .. } => {
                let place = self.resolve_place(expr)?;
                let Some((last, parents)) = place.dims.split_last() else {
                    return Ok(());
                };
                self.with_place(&place.base, parents, false, |_, container, _| {
                    unset_dim(container, last)
                })?;
                Ok(())
            }
            Expr::PropertyFetch {
                target, property, ..
            } => match self.eval_expr(target)? {
                Val::Object(obj) => self.unset_property(&obj, property),
                _ => Ok(()),
            },
            Expr::StaticPropertyFetch { .. } => Err(VmError::RuntimeError(
                "Attempt to unset static property".into(),
            )),
            _ => Err(VmError::RuntimeError(
                "Cannot unset the result of an expression".into(),
            )),
        }
    }

    /// `global $name`: bind the local to the global slot by reference
    pub(crate) fn bind_global(&mut self, name: &'ast [u8]) {
        if self.frames.is_empty() {
            return;
        }
        let slot = self.globals.locals.entry(name.to_vec()).or_insert(Val::Undef);
        let cell = make_ref_slot(slot);
        self.frame_mut()
            .locals
            .insert(name.to_vec(), Val::Reference(cell));
    }

    /// `static $name = default`: the cell lives on the function and survives calls
    pub(crate) fn bind_static(&mut self, var: &StaticVar<'ast>) -> Result<(), VmError> {
        let Some(func_id) = self.frame().function else {
            if self.frame().lookup(var.name).is_none() {
                let init = match var.default {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Val::Null,
                };
                self.frame_mut().locals.insert(var.name.to_vec(), init);
            }
            return Ok(());
        };

        let existing = self
            .context
            .function(func_id)
            .and_then(|f| f.statics.borrow().get(var.name).cloned());
        let cell = match existing {
            Some(cell) => cell,
            None => {
                let init = match var.default {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Val::Null,
                };
                let cell = Rc::new(RefCell::new(init));
                if let Some(func) = self.context.function(func_id) {
                    func.statics
                        .borrow_mut()
                        .insert(var.name.to_vec(), cell.clone());
                }
                cell
            }
        };
        self.frame_mut()
            .locals
            .insert(var.name.to_vec(), Val::Reference(cell));
        Ok(())
    }
}
