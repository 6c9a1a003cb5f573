//! Array access operations
//!
//! Read-side dimension fetches (`$a[k]`, `$s[n]`) and array literals.
//! Write-side navigation lives in [`variable_ops`](crate::vm::variable_ops).
//!
//! ## PHP Semantics
//!
//! - A missing key warns and reads as null
//! - Indexing null, bool, int or float warns and reads as null
//! - String offsets address single bytes; negative offsets count from the end
//! - `isset`/`??` fetch quietly and never warn
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_execute.c` - zend_fetch_dimension_address_read_R,
//!   zend_fetch_dimension_str_offset
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_INIT_ARRAY, ZEND_ADD_ARRAY_ELEMENT

use crate::ast::ArrayItem;
use crate::core::array::{ArrayData, ArrayKey};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::type_conversion::{to_array_key, to_long};
use std::rc::Rc;

pub(crate) fn undefined_key_message(key: &ArrayKey) -> String {
    match key {
        ArrayKey::Int(i) => format!("Undefined array key {}", i),
        ArrayKey::Str(s) => format!("Undefined array key \"{}\"", String::from_utf8_lossy(s)),
    }
}

pub(crate) fn next_element_occupied() -> VmError {
    VmError::RuntimeError(
        "Cannot add element to the array as the next element is already occupied".into(),
    )
}

impl<'ast> Executor<'ast> {
    /// `$container[$key]` for reading. `None` when the element does not exist;
    /// `quiet` suppresses the diagnostics (isset, empty, `??`).
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_fetch_dimension_address_read
    pub(crate) fn read_dim(
        &mut self,
        container: &Val,
        key: &Val,
        quiet: bool,
    ) -> Result<Option<Val>, VmError> {
        match container {
            Val::Array(arr) => {
                let key = to_array_key(&mut self.engine, key)?;
                match arr.find(&key) {
                    Some(v) => Ok(Some(v.deref())),
                    None => {
                        if !quiet {
                            self.engine.warning(&undefined_key_message(&key));
                        }
                        Ok(None)
                    }
                }
            }
            Val::String(s) => self.read_string_offset(s, key, quiet),
            Val::Object(obj) => Err(VmError::RuntimeError(format!(
                "Cannot use object of type {} as array",
                obj.borrow().class_name_lossy()
            ))),
            Val::Reference(cell) => {
                let inner = cell.borrow().clone();
                self.read_dim(&inner, key, quiet)
            }
            other => {
                if !quiet {
                    self.engine.warning(&format!(
                        "Trying to access array offset on value of type {}",
                        other.type_name()
                    ));
                }
                Ok(None)
            }
        }
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_fetch_dimension_str_offset
    fn read_string_offset(
        &mut self,
        s: &Rc<Vec<u8>>,
        key: &Val,
        quiet: bool,
    ) -> Result<Option<Val>, VmError> {
        let offset = match key.deref() {
            Val::Int(i) => i,
            Val::String(k) => match ArrayKey::numeric(&k) {
                ArrayKey::Int(i) => i,
                ArrayKey::Str(_) if quiet => return Ok(None),
                ArrayKey::Str(_) => {
                    return Err(VmError::TypeError(
                        "Cannot access offset of type string on string".into(),
                    ));
                }
            },
            v @ (Val::Undef | Val::Null | Val::Bool(_) | Val::Float(_)) => {
                if !quiet {
                    self.engine.warning("String offset cast occurred");
                }
                to_long(&v)
            }
            other => {
                return Err(VmError::TypeError(format!(
                    "Cannot access offset of type {} on string",
                    other.type_name()
                )));
            }
        };

        let len = s.len() as i64;
        let pos = if offset < 0 { offset + len } else { offset };
        if pos < 0 || pos >= len {
            if quiet {
                return Ok(None);
            }
            self.engine
                .warning(&format!("Uninitialized string offset {}", offset));
            return Ok(Some(Val::string(Vec::new())));
        }
        Ok(Some(Val::string(vec![s[pos as usize]])))
    }

    /// `[k => v, ...]`, with `&$x` items bound by reference
    pub(crate) fn eval_array_literal(
        &mut self,
        items: &'ast [ArrayItem<'ast>],
    ) -> Result<Val, VmError> {
        let mut data = ArrayData::with_capacity(items.len());
        for item in items {
            let key = match item.key {
                Some(key) => {
                    let key = self.eval_expr(key)?;
                    Some(to_array_key(&mut self.engine, &key)?)
                }
                None => None,
            };
            let value = if item.by_ref && item.value.is_place() {
                let place = self.resolve_place(item.value)?;
                Val::Reference(self.make_ref(&place)?)
            } else {
                self.eval_expr(item.value)?
            };
            match key {
                Some(key) => data.update(key, value),
                None => {
                    data.append(value).ok_or_else(next_element_occupied)?;
                }
            }
        }
        Ok(Val::array(data))
    }
}
