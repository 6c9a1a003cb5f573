//! Function and method invocation
//!
//! ## PHP Semantics
//!
//! - Arguments are evaluated left to right in the caller's scope; positions
//!   declared by reference receive a binding to the caller's variable
//! - Missing optional parameters take their defaults, evaluated in the
//!   callee's scope; missing required ones are an error
//! - Extra arguments are accepted and ignored
//! - `$obj->m()` binds `$this` and late static binding to the object's class;
//!   `A::m()` forwards `$this` when calling a non-static method of a parent
//! - `__call`/`__callStatic` receive the method name and an argument array
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_execute.c` - i_init_func_execute_data
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_INIT_METHOD_CALL, ZEND_INIT_STATIC_METHOD_CALL,
//!   ZEND_RECV, ZEND_RECV_INIT, ZEND_SEND_REF
//! - Zend: `$PHP_SRC_PATH/Zend/zend_object_handlers.c` - zend_std_get_method

use crate::ast::{ClassRef, ExprId, Param, StmtId};
use crate::core::array::ArrayData;
use crate::core::value::Val;
use crate::runtime::class::ClassDef;
use crate::runtime::function::{FunctionBody, FunctionId};
use crate::runtime::object::ObjectRef;
use crate::vm::engine::VmError;
use crate::vm::executor::{Executor, finish_flow};
use crate::vm::frame::{ArgList, CallFrame};
use std::rc::Rc;

impl<'ast> Executor<'ast> {
    /// Call a function with already evaluated arguments
    pub(crate) fn invoke(
        &mut self,
        id: FunctionId,
        args: ArgList,
        this: Option<ObjectRef>,
        static_class: Option<Rc<ClassDef>>,
    ) -> Result<Val, VmError> {
        let function = self
            .context
            .function(id)
            .ok_or_else(|| VmError::RuntimeError(format!("Unknown function id {}", id)))?;

        let body = function.body;
        match body {
            FunctionBody::Native { func, .. } => {
                let mut args = args;
                func(self, &mut args)
            }
            FunctionBody::User { params, body } => {
                self.call_user(id, params, body, args, this, static_class)
            }
        }
    }

    fn call_user(
        &mut self,
        id: FunctionId,
        params: &'ast [Param<'ast>],
        body: &'ast [StmtId<'ast>],
        args: ArgList,
        this: Option<ObjectRef>,
        static_class: Option<Rc<ClassDef>>,
    ) -> Result<Val, VmError> {
        if self.frames.len() >= self.max_call_depth {
            return Err(VmError::RuntimeError(format!(
                "Maximum function nesting level of '{}' reached, aborting!",
                self.max_call_depth
            )));
        }

        let (display_name, scope) = match self.context.function(id) {
            Some(func) => (self.display_name(id), func.scope.clone()),
            None => (String::new(), None),
        };
        let class_scope = scope.and_then(|lc| self.context.find_class(&lc));

        let mut frame = CallFrame::for_function(id);
        frame.static_class = static_class.or_else(|| class_scope.clone());
        frame.class_scope = class_scope;
        frame.this = this;

        tracing::debug!(
            function = %display_name,
            args = args.len(),
            depth = self.frames.len() + 1,
            "entering user function"
        );

        self.frames.push(frame);
        let result = self
            .bind_params(params, args, &display_name)
            .and_then(|()| self.exec_stmts(body));
        self.frames.pop();

        finish_flow(result?)
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_RECV, ZEND_RECV_INIT
    fn bind_params(
        &mut self,
        params: &'ast [Param<'ast>],
        args: ArgList,
        display_name: &str,
    ) -> Result<(), VmError> {
        let passed = args.len();
        let mut args = args.into_iter();
        for param in params {
            let value = match args.next() {
                Some(arg) if param.by_ref => Val::new_reference(arg),
                Some(arg) => match arg {
                    Val::Reference(cell) => cell.borrow().clone(),
                    v => v,
                },
                None => match param.default {
                    Some(default) => self.eval_expr(default)?,
                    None => {
                        let required = params.iter().filter(|p| p.default.is_none()).count();
                        let qualifier = if required == params.len() {
                            "exactly"
                        } else {
                            "at least"
                        };
                        return Err(VmError::RuntimeError(format!(
                            "Too few arguments to function {}(), {} passed and {} {} expected",
                            display_name, passed, qualifier, required
                        )));
                    }
                },
            };
            self.frame_mut().locals.insert(param.name.to_vec(), value);
        }
        Ok(())
    }

    /// `Class::method` for methods, the plain name otherwise
    pub(crate) fn display_name(&self, id: FunctionId) -> String {
        let Some(func) = self.context.function(id) else {
            return String::new();
        };
        match func.scope.as_ref().and_then(|lc| self.context.find_class(lc)) {
            Some(class) => format!("{}::{}", class.name_lossy(), func.name_lossy()),
            None => func.name_lossy(),
        }
    }

    /// Evaluate call arguments; by-reference positions bind to their place
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_SEND_VAR_EX, ZEND_SEND_REF
    pub(crate) fn eval_args(
        &mut self,
        func: Option<FunctionId>,
        args: &'ast [ExprId<'ast>],
    ) -> Result<ArgList, VmError> {
        let mut out = ArgList::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let by_ref = func
                .and_then(|id| self.context.function(id))
                .is_some_and(|f| f.param_by_ref(index));
            if !by_ref {
                out.push(self.eval_expr(arg)?);
            } else if arg.is_place() {
                let place = self.resolve_place(arg)?;
                out.push(Val::Reference(self.make_ref(&place)?));
            } else {
                let value = self.eval_expr(arg)?;
                self.engine
                    .notice("Only variables should be passed by reference");
                out.push(value);
            }
        }
        Ok(out)
    }

    /// `name(...)`
    pub(crate) fn eval_call(
        &mut self,
        name: &[u8],
        args: &'ast [ExprId<'ast>],
    ) -> Result<Val, VmError> {
        let id = self
            .context
            .find_function(name)
            .ok_or_else(|| VmError::UndefinedFunction {
                name: String::from_utf8_lossy(name).into_owned(),
            })?;
        let args = self.eval_args(Some(id), args)?;
        self.invoke(id, args, None, None)
    }

    /// Call a method on an object with `$this` bound; used by the magic hooks
    pub(crate) fn call_method(
        &mut self,
        obj: &ObjectRef,
        func: FunctionId,
        args: ArgList,
    ) -> Result<Val, VmError> {
        let class = obj.borrow().class.clone();
        self.invoke(func, args, Some(obj.clone()), Some(class))
    }

    /// `$target->method(...)`
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_INIT_METHOD_CALL
    pub(crate) fn eval_method_call(
        &mut self,
        target: ExprId<'ast>,
        method: &[u8],
        args: &'ast [ExprId<'ast>],
    ) -> Result<Val, VmError> {
        let obj = match self.eval_expr(target)? {
            Val::Object(obj) => obj,
            other => {
                return Err(VmError::RuntimeError(format!(
                    "Call to a member function {}() on {}",
                    String::from_utf8_lossy(method),
                    other.type_name()
                )));
            }
        };
        let class = obj.borrow().class.clone();

        if let Some(entry) = class.find_method(method) {
            let (func, is_static) = (entry.func, entry.is_static);
            let args = self.eval_args(Some(func), args)?;
            let this = (!is_static).then(|| obj.clone());
            return self.invoke(func, args, this, Some(class));
        }

        match class.magic.call {
            Some(call) => {
                let args = self.eval_args(None, args)?;
                self.invoke_magic_call(call, method, args, Some(obj), class)
            }
            None => Err(undefined_method(&class, method)),
        }
    }

    /// `Class::method(...)`, `parent::method(...)`, `static::method(...)`
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_INIT_STATIC_METHOD_CALL
    pub(crate) fn eval_static_call(
        &mut self,
        class_ref: ClassRef<'ast>,
        method: &[u8],
        args: &'ast [ExprId<'ast>],
    ) -> Result<Val, VmError> {
        let class = self.resolve_class(class_ref)?;
        let forwarding = matches!(
            class_ref,
            ClassRef::SelfRef | ClassRef::Parent | ClassRef::Static
        );
        let this = self
            .frame()
            .this
            .clone()
            .filter(|this| this.borrow().class.instance_of(&class.lc_name));

        if let Some(entry) = class.find_method(method) {
            let (func, is_static) = (entry.func, entry.is_static);
            let args = self.eval_args(Some(func), args)?;
            if is_static {
                let static_class = if forwarding {
                    self.frame().static_class.clone().or(Some(class))
                } else {
                    Some(class)
                };
                return self.invoke(func, args, None, static_class);
            }
            return match this {
                Some(this) => {
                    let static_class = this.borrow().class.clone();
                    self.invoke(func, args, Some(this), Some(static_class))
                }
                None => Err(VmError::RuntimeError(format!(
                    "Non-static method {}::{}() cannot be called statically",
                    class.name_lossy(),
                    String::from_utf8_lossy(&entry_name(&class, method))
                ))),
            };
        }

        if let (Some(this), Some(call)) = (this, class.magic.call) {
            let args = self.eval_args(None, args)?;
            let static_class = this.borrow().class.clone();
            return self.invoke_magic_call(call, method, args, Some(this), static_class);
        }
        match class.magic.call_static {
            Some(call_static) => {
                let args = self.eval_args(None, args)?;
                self.invoke_magic_call(call_static, method, args, None, class)
            }
            None => Err(undefined_method(&class, method)),
        }
    }

    /// Call a value used as a callback: `"fn"`, `"Class::method"`,
    /// `[$object, "method"]` or `["Class", "method"]`
    /// Reference: $PHP_SRC_PATH/Zend/zend_API.c - zend_is_callable_ex
    pub(crate) fn call_value(&mut self, callback: &Val, args: ArgList) -> Result<Val, VmError> {
        let not_callable = || VmError::TypeError("Argument must be a valid callback".into());
        match callback.deref() {
            Val::String(name) => match name.windows(2).position(|w| w == b"::") {
                Some(split) => {
                    let class = self.lookup_class(&name[..split])?;
                    self.call_static_value(class, &name[split + 2..], args)
                }
                None => {
                    let id = self.context.find_function(&name).ok_or_else(|| {
                        VmError::TypeError(format!(
                            "Argument must be a valid callback, function \"{}\" not found or invalid function name",
                            String::from_utf8_lossy(&name)
                        ))
                    })?;
                    self.invoke(id, args, None, None)
                }
            },
            Val::Array(pair) if pair.len() == 2 => {
                let mut items = pair.values().map(Val::deref);
                let (Some(target), Some(Val::String(method))) = (items.next(), items.next())
                else {
                    return Err(not_callable());
                };
                match target {
                    Val::Object(obj) => {
                        let class = obj.borrow().class.clone();
                        let found = class.find_method(&method).map(|e| (e.func, e.is_static));
                        match found {
                            Some((func, is_static)) => {
                                let this = (!is_static).then(|| obj.clone());
                                self.invoke(func, args, this, Some(class))
                            }
                            None => match class.magic.call {
                                Some(call) => {
                                    self.invoke_magic_call(call, &method, args, Some(obj), class)
                                }
                                None => Err(undefined_method(&class, &method)),
                            },
                        }
                    }
                    Val::String(class_name) => {
                        let class = self.lookup_class(&class_name)?;
                        self.call_static_value(class, &method, args)
                    }
                    _ => Err(not_callable()),
                }
            }
            _ => Err(not_callable()),
        }
    }

    fn call_static_value(
        &mut self,
        class: Rc<ClassDef>,
        method: &[u8],
        args: ArgList,
    ) -> Result<Val, VmError> {
        let found = class.find_method(method).map(|e| (e.func, e.is_static));
        match found {
            Some((func, true)) => self.invoke(func, args, None, Some(class)),
            Some(_) => Err(VmError::RuntimeError(format!(
                "Non-static method {}::{}() cannot be called statically",
                class.name_lossy(),
                String::from_utf8_lossy(&entry_name(&class, method))
            ))),
            None => match class.magic.call_static {
                Some(call_static) => {
                    self.invoke_magic_call(call_static, method, args, None, class)
                }
                None => Err(undefined_method(&class, method)),
            },
        }
    }

    /// `__call($name, $arguments)` / `__callStatic($name, $arguments)`
    fn invoke_magic_call(
        &mut self,
        handler: FunctionId,
        method: &[u8],
        args: ArgList,
        this: Option<ObjectRef>,
        static_class: Rc<ClassDef>,
    ) -> Result<Val, VmError> {
        let packed = Val::array(ArrayData::from_values(
            args.into_iter().map(|arg| arg.deref()),
        ));
        let mut magic_args = ArgList::new();
        magic_args.push(Val::string(method));
        magic_args.push(packed);
        self.invoke(handler, magic_args, this, Some(static_class))
    }
}

fn undefined_method(class: &ClassDef, method: &[u8]) -> VmError {
    VmError::UndefinedMethod {
        class: class.name_lossy(),
        method: String::from_utf8_lossy(method).into_owned(),
    }
}

/// Method name as declared, for diagnostics
fn entry_name(class: &ClassDef, method: &[u8]) -> Vec<u8> {
    class
        .find_method(method)
        .map(|entry| entry.name.clone())
        .unwrap_or_else(|| method.to_vec())
}
