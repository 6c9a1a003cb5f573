//! Expression evaluation
//!
//! [`Executor::eval_expr`] always produces a plain value; a by-reference
//! function result is read through. Short-circuit operators evaluate their
//! right operand lazily, and `isset`/`empty`/`??` fetch their operand quietly.
//!
//! ## PHP Semantics
//!
//! - Operands are evaluated left to right
//! - Objects with `__toString` are converted before concatenation and before
//!   comparison with a string
//! - `@expr` suppresses diagnostics raised while `expr` runs
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_expr
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_ISSET_ISEMPTY_DIM_OBJ, ZEND_CAST,
//!   ZEND_BEGIN_SILENCE, ZEND_THROW, ZEND_EXIT

use crate::ast::{BinaryOp, CastKind, Expr, ExprId, MagicConstKind, Span, UnaryOp};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::opcodes::arithmetic::{add, div, modulo, mul, negate, plus, pow, sub};
use crate::vm::opcodes::bitwise::{
    bitwise_and, bitwise_not, bitwise_or, bitwise_xor, shift_left, shift_right,
};
use crate::vm::opcodes::comparison::{
    equals, is_identical, is_smaller, is_smaller_or_equal, not_equals, not_identical, spaceship,
};
use crate::vm::opcodes::logical::{boolean_and, boolean_not, boolean_or, coalesce, logical_xor};
use crate::vm::opcodes::string::concat;
use crate::vm::type_conversion::{to_array, to_double, to_long};

impl<'ast> Executor<'ast> {
    pub(crate) fn eval_expr(&mut self, expr: ExprId<'ast>) -> Result<Val, VmError> {
        match self.eval_inner(expr)? {
            Val::Reference(cell) => Ok(cell.borrow().clone()),
            value => Ok(value),
        }
    }

    /// Evaluate without reading through a reference returned by a call
    pub(crate) fn eval_inner(&mut self, expr: ExprId<'ast>) -> Result<Val, VmError> {
        match expr {
            Expr::Null { .. } => Ok(Val::Null),
            Expr::Boolean { value, .. } => Ok(Val::Bool(*value)),
            Expr::Integer { value, .. } => Ok(Val::Int(*value)),
            Expr::Float { value, .. } => Ok(Val::Float(*value)),
            Expr::String { value, .. } => Ok(Val::string(*value)),
            Expr::Array { items, .. } => self.eval_array_literal(items),
            Expr::Variable { name, .. } => Ok(self.read_variable(name)),
            Expr::ArrayDimFetch { array, dim, .. } => {
                let Some(dim) = dim else {
                    return Err(VmError::RuntimeError("Cannot use [] for reading".into()));
                };
                let container = self.eval_expr(array)?;
                let key = self.eval_expr(dim)?;
                Ok(self.read_dim(&container, &key, false)?.unwrap_or(Val::Null))
            }
            Expr::PropertyFetch {
                target, property, ..
            } => match self.eval_expr(target)? {
                Val::Object(obj) => self.read_property(&obj, property),
                other => {
                    self.engine.warning(&format!(
                        "Attempt to read property \"{}\" on {}",
                        String::from_utf8_lossy(property),
                        other.type_name()
                    ));
                    Ok(Val::Null)
                }
            },
            Expr::StaticPropertyFetch {
                class, property, ..
            } => {
                let class = self.resolve_class(*class)?;
                let (owner, offset) = self.static_property(&class, property)?;
                let value = owner
                    .static_members
                    .borrow()
                    .get(offset)
                    .map(Val::deref)
                    .unwrap_or(Val::Null);
                Ok(value)
            }
            Expr::ClassConstFetch {
                class, constant, ..
            } => self.class_constant(*class, constant),
            Expr::ConstFetch { name, .. } => self.constant(name),
            Expr::Assign { var, expr, .. } => self.eval_assign(var, expr),
            Expr::AssignRef { var, expr, .. } => self.eval_assign_ref(var, expr),
            Expr::AssignOp { var, op, expr, .. } => self.eval_assign_op(var, *op, expr),
            Expr::Binary {
                left, op, right, ..
            } => self.eval_binary(left, *op, right),
            Expr::Unary { op, expr, .. } => {
                let value = self.eval_expr(expr)?;
                match op {
                    UnaryOp::Plus => plus(&mut self.engine, &value),
                    UnaryOp::Minus => negate(&mut self.engine, &value),
                    UnaryOp::Not => Ok(Val::Bool(boolean_not(&value))),
                    UnaryOp::BitNot => bitwise_not(&value),
                }
            }
            Expr::IncDec { var, kind, .. } => self.eval_inc_dec(var, *kind),
            Expr::Cast { kind, expr, .. } => self.eval_cast(*kind, expr),
            Expr::Isset { vars, .. } => {
                for var in *vars {
                    match self.eval_quiet(var)? {
                        Some(value) if !value.is_null() => {}
                        _ => return Ok(Val::Bool(false)),
                    }
                }
                Ok(Val::Bool(true))
            }
            Expr::Empty { expr, .. } => {
                let value = self.eval_quiet(expr)?;
                Ok(Val::Bool(value.is_none_or(|v| !v.to_bool())))
            }
            Expr::InstanceOf { expr, class, .. } => {
                let value = self.eval_expr(expr)?;
                let Val::Object(obj) = &value else {
                    return Ok(Val::Bool(false));
                };
                let lc_name = self.class_ref_lc_name(*class)?;
                Ok(Val::Bool(obj.borrow().class.instance_of(&lc_name)))
            }
            Expr::Call { func, args, .. } => self.eval_call(func, args),
            Expr::MethodCall {
                target,
                method,
                args,
                ..
            } => self.eval_method_call(target, method, args),
            Expr::StaticCall {
                class,
                method,
                args,
                ..
            } => self.eval_static_call(*class, method, args),
            Expr::New { class, args, .. } => self.instantiate(*class, args),
            Expr::Clone { expr, .. } => {
                let value = self.eval_expr(expr)?;
                self.clone_object(&value)
            }
            Expr::Ternary {
                condition,
                if_true,
                if_false,
                ..
            } => {
                let cond = self.eval_expr(condition)?;
                match if_true {
                    Some(if_true) if cond.to_bool() => self.eval_expr(if_true),
                    None if cond.to_bool() => Ok(cond),
                    _ => self.eval_expr(if_false),
                }
            }
            Expr::List { .. } => Err(VmError::Unsupported(
                "list() outside of an assignment",
            )),
            Expr::Print { expr, .. } => {
                let value = self.eval_expr(expr)?;
                let bytes = self.to_string_val(&value)?;
                self.engine.write_output(&bytes)?;
                Ok(Val::Int(1))
            }
            Expr::Throw { expr, .. } => match self.eval_expr(expr)? {
                value @ Val::Object(_) => Err(VmError::Thrown(value)),
                _ => Err(VmError::RuntimeError("Can only throw objects".into())),
            },
            Expr::Exit { expr, .. } => {
                let code = match expr {
                    None => 0,
                    Some(expr) => match self.eval_expr(expr)? {
                        Val::Int(code) => code,
                        message => {
                            let bytes = self.to_string_val(&message)?;
                            self.engine.write_output(&bytes)?;
                            0
                        }
                    },
                };
                self.engine.flush_output()?;
                Err(VmError::Exit(code))
            }
            Expr::ErrorSuppress { expr, .. } => {
                self.engine.silence();
                let result = self.eval_expr(expr);
                self.engine.unsilence();
                result
            }
            Expr::MagicConst { kind, span } => Ok(self.magic_constant(*kind, *span)),
            Expr::Closure { .. } => Err(VmError::Unsupported("closures")),
            Expr::Yield { .. } => Err(VmError::Unsupported("generators")),
        }
    }

    /// Fetch an operand of isset/empty/`??` without diagnostics; `None` when
    /// it does not exist
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_ISSET_ISEMPTY_CV
    pub(crate) fn eval_quiet(&mut self, expr: ExprId<'ast>) -> Result<Option<Val>, VmError> {
        match expr {
            Expr::Variable { name, .. } => Ok(self.read_variable_quiet(name)),
            Expr::ArrayDimFetch { array, dim, .. } => {
                let Some(dim) = dim else {
                    return Err(VmError::RuntimeError("Cannot use [] for reading".into()));
                };
                let Some(container) = self.eval_quiet(array)? else {
                    return Ok(None);
                };
                let key = self.eval_expr(dim)?;
                self.read_dim(&container, &key, true)
            }
            Expr::PropertyFetch {
                target, property, ..
            } => match self.eval_quiet(target)? {
                Some(Val::Object(obj)) => self.property_quiet(&obj, property),
                _ => Ok(None),
            },
            Expr::StaticPropertyFetch {
                class, property, ..
            } => {
                let class = self.resolve_class(*class)?;
                Ok(class.read_static(property).map(|v| v.deref()))
            }
            _ => self.eval_expr(expr).map(Some),
        }
    }

    fn eval_binary(
        &mut self,
        left: ExprId<'ast>,
        op: BinaryOp,
        right: ExprId<'ast>,
    ) -> Result<Val, VmError> {
        match op {
            BinaryOp::And => {
                let l = self.eval_expr(left)?;
                Ok(Val::Bool(boolean_and(&l, || self.eval_expr(right))?))
            }
            BinaryOp::Or => {
                let l = self.eval_expr(left)?;
                Ok(Val::Bool(boolean_or(&l, || self.eval_expr(right))?))
            }
            BinaryOp::Coalesce => {
                let l = self.eval_quiet(left)?;
                coalesce(l, || self.eval_expr(right))
            }
            _ => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.binary_values(op, &l, &r)
            }
        }
    }

    /// Apply a binary operator to two evaluated operands
    pub(crate) fn binary_values(&mut self, op: BinaryOp, l: &Val, r: &Val) -> Result<Val, VmError> {
        match op {
            BinaryOp::Concat => {
                let l = self.string_operand(l)?;
                let r = self.string_operand(r)?;
                Ok(concat(&mut self.engine, &l, &r))
            }
            BinaryOp::EqEq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::Spaceship => {
                let (l, r) = self.comparison_operands(l, r)?;
                let engine = &mut self.engine;
                match op {
                    BinaryOp::EqEq => equals(engine, &l, &r).map(Val::Bool),
                    BinaryOp::NotEq => not_equals(engine, &l, &r).map(Val::Bool),
                    BinaryOp::Lt => is_smaller(engine, &l, &r).map(Val::Bool),
                    BinaryOp::LtEq => is_smaller_or_equal(engine, &l, &r).map(Val::Bool),
                    BinaryOp::Gt => is_smaller(engine, &r, &l).map(Val::Bool),
                    BinaryOp::GtEq => is_smaller_or_equal(engine, &r, &l).map(Val::Bool),
                    _ => spaceship(engine, &l, &r),
                }
            }
            BinaryOp::EqEqEq => is_identical(&mut self.engine, l, r).map(Val::Bool),
            BinaryOp::NotEqEq => not_identical(&mut self.engine, l, r).map(Val::Bool),
            BinaryOp::Plus => add(&mut self.engine, l, r),
            BinaryOp::Minus => sub(&mut self.engine, l, r),
            BinaryOp::Mul => mul(&mut self.engine, l, r),
            BinaryOp::Div => div(&mut self.engine, l, r),
            BinaryOp::Mod => modulo(&mut self.engine, l, r),
            BinaryOp::Pow => pow(&mut self.engine, l, r),
            BinaryOp::BitAnd => bitwise_and(&mut self.engine, l, r),
            BinaryOp::BitOr => bitwise_or(&mut self.engine, l, r),
            BinaryOp::BitXor => bitwise_xor(&mut self.engine, l, r),
            BinaryOp::ShiftLeft => shift_left(&mut self.engine, l, r),
            BinaryOp::ShiftRight => shift_right(&mut self.engine, l, r),
            BinaryOp::LogicalXor => Ok(Val::Bool(logical_xor(l, r))),
            BinaryOp::And => Ok(Val::Bool(l.to_bool() && r.to_bool())),
            BinaryOp::Or => Ok(Val::Bool(l.to_bool() || r.to_bool())),
            BinaryOp::Coalesce => Ok(if l.is_null() { r.deref() } else { l.deref() }),
        }
    }

    /// `==` as used by `switch` and the array functions
    pub(crate) fn loose_equals(&mut self, l: &Val, r: &Val) -> Result<bool, VmError> {
        let (l, r) = self.comparison_operands(l, r)?;
        equals(&mut self.engine, &l, &r)
    }

    fn has_to_string(v: &Val) -> bool {
        matches!(v, Val::Object(obj) if obj.borrow().class.magic.to_string.is_some())
    }

    fn string_operand(&mut self, v: &Val) -> Result<Val, VmError> {
        if Self::has_to_string(v) {
            return Ok(Val::String(self.to_string_val(v)?));
        }
        Ok(v.clone())
    }

    /// An object compared with a string is compared as its `__toString` result
    fn comparison_operands(&mut self, l: &Val, r: &Val) -> Result<(Val, Val), VmError> {
        match (l, r) {
            (Val::Object(_), Val::String(_)) if Self::has_to_string(l) => {
                Ok((Val::String(self.to_string_val(l)?), r.clone()))
            }
            (Val::String(_), Val::Object(_)) if Self::has_to_string(r) => {
                Ok((l.clone(), Val::String(self.to_string_val(r)?)))
            }
            _ => Ok((l.clone(), r.clone())),
        }
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_CAST
    fn eval_cast(&mut self, kind: CastKind, expr: ExprId<'ast>) -> Result<Val, VmError> {
        let value = self.eval_expr(expr)?;
        match kind {
            CastKind::Int | CastKind::Float => {
                if let Val::Object(obj) = &value {
                    self.engine.warning(&format!(
                        "Object of class {} could not be converted to {}",
                        obj.borrow().class_name_lossy(),
                        if kind == CastKind::Int { "int" } else { "float" }
                    ));
                    return Ok(if kind == CastKind::Int {
                        Val::Int(1)
                    } else {
                        Val::Float(1.0)
                    });
                }
                Ok(if kind == CastKind::Int {
                    Val::Int(to_long(&value))
                } else {
                    Val::Float(to_double(&value))
                })
            }
            CastKind::Bool => Ok(Val::Bool(value.to_bool())),
            CastKind::String => Ok(Val::String(self.to_string_val(&value)?)),
            CastKind::Array => Ok(Val::Array(to_array(&value))),
            CastKind::Object => self.to_object(value),
            CastKind::Unset => Ok(Val::Null),
        }
    }

    /// Global constant lookup; `true`/`false`/`null` are case-insensitive
    /// Reference: $PHP_SRC_PATH/Zend/zend_constants.c - zend_get_constant_ex
    fn constant(&mut self, name: &[u8]) -> Result<Val, VmError> {
        let name = name.strip_prefix(b"\\").unwrap_or(name);
        if let Some(value) = self.context.constants.get(name) {
            return Ok(value.clone());
        }
        match name.to_ascii_lowercase().as_slice() {
            b"true" => Ok(Val::Bool(true)),
            b"false" => Ok(Val::Bool(false)),
            b"null" => Ok(Val::Null),
            _ => Err(VmError::UndefinedConstant {
                name: String::from_utf8_lossy(name).into_owned(),
            }),
        }
    }

    fn magic_constant(&self, kind: MagicConstKind, span: Span) -> Val {
        let frame = self.frame();
        let function = frame.function.and_then(|id| self.context.function(id));
        let class_name = frame
            .class_scope
            .as_ref()
            .map(|class| class.name.clone())
            .unwrap_or_default();
        match kind {
            MagicConstKind::Line => Val::Int(span.line as i64),
            MagicConstKind::Function => {
                Val::string(function.map(|f| f.name.clone()).unwrap_or_default())
            }
            MagicConstKind::Class => Val::string(class_name),
            MagicConstKind::Method => {
                let Some(function) = function else {
                    return Val::string(Vec::new());
                };
                if class_name.is_empty() {
                    return Val::string(function.name.clone());
                }
                let mut out = class_name;
                out.extend_from_slice(b"::");
                out.extend_from_slice(&function.name);
                Val::string(out)
            }
        }
    }
}
