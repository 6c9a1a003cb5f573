//! Compound assignment operations
//!
//! `$a op= $b` for every binary operator, plus `??=`.
//!
//! ## PHP Semantics
//!
//! The target is resolved first, then the right operand evaluated, then the
//! current value read, combined and written back. Reading a missing target
//! warns exactly like a plain read and uses null. `??=` reads quietly and only
//! evaluates the right side when the target is missing or null.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_ASSIGN_OP, ZEND_ASSIGN_DIM_OP,
//!   ZEND_ASSIGN_OBJ_OP
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_assign_coalesce

use crate::ast::{AssignOp, Expr, ExprId};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;

impl<'ast> Executor<'ast> {
    pub(crate) fn eval_assign_op(
        &mut self,
        var: ExprId<'ast>,
        op: AssignOp,
        expr: ExprId<'ast>,
    ) -> Result<Val, VmError> {
        let Some(binary) = op.binary_op() else {
            return self.eval_coalesce_assign(var, expr);
        };

        if let Expr::PropertyFetch {
            target, property, ..
        } = var
        {
            let obj = self.fetch_object_for_write(target, property)?;
            let rhs = self.eval_expr(expr)?;
            let current = self.read_property(&obj, property)?;
            let result = self.binary_values(binary, &current, &rhs)?;
            self.write_property(&obj, property, result.clone())?;
            return Ok(result);
        }

        let place = self.resolve_place(var)?;
        let rhs = self.eval_expr(expr)?;
        let current = self.read_place(&place)?;
        let result = self.binary_values(binary, &current, &rhs)?;
        self.assign_place(&place, result.clone())?;
        Ok(result)
    }

    /// `$a ??= $b`
    fn eval_coalesce_assign(
        &mut self,
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
    ) -> Result<Val, VmError> {
        if let Some(current) = self.eval_quiet(var)? {
            if !current.is_null() {
                return Ok(current);
            }
        }
        let value = self.eval_expr(expr)?;
        self.assign_to_expr(var, value.clone())?;
        Ok(value)
    }
}
