//! Increment and decrement
//!
//! `++$a`, `$a++`, `--$a`, `$a--` on variables, array elements, properties and
//! static properties. The arithmetic itself (including the alphanumeric
//! string increment) is in [`opcodes::arithmetic`](crate::vm::opcodes::arithmetic).
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_PRE_INC, ZEND_POST_INC,
//!   ZEND_PRE_INC_OBJ, ZEND_POST_INC_STATIC_PROP

use crate::ast::{Expr, ExprId, IncDecKind};
use crate::core::value::Val;
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::opcodes::arithmetic::{decrement, increment};

impl<'ast> Executor<'ast> {
    pub(crate) fn eval_inc_dec(
        &mut self,
        var: ExprId<'ast>,
        kind: IncDecKind,
    ) -> Result<Val, VmError> {
        let step = |executor: &mut Self, old: &Val| match kind {
            IncDecKind::PreInc | IncDecKind::PostInc => increment(&mut executor.engine, old),
            IncDecKind::PreDec | IncDecKind::PostDec => decrement(&mut executor.engine, old),
        };

        let (old, new) = match var {
            Expr::PropertyFetch {
                target, property, ..
            } => {
                let obj = self.fetch_object_for_write(target, property)?;
                let old = self.read_property(&obj, property)?;
                let new = step(self, &old)?;
                self.write_property(&obj, property, new.clone())?;
                (old, new)
            }
            _ => {
                let place = self.resolve_place(var)?;
                let old = self.read_place(&place)?;
                let new = step(self, &old)?;
                self.assign_place(&place, new.clone())?;
                (old, new)
            }
        };

        Ok(match kind {
            IncDecKind::PreInc | IncDecKind::PreDec => new,
            IncDecKind::PostInc | IncDecKind::PostDec => old,
        })
    }
}
