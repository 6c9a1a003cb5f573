//! Statement execution
//!
//! Each statement yields a [`Flow`]. Loops and `switch` consume one level of
//! `break`/`continue` each; `return` and `goto` pass through them.
//!
//! ## PHP Semantics
//!
//! - `goto` jumps only to a label of the flat statement list it is written
//!   in; jumping into or out of a nested block is an undefined-label error
//! - `foreach` by value iterates a snapshot of the array taken at loop entry;
//!   by reference it binds the loop variable to each element still present
//! - `switch` compares with loose equality and falls through until `break`;
//!   `continue` inside a switch acts like `break`
//! - A `finally` block runs after its body; a `return` or `break` inside it
//!   replaces whatever the body produced
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_compile_foreach, zend_compile_switch,
//!   zend_compile_goto, zend_compile_try
//! - Zend: `$PHP_SRC_PATH/Zend/zend_vm_def.h` - ZEND_FE_RESET_R, ZEND_FE_FETCH_RW

use crate::ast::{Case, ExprId, Stmt, StmtId};
use crate::core::array::ArrayData;
use crate::core::value::Val;
use crate::runtime::object::Purpose;
use crate::vm::engine::VmError;
use crate::vm::executor::{Executor, Flow};
use crate::vm::object_helpers::readonly_modified;
use crate::vm::variable_ops::{Dim, make_ref_slot};
use std::rc::Rc;

/// What a loop does with one iteration's flow: `None` keeps looping
fn loop_exit(flow: Flow<'_>) -> Option<Flow<'_>> {
    match flow {
        Flow::Normal | Flow::Continue(1) => None,
        Flow::Break(1) => Some(Flow::Normal),
        Flow::Break(n) => Some(Flow::Break(n - 1)),
        Flow::Continue(n) => Some(Flow::Continue(n - 1)),
        other => Some(other),
    }
}

fn find_label(stmts: &[StmtId<'_>], label: &[u8]) -> Option<usize> {
    stmts
        .iter()
        .position(|stmt| matches!(stmt, Stmt::Label { name, .. } if *name == label))
}

impl<'ast> Executor<'ast> {
    /// Run a statement list. A `goto` written directly in this list jumps to
    /// a label of the same list; one raised inside a nested block is passed
    /// up unresolved and ends as an undefined-label error.
    pub(crate) fn exec_stmts(&mut self, stmts: &'ast [StmtId<'ast>]) -> Result<Flow<'ast>, VmError> {
        let mut pc = 0;
        while let Some(stmt) = stmts.get(pc) {
            match self.exec_stmt(stmt)? {
                Flow::Normal => pc += 1,
                Flow::Goto(label) if matches!(stmt, Stmt::Goto { .. }) => {
                    match find_label(stmts, label) {
                        Some(target) => pc = target + 1,
                        None => return Ok(Flow::Goto(label)),
                    }
                }
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: StmtId<'ast>) -> Result<Flow<'ast>, VmError> {
        self.current_line = stmt.span().line;
        match stmt {
            Stmt::Echo { exprs, .. } => {
                for expr in *exprs {
                    let value = self.eval_expr(expr)?;
                    let bytes = self.to_string_val(&value)?;
                    self.engine.write_output(&bytes)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Expression { expr, .. } => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { expr, .. } => self.exec_return(*expr),
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                if self.eval_expr(condition)?.to_bool() {
                    self.exec_stmts(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_stmts(else_block)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.eval_expr(condition)?.to_bool() {
                    if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                        return Ok(exit);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile {
                body, condition, ..
            } => {
                loop {
                    if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                        return Ok(exit);
                    }
                    if !self.eval_expr(condition)?.to_bool() {
                        return Ok(Flow::Normal);
                    }
                }
            }
            Stmt::For {
                init,
                condition,
                loop_expr,
                body,
                ..
            } => {
                for expr in *init {
                    self.eval_expr(expr)?;
                }
                while self.for_condition(condition)? {
                    if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                        return Ok(exit);
                    }
                    for expr in *loop_expr {
                        self.eval_expr(expr)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Foreach {
                expr,
                key_var,
                value_var,
                by_ref,
                body,
                ..
            } => {
                if *by_ref && expr.is_place() {
                    self.exec_foreach_by_ref(expr, *key_var, value_var, body)
                } else {
                    self.exec_foreach(expr, *key_var, value_var, body)
                }
            }
            Stmt::Block { statements, .. } => self.exec_stmts(statements),
            Stmt::Switch {
                condition, cases, ..
            } => self.exec_switch(condition, cases),
            Stmt::Break { level, .. } => Ok(Flow::Break((*level).max(1))),
            Stmt::Continue { level, .. } => Ok(Flow::Continue((*level).max(1))),
            Stmt::Goto { label, .. } => Ok(Flow::Goto(*label)),
            Stmt::Label { .. } | Stmt::Nop { .. } => Ok(Flow::Normal),
            Stmt::Try { body, finally, .. } => self.exec_try(body, *finally),
            Stmt::Const { consts, .. } => {
                for item in *consts {
                    let value = self.eval_expr(item.value)?;
                    if !self.context.define_constant(item.name, value) {
                        self.engine.warning(&format!(
                            "Constant {} already defined",
                            String::from_utf8_lossy(item.name)
                        ));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Global { vars, .. } => {
                for name in *vars {
                    self.bind_global(name);
                }
                Ok(Flow::Normal)
            }
            Stmt::Static { vars, .. } => {
                for var in *vars {
                    self.bind_static(var)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Unset { vars, .. } => {
                for var in *vars {
                    self.unset_expr(var)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::InlineHtml { value, .. } => {
                self.engine.write_output(value)?;
                Ok(Flow::Normal)
            }
            Stmt::Function { decl, .. } => {
                self.declare_function(decl)?;
                Ok(Flow::Normal)
            }
            Stmt::Class { decl, .. } => {
                self.declare_class(decl)?;
                Ok(Flow::Normal)
            }
            Stmt::HaltCompiler { .. } => Ok(Flow::Return(Val::Null)),
        }
    }

    /// The last condition expression decides; none means true
    fn for_condition(&mut self, conditions: &'ast [ExprId<'ast>]) -> Result<bool, VmError> {
        let mut result = true;
        for expr in conditions {
            result = self.eval_expr(expr)?.to_bool();
        }
        Ok(result)
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_RETURN, ZEND_RETURN_BY_REF
    fn exec_return(&mut self, expr: Option<ExprId<'ast>>) -> Result<Flow<'ast>, VmError> {
        let Some(expr) = expr else {
            return Ok(Flow::Return(Val::Null));
        };
        let by_ref = self
            .frame()
            .function
            .and_then(|id| self.context.function(id))
            .is_some_and(|f| f.by_ref_return);
        if by_ref && expr.is_place() {
            let place = self.resolve_place(expr)?;
            return Ok(Flow::Return(Val::Reference(self.make_ref(&place)?)));
        }
        Ok(Flow::Return(self.eval_expr(expr)?))
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_compile_switch
    fn exec_switch(
        &mut self,
        condition: ExprId<'ast>,
        cases: &'ast [Case<'ast>],
    ) -> Result<Flow<'ast>, VmError> {
        let subject = self.eval_expr(condition)?;
        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = case.condition {
                let value = self.eval_expr(test)?;
                if self.loose_equals(&subject, &value)? {
                    start = Some(index);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|c| c.condition.is_none()))
        else {
            return Ok(Flow::Normal);
        };

        for case in &cases[start..] {
            match self.exec_stmts(case.body)? {
                Flow::Normal => {}
                Flow::Break(1) | Flow::Continue(1) => return Ok(Flow::Normal),
                Flow::Break(n) => return Ok(Flow::Break(n - 1)),
                Flow::Continue(n) => return Ok(Flow::Continue(n - 1)),
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_FE_RESET_R, ZEND_FE_FETCH_R
    fn exec_foreach(
        &mut self,
        expr: ExprId<'ast>,
        key_var: Option<ExprId<'ast>>,
        value_var: ExprId<'ast>,
        body: &'ast [StmtId<'ast>],
    ) -> Result<Flow<'ast>, VmError> {
        let entries: Rc<ArrayData> = match self.eval_expr(expr)? {
            Val::Array(arr) => arr,
            Val::Object(obj) => Rc::new(obj.borrow().properties_for(Purpose::Debug)),
            other => {
                self.engine.warning(&format!(
                    "foreach() argument must be of type array|object, {} given",
                    other.type_name()
                ));
                return Ok(Flow::Normal);
            }
        };

        for (key, value) in entries.iter() {
            self.assign_to_expr(value_var, value.deref())?;
            if let Some(key_var) = key_var {
                self.assign_to_expr(key_var, key.to_val())?;
            }
            if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                return Ok(exit);
            }
        }
        Ok(Flow::Normal)
    }

    /// `foreach ($arr as &$v)`: keys are fixed at entry; elements removed by
    /// the body are skipped, elements appended by it are not visited
    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_FE_RESET_RW, ZEND_FE_FETCH_RW
    fn exec_foreach_by_ref(
        &mut self,
        expr: ExprId<'ast>,
        key_var: Option<ExprId<'ast>>,
        value_var: ExprId<'ast>,
        body: &'ast [StmtId<'ast>],
    ) -> Result<Flow<'ast>, VmError> {
        let place = self.resolve_place(expr)?;
        let subject = self
            .with_place(&place.base, &place.dims, true, |_, slot, _| Ok(slot.deref()))?
            .unwrap_or(Val::Null);

        match subject {
            Val::Array(arr) => {
                let keys: Vec<_> = arr.keys().cloned().collect();
                // Release the snapshot so the first write does not copy
                drop(arr);
                for key in keys {
                    let mut dims = place.dims.clone();
                    dims.push(Dim::Key(key.clone()));
                    let cell = self.with_place(&place.base, &dims, false, |_, slot, _| {
                        Ok(make_ref_slot(slot))
                    })?;
                    let Some(cell) = cell else {
                        continue;
                    };
                    let target = self.resolve_place(value_var)?;
                    self.bind_ref(&target, cell)?;
                    if let Some(key_var) = key_var {
                        self.assign_to_expr(key_var, key.to_val())?;
                    }
                    if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                        return Ok(exit);
                    }
                }
                Ok(Flow::Normal)
            }
            Val::Object(obj) => {
                let names: Vec<_> = obj
                    .borrow()
                    .properties_for(Purpose::Debug)
                    .keys()
                    .cloned()
                    .collect();
                for name in names {
                    let name_bytes = name.to_bytes();
                    if Self::readonly_flag(&obj, &name_bytes) {
                        return Err(readonly_modified(&obj, &name_bytes));
                    }
                    let cell = {
                        let mut data = obj.borrow_mut();
                        data.property_mut(&name_bytes, false).map(make_ref_slot)
                    };
                    let Some(cell) = cell else {
                        continue;
                    };
                    let target = self.resolve_place(value_var)?;
                    self.bind_ref(&target, cell)?;
                    if let Some(key_var) = key_var {
                        self.assign_to_expr(key_var, name.to_val())?;
                    }
                    if let Some(exit) = loop_exit(self.exec_stmts(body)?) {
                        return Ok(exit);
                    }
                }
                Ok(Flow::Normal)
            }
            other => {
                self.engine.warning(&format!(
                    "foreach() argument must be of type array|object, {} given",
                    other.type_name()
                ));
                Ok(Flow::Normal)
            }
        }
    }

    /// Reference: $PHP_SRC_PATH/Zend/zend_vm_def.h - ZEND_FAST_CALL, ZEND_FAST_RET
    fn exec_try(
        &mut self,
        body: &'ast [StmtId<'ast>],
        finally: Option<&'ast [StmtId<'ast>]>,
    ) -> Result<Flow<'ast>, VmError> {
        let outcome = self.exec_stmts(body);
        let Some(finally) = finally else {
            return outcome;
        };
        // exit() skips finally blocks
        if let Err(VmError::Exit(_)) = outcome {
            return outcome;
        }
        match self.exec_stmts(finally)? {
            Flow::Normal => outcome,
            overriding => {
                tracing::trace!("finally block replaced the pending outcome");
                Ok(overriding)
            }
        }
    }
}
