//! Callable function descriptors
//!
//! Every callable the executor can invoke, user-defined or native, lives in
//! one table and is addressed by [`FunctionId`]. Methods are ordinary
//! functions with a class `scope`.

use crate::ast::{Param, StmtId};
use crate::core::value::{Val, ValRef};
use crate::vm::engine::VmError;
use crate::vm::executor::Executor;
use crate::vm::frame::ArgList;
use indexmap::IndexMap;
use std::cell::RefCell;

pub type FunctionId = usize;

/// Native function signature. By-reference arguments arrive as `Val::Reference`.
pub type NativeFn = fn(&mut Executor<'_>, &mut ArgList) -> Result<Val, VmError>;

#[derive(Clone, Copy)]
pub enum FunctionBody<'ast> {
    User {
        params: &'ast [Param<'ast>],
        body: &'ast [StmtId<'ast>],
    },
    Native {
        func: NativeFn,
        /// Zero-based positions passed by reference
        by_ref_params: &'static [usize],
    },
}

pub struct Function<'ast> {
    pub name: Vec<u8>,
    pub body: FunctionBody<'ast>,
    pub by_ref_return: bool,
    /// Lowercase name of the declaring class for methods
    pub scope: Option<Vec<u8>>,
    pub is_static: bool,
    /// `static $x` cells, shared across calls
    pub statics: RefCell<IndexMap<Vec<u8>, ValRef>>,
}

impl<'ast> Function<'ast> {
    pub fn user(name: &[u8], params: &'ast [Param<'ast>], body: &'ast [StmtId<'ast>]) -> Self {
        Self {
            name: name.to_vec(),
            body: FunctionBody::User { params, body },
            by_ref_return: false,
            scope: None,
            is_static: false,
            statics: RefCell::new(IndexMap::new()),
        }
    }

    pub fn native(name: &[u8], func: NativeFn, by_ref_params: &'static [usize]) -> Self {
        Self {
            name: name.to_vec(),
            body: FunctionBody::Native {
                func,
                by_ref_params,
            },
            by_ref_return: false,
            scope: None,
            is_static: false,
            statics: RefCell::new(IndexMap::new()),
        }
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether argument `index` binds by reference
    pub fn param_by_ref(&self, index: usize) -> bool {
        match &self.body {
            FunctionBody::User { params, .. } => params.get(index).is_some_and(|p| p.by_ref),
            FunctionBody::Native { by_ref_params, .. } => by_ref_params.contains(&index),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self.body, FunctionBody::User { .. })
    }
}

impl std::fmt::Debug for Function<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name_lossy())
            .field("user", &self.is_user())
            .field("scope", &self.scope.as_ref().map(|s| String::from_utf8_lossy(s)))
            .finish()
    }
}
