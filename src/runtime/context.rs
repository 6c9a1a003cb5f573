//! Per-execution symbol registries
//!
//! Functions, classes and global constants declared while a program runs.
//! Function and class names are case-insensitive; constant names are
//! case-sensitive.

use crate::core::value::Val;
use crate::runtime::class::{ClassDef, ClassFlags};
use crate::runtime::function::{Function, FunctionId};
use std::collections::HashMap;
use std::rc::Rc;

pub struct RequestContext<'ast> {
    pub functions: Vec<Function<'ast>>,
    /// Lowercase name -> id, free functions only
    pub function_names: HashMap<Vec<u8>, FunctionId>,
    /// Lowercase name -> linked class
    pub classes: HashMap<Vec<u8>, Rc<ClassDef>>,
    pub constants: HashMap<Vec<u8>, Val>,
}

impl Default for RequestContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ast> RequestContext<'ast> {
    pub fn new() -> Self {
        let mut ctx = Self {
            functions: Vec::new(),
            function_names: HashMap::new(),
            classes: HashMap::new(),
            constants: HashMap::new(),
        };
        ctx.register_builtin_constants();
        ctx.register_builtin_classes();
        ctx
    }

    /// Add a function to the table without binding a global name (methods)
    pub fn add_function(&mut self, func: Function<'ast>) -> FunctionId {
        self.functions.push(func);
        self.functions.len() - 1
    }

    /// Add and bind a global function name; `None` when already declared
    pub fn declare_function(&mut self, func: Function<'ast>) -> Option<FunctionId> {
        let lc = func.name.to_ascii_lowercase();
        if self.function_names.contains_key(&lc) {
            return None;
        }
        let id = self.add_function(func);
        self.function_names.insert(lc, id);
        Some(id)
    }

    pub fn find_function(&self, name: &[u8]) -> Option<FunctionId> {
        self.function_names.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function<'ast>> {
        self.functions.get(id)
    }

    pub fn find_class(&self, name: &[u8]) -> Option<Rc<ClassDef>> {
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Register a linked class; `false` when the name is taken
    pub fn declare_class(&mut self, class: ClassDef) -> bool {
        if self.classes.contains_key(&class.lc_name) {
            return false;
        }
        self.classes.insert(class.lc_name.clone(), Rc::new(class));
        true
    }

    /// `false` when the constant already exists
    pub fn define_constant(&mut self, name: &[u8], value: Val) -> bool {
        if self.constants.contains_key(name) {
            return false;
        }
        self.constants.insert(name.to_vec(), value);
        true
    }

    pub fn insert_builtin_constant(&mut self, name: &[u8], value: Val) {
        self.constants.insert(name.to_vec(), value);
    }

    /// Constants every program can rely on
    fn register_builtin_constants(&mut self) {
        self.insert_builtin_constant(b"PHP_VERSION", Val::from("8.2.0"));
        self.insert_builtin_constant(b"PHP_VERSION_ID", Val::Int(80200));
        self.insert_builtin_constant(b"PHP_EOL", Val::from("\n"));
        self.insert_builtin_constant(b"PHP_INT_MAX", Val::Int(i64::MAX));
        self.insert_builtin_constant(b"PHP_INT_MIN", Val::Int(i64::MIN));
        self.insert_builtin_constant(b"PHP_INT_SIZE", Val::Int(8));
        self.insert_builtin_constant(b"PHP_FLOAT_EPSILON", Val::Float(f64::EPSILON));
        self.insert_builtin_constant(b"PHP_FLOAT_MAX", Val::Float(f64::MAX));
        self.insert_builtin_constant(b"PHP_FLOAT_MIN", Val::Float(f64::MIN_POSITIVE));
        self.insert_builtin_constant(b"NAN", Val::Float(f64::NAN));
        self.insert_builtin_constant(b"INF", Val::Float(f64::INFINITY));

        self.insert_builtin_constant(b"E_ERROR", Val::Int(1));
        self.insert_builtin_constant(b"E_WARNING", Val::Int(2));
        self.insert_builtin_constant(b"E_NOTICE", Val::Int(8));
        self.insert_builtin_constant(b"E_USER_ERROR", Val::Int(256));
        self.insert_builtin_constant(b"E_USER_WARNING", Val::Int(512));
        self.insert_builtin_constant(b"E_USER_NOTICE", Val::Int(1024));
        self.insert_builtin_constant(b"E_RECOVERABLE_ERROR", Val::Int(4096));
        self.insert_builtin_constant(b"E_DEPRECATED", Val::Int(8192));
        self.insert_builtin_constant(b"E_ALL", Val::Int(32767));

        self.insert_builtin_constant(b"SORT_REGULAR", Val::Int(0));
        self.insert_builtin_constant(b"SORT_NUMERIC", Val::Int(1));
        self.insert_builtin_constant(b"SORT_STRING", Val::Int(2));
        self.insert_builtin_constant(b"COUNT_NORMAL", Val::Int(0));
        self.insert_builtin_constant(b"COUNT_RECURSIVE", Val::Int(1));
    }

    fn register_builtin_classes(&mut self) {
        let mut std_class = ClassDef::new(b"stdClass", ClassFlags::empty());
        if std_class.link(None).is_ok() {
            self.declare_class(std_class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(
        _: &mut crate::vm::executor::Executor<'_>,
        _: &mut crate::vm::frame::ArgList,
    ) -> Result<Val, crate::vm::engine::VmError> {
        Ok(Val::Null)
    }

    #[test]
    fn test_function_names_are_case_insensitive() {
        let mut ctx = RequestContext::new();
        let id = ctx.declare_function(Function::native(b"DoThing", noop, &[]));
        assert!(id.is_some());
        assert_eq!(ctx.find_function(b"dothing"), id);
        assert!(ctx.declare_function(Function::native(b"DOTHING", noop, &[])).is_none());
    }

    #[test]
    fn test_std_class_registered() {
        let ctx = RequestContext::new();
        let class = ctx.find_class(b"STDCLASS").unwrap();
        assert!(class.is_linked());
    }

    #[test]
    fn test_constants_are_case_sensitive() {
        let mut ctx = RequestContext::new();
        assert!(ctx.define_constant(b"LIMIT", Val::Int(1)));
        assert!(!ctx.define_constant(b"LIMIT", Val::Int(2)));
        assert!(ctx.define_constant(b"limit", Val::Int(3)));
    }
}
