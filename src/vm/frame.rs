use crate::core::value::Val;
use crate::runtime::class::ClassDef;
use crate::runtime::function::FunctionId;
use crate::runtime::object::ObjectRef;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::rc::Rc;

pub const INLINE_ARG_CAPACITY: usize = 8;
pub type ArgList = SmallVec<[Val; INLINE_ARG_CAPACITY]>;

/// One activation: the global scope at the bottom, then one frame per user call.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    pub function: Option<FunctionId>,
    /// Symbol table; a slot holding `Val::Reference` is bound by reference
    pub locals: IndexMap<Vec<u8>, Val>,
    pub this: Option<ObjectRef>,
    /// Class whose method is running (`self`)
    pub class_scope: Option<Rc<ClassDef>>,
    /// Late static binding target (`static`)
    pub static_class: Option<Rc<ClassDef>>,
}

impl CallFrame {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_function(function: FunctionId) -> Self {
        Self {
            function: Some(function),
            ..Self::default()
        }
    }

    /// Value of a local, dereferenced. `None` when unset or never assigned.
    pub fn lookup(&self, name: &[u8]) -> Option<Val> {
        match self.locals.get(name)? {
            Val::Undef => None,
            v => Some(v.deref()),
        }
    }
}
