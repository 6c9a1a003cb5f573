//! Tree-walking executor
//!
//! Runs an arena-allocated [`Program`] directly: statements produce a
//! [`Flow`] signal, expressions produce a [`Val`]. The executor owns the
//! [`Engine`] (diagnostics, output), the [`RequestContext`] (functions,
//! classes, constants) and the call stack.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use php_core::ast::builder::AstBuilder;
//! use php_core::vm::executor::{execute_program, ExecutionConfig};
//!
//! let arena = bumpalo::Bump::new();
//! let b = AstBuilder::new(&arena);
//! let program = b.program(&[b.ret(Some(b.int(42)))]);
//! let result = execute_program(&program, ExecutionConfig::default())?;
//! assert_eq!(result.value, Val::Int(42));
//! ```
//!
//! The remaining `impl Executor` blocks are split by concern:
//! statements, expressions, variables, array access, calls, objects and
//! class declarations.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_execute_API.c` - zend_execute_scripts, zend_call_function
//! - Zend: `$PHP_SRC_PATH/Zend/zend_compile.c` - zend_do_early_binding

use crate::ast::{ClassDecl, FunctionDecl, Program, Stmt, StmtId};
use crate::core::array::{ArrayData, ArrayKey};
use crate::core::value::Val;
use crate::runtime::context::RequestContext;
use crate::runtime::function::{Function, NativeFn};
use crate::vm::engine::{
    CapturingErrorHandler, CapturingOutputWriter, E_ALL, Engine, VmError,
};
use crate::vm::frame::{ArgList, CallFrame};
use crate::vm::object_helpers::MagicGuard;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// Result of executing a program
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The top-level `return` value, or null
    pub value: Val,
    /// Captured output
    pub stdout: String,
    /// Captured diagnostics, one "Level: message" line each
    pub stderr: String,
    /// Execution time in microseconds
    pub duration_us: u64,
    /// Status passed to `exit`, when the program ended that way
    pub exit_code: Option<i64>,
}

/// Configuration for program execution
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub error_reporting: u32,
    /// Significant digits when a float becomes a string
    pub precision: usize,
    pub max_call_depth: usize,
    /// Native functions reject mismatched scalar arguments
    pub strict_types: bool,
    /// Capture output streams
    pub capture_output: bool,
    /// Initial global variables
    pub globals: BTreeMap<String, serde_json::Value>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            error_reporting: E_ALL,
            precision: 14,
            max_call_depth: 512,
            strict_types: false,
            capture_output: true,
            globals: BTreeMap::new(),
        }
    }
}

/// Control outcome of a statement list
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<'ast> {
    Normal,
    Return(Val),
    /// Remaining loop levels to leave
    Break(u32),
    Continue(u32),
    Goto(&'ast [u8]),
}

pub struct Executor<'ast> {
    pub engine: Engine,
    pub context: RequestContext<'ast>,
    /// Global scope; used whenever no call is active
    pub(crate) globals: CallFrame,
    pub(crate) frames: Vec<CallFrame>,
    pub max_call_depth: usize,
    pub(crate) current_line: u32,
    /// Declarations already bound, by node address
    declared: HashSet<usize>,
    /// Magic property accessors currently running, to stop recursion
    pub(crate) magic_guards: HashSet<MagicGuard>,
    /// Constants of the class whose declaration is being evaluated
    pub(crate) pending_class: Option<crate::vm::class_resolution::PendingClass>,
}

impl Default for Executor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'ast> Executor<'ast> {
    pub fn new() -> Self {
        let mut executor = Self {
            engine: Engine::new(),
            context: RequestContext::new(),
            globals: CallFrame::global(),
            frames: Vec::new(),
            max_call_depth: 512,
            current_line: 0,
            declared: HashSet::new(),
            magic_guards: HashSet::new(),
            pending_class: None,
        };
        crate::builtins::register_all(&mut executor);
        executor
    }

    pub fn with_config(config: &ExecutionConfig) -> Self {
        let mut executor = Self::new();
        executor.engine.error_reporting = config.error_reporting;
        executor.engine.precision = config.precision;
        executor.engine.strict_types = config.strict_types;
        executor.max_call_depth = config.max_call_depth;
        for (name, value) in &config.globals {
            executor
                .globals
                .locals
                .insert(name.as_bytes().to_vec(), json_to_val(value));
        }
        executor
    }

    /// Bind a host function under a global name; `false` when the name is taken
    pub fn register_native(
        &mut self,
        name: &[u8],
        func: NativeFn,
        by_ref_params: &'static [usize],
    ) -> bool {
        self.context
            .declare_function(Function::native(name, func, by_ref_params))
            .is_some()
    }

    /// Call a declared function by name from the host
    pub fn call_function(&mut self, name: &[u8], args: ArgList) -> Result<Val, VmError> {
        let id = self
            .context
            .find_function(name)
            .ok_or_else(|| VmError::UndefinedFunction {
                name: String::from_utf8_lossy(name).into_owned(),
            })?;
        self.invoke(id, args, None, None)
    }

    /// Write program output
    pub fn emit(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        self.engine.write_output(bytes)
    }

    /// Run a whole program in the global scope
    pub fn run(&mut self, program: &Program<'ast>) -> Result<Val, VmError> {
        self.hoist_declarations(program.statements);
        let flow = self.exec_stmts(program.statements);
        let flushed = self.engine.flush_output();
        let value = finish_flow(flow?)?;
        flushed?;
        Ok(value)
    }

    pub(crate) fn frame(&self) -> &CallFrame {
        self.frames.last().unwrap_or(&self.globals)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut CallFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    /// Bind top-level functions, then every top-level class whose parent is
    /// already known, before the first statement runs.
    /// Reference: $PHP_SRC_PATH/Zend/zend_compile.c - zend_do_early_binding
    pub(crate) fn hoist_declarations(&mut self, stmts: &'ast [StmtId<'ast>]) {
        let mut classes: Vec<&'ast ClassDecl<'ast>> = Vec::new();
        for stmt in stmts {
            match stmt {
                Stmt::Function { decl, .. } => {
                    if let Err(err) = self.declare_function(*decl) {
                        // Raised again when the declaration statement runs
                        tracing::debug!(%err, "function not hoisted");
                    }
                }
                Stmt::Class { decl, .. } => classes.push(*decl),
                _ => {}
            }
        }

        loop {
            let before = classes.len();
            classes.retain(|decl| {
                let ready = decl
                    .parent
                    .is_none_or(|parent| self.context.find_class(parent).is_some());
                !(ready && self.declare_class(*decl).is_ok())
            });
            if classes.len() == before {
                break;
            }
        }
    }

    pub(crate) fn is_declared<T>(&self, node: &T) -> bool {
        self.declared.contains(&(node as *const T as usize))
    }

    pub(crate) fn mark_declared<T>(&mut self, node: &T) {
        self.declared.insert(node as *const T as usize);
    }

    /// Bind a `function` declaration. Running the same node twice is a no-op.
    pub(crate) fn declare_function(
        &mut self,
        decl: &'ast FunctionDecl<'ast>,
    ) -> Result<(), VmError> {
        if self.is_declared(decl) {
            return Ok(());
        }
        let mut func = Function::user(decl.name, decl.params, decl.body);
        func.by_ref_return = decl.by_ref;
        if self.context.declare_function(func).is_none() {
            return Err(VmError::RuntimeError(format!(
                "Cannot redeclare {}()",
                String::from_utf8_lossy(decl.name)
            )));
        }
        self.mark_declared(decl);
        Ok(())
    }

    /// String conversion that honors `__toString`
    /// Reference: $PHP_SRC_PATH/Zend/zend_operators.c - zval_try_get_string_func
    pub(crate) fn to_string_val(&mut self, v: &Val) -> Result<Rc<Vec<u8>>, VmError> {
        let v = v.deref();
        if let Val::Object(obj) = &v {
            let method = obj.borrow().class.magic.to_string;
            if let Some(method) = method {
                let result = self.call_method(obj, method, ArgList::new())?;
                return match result.deref() {
                    Val::String(s) => Ok(s),
                    other => Err(VmError::TypeError(format!(
                        "{}::__toString(): Return value must be of type string, {} returned",
                        obj.borrow().class_name_lossy(),
                        other.type_name()
                    ))),
                };
            }
        }
        Ok(crate::vm::type_conversion::to_string_bytes(
            &mut self.engine,
            &v,
        ))
    }
}

/// Map the outcome of a function body or program to its value
pub(crate) fn finish_flow(flow: Flow<'_>) -> Result<Val, VmError> {
    match flow {
        Flow::Normal => Ok(Val::Null),
        Flow::Return(v) => Ok(v),
        Flow::Break(_) => Err(VmError::RuntimeError(
            "'break' not in the 'loop' or 'switch' context".into(),
        )),
        Flow::Continue(_) => Err(VmError::RuntimeError(
            "'continue' not in the 'loop' or 'switch' context".into(),
        )),
        Flow::Goto(label) => Err(VmError::RuntimeError(format!(
            "'goto' to undefined label '{}'",
            String::from_utf8_lossy(label)
        ))),
    }
}

/// JSON globals from the configuration become PHP values; objects become
/// associative arrays.
pub fn json_to_val(value: &serde_json::Value) -> Val {
    match value {
        serde_json::Value::Null => Val::Null,
        serde_json::Value::Bool(b) => Val::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Val::Int(i),
            None => Val::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Val::string(s.as_bytes()),
        serde_json::Value::Array(items) => {
            Val::array(ArrayData::from_values(items.iter().map(json_to_val)))
        }
        serde_json::Value::Object(map) => Val::array(
            map.iter()
                .map(|(k, v)| (ArrayKey::numeric(k.as_bytes()), json_to_val(v)))
                .collect(),
        ),
    }
}

/// Execute a program with the given configuration
///
/// # Returns
///
/// * `Ok(ExecutionResult)` - the program ran to completion or called `exit`
/// * `Err(VmError)` - a fatal error or an uncaught thrown value
pub fn execute_program<'ast>(
    program: &Program<'ast>,
    config: ExecutionConfig,
) -> Result<ExecutionResult, VmError> {
    let start = std::time::Instant::now();
    let mut executor = Executor::with_config(&config);

    let captured_stdout = Rc::new(RefCell::new(Vec::<u8>::new()));
    let captured_stderr = Rc::new(RefCell::new(Vec::<u8>::new()));

    if config.capture_output {
        let stdout_clone = captured_stdout.clone();
        executor
            .engine
            .set_output_writer(Box::new(CapturingOutputWriter::new(move |bytes| {
                stdout_clone.borrow_mut().extend_from_slice(bytes);
            })));

        let stderr_clone = captured_stderr.clone();
        executor
            .engine
            .set_error_handler(Box::new(CapturingErrorHandler::new(move |level, message| {
                let formatted = format!("{}: {}\n", level.label(), message);
                stderr_clone
                    .borrow_mut()
                    .extend_from_slice(formatted.as_bytes());
            })));
    }

    let (value, exit_code) = match executor.run(program) {
        Ok(value) => (value, None),
        Err(VmError::Exit(code)) => (Val::Null, Some(code)),
        Err(e) => return Err(e),
    };

    let stdout = String::from_utf8_lossy(&captured_stdout.borrow()).into_owned();
    let stderr = String::from_utf8_lossy(&captured_stderr.borrow()).into_owned();

    Ok(ExecutionResult {
        value,
        stdout,
        stderr,
        duration_us: start.elapsed().as_micros() as u64,
        exit_code,
    })
}
