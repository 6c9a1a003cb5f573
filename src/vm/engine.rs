//! Engine Core
//!
//! Shared runtime state that every operator and the executor write through:
//! diagnostics, program output and the few engine-wide knobs.
//!
//! ## Error Handling
//!
//! Three tiers:
//! - **Notices/warnings**: reported through [`Engine::report_error`], evaluation
//!   continues with a best-effort value
//! - **Engine errors**: returned as [`VmError`] and propagated with `?`
//! - **Internal invariants**: `unreachable!`, never recoverable
//!
//! ## Error Reporting
//!
//! Every diagnostic is recorded as the last error. It reaches the
//! [`ErrorHandler`] only when its level is enabled in `error_reporting`
//! and no `@` silence is active.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/main/main.c` - php_error_cb
//! - Zend: `$PHP_SRC_PATH/Zend/zend_errors.h` - E_* constants

use crate::core::value::Val;
use std::io::{self, Write};

#[derive(Debug)]
pub enum VmError {
    /// Type error during operation (TypeError in PHP)
    TypeError(String),
    /// Binary operator applied to operands it cannot handle
    UnsupportedOperandTypes {
        op: &'static str,
        left: String,
        right: String,
    },
    /// `%` with a zero divisor
    ModuloByZero,
    /// Shift by a negative amount
    ArithmeticError(String),
    /// Argument of the right type but outside the accepted domain
    ValueError(String),
    /// Values that have no ordering relation
    NotComparable,
    /// Undefined function call
    UndefinedFunction { name: String },
    /// Undefined method call
    UndefinedMethod { class: String, method: String },
    /// Class lookup failed
    UndefinedClass { name: String },
    /// Constant lookup failed
    UndefinedConstant { name: String },
    /// Syntax this engine does not execute
    Unsupported(&'static str),
    /// Generic runtime error
    RuntimeError(String),
    /// Value passed to `throw` that nothing caught
    Thrown(Val),
    /// `exit`/`die` with the given status
    Exit(i64),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::TypeError(msg) => write!(f, "{}", msg),
            VmError::UnsupportedOperandTypes { op, left, right } => {
                write!(f, "Unsupported operand types: {} {} {}", left, op, right)
            }
            VmError::ModuloByZero => write!(f, "Modulo by zero"),
            VmError::ArithmeticError(msg) | VmError::ValueError(msg) => write!(f, "{}", msg),
            VmError::NotComparable => write!(f, "Values are not comparable"),
            VmError::UndefinedFunction { name } => {
                write!(f, "Call to undefined function {}()", name)
            }
            VmError::UndefinedMethod { class, method } => {
                write!(f, "Call to undefined method {}::{}()", class, method)
            }
            VmError::UndefinedClass { name } => write!(f, "Class \"{}\" not found", name),
            VmError::UndefinedConstant { name } => {
                write!(f, "Undefined constant \"{}\"", name)
            }
            VmError::Unsupported(what) => write!(f, "Unsupported: {}", what),
            VmError::RuntimeError(msg) => write!(f, "{}", msg),
            VmError::Thrown(_) => write!(f, "Uncaught exception"),
            VmError::Exit(code) => write!(f, "exit({})", code),
        }
    }
}

impl std::error::Error for VmError {}

/// PHP error levels matching Zend constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,            // E_ERROR
    Warning,          // E_WARNING
    Notice,           // E_NOTICE
    UserError,        // E_USER_ERROR
    UserWarning,      // E_USER_WARNING
    UserNotice,       // E_USER_NOTICE
    RecoverableError, // E_RECOVERABLE_ERROR
    Deprecated,       // E_DEPRECATED
}

pub const E_ALL: u32 = 32767;

impl ErrorLevel {
    /// Convert error level to the corresponding bitmask value
    pub fn to_bitmask(self) -> u32 {
        match self {
            ErrorLevel::Error => 1,
            ErrorLevel::Warning => 2,
            ErrorLevel::Notice => 8,
            ErrorLevel::UserError => 256,
            ErrorLevel::UserWarning => 512,
            ErrorLevel::UserNotice => 1024,
            ErrorLevel::RecoverableError => 4096,
            ErrorLevel::Deprecated => 8192,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorLevel::Error => "Fatal error",
            ErrorLevel::Warning => "Warning",
            ErrorLevel::Notice => "Notice",
            ErrorLevel::UserError => "User error",
            ErrorLevel::UserWarning => "User warning",
            ErrorLevel::UserNotice => "User notice",
            ErrorLevel::RecoverableError => "Recoverable fatal error",
            ErrorLevel::Deprecated => "Deprecated",
        }
    }
}

pub trait ErrorHandler {
    /// Report an error/warning/notice at runtime
    fn report(&mut self, level: ErrorLevel, message: &str);
}

/// Default error handler that writes to stderr
pub struct StderrErrorHandler {
    stderr: io::Stderr,
}

impl Default for StderrErrorHandler {
    fn default() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }
}

impl ErrorHandler for StderrErrorHandler {
    fn report(&mut self, level: ErrorLevel, message: &str) {
        let _ = writeln!(self.stderr, "{}: {}", level.label(), message);
        let _ = self.stderr.flush();
    }
}

/// Capturing error handler for testing and output capture
pub struct CapturingErrorHandler<F: FnMut(ErrorLevel, &str)> {
    callback: F,
}

impl<F: FnMut(ErrorLevel, &str)> CapturingErrorHandler<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(ErrorLevel, &str)> ErrorHandler for CapturingErrorHandler<F> {
    fn report(&mut self, level: ErrorLevel, message: &str) {
        (self.callback)(level, message);
    }
}

pub trait OutputWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), VmError>;
    fn flush(&mut self) -> Result<(), VmError> {
        Ok(())
    }
}

pub struct StdoutWriter {
    stdout: io::Stdout,
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl OutputWriter for StdoutWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        self.stdout
            .write_all(bytes)
            .map_err(|e| VmError::RuntimeError(format!("Failed to write output: {}", e)))
    }

    fn flush(&mut self) -> Result<(), VmError> {
        self.stdout
            .flush()
            .map_err(|e| VmError::RuntimeError(format!("Failed to flush output: {}", e)))
    }
}

/// Capturing output writer for testing
pub struct CapturingOutputWriter<F: FnMut(&[u8])> {
    callback: F,
}

impl<F: FnMut(&[u8])> CapturingOutputWriter<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: FnMut(&[u8])> OutputWriter for CapturingOutputWriter<F> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        (self.callback)(bytes);
        Ok(())
    }
}

/// Last reported diagnostic (error_get_last)
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub level: ErrorLevel,
    pub message: String,
}

/// Engine-wide state shared by the operators and the executor
pub struct Engine {
    output_writer: Box<dyn OutputWriter>,
    error_handler: Box<dyn ErrorHandler>,
    pub error_reporting: u32,
    /// Significant digits when a float becomes a string
    pub precision: usize,
    pub strict_types: bool,
    pub last_error: Option<ErrorInfo>,
    silence_depth: u32,
    next_object_handle: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            output_writer: Box::new(StdoutWriter::default()),
            error_handler: Box::new(StderrErrorHandler::default()),
            error_reporting: E_ALL,
            precision: 14,
            strict_types: false,
            last_error: None,
            silence_depth: 0,
            next_object_handle: 1,
        }
    }

    pub fn set_output_writer(&mut self, writer: Box<dyn OutputWriter>) {
        self.output_writer = writer;
    }

    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.error_handler = handler;
    }

    /// Report an error respecting the error_reporting level
    /// Also stores the error as `last_error`
    pub fn report_error(&mut self, level: ErrorLevel, message: &str) {
        self.last_error = Some(ErrorInfo {
            level,
            message: message.to_string(),
        });

        if self.silence_depth > 0 {
            return;
        }
        if (self.error_reporting & level.to_bitmask()) != 0 {
            self.error_handler.report(level, message);
        }
    }

    pub fn notice(&mut self, message: &str) {
        self.report_error(ErrorLevel::Notice, message);
    }

    pub fn warning(&mut self, message: &str) {
        self.report_error(ErrorLevel::Warning, message);
    }

    pub fn deprecated(&mut self, message: &str) {
        self.report_error(ErrorLevel::Deprecated, message);
    }

    /// `@` operator: suppress handler output until the matching `unsilence`
    pub fn silence(&mut self) {
        self.silence_depth += 1;
    }

    pub fn unsilence(&mut self) {
        self.silence_depth = self.silence_depth.saturating_sub(1);
    }

    pub fn write_output(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        self.output_writer.write(bytes)
    }

    pub fn flush_output(&mut self) -> Result<(), VmError> {
        self.output_writer.flush()
    }

    /// Process-unique object identifier
    pub fn next_object_handle(&mut self) -> u64 {
        let handle = self.next_object_handle;
        self.next_object_handle += 1;
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capturing_engine() -> (Engine, Rc<RefCell<Vec<(ErrorLevel, String)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut engine = Engine::new();
        engine.set_error_handler(Box::new(CapturingErrorHandler::new(move |level, msg| {
            sink.borrow_mut().push((level, msg.to_string()));
        })));
        (engine, seen)
    }

    #[test]
    fn test_error_reporting_mask_filters_handler() {
        let (mut engine, seen) = capturing_engine();
        engine.error_reporting = E_ALL & !ErrorLevel::Notice.to_bitmask();
        engine.notice("hidden");
        engine.warning("shown");
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].1, "shown");
    }

    #[test]
    fn test_last_error_recorded_even_when_silenced() {
        let (mut engine, seen) = capturing_engine();
        engine.silence();
        engine.warning("quiet");
        engine.unsilence();
        assert!(seen.borrow().is_empty());
        assert_eq!(
            engine.last_error,
            Some(ErrorInfo {
                level: ErrorLevel::Warning,
                message: "quiet".to_string()
            })
        );
    }

    #[test]
    fn test_display_messages() {
        let err = VmError::UnsupportedOperandTypes {
            op: "+",
            left: "array".into(),
            right: "int".into(),
        };
        assert_eq!(err.to_string(), "Unsupported operand types: array + int");
        assert_eq!(VmError::ModuloByZero.to_string(), "Modulo by zero");
    }

    #[test]
    fn test_object_handles_are_unique() {
        let mut engine = Engine::new();
        let a = engine.next_object_handle();
        let b = engine.next_object_handle();
        assert_ne!(a, b);
    }
}
