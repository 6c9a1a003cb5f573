//! Arena-backed constructor for syntax trees
//!
//! Hosts and tests use this to assemble programs without a parser:
//!
//! ```rust,ignore
//! let arena = bumpalo::Bump::new();
//! let b = AstBuilder::new(&arena);
//! let program = b.program(&[
//!     b.expr_stmt(b.assign(b.var("a"), b.array_list(&[b.int(1), b.int(2)]))),
//!     b.expr_stmt(b.assign(b.append(b.var("a")), b.int(3))),
//!     b.echo(&[b.call("count", &[b.var("a")])]),
//! ]);
//! ```

use crate::ast::*;
use crate::core::value::Visibility;
use bumpalo::Bump;
use std::cell::Cell;

pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
    line: Cell<u32>,
}

impl<'ast> AstBuilder<'ast> {
    pub fn new(arena: &'ast Bump) -> Self {
        Self {
            arena,
            line: Cell::new(1),
        }
    }

    /// Line recorded on nodes built from now on
    pub fn set_line(&self, line: u32) {
        self.line.set(line);
    }

    fn span(&self) -> Span {
        Span {
            start: 0,
            end: 0,
            line: self.line.get(),
        }
    }

    fn name(&self, s: &str) -> &'ast [u8] {
        self.arena.alloc_slice_copy(s.as_bytes())
    }

    fn expr(&self, e: Expr<'ast>) -> ExprId<'ast> {
        self.arena.alloc(e)
    }

    fn stmt(&self, s: Stmt<'ast>) -> StmtId<'ast> {
        self.arena.alloc(s)
    }

    fn exprs(&self, items: &[ExprId<'ast>]) -> &'ast [ExprId<'ast>] {
        self.arena.alloc_slice_copy(items)
    }

    pub fn block_of(&self, stmts: &[StmtId<'ast>]) -> &'ast [StmtId<'ast>] {
        self.arena.alloc_slice_copy(stmts)
    }

    pub fn program(&self, stmts: &[StmtId<'ast>]) -> Program<'ast> {
        Program {
            statements: self.block_of(stmts),
            span: self.span(),
        }
    }

    // Literals

    pub fn null(&self) -> ExprId<'ast> {
        self.expr(Expr::Null { span: self.span() })
    }

    pub fn bool(&self, value: bool) -> ExprId<'ast> {
        self.expr(Expr::Boolean {
            value,
            span: self.span(),
        })
    }

    pub fn int(&self, value: i64) -> ExprId<'ast> {
        self.expr(Expr::Integer {
            value,
            span: self.span(),
        })
    }

    pub fn float(&self, value: f64) -> ExprId<'ast> {
        self.expr(Expr::Float {
            value,
            span: self.span(),
        })
    }

    pub fn string(&self, value: &str) -> ExprId<'ast> {
        self.bytes(value.as_bytes())
    }

    pub fn bytes(&self, value: &[u8]) -> ExprId<'ast> {
        self.expr(Expr::String {
            value: self.arena.alloc_slice_copy(value),
            span: self.span(),
        })
    }

    /// `[v0, v1, ...]`
    pub fn array_list(&self, values: &[ExprId<'ast>]) -> ExprId<'ast> {
        let items = self.arena.alloc_slice_fill_iter(values.iter().map(|&v| ArrayItem {
            key: None,
            value: v,
            by_ref: false,
        }));
        self.expr(Expr::Array {
            items,
            span: self.span(),
        })
    }

    /// `[k0 => v0, ...]`
    pub fn array_map(&self, pairs: &[(ExprId<'ast>, ExprId<'ast>)]) -> ExprId<'ast> {
        let items = self.arena.alloc_slice_fill_iter(pairs.iter().map(|&(k, v)| ArrayItem {
            key: Some(k),
            value: v,
            by_ref: false,
        }));
        self.expr(Expr::Array {
            items,
            span: self.span(),
        })
    }

    pub fn array(&self, items: &[ArrayItem<'ast>]) -> ExprId<'ast> {
        self.expr(Expr::Array {
            items: self.arena.alloc_slice_copy(items),
            span: self.span(),
        })
    }

    // Variables and storage

    pub fn var(&self, name: &str) -> ExprId<'ast> {
        self.expr(Expr::Variable {
            name: self.name(name),
            span: self.span(),
        })
    }

    pub fn dim(&self, array: ExprId<'ast>, dim: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::ArrayDimFetch {
            array,
            dim: Some(dim),
            span: self.span(),
        })
    }

    /// `$a[]`
    pub fn append(&self, array: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::ArrayDimFetch {
            array,
            dim: None,
            span: self.span(),
        })
    }

    pub fn prop(&self, target: ExprId<'ast>, property: &str) -> ExprId<'ast> {
        self.expr(Expr::PropertyFetch {
            target,
            property: self.name(property),
            span: self.span(),
        })
    }

    pub fn static_prop(&self, class: ClassRef<'ast>, property: &str) -> ExprId<'ast> {
        self.expr(Expr::StaticPropertyFetch {
            class,
            property: self.name(property),
            span: self.span(),
        })
    }

    pub fn class_const(&self, class: ClassRef<'ast>, constant: &str) -> ExprId<'ast> {
        self.expr(Expr::ClassConstFetch {
            class,
            constant: self.name(constant),
            span: self.span(),
        })
    }

    pub fn constant(&self, name: &str) -> ExprId<'ast> {
        self.expr(Expr::ConstFetch {
            name: self.name(name),
            span: self.span(),
        })
    }

    pub fn class_named(&self, name: &str) -> ClassRef<'ast> {
        ClassRef::Named(self.name(name))
    }

    // Assignment

    pub fn assign(&self, var: ExprId<'ast>, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Assign {
            var,
            expr,
            span: self.span(),
        })
    }

    pub fn assign_ref(&self, var: ExprId<'ast>, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::AssignRef {
            var,
            expr,
            span: self.span(),
        })
    }

    pub fn assign_op(&self, var: ExprId<'ast>, op: AssignOp, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::AssignOp {
            var,
            op,
            expr,
            span: self.span(),
        })
    }

    /// `[$a, 'k' => $b] = ...` target; `None` skips a position
    pub fn list(&self, items: &[Option<(Option<ExprId<'ast>>, ExprId<'ast>)>]) -> ExprId<'ast> {
        let items = self.arena.alloc_slice_fill_iter(
            items
                .iter()
                .map(|&item| item.map(|(key, value)| ListItem { key, value })),
        );
        self.expr(Expr::List {
            items,
            span: self.span(),
        })
    }

    pub fn inc_dec(&self, var: ExprId<'ast>, kind: IncDecKind) -> ExprId<'ast> {
        self.expr(Expr::IncDec {
            var,
            kind,
            span: self.span(),
        })
    }

    pub fn pre_inc(&self, var: ExprId<'ast>) -> ExprId<'ast> {
        self.inc_dec(var, IncDecKind::PreInc)
    }

    pub fn post_inc(&self, var: ExprId<'ast>) -> ExprId<'ast> {
        self.inc_dec(var, IncDecKind::PostInc)
    }

    pub fn pre_dec(&self, var: ExprId<'ast>) -> ExprId<'ast> {
        self.inc_dec(var, IncDecKind::PreDec)
    }

    pub fn post_dec(&self, var: ExprId<'ast>) -> ExprId<'ast> {
        self.inc_dec(var, IncDecKind::PostDec)
    }

    // Operators

    pub fn binary(&self, left: ExprId<'ast>, op: BinaryOp, right: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Binary {
            left,
            op,
            right,
            span: self.span(),
        })
    }

    pub fn unary(&self, op: UnaryOp, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Unary {
            op,
            expr,
            span: self.span(),
        })
    }

    pub fn cast(&self, kind: CastKind, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Cast {
            kind,
            expr,
            span: self.span(),
        })
    }

    pub fn ternary(
        &self,
        condition: ExprId<'ast>,
        if_true: Option<ExprId<'ast>>,
        if_false: ExprId<'ast>,
    ) -> ExprId<'ast> {
        self.expr(Expr::Ternary {
            condition,
            if_true,
            if_false,
            span: self.span(),
        })
    }

    pub fn isset(&self, vars: &[ExprId<'ast>]) -> ExprId<'ast> {
        self.expr(Expr::Isset {
            vars: self.exprs(vars),
            span: self.span(),
        })
    }

    pub fn empty(&self, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Empty {
            expr,
            span: self.span(),
        })
    }

    pub fn instance_of(&self, expr: ExprId<'ast>, class: ClassRef<'ast>) -> ExprId<'ast> {
        self.expr(Expr::InstanceOf {
            expr,
            class,
            span: self.span(),
        })
    }

    pub fn print(&self, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Print {
            expr,
            span: self.span(),
        })
    }

    pub fn throw(&self, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Throw {
            expr,
            span: self.span(),
        })
    }

    pub fn exit(&self, expr: Option<ExprId<'ast>>) -> ExprId<'ast> {
        self.expr(Expr::Exit {
            expr,
            span: self.span(),
        })
    }

    /// `@expr`
    pub fn silence(&self, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::ErrorSuppress {
            expr,
            span: self.span(),
        })
    }

    pub fn magic(&self, kind: MagicConstKind) -> ExprId<'ast> {
        self.expr(Expr::MagicConst {
            kind,
            span: self.span(),
        })
    }

    pub fn closure(&self, params: &[Param<'ast>], body: &[StmtId<'ast>]) -> ExprId<'ast> {
        self.expr(Expr::Closure {
            params: self.arena.alloc_slice_copy(params),
            body: self.block_of(body),
            span: self.span(),
        })
    }

    pub fn yield_(&self, value: Option<ExprId<'ast>>) -> ExprId<'ast> {
        self.expr(Expr::Yield {
            value,
            span: self.span(),
        })
    }

    // Calls and objects

    pub fn call(&self, func: &str, args: &[ExprId<'ast>]) -> ExprId<'ast> {
        self.expr(Expr::Call {
            func: self.name(func),
            args: self.exprs(args),
            span: self.span(),
        })
    }

    pub fn method_call(
        &self,
        target: ExprId<'ast>,
        method: &str,
        args: &[ExprId<'ast>],
    ) -> ExprId<'ast> {
        self.expr(Expr::MethodCall {
            target,
            method: self.name(method),
            args: self.exprs(args),
            span: self.span(),
        })
    }

    pub fn static_call(
        &self,
        class: ClassRef<'ast>,
        method: &str,
        args: &[ExprId<'ast>],
    ) -> ExprId<'ast> {
        self.expr(Expr::StaticCall {
            class,
            method: self.name(method),
            args: self.exprs(args),
            span: self.span(),
        })
    }

    pub fn new_object(&self, class: ClassRef<'ast>, args: &[ExprId<'ast>]) -> ExprId<'ast> {
        self.expr(Expr::New {
            class,
            args: self.exprs(args),
            span: self.span(),
        })
    }

    pub fn clone_object(&self, expr: ExprId<'ast>) -> ExprId<'ast> {
        self.expr(Expr::Clone {
            expr,
            span: self.span(),
        })
    }

    // Statements

    pub fn echo(&self, exprs: &[ExprId<'ast>]) -> StmtId<'ast> {
        self.stmt(Stmt::Echo {
            exprs: self.exprs(exprs),
            span: self.span(),
        })
    }

    pub fn expr_stmt(&self, expr: ExprId<'ast>) -> StmtId<'ast> {
        self.stmt(Stmt::Expression {
            expr,
            span: self.span(),
        })
    }

    pub fn ret(&self, expr: Option<ExprId<'ast>>) -> StmtId<'ast> {
        self.stmt(Stmt::Return {
            expr,
            span: self.span(),
        })
    }

    pub fn if_(
        &self,
        condition: ExprId<'ast>,
        then_block: &[StmtId<'ast>],
        else_block: Option<&[StmtId<'ast>]>,
    ) -> StmtId<'ast> {
        self.stmt(Stmt::If {
            condition,
            then_block: self.block_of(then_block),
            else_block: else_block.map(|b| self.block_of(b)),
            span: self.span(),
        })
    }

    pub fn while_(&self, condition: ExprId<'ast>, body: &[StmtId<'ast>]) -> StmtId<'ast> {
        self.stmt(Stmt::While {
            condition,
            body: self.block_of(body),
            span: self.span(),
        })
    }

    pub fn do_while(&self, body: &[StmtId<'ast>], condition: ExprId<'ast>) -> StmtId<'ast> {
        self.stmt(Stmt::DoWhile {
            body: self.block_of(body),
            condition,
            span: self.span(),
        })
    }

    pub fn for_(
        &self,
        init: &[ExprId<'ast>],
        condition: &[ExprId<'ast>],
        loop_expr: &[ExprId<'ast>],
        body: &[StmtId<'ast>],
    ) -> StmtId<'ast> {
        self.stmt(Stmt::For {
            init: self.exprs(init),
            condition: self.exprs(condition),
            loop_expr: self.exprs(loop_expr),
            body: self.block_of(body),
            span: self.span(),
        })
    }

    pub fn foreach(
        &self,
        expr: ExprId<'ast>,
        key_var: Option<ExprId<'ast>>,
        value_var: ExprId<'ast>,
        by_ref: bool,
        body: &[StmtId<'ast>],
    ) -> StmtId<'ast> {
        self.stmt(Stmt::Foreach {
            expr,
            key_var,
            value_var,
            by_ref,
            body: self.block_of(body),
            span: self.span(),
        })
    }

    pub fn block(&self, statements: &[StmtId<'ast>]) -> StmtId<'ast> {
        self.stmt(Stmt::Block {
            statements: self.block_of(statements),
            span: self.span(),
        })
    }

    pub fn case(&self, condition: Option<ExprId<'ast>>, body: &[StmtId<'ast>]) -> Case<'ast> {
        Case {
            condition,
            body: self.block_of(body),
            span: self.span(),
        }
    }

    pub fn switch(&self, condition: ExprId<'ast>, cases: &[Case<'ast>]) -> StmtId<'ast> {
        self.stmt(Stmt::Switch {
            condition,
            cases: self.arena.alloc_slice_copy(cases),
            span: self.span(),
        })
    }

    pub fn break_(&self, level: u32) -> StmtId<'ast> {
        self.stmt(Stmt::Break {
            level,
            span: self.span(),
        })
    }

    pub fn continue_(&self, level: u32) -> StmtId<'ast> {
        self.stmt(Stmt::Continue {
            level,
            span: self.span(),
        })
    }

    pub fn goto(&self, label: &str) -> StmtId<'ast> {
        self.stmt(Stmt::Goto {
            label: self.name(label),
            span: self.span(),
        })
    }

    pub fn label(&self, name: &str) -> StmtId<'ast> {
        self.stmt(Stmt::Label {
            name: self.name(name),
            span: self.span(),
        })
    }

    pub fn try_(&self, body: &[StmtId<'ast>], finally: Option<&[StmtId<'ast>]>) -> StmtId<'ast> {
        self.stmt(Stmt::Try {
            body: self.block_of(body),
            finally: finally.map(|f| self.block_of(f)),
            span: self.span(),
        })
    }

    pub fn const_(&self, name: &str, value: ExprId<'ast>) -> StmtId<'ast> {
        let consts = self.arena.alloc_slice_copy(&[ConstItem {
            name: self.name(name),
            value,
        }]);
        self.stmt(Stmt::Const {
            consts,
            span: self.span(),
        })
    }

    pub fn global(&self, names: &[&str]) -> StmtId<'ast> {
        let vars = self
            .arena
            .alloc_slice_fill_iter(names.iter().map(|n| self.name(n)));
        self.stmt(Stmt::Global {
            vars,
            span: self.span(),
        })
    }

    pub fn static_var(&self, name: &str, default: Option<ExprId<'ast>>) -> StmtId<'ast> {
        let vars = self.arena.alloc_slice_copy(&[StaticVar {
            name: self.name(name),
            default,
        }]);
        self.stmt(Stmt::Static {
            vars,
            span: self.span(),
        })
    }

    pub fn unset(&self, vars: &[ExprId<'ast>]) -> StmtId<'ast> {
        self.stmt(Stmt::Unset {
            vars: self.exprs(vars),
            span: self.span(),
        })
    }

    pub fn inline_html(&self, value: &str) -> StmtId<'ast> {
        self.stmt(Stmt::InlineHtml {
            value: self.name(value),
            span: self.span(),
        })
    }

    pub fn halt(&self) -> StmtId<'ast> {
        self.stmt(Stmt::HaltCompiler { span: self.span() })
    }

    pub fn nop(&self) -> StmtId<'ast> {
        self.stmt(Stmt::Nop { span: self.span() })
    }

    // Declarations

    pub fn param(&self, name: &str) -> Param<'ast> {
        Param {
            name: self.name(name),
            default: None,
            by_ref: false,
        }
    }

    pub fn param_default(&self, name: &str, default: ExprId<'ast>) -> Param<'ast> {
        Param {
            name: self.name(name),
            default: Some(default),
            by_ref: false,
        }
    }

    pub fn param_ref(&self, name: &str) -> Param<'ast> {
        Param {
            name: self.name(name),
            default: None,
            by_ref: true,
        }
    }

    pub fn function(
        &self,
        name: &str,
        params: &[Param<'ast>],
        body: &[StmtId<'ast>],
    ) -> StmtId<'ast> {
        let decl = self.arena.alloc(FunctionDecl {
            name: self.name(name),
            params: self.arena.alloc_slice_copy(params),
            body: self.block_of(body),
            by_ref: false,
        });
        self.stmt(Stmt::Function {
            decl,
            span: self.span(),
        })
    }

    pub fn class(
        &self,
        name: &str,
        parent: Option<&str>,
        members: &[ClassMember<'ast>],
    ) -> StmtId<'ast> {
        self.class_with(name, parent, ClassModifiers::default(), members)
    }

    pub fn class_with(
        &self,
        name: &str,
        parent: Option<&str>,
        modifiers: ClassModifiers,
        members: &[ClassMember<'ast>],
    ) -> StmtId<'ast> {
        let decl = self.arena.alloc(ClassDecl {
            name: self.name(name),
            parent: parent.map(|p| self.name(p)),
            modifiers,
            members: self.arena.alloc_slice_copy(members),
        });
        self.stmt(Stmt::Class {
            decl,
            span: self.span(),
        })
    }

    pub fn property(
        &self,
        name: &str,
        default: Option<ExprId<'ast>>,
        visibility: Visibility,
    ) -> ClassMember<'ast> {
        ClassMember::Property {
            name: self.name(name),
            default,
            visibility,
            is_static: false,
            is_readonly: false,
        }
    }

    pub fn static_property(
        &self,
        name: &str,
        default: Option<ExprId<'ast>>,
        visibility: Visibility,
    ) -> ClassMember<'ast> {
        ClassMember::Property {
            name: self.name(name),
            default,
            visibility,
            is_static: true,
            is_readonly: false,
        }
    }

    /// `public readonly $name;`
    pub fn readonly_property(&self, name: &str) -> ClassMember<'ast> {
        ClassMember::Property {
            name: self.name(name),
            default: None,
            visibility: Visibility::Public,
            is_static: false,
            is_readonly: true,
        }
    }

    pub fn method(
        &self,
        name: &str,
        params: &[Param<'ast>],
        body: &[StmtId<'ast>],
        visibility: Visibility,
    ) -> ClassMember<'ast> {
        ClassMember::Method {
            name: self.name(name),
            params: self.arena.alloc_slice_copy(params),
            body: self.block_of(body),
            visibility,
            is_static: false,
        }
    }

    pub fn static_method(
        &self,
        name: &str,
        params: &[Param<'ast>],
        body: &[StmtId<'ast>],
        visibility: Visibility,
    ) -> ClassMember<'ast> {
        ClassMember::Method {
            name: self.name(name),
            params: self.arena.alloc_slice_copy(params),
            body: self.block_of(body),
            visibility,
            is_static: true,
        }
    }

    pub fn class_constant(&self, name: &str, value: ExprId<'ast>) -> ClassMember<'ast> {
        ClassMember::Const {
            name: self.name(name),
            value,
            visibility: Visibility::Public,
        }
    }
}
