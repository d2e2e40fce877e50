// Copyright (c) 2016-2020 Fabian Schuiki

//! Statement binding.
//!
//! Statements are bound lazily: subroutine bodies, procedural blocks, and
//! sequential blocks hold a [`StatementBinder`] that maps their syntax to
//! bound statements on first query. Variable declarations encountered while
//! binding introduce symbols into the enclosing scope, so that later
//! statements can refer to them.

use crate::ast;
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::declared::DeclaredType;
use crate::expr::{self, BindContext, BindFlags, Expression};
use crate::scope::{LookupLocation, Scope};
use crate::symbol::{
    SequentialBlockSymbol, Symbol, SymbolKind, VariableSymbol,
};
use crate::ty::Type;
use std::cell::Cell;

/// A bound statement.
pub struct Statement<'a> {
    pub kind: StmtData<'a>,
    pub span: Span,
}

/// One arm of a bound case statement.
pub struct CaseItem<'a> {
    pub exprs: Vec<&'a Expression<'a>>,
    pub stmt: &'a Statement<'a>,
}

/// The different bound statements.
pub enum StmtData<'a> {
    Invalid,
    Empty,
    List(Vec<&'a Statement<'a>>),
    Block {
        block: &'a Symbol<'a>,
        body: &'a Statement<'a>,
    },
    Expr(&'a Expression<'a>),
    VarDecl(Vec<&'a Symbol<'a>>),
    Return(Option<&'a Expression<'a>>),
    Break,
    Continue,
    Conditional {
        cond: &'a Expression<'a>,
        if_true: &'a Statement<'a>,
        if_false: Option<&'a Statement<'a>>,
    },
    Case {
        cond: &'a Expression<'a>,
        items: Vec<CaseItem<'a>>,
        default: Option<&'a Statement<'a>>,
    },
    For {
        init: Vec<&'a Statement<'a>>,
        cond: Option<&'a Expression<'a>>,
        step: Vec<&'a Expression<'a>>,
        body: &'a Statement<'a>,
    },
    Repeat {
        count: &'a Expression<'a>,
        body: &'a Statement<'a>,
    },
    While {
        cond: &'a Expression<'a>,
        body: &'a Statement<'a>,
    },
    DoWhile {
        body: &'a Statement<'a>,
        cond: &'a Expression<'a>,
    },
    Forever {
        body: &'a Statement<'a>,
    },
    Timed {
        body: &'a Statement<'a>,
    },
    Assertion {
        cond: &'a Expression<'a>,
    },
}

/// Lazily binds the statements of a symbol's body.
pub struct StatementBinder<'a> {
    single: Cell<Option<&'a ast::Stmt>>,
    list: Cell<Option<&'a [ast::Stmt]>>,
    bound: Cell<Option<&'a Statement<'a>>>,
    binding: Cell<bool>,
}

impl<'a> StatementBinder<'a> {
    /// Create an empty binder.
    pub fn new() -> StatementBinder<'a> {
        StatementBinder {
            single: Cell::new(None),
            list: Cell::new(None),
            bound: Cell::new(None),
            binding: Cell::new(false),
        }
    }

    /// Set the statement syntax.
    pub fn set_stmt(&self, stmt: &'a ast::Stmt) {
        self.single.set(Some(stmt));
        self.bound.set(None);
    }

    /// Set a list of statement syntax items.
    pub fn set_items(&self, items: &'a [ast::Stmt]) {
        self.list.set(Some(items));
        self.bound.set(None);
    }

    /// Bind the body on first query.
    pub fn get_statement(
        &self,
        cx: &Compilation<'a>,
        owner: &'a Symbol<'a>,
    ) -> &'a Statement<'a> {
        if let Some(stmt) = self.bound.get() {
            return stmt;
        }
        if self.binding.get() {
            return alloc_stmt(cx, StmtData::Invalid, owner.span);
        }
        self.binding.set(true);

        // Bodies with their own scope bind inside it; procedural blocks bind
        // in the enclosing scope at their location.
        let (scope, ret_ty) = match &owner.kind {
            SymbolKind::Subroutine(sub) => {
                let ret = match sub.kind {
                    ast::SubroutineKind::Function => Some(sub.return_type.ty(cx, owner)),
                    ast::SubroutineKind::Task => None,
                };
                (owner.scope().unwrap(), ret)
            }
            _ => match owner.scope() {
                Some(scope) => (scope, None),
                None => (
                    owner.parent_scope().expect("statement owner without scope"),
                    None,
                ),
            },
        };
        let mut binder = Binder {
            cx,
            scope,
            ret_ty,
        };
        let stmt = match (self.single.get(), self.list.get()) {
            (Some(single), _) => binder.bind_stmt(single),
            (None, Some(list)) => {
                let stmts = binder.bind_stmt_list(list);
                alloc_stmt(cx, StmtData::List(stmts), owner.span)
            }
            (None, None) => alloc_stmt(cx, StmtData::Empty, owner.span),
        };
        self.bound.set(Some(stmt));
        self.binding.set(false);
        stmt
    }
}

fn alloc_stmt<'a>(cx: &Compilation<'a>, kind: StmtData<'a>, span: Span) -> &'a Statement<'a> {
    cx.alloc_stmt(Statement { kind, span })
}

struct Binder<'cx, 'a> {
    cx: &'cx Compilation<'a>,
    scope: &'a Scope<'a>,
    ret_ty: Option<Type<'a>>,
}

impl<'cx, 'a> Binder<'cx, 'a> {
    fn ctx(&self) -> BindContext<'a> {
        BindContext {
            scope: self.scope,
            location: LookupLocation::max(),
            flags: BindFlags::empty(),
        }
    }

    fn bind_expr(&self, syntax: &'a ast::Expr) -> &'a Expression<'a> {
        expr::bind_expr(self.cx, &self.ctx(), syntax)
    }

    fn bind_stmt_list(&mut self, stmts: &'a [ast::Stmt]) -> Vec<&'a Statement<'a>> {
        stmts.iter().map(|s| self.bind_stmt(s)).collect()
    }

    fn bind_stmt(&mut self, syntax: &'a ast::Stmt) -> &'a Statement<'a> {
        let cx = self.cx;
        let span = syntax.span;
        let kind = match &syntax.kind {
            ast::StmtKind::Empty => StmtData::Empty,
            ast::StmtKind::Block { label, stmts } => {
                let name = label.map(|l| l.value).unwrap_or_else(crate::compilation::empty_name);
                let block = cx.alloc_symbol(Symbol::new(
                    name,
                    span,
                    SymbolKind::SequentialBlock(SequentialBlockSymbol {
                        scope: Scope::new(),
                        binder: StatementBinder::new(),
                    }),
                ));
                self.scope.add_member(block);
                let mut inner = Binder {
                    cx,
                    scope: block.scope().unwrap(),
                    ret_ty: self.ret_ty,
                };
                let stmts = inner.bind_stmt_list(stmts);
                let body = alloc_stmt(cx, StmtData::List(stmts), span);
                StmtData::Block { block, body }
            }
            ast::StmtKind::Expr(e) => StmtData::Expr(self.bind_expr(e)),
            ast::StmtKind::VarDecl(decl) => StmtData::VarDecl(self.bind_var_decl(decl)),
            ast::StmtKind::Return(value) => match (value, self.ret_ty) {
                (Some(v), Some(ret)) => StmtData::Return(Some(expr::bind_with_target(
                    cx,
                    &self.ctx(),
                    v,
                    ret,
                    v.span,
                ))),
                (Some(v), None) => StmtData::Return(Some(self.bind_expr(v))),
                (None, _) => StmtData::Return(None),
            },
            ast::StmtKind::Break => StmtData::Break,
            ast::StmtKind::Continue => StmtData::Continue,
            ast::StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => StmtData::Conditional {
                cond: self.bind_expr(cond),
                if_true: self.bind_stmt(then_stmt),
                if_false: else_stmt.as_ref().map(|s| self.bind_stmt(s)),
            },
            ast::StmtKind::Case { cond, items } => {
                let cond = self.bind_expr(cond);
                let mut bound_items = vec![];
                let mut default = None;
                for item in items {
                    let stmt = self.bind_stmt(&item.stmt);
                    if item.exprs.is_empty() {
                        if default.is_none() {
                            default = Some(stmt);
                        }
                        continue;
                    }
                    let exprs = item
                        .exprs
                        .iter()
                        .map(|e| {
                            let bound = self.bind_expr(e);
                            expr::convert_assignment(cx, cond.ty, bound, e.span)
                        })
                        .collect();
                    bound_items.push(CaseItem { exprs, stmt });
                }
                StmtData::Case {
                    cond,
                    items: bound_items,
                    default,
                }
            }
            ast::StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                // The loop gets its own block so that declared iteration
                // variables stay local.
                let block = cx.alloc_symbol(Symbol::new(
                    crate::compilation::empty_name(),
                    span,
                    SymbolKind::SequentialBlock(SequentialBlockSymbol {
                        scope: Scope::new(),
                        binder: StatementBinder::new(),
                    }),
                ));
                self.scope.add_member(block);
                let mut inner = Binder {
                    cx,
                    scope: block.scope().unwrap(),
                    ret_ty: self.ret_ty,
                };
                let init = inner.bind_stmt_list(init);
                let cond = cond.as_ref().map(|c| inner.bind_expr(c));
                let step = step.iter().map(|s| inner.bind_expr(s)).collect();
                let body = inner.bind_stmt(body);
                let for_stmt = alloc_stmt(
                    cx,
                    StmtData::For {
                        init,
                        cond,
                        step,
                        body,
                    },
                    span,
                );
                StmtData::Block {
                    block,
                    body: for_stmt,
                }
            }
            ast::StmtKind::Repeat { count, body } => StmtData::Repeat {
                count: self.bind_expr(count),
                body: self.bind_stmt(body),
            },
            ast::StmtKind::While { cond, body } => StmtData::While {
                cond: self.bind_expr(cond),
                body: self.bind_stmt(body),
            },
            ast::StmtKind::DoWhile { body, cond } => StmtData::DoWhile {
                body: self.bind_stmt(body),
                cond: self.bind_expr(cond),
            },
            ast::StmtKind::Forever { body } => StmtData::Forever {
                body: self.bind_stmt(body),
            },
            ast::StmtKind::Timed { control: _, stmt } => StmtData::Timed {
                body: self.bind_stmt(stmt),
            },
            ast::StmtKind::Assert { cond } => StmtData::Assertion {
                cond: self.bind_expr(cond),
            },
        };
        alloc_stmt(cx, kind, span)
    }

    fn bind_var_decl(&mut self, decl: &'a ast::VarDecl) -> Vec<&'a Symbol<'a>> {
        let cx = self.cx;
        let mut syms = vec![];
        for declarator in &decl.decls {
            let declared = DeclaredType::new();
            declared.set_type_syntax(&decl.ty);
            declared.set_from_declarator(declarator);
            let var = cx.alloc_symbol(Symbol::new(
                declarator.name.value,
                declarator.name.span,
                SymbolKind::Variable(VariableSymbol { declared }),
            ));
            self.scope.add_member(var);
            syms.push(var);
        }
        syms
    }
}
