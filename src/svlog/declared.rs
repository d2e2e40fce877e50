// Copyright (c) 2016-2020 Fabian Schuiki

//! Glue logic between symbols and their declared types.
//!
//! Every value-bearing symbol owns exactly one [`DeclaredType`], which ties
//! a syntactic type expression, an optional dimension list, and an optional
//! initializer to a concrete type and a bound initializer expression. Both
//! are resolved lazily on first query and memoized. Resolution is guarded
//! against re-entry: a circular declaration produces a diagnostic and the
//! error type rather than recursing.

use crate::ast;
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::expr::{self, BindContext, BindFlags, Expression};
use crate::scope::LookupLocation;
use crate::symbol::{Symbol, SymbolKind};
use crate::ty::{self, Type};
use crate::value::ConstantValue;
use bitflags::bitflags;
use std::cell::Cell;

bitflags! {
    /// Flags that alter how a declared type resolves.
    pub struct DeclaredTypeFlags: u8 {
        /// Adopt the initializer's type when the type syntax is implicit.
        const INFER_IMPLICIT = 0b00001;
        /// Bind the initializer in a constant context and record its value.
        const REQUIRE_CONSTANT = 0b00010;
        /// Force the resolved type to be signed.
        const FORCE_SIGNED = 0b00100;
        /// Resolve names after all declarations instead of at the parent
        /// symbol's location.
        const LOOKUP_MAX = 0b01000;
        /// The initializer targets the base type of an enum.
        const ENUM_INITIALIZER = 0b10000;
    }
}

/// The lazily resolved type and initializer of a value symbol.
pub struct DeclaredType<'a> {
    type_syntax: Cell<Option<&'a ast::DataType>>,
    dims_syntax: Cell<Option<&'a [ast::Dim]>>,
    init_syntax: Cell<Option<&'a ast::Expr>>,
    init_location: Cell<Span>,
    flags: Cell<DeclaredTypeFlags>,
    resolved: Cell<Option<Type<'a>>>,
    initializer: Cell<Option<&'a Expression<'a>>>,
    evaluating: Cell<bool>,
}

impl<'a> DeclaredType<'a> {
    /// Create an empty declared type.
    pub fn new() -> DeclaredType<'a> {
        DeclaredType {
            type_syntax: Cell::new(None),
            dims_syntax: Cell::new(None),
            init_syntax: Cell::new(None),
            init_location: Cell::new(silica_common::source::INVALID_SPAN),
            flags: Cell::new(DeclaredTypeFlags::empty()),
            resolved: Cell::new(None),
            initializer: Cell::new(None),
            evaluating: Cell::new(false),
        }
    }

    /// Create a declared type with the given flags.
    pub fn with_flags(flags: DeclaredTypeFlags) -> DeclaredType<'a> {
        let dt = DeclaredType::new();
        dt.flags.set(flags);
        dt
    }

    /// Add resolution flags.
    pub fn add_flags(&self, flags: DeclaredTypeFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    /// The current resolution flags.
    pub fn flags(&self) -> DeclaredTypeFlags {
        self.flags.get()
    }

    /// Set the type syntax, clearing any memoized resolution.
    pub fn set_type_syntax(&self, syntax: &'a ast::DataType) {
        self.type_syntax.set(Some(syntax));
        self.clear_resolved();
    }

    /// Set the unpacked dimension syntax, clearing any memoized resolution.
    pub fn set_dims_syntax(&self, dims: &'a [ast::Dim]) {
        if dims.is_empty() {
            return;
        }
        self.dims_syntax.set(Some(dims));
        self.clear_resolved();
    }

    /// Set the initializer syntax together with the location of its `=`
    /// token, clearing any memoized initializer. This is the mechanism used
    /// when a parameter override substitutes a new initializer.
    pub fn set_initializer_syntax(&self, expr: &'a ast::Expr, equals: Span) {
        self.init_syntax.set(Some(expr));
        self.init_location.set(equals);
        self.initializer.set(None);
    }

    /// Install a resolved type directly.
    pub fn set_type(&self, ty: Type<'a>) {
        self.resolved.set(Some(ty));
    }

    /// Take the declarator's dimensions and initializer.
    pub fn set_from_declarator(&self, decl: &'a ast::Declarator) {
        self.set_dims_syntax(&decl.dims);
        if let Some(init) = &decl.init {
            self.set_initializer_syntax(&init.expr, init.equals);
        }
    }

    /// Copy type syntax (or the resolved type) from another declared type.
    pub fn copy_type_from(&self, source: &DeclaredType<'a>) {
        if let Some(ts) = source.type_syntax.get() {
            self.set_type_syntax(ts);
            if let Some(dims) = source.dims_syntax.get() {
                self.set_dims_syntax(dims);
            }
        }
        if let Some(ty) = source.resolved.get() {
            self.set_type(ty);
        }
        self.flags.set(source.flags.get());
    }

    /// Copy everything from another declared type: syntax, flags, and the
    /// memoized type and initializer. Used when cloning parameters into an
    /// instance so that the clones share the override's evaluation while
    /// keeping independent memoization once reset.
    pub fn clone_from_declared(&self, source: &DeclaredType<'a>) {
        self.type_syntax.set(source.type_syntax.get());
        self.dims_syntax.set(source.dims_syntax.get());
        self.init_syntax.set(source.init_syntax.get());
        self.init_location.set(source.init_location.get());
        self.flags.set(source.flags.get());
        self.resolved.set(source.resolved.get());
        self.initializer.set(source.initializer.get());
    }

    /// Force the resolved type to be signed, discarding prior resolution.
    pub fn set_force_signed(&self) {
        self.add_flags(DeclaredTypeFlags::FORCE_SIGNED);
        self.clear_resolved();
    }

    /// Drop the memoized type and initializer.
    pub fn clear_resolved(&self) {
        self.resolved.set(None);
        self.initializer.set(None);
    }

    /// The stored type syntax, if any.
    pub fn type_syntax(&self) -> Option<&'a ast::DataType> {
        self.type_syntax.get()
    }

    /// The stored initializer syntax, if any.
    pub fn init_syntax(&self) -> Option<&'a ast::Expr> {
        self.init_syntax.get()
    }

    /// Whether the type has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn bind_context(&self, owner: &'a Symbol<'a>) -> BindContext<'a> {
        let scope = owner
            .parent_scope()
            .expect("declared type owner not installed in a scope");
        let location = if self.flags.get().contains(DeclaredTypeFlags::LOOKUP_MAX) {
            LookupLocation::max()
        } else {
            LookupLocation::after(owner)
        };
        let mut flags = BindFlags::empty();
        if self.flags.get().contains(DeclaredTypeFlags::REQUIRE_CONSTANT) {
            flags |= BindFlags::CONSTANT;
        }
        BindContext {
            scope,
            location,
            flags,
        }
    }

    /// Resolve the type of the declaration.
    pub fn ty(&self, cx: &Compilation<'a>, owner: &'a Symbol<'a>) -> Type<'a> {
        if let Some(ty) = self.resolved.get() {
            return ty;
        }
        if self.evaluating.get() {
            cx.emit(
                Diag::new(DiagCode::RecursiveDefinition)
                    .arg(owner.name)
                    .span(owner.span),
            );
            let err = cx.error_type();
            self.resolved.set(Some(err));
            return err;
        }
        self.evaluating.set(true);
        let result = self.resolve_type(cx, owner);
        self.evaluating.set(false);
        // A recursive resolution may have installed the error type already;
        // keep that result so the diagnostic is not repeated.
        if let Some(ty) = self.resolved.get() {
            return ty;
        }
        self.resolved.set(Some(result));
        result
    }

    fn resolve_type(&self, cx: &Compilation<'a>, owner: &'a Symbol<'a>) -> Type<'a> {
        let context = self.bind_context(owner);
        let type_syntax = match self.type_syntax.get() {
            Some(ts) => ts,
            None => return cx.error_type(),
        };

        if type_syntax.is_implicit_empty()
            && self.flags.get().contains(DeclaredTypeFlags::INFER_IMPLICIT)
        {
            // Bind the initializer first and adopt its type.
            let init_syntax = match self.init_syntax.get() {
                Some(is) => is,
                None => return cx.error_type(),
            };
            let init = expr::bind_expr(cx, &context, init_syntax);
            if context.flags.contains(BindFlags::CONSTANT) {
                expr::fold_constant(cx, init);
            }
            self.initializer.set(Some(init));
            return init.ty;
        }

        let mut ty = ty::type_from_syntax(
            cx,
            type_syntax,
            context.location,
            context.scope,
            self.flags.get().contains(DeclaredTypeFlags::FORCE_SIGNED),
        );
        if let Some(dims) = self.dims_syntax.get() {
            ty = ty::wrap_unpacked_dims(cx, ty, dims, context.location, context.scope);
        }
        ty
    }

    /// Resolve and bind the initializer expression.
    pub fn initializer(
        &self,
        cx: &Compilation<'a>,
        owner: &'a Symbol<'a>,
    ) -> Option<&'a Expression<'a>> {
        if let Some(init) = self.initializer.get() {
            return Some(init);
        }
        let init_syntax = self.init_syntax.get()?;

        // Resolving the type may already bind the initializer when the type
        // is inferred from it.
        let ty = self.ty(cx, owner);
        if let Some(init) = self.initializer.get() {
            return Some(init);
        }

        if self.evaluating.get() {
            cx.emit(
                Diag::new(DiagCode::RecursiveDefinition)
                    .arg(owner.name)
                    .span(owner.span),
            );
            return None;
        }
        self.evaluating.set(true);

        let mut context = self.bind_context(owner);
        // Enum values bind their initializers against the base type of the
        // enum, which unlike the enum itself admits ordinary integral
        // values.
        let mut target = ty;
        if self.flags.get().contains(DeclaredTypeFlags::ENUM_INITIALIZER) {
            if let SymbolKind::EnumType(e) = &ty.canonical(cx).0.kind {
                target = e.base;
                context.flags |= BindFlags::ENUM_INITIALIZER;
            }
        }

        let init = expr::bind_with_target(cx, &context, init_syntax, target, self.init_location.get());
        if context.flags.contains(BindFlags::CONSTANT) {
            expr::fold_constant(cx, init);
        }
        self.initializer.set(Some(init));
        self.evaluating.set(false);
        Some(init)
    }

    /// Resolve the type and bind the initializer in a caller-provided
    /// context instead of the owner's own. This is how parameter overrides
    /// are evaluated: the override expression names things at the
    /// instantiation site, not inside the definition.
    pub fn resolve_at(
        &self,
        cx: &Compilation<'a>,
        owner: &'a Symbol<'a>,
        context: &BindContext<'a>,
    ) {
        let init_syntax = match self.init_syntax.get() {
            Some(x) => x,
            None => return,
        };

        if self.resolved.get().is_none() {
            let infer = self
                .type_syntax
                .get()
                .map(|t| t.is_implicit_empty())
                .unwrap_or(false)
                && self.flags.get().contains(DeclaredTypeFlags::INFER_IMPLICIT);
            if infer {
                let init = expr::bind_expr(cx, context, init_syntax);
                if self.should_fold(context) {
                    expr::fold_constant(cx, init);
                }
                self.initializer.set(Some(init));
                self.resolved.set(Some(init.ty));
                return;
            }
            let _ = self.ty(cx, owner);
        }
        if self.initializer.get().is_some() {
            return;
        }

        let ty = self.resolved.get().unwrap_or_else(|| cx.error_type());
        let init = expr::bind_with_target(cx, context, init_syntax, ty, self.init_location.get());
        if self.should_fold(context) {
            expr::fold_constant(cx, init);
        }
        self.initializer.set(Some(init));
    }

    fn should_fold(&self, context: &BindContext<'a>) -> bool {
        context.flags.contains(BindFlags::CONSTANT)
            || self.flags.get().contains(DeclaredTypeFlags::REQUIRE_CONSTANT)
    }

    /// The constant value of the initializer, or invalid if there is none or
    /// it is not constant.
    pub fn constant_value(&self, cx: &Compilation<'a>, owner: &'a Symbol<'a>) -> ConstantValue {
        match self.initializer(cx, owner) {
            Some(init) => match init.constant() {
                Some(v) => v.clone(),
                None => ConstantValue::Invalid,
            },
            None => ConstantValue::Invalid,
        }
    }
}
