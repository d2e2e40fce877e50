// Copyright (c) 2016-2020 Fabian Schuiki

//! Expression binding.
//!
//! The binder walks syntactic expressions and produces typed expression
//! nodes, applying the SystemVerilog width rules: each operator computes a
//! self-determined type from its operands, and context-determined positions
//! push the final type back down, inserting implicit conversions on operands
//! whose width or signedness changed.

use crate::ast;
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::scope::{LookupLocation, Scope};
use crate::svint::{Logic, SVInt};
use crate::symbol::{Symbol, SymbolKind};
use crate::syscall::SystemSubroutine;
use crate::ty::{self, IntegralFlags, Type};
use crate::value::{ConstantRange, ConstantValue};
use bitflags::bitflags;
use std::cell::Cell;

bitflags! {
    /// Flags that alter expression binding.
    pub struct BindFlags: u8 {
        /// The expression must be constant; fold and diagnose.
        const CONSTANT = 0b001;
        /// The expression initializes an enum value and binds against the
        /// enum's base type.
        const ENUM_INITIALIZER = 0b010;
        /// Hierarchical names are disallowed.
        const NO_HIERARCHICAL = 0b100;
    }
}

/// The context in which an expression is bound.
#[derive(Clone, Copy)]
pub struct BindContext<'a> {
    pub scope: &'a Scope<'a>,
    pub location: LookupLocation<'a>,
    pub flags: BindFlags,
}

impl<'a> BindContext<'a> {
    /// Create a context that binds within a scope, after all declarations.
    pub fn new(scope: &'a Scope<'a>) -> BindContext<'a> {
        BindContext {
            scope,
            location: LookupLocation::max(),
            flags: BindFlags::empty(),
        }
    }

    /// Create a constant-expression context.
    pub fn constant(scope: &'a Scope<'a>, location: LookupLocation<'a>) -> BindContext<'a> {
        BindContext {
            scope,
            location,
            flags: BindFlags::CONSTANT,
        }
    }
}

/// A bound expression.
pub struct Expression<'a> {
    pub kind: ExprKind<'a>,
    pub ty: Type<'a>,
    pub span: Span,
    constant: Cell<Option<&'a ConstantValue>>,
}

impl<'a> Expression<'a> {
    /// Whether binding of this expression failed.
    pub fn bad(&self) -> bool {
        match self.kind {
            ExprKind::Invalid => true,
            _ => self.ty.is_error(),
        }
    }

    /// The precomputed constant value, if evaluation succeeded against a
    /// pure context.
    pub fn constant(&self) -> Option<&'a ConstantValue> {
        self.constant.get()
    }

    /// Install the precomputed constant value.
    pub fn set_constant(&self, value: &'a ConstantValue) {
        self.constant.set(Some(value));
    }
}

/// The different bound expressions.
pub enum ExprKind<'a> {
    /// A binding failure. Evaluates to the invalid value without further
    /// diagnostics.
    Invalid,
    IntegerLiteral(SVInt),
    RealLiteral(f64),
    StringLiteral(String),
    NullLiteral,
    /// An unbased unsized literal; fills the context-determined width.
    UnbasedUnsized(Logic),
    /// A reference to a named value.
    NamedValue {
        symbol: &'a Symbol<'a>,
        hierarchical: bool,
    },
    Unary {
        op: ast::UnaryOp,
        operand: &'a Expression<'a>,
    },
    Binary {
        op: ast::BinaryOp,
        lhs: &'a Expression<'a>,
        rhs: &'a Expression<'a>,
    },
    Conditional {
        cond: &'a Expression<'a>,
        true_expr: &'a Expression<'a>,
        false_expr: &'a Expression<'a>,
    },
    Assignment {
        op: Option<ast::BinaryOp>,
        non_blocking: bool,
        lhs: &'a Expression<'a>,
        rhs: &'a Expression<'a>,
    },
    Concat {
        operands: Vec<&'a Expression<'a>>,
    },
    Replication {
        count: &'a Expression<'a>,
        concat: &'a Expression<'a>,
    },
    ElementSelect {
        value: &'a Expression<'a>,
        index: &'a Expression<'a>,
    },
    RangeSelect {
        mode: ast::RangeSelectMode,
        value: &'a Expression<'a>,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
        /// The concrete selection bounds, when they are known at bind time.
        bounds: Option<(i32, i32)>,
    },
    MemberAccess {
        value: &'a Expression<'a>,
        field: &'a Symbol<'a>,
    },
    Call {
        target: CallTarget<'a>,
        args: Vec<&'a Expression<'a>>,
        location: LookupLocation<'a>,
    },
    /// An implicit or explicit conversion.
    Conversion {
        operand: &'a Expression<'a>,
        implicit: bool,
    },
    /// A data type in expression position, as in `$bits(T)`.
    DataTypeExpr,
    /// A positional assignment pattern, flattened to canonical element
    /// order.
    SimplePattern { elements: Vec<&'a Expression<'a>> },
    /// A keyed assignment pattern, flattened to canonical element order.
    StructuredPattern { elements: Vec<&'a Expression<'a>> },
    /// A replicated assignment pattern, flattened to canonical element
    /// order.
    ReplicatedPattern {
        count: &'a Expression<'a>,
        elements: Vec<&'a Expression<'a>>,
    },
}

/// The callee of a bound call expression.
#[derive(Clone, Copy)]
pub enum CallTarget<'a> {
    Subroutine(&'a Symbol<'a>),
    System(&'static dyn SystemSubroutine),
}

fn alloc<'a>(
    cx: &Compilation<'a>,
    kind: ExprKind<'a>,
    ty: Type<'a>,
    span: Span,
) -> &'a Expression<'a> {
    cx.alloc_expr(Expression {
        kind,
        ty,
        span,
        constant: Cell::new(None),
    })
}

fn invalid<'a>(cx: &Compilation<'a>, span: Span) -> &'a Expression<'a> {
    alloc(cx, ExprKind::Invalid, cx.error_type(), span)
}

/// Bind an expression in a self-determined context.
pub fn bind_expr<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    syntax: &'a ast::Expr,
) -> &'a Expression<'a> {
    let span = syntax.span;
    match &syntax.kind {
        ast::ExprKind::IntLiteral(value) => {
            // Unsized literals carry the default 32-bit signed int type.
            let ty = if value.width() == 32 && value.is_signed() && !value.has_unknown() {
                cx.predef_type(crate::ty::PredefIntKind::Int)
            } else {
                let mut flags = IntegralFlags::empty();
                if value.is_signed() {
                    flags |= IntegralFlags::SIGNED;
                }
                if value.has_unknown() {
                    flags |= IntegralFlags::FOUR_STATE;
                }
                cx.vector_type(value.width(), flags)
            };
            let expr = alloc(cx, ExprKind::IntegerLiteral(value.clone()), ty, span);
            expr.set_constant(cx.intern_constant(ConstantValue::Integer(value.clone())));
            expr
        }
        ast::ExprKind::UnbasedUnsized(bit) => {
            let ty = match bit {
                Logic::Zero | Logic::One => cx.scalar_type(crate::ty::ScalarKind::Bit, false),
                _ => cx.scalar_type(crate::ty::ScalarKind::Logic, false),
            };
            alloc(cx, ExprKind::UnbasedUnsized(*bit), ty, span)
        }
        ast::ExprKind::RealLiteral(value) => {
            let expr = alloc(
                cx,
                ExprKind::RealLiteral(*value),
                cx.float_type(crate::ty::FloatKind::Real),
                span,
            );
            expr.set_constant(cx.intern_constant(ConstantValue::Real(*value)));
            expr
        }
        ast::ExprKind::TimeLiteral(value, _unit) => {
            let expr = alloc(
                cx,
                ExprKind::RealLiteral(*value),
                cx.float_type(crate::ty::FloatKind::RealTime),
                span,
            );
            expr.set_constant(cx.intern_constant(ConstantValue::Real(*value)));
            expr
        }
        ast::ExprKind::StringLiteral(value) => {
            let width = std::cmp::max(value.len() * 8, 8);
            let ty = cx.vector_type(width, IntegralFlags::empty());
            alloc(cx, ExprKind::StringLiteral(value.clone()), ty, span)
        }
        ast::ExprKind::NullLiteral => {
            let expr = alloc(cx, ExprKind::NullLiteral, cx.null_type(), span);
            expr.set_constant(cx.intern_constant(ConstantValue::Null));
            expr
        }
        ast::ExprKind::Ident(name) => bind_simple_name(cx, ctx, *name, span),
        ast::ExprKind::Scoped { package, segs } => bind_scoped_name(cx, ctx, *package, segs, span),
        ast::ExprKind::Unary(op, operand) => bind_unary(cx, ctx, *op, operand, span),
        ast::ExprKind::Binary(op, lhs, rhs) => bind_binary(cx, ctx, *op, lhs, rhs, span),
        ast::ExprKind::Conditional {
            cond,
            true_expr,
            false_expr,
        } => bind_conditional(cx, ctx, cond, true_expr, false_expr, span),
        ast::ExprKind::Assign {
            op,
            non_blocking,
            lhs,
            rhs,
        } => bind_assignment(cx, ctx, *op, *non_blocking, lhs, rhs, span),
        ast::ExprKind::Concat(operands) => bind_concat(cx, ctx, operands, span),
        ast::ExprKind::Replicate { count, concat } => {
            bind_replication(cx, ctx, count, concat, span, false)
        }
        ast::ExprKind::Index { value, index } => bind_element_select(cx, ctx, value, index, span),
        ast::ExprKind::Range {
            value,
            mode,
            left,
            right,
        } => bind_range_select(cx, ctx, value, *mode, left, right, span),
        ast::ExprKind::Member { value, member } => {
            let value = bind_expr(cx, ctx, value);
            bind_member_access(cx, value, *member, span)
        }
        ast::ExprKind::Call { callee, args } => bind_call(cx, ctx, callee, args, span),
        ast::ExprKind::Cast { ty: target, expr } => {
            let target_ty = ty::type_from_syntax(cx, target, ctx.location, ctx.scope, false);
            let operand = bind_expr(cx, ctx, expr);
            if operand.bad() || target_ty.is_error() {
                return invalid(cx, span);
            }
            if !target_ty.cast_compatible(cx, operand.ty) {
                cx.emit(
                    Diag::new(DiagCode::BadConversion)
                        .arg(operand.ty.display(cx))
                        .arg(target_ty.display(cx))
                        .span(span),
                );
                return invalid(cx, span);
            }
            alloc(
                cx,
                ExprKind::Conversion {
                    operand,
                    implicit: false,
                },
                target_ty,
                span,
            )
        }
        ast::ExprKind::Pattern(_) => {
            cx.emit(Diag::new(DiagCode::AssignmentPatternNoContext).span(span));
            invalid(cx, span)
        }
        ast::ExprKind::DataTypeExpr(dt) => {
            let ty = ty::type_from_syntax(cx, dt, ctx.location, ctx.scope, false);
            alloc(cx, ExprKind::DataTypeExpr, ty, span)
        }
    }
}

/// Bind an expression against a target type, injecting an assignment
/// conversion as needed.
pub fn bind_with_target<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    syntax: &'a ast::Expr,
    target: Type<'a>,
    op_span: Span,
) -> &'a Expression<'a> {
    if let ast::ExprKind::Pattern(pattern) = &syntax.kind {
        return bind_pattern(cx, ctx, pattern, target, syntax.span);
    }
    let expr = bind_expr(cx, ctx, syntax);
    convert_assignment(cx, target, expr, op_span)
}

/// Check assignment compatibility against a target type and convert the
/// expression, propagating the context-determined width into integral
/// operator trees.
pub fn convert_assignment<'a>(
    cx: &Compilation<'a>,
    target: Type<'a>,
    expr: &'a Expression<'a>,
    op_span: Span,
) -> &'a Expression<'a> {
    if expr.bad() || target.is_error() {
        return expr;
    }
    let rty = expr.ty;
    if target.matching(cx, rty) {
        return expr;
    }

    // String literals convert to the string type directly.
    if target.is_string(cx) {
        if let ExprKind::StringLiteral(_) = expr.kind {
            return conversion(cx, expr, target);
        }
    }

    if !target.assignment_compatible(cx, rty) {
        cx.emit(
            Diag::new(DiagCode::BadAssignment)
                .arg(rty.display(cx))
                .arg(target.display(cx))
                .span(op_span)
                .span(expr.span),
        );
        return invalid(cx, expr.span);
    }

    if target.is_integral(cx) && rty.is_integral(cx) && target.width(cx) > rty.width(cx) {
        return propagate(cx, expr, target);
    }
    conversion(cx, expr, target)
}

/// Wrap an expression in an implicit conversion node.
fn conversion<'a>(cx: &Compilation<'a>, expr: &'a Expression<'a>, target: Type<'a>) -> &'a Expression<'a> {
    alloc(
        cx,
        ExprKind::Conversion {
            operand: expr,
            implicit: true,
        },
        target,
        expr.span,
    )
}

/// Push a context-determined type down into an expression tree, re-typing
/// width-transparent operators and converting everything else.
fn propagate<'a>(cx: &Compilation<'a>, expr: &'a Expression<'a>, target: Type<'a>) -> &'a Expression<'a> {
    if expr.ty.matching(cx, target) {
        return expr;
    }
    use ast::BinaryOp::*;
    use ast::UnaryOp::*;
    match &expr.kind {
        ExprKind::UnbasedUnsized(bit) => alloc(cx, ExprKind::UnbasedUnsized(*bit), target, expr.span),
        ExprKind::Unary { op, operand } if matches!(op, Plus | Minus | BitNot) => alloc(
            cx,
            ExprKind::Unary {
                op: *op,
                operand: propagate(cx, operand, target),
            },
            target,
            expr.span,
        ),
        ExprKind::Binary { op, lhs, rhs } => match op {
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | BitXnor => alloc(
                cx,
                ExprKind::Binary {
                    op: *op,
                    lhs: propagate(cx, lhs, target),
                    rhs: propagate(cx, rhs, target),
                },
                target,
                expr.span,
            ),
            Shl | Shr | AShr | Pow => alloc(
                cx,
                ExprKind::Binary {
                    op: *op,
                    lhs: propagate(cx, lhs, target),
                    rhs: *rhs,
                },
                target,
                expr.span,
            ),
            _ => conversion(cx, expr, target),
        },
        ExprKind::Conditional {
            cond,
            true_expr,
            false_expr,
        } => alloc(
            cx,
            ExprKind::Conditional {
                cond: *cond,
                true_expr: propagate(cx, true_expr, target),
                false_expr: propagate(cx, false_expr, target),
            },
            target,
            expr.span,
        ),
        _ => conversion(cx, expr, target),
    }
}

/// Whether an expression denotes a storage location.
pub fn is_lvalue(expr: &Expression) -> bool {
    match &expr.kind {
        ExprKind::NamedValue { symbol, .. } => match symbol.kind {
            SymbolKind::Variable(_)
            | SymbolKind::Net(_)
            | SymbolKind::FormalArgument(_)
            | SymbolKind::Field(_) => true,
            _ => false,
        },
        ExprKind::ElementSelect { value, .. } => is_lvalue(value),
        ExprKind::RangeSelect { value, .. } => is_lvalue(value),
        ExprKind::MemberAccess { value, .. } => is_lvalue(value),
        ExprKind::Concat { operands } => operands.iter().all(|op| is_lvalue(op)),
        _ => false,
    }
}

fn bind_simple_name<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    name: Spanned<Name>,
    span: Span,
) -> &'a Expression<'a> {
    let symbol = match ctx.scope.lookup_unqualified(cx, name, ctx.location) {
        Some(s) => s,
        None => {
            cx.emit(
                Diag::new(DiagCode::UndeclaredIdentifier)
                    .arg(name.value)
                    .span(name.span),
            );
            return invalid(cx, span);
        }
    };
    bind_named_value(cx, ctx, symbol, false, span)
}

fn bind_scoped_name<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    package: bool,
    segs: &'a [ast::NameSeg],
    span: Span,
) -> &'a Expression<'a> {
    let lookup = match ctx
        .scope
        .resolve_path(cx, ctx.location, package, segs, ctx.scope)
    {
        Some(l) => l,
        None => return invalid(cx, span),
    };
    let mut expr = bind_named_value(cx, ctx, lookup.symbol, lookup.hierarchical, span);
    // Any remaining segments select members of the value.
    for seg in &segs[lookup.consumed..] {
        expr = bind_member_access(cx, expr, seg.name, span);
        for select in &seg.selects {
            let index = bind_expr(cx, ctx, select);
            expr = finish_element_select(cx, expr, index, span);
        }
    }
    expr
}

/// Bind a reference to an already resolved symbol, as used by implicit
/// named port connections.
pub fn bind_named_symbol<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    symbol: &'a Symbol<'a>,
    span: Span,
) -> &'a Expression<'a> {
    bind_named_value(cx, ctx, symbol, false, span)
}

fn bind_named_value<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    symbol: &'a Symbol<'a>,
    hierarchical: bool,
    span: Span,
) -> &'a Expression<'a> {
    if hierarchical && ctx.flags.contains(BindFlags::NO_HIERARCHICAL) {
        cx.emit(Diag::new(DiagCode::HierarchicalNotAllowedHere).span(span));
        return invalid(cx, span);
    }
    let declared = match symbol.declared_type() {
        Some(d) => d,
        None => {
            cx.emit(
                Diag::new(DiagCode::NotAValue)
                    .arg(symbol.name)
                    .span(span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
            );
            return invalid(cx, span);
        }
    };
    let ty = declared.ty(cx, symbol);
    alloc(
        cx,
        ExprKind::NamedValue {
            symbol,
            hierarchical,
        },
        ty,
        span,
    )
}

fn scalar_result<'a>(cx: &Compilation<'a>, four_state: bool) -> Type<'a> {
    if four_state {
        cx.scalar_type(crate::ty::ScalarKind::Logic, false)
    } else {
        cx.scalar_type(crate::ty::ScalarKind::Bit, false)
    }
}

fn integral_result<'a>(
    cx: &Compilation<'a>,
    width: usize,
    signed: bool,
    four_state: bool,
) -> Type<'a> {
    if width == 1 {
        let kind = if four_state {
            crate::ty::ScalarKind::Logic
        } else {
            crate::ty::ScalarKind::Bit
        };
        return cx.scalar_type(kind, signed);
    }
    let mut flags = IntegralFlags::empty();
    if signed {
        flags |= IntegralFlags::SIGNED;
    }
    if four_state {
        flags |= IntegralFlags::FOUR_STATE;
    }
    cx.vector_type(width, flags)
}

fn bind_unary<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    op: ast::UnaryOp,
    operand_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    use ast::UnaryOp::*;
    let operand = bind_expr(cx, ctx, operand_syntax);
    if operand.bad() {
        return invalid(cx, span);
    }
    let oty = operand.ty;
    let ty = match op {
        Plus | Minus => {
            if oty.is_numeric(cx) {
                oty
            } else {
                return bad_unary(cx, oty, span);
            }
        }
        BitNot => {
            if oty.is_integral(cx) {
                oty
            } else {
                return bad_unary(cx, oty, span);
            }
        }
        RedAnd | RedOr | RedXor | RedNand | RedNor | RedXnor => {
            if oty.is_integral(cx) {
                scalar_result(cx, oty.is_four_state(cx))
            } else {
                return bad_unary(cx, oty, span);
            }
        }
        LogicNot => {
            if oty.is_boolean_convertible(cx) {
                scalar_result(cx, oty.is_four_state(cx))
            } else {
                return bad_unary(cx, oty, span);
            }
        }
        PreInc | PreDec | PostInc | PostDec => {
            if !is_lvalue(operand) {
                cx.emit(Diag::new(DiagCode::ExpressionNotAssignable).span(operand.span));
                return invalid(cx, span);
            }
            if oty.is_numeric(cx) {
                oty
            } else {
                return bad_unary(cx, oty, span);
            }
        }
    };
    alloc(cx, ExprKind::Unary { op, operand }, ty, span)
}

fn bad_unary<'a>(cx: &Compilation<'a>, oty: Type<'a>, span: Span) -> &'a Expression<'a> {
    cx.emit(
        Diag::new(DiagCode::BadUnaryExpression)
            .arg(oty.display(cx))
            .span(span),
    );
    invalid(cx, span)
}

fn is_string_operand<'a>(cx: &Compilation<'a>, expr: &Expression<'a>) -> bool {
    match expr.kind {
        ExprKind::StringLiteral(_) => true,
        _ => expr.ty.is_string(cx),
    }
}

fn coerce_string<'a>(cx: &Compilation<'a>, expr: &'a Expression<'a>) -> &'a Expression<'a> {
    if expr.ty.is_string(cx) {
        expr
    } else {
        conversion(cx, expr, cx.string_type())
    }
}

fn bind_binary<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    op: ast::BinaryOp,
    lhs_syntax: &'a ast::Expr,
    rhs_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    use ast::BinaryOp::*;
    let lhs = bind_expr(cx, ctx, lhs_syntax);
    let rhs = bind_expr(cx, ctx, rhs_syntax);
    if lhs.bad() || rhs.bad() {
        return invalid(cx, span);
    }
    let (lty, rty) = (lhs.ty, rhs.ty);

    let bad = |cx: &Compilation<'a>| {
        cx.emit(
            Diag::new(DiagCode::BadBinaryExpression)
                .arg(lty.display(cx))
                .arg(rty.display(cx))
                .span(span),
        );
        invalid(cx, span)
    };

    match op {
        Add | Sub | Mul | Div | Mod => {
            if lty.is_floating(cx) || rty.is_floating(cx) {
                if op == Mod || !lty.is_numeric(cx) || !rty.is_numeric(cx) {
                    return bad(cx);
                }
                let real = cx.float_type(crate::ty::FloatKind::Real);
                let lhs = conversion_if_needed(cx, lhs, real);
                let rhs = conversion_if_needed(cx, rhs, real);
                return alloc(cx, ExprKind::Binary { op, lhs, rhs }, real, span);
            }
            if !lty.is_integral(cx) || !rty.is_integral(cx) {
                return bad(cx);
            }
            let width = std::cmp::max(lty.width(cx), rty.width(cx));
            let signed = lty.is_signed(cx) && rty.is_signed(cx);
            let four_state = lty.is_four_state(cx)
                || rty.is_four_state(cx)
                || op == Div
                || op == Mod;
            let result = integral_result(cx, width, signed, four_state);
            let lhs = propagate(cx, lhs, result);
            let rhs = propagate(cx, rhs, result);
            alloc(cx, ExprKind::Binary { op, lhs, rhs }, result, span)
        }
        Pow => {
            if lty.is_floating(cx) || rty.is_floating(cx) {
                if !lty.is_numeric(cx) || !rty.is_numeric(cx) {
                    return bad(cx);
                }
                let real = cx.float_type(crate::ty::FloatKind::Real);
                let lhs = conversion_if_needed(cx, lhs, real);
                let rhs = conversion_if_needed(cx, rhs, real);
                return alloc(cx, ExprKind::Binary { op, lhs, rhs }, real, span);
            }
            if !lty.is_integral(cx) || !rty.is_integral(cx) {
                return bad(cx);
            }
            let result = integral_result(
                cx,
                lty.width(cx),
                lty.is_signed(cx) && rty.is_signed(cx),
                lty.is_four_state(cx) || rty.is_four_state(cx),
            );
            let lhs = propagate(cx, lhs, result);
            alloc(cx, ExprKind::Binary { op, lhs, rhs }, result, span)
        }
        BitAnd | BitOr | BitXor | BitXnor => {
            if !lty.is_integral(cx) || !rty.is_integral(cx) {
                return bad(cx);
            }
            let width = std::cmp::max(lty.width(cx), rty.width(cx));
            let signed = lty.is_signed(cx) && rty.is_signed(cx);
            let four_state = lty.is_four_state(cx) || rty.is_four_state(cx);
            let result = integral_result(cx, width, signed, four_state);
            let lhs = propagate(cx, lhs, result);
            let rhs = propagate(cx, rhs, result);
            alloc(cx, ExprKind::Binary { op, lhs, rhs }, result, span)
        }
        Shl | Shr | AShr => {
            if !lty.is_integral(cx) || !rty.is_integral(cx) {
                return bad(cx);
            }
            let result = integral_result(
                cx,
                lty.width(cx),
                lty.is_signed(cx),
                lty.is_four_state(cx) || rty.is_four_state(cx),
            );
            let lhs = propagate(cx, lhs, result);
            alloc(cx, ExprKind::Binary { op, lhs, rhs }, result, span)
        }
        Eq | Ne | Lt | Le | Gt | Ge | CaseEq | CaseNe | WildcardEq | WildcardNe => {
            // Case equality is always two-state; the other comparisons are
            // four-state iff any operand is.
            if is_string_operand(cx, lhs) && is_string_operand(cx, rhs) {
                let lhs = coerce_string(cx, lhs);
                let rhs = coerce_string(cx, rhs);
                return alloc(
                    cx,
                    ExprKind::Binary { op, lhs, rhs },
                    scalar_result(cx, false),
                    span,
                );
            }
            if lty.is_floating(cx) || rty.is_floating(cx) {
                if !lty.is_numeric(cx) || !rty.is_numeric(cx) {
                    return bad(cx);
                }
                let real = cx.float_type(crate::ty::FloatKind::Real);
                let lhs = conversion_if_needed(cx, lhs, real);
                let rhs = conversion_if_needed(cx, rhs, real);
                return alloc(
                    cx,
                    ExprKind::Binary { op, lhs, rhs },
                    scalar_result(cx, false),
                    span,
                );
            }
            if !lty.is_integral(cx) || !rty.is_integral(cx) {
                return bad(cx);
            }
            let width = std::cmp::max(lty.width(cx), rty.width(cx));
            let signed = lty.is_signed(cx) && rty.is_signed(cx);
            let four_state = lty.is_four_state(cx) || rty.is_four_state(cx);
            let common = integral_result(cx, width, signed, four_state);
            let lhs = propagate(cx, lhs, common);
            let rhs = propagate(cx, rhs, common);
            let result_four_state = match op {
                CaseEq | CaseNe => false,
                _ => four_state,
            };
            alloc(
                cx,
                ExprKind::Binary { op, lhs, rhs },
                scalar_result(cx, result_four_state),
                span,
            )
        }
        LogicAnd | LogicOr | LogicImplication | LogicEquivalence => {
            if !lty.is_boolean_convertible(cx) || !rty.is_boolean_convertible(cx) {
                return bad(cx);
            }
            let four_state = lty.is_four_state(cx) || rty.is_four_state(cx);
            alloc(
                cx,
                ExprKind::Binary { op, lhs, rhs },
                scalar_result(cx, four_state),
                span,
            )
        }
    }
}

fn conversion_if_needed<'a>(
    cx: &Compilation<'a>,
    expr: &'a Expression<'a>,
    target: Type<'a>,
) -> &'a Expression<'a> {
    if expr.ty.matching(cx, target) {
        expr
    } else {
        conversion(cx, expr, target)
    }
}

fn bind_conditional<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    cond_syntax: &'a ast::Expr,
    true_syntax: &'a ast::Expr,
    false_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    let cond = bind_expr(cx, ctx, cond_syntax);
    let true_expr = bind_expr(cx, ctx, true_syntax);
    let false_expr = bind_expr(cx, ctx, false_syntax);
    if cond.bad() || true_expr.bad() || false_expr.bad() {
        return invalid(cx, span);
    }
    if !cond.ty.is_boolean_convertible(cx) {
        cx.emit(
            Diag::new(DiagCode::NotBooleanConvertible)
                .arg(cond.ty.display(cx))
                .span(cond.span),
        );
        return invalid(cx, span);
    }
    let (lty, rty) = (true_expr.ty, false_expr.ty);
    if lty.is_integral(cx) && rty.is_integral(cx) {
        let width = std::cmp::max(lty.width(cx), rty.width(cx));
        let signed = lty.is_signed(cx) && rty.is_signed(cx);
        let four_state = lty.is_four_state(cx) || rty.is_four_state(cx);
        let result = integral_result(cx, width, signed, four_state);
        let true_expr = propagate(cx, true_expr, result);
        let false_expr = propagate(cx, false_expr, result);
        return alloc(
            cx,
            ExprKind::Conditional {
                cond,
                true_expr,
                false_expr,
            },
            result,
            span,
        );
    }
    if lty.is_numeric(cx) && rty.is_numeric(cx) {
        let real = cx.float_type(crate::ty::FloatKind::Real);
        let true_expr = conversion_if_needed(cx, true_expr, real);
        let false_expr = conversion_if_needed(cx, false_expr, real);
        return alloc(
            cx,
            ExprKind::Conditional {
                cond,
                true_expr,
                false_expr,
            },
            real,
            span,
        );
    }
    if is_string_operand(cx, true_expr) && is_string_operand(cx, false_expr) {
        let true_expr = coerce_string(cx, true_expr);
        let false_expr = coerce_string(cx, false_expr);
        return alloc(
            cx,
            ExprKind::Conditional {
                cond,
                true_expr,
                false_expr,
            },
            cx.string_type(),
            span,
        );
    }
    if lty.equivalent(cx, rty) {
        return alloc(
            cx,
            ExprKind::Conditional {
                cond,
                true_expr,
                false_expr,
            },
            lty,
            span,
        );
    }
    cx.emit(
        Diag::new(DiagCode::BadBinaryExpression)
            .arg(lty.display(cx))
            .arg(rty.display(cx))
            .span(span),
    );
    invalid(cx, span)
}

fn bind_assignment<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    op: Option<ast::BinaryOp>,
    non_blocking: bool,
    lhs_syntax: &'a ast::Expr,
    rhs_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    let lhs = bind_expr(cx, ctx, lhs_syntax);
    if lhs.bad() {
        return invalid(cx, span);
    }
    if !is_lvalue(lhs) {
        cx.emit(Diag::new(DiagCode::ExpressionNotAssignable).span(lhs.span));
        return invalid(cx, span);
    }
    let rhs = match op {
        // A plain assignment binds the right side against the target type.
        None => bind_with_target(cx, ctx, rhs_syntax, lhs.ty, span),
        // Compound assignments keep the right side self-determined; the
        // composed operator converts at evaluation time.
        Some(_) => bind_expr(cx, ctx, rhs_syntax),
    };
    if rhs.bad() {
        return invalid(cx, span);
    }
    alloc(
        cx,
        ExprKind::Assignment {
            op,
            non_blocking,
            lhs,
            rhs,
        },
        lhs.ty,
        span,
    )
}

/// Bind an assignment given its two sides, as used by continuous assigns.
pub fn bind_assignment_pair<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    lhs: &'a ast::Expr,
    rhs: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    bind_assignment(cx, ctx, None, false, lhs, rhs, span)
}

fn bind_concat<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    operand_syntax: &'a [ast::Expr],
    span: Span,
) -> &'a Expression<'a> {
    let mut operands = vec![];
    for os in operand_syntax {
        let expr = match &os.kind {
            ast::ExprKind::Replicate { count, concat } => {
                bind_replication(cx, ctx, count, concat, os.span, true)
            }
            _ => bind_expr(cx, ctx, os),
        };
        if expr.bad() {
            return invalid(cx, span);
        }
        operands.push(expr);
    }

    // String concatenation stays string; mixing string and integral operands
    // is a hard error.
    let any_string = operands.iter().any(|op| op.ty.is_string(cx));
    if any_string {
        let all_stringish = operands.iter().all(|op| is_string_operand(cx, op));
        if !all_stringish {
            cx.emit(Diag::new(DiagCode::ConcatMixedStringInt).span(span));
            return invalid(cx, span);
        }
        let operands = operands
            .into_iter()
            .map(|op| coerce_string(cx, op))
            .collect();
        return alloc(cx, ExprKind::Concat { operands }, cx.string_type(), span);
    }

    let mut width = 0;
    let mut four_state = false;
    for op in &operands {
        if op.ty.is_void(cx) {
            continue;
        }
        if !op.ty.is_integral(cx) {
            cx.emit(
                Diag::new(DiagCode::BadBinaryExpression)
                    .arg(op.ty.display(cx))
                    .arg("concatenation")
                    .span(op.span),
            );
            return invalid(cx, span);
        }
        width += op.ty.width(cx);
        four_state |= op.ty.is_four_state(cx);
    }
    if width == 0 {
        cx.emit(Diag::new(DiagCode::ReplicationZeroOutsideConcat).span(span));
        return invalid(cx, span);
    }
    let ty = integral_result(cx, width, false, four_state);
    alloc(cx, ExprKind::Concat { operands }, ty, span)
}

fn bind_replication<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    count_syntax: &'a ast::Expr,
    concat_syntax: &'a [ast::Expr],
    span: Span,
    in_concat: bool,
) -> &'a Expression<'a> {
    let count = bind_expr(cx, ctx, count_syntax);
    if count.bad() {
        return invalid(cx, span);
    }
    let n = match eval_bound_integer(cx, count) {
        Some(n) if n >= 0 => n,
        _ => {
            cx.emit(
                Diag::new(DiagCode::NoteReplicationCountInvalid)
                    .arg(count.span.extract())
                    .span(count.span),
            );
            return invalid(cx, span);
        }
    };
    let concat = bind_concat(cx, ctx, concat_syntax, span);
    if concat.bad() {
        return invalid(cx, span);
    }
    if n == 0 {
        if !in_concat {
            cx.emit(Diag::new(DiagCode::ReplicationZeroOutsideConcat).span(span));
            return invalid(cx, span);
        }
        return alloc(
            cx,
            ExprKind::Replication { count, concat },
            cx.void_type(),
            span,
        );
    }
    if concat.ty.is_string(cx) {
        return alloc(
            cx,
            ExprKind::Replication { count, concat },
            cx.string_type(),
            span,
        );
    }
    let ty = integral_result(
        cx,
        concat.ty.width(cx) * n as usize,
        false,
        concat.ty.is_four_state(cx),
    );
    alloc(cx, ExprKind::Replication { count, concat }, ty, span)
}

fn bind_element_select<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    value_syntax: &'a ast::Expr,
    index_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    let value = bind_expr(cx, ctx, value_syntax);
    let index = bind_expr(cx, ctx, index_syntax);
    if value.bad() || index.bad() {
        return invalid(cx, span);
    }
    finish_element_select(cx, value, index, span)
}

fn finish_element_select<'a>(
    cx: &Compilation<'a>,
    value: &'a Expression<'a>,
    index: &'a Expression<'a>,
    span: Span,
) -> &'a Expression<'a> {
    if value.bad() || index.bad() {
        return invalid(cx, span);
    }
    if !index.ty.is_integral(cx) {
        cx.emit(
            Diag::new(DiagCode::BadIndexExpression)
                .arg(index.ty.display(cx))
                .span(index.span),
        );
        return invalid(cx, span);
    }
    let vt = value.ty;
    let ty = if let Some(elem) = vt.element_type(cx) {
        elem
    } else if vt.is_string(cx) {
        cx.vector_type(8, IntegralFlags::empty())
    } else if vt.is_simple_bit_vector(cx) {
        scalar_result(cx, vt.is_four_state(cx))
    } else {
        cx.emit(
            Diag::new(DiagCode::BadIndexExpression)
                .arg(vt.display(cx))
                .span(span),
        );
        return invalid(cx, span);
    };
    alloc(cx, ExprKind::ElementSelect { value, index }, ty, span)
}

fn bind_range_select<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    value_syntax: &'a ast::Expr,
    mode: ast::RangeSelectMode,
    left_syntax: &'a ast::Expr,
    right_syntax: &'a ast::Expr,
    span: Span,
) -> &'a Expression<'a> {
    let value = bind_expr(cx, ctx, value_syntax);
    if value.bad() {
        return invalid(cx, span);
    }
    let vt = value.ty;
    let value_range = match vt.array_range(cx) {
        Some(r) if vt.is_integral(cx) || vt.is_unpacked_array(cx) => r,
        _ => {
            cx.emit(
                Diag::new(DiagCode::BadIndexExpression)
                    .arg(vt.display(cx))
                    .span(span),
            );
            return invalid(cx, span);
        }
    };

    let make_result_type = |cx: &Compilation<'a>, range: ConstantRange| -> Type<'a> {
        if vt.is_unpacked_array(cx) {
            let elem = vt.element_type(cx).unwrap();
            let sym = cx.alloc_symbol(Symbol::new(
                crate::compilation::empty_name(),
                silica_common::source::INVALID_SPAN,
                SymbolKind::UnpackedArrayType(crate::symbol::UnpackedArrayTypeSymbol {
                    element: elem,
                    range,
                }),
            ));
            Type(sym)
        } else if vt.is_packed_array(cx) {
            let elem = vt.element_type(cx).unwrap();
            ty::make_packed_array(cx, elem, range)
        } else {
            integral_result(cx, range.width(), false, vt.is_four_state(cx))
        }
    };

    match mode {
        ast::RangeSelectMode::Simple => {
            // Simple range selects must be constant, match the declared
            // endianness, and lie within bounds.
            let left = bind_expr(cx, ctx, left_syntax);
            let right = bind_expr(cx, ctx, right_syntax);
            if left.bad() || right.bad() {
                return invalid(cx, span);
            }
            let l = eval_bound_integer(cx, left);
            let r = eval_bound_integer(cx, right);
            let (l, r) = match (l, r) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    cx.emit(Diag::new(DiagCode::RangeWidthNotConstant).span(span));
                    return invalid(cx, span);
                }
            };
            let sel = ConstantRange::new(l, r);
            if sel.is_little_endian() != value_range.is_little_endian() && sel.width() > 1 {
                cx.emit(
                    Diag::new(DiagCode::SelectEndianMismatch)
                        .arg(vt.display(cx))
                        .span(span),
                );
                return invalid(cx, span);
            }
            if !value_range.contains(l) || !value_range.contains(r) {
                cx.emit(
                    Diag::new(DiagCode::BadRangeExpression)
                        .arg(l)
                        .arg(r)
                        .arg(vt.display(cx))
                        .span(span),
                );
                return invalid(cx, span);
            }
            let ty = make_result_type(cx, sel);
            alloc(
                cx,
                ExprKind::RangeSelect {
                    mode,
                    value,
                    left,
                    right,
                    bounds: Some((l, r)),
                },
                ty,
                span,
            )
        }
        ast::RangeSelectMode::IndexedUp | ast::RangeSelectMode::IndexedDown => {
            let left = bind_expr(cx, ctx, left_syntax);
            let right = bind_expr(cx, ctx, right_syntax);
            if left.bad() || right.bad() {
                return invalid(cx, span);
            }
            let width = match eval_bound_integer(cx, right) {
                Some(w) if w > 0 => w,
                Some(_) => {
                    cx.emit(Diag::new(DiagCode::ValueMustBePositive).span(right.span));
                    return invalid(cx, span);
                }
                None => {
                    cx.emit(Diag::new(DiagCode::RangeWidthNotConstant).span(right.span));
                    return invalid(cx, span);
                }
            };
            // With a constant base the concrete range is computed and
            // validated now; otherwise the evaluator checks the bounds.
            let mut bounds = None;
            if let Some(base) = eval_bound_integer(cx, left) {
                let range =
                    indexed_range(mode, base, width, value_range.is_little_endian());
                if !value_range.contains(range.left) || !value_range.contains(range.right) {
                    cx.emit(
                        Diag::new(DiagCode::BadRangeExpression)
                            .arg(range.left)
                            .arg(range.right)
                            .arg(vt.display(cx))
                            .span(span),
                    );
                    return invalid(cx, span);
                }
                bounds = Some((range.left, range.right));
            }
            let normalized = match bounds {
                Some((l, r)) => ConstantRange::new(l, r),
                None => {
                    if value_range.is_little_endian() {
                        ConstantRange::new(width - 1, 0)
                    } else {
                        ConstantRange::new(0, width - 1)
                    }
                }
            };
            let ty = make_result_type(cx, normalized);
            alloc(
                cx,
                ExprKind::RangeSelect {
                    mode,
                    value,
                    left,
                    right,
                    bounds,
                },
                ty,
                span,
            )
        }
    }
}

/// Compute the concrete range denoted by an indexed part select.
pub fn indexed_range(
    mode: ast::RangeSelectMode,
    base: i32,
    width: i32,
    little_endian: bool,
) -> ConstantRange {
    match mode {
        ast::RangeSelectMode::IndexedUp => {
            if little_endian {
                ConstantRange::new(base + width - 1, base)
            } else {
                ConstantRange::new(base, base + width - 1)
            }
        }
        ast::RangeSelectMode::IndexedDown => {
            if little_endian {
                ConstantRange::new(base, base - width + 1)
            } else {
                ConstantRange::new(base - width + 1, base)
            }
        }
        ast::RangeSelectMode::Simple => ConstantRange::new(base, base + width - 1),
    }
}

/// Bind a member access on a value of struct or union type.
pub fn bind_member_access<'a>(
    cx: &Compilation<'a>,
    value: &'a Expression<'a>,
    member: Spanned<Name>,
    span: Span,
) -> &'a Expression<'a> {
    if value.bad() {
        return invalid(cx, span);
    }
    let scope = match value.ty.member_scope(cx) {
        Some(s) => s,
        None => {
            cx.emit(
                Diag::new(DiagCode::MemberAccessNotStructUnion)
                    .arg(member.value)
                    .arg(value.ty.display(cx))
                    .span(member.span),
            );
            return invalid(cx, span);
        }
    };
    let field = match scope.find(cx, member.value) {
        Some(f) => f,
        None => {
            cx.emit(
                Diag::new(DiagCode::UnknownMember)
                    .arg(member.value)
                    .arg(value.ty.display(cx))
                    .span(member.span),
            );
            return invalid(cx, span);
        }
    };
    let ty = match field.declared_type() {
        Some(d) => d.ty(cx, field),
        None => cx.error_type(),
    };
    alloc(cx, ExprKind::MemberAccess { value, field }, ty, span)
}

fn bind_call<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    callee: &'a ast::CallTarget,
    arg_syntax: &'a [ast::Expr],
    span: Span,
) -> &'a Expression<'a> {
    match callee {
        ast::CallTarget::Name(name) => {
            let symbol = match ctx.scope.lookup_unqualified(cx, *name, ctx.location) {
                Some(s) => s,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UndeclaredIdentifier)
                            .arg(name.value)
                            .span(name.span),
                    );
                    return invalid(cx, span);
                }
            };
            let sub = match &symbol.kind {
                SymbolKind::Subroutine(s) => s,
                _ => {
                    cx.emit(
                        Diag::new(DiagCode::NotASubroutine)
                            .arg(name.value)
                            .span(name.span)
                            .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
                    );
                    return invalid(cx, span);
                }
            };
            let formals = sub.args.borrow().clone();
            if arg_syntax.len() > formals.len() {
                cx.emit(
                    Diag::new(DiagCode::TooManyArguments)
                        .arg(name.value)
                        .arg(formals.len())
                        .arg(arg_syntax.len())
                        .span(span),
                );
                return invalid(cx, span);
            }
            let mut args = vec![];
            for (i, formal) in formals.iter().enumerate() {
                let formal_ty = formal
                    .declared_type()
                    .map(|d| d.ty(cx, formal))
                    .unwrap_or_else(|| cx.error_type());
                if i < arg_syntax.len() {
                    args.push(bind_with_target(
                        cx,
                        ctx,
                        &arg_syntax[i],
                        formal_ty,
                        arg_syntax[i].span,
                    ));
                } else {
                    let default = match &formal.kind {
                        SymbolKind::FormalArgument(f) => f.default,
                        _ => None,
                    };
                    match default {
                        Some(default) => {
                            let sub_ctx = BindContext {
                                scope: symbol.scope().unwrap(),
                                location: LookupLocation::max(),
                                flags: ctx.flags,
                            };
                            args.push(bind_with_target(
                                cx,
                                &sub_ctx,
                                default,
                                formal_ty,
                                default.span,
                            ));
                        }
                        None => {
                            cx.emit(
                                Diag::new(DiagCode::TooFewArguments)
                                    .arg(name.value)
                                    .arg(formals.len())
                                    .arg(arg_syntax.len())
                                    .span(span),
                            );
                            return invalid(cx, span);
                        }
                    }
                }
            }
            let ty = match sub.kind {
                ast::SubroutineKind::Function => sub.return_type.ty(cx, symbol),
                ast::SubroutineKind::Task => cx.void_type(),
            };
            alloc(
                cx,
                ExprKind::Call {
                    target: CallTarget::Subroutine(symbol),
                    args,
                    location: ctx.location,
                },
                ty,
                span,
            )
        }
        ast::CallTarget::System(name) => {
            let sub = match cx.system_subroutine(name.value) {
                Some(s) => s,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UnknownSystemName)
                            .arg(name.value)
                            .span(name.span),
                    );
                    return invalid(cx, span);
                }
            };
            let mut args = vec![];
            for arg in arg_syntax {
                args.push(bind_expr(cx, ctx, arg));
            }
            if args.iter().any(|a| a.bad()) {
                return invalid(cx, span);
            }
            let ty = sub.check_arguments(cx, &args, span);
            if ty.is_error() {
                return invalid(cx, span);
            }
            alloc(
                cx,
                ExprKind::Call {
                    target: CallTarget::System(sub),
                    args,
                    location: ctx.location,
                },
                ty,
                span,
            )
        }
    }
}

/// Bind an assignment pattern against a target type, validating element
/// counts and coverage and flattening into canonical element order.
fn bind_pattern<'a>(
    cx: &Compilation<'a>,
    ctx: &BindContext<'a>,
    pattern: &'a ast::AssignmentPattern,
    target: Type<'a>,
    span: Span,
) -> &'a Expression<'a> {
    if target.is_error() {
        return invalid(cx, span);
    }

    // Determine the element types of the target in canonical order. Struct
    // and union targets map to their fields, array and vector targets to
    // their elements.
    let canonical = target.canonical(cx);
    let field_scope = match &canonical.0.kind {
        SymbolKind::UnpackedStructType(s) => Some(&s.scope),
        SymbolKind::UnpackedUnionType(s) => Some(&s.scope),
        SymbolKind::PackedStructType(s) => Some(&s.scope),
        SymbolKind::PackedUnionType(s) => Some(&s.scope),
        _ => None,
    };
    let (elem_types, elem_names): (Vec<Type<'a>>, Vec<Option<Name>>) = if let Some(scope) =
        field_scope
    {
        let fields = ty::struct_fields(cx, scope);
        let types = fields.iter().map(|f| ty::field_type(cx, f)).collect();
        let names = fields.iter().map(|f| Some(f.name)).collect();
        (types, names)
    } else if let Some(range) = canonical.array_range(cx) {
        let elem = match canonical.element_type(cx) {
            Some(e) => e,
            None if canonical.is_simple_bit_vector(cx) => {
                scalar_result(cx, canonical.is_four_state(cx))
            }
            None => {
                cx.emit(
                    Diag::new(DiagCode::BadAssignmentPatternType)
                        .arg(target.display(cx))
                        .span(span),
                );
                return invalid(cx, span);
            }
        };
        (vec![elem; range.width()], vec![None; range.width()])
    } else {
        cx.emit(
            Diag::new(DiagCode::BadAssignmentPatternType)
                .arg(target.display(cx))
                .span(span),
        );
        return invalid(cx, span);
    };
    let count = elem_types.len();

    match pattern {
        ast::AssignmentPattern::Positional(exprs) => {
            if exprs.len() != count {
                cx.emit(
                    Diag::new(DiagCode::WrongNumberAssignmentPatterns)
                        .arg(target.display(cx))
                        .arg(count)
                        .arg(exprs.len())
                        .span(span),
                );
                return invalid(cx, span);
            }
            let mut elements = vec![];
            for (expr, &ty) in exprs.iter().zip(elem_types.iter()) {
                elements.push(bind_with_target(cx, ctx, expr, ty, expr.span));
            }
            if elements.iter().any(|e| e.bad()) {
                return invalid(cx, span);
            }
            alloc(cx, ExprKind::SimplePattern { elements }, target, span)
        }
        ast::AssignmentPattern::Keyed(entries) => {
            let mut slots: Vec<Option<&'a Expression<'a>>> = vec![None; count];
            let mut default: Option<&'a ast::Expr> = None;
            let mut type_keys: Vec<(Type<'a>, &'a ast::Expr)> = vec![];
            for (key, expr) in entries {
                match key {
                    ast::PatternKey::Default(_) => default = Some(expr),
                    ast::PatternKey::Type(dt) => {
                        let key_ty = ty::type_from_syntax(cx, dt, ctx.location, ctx.scope, false);
                        type_keys.push((key_ty, expr));
                    }
                    ast::PatternKey::Name(name) => {
                        match elem_names.iter().position(|n| *n == Some(name.value)) {
                            Some(pos) => {
                                slots[pos] = Some(bind_with_target(
                                    cx,
                                    ctx,
                                    expr,
                                    elem_types[pos],
                                    expr.span,
                                ));
                            }
                            None => {
                                cx.emit(
                                    Diag::new(DiagCode::AssignmentPatternKeyNotFound)
                                        .arg(name.value)
                                        .arg(target.display(cx))
                                        .span(name.span),
                                );
                                return invalid(cx, span);
                            }
                        }
                    }
                    ast::PatternKey::Index(index_expr) => {
                        let index = match eval_constant_integer_at(
                            cx,
                            ctx.scope,
                            ctx.location,
                            index_expr,
                        ) {
                            Some(i) => i,
                            None => return invalid(cx, span),
                        };
                        let range = canonical.array_range(cx).unwrap_or(ConstantRange::new(
                            count as i32 - 1,
                            0,
                        ));
                        if !range.contains(index) {
                            cx.emit(
                                Diag::new(DiagCode::IndexValueInvalid)
                                    .arg(index)
                                    .arg(target.display(cx))
                                    .span(index_expr.span),
                            );
                            return invalid(cx, span);
                        }
                        let pos = range.translate_index(index) as usize;
                        slots[pos] =
                            Some(bind_with_target(cx, ctx, expr, elem_types[pos], expr.span));
                    }
                }
            }
            // Fill remaining elements from type keys, then the default.
            let mut elements = vec![];
            for (pos, slot) in slots.into_iter().enumerate() {
                let expr = match slot {
                    Some(e) => e,
                    None => {
                        let ty = elem_types[pos];
                        let from_type_key = type_keys
                            .iter()
                            .find(|(kt, _)| kt.matching(cx, ty))
                            .map(|&(_, e)| e);
                        match from_type_key.or(default) {
                            Some(e) => bind_with_target(cx, ctx, e, ty, e.span),
                            None => {
                                let what = elem_names[pos]
                                    .map(|n| format!("{}", n))
                                    .unwrap_or_else(|| format!("element {}", pos));
                                cx.emit(
                                    Diag::new(DiagCode::MissingAssignmentPatternValue)
                                        .arg(what)
                                        .span(span),
                                );
                                return invalid(cx, span);
                            }
                        }
                    }
                };
                elements.push(expr);
            }
            if elements.iter().any(|e| e.bad()) {
                return invalid(cx, span);
            }
            alloc(cx, ExprKind::StructuredPattern { elements }, target, span)
        }
        ast::AssignmentPattern::Replicated { count: count_expr, elems } => {
            let count_bound = bind_expr(cx, ctx, count_expr);
            let n = match eval_bound_integer(cx, count_bound) {
                Some(n) if n > 0 => n as usize,
                _ => {
                    cx.emit(Diag::new(DiagCode::ValueMustBePositive).span(count_expr.span));
                    return invalid(cx, span);
                }
            };
            if n * elems.len() != count {
                cx.emit(
                    Diag::new(DiagCode::WrongNumberAssignmentPatterns)
                        .arg(target.display(cx))
                        .arg(count)
                        .arg(n * elems.len())
                        .span(span),
                );
                return invalid(cx, span);
            }
            let mut elements = vec![];
            for rep in 0..n {
                for (i, expr) in elems.iter().enumerate() {
                    let pos = rep * elems.len() + i;
                    elements.push(bind_with_target(cx, ctx, expr, elem_types[pos], expr.span));
                }
            }
            if elements.iter().any(|e| e.bad()) {
                return invalid(cx, span);
            }
            alloc(
                cx,
                ExprKind::ReplicatedPattern {
                    count: count_bound,
                    elements,
                },
                target,
                span,
            )
        }
    }
}

/// Evaluate an already bound expression, quietly returning the integer value
/// if it is constant.
pub fn eval_bound_integer<'a>(cx: &Compilation<'a>, expr: &'a Expression<'a>) -> Option<i32> {
    if let Some(v) = expr.constant() {
        return v.integer()?.as_i32();
    }
    let mut ectx = crate::eval::EvalContext::new(cx);
    let v = crate::eval::eval_expr(expr, &mut ectx);
    match v {
        ConstantValue::Invalid => None,
        v => {
            let result = v.integer()?.as_i32();
            expr.set_constant(cx.intern_constant(v));
            result
        }
    }
}

/// Evaluate an expression in a constant context, recording the value on the
/// expression and reporting a diagnostic when it is not constant.
pub fn fold_constant<'a>(cx: &Compilation<'a>, expr: &'a Expression<'a>) {
    if expr.bad() || expr.constant().is_some() {
        return;
    }
    let mut ectx = crate::eval::EvalContext::new(cx);
    let v = crate::eval::eval_expr(expr, &mut ectx);
    match v {
        ConstantValue::Invalid => {
            // A silent failure means the value is simply absent, e.g. a
            // parameter inside an uninstantiated definition. Only noted
            // failures surface as an error.
            let notes = ectx.take_diags();
            if !notes.is_empty() {
                let mut diag = Diag::new(DiagCode::ExpressionNotConstant).span(expr.span);
                for note in notes {
                    diag = diag.note(note);
                }
                cx.emit(diag);
            }
        }
        v => expr.set_constant(cx.intern_constant(v)),
    }
}

/// Bind an expression in a constant context and evaluate it to an integer.
pub fn eval_constant_integer_at<'a>(
    cx: &Compilation<'a>,
    scope: &'a Scope<'a>,
    location: LookupLocation<'a>,
    syntax: &'a ast::Expr,
) -> Option<i32> {
    let ctx = BindContext::constant(scope, location);
    let expr = bind_expr(cx, &ctx, syntax);
    if expr.bad() {
        return None;
    }
    fold_constant(cx, expr);
    expr.constant()?.integer()?.as_i32()
}

/// Bind an expression in a constant context at the end of a scope and
/// evaluate it to an integer.
pub fn eval_constant_integer<'a>(
    cx: &Compilation<'a>,
    scope: &'a Scope<'a>,
    syntax: &'a ast::Expr,
) -> Option<i32> {
    eval_constant_integer_at(cx, scope, LookupLocation::max(), syntax)
}
