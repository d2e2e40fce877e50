// Copyright (c) 2016-2020 Fabian Schuiki

//! System subroutines.
//!
//! Calls of the form `$name(...)` dispatch by name to a registered handler,
//! which checks the arguments and determines the result type, evaluates the
//! call at constant time, and verifies whether the call is admissible in a
//! constant context.

use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::eval::{eval_expr, EvalContext};
use crate::expr::Expression;
use crate::svint::{Logic, SVInt};
use crate::ty::{IntegralFlags, PredefIntKind, Type};
use crate::value::ConstantValue;

/// A handler for a family of system subroutines.
pub trait SystemSubroutine: Sync {
    /// The name of the subroutine, including the `$`.
    fn name(&self) -> &'static str;

    /// Check the bound arguments and determine the result type. Emits
    /// diagnostics and returns the error type on failure.
    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> Type<'a>;

    /// Evaluate the call at constant time.
    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> ConstantValue;

    /// Check whether the call is admissible in a constant context.
    fn verify_constant<'a>(
        &self,
        _ctx: &mut EvalContext<'_, 'a>,
        _args: &[&'a Expression<'a>],
        _span: Span,
    ) -> bool {
        true
    }
}

/// The built-in system subroutines, in registration order.
pub fn builtins() -> Vec<&'static dyn SystemSubroutine> {
    vec![
        &BitsFunction,
        &Clog2Function,
        &SignedFunction { signed: true },
        &SignedFunction { signed: false },
        &SizeFunction,
        &DisplayTask { name: "$display" },
        &DisplayTask { name: "$write" },
        &DisplayTask { name: "$info" },
        &DisplayTask { name: "$warning" },
        &DisplayTask { name: "$error" },
        &DisplayTask { name: "$fatal" },
    ]
}

fn check_arg_count<'a>(
    cx: &Compilation<'a>,
    name: &'static str,
    args: &[&'a Expression<'a>],
    expected: usize,
    span: Span,
) -> bool {
    if args.len() < expected {
        cx.emit(
            Diag::new(DiagCode::TooFewArguments)
                .arg(name)
                .arg(expected)
                .arg(args.len())
                .span(span),
        );
        return false;
    }
    if args.len() > expected {
        cx.emit(
            Diag::new(DiagCode::TooManyArguments)
                .arg(name)
                .arg(expected)
                .arg(args.len())
                .span(span),
        );
        return false;
    }
    true
}

/// `$bits`: the width in bits of an expression or data type.
struct BitsFunction;

impl SystemSubroutine for BitsFunction {
    fn name(&self) -> &'static str {
        "$bits"
    }

    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> Type<'a> {
        if !check_arg_count(cx, self.name(), args, 1, span) {
            return cx.error_type();
        }
        if args[0].ty.width(cx) == 0 && !args[0].ty.is_aggregate(cx) {
            cx.emit(
                Diag::new(DiagCode::BadSystemSubroutineArg)
                    .arg(self.name())
                    .span(args[0].span),
            );
            return cx.error_type();
        }
        cx.predef_type(PredefIntKind::Int)
    }

    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        args: &[&'a Expression<'a>],
        _span: Span,
    ) -> ConstantValue {
        let cx = ctx.cx;
        let ty = args[0].ty;
        // Unpacked aggregates flatten to the sum of their element widths.
        fn flat_width<'a>(cx: &Compilation<'a>, ty: Type<'a>) -> usize {
            if let Some(range) = ty.array_range(cx) {
                if ty.is_unpacked_array(cx) {
                    return range.width() * flat_width(cx, ty.element_type(cx).unwrap());
                }
            }
            ty.width(cx)
        }
        ConstantValue::Integer(SVInt::from_u64(32, flat_width(cx, ty) as u64, true))
    }
}

/// `$clog2`: the ceiling of the base-2 logarithm.
struct Clog2Function;

impl SystemSubroutine for Clog2Function {
    fn name(&self) -> &'static str {
        "$clog2"
    }

    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> Type<'a> {
        if !check_arg_count(cx, self.name(), args, 1, span) {
            return cx.error_type();
        }
        if !args[0].ty.is_integral(cx) {
            cx.emit(
                Diag::new(DiagCode::BadSystemSubroutineArg)
                    .arg(self.name())
                    .span(args[0].span),
            );
            return cx.error_type();
        }
        cx.predef_type(PredefIntKind::Int)
    }

    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> ConstantValue {
        let value = eval_expr(args[0], ctx);
        let v = match value.integer() {
            Some(v) if !v.has_unknown() => v.clone().with_signed(false),
            _ => {
                ctx.add_diag(
                    Diag::new(DiagCode::BadSystemSubroutineArg)
                        .arg(self.name())
                        .span(span),
                );
                return ConstantValue::Invalid;
            }
        };
        // clog2(v) is the position of the highest set bit of v-1, plus one.
        let one = SVInt::from_u64(v.width(), 1, false);
        let m = v.sub(&one);
        let mut result = 0;
        if !v.is_false() {
            for i in (0..m.width()).rev() {
                if m.bit(i) == Logic::One {
                    result = i as u64 + 1;
                    break;
                }
            }
        }
        ConstantValue::Integer(SVInt::from_u64(32, result, true))
    }
}

/// `$signed` and `$unsigned`: change the signedness of a value without
/// altering its bits.
struct SignedFunction {
    signed: bool,
}

impl SystemSubroutine for SignedFunction {
    fn name(&self) -> &'static str {
        if self.signed {
            "$signed"
        } else {
            "$unsigned"
        }
    }

    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> Type<'a> {
        if !check_arg_count(cx, self.name(), args, 1, span) {
            return cx.error_type();
        }
        let ty = args[0].ty;
        if !ty.is_integral(cx) {
            cx.emit(
                Diag::new(DiagCode::BadSystemSubroutineArg)
                    .arg(self.name())
                    .span(args[0].span),
            );
            return cx.error_type();
        }
        let mut flags = IntegralFlags::empty();
        if self.signed {
            flags |= IntegralFlags::SIGNED;
        }
        if ty.is_four_state(cx) {
            flags |= IntegralFlags::FOUR_STATE;
        }
        cx.vector_type(ty.width(cx), flags)
    }

    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        args: &[&'a Expression<'a>],
        _span: Span,
    ) -> ConstantValue {
        let value = eval_expr(args[0], ctx);
        match value {
            ConstantValue::Integer(v) => ConstantValue::Integer(v.with_signed(self.signed)),
            _ => ConstantValue::Invalid,
        }
    }
}

/// `$size`: the number of elements of the outermost dimension.
struct SizeFunction;

impl SystemSubroutine for SizeFunction {
    fn name(&self) -> &'static str {
        "$size"
    }

    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        args: &[&'a Expression<'a>],
        span: Span,
    ) -> Type<'a> {
        if !check_arg_count(cx, self.name(), args, 1, span) {
            return cx.error_type();
        }
        if args[0].ty.array_range(cx).is_none() {
            cx.emit(
                Diag::new(DiagCode::BadSystemSubroutineArg)
                    .arg(self.name())
                    .span(args[0].span),
            );
            return cx.error_type();
        }
        cx.predef_type(PredefIntKind::Int)
    }

    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        args: &[&'a Expression<'a>],
        _span: Span,
    ) -> ConstantValue {
        let cx = ctx.cx;
        match args[0].ty.array_range(cx) {
            Some(range) => ConstantValue::Integer(SVInt::from_u64(32, range.width() as u64, true)),
            None => ConstantValue::Invalid,
        }
    }
}

/// The display tasks. Recognized so that elaboration proceeds, but they have
/// no constant value.
struct DisplayTask {
    name: &'static str,
}

impl SystemSubroutine for DisplayTask {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check_arguments<'a>(
        &self,
        cx: &Compilation<'a>,
        _args: &[&'a Expression<'a>],
        _span: Span,
    ) -> Type<'a> {
        cx.void_type()
    }

    fn eval<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        _args: &[&'a Expression<'a>],
        span: Span,
    ) -> ConstantValue {
        ctx.add_diag(Diag::new(DiagCode::NoteTaskNotConstant).span(span));
        ConstantValue::Invalid
    }

    fn verify_constant<'a>(
        &self,
        ctx: &mut EvalContext<'_, 'a>,
        _args: &[&'a Expression<'a>],
        span: Span,
    ) -> bool {
        ctx.add_diag(Diag::new(DiagCode::NoteTaskNotConstant).span(span));
        false
    }
}
