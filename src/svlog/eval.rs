// Copyright (c) 2016-2020 Fabian Schuiki

//! Constant expression evaluation.
//!
//! A recursive interpreter over bound expression nodes. Binding may
//! opportunistically record constants on the expressions it produces; this
//! module is also invoked on demand wherever elaboration needs a value:
//! generate expressions, parameter defaults, enum initializers, and constant
//! functions called from constant contexts.
//!
//! Evaluation failures come in two flavors: silent ones, which produce the
//! invalid value and let callers decide, and noted ones, which record note
//! diagnostics in the [`EvalContext`] for the nearest constant-context
//! caller to wrap in an "expression is not constant" error.

use crate::ast::{BinaryOp, SubroutineKind, UnaryOp};
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::expr::{CallTarget, ExprKind, Expression};
use crate::scope::LookupLocation;
use crate::stmt::{Statement, StmtData};
use crate::svint::{Logic, SVInt};
use crate::symbol::{ById, Symbol, SymbolKind};
use crate::value::{ConstantRange, ConstantValue};
use std::collections::HashMap;

/// The maximum depth of constant function calls.
const MAX_CALL_DEPTH: usize = 128;
/// The maximum number of evaluation steps before a runaway loop is cut off.
const MAX_STEPS: usize = 1 << 20;

/// The outcome of evaluating a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    Success,
    Return,
    Break,
    Continue,
    Fail,
}

/// One frame on the constant evaluation stack.
pub struct Frame<'a> {
    /// The subroutine being evaluated, or none for the top level.
    pub subroutine: Option<&'a Symbol<'a>>,
    /// The lookup location of the call site, used to check that parameters
    /// were declared before the invocation.
    pub call_location: LookupLocation<'a>,
    locals: HashMap<ById<'a>, ConstantValue>,
}

/// The context a constant evaluation runs in.
pub struct EvalContext<'cx, 'a> {
    pub cx: &'cx Compilation<'a>,
    frames: Vec<Frame<'a>>,
    diags: Vec<Diag>,
    script_eval: bool,
    steps: usize,
}

impl<'cx, 'a> EvalContext<'cx, 'a> {
    /// Create a new evaluation context.
    pub fn new(cx: &'cx Compilation<'a>) -> EvalContext<'cx, 'a> {
        EvalContext {
            cx,
            frames: vec![Frame {
                subroutine: None,
                call_location: LookupLocation::max(),
                locals: HashMap::new(),
            }],
            diags: vec![],
            script_eval: false,
            steps: 0,
        }
    }

    /// Create a context for script evaluation, which lifts the constant
    /// function restrictions.
    pub fn new_script(cx: &'cx Compilation<'a>) -> EvalContext<'cx, 'a> {
        let mut ctx = EvalContext::new(cx);
        ctx.script_eval = true;
        ctx
    }

    /// Whether this is a script evaluation.
    pub fn is_script_eval(&self) -> bool {
        self.script_eval
    }

    /// The innermost frame.
    pub fn top_frame(&self) -> &Frame<'a> {
        self.frames.last().unwrap()
    }

    /// Push a new call frame. Fails when the call depth limit is reached.
    pub fn push_frame(
        &mut self,
        subroutine: &'a Symbol<'a>,
        call_location: LookupLocation<'a>,
        span: Span,
    ) -> bool {
        if self.frames.len() >= MAX_CALL_DEPTH {
            self.add_diag(Diag::new(DiagCode::NoteExceededMaxCallDepth).span(span));
            return false;
        }
        self.frames.push(Frame {
            subroutine: Some(subroutine),
            call_location,
            locals: HashMap::new(),
        });
        true
    }

    /// Pop the innermost call frame.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Create a local storage slot in the innermost frame.
    pub fn create_local(&mut self, symbol: &'a Symbol<'a>, value: ConstantValue) {
        self.frames
            .last_mut()
            .unwrap()
            .locals
            .insert(ById(symbol), value);
    }

    /// Find a local storage slot in the innermost frame.
    pub fn find_local(&self, symbol: &'a Symbol<'a>) -> Option<&ConstantValue> {
        self.frames.last().unwrap().locals.get(&ById(symbol))
    }

    fn local_mut(&mut self, symbol: &'a Symbol<'a>) -> Option<&mut ConstantValue> {
        self.frames.last_mut().unwrap().locals.get_mut(&ById(symbol))
    }

    /// Record a note diagnostic for the enclosing constant context.
    pub fn add_diag(&mut self, diag: Diag) {
        self.diags.push(diag);
    }

    /// Take the recorded diagnostics.
    pub fn take_diags(&mut self) -> Vec<Diag> {
        std::mem::replace(&mut self.diags, vec![])
    }

    fn step(&mut self, span: Span) -> bool {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            self.add_diag(Diag::new(DiagCode::NoteExceededMaxSteps).span(span));
            return false;
        }
        true
    }
}

/// A path step of an lvalue cursor.
#[derive(Debug, Clone)]
enum LValuePath {
    /// An element of an unpacked aggregate, by canonical offset.
    Index(usize),
    /// A contiguous run of elements of an unpacked aggregate.
    Slice(usize, usize),
    /// A bit range of a packed value, as (msb, lsb) bit positions.
    BitRange(usize, usize),
}

/// A cursor into a constant value slot, supporting loads and stores through
/// element and range selections.
pub enum LValue<'a> {
    Local {
        symbol: &'a Symbol<'a>,
        path: Vec<LValuePath>,
    },
    /// A concatenation of sub-lvalues with their widths; stores scatter and
    /// loads gather.
    Concat(Vec<(LValue<'a>, usize)>),
}

impl<'a> LValue<'a> {
    fn select_index(mut self, index: usize) -> LValue<'a> {
        match &mut self {
            LValue::Local { path, .. } => path.push(LValuePath::Index(index)),
            LValue::Concat(_) => panic!("cannot select into a concatenation lvalue"),
        }
        self
    }

    fn select_slice(mut self, start: usize, len: usize) -> LValue<'a> {
        match &mut self {
            LValue::Local { path, .. } => path.push(LValuePath::Slice(start, len)),
            LValue::Concat(_) => panic!("cannot select into a concatenation lvalue"),
        }
        self
    }

    fn select_bit_range(mut self, msb: usize, lsb: usize) -> LValue<'a> {
        match &mut self {
            LValue::Local { path, .. } => path.push(LValuePath::BitRange(msb, lsb)),
            LValue::Concat(_) => panic!("cannot select into a concatenation lvalue"),
        }
        self
    }

    /// Load the value the cursor points at.
    pub fn load(&self, ctx: &mut EvalContext<'_, 'a>) -> ConstantValue {
        match self {
            LValue::Local { symbol, path } => {
                let mut value = match ctx.find_local(symbol) {
                    Some(v) => v.clone(),
                    None => return ConstantValue::Invalid,
                };
                for step in path {
                    value = match (step, value) {
                        (LValuePath::Index(i), ConstantValue::Elements(mut v)) => {
                            if *i >= v.len() {
                                return ConstantValue::Invalid;
                            }
                            v.swap_remove(*i)
                        }
                        (LValuePath::Slice(start, len), ConstantValue::Elements(v)) => {
                            if start + len > v.len() {
                                return ConstantValue::Invalid;
                            }
                            ConstantValue::Elements(v[*start..*start + *len].to_vec())
                        }
                        (LValuePath::BitRange(msb, lsb), ConstantValue::Integer(v)) => {
                            ConstantValue::Integer(v.slice(*msb, *lsb))
                        }
                        _ => return ConstantValue::Invalid,
                    };
                }
                value
            }
            LValue::Concat(parts) => {
                let mut ints = vec![];
                for (part, _) in parts {
                    match part.load(ctx) {
                        ConstantValue::Integer(v) => ints.push(v),
                        _ => return ConstantValue::Invalid,
                    }
                }
                ConstantValue::Integer(SVInt::concat(ints))
            }
        }
    }

    /// Store a value through the cursor.
    pub fn store(&self, ctx: &mut EvalContext<'_, 'a>, value: ConstantValue) -> bool {
        match self {
            LValue::Local { symbol, path } => {
                let slot = match ctx.local_mut(symbol) {
                    Some(s) => s,
                    None => return false,
                };
                store_through(slot, path, value)
            }
            LValue::Concat(parts) => {
                // Scatter the bits, most significant part first.
                let int = match value {
                    ConstantValue::Integer(v) => v,
                    _ => return false,
                };
                let total: usize = parts.iter().map(|(_, w)| w).sum();
                let mut offset = total;
                let mut ok = true;
                let pieces: Vec<_> = parts
                    .iter()
                    .map(|(part, width)| {
                        offset -= width;
                        (part, int.slice(offset + width - 1, offset))
                    })
                    .collect();
                for (part, piece) in pieces {
                    ok &= part.store(ctx, ConstantValue::Integer(piece));
                }
                ok
            }
        }
    }
}

fn store_through(slot: &mut ConstantValue, path: &[LValuePath], value: ConstantValue) -> bool {
    match path.first() {
        None => {
            *slot = value;
            true
        }
        Some(LValuePath::Index(i)) => match slot {
            ConstantValue::Elements(v) if *i < v.len() => store_through(&mut v[*i], &path[1..], value),
            _ => false,
        },
        Some(LValuePath::Slice(start, len)) => match (slot, value) {
            (ConstantValue::Elements(v), ConstantValue::Elements(new)) => {
                if *start + *len > v.len() || new.len() != *len || path.len() > 1 {
                    return false;
                }
                for (i, elem) in new.into_iter().enumerate() {
                    v[*start + i] = elem;
                }
                true
            }
            _ => false,
        },
        Some(LValuePath::BitRange(msb, lsb)) => match slot {
            ConstantValue::Integer(v) => {
                if path.len() > 1 || *msb >= v.width() {
                    return false;
                }
                let piece = match value {
                    ConstantValue::Integer(p) => p,
                    _ => return false,
                };
                v.set_slice(*msb, *lsb, &piece);
                true
            }
            _ => false,
        },
    }
}

/// Evaluate a bound expression.
pub fn eval_expr<'a>(expr: &'a Expression<'a>, ctx: &mut EvalContext<'_, 'a>) -> ConstantValue {
    if let Some(v) = expr.constant() {
        return v.clone();
    }
    if expr.bad() {
        return ConstantValue::Invalid;
    }
    let cx = ctx.cx;
    match &expr.kind {
        ExprKind::Invalid => ConstantValue::Invalid,
        ExprKind::IntegerLiteral(v) => ConstantValue::Integer(v.clone()),
        ExprKind::RealLiteral(v) => ConstantValue::Real(*v),
        ExprKind::NullLiteral => ConstantValue::Null,
        ExprKind::StringLiteral(s) => {
            ConstantValue::Str(s.clone()).convert_to_int(expr.ty.width(cx), false, false)
        }
        ExprKind::UnbasedUnsized(bit) => {
            let width = expr.ty.width(cx);
            let signed = expr.ty.is_signed(cx);
            ConstantValue::Integer(match bit {
                Logic::Zero => SVInt::zero(width, signed),
                Logic::One => SVInt::all_ones(width, signed),
                Logic::X => SVInt::fill_x(width, signed),
                Logic::Z => SVInt::fill_z(width, signed),
            })
        }
        ExprKind::NamedValue {
            symbol,
            hierarchical,
        } => eval_named_value(expr, symbol, *hierarchical, ctx),
        ExprKind::Unary { op, operand } => eval_unary(expr, *op, operand, ctx),
        ExprKind::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ctx),
        ExprKind::Conditional {
            cond,
            true_expr,
            false_expr,
        } => eval_conditional(expr, cond, true_expr, false_expr, ctx),
        ExprKind::Assignment { op, lhs, rhs, .. } => {
            let lval = match eval_lvalue(lhs, ctx) {
                Some(l) => l,
                None => return ConstantValue::Invalid,
            };
            let mut rvalue = eval_expr(rhs, ctx);
            if rvalue.is_invalid() {
                return ConstantValue::Invalid;
            }
            if let Some(op) = op {
                let current = lval.load(ctx);
                if current.is_invalid() {
                    return ConstantValue::Invalid;
                }
                rvalue = eval_binary_op(*op, &current, &rvalue);
                if rvalue.is_invalid() {
                    return ConstantValue::Invalid;
                }
                // Compound results convert back to the target type.
                if lhs.ty.is_integral(cx) {
                    rvalue = rvalue.convert_to_int(
                        lhs.ty.width(cx),
                        lhs.ty.is_signed(cx),
                        lhs.ty.is_four_state(cx),
                    );
                }
            }
            if !lval.store(ctx, rvalue.clone()) {
                return ConstantValue::Invalid;
            }
            rvalue
        }
        ExprKind::Concat { operands } => {
            if expr.ty.is_string(cx) {
                let mut result = String::new();
                for op in operands {
                    match eval_expr(op, ctx) {
                        ConstantValue::Str(s) => result.push_str(&s),
                        _ => return ConstantValue::Invalid,
                    }
                }
                return ConstantValue::Str(result);
            }
            let mut ints = vec![];
            for op in operands {
                // Zero-width replication operands contribute nothing.
                if op.ty.is_void(cx) {
                    if eval_expr(op, ctx).is_invalid() {
                        return ConstantValue::Invalid;
                    }
                    continue;
                }
                match eval_expr(op, ctx) {
                    ConstantValue::Integer(v) => ints.push(v),
                    _ => return ConstantValue::Invalid,
                }
            }
            ConstantValue::Integer(SVInt::concat(ints))
        }
        ExprKind::Replication { count, concat } => {
            // Operands are evaluated even when the count is zero.
            let value = eval_expr(concat, ctx);
            let n = eval_expr(count, ctx);
            if value.is_invalid() || n.is_invalid() {
                return ConstantValue::Invalid;
            }
            if expr.ty.is_void(cx) {
                return ConstantValue::Null;
            }
            let n = match n.integer().and_then(|v| v.as_i32()) {
                Some(n) if n >= 0 => n as usize,
                _ => {
                    ctx.add_diag(
                        Diag::new(DiagCode::NoteReplicationCountInvalid)
                            .arg(n)
                            .span(count.span),
                    );
                    return ConstantValue::Invalid;
                }
            };
            match value {
                ConstantValue::Str(s) => ConstantValue::Str(s.repeat(n)),
                ConstantValue::Integer(v) => ConstantValue::Integer(v.replicate(n)),
                _ => ConstantValue::Invalid,
            }
        }
        ExprKind::ElementSelect { value, index } => eval_element_select(expr, value, index, ctx),
        ExprKind::RangeSelect {
            mode,
            value,
            left,
            right,
            bounds,
        } => eval_range_select(expr, *mode, value, left, right, *bounds, ctx),
        ExprKind::MemberAccess { value, field } => {
            let cv = eval_expr(value, ctx);
            if cv.is_invalid() {
                return ConstantValue::Invalid;
            }
            let offset = match &field.kind {
                SymbolKind::Field(f) => f.offset as usize,
                _ => return ConstantValue::Invalid,
            };
            if value.ty.is_unpacked_struct(cx) {
                match cv.elements() {
                    Some(elems) if offset < elems.len() => elems[offset].clone(),
                    _ => ConstantValue::Invalid,
                }
            } else if value.ty.is_unpacked_union(cx) {
                // Unions store the active member's value directly.
                cv
            } else {
                let width = expr.ty.width(cx);
                match cv.integer() {
                    Some(v) => ConstantValue::Integer(v.slice(offset + width - 1, offset)),
                    None => ConstantValue::Invalid,
                }
            }
        }
        ExprKind::Call {
            target,
            args,
            location,
        } => eval_call(expr, target, args, *location, ctx),
        ExprKind::Conversion { operand, .. } => {
            let value = eval_expr(operand, ctx);
            if value.is_invalid() {
                return ConstantValue::Invalid;
            }
            convert_value(cx, expr, value)
        }
        ExprKind::DataTypeExpr => ConstantValue::Invalid,
        ExprKind::SimplePattern { elements }
        | ExprKind::StructuredPattern { elements }
        | ExprKind::ReplicatedPattern { elements, .. } => {
            if expr.ty.is_integral(cx) {
                let mut ints = vec![];
                for elem in elements {
                    match eval_expr(elem, ctx) {
                        ConstantValue::Integer(v) => ints.push(v),
                        _ => return ConstantValue::Invalid,
                    }
                }
                ConstantValue::Integer(SVInt::concat(ints))
            } else {
                let mut values = vec![];
                for elem in elements {
                    let v = eval_expr(elem, ctx);
                    if v.is_invalid() {
                        return ConstantValue::Invalid;
                    }
                    values.push(v);
                }
                ConstantValue::Elements(values)
            }
        }
    }
}

fn convert_value<'a>(
    cx: &Compilation<'a>,
    expr: &'a Expression<'a>,
    value: ConstantValue,
) -> ConstantValue {
    let to = expr.ty;
    if to.is_integral(cx) {
        return value.convert_to_int(to.width(cx), to.is_signed(cx), to.is_four_state(cx));
    }
    if to.is_floating(cx) {
        return match to.width(cx) {
            32 => value.convert_to_shortreal(),
            _ => value.convert_to_real(),
        };
    }
    if to.is_string(cx) {
        return value.convert_to_str();
    }
    // Conversions between equivalent aggregates pass the value through.
    value
}

fn eval_named_value<'a>(
    expr: &'a Expression<'a>,
    symbol: &'a Symbol<'a>,
    hierarchical: bool,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    if !verify_named_value(expr, symbol, hierarchical, ctx) {
        return ConstantValue::Invalid;
    }
    let cx = ctx.cx;
    match &symbol.kind {
        SymbolKind::Parameter(param) => {
            // Parameters inside an uninstantiated definition have no value;
            // fail silently so that the definition alone raises no errors.
            if let Some(parent) = symbol.parent() {
                if let SymbolKind::Definition(_) = parent.kind {
                    return ConstantValue::Invalid;
                }
            }
            if let Some(v) = param.value_override() {
                return v;
            }
            param.declared.constant_value(cx, symbol)
        }
        SymbolKind::EnumValue(ev) => match ev.direct_value() {
            Some(v) => v,
            None => ev.declared.constant_value(cx, symbol),
        },
        _ => {
            if let Some(v) = ctx.find_local(symbol) {
                return v.clone();
            }
            ctx.add_diag(
                Diag::new(DiagCode::NoteNonConstVariable)
                    .arg(symbol.name)
                    .span(expr.span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
            );
            ConstantValue::Invalid
        }
    }
}

/// Check the constant function rules for a name reference: no hierarchical
/// names, non-parameter identifiers local to the function, parameters
/// declared before the call site.
fn verify_named_value<'a>(
    expr: &'a Expression<'a>,
    symbol: &'a Symbol<'a>,
    hierarchical: bool,
    ctx: &mut EvalContext<'_, 'a>,
) -> bool {
    if ctx.is_script_eval() {
        return true;
    }
    if hierarchical {
        ctx.add_diag(
            Diag::new(DiagCode::NoteHierarchicalNameInCE)
                .arg(symbol.name)
                .span(expr.span),
        );
        return false;
    }
    let subroutine = match ctx.top_frame().subroutine {
        Some(s) => s,
        None => return true,
    };
    match symbol.kind {
        SymbolKind::Parameter(_) => {
            let call_location = ctx.top_frame().call_location;
            let same_scope = match (symbol.parent_scope(), call_location.scope) {
                (Some(a), Some(b)) => std::ptr::eq(a, b),
                _ => false,
            };
            if same_scope && !(symbol.index() < call_location.index) {
                ctx.add_diag(
                    Diag::new(DiagCode::NoteParamUsedInCEBeforeDecl)
                        .arg(symbol.name)
                        .span(expr.span)
                        .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
                );
                return false;
            }
            true
        }
        SymbolKind::EnumValue(_) => true,
        _ => {
            // Walk the parents to check the symbol is local to the function.
            let mut parent = symbol.parent();
            while let Some(p) = parent {
                if std::ptr::eq(p, subroutine) {
                    return true;
                }
                parent = p.parent();
            }
            ctx.add_diag(
                Diag::new(DiagCode::NoteFunctionIdentifiersMustBeLocal)
                    .span(expr.span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
            );
            false
        }
    }
}

fn eval_unary<'a>(
    _expr: &'a Expression<'a>,
    op: UnaryOp,
    operand: &'a Expression<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    use UnaryOp::*;
    // Increment and decrement require an lvalue.
    match op {
        PreInc | PreDec | PostInc | PostDec => {
            let lval = match eval_lvalue(operand, ctx) {
                Some(l) => l,
                None => return ConstantValue::Invalid,
            };
            let current = lval.load(ctx);
            let (next, result) = match &current {
                ConstantValue::Integer(v) => {
                    let one = SVInt::from_u64(v.width(), 1, v.is_signed());
                    let next = match op {
                        PreInc | PostInc => v.add(&one),
                        _ => v.sub(&one),
                    };
                    let result = match op {
                        PreInc | PreDec => next.clone(),
                        _ => v.clone(),
                    };
                    (ConstantValue::Integer(next), ConstantValue::Integer(result))
                }
                ConstantValue::Real(v) => {
                    let next = match op {
                        PreInc | PostInc => v + 1.0,
                        _ => v - 1.0,
                    };
                    let result = match op {
                        PreInc | PreDec => next,
                        _ => *v,
                    };
                    (ConstantValue::Real(next), ConstantValue::Real(result))
                }
                _ => return ConstantValue::Invalid,
            };
            if !lval.store(ctx, next) {
                return ConstantValue::Invalid;
            }
            return result;
        }
        _ => (),
    }

    let value = eval_expr(operand, ctx);
    if value.is_invalid() {
        return ConstantValue::Invalid;
    }
    match value {
        ConstantValue::Integer(v) => match op {
            Plus => ConstantValue::Integer(v),
            Minus => ConstantValue::Integer(v.neg()),
            BitNot => ConstantValue::Integer(v.not()),
            RedAnd => v.reduction_and().into(),
            RedOr => v.reduction_or().into(),
            RedXor => v.reduction_xor().into(),
            RedNand => v.reduction_and().not().into(),
            RedNor => v.reduction_or().not().into(),
            RedXnor => v.reduction_xor().not().into(),
            LogicNot => v.as_logic().not().into(),
            _ => ConstantValue::Invalid,
        },
        ConstantValue::Real(v) => match op {
            Plus => ConstantValue::Real(v),
            Minus => ConstantValue::Real(-v),
            LogicNot => ConstantValue::from(v == 0.0),
            _ => ConstantValue::Invalid,
        },
        ConstantValue::ShortReal(v) => match op {
            Plus => ConstantValue::ShortReal(v),
            Minus => ConstantValue::ShortReal(-v),
            LogicNot => ConstantValue::from(v == 0.0),
            _ => ConstantValue::Invalid,
        },
        _ => ConstantValue::Invalid,
    }
}

fn is_short_circuit_op(op: BinaryOp) -> bool {
    match op {
        BinaryOp::LogicAnd | BinaryOp::LogicOr | BinaryOp::LogicImplication => true,
        _ => false,
    }
}

fn eval_binary<'a>(
    op: BinaryOp,
    lhs: &'a Expression<'a>,
    rhs: &'a Expression<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    let lv = eval_expr(lhs, ctx);
    if lv.is_invalid() {
        return ConstantValue::Invalid;
    }

    // Short-circuiting operators only evaluate the right side when the left
    // does not determine the result.
    if is_short_circuit_op(op) {
        match op {
            BinaryOp::LogicOr if lv.is_true() => return ConstantValue::from(true),
            BinaryOp::LogicAnd if lv.is_false() => return ConstantValue::from(false),
            BinaryOp::LogicImplication if lv.is_false() => return ConstantValue::from(true),
            _ => (),
        }
    }

    let rv = eval_expr(rhs, ctx);
    if rv.is_invalid() {
        return ConstantValue::Invalid;
    }
    eval_binary_op(op, &lv, &rv)
}

/// Evaluate a binary operator over two constant values.
pub fn eval_binary_op(op: BinaryOp, lv: &ConstantValue, rv: &ConstantValue) -> ConstantValue {
    use BinaryOp::*;
    match (lv, rv) {
        (ConstantValue::Integer(l), ConstantValue::Integer(r)) => match op {
            Add => l.add(r).into(),
            Sub => l.sub(r).into(),
            Mul => l.mul(r).into(),
            Div => l.div(r).into(),
            Mod => l.rem(r).into(),
            Pow => l.pow(r).into(),
            BitAnd => l.and(r).into(),
            BitOr => l.or(r).into(),
            BitXor => l.xor(r).into(),
            BitXnor => l.xnor(r).into(),
            Shl => l.shl(r).into(),
            Shr => l.lshr(r).into(),
            AShr => {
                if l.is_signed() {
                    l.ashr(r).into()
                } else {
                    l.lshr(r).into()
                }
            }
            Eq => l.logic_eq(r).into(),
            Ne => l.logic_ne(r).into(),
            CaseEq => ConstantValue::from(l.case_eq(r)),
            CaseNe => ConstantValue::from(!l.case_eq(r)),
            WildcardEq => l.wildcard_eq(r).into(),
            WildcardNe => l.wildcard_eq(r).not().into(),
            Lt => l.logic_cmp(r, |o| o == std::cmp::Ordering::Less).into(),
            Le => l.logic_cmp(r, |o| o != std::cmp::Ordering::Greater).into(),
            Gt => l.logic_cmp(r, |o| o == std::cmp::Ordering::Greater).into(),
            Ge => l.logic_cmp(r, |o| o != std::cmp::Ordering::Less).into(),
            LogicAnd => eval_logic_op(op, logic_of(lv), logic_of(rv)),
            LogicOr => eval_logic_op(op, logic_of(lv), logic_of(rv)),
            LogicImplication => eval_logic_op(op, logic_of(lv), logic_of(rv)),
            LogicEquivalence => eval_logic_op(op, logic_of(lv), logic_of(rv)),
        },
        (ConstantValue::Str(l), ConstantValue::Str(r)) => match op {
            Eq | CaseEq => ConstantValue::from(l == r),
            Ne | CaseNe => ConstantValue::from(l != r),
            Lt => ConstantValue::from(l < r),
            Le => ConstantValue::from(l <= r),
            Gt => ConstantValue::from(l > r),
            Ge => ConstantValue::from(l >= r),
            _ => ConstantValue::Invalid,
        },
        (ConstantValue::Elements(l), ConstantValue::Elements(r)) => match op {
            Eq | Ne => {
                if l.len() != r.len() {
                    return ConstantValue::Invalid;
                }
                let mut result = Logic::One;
                for (a, b) in l.iter().zip(r.iter()) {
                    match eval_binary_op(Eq, a, b) {
                        ConstantValue::Integer(v) => match v.as_logic() {
                            Logic::One => (),
                            Logic::Zero => {
                                result = Logic::Zero;
                                break;
                            }
                            _ => result = Logic::X,
                        },
                        _ => return ConstantValue::Invalid,
                    }
                }
                let result = if op == Ne { result.not() } else { result };
                result.into()
            }
            _ => ConstantValue::Invalid,
        },
        (l, r) if is_float_value(l) || is_float_value(r) => {
            let (lf, rf) = match (l.convert_to_real(), r.convert_to_real()) {
                (ConstantValue::Real(a), ConstantValue::Real(b)) => (a, b),
                _ => return eval_logic_op(op, logic_of(l), logic_of(r)),
            };
            match op {
                Add => ConstantValue::Real(lf + rf),
                Sub => ConstantValue::Real(lf - rf),
                Mul => ConstantValue::Real(lf * rf),
                Div => ConstantValue::Real(lf / rf),
                Pow => ConstantValue::Real(lf.powf(rf)),
                Eq | CaseEq => ConstantValue::from(lf == rf),
                Ne | CaseNe => ConstantValue::from(lf != rf),
                Lt => ConstantValue::from(lf < rf),
                Le => ConstantValue::from(lf <= rf),
                Gt => ConstantValue::from(lf > rf),
                Ge => ConstantValue::from(lf >= rf),
                LogicAnd | LogicOr | LogicImplication | LogicEquivalence => {
                    eval_logic_op(op, logic_of(l), logic_of(r))
                }
                _ => ConstantValue::Invalid,
            }
        }
        (l, r) => eval_logic_op(op, logic_of(l), logic_of(r)),
    }
}

fn is_float_value(v: &ConstantValue) -> bool {
    match v {
        ConstantValue::Real(_) | ConstantValue::ShortReal(_) => true,
        _ => false,
    }
}

fn logic_of(v: &ConstantValue) -> Logic {
    match v {
        ConstantValue::Integer(i) => i.as_logic(),
        _ => {
            if v.is_true() {
                Logic::One
            } else {
                Logic::Zero
            }
        }
    }
}

fn eval_logic_op(op: BinaryOp, l: Logic, r: Logic) -> ConstantValue {
    use BinaryOp::*;
    let and = |a: Logic, b: Logic| match (a, b) {
        (Logic::Zero, _) | (_, Logic::Zero) => Logic::Zero,
        (Logic::One, Logic::One) => Logic::One,
        _ => Logic::X,
    };
    let or = |a: Logic, b: Logic| match (a, b) {
        (Logic::One, _) | (_, Logic::One) => Logic::One,
        (Logic::Zero, Logic::Zero) => Logic::Zero,
        _ => Logic::X,
    };
    let result = match op {
        LogicAnd => and(l, r),
        LogicOr => or(l, r),
        LogicImplication => or(l.not(), r),
        LogicEquivalence => and(or(l.not(), r), or(r.not(), l)),
        _ => return ConstantValue::Invalid,
    };
    result.into()
}

fn eval_conditional<'a>(
    expr: &'a Expression<'a>,
    cond: &'a Expression<'a>,
    true_expr: &'a Expression<'a>,
    false_expr: &'a Expression<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    let cv = eval_expr(cond, ctx);
    if cv.is_invalid() {
        return ConstantValue::Invalid;
    }

    // An unknown predicate merges both sides into a hybrid result.
    if let ConstantValue::Integer(p) = &cv {
        if p.has_unknown() {
            let lv = eval_expr(true_expr, ctx);
            let rv = eval_expr(false_expr, ctx);
            if lv.is_invalid() || rv.is_invalid() {
                return ConstantValue::Invalid;
            }
            let cx = ctx.cx;
            return match (&lv, &rv) {
                (ConstantValue::Integer(l), ConstantValue::Integer(r)) => {
                    ConstantValue::Integer(SVInt::conditional_merge(l, r))
                }
                (ConstantValue::Elements(l), ConstantValue::Elements(r)) => {
                    // Elementwise: keep equal elements, default the rest.
                    if l.len() != r.len() {
                        return ConstantValue::Invalid;
                    }
                    let default = expr
                        .ty
                        .element_type(cx)
                        .map(|t| t.default_value(cx))
                        .unwrap_or(ConstantValue::Invalid);
                    let mut out = vec![];
                    for (a, b) in l.iter().zip(r.iter()) {
                        let eq = eval_binary_op(BinaryOp::Eq, a, b);
                        let keep = match eq {
                            ConstantValue::Integer(ref v) => v.as_logic() == Logic::One,
                            _ => false,
                        };
                        out.push(if keep { a.clone() } else { default.clone() });
                    }
                    ConstantValue::Elements(out)
                }
                _ => expr.ty.default_value(cx),
            };
        }
    }

    if cv.is_true() {
        eval_expr(true_expr, ctx)
    } else {
        eval_expr(false_expr, ctx)
    }
}

fn check_array_index<'a>(
    expr: &'a Expression<'a>,
    value_ty: crate::ty::Type<'a>,
    index: &ConstantValue,
    ctx: &mut EvalContext<'_, 'a>,
) -> Option<i32> {
    let cx = ctx.cx;
    let index = match index.integer().and_then(|v| v.as_i32()) {
        Some(i) => i,
        None => {
            ctx.add_diag(
                Diag::new(DiagCode::NoteArrayIndexInvalid)
                    .arg(index)
                    .arg(value_ty.display(cx))
                    .span(expr.span),
            );
            return None;
        }
    };
    let range = match value_ty.array_range(cx) {
        Some(r) => r,
        None => return None,
    };
    if !range.contains(index) {
        ctx.add_diag(
            Diag::new(DiagCode::NoteArrayIndexInvalid)
                .arg(index)
                .arg(value_ty.display(cx))
                .span(expr.span),
        );
        return None;
    }
    Some(index)
}

fn eval_element_select<'a>(
    expr: &'a Expression<'a>,
    value: &'a Expression<'a>,
    index: &'a Expression<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    let cv = eval_expr(value, ctx);
    let ci = eval_expr(index, ctx);
    if cv.is_invalid() || ci.is_invalid() {
        return ConstantValue::Invalid;
    }
    let cx = ctx.cx;

    if value.ty.is_string(cx) {
        let s = match &cv {
            ConstantValue::Str(s) => s.clone(),
            _ => return ConstantValue::Invalid,
        };
        let i = match ci.integer().and_then(|v| v.as_i32()) {
            Some(i) if i >= 0 && (i as usize) < s.len() => i as usize,
            _ => {
                ctx.add_diag(
                    Diag::new(DiagCode::NoteStringIndexInvalid)
                        .arg(ci)
                        .arg(s.len())
                        .span(expr.span),
                );
                return ConstantValue::Invalid;
            }
        };
        return ConstantValue::Integer(SVInt::from_u64(8, s.as_bytes()[i] as u64, false));
    }

    let i = match check_array_index(expr, value.ty, &ci, ctx) {
        Some(i) => i,
        None => return ConstantValue::Invalid,
    };
    let range = value.ty.array_range(cx).unwrap();

    if value.ty.is_unpacked_array(cx) {
        let offset = range.translate_index(i) as usize;
        match cv.elements() {
            Some(elems) if offset < elems.len() => elems[offset].clone(),
            _ => ConstantValue::Invalid,
        }
    } else {
        let width = expr.ty.width(cx);
        let lsb = range.bit_offset(i, width);
        match cv.integer() {
            Some(v) => ConstantValue::Integer(v.slice(lsb + width - 1, lsb)),
            None => ConstantValue::Invalid,
        }
    }
}

fn range_select_bounds<'a>(
    expr: &'a Expression<'a>,
    mode: crate::ast::RangeSelectMode,
    value: &'a Expression<'a>,
    left: &'a Expression<'a>,
    right: &'a Expression<'a>,
    bounds: Option<(i32, i32)>,
    ctx: &mut EvalContext<'_, 'a>,
) -> Option<ConstantRange> {
    let cx = ctx.cx;
    let value_range = value.ty.array_range(cx)?;
    let sel = match bounds {
        Some((l, r)) => ConstantRange::new(l, r),
        None => {
            let base = eval_expr(left, ctx);
            let width = eval_expr(right, ctx);
            let base = match base.integer().and_then(|v| v.as_i32()) {
                Some(b) => b,
                None => {
                    ctx.add_diag(
                        Diag::new(DiagCode::NoteArrayIndexInvalid)
                            .arg(base)
                            .arg(value.ty.display(cx))
                            .span(expr.span),
                    );
                    return None;
                }
            };
            let width = width.integer().and_then(|v| v.as_i32()).unwrap_or(0);
            crate::expr::indexed_range(mode, base, width, value_range.is_little_endian())
        }
    };
    if !value_range.contains(sel.left) || !value_range.contains(sel.right) {
        ctx.add_diag(
            Diag::new(DiagCode::NotePartSelectInvalid)
                .arg(sel.left)
                .arg(sel.right)
                .arg(value.ty.display(cx))
                .span(expr.span),
        );
        return None;
    }
    Some(sel)
}

fn eval_range_select<'a>(
    expr: &'a Expression<'a>,
    mode: crate::ast::RangeSelectMode,
    value: &'a Expression<'a>,
    left: &'a Expression<'a>,
    right: &'a Expression<'a>,
    bounds: Option<(i32, i32)>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    let cv = eval_expr(value, ctx);
    if cv.is_invalid() {
        return ConstantValue::Invalid;
    }
    let sel = match range_select_bounds(expr, mode, value, left, right, bounds, ctx) {
        Some(s) => s,
        None => return ConstantValue::Invalid,
    };
    let cx = ctx.cx;
    let value_range = value.ty.array_range(cx).unwrap();

    if value.ty.is_unpacked_array(cx) {
        let start = value_range.translate_index(sel.left) as usize;
        let len = sel.width();
        match cv.elements() {
            Some(elems) if start + len <= elems.len() => {
                ConstantValue::Elements(elems[start..start + len].to_vec())
            }
            _ => ConstantValue::Invalid,
        }
    } else {
        let elem_width = value
            .ty
            .element_type(cx)
            .map(|t| t.width(cx))
            .unwrap_or(1);
        let a = value_range.bit_offset(sel.left, elem_width);
        let b = value_range.bit_offset(sel.right, elem_width);
        let lsb = std::cmp::min(a, b);
        let msb = std::cmp::max(a, b) + elem_width - 1;
        match cv.integer() {
            Some(v) => ConstantValue::Integer(v.slice(msb, lsb)),
            None => ConstantValue::Invalid,
        }
    }
}

fn eval_call<'a>(
    expr: &'a Expression<'a>,
    target: &CallTarget<'a>,
    args: &[&'a Expression<'a>],
    location: LookupLocation<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> ConstantValue {
    let symbol = match target {
        CallTarget::System(sub) => return sub.eval(ctx, args, expr.span),
        CallTarget::Subroutine(symbol) => *symbol,
    };
    let sub = match &symbol.kind {
        SymbolKind::Subroutine(s) => s,
        _ => return ConstantValue::Invalid,
    };
    if sub.kind == SubroutineKind::Task && !ctx.is_script_eval() {
        ctx.add_diag(Diag::new(DiagCode::NoteTaskNotConstant).span(expr.span));
        return ConstantValue::Invalid;
    }

    // Evaluate the arguments in the caller's frame.
    let mut arg_values = vec![];
    for arg in args {
        let v = eval_expr(arg, ctx);
        if v.is_invalid() {
            return ConstantValue::Invalid;
        }
        arg_values.push(v);
    }

    if !ctx.push_frame(symbol, location, expr.span) {
        return ConstantValue::Invalid;
    }
    let cx = ctx.cx;
    let formals = sub.args.borrow().clone();
    for (formal, value) in formals.iter().zip(arg_values) {
        ctx.create_local(formal, value);
    }
    let return_var = sub.return_var.get();
    if let Some(rv) = return_var {
        let ret_ty = sub.return_type.ty(cx, symbol);
        ctx.create_local(rv, ret_ty.default_value(cx));
    }

    let body = sub.binder.get_statement(cx, symbol);
    let result = eval_stmt(body, ctx);

    let value = return_var
        .and_then(|rv| ctx.find_local(rv).cloned())
        .unwrap_or(ConstantValue::Invalid);
    ctx.pop_frame();

    match result {
        EvalResult::Success | EvalResult::Return => value,
        _ => ConstantValue::Invalid,
    }
}

/// Evaluate an lvalue expression to a storage cursor.
pub fn eval_lvalue<'a>(
    expr: &'a Expression<'a>,
    ctx: &mut EvalContext<'_, 'a>,
) -> Option<LValue<'a>> {
    let cx = ctx.cx;
    match &expr.kind {
        ExprKind::NamedValue { symbol, .. } => {
            if ctx.find_local(symbol).is_none() {
                ctx.add_diag(
                    Diag::new(DiagCode::NoteNonConstVariable)
                        .arg(symbol.name)
                        .span(expr.span)
                        .note(Diag::new(DiagCode::NoteDeclarationHere).span(symbol.span)),
                );
                return None;
            }
            Some(LValue::Local {
                symbol,
                path: vec![],
            })
        }
        ExprKind::ElementSelect { value, index } => {
            let lval = eval_lvalue(value, ctx)?;
            let ci = eval_expr(index, ctx);
            if ci.is_invalid() {
                return None;
            }
            let i = check_array_index(expr, value.ty, &ci, ctx)?;
            let range = value.ty.array_range(cx)?;
            if value.ty.is_unpacked_array(cx) {
                Some(lval.select_index(range.translate_index(i) as usize))
            } else {
                let width = expr.ty.width(cx);
                let lsb = range.bit_offset(i, width);
                Some(lval.select_bit_range(lsb + width - 1, lsb))
            }
        }
        ExprKind::RangeSelect {
            mode,
            value,
            left,
            right,
            bounds,
        } => {
            let lval = eval_lvalue(value, ctx)?;
            let sel = range_select_bounds(expr, *mode, value, left, right, *bounds, ctx)?;
            let value_range = value.ty.array_range(cx)?;
            if value.ty.is_unpacked_array(cx) {
                let start = value_range.translate_index(sel.left) as usize;
                Some(lval.select_slice(start, sel.width()))
            } else {
                let elem_width = value
                    .ty
                    .element_type(cx)
                    .map(|t| t.width(cx))
                    .unwrap_or(1);
                let a = value_range.bit_offset(sel.left, elem_width);
                let b = value_range.bit_offset(sel.right, elem_width);
                let lsb = std::cmp::min(a, b);
                let msb = std::cmp::max(a, b) + elem_width - 1;
                Some(lval.select_bit_range(msb, lsb))
            }
        }
        ExprKind::MemberAccess { value, field } => {
            let lval = eval_lvalue(value, ctx)?;
            let offset = match &field.kind {
                SymbolKind::Field(f) => f.offset as usize,
                _ => return None,
            };
            if value.ty.is_unpacked_struct(cx) || value.ty.is_unpacked_union(cx) {
                Some(lval.select_index(offset))
            } else {
                let width = expr.ty.width(cx);
                Some(lval.select_bit_range(offset + width - 1, offset))
            }
        }
        ExprKind::Concat { operands } => {
            let mut parts = vec![];
            for op in operands.iter() {
                let lval = eval_lvalue(op, ctx)?;
                parts.push((lval, op.ty.width(cx)));
            }
            Some(LValue::Concat(parts))
        }
        _ => {
            ctx.add_diag(Diag::new(DiagCode::NoteNonConstVariable).arg("expression").span(expr.span));
            None
        }
    }
}

/// Evaluate a bound statement.
pub fn eval_stmt<'a>(stmt: &'a Statement<'a>, ctx: &mut EvalContext<'_, 'a>) -> EvalResult {
    if !ctx.step(stmt.span) {
        return EvalResult::Fail;
    }
    let cx = ctx.cx;
    match &stmt.kind {
        StmtData::Invalid => EvalResult::Fail,
        StmtData::Empty => EvalResult::Success,
        StmtData::List(stmts) => {
            for s in stmts {
                match eval_stmt(s, ctx) {
                    EvalResult::Success => (),
                    other => return other,
                }
            }
            EvalResult::Success
        }
        StmtData::Block { body, .. } => eval_stmt(body, ctx),
        StmtData::Expr(e) => {
            if eval_expr(e, ctx).is_invalid() {
                EvalResult::Fail
            } else {
                EvalResult::Success
            }
        }
        StmtData::VarDecl(syms) => {
            for sym in syms {
                let declared = sym.declared_type().unwrap();
                let value = match declared.initializer(cx, sym) {
                    Some(init) => {
                        let v = eval_expr(init, ctx);
                        if v.is_invalid() {
                            return EvalResult::Fail;
                        }
                        v
                    }
                    None => declared.ty(cx, sym).default_value(cx),
                };
                ctx.create_local(sym, value);
            }
            EvalResult::Success
        }
        StmtData::Return(value) => {
            if let Some(value) = value {
                let v = eval_expr(value, ctx);
                if v.is_invalid() {
                    return EvalResult::Fail;
                }
                let return_var = ctx
                    .top_frame()
                    .subroutine
                    .and_then(|s| match &s.kind {
                        SymbolKind::Subroutine(sub) => sub.return_var.get(),
                        _ => None,
                    });
                if let Some(rv) = return_var {
                    ctx.create_local(rv, v);
                }
            }
            EvalResult::Return
        }
        StmtData::Break => EvalResult::Break,
        StmtData::Continue => EvalResult::Continue,
        StmtData::Conditional {
            cond,
            if_true,
            if_false,
        } => {
            let cv = eval_expr(cond, ctx);
            if cv.is_invalid() {
                return EvalResult::Fail;
            }
            if cv.is_true() {
                eval_stmt(if_true, ctx)
            } else if let Some(if_false) = if_false {
                eval_stmt(if_false, ctx)
            } else {
                EvalResult::Success
            }
        }
        StmtData::Case {
            cond,
            items,
            default,
        } => {
            let cv = eval_expr(cond, ctx);
            if cv.is_invalid() {
                return EvalResult::Fail;
            }
            for item in items {
                for e in &item.exprs {
                    let ev = eval_expr(e, ctx);
                    if ev.is_invalid() {
                        return EvalResult::Fail;
                    }
                    let matches = match (&cv, &ev) {
                        (ConstantValue::Integer(a), ConstantValue::Integer(b)) => a.case_eq(b),
                        (a, b) => a == b,
                    };
                    if matches {
                        return eval_stmt(item.stmt, ctx);
                    }
                }
            }
            match default {
                Some(d) => eval_stmt(d, ctx),
                None => EvalResult::Success,
            }
        }
        StmtData::For {
            init,
            cond,
            step,
            body,
        } => {
            for i in init {
                match eval_stmt(i, ctx) {
                    EvalResult::Success => (),
                    other => return other,
                }
            }
            loop {
                if !ctx.step(stmt.span) {
                    return EvalResult::Fail;
                }
                if let Some(cond) = cond {
                    let cv = eval_expr(cond, ctx);
                    if cv.is_invalid() {
                        return EvalResult::Fail;
                    }
                    if !cv.is_true() {
                        break;
                    }
                }
                match eval_stmt(body, ctx) {
                    EvalResult::Success | EvalResult::Continue => (),
                    EvalResult::Break => break,
                    other => return other,
                }
                for s in step {
                    if eval_expr(s, ctx).is_invalid() {
                        return EvalResult::Fail;
                    }
                }
            }
            EvalResult::Success
        }
        StmtData::Repeat { count, body } => {
            let cv = eval_expr(count, ctx);
            let n = match cv.integer().and_then(|v| v.as_i64()) {
                Some(n) if n >= 0 => n,
                _ => return EvalResult::Fail,
            };
            for _ in 0..n {
                if !ctx.step(stmt.span) {
                    return EvalResult::Fail;
                }
                match eval_stmt(body, ctx) {
                    EvalResult::Success | EvalResult::Continue => (),
                    EvalResult::Break => break,
                    other => return other,
                }
            }
            EvalResult::Success
        }
        StmtData::While { cond, body } => loop {
            if !ctx.step(stmt.span) {
                return EvalResult::Fail;
            }
            let cv = eval_expr(cond, ctx);
            if cv.is_invalid() {
                return EvalResult::Fail;
            }
            if !cv.is_true() {
                return EvalResult::Success;
            }
            match eval_stmt(body, ctx) {
                EvalResult::Success | EvalResult::Continue => (),
                EvalResult::Break => return EvalResult::Success,
                other => return other,
            }
        },
        StmtData::DoWhile { body, cond } => loop {
            if !ctx.step(stmt.span) {
                return EvalResult::Fail;
            }
            match eval_stmt(body, ctx) {
                EvalResult::Success | EvalResult::Continue => (),
                EvalResult::Break => return EvalResult::Success,
                other => return other,
            }
            let cv = eval_expr(cond, ctx);
            if cv.is_invalid() {
                return EvalResult::Fail;
            }
            if !cv.is_true() {
                return EvalResult::Success;
            }
        },
        StmtData::Forever { body } => loop {
            if !ctx.step(stmt.span) {
                return EvalResult::Fail;
            }
            match eval_stmt(body, ctx) {
                EvalResult::Success | EvalResult::Continue => (),
                EvalResult::Break => return EvalResult::Success,
                other => return other,
            }
        },
        StmtData::Timed { .. } => {
            ctx.add_diag(Diag::new(DiagCode::NoteTimedStmtNotConst).span(stmt.span));
            EvalResult::Fail
        }
        StmtData::Assertion { cond } => {
            if eval_expr(cond, ctx).is_invalid() {
                EvalResult::Fail
            } else {
                EvalResult::Success
            }
        }
    }
}

/// Walk an expression tree in verifying mode, checking the constant function
/// rules without halting on the first error. Always fails closed.
pub fn verify_expr<'a>(expr: &'a Expression<'a>, ctx: &mut EvalContext<'_, 'a>) -> bool {
    if expr.bad() {
        return false;
    }
    match &expr.kind {
        ExprKind::Invalid => false,
        ExprKind::IntegerLiteral(_)
        | ExprKind::RealLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::NullLiteral
        | ExprKind::UnbasedUnsized(_)
        | ExprKind::DataTypeExpr => true,
        ExprKind::NamedValue {
            symbol,
            hierarchical,
        } => {
            // Locals of the enclosing frame are always fine.
            if ctx.find_local(symbol).is_some() {
                return true;
            }
            verify_named_value(expr, symbol, *hierarchical, ctx)
        }
        ExprKind::Unary { operand, .. } => verify_expr(operand, ctx),
        ExprKind::Binary { lhs, rhs, .. } => {
            let l = verify_expr(lhs, ctx);
            let r = verify_expr(rhs, ctx);
            l && r
        }
        ExprKind::Conditional {
            cond,
            true_expr,
            false_expr,
        } => {
            let c = verify_expr(cond, ctx);
            let t = verify_expr(true_expr, ctx);
            let f = verify_expr(false_expr, ctx);
            c && t && f
        }
        ExprKind::Assignment { lhs, rhs, .. } => {
            let l = verify_expr(lhs, ctx);
            let r = verify_expr(rhs, ctx);
            l && r
        }
        ExprKind::Concat { operands } => {
            let mut ok = true;
            for op in operands {
                ok &= verify_expr(op, ctx);
            }
            ok
        }
        ExprKind::Replication { count, concat } => {
            let c = verify_expr(count, ctx);
            let v = verify_expr(concat, ctx);
            c && v
        }
        ExprKind::ElementSelect { value, index } => {
            let v = verify_expr(value, ctx);
            let i = verify_expr(index, ctx);
            v && i
        }
        ExprKind::RangeSelect {
            value, left, right, ..
        } => {
            let v = verify_expr(value, ctx);
            let l = verify_expr(left, ctx);
            let r = verify_expr(right, ctx);
            v && l && r
        }
        ExprKind::MemberAccess { value, .. } => verify_expr(value, ctx),
        ExprKind::Call {
            target,
            args,
            location,
        } => {
            let mut ok = true;
            for arg in args {
                ok &= verify_expr(arg, ctx);
            }
            if !ok {
                return false;
            }
            match target {
                CallTarget::System(sub) => sub.verify_constant(ctx, args, expr.span),
                CallTarget::Subroutine(symbol) => {
                    let sub = match &symbol.kind {
                        SymbolKind::Subroutine(s) => s,
                        _ => return false,
                    };
                    if sub.kind == SubroutineKind::Task && !ctx.is_script_eval() {
                        ctx.add_diag(Diag::new(DiagCode::NoteTaskNotConstant).span(expr.span));
                        return false;
                    }
                    if !ctx.push_frame(symbol, *location, expr.span) {
                        return false;
                    }
                    let body = sub.binder.get_statement(ctx.cx, symbol);
                    let result = verify_stmt(body, ctx);
                    ctx.pop_frame();
                    result
                }
            }
        }
        ExprKind::Conversion { operand, .. } => verify_expr(operand, ctx),
        ExprKind::SimplePattern { elements } | ExprKind::StructuredPattern { elements } => {
            let mut ok = true;
            for e in elements {
                ok &= verify_expr(e, ctx);
            }
            ok
        }
        ExprKind::ReplicatedPattern { count, elements } => {
            let mut ok = verify_expr(count, ctx);
            for e in elements {
                ok &= verify_expr(e, ctx);
            }
            ok
        }
    }
}

/// Walk a statement tree in verifying mode.
pub fn verify_stmt<'a>(stmt: &'a Statement<'a>, ctx: &mut EvalContext<'_, 'a>) -> bool {
    match &stmt.kind {
        StmtData::Invalid => false,
        StmtData::Empty | StmtData::Break | StmtData::Continue => true,
        StmtData::List(stmts) => {
            let mut ok = true;
            for s in stmts {
                ok &= verify_stmt(s, ctx);
            }
            ok
        }
        StmtData::Block { body, .. } => verify_stmt(body, ctx),
        StmtData::Expr(e) => verify_expr(e, ctx),
        StmtData::VarDecl(syms) => {
            let mut ok = true;
            for sym in syms {
                // Register the local so that later references verify; the
                // value itself is irrelevant here.
                ctx.create_local(sym, ConstantValue::Invalid);
                if let Some(init) = sym
                    .declared_type()
                    .and_then(|d| d.initializer(ctx.cx, sym))
                {
                    ok &= verify_expr(init, ctx);
                }
            }
            ok
        }
        StmtData::Return(value) => value.map(|v| verify_expr(v, ctx)).unwrap_or(true),
        StmtData::Conditional {
            cond,
            if_true,
            if_false,
        } => {
            let mut ok = verify_expr(cond, ctx);
            ok &= verify_stmt(if_true, ctx);
            if let Some(f) = if_false {
                ok &= verify_stmt(f, ctx);
            }
            ok
        }
        StmtData::Case {
            cond,
            items,
            default,
        } => {
            let mut ok = verify_expr(cond, ctx);
            for item in items {
                for e in &item.exprs {
                    ok &= verify_expr(e, ctx);
                }
                ok &= verify_stmt(item.stmt, ctx);
            }
            if let Some(d) = default {
                ok &= verify_stmt(d, ctx);
            }
            ok
        }
        StmtData::For {
            init,
            cond,
            step,
            body,
        } => {
            let mut ok = true;
            for i in init {
                ok &= verify_stmt(i, ctx);
            }
            if let Some(c) = cond {
                ok &= verify_expr(c, ctx);
            }
            for s in step {
                ok &= verify_expr(s, ctx);
            }
            ok & verify_stmt(body, ctx)
        }
        StmtData::Repeat { count, body } => verify_expr(count, ctx) & verify_stmt(body, ctx),
        StmtData::While { cond, body } => verify_expr(cond, ctx) & verify_stmt(body, ctx),
        StmtData::DoWhile { body, cond } => verify_stmt(body, ctx) & verify_expr(cond, ctx),
        StmtData::Forever { body } => verify_stmt(body, ctx),
        StmtData::Timed { .. } => {
            ctx.add_diag(Diag::new(DiagCode::NoteTimedStmtNotConst).span(stmt.span));
            false
        }
        StmtData::Assertion { cond } => verify_expr(cond, ctx),
    }
}
