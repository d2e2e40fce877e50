// Copyright (c) 2016-2020 Fabian Schuiki

//! Expression binding and constant evaluation tests.

mod common;
use common::*;

use silica_svlog::ast::{BinaryOp, RangeSelectMode, UnaryOp};
use silica_svlog::expr::{self, BindContext, ExprKind};
use silica_svlog::eval::{self, EvalContext};
use silica_svlog::scope::Scope;

/// Bind an expression inside the scope of the named top instance.
fn bind<'a>(
    cx: &Compilation<'a>,
    scope: &'a Scope<'a>,
    syntax: silica_svlog::ast::Expr,
) -> &'a expr::Expression<'a> {
    let syntax = cx.alloc_expr_syntax(syntax);
    let ctx = BindContext::new(scope);
    expr::bind_expr(cx, &ctx, syntax)
}

/// Bind and evaluate an expression in an empty script scope.
fn eval_in_script(syntax: silica_svlog::ast::Expr) -> (ConstantValue, Vec<DiagCode>) {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let scope = cx.create_script_scope();
    let bound = bind(&cx, scope.scope().unwrap(), syntax);
    let mut ectx = EvalContext::new(&cx);
    let value = eval::eval_expr(bound, &mut ectx);
    (value, cx.diagnostic_codes())
}

fn eval_int(syntax: silica_svlog::ast::Expr) -> i64 {
    let (value, _) = eval_in_script(syntax);
    int_value(&value)
}

#[test]
fn width_propagation() {
    // bit [19:0] i;  i = 5'b01011 + 4'b1100
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(&cx, vec![module("top", vec![var(bit_vec_ty(19, 0), "i")])]);
    let top = top_instance(&cx, "top");
    let scope = top.scope().unwrap();

    let bound = bind(
        &cx,
        scope,
        assign(
            ident("i"),
            binary(
                BinaryOp::Add,
                int_sized(5, 0b01011, false),
                int_sized(4, 0b1100, false),
            ),
        ),
    );
    assert!(!bound.bad());
    assert_eq!(bound.ty.width(&cx), 20);

    // The right side was recomputed at the context width, and both addends
    // picked up implicit conversions to 20 bits.
    let rhs = match &bound.kind {
        ExprKind::Assignment { rhs, .. } => rhs,
        _ => panic!("expected an assignment"),
    };
    assert_eq!(rhs.ty.width(&cx), 20);
    match &rhs.kind {
        ExprKind::Binary { lhs, rhs, .. } => {
            assert_eq!(lhs.ty.width(&cx), 20);
            assert_eq!(rhs.ty.width(&cx), 20);
            assert!(matches!(lhs.kind, ExprKind::Conversion { .. }));
            assert!(matches!(rhs.kind, ExprKind::Conversion { .. }));
        }
        _ => panic!("expected the addition to survive propagation"),
    }

    // And the arithmetic happens at the propagated width.
    let mut ectx = EvalContext::new(&cx);
    let value = eval::eval_expr(rhs, &mut ectx);
    assert_eq!(int_value(&value), 0b01011 + 0b1100);
    assert_eq!(value.integer().unwrap().width(), 20);
}

#[test]
fn constant_round_trip() {
    // Binding then evaluating a literal preserves width and value.
    let (value, _) = eval_in_script(int_sized(5, 11, false));
    let v = value.integer().unwrap();
    assert_eq!(v.width(), 5);
    assert_eq!(v.as_i64(), Some(11));
}

#[test]
fn short_circuit() {
    // The right side of && and || is not evaluated when the left side
    // decides; no division diagnostic appears.
    let (value, diags) = eval_in_script(binary(
        BinaryOp::LogicAnd,
        int(0),
        binary(BinaryOp::Div, int(1), int(0)),
    ));
    assert!(value.is_false());
    assert!(diags.is_empty());

    let (value, _) = eval_in_script(binary(
        BinaryOp::LogicOr,
        int(1),
        binary(BinaryOp::Div, int(1), int(0)),
    ));
    assert!(value.is_true());
}

#[test]
fn four_state_arithmetic() {
    // x + 1 is all-x.
    let (value, _) = eval_in_script(binary(
        BinaryOp::Add,
        int_lit(SVInt::fill_x(8, false)),
        int_sized(8, 1, false),
    ));
    assert!(value.integer().unwrap().has_unknown());

    // Bitwise operators propagate unknowns per bit: 4'b10x0 & 4'b1100.
    let mut a = SVInt::from_u64(4, 0b1000, false);
    a.set_bit(1, Logic::X);
    let (value, _) = eval_in_script(binary(
        BinaryOp::BitAnd,
        int_lit(a),
        int_sized(4, 0b1100, false),
    ));
    assert_eq!(value.integer().unwrap(), &SVInt::from_u64(4, 0b1000, false));
}

#[test]
fn case_equality_treats_unknowns_exactly() {
    let mut a = SVInt::from_u64(4, 0b1010, false);
    a.set_bit(0, Logic::X);
    let mut b = SVInt::from_u64(4, 0b1010, false);
    b.set_bit(0, Logic::X);
    let v = eval_int(binary(BinaryOp::CaseEq, int_lit(a.clone()), int_lit(b)));
    assert_eq!(v, 1);
    // Ordinary equality over unknowns yields x.
    let mut c = SVInt::from_u64(4, 0b1010, false);
    c.set_bit(0, Logic::X);
    let (value, _) = eval_in_script(binary(
        BinaryOp::Eq,
        int_lit(c),
        int_sized(4, 0b1010, false),
    ));
    assert!(value.integer().unwrap().has_unknown());
}

#[test]
fn conditional_with_unknown_predicate() {
    // Equal arms survive the merge; differing bits become x.
    let (value, _) = eval_in_script(cond(
        int_lit(SVInt::fill_x(1, false)),
        int_sized(8, 0xFF, false),
        int_sized(8, 0x0F, false),
    ));
    let v = value.integer().unwrap();
    // The low nibble agrees, the high nibble does not.
    for i in 0..4 {
        assert_eq!(v.bit(i), Logic::One);
    }
    for i in 4..8 {
        assert_eq!(v.bit(i), Logic::X);
    }
}

#[test]
fn concat_and_replication() {
    assert_eq!(
        eval_int(concat(vec![
            int_sized(4, 0b1010, false),
            int_sized(4, 0b0101, false),
        ])),
        0b10100101
    );
    assert_eq!(
        eval_int(replicate(int(3), vec![int_sized(2, 0b10, false)])),
        0b101010
    );
}

#[test]
fn string_concat_stays_string() {
    let (value, diags) = eval_in_script(concat(vec![string_lit("foo"), string_lit("bar")]));
    assert_eq!(value, ConstantValue::Str("foobar".to_string()));
    assert!(diags.is_empty());
}

#[test]
fn mixing_string_and_int_in_concat() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let scope = cx.create_script_scope();
    // Force one operand to be a true string so the mix is a hard error.
    let bound = bind(
        &cx,
        scope.scope().unwrap(),
        concat(vec![
            cast(
                silica_svlog::ast::DataType::new(silica_svlog::ast::DataTypeKind::String, sp()),
                string_lit("hi"),
            ),
            int(1),
        ]),
    );
    assert!(bound.bad());
    assert!(has_diag(&cx, DiagCode::ConcatMixedStringInt));
}

#[test]
fn string_comparison() {
    assert_eq!(eval_int(binary(BinaryOp::Lt, string_lit("a"), string_lit("b"))), 1);
    assert_eq!(eval_int(binary(BinaryOp::Eq, string_lit("a"), string_lit("a"))), 1);
}

#[test]
fn range_selects_on_parameter() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typed_param(
                logic_vec(7, 0),
                decl_init("p", int_sized(8, 0xA5, false)),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let scope = top.scope().unwrap();

    // p[7:4]
    let hi = bind(&cx, scope, range_expr(ident("p"), int(7), int(4)));
    assert_eq!(hi.ty.width(&cx), 4);
    let mut ectx = EvalContext::new(&cx);
    assert_eq!(int_value(&eval::eval_expr(hi, &mut ectx)), 0xA);

    // p[0+:4]
    let lo = bind(
        &cx,
        scope,
        range_indexed(ident("p"), RangeSelectMode::IndexedUp, int(0), int(4)),
    );
    assert_eq!(lo.ty.width(&cx), 4);
    let mut ectx = EvalContext::new(&cx);
    assert_eq!(int_value(&eval::eval_expr(lo, &mut ectx)), 0x5);

    // p[4:7] has the wrong endianness for a [7:0] type.
    let bad = bind(&cx, scope, range_expr(ident("p"), int(4), int(7)));
    assert!(bad.bad());
    assert!(has_diag(&cx, DiagCode::SelectEndianMismatch));

    // p[9:8] is out of bounds.
    let oob = bind(&cx, scope, range_expr(ident("p"), int(9), int(8)));
    assert!(oob.bad());
    assert!(has_diag(&cx, DiagCode::BadRangeExpression));
}

#[test]
fn element_select_out_of_bounds_at_eval() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typed_param(
                logic_vec(7, 0),
                decl_init("p", int_sized(8, 0xA5, false)),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let bound = bind(&cx, top.scope().unwrap(), index_expr(ident("p"), int(9)));
    assert!(!bound.bad());
    let mut ectx = EvalContext::new(&cx);
    let value = eval::eval_expr(bound, &mut ectx);
    assert!(value.is_invalid());
    let notes: Vec<_> = ectx.take_diags().iter().map(|d| d.code).collect();
    assert!(notes.contains(&DiagCode::NoteArrayIndexInvalid));
}

#[test]
fn assignment_pattern_for_unpacked_array() {
    // parameter int p [0:2] = '{1, 2, 3};
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typed_param(
                int_ty(),
                decl_dims_init(
                    "p",
                    vec![dim_range(0, 2)],
                    positional_pattern(vec![int(1), int(2), int(3)]),
                ),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let value = param_value(&cx, top, "p");
    let elems = value.elements().expect("unpacked value");
    assert_eq!(elems.len(), 3);
    assert_eq!(int_value(&elems[0]), 1);
    assert_eq!(int_value(&elems[2]), 3);

    // Element selects translate user indices into the canonical order.
    let bound = bind(&cx, top.scope().unwrap(), index_expr(ident("p"), int(1)));
    let mut ectx = EvalContext::new(&cx);
    assert_eq!(int_value(&eval::eval_expr(bound, &mut ectx)), 2);
}

#[test]
fn assignment_pattern_wrong_count() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typed_param(
                int_ty(),
                decl_dims_init(
                    "p",
                    vec![dim_range(0, 2)],
                    positional_pattern(vec![int(1), int(2)]),
                ),
            )],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::WrongNumberAssignmentPatterns));
}

#[test]
fn keyed_pattern_with_default() {
    // parameter int p [0:3] = '{0: 7, default: 1};
    use silica_svlog::ast::PatternKey;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typed_param(
                int_ty(),
                decl_dims_init(
                    "p",
                    vec![dim_range(0, 3)],
                    keyed_pattern(vec![
                        (PatternKey::Index(int(0)), int(7)),
                        (PatternKey::Default(sp()), int(1)),
                    ]),
                ),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let value = param_value(&cx, top, "p");
    let elems = value.elements().unwrap();
    assert_eq!(int_value(&elems[0]), 7);
    assert_eq!(int_value(&elems[1]), 1);
    assert_eq!(int_value(&elems[3]), 1);
}

#[test]
fn struct_member_access() {
    // typedef struct packed { logic [3:0] hi; logic [3:0] lo; } s;
    // parameter s p = 8'hA5;  p.hi == 4'hA, p.lo == 4'h5
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                typedef(
                    "s",
                    struct_ty(true, vec![(logic_vec(3, 0), "hi"), (logic_vec(3, 0), "lo")]),
                ),
                typed_param(named_ty("s"), decl_init("p", int_sized(8, 0xA5, false))),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let scope = top.scope().unwrap();
    let hi = bind(&cx, scope, member(ident("p"), "hi"));
    let lo = bind(&cx, scope, member(ident("p"), "lo"));
    let mut ectx = EvalContext::new(&cx);
    assert_eq!(int_value(&eval::eval_expr(hi, &mut ectx)), 0xA);
    assert_eq!(int_value(&eval::eval_expr(lo, &mut ectx)), 0x5);
}

#[test]
fn explicit_cast() {
    assert_eq!(eval_int(cast(bit_vec_ty(3, 0), int(255))), 15);
}

#[test]
fn bad_cast_is_rejected() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let scope = cx.create_script_scope();
    let bound = bind(
        &cx,
        scope.scope().unwrap(),
        cast(
            silica_svlog::ast::DataType::new(silica_svlog::ast::DataTypeKind::Event, sp()),
            int(1),
        ),
    );
    assert!(bound.bad());
    assert!(has_diag(&cx, DiagCode::BadConversion));
}

#[test]
fn unary_operators() {
    assert_eq!(eval_int(unary(UnaryOp::Minus, int(5))), -5);
    assert_eq!(eval_int(unary(UnaryOp::RedXor, int_sized(4, 0b1011, false))), 1);
    assert_eq!(eval_int(unary(UnaryOp::RedAnd, int_sized(4, 0b1111, false))), 1);
    assert_eq!(eval_int(unary(UnaryOp::LogicNot, int(0))), 1);
    assert_eq!(
        eval_int(unary(UnaryOp::BitNot, int_sized(4, 0b1010, false))),
        0b0101
    );
}

#[test]
fn power_and_shift() {
    assert_eq!(eval_int(binary(BinaryOp::Pow, int(2), int(10))), 1024);
    assert_eq!(eval_int(binary(BinaryOp::Shl, int(1), int(4))), 16);
    assert_eq!(eval_int(binary(BinaryOp::Shr, int(256), int(4))), 16);
}

#[test]
fn system_functions() {
    assert_eq!(eval_int(call_sys("$clog2", vec![int(64)])), 6);
    assert_eq!(eval_int(call_sys("$clog2", vec![int(7)])), 3);
    assert_eq!(eval_int(call_sys("$clog2", vec![int(1)])), 0);
    assert_eq!(eval_int(call_sys("$bits", vec![type_expr(logic_vec(15, 0))])), 16);
    assert_eq!(eval_int(call_sys("$bits", vec![int_sized(8, 0, false)])), 8);
    assert_eq!(eval_int(call_sys("$unsigned", vec![int_sized(4, 0b1111, true)])), 15);
}

#[test]
fn unknown_system_name() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let scope = cx.create_script_scope();
    let bound = bind(&cx, scope.scope().unwrap(), call_sys("$frobnicate", vec![]));
    assert!(bound.bad());
    assert!(has_diag(&cx, DiagCode::UnknownSystemName));
}

#[test]
fn lvalue_required_for_assignment() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let scope = cx.create_script_scope();
    let bound = bind(&cx, scope.scope().unwrap(), assign(int(1), int(2)));
    assert!(bound.bad());
    assert!(has_diag(&cx, DiagCode::ExpressionNotAssignable));
}

#[test]
fn division_by_zero_yields_unknown() {
    let (value, _) = eval_in_script(binary(BinaryOp::Div, int(1), int(0)));
    assert!(value.integer().unwrap().has_unknown());
}
