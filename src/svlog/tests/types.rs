// Copyright (c) 2016-2020 Fabian Schuiki

//! Type system tests.

mod common;
use common::*;

use silica_svlog::ast::IntVecKind;
use silica_svlog::symbol::SymbolKind;
use silica_svlog::ty::{IntegralFlags, PredefIntKind, ScalarKind};

#[test]
fn interned_vector_identity() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let a = cx.vector_type(8, IntegralFlags::FOUR_STATE);
    let b = cx.vector_type(8, IntegralFlags::FOUR_STATE);
    assert!(a == b);
    assert!(a.matching(&cx, b));
    let c = cx.vector_type(8, IntegralFlags::empty());
    assert!(a != c);
    assert!(!a.matching(&cx, c));
}

#[test]
fn canonical_soundness() {
    // typedef logic [3:0] t1; typedef t1 t2;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                typedef("t1", logic_vec(3, 0)),
                typedef("t2", named_ty("t1")),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let t2 = find_member(&cx, top, "t2");
    let alias = Type::of(t2).unwrap();
    assert!(alias.is_alias());

    let canonical = alias.canonical(&cx);
    assert!(canonical.canonical(&cx) == canonical);
    assert!(canonical == cx.vector_type(4, IntegralFlags::FOUR_STATE));
    assert_eq!(alias.width(&cx), 4);
}

#[test]
fn relation_lattice() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);

    // Every relation implies the next weaker one, for a mix of pairs.
    let pairs = [
        (cx.vector_type(8, IntegralFlags::empty()), cx.vector_type(8, IntegralFlags::empty())),
        (
            cx.vector_type(8, IntegralFlags::FOUR_STATE),
            cx.vector_type(8, IntegralFlags::FOUR_STATE | IntegralFlags::REG),
        ),
        (cx.vector_type(8, IntegralFlags::empty()), cx.vector_type(8, IntegralFlags::FOUR_STATE)),
        (cx.vector_type(8, IntegralFlags::empty()), cx.vector_type(4, IntegralFlags::empty())),
        (cx.predef_type(PredefIntKind::Int), cx.float_type(silica_svlog::ty::FloatKind::Real)),
        (cx.string_type(), cx.predef_type(PredefIntKind::Int)),
        (cx.string_type(), cx.string_type()),
    ];
    for &(a, b) in &pairs {
        if a.matching(&cx, b) {
            assert!(a.equivalent(&cx, b), "matching must imply equivalent");
        }
        if a.equivalent(&cx, b) {
            assert!(
                a.assignment_compatible(&cx, b),
                "equivalent must imply assignment compatible"
            );
        }
        if a.assignment_compatible(&cx, b) {
            assert!(
                a.cast_compatible(&cx, b),
                "assignment compatible must imply cast compatible"
            );
        }
        // Matching and equivalence are symmetric.
        assert_eq!(a.matching(&cx, b), b.matching(&cx, a));
        assert_eq!(a.equivalent(&cx, b), b.equivalent(&cx, a));
    }
}

#[test]
fn scalar_synonyms() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let logic = cx.scalar_type(ScalarKind::Logic, false);
    let reg = cx.scalar_type(ScalarKind::Reg, false);
    let bit = cx.scalar_type(ScalarKind::Bit, false);
    assert!(logic.matching(&cx, reg));
    assert!(!logic.matching(&cx, bit));
    assert!(logic.equivalent(&cx, bit) == false);
    assert!(logic.assignment_compatible(&cx, bit));
}

#[test]
fn reg_flag_is_informational() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let reg8 = cx.vector_type(8, IntegralFlags::FOUR_STATE | IntegralFlags::REG);
    let logic8 = cx.vector_type(8, IntegralFlags::FOUR_STATE);
    assert!(reg8.matching(&cx, logic8));
    assert!(reg8.integral_flags(&cx).contains(IntegralFlags::REG));
    assert!(!logic8.integral_flags(&cx).contains(IntegralFlags::REG));
}

#[test]
fn packed_struct_width() {
    // typedef struct packed { logic [7:0] a; logic [3:0] b; } s;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "s",
                struct_ty(true, vec![(logic_vec(7, 0), "a"), (logic_vec(3, 0), "b")]),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let s = Type::of(find_member(&cx, top, "s")).unwrap();
    let canonical = s.canonical(&cx);
    assert_eq!(canonical.width(&cx), 12);
    assert!(canonical.is_four_state(&cx));

    // Members are declared MSB first: `a` sits above `b`.
    let scope = canonical.member_scope(&cx).unwrap();
    let a = scope.find(&cx, n("a")).unwrap();
    let b = scope.find(&cx, n("b")).unwrap();
    match (&a.kind, &b.kind) {
        (SymbolKind::Field(fa), SymbolKind::Field(fb)) => {
            assert_eq!(fa.offset, 4);
            assert_eq!(fb.offset, 0);
        }
        _ => panic!("expected fields"),
    }
}

#[test]
fn packed_union_width() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "u",
                union_ty(true, vec![(logic_vec(7, 0), "a"), (bit_vec_ty(7, 0), "b")]),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let u = Type::of(find_member(&cx, top, "u")).unwrap().canonical(&cx);
    assert_eq!(u.width(&cx), 8);
    // Four-stateness is the logical OR of the members.
    assert!(u.is_four_state(&cx));
    assert!(!cx.has_errors());
}

#[test]
fn packed_union_width_mismatch() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "u",
                union_ty(true, vec![(logic_vec(7, 0), "a"), (logic_vec(3, 0), "b")]),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let _ = Type::of(find_member(&cx, top, "u")).unwrap().canonical(&cx);
    assert!(has_diag(&cx, DiagCode::PackedUnionWidthMismatch));
}

#[test]
fn packed_array_width() {
    // logic [3:0] x [has no part here]; use `bit [1:0][7:0]`-style nesting
    // via a typedef of a packed array over a packed struct.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                typedef("s", struct_ty(true, vec![(logic_vec(3, 0), "f")])),
                var_decl(named_ty("s"), decl("x")),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let x = find_member(&cx, top, "x");
    assert_eq!(value_type(&cx, x).width(&cx), 4);
}

#[test]
fn default_value_shapes() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                // logic [3:0] a [0:2];
                var_decl(logic_vec(3, 0), decl_dims("a", vec![dim_range(0, 2)])),
                // bit [7:0] b;
                var_decl(bit_vec_ty(7, 0), decl("b")),
            ],
        )],
    );
    let top = top_instance(&cx, "top");

    let a_ty = value_type(&cx, find_member(&cx, top, "a"));
    let a_default = a_ty.default_value(&cx);
    let elems = a_default.elements().expect("unpacked default");
    assert_eq!(elems.len(), 3);
    for elem in elems {
        let v = elem.integer().expect("integral element");
        assert_eq!(v.width(), 4);
        // Four-state integrals default to all-x.
        assert!(v.has_unknown());
    }

    let b_ty = value_type(&cx, find_member(&cx, top, "b"));
    let b_default = b_ty.default_value(&cx);
    let v = b_default.integer().unwrap();
    assert_eq!(v.width(), 8);
    assert!(v.is_false());
}

#[test]
fn enum_auto_increment() {
    // typedef enum { A, B = 5, C } e;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "e",
                enum_ty(
                    None,
                    vec![
                        enum_member("A"),
                        enum_member_init("B", int(5)),
                        enum_member("C"),
                    ],
                ),
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    // The enum values become visible in the enclosing scope.
    let a = find_member(&cx, top, "A");
    let b = find_member(&cx, top, "B");
    let c = find_member(&cx, top, "C");
    assert_eq!(int_value(&enum_value_of(&cx, a)), 0);
    assert_eq!(int_value(&enum_value_of(&cx, b)), 5);
    assert_eq!(int_value(&enum_value_of(&cx, c)), 6);

    // The default base type is a signed 32-bit int.
    let e = Type::of(find_member(&cx, top, "e")).unwrap().canonical(&cx);
    assert_eq!(e.width(&cx), 32);
    assert!(e.is_signed(&cx));
    assert!(!cx.has_errors());
}

#[test]
fn enum_value_overflow() {
    // typedef enum bit [1:0] { A = 3, B } e;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "e",
                enum_ty(
                    Some(bit_vec_ty(1, 0)),
                    vec![enum_member_init("A", int(3)), enum_member("B")],
                ),
            )],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::EnumValueOverflow));
}

#[test]
fn enum_duplicate_value() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef(
                "e",
                enum_ty(
                    None,
                    vec![enum_member_init("A", int(1)), enum_member_init("B", int(1))],
                ),
            )],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::EnumValueDuplicate));
}

#[test]
fn enum_range_members() {
    // typedef enum { A[1:0] } e; yields A1 and A0.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef("e", enum_ty(None, vec![enum_member_range("A", 1, 0)]))],
        )],
    );
    cx.elaborate_all();
    let top = top_instance(&cx, "top");
    let a1 = find_member(&cx, top, "A1");
    let a0 = find_member(&cx, top, "A0");
    match (&a1.kind, &a0.kind) {
        (SymbolKind::EnumValue(v1), SymbolKind::EnumValue(v0)) => {
            assert_eq!(int_value(&v1.direct_value().unwrap()), 0);
            assert_eq!(int_value(&v0.direct_value().unwrap()), 1);
        }
        _ => panic!("expected enum values"),
    }
}

#[test]
fn enum_invalid_base() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![typedef("e", enum_ty(Some(real_ty()), vec![enum_member("A")]))],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::InvalidEnumBase));
}

#[test]
fn enum_assignment_requires_same_enum() {
    // An enum variable only accepts equivalent enums, not bare integers.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                typedef("e", enum_ty(None, vec![enum_member("A")])),
                var_decl(named_ty("e"), decl_init("x", int(1))),
            ],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::BadAssignment));
}

#[test]
fn vector_type_from_syntax_canonicalizes() {
    // `logic [7:0]` written twice in different modules is the same object.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                var_decl(logic_vec(7, 0), decl("x")),
                var_decl(
                    vec_ty(IntVecKind::Logic, false, 7, 0),
                    decl("y"),
                ),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let x = value_type(&cx, find_member(&cx, top, "x"));
    let y = value_type(&cx, find_member(&cx, top, "y"));
    assert!(x == y);
}

#[test]
fn string_int_cast_compatibility() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let string = cx.string_type();
    let int = cx.predef_type(PredefIntKind::Int);
    assert!(string.cast_compatible(&cx, int));
    assert!(int.cast_compatible(&cx, string));
    assert!(!string.assignment_compatible(&cx, int));
}
