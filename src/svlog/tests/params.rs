// Copyright (c) 2016-2020 Fabian Schuiki

//! Parameter resolution tests.

mod common;
use common::*;

use silica_svlog::ast::BinaryOp;
use silica_svlog::ty::PredefIntKind;

#[test]
fn parameter_arithmetic() {
    // module top; parameter foo = 4 + 5; endmodule
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![param("foo", binary(BinaryOp::Add, int(4), int(5)))],
        )],
    );
    let top = top_instance(&cx, "top");
    let value = param_value(&cx, top, "foo");
    assert_eq!(int_value(&value), 9);

    // The parameter adopts the default integer type from its initializer.
    let foo = find_member(&cx, top, "foo");
    let ty = value_type(&cx, foo);
    assert!(ty.equivalent(&cx, cx.predef_type(PredefIntKind::Int)));
    assert_eq!(ty.width(&cx), 32);
    assert!(ty.is_signed(&cx));
    assert!(!cx.has_errors());
}

#[test]
fn cyclic_parameters() {
    // parameter a = b; parameter b = a;
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![param("a", ident("b")), param("b", ident("a"))],
        )],
    );
    let top = top_instance(&cx, "top");
    let a = find_member(&cx, top, "a");
    let b = find_member(&cx, top, "b");

    // Both parameters resolve to the error type, without a stack overflow.
    assert!(value_type(&cx, a).is_error());
    assert!(value_type(&cx, b).is_error());
    assert!(param_value(&cx, top, "a").is_invalid());
    assert!(param_value(&cx, top, "b").is_invalid());

    // The recursive definition is reported exactly once.
    assert_eq!(diag_count(&cx, DiagCode::RecursiveDefinition), 1);
}

#[test]
fn named_parameter_override() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params(
                "m",
                vec![value_param_port("WIDTH", Some(int(4)))],
                vec![],
            ),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![named_param_assignment("WIDTH", int(8))],
                    vec![],
                )],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    assert_eq!(int_value(&param_value(&cx, m1, "WIDTH")), 8);
    assert!(!cx.has_errors());
}

#[test]
fn ordered_parameter_override() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params(
                "m",
                vec![
                    value_param_port("A", Some(int(1))),
                    value_param_port("B", Some(int(2))),
                ],
                vec![],
            ),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![
                        ordered_param_assignment(int(10)),
                        ordered_param_assignment(int(20)),
                    ],
                    vec![],
                )],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    assert_eq!(int_value(&param_value(&cx, m1, "A")), 10);
    assert_eq!(int_value(&param_value(&cx, m1, "B")), 20);
}

#[test]
fn default_applies_without_override() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params("m", vec![value_param_port("W", Some(int(7)))], vec![]),
            module("top", vec![instantiate("m", "m1", vec![], vec![])]),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    assert_eq!(int_value(&param_value(&cx, m1, "W")), 7);
}

#[test]
fn override_idempotence() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params("m", vec![value_param_port("W", Some(int(4)))], vec![]),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![named_param_assignment("W", int(6))],
                    vec![],
                )],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    let first = param_value(&cx, m1, "W");
    let second = param_value(&cx, m1, "W");
    assert_eq!(first, second);
    assert_eq!(int_value(&first), 6);
}

#[test]
fn mixing_ordered_and_named_params() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params(
                "m",
                vec![
                    value_param_port("A", Some(int(1))),
                    value_param_port("B", Some(int(2))),
                ],
                vec![],
            ),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![
                        named_param_assignment("A", int(1)),
                        ordered_param_assignment(int(2)),
                    ],
                    vec![],
                )],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::MixingOrderedAndNamedParams));
}

#[test]
fn cannot_override_local_parameter() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module("m", vec![localparam("L", int(3))]),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![named_param_assignment("L", int(9))],
                    vec![],
                )],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::AssignedToLocalBodyParam));
    // The localparam keeps its declared value.
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    assert_eq!(int_value(&param_value(&cx, m1, "L")), 3);
}

#[test]
fn unknown_parameter_name() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params("m", vec![value_param_port("A", Some(int(1)))], vec![]),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![named_param_assignment("NOPE", int(2))],
                    vec![],
                )],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::ParameterDoesNotExist));
}

#[test]
fn port_param_without_value() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params("m", vec![value_param_port("W", None)], vec![]),
            module("top", vec![instantiate("m", "m1", vec![], vec![])]),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::ParamHasNoValue));
}

#[test]
fn override_names_resolve_at_instantiation_site() {
    // The override expression refers to a parameter of the instantiating
    // module, not anything inside the definition.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_params("m", vec![value_param_port("W", Some(int(1)))], vec![]),
            module(
                "top",
                vec![
                    param("OUTER", int(12)),
                    instantiate(
                        "m",
                        "m1",
                        vec![named_param_assignment("W", ident("OUTER"))],
                        vec![],
                    ),
                ],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    assert_eq!(int_value(&param_value(&cx, m1, "W")), 12);
    assert!(!cx.has_errors());
}
