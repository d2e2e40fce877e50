// Copyright (c) 2016-2020 Fabian Schuiki

//! Hierarchy elaboration tests: instances, ports, generate constructs,
//! lookup rules, and constant functions.

mod common;
use common::*;

use silica_svlog::ast::{BinaryOp, Direction};
use silica_svlog::hierarchy;
use silica_svlog::scope::LookupLocation;
use silica_svlog::symbol::SymbolKind;

#[test]
fn generate_for_loop() {
    // genvar i;
    // for (i = 0; i < 3; i = i + 1) begin : g
    //   logic [i:0] x;
    // end
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                genvar("i"),
                gen_for(
                    false,
                    "i",
                    int(0),
                    binary(BinaryOp::Lt, ident("i"), int(3)),
                    assign(ident("i"), binary(BinaryOp::Add, ident("i"), int(1))),
                    gen_block(
                        Some("g"),
                        vec![var_decl(
                            silica_svlog::ast::DataType::new(
                                silica_svlog::ast::DataTypeKind::IntVec {
                                    kind: silica_svlog::ast::IntVecKind::Logic,
                                    signed: false,
                                    dims: vec![silica_svlog::ast::PackedDim::Range(
                                        ident("i"),
                                        int(0),
                                    )],
                                },
                                sp(),
                            ),
                            decl("x"),
                        )],
                    ),
                ),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let g = find_member(&cx, top, "g");
    let array = match &g.kind {
        SymbolKind::GenerateBlockArray(a) => a,
        _ => panic!("expected a generate block array"),
    };
    let entries = array.entries.borrow();
    assert_eq!(entries.len(), 3);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.value.as_i64(), Some(index as i64));
        // Each block carries an implicit localparam holding the genvar
        // value.
        let i = find_member(&cx, entry.block, "i");
        match &i.kind {
            SymbolKind::Parameter(p) => {
                assert!(p.is_local);
                assert_eq!(int_value(&p.value_override().unwrap()), index as i64);
            }
            _ => panic!("expected the implicit localparam"),
        }
        // And the variable width follows the genvar: logic [i:0].
        let x = find_member(&cx, entry.block, "x");
        assert_eq!(value_type(&cx, x).width(&cx), index + 1);
    }
    assert!(!cx.has_errors());
}

#[test]
fn generate_for_requires_genvar() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                var(int_ty(), "i"),
                gen_for(
                    false,
                    "i",
                    int(0),
                    binary(BinaryOp::Lt, ident("i"), int(2)),
                    assign(ident("i"), binary(BinaryOp::Add, ident("i"), int(1))),
                    gen_block(Some("g"), vec![]),
                ),
            ],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::NotAGenvar));
}

#[test]
fn generate_if_picks_branch() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                param("SEL", int(1)),
                gen_if(
                    ident("SEL"),
                    gen_block(Some("yes"), vec![var(int_ty(), "x")]),
                    Some(gen_block(Some("no"), vec![var(int_ty(), "y")])),
                ),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let yes = find_member(&cx, top, "yes");
    let no = find_member(&cx, top, "no");
    match (&yes.kind, &no.kind) {
        (SymbolKind::GenerateBlock(y), SymbolKind::GenerateBlock(n)) => {
            assert!(y.instantiated);
            assert!(!n.instantiated);
        }
        _ => panic!("expected generate blocks"),
    }
    // The untaken block still elaborated its members.
    find_member(&cx, no, "y");
}

#[test]
fn generate_case_picks_first_match() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![gen_case(
                int(2),
                vec![
                    (vec![int(1)], gen_block(Some("a"), vec![])),
                    (vec![int(2)], gen_block(Some("b"), vec![])),
                    (vec![], gen_block(Some("c"), vec![])),
                ],
            )],
        )],
    );
    let top = top_instance(&cx, "top");
    let b = find_member(&cx, top, "b");
    match &b.kind {
        SymbolKind::GenerateBlock(block) => assert!(block.instantiated),
        _ => panic!("expected a generate block"),
    }
    let c = find_member(&cx, top, "c");
    match &c.kind {
        SymbolKind::GenerateBlock(block) => assert!(!block.instantiated),
        _ => panic!("expected a generate block"),
    }
}

#[test]
fn generate_case_without_match() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![gen_case(
                int(9),
                vec![(vec![int(1)], gen_block(Some("a"), vec![]))],
            )],
        )],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::CaseGenerateNoBlock));
}

#[test]
fn mixing_ordered_and_named_ports() {
    // m m1(.a(1), 2);
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_ports(
                "m",
                vec![
                    ansi_input(logic_scalar(), "a"),
                    ansi_input(logic_scalar(), "b"),
                ],
                vec![],
            ),
            module(
                "top",
                vec![instantiate(
                    "m",
                    "m1",
                    vec![],
                    vec![named_conn("a", int(1)), ordered_conn(int(2))],
                )],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::MixingOrderedAndNamedPorts));
}

#[test]
fn ansi_ports_create_internal_symbols() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_ports(
                "m",
                vec![
                    ansi_input(logic_vec(7, 0), "a"),
                    ansi_output(logic_vec(7, 0), "b"),
                ],
                vec![],
            ),
            module(
                "top",
                vec![
                    var(logic_vec(7, 0), "x"),
                    instantiate("m", "m1", vec![], vec![named_conn("a", ident("x")), named_conn("b", ident("x"))]),
                ],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");

    // The internal net is reachable by name inside the instance.
    let a = find_member(&cx, m1, "a");
    match a.kind {
        SymbolKind::Net(_) => (),
        _ => panic!("input port should produce an internal net"),
    }
    assert_eq!(value_type(&cx, a).width(&cx), 8);

    // The public port symbols carry direction and connection.
    let ports = match &m1.kind {
        SymbolKind::ModuleInstance(i) => i.ports.borrow().clone(),
        _ => panic!("expected an instance"),
    };
    assert_eq!(ports.len(), 2);
    match &ports[0].kind {
        SymbolKind::Port(p) => {
            assert_eq!(p.direction, Direction::In);
            assert!(p.connection.get().is_some());
        }
        _ => panic!("expected a port"),
    }
    assert!(!cx.has_errors());
}

#[test]
fn implicit_named_port_requires_equivalence() {
    // .a with a 4-bit value on an 8-bit port is rejected; the implicit form
    // demands equivalence rather than assignment compatibility.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_ports("m", vec![ansi_input(logic_vec(7, 0), "a")], vec![]),
            module(
                "top",
                vec![
                    var(logic_vec(3, 0), "a"),
                    instantiate("m", "m1", vec![], vec![implicit_conn("a")]),
                ],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::ImplicitNamedPortTypeMismatch));
}

#[test]
fn wildcard_port_connection() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_ports("m", vec![ansi_input(logic_vec(7, 0), "a")], vec![]),
            module(
                "top",
                vec![
                    var(logic_vec(7, 0), "a"),
                    instantiate("m", "m1", vec![], vec![wildcard_conn()]),
                ],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(!cx.has_errors());
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    let ports = match &m1.kind {
        SymbolKind::ModuleInstance(i) => i.ports.borrow().clone(),
        _ => panic!(),
    };
    match &ports[0].kind {
        SymbolKind::Port(p) => assert!(p.connection.get().is_some()),
        _ => panic!(),
    }
}

#[test]
fn unconnected_port_warning_and_group_control() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    cx.set_warning_group("unconnected-port", false);
    compile(
        &cx,
        vec![
            module_with_ports("m", vec![ansi_input(logic_scalar(), "a")], vec![]),
            module("top", vec![instantiate("m", "m1", vec![], vec![])]),
        ],
    );
    cx.elaborate_all();
    assert!(!has_diag(&cx, DiagCode::UnconnectedNamedPort));

    // With the group enabled the warning appears.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_with_ports("m", vec![ansi_input(logic_scalar(), "a")], vec![]),
            module("top", vec![instantiate("m", "m1", vec![], vec![])]),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::UnconnectedNamedPort));
}

#[test]
fn non_ansi_ports() {
    // module m(a); input signed [7:0] a; endmodule
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_full(
                "m",
                silica_svlog::ast::DefinitionKind::Module,
                vec![],
                Some(silica_svlog::ast::PortList::NonAnsi(vec![non_ansi_port("a")])),
                vec![port_io_decl(
                    Direction::In,
                    silica_svlog::ast::DataType::new(
                        silica_svlog::ast::DataTypeKind::IntVec {
                            kind: silica_svlog::ast::IntVecKind::Logic,
                            signed: true,
                            dims: vec![silica_svlog::ast::PackedDim::Range(int(7), int(0))],
                        },
                        sp(),
                    ),
                    "a",
                )],
            ),
            module(
                "top",
                vec![
                    var(logic_vec(7, 0), "x"),
                    instantiate("m", "m1", vec![], vec![named_conn("a", ident("x"))]),
                ],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let m1 = find_member(&cx, top, "m1");
    let a = find_member(&cx, m1, "a");
    let ty = value_type(&cx, a);
    assert_eq!(ty.width(&cx), 8);
    assert!(ty.is_signed(&cx));
    let ports = match &m1.kind {
        SymbolKind::ModuleInstance(i) => i.ports.borrow().clone(),
        _ => panic!(),
    };
    match &ports[0].kind {
        SymbolKind::Port(p) => assert_eq!(p.direction, Direction::In),
        _ => panic!("expected a port"),
    }
}

#[test]
fn missing_port_io_declaration() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module_full(
                "m",
                silica_svlog::ast::DefinitionKind::Module,
                vec![],
                Some(silica_svlog::ast::PortList::NonAnsi(vec![non_ansi_port("a")])),
                vec![],
            ),
            module("top", vec![instantiate("m", "m1", vec![], vec![])]),
        ],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::MissingPortIODeclaration));
}

#[test]
fn instance_arrays() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module("m", vec![param("P", int(1))]),
            module(
                "top",
                vec![instantiate_dims("m", "arr", vec![dim_range(3, 0)], vec![], vec![])],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let arr = find_member(&cx, top, "arr");
    match &arr.kind {
        SymbolKind::InstanceArray(a) => {
            assert_eq!(a.elements.borrow().len(), 4);
            assert_eq!(a.range, ConstantRange::new(3, 0));
            for element in a.elements.borrow().iter() {
                assert!(element.is_instance());
            }
        }
        _ => panic!("expected an instance array"),
    }
    assert!(!cx.has_errors());
}

#[test]
fn invalid_array_dimension_creates_empty_array() {
    // A dimension that fails to evaluate yields an empty array so that
    // later references do not cascade.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module("m", vec![]),
            module(
                "top",
                vec![instantiate_dims(
                    "m",
                    "arr",
                    vec![silica_svlog::ast::Dim::Range(ident("nope"), int(0))],
                    vec![],
                    vec![],
                )],
            ),
        ],
    );
    cx.elaborate_all();
    let top = top_instance(&cx, "top");
    let arr = find_member(&cx, top, "arr");
    match &arr.kind {
        SymbolKind::InstanceArray(a) => assert!(a.elements.borrow().is_empty()),
        _ => panic!("expected an instance array"),
    }
    assert!(has_diag(&cx, DiagCode::UndeclaredIdentifier));
}

#[test]
fn unknown_module() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module("top", vec![instantiate("nope", "n1", vec![], vec![])])],
    );
    cx.elaborate_all();
    assert!(has_diag(&cx, DiagCode::UnknownModule));
}

#[test]
fn scope_ordering() {
    // Members iterate in declaration order.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![var(int_ty(), "a"), var(int_ty(), "b"), var(int_ty(), "c")],
        )],
    );
    let top = top_instance(&cx, "top");
    let names: Vec<_> = top
        .scope()
        .unwrap()
        .members(&cx)
        .into_iter()
        .filter(|m| !m.name.is_empty())
        .map(|m| m.name.to_string())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    // Indices strictly increase along the list.
    let members = top.scope().unwrap().members(&cx);
    for pair in members.windows(2) {
        assert!(pair[0].index() < pair[1].index());
    }
}

#[test]
fn lookup_visibility() {
    // Compilation-unit scopes enforce "declared before use".
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    let unit = cx.create_script_scope();
    let item_a = cx.alloc_root(silica_svlog::ast::Root {
        items: vec![param("a", int(1))],
    });
    hierarchy::add_members(&cx, unit, &item_a.items);
    let scope = unit.scope().unwrap();
    let a = scope.find(&cx, n("a")).unwrap();

    // After the declaration the lookup succeeds cleanly.
    assert!(scope
        .lookup_unqualified(&cx, sn("a"), LookupLocation::after(a))
        .is_some());
    assert!(cx.diagnostic_codes().is_empty());

    // Before the declaration it is reported as used-before-declared.
    scope.lookup_unqualified(&cx, sn("a"), LookupLocation::before(a));
    assert!(has_diag(&cx, DiagCode::UsedBeforeDeclared));
}

#[test]
fn wildcard_import_ambiguity() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            package("p1", vec![param("K", int(1))]),
            package("p2", vec![param("K", int(2))]),
            module(
                "top",
                vec![
                    import_wildcard("p1"),
                    import_wildcard("p2"),
                    param("x", ident("K")),
                ],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let _ = param_value(&cx, top, "x");
    assert!(has_diag(&cx, DiagCode::AmbiguousWildcardImport));
}

#[test]
fn explicit_import_wins_over_wildcard() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            package("p1", vec![param("K", int(1))]),
            package("p2", vec![param("K", int(2))]),
            module(
                "top",
                vec![
                    import_wildcard("p1"),
                    import_explicit("p2", "K"),
                    param("x", ident("K")),
                ],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    assert_eq!(int_value(&param_value(&cx, top, "x")), 2);
    assert!(!has_diag(&cx, DiagCode::AmbiguousWildcardImport));
}

#[test]
fn package_qualified_name() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            package("p", vec![param("K", int(17))]),
            module("top", vec![param("x", scoped(true, vec!["p", "K"]))]),
        ],
    );
    let top = top_instance(&cx, "top");
    assert_eq!(int_value(&param_value(&cx, top, "x")), 17);
}

#[test]
fn deferred_members_are_deterministic() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                param("SEL", int(1)),
                gen_if(ident("SEL"), gen_block(Some("g"), vec![]), None),
                var(int_ty(), "after"),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    let first = top.scope().unwrap().members(&cx);
    let second = top.scope().unwrap().members(&cx);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert!(std::ptr::eq(*a, *b));
    }
    // The generated block sits between the members that surround it in the
    // source.
    let g = find_member(&cx, top, "g");
    let sel = find_member(&cx, top, "SEL");
    let after = find_member(&cx, top, "after");
    assert!(sel.index() < g.index());
    assert!(g.index() < after.index());
}

#[test]
fn constant_function_call() {
    // function int double(input int x); return x * 2; endfunction
    // parameter p = double(21);
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                function(
                    "double",
                    int_ty(),
                    vec![(int_ty(), "x")],
                    vec![stmt_return(binary(BinaryOp::Mul, ident("x"), int(2)))],
                ),
                param("p", call("double", vec![int(21)])),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    assert_eq!(int_value(&param_value(&cx, top, "p")), 42);
    assert!(!cx.has_errors());
}

#[test]
fn constant_function_with_locals_and_control_flow() {
    // function int clamp(input int x);
    //   int limit = 10;
    //   if (x > limit) return limit; else return x;
    // endfunction
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                function(
                    "clamp",
                    int_ty(),
                    vec![(int_ty(), "x")],
                    vec![
                        stmt_var(int_ty(), decl_init("limit", int(10))),
                        stmt_if(
                            binary(BinaryOp::Gt, ident("x"), ident("limit")),
                            stmt_return(ident("limit")),
                            Some(stmt_return(ident("x"))),
                        ),
                    ],
                ),
                param("p", call("clamp", vec![int(25)])),
                param("q", call("clamp", vec![int(3)])),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    assert_eq!(int_value(&param_value(&cx, top, "p")), 10);
    assert_eq!(int_value(&param_value(&cx, top, "q")), 3);
}

#[test]
fn constant_function_rejects_nonlocal_identifiers() {
    // A constant function may not read module-level variables.
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![module(
            "top",
            vec![
                var(int_ty(), "global_state"),
                function(
                    "bad",
                    int_ty(),
                    vec![],
                    vec![stmt_return(ident("global_state"))],
                ),
                param("p", call("bad", vec![])),
            ],
        )],
    );
    let top = top_instance(&cx, "top");
    assert!(param_value(&cx, top, "p").is_invalid());
    assert!(has_diag(&cx, DiagCode::ExpressionNotConstant));
    assert!(has_note(&cx, DiagCode::NoteFunctionIdentifiersMustBeLocal));
}

#[test]
fn interface_port_connection() {
    // interface bus; logic [7:0] data; endinterface
    // module consumer(bus b); endmodule
    // module top; bus the_bus(); consumer c(.b(the_bus)); endmodule
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            interface_def("bus", vec![var(logic_vec(7, 0), "data")]),
            module_full(
                "consumer",
                silica_svlog::ast::DefinitionKind::Module,
                vec![],
                Some(silica_svlog::ast::PortList::Ansi(vec![
                    silica_svlog::ast::AnsiPort {
                        kind: silica_svlog::ast::AnsiPortKind::Implicit {
                            header: silica_svlog::ast::PortHeader::Interface {
                                iface: sn("bus"),
                                modport: None,
                            },
                            decl: decl("b"),
                        },
                        span: sp(),
                    },
                ])),
                vec![],
            ),
            module(
                "top",
                vec![
                    instantiate("bus", "the_bus", vec![], vec![]),
                    instantiate("consumer", "c", vec![], vec![named_conn("b", ident("the_bus"))]),
                ],
            ),
        ],
    );
    cx.elaborate_all();
    assert!(!cx.has_errors());

    let top = top_instance(&cx, "top");
    let c = find_member(&cx, top, "c");
    let b = find_member(&cx, c, "b");
    match &b.kind {
        SymbolKind::InterfacePort(p) => {
            let conn = p.connection.get().expect("interface port connected");
            assert!(matches!(conn.kind, SymbolKind::InterfaceInstance(_)));
            assert_eq!(conn.name.to_string(), "the_bus");
        }
        _ => panic!("expected an interface port"),
    }

    // Signals of the connected interface resolve through the port.
    let scope = c.scope().unwrap();
    let lookup = scope
        .resolve_path(
            &cx,
            LookupLocation::max(),
            false,
            &cx.alloc_expr_syntax(scoped(false, vec!["b", "data"]))
                .scoped_segs()
                .unwrap(),
            scope,
        )
        .expect("path resolves");
    assert_eq!(lookup.symbol.name.to_string(), "data");
}

#[test]
fn hierarchical_name_through_instance() {
    let arena = GlobalArenas::default();
    let cx = Compilation::new(&arena);
    compile(
        &cx,
        vec![
            module("inner", vec![param("K", int(5))]),
            module(
                "top",
                vec![instantiate("inner", "u", vec![], vec![])],
            ),
        ],
    );
    let top = top_instance(&cx, "top");
    let scope = top.scope().unwrap();
    let path = cx.alloc_expr_syntax(scoped(false, vec!["u", "K"]));
    let segs = path.scoped_segs().unwrap();
    let lookup = scope
        .resolve_path(&cx, LookupLocation::max(), false, segs, scope)
        .expect("path resolves");
    assert!(lookup.hierarchical);
    assert_eq!(lookup.symbol.name.to_string(), "K");
}
