// Copyright (c) 2016-2020 Fabian Schuiki
#![allow(dead_code)]

//! Utilities for elaboration tests.
//!
//! The engine consumes syntax trees; these helpers assemble them without the
//! noise of spans and boxes, so that tests read roughly like the source they
//! stand for.

pub use silica_svlog::*;

use num::BigInt;
use silica_common::name::Name;
use silica_common::source::{Span, Spanned, INVALID_SPAN};
use silica_svlog::ast;

pub fn sp() -> Span {
    INVALID_SPAN
}

pub fn n(s: &str) -> Name {
    Name::intern(s)
}

pub fn sn(s: &str) -> Spanned<Name> {
    Spanned::new(n(s), sp())
}

// Expressions

pub fn int(value: i64) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::IntLiteral(SVInt::new(32, BigInt::from(value), true)),
        sp(),
    )
}

pub fn int_sized(width: usize, value: u64, signed: bool) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::IntLiteral(SVInt::from_u64(width, value, signed)),
        sp(),
    )
}

pub fn int_lit(value: SVInt) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::IntLiteral(value), sp())
}

pub fn string_lit(s: &str) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::StringLiteral(s.to_string()), sp())
}

pub fn ident(s: &str) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::Ident(sn(s)), sp())
}

pub fn scoped(package: bool, segs: Vec<&str>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Scoped {
            package,
            segs: segs
                .into_iter()
                .map(|s| ast::NameSeg {
                    name: sn(s),
                    selects: vec![],
                })
                .collect(),
        },
        sp(),
    )
}

pub fn unary(op: ast::UnaryOp, operand: ast::Expr) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::Unary(op, Box::new(operand)), sp())
}

pub fn binary(op: ast::BinaryOp, lhs: ast::Expr, rhs: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
        sp(),
    )
}

pub fn cond(c: ast::Expr, t: ast::Expr, f: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Conditional {
            cond: Box::new(c),
            true_expr: Box::new(t),
            false_expr: Box::new(f),
        },
        sp(),
    )
}

pub fn assign(lhs: ast::Expr, rhs: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Assign {
            op: None,
            non_blocking: false,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        sp(),
    )
}

pub fn concat(operands: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::Concat(operands), sp())
}

pub fn replicate(count: ast::Expr, operands: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Replicate {
            count: Box::new(count),
            concat: operands,
        },
        sp(),
    )
}

pub fn index_expr(value: ast::Expr, index: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Index {
            value: Box::new(value),
            index: Box::new(index),
        },
        sp(),
    )
}

pub fn range_expr(value: ast::Expr, left: ast::Expr, right: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Range {
            value: Box::new(value),
            mode: ast::RangeSelectMode::Simple,
            left: Box::new(left),
            right: Box::new(right),
        },
        sp(),
    )
}

pub fn range_indexed(
    value: ast::Expr,
    mode: ast::RangeSelectMode,
    base: ast::Expr,
    width: ast::Expr,
) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Range {
            value: Box::new(value),
            mode,
            left: Box::new(base),
            right: Box::new(width),
        },
        sp(),
    )
}

pub fn member(value: ast::Expr, name: &str) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Member {
            value: Box::new(value),
            member: sn(name),
        },
        sp(),
    )
}

pub fn call(name: &str, args: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Call {
            callee: ast::CallTarget::Name(sn(name)),
            args,
        },
        sp(),
    )
}

pub fn call_sys(name: &str, args: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Call {
            callee: ast::CallTarget::System(sn(name)),
            args,
        },
        sp(),
    )
}

pub fn cast(ty: ast::DataType, expr: ast::Expr) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Cast {
            ty: Box::new(ty),
            expr: Box::new(expr),
        },
        sp(),
    )
}

pub fn type_expr(ty: ast::DataType) -> ast::Expr {
    ast::Expr::new(ast::ExprKind::DataTypeExpr(Box::new(ty)), sp())
}

pub fn positional_pattern(elems: Vec<ast::Expr>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Pattern(ast::AssignmentPattern::Positional(elems)),
        sp(),
    )
}

pub fn keyed_pattern(entries: Vec<(ast::PatternKey, ast::Expr)>) -> ast::Expr {
    ast::Expr::new(
        ast::ExprKind::Pattern(ast::AssignmentPattern::Keyed(entries)),
        sp(),
    )
}

// Data types

pub fn implicit_ty() -> ast::DataType {
    ast::DataType::implicit(sp())
}

pub fn logic_vec(left: i64, right: i64) -> ast::DataType {
    vec_ty(ast::IntVecKind::Logic, false, left, right)
}

pub fn bit_vec_ty(left: i64, right: i64) -> ast::DataType {
    vec_ty(ast::IntVecKind::Bit, false, left, right)
}

pub fn vec_ty(kind: ast::IntVecKind, signed: bool, left: i64, right: i64) -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::IntVec {
            kind,
            signed,
            dims: vec![ast::PackedDim::Range(int(left), int(right))],
        },
        sp(),
    )
}

pub fn logic_scalar() -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::IntVec {
            kind: ast::IntVecKind::Logic,
            signed: false,
            dims: vec![],
        },
        sp(),
    )
}

pub fn int_ty() -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::IntAtom {
            kind: ast::IntAtomKind::Int,
            signed: None,
        },
        sp(),
    )
}

pub fn real_ty() -> ast::DataType {
    ast::DataType::new(ast::DataTypeKind::Real(ast::RealKind::Real), sp())
}

pub fn named_ty(name: &str) -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::Named {
            package: None,
            name: sn(name),
            dims: vec![],
        },
        sp(),
    )
}

pub fn enum_ty(base: Option<ast::DataType>, members: Vec<ast::EnumMember>) -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::Enum {
            base: base.map(Box::new),
            members,
        },
        sp(),
    )
}

pub fn enum_member(name: &str) -> ast::EnumMember {
    ast::EnumMember {
        name: sn(name),
        dims: vec![],
        init: None,
    }
}

pub fn enum_member_init(name: &str, init: ast::Expr) -> ast::EnumMember {
    ast::EnumMember {
        name: sn(name),
        dims: vec![],
        init: Some(ast::Initializer {
            equals: sp(),
            expr: init,
        }),
    }
}

pub fn enum_member_range(name: &str, left: i64, right: i64) -> ast::EnumMember {
    ast::EnumMember {
        name: sn(name),
        dims: vec![dim_range(left, right)],
        init: None,
    }
}

pub fn struct_ty(packed: bool, members: Vec<(ast::DataType, &str)>) -> ast::DataType {
    struct_union_ty(false, packed, members)
}

pub fn union_ty(packed: bool, members: Vec<(ast::DataType, &str)>) -> ast::DataType {
    struct_union_ty(true, packed, members)
}

fn struct_union_ty(
    union: bool,
    packed: bool,
    members: Vec<(ast::DataType, &str)>,
) -> ast::DataType {
    ast::DataType::new(
        ast::DataTypeKind::Struct {
            union,
            packed,
            signed: false,
            members: members
                .into_iter()
                .map(|(ty, name)| ast::StructMember {
                    ty,
                    decls: vec![decl(name)],
                    span: sp(),
                })
                .collect(),
            dims: vec![],
        },
        sp(),
    )
}

// Declarations and items

pub fn decl(name: &str) -> ast::Declarator {
    ast::Declarator {
        name: sn(name),
        dims: vec![],
        init: None,
    }
}

pub fn decl_init(name: &str, init: ast::Expr) -> ast::Declarator {
    ast::Declarator {
        name: sn(name),
        dims: vec![],
        init: Some(ast::Initializer {
            equals: sp(),
            expr: init,
        }),
    }
}

pub fn decl_dims(name: &str, dims: Vec<ast::Dim>) -> ast::Declarator {
    ast::Declarator {
        name: sn(name),
        dims,
        init: None,
    }
}

pub fn decl_dims_init(name: &str, dims: Vec<ast::Dim>, init: ast::Expr) -> ast::Declarator {
    ast::Declarator {
        name: sn(name),
        dims,
        init: Some(ast::Initializer {
            equals: sp(),
            expr: init,
        }),
    }
}

pub fn dim_range(left: i64, right: i64) -> ast::Dim {
    ast::Dim::Range(int(left), int(right))
}

pub fn param(name: &str, init: ast::Expr) -> ast::Item {
    ast::Item::Param(param_decl(name, init, false))
}

pub fn localparam(name: &str, init: ast::Expr) -> ast::Item {
    ast::Item::Param(param_decl(name, init, true))
}

pub fn param_decl(name: &str, init: ast::Expr, local: bool) -> ast::ParamDecl {
    ast::ParamDecl {
        local,
        ty: implicit_ty(),
        decls: vec![decl_init(name, init)],
        span: sp(),
    }
}

pub fn typed_param(ty: ast::DataType, declarator: ast::Declarator) -> ast::Item {
    ast::Item::Param(ast::ParamDecl {
        local: false,
        ty,
        decls: vec![declarator],
        span: sp(),
    })
}

pub fn var(ty: ast::DataType, name: &str) -> ast::Item {
    ast::Item::Var(ast::VarDecl {
        ty,
        decls: vec![decl(name)],
        span: sp(),
    })
}

pub fn var_decl(ty: ast::DataType, declarator: ast::Declarator) -> ast::Item {
    ast::Item::Var(ast::VarDecl {
        ty,
        decls: vec![declarator],
        span: sp(),
    })
}

pub fn typedef(name: &str, ty: ast::DataType) -> ast::Item {
    ast::Item::Typedef(ast::Typedef {
        name: sn(name),
        ty,
        dims: vec![],
        span: sp(),
    })
}

pub fn genvar(name: &str) -> ast::Item {
    ast::Item::Genvar(ast::GenvarDecl {
        names: vec![sn(name)],
        span: sp(),
    })
}

pub fn import_wildcard(package: &str) -> ast::Item {
    ast::Item::Import(ast::ImportDecl {
        items: vec![ast::ImportItem::Wildcard {
            package: sn(package),
        }],
        span: sp(),
    })
}

pub fn import_explicit(package: &str, name: &str) -> ast::Item {
    ast::Item::Import(ast::ImportDecl {
        items: vec![ast::ImportItem::Explicit {
            package: sn(package),
            name: sn(name),
        }],
        span: sp(),
    })
}

pub fn package(name: &str, items: Vec<ast::Item>) -> ast::Item {
    ast::Item::Package(ast::PackageDecl {
        name: sn(name),
        items,
        span: sp(),
    })
}

pub fn module(name: &str, items: Vec<ast::Item>) -> ast::Item {
    module_full(name, ast::DefinitionKind::Module, vec![], None, items)
}

pub fn interface_def(name: &str, items: Vec<ast::Item>) -> ast::Item {
    module_full(name, ast::DefinitionKind::Interface, vec![], None, items)
}

pub fn module_with_params(
    name: &str,
    params: Vec<ast::ParamPort>,
    items: Vec<ast::Item>,
) -> ast::Item {
    module_full(name, ast::DefinitionKind::Module, params, None, items)
}

pub fn module_with_ports(
    name: &str,
    ports: Vec<ast::AnsiPort>,
    items: Vec<ast::Item>,
) -> ast::Item {
    module_full(
        name,
        ast::DefinitionKind::Module,
        vec![],
        Some(ast::PortList::Ansi(ports)),
        items,
    )
}

pub fn module_full(
    name: &str,
    kind: ast::DefinitionKind,
    params: Vec<ast::ParamPort>,
    ports: Option<ast::PortList>,
    items: Vec<ast::Item>,
) -> ast::Item {
    ast::Item::Module(ast::ModuleDecl {
        kind,
        name: sn(name),
        imports: vec![],
        params,
        ports,
        items,
        span: sp(),
    })
}

pub fn value_param_port(name: &str, default: Option<ast::Expr>) -> ast::ParamPort {
    ast::ParamPort::Value(ast::ParamDecl {
        local: false,
        ty: implicit_ty(),
        decls: vec![match default {
            Some(init) => decl_init(name, init),
            None => decl(name),
        }],
        span: sp(),
    })
}

pub fn ansi_port(direction: ast::Direction, ty: ast::DataType, name: &str) -> ast::AnsiPort {
    ast::AnsiPort {
        kind: ast::AnsiPortKind::Implicit {
            header: ast::PortHeader::Variable {
                direction: Some(direction),
                var_keyword: false,
                ty,
            },
            decl: decl(name),
        },
        span: sp(),
    }
}

pub fn ansi_input(ty: ast::DataType, name: &str) -> ast::AnsiPort {
    ansi_port(ast::Direction::In, ty, name)
}

pub fn ansi_output(ty: ast::DataType, name: &str) -> ast::AnsiPort {
    ansi_port(ast::Direction::Out, ty, name)
}

pub fn non_ansi_port(name: &str) -> ast::NonAnsiPort {
    ast::NonAnsiPort {
        expr: Some(ast::PortRef::Named(sn(name))),
        span: sp(),
    }
}

pub fn port_io_decl(
    direction: ast::Direction,
    ty: ast::DataType,
    name: &str,
) -> ast::Item {
    ast::Item::PortDecl(ast::PortDeclItem {
        header: ast::PortIoHeader::Variable {
            direction,
            var_keyword: false,
            ty,
        },
        decls: vec![decl(name)],
        span: sp(),
    })
}

pub fn instantiate(
    target: &str,
    name: &str,
    params: Vec<ast::ParamAssignment>,
    connections: Vec<ast::PortConnection>,
) -> ast::Item {
    instantiate_dims(target, name, vec![], params, connections)
}

pub fn instantiate_dims(
    target: &str,
    name: &str,
    dims: Vec<ast::Dim>,
    params: Vec<ast::ParamAssignment>,
    connections: Vec<ast::PortConnection>,
) -> ast::Item {
    ast::Item::Instantiation(ast::Instantiation {
        target: sn(target),
        params,
        instances: vec![ast::HierInstance {
            name: sn(name),
            dims,
            connections,
            span: sp(),
        }],
        span: sp(),
    })
}

pub fn named_param_assignment(name: &str, value: ast::Expr) -> ast::ParamAssignment {
    ast::ParamAssignment::Named {
        name: sn(name),
        value: Some(ast::ParamValue::Expr(value)),
        span: sp(),
    }
}

pub fn ordered_param_assignment(value: ast::Expr) -> ast::ParamAssignment {
    ast::ParamAssignment::Ordered(ast::ParamValue::Expr(value), sp())
}

pub fn named_conn(name: &str, expr: ast::Expr) -> ast::PortConnection {
    ast::PortConnection::Named {
        name: sn(name),
        parens: true,
        expr: Some(expr),
        span: sp(),
    }
}

pub fn implicit_conn(name: &str) -> ast::PortConnection {
    ast::PortConnection::Named {
        name: sn(name),
        parens: false,
        expr: None,
        span: sp(),
    }
}

pub fn ordered_conn(expr: ast::Expr) -> ast::PortConnection {
    ast::PortConnection::Ordered(Some(expr), sp())
}

pub fn wildcard_conn() -> ast::PortConnection {
    ast::PortConnection::Wildcard(sp())
}

pub fn gen_block(label: Option<&str>, items: Vec<ast::Item>) -> ast::GenerateBlock {
    ast::GenerateBlock {
        label: label.map(sn),
        items,
        span: sp(),
    }
}

pub fn gen_for(
    uses_genvar_keyword: bool,
    ident_name: &str,
    init: ast::Expr,
    cond: ast::Expr,
    step: ast::Expr,
    block: ast::GenerateBlock,
) -> ast::Item {
    ast::Item::GenerateFor(ast::GenerateFor {
        genvar: uses_genvar_keyword,
        ident: sn(ident_name),
        init,
        cond,
        step,
        block,
        span: sp(),
    })
}

pub fn gen_if(
    cond: ast::Expr,
    then_block: ast::GenerateBlock,
    else_block: Option<ast::GenerateBlock>,
) -> ast::Item {
    ast::Item::GenerateIf(ast::GenerateIf {
        cond,
        then_item: ast::GenerateItem::Block(then_block),
        else_item: else_block.map(ast::GenerateItem::Block),
        span: sp(),
    })
}

pub fn gen_case(cond: ast::Expr, items: Vec<(Vec<ast::Expr>, ast::GenerateBlock)>) -> ast::Item {
    ast::Item::GenerateCase(ast::GenerateCase {
        cond,
        items: items
            .into_iter()
            .map(|(exprs, block)| ast::GenerateCaseItem {
                exprs,
                item: ast::GenerateItem::Block(block),
                span: sp(),
            })
            .collect(),
        span: sp(),
    })
}

pub fn function(
    name: &str,
    ret: ast::DataType,
    args: Vec<(ast::DataType, &str)>,
    body: Vec<ast::Stmt>,
) -> ast::Item {
    ast::Item::Subroutine(ast::SubroutineDecl {
        kind: ast::SubroutineKind::Function,
        name: sn(name),
        ret: Some(ret),
        args: args
            .into_iter()
            .map(|(ty, name)| ast::FormalArg {
                direction: ast::Direction::In,
                ty,
                name: sn(name),
                default: None,
            })
            .collect(),
        body,
        span: sp(),
    })
}

pub fn stmt_return(value: ast::Expr) -> ast::Stmt {
    ast::Stmt::new(ast::StmtKind::Return(Some(value)), sp())
}

pub fn stmt_expr(expr: ast::Expr) -> ast::Stmt {
    ast::Stmt::new(ast::StmtKind::Expr(expr), sp())
}

pub fn stmt_var(ty: ast::DataType, declarator: ast::Declarator) -> ast::Stmt {
    ast::Stmt::new(
        ast::StmtKind::VarDecl(ast::VarDecl {
            ty,
            decls: vec![declarator],
            span: sp(),
        }),
        sp(),
    )
}

pub fn stmt_if(cond: ast::Expr, then_stmt: ast::Stmt, else_stmt: Option<ast::Stmt>) -> ast::Stmt {
    ast::Stmt::new(
        ast::StmtKind::If {
            cond,
            then_stmt: Box::new(then_stmt),
            else_stmt: else_stmt.map(Box::new),
        },
        sp(),
    )
}

// Driving the engine

pub fn compile<'a>(cx: &Compilation<'a>, items: Vec<ast::Item>) {
    let root = cx.alloc_root(ast::Root { items });
    cx.add_syntax_tree(root);
}

pub fn top_instance<'a>(cx: &Compilation<'a>, name: &str) -> &'a Symbol<'a> {
    cx.root()
        .scope()
        .unwrap()
        .find(cx, n(name))
        .expect("top instance not found")
}

pub fn find_member<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>, name: &str) -> &'a Symbol<'a> {
    sym.scope()
        .expect("symbol is not a scope")
        .find(cx, n(name))
        .unwrap_or_else(|| panic!("no member `{}` in `{}`", name, sym.name))
}

pub fn value_type<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) -> Type<'a> {
    sym.declared_type()
        .expect("symbol has no declared type")
        .ty(cx, sym)
}

pub fn param_value<'a>(cx: &Compilation<'a>, scope: &'a Symbol<'a>, name: &str) -> ConstantValue {
    let sym = find_member(cx, scope, name);
    match &sym.kind {
        SymbolKind::Parameter(p) => match p.value_override() {
            Some(v) => v,
            None => p.declared.constant_value(cx, sym),
        },
        _ => panic!("`{}` is not a parameter", name),
    }
}

pub fn enum_value_of<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) -> ConstantValue {
    match &sym.kind {
        SymbolKind::EnumValue(ev) => ev
            .direct_value()
            .unwrap_or_else(|| ev.declared.constant_value(cx, sym)),
        _ => panic!("`{}` is not an enum value", sym.name),
    }
}

pub fn int_value(value: &ConstantValue) -> i64 {
    value
        .integer()
        .unwrap_or_else(|| panic!("not an integer: {}", value))
        .as_i64()
        .expect("value has unknown bits or does not fit")
}

pub fn has_diag(cx: &Compilation, code: DiagCode) -> bool {
    cx.diagnostic_codes().contains(&code)
}

pub fn diag_count(cx: &Compilation, code: DiagCode) -> usize {
    cx.diagnostic_codes().iter().filter(|&&c| c == code).count()
}

/// Whether any emitted diagnostic carries a note with the given code.
pub fn has_note(cx: &Compilation, code: DiagCode) -> bool {
    cx.diagnostics()
        .iter()
        .any(|d| d.notes.iter().any(|note| note.code == code))
}
