// Copyright (c) 2016-2020 Fabian Schuiki

//! Hierarchy elaboration.
//!
//! This module turns syntax items into scope members: definitions, packages,
//! value declarations, subroutines, and the deferred constructs whose
//! expansion waits for the enclosing scope to be complete, namely hierarchy
//! instantiations and generate constructs.
//!
//! Instantiation resolves parameter overrides in two passes over the
//! definition's parameters: the overrides are matched by position or name
//! against clones living in a temporary scope, and every concrete instance
//! then receives its own clones so that value memoization stays independent
//! per instance.

use crate::ast;
use crate::compilation::{empty_name, Compilation};
use crate::crate_prelude::*;
use crate::declared::{DeclaredType, DeclaredTypeFlags};
use crate::diag::{Diag, DiagCode};
use crate::eval::{verify_expr, EvalContext};
use crate::expr::{self, BindContext, BindFlags};
use crate::scope::{DeferredMember, LookupLocation, Scope};
use crate::stmt::StatementBinder;
use crate::svint::SVInt;
use crate::symbol::{
    ContinuousAssignSymbol, DefinitionSymbol, ExplicitImportSymbol,
    ForwardingTypedefSymbol, FormalArgumentSymbol, GenerateArrayEntry, GenerateBlockArraySymbol,
    GenerateBlockSymbol, InstanceArraySymbol, InstanceSymbol, ModportSymbol, NetSymbol,
    NetTypeBinding, NetTypeKind, NetTypeSymbol, PackageSymbol, ParameterSymbol,
    ProceduralBlockSymbol, SequentialBlockSymbol, SubroutineSymbol, Symbol, SymbolKind,
    TypeAliasSymbol, TypeParameterSymbol, VariableSymbol, WildcardImportSymbol,
};
use crate::ty::{self, PredefIntKind};
use crate::value::ConstantValue;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Add a list of syntax items as members of a scope.
pub fn add_members<'a>(cx: &Compilation<'a>, owner: &'a Symbol<'a>, items: &'a [ast::Item]) {
    for item in items {
        add_item(cx, owner, item);
    }
}

/// Add a single syntax item as a member of a scope.
pub fn add_item<'a>(cx: &Compilation<'a>, owner: &'a Symbol<'a>, item: &'a ast::Item) {
    let scope = owner.scope().expect("cannot add members to a non-scope");
    match item {
        ast::Item::Module(decl) => {
            let def = definition_from_syntax(cx, decl);
            scope.add_member(def);
            cx.add_definition(def);
        }
        ast::Item::Package(decl) => {
            let pkg = package_from_syntax(cx, decl);
            scope.add_member(pkg);
            cx.add_package(pkg);
        }
        ast::Item::Import(decl) => add_import(cx, scope, decl),
        ast::Item::Param(decl) => {
            add_param_decl(cx, scope, decl, decl.local, false);
        }
        ast::Item::TypeParam(decl) => {
            add_type_param_decl(cx, scope, decl, decl.local, false);
        }
        ast::Item::Typedef(decl) => add_typedef(cx, scope, decl),
        ast::Item::ForwardTypedef(decl) => add_forward_typedef(cx, scope, decl),
        ast::Item::NetTypeDecl(decl) => {
            let sym = cx.alloc_symbol(Symbol::new(
                decl.name.value,
                decl.name.span,
                SymbolKind::NetType(NetTypeSymbol {
                    kind: NetTypeKind::UserDefined,
                    declared: DeclaredType::new(),
                    syntax: Some(decl),
                    alias: Cell::new(None),
                    resolution: Cell::new(None),
                    resolved: Cell::new(false),
                }),
            ));
            scope.add_member(sym);
        }
        ast::Item::Var(decl) => {
            let mut first = true;
            for declarator in &decl.decls {
                let declared = DeclaredType::new();
                declared.set_type_syntax(&decl.ty);
                declared.set_from_declarator(declarator);
                let sym = cx.alloc_symbol(Symbol::new(
                    declarator.name.value,
                    declarator.name.span,
                    SymbolKind::Variable(VariableSymbol { declared }),
                ));
                scope.add_member(sym);
                if first {
                    defer_enum_values(scope, &decl.ty, sym);
                    first = false;
                }
            }
        }
        ast::Item::Net(decl) => {
            let mut first = true;
            for declarator in &decl.decls {
                let declared = DeclaredType::new();
                declared.set_type_syntax(&decl.ty);
                declared.set_from_declarator(declarator);
                let net_type = match &decl.net_type {
                    ast::NetTypeRef::Builtin(kind) => {
                        NetTypeBinding::Resolved(cx.net_type(*kind))
                    }
                    ast::NetTypeRef::Named(name) => {
                        NetTypeBinding::Named(*name, Cell::new(None))
                    }
                };
                let sym = cx.alloc_symbol(Symbol::new(
                    declarator.name.value,
                    declarator.name.span,
                    SymbolKind::Net(NetSymbol { declared, net_type }),
                ));
                scope.add_member(sym);
                if first {
                    defer_enum_values(scope, &decl.ty, sym);
                    first = false;
                }
            }
        }
        ast::Item::PortDecl(decl) => {
            let decls = match &owner.kind {
                SymbolKind::Definition(d) => Some(&d.port_io_decls),
                SymbolKind::ModuleInstance(i) | SymbolKind::InterfaceInstance(i) => {
                    Some(&i.port_io_decls)
                }
                _ => None,
            };
            match decls {
                Some(decls) => decls.borrow_mut().push(decl),
                None => cx.emit(Diag::new(DiagCode::NotYetSupported).span(decl.span)),
            }
        }
        ast::Item::Subroutine(decl) => {
            let sym = subroutine_from_syntax(cx, decl);
            scope.add_member(sym);
        }
        ast::Item::ContAssign(assign) => {
            for (lhs, rhs) in &assign.assignments {
                let sym = cx.alloc_symbol(Symbol::new(
                    empty_name(),
                    assign.span,
                    SymbolKind::ContinuousAssign(ContinuousAssignSymbol {
                        lhs,
                        rhs,
                        assignment: Cell::new(None),
                    }),
                ));
                scope.add_member(sym);
            }
        }
        ast::Item::Genvar(decl) => {
            for name in &decl.names {
                let sym = cx.alloc_symbol(Symbol::new(name.value, name.span, SymbolKind::Genvar));
                scope.add_member(sym);
            }
        }
        ast::Item::GenerateIf(gen) => scope.add_deferred(DeferredMember::GenerateIf(gen)),
        ast::Item::GenerateCase(gen) => scope.add_deferred(DeferredMember::GenerateCase(gen)),
        ast::Item::GenerateFor(gen) => scope.add_deferred(DeferredMember::GenerateFor(gen)),
        ast::Item::GenerateRegion(items) => add_members(cx, owner, items),
        ast::Item::Instantiation(inst) => {
            cx.note_instantiated(inst.target.value);
            scope.add_deferred(DeferredMember::Instantiation(inst));
        }
        ast::Item::Modport(decl) => {
            for item in &decl.items {
                let sym = cx.alloc_symbol(Symbol::new(
                    item.name.value,
                    item.name.span,
                    SymbolKind::Modport(ModportSymbol { scope: Scope::new() }),
                ));
                scope.add_member(sym);
                sym.scope()
                    .unwrap()
                    .add_deferred(DeferredMember::Modport(item));
            }
        }
        ast::Item::Procedure(proc) => {
            let binder = StatementBinder::new();
            binder.set_stmt(&proc.stmt);
            let sym = cx.alloc_symbol(Symbol::new(
                empty_name(),
                proc.span,
                SymbolKind::ProceduralBlock(ProceduralBlockSymbol {
                    kind: proc.kind,
                    binder,
                }),
            ));
            scope.add_member(sym);
        }
        ast::Item::Empty(span) => {
            let sym = cx.alloc_symbol(Symbol::new(empty_name(), *span, SymbolKind::EmptyMember));
            scope.add_member(sym);
        }
    }
}

fn add_import<'a>(cx: &Compilation<'a>, scope: &Scope<'a>, decl: &'a ast::ImportDecl) {
    for item in &decl.items {
        match item {
            ast::ImportItem::Explicit { package, name } => {
                let sym = cx.alloc_symbol(Symbol::new(
                    name.value,
                    name.span,
                    SymbolKind::ExplicitImport(ExplicitImportSymbol {
                        package: *package,
                        item: *name,
                        resolved: Cell::new(None),
                        resolve_done: Cell::new(false),
                    }),
                ));
                scope.add_member(sym);
            }
            ast::ImportItem::Wildcard { package } => {
                let sym = cx.alloc_symbol(Symbol::new(
                    empty_name(),
                    package.span,
                    SymbolKind::WildcardImport(WildcardImportSymbol {
                        package: *package,
                        _marker: std::marker::PhantomData,
                    }),
                ));
                scope.add_member(sym);
            }
        }
    }
}

/// Register a deferred injection of enum values into the enclosing scope if
/// the declared type syntax is an enum.
fn defer_enum_values<'a>(scope: &Scope<'a>, ty: &ast::DataType, sym: &'a Symbol<'a>) {
    if let ast::DataTypeKind::Enum { .. } = ty.kind {
        scope.add_deferred(DeferredMember::EnumValues(sym));
    }
}

fn add_param_decl<'a>(
    cx: &Compilation<'a>,
    scope: &Scope<'a>,
    decl: &'a ast::ParamDecl,
    is_local: bool,
    is_port: bool,
) -> Vec<&'a Symbol<'a>> {
    let mut syms = vec![];
    let mut first = true;
    for declarator in &decl.decls {
        let declared = DeclaredType::with_flags(
            DeclaredTypeFlags::INFER_IMPLICIT | DeclaredTypeFlags::REQUIRE_CONSTANT,
        );
        declared.set_type_syntax(&decl.ty);
        declared.set_from_declarator(declarator);
        let sym = cx.alloc_symbol(Symbol::new(
            declarator.name.value,
            declarator.name.span,
            SymbolKind::Parameter(ParameterSymbol::new(declared, is_local, is_port)),
        ));
        scope.add_member(sym);
        if first {
            defer_enum_values(scope, &decl.ty, sym);
            first = false;
        }
        syms.push(sym);
    }
    syms
}

fn add_type_param_decl<'a>(
    cx: &Compilation<'a>,
    scope: &Scope<'a>,
    decl: &'a ast::TypeParamDecl,
    is_local: bool,
    is_port: bool,
) -> Vec<&'a Symbol<'a>> {
    let mut syms = vec![];
    for declarator in &decl.decls {
        let declared = DeclaredType::new();
        if let Some(default) = &declarator.default {
            declared.set_type_syntax(default);
        }
        let sym = cx.alloc_symbol(Symbol::new(
            declarator.name.value,
            declarator.name.span,
            SymbolKind::TypeParameter(TypeParameterSymbol {
                declared,
                is_local,
                is_port,
            }),
        ));
        scope.add_member(sym);
        syms.push(sym);
    }
    syms
}

fn add_typedef<'a>(cx: &Compilation<'a>, scope: &Scope<'a>, decl: &'a ast::Typedef) {
    let target = DeclaredType::new();
    target.set_type_syntax(&decl.ty);
    target.set_dims_syntax(&decl.dims);
    let sym = cx.alloc_symbol(Symbol::new(
        decl.name.value,
        decl.name.span,
        SymbolKind::TypeAlias(TypeAliasSymbol {
            target,
            first_forward: Cell::new(None),
            canonical: Cell::new(None),
        }),
    ));
    // Link up forward declarations that came before the definition.
    for member in scope.members_raw() {
        if member.name == decl.name.value {
            if let SymbolKind::ForwardingTypedef(_) = member.kind {
                add_forward_to_alias(sym, member);
            }
        }
    }
    scope.add_member(sym);
    defer_enum_values(scope, &decl.ty, sym);
    if let SymbolKind::TypeAlias(alias) = &sym.kind {
        if alias.first_forward.get().is_some() {
            scope.add_deferred(DeferredMember::ForwardCheck(sym));
        }
    }
}

fn add_forward_typedef<'a>(cx: &Compilation<'a>, scope: &Scope<'a>, decl: &'a ast::ForwardTypedef) {
    let sym = cx.alloc_symbol(Symbol::new(
        decl.name.value,
        decl.name.span,
        SymbolKind::ForwardingTypedef(ForwardingTypedefSymbol {
            category: decl.category,
            next: Cell::new(None),
        }),
    ));
    // If the actual typedef was declared first, chain onto it.
    for member in scope.members_raw() {
        if member.name == decl.name.value {
            if let SymbolKind::TypeAlias(_) = member.kind {
                add_forward_to_alias(member, sym);
            }
        }
    }
    scope.add_member(sym);
}

fn add_forward_to_alias<'a>(alias: &'a Symbol<'a>, forward: &'a Symbol<'a>) {
    let alias_data = match &alias.kind {
        SymbolKind::TypeAlias(a) => a,
        _ => return,
    };
    match alias_data.first_forward.get() {
        None => alias_data.first_forward.set(Some(forward)),
        Some(mut current) => loop {
            let fwd = match &current.kind {
                SymbolKind::ForwardingTypedef(f) => f,
                _ => return,
            };
            match fwd.next.get() {
                Some(next) => current = next,
                None => {
                    fwd.next.set(Some(forward));
                    return;
                }
            }
        },
    }
}

/// Check all forward declarations of a typedef against its resolved target.
fn check_forward_decls<'a>(cx: &Compilation<'a>, alias_sym: &'a Symbol<'a>) {
    let alias = match &alias_sym.kind {
        SymbolKind::TypeAlias(a) => a,
        _ => return,
    };
    let target = alias.target.ty(cx, alias_sym).canonical(cx);
    let category = match target.0.kind {
        SymbolKind::PackedStructType(_) | SymbolKind::UnpackedStructType(_) => {
            ast::ForwardCategory::Struct
        }
        SymbolKind::PackedUnionType(_) | SymbolKind::UnpackedUnionType(_) => {
            ast::ForwardCategory::Union
        }
        SymbolKind::EnumType(_) => ast::ForwardCategory::Enum,
        _ => return,
    };
    let mut forward = alias.first_forward.get();
    while let Some(fwd_sym) = forward {
        let fwd = match &fwd_sym.kind {
            SymbolKind::ForwardingTypedef(f) => f,
            _ => return,
        };
        if fwd.category != ast::ForwardCategory::None && fwd.category != category {
            let keyword = match fwd.category {
                ast::ForwardCategory::Enum => "enum",
                ast::ForwardCategory::Struct => "struct",
                ast::ForwardCategory::Union => "union",
                ast::ForwardCategory::Class => "class",
                ast::ForwardCategory::None => unreachable!(),
            };
            cx.emit(
                Diag::new(DiagCode::ForwardTypedefDoesNotMatch)
                    .arg(keyword)
                    .span(fwd_sym.span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(alias_sym.span)),
            );
            return;
        }
        forward = fwd.next.get();
    }
}

/// Create a definition symbol from a module, interface, or program
/// declaration.
pub fn definition_from_syntax<'a>(
    cx: &Compilation<'a>,
    decl: &'a ast::ModuleDecl,
) -> &'a Symbol<'a> {
    let sym = cx.alloc_symbol(Symbol::new(
        decl.name.value,
        decl.name.span,
        SymbolKind::Definition(DefinitionSymbol {
            scope: Scope::new(),
            kind: decl.kind,
            syntax: decl,
            parameters: RefCell::new(vec![]),
            ports: RefCell::new(vec![]),
            port_io_decls: RefCell::new(vec![]),
        }),
    ));
    let scope = sym.scope().unwrap();
    let def = match &sym.kind {
        SymbolKind::Definition(d) => d,
        _ => unreachable!(),
    };

    for import in &decl.imports {
        add_import(cx, scope, import);
    }

    let has_port_params = !decl.params.is_empty();
    for param in &decl.params {
        let syms = match param {
            ast::ParamPort::Value(p) => add_param_decl(cx, scope, p, p.local, true),
            ast::ParamPort::Type(p) => add_type_param_decl(cx, scope, p, p.local, true),
        };
        def.parameters.borrow_mut().extend(syms);
    }

    if let Some(ports) = &decl.ports {
        scope.add_deferred(DeferredMember::Ports {
            list: ports,
            connections: None,
        });
    }

    for item in &decl.items {
        match item {
            ast::Item::Param(p) => {
                let syms = add_param_decl(cx, scope, p, has_port_params || p.local, false);
                def.parameters.borrow_mut().extend(syms);
            }
            ast::Item::TypeParam(p) => {
                let syms = add_type_param_decl(cx, scope, p, has_port_params || p.local, false);
                def.parameters.borrow_mut().extend(syms);
            }
            _ => add_item(cx, sym, item),
        }
    }

    // Record all instantiation targets up front, including the ones hidden
    // inside generate constructs, so that the top level modules are known
    // without elaborating anything.
    scan_instantiations(cx, &decl.items);

    sym
}

fn scan_instantiations<'a>(cx: &Compilation<'a>, items: &[ast::Item]) {
    for item in items {
        match item {
            ast::Item::Instantiation(inst) => cx.note_instantiated(inst.target.value),
            ast::Item::GenerateRegion(items) => scan_instantiations(cx, items),
            ast::Item::GenerateIf(gen) => {
                scan_generate_item(cx, &gen.then_item);
                if let Some(e) = &gen.else_item {
                    scan_generate_item(cx, e);
                }
            }
            ast::Item::GenerateCase(gen) => {
                for arm in &gen.items {
                    scan_generate_item(cx, &arm.item);
                }
            }
            ast::Item::GenerateFor(gen) => scan_instantiations(cx, &gen.block.items),
            _ => (),
        }
    }
}

fn scan_generate_item<'a>(cx: &Compilation<'a>, item: &ast::GenerateItem) {
    match item {
        ast::GenerateItem::Block(block) => scan_instantiations(cx, &block.items),
        ast::GenerateItem::If(gen) => {
            scan_generate_item(cx, &gen.then_item);
            if let Some(e) = &gen.else_item {
                scan_generate_item(cx, e);
            }
        }
        ast::GenerateItem::Case(gen) => {
            for arm in &gen.items {
                scan_generate_item(cx, &arm.item);
            }
        }
    }
}

fn package_from_syntax<'a>(cx: &Compilation<'a>, decl: &'a ast::PackageDecl) -> &'a Symbol<'a> {
    let sym = cx.alloc_symbol(Symbol::new(
        decl.name.value,
        decl.name.span,
        SymbolKind::Package(PackageSymbol {
            scope: Scope::new(),
            syntax: decl,
        }),
    ));
    add_members(cx, sym, &decl.items);
    sym
}

fn subroutine_from_syntax<'a>(cx: &Compilation<'a>, decl: &'a ast::SubroutineDecl) -> &'a Symbol<'a> {
    let return_type = DeclaredType::new();
    match &decl.ret {
        Some(ret) => return_type.set_type_syntax(ret),
        None => return_type.set_type(cx.void_type()),
    }
    let sym = cx.alloc_symbol(Symbol::new(
        decl.name.value,
        decl.name.span,
        SymbolKind::Subroutine(SubroutineSymbol {
            scope: Scope::new(),
            kind: decl.kind,
            return_type,
            args: RefCell::new(vec![]),
            return_var: Cell::new(None),
            binder: StatementBinder::new(),
        }),
    ));
    let scope = sym.scope().unwrap();
    let sub = match &sym.kind {
        SymbolKind::Subroutine(s) => s,
        _ => unreachable!(),
    };

    for arg in &decl.args {
        let declared = DeclaredType::new();
        declared.set_type_syntax(&arg.ty);
        let arg_sym = cx.alloc_symbol(Symbol::new(
            arg.name.value,
            arg.name.span,
            SymbolKind::FormalArgument(FormalArgumentSymbol {
                declared,
                direction: arg.direction,
                default: arg.default.as_ref(),
            }),
        ));
        scope.add_member(arg_sym);
        sub.args.borrow_mut().push(arg_sym);
    }

    // Functions get an implicit variable carrying the return value, with the
    // same name as the function.
    if decl.kind == ast::SubroutineKind::Function {
        let declared = DeclaredType::new();
        match &decl.ret {
            Some(ret) => declared.set_type_syntax(ret),
            None => declared.set_type(cx.void_type()),
        }
        let ret_var = cx.alloc_symbol(Symbol::new(
            decl.name.value,
            decl.name.span,
            SymbolKind::Variable(VariableSymbol { declared }),
        ));
        scope.add_member(ret_var);
        sub.return_var.set(Some(ret_var));
    }

    sub.binder.set_items(&decl.body);
    sym
}

/// Resolve the net type of a net symbol, looking up named net types on first
/// query.
pub fn net_type_of<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) -> &'a Symbol<'a> {
    let net = match &sym.kind {
        SymbolKind::Net(n) => n,
        _ => panic!("net_type_of called on {:?}", sym),
    };
    match &net.net_type {
        NetTypeBinding::Resolved(nt) => *nt,
        NetTypeBinding::Named(name, cache) => {
            if let Some(nt) = cache.get() {
                return nt;
            }
            let scope = sym.parent_scope().expect("net must live in a scope");
            let resolved = match scope.lookup_unqualified(cx, *name, LookupLocation::before(sym)) {
                Some(found) => match found.kind {
                    SymbolKind::NetType(_) => found,
                    _ => {
                        cx.emit(
                            Diag::new(DiagCode::NotAType)
                                .arg(name.value)
                                .span(name.span),
                        );
                        cx.wire_net_type()
                    }
                },
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UndeclaredIdentifier)
                            .arg(name.value)
                            .span(name.span),
                    );
                    cx.wire_net_type()
                }
            };
            cache.set(Some(resolved));
            resolved
        }
    }
}

/// Bind the assignment of a continuous assign symbol on first query.
pub fn continuous_assign_expr<'a>(
    cx: &Compilation<'a>,
    sym: &'a Symbol<'a>,
) -> &'a crate::expr::Expression<'a> {
    let assign = match &sym.kind {
        SymbolKind::ContinuousAssign(a) => a,
        _ => panic!("continuous_assign_expr called on {:?}", sym),
    };
    if let Some(bound) = assign.assignment.get() {
        return bound;
    }
    let scope = sym.parent_scope().expect("assignment must live in a scope");
    let ctx = BindContext::new(scope);
    let bound = expr::bind_assignment_pair(cx, &ctx, assign.lhs, assign.rhs, sym.span);
    assign.assignment.set(Some(bound));
    bound
}

/// Materialize a deferred member into its real members.
pub fn elaborate_deferred<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    deferred: &DeferredMember<'a>,
    location: LookupLocation<'a>,
) -> Vec<&'a Symbol<'a>> {
    match deferred {
        DeferredMember::Instantiation(syntax) => {
            elaborate_instantiation(cx, owner, syntax, location)
        }
        DeferredMember::GenerateIf(syntax) => {
            let mut results = vec![];
            elaborate_generate_if(cx, owner, syntax, location, scope_instantiated(owner), &mut results);
            results
        }
        DeferredMember::GenerateCase(syntax) => {
            let mut results = vec![];
            elaborate_generate_case(cx, owner, syntax, location, scope_instantiated(owner), &mut results);
            results
        }
        DeferredMember::GenerateFor(syntax) => {
            vec![elaborate_generate_for(cx, owner, syntax, location)]
        }
        DeferredMember::Ports { list, connections } => {
            crate::port::build_ports(cx, owner, list, *connections)
        }
        DeferredMember::Modport(item) => elaborate_modport(cx, owner, item),
        DeferredMember::EnumValues(sym) => elaborate_enum_values(cx, sym),
        DeferredMember::ForwardCheck(alias) => {
            check_forward_decls(cx, alias);
            vec![]
        }
    }
}

fn scope_instantiated(owner: &Symbol) -> bool {
    match &owner.kind {
        SymbolKind::GenerateBlock(b) => b.instantiated,
        _ => true,
    }
}

fn elaborate_modport<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    item: &'a ast::ModportItem,
) -> Vec<&'a Symbol<'a>> {
    let iface_scope = match owner.parent_scope() {
        Some(s) => s,
        None => return vec![],
    };
    let mut members = vec![];
    for port in &item.ports {
        match iface_scope.find(cx, port.name.value) {
            Some(found) => {
                let sym = cx.alloc_symbol(Symbol::new(
                    port.name.value,
                    port.name.span,
                    SymbolKind::TransparentMember(found),
                ));
                members.push(sym);
            }
            None => {
                cx.emit(
                    Diag::new(DiagCode::UnknownMember)
                        .arg(port.name.value)
                        .arg(owner.parent().map(|p| p.name).unwrap_or_else(empty_name))
                        .span(port.name.span),
                );
            }
        }
    }
    members
}

fn elaborate_enum_values<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) -> Vec<&'a Symbol<'a>> {
    let declared = match sym.declared_type() {
        Some(d) => d,
        None => match &sym.kind {
            SymbolKind::TypeAlias(a) => &a.target,
            _ => return vec![],
        },
    };
    let ty = declared.ty(cx, sym);
    let canonical = ty.canonical(cx);
    let enum_scope = match &canonical.0.kind {
        SymbolKind::EnumType(e) => &e.scope,
        _ => return vec![],
    };
    let mut members = vec![];
    for value in enum_scope.members_raw() {
        if let SymbolKind::EnumValue(_) = value.kind {
            members.push(cx.alloc_symbol(Symbol::new(
                value.name,
                value.span,
                SymbolKind::TransparentMember(value),
            )));
        }
    }
    members
}

/// Whether a definition can stand at the top of the hierarchy: a module
/// whose non-local parameters all carry defaults.
pub fn is_valid_top(_cx: &Compilation, def_sym: &Symbol) -> bool {
    let def = match &def_sym.kind {
        SymbolKind::Definition(d) => d,
        _ => return false,
    };
    if def.kind != ast::DefinitionKind::Module {
        return false;
    }
    for param in def.parameters.borrow().iter() {
        match &param.kind {
            SymbolKind::Parameter(p) => {
                if !p.is_local && p.declared.init_syntax().is_none() {
                    return false;
                }
            }
            SymbolKind::TypeParameter(p) => {
                if !p.is_local && p.declared.type_syntax().is_none() {
                    return false;
                }
            }
            _ => (),
        }
    }
    true
}

/// Instantiate a definition at the top of the hierarchy, with default
/// parameter values and unconnected ports.
pub fn instantiate_toplevel<'a>(cx: &Compilation<'a>, def_sym: &'a Symbol<'a>) -> &'a Symbol<'a> {
    let def = match &def_sym.kind {
        SymbolKind::Definition(d) => d,
        _ => panic!("instantiate_toplevel on {:?}", def_sym),
    };
    let parameters = resolve_parameters(
        cx,
        def_sym,
        &HashMap::new(),
        def_sym.parent_scope().expect("definition without scope"),
        LookupLocation::max(),
        def.syntax.name.span,
    );
    create_instance(
        cx,
        def_sym,
        def.syntax.name,
        None,
        &parameters,
        vec![],
    )
}

/// Elaborate a hierarchy instantiation into instances and instance arrays.
fn elaborate_instantiation<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    syntax: &'a ast::Instantiation,
    location: LookupLocation<'a>,
) -> Vec<&'a Symbol<'a>> {
    let def_sym = match cx.get_definition(syntax.target.value) {
        Some(d) => d,
        None => {
            cx.emit(
                Diag::new(DiagCode::UnknownModule)
                    .arg(syntax.target.value)
                    .span(syntax.target.span),
            );
            return vec![];
        }
    };
    let def = match &def_sym.kind {
        SymbolKind::Definition(d) => d,
        _ => return vec![],
    };

    // Index the parameter assignments, handling both ordered and named
    // forms; a specific instantiation may only use one of the two.
    let mut overrides: HashMap<Name, &'a ast::ParamValue> = HashMap::new();
    let mut ordered: Vec<(&'a ast::ParamValue, Span)> = vec![];
    let mut named: Vec<(Spanned<Name>, Option<&'a ast::ParamValue>, bool)> = vec![];
    let mut has_assignments = false;
    let mut using_ordered = true;
    for assignment in &syntax.params {
        let is_ordered = match assignment {
            ast::ParamAssignment::Ordered(..) => true,
            _ => false,
        };
        if !has_assignments {
            has_assignments = true;
            using_ordered = is_ordered;
        } else if is_ordered != using_ordered {
            cx.emit(Diag::new(DiagCode::MixingOrderedAndNamedParams).span(syntax.span));
            break;
        }
        match assignment {
            ast::ParamAssignment::Ordered(value, span) => ordered.push((value, *span)),
            ast::ParamAssignment::Named { name, value, .. } => {
                if let Some((prev, _, _)) = named.iter().find(|(n, _, _)| n.value == name.value) {
                    cx.emit(
                        Diag::new(DiagCode::DuplicateParamAssignment)
                            .arg(name.value)
                            .span(name.span)
                            .note(Diag::new(DiagCode::NotePreviousUsage).span(prev.span)),
                    );
                    continue;
                }
                named.push((*name, value.as_ref(), false));
            }
        }
    }

    if using_ordered {
        let mut index = 0;
        for param in def.parameters.borrow().iter() {
            if index >= ordered.len() {
                break;
            }
            let local = match &param.kind {
                SymbolKind::Parameter(p) => p.is_local,
                SymbolKind::TypeParameter(p) => p.is_local,
                _ => true,
            };
            if local {
                continue;
            }
            overrides.insert(param.name, ordered[index].0);
            index += 1;
        }
        if index < ordered.len() {
            cx.emit(
                Diag::new(DiagCode::TooManyParamAssignments)
                    .arg(def_sym.name)
                    .arg(index)
                    .arg(ordered.len())
                    .span(ordered[index].1),
            );
        }
    } else {
        for param in def.parameters.borrow().iter() {
            let entry = named
                .iter_mut()
                .find(|(n, _, _)| n.value == param.name);
            let (name, value, used) = match entry {
                Some(e) => (e.0, e.1, &mut e.2),
                None => continue,
            };
            *used = true;
            let (local, port) = match &param.kind {
                SymbolKind::Parameter(p) => (p.is_local, p.is_port),
                SymbolKind::TypeParameter(p) => (p.is_local, p.is_port),
                _ => (true, false),
            };
            if local {
                let code = if port {
                    DiagCode::AssignedToLocalPortParam
                } else {
                    DiagCode::AssignedToLocalBodyParam
                };
                cx.emit(
                    Diag::new(code)
                        .span(name.span)
                        .note(Diag::new(DiagCode::NoteDeclarationHere).span(param.span)),
                );
                continue;
            }
            // A missing value means the default applies.
            if let Some(value) = value {
                overrides.insert(param.name, value);
            }
        }
        for (name, _, used) in &named {
            if !used {
                cx.emit(
                    Diag::new(DiagCode::ParameterDoesNotExist)
                        .arg(name.value)
                        .arg(def_sym.name)
                        .span(name.span),
                );
            }
        }
    }

    // Determine the values of all parameters once, in a temporary scope, so
    // that they are shared between the instances.
    let scope = owner.scope().unwrap();
    let parameters =
        resolve_parameters(cx, def_sym, &overrides, scope, location, syntax.span);

    let mut results = vec![];
    for instance in &syntax.instances {
        let mut path = vec![];
        if let Some(sym) = recurse_instance_array(
            cx,
            def_sym,
            instance,
            &parameters,
            scope,
            location,
            &instance.dims,
            &mut path,
        ) {
            results.push(sym);
        }
    }
    results
}

/// Clone each definition parameter into a temporary scope and resolve the
/// user's overrides against the clones.
fn resolve_parameters<'a>(
    cx: &Compilation<'a>,
    def_sym: &'a Symbol<'a>,
    overrides: &HashMap<Name, &'a ast::ParamValue>,
    inst_scope: &'a Scope<'a>,
    location: LookupLocation<'a>,
    inst_span: Span,
) -> Vec<&'a Symbol<'a>> {
    let def = match &def_sym.kind {
        SymbolKind::Definition(d) => d,
        _ => return vec![],
    };

    // The temporary scope's parent is the definition's parent, so that
    // lookups of external names succeed.
    let temp = cx.alloc_symbol(Symbol::new(
        def_sym.name,
        def_sym.span,
        SymbolKind::ModuleInstance(InstanceSymbol {
            scope: Scope::new(),
            definition: def_sym,
            array_path: vec![],
            ports: RefCell::new(vec![]),
            port_io_decls: RefCell::new(vec![]),
        }),
    ));
    if let Some(parent) = def_sym.parent() {
        temp.set_parent(parent, def_sym.index());
    }
    let temp_scope = temp.scope().unwrap();
    for import in &def.syntax.imports {
        add_import(cx, temp_scope, import);
    }

    let mut parameters = vec![];
    for param in def.parameters.borrow().iter() {
        let cloned = clone_parameter(cx, param);
        temp_scope.add_member(cloned);
        parameters.push(cloned);

        match &cloned.kind {
            SymbolKind::Parameter(p) => {
                match overrides.get(&cloned.name) {
                    Some(ast::ParamValue::Expr(value)) => {
                        p.declared.clear_resolved();
                        p.declared.set_initializer_syntax(value, value.span);
                        // Force resolution in the instantiating context, so
                        // that the override names things at the call site.
                        let context = BindContext {
                            scope: inst_scope,
                            location,
                            flags: BindFlags::CONSTANT,
                        };
                        p.declared.resolve_at(cx, cloned, &context);
                    }
                    Some(ast::ParamValue::Type(_)) => {
                        cx.emit(
                            Diag::new(DiagCode::BadTypeParamExpr)
                                .arg(cloned.name)
                                .span(inst_span),
                        );
                    }
                    None => {
                        if !p.is_local && p.is_port && p.declared.init_syntax().is_none() {
                            cx.emit(
                                Diag::new(DiagCode::ParamHasNoValue)
                                    .arg(def_sym.name)
                                    .arg(cloned.name)
                                    .span(inst_span),
                            );
                        } else {
                            p.declared.clear_resolved();
                        }
                    }
                }
            }
            SymbolKind::TypeParameter(p) => match overrides.get(&cloned.name) {
                Some(ast::ParamValue::Type(dt)) => {
                    p.declared
                        .set_type(ty::type_from_syntax(cx, dt, location, inst_scope, false));
                }
                Some(ast::ParamValue::Expr(value)) => {
                    // Plain names parse as expressions; reinterpret them as
                    // named types.
                    if let ast::ExprKind::Ident(name) = &value.kind {
                        let dt = cx.alloc_data_type(ast::DataType::new(
                            ast::DataTypeKind::Named {
                                package: None,
                                name: *name,
                                dims: vec![],
                            },
                            value.span,
                        ));
                        p.declared
                            .set_type(ty::type_from_syntax(cx, dt, location, inst_scope, false));
                    } else {
                        cx.emit(
                            Diag::new(DiagCode::BadTypeParamExpr)
                                .arg(cloned.name)
                                .span(value.span),
                        );
                        p.declared.clear_resolved();
                    }
                }
                None => {
                    if !p.is_local && p.is_port && p.declared.type_syntax().is_none() {
                        cx.emit(
                            Diag::new(DiagCode::ParamHasNoValue)
                                .arg(def_sym.name)
                                .arg(cloned.name)
                                .span(inst_span),
                        );
                    } else if p.declared.type_syntax().is_some() {
                        p.declared.clear_resolved();
                    }
                }
            },
            _ => (),
        }
    }
    parameters
}

/// Clone a parameter symbol: reuse the declaration's type and initializer
/// syntax with a fresh declared-type record.
fn clone_parameter<'a>(cx: &Compilation<'a>, source: &'a Symbol<'a>) -> &'a Symbol<'a> {
    match &source.kind {
        SymbolKind::Parameter(p) => {
            let declared = DeclaredType::new();
            declared.clone_from_declared(&p.declared);
            cx.alloc_symbol(Symbol::new(
                source.name,
                source.span,
                SymbolKind::Parameter(ParameterSymbol::new(declared, p.is_local, p.is_port)),
            ))
        }
        SymbolKind::TypeParameter(p) => {
            let declared = DeclaredType::new();
            declared.clone_from_declared(&p.declared);
            cx.alloc_symbol(Symbol::new(
                source.name,
                source.span,
                SymbolKind::TypeParameter(TypeParameterSymbol {
                    declared,
                    is_local: p.is_local,
                    is_port: p.is_port,
                }),
            ))
        }
        _ => panic!("clone_parameter on {:?}", source),
    }
}

/// Recursively expand the dimensions of an instance array, creating one
/// instance per index.
fn recurse_instance_array<'a>(
    cx: &Compilation<'a>,
    def_sym: &'a Symbol<'a>,
    instance: &'a ast::HierInstance,
    parameters: &[&'a Symbol<'a>],
    scope: &'a Scope<'a>,
    location: LookupLocation<'a>,
    dims: &'a [ast::Dim],
    path: &mut Vec<i32>,
) -> Option<&'a Symbol<'a>> {
    let (dim, rest) = match dims.split_first() {
        None => {
            return Some(create_instance(
                cx,
                def_sym,
                instance.name,
                Some(&instance.connections),
                parameters,
                path.clone(),
            ));
        }
        Some(x) => x,
    };

    // If the dimension fails to evaluate to a range, create an empty array
    // in its place so that downstream references do not cascade errors.
    let range = match ty::eval_unpacked_dim(cx, dim, location, scope) {
        Some(r) => r,
        None => {
            return Some(cx.alloc_symbol(Symbol::new(
                instance.name.value,
                instance.name.span,
                SymbolKind::InstanceArray(InstanceArraySymbol {
                    scope: Scope::new(),
                    elements: RefCell::new(vec![]),
                    range: crate::value::ConstantRange::new(0, 0),
                }),
            )));
        }
    };

    let array = cx.alloc_symbol(Symbol::new(
        instance.name.value,
        instance.name.span,
        SymbolKind::InstanceArray(InstanceArraySymbol {
            scope: Scope::new(),
            elements: RefCell::new(vec![]),
            range,
        }),
    ));
    let array_scope = array.scope().unwrap();
    let array_data = match &array.kind {
        SymbolKind::InstanceArray(a) => a,
        _ => unreachable!(),
    };

    // Walk the indices in declaration order.
    let step: i32 = if range.is_little_endian() { -1 } else { 1 };
    let mut index = range.left;
    loop {
        path.push(index);
        let element = recurse_instance_array(
            cx, def_sym, instance, parameters, scope, location, rest, path,
        );
        path.pop();
        let element = element?;
        array_scope.add_member(element);
        array_data.elements.borrow_mut().push(element);
        if index == range.right {
            break;
        }
        index += step;
    }
    Some(array)
}

/// Create a single module or interface instance and populate its scope.
fn create_instance<'a>(
    cx: &Compilation<'a>,
    def_sym: &'a Symbol<'a>,
    name: Spanned<Name>,
    connections: Option<&'a [ast::PortConnection]>,
    parameters: &[&'a Symbol<'a>],
    path: Vec<i32>,
) -> &'a Symbol<'a> {
    let def = match &def_sym.kind {
        SymbolKind::Definition(d) => d,
        _ => panic!("create_instance on {:?}", def_sym),
    };
    let data = InstanceSymbol {
        scope: Scope::new(),
        definition: def_sym,
        array_path: path,
        ports: RefCell::new(vec![]),
        port_io_decls: RefCell::new(vec![]),
    };
    let kind = match def.kind {
        ast::DefinitionKind::Interface => SymbolKind::InterfaceInstance(data),
        _ => SymbolKind::ModuleInstance(data),
    };
    let sym = cx.alloc_symbol(Symbol::new(name.value, name.span, kind));
    let scope = sym.scope().unwrap();

    // Package imports from the definition header come first.
    for import in &def.syntax.imports {
        add_import(cx, scope, import);
    }

    // Then the port parameters, cloned so that every instance keeps its own
    // memoized values.
    let mut param_iter = parameters.iter().peekable();
    while let Some(&&param) = param_iter.peek() {
        let is_port = match &param.kind {
            SymbolKind::Parameter(p) => p.is_port,
            SymbolKind::TypeParameter(p) => p.is_port,
            _ => false,
        };
        if !is_port {
            break;
        }
        scope.add_member(clone_parameter(cx, param));
        param_iter.next();
    }

    // The port list must come before any body members, so that port
    // connections elaborate before anything depends on them.
    if let Some(ports) = &def.syntax.ports {
        scope.add_deferred(DeferredMember::Ports {
            list: ports,
            connections,
        });
    }

    // Finally the body, with parameter declarations replaced by their
    // resolved clones.
    for item in &def.syntax.items {
        match item {
            ast::Item::Param(p) => {
                for declarator in &p.decls {
                    let param = *param_iter
                        .next()
                        .expect("definition parameter list out of sync");
                    assert_eq!(param.name, declarator.name.value);
                    scope.add_member(clone_parameter(cx, param));
                }
            }
            ast::Item::TypeParam(p) => {
                for declarator in &p.decls {
                    let param = *param_iter
                        .next()
                        .expect("definition parameter list out of sync");
                    assert_eq!(param.name, declarator.name.value);
                    scope.add_member(clone_parameter(cx, param));
                }
            }
            _ => add_item(cx, sym, item),
        }
    }

    sym
}

/// Elaborate an `if` generate construct: evaluate the predicate and create
/// the branches, marking the untaken one as uninstantiated.
fn elaborate_generate_if<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    syntax: &'a ast::GenerateIf,
    location: LookupLocation<'a>,
    instantiated: bool,
    results: &mut Vec<&'a Symbol<'a>>,
) {
    let scope = owner.scope().unwrap();
    let mut selector = None;
    if instantiated {
        let ctx = BindContext::constant(scope, location);
        let cond = expr::bind_expr(cx, &ctx, &syntax.cond);
        if !cond.bad() && !cond.ty.is_boolean_convertible(cx) {
            cx.emit(
                Diag::new(DiagCode::NotBooleanConvertible)
                    .arg(cond.ty.display(cx))
                    .span(cond.span),
            );
        } else if !cond.bad() {
            expr::fold_constant(cx, cond);
            if let Some(v) = cond.constant() {
                selector = Some(v.is_true());
            }
        }
    }

    create_cond_gen_item(
        cx,
        owner,
        &syntax.then_item,
        location,
        selector == Some(true),
        results,
    );
    if let Some(else_item) = &syntax.else_item {
        create_cond_gen_item(cx, owner, else_item, location, selector == Some(false), results);
    }
}

/// Create the block of a conditional generate arm. A directly nested
/// conditional construct is not treated as a separate scope; its blocks
/// belong to the outer construct.
fn create_cond_gen_item<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    item: &'a ast::GenerateItem,
    location: LookupLocation<'a>,
    instantiated: bool,
    results: &mut Vec<&'a Symbol<'a>>,
) {
    match item {
        ast::GenerateItem::If(gen) => {
            elaborate_generate_if(cx, owner, gen, location, instantiated, results)
        }
        ast::GenerateItem::Case(gen) => {
            elaborate_generate_case(cx, owner, gen, location, instantiated, results)
        }
        ast::GenerateItem::Block(block) => {
            let name = block.label.map(|l| l.value).unwrap_or_else(empty_name);
            let sym = cx.alloc_symbol(Symbol::new(
                name,
                block.span,
                SymbolKind::GenerateBlock(GenerateBlockSymbol {
                    scope: Scope::new(),
                    instantiated,
                }),
            ));
            sym.set_parent(owner, location.index);
            add_members(cx, sym, &block.items);
            results.push(sym);
        }
    }
}

/// Elaborate a `case` generate construct: bind all arms against the
/// condition, evaluate, and pick the first matching arm.
fn elaborate_generate_case<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    syntax: &'a ast::GenerateCase,
    location: LookupLocation<'a>,
    instantiated: bool,
    results: &mut Vec<&'a Symbol<'a>>,
) {
    let scope = owner.scope().unwrap();
    let ctx = BindContext::constant(scope, location);

    let mut cond_value = None;
    let cond = expr::bind_expr(cx, &ctx, &syntax.cond);
    if instantiated && !cond.bad() {
        expr::fold_constant(cx, cond);
        cond_value = cond.constant().cloned();
    }

    let mut matched = false;
    let mut warned = false;
    let mut match_span = silica_common::source::INVALID_SPAN;
    let mut default_item = None;
    for arm in &syntax.items {
        if arm.exprs.is_empty() {
            default_item = Some(arm);
            continue;
        }
        // Check each arm expression against the condition value.
        let mut current = false;
        let mut current_span = silica_common::source::INVALID_SPAN;
        for e in &arm.exprs {
            let bound = expr::bind_expr(cx, &ctx, e);
            let bound = expr::convert_assignment(cx, cond.ty, bound, e.span);
            if bound.bad() {
                continue;
            }
            expr::fold_constant(cx, bound);
            let value = match bound.constant() {
                Some(v) => v,
                None => continue,
            };
            if current || cond_value.is_none() {
                continue;
            }
            let is_match = match (cond_value.as_ref().unwrap(), value) {
                (ConstantValue::Integer(a), ConstantValue::Integer(b)) => a.case_eq(b),
                (a, b) => a == b,
            };
            if is_match {
                current = true;
                current_span = e.span;
            }
        }

        if current && !matched {
            matched = true;
            match_span = current_span;
            create_cond_gen_item(cx, owner, &arm.item, location, instantiated, results);
        } else {
            if current && !warned {
                cx.emit(
                    Diag::new(DiagCode::CaseGenerateDup)
                        .arg(cond_value.as_ref().unwrap())
                        .span(current_span)
                        .note(Diag::new(DiagCode::NotePreviousMatch).span(match_span)),
                );
                warned = true;
            }
            create_cond_gen_item(cx, owner, &arm.item, location, false, results);
        }
    }

    if let Some(default_item) = default_item {
        create_cond_gen_item(
            cx,
            owner,
            &default_item.item,
            location,
            instantiated && !matched,
            results,
        );
    } else if !matched && instantiated {
        if let Some(v) = &cond_value {
            cx.emit(
                Diag::new(DiagCode::CaseGenerateNoBlock)
                    .arg(v)
                    .span(syntax.cond.span),
            );
        }
    }
}

/// Elaborate a loop generate construct: iterate the genvar at compile time,
/// creating one generate block per iteration seeded with an implicit
/// localparam holding the genvar's value.
fn elaborate_generate_for<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    syntax: &'a ast::GenerateFor,
    location: LookupLocation<'a>,
) -> &'a Symbol<'a> {
    let scope = owner.scope().unwrap();
    let name = syntax.block.label.map(|l| l.value).unwrap_or_else(empty_name);
    let array = cx.alloc_symbol(Symbol::new(
        name,
        syntax.block.span,
        SymbolKind::GenerateBlockArray(GenerateBlockArraySymbol {
            scope: Scope::new(),
            entries: RefCell::new(vec![]),
        }),
    ));
    array.set_parent(owner, location.index);
    let array_scope = array.scope().unwrap();

    // Without the `genvar` keyword the loop variable must resolve to a
    // genvar declared elsewhere.
    if !syntax.genvar {
        match scope.lookup_unqualified(cx, syntax.ident, location) {
            Some(found) => {
                if let SymbolKind::Genvar = found.kind {
                } else {
                    cx.emit(
                        Diag::new(DiagCode::NotAGenvar)
                            .arg(syntax.ident.value)
                            .span(syntax.ident.span)
                            .note(Diag::new(DiagCode::NoteDeclarationHere).span(found.span)),
                    );
                    return array;
                }
            }
            None => {
                cx.emit(
                    Diag::new(DiagCode::UndeclaredIdentifier)
                        .arg(syntax.ident.value)
                        .span(syntax.ident.span),
                );
                return array;
            }
        }
    }

    // Bind the initialization expression.
    let bind_ctx = BindContext::constant(scope, location);
    let int_ty = cx.predef_type(PredefIntKind::Int);
    let initial = expr::bind_with_target(cx, &bind_ctx, &syntax.init, int_ty, syntax.init.span);
    expr::fold_constant(cx, initial);
    let initial_value = match initial.constant() {
        Some(v) => v.clone(),
        None => return array,
    };

    // Fabricate a temporary scope holding the loop iteration variable.
    let iter_scope_sym = cx.alloc_symbol(Symbol::new(
        empty_name(),
        syntax.span,
        SymbolKind::SequentialBlock(SequentialBlockSymbol {
            scope: Scope::new(),
            binder: StatementBinder::new(),
        }),
    ));
    iter_scope_sym.set_parent(owner, location.index);
    let local_declared = DeclaredType::new();
    local_declared.set_type(int_ty);
    let local = cx.alloc_symbol(Symbol::new(
        syntax.ident.value,
        syntax.ident.span,
        SymbolKind::Variable(VariableSymbol {
            declared: local_declared,
        }),
    ));
    iter_scope_sym.scope().unwrap().add_member(local);

    // Bind the stop and iteration expressions once, for reuse on each
    // iteration.
    let iter_ctx = BindContext {
        scope: iter_scope_sym.scope().unwrap(),
        location: LookupLocation::max(),
        flags: BindFlags::NO_HIERARCHICAL,
    };
    let stop_expr = expr::bind_expr(cx, &iter_ctx, &syntax.cond);
    let iter_expr = expr::bind_expr(cx, &iter_ctx, &syntax.step);
    if stop_expr.bad() || iter_expr.bad() {
        return array;
    }
    if !stop_expr.ty.is_boolean_convertible(cx) {
        cx.emit(
            Diag::new(DiagCode::NotBooleanConvertible)
                .arg(stop_expr.ty.display(cx))
                .span(stop_expr.span),
        );
        return array;
    }

    // Both must be constant-evaluable before the loop runs.
    for check in &[stop_expr, iter_expr] {
        let mut verify_ctx = EvalContext::new(cx);
        let ok = verify_expr(check, &mut verify_ctx);
        let notes = verify_ctx.take_diags();
        if !ok {
            let mut diag = Diag::new(DiagCode::ExpressionNotConstant).span(check.span);
            for note in notes {
                diag = diag.note(note);
            }
            cx.emit(diag);
            return array;
        }
    }

    // Create storage for the iteration variable and generate blocks.
    let mut eval_ctx = EvalContext::new(cx);
    eval_ctx.create_local(local, initial_value);

    let check_unknown = |cx: &Compilation<'a>, value: &ConstantValue| -> bool {
        match value.integer() {
            Some(v) if v.has_unknown() => {
                cx.emit(
                    Diag::new(DiagCode::GenvarUnknownBits)
                        .arg(value)
                        .span(syntax.ident.span),
                );
                true
            }
            _ => false,
        }
    };

    let value = eval_ctx.find_local(local).cloned().unwrap();
    if check_unknown(cx, &value) {
        return array;
    }

    let mut used: Vec<SVInt> = vec![];
    let mut entries = vec![];
    let mut any = false;
    loop {
        let stop = crate::eval::eval_expr(stop_expr, &mut eval_ctx);
        if stop.is_invalid() || !stop.is_true() {
            break;
        }
        let value = eval_ctx.find_local(local).cloned().unwrap();
        let int_value = match value.integer() {
            Some(v) => v.clone(),
            None => break,
        };
        if used.iter().any(|v| v.case_eq(&int_value)) {
            cx.emit(
                Diag::new(DiagCode::GenvarDuplicate)
                    .arg(&int_value)
                    .span(syntax.ident.span),
            );
            break;
        }
        used.push(int_value.clone());

        any = true;
        let block = create_genvar_block(cx, syntax, value.clone(), true);
        entries.push(GenerateArrayEntry {
            value: int_value,
            block,
        });
        array_scope.add_member(block);

        if crate::eval::eval_expr(iter_expr, &mut eval_ctx).is_invalid() {
            break;
        }
        let value = eval_ctx.find_local(local).cloned().unwrap();
        if check_unknown(cx, &value) {
            break;
        }
    }

    if !any {
        let block = create_genvar_block(
            cx,
            syntax,
            ConstantValue::Integer(SVInt::from_u64(32, 0, true)),
            false,
        );
        array_scope.add_member(block);
    }
    match &array.kind {
        SymbolKind::GenerateBlockArray(a) => *a.entries.borrow_mut() = entries,
        _ => unreachable!(),
    }
    array
}

/// Create one generate block of a loop, seeded with an implicit localparam
/// equal to the genvar's current value.
fn create_genvar_block<'a>(
    cx: &Compilation<'a>,
    syntax: &'a ast::GenerateFor,
    value: ConstantValue,
    instantiated: bool,
) -> &'a Symbol<'a> {
    let block = cx.alloc_symbol(Symbol::new(
        empty_name(),
        syntax.block.span,
        SymbolKind::GenerateBlock(GenerateBlockSymbol {
            scope: Scope::new(),
            instantiated,
        }),
    ));
    let declared = DeclaredType::new();
    declared.set_type(cx.predef_type(PredefIntKind::Int));
    let param_data = ParameterSymbol::new(declared, true, false);
    param_data.set_value(value);
    let implicit_param = cx.alloc_symbol(Symbol::new(
        syntax.ident.value,
        syntax.ident.span,
        SymbolKind::Parameter(param_data),
    ));
    block.scope().unwrap().add_member(implicit_param);
    add_members(cx, block, &syntax.block.items);
    block
}
