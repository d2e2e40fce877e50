// Copyright (c) 2016-2020 Fabian Schuiki

//! Port list construction and connection.
//!
//! Each port of a module or interface produces a public port symbol, held on
//! the instance, plus an internal net or variable that body code refers to.
//! ANSI headers build both in one pass, inheriting direction, kind, and type
//! from the previous port where omitted. Non-ANSI headers are built in two
//! phases: the port I/O declarations of the body are indexed first, and each
//! port reference in the header then matches against that index, reusing or
//! synthesizing the internal symbol.

use crate::ast;
use crate::compilation::{empty_name, Compilation};
use crate::crate_prelude::*;
use crate::declared::{DeclaredType, DeclaredTypeFlags};
use crate::diag::{Diag, DiagCode};
use crate::expr::{self, BindContext, BindFlags};
use crate::scope::LookupLocation;
use crate::symbol::{
    InterfacePortSymbol, NetSymbol, NetTypeBinding, PortSymbol, Symbol, SymbolKind, VariableSymbol,
};
use crate::ty;
use crate::value::ConstantRange;
use std::cell::{Cell, RefCell};

/// Build the ports of a definition or instance, returning the internal
/// symbols to install as scope members. Port connections are attached when
/// the instantiation site provides them.
pub fn build_ports<'a>(
    cx: &Compilation<'a>,
    owner: &'a Symbol<'a>,
    list: &'a ast::PortList,
    connections: Option<&'a [ast::PortConnection]>,
) -> Vec<&'a Symbol<'a>> {
    let mut members = vec![];
    let mut ports = vec![];
    match list {
        ast::PortList::Ansi(syntax) => {
            let mut builder = AnsiPortListBuilder::new(cx, owner);
            for port in syntax {
                if let Some((port_sym, internal)) = builder.create_port(port) {
                    ports.push(port_sym);
                    if let Some(internal) = internal {
                        members.push(internal);
                    }
                }
            }
        }
        ast::PortList::NonAnsi(syntax) => {
            let mut builder = NonAnsiPortListBuilder::new(cx, owner);
            for port in syntax {
                if let Some((port_sym, internal)) = builder.create_port(port) {
                    ports.push(port_sym);
                    if let Some(internal) = internal {
                        members.push(internal);
                    }
                }
            }
        }
    }

    // Interface ports must be visible by name inside the body, so they
    // become members as well.
    for &port in &ports {
        if let SymbolKind::InterfacePort(_) = port.kind {
            members.push(port);
        }
    }

    match &owner.kind {
        SymbolKind::Definition(d) => *d.ports.borrow_mut() = ports.clone(),
        SymbolKind::ModuleInstance(i) | SymbolKind::InterfaceInstance(i) => {
            *i.ports.borrow_mut() = ports.clone()
        }
        _ => (),
    }

    if let Some(connections) = connections {
        connect_ports(cx, owner, &ports, connections);
    }

    members
}

struct AnsiPortListBuilder<'cx, 'a> {
    cx: &'cx Compilation<'a>,
    owner: &'a Symbol<'a>,
    last_direction: ast::Direction,
    last_type: Option<&'a ast::DataType>,
    last_net: bool,
    last_net_kind: ast::NetKind,
    last_interface: Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)>,
}

impl<'cx, 'a> AnsiPortListBuilder<'cx, 'a> {
    fn new(cx: &'cx Compilation<'a>, owner: &'a Symbol<'a>) -> Self {
        AnsiPortListBuilder {
            cx,
            owner,
            last_direction: ast::Direction::InOut,
            last_type: None,
            last_net: false,
            last_net_kind: ast::NetKind::Wire,
            last_interface: None,
        }
    }

    fn create_port(
        &mut self,
        syntax: &'a ast::AnsiPort,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        let cx = self.cx;
        match &syntax.kind {
            ast::AnsiPortKind::Implicit { header, decl } => match header {
                ast::PortHeader::Variable {
                    direction,
                    var_keyword,
                    ty,
                } => {
                    // A header with all three components omitted inherits
                    // everything from the previous port.
                    if direction.is_none() && !var_keyword && ty.is_implicit_empty() {
                        return self.add_inherited(decl);
                    }

                    // A bare type name may actually be an interface port;
                    // only a lookup can tell.
                    if let ast::DataTypeKind::Named {
                        package: None,
                        name,
                        dims,
                    } = &ty.kind
                    {
                        if dims.is_empty() && !self.names_a_type(*name) {
                            if let Some(def) = cx.get_definition(name.value) {
                                let is_iface = match &def.kind {
                                    SymbolKind::Definition(d) => {
                                        d.kind == ast::DefinitionKind::Interface
                                    }
                                    _ => false,
                                };
                                if !is_iface {
                                    cx.emit(
                                        Diag::new(DiagCode::PortTypeNotInterfaceOrData)
                                            .arg(name.value)
                                            .span(ty.span)
                                            .note(
                                                Diag::new(DiagCode::NoteDeclarationHere)
                                                    .span(def.span),
                                            ),
                                    );
                                    return self.add_interface(decl, None, None);
                                }
                                if *var_keyword {
                                    cx.emit(
                                        Diag::new(DiagCode::VarWithInterfacePort).span(syntax.span),
                                    );
                                }
                                if direction.is_some() {
                                    cx.emit(
                                        Diag::new(DiagCode::DirectionWithInterfacePort)
                                            .span(syntax.span),
                                    );
                                }
                                return self.add_interface(decl, Some(def), None);
                            }
                        }
                    }

                    // Port kind rules: a var keyword forces a variable;
                    // input and inout default to nets; output defaults to a
                    // net only for implicit types; ref is always a variable.
                    let direction = direction.unwrap_or(self.last_direction);
                    let implicit_ty = match ty.kind {
                        ast::DataTypeKind::Implicit { .. } => true,
                        _ => false,
                    };
                    let is_net = !var_keyword
                        && (direction == ast::Direction::In
                            || direction == ast::Direction::InOut
                            || (direction == ast::Direction::Out && implicit_ty));
                    self.add(decl, direction, ty, is_net, ast::NetKind::Wire)
                }
                ast::PortHeader::Net {
                    direction,
                    net_type,
                    ty,
                } => {
                    let direction = direction.unwrap_or(self.last_direction);
                    self.add(decl, direction, ty, true, *net_type)
                }
                ast::PortHeader::Interface { iface, modport } => {
                    let def = match cx.get_definition(iface.value) {
                        Some(def) => {
                            let is_iface = match &def.kind {
                                SymbolKind::Definition(d) => {
                                    d.kind == ast::DefinitionKind::Interface
                                }
                                _ => false,
                            };
                            if is_iface {
                                Some(def)
                            } else {
                                cx.emit(
                                    Diag::new(DiagCode::PortTypeNotInterfaceOrData)
                                        .arg(iface.value)
                                        .span(iface.span)
                                        .note(
                                            Diag::new(DiagCode::NoteDeclarationHere).span(def.span),
                                        ),
                                );
                                None
                            }
                        }
                        None => {
                            cx.emit(
                                Diag::new(DiagCode::UnknownInterface)
                                    .arg(iface.value)
                                    .span(iface.span),
                            );
                            None
                        }
                    };
                    let modport_sym = match (def, modport) {
                        (Some(def), Some(modport)) => {
                            get_modport_or_error(cx, def, *modport)
                        }
                        _ => None,
                    };
                    self.add_interface(decl, def, modport_sym)
                }
                ast::PortHeader::Interconnect => {
                    cx.emit(Diag::new(DiagCode::NotYetSupported).span(syntax.span));
                    self.add_inherited(decl)
                }
            },
            ast::AnsiPortKind::Explicit {
                direction,
                name,
                expr,
            } => {
                let declared = DeclaredType::with_flags(
                    DeclaredTypeFlags::INFER_IMPLICIT | DeclaredTypeFlags::LOOKUP_MAX,
                );
                if let Some(expr) = expr {
                    declared.set_initializer_syntax(expr, expr.span);
                }
                let direction = direction.unwrap_or(self.last_direction);
                let port = cx.alloc_symbol(Symbol::new(
                    name.value,
                    name.span,
                    SymbolKind::Port(PortSymbol {
                        declared,
                        direction,
                        internal: Cell::new(None),
                        connection: Cell::new(None),
                    }),
                ));
                port.set_parent(self.owner, crate::symbol::SymbolIndex::MAX);
                self.last_direction = direction;
                self.last_type = None;
                self.last_net = false;
                self.last_interface = None;
                Some((port, None))
            }
        }
    }

    fn names_a_type(&self, name: Spanned<Name>) -> bool {
        let scope = self.owner.scope().unwrap();
        match scope.lookup_unqualified(self.cx, name, LookupLocation::max()) {
            Some(found) => found.is_type() || matches!(found.kind, SymbolKind::TypeParameter(_)),
            None => false,
        }
    }

    fn add_inherited(
        &mut self,
        decl: &'a ast::Declarator,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        if let Some((iface, modport)) = self.last_interface {
            return self.add_interface(decl, Some(iface), modport);
        }
        let ty = self.last_type;
        let direction = self.last_direction;
        let is_net = self.last_net;
        let net_kind = self.last_net_kind;
        self.add_with(decl, direction, ty, is_net, net_kind)
    }

    fn add(
        &mut self,
        decl: &'a ast::Declarator,
        direction: ast::Direction,
        ty: &'a ast::DataType,
        is_net: bool,
        net_kind: ast::NetKind,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        self.add_with(decl, direction, Some(ty), is_net, net_kind)
    }

    fn add_with(
        &mut self,
        decl: &'a ast::Declarator,
        direction: ast::Direction,
        ty: Option<&'a ast::DataType>,
        is_net: bool,
        net_kind: ast::NetKind,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        let cx = self.cx;
        let declared = DeclaredType::new();
        if let Some(ty) = ty {
            declared.set_type_syntax(ty);
        }
        declared.set_from_declarator(decl);
        let port = cx.alloc_symbol(Symbol::new(
            decl.name.value,
            decl.name.span,
            SymbolKind::Port(PortSymbol {
                declared,
                direction,
                internal: Cell::new(None),
                connection: Cell::new(None),
            }),
        ));
        port.set_parent(self.owner, crate::symbol::SymbolIndex::MAX);

        if direction == ast::Direction::InOut && !is_net {
            cx.emit(
                Diag::new(DiagCode::InOutPortCannotBeVariable)
                    .arg(port.name)
                    .span(port.span),
            );
        } else if direction == ast::Direction::Ref && is_net {
            cx.emit(
                Diag::new(DiagCode::RefPortMustBeVariable)
                    .arg(port.name)
                    .span(port.span),
            );
        }

        // The internal symbol that body code references.
        let internal_declared = DeclaredType::new();
        if let Some(ty) = ty {
            internal_declared.set_type_syntax(ty);
        }
        internal_declared.set_dims_syntax(&decl.dims);
        let internal = cx.alloc_symbol(Symbol::new(
            decl.name.value,
            decl.name.span,
            if is_net {
                SymbolKind::Net(NetSymbol {
                    declared: internal_declared,
                    net_type: NetTypeBinding::Resolved(cx.net_type(net_kind)),
                })
            } else {
                SymbolKind::Variable(VariableSymbol {
                    declared: internal_declared,
                })
            },
        ));
        match &port.kind {
            SymbolKind::Port(p) => p.internal.set(Some(internal)),
            _ => unreachable!(),
        }

        self.last_direction = direction;
        self.last_type = ty;
        self.last_net = is_net;
        self.last_net_kind = net_kind;
        self.last_interface = None;
        Some((port, Some(internal)))
    }

    fn add_interface(
        &mut self,
        decl: &'a ast::Declarator,
        iface: Option<&'a Symbol<'a>>,
        modport: Option<&'a Symbol<'a>>,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        let cx = self.cx;
        let port = cx.alloc_symbol(Symbol::new(
            decl.name.value,
            decl.name.span,
            SymbolKind::InterfacePort(InterfacePortSymbol {
                iface_def: iface,
                modport,
                dims_syntax: &decl.dims,
                dims: RefCell::new(None),
                connection: Cell::new(None),
            }),
        ));
        self.last_direction = ast::Direction::InOut;
        self.last_type = None;
        self.last_net = false;
        self.last_interface = iface.map(|i| (i, modport));
        Some((port, None))
    }
}

fn get_modport_or_error<'a>(
    cx: &Compilation<'a>,
    def: &'a Symbol<'a>,
    modport: Spanned<Name>,
) -> Option<&'a Symbol<'a>> {
    let scope = def.scope()?;
    match scope.find(cx, modport.value) {
        Some(found) => match found.kind {
            SymbolKind::Modport(_) => Some(found),
            _ => {
                cx.emit(
                    Diag::new(DiagCode::NotAModport)
                        .arg(modport.value)
                        .span(modport.span)
                        .note(Diag::new(DiagCode::NoteDeclarationHere).span(found.span)),
                );
                None
            }
        },
        None => {
            cx.emit(
                Diag::new(DiagCode::UnknownMember)
                    .arg(modport.value)
                    .arg(def.name)
                    .span(modport.span),
            );
            None
        }
    }
}

struct NonAnsiPortInfo<'a> {
    decl: &'a ast::Declarator,
    direction: ast::Direction,
    internal: &'a Symbol<'a>,
    is_new: bool,
}

struct NonAnsiPortListBuilder<'cx, 'a> {
    cx: &'cx Compilation<'a>,
    owner: &'a Symbol<'a>,
    infos: Vec<(Name, NonAnsiPortInfo<'a>)>,
    handed_out: Vec<Name>,
}

impl<'cx, 'a> NonAnsiPortListBuilder<'cx, 'a> {
    fn new(cx: &'cx Compilation<'a>, owner: &'a Symbol<'a>) -> Self {
        let mut builder = NonAnsiPortListBuilder {
            cx,
            owner,
            infos: vec![],
            handed_out: vec![],
        };
        // First pass: index all port I/O declarations by name.
        let io_decls = match &owner.kind {
            SymbolKind::Definition(d) => d.port_io_decls.borrow().clone(),
            SymbolKind::ModuleInstance(i) | SymbolKind::InterfaceInstance(i) => {
                i.port_io_decls.borrow().clone()
            }
            _ => vec![],
        };
        for io in io_decls {
            for decl in &io.decls {
                if builder.infos.iter().any(|(n, _)| *n == decl.name.value) {
                    let prev = builder
                        .infos
                        .iter()
                        .find(|(n, _)| *n == decl.name.value)
                        .unwrap();
                    cx.emit(
                        Diag::new(DiagCode::Redefinition)
                            .arg(decl.name.value)
                            .span(decl.name.span)
                            .note(
                                Diag::new(DiagCode::NotePreviousDefinition)
                                    .span(prev.1.decl.name.span),
                            ),
                    );
                    continue;
                }
                if let Some(info) = builder.handle_io_decl(&io.header, decl) {
                    builder.infos.push((decl.name.value, info));
                }
            }
        }
        builder
    }

    fn handle_io_decl(
        &self,
        header: &'a ast::PortIoHeader,
        decl: &'a ast::Declarator,
    ) -> Option<NonAnsiPortInfo<'a>> {
        let cx = self.cx;
        let name = decl.name;
        match header {
            ast::PortIoHeader::Variable {
                direction,
                var_keyword,
                ty,
            } => {
                let (internal, is_new) = if *var_keyword || !matches!(ty.kind, ast::DataTypeKind::Implicit { .. })
                {
                    // A declared type makes this a full variable definition.
                    let declared = DeclaredType::new();
                    declared.set_type_syntax(ty);
                    declared.set_dims_syntax(&decl.dims);
                    let var = cx.alloc_symbol(Symbol::new(
                        name.value,
                        name.span,
                        SymbolKind::Variable(VariableSymbol { declared }),
                    ));
                    (var, true)
                } else if let Some(existing) = self.find_existing(name.value) {
                    // Port kind and type come from the matching body symbol.
                    self.merge_port_types(existing, ty, name.span);
                    (existing, false)
                } else {
                    // No symbol and no data type defaults to a basic net.
                    let declared = DeclaredType::new();
                    declared.set_type_syntax(ty);
                    declared.set_dims_syntax(&decl.dims);
                    let net = cx.alloc_symbol(Symbol::new(
                        name.value,
                        name.span,
                        SymbolKind::Net(NetSymbol {
                            declared,
                            net_type: NetTypeBinding::Resolved(cx.wire_net_type()),
                        }),
                    ));
                    (net, true)
                };

                let is_net = match internal.kind {
                    SymbolKind::Net(_) => true,
                    _ => false,
                };
                if *direction == ast::Direction::InOut && !is_net {
                    cx.emit(
                        Diag::new(DiagCode::InOutPortCannotBeVariable)
                            .arg(name.value)
                            .span(name.span),
                    );
                } else if *direction == ast::Direction::Ref && is_net {
                    cx.emit(
                        Diag::new(DiagCode::RefPortMustBeVariable)
                            .arg(name.value)
                            .span(name.span),
                    );
                }
                Some(NonAnsiPortInfo {
                    decl,
                    direction: *direction,
                    internal,
                    is_new,
                })
            }
            ast::PortIoHeader::Net {
                direction,
                net_type,
                ty,
            } => {
                if *direction == ast::Direction::Ref {
                    cx.emit(
                        Diag::new(DiagCode::RefPortMustBeVariable)
                            .arg(name.value)
                            .span(name.span),
                    );
                }
                let declared = DeclaredType::new();
                declared.set_type_syntax(ty);
                declared.set_dims_syntax(&decl.dims);
                let net = cx.alloc_symbol(Symbol::new(
                    name.value,
                    name.span,
                    SymbolKind::Net(NetSymbol {
                        declared,
                        net_type: NetTypeBinding::Resolved(cx.net_type(*net_type)),
                    }),
                ));
                Some(NonAnsiPortInfo {
                    decl,
                    direction: *direction,
                    internal: net,
                    is_new: true,
                })
            }
        }
    }

    fn find_existing(&self, name: Name) -> Option<&'a Symbol<'a>> {
        // The body members are already in place when the deferred port list
        // elaborates; consult them without re-entering elaboration.
        let scope = self.owner.scope().unwrap();
        for member in scope.members_raw() {
            if member.name == name {
                match member.kind {
                    SymbolKind::Variable(_) | SymbolKind::Net(_) => return Some(member),
                    _ => (),
                }
            }
        }
        None
    }

    /// The port declaration may retroactively force-sign the internal
    /// symbol's type. The types are still unresolved at this point, so the
    /// change is unobservable.
    fn merge_port_types(&self, symbol: &'a Symbol<'a>, implicit: &'a ast::DataType, span: Span) {
        let cx = self.cx;
        let signed = match &implicit.kind {
            ast::DataTypeKind::Implicit { signed, .. } => *signed,
            _ => false,
        };
        if !signed {
            return;
        }
        let declared = match symbol.declared_type() {
            Some(d) => d,
            None => return,
        };
        let ty = declared.ty(cx, symbol);
        let mut core = ty;
        while let Some(elem) = core.element_type(cx) {
            if !core.is_unpacked_array(cx) {
                break;
            }
            core = elem;
        }
        if !core.is_integral(cx) {
            cx.emit(
                Diag::new(DiagCode::CantDeclarePortSigned)
                    .arg(symbol.name)
                    .arg(core.display(cx))
                    .span(span),
            );
        } else if !core.is_signed(cx) {
            declared.set_force_signed();
        }
    }

    fn create_port(
        &mut self,
        syntax: &'a ast::NonAnsiPort,
    ) -> Option<(&'a Symbol<'a>, Option<&'a Symbol<'a>>)> {
        let cx = self.cx;
        let port_ref = match &syntax.expr {
            // An unnamed empty port is allowed.
            None => {
                let port = cx.alloc_symbol(Symbol::new(
                    empty_name(),
                    syntax.span,
                    SymbolKind::Port(PortSymbol {
                        declared: DeclaredType::new(),
                        direction: ast::Direction::InOut,
                        internal: Cell::new(None),
                        connection: Cell::new(None),
                    }),
                ));
                port.set_parent(self.owner, crate::symbol::SymbolIndex::MAX);
                return Some((port, None));
            }
            Some(r) => r,
        };
        let name = match port_ref {
            ast::PortRef::Named(name) => *name,
            ast::PortRef::Concat(span) => {
                cx.emit(Diag::new(DiagCode::NotYetSupported).span(*span));
                return None;
            }
        };

        let (direction, internal_sym, is_new) =
            match self.infos.iter().find(|(n, _)| *n == name.value) {
                Some((_, info)) => (info.direction, info.internal, info.is_new),
                None => {
                    cx.emit(
                        Diag::new(DiagCode::MissingPortIODeclaration)
                            .arg(name.value)
                            .span(name.span),
                    );
                    return None;
                }
            };

        let declared = DeclaredType::new();
        declared.copy_type_from(internal_sym.declared_type().unwrap());
        let port = cx.alloc_symbol(Symbol::new(
            name.value,
            name.span,
            SymbolKind::Port(PortSymbol {
                declared,
                direction,
                internal: Cell::new(Some(internal_sym)),
                connection: Cell::new(None),
            }),
        ));
        port.set_parent(self.owner, crate::symbol::SymbolIndex::MAX);

        // Newly synthesized internal symbols become members; reused ones are
        // already in the scope. Hand each out at most once.
        let internal = if is_new && !self.handed_out.contains(&name.value) {
            self.handed_out.push(name.value);
            Some(internal_sym)
        } else {
            None
        };
        Some((port, internal))
    }
}

/// Resolve the connection for every port of an instance against the
/// connection syntax of the instantiation site.
fn connect_ports<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    ports: &[&'a Symbol<'a>],
    connections: &'a [ast::PortConnection],
) {
    // Sort the connections into ordered and named forms; they cannot be
    // mixed.
    let mut ordered: Vec<(&'a Option<ast::Expr>, Span)> = vec![];
    let mut named: Vec<(Spanned<Name>, bool, Option<&'a ast::Expr>, Cell<bool>)> = vec![];
    let mut has_connections = false;
    let mut using_ordered = true;
    let mut wildcard: Option<Span> = None;
    for conn in connections {
        let is_ordered = match conn {
            ast::PortConnection::Ordered(..) => true,
            _ => false,
        };
        if !has_connections {
            has_connections = true;
            using_ordered = is_ordered;
        } else if is_ordered != using_ordered {
            let span = match conn {
                ast::PortConnection::Ordered(_, span) => *span,
                ast::PortConnection::Named { span, .. } => *span,
                ast::PortConnection::Wildcard(span) => *span,
            };
            cx.emit(Diag::new(DiagCode::MixingOrderedAndNamedPorts).span(span));
            break;
        }
        match conn {
            ast::PortConnection::Ordered(expr, span) => ordered.push((expr, *span)),
            ast::PortConnection::Wildcard(span) => {
                if let Some(prev) = wildcard {
                    cx.emit(
                        Diag::new(DiagCode::DuplicateWildcardPortConnection)
                            .span(*span)
                            .note(Diag::new(DiagCode::NotePreviousUsage).span(prev)),
                    );
                } else {
                    wildcard = Some(*span);
                }
            }
            ast::PortConnection::Named {
                name, expr, span, ..
            } => {
                if let Some((prev, ..)) = named.iter().find(|(n, ..)| n.value == name.value) {
                    cx.emit(
                        Diag::new(DiagCode::DuplicatePortConnection)
                            .arg(name.value)
                            .span(*span)
                            .note(Diag::new(DiagCode::NotePreviousUsage).span(prev.span)),
                    );
                    continue;
                }
                let parens = match conn {
                    ast::PortConnection::Named { parens, .. } => *parens,
                    _ => false,
                };
                named.push((*name, parens, expr.as_ref(), Cell::new(false)));
            }
        }
    }

    // Connections bind in the scope the instance was created in, at the
    // instance's own position.
    let parent_scope = match instance.parent_scope() {
        Some(s) => s,
        None => return,
    };
    let location = LookupLocation::before(instance);
    let bind_ctx = BindContext {
        scope: parent_scope,
        location,
        flags: BindFlags::empty(),
    };

    // The dimensions of the enclosing instance arrays, outermost first, used
    // to slice connected interface arrays.
    let mut instance_dims: Vec<ConstantRange> = vec![];
    {
        let mut parent = instance.parent();
        while let Some(p) = parent {
            match &p.kind {
                SymbolKind::InstanceArray(a) => {
                    instance_dims.push(a.range);
                    parent = p.parent();
                }
                _ => break,
            }
        }
        instance_dims.reverse();
    }

    let mut ordered_index = 0;
    let mut warned_unnamed = false;
    for &port in ports {
        match &port.kind {
            SymbolKind::Port(p) => {
                connect_value_port(
                    cx,
                    instance,
                    port,
                    p,
                    &bind_ctx,
                    using_ordered,
                    &ordered,
                    &mut ordered_index,
                    &named,
                    wildcard,
                    &mut warned_unnamed,
                );
            }
            SymbolKind::InterfacePort(p) => {
                connect_interface_port(
                    cx,
                    instance,
                    port,
                    p,
                    parent_scope,
                    location,
                    using_ordered,
                    &ordered,
                    &mut ordered_index,
                    &named,
                    wildcard,
                    &instance_dims,
                );
            }
            _ => (),
        }
    }

    if using_ordered {
        if ordered_index < ordered.len() {
            cx.emit(
                Diag::new(DiagCode::TooManyPortConnections)
                    .arg(instance.name)
                    .arg(ports.len())
                    .arg(ordered.len())
                    .span(ordered[ordered_index].1),
            );
        }
    } else {
        for (name, _, _, used) in &named {
            if !used.get() {
                cx.emit(
                    Diag::new(DiagCode::PortDoesNotExist)
                        .arg(name.value)
                        .arg(instance.name)
                        .span(name.span),
                );
            }
        }
    }
}

fn port_default<'a>(
    cx: &Compilation<'a>,
    port: &'a Symbol<'a>,
    p: &PortSymbol<'a>,
) -> Option<&'a expr::Expression<'a>> {
    if p.declared.init_syntax().is_some() {
        p.declared.initializer(cx, port)
    } else {
        None
    }
}

fn connect_value_port<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    port: &'a Symbol<'a>,
    p: &PortSymbol<'a>,
    bind_ctx: &BindContext<'a>,
    using_ordered: bool,
    ordered: &[(&'a Option<ast::Expr>, Span)],
    ordered_index: &mut usize,
    named: &[(Spanned<Name>, bool, Option<&'a ast::Expr>, Cell<bool>)],
    wildcard: Option<Span>,
    warned_unnamed: &mut bool,
) {
    let port_ty = p.declared.ty(cx, port);
    if using_ordered {
        if *ordered_index >= ordered.len() {
            *ordered_index += 1;
            if let Some(default) = port_default(cx, port, p) {
                p.connection.set(Some(default));
            } else if port.name.is_empty() {
                if !*warned_unnamed {
                    cx.emit(
                        Diag::new(DiagCode::UnconnectedUnnamedPort)
                            .span(instance.span)
                            .note(Diag::new(DiagCode::NoteDeclarationHere).span(port.span)),
                    );
                    *warned_unnamed = true;
                }
            } else {
                cx.emit(
                    Diag::new(DiagCode::UnconnectedNamedPort)
                        .arg(port.name)
                        .span(instance.span),
                );
            }
            return;
        }
        let expr_syntax = ordered[*ordered_index].0.as_ref();
        *ordered_index += 1;
        match expr_syntax {
            Some(e) => {
                let bound = expr::bind_with_target(cx, bind_ctx, e, port_ty, e.span);
                p.connection.set(Some(bound));
            }
            None => {
                if let Some(default) = port_default(cx, port, p) {
                    p.connection.set(Some(default));
                }
            }
        }
        return;
    }

    if port.name.is_empty() {
        // An unnamed port can never be connected by name.
        if !*warned_unnamed {
            cx.emit(
                Diag::new(DiagCode::UnconnectedUnnamedPort)
                    .span(instance.span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(port.span)),
            );
            *warned_unnamed = true;
        }
        return;
    }

    let entry = named.iter().find(|(n, ..)| n.value == port.name);
    let (name, parens, expr_syntax) = match entry {
        Some((name, parens, expr_syntax, used)) => {
            used.set(true);
            (*name, *parens, *expr_syntax)
        }
        None => {
            if let Some(wildcard_span) = wildcard {
                implicit_named_port(cx, port, p, port_ty, bind_ctx, wildcard_span, true);
                return;
            }
            if let Some(default) = port_default(cx, port, p) {
                p.connection.set(Some(default));
            } else {
                cx.emit(
                    Diag::new(DiagCode::UnconnectedNamedPort)
                        .arg(port.name)
                        .span(instance.span),
                );
            }
            return;
        }
    };

    if parens {
        // An explicit connection with an empty expression means no
        // connection; the default never applies here.
        if let Some(e) = expr_syntax {
            let bound = expr::bind_with_target(cx, bind_ctx, e, port_ty, e.span);
            p.connection.set(Some(bound));
        }
        return;
    }

    implicit_named_port(cx, port, p, port_ty, bind_ctx, name.span, false);
}

/// An implicit named connection resolves the port's own name at the
/// instantiation site; the value must be *equivalent* to the port type,
/// which is stricter than assignment compatibility.
fn implicit_named_port<'a>(
    cx: &Compilation<'a>,
    port: &'a Symbol<'a>,
    p: &PortSymbol<'a>,
    port_ty: crate::ty::Type<'a>,
    bind_ctx: &BindContext<'a>,
    span: Span,
    is_wildcard: bool,
) {
    let name = Spanned::new(port.name, span);
    let symbol = match bind_ctx.scope.lookup_unqualified(cx, name, bind_ctx.location) {
        Some(s) => Some(s),
        None => None,
    };
    let symbol = match symbol {
        Some(s) => s,
        None => {
            // A wildcard connection may fall back to the port's default.
            if is_wildcard {
                if let Some(default) = port_default(cx, port, p) {
                    p.connection.set(Some(default));
                    return;
                }
            }
            cx.emit(
                Diag::new(DiagCode::ImplicitNamedPortNotFound)
                    .arg(port.name)
                    .span(span),
            );
            return;
        }
    };
    if port_ty.is_error() {
        return;
    }

    let bound = expr::bind_named_symbol(cx, bind_ctx, symbol, span);
    if bound.bad() {
        return;
    }
    if !bound.ty.equivalent(cx, port_ty) {
        cx.emit(
            Diag::new(DiagCode::ImplicitNamedPortTypeMismatch)
                .arg(port.name)
                .arg(port_ty.display(cx))
                .arg(bound.ty.display(cx))
                .span(span),
        );
        return;
    }
    let converted = expr::convert_assignment(cx, port_ty, bound, span);
    p.connection.set(Some(converted));
}

fn connect_interface_port<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    port: &'a Symbol<'a>,
    p: &InterfacePortSymbol<'a>,
    parent_scope: &'a crate::scope::Scope<'a>,
    location: LookupLocation<'a>,
    using_ordered: bool,
    ordered: &[(&'a Option<ast::Expr>, Span)],
    ordered_index: &mut usize,
    named: &[(Spanned<Name>, bool, Option<&'a ast::Expr>, Cell<bool>)],
    wildcard: Option<Span>,
    instance_dims: &[ConstantRange],
) {
    let report_unconnected = |cx: &Compilation<'a>| {
        cx.emit(
            Diag::new(DiagCode::InterfacePortNotConnected)
                .arg(port.name)
                .span(instance.span)
                .note(Diag::new(DiagCode::NoteDeclarationHere).span(port.span)),
        );
    };

    if using_ordered {
        let expr_syntax = if *ordered_index < ordered.len() {
            ordered[*ordered_index].0.as_ref()
        } else {
            None
        };
        *ordered_index += 1;
        match expr_syntax {
            Some(e) => set_interface_expr(cx, instance, port, p, parent_scope, location, e, instance_dims),
            None => report_unconnected(cx),
        }
        return;
    }

    let entry = named.iter().find(|(n, ..)| n.value == port.name);
    let (name, parens, expr_syntax) = match entry {
        Some((name, parens, expr_syntax, used)) => {
            used.set(true);
            (*name, *parens, *expr_syntax)
        }
        None => {
            if let Some(span) = wildcard {
                set_implicit_interface(cx, instance, port, p, parent_scope, location, span, instance_dims);
            } else {
                report_unconnected(cx);
            }
            return;
        }
    };

    if parens {
        match expr_syntax {
            Some(e) => set_interface_expr(cx, instance, port, p, parent_scope, location, e, instance_dims),
            None => report_unconnected(cx),
        }
        return;
    }

    set_implicit_interface(cx, instance, port, p, parent_scope, location, name.span, instance_dims);
}

fn set_interface_expr<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    port: &'a Symbol<'a>,
    p: &InterfacePortSymbol<'a>,
    parent_scope: &'a crate::scope::Scope<'a>,
    location: LookupLocation<'a>,
    syntax: &'a ast::Expr,
    instance_dims: &[ConstantRange],
) {
    // The connection must be a named interface.
    let lookup = match &syntax.kind {
        ast::ExprKind::Ident(name) => {
            match parent_scope.lookup_unqualified(cx, *name, location) {
                Some(s) => Some(s),
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UndeclaredIdentifier)
                            .arg(name.value)
                            .span(name.span),
                    );
                    None
                }
            }
        }
        ast::ExprKind::Scoped { package, segs } => parent_scope
            .resolve_path(cx, location, *package, segs, parent_scope)
            .map(|l| l.symbol),
        _ => {
            cx.emit(
                Diag::new(DiagCode::InterfacePortInvalidExpression)
                    .arg(port.name)
                    .span(syntax.span),
            );
            None
        }
    };
    if let Some(symbol) = lookup {
        set_interface(cx, instance, port, p, symbol, syntax.span, instance_dims);
    }
}

fn set_implicit_interface<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    port: &'a Symbol<'a>,
    p: &InterfacePortSymbol<'a>,
    parent_scope: &'a crate::scope::Scope<'a>,
    location: LookupLocation<'a>,
    span: Span,
    instance_dims: &[ConstantRange],
) {
    let name = Spanned::new(port.name, span);
    match parent_scope.lookup_unqualified(cx, name, location) {
        Some(symbol) => set_interface(cx, instance, port, p, symbol, span, instance_dims),
        None => {
            cx.emit(
                Diag::new(DiagCode::ImplicitNamedPortNotFound)
                    .arg(port.name)
                    .span(span),
            );
        }
    }
}

fn dim_sizes_equal(left: &[ConstantRange], right: &[ConstantRange]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right.iter())
            .all(|(a, b)| a.width() == b.width())
}

fn set_interface<'a>(
    cx: &Compilation<'a>,
    instance: &'a Symbol<'a>,
    port: &'a Symbol<'a>,
    p: &InterfacePortSymbol<'a>,
    mut symbol: &'a Symbol<'a>,
    span: Span,
    instance_dims: &[ConstantRange],
) {
    let iface_def = match p.iface_def {
        Some(d) => d,
        None => return,
    };

    // Another interface port unwraps to its own connection.
    if let SymbolKind::InterfacePort(other) = &symbol.kind {
        symbol = match other.connection.get() {
            Some(c) => c,
            None => return,
        };
    }

    // The connected thing must be an interface instance or an array of them.
    let mut dims = vec![];
    let mut child = symbol;
    loop {
        match &child.kind {
            SymbolKind::InstanceArray(array) => {
                let elements = array.elements.borrow();
                if elements.is_empty() {
                    return;
                }
                dims.push(array.range);
                let first = elements[0];
                drop(elements);
                child = first;
            }
            _ => break,
        }
    }
    let conn_def = match &child.kind {
        SymbolKind::InterfaceInstance(i) => i.definition,
        _ => {
            cx.emit(
                Diag::new(DiagCode::NotAnInterface)
                    .arg(symbol.name)
                    .span(span),
            );
            return;
        }
    };
    if !std::ptr::eq(conn_def, iface_def) {
        cx.emit(
            Diag::new(DiagCode::InterfacePortTypeMismatch)
                .arg(conn_def.name)
                .arg(iface_def.name)
                .span(span)
                .note(Diag::new(DiagCode::NoteDeclarationHere).span(port.span)),
        );
        return;
    }

    // The declared array dimensions of the port itself.
    let port_dims = interface_port_dims(cx, port, p);

    // Matching dimensions connect directly.
    if dim_sizes_equal(&port_dims, &dims) {
        p.connection.set(Some(symbol));
        return;
    }

    // Otherwise the connected array may be sliced across an enclosing
    // instance array: instance array dimensions plus port dimensions must
    // equal the connection dimensions.
    let inst_data = match &instance.kind {
        SymbolKind::ModuleInstance(i) | SymbolKind::InterfaceInstance(i) => i,
        _ => return,
    };
    if dims.len() >= instance_dims.len()
        && dim_sizes_equal(&dims[..instance_dims.len()], instance_dims)
        && dim_sizes_equal(&dims[instance_dims.len()..], &port_dims)
    {
        // Pick the slice matching this instance's position in the enclosing
        // arrays.
        let mut current = symbol;
        for (i, &path_index) in inst_data.array_path.iter().enumerate() {
            if i >= instance_dims.len() {
                break;
            }
            let array = match &current.kind {
                SymbolKind::InstanceArray(a) => a,
                _ => return,
            };
            let pos = instance_dims[i].translate_index(path_index) as usize;
            let elements = array.elements.borrow();
            if pos >= elements.len() {
                return;
            }
            current = elements[pos];
        }
        p.connection.set(Some(current));
        return;
    }

    cx.emit(
        Diag::new(DiagCode::PortConnDimensionsMismatch)
            .span(span)
            .note(Diag::new(DiagCode::NoteDeclarationHere).span(port.span)),
    );
}

/// Evaluate and memoize the declared array dimensions of an interface port.
fn interface_port_dims<'a>(
    cx: &Compilation<'a>,
    port: &'a Symbol<'a>,
    p: &InterfacePortSymbol<'a>,
) -> Vec<ConstantRange> {
    if let Some(dims) = p.dims.borrow().as_ref() {
        return dims.clone();
    }
    let scope = port
        .parent_scope()
        .expect("interface port without a parent");
    let mut result = vec![];
    for dim in p.dims_syntax {
        match ty::eval_unpacked_dim(cx, dim, LookupLocation::max(), scope) {
            Some(r) => result.push(r),
            None => break,
        }
    }
    *p.dims.borrow_mut() = Some(result.clone());
    result
}
