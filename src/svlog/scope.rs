// Copyright (c) 2016-2020 Fabian Schuiki

//! Scopes and name lookup.
//!
//! A scope owns an ordered list of member symbols and a name index. Members
//! are added in declaration order and receive a monotonically increasing
//! [`SymbolIndex`], which [`LookupLocation`] uses to decide visibility for
//! "declared before use" checks.
//!
//! Members whose construction requires the enclosing scope to be complete
//! (hierarchy instantiations, generate constructs, port lists) are added as
//! *deferred members*. The first lookup of any name in the scope forces all
//! pending deferred members in declaration order, so that subsequent lookups
//! are deterministic.

use crate::ast;
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::symbol::{same_symbol, Symbol, SymbolIndex, SymbolKind};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// A (scope, index) pair used to enforce "declared before use" during name
/// lookup. A member is visible at a location if it was declared before it.
#[derive(Clone, Copy)]
pub struct LookupLocation<'a> {
    pub scope: Option<&'a Scope<'a>>,
    pub index: SymbolIndex,
}

impl<'a> LookupLocation<'a> {
    /// A location after all declarations.
    pub fn max() -> LookupLocation<'a> {
        LookupLocation {
            scope: None,
            index: SymbolIndex::MAX,
        }
    }

    /// A location before any declaration.
    pub fn min() -> LookupLocation<'a> {
        LookupLocation {
            scope: None,
            index: SymbolIndex::MIN,
        }
    }

    /// The location just before a symbol.
    pub fn before(symbol: &'a Symbol<'a>) -> LookupLocation<'a> {
        LookupLocation {
            scope: symbol.parent_scope(),
            index: symbol.index(),
        }
    }

    /// The location just after a symbol.
    pub fn after(symbol: &'a Symbol<'a>) -> LookupLocation<'a> {
        LookupLocation {
            scope: symbol.parent_scope(),
            index: SymbolIndex(symbol.index().0.saturating_add(1)),
        }
    }
}

/// A member whose construction is postponed until the first lookup in the
/// enclosing scope.
pub enum DeferredMember<'a> {
    /// A hierarchy instantiation.
    Instantiation(&'a ast::Instantiation),
    /// An `if` generate construct.
    GenerateIf(&'a ast::GenerateIf),
    /// A `case` generate construct.
    GenerateCase(&'a ast::GenerateCase),
    /// A loop generate construct.
    GenerateFor(&'a ast::GenerateFor),
    /// The port list of an instance, together with the connection syntax of
    /// the instantiation site.
    Ports {
        list: &'a ast::PortList,
        connections: Option<&'a [ast::PortConnection]>,
    },
    /// The signals exposed by a modport.
    Modport(&'a ast::ModportItem),
    /// The enumerands of a member whose declared type may be an enum; these
    /// become visible in the enclosing scope as transparent members.
    EnumValues(&'a Symbol<'a>),
    /// A typedef whose forward declarations are checked against the final
    /// target type. Produces no members.
    ForwardCheck(&'a Symbol<'a>),
}

pub(crate) struct Deferred<'a> {
    pub kind: DeferredMember<'a>,
    /// Position within the member list at which products are spliced in.
    pub pos: usize,
    /// The reserved symbol index of the placeholder.
    pub index: SymbolIndex,
}

/// The result of resolving a possibly qualified name.
pub struct PathLookup<'a> {
    /// The symbol the resolved prefix of the path refers to.
    pub symbol: &'a Symbol<'a>,
    /// The number of path segments consumed. Remaining segments denote
    /// member accesses on a value.
    pub consumed: usize,
    /// Whether the path descended through the design hierarchy.
    pub hierarchical: bool,
}

/// A scope that owns an ordered collection of members.
pub struct Scope<'a> {
    owner: Cell<Option<&'a Symbol<'a>>>,
    members: RefCell<Vec<&'a Symbol<'a>>>,
    name_map: RefCell<HashMap<Name, &'a Symbol<'a>>>,
    wildcard_imports: RefCell<Vec<&'a Symbol<'a>>>,
    import_cache: RefCell<HashMap<Name, &'a Symbol<'a>>>,
    deferred: RefCell<Vec<Deferred<'a>>>,
    next_index: Cell<u32>,
    elaborated: Cell<bool>,
    elaborating: Cell<bool>,
}

impl<'a> Scope<'a> {
    /// Create a new, empty scope.
    pub fn new() -> Scope<'a> {
        Scope {
            owner: Cell::new(None),
            members: RefCell::new(Vec::new()),
            name_map: RefCell::new(HashMap::new()),
            wildcard_imports: RefCell::new(Vec::new()),
            import_cache: RefCell::new(HashMap::new()),
            deferred: RefCell::new(Vec::new()),
            next_index: Cell::new(0),
            elaborated: Cell::new(false),
            elaborating: Cell::new(false),
        }
    }

    /// The symbol this scope is embedded in.
    pub fn owner(&self) -> &'a Symbol<'a> {
        self.owner.get().expect("scope owner not yet installed")
    }

    pub(crate) fn set_owner(&self, owner: &'a Symbol<'a>) {
        self.owner.set(Some(owner));
    }

    /// The scope that contains this scope's owner.
    pub fn parent(&self) -> Option<&'a Scope<'a>> {
        self.owner().parent_scope()
    }

    /// Add a member to this scope, assigning it the next symbol index.
    pub fn add_member(&self, member: &'a Symbol<'a>) {
        let index = SymbolIndex(self.next_index.get() + 1);
        self.next_index.set(index.0);
        member.set_parent(self.owner(), index);
        self.members.borrow_mut().push(member);
        self.index_member(member);
    }

    fn index_member(&self, member: &'a Symbol<'a>) {
        if let SymbolKind::WildcardImport(_) = member.kind {
            self.wildcard_imports.borrow_mut().push(member);
            return;
        }
        if !member.name.is_empty() {
            self.name_map.borrow_mut().entry(member.name).or_insert(member);
        }
    }

    /// Add a deferred member awaiting late construction.
    pub fn add_deferred(&self, kind: DeferredMember<'a>) {
        let index = SymbolIndex(self.next_index.get() + 1);
        self.next_index.set(index.0);
        self.deferred.borrow_mut().push(Deferred {
            kind,
            pos: self.members.borrow().len(),
            index,
        });
    }

    /// Whether any deferred members are pending.
    pub fn has_deferred(&self) -> bool {
        !self.deferred.borrow().is_empty()
    }

    /// The members of this scope, in declaration order. Forces elaboration of
    /// deferred members.
    pub fn members(&'a self, cx: &Compilation<'a>) -> Vec<&'a Symbol<'a>> {
        self.elaborate(cx);
        self.members.borrow().clone()
    }

    /// The members of this scope as currently constructed, without forcing
    /// elaboration.
    pub fn members_raw(&self) -> Vec<&'a Symbol<'a>> {
        self.members.borrow().clone()
    }

    /// Force construction of all pending deferred members, in declaration
    /// order.
    pub fn elaborate(&'a self, cx: &Compilation<'a>) {
        if self.elaborated.get() || self.elaborating.get() {
            return;
        }
        if self.deferred.borrow().is_empty() {
            self.elaborated.set(true);
            return;
        }
        self.elaborating.set(true);
        let deferred = self.deferred.replace(Vec::new());
        let owner = self.owner();
        let mut products: Vec<(usize, Vec<&'a Symbol<'a>>)> = Vec::new();
        for entry in &deferred {
            let location = LookupLocation {
                scope: Some(self),
                index: entry.index,
            };
            let syms = crate::hierarchy::elaborate_deferred(cx, owner, &entry.kind, location);
            products.push((entry.pos, syms));
        }

        // Splice the products into the member list at their recorded
        // positions and renumber all indices, preserving declaration order.
        let old = self.members.replace(Vec::new());
        let mut new_members = Vec::new();
        let mut products = products.into_iter().peekable();
        for (i, &m) in old.iter().enumerate() {
            while products.peek().map(|&(pos, _)| pos <= i).unwrap_or(false) {
                new_members.extend(products.next().unwrap().1);
            }
            new_members.push(m);
        }
        for (_, syms) in products {
            new_members.extend(syms);
        }
        self.name_map.borrow_mut().clear();
        self.wildcard_imports.borrow_mut().clear();
        self.import_cache.borrow_mut().clear();
        for (i, &m) in new_members.iter().enumerate() {
            m.set_parent(owner, SymbolIndex(i as u32 + 1));
            self.index_member(m);
        }
        self.next_index.set(new_members.len() as u32);
        *self.members.borrow_mut() = new_members;
        self.elaborating.set(false);
        self.elaborated.set(true);
    }

    /// Find a member by name. Returns the earliest member of that name and
    /// unwraps transparent members and explicit imports.
    pub fn find(&'a self, cx: &Compilation<'a>, name: Name) -> Option<&'a Symbol<'a>> {
        self.elaborate(cx);
        let found = self.name_map.borrow().get(&name).copied()?;
        unwrap_member(cx, found)
    }

    /// Find a member by name without unwrapping.
    pub fn find_raw(&'a self, cx: &Compilation<'a>, name: Name) -> Option<&'a Symbol<'a>> {
        self.elaborate(cx);
        self.name_map.borrow().get(&name).copied()
    }

    /// Whether this scope enforces "declared before use".
    fn enforces_declaration_order(&self) -> bool {
        match self.owner().kind {
            SymbolKind::CompilationUnit(_) | SymbolKind::Subroutine(_) => true,
            _ => false,
        }
    }

    /// Look up an unqualified name visible at the given location.
    ///
    /// Searches this scope, then its wildcard imports, then the parent
    /// scopes. Returns `None` without a diagnostic if nothing is found; the
    /// caller reports the undeclared identifier.
    pub fn lookup_unqualified(
        &'a self,
        cx: &Compilation<'a>,
        name: Spanned<Name>,
        location: LookupLocation<'a>,
    ) -> Option<&'a Symbol<'a>> {
        let mut scope = self;
        let mut location = location;
        let mut used_before_decl: Option<&'a Symbol<'a>> = None;
        loop {
            scope.elaborate(cx);
            if let Some(found) = scope.name_map.borrow().get(&name.value).copied() {
                let in_location_scope = location
                    .scope
                    .map(|s| std::ptr::eq(s, scope))
                    .unwrap_or(false);
                let visible = !in_location_scope || found.index() < location.index;
                if visible || !scope.enforces_declaration_order() {
                    return unwrap_member(cx, found);
                }
                if used_before_decl.is_none() {
                    used_before_decl = Some(found);
                }
            }

            // Scan the wildcard imports of this scope for a matching export.
            if let Some(found) = scope.lookup_in_imports(cx, name, location) {
                return Some(found);
            }

            let owner = scope.owner();
            match owner.parent_scope() {
                Some(parent) => {
                    location = LookupLocation::after(owner);
                    scope = parent;
                }
                None => break,
            }
        }
        if let Some(found) = used_before_decl {
            cx.emit(
                Diag::new(DiagCode::UsedBeforeDeclared)
                    .arg(name.value)
                    .span(name.span)
                    .note(Diag::new(DiagCode::NoteDeclarationHere).span(found.span)),
            );
            return unwrap_member(cx, found);
        }
        None
    }

    fn lookup_in_imports(
        &self,
        cx: &Compilation<'a>,
        name: Spanned<Name>,
        location: LookupLocation<'a>,
    ) -> Option<&'a Symbol<'a>> {
        if self.wildcard_imports.borrow().is_empty() {
            return None;
        }
        if let Some(&cached) = self.import_cache.borrow().get(&name.value) {
            return Some(cached);
        }
        let in_location_scope = location
            .scope
            .map(|s| std::ptr::eq(s, self))
            .unwrap_or(false);
        let mut candidates: Vec<(&'a Symbol<'a>, &'a Symbol<'a>)> = vec![];
        for &import in self.wildcard_imports.borrow().iter() {
            if in_location_scope && !(import.index() < location.index) {
                continue;
            }
            let pkg_name = match &import.kind {
                SymbolKind::WildcardImport(x) => x.package,
                _ => continue,
            };
            let package = match cx.get_package(pkg_name.value) {
                Some(p) => p,
                None => continue,
            };
            let pkg_scope = package.scope().unwrap();
            if let Some(found) = pkg_scope.find(cx, name.value) {
                if !candidates.iter().any(|&(_, c)| same_symbol(c, found)) {
                    candidates.push((import, found));
                }
            }
        }
        match candidates.len() {
            0 => None,
            1 => {
                let found = candidates[0].1;
                self.import_cache.borrow_mut().insert(name.value, found);
                Some(found)
            }
            _ => {
                let mut diag = Diag::new(DiagCode::AmbiguousWildcardImport)
                    .arg(name.value)
                    .span(name.span);
                for (import, _) in &candidates {
                    diag = diag.note(Diag::new(DiagCode::NoteDeclarationHere).span(import.span));
                }
                cx.emit(diag);
                Some(candidates[0].1)
            }
        }
    }

    /// Resolve a possibly qualified name path.
    ///
    /// The head is resolved as a package name (for `pkg::x` paths) or an
    /// unqualified identifier; the remaining segments descend through
    /// scopes, selecting into instance and generate arrays where element
    /// selects are present. Resolution stops early when it reaches a value
    /// symbol; the caller binds the remaining segments as member accesses.
    pub fn resolve_path(
        &'a self,
        cx: &Compilation<'a>,
        location: LookupLocation<'a>,
        package: bool,
        segs: &'a [ast::NameSeg],
        ctx_scope: &'a Scope<'a>,
    ) -> Option<PathLookup<'a>> {
        assert!(!segs.is_empty());
        let head = &segs[0];
        let mut current: &'a Symbol<'a> = if package {
            match cx.get_package(head.name.value) {
                Some(p) => p,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UnknownPackage)
                            .arg(head.name.value)
                            .span(head.name.span),
                    );
                    return None;
                }
            }
        } else {
            match self.lookup_unqualified(cx, head.name, location) {
                Some(s) => s,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UndeclaredIdentifier)
                            .arg(head.name.value)
                            .span(head.name.span),
                    );
                    return None;
                }
            }
        };
        let mut hierarchical = package;
        current = select_child(cx, current, &head.selects, ctx_scope, head.name.span)?;

        let mut consumed = 1;
        for seg in &segs[1..] {
            // Unwrap interface ports to the connected instance.
            if let SymbolKind::InterfacePort(port) = &current.kind {
                match port.connection.get() {
                    Some(conn) => current = conn,
                    None => return None,
                }
            }
            if current.is_value() {
                break;
            }
            if current.is_instance() {
                hierarchical = true;
            }
            let scope = match current.scope() {
                Some(s) => s,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::NotAHierarchicalScope)
                            .arg(seg.name.value)
                            .arg(current.name)
                            .span(seg.name.span),
                    );
                    return None;
                }
            };
            current = match scope.find(cx, seg.name.value) {
                Some(s) => s,
                None => {
                    cx.emit(
                        Diag::new(DiagCode::UnknownMember)
                            .arg(seg.name.value)
                            .arg(current.name)
                            .span(seg.name.span),
                    );
                    return None;
                }
            };
            current = select_child(cx, current, &seg.selects, ctx_scope, seg.name.span)?;
            consumed += 1;
        }
        Some(PathLookup {
            symbol: current,
            consumed,
            hierarchical,
        })
    }
}

/// Unwrap transparent members, explicit imports, and forward typedefs to the
/// symbol they stand for.
fn unwrap_member<'a>(cx: &Compilation<'a>, mut sym: &'a Symbol<'a>) -> Option<&'a Symbol<'a>> {
    loop {
        match &sym.kind {
            SymbolKind::TransparentMember(inner) => sym = inner,
            SymbolKind::ExplicitImport(import) => {
                if !import.resolve_done.get() {
                    import.resolve_done.set(true);
                    let resolved = match cx.get_package(import.package.value) {
                        Some(pkg) => pkg.scope().unwrap().find(cx, import.item.value),
                        None => {
                            cx.emit(
                                Diag::new(DiagCode::UnknownPackage)
                                    .arg(import.package.value)
                                    .span(import.package.span),
                            );
                            None
                        }
                    };
                    if resolved.is_none() && cx.get_package(import.package.value).is_some() {
                        cx.emit(
                            Diag::new(DiagCode::UnknownMember)
                                .arg(import.item.value)
                                .arg(import.package.value)
                                .span(import.item.span),
                        );
                    }
                    import.resolved.set(resolved);
                }
                return import.resolved.get();
            }
            _ => return Some(sym),
        }
    }
}

/// Select into an array symbol with a list of element selects.
pub fn select_child<'a>(
    cx: &Compilation<'a>,
    mut symbol: &'a Symbol<'a>,
    selects: &'a [ast::Expr],
    ctx_scope: &'a Scope<'a>,
    span: Span,
) -> Option<&'a Symbol<'a>> {
    for select in selects {
        let index = match crate::expr::eval_constant_integer(cx, ctx_scope, select) {
            Some(i) => i,
            None => return None,
        };
        symbol = match &symbol.kind {
            SymbolKind::InstanceArray(array) => {
                if !array.range.contains(index) {
                    cx.emit(
                        Diag::new(DiagCode::ScopeIndexOutOfRange)
                            .arg(index)
                            .arg(symbol.name)
                            .span(span),
                    );
                    return None;
                }
                let offset = array.range.translate_index(index) as usize;
                array.elements.borrow()[offset]
            }
            SymbolKind::GenerateBlockArray(array) => {
                let entries = array.entries.borrow();
                match entries.iter().find(|e| e.value.as_i32() == Some(index)) {
                    Some(entry) => entry.block,
                    None => {
                        cx.emit(
                            Diag::new(DiagCode::ScopeIndexOutOfRange)
                                .arg(index)
                                .arg(symbol.name)
                                .span(span),
                        );
                        return None;
                    }
                }
            }
            _ => {
                cx.emit(
                    Diag::new(DiagCode::ScopeNotIndexable)
                        .arg(symbol.name)
                        .span(span),
                );
                return None;
            }
        };
    }
    Some(symbol)
}
