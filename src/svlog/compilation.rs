// Copyright (c) 2016-2020 Fabian Schuiki

//! The central data structure of the elaboration engine.
//!
//! The [`Compilation`] owns every symbol, type, expression, statement, and
//! constant produced during elaboration, by way of the [`GlobalArenas`] it
//! references. It keeps the deduplication cache for canonical integral
//! vector types, the registries of package and definition names, the
//! diagnostic sink, and the built-in types and net types.
//!
//! # Example
//!
//! ```
//! # use silica_svlog::{Compilation, GlobalArenas};
//! let arena = GlobalArenas::default();
//! let cx = Compilation::new(&arena);
//! ```

use crate::ast;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::expr::Expression;
use crate::scope::Scope;
use crate::stmt::Statement;
use crate::symbol::{
    NetTypeKind, NetTypeSymbol, PackedArrayTypeSymbol, PredefIntTypeSymbol, ScalarTypeSymbol,
    Symbol, SymbolKind,
};
use crate::syscall::{self, SystemSubroutine};
use crate::ty::{FloatKind, IntegralData, IntegralFlags, PredefIntKind, ScalarKind, Type};
use crate::value::{ConstantRange, ConstantValue};
use silica_common::arenas::TypedArena;
use silica_common::errors::Severity;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// The empty name.
pub fn empty_name() -> Name {
    silica_common::name::EMPTY_NAME
}

fn builtin_span() -> Span {
    silica_common::source::INVALID_SPAN
}

/// The arenas that own everything allocated during elaboration.
pub struct GlobalArenas<'t> {
    symbols: TypedArena<Symbol<'t>>,
    exprs: TypedArena<Expression<'t>>,
    stmts: TypedArena<Statement<'t>>,
    consts: TypedArena<ConstantValue>,
    roots: TypedArena<ast::Root>,
    data_types: TypedArena<ast::DataType>,
    expr_syntax: TypedArena<ast::Expr>,
}

impl Default for GlobalArenas<'_> {
    fn default() -> Self {
        GlobalArenas {
            symbols: TypedArena::new(),
            exprs: TypedArena::new(),
            stmts: TypedArena::new(),
            consts: TypedArena::new(),
            roots: TypedArena::new(),
            data_types: TypedArena::new(),
            expr_syntax: TypedArena::new(),
        }
    }
}

/// The built-in types and net types, allocated once per compilation.
struct Builtins<'a> {
    error: &'a Symbol<'a>,
    void: &'a Symbol<'a>,
    null: &'a Symbol<'a>,
    chandle: &'a Symbol<'a>,
    string: &'a Symbol<'a>,
    event: &'a Symbol<'a>,
    // Scalars, indexed by kind and signedness.
    scalars: HashMap<(ScalarKind, bool), &'a Symbol<'a>>,
    predefs: HashMap<PredefIntKind, &'a Symbol<'a>>,
    floats: HashMap<FloatKind, &'a Symbol<'a>>,
    net_types: HashMap<ast::NetKind, &'a Symbol<'a>>,
}

/// The compilation store.
pub struct Compilation<'a> {
    /// The arenas that own all allocated nodes.
    pub arena: &'a GlobalArenas<'a>,
    builtins: Builtins<'a>,
    vector_types: RefCell<HashMap<(usize, u8), &'a Symbol<'a>>>,
    definitions: RefCell<HashMap<Name, &'a Symbol<'a>>>,
    definition_order: RefCell<Vec<&'a Symbol<'a>>>,
    packages: RefCell<HashMap<Name, &'a Symbol<'a>>>,
    instantiated: RefCell<HashSet<Name>>,
    units: RefCell<Vec<&'a Symbol<'a>>>,
    root: Cell<Option<&'a Symbol<'a>>>,
    diags: RefCell<Vec<Diag>>,
    disabled_warnings: RefCell<HashSet<String>>,
    system_subroutines: HashMap<Name, &'static dyn SystemSubroutine>,
}

impl<'a> Compilation<'a> {
    /// Create a new compilation store.
    pub fn new(arena: &'a GlobalArenas<'a>) -> Compilation<'a> {
        let alloc = |kind: SymbolKind<'a>, name: &str| -> &'a Symbol<'a> {
            let sym = arena
                .symbols
                .alloc(Symbol::new(Name::intern(name), builtin_span(), kind));
            let sym = &*sym;
            if let Some(scope) = sym.scope() {
                scope.set_owner(sym);
            }
            sym
        };

        let mut scalars = HashMap::new();
        for &kind in &[ScalarKind::Bit, ScalarKind::Logic, ScalarKind::Reg] {
            for &signed in &[false, true] {
                let data = IntegralData {
                    width: 1,
                    signed,
                    four_state: kind != ScalarKind::Bit,
                };
                let name = match kind {
                    ScalarKind::Bit => "bit",
                    ScalarKind::Logic => "logic",
                    ScalarKind::Reg => "reg",
                };
                scalars.insert(
                    (kind, signed),
                    alloc(SymbolKind::ScalarType(ScalarTypeSymbol { data, kind }), name),
                );
            }
        }

        let mut predefs = HashMap::new();
        for &kind in &[
            PredefIntKind::Byte,
            PredefIntKind::ShortInt,
            PredefIntKind::Int,
            PredefIntKind::LongInt,
            PredefIntKind::Integer,
            PredefIntKind::Time,
        ] {
            let data = IntegralData {
                width: kind.width(),
                signed: kind.default_signed(),
                four_state: kind.four_state(),
            };
            predefs.insert(
                kind,
                alloc(
                    SymbolKind::PredefinedIntegerType(PredefIntTypeSymbol { data, kind }),
                    kind.name(),
                ),
            );
        }

        let mut floats = HashMap::new();
        for &kind in &[FloatKind::ShortReal, FloatKind::Real, FloatKind::RealTime] {
            floats.insert(kind, alloc(SymbolKind::FloatingType(kind), kind.name()));
        }

        let logic = scalars[&(ScalarKind::Logic, false)];
        let mut net_types = HashMap::new();
        for &(kind, name) in &[
            (ast::NetKind::Wire, "wire"),
            (ast::NetKind::WAnd, "wand"),
            (ast::NetKind::WOr, "wor"),
            (ast::NetKind::Tri, "tri"),
            (ast::NetKind::TriAnd, "triand"),
            (ast::NetKind::TriOr, "trior"),
            (ast::NetKind::Tri0, "tri0"),
            (ast::NetKind::Tri1, "tri1"),
            (ast::NetKind::TriReg, "trireg"),
            (ast::NetKind::Supply0, "supply0"),
            (ast::NetKind::Supply1, "supply1"),
            (ast::NetKind::UWire, "uwire"),
        ] {
            let declared = crate::declared::DeclaredType::new();
            declared.set_type(Type(logic));
            let nt = NetTypeSymbol {
                kind: NetTypeKind::Builtin(kind),
                declared,
                syntax: None,
                alias: Cell::new(None),
                resolution: Cell::new(None),
                resolved: Cell::new(true),
            };
            net_types.insert(kind, alloc(SymbolKind::NetType(nt), name));
        }

        let builtins = Builtins {
            error: alloc(SymbolKind::ErrorType, ""),
            void: alloc(SymbolKind::VoidType, "void"),
            null: alloc(SymbolKind::NullType, "null"),
            chandle: alloc(SymbolKind::CHandleType, "chandle"),
            string: alloc(SymbolKind::StringType, "string"),
            event: alloc(SymbolKind::EventType, "event"),
            scalars,
            predefs,
            floats,
            net_types,
        };

        let mut system_subroutines: HashMap<Name, &'static dyn SystemSubroutine> = HashMap::new();
        for sub in syscall::builtins() {
            system_subroutines.insert(Name::intern(sub.name()), sub);
        }

        Compilation {
            arena,
            builtins,
            vector_types: RefCell::new(HashMap::new()),
            definitions: RefCell::new(HashMap::new()),
            definition_order: RefCell::new(Vec::new()),
            packages: RefCell::new(HashMap::new()),
            instantiated: RefCell::new(HashSet::new()),
            units: RefCell::new(Vec::new()),
            root: Cell::new(None),
            diags: RefCell::new(Vec::new()),
            disabled_warnings: RefCell::new(HashSet::new()),
            system_subroutines,
        }
    }

    /// Move a symbol into the store, fixing up its internal back-references.
    pub fn alloc_symbol(&self, symbol: Symbol<'a>) -> &'a Symbol<'a> {
        let sym = &*self.arena.symbols.alloc(symbol);
        if let Some(scope) = sym.scope() {
            scope.set_owner(sym);
        }
        sym
    }

    /// Move an expression into the store.
    pub fn alloc_expr(&self, expr: Expression<'a>) -> &'a Expression<'a> {
        self.arena.exprs.alloc(expr)
    }

    /// Move a statement into the store.
    pub fn alloc_stmt(&self, stmt: Statement<'a>) -> &'a Statement<'a> {
        self.arena.stmts.alloc(stmt)
    }

    /// Move a syntax tree into the store, for hosts that want the store to
    /// own the syntax as well.
    pub fn alloc_root(&self, root: ast::Root) -> &'a ast::Root {
        self.arena.roots.alloc(root)
    }

    /// Move a data type syntax node into the store. Used when elaboration
    /// reinterprets an expression as a type.
    pub fn alloc_data_type(&self, dt: ast::DataType) -> &'a ast::DataType {
        self.arena.data_types.alloc(dt)
    }

    /// Move a standalone expression syntax node into the store, for
    /// incremental (script) binding.
    pub fn alloc_expr_syntax(&self, expr: ast::Expr) -> &'a ast::Expr {
        self.arena.expr_syntax.alloc(expr)
    }

    /// Intern a constant value, returning a reference that lives as long as
    /// the store.
    pub fn intern_constant(&self, value: ConstantValue) -> &'a ConstantValue {
        self.arena.consts.alloc(value)
    }

    /// Emit a diagnostic.
    pub fn emit(&self, diag: Diag) {
        if diag.code.severity() == Severity::Warning {
            if let Some(group) = diag.code.group() {
                if self.disabled_warnings.borrow().contains(group) {
                    return;
                }
            }
        }
        log::debug!("diag {}: {}", diag.code.name(), diag.message());
        self.diags.borrow_mut().push(diag);
    }

    /// Collectively enable or disable a group of warnings.
    pub fn set_warning_group(&self, group: &str, enabled: bool) {
        if enabled {
            self.disabled_warnings.borrow_mut().remove(group);
        } else {
            self.disabled_warnings.borrow_mut().insert(group.to_string());
        }
    }

    /// The diagnostics produced so far.
    pub fn diagnostics(&self) -> Vec<Diag> {
        self.diags.borrow().clone()
    }

    /// The codes of the diagnostics produced so far.
    pub fn diagnostic_codes(&self) -> Vec<DiagCode> {
        self.diags.borrow().iter().map(|d| d.code).collect()
    }

    /// Whether any error diagnostics were produced.
    pub fn has_errors(&self) -> bool {
        self.diags
            .borrow()
            .iter()
            .any(|d| d.code.severity() >= Severity::Error)
    }

    /// The error type.
    pub fn error_type(&self) -> Type<'a> {
        Type(self.builtins.error)
    }

    /// The void type.
    pub fn void_type(&self) -> Type<'a> {
        Type(self.builtins.void)
    }

    /// The null type.
    pub fn null_type(&self) -> Type<'a> {
        Type(self.builtins.null)
    }

    /// The chandle type.
    pub fn chandle_type(&self) -> Type<'a> {
        Type(self.builtins.chandle)
    }

    /// The string type.
    pub fn string_type(&self) -> Type<'a> {
        Type(self.builtins.string)
    }

    /// The event type.
    pub fn event_type(&self) -> Type<'a> {
        Type(self.builtins.event)
    }

    /// One of the scalar types.
    pub fn scalar_type(&self, kind: ScalarKind, signed: bool) -> Type<'a> {
        Type(self.builtins.scalars[&(kind, signed)])
    }

    /// One of the predefined integer types.
    pub fn predef_type(&self, kind: PredefIntKind) -> Type<'a> {
        Type(self.builtins.predefs[&kind])
    }

    /// One of the floating point types.
    pub fn float_type(&self, kind: FloatKind) -> Type<'a> {
        Type(self.builtins.floats[&kind])
    }

    /// One of the built-in net types.
    pub fn net_type(&self, kind: ast::NetKind) -> &'a Symbol<'a> {
        self.builtins.net_types[&kind]
    }

    /// The `wire` net type.
    pub fn wire_net_type(&self) -> &'a Symbol<'a> {
        self.net_type(ast::NetKind::Wire)
    }

    /// Intern a simple bit vector type. Vectors with the same width,
    /// signedness, four-stateness, and reg-ness share a single object, so
    /// pointer identity implies matching.
    pub fn vector_type(&self, width: usize, flags: IntegralFlags) -> Type<'a> {
        assert!(width > 0, "vector width must be positive");
        let key = (width, flags.bits());
        if let Some(&sym) = self.vector_types.borrow().get(&key) {
            return Type(sym);
        }
        let scalar_kind = if flags.contains(IntegralFlags::REG) {
            ScalarKind::Reg
        } else if flags.contains(IntegralFlags::FOUR_STATE) {
            ScalarKind::Logic
        } else {
            ScalarKind::Bit
        };
        let element = self.scalar_type(scalar_kind, false);
        let data = IntegralData {
            width,
            signed: flags.contains(IntegralFlags::SIGNED),
            four_state: flags.contains(IntegralFlags::FOUR_STATE),
        };
        let sym = self.alloc_symbol(Symbol::new(
            empty_name(),
            builtin_span(),
            SymbolKind::PackedArrayType(PackedArrayTypeSymbol {
                data,
                element,
                range: ConstantRange::new(width as i32 - 1, 0),
            }),
        ));
        self.vector_types.borrow_mut().insert(key, sym);
        Type(sym)
    }

    /// Register a definition.
    pub fn add_definition(&self, symbol: &'a Symbol<'a>) {
        self.definitions
            .borrow_mut()
            .entry(symbol.name)
            .or_insert(symbol);
        self.definition_order.borrow_mut().push(symbol);
    }

    /// Find a module, interface, or program definition by name.
    pub fn get_definition(&self, name: Name) -> Option<&'a Symbol<'a>> {
        self.definitions.borrow().get(&name).copied()
    }

    /// Register a package.
    pub fn add_package(&self, symbol: &'a Symbol<'a>) {
        self.packages
            .borrow_mut()
            .entry(symbol.name)
            .or_insert(symbol);
    }

    /// Find a package by name.
    pub fn get_package(&self, name: Name) -> Option<&'a Symbol<'a>> {
        self.packages.borrow().get(&name).copied()
    }

    /// Record that a definition name is the target of an instantiation
    /// somewhere in the input. Used to find the top-level modules.
    pub fn note_instantiated(&self, name: Name) {
        self.instantiated.borrow_mut().insert(name);
    }

    /// Find a system subroutine by name.
    pub fn system_subroutine(&self, name: Name) -> Option<&'static dyn SystemSubroutine> {
        self.system_subroutines.get(&name).copied()
    }

    /// Add a syntax tree to the compilation. Creates a compilation unit and
    /// registers all definitions and packages in the tree.
    pub fn add_syntax_tree(&self, root: &'a ast::Root) {
        let unit = self.alloc_symbol(Symbol::new(
            empty_name(),
            builtin_span(),
            SymbolKind::CompilationUnit(Scope::new()),
        ));
        self.units.borrow_mut().push(unit);
        crate::hierarchy::add_members(self, unit, &root.items);
    }

    /// Create a fresh scope for incremental (script) binding.
    pub fn create_script_scope(&self) -> &'a Symbol<'a> {
        let unit = self.alloc_symbol(Symbol::new(
            Name::intern("$script"),
            builtin_span(),
            SymbolKind::CompilationUnit(Scope::new()),
        ));
        self.units.borrow_mut().push(unit);
        unit
    }

    /// Force elaboration of the entire design, so that all diagnostics are
    /// produced. Elaboration always yields a complete symbol tree, even in
    /// the presence of errors.
    pub fn elaborate_all(&self) {
        fn visit<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) {
            if let Some(declared) = sym.declared_type() {
                declared.ty(cx, sym);
                declared.initializer(cx, sym);
            }
            if let SymbolKind::ContinuousAssign(_) = sym.kind {
                crate::hierarchy::continuous_assign_expr(cx, sym);
            }
            if let Some(scope) = sym.scope() {
                for member in scope.members(cx) {
                    visit(cx, member);
                }
            }
        }
        let root = self.root();
        visit(self, root);
    }

    /// The elaborated design root: a scope holding one instance per
    /// top-level module.
    pub fn root(&self) -> &'a Symbol<'a> {
        if let Some(root) = self.root.get() {
            return root;
        }
        let root = self.alloc_symbol(Symbol::new(
            Name::intern("$root"),
            builtin_span(),
            SymbolKind::Root(Scope::new()),
        ));
        self.root.set(Some(root));

        // Top level modules are the ones never instantiated by any other
        // definition.
        let order = self.definition_order.borrow().clone();
        for def in order {
            let is_module = match &def.kind {
                SymbolKind::Definition(d) => d.kind == ast::DefinitionKind::Module,
                _ => false,
            };
            if !is_module
                || self.instantiated.borrow().contains(&def.name)
                || !crate::hierarchy::is_valid_top(self, def)
            {
                continue;
            }
            let instance = crate::hierarchy::instantiate_toplevel(self, def);
            root.scope().unwrap().add_member(instance);
        }
        root
    }
}
