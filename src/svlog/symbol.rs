// Copyright (c) 2016-2020 Fabian Schuiki

//! The symbol graph produced by elaboration.
//!
//! Every named construct in the design becomes a [`Symbol`], a tagged sum
//! over all the kinds of things that can appear in a SystemVerilog design:
//! hierarchy (definitions, instances, generate blocks), values (parameters,
//! nets, variables, fields), types, imports, and various structural helpers.
//! Symbols are allocated in the compilation store and referenced by pointer;
//! identity is pointer identity and symbols are never copied once installed.
//!
//! Symbols that contain other symbols embed a [`Scope`](crate::scope::Scope),
//! which keeps the ordered member list and the name index used by lookups.

use crate::crate_prelude::*;
use crate::ast;
use crate::declared::DeclaredType;
use crate::expr::Expression;
use crate::scope::Scope;
use crate::stmt::StatementBinder;
use crate::svint::SVInt;
use crate::ty::{FloatKind, IntegralData, PredefIntKind, ScalarKind, Type};
use crate::value::{ConstantRange, ConstantValue};
use std::cell::{Cell, RefCell};

/// A numeric index that orders the members of a single scope by declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolIndex(pub u32);

impl SymbolIndex {
    /// An index before any declaration.
    pub const MIN: SymbolIndex = SymbolIndex(0);
    /// An index after all declarations.
    pub const MAX: SymbolIndex = SymbolIndex(u32::max_value());
}

/// A symbol in the design.
pub struct Symbol<'a> {
    /// The name of the symbol; empty for anonymous symbols.
    pub name: Name,
    /// The declared location in the source, for diagnostics.
    pub span: Span,
    /// What the symbol is, together with its kind-specific payload.
    pub kind: SymbolKind<'a>,
    parent: Cell<Option<&'a Symbol<'a>>>,
    index: Cell<SymbolIndex>,
}

impl<'a> Symbol<'a> {
    /// Create a new symbol. The symbol becomes usable once it has been moved
    /// into the compilation store, which patches up the internal
    /// back-references.
    pub fn new(name: Name, span: Span, kind: SymbolKind<'a>) -> Symbol<'a> {
        Symbol {
            name,
            span,
            kind,
            parent: Cell::new(None),
            index: Cell::new(SymbolIndex::MIN),
        }
    }

    /// The symbol that owns the scope this symbol was added to.
    pub fn parent(&self) -> Option<&'a Symbol<'a>> {
        self.parent.get()
    }

    /// The scope this symbol was added to.
    pub fn parent_scope(&self) -> Option<&'a Scope<'a>> {
        self.parent.get().and_then(|p| p.scope())
    }

    /// The index of this symbol within its parent scope.
    pub fn index(&self) -> SymbolIndex {
        self.index.get()
    }

    pub(crate) fn set_parent(&self, parent: &'a Symbol<'a>, index: SymbolIndex) {
        self.parent.set(Some(parent));
        self.index.set(index);
    }

    /// The scope embedded in this symbol, if it is one.
    pub fn scope(&self) -> Option<&Scope<'a>> {
        match &self.kind {
            SymbolKind::Root(scope) => Some(scope),
            SymbolKind::CompilationUnit(scope) => Some(scope),
            SymbolKind::Package(x) => Some(&x.scope),
            SymbolKind::Definition(x) => Some(&x.scope),
            SymbolKind::ModuleInstance(x) => Some(&x.scope),
            SymbolKind::InterfaceInstance(x) => Some(&x.scope),
            SymbolKind::InstanceArray(x) => Some(&x.scope),
            SymbolKind::GenerateBlock(x) => Some(&x.scope),
            SymbolKind::GenerateBlockArray(x) => Some(&x.scope),
            SymbolKind::SequentialBlock(x) => Some(&x.scope),
            SymbolKind::Subroutine(x) => Some(&x.scope),
            SymbolKind::Modport(x) => Some(&x.scope),
            SymbolKind::EnumType(x) => Some(&x.scope),
            SymbolKind::PackedStructType(x) => Some(&x.scope),
            SymbolKind::UnpackedStructType(x) => Some(&x.scope),
            SymbolKind::PackedUnionType(x) => Some(&x.scope),
            SymbolKind::UnpackedUnionType(x) => Some(&x.scope),
            _ => None,
        }
    }

    /// All declared-type records carried by this symbol.
    pub(crate) fn declared_types(&self) -> Vec<&DeclaredType<'a>> {
        match &self.kind {
            SymbolKind::Parameter(x) => vec![&x.declared],
            SymbolKind::TypeParameter(x) => vec![&x.declared],
            SymbolKind::Port(x) => vec![&x.declared],
            SymbolKind::Net(x) => vec![&x.declared],
            SymbolKind::Variable(x) => vec![&x.declared],
            SymbolKind::Field(x) => vec![&x.declared],
            SymbolKind::FormalArgument(x) => vec![&x.declared],
            SymbolKind::EnumValue(x) => vec![&x.declared],
            SymbolKind::TypeAlias(x) => vec![&x.target],
            SymbolKind::NetType(x) => vec![&x.declared],
            SymbolKind::Subroutine(x) => vec![&x.return_type],
            _ => vec![],
        }
    }

    /// The declared-type record of this symbol, if it is a value symbol.
    pub fn declared_type(&self) -> Option<&DeclaredType<'a>> {
        match &self.kind {
            SymbolKind::Parameter(x) => Some(&x.declared),
            SymbolKind::Port(x) => Some(&x.declared),
            SymbolKind::Net(x) => Some(&x.declared),
            SymbolKind::Variable(x) => Some(&x.declared),
            SymbolKind::Field(x) => Some(&x.declared),
            SymbolKind::FormalArgument(x) => Some(&x.declared),
            SymbolKind::EnumValue(x) => Some(&x.declared),
            _ => None,
        }
    }

    /// Whether this symbol represents a value with a type.
    pub fn is_value(&self) -> bool {
        self.declared_type().is_some()
    }

    /// Whether this symbol represents a type.
    pub fn is_type(&self) -> bool {
        Type::is_type_kind(&self.kind)
    }

    /// Whether this symbol is a module or interface instance.
    pub fn is_instance(&self) -> bool {
        match self.kind {
            SymbolKind::ModuleInstance(_) | SymbolKind::InterfaceInstance(_) => true,
            _ => false,
        }
    }

    /// A human-readable description of the symbol kind.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SymbolKind::Root(_) => "root",
            SymbolKind::CompilationUnit(_) => "compilation unit",
            SymbolKind::Package(_) => "package",
            SymbolKind::Definition(_) => "definition",
            SymbolKind::ModuleInstance(_) => "module instance",
            SymbolKind::InterfaceInstance(_) => "interface instance",
            SymbolKind::InstanceArray(_) => "instance array",
            SymbolKind::GenerateBlock(_) => "generate block",
            SymbolKind::GenerateBlockArray(_) => "generate block array",
            SymbolKind::SequentialBlock(_) => "block",
            SymbolKind::ProceduralBlock(_) => "procedural block",
            SymbolKind::Parameter(_) => "parameter",
            SymbolKind::TypeParameter(_) => "type parameter",
            SymbolKind::Port(_) => "port",
            SymbolKind::InterfacePort(_) => "interface port",
            SymbolKind::Net(_) => "net",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Field(_) => "field",
            SymbolKind::FormalArgument(_) => "argument",
            SymbolKind::Subroutine(_) => "subroutine",
            SymbolKind::Modport(_) => "modport",
            SymbolKind::ContinuousAssign(_) => "continuous assignment",
            SymbolKind::EnumValue(_) => "enum value",
            SymbolKind::TypeAlias(_) => "typedef",
            SymbolKind::ForwardingTypedef(_) => "forward typedef",
            SymbolKind::EmptyMember => "empty member",
            SymbolKind::TransparentMember(_) => "transparent member",
            SymbolKind::ExplicitImport(_) => "import",
            SymbolKind::WildcardImport(_) => "wildcard import",
            SymbolKind::Attribute(_) => "attribute",
            SymbolKind::Genvar => "genvar",
            SymbolKind::NetType(_) => "net type",
            SymbolKind::ScalarType(_) => "type",
            SymbolKind::PredefinedIntegerType(_) => "type",
            SymbolKind::FloatingType(_) => "type",
            SymbolKind::EnumType(_) => "enum",
            SymbolKind::PackedArrayType(_) => "packed array",
            SymbolKind::UnpackedArrayType(_) => "unpacked array",
            SymbolKind::PackedStructType(_) => "packed struct",
            SymbolKind::UnpackedStructType(_) => "struct",
            SymbolKind::PackedUnionType(_) => "packed union",
            SymbolKind::UnpackedUnionType(_) => "union",
            SymbolKind::VoidType => "void",
            SymbolKind::NullType => "null",
            SymbolKind::CHandleType => "chandle",
            SymbolKind::StringType => "string",
            SymbolKind::EventType => "event",
            SymbolKind::ErrorType => "error type",
        }
    }
}

impl<'a> std::fmt::Debug for Symbol<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} `{}`", self.kind_name(), self.name)
    }
}

/// Compare two symbols by identity.
pub fn same_symbol<'a>(a: &Symbol<'a>, b: &Symbol<'a>) -> bool {
    std::ptr::eq(a, b)
}

/// A symbol reference that hashes and compares by identity. Used as the key
/// of local-variable tables in the constant evaluator.
#[derive(Clone, Copy)]
pub struct ById<'a>(pub &'a Symbol<'a>);

impl<'a> PartialEq for ById<'a> {
    fn eq(&self, other: &ById<'a>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a> Eq for ById<'a> {}

impl<'a> std::hash::Hash for ById<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.0 as *const Symbol).hash(state)
    }
}

/// The different symbols, together with their payloads.
pub enum SymbolKind<'a> {
    Root(Scope<'a>),
    CompilationUnit(Scope<'a>),
    Package(PackageSymbol<'a>),
    Definition(DefinitionSymbol<'a>),
    ModuleInstance(InstanceSymbol<'a>),
    InterfaceInstance(InstanceSymbol<'a>),
    InstanceArray(InstanceArraySymbol<'a>),
    GenerateBlock(GenerateBlockSymbol<'a>),
    GenerateBlockArray(GenerateBlockArraySymbol<'a>),
    SequentialBlock(SequentialBlockSymbol<'a>),
    ProceduralBlock(ProceduralBlockSymbol<'a>),
    Parameter(ParameterSymbol<'a>),
    TypeParameter(TypeParameterSymbol<'a>),
    Port(PortSymbol<'a>),
    InterfacePort(InterfacePortSymbol<'a>),
    Net(NetSymbol<'a>),
    Variable(VariableSymbol<'a>),
    Field(FieldSymbol<'a>),
    FormalArgument(FormalArgumentSymbol<'a>),
    Subroutine(SubroutineSymbol<'a>),
    Modport(ModportSymbol<'a>),
    ContinuousAssign(ContinuousAssignSymbol<'a>),
    EnumValue(EnumValueSymbol<'a>),
    TypeAlias(TypeAliasSymbol<'a>),
    ForwardingTypedef(ForwardingTypedefSymbol<'a>),
    EmptyMember,
    TransparentMember(&'a Symbol<'a>),
    ExplicitImport(ExplicitImportSymbol<'a>),
    WildcardImport(WildcardImportSymbol<'a>),
    Attribute(AttributeSymbol<'a>),
    Genvar,
    NetType(NetTypeSymbol<'a>),

    // The type family. See the `ty` module for the operations on these.
    ScalarType(ScalarTypeSymbol),
    PredefinedIntegerType(PredefIntTypeSymbol),
    FloatingType(FloatKind),
    EnumType(EnumTypeSymbol<'a>),
    PackedArrayType(PackedArrayTypeSymbol<'a>),
    UnpackedArrayType(UnpackedArrayTypeSymbol<'a>),
    PackedStructType(PackedStructTypeSymbol<'a>),
    UnpackedStructType(UnpackedStructTypeSymbol<'a>),
    PackedUnionType(PackedUnionTypeSymbol<'a>),
    UnpackedUnionType(UnpackedUnionTypeSymbol<'a>),
    VoidType,
    NullType,
    CHandleType,
    StringType,
    EventType,
    ErrorType,
}

/// A package.
pub struct PackageSymbol<'a> {
    pub scope: Scope<'a>,
    pub syntax: &'a ast::PackageDecl,
}

/// A module, interface, or program template.
pub struct DefinitionSymbol<'a> {
    pub scope: Scope<'a>,
    pub kind: ast::DefinitionKind,
    pub syntax: &'a ast::ModuleDecl,
    /// The parameter declaration symbols, in declaration order.
    pub parameters: RefCell<Vec<&'a Symbol<'a>>>,
    /// The port symbols, in declaration order.
    pub ports: RefCell<Vec<&'a Symbol<'a>>>,
    /// Port I/O declarations collected from the body, for non-ANSI headers.
    pub port_io_decls: RefCell<Vec<&'a ast::PortDeclItem>>,
}

/// A module or interface instance.
pub struct InstanceSymbol<'a> {
    pub scope: Scope<'a>,
    /// The definition this instance was created from.
    pub definition: &'a Symbol<'a>,
    /// The index path of this instance within enclosing instance arrays.
    pub array_path: Vec<i32>,
    /// The port symbols of this instance, in declaration order.
    pub ports: RefCell<Vec<&'a Symbol<'a>>>,
    /// Port I/O declarations collected from the body, for non-ANSI headers.
    pub port_io_decls: RefCell<Vec<&'a ast::PortDeclItem>>,
}

/// An array of instances.
pub struct InstanceArraySymbol<'a> {
    pub scope: Scope<'a>,
    pub elements: RefCell<Vec<&'a Symbol<'a>>>,
    pub range: ConstantRange,
}

/// A generate block.
pub struct GenerateBlockSymbol<'a> {
    pub scope: Scope<'a>,
    /// Whether the block is actually instantiated in the design.
    /// Uninstantiated blocks still elaborate their members, but produce no
    /// values.
    pub instantiated: bool,
}

/// An entry of a generate block array, pairing the genvar value with the
/// generated block.
pub struct GenerateArrayEntry<'a> {
    pub value: SVInt,
    pub block: &'a Symbol<'a>,
}

/// An array of generate blocks produced by a loop generate construct.
pub struct GenerateBlockArraySymbol<'a> {
    pub scope: Scope<'a>,
    pub entries: RefCell<Vec<GenerateArrayEntry<'a>>>,
}

/// A sequential `begin ... end` block.
pub struct SequentialBlockSymbol<'a> {
    pub scope: Scope<'a>,
    pub binder: StatementBinder<'a>,
}

/// A procedural block, like `always_comb` or `initial`.
pub struct ProceduralBlockSymbol<'a> {
    pub kind: ast::ProcedureKind,
    pub binder: StatementBinder<'a>,
}

/// A value parameter.
pub struct ParameterSymbol<'a> {
    pub declared: DeclaredType<'a>,
    pub is_local: bool,
    pub is_port: bool,
    value_override: RefCell<Option<ConstantValue>>,
}

impl<'a> ParameterSymbol<'a> {
    pub fn new(declared: DeclaredType<'a>, is_local: bool, is_port: bool) -> Self {
        ParameterSymbol {
            declared,
            is_local,
            is_port,
            value_override: RefCell::new(None),
        }
    }

    /// Directly install a value, bypassing the initializer. Used for the
    /// implicit localparams seeded by loop generate constructs.
    pub fn set_value(&self, value: ConstantValue) {
        *self.value_override.borrow_mut() = Some(value);
    }

    /// The overriding value, if one was installed.
    pub fn value_override(&self) -> Option<ConstantValue> {
        self.value_override.borrow().clone()
    }
}

/// A type parameter.
pub struct TypeParameterSymbol<'a> {
    pub declared: DeclaredType<'a>,
    pub is_local: bool,
    pub is_port: bool,
}

/// A port of a module or interface instance.
pub struct PortSymbol<'a> {
    pub declared: DeclaredType<'a>,
    pub direction: ast::Direction,
    /// The net or variable that body code refers to.
    pub internal: Cell<Option<&'a Symbol<'a>>>,
    /// The bound connection expression, if the port is connected.
    pub connection: Cell<Option<&'a Expression<'a>>>,
}

/// An interface port of a module instance.
pub struct InterfacePortSymbol<'a> {
    /// The interface definition this port expects.
    pub iface_def: Option<&'a Symbol<'a>>,
    /// The modport restriction, if any.
    pub modport: Option<&'a Symbol<'a>>,
    /// The declared array dimensions of the port.
    pub dims_syntax: &'a [ast::Dim],
    pub dims: RefCell<Option<Vec<ConstantRange>>>,
    /// The interface instance or array this port is connected to.
    pub connection: Cell<Option<&'a Symbol<'a>>>,
}

/// The net type used by a net, either known at construction or resolved by
/// name on first query.
pub enum NetTypeBinding<'a> {
    Resolved(&'a Symbol<'a>),
    Named(Spanned<Name>, Cell<Option<&'a Symbol<'a>>>),
}

/// A net.
pub struct NetSymbol<'a> {
    pub declared: DeclaredType<'a>,
    pub net_type: NetTypeBinding<'a>,
}

/// A variable.
pub struct VariableSymbol<'a> {
    pub declared: DeclaredType<'a>,
}

/// A field of a struct or union.
pub struct FieldSymbol<'a> {
    pub declared: DeclaredType<'a>,
    /// The offset of the field within its parent: a bit offset for packed
    /// types, a field index for unpacked ones.
    pub offset: u32,
}

/// A formal argument of a subroutine.
pub struct FormalArgumentSymbol<'a> {
    pub declared: DeclaredType<'a>,
    pub direction: ast::Direction,
    pub default: Option<&'a ast::Expr>,
}

/// A function or task.
pub struct SubroutineSymbol<'a> {
    pub scope: Scope<'a>,
    pub kind: ast::SubroutineKind,
    pub return_type: DeclaredType<'a>,
    /// The formal argument symbols, in declaration order.
    pub args: RefCell<Vec<&'a Symbol<'a>>>,
    /// The implicit variable that carries the return value.
    pub return_var: Cell<Option<&'a Symbol<'a>>>,
    pub binder: StatementBinder<'a>,
}

/// A modport of an interface.
pub struct ModportSymbol<'a> {
    pub scope: Scope<'a>,
}

/// A continuous assignment.
pub struct ContinuousAssignSymbol<'a> {
    pub lhs: &'a ast::Expr,
    pub rhs: &'a ast::Expr,
    pub assignment: Cell<Option<&'a Expression<'a>>>,
}

/// An enumerand.
pub struct EnumValueSymbol<'a> {
    pub declared: DeclaredType<'a>,
    value: RefCell<Option<ConstantValue>>,
}

impl<'a> EnumValueSymbol<'a> {
    pub fn new(declared: DeclaredType<'a>) -> Self {
        EnumValueSymbol {
            declared,
            value: RefCell::new(None),
        }
    }

    /// Directly install the enumerand's value.
    pub fn set_value(&self, value: ConstantValue) {
        *self.value.borrow_mut() = Some(value);
    }

    /// The value installed for this enumerand, if any.
    pub fn direct_value(&self) -> Option<ConstantValue> {
        self.value.borrow().clone()
    }
}

/// A type alias introduced by a typedef or type parameter.
pub struct TypeAliasSymbol<'a> {
    pub target: DeclaredType<'a>,
    /// The head of the linked list of forward declarations.
    pub first_forward: Cell<Option<&'a Symbol<'a>>>,
    /// The memoized canonical type.
    pub canonical: Cell<Option<Type<'a>>>,
}

/// A forward declaration of a type name.
pub struct ForwardingTypedefSymbol<'a> {
    pub category: ast::ForwardCategory,
    pub next: Cell<Option<&'a Symbol<'a>>>,
}

/// An explicit package import, like `import pkg::name;`.
pub struct ExplicitImportSymbol<'a> {
    pub package: Spanned<Name>,
    pub item: Spanned<Name>,
    pub resolved: Cell<Option<&'a Symbol<'a>>>,
    pub resolve_done: Cell<bool>,
}

/// A wildcard package import, like `import pkg::*;`.
pub struct WildcardImportSymbol<'a> {
    pub package: Spanned<Name>,
    pub _marker: std::marker::PhantomData<&'a ()>,
}

/// An attribute attached to a symbol.
pub struct AttributeSymbol<'a> {
    pub value: &'a ConstantValue,
}

/// A net type: one of the built-in kinds, or user-defined.
pub struct NetTypeSymbol<'a> {
    pub kind: NetTypeKind,
    pub declared: DeclaredType<'a>,
    pub syntax: Option<&'a ast::NetTypeDecl>,
    /// The aliased net type, for user-defined net types that name another.
    pub alias: Cell<Option<&'a Symbol<'a>>>,
    /// The resolution function, if the declaration names one.
    pub resolution: Cell<Option<&'a Symbol<'a>>>,
    pub resolved: Cell<bool>,
}

/// The kinds of net types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetTypeKind {
    Builtin(ast::NetKind),
    UserDefined,
    Unknown,
}

/// A scalar type: `bit`, `logic`, or `reg`.
pub struct ScalarTypeSymbol {
    pub data: IntegralData,
    pub kind: ScalarKind,
}

/// A predefined integer type.
pub struct PredefIntTypeSymbol {
    pub data: IntegralData,
    pub kind: PredefIntKind,
}

/// An enum type.
pub struct EnumTypeSymbol<'a> {
    pub data: IntegralData,
    pub base: Type<'a>,
    pub scope: Scope<'a>,
}

/// A packed array type.
pub struct PackedArrayTypeSymbol<'a> {
    pub data: IntegralData,
    pub element: Type<'a>,
    pub range: ConstantRange,
}

/// An unpacked array type.
pub struct UnpackedArrayTypeSymbol<'a> {
    pub element: Type<'a>,
    pub range: ConstantRange,
}

/// A packed struct type.
pub struct PackedStructTypeSymbol<'a> {
    pub data: IntegralData,
    pub scope: Scope<'a>,
}

/// An unpacked struct type.
pub struct UnpackedStructTypeSymbol<'a> {
    pub scope: Scope<'a>,
}

/// A packed union type.
pub struct PackedUnionTypeSymbol<'a> {
    pub data: IntegralData,
    pub scope: Scope<'a>,
}

/// An unpacked union type.
pub struct UnpackedUnionTypeSymbol<'a> {
    pub scope: Scope<'a>,
}
