// Copyright (c) 2016-2020 Fabian Schuiki

//! Abstract syntax tree nodes consumed by the elaboration engine.
//!
//! The engine does not parse source text itself; a parser (or a test) builds
//! these nodes and hands them to the compilation via `add_syntax_tree`. Nodes
//! are immutable once constructed and must outlive the compilation store that
//! references them.

use crate::crate_prelude::*;
use crate::svint::SVInt;

/// The root of a syntax tree, covering one compilation unit.
#[derive(Debug)]
pub struct Root {
    pub items: Vec<Item>,
}

/// An item that may appear in a compilation unit, module, interface, package,
/// or generate block.
#[derive(Debug)]
pub enum Item {
    Module(ModuleDecl),
    Package(PackageDecl),
    Import(ImportDecl),
    Param(ParamDecl),
    TypeParam(TypeParamDecl),
    Typedef(Typedef),
    ForwardTypedef(ForwardTypedef),
    NetTypeDecl(NetTypeDecl),
    Var(VarDecl),
    Net(NetDecl),
    PortDecl(PortDeclItem),
    Subroutine(SubroutineDecl),
    ContAssign(ContAssign),
    Genvar(GenvarDecl),
    GenerateIf(GenerateIf),
    GenerateCase(GenerateCase),
    GenerateFor(GenerateFor),
    GenerateRegion(Vec<Item>),
    Instantiation(Instantiation),
    Modport(ModportDecl),
    Procedure(ProceduralBlock),
    Empty(Span),
}

/// The flavor of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Module,
    Interface,
    Program,
}

/// A module, interface, or program declaration.
#[derive(Debug)]
pub struct ModuleDecl {
    pub kind: DefinitionKind,
    pub name: Spanned<Name>,
    pub imports: Vec<ImportDecl>,
    pub params: Vec<ParamPort>,
    pub ports: Option<PortList>,
    pub items: Vec<Item>,
    pub span: Span,
}

/// An entry in a parameter port list.
#[derive(Debug)]
pub enum ParamPort {
    Value(ParamDecl),
    Type(TypeParamDecl),
}

/// A value parameter declaration.
#[derive(Debug)]
pub struct ParamDecl {
    pub local: bool,
    pub ty: DataType,
    pub decls: Vec<Declarator>,
    pub span: Span,
}

/// A type parameter declaration.
#[derive(Debug)]
pub struct TypeParamDecl {
    pub local: bool,
    pub decls: Vec<TypeParamDeclarator>,
    pub span: Span,
}

/// A single name in a type parameter declaration.
#[derive(Debug)]
pub struct TypeParamDeclarator {
    pub name: Spanned<Name>,
    pub default: Option<DataType>,
}

/// A declared name with optional unpacked dimensions and initializer.
#[derive(Debug)]
pub struct Declarator {
    pub name: Spanned<Name>,
    pub dims: Vec<Dim>,
    pub init: Option<Initializer>,
}

/// An `= expr` initializer clause.
#[derive(Debug)]
pub struct Initializer {
    pub equals: Span,
    pub expr: Expr,
}

/// A package declaration.
#[derive(Debug)]
pub struct PackageDecl {
    pub name: Spanned<Name>,
    pub items: Vec<Item>,
    pub span: Span,
}

/// A package import declaration.
#[derive(Debug)]
pub struct ImportDecl {
    pub items: Vec<ImportItem>,
    pub span: Span,
}

/// A single import within an import declaration.
#[derive(Debug)]
pub enum ImportItem {
    /// `pkg::name`
    Explicit {
        package: Spanned<Name>,
        name: Spanned<Name>,
    },
    /// `pkg::*`
    Wildcard { package: Spanned<Name> },
}

/// A type definition.
#[derive(Debug)]
pub struct Typedef {
    pub name: Spanned<Name>,
    pub ty: DataType,
    pub dims: Vec<Dim>,
    pub span: Span,
}

/// The user-declared category of a forward typedef.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardCategory {
    None,
    Enum,
    Struct,
    Union,
    Class,
}

/// A forward type declaration, like `typedef enum e;`.
#[derive(Debug)]
pub struct ForwardTypedef {
    pub category: ForwardCategory,
    pub name: Spanned<Name>,
    pub span: Span,
}

/// A user-defined net type declaration.
#[derive(Debug)]
pub struct NetTypeDecl {
    pub name: Spanned<Name>,
    pub ty: DataType,
    pub resolution: Option<Spanned<Name>>,
    pub span: Span,
}

/// A variable declaration.
#[derive(Debug)]
pub struct VarDecl {
    pub ty: DataType,
    pub decls: Vec<Declarator>,
    pub span: Span,
}

/// A net declaration.
#[derive(Debug)]
pub struct NetDecl {
    pub net_type: NetTypeRef,
    pub ty: DataType,
    pub decls: Vec<Declarator>,
    pub span: Span,
}

/// The net type used by a net declaration.
#[derive(Debug)]
pub enum NetTypeRef {
    Builtin(NetKind),
    Named(Spanned<Name>),
}

/// The built-in net kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetKind {
    Wire,
    WAnd,
    WOr,
    Tri,
    TriAnd,
    TriOr,
    Tri0,
    Tri1,
    TriReg,
    Supply0,
    Supply1,
    UWire,
}

/// A continuous assignment.
#[derive(Debug)]
pub struct ContAssign {
    pub assignments: Vec<(Expr, Expr)>,
    pub span: Span,
}

/// A genvar declaration.
#[derive(Debug)]
pub struct GenvarDecl {
    pub names: Vec<Spanned<Name>>,
    pub span: Span,
}

/// An `if` generate construct.
#[derive(Debug)]
pub struct GenerateIf {
    pub cond: Expr,
    pub then_item: GenerateItem,
    pub else_item: Option<GenerateItem>,
    pub span: Span,
}

/// A `case` generate construct.
#[derive(Debug)]
pub struct GenerateCase {
    pub cond: Expr,
    pub items: Vec<GenerateCaseItem>,
    pub span: Span,
}

/// One arm of a `case` generate construct. An empty expression list marks the
/// `default` arm.
#[derive(Debug)]
pub struct GenerateCaseItem {
    pub exprs: Vec<Expr>,
    pub item: GenerateItem,
    pub span: Span,
}

/// A `for` generate construct.
#[derive(Debug)]
pub struct GenerateFor {
    /// Whether the loop declares its own genvar (`for (genvar i = ...)`).
    pub genvar: bool,
    pub ident: Spanned<Name>,
    pub init: Expr,
    pub cond: Expr,
    pub step: Expr,
    pub block: GenerateBlock,
    pub span: Span,
}

/// The body of a conditional generate arm: either a plain block or a directly
/// nested conditional construct.
#[derive(Debug)]
pub enum GenerateItem {
    Block(GenerateBlock),
    If(Box<GenerateIf>),
    Case(Box<GenerateCase>),
}

/// A generate block with an optional label.
#[derive(Debug)]
pub struct GenerateBlock {
    pub label: Option<Spanned<Name>>,
    pub items: Vec<Item>,
    pub span: Span,
}

/// A hierarchy instantiation, like `foo #(8) a(), b();`.
#[derive(Debug)]
pub struct Instantiation {
    pub target: Spanned<Name>,
    pub params: Vec<ParamAssignment>,
    pub instances: Vec<HierInstance>,
    pub span: Span,
}

/// A parameter assignment at an instantiation site.
#[derive(Debug)]
pub enum ParamAssignment {
    Ordered(ParamValue, Span),
    Named {
        name: Spanned<Name>,
        value: Option<ParamValue>,
        span: Span,
    },
}

/// The value assigned to a parameter: an expression for value parameters, a
/// data type for type parameters.
#[derive(Debug)]
pub enum ParamValue {
    Expr(Expr),
    Type(DataType),
}

/// A single instance within an instantiation.
#[derive(Debug)]
pub struct HierInstance {
    pub name: Spanned<Name>,
    pub dims: Vec<Dim>,
    pub connections: Vec<PortConnection>,
    pub span: Span,
}

/// A port connection at an instantiation site.
#[derive(Debug)]
pub enum PortConnection {
    /// A positional connection. The expression may be omitted to request the
    /// port's default.
    Ordered(Option<Expr>, Span),
    /// A named connection. Without parentheses this is an implicit named
    /// connection (`.clk`); with parentheses and no expression it is an
    /// explicit no-connect (`.clk()`).
    Named {
        name: Spanned<Name>,
        parens: bool,
        expr: Option<Expr>,
        span: Span,
    },
    /// The `.*` wildcard.
    Wildcard(Span),
}

/// A modport declaration.
#[derive(Debug)]
pub struct ModportDecl {
    pub items: Vec<ModportItem>,
    pub span: Span,
}

/// A named modport within a modport declaration.
#[derive(Debug)]
pub struct ModportItem {
    pub name: Spanned<Name>,
    pub ports: Vec<ModportPort>,
}

/// A signal exposed by a modport, with its direction.
#[derive(Debug)]
pub struct ModportPort {
    pub direction: Direction,
    pub name: Spanned<Name>,
}

/// A procedural block.
#[derive(Debug)]
pub struct ProceduralBlock {
    pub kind: ProcedureKind,
    pub stmt: Stmt,
    pub span: Span,
}

/// The kind of a procedural block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Initial,
    Always,
    AlwaysComb,
    AlwaysLatch,
    AlwaysFf,
    Final,
}

/// A subroutine declaration.
#[derive(Debug)]
pub struct SubroutineDecl {
    pub kind: SubroutineKind,
    pub name: Spanned<Name>,
    /// The return type; `None` for tasks.
    pub ret: Option<DataType>,
    pub args: Vec<FormalArg>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Function or task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Function,
    Task,
}

/// A formal argument of a subroutine.
#[derive(Debug)]
pub struct FormalArg {
    pub direction: Direction,
    pub ty: DataType,
    pub name: Spanned<Name>,
    pub default: Option<Expr>,
}

/// A port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
    Ref,
}

/// The port list of an ANSI or non-ANSI module header.
#[derive(Debug)]
pub enum PortList {
    Ansi(Vec<AnsiPort>),
    NonAnsi(Vec<NonAnsiPort>),
}

/// A port in an ANSI header.
#[derive(Debug)]
pub struct AnsiPort {
    pub kind: AnsiPortKind,
    pub span: Span,
}

/// The two shapes of ANSI ports.
#[derive(Debug)]
pub enum AnsiPortKind {
    /// A port with a header, like `input logic [7:0] a`. A fully empty header
    /// inherits direction, kind, and type from the previous port.
    Implicit {
        header: PortHeader,
        decl: Declarator,
    },
    /// An explicit port, like `.a(expr)`.
    Explicit {
        direction: Option<Direction>,
        name: Spanned<Name>,
        expr: Option<Expr>,
    },
}

/// The header of an implicit ANSI port.
#[derive(Debug)]
pub enum PortHeader {
    Variable {
        direction: Option<Direction>,
        var_keyword: bool,
        ty: DataType,
    },
    Net {
        direction: Option<Direction>,
        net_type: NetKind,
        ty: DataType,
    },
    Interface {
        iface: Spanned<Name>,
        modport: Option<Spanned<Name>>,
    },
    Interconnect,
}

/// A port in a non-ANSI header, like `module m(a, b);`.
#[derive(Debug)]
pub struct NonAnsiPort {
    pub expr: Option<PortRef>,
    pub span: Span,
}

/// The target of a non-ANSI port.
#[derive(Debug)]
pub enum PortRef {
    Named(Spanned<Name>),
    Concat(Span),
}

/// A port I/O declaration in a non-ANSI module body, like `input [7:0] a;`.
#[derive(Debug)]
pub struct PortDeclItem {
    pub header: PortIoHeader,
    pub decls: Vec<Declarator>,
    pub span: Span,
}

/// The header of a port I/O declaration.
#[derive(Debug)]
pub enum PortIoHeader {
    Variable {
        direction: Direction,
        var_keyword: bool,
        ty: DataType,
    },
    Net {
        direction: Direction,
        net_type: NetKind,
        ty: DataType,
    },
}

/// A data type.
#[derive(Debug)]
pub struct DataType {
    pub kind: DataTypeKind,
    pub span: Span,
}

/// The different data types.
#[derive(Debug)]
pub enum DataTypeKind {
    /// An implicit type, like the absence of a type in `parameter x = 1`.
    Implicit { signed: bool, dims: Vec<PackedDim> },
    /// An integer vector type: `bit`, `logic`, `reg`.
    IntVec {
        kind: IntVecKind,
        signed: bool,
        dims: Vec<PackedDim>,
    },
    /// An integer atom type: `byte`, `shortint`, `int`, `longint`,
    /// `integer`, `time`.
    IntAtom {
        kind: IntAtomKind,
        signed: Option<bool>,
    },
    /// A floating point type: `shortreal`, `real`, `realtime`.
    Real(RealKind),
    String,
    Chandle,
    Event,
    Void,
    /// An enum type with an optional base.
    Enum {
        base: Option<Box<DataType>>,
        members: Vec<EnumMember>,
    },
    /// A struct or union type.
    Struct {
        union: bool,
        packed: bool,
        signed: bool,
        members: Vec<StructMember>,
        dims: Vec<PackedDim>,
    },
    /// A named type, optionally package-qualified, with packed dimensions.
    Named {
        package: Option<Spanned<Name>>,
        name: Spanned<Name>,
        dims: Vec<PackedDim>,
    },
    /// A `type(...)` reference. Not supported by the engine.
    TypeRef(Box<Expr>),
    /// A virtual interface type. Not supported by the engine.
    VirtualInterface(Spanned<Name>),
}

/// An integer vector type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntVecKind {
    Bit,
    Logic,
    Reg,
}

/// An integer atom type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntAtomKind {
    Byte,
    ShortInt,
    Int,
    LongInt,
    Integer,
    Time,
}

/// A floating point type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealKind {
    ShortReal,
    Real,
    RealTime,
}

/// A packed dimension.
#[derive(Debug)]
pub enum PackedDim {
    Range(Expr, Expr),
    Unsized(Span),
}

/// An unpacked dimension.
#[derive(Debug)]
pub enum Dim {
    Range(Expr, Expr),
    Size(Expr),
    Unsized(Span),
    Associative(Span),
    Queue(Span),
}

/// A member of an enum declaration.
#[derive(Debug)]
pub struct EnumMember {
    pub name: Spanned<Name>,
    /// Range declarators, like `NAME[3:0]`, generating one value per index.
    pub dims: Vec<Dim>,
    pub init: Option<Initializer>,
}

/// A member of a struct or union declaration.
#[derive(Debug)]
pub struct StructMember {
    pub ty: DataType,
    pub decls: Vec<Declarator>,
    pub span: Span,
}

/// An expression.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    /// Create a new expression.
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr { kind, span }
    }

    /// The segments of a scoped name, if this expression is one.
    pub fn scoped_segs(&self) -> Option<&[NameSeg]> {
        match &self.kind {
            ExprKind::Scoped { segs, .. } => Some(segs),
            _ => None,
        }
    }
}

/// The different expressions.
#[derive(Debug)]
pub enum ExprKind {
    /// An integer literal carrying its pre-parsed value.
    IntLiteral(SVInt),
    /// An unbased unsized literal: `'0`, `'1`, `'x`, `'z`.
    UnbasedUnsized(crate::svint::Logic),
    /// A real literal.
    RealLiteral(f64),
    /// A time literal with its unit.
    TimeLiteral(f64, TimeUnit),
    /// A string literal.
    StringLiteral(String),
    /// The `null` literal.
    NullLiteral,
    /// A simple identifier.
    Ident(Spanned<Name>),
    /// A scoped name, like `pkg::name` or a dotted hierarchical path with
    /// element selects between the parts.
    Scoped {
        /// Whether the head is separated with `::` (package or class scope).
        package: bool,
        segs: Vec<NameSeg>,
    },
    /// A unary operator application.
    Unary(UnaryOp, Box<Expr>),
    /// A binary operator application.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A `?:` conditional.
    Conditional {
        cond: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
    },
    /// An assignment, possibly compound, possibly non-blocking.
    Assign {
        op: Option<BinaryOp>,
        non_blocking: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A concatenation.
    Concat(Vec<Expr>),
    /// A replication, like `{4{a}}`.
    Replicate {
        count: Box<Expr>,
        concat: Vec<Expr>,
    },
    /// An element select, like `a[i]`.
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// A range select, like `a[7:0]`, `a[i+:4]`, or `a[i-:4]`.
    Range {
        value: Box<Expr>,
        mode: RangeSelectMode,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A member access, like `a.b`.
    Member {
        value: Box<Expr>,
        member: Spanned<Name>,
    },
    /// A subroutine call.
    Call {
        callee: CallTarget,
        args: Vec<Expr>,
    },
    /// An explicit cast, like `T'(x)`.
    Cast {
        ty: Box<DataType>,
        expr: Box<Expr>,
    },
    /// An assignment pattern.
    Pattern(AssignmentPattern),
    /// A data type used in expression position.
    DataTypeExpr(Box<DataType>),
}

/// One segment of a scoped or hierarchical name.
#[derive(Debug)]
pub struct NameSeg {
    pub name: Spanned<Name>,
    pub selects: Vec<Expr>,
}

/// The callee of a call expression.
#[derive(Debug)]
pub enum CallTarget {
    /// A user subroutine, looked up by name.
    Name(Spanned<Name>),
    /// A system subroutine, like `$clog2`.
    System(Spanned<Name>),
}

/// The mode of a range select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSelectMode {
    /// `[msb:lsb]`
    Simple,
    /// `[base+:width]`
    IndexedUp,
    /// `[base-:width]`
    IndexedDown,
}

/// An assignment pattern.
#[derive(Debug)]
pub enum AssignmentPattern {
    /// `'{a, b, c}`
    Positional(Vec<Expr>),
    /// `'{field: x, default: y}`
    Keyed(Vec<(PatternKey, Expr)>),
    /// `'{N{a, b}}`
    Replicated { count: Box<Expr>, elems: Vec<Expr> },
}

/// The key of a keyed assignment pattern entry.
#[derive(Debug)]
pub enum PatternKey {
    /// A struct member name or an enum-valued element index.
    Name(Spanned<Name>),
    /// An element index.
    Index(Expr),
    /// A type key, applying to all elements of that type.
    Type(DataType),
    /// The `default:` key.
    Default(Span),
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicNot,
    RedAnd,
    RedOr,
    RedXor,
    RedNand,
    RedNor,
    RedXnor,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    BitXnor,
    Shl,
    Shr,
    AShr,
    Eq,
    Ne,
    CaseEq,
    CaseNe,
    WildcardEq,
    WildcardNe,
    Lt,
    Le,
    Gt,
    Ge,
    LogicAnd,
    LogicOr,
    LogicImplication,
    LogicEquivalence,
}

/// A time unit suffix on a time literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    MilliSecond,
    MicroSecond,
    NanoSecond,
    PicoSecond,
    FemtoSecond,
}

/// A statement.
#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    /// Create a new statement.
    pub fn new(kind: StmtKind, span: Span) -> Stmt {
        Stmt { kind, span }
    }
}

/// The different statements.
#[derive(Debug)]
pub enum StmtKind {
    Empty,
    Block {
        label: Option<Spanned<Name>>,
        stmts: Vec<Stmt>,
    },
    Expr(Expr),
    VarDecl(VarDecl),
    Return(Option<Expr>),
    Break,
    Continue,
    If {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Option<Box<Stmt>>,
    },
    Case {
        cond: Expr,
        items: Vec<CaseItem>,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Repeat {
        count: Expr,
        body: Box<Stmt>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Forever {
        body: Box<Stmt>,
    },
    Timed {
        control: TimingControl,
        stmt: Box<Stmt>,
    },
    Assert {
        cond: Expr,
    },
}

/// One arm of a case statement. An empty expression list marks the `default`
/// arm.
#[derive(Debug)]
pub struct CaseItem {
    pub exprs: Vec<Expr>,
    pub stmt: Stmt,
}

/// A timing control prefix on a statement.
#[derive(Debug)]
pub enum TimingControl {
    Delay(Expr),
    Event(Span),
}

/// Convenience constructors used by hosts and tests to assemble syntax trees
/// without a parser.
impl DataType {
    pub fn new(kind: DataTypeKind, span: Span) -> DataType {
        DataType { kind, span }
    }

    /// An implicit type with no signing and no dimensions.
    pub fn implicit(span: Span) -> DataType {
        DataType::new(
            DataTypeKind::Implicit {
                signed: false,
                dims: vec![],
            },
            span,
        )
    }

    /// Whether this is a fully empty implicit type.
    pub fn is_implicit_empty(&self) -> bool {
        match &self.kind {
            DataTypeKind::Implicit { signed, dims } => !signed && dims.is_empty(),
            _ => false,
        }
    }
}
