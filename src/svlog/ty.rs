// Copyright (c) 2016-2020 Fabian Schuiki

//! The SystemVerilog type system.
//!
//! Types are symbols; this module provides the [`Type`] wrapper that carries
//! the type-specific operations. Every type knows its *canonical* type, which
//! for most types is itself and for type aliases is the fully unwrapped
//! target. All type relations operate on canonical types.
//!
//! Simple bit vector types with one dimension and an LSB of zero canonicalize
//! to a shared representation that is uniquified in the compilation store, so
//! that pointer identity implies matching.

use crate::ast;
use crate::compilation::Compilation;
use crate::crate_prelude::*;
use crate::diag::{Diag, DiagCode};
use crate::declared::{DeclaredType, DeclaredTypeFlags};
use crate::scope::{LookupLocation, Scope};
use crate::svint::SVInt;
use crate::symbol::{
    EnumTypeSymbol, EnumValueSymbol, FieldSymbol, NetTypeKind, PackedArrayTypeSymbol,
    PackedStructTypeSymbol, PackedUnionTypeSymbol, Symbol, SymbolKind, UnpackedArrayTypeSymbol,
    UnpackedStructTypeSymbol, UnpackedUnionTypeSymbol,
};
use crate::value::{ConstantRange, ConstantValue};
use bitflags::bitflags;
use itertools::Itertools;
use std::fmt;

bitflags! {
    /// Traits of integral types. Unsigned and two-state are the defaults.
    pub struct IntegralFlags: u8 {
        const SIGNED = 0b001;
        const FOUR_STATE = 0b010;
        /// The type was declared with the `reg` keyword. Purely
        /// informational; does not affect any type relation.
        const REG = 0b100;
    }
}

/// The width, signedness, and domain shared by all integral types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegralData {
    pub width: usize,
    pub signed: bool,
    pub four_state: bool,
}

impl IntegralData {
    pub fn flags(&self) -> IntegralFlags {
        let mut flags = IntegralFlags::empty();
        if self.signed {
            flags |= IntegralFlags::SIGNED;
        }
        if self.four_state {
            flags |= IntegralFlags::FOUR_STATE;
        }
        flags
    }
}

/// The single-bit scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bit,
    Logic,
    Reg,
}

/// The predefined multi-bit integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefIntKind {
    Byte,
    ShortInt,
    Int,
    LongInt,
    Integer,
    Time,
}

impl PredefIntKind {
    pub fn width(self) -> usize {
        match self {
            PredefIntKind::Byte => 8,
            PredefIntKind::ShortInt => 16,
            PredefIntKind::Int => 32,
            PredefIntKind::LongInt => 64,
            PredefIntKind::Integer => 32,
            PredefIntKind::Time => 64,
        }
    }

    pub fn default_signed(self) -> bool {
        match self {
            PredefIntKind::Time => false,
            _ => true,
        }
    }

    pub fn four_state(self) -> bool {
        match self {
            PredefIntKind::Integer | PredefIntKind::Time => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PredefIntKind::Byte => "byte",
            PredefIntKind::ShortInt => "shortint",
            PredefIntKind::Int => "int",
            PredefIntKind::LongInt => "longint",
            PredefIntKind::Integer => "integer",
            PredefIntKind::Time => "time",
        }
    }
}

/// The floating point types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    ShortReal,
    Real,
    RealTime,
}

impl FloatKind {
    pub fn width(self) -> usize {
        match self {
            FloatKind::ShortReal => 32,
            _ => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FloatKind::ShortReal => "shortreal",
            FloatKind::Real => "real",
            FloatKind::RealTime => "realtime",
        }
    }
}

/// A type, wrapping the symbol that declares it. Copyable; compares by
/// pointer identity.
#[derive(Clone, Copy)]
pub struct Type<'a>(pub &'a Symbol<'a>);

impl<'a> PartialEq for Type<'a> {
    fn eq(&self, other: &Type<'a>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a> Eq for Type<'a> {}

impl<'a> Type<'a> {
    /// Wrap a symbol known to be a type.
    pub fn of(symbol: &'a Symbol<'a>) -> Option<Type<'a>> {
        if symbol.is_type() {
            Some(Type(symbol))
        } else {
            None
        }
    }

    /// Whether a symbol kind belongs to the type family.
    pub fn is_type_kind(kind: &SymbolKind) -> bool {
        match kind {
            SymbolKind::ScalarType(_)
            | SymbolKind::PredefinedIntegerType(_)
            | SymbolKind::FloatingType(_)
            | SymbolKind::EnumType(_)
            | SymbolKind::PackedArrayType(_)
            | SymbolKind::UnpackedArrayType(_)
            | SymbolKind::PackedStructType(_)
            | SymbolKind::UnpackedStructType(_)
            | SymbolKind::PackedUnionType(_)
            | SymbolKind::UnpackedUnionType(_)
            | SymbolKind::VoidType
            | SymbolKind::NullType
            | SymbolKind::CHandleType
            | SymbolKind::StringType
            | SymbolKind::EventType
            | SymbolKind::TypeAlias(_)
            | SymbolKind::ErrorType => true,
            _ => false,
        }
    }

    /// The canonical type, obtained by unwrapping all aliases.
    pub fn canonical(self, cx: &Compilation<'a>) -> Type<'a> {
        match &self.0.kind {
            SymbolKind::TypeAlias(alias) => {
                if let Some(c) = alias.canonical.get() {
                    return c;
                }
                let mut c = alias.target.ty(cx, self.0);
                if let SymbolKind::TypeAlias(_) = c.0.kind {
                    c = c.canonical(cx);
                }
                alias.canonical.set(Some(c));
                c
            }
            _ => self,
        }
    }

    /// Whether this is a type alias. Unlike the other predicates, this does
    /// not unwrap to the canonical type.
    pub fn is_alias(self) -> bool {
        match self.0.kind {
            SymbolKind::TypeAlias(_) => true,
            _ => false,
        }
    }

    /// The integral data of the canonical type, if it is integral.
    pub fn integral_data(self, cx: &Compilation<'a>) -> Option<IntegralData> {
        match &self.canonical(cx).0.kind {
            SymbolKind::ScalarType(x) => Some(x.data),
            SymbolKind::PredefinedIntegerType(x) => Some(x.data),
            SymbolKind::EnumType(x) => Some(x.data),
            SymbolKind::PackedArrayType(x) => Some(x.data),
            SymbolKind::PackedStructType(x) => Some(x.data),
            SymbolKind::PackedUnionType(x) => Some(x.data),
            _ => None,
        }
    }

    /// The total width of the type in bits; zero if not statically sized.
    pub fn width(self, cx: &Compilation<'a>) -> usize {
        if let Some(data) = self.integral_data(cx) {
            return data.width;
        }
        match &self.canonical(cx).0.kind {
            SymbolKind::FloatingType(kind) => kind.width(),
            _ => 0,
        }
    }

    /// Whether the type can represent negative values.
    pub fn is_signed(self, cx: &Compilation<'a>) -> bool {
        self.integral_data(cx).map(|d| d.signed).unwrap_or(false)
    }

    /// Whether the type can carry `x` and `z` bits. Drills into aggregate
    /// members.
    pub fn is_four_state(self, cx: &Compilation<'a>) -> bool {
        if let Some(data) = self.integral_data(cx) {
            return data.four_state;
        }
        match &self.canonical(cx).0.kind {
            SymbolKind::UnpackedArrayType(x) => x.element.is_four_state(cx),
            SymbolKind::UnpackedStructType(x) => struct_fields(cx, &x.scope)
                .into_iter()
                .any(|f| field_type(cx, f).is_four_state(cx)),
            SymbolKind::UnpackedUnionType(x) => struct_fields(cx, &x.scope)
                .into_iter()
                .any(|f| field_type(cx, f).is_four_state(cx)),
            _ => false,
        }
    }

    pub fn is_error(self) -> bool {
        match self.0.kind {
            SymbolKind::ErrorType => true,
            _ => false,
        }
    }

    pub fn is_integral(self, cx: &Compilation<'a>) -> bool {
        self.integral_data(cx).is_some()
    }

    pub fn is_scalar(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::ScalarType(_) => true,
            _ => false,
        }
    }

    pub fn is_predefined_integer(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::PredefinedIntegerType(_) => true,
            _ => false,
        }
    }

    pub fn is_floating(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::FloatingType(_) => true,
            _ => false,
        }
    }

    pub fn is_numeric(self, cx: &Compilation<'a>) -> bool {
        self.is_integral(cx) || self.is_floating(cx)
    }

    pub fn is_enum(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::EnumType(_) => true,
            _ => false,
        }
    }

    pub fn is_string(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::StringType => true,
            _ => false,
        }
    }

    pub fn is_void(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::VoidType => true,
            _ => false,
        }
    }

    pub fn is_packed_array(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::PackedArrayType(_) => true,
            _ => false,
        }
    }

    pub fn is_unpacked_array(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::UnpackedArrayType(_) => true,
            _ => false,
        }
    }

    pub fn is_unpacked_struct(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::UnpackedStructType(_) => true,
            _ => false,
        }
    }

    pub fn is_unpacked_union(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::UnpackedUnionType(_) => true,
            _ => false,
        }
    }

    /// Whether this is an unpacked aggregate.
    pub fn is_aggregate(self, cx: &Compilation<'a>) -> bool {
        self.is_unpacked_array(cx) || self.is_unpacked_struct(cx) || self.is_unpacked_union(cx)
    }

    /// Whether this is a simple bit vector type: a scalar, a predefined
    /// integer, or a packed array of scalars.
    pub fn is_simple_bit_vector(self, cx: &Compilation<'a>) -> bool {
        let c = self.canonical(cx);
        match &c.0.kind {
            SymbolKind::ScalarType(_) | SymbolKind::PredefinedIntegerType(_) => true,
            SymbolKind::PackedArrayType(x) => x.element.is_scalar(cx),
            _ => false,
        }
    }

    /// Whether a value of this type can be used as a predicate.
    pub fn is_boolean_convertible(self, cx: &Compilation<'a>) -> bool {
        match self.canonical(cx).0.kind {
            SymbolKind::NullType
            | SymbolKind::CHandleType
            | SymbolKind::StringType
            | SymbolKind::EventType => true,
            _ => self.is_numeric(cx),
        }
    }

    /// The scope of members, for enum/struct/union types.
    pub fn member_scope(self, cx: &Compilation<'a>) -> Option<&'a Scope<'a>> {
        let c = self.canonical(cx);
        match &c.0.kind {
            SymbolKind::EnumType(_)
            | SymbolKind::PackedStructType(_)
            | SymbolKind::UnpackedStructType(_)
            | SymbolKind::PackedUnionType(_)
            | SymbolKind::UnpackedUnionType(_) => c.0.scope(),
            _ => None,
        }
    }

    /// The element type, for array types.
    pub fn element_type(self, cx: &Compilation<'a>) -> Option<Type<'a>> {
        match &self.canonical(cx).0.kind {
            SymbolKind::PackedArrayType(x) => Some(x.element),
            SymbolKind::UnpackedArrayType(x) => Some(x.range).map(|_| x.element),
            _ => None,
        }
    }

    /// The address range of the bits of a simple bit vector, or the declared
    /// range of an array.
    pub fn array_range(self, cx: &Compilation<'a>) -> Option<ConstantRange> {
        let c = self.canonical(cx);
        match &c.0.kind {
            SymbolKind::PackedArrayType(x) => Some(x.range),
            SymbolKind::UnpackedArrayType(x) => Some(x.range),
            _ => {
                let data = self.integral_data(cx)?;
                Some(ConstantRange::new(data.width as i32 - 1, 0))
            }
        }
    }

    /// Whether the canonical scalar core was declared with `reg`.
    pub fn is_declared_reg(self, cx: &Compilation<'a>) -> bool {
        let mut ty = self.canonical(cx);
        loop {
            match &ty.0.kind {
                SymbolKind::PackedArrayType(x) => ty = x.element.canonical(cx),
                SymbolKind::ScalarType(x) => return x.kind == ScalarKind::Reg,
                _ => return false,
            }
        }
    }

    /// The integral flags of the type; empty for non-integral types.
    pub fn integral_flags(self, cx: &Compilation<'a>) -> IntegralFlags {
        let mut flags = match self.integral_data(cx) {
            Some(data) => data.flags(),
            None => return IntegralFlags::empty(),
        };
        if self.is_declared_reg(cx) {
            flags |= IntegralFlags::REG;
        }
        flags
    }

    /// The default value of the type: all-`x` for four-state integrals, zero
    /// otherwise, composed elementwise for aggregates.
    pub fn default_value(self, cx: &Compilation<'a>) -> ConstantValue {
        let c = self.canonical(cx);
        match &c.0.kind {
            SymbolKind::EnumType(x) => x.base.default_value(cx),
            SymbolKind::FloatingType(FloatKind::ShortReal) => ConstantValue::ShortReal(0.0),
            SymbolKind::FloatingType(_) => ConstantValue::Real(0.0),
            SymbolKind::StringType => ConstantValue::Str(String::new()),
            SymbolKind::NullType | SymbolKind::CHandleType | SymbolKind::EventType
            | SymbolKind::VoidType => ConstantValue::Null,
            SymbolKind::UnpackedArrayType(x) => ConstantValue::Elements(vec![
                x.element.default_value(cx);
                x.range.width()
            ]),
            SymbolKind::UnpackedStructType(x) => ConstantValue::Elements(
                struct_fields(cx, &x.scope)
                    .into_iter()
                    .map(|f| field_type(cx, f).default_value(cx))
                    .collect(),
            ),
            SymbolKind::UnpackedUnionType(x) => struct_fields(cx, &x.scope)
                .into_iter()
                .next()
                .map(|f| field_type(cx, f).default_value(cx))
                .unwrap_or(ConstantValue::Invalid),
            _ => match self.integral_data(cx) {
                Some(data) => {
                    if data.four_state {
                        ConstantValue::Integer(SVInt::fill_x(data.width, data.signed))
                    } else {
                        ConstantValue::Integer(SVInt::zero(data.width, data.signed))
                    }
                }
                None => ConstantValue::Invalid,
            },
        }
    }

    /// Whether the given type matches this one. Matching types are
    /// interchangeable for all intents and purposes.
    pub fn matching(self, cx: &Compilation<'a>, rhs: Type<'a>) -> bool {
        let l = self.canonical(cx);
        let r = rhs.canonical(cx);

        // Identical pointers cover all built-in and uniquified vector types.
        if l == r {
            return true;
        }

        // The scalar synonyms logic/reg match each other.
        if let (SymbolKind::ScalarType(ls), SymbolKind::ScalarType(rs)) = (&l.0.kind, &r.0.kind) {
            return ls.data == rs.data
                && ls.kind != ScalarKind::Bit
                && rs.kind != ScalarKind::Bit;
        }

        // The float synonyms real/realtime match each other.
        if let (SymbolKind::FloatingType(lf), SymbolKind::FloatingType(rf)) = (&l.0.kind, &r.0.kind)
        {
            return *lf != FloatKind::ShortReal && *rf != FloatKind::ShortReal;
        }

        // Simple bit vectors match when width, signedness, domain, and range
        // agree, regardless of how they were written.
        if l.is_simple_bit_vector(cx) && r.is_simple_bit_vector(cx) {
            let ld = l.integral_data(cx).unwrap();
            let rd = r.integral_data(cx).unwrap();
            return ld == rd && l.array_range(cx) == r.array_range(cx);
        }

        // Arrays match when their ranges are identical and their elements
        // match.
        match (&l.0.kind, &r.0.kind) {
            (SymbolKind::PackedArrayType(la), SymbolKind::PackedArrayType(ra)) => {
                la.range == ra.range && la.element.matching(cx, ra.element)
            }
            (SymbolKind::UnpackedArrayType(la), SymbolKind::UnpackedArrayType(ra)) => {
                la.range == ra.range && la.element.matching(cx, ra.element)
            }
            _ => false,
        }
    }

    /// Whether the given type is equivalent to this one, meaning values can
    /// be implicitly converted between the two.
    pub fn equivalent(self, cx: &Compilation<'a>, rhs: Type<'a>) -> bool {
        let l = self.canonical(cx);
        let r = rhs.canonical(cx);
        if l.matching(cx, r) {
            return true;
        }

        if l.is_integral(cx) && r.is_integral(cx) && !l.is_enum(cx) && !r.is_enum(cx) {
            return l.integral_data(cx).unwrap() == r.integral_data(cx).unwrap();
        }

        match (&l.0.kind, &r.0.kind) {
            (SymbolKind::UnpackedArrayType(la), SymbolKind::UnpackedArrayType(ra)) => {
                la.range.width() == ra.range.width() && la.element.equivalent(cx, ra.element)
            }
            _ => false,
        }
    }

    /// Whether values of the given type may be assigned to this one.
    pub fn assignment_compatible(self, cx: &Compilation<'a>, rhs: Type<'a>) -> bool {
        let l = self.canonical(cx);
        let r = rhs.canonical(cx);
        if l.equivalent(cx, r) {
            return true;
        }
        if (l.is_integral(cx) && !l.is_enum(cx)) || l.is_floating(cx) {
            return r.is_integral(cx) || r.is_floating(cx);
        }
        false
    }

    /// Whether values of the given type may be cast to this one.
    pub fn cast_compatible(self, cx: &Compilation<'a>, rhs: Type<'a>) -> bool {
        let l = self.canonical(cx);
        let r = rhs.canonical(cx);
        if l.assignment_compatible(cx, r) {
            return true;
        }
        if l.is_enum(cx) {
            return r.is_integral(cx) || r.is_floating(cx);
        }
        if l.is_string(cx) {
            return r.is_integral(cx);
        }
        if r.is_string(cx) {
            return l.is_integral(cx);
        }
        false
    }

    /// Render the type for diagnostics.
    pub fn display(self, cx: &Compilation<'a>) -> String {
        if let SymbolKind::TypeAlias(_) = self.0.kind {
            return format!("{}", self.0.name);
        }
        match &self.0.kind {
            SymbolKind::ScalarType(x) => {
                let mut s = match x.kind {
                    ScalarKind::Bit => "bit".to_string(),
                    ScalarKind::Logic => "logic".to_string(),
                    ScalarKind::Reg => "reg".to_string(),
                };
                if x.data.signed {
                    s.push_str(" signed");
                }
                s
            }
            SymbolKind::PredefinedIntegerType(x) => {
                let mut s = x.kind.name().to_string();
                if x.data.signed != x.kind.default_signed() {
                    s.push_str(if x.data.signed { " signed" } else { " unsigned" });
                }
                s
            }
            SymbolKind::FloatingType(kind) => kind.name().to_string(),
            SymbolKind::EnumType(_) => "enum".to_string(),
            SymbolKind::PackedArrayType(x) => {
                let mut core = x.element;
                let mut dims = vec![x.range];
                while let SymbolKind::PackedArrayType(inner) = &core.0.kind {
                    dims.push(inner.range);
                    core = inner.element;
                }
                format!(
                    "{} {}",
                    core.display(cx),
                    dims.iter()
                        .map(|dim| format!("[{}:{}]", dim.left, dim.right))
                        .join("")
                )
            }
            SymbolKind::UnpackedArrayType(x) => {
                format!("{} $[{}:{}]", x.element.display(cx), x.range.left, x.range.right)
            }
            SymbolKind::PackedStructType(_) => "struct packed".to_string(),
            SymbolKind::UnpackedStructType(_) => "struct".to_string(),
            SymbolKind::PackedUnionType(_) => "union packed".to_string(),
            SymbolKind::UnpackedUnionType(_) => "union".to_string(),
            SymbolKind::VoidType => "void".to_string(),
            SymbolKind::NullType => "null".to_string(),
            SymbolKind::CHandleType => "chandle".to_string(),
            SymbolKind::StringType => "string".to_string(),
            SymbolKind::EventType => "event".to_string(),
            SymbolKind::ErrorType => "<error>".to_string(),
            _ => self.0.kind_name().to_string(),
        }
    }
}

impl<'a> fmt::Debug for Type<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Type({:?})", self.0)
    }
}

/// The field symbols of a struct or union scope, in declaration order.
pub fn struct_fields<'a>(cx: &Compilation<'a>, scope: &'a Scope<'a>) -> Vec<&'a Symbol<'a>> {
    scope
        .members(cx)
        .into_iter()
        .filter(|m| match m.kind {
            SymbolKind::Field(_) => true,
            _ => false,
        })
        .collect()
}

/// The resolved type of a field symbol.
pub fn field_type<'a>(cx: &Compilation<'a>, field: &'a Symbol<'a>) -> Type<'a> {
    field
        .declared_type()
        .map(|d| d.ty(cx, field))
        .unwrap_or_else(|| cx.error_type())
}

/// Map a data type syntax node to a type.
pub fn type_from_syntax<'a>(
    cx: &Compilation<'a>,
    syntax: &'a ast::DataType,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
    force_signed: bool,
) -> Type<'a> {
    match &syntax.kind {
        ast::DataTypeKind::Implicit { signed, dims } => integral_from_syntax(
            cx,
            ScalarKind::Logic,
            dims,
            *signed || force_signed,
            location,
            scope,
        ),
        ast::DataTypeKind::IntVec { kind, signed, dims } => {
            let scalar = match kind {
                ast::IntVecKind::Bit => ScalarKind::Bit,
                ast::IntVecKind::Logic => ScalarKind::Logic,
                ast::IntVecKind::Reg => ScalarKind::Reg,
            };
            integral_from_syntax(cx, scalar, dims, *signed || force_signed, location, scope)
        }
        ast::DataTypeKind::IntAtom { kind, signed } => {
            let predef = match kind {
                ast::IntAtomKind::Byte => PredefIntKind::Byte,
                ast::IntAtomKind::ShortInt => PredefIntKind::ShortInt,
                ast::IntAtomKind::Int => PredefIntKind::Int,
                ast::IntAtomKind::LongInt => PredefIntKind::LongInt,
                ast::IntAtomKind::Integer => PredefIntKind::Integer,
                ast::IntAtomKind::Time => PredefIntKind::Time,
            };
            match signed {
                None if !force_signed => cx.predef_type(predef),
                _ => {
                    let signed = signed.unwrap_or(false) || force_signed;
                    if signed == predef.default_signed() {
                        cx.predef_type(predef)
                    } else {
                        let mut flags = IntegralFlags::empty();
                        if signed {
                            flags |= IntegralFlags::SIGNED;
                        }
                        if predef.four_state() {
                            flags |= IntegralFlags::FOUR_STATE;
                        }
                        cx.vector_type(predef.width(), flags)
                    }
                }
            }
        }
        ast::DataTypeKind::Real(kind) => cx.float_type(match kind {
            ast::RealKind::ShortReal => FloatKind::ShortReal,
            ast::RealKind::Real => FloatKind::Real,
            ast::RealKind::RealTime => FloatKind::RealTime,
        }),
        ast::DataTypeKind::String => cx.string_type(),
        ast::DataTypeKind::Chandle => cx.chandle_type(),
        ast::DataTypeKind::Event => cx.event_type(),
        ast::DataTypeKind::Void => cx.void_type(),
        ast::DataTypeKind::Enum { base, members } => {
            enum_from_syntax(cx, syntax, base, members, location, scope, force_signed)
        }
        ast::DataTypeKind::Struct {
            union,
            packed,
            signed,
            members,
            dims,
        } => {
            if *packed {
                packed_struct_from_syntax(
                    cx,
                    *union,
                    *signed || force_signed,
                    members,
                    dims,
                    location,
                    scope,
                    syntax.span,
                )
            } else {
                unpacked_struct_from_syntax(cx, *union, members, dims, syntax.span, scope)
            }
        }
        ast::DataTypeKind::Named {
            package,
            name,
            dims,
        } => {
            let ty = lookup_named_type(cx, *package, *name, location, scope);
            wrap_packed_dims(cx, ty, dims, location, scope)
        }
        ast::DataTypeKind::TypeRef(_) | ast::DataTypeKind::VirtualInterface(_) => {
            cx.emit(Diag::new(DiagCode::NotYetSupported).span(syntax.span));
            cx.error_type()
        }
    }
}

/// Build a simple integral vector type from a scalar core and packed
/// dimensions.
fn integral_from_syntax<'a>(
    cx: &Compilation<'a>,
    scalar: ScalarKind,
    dims: &'a [ast::PackedDim],
    signed: bool,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Type<'a> {
    let mut ranges = vec![];
    for dim in dims {
        match eval_packed_dim(cx, dim, location, scope) {
            Some(range) => ranges.push(range),
            None => return cx.error_type(),
        }
    }

    let mut flags = IntegralFlags::empty();
    if signed {
        flags |= IntegralFlags::SIGNED;
    }
    if scalar != ScalarKind::Bit {
        flags |= IntegralFlags::FOUR_STATE;
    }
    if scalar == ScalarKind::Reg {
        flags |= IntegralFlags::REG;
    }

    if ranges.is_empty() {
        return cx.scalar_type(scalar, signed);
    }

    // The common case of one dimension with an LSB of zero canonicalizes to
    // the shared representation.
    if ranges.len() == 1 && ranges[0].right == 0 && ranges[0].is_little_endian() {
        return cx.vector_type(ranges[0].width(), flags);
    }

    let mut result = cx.scalar_type(scalar, signed);
    for &range in ranges.iter().rev() {
        result = make_packed_array(cx, result, range);
    }
    result
}

/// Wrap a type in packed array dimensions, right to left.
fn wrap_packed_dims<'a>(
    cx: &Compilation<'a>,
    mut ty: Type<'a>,
    dims: &'a [ast::PackedDim],
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Type<'a> {
    if ty.is_error() {
        return ty;
    }
    let mut ranges = vec![];
    for dim in dims {
        match eval_packed_dim(cx, dim, location, scope) {
            Some(range) => ranges.push(range),
            None => return cx.error_type(),
        }
    }
    for &range in ranges.iter().rev() {
        ty = make_packed_array(cx, ty, range);
    }
    ty
}

/// Allocate a packed array type over an element type.
pub fn make_packed_array<'a>(
    cx: &Compilation<'a>,
    element: Type<'a>,
    range: ConstantRange,
) -> Type<'a> {
    if element.is_error() {
        return element;
    }
    let data = IntegralData {
        width: element.width(cx) * range.width(),
        signed: element.is_signed(cx),
        four_state: element.is_four_state(cx),
    };
    let sym = cx.alloc_symbol(Symbol::new(
        crate::compilation::empty_name(),
        silica_common::source::INVALID_SPAN,
        SymbolKind::PackedArrayType(PackedArrayTypeSymbol {
            data,
            element,
            range,
        }),
    ));
    Type(sym)
}

/// Wrap a type in unpacked dimensions.
pub fn wrap_unpacked_dims<'a>(
    cx: &Compilation<'a>,
    mut ty: Type<'a>,
    dims: &'a [ast::Dim],
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Type<'a> {
    if ty.is_error() {
        return ty;
    }
    let mut ranges = vec![];
    for dim in dims {
        match eval_unpacked_dim(cx, dim, location, scope) {
            Some(range) => ranges.push(range),
            None => return cx.error_type(),
        }
    }
    for &range in ranges.iter().rev() {
        let sym = cx.alloc_symbol(Symbol::new(
            crate::compilation::empty_name(),
            silica_common::source::INVALID_SPAN,
            SymbolKind::UnpackedArrayType(UnpackedArrayTypeSymbol { element: ty, range }),
        ));
        ty = Type(sym);
    }
    ty
}

/// Evaluate a packed dimension to a constant range.
pub fn eval_packed_dim<'a>(
    cx: &Compilation<'a>,
    dim: &'a ast::PackedDim,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Option<ConstantRange> {
    match dim {
        ast::PackedDim::Range(left, right) => eval_dim_range(cx, left, right, location, scope),
        ast::PackedDim::Unsized(span) => {
            cx.emit(Diag::new(DiagCode::NotYetSupported).span(*span));
            None
        }
    }
}

/// Evaluate an unpacked dimension to a constant range.
pub fn eval_unpacked_dim<'a>(
    cx: &Compilation<'a>,
    dim: &'a ast::Dim,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Option<ConstantRange> {
    match dim {
        ast::Dim::Range(left, right) => eval_dim_range(cx, left, right, location, scope),
        ast::Dim::Size(size) => {
            let n = crate::expr::eval_constant_integer_at(cx, scope, location, size)?;
            if n <= 0 {
                cx.emit(Diag::new(DiagCode::ValueMustBePositive).span(size.span));
                return None;
            }
            Some(ConstantRange::new(0, n - 1))
        }
        ast::Dim::Unsized(span) | ast::Dim::Associative(span) | ast::Dim::Queue(span) => {
            cx.emit(Diag::new(DiagCode::NotYetSupported).span(*span));
            None
        }
    }
}

fn eval_dim_range<'a>(
    cx: &Compilation<'a>,
    left: &'a ast::Expr,
    right: &'a ast::Expr,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Option<ConstantRange> {
    let l = crate::expr::eval_constant_integer_at(cx, scope, location, left);
    let r = crate::expr::eval_constant_integer_at(cx, scope, location, right);
    match (l, r) {
        (Some(l), Some(r)) => Some(ConstantRange::new(l, r)),
        _ => {
            cx.emit(
                Diag::new(DiagCode::InvalidDimensionRange)
                    .span(Span::union(left.span, right.span)),
            );
            None
        }
    }
}

/// Resolve a named type.
fn lookup_named_type<'a>(
    cx: &Compilation<'a>,
    package: Option<Spanned<Name>>,
    name: Spanned<Name>,
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
) -> Type<'a> {
    let symbol = if let Some(pkg) = package {
        let pkg_sym = match cx.get_package(pkg.value) {
            Some(p) => p,
            None => {
                cx.emit(Diag::new(DiagCode::UnknownPackage).arg(pkg.value).span(pkg.span));
                return cx.error_type();
            }
        };
        match pkg_sym.scope().unwrap().find(cx, name.value) {
            Some(s) => s,
            None => {
                cx.emit(
                    Diag::new(DiagCode::UnknownMember)
                        .arg(name.value)
                        .arg(pkg.value)
                        .span(name.span),
                );
                return cx.error_type();
            }
        }
    } else {
        match scope.lookup_unqualified(cx, name, location) {
            Some(s) => s,
            None => {
                cx.emit(
                    Diag::new(DiagCode::UndeclaredIdentifier)
                        .arg(name.value)
                        .span(name.span),
                );
                return cx.error_type();
            }
        }
    };

    match &symbol.kind {
        SymbolKind::TypeParameter(param) => param.declared.ty(cx, symbol),
        _ => match Type::of(symbol) {
            Some(ty) => ty,
            None => {
                cx.emit(Diag::new(DiagCode::NotAType).arg(name.value).span(name.span));
                cx.error_type()
            }
        },
    }
}

/// Build an enum type from syntax.
fn enum_from_syntax<'a>(
    cx: &Compilation<'a>,
    syntax: &'a ast::DataType,
    base_syntax: &'a Option<Box<ast::DataType>>,
    members: &'a [ast::EnumMember],
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
    force_signed: bool,
) -> Type<'a> {
    // The base type defaults to a signed 32-bit int.
    let base = match base_syntax {
        None => cx.predef_type(PredefIntKind::Int),
        Some(b) => {
            let base = type_from_syntax(cx, b, location, scope, force_signed);
            let cb = base.canonical(cx);
            if !cb.is_error() && !cb.is_simple_bit_vector(cx) {
                cx.emit(
                    Diag::new(DiagCode::InvalidEnumBase)
                        .arg(base.display(cx))
                        .span(b.span),
                );
                return cx.error_type();
            }
            base
        }
    };
    if base.is_error() {
        return cx.error_type();
    }

    let data = IntegralData {
        width: base.width(cx),
        signed: base.is_signed(cx),
        four_state: base.is_four_state(cx),
    };
    let enum_sym = cx.alloc_symbol(Symbol::new(
        crate::compilation::empty_name(),
        syntax.span,
        SymbolKind::EnumType(EnumTypeSymbol {
            data,
            base,
            scope: Scope::new(),
        }),
    ));
    // The enum does not live as a member of the parent scope, but name
    // lookups from its value initializers must reach the enclosing names.
    enum_sym.set_parent(scope.owner(), location.index);
    let enum_ty = Type(enum_sym);
    let enum_scope = enum_sym.scope().unwrap();

    let all_ones = SVInt::all_ones(data.width, data.signed);
    let one = SVInt::from_u64(data.width, 1, data.signed);
    let mut previous: Option<(SVInt, Span)> = None;
    let mut used: Vec<(SVInt, Span)> = vec![];

    let mut check_value = |cx: &Compilation<'a>, value: &SVInt, span: Span| -> bool {
        if let Some((_, prev_span)) = used.iter().find(|(v, _)| v.case_eq(value)) {
            cx.emit(
                Diag::new(DiagCode::EnumValueDuplicate)
                    .arg(value)
                    .span(span)
                    .note(Diag::new(DiagCode::NotePreviousDefinition).span(*prev_span)),
            );
            return false;
        }
        used.push((value.clone(), span));
        true
    };

    let mut add_value = |cx: &Compilation<'a>,
                         member: &'a ast::EnumMember,
                         name: Name,
                         take_initializer: bool,
                         previous: &mut Option<(SVInt, Span)>|
     -> Option<()> {
        let declared = DeclaredType::new();
        declared.set_type(enum_ty);
        declared.add_flags(DeclaredTypeFlags::REQUIRE_CONSTANT | DeclaredTypeFlags::ENUM_INITIALIZER);
        let ev = cx.alloc_symbol(Symbol::new(
            name,
            member.name.span,
            SymbolKind::EnumValue(EnumValueSymbol::new(declared)),
        ));
        enum_scope.add_member(ev);

        if take_initializer && member.init.is_some() {
            let init = member.init.as_ref().unwrap();
            ev.declared_type()
                .unwrap()
                .set_initializer_syntax(&init.expr, init.equals);
            let value = match &ev.kind {
                SymbolKind::EnumValue(x) => {
                    let cv = x.declared.constant_value(cx, ev);
                    match cv {
                        ConstantValue::Integer(v) => Some(v),
                        _ => None,
                    }
                }
                _ => unreachable!(),
            };
            if let Some(v) = value {
                check_value(cx, &v, init.expr.span);
                *previous = Some((v, init.expr.span));
            }
            return Some(());
        }

        // No initializer: increment the previous value, starting at zero.
        let value = match previous {
            None => SVInt::zero(data.width, data.signed),
            Some((prev, prev_span)) => {
                if prev.has_unknown() {
                    cx.emit(
                        Diag::new(DiagCode::EnumIncrementUnknown)
                            .arg(prev)
                            .span(member.name.span)
                            .note(Diag::new(DiagCode::NotePreviousDefinition).span(*prev_span)),
                    );
                    return None;
                }
                if prev.case_eq(&all_ones) {
                    cx.emit(
                        Diag::new(DiagCode::EnumValueOverflow)
                            .arg(prev)
                            .arg(base.display(cx))
                            .span(member.name.span)
                            .note(Diag::new(DiagCode::NotePreviousDefinition).span(*prev_span)),
                    );
                    return None;
                }
                prev.add(&one)
            }
        };
        if !check_value(cx, &value, member.name.span) {
            return None;
        }
        match &ev.kind {
            SymbolKind::EnumValue(x) => x.set_value(ConstantValue::Integer(value.clone())),
            _ => unreachable!(),
        }
        *previous = Some((value, member.name.span));
        Some(())
    };

    for member in members {
        if member.dims.is_empty() {
            add_value(cx, member, member.name.value, true, &mut previous);
            continue;
        }
        if member.dims.len() > 1 {
            cx.emit(Diag::new(DiagCode::EnumRangeMultiDimensional).span(member.name.span));
            return cx.error_type();
        }
        let range = match eval_unpacked_dim(cx, &member.dims[0], location, scope) {
            Some(r) => r,
            None => return cx.error_type(),
        };
        if range.left < 0 || range.right < 0 {
            cx.emit(Diag::new(DiagCode::ValueMustBePositive).span(member.name.span));
            return cx.error_type();
        }
        // Generate one value per index; only the first takes the
        // initializer.
        let down = range.is_little_endian();
        let mut index = range.left;
        let mut first = true;
        loop {
            let name = Name::intern(&format!("{}{}", member.name.value, index));
            add_value(cx, member, name, first, &mut previous);
            first = false;
            if index == range.right {
                break;
            }
            index = if down { index - 1 } else { index + 1 };
        }
    }

    enum_ty
}

/// Build a packed struct or union type from syntax.
fn packed_struct_from_syntax<'a>(
    cx: &Compilation<'a>,
    union: bool,
    signed: bool,
    members: &'a [ast::StructMember],
    dims: &'a [ast::PackedDim],
    location: LookupLocation<'a>,
    scope: &'a Scope<'a>,
    span: Span,
) -> Type<'a> {
    let mut four_state = false;
    let mut bit_width = 0usize;
    let mut union_width = 0usize;
    let mut fields: Vec<(&'a ast::Declarator, Type<'a>, u32)> = vec![];

    // Members are declared MSB first, so offsets are assigned in reverse.
    let mut flat: Vec<(&'a ast::StructMember, &'a ast::Declarator)> = vec![];
    for member in members {
        for decl in &member.decls {
            flat.push((member, decl));
        }
    }
    let mut types: Vec<Type<'a>> = vec![];
    for &(member, _) in &flat {
        let ty = type_from_syntax(cx, &member.ty, location, scope, false);
        types.push(ty);
    }
    for (i, &(member, decl)) in flat.iter().enumerate().rev() {
        let ty = types[i];
        four_state |= ty.is_four_state(cx);
        let mut issued = false;
        if !ty.is_integral(cx) && !ty.is_error() {
            issued = true;
            cx.emit(
                Diag::new(DiagCode::PackedMemberNotIntegral)
                    .arg(ty.display(cx))
                    .span(member.ty.span),
            );
        }
        if !decl.dims.is_empty() && !issued {
            cx.emit(
                Diag::new(DiagCode::PackedMemberNotIntegral)
                    .arg(ty.display(cx))
                    .span(decl.name.span),
            );
        }
        if let Some(init) = &decl.init {
            cx.emit(Diag::new(DiagCode::PackedMemberHasInitializer).span(init.equals));
        }
        let offset;
        if union {
            offset = 0;
            let w = ty.width(cx);
            if union_width == 0 {
                union_width = w;
            } else if union_width != w && !issued && !ty.is_error() {
                cx.emit(Diag::new(DiagCode::PackedUnionWidthMismatch).span(decl.name.span));
            }
        } else {
            offset = bit_width as u32;
            bit_width += ty.width(cx);
        }
        fields.push((decl, ty, offset));
    }
    fields.reverse();

    let width = if union { union_width } else { bit_width };
    if width == 0 {
        cx.emit(Diag::new(DiagCode::PackedTypeEmpty).span(span));
        return cx.error_type();
    }

    let data = IntegralData {
        width,
        signed,
        four_state,
    };
    let sym = cx.alloc_symbol(Symbol::new(
        crate::compilation::empty_name(),
        span,
        if union {
            SymbolKind::PackedUnionType(PackedUnionTypeSymbol {
                data,
                scope: Scope::new(),
            })
        } else {
            SymbolKind::PackedStructType(PackedStructTypeSymbol {
                data,
                scope: Scope::new(),
            })
        },
    ));
    sym.set_parent(scope.owner(), location.index);
    let member_scope = sym.scope().unwrap();
    for (decl, ty, offset) in fields {
        let declared = DeclaredType::new();
        declared.set_type(ty);
        let field = cx.alloc_symbol(Symbol::new(
            decl.name.value,
            decl.name.span,
            SymbolKind::Field(FieldSymbol { declared, offset }),
        ));
        member_scope.add_member(field);
    }

    wrap_packed_dims(cx, Type(sym), dims, location, scope)
}

/// Build an unpacked struct or union type from syntax.
fn unpacked_struct_from_syntax<'a>(
    cx: &Compilation<'a>,
    union: bool,
    members: &'a [ast::StructMember],
    dims: &'a [ast::PackedDim],
    span: Span,
    scope: &'a Scope<'a>,
) -> Type<'a> {
    if !dims.is_empty() {
        cx.emit(Diag::new(DiagCode::NotYetSupported).span(span));
    }
    let sym = cx.alloc_symbol(Symbol::new(
        crate::compilation::empty_name(),
        span,
        if union {
            SymbolKind::UnpackedUnionType(UnpackedUnionTypeSymbol { scope: Scope::new() })
        } else {
            SymbolKind::UnpackedStructType(UnpackedStructTypeSymbol { scope: Scope::new() })
        },
    ));
    sym.set_parent(scope.owner(), crate::symbol::SymbolIndex::MAX);
    let member_scope = sym.scope().unwrap();
    let mut index = 0u32;
    for member in members {
        for decl in &member.decls {
            let declared = DeclaredType::new();
            declared.set_type_syntax(&member.ty);
            if !decl.dims.is_empty() {
                declared.set_dims_syntax(&decl.dims);
            }
            let field = cx.alloc_symbol(Symbol::new(
                decl.name.value,
                decl.name.span,
                SymbolKind::Field(FieldSymbol {
                    declared,
                    offset: if union { 0 } else { index },
                }),
            ));
            member_scope.add_member(field);
            index += 1;
        }
    }
    Type(sym)
}

/// Resolve a user-defined net type declaration, determining its alias target
/// or data type.
pub fn resolve_net_type<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) {
    let nt = match &sym.kind {
        SymbolKind::NetType(x) => x,
        _ => panic!("resolve_net_type called on {:?}", sym),
    };
    if nt.resolved.get() {
        return;
    }
    nt.resolved.set(true);
    let syntax = match nt.syntax {
        Some(s) => s,
        None => return,
    };
    let scope = sym.parent_scope().expect("net type must live in a scope");

    if let Some(res) = &syntax.resolution {
        match scope.lookup_unqualified(cx, *res, LookupLocation::before(sym)) {
            Some(func) => match func.kind {
                SymbolKind::Subroutine(_) => nt.resolution.set(Some(func)),
                _ => {
                    cx.emit(
                        Diag::new(DiagCode::NotASubroutine)
                            .arg(res.value)
                            .span(res.span),
                    );
                }
            },
            None => {
                cx.emit(
                    Diag::new(DiagCode::UndeclaredIdentifier)
                        .arg(res.value)
                        .span(res.span),
                );
            }
        }
    }

    // The type syntax is either a link to another net type being aliased, or
    // an actual data type forming the basis of a custom net type.
    if let ast::DataTypeKind::Named {
        package: None,
        name,
        dims,
    } = &syntax.ty.kind
    {
        if dims.is_empty() {
            if let Some(found) = scope.lookup_unqualified(cx, *name, LookupLocation::before(sym)) {
                if let SymbolKind::NetType(_) = found.kind {
                    nt.alias.set(Some(found));
                    return;
                }
            }
        }
    }
    nt.declared.set_type_syntax(&syntax.ty);
}

/// The canonical net type, obtained by unwrapping aliases.
pub fn canonical_net_type<'a>(cx: &Compilation<'a>, mut sym: &'a Symbol<'a>) -> &'a Symbol<'a> {
    loop {
        resolve_net_type(cx, sym);
        let nt = match &sym.kind {
            SymbolKind::NetType(x) => x,
            _ => return sym,
        };
        match nt.alias.get() {
            Some(target) if !std::ptr::eq(target, sym) => sym = target,
            _ => return sym,
        }
    }
}

/// The data type carried by nets of the given net type.
pub fn net_type_data_type<'a>(cx: &Compilation<'a>, sym: &'a Symbol<'a>) -> Type<'a> {
    let canonical = canonical_net_type(cx, sym);
    match &canonical.kind {
        SymbolKind::NetType(x) => match x.kind {
            NetTypeKind::Unknown => cx.error_type(),
            _ => x.declared.ty(cx, canonical),
        },
        _ => cx.error_type(),
    }
}
