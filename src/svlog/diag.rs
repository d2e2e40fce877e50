// Copyright (c) 2016-2020 Fabian Schuiki

//! Diagnostic codes for the elaboration engine.
//!
//! Every diagnostic the engine produces is addressed by a [`DiagCode`]. The
//! codes, their default severity, their class, and their message templates
//! are kept in one declarative table, from which the enum and its accessors
//! are generated. Warning codes may carry a group name, which allows hosts to
//! collectively enable or disable them.

use crate::crate_prelude::*;
use silica_common::errors::{DiagBuilder2, Severity};

/// The broad classes diagnostics are sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagClass {
    Lexical,
    Numeric,
    Preprocessor,
    Parser,
    Declarations,
    Expressions,
    Statements,
    Types,
    Lookup,
    SysFuncs,
    ConstEval,
    General,
}

macro_rules! diag_group {
    (-) => {
        None
    };
    ($name:literal) => {
        Some($name)
    };
}

macro_rules! diag_table {
    ($($code:ident: $class:ident, $sev:ident, $group:tt, $msg:literal;)*) => {
        /// A diagnostic code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DiagCode {
            $($code,)*
        }

        impl DiagCode {
            /// The default severity of this code.
            pub fn severity(self) -> Severity {
                match self {
                    $(DiagCode::$code => Severity::$sev,)*
                }
            }

            /// The class this code belongs to.
            pub fn class(self) -> DiagClass {
                match self {
                    $(DiagCode::$code => DiagClass::$class,)*
                }
            }

            /// The message template, with `{}` argument placeholders.
            pub fn template(self) -> &'static str {
                match self {
                    $(DiagCode::$code => $msg,)*
                }
            }

            /// The warning group this code belongs to, if any.
            pub fn group(self) -> Option<&'static str> {
                match self {
                    $(DiagCode::$code => diag_group!($group),)*
                }
            }

            /// The name of this code.
            pub fn name(self) -> &'static str {
                match self {
                    $(DiagCode::$code => stringify!($code),)*
                }
            }
        }
    };
}

diag_table! {
    // General
    NotYetSupported: General, Error, -, "language construct is not yet supported";

    // Types
    InvalidEnumBase: Types, Error, -, "invalid enum base type {}; must be a simple bit vector type";
    EnumValueDuplicate: Types, Error, -, "enum value {} already used";
    EnumIncrementUnknown: Types, Error, -, "cannot increment enum value past {} because it contains unknown bits";
    EnumValueOverflow: Types, Error, -, "incrementing enum value past {} overflows the base type {}";
    EnumRangeMultiDimensional: Types, Error, -, "enum range declarators may only have a single dimension";
    ValueMustBePositive: Types, Error, -, "value must be positive";
    PackedMemberNotIntegral: Types, Error, -, "packed members must be of integral type; {} is not";
    PackedMemberHasInitializer: Types, Error, -, "packed members may not have initializers";
    PackedUnionWidthMismatch: Types, Error, -, "all members of a packed union must have the same width";
    PackedTypeEmpty: Types, Error, -, "packed type must have at least one member";
    NotAType: Types, Error, -, "`{}` is not a type";
    RecursiveDefinition: Types, Error, -, "`{}` recursively depends on its own definition";
    ForwardTypedefDoesNotMatch: Types, Error, -, "forward typedef was declared `{}`, which does not match the definition";
    InvalidDimensionRange: Types, Error, -, "dimension bounds are not valid constants";

    // Lookup
    UndeclaredIdentifier: Lookup, Error, -, "`{}` is not declared";
    AmbiguousWildcardImport: Lookup, Error, -, "`{}` is ambiguously imported from multiple packages";
    UnknownPackage: Lookup, Error, -, "unknown package `{}`";
    UnknownMember: Lookup, Error, -, "no member `{}` in `{}`";
    NotAHierarchicalScope: Lookup, Error, -, "cannot select `{}` within `{}`, which is not a scope";
    UsedBeforeDeclared: Lookup, Error, -, "`{}` is used before it is declared";
    NotAGenvar: Lookup, Error, -, "`{}` is not a genvar";
    NotAValue: Lookup, Error, -, "`{}` does not refer to a value";
    HierarchicalNotAllowedHere: Lookup, Error, -, "hierarchical names are not allowed here";
    ScopeNotIndexable: Lookup, Error, -, "`{}` cannot be indexed into";
    ScopeIndexOutOfRange: Lookup, Error, -, "index {} is outside the bounds of `{}`";

    // Declarations
    Redefinition: Declarations, Error, -, "`{}` is already declared";
    UnknownModule: Declarations, Error, -, "unknown module, interface, or program `{}`";
    MixingOrderedAndNamedParams: Declarations, Error, -, "ordered and named parameter assignments cannot be mixed";
    DuplicateParamAssignment: Declarations, Error, -, "parameter `{}` is assigned more than once";
    TooManyParamAssignments: Declarations, Error, -, "too many parameter assignments for `{}`; expected at most {} but got {}";
    AssignedToLocalPortParam: Declarations, Error, -, "cannot assign to a localparam in the parameter port list";
    AssignedToLocalBodyParam: Declarations, Error, -, "cannot assign to a localparam in the module body";
    ParameterDoesNotExist: Declarations, Error, -, "parameter `{}` does not exist in `{}`";
    ParamHasNoValue: Declarations, Error, -, "instance of `{}` does not provide a value for parameter `{}`, which has no default";
    BadTypeParamExpr: Declarations, Error, -, "the value assigned to type parameter `{}` is not a type";
    MissingPortIODeclaration: Declarations, Error, -, "port `{}` has no I/O declaration in the module body";
    CantDeclarePortSigned: Declarations, Error, -, "port `{}` of type {} cannot be declared signed";
    InOutPortCannotBeVariable: Declarations, Error, -, "inout port `{}` must be a net";
    RefPortMustBeVariable: Declarations, Error, -, "ref port `{}` must be a variable";
    UnknownInterface: Declarations, Error, -, "unknown interface `{}`";
    PortTypeNotInterfaceOrData: Declarations, Error, -, "`{}` is neither a data type nor an interface";
    VarWithInterfacePort: Declarations, Error, -, "interface ports cannot carry the `var` keyword";
    DirectionWithInterfacePort: Declarations, Error, -, "interface ports cannot have a direction";
    NotAModport: Declarations, Error, -, "`{}` is not a modport";
    GenvarDuplicate: Declarations, Error, -, "genvar assumes the value {} twice; aborting generate loop";
    GenvarUnknownBits: Declarations, Error, -, "genvar value {} contains unknown bits";
    CaseGenerateDup: Declarations, Warning, "case-gen", "more than one case generate arm matches {}";
    CaseGenerateNoBlock: Declarations, Error, -, "no case generate arm matches {} and there is no default";
    MixingOrderedAndNamedPorts: Declarations, Error, -, "ordered and named port connections cannot be mixed";
    DuplicatePortConnection: Declarations, Error, -, "port `{}` is connected more than once";
    DuplicateWildcardPortConnection: Declarations, Error, -, "`.*` may appear at most once in a port list";
    TooManyPortConnections: Declarations, Error, -, "too many port connections for `{}`; expected at most {} but got {}";
    PortDoesNotExist: Declarations, Error, -, "port `{}` does not exist in `{}`";
    UnconnectedNamedPort: Declarations, Warning, "unconnected-port", "port `{}` is not connected";
    UnconnectedUnnamedPort: Declarations, Warning, "unconnected-port", "instance leaves an unnamed port unconnected";
    ImplicitNamedPortNotFound: Declarations, Error, -, "no value named `{}` found for implicit named port connection";
    ImplicitNamedPortTypeMismatch: Declarations, Error, -, "implicit named port `{}` of type {} connects to a value of non-equivalent type {}";
    InterfacePortNotConnected: Declarations, Error, -, "interface port `{}` is not connected";
    InterfacePortInvalidExpression: Declarations, Error, -, "the connection to interface port `{}` must be a named interface";
    NotAnInterface: Declarations, Error, -, "`{}` is not an interface instance";
    InterfacePortTypeMismatch: Declarations, Error, -, "cannot connect interface `{}` to port expecting interface `{}`";
    PortConnDimensionsMismatch: Declarations, Error, -, "interface array dimensions do not match the port declaration";

    // Expressions
    BadAssignment: Expressions, Error, -, "value of type {} cannot be assigned to type {}";
    BadConversion: Expressions, Error, -, "value of type {} cannot be cast to type {}";
    BadUnaryExpression: Expressions, Error, -, "operator is not valid on an operand of type {}";
    BadBinaryExpression: Expressions, Error, -, "operator is not valid on operands of type {} and {}";
    NotBooleanConvertible: Expressions, Error, -, "value of type {} cannot be used as a predicate";
    BadIndexExpression: Expressions, Error, -, "value of type {} cannot be indexed";
    IndexValueInvalid: Expressions, Error, -, "index {} is invalid for type {}";
    SelectEndianMismatch: Expressions, Error, -, "range select endianness does not match the declared direction of type {}";
    BadRangeExpression: Expressions, Error, -, "range [{}:{}] does not fit within type {}";
    RangeWidthNotConstant: Expressions, Error, -, "the width of an indexed part select must be a constant";
    ExpressionNotAssignable: Expressions, Error, -, "expression is not assignable";
    ConcatMixedStringInt: Expressions, Error, -, "cannot mix string and integral operands in a concatenation";
    ReplicationZeroOutsideConcat: Expressions, Error, -, "a replication with count zero may only appear inside a concatenation";
    WrongNumberAssignmentPatterns: Expressions, Error, -, "assignment pattern for {} expects {} elements but got {}";
    MissingAssignmentPatternValue: Expressions, Error, -, "assignment pattern provides no value for `{}` and has no default";
    BadAssignmentPatternType: Expressions, Error, -, "assignment patterns cannot target type {}";
    AssignmentPatternNoContext: Expressions, Error, -, "assignment patterns require a target type";
    AssignmentPatternKeyNotFound: Expressions, Error, -, "`{}` does not name a member of {}";
    NotASubroutine: Expressions, Error, -, "`{}` is not a subroutine";
    UnknownSystemName: Expressions, Error, -, "unknown system name `{}`";
    TooFewArguments: Expressions, Error, -, "too few arguments in call to `{}`; expected {} but got {}";
    TooManyArguments: Expressions, Error, -, "too many arguments in call to `{}`; expected {} but got {}";
    MemberAccessNotStructUnion: Expressions, Error, -, "cannot access member `{}` of non-struct type {}";

    // SysFuncs
    BadSystemSubroutineArg: SysFuncs, Error, -, "invalid argument to system subroutine `{}`";

    // ConstEval
    ExpressionNotConstant: ConstEval, Error, -, "expression is not constant";
    NoteNonConstVariable: ConstEval, Note, -, "reference to non-constant variable `{}`";
    NoteHierarchicalNameInCE: ConstEval, Note, -, "hierarchical name `{}` is not allowed in a constant expression";
    NoteFunctionIdentifiersMustBeLocal: ConstEval, Note, -, "all identifiers in a constant function must be local to the function";
    NoteParamUsedInCEBeforeDecl: ConstEval, Note, -, "parameter `{}` is declared after the invocation of the constant function";
    NoteArrayIndexInvalid: ConstEval, Note, -, "index {} is out of bounds for type {}";
    NotePartSelectInvalid: ConstEval, Note, -, "part select [{}:{}] is out of bounds for type {}";
    NoteStringIndexInvalid: ConstEval, Note, -, "index {} is out of bounds for a string of length {}";
    NoteReplicationCountInvalid: ConstEval, Note, -, "replication count {} is not a non-negative constant";
    NoteTimedStmtNotConst: ConstEval, Note, -, "timing controls are not allowed in constant functions";
    NoteTaskNotConstant: ConstEval, Note, -, "tasks cannot be called in constant expressions";
    NoteExceededMaxCallDepth: ConstEval, Note, -, "exceeded the maximum depth of constant function calls";
    NoteExceededMaxSteps: ConstEval, Note, -, "exceeded the maximum number of constant evaluation steps";
    NoteDeclarationHere: ConstEval, Note, -, "declared here";
    NotePreviousDefinition: ConstEval, Note, -, "previous definition here";
    NotePreviousUsage: ConstEval, Note, -, "previous usage here";
    NotePreviousMatch: ConstEval, Note, -, "previous match here";
}

/// A structured diagnostic addressed by a code.
#[derive(Debug, Clone)]
pub struct Diag {
    pub code: DiagCode,
    pub args: Vec<String>,
    pub spans: Vec<Span>,
    pub notes: Vec<Diag>,
}

impl Diag {
    /// Create a new diagnostic for a code.
    pub fn new(code: DiagCode) -> Diag {
        Diag {
            code,
            args: vec![],
            spans: vec![],
            notes: vec![],
        }
    }

    /// Attach a message argument.
    pub fn arg(mut self, arg: impl std::fmt::Display) -> Diag {
        self.args.push(format!("{}", arg));
        self
    }

    /// Attach a highlighted source range. The first span is the primary
    /// location.
    pub fn span<S: Into<Span>>(mut self, span: S) -> Diag {
        self.spans.push(span.into());
        self
    }

    /// Attach a note diagnostic.
    pub fn note(mut self, note: Diag) -> Diag {
        self.notes.push(note);
        self
    }

    /// The primary source location of this diagnostic.
    pub fn primary_span(&self) -> Span {
        self.spans
            .first()
            .copied()
            .unwrap_or(silica_common::source::INVALID_SPAN)
    }

    /// Render the message template with the attached arguments.
    pub fn message(&self) -> String {
        let mut out = String::new();
        let mut args = self.args.iter();
        let mut rest = self.code.template();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }

    /// Assemble a renderable diagnostic builder.
    pub fn to_builder(&self) -> DiagBuilder2 {
        let mut b = DiagBuilder2::new(self.code.severity(), self.message());
        for &span in &self.spans {
            b = b.span(span);
        }
        for note in &self.notes {
            b = b.add_note(note.message());
            if let Some(&span) = note.spans.first() {
                b = b.span(span);
            }
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_formatting() {
        let d = Diag::new(DiagCode::TooManyParamAssignments)
            .arg("foo")
            .arg(2)
            .arg(3);
        assert_eq!(
            d.message(),
            "too many parameter assignments for `foo`; expected at most 2 but got 3"
        );
        assert_eq!(d.code.severity(), Severity::Error);
        assert_eq!(d.code.class(), DiagClass::Declarations);
    }

    #[test]
    fn warning_groups() {
        assert_eq!(DiagCode::UnconnectedNamedPort.group(), Some("unconnected-port"));
        assert_eq!(DiagCode::BadAssignment.group(), None);
        assert_eq!(DiagCode::UnconnectedNamedPort.severity(), Severity::Warning);
    }
}
