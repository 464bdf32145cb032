use std::fmt;

use crate::model::bitfield::BitField;
use crate::model::diagnostic::{DiagnosticPhase, MachineDiagnostic};
use crate::model::entity::MemRole;
use crate::model::ident::Identifier;

/// Broad classification of a [`SemanticError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateDefinition,
    UndefinedReference,
    WidthMismatch,
    OverlappingRange,
    MalformedForm,
    InvalidOperandSignature,
    BitOutOfBounds,
    InvalidReference,
    TooManyOperands,
    EmptyGroup,
    IncompleteMemory,
}

/// Failure raised by a builder operation. The first one aborts the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    DuplicateDefinition {
        name: Identifier,
    },
    UndefinedReference {
        name: Identifier,
    },
    WidthMismatch {
        field: Option<BitField>,
        source: String,
        expected: u32,
        found: Option<u32>,
    },
    OverlappingRange {
        range: BitField,
        existing: BitField,
    },
    MalformedForm {
        reason: String,
    },
    InvalidOperandSignature {
        pattern: String,
    },
    BitOutOfBounds {
        field: BitField,
        width: u32,
    },
    InvalidReference {
        name: Identifier,
        expected: &'static str,
    },
    TooManyOperands {
        count: usize,
        max: usize,
    },
    EmptyGroup {
        name: Identifier,
    },
    IncompleteMemory {
        name: Identifier,
        missing: MemRole,
    },
}

impl SemanticError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::DuplicateDefinition { .. } => ErrorKind::DuplicateDefinition,
            SemanticError::UndefinedReference { .. } => ErrorKind::UndefinedReference,
            SemanticError::WidthMismatch { .. } => ErrorKind::WidthMismatch,
            SemanticError::OverlappingRange { .. } => ErrorKind::OverlappingRange,
            SemanticError::MalformedForm { .. } => ErrorKind::MalformedForm,
            SemanticError::InvalidOperandSignature { .. } => ErrorKind::InvalidOperandSignature,
            SemanticError::BitOutOfBounds { .. } => ErrorKind::BitOutOfBounds,
            SemanticError::InvalidReference { .. } => ErrorKind::InvalidReference,
            SemanticError::TooManyOperands { .. } => ErrorKind::TooManyOperands,
            SemanticError::EmptyGroup { .. } => ErrorKind::EmptyGroup,
            SemanticError::IncompleteMemory { .. } => ErrorKind::IncompleteMemory,
        }
    }

    /// Stable diagnostic code for tooling.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::DuplicateDefinition => "semantic.duplicate-definition",
            ErrorKind::UndefinedReference => "semantic.undefined-reference",
            ErrorKind::WidthMismatch => "semantic.width-mismatch",
            ErrorKind::OverlappingRange => "semantic.overlapping-range",
            ErrorKind::MalformedForm => "semantic.malformed-form",
            ErrorKind::InvalidOperandSignature => "semantic.invalid-operand-signature",
            ErrorKind::BitOutOfBounds => "semantic.bit-out-of-bounds",
            ErrorKind::InvalidReference => "semantic.invalid-reference",
            ErrorKind::TooManyOperands => "semantic.too-many-operands",
            ErrorKind::EmptyGroup => "semantic.empty-group",
            ErrorKind::IncompleteMemory => "semantic.incomplete-memory",
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SemanticError::MalformedForm {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::DuplicateDefinition { name } => {
                write!(f, "'{name}' is already defined")
            }
            SemanticError::UndefinedReference { name } => write!(f, "'{name}' is not defined"),
            SemanticError::WidthMismatch {
                field: None,
                source,
                ..
            } => write!(
                f,
                "default entry requires a literal number, found '{source}'"
            ),
            SemanticError::WidthMismatch {
                field: Some(field),
                source,
                expected,
                found,
            } => match found {
                Some(found) => write!(
                    f,
                    "field {field} is {expected} bit(s) wide but '{source}' is {found} bit(s)"
                ),
                None => write!(f, "field {field} cannot hold '{source}'"),
            },
            SemanticError::OverlappingRange { range, existing } => {
                write!(f, "bit range {range} overlaps already mapped range {existing}")
            }
            SemanticError::MalformedForm { reason } => write!(f, "malformed form: {reason}"),
            SemanticError::InvalidOperandSignature { pattern } => write!(
                f,
                "operand signature {pattern} is already bound in this instruction"
            ),
            SemanticError::BitOutOfBounds { field, width } => {
                write!(f, "bit range {field} exceeds enclosing width of {width} bit(s)")
            }
            SemanticError::InvalidReference { name, expected } => {
                write!(f, "'{name}' does not name {expected}")
            }
            SemanticError::TooManyOperands { count, max } => {
                write!(f, "{count} operands exceed the limit of {max}")
            }
            SemanticError::EmptyGroup { name } => {
                write!(f, "register group '{name}' declares no registers")
            }
            SemanticError::IncompleteMemory { name, missing } => {
                write!(f, "memory '{name}' is missing its {missing} field")
            }
        }
    }
}

impl std::error::Error for SemanticError {}

/// Failure while interpreting a pack program against concrete operand values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    MissingOperand(Identifier),
    UnsupportedOperand(Identifier),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::MissingOperand(name) => write!(f, "no value supplied for operand '{name}'"),
            EncodeError::UnsupportedOperand(name) => {
                write!(f, "operand '{name}' cannot be evaluated to bits")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Represents any failure that can occur while loading, parsing, or building a machine
/// description.
#[derive(Debug)]
pub enum MachineError {
    Io(std::io::Error),
    Parser(String),
    Semantic(SemanticError),
    Diagnostics {
        phase: DiagnosticPhase,
        diagnostics: Vec<MachineDiagnostic>,
    },
}

impl MachineError {
    /// Flattens the error into diagnostics for editor tooling.
    pub fn diagnostics(&self) -> Vec<MachineDiagnostic> {
        match self {
            MachineError::Diagnostics { diagnostics, .. } => diagnostics.clone(),
            MachineError::Semantic(err) => vec![MachineDiagnostic::error(
                DiagnosticPhase::Semantic,
                err.code(),
                err.to_string(),
                None,
            )],
            MachineError::Parser(msg) => vec![MachineDiagnostic::error(
                DiagnosticPhase::Parser,
                "parser.error",
                msg.clone(),
                None,
            )],
            MachineError::Io(err) => vec![MachineDiagnostic::error(
                DiagnosticPhase::Parser,
                "io.error",
                err.to_string(),
                None,
            )],
        }
    }
}

impl From<std::io::Error> for MachineError {
    fn from(err: std::io::Error) -> Self {
        MachineError::Io(err)
    }
}

impl From<SemanticError> for MachineError {
    fn from(err: SemanticError) -> Self {
        MachineError::Semantic(err)
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::Io(err) => write!(f, "I/O error: {err}"),
            MachineError::Parser(msg) => write!(f, "parser error: {msg}"),
            MachineError::Semantic(err) => write!(f, "semantic error: {err}"),
            MachineError::Diagnostics { phase, diagnostics } => {
                writeln!(f, "{phase:?} produced {} issue(s):", diagnostics.len())?;
                for diag in diagnostics {
                    writeln!(f, "  - {}", diag.format_human())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MachineError {}
