//! Semantic core: definitions, scopes, bit mappings and instruction forms.

pub mod arena;
pub mod bitfield;
pub mod builder;
pub mod config;
pub mod diagnostic;
pub mod entity;
pub mod error;
pub mod evaluable;
pub mod form;
pub mod ident;
pub mod machine;
pub mod mapping;
pub mod pattern;
pub mod program;
pub mod scope;
pub mod validator;

pub use arena::{Definition, DefinitionArena};
pub use bitfield::BitField;
pub use builder::{MachineBuilder, MappingScope, ScopeGuard};
pub use config::BuilderConfig;
pub use diagnostic::{DiagnosticLevel, DiagnosticPhase, MachineDiagnostic, SourcePosition, SourceSpan};
pub use entity::{
    Handle, Immediate, MemRole, Memory, Record, RecordKind, Register, RegisterGroup, Set,
};
pub use error::{EncodeError, ErrorKind, MachineError, SemanticError};
pub use evaluable::Evaluable;
pub use form::{InstrForm, InstrPart, Instruction, Layout, PartKind, PartSet};
pub use ident::{IdentTable, Identifier};
pub use machine::{Entry, Machine};
pub use mapping::{MappingItem, MappingItems};
pub use pattern::{Pattern, PatternRegistry};
pub use program::{PackOp, PackProgram, PackWindow};
pub use scope::ScopeStacks;
pub use validator::check_mapping_item;
