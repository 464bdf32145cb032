//! Declared machine entities and the typed handles that reference them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::NonZeroU32;

use crate::model::bitfield::BitField;
use crate::model::ident::Identifier;

/// Stable arena index for an entity of type `T`.
pub struct Handle<T> {
    raw: NonZeroU32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index)
            .ok()
            .and_then(|index| NonZeroU32::new(index.wrapping_add(1)))
            .expect("handle index overflow");
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        (self.raw.get() - 1) as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index())
    }
}

/// Which sub-field of a memory an operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemRole {
    Base,
    Offset,
}

impl MemRole {
    pub fn sigil(self) -> char {
        match self {
            MemRole::Base => '$',
            MemRole::Offset => '>',
        }
    }
}

impl fmt::Display for MemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemRole::Base => f.write_str("base"),
            MemRole::Offset => f.write_str("offset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub name: Identifier,
    pub width: u32,
    pub base: BitField,
    pub offset: BitField,
}

impl Memory {
    pub fn field(&self, role: MemRole) -> BitField {
        match role {
            MemRole::Base => self.base,
            MemRole::Offset => self.offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Immediate {
    pub name: Identifier,
    pub width: u32,
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub name: Identifier,
    /// Position of the register within its group's word.
    pub field: BitField,
    pub code: u64,
    /// Filled in once when the owning group is committed.
    pub group: Option<Handle<RegisterGroup>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterGroup {
    pub name: Identifier,
    pub width: u32,
    pub registers: Vec<Handle<Register>>,
}

/// Named collection of previously declared entities. Carries no encoding of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set {
    pub name: Identifier,
    pub members: Vec<Identifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Memory,
    Immediate,
    Register,
    RegisterGroup,
    Set,
    Instruction,
}

impl RecordKind {
    pub fn describe(self) -> &'static str {
        match self {
            RecordKind::Memory => "a memory",
            RecordKind::Immediate => "an immediate",
            RecordKind::Register => "a register",
            RecordKind::RegisterGroup => "a register group",
            RecordKind::Set => "a set",
            RecordKind::Instruction => "an instruction",
        }
    }
}

/// Arena-relative reference to any declared entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    pub kind: RecordKind,
    pub offset: u32,
}

impl Record {
    /// Typed handle for this record, if it is of kind `kind`.
    pub fn handle<T>(self, kind: RecordKind) -> Option<Handle<T>> {
        (self.kind == kind).then(|| Handle::from_index(self.offset as usize))
    }
}
