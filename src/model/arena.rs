//! Append-only typed stores plus the global name → record index.

use crate::model::entity::{
    Handle, Immediate, Memory, Record, RecordKind, Register, RegisterGroup, Set,
};
use crate::model::error::SemanticError;
use crate::model::form::Instruction;
use crate::model::ident::{IdentTable, Identifier};
use crate::model::scope::ScopeStacks;

/// An entity that can be committed to the [`DefinitionArena`].
pub trait Definition: Sized + 'static {
    const KIND: RecordKind;

    fn name(&self) -> &Identifier;
    fn store(arena: &DefinitionArena) -> &Vec<Self>;
    fn store_mut(arena: &mut DefinitionArena) -> &mut Vec<Self>;
}

macro_rules! definition {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl Definition for $ty {
            const KIND: RecordKind = RecordKind::$kind;

            fn name(&self) -> &Identifier {
                &self.name
            }

            fn store(arena: &DefinitionArena) -> &Vec<Self> {
                &arena.$field
            }

            fn store_mut(arena: &mut DefinitionArena) -> &mut Vec<Self> {
                &mut arena.$field
            }
        }
    };
}

definition!(Memory, Memory, memories);
definition!(Immediate, Immediate, immediates);
definition!(Register, Register, registers);
definition!(RegisterGroup, RegisterGroup, groups);
definition!(Set, Set, sets);
definition!(Instruction, Instruction, instructions);

#[derive(Debug, Default)]
pub struct DefinitionArena {
    memories: Vec<Memory>,
    immediates: Vec<Immediate>,
    registers: Vec<Register>,
    groups: Vec<RegisterGroup>,
    sets: Vec<Set>,
    instructions: Vec<Instruction>,
    records: IdentTable<Record>,
}

impl DefinitionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `value` under its name. Fails when the name already has a record or is still
    /// pending on `scopes`.
    pub fn declare<T: Definition>(
        &mut self,
        value: T,
        scopes: &ScopeStacks,
    ) -> Result<Handle<T>, SemanticError> {
        let name = value.name().clone();
        if self.records.contains(name.as_str()) || scopes.is_pending(name.as_str()) {
            return Err(SemanticError::DuplicateDefinition { name });
        }
        let store = T::store_mut(self);
        let handle = Handle::from_index(store.len());
        store.push(value);
        let record = Record {
            kind: T::KIND,
            offset: handle.index() as u32,
        };
        let inserted = self.records.insert(name, record).is_ok();
        debug_assert!(inserted, "name availability checked above");
        Ok(handle)
    }

    pub fn resolve(&self, name: &str) -> Option<Record> {
        self.records.get(name).copied()
    }

    /// Resolves `name` and requires it to be a `T`.
    pub fn lookup<T: Definition>(&self, name: &str) -> Option<Handle<T>> {
        self.resolve(name).and_then(|record| record.handle(T::KIND))
    }

    pub fn get<T: Definition>(&self, handle: Handle<T>) -> &T {
        &T::store(self)[handle.index()]
    }

    pub(crate) fn get_mut<T: Definition>(&mut self, handle: Handle<T>) -> &mut T {
        &mut T::store_mut(self)[handle.index()]
    }

    pub fn iter<T: Definition>(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        T::store(self)
            .iter()
            .enumerate()
            .map(|(index, value)| (Handle::from_index(index), value))
    }

    pub fn count<T: Definition>(&self) -> usize {
        T::store(self).len()
    }

    /// Number of committed names across every kind.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Declared bit width of the entity named `name`, where the kind carries one.
    pub fn width_of(&self, name: &str) -> Option<u32> {
        let record = self.resolve(name)?;
        match record.kind {
            RecordKind::Memory => Some(self.memories[record.offset as usize].width),
            RecordKind::Immediate => Some(self.immediates[record.offset as usize].width),
            RecordKind::RegisterGroup => Some(self.groups[record.offset as usize].width),
            RecordKind::Register => self.registers[record.offset as usize]
                .group
                .map(|group| self.get(group).width),
            RecordKind::Set | RecordKind::Instruction => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bitfield::BitField;

    fn imm(name: &str, width: u32) -> Immediate {
        Immediate {
            name: Identifier::new(name),
            width,
            signed: false,
        }
    }

    #[test]
    fn declare_assigns_sequential_offsets_per_kind() {
        let mut arena = DefinitionArena::new();
        let scopes = ScopeStacks::default();
        let a = arena.declare(imm("a", 8), &scopes).expect("a");
        let b = arena.declare(imm("b", 16), &scopes).expect("b");
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(arena.get(b).width, 16);
        assert_eq!(
            arena.resolve("b"),
            Some(Record {
                kind: RecordKind::Immediate,
                offset: 1
            })
        );
    }

    #[test]
    fn redeclaration_across_kinds_is_rejected() {
        let mut arena = DefinitionArena::new();
        let scopes = ScopeStacks::default();
        arena.declare(imm("x", 8), &scopes).expect("x");
        let err = arena
            .declare(
                Memory {
                    name: Identifier::new("x"),
                    width: 16,
                    base: BitField::new(7, 0),
                    offset: BitField::new(15, 8),
                },
                &scopes,
            )
            .expect_err("same name as an immediate");
        assert_eq!(
            err,
            SemanticError::DuplicateDefinition {
                name: Identifier::new("x")
            }
        );
        assert_eq!(arena.count::<Memory>(), 0, "failed declaration must not commit");
    }

    #[test]
    fn pending_names_block_declaration() {
        let mut arena = DefinitionArena::new();
        let mut scopes = ScopeStacks::default();
        scopes.enter(Some(Identifier::new("gpr")), Some(32));
        assert!(arena.declare(imm("gpr", 8), &scopes).is_err());
        scopes.leave();
        assert!(arena.declare(imm("gpr", 8), &scopes).is_ok());
    }

    #[test]
    fn lookup_filters_by_kind() {
        let mut arena = DefinitionArena::new();
        arena
            .declare(imm("imm8", 8), &ScopeStacks::default())
            .expect("imm8");
        assert!(arena.lookup::<Immediate>("imm8").is_some());
        assert!(arena.lookup::<Memory>("imm8").is_none());
        assert_eq!(arena.width_of("imm8"), Some(8));
        assert_eq!(arena.width_of("missing"), None);
        let r0 = arena
            .declare(
                Register {
                    name: Identifier::new("r0"),
                    field: BitField::new(4, 0),
                    code: 0,
                    group: None,
                },
                &ScopeStacks::default(),
            )
            .expect("r0");
        assert_eq!(arena.width_of("r0"), None, "ungrouped registers carry no width");
        let gpr = arena
            .declare(
                RegisterGroup {
                    name: Identifier::new("gpr"),
                    width: 32,
                    registers: vec![r0],
                },
                &ScopeStacks::default(),
            )
            .expect("gpr");
        arena.get_mut(r0).group = Some(gpr);
        assert_eq!(arena.width_of("r0"), Some(32));
    }
}
