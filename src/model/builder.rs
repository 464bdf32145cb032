//! Construct-at-a-time builder that validates declarations as they are committed.
//!
//! The builder owns the arena, the scope stacks, the pattern registry of the instruction being
//! built and the mapping currently under construction. Callers either pair
//! `begin_*`/`end_*` calls themselves or use the guards returned by [`MachineBuilder::scope`],
//! [`MachineBuilder::instruction_scope`] and [`MachineBuilder::mapping`], which release their
//! scope on every exit path.

use std::ops::{Deref, DerefMut};

use tracing::{debug, info};

use crate::model::arena::DefinitionArena;
use crate::model::bitfield::BitField;
use crate::model::config::BuilderConfig;
use crate::model::entity::{
    Handle, Immediate, MemRole, Memory, Record, RecordKind, Register, RegisterGroup, Set,
};
use crate::model::error::SemanticError;
use crate::model::evaluable::Evaluable;
use crate::model::form::{InstrForm, InstrPart, Instruction, assemble};
use crate::model::ident::Identifier;
use crate::model::machine::{Entry, Machine};
use crate::model::mapping::{MappingItem, MappingItems};
use crate::model::pattern::{Pattern, PatternRegistry};
use crate::model::scope::ScopeStacks;
use crate::model::validator::check_mapping_item;

pub struct MachineBuilder {
    config: BuilderConfig,
    name: Identifier,
    arena: DefinitionArena,
    scopes: ScopeStacks,
    patterns: PatternRegistry,
    mapping: Option<MappingItems>,
    entries: Vec<Entry>,
}

impl MachineBuilder {
    pub fn new(name: &str) -> Self {
        Self::with_config(name, BuilderConfig::default())
    }

    /// Starts a machine. Its name stays pending until [`finish`](Self::finish).
    pub fn with_config(name: &str, config: BuilderConfig) -> Self {
        let name = Identifier::new(name);
        let mut scopes = ScopeStacks::new();
        scopes.enter(Some(name.clone()), None);
        Self {
            config,
            name,
            arena: DefinitionArena::new(),
            scopes,
            patterns: PatternRegistry::new(),
            mapping: None,
            entries: Vec::new(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn arena(&self) -> &DefinitionArena {
        &self.arena
    }

    pub fn scopes(&self) -> &ScopeStacks {
        &self.scopes
    }

    pub fn finish(mut self) -> Machine {
        assert!(self.mapping.is_none(), "mapping scope left open");
        self.scopes.leave();
        assert_eq!(self.scopes.depth(), 0, "unbalanced construct scopes");
        info!(
            target: "xmachine",
            machine = %self.name,
            entries = self.entries.len(),
            definitions = self.arena.record_count(),
            "machine built"
        );
        Machine::new(self.name, self.entries, self.arena)
    }

    pub fn begin_scope(&mut self, name: Option<&str>, width: Option<u32>) {
        self.scopes.enter(name.map(Identifier::new), width);
    }

    pub fn end_scope(&mut self) {
        self.scopes.leave();
    }

    pub fn scope(&mut self, name: Option<&str>, width: Option<u32>) -> ScopeGuard<'_> {
        self.begin_scope(name, width);
        ScopeGuard {
            builder: self,
            open: true,
        }
    }

    /// Opens the body of an instruction: its name becomes pending and the pattern registry
    /// starts empty.
    pub fn instruction_scope(&mut self, name: &str) -> ScopeGuard<'_> {
        self.patterns.clear();
        self.scope(Some(name), None)
    }

    /// Builds a bit field bounded by the innermost enclosing width.
    pub fn field(&self, a: u32, b: u32) -> Result<BitField, SemanticError> {
        self.scopes.check_field(BitField::new(a, b))
    }

    pub fn resolve(&self, name: &str) -> Result<Record, SemanticError> {
        self.arena
            .resolve(name)
            .ok_or_else(|| SemanticError::UndefinedReference {
                name: Identifier::new(name),
            })
    }

    pub fn declare_immediate(
        &mut self,
        name: &str,
        width: u32,
        signed: bool,
    ) -> Result<Handle<Immediate>, SemanticError> {
        let handle = self.arena.declare(
            Immediate {
                name: Identifier::new(name),
                width,
                signed,
            },
            &self.scopes,
        )?;
        self.entries.push(Entry::Immediate(handle));
        debug!(target: "xmachine", kind = "immediate", name, width, signed, "declared");
        Ok(handle)
    }

    /// Commits a register immediately; it joins a group once the group is declared.
    pub fn declare_register(
        &mut self,
        name: &str,
        field: BitField,
        code: u64,
    ) -> Result<Handle<Register>, SemanticError> {
        let field = self.scopes.check_field(field)?;
        let handle = self.arena.declare(
            Register {
                name: Identifier::new(name),
                field,
                code,
                group: None,
            },
            &self.scopes,
        )?;
        debug!(target: "xmachine", kind = "register", name, %field, code, "declared");
        Ok(handle)
    }

    pub fn declare_register_group(
        &mut self,
        name: &str,
        width: u32,
        registers: Vec<Handle<Register>>,
    ) -> Result<Handle<RegisterGroup>, SemanticError> {
        if registers.is_empty() {
            return Err(SemanticError::EmptyGroup {
                name: Identifier::new(name),
            });
        }
        for handle in &registers {
            let register = self.arena.get(*handle);
            if register.group.is_some() {
                return Err(SemanticError::InvalidReference {
                    name: register.name.clone(),
                    expected: "a register outside any group",
                });
            }
            if !register.field.fits_within(width) {
                return Err(SemanticError::BitOutOfBounds {
                    field: register.field,
                    width,
                });
            }
        }
        let count = registers.len();
        let handle = self.arena.declare(
            RegisterGroup {
                name: Identifier::new(name),
                width,
                registers: registers.clone(),
            },
            &self.scopes,
        )?;
        for register in registers {
            self.arena.get_mut(register).group = Some(handle);
        }
        self.entries.push(Entry::RegisterGroup(handle));
        debug!(target: "xmachine", kind = "register-group", name, width, registers = count, "declared");
        Ok(handle)
    }

    /// Declares a memory from its `$` (base) and `>` (offset) fields. Each role must appear
    /// exactly once.
    pub fn declare_memory<I>(
        &mut self,
        name: &str,
        width: u32,
        fields: I,
    ) -> Result<Handle<Memory>, SemanticError>
    where
        I: IntoIterator<Item = (MemRole, BitField)>,
    {
        let ident = Identifier::new(name);
        let mut base = None;
        let mut offset = None;
        for (role, field) in fields {
            if !field.fits_within(width) {
                return Err(SemanticError::BitOutOfBounds { field, width });
            }
            let slot = match role {
                MemRole::Base => &mut base,
                MemRole::Offset => &mut offset,
            };
            if slot.replace(field).is_some() {
                return Err(SemanticError::DuplicateDefinition {
                    name: Identifier::new(format!("{name}.{}", role.sigil())),
                });
            }
        }
        let base = base.ok_or_else(|| SemanticError::IncompleteMemory {
            name: ident.clone(),
            missing: MemRole::Base,
        })?;
        let offset = offset.ok_or_else(|| SemanticError::IncompleteMemory {
            name: ident.clone(),
            missing: MemRole::Offset,
        })?;
        let handle = self.arena.declare(
            Memory {
                name: ident,
                width,
                base,
                offset,
            },
            &self.scopes,
        )?;
        self.entries.push(Entry::Memory(handle));
        debug!(target: "xmachine", kind = "memory", name, width, %base, %offset, "declared");
        Ok(handle)
    }

    pub fn declare_set(&mut self, name: &str, members: &[&str]) -> Result<Handle<Set>, SemanticError> {
        let members = members
            .iter()
            .map(|member| self.resolve(member).map(|_| Identifier::new(member)))
            .collect::<Result<Vec<_>, _>>()?;
        let count = members.len();
        let handle = self.arena.declare(
            Set {
                name: Identifier::new(name),
                members,
            },
            &self.scopes,
        )?;
        self.entries.push(Entry::Set(handle));
        debug!(target: "xmachine", kind = "set", name, members = count, "declared");
        Ok(handle)
    }

    pub fn declare_instruction(
        &mut self,
        name: &str,
        forms: Vec<InstrForm>,
    ) -> Result<Handle<Instruction>, SemanticError> {
        if forms.is_empty() {
            return Err(SemanticError::malformed(format!(
                "instruction '{name}' declares no forms"
            )));
        }
        let count = forms.len();
        let handle = self.arena.declare(
            Instruction {
                name: Identifier::new(name),
                forms,
            },
            &self.scopes,
        )?;
        self.entries.push(Entry::Instruction(handle));
        debug!(target: "xmachine", kind = "instruction", name, forms = count, "declared");
        Ok(handle)
    }

    pub fn number(&self, value: u64) -> Evaluable {
        Evaluable::Number(value)
    }

    /// Whole-entity reference.
    pub fn ident(&self, name: &str) -> Result<Evaluable, SemanticError> {
        let record = self.resolve(name)?;
        if record.kind == RecordKind::Instruction {
            return Err(SemanticError::InvalidReference {
                name: Identifier::new(name),
                expected: "a value",
            });
        }
        Ok(Evaluable::Ident(Identifier::new(name)))
    }

    /// Bit slice of an entity, bounded by the entity's declared width. A register is bounded by
    /// its group, or by the innermost enclosing width while that group is still open.
    pub fn slice(&self, name: &str, field: BitField) -> Result<Evaluable, SemanticError> {
        let record = self.resolve(name)?;
        if matches!(record.kind, RecordKind::Set | RecordKind::Instruction) {
            return Err(SemanticError::InvalidReference {
                name: Identifier::new(name),
                expected: "a value with bits",
            });
        }
        let width = match self.arena.width_of(name) {
            Some(width) => Some(width),
            None if record.kind == RecordKind::Register => self.scopes.current_width(),
            None => None,
        };
        if let Some(width) = width {
            if !field.fits_within(width) {
                return Err(SemanticError::BitOutOfBounds { field, width });
            }
        }
        Ok(Evaluable::Slice(Identifier::new(name), field))
    }

    pub fn mem_key(&self, name: &str, role: MemRole) -> Result<Evaluable, SemanticError> {
        let record = self.resolve(name)?;
        if record.kind != RecordKind::Memory {
            return Err(SemanticError::InvalidReference {
                name: Identifier::new(name),
                expected: RecordKind::Memory.describe(),
            });
        }
        Ok(Evaluable::MemKey(Identifier::new(name), role))
    }

    /// Opens the mapping of a part `width` bits wide. Panics if one is already open.
    pub fn begin_mapping(&mut self, width: u32) {
        assert!(self.mapping.is_none(), "mapping scope already open");
        self.mapping = Some(MappingItems::new(width));
    }

    /// Closes the open mapping and hands its items to the caller.
    pub fn end_mapping(&mut self) -> MappingItems {
        self.mapping.take().expect("no mapping scope open")
    }

    pub fn mapping(&mut self, width: u32) -> MappingScope<'_> {
        self.begin_mapping(width);
        MappingScope { builder: self }
    }

    /// Adds one item to the open mapping; `field == None` sets the default fill.
    pub fn insert_mapping(
        &mut self,
        field: Option<BitField>,
        evaluable: Evaluable,
    ) -> Result<(), SemanticError> {
        let width = self
            .mapping
            .as_ref()
            .map(MappingItems::width)
            .expect("no mapping scope open");
        if let Some(field) = field {
            if !field.fits_within(width) {
                return Err(SemanticError::BitOutOfBounds { field, width });
            }
        }
        check_mapping_item(&self.arena, field, &evaluable)?;
        self.mapping
            .as_mut()
            .expect("no mapping scope open")
            .insert(MappingItem { field, evaluable })
    }

    pub fn test_pattern(&self, pattern: &Pattern) -> bool {
        self.patterns.test(pattern)
    }

    pub fn register_pattern(&mut self, pattern: Pattern) {
        self.patterns.add(pattern);
    }

    /// Builds the operand signature of a new form: every operand must be declared and the
    /// signature must not already be bound in the current instruction.
    pub fn bind_pattern(&mut self, args: &[&str]) -> Result<Pattern, SemanticError> {
        if args.len() > self.config.max_operands() {
            return Err(SemanticError::TooManyOperands {
                count: args.len(),
                max: self.config.max_operands(),
            });
        }
        for arg in args {
            self.resolve(arg)?;
        }
        let pattern = Pattern::new(args.iter().copied());
        if self.test_pattern(&pattern) {
            return Err(SemanticError::InvalidOperandSignature {
                pattern: pattern.to_string(),
            });
        }
        self.register_pattern(pattern.clone());
        Ok(pattern)
    }

    pub fn assemble_form(
        &mut self,
        pattern: Pattern,
        width: u32,
        tick: Option<u32>,
        parts: Vec<InstrPart>,
    ) -> Result<InstrForm, SemanticError> {
        let form = assemble(&self.arena, &self.config, pattern, width, tick, parts)?;
        debug!(
            target: "xmachine",
            pattern = %form.pattern,
            width = form.width,
            tick = form.tick,
            windows = form.program.windows().len(),
            ops = form.program.ops().count(),
            "form assembled"
        );
        Ok(form)
    }
}

/// Keeps a construct scope open; leaves it when dropped or [`close`](ScopeGuard::close)d.
pub struct ScopeGuard<'b> {
    builder: &'b mut MachineBuilder,
    open: bool,
}

impl ScopeGuard<'_> {
    pub fn close(mut self) {
        self.builder.end_scope();
        self.open = false;
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = MachineBuilder;

    fn deref(&self) -> &MachineBuilder {
        self.builder
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut MachineBuilder {
        self.builder
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.open {
            self.builder.end_scope();
        }
    }
}

/// Owns the open mapping until [`finish`](MappingScope::finish) moves it into a layout.
pub struct MappingScope<'b> {
    builder: &'b mut MachineBuilder,
}

impl MappingScope<'_> {
    pub fn finish(self) -> MappingItems {
        self.builder.end_mapping()
    }
}

impl Deref for MappingScope<'_> {
    type Target = MachineBuilder;

    fn deref(&self) -> &MachineBuilder {
        self.builder
    }
}

impl DerefMut for MappingScope<'_> {
    fn deref_mut(&mut self) -> &mut MachineBuilder {
        self.builder
    }
}

impl Drop for MappingScope<'_> {
    fn drop(&mut self) {
        if let Some(items) = self.builder.mapping.take() {
            debug!(target: "xmachine", items = items.len(), "mapping released without layout");
        }
    }
}
