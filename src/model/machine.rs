//! The validated machine model handed to emitters.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::model::arena::DefinitionArena;
use crate::model::entity::{Handle, Immediate, Memory, Register, RegisterGroup, Set};
use crate::model::form::Instruction;
use crate::model::ident::Identifier;

/// Top-level declaration in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Memory(Handle<Memory>),
    Immediate(Handle<Immediate>),
    RegisterGroup(Handle<RegisterGroup>),
    Set(Handle<Set>),
    Instruction(Handle<Instruction>),
}

#[derive(Debug)]
pub struct Machine {
    name: Identifier,
    entries: Vec<Entry>,
    arena: DefinitionArena,
}

impl Machine {
    pub(crate) fn new(name: Identifier, entries: Vec<Entry>, arena: DefinitionArena) -> Self {
        Self {
            name,
            entries,
            arena,
        }
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn arena(&self) -> &DefinitionArena {
        &self.arena
    }

    pub fn memories(&self) -> impl Iterator<Item = &Memory> {
        self.arena.iter::<Memory>().map(|(_, memory)| memory)
    }

    pub fn immediates(&self) -> impl Iterator<Item = &Immediate> {
        self.arena.iter::<Immediate>().map(|(_, immediate)| immediate)
    }

    pub fn register_groups(&self) -> impl Iterator<Item = &RegisterGroup> {
        self.arena.iter::<RegisterGroup>().map(|(_, group)| group)
    }

    pub fn registers<'a>(&'a self, group: &'a RegisterGroup) -> impl Iterator<Item = &'a Register> {
        group
            .registers
            .iter()
            .map(move |handle| self.arena.get(*handle))
    }

    pub fn sets(&self) -> impl Iterator<Item = &Set> {
        self.arena.iter::<Set>().map(|(_, set)| set)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.arena.iter::<Instruction>().map(|(_, instruction)| instruction)
    }

    pub fn instruction(&self, name: &str) -> Option<&Instruction> {
        self.arena
            .lookup::<Instruction>(name)
            .map(|handle| self.arena.get(handle))
    }

    /// SHA-256 over the canonical rendering, stamped into generated artifacts.
    pub fn fingerprint(&self) -> [u8; 32] {
        let digest = Sha256::digest(self.to_string().as_bytes());
        let mut array = [0u8; 32];
        array.copy_from_slice(&digest);
        array
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "machine {}", self.name)?;
        for entry in &self.entries {
            match *entry {
                Entry::Memory(handle) => {
                    let memory = self.arena.get(handle);
                    writeln!(
                        f,
                        "memory {} [{}] {{ $: {}; >: {} }}",
                        memory.name, memory.width, memory.base, memory.offset
                    )?;
                }
                Entry::Immediate(handle) => {
                    let immediate = self.arena.get(handle);
                    let signedness = if immediate.signed { "signed" } else { "unsigned" };
                    writeln!(
                        f,
                        "immediate {} [{}] {signedness}",
                        immediate.name, immediate.width
                    )?;
                }
                Entry::RegisterGroup(handle) => {
                    let group = self.arena.get(handle);
                    writeln!(f, "register {} [{}]", group.name, group.width)?;
                    for register in self.registers(group) {
                        writeln!(
                            f,
                            "  {}: {} = {:#x}",
                            register.name, register.field, register.code
                        )?;
                    }
                }
                Entry::Set(handle) => {
                    let set = self.arena.get(handle);
                    let members: Vec<&str> = set.members.iter().map(Identifier::as_str).collect();
                    writeln!(f, "set {} {{ {} }}", set.name, members.join(", "))?;
                }
                Entry::Instruction(handle) => {
                    let instruction = self.arena.get(handle);
                    writeln!(f, "instruction {}", instruction.name)?;
                    for form in &instruction.forms {
                        writeln!(
                            f,
                            "  form {} = [{}] ({}-tick)",
                            form.pattern, form.width, form.tick
                        )?;
                        for window in form.program.windows() {
                            write!(
                                f,
                                "    {} @{} [{}]:",
                                window.part, window.base, window.width
                            )?;
                            for (idx, op) in window.ops.iter().enumerate() {
                                let sep = if idx == 0 { " " } else { "; " };
                                write!(f, "{sep}{op}")?;
                            }
                            writeln!(f)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
