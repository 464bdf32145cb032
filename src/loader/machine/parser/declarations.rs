use crate::model::builder::MachineBuilder;
use crate::model::entity::MemRole;
use crate::model::error::MachineError;

use super::{Parser, TokenKind};

impl<'src> Parser<'src> {
    /// `register NAME [W] { reg: [hi-lo] = code; ... }`
    pub(super) fn parse_register_group(
        &mut self,
        builder: &mut MachineBuilder,
    ) -> Result<(), MachineError> {
        let start = self.expect(TokenKind::Register, "'register'")?;
        let name = self.expect_identifier("register group name")?;
        let width = self.expect_width("register group width")?;
        self.expect(TokenKind::LBrace, "'{' to open register group")?;
        let mut registers = Vec::new();
        {
            let mut group = builder.scope(Some(&name.lexeme), Some(width));
            while !self.check(TokenKind::RBrace)? {
                let register = self.expect_identifier("register name")?;
                self.expect(TokenKind::Colon, "':' after register name")?;
                let field = self.expect_field("register bit field")?;
                self.expect(TokenKind::Equals, "'=' before register code")?;
                let code = self.expect_number("register code")?;
                let handle = self.lift(
                    group.declare_register(&register.lexeme, field, code),
                    &register,
                )?;
                registers.push(handle);
                self.skip_separator()?;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close register group")?;
        self.lift(
            builder.declare_register_group(&name.lexeme, width, registers),
            &start,
        )?;
        Ok(())
    }

    /// `memory NAME [W] { $: [hi-lo]; >: [hi-lo] }`
    pub(super) fn parse_memory(&mut self, builder: &mut MachineBuilder) -> Result<(), MachineError> {
        let start = self.expect(TokenKind::Memory, "'memory'")?;
        let name = self.expect_identifier("memory name")?;
        let width = self.expect_width("memory width")?;
        self.expect(TokenKind::LBrace, "'{' to open memory")?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            let key = self.consume()?;
            let role = match key.kind {
                TokenKind::Dollar => MemRole::Base,
                TokenKind::GreaterThan => MemRole::Offset,
                _ => return Err(self.unexpected(&key, "memory role '$' or '>'")),
            };
            self.expect(TokenKind::Colon, "':' after memory role")?;
            let field = self.expect_field("memory bit field")?;
            fields.push((role, field));
            self.skip_separator()?;
        }
        self.expect(TokenKind::RBrace, "'}' to close memory")?;
        self.lift(builder.declare_memory(&name.lexeme, width, fields), &start)?;
        Ok(())
    }

    /// `immediate NAME [W] (signed | unsigned)?`
    pub(super) fn parse_immediate(
        &mut self,
        builder: &mut MachineBuilder,
    ) -> Result<(), MachineError> {
        let start = self.expect(TokenKind::Immediate, "'immediate'")?;
        let name = self.expect_identifier("immediate name")?;
        let width = self.expect_width("immediate width")?;
        let signed = match self.peek()?.kind {
            TokenKind::Signed => {
                self.consume()?;
                true
            }
            TokenKind::Unsigned => {
                self.consume()?;
                false
            }
            _ => false,
        };
        self.lift(builder.declare_immediate(&name.lexeme, width, signed), &start)?;
        self.skip_separator()?;
        Ok(())
    }

    /// `set NAME { member, ... }`
    pub(super) fn parse_set(&mut self, builder: &mut MachineBuilder) -> Result<(), MachineError> {
        let start = self.expect(TokenKind::Set, "'set'")?;
        let name = self.expect_identifier("set name")?;
        self.expect(TokenKind::LBrace, "'{' to open set")?;
        let mut members = Vec::new();
        loop {
            members.push(self.expect_identifier("set member")?);
            if !self.skip_separator()? || self.check(TokenKind::RBrace)? {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close set")?;
        let names: Vec<&str> = members.iter().map(|token| token.lexeme.as_str()).collect();
        self.lift(builder.declare_set(&name.lexeme, &names), &start)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::loader::machine::parser::parse_str;
    use crate::model::bitfield::BitField;
    use crate::model::entity::RegisterGroup;
    use crate::model::error::MachineError;

    #[test]
    fn parses_register_group_with_codes() {
        let machine = parse_str(
            PathBuf::from("<test>"),
            "machine m { register gpr [32] { r0: [4-0] = 0; r1: [4-0] = 0x1, } }",
        )
        .expect("parse");
        let group = machine.register_groups().next().expect("group");
        assert_eq!(group.width, 32);
        let registers: Vec<_> = machine.registers(group).collect();
        assert_eq!(registers.len(), 2);
        assert_eq!(registers[1].code, 1);
        assert_eq!(registers[1].field, BitField::new(0, 4));
        let handle = machine.arena().lookup::<RegisterGroup>("gpr");
        assert_eq!(registers[0].group, handle);
    }

    #[test]
    fn parses_memory_roles_in_any_order() {
        let machine = parse_str(
            PathBuf::from("<test>"),
            "machine m { memory M [2-byte] { >: [15-8]; $: [7-0] } }",
        )
        .expect("parse");
        let memory = machine.memories().next().expect("memory");
        assert_eq!(memory.width, 16);
        assert_eq!(memory.base, BitField::new(0, 7));
        assert_eq!(memory.offset, BitField::new(8, 15));
    }

    #[test]
    fn parses_immediates_and_sets() {
        let machine = parse_str(
            PathBuf::from("<test>"),
            "machine m { immediate simm [16] signed; immediate uimm [8]; set imms { simm, uimm } }",
        )
        .expect("parse");
        let immediates: Vec<_> = machine.immediates().collect();
        assert!(immediates[0].signed);
        assert!(!immediates[1].signed);
        let set = machine.sets().next().expect("set");
        assert_eq!(set.members.len(), 2);
    }

    #[test]
    fn register_outside_group_width_is_rejected() {
        let err = parse_str(
            PathBuf::from("<test>"),
            "machine m { register cr [4] { cr0: [4-0] = 0; } }",
        )
        .expect_err("bit 4 in a 4-bit group");
        match err {
            MachineError::Diagnostics { diagnostics, .. } => {
                assert_eq!(diagnostics[0].code, "semantic.bit-out-of-bounds");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
