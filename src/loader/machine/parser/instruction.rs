use crate::model::bitfield::BitField;
use crate::model::builder::MachineBuilder;
use crate::model::entity::MemRole;
use crate::model::error::MachineError;
use crate::model::evaluable::Evaluable;
use crate::model::form::{InstrForm, InstrPart, Layout, PartKind};

use super::{Parser, TokenKind, TokenValue, field_value};

impl<'src> Parser<'src> {
    /// `instruction NAME { form+ }`
    pub(super) fn parse_instruction(
        &mut self,
        builder: &mut MachineBuilder,
    ) -> Result<(), MachineError> {
        let start = self.expect(TokenKind::Instruction, "'instruction'")?;
        let name = self.expect_identifier("instruction name")?;
        self.expect(TokenKind::LBrace, "'{' to open instruction")?;
        let mut forms = Vec::new();
        {
            let mut insn = builder.instruction_scope(&name.lexeme);
            while !self.check(TokenKind::RBrace)? {
                forms.push(self.parse_form(&mut insn)?);
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close instruction")?;
        self.lift(builder.declare_instruction(&name.lexeme, forms), &start)?;
        Ok(())
    }

    /// `[operands] = [W] (N-tick)? { part+ }`
    fn parse_form(&mut self, builder: &mut MachineBuilder) -> Result<InstrForm, MachineError> {
        let open = self.expect(TokenKind::LBracket, "'[' to open an operand list")?;
        let mut operands = Vec::new();
        if !self.check(TokenKind::RBracket)? {
            loop {
                operands.push(self.expect_identifier("operand name")?);
                if !self.check(TokenKind::Comma)? {
                    break;
                }
                self.consume()?;
            }
        }
        self.expect(TokenKind::RBracket, "']' to close the operand list")?;
        let names: Vec<&str> = operands.iter().map(|token| token.lexeme.as_str()).collect();
        let pattern = self.lift(builder.bind_pattern(&names), &open)?;

        self.expect(TokenKind::Equals, "'=' after operand list")?;
        let width = self.expect_width("form width")?;
        let tick = if self.check(TokenKind::Tick)? {
            match self.consume()?.value {
                TokenValue::Tick(count) => Some(count),
                _ => unreachable!("tick tokens carry a count"),
            }
        } else {
            None
        };

        self.expect(TokenKind::LBrace, "'{' to open form parts")?;
        let mut form = builder.scope(None, Some(width));
        let mut parts = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            parts.push(self.parse_part(&mut form)?);
        }
        self.expect(TokenKind::RBrace, "'}' to close form parts")?;
        self.lift(form.assemble_form(pattern, width, tick, parts), &open)
    }

    /// `(^ | ~ | &) : [W] = layout`
    fn parse_part(&mut self, builder: &mut MachineBuilder) -> Result<InstrPart, MachineError> {
        let key = self.consume()?;
        let kind = match key.kind {
            TokenKind::Caret => PartKind::Prefix,
            TokenKind::Tilde => PartKind::Principal,
            TokenKind::Ampersand => PartKind::Suffix,
            _ => return Err(self.unexpected(&key, "part key '^', '~' or '&'")),
        };
        self.expect(TokenKind::Colon, "':' after part key")?;
        let width = self.expect_width("part width")?;
        self.expect(TokenKind::Equals, "'=' before part layout")?;

        let mut part = builder.scope(None, Some(width));
        let layout = if self.check(TokenKind::LBrace)? {
            self.parse_mapping(&mut part, width)?
        } else {
            Layout::Single(self.parse_evaluable(&part)?)
        };
        part.close();
        self.skip_separator()?;
        Ok(InstrPart::new(kind, width, layout))
    }

    /// `{ ([hi-lo] | [...]) = evaluable, ... }`
    fn parse_mapping(
        &mut self,
        builder: &mut MachineBuilder,
        width: u32,
    ) -> Result<Layout, MachineError> {
        self.expect(TokenKind::LBrace, "'{' to open mapping")?;
        let mut mapping = builder.mapping(width);
        while !self.check(TokenKind::RBrace)? {
            let key = self.consume()?;
            let field = match key.kind {
                TokenKind::Field => {
                    let field = field_value(&key);
                    Some(self.lift(mapping.field(field.lower(), field.upper()), &key)?)
                }
                TokenKind::Default => None,
                _ => return Err(self.unexpected(&key, "bit field or '[...]'")),
            };
            self.expect(TokenKind::Equals, "'=' after mapping key")?;
            let evaluable = self.parse_evaluable(&mapping)?;
            self.lift(mapping.insert_mapping(field, evaluable), &key)?;
            if !self.skip_separator()? {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close mapping")?;
        Ok(Layout::Mapping(mapping.finish()))
    }

    /// `NUMBER | NAME | NAME[hi-lo] | NAME[bit] | NAME.$ | NAME.>`
    fn parse_evaluable(&mut self, builder: &MachineBuilder) -> Result<Evaluable, MachineError> {
        let token = self.consume()?;
        match token.kind {
            TokenKind::Number => match token.value {
                TokenValue::Number(value) => Ok(builder.number(value)),
                _ => unreachable!("number tokens carry a value"),
            },
            TokenKind::Identifier => match self.peek()?.kind {
                TokenKind::Field => {
                    let field = field_value(&self.consume()?);
                    self.lift(builder.slice(&token.lexeme, field), &token)
                }
                TokenKind::Width => {
                    let bit = match self.consume()?.value {
                        TokenValue::Width(bit) => bit,
                        _ => unreachable!("width tokens carry a width"),
                    };
                    self.lift(builder.slice(&token.lexeme, BitField::bit(bit)), &token)
                }
                TokenKind::Period => {
                    self.consume()?;
                    let role_token = self.consume()?;
                    let role = match role_token.kind {
                        TokenKind::Dollar => MemRole::Base,
                        TokenKind::GreaterThan => MemRole::Offset,
                        _ => return Err(self.unexpected(&role_token, "memory role '$' or '>'")),
                    };
                    self.lift(builder.mem_key(&token.lexeme, role), &token)
                }
                _ => self.lift(builder.ident(&token.lexeme), &token),
            },
            _ => Err(self.unexpected(&token, "a number, name, slice or memory key")),
        }
    }
}
