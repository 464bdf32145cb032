//! Pack programs: the ordered constant/expression operations that assemble an instruction's bits.

use std::fmt;

use smallvec::SmallVec;

use crate::model::arena::DefinitionArena;
use crate::model::bitfield::{BitField, mask};
use crate::model::entity::{Memory, RecordKind, Register};
use crate::model::error::EncodeError;
use crate::model::evaluable::Evaluable;
use crate::model::form::PartKind;
use crate::model::ident::Identifier;

/// One write into a pack window. `field` is relative to the start of the part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackOp {
    Constant {
        field: BitField,
        value: u64,
    },
    Expr {
        field: BitField,
        source: Evaluable,
        /// Low source bits already consumed by an earlier window.
        shift: u32,
    },
}

impl PackOp {
    pub fn field(&self) -> BitField {
        match self {
            PackOp::Constant { field, .. } | PackOp::Expr { field, .. } => *field,
        }
    }

    pub fn width(&self) -> u32 {
        self.field().width()
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, PackOp::Constant { .. })
    }
}

impl fmt::Display for PackOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackOp::Constant { field, value } => write!(f, "{field} <- {value:#x}"),
            PackOp::Expr {
                field,
                source,
                shift: 0,
            } => write!(f, "{field} <- {source}"),
            PackOp::Expr {
                field,
                source,
                shift,
            } => write!(f, "{field} <- {source} >> {shift}"),
        }
    }
}

/// Ops that fill one window of at most the configured window width, flushed as a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackWindow {
    pub part: PartKind,
    /// First bit of the window within its part.
    pub base: u32,
    pub width: u32,
    pub ops: SmallVec<[PackOp; 4]>,
}

impl PackWindow {
    pub fn byte_len(&self) -> usize {
        self.width.div_ceil(8) as usize
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackProgram {
    windows: Vec<PackWindow>,
}

impl PackProgram {
    pub fn new(windows: Vec<PackWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[PackWindow] {
        &self.windows
    }

    pub fn ops(&self) -> impl Iterator<Item = &PackOp> {
        self.windows.iter().flat_map(|window| window.ops.iter())
    }

    pub fn byte_len(&self) -> usize {
        self.windows.iter().map(PackWindow::byte_len).sum()
    }

    /// Interprets the program against operand values. Each window accumulates into a zeroed word
    /// and is flushed little-endian in `ceil(width / 8)` bytes.
    pub fn encode<F>(&self, arena: &DefinitionArena, operands: F) -> Result<Vec<u8>, EncodeError>
    where
        F: Fn(&Identifier) -> Option<u64>,
    {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for window in &self.windows {
            let mut word = 0u64;
            for op in &window.ops {
                let value = match op {
                    PackOp::Constant { value, .. } => *value,
                    PackOp::Expr { source, shift, .. } => {
                        let raw = evaluate(arena, source, &operands)?;
                        if *shift >= 64 { 0 } else { raw >> shift }
                    }
                };
                let offset = op.field().lower() - window.base;
                word |= (value & mask(op.width())) << offset;
            }
            bytes.extend_from_slice(&word.to_le_bytes()[..window.byte_len()]);
        }
        Ok(bytes)
    }
}

fn evaluate<F>(arena: &DefinitionArena, source: &Evaluable, operands: &F) -> Result<u64, EncodeError>
where
    F: Fn(&Identifier) -> Option<u64>,
{
    match source {
        Evaluable::Number(value) => Ok(*value),
        Evaluable::Ident(name) => operand(arena, name, operands),
        Evaluable::Slice(name, field) => Ok(field.extract(operand(arena, name, operands)?)),
        Evaluable::MemKey(name, role) => {
            let value = operand(arena, name, operands)?;
            let memory = arena
                .lookup::<Memory>(name.as_str())
                .ok_or_else(|| EncodeError::UnsupportedOperand(name.clone()))?;
            Ok(arena.get(memory).field(*role).extract(value))
        }
    }
}

fn operand<F>(arena: &DefinitionArena, name: &Identifier, operands: &F) -> Result<u64, EncodeError>
where
    F: Fn(&Identifier) -> Option<u64>,
{
    if let Some(value) = operands(name) {
        return Ok(value);
    }
    match arena.resolve(name.as_str()).map(|record| record.kind) {
        Some(RecordKind::Register) => {
            let register = arena
                .lookup::<Register>(name.as_str())
                .expect("record kind checked");
            Ok(arena.get(register).code)
        }
        Some(RecordKind::Set) => Err(EncodeError::UnsupportedOperand(name.clone())),
        _ => Err(EncodeError::MissingOperand(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::MemRole;
    use crate::model::scope::ScopeStacks;
    use smallvec::smallvec;

    fn window(base: u32, width: u32, ops: SmallVec<[PackOp; 4]>) -> PackWindow {
        PackWindow {
            part: PartKind::Principal,
            base,
            width,
            ops,
        }
    }

    #[test]
    fn encode_packs_little_endian_per_window() {
        let mut arena = DefinitionArena::new();
        arena
            .declare(
                Memory {
                    name: Identifier::new("M"),
                    width: 16,
                    base: BitField::new(7, 0),
                    offset: BitField::new(15, 8),
                },
                &ScopeStacks::new(),
            )
            .expect("M");
        let program = PackProgram::new(vec![window(
            0,
            16,
            smallvec![
                PackOp::Expr {
                    field: BitField::new(0, 3),
                    source: Evaluable::Slice(Identifier::new("x"), BitField::new(0, 3)),
                    shift: 0,
                },
                PackOp::Constant {
                    field: BitField::new(4, 7),
                    value: 0,
                },
                PackOp::Expr {
                    field: BitField::new(8, 15),
                    source: Evaluable::MemKey(Identifier::new("M"), MemRole::Offset),
                    shift: 0,
                },
            ],
        )]);
        let bytes = program
            .encode(&arena, |name| match name.as_str() {
                "x" => Some(0x35),
                "M" => Some(0xAB00),
                _ => None,
            })
            .expect("encode");
        assert_eq!(bytes, vec![0x05, 0xAB]);
    }

    #[test]
    fn straddling_expr_is_shifted_in_second_window() {
        let arena = DefinitionArena::new();
        let source = Evaluable::Ident(Identifier::new("v"));
        let program = PackProgram::new(vec![
            window(
                0,
                8,
                smallvec![PackOp::Expr {
                    field: BitField::new(4, 7),
                    source: source.clone(),
                    shift: 0,
                }],
            ),
            window(
                8,
                8,
                smallvec![PackOp::Expr {
                    field: BitField::new(8, 11),
                    source,
                    shift: 4,
                }],
            ),
        ]);
        let bytes = program.encode(&arena, |_| Some(0xBA)).expect("encode");
        assert_eq!(bytes, vec![0xA0, 0x0B]);
    }

    #[test]
    fn missing_operand_is_reported() {
        let arena = DefinitionArena::new();
        let program = PackProgram::new(vec![window(
            0,
            8,
            smallvec![PackOp::Expr {
                field: BitField::new(0, 7),
                source: Evaluable::Ident(Identifier::new("imm")),
                shift: 0,
            }],
        )]);
        assert_eq!(
            program.encode(&arena, |_| None),
            Err(EncodeError::MissingOperand(Identifier::new("imm")))
        );
    }

    #[test]
    fn partial_byte_window_rounds_up() {
        let program = PackProgram::new(vec![window(
            0,
            12,
            smallvec![PackOp::Constant {
                field: BitField::new(0, 11),
                value: 0xFFF,
            }],
        )]);
        assert_eq!(program.byte_len(), 2);
        let bytes = program
            .encode(&DefinitionArena::new(), |_| None)
            .expect("constant-only program");
        assert_eq!(bytes, vec![0xFF, 0x0F]);
    }
}
