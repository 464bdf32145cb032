//! Width-consistency rule applied to every bit-range assignment.

use crate::model::arena::DefinitionArena;
use crate::model::bitfield::BitField;
use crate::model::entity::{Handle, Memory, RecordKind};
use crate::model::error::SemanticError;
use crate::model::evaluable::Evaluable;
use crate::model::ident::Identifier;

/// Natural bit width of `evaluable`, or `None` when the width is not checked (literals, register
/// groups, registers and sets).
pub fn natural_width(
    arena: &DefinitionArena,
    evaluable: &Evaluable,
) -> Result<Option<u32>, SemanticError> {
    match evaluable {
        Evaluable::Number(_) => Ok(None),
        Evaluable::Ident(name) => {
            let record = arena
                .resolve(name.as_str())
                .ok_or_else(|| SemanticError::UndefinedReference { name: name.clone() })?;
            match record.kind {
                RecordKind::Memory | RecordKind::Immediate => Ok(arena.width_of(name.as_str())),
                _ => Ok(None),
            }
        }
        Evaluable::Slice(_, field) => Ok(Some(field.width())),
        Evaluable::MemKey(name, role) => {
            let handle = memory(arena, name)?;
            Ok(Some(arena.get(handle).field(*role).width()))
        }
    }
}

/// Checks that `evaluable` fits `field` exactly. The default entry (`field == None`) only
/// accepts a literal number.
pub fn check_mapping_item(
    arena: &DefinitionArena,
    field: Option<BitField>,
    evaluable: &Evaluable,
) -> Result<(), SemanticError> {
    let Some(field) = field else {
        return match evaluable {
            Evaluable::Number(_) => Ok(()),
            other => Err(SemanticError::WidthMismatch {
                field: None,
                source: other.to_string(),
                expected: 0,
                found: natural_width(arena, other)?,
            }),
        };
    };
    match natural_width(arena, evaluable)? {
        Some(found) if found != field.width() => Err(SemanticError::WidthMismatch {
            field: Some(field),
            source: evaluable.to_string(),
            expected: field.width(),
            found: Some(found),
        }),
        _ => Ok(()),
    }
}

fn memory(
    arena: &DefinitionArena,
    name: &Identifier,
) -> Result<Handle<Memory>, SemanticError> {
    match arena.resolve(name.as_str()) {
        None => Err(SemanticError::UndefinedReference { name: name.clone() }),
        Some(_) => arena
            .lookup::<Memory>(name.as_str())
            .ok_or_else(|| SemanticError::InvalidReference {
                name: name.clone(),
                expected: RecordKind::Memory.describe(),
            }),
    }
}
