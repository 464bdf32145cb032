use std::fmt;

use crate::model::bitfield::BitField;
use crate::model::entity::MemRole;
use crate::model::ident::Identifier;

/// A typed value source placed into a bit range.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Evaluable {
    Number(u64),
    Ident(Identifier),
    Slice(Identifier, BitField),
    MemKey(Identifier, MemRole),
}

impl fmt::Display for Evaluable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluable::Number(value) => write!(f, "{value:#x}"),
            Evaluable::Ident(name) => write!(f, "{name}"),
            Evaluable::Slice(name, field) => write!(f, "{name}{field}"),
            Evaluable::MemKey(name, role) => write!(f, "{name}.{}", role.sigil()),
        }
    }
}
