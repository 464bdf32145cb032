//! Pending-identifier and enclosing-width stacks, pushed and popped in strict LIFO order.

use crate::model::bitfield::BitField;
use crate::model::error::SemanticError;
use crate::model::ident::Identifier;

#[derive(Debug, Clone, Copy)]
struct Frame {
    ident: bool,
    width: bool,
}

#[derive(Debug, Default)]
pub struct ScopeStacks {
    idents: Vec<Identifier>,
    widths: Vec<u32>,
    frames: Vec<Frame>,
}

impl ScopeStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a construct scope. `name` becomes pending and `width` bounds nested bit fields
    /// until the matching [`leave`](Self::leave).
    pub fn enter(&mut self, name: Option<Identifier>, width: Option<u32>) {
        let frame = Frame {
            ident: name.is_some(),
            width: width.is_some(),
        };
        if let Some(name) = name {
            self.idents.push(name);
        }
        if let Some(width) = width {
            self.widths.push(width);
        }
        self.frames.push(frame);
    }

    /// Closes the innermost scope. Panics when no scope is open.
    pub fn leave(&mut self) {
        let frame = self.frames.pop().expect("scope stack underflow");
        if frame.ident {
            self.idents.pop().expect("identifier stack underflow");
        }
        if frame.width {
            self.widths.pop().expect("width stack underflow");
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.idents.iter().any(|pending| pending == name)
    }

    pub fn current_width(&self) -> Option<u32> {
        self.widths.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Rejects `field` when it reaches past the innermost enclosing width.
    pub fn check_field(&self, field: BitField) -> Result<BitField, SemanticError> {
        match self.current_width() {
            Some(width) if !field.fits_within(width) => {
                Err(SemanticError::BitOutOfBounds { field, width })
            }
            _ => Ok(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_pop_only_what_they_pushed() {
        let mut scopes = ScopeStacks::new();
        scopes.enter(Some(Identifier::new("demo")), None);
        scopes.enter(None, Some(32));
        scopes.enter(None, Some(16));
        assert_eq!(scopes.current_width(), Some(16));
        scopes.leave();
        assert_eq!(scopes.current_width(), Some(32));
        assert!(scopes.is_pending("demo"));
        scopes.leave();
        assert_eq!(scopes.current_width(), None);
        assert!(scopes.is_pending("demo"), "width-only frame must keep the name");
        scopes.leave();
        assert!(!scopes.is_pending("demo"));
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn field_bound_is_exclusive() {
        let mut scopes = ScopeStacks::new();
        assert!(scopes.check_field(BitField::new(0, 200)).is_ok(), "no bound outside scopes");
        scopes.enter(None, Some(8));
        assert!(scopes.check_field(BitField::new(7, 0)).is_ok());
        let err = scopes
            .check_field(BitField::new(8, 0))
            .expect_err("bit 8 is outside an 8-bit width");
        assert_eq!(
            err,
            SemanticError::BitOutOfBounds {
                field: BitField::new(0, 8),
                width: 8
            }
        );
    }

    #[test]
    #[should_panic(expected = "scope stack underflow")]
    fn leaving_without_scope_panics() {
        ScopeStacks::new().leave();
    }
}
