//! Operand signatures that distinguish the overloaded forms of one instruction.

use std::fmt;

use smallvec::SmallVec;

use crate::model::ident::Identifier;

/// Ordered list of formal operand names. Equal iff same length and pairwise-equal names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pattern {
    args: SmallVec<[Identifier; 4]>,
}

impl Pattern {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[Identifier] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str("]")
    }
}

/// Patterns already bound to forms of the instruction currently being built.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an equal pattern is already registered.
    pub fn test(&self, pattern: &Pattern) -> bool {
        self.patterns.iter().any(|known| known == pattern)
    }

    pub fn add(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
