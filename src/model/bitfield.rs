//! Inclusive bit ranges used for register encodings, memory sub-fields and mapping items.

use std::fmt;

/// Inclusive `[lower, upper]` bit range. `upper >= lower` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitField {
    lower: u32,
    upper: u32,
}

impl BitField {
    /// Builds a field from two endpoints given in either order.
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    pub fn bit(index: u32) -> Self {
        Self::new(index, index)
    }

    /// `[0, width - 1]`, or `None` for a zero width.
    pub fn spanning(width: u32) -> Option<Self> {
        width.checked_sub(1).map(|upper| Self::new(0, upper))
    }

    pub fn lower(self) -> u32 {
        self.lower
    }

    pub fn upper(self) -> u32 {
        self.upper
    }

    /// Number of bits covered. Saturates for `[0, u32::MAX]`, which the lexer never produces.
    pub fn width(self) -> u32 {
        (self.upper - self.lower).saturating_add(1)
    }

    pub fn overlaps(self, other: BitField) -> bool {
        self.lower <= other.upper && other.lower <= self.upper
    }

    pub fn contains(self, other: BitField) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    /// True when every bit index lies below `width`.
    pub fn fits_within(self, width: u32) -> bool {
        self.upper < width
    }

    /// Intersection of two ranges, if any.
    pub fn clip(self, other: BitField) -> Option<BitField> {
        if self.overlaps(other) {
            Some(Self::new(
                self.lower.max(other.lower),
                self.upper.min(other.upper),
            ))
        } else {
            None
        }
    }

    /// Extracts this field from `value`.
    pub fn extract(self, value: u64) -> u64 {
        if self.lower >= 64 {
            return 0;
        }
        (value >> self.lower) & mask(self.width())
    }
}

/// Low `width` bits set, saturating at 64.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl fmt::Display for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.upper, self.lower)
    }
}
