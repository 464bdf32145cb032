//! Sparse assignment of evaluables to bit ranges of one instruction part, and the gap-filling
//! resolver that turns it into pack operations.

use crate::model::bitfield::{BitField, mask};
use crate::model::error::SemanticError;
use crate::model::evaluable::Evaluable;
use crate::model::ident::Identifier;
use crate::model::program::PackOp;

/// One explicit binding, or the default entry when `field` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingItem {
    pub field: Option<BitField>,
    pub evaluable: Evaluable,
}

impl MappingItem {
    pub fn new(field: BitField, evaluable: Evaluable) -> Self {
        Self {
            field: Some(field),
            evaluable,
        }
    }

    pub fn default_fill(value: u64) -> Self {
        Self {
            field: None,
            evaluable: Evaluable::Number(value),
        }
    }
}

/// Non-overlapping items ordered by lower bit, bounded by the part width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingItems {
    width: u32,
    items: Vec<(BitField, Evaluable)>,
    lowest: Option<u32>,
    default: Option<u64>,
}

impl MappingItems {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            items: Vec::new(),
            lowest: None,
            default: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Lowest explicitly covered bit.
    pub fn lowest(&self) -> Option<u32> {
        self.lowest
    }

    pub fn default_value(&self) -> Option<u64> {
        self.default
    }

    pub fn items(&self) -> impl Iterator<Item = (BitField, &Evaluable)> {
        self.items.iter().map(|(field, evaluable)| (*field, evaluable))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: MappingItem) -> Result<(), SemanticError> {
        let Some(field) = item.field else {
            if self.default.is_some() {
                return Err(SemanticError::DuplicateDefinition {
                    name: Identifier::new("[...]"),
                });
            }
            return match item.evaluable {
                Evaluable::Number(value) => {
                    self.default = Some(value);
                    Ok(())
                }
                other => Err(SemanticError::WidthMismatch {
                    field: None,
                    source: other.to_string(),
                    expected: 0,
                    found: None,
                }),
            };
        };
        if !field.fits_within(self.width) {
            return Err(SemanticError::BitOutOfBounds {
                field,
                width: self.width,
            });
        }
        let idx = self
            .items
            .partition_point(|(stored, _)| stored.lower() < field.lower());
        let neighbours = idx.checked_sub(1).into_iter().chain(std::iter::once(idx));
        for pos in neighbours {
            if let Some((existing, _)) = self.items.get(pos) {
                if existing.overlaps(field) {
                    return Err(SemanticError::OverlappingRange {
                        range: field,
                        existing: *existing,
                    });
                }
            }
        }
        self.items.insert(idx, (field, item.evaluable));
        self.lowest = Some(self.lowest.map_or(field.lower(), |low| low.min(field.lower())));
        Ok(())
    }

    /// Lowest stored item overlapping `range`.
    pub fn lookup(&self, range: BitField) -> Option<(BitField, &Evaluable)> {
        let idx = self
            .items
            .partition_point(|(stored, _)| stored.upper() < range.lower());
        self.items
            .get(idx)
            .filter(|(stored, _)| stored.overlaps(range))
            .map(|(stored, evaluable)| (*stored, evaluable))
    }

    /// Bit broadcast into uncovered ranges: the default's least significant bit.
    pub fn fill_bit(&self) -> bool {
        self.default.is_some_and(|value| value & 1 == 1)
    }

    /// Partitions `range` into ascending, disjoint, gap-free pack operations. Items reaching past
    /// the range are clipped to it.
    pub fn resolve(&self, range: BitField) -> Vec<PackOp> {
        let mut ops = Vec::with_capacity(2 * self.items.len() + 1);
        self.resolve_into(range, &mut ops, 0);
        ops
    }

    fn resolve_into(&self, range: BitField, ops: &mut Vec<PackOp>, depth: usize) {
        assert!(
            depth <= self.items.len() + 1,
            "mapping resolution exceeded its recursion bound"
        );
        let Some((stored, evaluable)) = self.lookup(range) else {
            let value = if self.fill_bit() {
                mask(range.width())
            } else {
                0
            };
            ops.push(PackOp::Constant {
                field: range,
                value,
            });
            return;
        };
        if stored.lower() > range.lower() {
            self.resolve_into(
                BitField::new(range.lower(), stored.lower() - 1),
                ops,
                depth + 1,
            );
        }
        let field = stored.clip(range).expect("lookup returns overlapping items");
        ops.push(PackOp::Expr {
            field,
            source: evaluable.clone(),
            shift: field.lower() - stored.lower(),
        });
        if stored.upper() < range.upper() {
            self.resolve_into(
                BitField::new(stored.upper() + 1, range.upper()),
                ops,
                depth + 1,
            );
        }
    }
}
