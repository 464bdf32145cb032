//! Instruction parts and forms, and the assembler that resolves them into pack programs.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::model::arena::DefinitionArena;
use crate::model::bitfield::BitField;
use crate::model::config::BuilderConfig;
use crate::model::error::SemanticError;
use crate::model::evaluable::Evaluable;
use crate::model::ident::Identifier;
use crate::model::mapping::MappingItems;
use crate::model::pattern::Pattern;
use crate::model::program::{PackOp, PackProgram, PackWindow};
use crate::model::validator::check_mapping_item;

pub const MAX_PARTS: usize = 3;

/// Position of a part within the emitted form. Ordering follows emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartKind {
    Prefix,
    Principal,
    Suffix,
}

impl PartKind {
    pub fn sigil(self) -> char {
        match self {
            PartKind::Prefix => '^',
            PartKind::Principal => '~',
            PartKind::Suffix => '&',
        }
    }

    fn flag(self) -> PartSet {
        match self {
            PartKind::Prefix => PartSet::PREFIX,
            PartKind::Principal => PartSet::PRINCIPAL,
            PartKind::Suffix => PartSet::SUFFIX,
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartKind::Prefix => f.write_str("prefix"),
            PartKind::Principal => f.write_str("principal"),
            PartKind::Suffix => f.write_str("suffix"),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PartSet: u8 {
        const PREFIX = 0b001;
        const PRINCIPAL = 0b010;
        const SUFFIX = 0b100;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// One evaluable spanning the whole part.
    Single(Evaluable),
    Mapping(MappingItems),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrPart {
    pub kind: PartKind,
    pub width: u32,
    pub layout: Layout,
}

impl InstrPart {
    pub fn new(kind: PartKind, width: u32, layout: Layout) -> Self {
        Self {
            kind,
            width,
            layout,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrForm {
    pub pattern: Pattern,
    pub width: u32,
    pub tick: u32,
    pub parts: SmallVec<[InstrPart; MAX_PARTS]>,
    pub program: PackProgram,
}

impl InstrForm {
    pub fn part(&self, kind: PartKind) -> Option<&InstrPart> {
        self.parts.iter().find(|part| part.kind == kind)
    }

    pub fn kinds(&self) -> PartSet {
        self.parts
            .iter()
            .fold(PartSet::empty(), |set, part| set | part.kind.flag())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub name: Identifier,
    pub forms: Vec<InstrForm>,
}

/// Validates the parts of a form, orders them prefix → principal → suffix and resolves each one
/// into windows of at most `config.window_bits()` bits.
pub fn assemble(
    arena: &DefinitionArena,
    config: &BuilderConfig,
    pattern: Pattern,
    width: u32,
    tick: Option<u32>,
    parts: Vec<InstrPart>,
) -> Result<InstrForm, SemanticError> {
    if width == 0 {
        return Err(SemanticError::malformed("form width must be non-zero"));
    }
    let tick = tick.unwrap_or(1);
    if tick == 0 {
        return Err(SemanticError::malformed("tick count must be non-zero"));
    }
    if parts.is_empty() {
        return Err(SemanticError::malformed("form declares no parts"));
    }
    if parts.len() > MAX_PARTS {
        return Err(SemanticError::malformed(format!(
            "form declares {} parts, at most {MAX_PARTS} are allowed",
            parts.len()
        )));
    }

    let mut seen = PartSet::empty();
    for part in &parts {
        if seen.contains(part.kind.flag()) {
            return Err(SemanticError::malformed(format!(
                "{} part declared more than once",
                part.kind
            )));
        }
        seen |= part.kind.flag();
        if part.width == 0 {
            return Err(SemanticError::malformed(format!(
                "{} part width must be non-zero",
                part.kind
            )));
        }
        match &part.layout {
            Layout::Mapping(items) if items.width() != part.width => {
                return Err(SemanticError::malformed(format!(
                    "{} part is {} bits wide but its mapping covers {}",
                    part.kind,
                    part.width,
                    items.width()
                )));
            }
            Layout::Single(evaluable) => {
                check_mapping_item(arena, BitField::spanning(part.width), evaluable)?;
            }
            Layout::Mapping(_) => {}
        }
    }

    let total: u64 = parts.iter().map(|part| u64::from(part.width)).sum();
    if config.check_part_coverage() && total != u64::from(width) {
        return Err(SemanticError::malformed(format!(
            "parts cover {total} bits of a {width}-bit form"
        )));
    }

    let mut parts: SmallVec<[InstrPart; MAX_PARTS]> = parts.into_iter().collect();
    parts.sort_by_key(|part| part.kind);

    let mut windows = Vec::new();
    for part in &parts {
        pack_part(part, config.window_bits(), &mut windows);
    }

    Ok(InstrForm {
        pattern,
        width,
        tick,
        parts,
        program: PackProgram::new(windows),
    })
}

fn pack_part(part: &InstrPart, window_bits: u32, windows: &mut Vec<PackWindow>) {
    let mut base = 0;
    while base < part.width {
        let width = window_bits.min(part.width - base);
        let range = BitField::new(base, base + width - 1);
        let ops = match &part.layout {
            Layout::Mapping(items) => items.resolve(range).into_iter().collect(),
            Layout::Single(evaluable) => SmallVec::from_elem(
                PackOp::Expr {
                    field: range,
                    source: evaluable.clone(),
                    shift: base,
                },
                1,
            ),
        };
        windows.push(PackWindow {
            part: part.kind,
            base,
            width,
            ops,
        });
        base += width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::error::ErrorKind;
    use crate::model::mapping::MappingItem;

    fn mapping(width: u32, items: &[(u32, u32, &str)]) -> Layout {
        let mut map = MappingItems::new(width);
        for (lo, hi, name) in items {
            map.insert(MappingItem::new(
                BitField::new(*lo, *hi),
                Evaluable::Slice(Identifier::new(*name), BitField::new(0, hi - lo)),
            ))
            .expect("insert");
        }
        Layout::Mapping(map)
    }

    fn assemble_parts(width: u32, parts: Vec<InstrPart>) -> Result<InstrForm, SemanticError> {
        assemble(
            &DefinitionArena::new(),
            &BuilderConfig::default(),
            Pattern::new(["a"]),
            width,
            None,
            parts,
        )
    }

    #[test]
    fn parts_are_emitted_prefix_principal_suffix() {
        let form = assemble_parts(
            24,
            vec![
                InstrPart::new(PartKind::Suffix, 8, Layout::Single(Evaluable::Number(3))),
                InstrPart::new(PartKind::Principal, 8, mapping(8, &[(0, 3, "a")])),
                InstrPart::new(PartKind::Prefix, 8, Layout::Single(Evaluable::Number(1))),
            ],
        )
        .expect("assemble");
        let order: Vec<PartKind> = form.program.windows().iter().map(|w| w.part).collect();
        assert_eq!(
            order,
            vec![PartKind::Prefix, PartKind::Principal, PartKind::Suffix]
        );
        assert_eq!(form.tick, 1, "tick defaults to one");
        assert_eq!(form.kinds(), PartSet::all());
    }

    #[test]
    fn duplicate_part_kind_is_malformed() {
        let err = assemble_parts(
            16,
            vec![
                InstrPart::new(PartKind::Principal, 8, Layout::Single(Evaluable::Number(0))),
                InstrPart::new(PartKind::Principal, 8, Layout::Single(Evaluable::Number(0))),
            ],
        )
        .expect_err("two principal parts");
        assert_eq!(err.kind(), ErrorKind::MalformedForm);
    }

    #[test]
    fn four_parts_are_malformed() {
        let part = InstrPart::new(PartKind::Prefix, 8, Layout::Single(Evaluable::Number(0)));
        let err = assemble_parts(32, vec![part.clone(), part.clone(), part.clone(), part])
            .expect_err("too many parts");
        assert!(err.to_string().contains("at most 3"), "{err}");
    }

    #[test]
    fn zero_width_part_is_malformed() {
        let err = assemble_parts(
            8,
            vec![
                InstrPart::new(PartKind::Prefix, 0, Layout::Single(Evaluable::Number(0))),
                InstrPart::new(PartKind::Principal, 8, Layout::Single(Evaluable::Number(0))),
            ],
        )
        .expect_err("zero width");
        assert_eq!(err.kind(), ErrorKind::MalformedForm);
    }

    #[test]
    fn part_widths_must_cover_form() {
        let parts = vec![InstrPart::new(
            PartKind::Principal,
            8,
            Layout::Single(Evaluable::Number(0)),
        )];
        assert!(assemble_parts(16, parts.clone()).is_err());
        let relaxed = assemble(
            &DefinitionArena::new(),
            &BuilderConfig::default().with_part_coverage(false),
            Pattern::default(),
            16,
            Some(2),
            parts,
        )
        .expect("coverage check disabled");
        assert_eq!(relaxed.tick, 2);
    }

    #[test]
    fn wide_parts_split_into_windows() {
        let form = assemble_parts(
            96,
            vec![InstrPart::new(
                PartKind::Principal,
                96,
                mapping(96, &[(60, 67, "a")]),
            )],
        )
        .expect("assemble");
        let windows = form.program.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!((windows[0].base, windows[0].width), (0, 64));
        assert_eq!((windows[1].base, windows[1].width), (64, 32));
        assert_eq!(form.program.byte_len(), 12);
        let last_low = windows[0].ops.last().expect("ops");
        assert_eq!(last_low.field(), BitField::new(60, 63));
        match &windows[1].ops[0] {
            PackOp::Expr { field, shift, .. } => {
                assert_eq!(*field, BitField::new(64, 67));
                assert_eq!(*shift, 4);
            }
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn single_layout_spans_part() {
        let form = assemble_parts(
            16,
            vec![InstrPart::new(
                PartKind::Principal,
                16,
                Layout::Single(Evaluable::Number(0xBEEF)),
            )],
        )
        .expect("assemble");
        let ops: Vec<&PackOp> = form.program.ops().collect();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].field(), BitField::new(0, 15));
    }
}
