use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;
use xmachine::loader::machine::{MachineLoader, parse_str};
use xmachine::model::bitfield::BitField;
use xmachine::model::diagnostic::DiagnosticPhase;
use xmachine::model::error::MachineError;
use xmachine::model::form::PartKind;
use xmachine::model::program::PackOp;

const DEMO: &str = r#"
# small accumulator machine
machine demo {
    register gpr [32] {
        r0: [4-0] = 0;
        r1: [4-0] = 1;
        r2: [4-0] = 2;
    }
    memory M [2-byte] { $: [7-0]; >: [15-8] }
    immediate imm8 [8] unsigned;
    immediate simm4 [4] signed;
    set alu { r0, r1 }

    instruction ld {
        [gpr, M] = [16] {
            ~: [16] = { [3-0] = gpr[3-0], [15-8] = M.>, [...] = 0 }
        }
    }

    // three parts declared out of order
    instruction li {
        [gpr, imm8] = [24] (3-tick) {
            &: [8] = imm8;
            ^: [8] = 0x0F;
            ~: [8] = { [4-0] = gpr, [...] = 1 }
        }
        [simm4] = [8] { ~: [8] = { [3-0] = simm4 } }
    }
}
"#;

#[test]
fn demo_machine_builds_in_source_order() {
    let machine = parse_str(PathBuf::from("demo.mm"), DEMO).expect("demo parses");
    assert_eq!(machine.name(), "demo");
    assert_eq!(machine.entries().len(), 7);
    assert_eq!(machine.memories().count(), 1);
    assert_eq!(machine.immediates().count(), 2);
    assert_eq!(machine.sets().count(), 1);
    let names: Vec<&str> = machine.instructions().map(|insn| insn.name.as_str()).collect();
    assert_eq!(names, vec!["ld", "li"]);
}

#[test]
fn mapping_gaps_are_default_filled() {
    let machine = parse_str(PathBuf::from("demo.mm"), DEMO).expect("demo parses");
    let form = &machine.instruction("ld").expect("ld").forms[0];
    let ops: Vec<&PackOp> = form.program.ops().collect();
    assert_eq!(ops.len(), 3);
    assert!(matches!(ops[0], PackOp::Expr { field, shift: 0, .. } if *field == BitField::new(0, 3)));
    assert!(matches!(
        ops[1],
        PackOp::Constant { field, value: 0 } if *field == BitField::new(4, 7)
    ));
    assert!(matches!(ops[2], PackOp::Expr { field, .. } if *field == BitField::new(8, 15)));
}

#[test]
fn parts_are_ordered_prefix_principal_suffix() {
    let machine = parse_str(PathBuf::from("demo.mm"), DEMO).expect("demo parses");
    let li = machine.instruction("li").expect("li");
    let form = &li.forms[0];
    assert_eq!(form.tick, 3);
    let parts: Vec<PartKind> = form.program.windows().iter().map(|window| window.part).collect();
    assert_eq!(parts, vec![PartKind::Prefix, PartKind::Principal, PartKind::Suffix]);
    assert_eq!(form.program.byte_len(), 3);
}

#[test]
fn rendering_and_fingerprint_are_deterministic() {
    let first = parse_str(PathBuf::from("a.mm"), DEMO).expect("demo parses");
    let second = parse_str(PathBuf::from("b.mm"), DEMO).expect("demo parses");
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.fingerprint(), second.fingerprint());

    let rendered = first.to_string();
    assert!(rendered.starts_with("machine demo\n"));
    assert!(rendered.contains("memory M [16] { $: [7-0]; >: [15-8] }"));
    assert!(rendered.contains("  form [gpr, imm8] = [24] (3-tick)"));

    let changed = parse_str(PathBuf::from("c.mm"), &DEMO.replace("r2: [4-0] = 2", "r2: [4-0] = 3"))
        .expect("variant parses");
    assert_ne!(first.fingerprint(), changed.fingerprint());
}

#[test]
fn loader_reads_files_and_reports_locations() {
    let dir = tempdir().expect("tempdir");
    let good = dir.path().join("demo.mm");
    fs::write(&good, DEMO).expect("write demo");
    let machine = MachineLoader::new().load_file(&good).expect("load");
    assert_eq!(machine.name(), "demo");

    let bad = dir.path().join("bad.mm");
    fs::write(
        &bad,
        "machine bad {\n  immediate imm8 [8];\n  instruction x {\n    [imm8] = [8] { ~: [8] = { [3-0] = imm8 } }\n  }\n}\n",
    )
    .expect("write bad");
    let err = MachineLoader::new().load_file(&bad).expect_err("width mismatch");
    match err {
        MachineError::Diagnostics { phase, diagnostics } => {
            assert_eq!(phase, DiagnosticPhase::Semantic);
            assert_eq!(diagnostics[0].code, "semantic.width-mismatch");
            let span = diagnostics[0].span.as_ref().expect("span");
            assert_eq!(span.start.line, 4);
            assert!(diagnostics[0].format_human().contains("bad.mm:4"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn failures_in_one_construct_do_not_leak_scope_state() {
    let err = parse_str(
        PathBuf::from("<test>"),
        "machine m { register g [8] { a: [9-0] = 0 } }",
    )
    .expect_err("field wider than group");
    assert_eq!(err.diagnostics()[0].code, "semantic.bit-out-of-bounds");

    let err = parse_str(
        PathBuf::from("<test>"),
        "machine m { memory M [16] { $: [7-0] } }",
    )
    .expect_err("offset role missing");
    assert_eq!(err.diagnostics()[0].code, "semantic.incomplete-memory");

    let err = parse_str(PathBuf::from("<test>"), "machine m { register g [8] { } }")
        .expect_err("empty group");
    assert_eq!(err.diagnostics()[0].code, "semantic.empty-group");
}
