use std::path::PathBuf;

use hex_literal::hex;
use xmachine::loader::machine::{parse_str, parse_str_with_config};
use xmachine::model::config::BuilderConfig;
use xmachine::model::error::EncodeError;
use xmachine::model::ident::Identifier;

const SRC: &str = r#"
machine enc {
    register gpr [8] { r0: [2-0] = 0; r5: [2-0] = 5; }
    memory M [16] { $: [7-0]; >: [15-8] }
    immediate imm8 [8];
    immediate imm16 [16];
    set pair { r0, r5 }

    instruction ld { [gpr, M] = [16] { ~: [16] = { [3-0] = gpr[3-0], [15-8] = M.>, [...] = 0 } } }
    instruction li {
        [gpr, imm8] = [24] {
            &: [8] = imm8;
            ^: [8] = 0x0F;
            ~: [8] = { [4-0] = gpr, [...] = 1 }
        }
    }
    instruction jmp { [imm16] = [16] { ~: [16] = imm16 } }
    instruction mv { [pair] = [8] { ~: [8] = { [2-0] = pair, [...] = 0 } } }
}
"#;

fn values<'a>(pairs: &'a [(&'a str, u64)]) -> impl Fn(&Identifier) -> Option<u64> + 'a {
    move |name| {
        pairs
            .iter()
            .find(|(key, _)| name == *key)
            .map(|(_, value)| *value)
    }
}

#[test]
fn memory_offset_and_register_slice_share_a_window() {
    let machine = parse_str(PathBuf::from("enc.mm"), SRC).expect("parse");
    let form = &machine.instruction("ld").expect("ld").forms[0];
    let bytes = form
        .program
        .encode(machine.arena(), values(&[("gpr", 5), ("M", 0xAB12)]))
        .expect("encode");
    assert_eq!(bytes, hex!("05 ab"));
}

#[test]
fn parts_emit_prefix_principal_suffix() {
    let machine = parse_str(PathBuf::from("enc.mm"), SRC).expect("parse");
    let form = &machine.instruction("li").expect("li").forms[0];
    let bytes = form
        .program
        .encode(machine.arena(), values(&[("gpr", 3), ("imm8", 0x42)]))
        .expect("encode");
    assert_eq!(bytes, hex!("0f e3 42"));
}

#[test]
fn narrow_windows_split_wide_operands() {
    let config = BuilderConfig::default().with_window_bits(8);
    let machine = parse_str_with_config(PathBuf::from("enc.mm"), SRC, config).expect("parse");
    let form = &machine.instruction("jmp").expect("jmp").forms[0];
    assert_eq!(form.program.windows().len(), 2);
    let bytes = form
        .program
        .encode(machine.arena(), values(&[("imm16", 0xBEEF)]))
        .expect("encode");
    assert_eq!(bytes, hex!("ef be"));
}

#[test]
fn unbound_operands_are_reported() {
    let machine = parse_str(PathBuf::from("enc.mm"), SRC).expect("parse");
    let jmp = &machine.instruction("jmp").expect("jmp").forms[0];
    let err = jmp
        .program
        .encode(machine.arena(), values(&[]))
        .expect_err("imm16 unbound");
    assert_eq!(err, EncodeError::MissingOperand(Identifier::new("imm16")));

    let mv = &machine.instruction("mv").expect("mv").forms[0];
    let err = mv
        .program
        .encode(machine.arena(), values(&[]))
        .expect_err("sets carry no value");
    assert_eq!(err, EncodeError::UnsupportedOperand(Identifier::new("pair")));
}
