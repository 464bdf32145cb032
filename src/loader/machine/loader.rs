//! Loading pipeline that reads a description from disk and builds its [`Machine`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::loader::machine::parser::parse_str_with_config;
use crate::model::config::BuilderConfig;
use crate::model::error::MachineError;
use crate::model::machine::Machine;

#[derive(Debug, Clone, Default)]
pub struct MachineLoader {
    config: BuilderConfig,
}

impl MachineLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Machine, MachineError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path)?;
        let machine = self.parse_str(path.to_path_buf(), &src)?;
        info!(
            target: "xmachine",
            machine = %machine.name(),
            path = %path.display(),
            entries = machine.entries().len(),
            "machine description loaded"
        );
        Ok(machine)
    }

    pub fn parse_str(&self, path: PathBuf, src: &str) -> Result<Machine, MachineError> {
        parse_str_with_config(path, src, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_description_from_disk() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "tiny.mm",
            "machine tiny {\n  immediate imm4 [4];\n  instruction nop { [] = [8] { ~: [8] = 0 } }\n}\n",
        );
        let machine = MachineLoader::new().load_file(&path).expect("load");
        assert_eq!(machine.name(), "tiny");
        assert_eq!(machine.entries().len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().expect("tempdir");
        let err = MachineLoader::new()
            .load_file(dir.path().join("absent.mm"))
            .expect_err("missing file");
        assert!(matches!(err, MachineError::Io(_)));
    }

    #[test]
    fn diagnostics_point_at_the_loaded_file() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(dir.path(), "bad.mm", "machine bad {\n  set s { ghost }\n}\n");
        let err = MachineLoader::new().load_file(&path).expect_err("undefined member");
        let diagnostics = err.diagnostics();
        let span = diagnostics[0].span.as_ref().expect("span");
        assert_eq!(span.path, path);
        assert_eq!(span.start.line, 2);
    }

    #[test]
    fn configured_window_width_reaches_the_builder() {
        let config = BuilderConfig::default().with_window_bits(8);
        let machine = MachineLoader::with_config(config)
            .parse_str(
                PathBuf::from("<test>"),
                "machine w { instruction wide { [] = [16] { ~: [16] = 0xBEEF } } }",
            )
            .expect("parse");
        let form = &machine.instruction("wide").expect("wide").forms[0];
        assert_eq!(form.program.windows().len(), 2);
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write file");
        path
    }
}
