//! Loads a machine description and prints its canonical rendering and fingerprint.
//!
//! Usage: `machine_dump <file.mm>`. Set `XMACHINE_LOG=debug` to trace form assembly.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use xmachine::loader::machine::MachineLoader;

fn install_logging() {
    let filter = EnvFilter::try_from_env("XMACHINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("machine_dump: logging already initialised");
    }
}

fn main() -> ExitCode {
    install_logging();
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: machine_dump <file.mm>");
        return ExitCode::from(2);
    };

    match MachineLoader::new().load_file(&path) {
        Ok(machine) => {
            print!("{machine}");
            println!("fingerprint {}", machine.fingerprint_hex());
            ExitCode::SUCCESS
        }
        Err(err) => {
            let diagnostics = err.diagnostics();
            if diagnostics.is_empty() {
                eprintln!("error: {err}");
            }
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic.format_human());
            }
            ExitCode::FAILURE
        }
    }
}
