//! Standalone entry point for the machine description language server.
//!
//! Launch with `cargo run --features language-server --bin machine_language_server` or point your
//! editor's LSP client to the compiled binary.

#[cfg(not(feature = "language-server"))]
pub fn main() {
    eprintln!(
        "The 'machine_language_server' binary requires the 'language-server' feature. \
Enable it with `cargo run --features language-server --bin machine_language_server`."
    );
    std::process::exit(1);
}

#[cfg(feature = "language-server")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use xmachine::loader::machine::extension::run_stdio_language_server;

    // stdout carries the protocol; logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_env("XMACHINE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    run_stdio_language_server().await?;
    Ok(())
}
