//! pinenv CLI - pinned, reproducible builds and development shells
//!
//! Entry point for the pinenv command-line application.

use clap::Parser;

use pinenv::cli::output::display_error;
use pinenv::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = cli.output_config();

    // RUST_LOG directives win over the verbosity flags
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(output.log_level().into())
                .from_env_lossy(),
        )
        .init();

    match cli.run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
