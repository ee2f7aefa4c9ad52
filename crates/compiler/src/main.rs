//! SysY compiler CLI.
//!
//! Invocation follows the judge's fixed shape:
//!
//! ```text
//! compiler -koopa input.sy -o output.koopa
//! compiler -riscv input.sy -o output.S
//! ```

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "compiler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SysY compiler targeting Koopa IR and RISC-V", long_about = None)]
struct Cli {
    /// Output mode: -koopa emits IR text, -riscv emits assembly
    #[arg(allow_hyphen_values = true, value_name = "MODE")]
    mode: String,

    /// Input SysY source file
    input: PathBuf,

    /// Output file
    #[arg(short)]
    output: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mode = match sysyc::Mode::from_flag(&cli.mode) {
        Some(mode) => mode,
        None => {
            eprintln!(
                "Error: unknown mode '{}', expected -koopa or -riscv",
                cli.mode
            );
            process::exit(1);
        }
    };

    if let Err(e) = sysyc::compile_file(mode, &cli.input, &cli.output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
