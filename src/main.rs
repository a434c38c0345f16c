//! Binary entry point for the `gzindex` command-line tool.

use clap::Parser;

use gzindex::cli::{run_stdout, Args};

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run_stdout(&args) {
        eprintln!("gzindex: {e:#}");
        std::process::exit(1);
    }
}
