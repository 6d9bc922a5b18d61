//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use mapcache_cli::CliError;

fn main() {
    match mapcache_cli::run() {
        Ok(()) => {}
        // Help and version output are not failures.
        Err(CliError::ArgumentParsing(err)) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("mapcache: {err}");
            std::process::exit(1);
        }
    }
}
