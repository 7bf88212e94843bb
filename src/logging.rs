//! Terminal logging setup, gated by `--verbose`'s repeat count.
//!
//! Mirrors `rustic-rs`'s `commands.rs` logger setup: a single
//! [`simplelog::TermLogger`] writing to stderr, with the verbosity level
//! picked from how many times `--verbose` was repeated on the command line.

use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

/// `0` repeats -> warnings and errors only; `1` -> progress info; `2+` ->
/// full debug/trace output from the combinatorial engine.
fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialise the process-wide logger. Safe to call exactly once; a second
/// call would fail since `log` only accepts one global logger, so callers
/// (just `main`) must not call this more than once per process.
pub fn init(verbose: u8) {
    let config = simplelog::ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    // TermLogger::init only fails if a logger is already installed, which
    // cannot happen here since this is the only call site.
    TermLogger::init(level_filter(verbose), config, TerminalMode::Stderr, ColorChoice::Auto)
        .expect("logger must not already be initialised");
}
