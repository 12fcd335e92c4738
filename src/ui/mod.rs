//! Interactive terminal client.

mod formatter;
mod repl;

pub use repl::run_repl;
