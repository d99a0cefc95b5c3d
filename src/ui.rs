//! Operator-facing status lines.
//!
//! These go to the terminal regardless of the tracing level; `tracing` carries
//! the diagnostic detail (command lines, paths) underneath.

use owo_colors::OwoColorize;

pub fn step(index: usize, total: usize, message: &str) {
    println!("{} {}", format!("[{index}/{total}]").cyan().bold(), message.bold());
}

pub fn info(message: &str) {
    println!("{} {message}", "[INFO]".blue().bold());
}

pub fn success(message: &str) {
    println!("{} {message}", "[OK]".green().bold());
}

pub fn warn(message: &str) {
    eprintln!("{} {message}", "[WARN]".yellow().bold());
}

pub fn error(message: &str) {
    eprintln!("{} {message}", "[ERROR]".red().bold());
}

/// Indented follow-up line, e.g. a command the operator can run next.
pub fn hint(message: &str) {
    println!("    {}", message.dimmed());
}

/// Like [`hint`], on stderr, for remediation after a failure.
pub fn remedy(message: &str) {
    eprintln!("    {}", message.dimmed());
}
