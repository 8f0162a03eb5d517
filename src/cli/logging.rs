//! Logging utilities for CLI output

/// Log level for CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Suppress all output
    Quiet,
    /// Normal output level
    #[default]
    Normal,
    /// Verbose output with additional details
    Verbose,
}

impl LogLevel {
    /// Level selected by the global `--quiet` / `--verbose` flags; quiet wins
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }
}

/// Log a message if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}
