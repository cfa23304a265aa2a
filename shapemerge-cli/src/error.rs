use colored::Colorize;
use std::fmt;
use std::process;

/// Exit codes for the CLI.
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Error from a dissolve or point-match run.
    Core(shapemerge_core::Error),
    /// Unreadable or malformed config file.
    Config(String),
    /// Bad file path, unreadable input.
    Input(String),
}

impl CliError {
    /// Configuration problems exit with 2, everything else with 1.
    ///
    /// Bad arguments never get here; clap exits with 2 itself.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => EXIT_USAGE,
            CliError::Core(e) if e.is_config() => EXIT_USAGE,
            _ => EXIT_ERROR,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Core(e @ shapemerge_core::Error::MissingGroupField { .. }) => write!(
                f,
                "{} {e}\n  {} every feature needs a value for each group-by field",
                "error:".red().bold(),
                "help:".cyan().bold(),
            ),
            CliError::Core(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Config(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Input(msg) => write!(f, "{} {msg}", "error:".red().bold()),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<shapemerge_core::Error> for CliError {
    fn from(e: shapemerge_core::Error) -> Self {
        CliError::Core(e)
    }
}

impl From<shapemerge_core::ConfigError> for CliError {
    fn from(e: shapemerge_core::ConfigError) -> Self {
        CliError::Core(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Input(e.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::Config(format!("config parse error: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    process::exit(err.exit_code())
}

pub type CliResult<T> = std::result::Result<T, CliError>;
