//! Logger initialisation
//!
//! Log records go to stdout and to the session's log file. Every record is
//! stamped with the number of seconds since the session epoch, so the log of
//! a run lines up with the control tick archives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use fern;
use log::{self, info};
use serde::Deserialize;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logger configuration, normally loaded from the `[logger]` table of an
/// executable's parameter file.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerParams {
    /// Minimum level of records written to stdout and the log file.
    pub level: LevelFilter,

    /// Per-target overrides, e.g. quieten a chatty control loop with
    /// `{ target = "tank_lib::follower", level = "Debug" }`.
    #[serde(default)]
    pub targets: Vec<TargetLevel>,

    /// If false only the log file is written.
    #[serde(default = "default_true")]
    pub stdout: bool,
}

/// A level override for one log target.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetLevel {
    pub target: String,
    pub level: LevelFilter,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LoggerParams {
    fn default() -> Self {
        Self {
            level: LevelFilter::Debug,
            targets: Vec::new(),
            stdout: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Notes
///
/// - `params.level` must be at least `log::Level::Info`, warnings and errors
///   must never be hidden.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    params: &LoggerParams,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if params.level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(params.level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {

            // If debug or trace include the target, otherwise don't include it
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_to_str(record.level()),
                    message
                ))
            }

        })
        .level(params.level);

    for t in params.targets.iter() {
        dispatch = dispatch.level_for(t.target.clone(), t.level);
    }

    if params.stdout {
        dispatch = dispatch.chain(std::io::stdout());
    }

    dispatch
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", params.level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let p: LoggerParams = crate::params::from_str(
            "level = \"Trace\"\n\
             stdout = false\n\
             targets = [{ target = \"tank_lib::follower\", level = \"Info\" }]"
        ).unwrap();

        assert_eq!(p.level, LevelFilter::Trace);
        assert!(!p.stdout);
        assert_eq!(p.targets[0].level, LevelFilter::Info);

        let p: LoggerParams = crate::params::from_str("level = \"Debug\"").unwrap();
        assert!(p.stdout);
        assert!(p.targets.is_empty());
    }
}
