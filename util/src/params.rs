//! Parameter file loading
//!
//! Parameters are TOML files deserialised straight into the struct of the
//! module that uses them. Files named without a path live in the `params`
//! directory of the software root.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the parameter directory within the software root.
pub const PARAMS_DIR_NAME: &str = "params";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "The software root environment variable ({}) is not set",
        crate::host::SW_ROOT_ENV_VAR
    )]
    SwRootNotSet,

    #[error("Cannot read the parameter file {path:?}: {source}")]
    FileLoadError {
        path: PathBuf,
        source: std::io::Error
    },

    #[error("Cannot parse the parameters: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The directory holding the parameter files, `$TANK_SW_ROOT/params`.
pub fn params_dir() -> Result<PathBuf, LoadError> {
    crate::host::get_sw_root()
        .map(|root| root.join(PARAMS_DIR_NAME))
        .map_err(|_| LoadError::SwRootNotSet)
}

/// Load a parameter file from the parameter directory.
pub fn load<P>(file_name: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    load_path(params_dir()?.join(file_name))
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let path = path.as_ref();

    let params_str = fs::read_to_string(path)
        .map_err(|source| LoadError::FileLoadError {
            path: path.to_path_buf(),
            source
        })?;

    from_str(&params_str)
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}
