//! Session management
//!
//! A session is one execution of a binary. Each session gets its own
//! timestamped directory holding the log file, CSV archives and any JSON data
//! saved during the run:
//!
//! ```text
//! {sessions_dir}/{exec_name}_{timestamp}/
//!     {exec_name}.log
//!     arch/
//!     *.json
//! ```
//!
//! JSON is written by a background thread so saving never blocks a control
//! loop. [`Session::exit`] flushes everything still queued.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{debug, info, warn};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in session directory names, see `chrono::format`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the archive directory within a session.
const ARCH_DIR_NAME: &str = "arch";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current session. Clones share the same save thread.
#[derive(Clone)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    save_tx: Sender<SaveMsg>,

    /// Taken by the first call to `exit`.
    save_handle: Arc<Mutex<Option<JoinHandle<usize>>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, has a session already been started? \
         (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time")]
    CannotGetEpoch,

    #[error("Cannot spawn the save thread: {0}")]
    CannotSpawnSaveThread(std::io::Error),
}

enum SaveMsg {
    Save(PathBuf, Box<dyn Serialize + Send>),
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// Only one session can be started per process. A relative
    /// `sessions_dir` is resolved against the software root (`TANK_SW_ROOT`)
    /// if it is set, otherwise against the working directory.
    pub fn new<P: AsRef<Path>>(exec_name: &str, sessions_dir: P) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let timestamp = SESSION_EPOCH
            .get()
            .ok_or(SessionError::CannotGetEpoch)?
            .format(TIMESTAMP_FORMAT);

        let sessions_dir = sessions_dir.as_ref();
        let session_root = match (sessions_dir.is_relative(), crate::host::get_sw_root()) {
            (true, Ok(root)) => root.join(sessions_dir),
            _ => sessions_dir.to_path_buf(),
        }
        .join(format!("{}_{}", exec_name, timestamp));

        // Creating the archive dir creates the root too
        let arch_root = session_root.join(ARCH_DIR_NAME);
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = session_root.join(format!("{}.log", exec_name));

        let (save_tx, save_rx) = channel();
        let root = session_root.clone();
        let handle = thread::Builder::new()
            .name("session_save".into())
            .spawn(move || save_thread(root, save_rx))
            .map_err(SessionError::CannotSpawnSaveThread)?;

        Ok(Session {
            session_root,
            arch_root,
            log_file_path,
            save_tx,
            save_handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Exit the session, blocking until every queued save has been written.
    ///
    /// Saves requested from other clones after this are dropped with a
    /// warning.
    pub fn exit(self) {
        let handle = match self.save_handle.lock() {
            Ok(mut h) => h.take(),
            Err(e) => e.into_inner().take(),
        };

        let handle = match handle {
            Some(h) => h,
            None => return,
        };

        info!("Stopping save thread");
        self.save_tx.send(SaveMsg::Stop).ok();

        match handle.join() {
            Ok(n) => info!("Save thread exited after writing {} file(s)", n),
            Err(_) => warn!("Save thread panicked, some data may not have been saved"),
        }
    }

    /// Save the data as JSON to the session-relative `path`.
    ///
    /// The write happens on the save thread, failures are logged there.
    pub fn save<P: AsRef<Path>, T: Serialize + Send + 'static>(&self, path: P, data: T) {
        let path = path.as_ref().to_path_buf();

        if self
            .save_tx
            .send(SaveMsg::Save(path.clone(), Box::new(data)))
            .is_err()
        {
            warn!("Session has exited, cannot save {:?}", path);
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// Returns zero if no session has been started yet, so that logging from
/// tests and libraries never panics.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => (Utc::now() - *e)
            .num_nanoseconds()
            .map(|ns| ns as f64 * 1e-9)
            .unwrap_or(f64::NAN),
        None => 0.0,
    }
}

/// Return a reference to the session's epoch, if a session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Write everything sent until a stop message or every sender is dropped.
/// Returns the number of files written.
fn save_thread(session_root: PathBuf, rx: Receiver<SaveMsg>) -> usize {
    let mut written = 0;

    for msg in rx.iter() {
        match msg {
            SaveMsg::Save(path, data) => {
                let full_path = session_root.join(&path);
                match write_json(&full_path, data.as_ref()) {
                    Ok(()) => {
                        debug!("Saved {:?}", full_path);
                        written += 1;
                    }
                    Err(e) => warn!("Couldn't save {:?}: {}", full_path, e),
                }
            }
            SaveMsg::Stop => break,
        }
    }

    written
}

fn write_json(full_path: &Path, data: &(dyn Serialize + Send)) -> Result<(), String> {
    match full_path.extension().and_then(|s| s.to_str()) {
        Some("json") => (),
        ext => return Err(format!("expected a .json extension, got {:?}", ext)),
    }

    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create parent: {}", e))?;
    }

    let file = File::create(full_path).map_err(|e| format!("cannot create file: {}", e))?;

    serde_json::to_writer_pretty(file, data).map_err(|e| format!("cannot serialise: {}", e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session_saves_json() {
        let dir = std::env::temp_dir().join(format!("tank_sessions_{}", std::process::id()));

        let session = Session::new("test_exec", &dir).unwrap();
        assert!(session.arch_root.is_dir());
        assert!(session.arch_root.starts_with(&session.session_root));
        assert_eq!(
            session.log_file_path.file_name().and_then(|s| s.to_str()),
            Some("test_exec.log")
        );

        // Only one session per process
        assert!(matches!(
            Session::new("test_exec", &dir),
            Err(SessionError::CannotInitEpoch(_))
        ));
        assert!(get_elapsed_seconds() >= 0.0);

        let root = session.session_root.clone();
        session.save("data/values.json", vec![1.0, 2.5]);
        session.save("bad.txt", 1);
        session.clone().exit();

        let text = fs::read_to_string(root.join("data/values.json")).unwrap();
        let values: Vec<f64> = serde_json::from_str(&text).unwrap();
        assert_eq!(values, vec![1.0, 2.5]);
        assert!(!root.join("bad.txt").exists());

        fs::remove_dir_all(&dir).ok();
    }
}
