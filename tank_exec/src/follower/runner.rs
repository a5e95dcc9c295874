//! # Follower runner
//!
//! Runs a [`Cyclic`] module (normally a [`super::Follower`]) at a fixed period
//! on its own thread.
//!
//! The module is moved into the worker thread and handed back when the runner
//! is stopped or joined. Ticks are paced from the start instant so small delays
//! don't accumulate, ticks which are missed entirely are skipped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use util::module::Cyclic;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to a module running on a worker thread.
pub struct FollowerRunner<C: Cyclic> {
    stop_tx: Sender<()>,
    handle: JoinHandle<RunnerExit<C>>,
}

/// What the worker thread hands back once it exits.
pub struct RunnerExit<C: Cyclic> {
    pub controller: C,

    /// The first error the module returned, if any.
    pub result: Result<(), C::Error>,

    /// Number of ticks run.
    pub ticks: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Runner period must be positive and finite, got {0} s")]
    InvalidPeriod(f64),

    #[error("Could not spawn the runner thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The runner thread panicked")]
    WorkerPanicked,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C> FollowerRunner<C>
where
    C: Cyclic + Send + 'static,
    C::Error: Send + 'static,
{
    /// Start running `controller` every `period_s` seconds.
    ///
    /// The controller is initialised on the worker thread before the first
    /// tick.
    pub fn start(controller: C, period_s: f64) -> Result<Self, RunnerError> {
        if !period_s.is_finite() || period_s <= 0.0 {
            return Err(RunnerError::InvalidPeriod(period_s));
        }
        let period = Duration::try_from_secs_f64(period_s)
            .map_err(|_| RunnerError::InvalidPeriod(period_s))?;

        let (stop_tx, stop_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("follower_runner".into())
            .spawn(move || {
                let mut controller = controller;
                let (result, ticks) = worker(&mut controller, period, stop_rx);

                // Leave the outputs safe whatever the reason for exiting
                controller.stop();

                RunnerExit {
                    controller,
                    result,
                    ticks,
                }
            })
            .map_err(RunnerError::SpawnError)?;

        info!("Runner started with a {:.3} s period", period_s);

        Ok(Self { stop_tx, handle })
    }

    /// Signal the worker to stop and wait for it to exit.
    ///
    /// Once this returns the controller will not be run again and has been
    /// stopped.
    pub fn stop(self) -> Result<RunnerExit<C>, RunnerError> {
        // If the worker already exited the receiver is gone, which is fine
        self.stop_tx.send(()).ok();

        self.handle.join().map_err(|_| RunnerError::WorkerPanicked)
    }

    /// Wait for the controller to finish by itself.
    pub fn join(self) -> Result<RunnerExit<C>, RunnerError> {
        let exit = self.handle.join().map_err(|_| RunnerError::WorkerPanicked)?;

        // Keep the sender alive until the worker has exited so it isn't seen
        // as a stop request
        drop(self.stop_tx);

        Ok(exit)
    }

    /// True while the worker thread is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Worker loop, returning the first error and the number of ticks run.
fn worker<C: Cyclic>(
    controller: &mut C,
    period: Duration,
    stop_rx: Receiver<()>,
) -> (Result<(), C::Error>, u64) {
    if let Err(e) = controller.initialize() {
        return (Err(e), 0);
    }

    let start = Instant::now();
    let mut tick: u32 = 0;
    let mut ticks_run: u64 = 0;

    loop {
        if let Err(e) = controller.run() {
            return (Err(e), ticks_run + 1);
        }
        ticks_run += 1;

        if controller.is_finished() {
            debug!("Controller finished after {} ticks", ticks_run);
            break;
        }

        tick += 1;
        let mut deadline = start + period * tick;
        let now = Instant::now();

        if now > deadline {
            let behind = (now - start).as_secs_f64() / period.as_secs_f64();
            let next = behind.floor() as u32 + 1;
            warn!("Runner overran, skipping {} tick(s)", next - tick);
            tick = next;
            deadline = start + period * tick;
        }

        match stop_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("Runner stop requested after {} ticks", ticks_run);
                break;
            }
            Err(RecvTimeoutError::Timeout) => (),
        }
    }

    (Ok(()), ticks_run)
}
