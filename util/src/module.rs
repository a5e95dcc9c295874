//! Module interfaces
//!
//! Modules which are executed periodically (for example by a fixed-rate
//! runner thread) implement [`Cyclic`].

// ---------------------------------------------------------------------------
// CYCLIC MODULE
// ---------------------------------------------------------------------------

/// A module which is initialised once and then processed every cycle until it
/// finishes or is stopped.
pub trait Cyclic {
    /// An error which can occur during initialisation or processing.
    type Error;

    /// Initialise the module, ready for the first cycle.
    ///
    /// # Outputs
    /// - On success `Ok(())`.
    /// - On error an `Error` instance.
    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Main module processing function, called once per cycle.
    ///
    /// # Outputs
    /// - On success `Ok(())`, check [`Cyclic::is_finished`] to see if the
    ///   module has completed.
    /// - On error an `Error` instance.
    fn run(&mut self) -> Result<(), Self::Error>;

    /// Stop the module, leaving any outputs in a safe state.
    fn stop(&mut self);

    /// True once the module has nothing left to do.
    fn is_finished(&self) -> bool;
}
