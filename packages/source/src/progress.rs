//! Progress reporting for the `fetch` downloads and the pipeline stages.
//!
//! [`ProgressCallback`] keeps the library crates free of any rendering
//! backend. The CLI hands in an `indicatif` bar; tests and library callers
//! use [`NullProgress`].

/// Receives step-level progress updates.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of steps.
    fn set_total(&self, total: u64);

    /// Advances by `delta` steps.
    fn inc(&self, delta: u64);

    /// Replaces the message shown next to the indicator (the current step).
    fn set_message(&self, msg: String);

    /// Marks progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
