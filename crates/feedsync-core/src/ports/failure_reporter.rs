//! Failure reporting port
//!
//! Receives unexpected failures (not cancellations) from background sync
//! work so they can be persisted for later inspection.

pub trait IFailureReporter: Send + Sync {
    /// Records a failure raised by `component`
    fn report(&self, component: &str, message: &str);
}
