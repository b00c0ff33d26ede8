//! The generation engine: submit orchestration and status polling.

pub mod dispatcher;
pub mod poller;

pub use dispatcher::{GenerationEngine, SubmitError};
pub use poller::PollerManager;
