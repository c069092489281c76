//! Small tokio helpers shared across loam services: a single-shot shutdown
//! signal and a named task handle.

/// Single-shot, multi-consumer notification channel.
pub mod notify_once;
/// Named [`tokio::task::JoinHandle`] wrapper which propagates panics.
pub mod task;

pub use notify_once::NotifyOnce;
pub use task::LoamTask;
