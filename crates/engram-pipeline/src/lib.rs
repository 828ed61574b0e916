//! The event-to-observation extraction pipeline.
//!
//! A single cooperative poll loop pulls recorded tool-invocation events
//! from the durable queue, distills them into observations through the
//! language model, and indexes the results for semantic retrieval. The
//! poller owns per-session conversation state and enforces single-instance
//! execution through a pid lock file.
//!
//! Wiring lives in [`bootstrap`]: one rate limiter per call class is
//! constructed there and injected into every component that calls an
//! external provider.

pub mod bootstrap;
pub mod errors;
pub mod lock;
pub mod poller;
pub mod registry;

pub use bootstrap::{init_subscriber, spawn_signal_handler, Observer};
pub use errors::{PipelineError, Result};
pub use lock::ProcessLock;
pub use poller::Poller;
pub use registry::{SessionContext, SessionRegistry};
