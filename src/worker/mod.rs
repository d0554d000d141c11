//! Ingestion workers
//!
//! [`BatchWorker`] applies a single job; [`WorkerPool`] runs a bounded
//! number of them against the queue and acknowledges each outcome.

mod batch;
mod pool;

pub use batch::BatchWorker;
pub use pool::{WorkerPool, WorkerPoolHandle};
