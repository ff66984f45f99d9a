//! # simpleq
//!
//! Unbounded multi-producer, multi-consumer FIFO work queue with a one-way
//! close signal.
//!
//! Consumers block in [`Queue::dequeue`] until work arrives, and receive
//! `None` once the queue has been closed and drained. Also provides a
//! producer/consumer workload driver, layered configuration and
//! OpenTelemetry observability.

pub mod config;
pub mod error;
pub mod queue;
pub mod telemetry;
pub mod workload;

pub use error::{Error, Result};
pub use queue::{Dequeued, Queue, QueueStats};
