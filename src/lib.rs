//! A multi-stage text processing pipeline built on bounded blocking queues.
//!
//! Each stage owns a fixed-capacity queue and a dedicated worker thread that drains it,
//! applies a [`Transform`] and forwards the result to the next stage. A full queue blocks
//! its producer, so a slow stage throttles everything upstream of it.
//!
//! # Features
//!
//! - Sticky single-slot [`Signal`] as the only blocking primitive
//! - [`BoundedQueue`] with blocking put/get and a one-way finished flag
//! - Ordered shutdown that drains stage `i` before closing stage `i + 1`
//! - Built-in transforms resolved by name through a [`StageRegistry`]
//! - Per-stage metrics: counters and latency percentiles
//!
//! # Example
//!
//! ```
//! use text_pipeline::{PipelineBuilder, transforms::{Flipper, Uppercaser}};
//!
//! let pipeline = PipelineBuilder::new()
//!     .queue_capacity(8)
//!     .add_stage("uppercaser", Box::new(Uppercaser))
//!     .add_stage("flipper", Box::new(Flipper))
//!     .build()?;
//!
//! pipeline.feed("hello")?;
//! pipeline.shutdown()?;
//! # Ok::<(), text_pipeline::PipelineError>(())
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod signal;
pub mod stage;
pub mod transforms;

// Re-exports for convenience
pub use config::{PipelineConfig, DEFAULT_END_MARKER};
pub use error::{PipelineError, QueueClosed, Result};
pub use input::feed_lines;
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, DEFAULT_QUEUE_CAPACITY};
pub use queue::BoundedQueue;
pub use registry::StageRegistry;
pub use signal::Signal;
pub use stage::{MapTransform, PassthroughTransform, Record, RecordSink, Stage, StageInput, Transform};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
