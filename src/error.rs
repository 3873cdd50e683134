use std::fmt;
use thiserror::Error;

/// Result type for text pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building, feeding or shutting down a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration (bad capacity, empty name, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No stages in pipeline
    #[error("Cannot build a pipeline with no stages")]
    NoStages,

    /// A stage name could not be resolved to a transform
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// A record was offered to a queue that no longer accepts work
    #[error("Queue of stage {stage} is closed")]
    QueueClosed { stage: String },

    /// The queue ring buffer could not be allocated
    #[error("Could not allocate queue of capacity {capacity}")]
    Allocation { capacity: usize },

    /// The worker thread could not be spawned
    #[error("Could not start worker thread for stage {stage}: {source}")]
    ThreadStart {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker thread panicked
    #[error("Could not join worker thread of stage {stage}")]
    Join { stage: String },

    /// A call was made on a stage that has already been finalized
    #[error("Stage {stage} has already been finalized")]
    StageFinalized { stage: String },

    /// A transform hook reported a failure
    #[error("Transform {stage} failed: {message}")]
    Transform { stage: String, message: String },

    /// Input could not be read
    #[error("Input error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection returned by [`BoundedQueue::put`](crate::BoundedQueue::put) once the queue is
/// finished. The refused record is handed back so the caller stays responsible for it.
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    /// Take back the record that was refused
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is finished and no longer accepts records")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}
