use crate::error::{PipelineError, QueueClosed, Result};
use crate::metrics::StageMetrics;
use crate::queue::BoundedQueue;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// A single text record flowing through the pipeline
pub type Record = String;

/// The per-stage processing capability
///
/// `process` is only ever called from the stage's own worker thread, one record at a time.
/// It takes ownership of the input and returns either a record to forward or `None` when
/// there is nothing to pass on.
pub trait Transform: Send + 'static {
    /// Transform one record
    fn process(&mut self, input: Record) -> Option<Record>;

    /// Called on the worker thread before the first record
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called on the worker thread after end-of-stream
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get a human-readable name for this transform
    fn name(&self) -> &str {
        "transform"
    }
}

/// Anything that accepts one record at a time
///
/// Stages forward through this interface, so a stage never sees its neighbour's internals.
pub trait RecordSink: Send + Sync {
    /// Hand over one record, or get it back if the sink no longer accepts work
    fn place_work(&self, record: Record) -> std::result::Result<(), QueueClosed<Record>>;

    /// Name used in diagnostics
    fn sink_name(&self) -> &str;
}

/// The enqueue capability of a [`Stage`]
///
/// Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct StageInput {
    name: Arc<str>,
    queue: Arc<BoundedQueue<Record>>,
}

impl StageInput {
    /// Get the name of the stage this input feeds
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RecordSink for StageInput {
    fn place_work(&self, record: Record) -> std::result::Result<(), QueueClosed<Record>> {
        self.queue.put(record)
    }

    fn sink_name(&self) -> &str {
        &self.name
    }
}

/// State shared between a stage handle and its worker thread
struct StageContext {
    name: Arc<str>,
    queue: Arc<BoundedQueue<Record>>,
    downstream: RwLock<Option<Arc<dyn RecordSink>>>,
    finished: AtomicBool,
    metrics: StageMetrics,
}

impl StageContext {
    fn forward(&self, output: Record) {
        let downstream = self.downstream.read().clone();
        let Some(next) = downstream else {
            trace!(stage = %self.name, "no downstream attached, output consumed");
            return;
        };

        match next.place_work(output) {
            Ok(()) => self.metrics.record_forwarded(),
            Err(rejected) => {
                self.metrics.record_rejected();
                warn!(
                    stage = %self.name,
                    downstream = next.sink_name(),
                    len = rejected.into_inner().len(),
                    "downstream rejected record"
                );
            }
        }
    }
}

/// Closes the queue if the worker unwinds, so upstream producers fail instead of hanging
struct CloseOnPanic<'a>(&'a BoundedQueue<Record>);

impl Drop for CloseOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.signal_finished();
        }
    }
}

/// Worker thread body: drain the queue until end-of-stream
fn drain_loop(context: Arc<StageContext>, mut transform: Box<dyn Transform>) -> Result<()> {
    let _guard = CloseOnPanic(&context.queue);

    // A failed start hook must not stop draining, or upstream would block on a full queue
    let started = transform.on_start();
    if let Err(e) = &started {
        error!(stage = %context.name, error = %e, "transform start hook failed");
    }
    info!(stage = %context.name, transform = transform.name(), "stage running");

    while let Some(record) = context.queue.get() {
        let start = Instant::now();
        let output = transform.process(record);
        context.metrics.record_processed(start.elapsed());

        match output {
            Some(output) => context.forward(output),
            None => {
                context.metrics.record_suppressed();
                trace!(stage = %context.name, "transform produced no output");
            }
        }
    }

    context.finished.store(true, Ordering::Release);
    info!(stage = %context.name, "end of stream observed");

    let stopped = transform.on_shutdown();
    if let Err(e) = &stopped {
        error!(stage = %context.name, error = %e, "transform shutdown hook failed");
    }
    started.and(stopped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Worker thread started, consuming or draining
    Running,
    /// Finish signaled and worker joined
    Joined,
    Finalized,
}

/// One pipeline element: a bounded queue, a worker thread, a transform and an optional
/// downstream link
///
/// A stage is constructed already running ([`Stage::initialize`]) and must end with
/// [`Stage::finalize`]. Dropping an unfinalized stage finalizes it.
pub struct Stage {
    context: Arc<StageContext>,
    worker: Option<JoinHandle<Result<()>>>,
    lifecycle: Lifecycle,
}

impl Stage {
    /// Allocate the queue, bind the transform and start the worker thread
    pub fn initialize(
        name: impl Into<String>,
        transform: Box<dyn Transform>,
        capacity: usize,
    ) -> Result<Self> {
        let name: Arc<str> = Arc::from(name.into());
        if name.contains('\0') {
            return Err(PipelineError::Config(format!(
                "stage name {name:?} contains a NUL byte"
            )));
        }
        let queue = Arc::new(BoundedQueue::new(capacity)?);

        let context = Arc::new(StageContext {
            name: Arc::clone(&name),
            queue,
            downstream: RwLock::new(None),
            finished: AtomicBool::new(false),
            metrics: StageMetrics::new(),
        });

        let worker_context = Arc::clone(&context);
        let worker = thread::Builder::new()
            .name(format!("stage-{name}"))
            .spawn(move || drain_loop(worker_context, transform))
            .map_err(|source| PipelineError::ThreadStart {
                stage: name.to_string(),
                source,
            })?;

        info!(stage = %name, capacity, "stage initialized");
        Ok(Self {
            context,
            worker: Some(worker),
            lifecycle: Lifecycle::Running,
        })
    }

    /// Get the stage name
    pub fn name(&self) -> &str {
        &self.context.name
    }

    /// Get the enqueue capability other stages (or the feeder) use
    pub fn input(&self) -> StageInput {
        StageInput {
            name: Arc::clone(&self.context.name),
            queue: Arc::clone(&self.context.queue),
        }
    }

    /// Set the forwarding target for transformed records
    ///
    /// Attach before the stage receives input: output produced while unattached is not
    /// buffered for later delivery.
    pub fn attach(&self, next: Arc<dyn RecordSink>) -> Result<()> {
        self.ensure_not_finalized()?;
        debug!(stage = self.name(), downstream = next.sink_name(), "attached");
        *self.context.downstream.write() = Some(next);
        Ok(())
    }

    /// Enqueue one record, blocking while the queue is full
    pub fn place_work(&self, record: Record) -> std::result::Result<(), QueueClosed<Record>> {
        self.context.queue.put(record)
    }

    /// Signal finish on the queue and block until the worker has drained it and exited
    ///
    /// A second call observes the joined worker and returns `Ok(())`.
    pub fn wait_finished(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Finalized => return Err(self.finalized_error()),
            Lifecycle::Joined => return Ok(()),
            Lifecycle::Running => {}
        }

        debug!(stage = self.name(), "signaling finish");
        self.context.queue.signal_finished();
        self.lifecycle = Lifecycle::Joined;

        match self.worker.take() {
            Some(worker) => match worker.join() {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Join {
                    stage: self.name().to_string(),
                }),
            },
            None => Ok(()),
        }
    }

    /// Wait for the worker if needed, then release the stage's resources
    ///
    /// Always the last call on a stage; calling it again is an error.
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_not_finalized()?;
        let result = self.wait_finished();

        let leftover = self.context.queue.drain_remaining();
        if !leftover.is_empty() {
            warn!(
                stage = self.name(),
                count = leftover.len(),
                "discarding records left in queue"
            );
        }
        *self.context.downstream.write() = None;
        self.lifecycle = Lifecycle::Finalized;

        debug!(
            stage = self.name(),
            metrics = %self.context.metrics.snapshot().format(),
            "stage finalized"
        );
        result
    }

    /// Whether the worker has observed end-of-stream
    pub fn is_finished(&self) -> bool {
        self.context.finished.load(Ordering::Acquire)
    }

    /// Whether [`finalize`](Self::finalize) has run
    pub fn is_finalized(&self) -> bool {
        self.lifecycle == Lifecycle::Finalized
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.context.metrics
    }

    /// Get the number of records currently buffered
    pub fn queue_len(&self) -> usize {
        self.context.queue.len()
    }

    fn ensure_not_finalized(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Finalized {
            Err(self.finalized_error())
        } else {
            Ok(())
        }
    }

    fn finalized_error(&self) -> PipelineError {
        PipelineError::StageFinalized {
            stage: self.name().to_string(),
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if self.lifecycle != Lifecycle::Finalized {
            if let Err(e) = self.finalize() {
                error!(stage = self.name(), error = %e, "finalize on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("lifecycle", &self.lifecycle)
            .field("queued", &self.queue_len())
            .finish()
    }
}

/// A stage that forwards every record unchanged
#[derive(Debug, Default)]
pub struct PassthroughTransform;

impl Transform for PassthroughTransform {
    fn process(&mut self, input: Record) -> Option<Record> {
        Some(input)
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Adapts a closure into a [`Transform`]
pub struct MapTransform<F>
where
    F: FnMut(Record) -> Option<Record> + Send + 'static,
{
    name: String,
    mapper: F,
}

impl<F> MapTransform<F>
where
    F: FnMut(Record) -> Option<Record> + Send + 'static,
{
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
        }
    }
}

impl<F> Transform for MapTransform<F>
where
    F: FnMut(Record) -> Option<Record> + Send + 'static,
{
    fn process(&mut self, input: Record) -> Option<Record> {
        (self.mapper)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
