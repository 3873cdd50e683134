use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{Record, RecordSink, Stage, StageInput, Transform};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Queue capacity used when the builder is not given one
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// A stage declaration in the pipeline builder
struct StageSpec {
    name: String,
    transform: Box<dyn Transform>,
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    stages: Vec<StageSpec>,
    queue_capacity: usize,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the capacity of every stage queue
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Append a stage; data flows through stages in the order they are added
    pub fn add_stage(mut self, name: impl Into<String>, transform: Box<dyn Transform>) -> Self {
        self.stages.push(StageSpec {
            name: name.into(),
            transform,
        });
        self
    }

    /// Start every stage in declared order and wire them into a chain
    ///
    /// If any stage fails to start, the stages already running are finalized before the
    /// error is returned.
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue capacity must be greater than 0".into(),
            ));
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(self.stages.len());
        for spec in self.stages {
            match Stage::initialize(spec.name, spec.transform, self.queue_capacity) {
                Ok(stage) => stages.push(stage),
                Err(e) => {
                    error!(error = %e, "stage failed to initialize, unwinding");
                    for stage in &mut stages {
                        if let Err(e) = stage.finalize() {
                            error!(stage = stage.name(), error = %e, "finalize during unwind failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        let pipeline = Pipeline {
            stages,
            shut_down: false,
        };
        pipeline.wire()?;

        info!(
            stages = pipeline.stages.len(),
            capacity = self.queue_capacity,
            "pipeline built"
        );
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running chain of stages
///
/// Records fed into the pipeline pass through every stage in order. [`Pipeline::shutdown`]
/// drains the chain front to back; dropping a pipeline that was not shut down does the same.
pub struct Pipeline {
    stages: Vec<Stage>,
    shut_down: bool,
}

impl Pipeline {
    /// Attach each stage to the input of its successor. The last stage stays unattached.
    fn wire(&self) -> Result<()> {
        for pair in self.stages.windows(2) {
            let next: Arc<dyn RecordSink> = Arc::new(pair[1].input());
            pair[0].attach(next)?;
        }
        Ok(())
    }

    /// Feed one record into the first stage, blocking while its queue is full
    pub fn feed(&self, record: impl Into<Record>) -> Result<()> {
        let first = &self.stages[0];
        first
            .place_work(record.into())
            .map_err(|_| PipelineError::QueueClosed {
                stage: first.name().to_string(),
            })
    }

    /// Get the enqueue handle of the first stage, for feeding from other threads
    pub fn input(&self) -> StageInput {
        self.stages[0].input()
    }

    /// Finish and join every stage, strictly front to back
    ///
    /// Stage `i` is drained and joined before stage `i + 1` is told to finish, so every
    /// record stage `i` forwarded is already queued downstream when that queue closes.
    /// A failing stage does not stop the teardown of the rest; the first error is returned.
    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown_stages()
    }

    fn shutdown_stages(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let mut first_error = None;
        for stage in &mut self.stages {
            debug!(stage = stage.name(), "shutting down stage");
            if let Err(e) = stage.wait_finished() {
                error!(stage = stage.name(), error = %e, "failed to wait for stage to finish");
                first_error.get_or_insert(e);
            }
            if let Err(e) = stage.finalize() {
                error!(stage = stage.name(), error = %e, "failed to finalize stage");
                first_error.get_or_insert(e);
            }
        }

        info!("pipeline shutdown complete");
        first_error.map_or(Ok(()), Err)
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a pipeline has at least one stage
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names, in data-flow order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Get a stage by position
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Get metrics for a specific stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.stages.get(index).map(Stage::metrics)
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, stage) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                stage.name(),
                stage.metrics().snapshot().format()
            ));
        }
        summary
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_stages() {
            error!(error = %e, "pipeline shutdown on drop failed");
        }
    }
}
