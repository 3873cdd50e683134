use crate::error::{PipelineError, Result};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::registry::StageRegistry;

/// Line that ends the input stream
pub const DEFAULT_END_MARKER: &str = "<END>";

/// Declarative description of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of every stage queue
    pub queue_capacity: usize,
    /// Stage names, in data-flow order
    pub stages: Vec<String>,
    /// Input line that terminates feeding
    pub end_marker: String,
}

impl PipelineConfig {
    pub fn new(queue_capacity: usize, stages: Vec<String>) -> Self {
        Self {
            queue_capacity,
            stages,
            end_marker: DEFAULT_END_MARKER.to_string(),
        }
    }

    pub fn with_end_marker(mut self, end_marker: impl Into<String>) -> Self {
        self.end_marker = end_marker.into();
        self
    }

    /// Check the configuration against the stages `registry` can provide
    pub fn validate(&self, registry: &StageRegistry) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue size must be greater than 0".into(),
            ));
        }
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        if let Some(unknown) = self.stages.iter().find(|name| !registry.contains(name)) {
            return Err(PipelineError::UnknownStage(unknown.clone()));
        }
        Ok(())
    }

    /// Validate, then build and start the pipeline
    pub fn build(&self, registry: &StageRegistry) -> Result<Pipeline> {
        self.validate(registry)?;

        let mut builder = PipelineBuilder::new().queue_capacity(self.queue_capacity);
        for name in &self.stages {
            builder = builder.add_stage(name.clone(), registry.create(name)?);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize, stages: &[&str]) -> PipelineConfig {
        PipelineConfig::new(capacity, stages.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_valid_config() {
        let registry = StageRegistry::with_builtins();
        let config = config(10, &["uppercaser", "rotator", "uppercaser"]);
        assert!(config.validate(&registry).is_ok());
        assert_eq!(config.end_marker, "<END>");
    }

    #[test]
    fn test_zero_capacity() {
        let registry = StageRegistry::with_builtins();
        assert!(matches!(
            config(0, &["logger"]).validate(&registry),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_no_stages() {
        let registry = StageRegistry::with_builtins();
        assert!(matches!(
            config(5, &[]).validate(&registry),
            Err(PipelineError::NoStages)
        ));
    }

    #[test]
    fn test_unknown_stage_detected_before_build() {
        let registry = StageRegistry::with_builtins();
        let result = config(5, &["uppercaser", "teleporter"]).build(&registry);
        assert!(matches!(
            result,
            Err(PipelineError::UnknownStage(name)) if name == "teleporter"
        ));
    }

    #[test]
    fn test_custom_end_marker() {
        let config = config(1, &["flipper"]).with_end_marker("STOP");
        assert_eq!(config.end_marker, "STOP");
    }
}
