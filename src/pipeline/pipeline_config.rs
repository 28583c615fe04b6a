use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::get_supported_sources;
use crate::error::{PipelineError, Result};

/// Configuration for a complete pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub steps: Vec<PipelineStepConfig>,
}

/// Configuration for individual pipeline steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PipelineStepConfig {
    Clean { source: String },
    Join,
    Engineer,
    Export,
}

impl PipelineConfig {
    /// Clean every source, then join, engineer and export
    pub fn full() -> Self {
        let mut steps: Vec<PipelineStepConfig> = get_supported_sources()
            .into_iter()
            .map(|s| PipelineStepConfig::Clean { source: s.to_string() })
            .collect();
        steps.extend([
            PipelineStepConfig::Join,
            PipelineStepConfig::Engineer,
            PipelineStepConfig::Export,
        ]);
        Self {
            name: "full".to_string(),
            steps,
        }
    }

    pub fn clean_only(source: &str) -> Self {
        Self {
            name: format!("clean_{}", source),
            steps: vec![PipelineStepConfig::Clean {
                source: source.to_string(),
            }],
        }
    }

    /// Join the already persisted cleaned tables and build the analysis outputs
    pub fn join_only() -> Self {
        Self {
            name: "join".to_string(),
            steps: vec![
                PipelineStepConfig::Join,
                PipelineStepConfig::Engineer,
                PipelineStepConfig::Export,
            ],
        }
    }

    /// Validate the pipeline configuration. A dependency may be satisfied by
    /// an earlier step or by tables persisted in a previous run, but never by
    /// a step that appears later.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(PipelineError::Config("Pipeline must have at least one step".into()));
        }

        for (i, step) in self.steps.iter().enumerate() {
            for dep in step.dependencies() {
                if self.steps[i + 1..].iter().any(|s| s.step_name() == dep) {
                    return Err(PipelineError::Config(format!(
                        "Step '{}' depends on '{}' which appears later in the pipeline",
                        step.step_name(),
                        dep
                    )));
                }
            }
        }

        let mut cleaned = HashSet::new();
        for step in &self.steps {
            if let PipelineStepConfig::Clean { source } = step {
                if !cleaned.insert(source.as_str()) {
                    return Err(PipelineError::Config(format!(
                        "Source '{}' is cleaned twice in pipeline '{}'",
                        source, self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl PipelineStepConfig {
    /// Get the step name for dependency checking
    pub fn step_name(&self) -> &'static str {
        match self {
            PipelineStepConfig::Clean { .. } => "clean",
            PipelineStepConfig::Join => "join",
            PipelineStepConfig::Engineer => "engineer",
            PipelineStepConfig::Export => "export",
        }
    }

    /// Get the dependencies for this step
    pub fn dependencies(&self) -> Vec<&'static str> {
        match self {
            PipelineStepConfig::Clean { .. } => vec![],
            PipelineStepConfig::Join => vec!["clean"],
            PipelineStepConfig::Engineer => vec!["join"],
            PipelineStepConfig::Export => vec!["engineer"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        PipelineConfig::full().validate().unwrap();
        PipelineConfig::join_only().validate().unwrap();
        PipelineConfig::clean_only("dpi").validate().unwrap();
    }

    #[test]
    fn test_out_of_order_dependency_is_rejected() {
        let config = PipelineConfig {
            name: "bad".into(),
            steps: vec![PipelineStepConfig::Engineer, PipelineStepConfig::Join],
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_double_clean_is_rejected() {
        let mut config = PipelineConfig::clean_only("polity");
        config.steps.push(PipelineStepConfig::Clean {
            source: "polity".into(),
        });
        assert!(config.validate().is_err());
    }
}
