//! Pipeline domain model

use crate::core::{
    config::{NotificationConfig, PipelineConfig, RegistryConfig, VariableDefinition},
    stage::{Stage, StageDefaults},
};
use std::collections::BTreeMap;

/// A pipeline definition: stages run strictly in the order they are declared
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Global variables available to all stages
    pub variables: BTreeMap<String, VariableDefinition>,

    /// Pipeline stages, in declared order
    pub stages: Vec<Stage>,

    pub registry: Option<RegistryConfig>,

    /// Source ref checked out when the caller gives none
    pub default_source_ref: String,

    pub notifications: NotificationConfig,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = StageDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StageDefaults::default().timeout_secs),
        };

        let stages = config
            .stages
            .iter()
            .map(|stage_config| Stage::from_config(stage_config, &defaults))
            .collect();

        Pipeline {
            name: config.name.clone(),
            variables: config.get_variables(),
            stages,
            registry: config.registry.clone(),
            default_source_ref: config.default_source_ref(),
            notifications: config.notifications.clone(),
        }
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage names in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Slug used for workspace directory names
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            "pipeline".to_string()
        } else {
            slug.to_string()
        }
    }
}
