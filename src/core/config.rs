//! Pipeline configuration from YAML

use crate::core::{error::ConfigError, stage::StageKind, Pipeline};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Variables every run provides on its own
pub const BUILTIN_VARIABLES: &[&str] = &["source_ref", "run_id", "workspace", "pipeline_name"];

/// Port the demo service listens on inside its container
pub const DEFAULT_SERVICE_PORT: &str = "8080";

/// Variable definition - can be a literal value or a process environment reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableDefinition {
    /// Literal value
    String(String),
    /// Read from the process environment when a run starts
    Env { name: String, default: Option<String> },
}

impl VariableDefinition {
    /// Resolve the value, reading environment references through `lookup`
    pub fn resolve<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            VariableDefinition::String(s) => Some(s.clone()),
            VariableDefinition::Env { name, default } => lookup(name).or_else(|| default.clone()),
        }
    }
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Where the Clone stage fetches sources from
    #[serde(default)]
    pub source: Option<SourceConfig>,

    /// Global variables visible to all stages
    #[serde(default, alias = "environment")]
    variables: BTreeMap<String, Value>,

    /// Registry the Publish stage pushes to
    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    /// Pipeline stages, in execution order
    pub stages: Vec<StageConfig>,

    /// Default timeout for each stage action (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Commands fired once the run finishes
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub repository: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Container registry settings. The password never appears in the YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub url: String,

    pub username: String,

    /// Name of the environment variable holding the registry password or token
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

fn default_password_env() -> String {
    "REGISTRY_PASSWORD".to_string()
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, unique within the pipeline
    pub name: String,

    /// What the stage does; decides its failure kind
    #[serde(default)]
    pub kind: StageKind,

    /// Optional stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Shell actions. Empty means the kind's default actions.
    #[serde(default)]
    pub steps: Vec<String>,

    /// Best-effort actions run whatever the stage outcome
    #[serde(default)]
    pub post: Option<PostConfig>,

    /// Store the last stdout line of the final step under this variable
    #[serde(default)]
    pub capture: Option<String>,

    /// Timeout for each action of this stage (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConfig {
    #[serde(default)]
    pub always: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub on_success: Vec<String>,

    #[serde(default)]
    pub on_failure: Vec<String>,
}

impl NotificationConfig {
    pub fn is_empty(&self) -> bool {
        self.on_success.is_empty() && self.on_failure.is_empty()
    }
}

impl PipelineConfig {
    /// Load and validate pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load pipeline configuration from a YAML file without validating it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse pipeline configuration from a YAML string without validating it
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override (or add) literal variables, e.g. from `--var key=value`
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) {
        for (key, value) in overrides {
            self.variables
                .insert(key.clone(), Value::String(value.clone()));
        }
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
        }

        let pipeline = self.to_pipeline();
        let mut known = self.known_variables();

        for stage in &pipeline.stages {
            if stage.actions.is_empty() {
                return Err(ConfigError::EmptyStage(stage.name.clone()));
            }

            if stage.kind == StageKind::Publish && self.registry.is_none() {
                return Err(ConfigError::MissingRegistry(stage.name.clone()));
            }

            // Only variables defined up front or captured by an earlier stage resolve
            for variable in stage.referenced_variables() {
                if !known.contains(&variable) {
                    return Err(ConfigError::MissingVariable {
                        stage: stage.name.clone(),
                        variable,
                    });
                }
            }

            if let Some(capture) = &stage.capture {
                known.insert(capture.clone());
            }
        }

        Ok(())
    }

    /// Names that can be referenced before any stage has run
    fn known_variables(&self) -> HashSet<String> {
        let mut known: HashSet<String> = BUILTIN_VARIABLES.iter().map(|s| s.to_string()).collect();
        known.extend(self.get_variables().into_keys());
        known
    }

    /// Get variables as parsed VariableDefinition enum, including derived ones
    pub fn get_variables(&self) -> BTreeMap<String, VariableDefinition> {
        let mut vars = BTreeMap::new();

        if let Some(source) = &self.source {
            vars.insert(
                "repository".to_string(),
                VariableDefinition::String(source.repository.clone()),
            );
            vars.insert(
                "branch".to_string(),
                VariableDefinition::String(source.branch.clone()),
            );
        }

        if let Some(registry) = &self.registry {
            vars.insert(
                "registry".to_string(),
                VariableDefinition::String(registry.url.clone()),
            );
            vars.insert(
                "registry_username".to_string(),
                VariableDefinition::String(registry.username.clone()),
            );
        }

        for port in ["host_port", "container_port"] {
            vars.insert(
                port.to_string(),
                VariableDefinition::String(DEFAULT_SERVICE_PORT.to_string()),
            );
        }

        for (key, value) in &self.variables {
            let var_def = match value {
                Value::String(s) => VariableDefinition::String(s.clone()),
                Value::Number(n) => VariableDefinition::String(n.to_string()),
                Value::Bool(b) => VariableDefinition::String(b.to_string()),
                Value::Mapping(map) => {
                    // Environment reference: { env: "NAME", default: "..." }
                    let name = map
                        .get("env")
                        .and_then(|v| v.as_str())
                        .unwrap_or(key)
                        .to_string();

                    let default = map
                        .get("default")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);

                    VariableDefinition::Env { name, default }
                }
                _ => {
                    // Fallback: convert to string
                    VariableDefinition::String(
                        serde_yaml::to_string(value)
                            .unwrap_or_default()
                            .trim_end()
                            .to_string(),
                    )
                }
            };
            vars.insert(key.clone(), var_def);
        }

        vars
    }

    /// Branch checked out when no explicit source ref is given
    pub fn default_source_ref(&self) -> String {
        self.source
            .as_ref()
            .map(|s| s.branch.clone())
            .unwrap_or_else(default_branch)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
