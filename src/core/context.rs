//! Run configuration and per-run context

use crate::core::{
    config::VariableDefinition,
    error::ConfigError,
    stage::StageKind,
    Pipeline,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Environment variable the registry password is exported under
pub const REGISTRY_PASSWORD_ENV: &str = "REGISTRY_PASSWORD";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Immutable inputs of a single run, fixed when the run starts
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_id: Uuid,

    /// Branch, tag or commit the Clone stage checks out
    pub source_ref: String,

    /// Resolved variables, visible to every stage
    variables: BTreeMap<String, String>,

    /// Exported to processes, never rendered into command text
    secrets: BTreeMap<String, String>,

    /// Directory under which the run's workspace is created
    pub workspace_root: PathBuf,

    /// Keep the workspace directory after the run ends
    pub keep_workspace: bool,
}

impl RunConfig {
    pub fn builder(pipeline: &Pipeline) -> RunConfigBuilder<'_> {
        RunConfigBuilder::new(pipeline)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn secrets(&self) -> &BTreeMap<String, String> {
        &self.secrets
    }
}

/// Builds a [`RunConfig`], resolving environment-backed variables and secrets
pub struct RunConfigBuilder<'a> {
    pipeline: &'a Pipeline,
    source_ref: Option<String>,
    overrides: BTreeMap<String, String>,
    secrets: BTreeMap<String, String>,
    workspace_root: Option<PathBuf>,
    keep_workspace: bool,
    lookup: EnvLookup,
}

impl<'a> RunConfigBuilder<'a> {
    fn new(pipeline: &'a Pipeline) -> Self {
        Self {
            pipeline,
            source_ref: None,
            overrides: BTreeMap::new(),
            secrets: BTreeMap::new(),
            workspace_root: None,
            keep_workspace: false,
            lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn keep_workspace(mut self, keep: bool) -> Self {
        self.keep_workspace = keep;
        self
    }

    /// Replace the process environment lookup (used by tests)
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Box::new(lookup);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let run_id = Uuid::new_v4();
        let source_ref = self
            .source_ref
            .unwrap_or_else(|| self.pipeline.default_source_ref.clone());

        let mut variables = BTreeMap::new();
        for (key, definition) in &self.pipeline.variables {
            if self.overrides.contains_key(key) {
                continue;
            }
            let value = definition
                .resolve(|name| (self.lookup)(name))
                .ok_or_else(|| match definition {
                    VariableDefinition::Env { name, .. } => ConfigError::UnsetEnvironment {
                        variable: key.clone(),
                        env: name.clone(),
                    },
                    VariableDefinition::String(_) => ConfigError::UnsetEnvironment {
                        variable: key.clone(),
                        env: key.clone(),
                    },
                })?;
            variables.insert(key.clone(), value);
        }
        variables.extend(self.overrides);

        variables.insert("source_ref".to_string(), source_ref.clone());
        variables.insert("run_id".to_string(), run_id.to_string());
        variables.insert("pipeline_name".to_string(), self.pipeline.name.clone());

        let mut secrets = self.secrets;
        let publishes = self
            .pipeline
            .stages
            .iter()
            .any(|s| s.kind == StageKind::Publish);
        if let (true, Some(registry)) = (publishes, &self.pipeline.registry) {
            if !secrets.contains_key(REGISTRY_PASSWORD_ENV) {
                let password = (self.lookup)(&registry.password_env)
                    .ok_or_else(|| ConfigError::MissingCredential(registry.password_env.clone()))?;
                secrets.insert(REGISTRY_PASSWORD_ENV.to_string(), password);
            }
        }

        let workspace_root = self
            .workspace_root
            .unwrap_or_else(|| std::env::temp_dir().join("stagerun"));

        Ok(RunConfig {
            run_id,
            source_ref,
            variables,
            secrets,
            workspace_root,
            keep_workspace: self.keep_workspace,
        })
    }
}

/// Mutable state shared between the stages of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Variables available for rendering (run variables plus captures)
    variables: BTreeMap<String, String>,

    /// Values captured by stages (variable -> value)
    captured: BTreeMap<String, String>,

    /// Variables exported to every spawned process
    env: BTreeMap<String, String>,

    /// Working directory of every action
    pub workspace: PathBuf,
}

impl RunContext {
    pub fn new(config: &RunConfig, workspace: PathBuf) -> Self {
        let mut variables = config.variables().clone();
        variables.insert("workspace".to_string(), workspace.display().to_string());

        let mut env: BTreeMap<String, String> = variables
            .iter()
            .map(|(k, v)| (env_name(k), v.clone()))
            .collect();
        env.extend(config.secrets().clone());

        Self {
            variables,
            captured: BTreeMap::new(),
            env,
            workspace,
        }
    }

    /// Get all variables available for rendering
    pub fn rendering_variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Store a value captured by a stage
    pub fn capture(&mut self, key: &str, value: String) {
        self.variables.insert(key.to_string(), value.clone());
        self.env.insert(env_name(key), value.clone());
        self.captured.insert(key.to_string(), value);
    }

    pub fn captured(&self) -> &BTreeMap<String, String> {
        &self.captured
    }

    pub fn process_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// Environment name a variable is exported under (`source_ref` -> `SOURCE_REF`)
pub fn env_name(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}
