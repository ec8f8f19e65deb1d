//! Stage domain model

use crate::core::config::StageConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Kind of work a stage performs. Decides the failure kind and default actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Clone,
    Test,
    Build,
    Containerize,
    Publish,
    Deploy,
    #[default]
    Custom,
}

impl StageKind {
    /// Actions used when a stage of this kind lists no steps
    pub fn default_actions(&self) -> Vec<String> {
        match self {
            StageKind::Clone => vec![
                "git clone --depth 1 --branch {{ source_ref }} {{ repository }} .".to_string(),
            ],
            StageKind::Containerize => vec!["docker build -t {{ image }} .".to_string()],
            StageKind::Publish => vec![
                "printf '%s' \"$REGISTRY_PASSWORD\" | docker login {{ registry }} -u {{ registry_username }} --password-stdin"
                    .to_string(),
                "docker push {{ image }}".to_string(),
            ],
            StageKind::Deploy => vec![
                "docker run -d -p {{ host_port }}:{{ container_port }} {{ image }}".to_string(),
            ],
            StageKind::Test | StageKind::Build | StageKind::Custom => Vec::new(),
        }
    }

    /// Variable a stage of this kind captures its output into by default
    pub fn default_capture(&self) -> Option<&'static str> {
        match self {
            StageKind::Deploy => Some("instance_id"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Clone => "clone",
            StageKind::Test => "test",
            StageKind::Build => "build",
            StageKind::Containerize => "containerize",
            StageKind::Publish => "publish",
            StageKind::Deploy => "deploy",
            StageKind::Custom => "custom",
        }
    }
}

/// Best-effort actions tied to a stage, run whatever the stage outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostAction {
    pub always: Vec<String>,
}

/// A single stage in a pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    /// Stage name, unique within the pipeline
    pub name: String,

    pub kind: StageKind,

    /// Shell actions, run in order
    pub actions: Vec<String>,

    pub post: Option<PostAction>,

    /// Variable that receives the trimmed last stdout line of the final action
    pub capture: Option<String>,

    /// Timeout per action in seconds
    pub timeout_secs: u64,
}

/// A `{{ name }}` placeholder that had no value at render time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedVariable(pub String);

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace `{{ name }}` placeholders with values from `variables`
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> Result<String, UnresolvedVariable> {
    let re = placeholder_regex();
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in re.captures_iter(template) {
        let whole = caps.get(0).expect("capture group 0 always exists");
        let name = &caps[1];
        let value = variables
            .get(name)
            .ok_or_else(|| UnresolvedVariable(name.to_string()))?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }
    rendered.push_str(&template[last..]);

    Ok(rendered)
}

/// Names of all placeholders referenced by a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

impl Stage {
    /// Create a stage from a stage config
    pub fn from_config(config: &StageConfig, defaults: &StageDefaults) -> Self {
        let kind = config.kind;

        let actions = if config.steps.is_empty() {
            kind.default_actions()
        } else {
            config.steps.clone()
        };

        let capture = config
            .capture
            .clone()
            .or_else(|| kind.default_capture().map(str::to_string));

        Stage {
            name: config.name.clone(),
            kind,
            actions,
            post: config.post.as_ref().map(|p| PostAction {
                always: p.always.clone(),
            }),
            capture,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }

    /// Post-actions of this stage, empty when none are declared
    pub fn post_actions(&self) -> &[String] {
        self.post.as_ref().map(|p| p.always.as_slice()).unwrap_or(&[])
    }

    /// Every placeholder referenced by the stage's actions and post-actions
    pub fn referenced_variables(&self) -> BTreeSet<String> {
        self.actions
            .iter()
            .chain(self.post_actions())
            .flat_map(|a| placeholders(a))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct StageDefaults {
    pub timeout_secs: u64,
}

impl Default for StageDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 600, // 10 minutes
        }
    }
}
