use serde::{Deserialize, Serialize};

/// Which pipeline workflow(s) the runtime starts, and which one handles a
/// request that does not name one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowsConfig {
    #[serde(default = "default_workflows")]
    pub enabled: Vec<String>,
    #[serde(default = "default_workflow")]
    pub default: String,
}

fn default_workflows() -> Vec<String> {
    vec!["voice_assistant".to_owned()]
}

fn default_workflow() -> String {
    "voice_assistant".to_owned()
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            enabled: default_workflows(),
            default: default_workflow(),
        }
    }
}
