//! Agent configuration and lifecycle state types.

use serde::{Deserialize, Serialize};

use crate::provider::ToolChoice;

/// Per-agent execution settings.
///
/// Every field has a default, so a partial `[agent]` table in the config
/// file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name used in logs and error results
    #[serde(default = "default_name")]
    pub name: String,

    /// Hard ceiling on steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// How many earlier identical assistant replies count as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Wall-clock bound on a single step; `None` disables it
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: Option<u64>,

    /// Truncate tool output fed back into memory to this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    /// Tool-use policy passed to the backend
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Tools whose invocation ends the run
    #[serde(default = "default_special_tools")]
    pub special_tools: Vec<String>,

    /// Keep memory and prompt changes from one run to the next. When false
    /// every run starts from the agent's initial history and prompts.
    #[serde(default = "default_retain_history")]
    pub retain_history: bool,

    /// Override the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Override the built-in next-step guidance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_name() -> String {
    "stepwise".into()
}
fn default_max_steps() -> u32 {
    20
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_step_timeout() -> Option<u64> {
    Some(300)
}
fn default_retain_history() -> bool {
    true
}
fn default_special_tools() -> Vec<String> {
    vec!["terminate".into()]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            step_timeout_secs: default_step_timeout(),
            max_observe: None,
            tool_choice: ToolChoice::default(),
            special_tools: default_special_tools(),
            retain_history: default_retain_history(),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

/// Lifecycle state of an agent.
///
/// `Finished` and `Error` end a run; the agent is always back in `Idle`
/// once `run` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        };
        f.write_str(s)
    }
}
