//! The agent execution loop.
//!
//! An [`Agent`] runs a user request through repeated steps:
//!
//! 1. **Seed** memory with the query
//! 2. **Step**: ask the reasoning backend what to do next, given memory and
//!    the tool catalog
//! 3. **Act**: dispatch any requested tool calls and record their results
//! 4. **Repeat** until the task is finished, the step budget is spent, or a
//!    step fails
//!
//! Orphaned tool messages are repaired in place instead of failing the run,
//! and repeated replies nudge the next-step guidance.

pub mod loop_runner;
pub mod prompts;
pub mod tool_call;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{Agent, AgentContext, Step, StepOutcome};
pub use tool_call::ToolCallAgent;

use std::sync::Arc;

use stepwise_config::AppConfig;
use stepwise_core::provider::Provider;
use stepwise_core::tool::ToolRegistry;
use stepwise_tools::shell::ShellTool;

/// The built-in tools, configured from `config.tools`.
pub fn build_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = stepwise_tools::default_registry(config.tools.allowed_commands.clone());

    let workspace = config.tools.workspace();
    if workspace.is_dir() {
        registry.register(Box::new(
            ShellTool::new(config.tools.allowed_commands.clone()).with_working_dir(workspace),
        ));
    }

    registry
}

/// Assemble a tool-calling agent from configuration.
///
/// Prompts come from `config.agent` when set, otherwise the built-in
/// defaults with the workspace directory filled in.
pub fn build_agent(config: &AppConfig, provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Agent {
    let mut step = ToolCallAgent::new(provider, tools, &config.default_model)
        .with_config(&config.agent)
        .with_temperature(config.default_temperature);
    if config.default_max_tokens > 0 {
        step = step.with_max_tokens(config.default_max_tokens);
    }

    let system_prompt = config
        .agent
        .system_prompt
        .clone()
        .unwrap_or_else(|| prompts::system_prompt(&config.tools.workspace()));
    let next_step_prompt = config
        .agent
        .next_step_prompt
        .clone()
        .unwrap_or_else(|| prompts::NEXT_STEP_PROMPT.to_string());

    Agent::new(config.agent.clone(), step)
        .with_system_prompt(system_prompt)
        .with_next_step_prompt(next_step_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::{SequentialMockProvider, make_text_response};

    #[test]
    fn registry_has_builtin_tools() {
        let registry = build_registry(&AppConfig::default());
        assert_eq!(
            registry.names(),
            vec!["terminate", "web_search", "reality_awareness", "meeting_place", "shell"]
        );
    }

    #[tokio::test]
    async fn built_agent_uses_configured_prompts() {
        let mut config = AppConfig::default();
        config.agent.next_step_prompt = Some("keep going".into());
        config.agent.max_steps = 4;

        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response("hi")]));
        let agent = build_agent(&config, provider.clone(), Arc::new(build_registry(&config)));

        assert_eq!(agent.config().max_steps, 4);
        assert_eq!(agent.run("hello", None).await, "hi");

        let request = &provider.requests()[0];
        assert_eq!(request.model, config.default_model);
        assert!(request.messages[0].text().starts_with("You are Stepwise"));
        assert_eq!(request.messages.last().unwrap().text(), "keep going");
    }
}
