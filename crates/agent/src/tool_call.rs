//! The tool-calling step executor.
//!
//! Each step asks the reasoning backend for the next action given the
//! history and the tool catalog, then either records the final reply or
//! dispatches the requested tool calls and records their results.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use stepwise_core::agent::AgentConfig;
use stepwise_core::error::StepError;
use stepwise_core::event::DomainEvent;
use stepwise_core::message::{Message, MessageToolCall};
use stepwise_core::provider::{Provider, ProviderRequest, ToolChoice};
use stepwise_core::tool::{ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

use crate::loop_runner::{AgentContext, Step, StepOutcome};

pub struct ToolCallAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tool_choice: ToolChoice,
    special_tools: Vec<String>,
    max_observe: Option<usize>,
}

impl ToolCallAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tool_choice: defaults.tool_choice,
            special_tools: defaults.special_tools,
            max_observe: defaults.max_observe,
        }
    }

    /// Take tool policy, special tools and observation limit from `config`.
    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.tool_choice = config.tool_choice;
        self.special_tools = config.special_tools.clone();
        self.max_observe = config.max_observe;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request(&self, ctx: &AgentContext) -> ProviderRequest {
        let mut messages = Vec::with_capacity(ctx.memory.len() + 2);
        if let Some(prompt) = ctx.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(Message::system(prompt));
        }
        messages.extend(ctx.memory.all().iter().cloned());
        if let Some(prompt) = ctx.next_step_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(Message::user(prompt));
        }

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
            tool_choice: self.tool_choice,
        }
    }

    fn is_special(&self, name: &str) -> bool {
        self.special_tools.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Render a tool result as the text fed back to the backend.
    fn observation(&self, result: &ToolResult) -> String {
        let text = if result.success {
            result.output.clone()
        } else {
            format!("Error: {}", result.output)
        };

        match self.max_observe {
            Some(limit) if text.chars().count() > limit => text.chars().take(limit).collect(),
            _ => text,
        }
    }

    async fn dispatch(&self, ctx: &mut AgentContext, call: &MessageToolCall) {
        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        let started = Instant::now();

        let result = self.tools.execute(&call.name, call.arguments.as_str()).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        if result.success {
            debug!(tool = %call.name, duration_ms, "Tool succeeded");
        } else {
            warn!(tool = %call.name, duration_ms, error = %result.output, "Tool failed");
        }
        ctx.events.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });

        let message = Message::tool_result(&call.id, self.observation(&result))
            .with_image(result.base64_image);
        ctx.memory.append(message);
    }
}

#[async_trait]
impl Step for ToolCallAgent {
    async fn step(&self, ctx: &mut AgentContext) -> Result<StepOutcome, StepError> {
        let orphans = ctx.memory.orphaned_tool_call_ids();
        if !orphans.is_empty() {
            return Err(StepError::MalformedToolHistory(format!(
                "tool messages without a matching call: {}",
                orphans.join(", ")
            )));
        }

        let request = self.build_request(ctx);
        let response = self.provider.complete(request).await?;

        let tools_disabled = matches!(self.tool_choice, ToolChoice::None);
        if tools_disabled && !response.is_final() {
            warn!(
                count = response.message.tool_calls.len(),
                "Ignoring tool calls while tools are disabled"
            );
        }

        if tools_disabled || response.is_final() {
            if let Some(content) = response.message.content.filter(|c| !c.is_empty()) {
                ctx.memory.append(Message::assistant(content));
            }
            return Ok(match self.tool_choice {
                ToolChoice::Required => StepOutcome::Continue,
                _ => StepOutcome::Finished,
            });
        }

        let reply = response.message;
        let calls = reply.tool_calls;

        info!(
            step = ctx.current_step,
            tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Backend requested tool calls"
        );
        ctx.memory.append(Message::assistant_with_tool_calls(
            reply.content.unwrap_or_default(),
            calls.clone(),
        ));

        let mut finished = false;
        for call in &calls {
            self.dispatch(ctx, call).await;
            if self.is_special(&call.name) {
                info!(tool = %call.name, "Special tool finished the task");
                finished = true;
            }
        }

        Ok(if finished {
            StepOutcome::Finished
        } else {
            StepOutcome::Continue
        })
    }
}
