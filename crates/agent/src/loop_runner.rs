//! The step-bounded agent loop and its lifecycle state machine.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use stepwise_core::agent::{AgentConfig, AgentState};
use stepwise_core::error::StepError;
use stepwise_core::event::{DomainEvent, EventBus};
use stepwise_core::memory::Memory;
use stepwise_core::message::Message;
use tracing::{debug, error, info, warn};

/// Returned when `run` is called while a run is already in progress.
pub const ALREADY_RUNNING: &str = "Already running, please wait.";

/// Returned when a run ends without any assistant output.
pub const NO_RESULT: &str = "Run completed without producing a result.";

/// Appended after orphaned tool messages have been dropped.
pub const REPAIR_NOTE: &str =
    "Tool call history was out of sync and has been repaired. Continuing.";

/// Result recorded for tool calls whose step ended before they returned.
pub const INTERRUPTED_TOOL_NOTE: &str = "Error: tool call was interrupted before it returned a result.";

/// Prepended to the next-step guidance when replies start repeating.
pub const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

/// What a step reports back to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More work remains
    Continue,
    /// The task is complete
    Finished,
}

/// Mutable run state handed to each step.
pub struct AgentContext {
    pub memory: Memory,
    pub system_prompt: Option<String>,
    pub next_step_prompt: Option<String>,
    pub current_step: u32,
    pub max_steps: u32,
    pub events: Arc<EventBus>,
}

/// One unit of work in the control loop.
///
/// Implementations read and append to `ctx.memory`. Returning
/// [`StepError::MalformedToolHistory`] asks the loop to repair memory and
/// carry on; any other error ends the run.
#[async_trait]
pub trait Step: Send + Sync {
    async fn step(&self, ctx: &mut AgentContext) -> Result<StepOutcome, StepError>;
}

/// What a run starts from when history is not retained.
#[derive(Default)]
struct Baseline {
    history: Vec<Message>,
    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
}

/// A reusable agent: one memory, one step executor, one run at a time.
pub struct Agent {
    config: AgentConfig,
    step: Box<dyn Step>,
    baseline: Baseline,
    state: Mutex<AgentState>,
    current_step: AtomicU32,
    context: tokio::sync::Mutex<AgentContext>,
    event_bus: Arc<EventBus>,
}

impl Agent {
    /// Create an agent with empty memory.
    pub fn new(config: AgentConfig, step: impl Step + 'static) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let context = AgentContext {
            memory: Memory::new(),
            system_prompt: config.system_prompt.clone(),
            next_step_prompt: config.next_step_prompt.clone(),
            current_step: 0,
            max_steps: config.max_steps,
            events: event_bus.clone(),
        };

        let baseline = Baseline {
            history: Vec::new(),
            system_prompt: config.system_prompt.clone(),
            next_step_prompt: config.next_step_prompt.clone(),
        };

        Self {
            config,
            step: Box::new(step),
            baseline,
            state: Mutex::new(AgentState::Idle),
            current_step: AtomicU32::new(0),
            context: tokio::sync::Mutex::new(context),
            event_bus,
        }
    }

    /// Publish events on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.context.get_mut().events = bus.clone();
        self.event_bus = bus;
        self
    }

    /// Set the system prompt used when the run does not override it.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.baseline.system_prompt = Some(prompt.clone());
        self.context.get_mut().system_prompt = Some(prompt);
        self
    }

    /// Set the guidance sent after the history on every step.
    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.baseline.next_step_prompt = Some(prompt.clone());
        self.context.get_mut().next_step_prompt = Some(prompt);
        self
    }

    /// Seed memory before the first run, and before every run when history
    /// is not retained.
    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        self.baseline.history.extend(messages.iter().cloned());
        self.context.get_mut().memory.extend(messages);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        *lock_state(&self.state)
    }

    /// Step counter of the current (or most recent) run.
    pub fn current_step(&self) -> u32 {
        self.current_step.load(Ordering::SeqCst)
    }

    /// Snapshot of memory. Waits for an in-flight run to finish.
    pub async fn messages(&self) -> Vec<Message> {
        self.context.lock().await.memory.all().to_vec()
    }

    pub async fn system_prompt(&self) -> Option<String> {
        self.context.lock().await.system_prompt.clone()
    }

    pub async fn next_step_prompt(&self) -> Option<String> {
        self.context.lock().await.next_step_prompt.clone()
    }

    /// Run the agent on `query` until it finishes, fails, or exhausts its
    /// step budget, and return the result text.
    ///
    /// Never returns an error: a fatal failure comes back as
    /// `"Error running {name} agent: {err}"`. The agent is `Idle` again
    /// when this returns, even if the future is dropped mid-run.
    pub async fn run(&self, query: &str, system_prompt: Option<&str>) -> String {
        let Some(guard) = StateGuard::acquire(&self.state, &self.event_bus, &self.config.name)
        else {
            warn!(agent = %self.config.name, "Run requested while already running");
            return ALREADY_RUNNING.to_string();
        };

        let mut ctx = self.context.lock().await;
        if !self.config.retain_history {
            self.reset(&mut ctx);
        }
        if let Some(prompt) = system_prompt {
            ctx.system_prompt = Some(prompt.to_string());
        }
        // A run dropped mid-dispatch can leave calls without results.
        ctx.memory.close_unanswered(INTERRUPTED_TOOL_NOTE);
        ctx.memory.append(Message::user(query));
        ctx.current_step = 0;
        ctx.max_steps = self.config.max_steps;
        self.current_step.store(0, Ordering::SeqCst);

        info!(
            agent = %self.config.name,
            max_steps = self.config.max_steps,
            query_len = query.len(),
            "Starting agent run"
        );
        self.event_bus.publish(DomainEvent::RunStarted {
            agent: self.config.name.clone(),
            query_preview: query.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let outcome = self.drive(&mut ctx, &guard).await;
        let final_state = guard.current();

        info!(
            agent = %self.config.name,
            steps = ctx.current_step,
            state = %final_state,
            "Agent run finished"
        );
        self.event_bus.publish(DomainEvent::RunFinished {
            agent: self.config.name.clone(),
            steps: ctx.current_step,
            final_state,
            timestamp: Utc::now(),
        });

        match outcome {
            Ok(()) => ctx
                .memory
                .last_assistant_content()
                .unwrap_or(NO_RESULT)
                .to_string(),
            Err(e) => format!("Error running {} agent: {e}", self.config.name),
        }
    }

    async fn drive(&self, ctx: &mut AgentContext, guard: &StateGuard<'_>) -> Result<(), StepError> {
        let max_steps = self.config.max_steps;

        while ctx.current_step < max_steps && guard.current() == AgentState::Running {
            ctx.current_step += 1;
            self.current_step.store(ctx.current_step, Ordering::SeqCst);
            debug!(agent = %self.config.name, step = ctx.current_step, max_steps, "Executing step");

            match self.execute_step(ctx).await {
                Ok(StepOutcome::Finished) => guard.transition(AgentState::Finished),
                Ok(StepOutcome::Continue) => {}
                Err(e) if e.is_recoverable() => {
                    let removed = ctx.memory.repair();
                    warn!(
                        agent = %self.config.name,
                        step = ctx.current_step,
                        removed,
                        error = %e,
                        "Repaired tool call history"
                    );
                    self.event_bus.publish(DomainEvent::HistoryRepaired {
                        agent: self.config.name.clone(),
                        removed,
                        timestamp: Utc::now(),
                    });
                    ctx.memory.append(Message::assistant(REPAIR_NOTE));
                    continue;
                }
                Err(e) => {
                    error!(agent = %self.config.name, step = ctx.current_step, error = %e, "Step failed");
                    ctx.memory.close_unanswered(INTERRUPTED_TOOL_NOTE);
                    ctx.memory.append(Message::assistant(format!("Error occurred: {e}")));
                    guard.transition(AgentState::Error);
                    return Err(e);
                }
            }

            self.event_bus.publish(DomainEvent::StepCompleted {
                agent: self.config.name.clone(),
                step: ctx.current_step,
                timestamp: Utc::now(),
            });

            if ctx.memory.is_stuck(self.config.duplicate_threshold) {
                self.handle_stuck(ctx);
            }
        }

        if ctx.current_step >= max_steps && guard.current() == AgentState::Running {
            warn!(agent = %self.config.name, max_steps, "Step limit reached");
            ctx.memory.append(Message::assistant(format!(
                "Maximum steps limit ({max_steps}) reached. Operation terminated."
            )));
        }

        Ok(())
    }

    /// Run one step with the configured timeout, converting a panic inside
    /// the step into an internal error.
    async fn execute_step(&self, ctx: &mut AgentContext) -> Result<StepOutcome, StepError> {
        let fut = AssertUnwindSafe(self.step.step(ctx)).catch_unwind();

        let caught = match self.config.step_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), fut).await {
                Ok(caught) => caught,
                Err(_) => return Err(StepError::Timeout { secs }),
            },
            None => fut.await,
        };

        caught.unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            Err(StepError::Internal(format!("step panicked: {reason}")))
        })
    }

    /// Put memory and prompts back to where the agent started.
    fn reset(&self, ctx: &mut AgentContext) {
        debug!(agent = %self.config.name, dropped = ctx.memory.len(), "Starting from a fresh session");
        ctx.memory.clear();
        ctx.memory.extend(self.baseline.history.iter().cloned());
        ctx.system_prompt = self.baseline.system_prompt.clone();
        ctx.next_step_prompt = self.baseline.next_step_prompt.clone();
    }

    fn handle_stuck(&self, ctx: &mut AgentContext) {
        warn!(
            agent = %self.config.name,
            step = ctx.current_step,
            threshold = self.config.duplicate_threshold,
            "Agent detected stuck state"
        );
        self.event_bus.publish(DomainEvent::StuckDetected {
            agent: self.config.name.clone(),
            step: ctx.current_step,
            timestamp: Utc::now(),
        });

        ctx.next_step_prompt = Some(match ctx.next_step_prompt.take() {
            Some(prompt) if prompt.starts_with(STUCK_PROMPT) => prompt,
            Some(prompt) if !prompt.is_empty() => format!("{STUCK_PROMPT}\n{prompt}"),
            _ => STUCK_PROMPT.to_string(),
        });
    }
}

fn lock_state(state: &Mutex<AgentState>) -> std::sync::MutexGuard<'_, AgentState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the agent in a run. Dropping it returns the agent to `Idle`.
struct StateGuard<'a> {
    state: &'a Mutex<AgentState>,
    events: &'a EventBus,
    agent: &'a str,
}

impl<'a> StateGuard<'a> {
    /// Atomically move `Idle` to `Running`; `None` if a run is in progress.
    fn acquire(state: &'a Mutex<AgentState>, events: &'a EventBus, agent: &'a str) -> Option<Self> {
        {
            let mut current = lock_state(state);
            if *current != AgentState::Idle {
                return None;
            }
            *current = AgentState::Running;
        }

        let guard = Self { state, events, agent };
        guard.announce(AgentState::Idle, AgentState::Running);
        Some(guard)
    }

    fn current(&self) -> AgentState {
        *lock_state(self.state)
    }

    fn transition(&self, to: AgentState) {
        let from = std::mem::replace(&mut *lock_state(self.state), to);
        if from != to {
            self.announce(from, to);
        }
    }

    fn announce(&self, from: AgentState, to: AgentState) {
        debug!(agent = %self.agent, %from, %to, "State transition");
        self.events.publish(DomainEvent::StateChanged {
            agent: self.agent.to_string(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.transition(AgentState::Idle);
    }
}
