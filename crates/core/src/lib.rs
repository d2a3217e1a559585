//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent
//! execution engine. This crate has **no framework dependencies**: it
//! defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: the closed `Role` enum and conversation `Message`s
//! - [`memory`]: the append-only, per-agent message store and its repair
//! - [`tool`]: the `Tool` capability trait and the ordered `ToolRegistry`
//! - [`provider`]: the reasoning-backend trait
//! - [`agent`]: agent configuration and lifecycle state
//! - [`event`]: broadcast bus for domain events

pub mod error;
pub mod message;
pub mod memory;
pub mod provider;
pub mod tool;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{MemoryError, ProviderError, StepError, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use memory::Memory;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition};
pub use tool::{Tool, ToolInput, ToolRegistry, ToolResult};
pub use agent::{AgentConfig, AgentState};
pub use event::{DomainEvent, EventBus};
