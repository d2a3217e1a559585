//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent the ability to act: search the web, check the
//! local time and weather, pick a place for a group to meet, run
//! allowlisted shell commands, and end the interaction.

pub mod meeting_place;
pub mod reality_awareness;
pub mod shell;
pub mod terminate;
pub mod web_search;

use stepwise_core::tool::ToolRegistry;

/// Commands the shell tool accepts when no allowlist is configured.
pub fn safe_commands() -> Vec<String> {
    ["ls", "cat", "head", "tail", "echo", "pwd", "date", "wc", "grep", "find", "git"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Create the default tool registry.
///
/// Order is the catalog order the backend sees: `terminate`, `web_search`,
/// `reality_awareness`, `meeting_place`, `shell`. An empty
/// `allowed_commands` lets the shell tool run anything.
pub fn default_registry(allowed_commands: Vec<String>) -> ToolRegistry {
    ToolRegistry::new()
        .with(Box::new(terminate::TerminateTool))
        .with(Box::new(web_search::WebSearchTool))
        .with(Box::new(reality_awareness::RealityAwarenessTool))
        .with(Box::new(meeting_place::MeetingPlaceTool))
        .with(Box::new(shell::ShellTool::new(allowed_commands)))
}
