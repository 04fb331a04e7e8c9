// ABOUTME: Minimal agent with no instruction, used to smoke-test the deploy pipeline.

use crate::definition::AgentDefinition;
use crate::registry::AgentEntry;

pub const NAME: &str = "sample_agent";

pub fn entry() -> AgentEntry {
    AgentEntry {
        definition: AgentDefinition::new(NAME, "gemini-2.0-flash-exp", ""),
        display_name: Some("sample-agent-adk".to_string()),
        description: "Sample agent".to_string(),
    }
}
