// ABOUTME: Agents shipped with enginectl, one module per agent.
// ABOUTME: Each module exposes NAME and an entry() factory for the registry.

pub mod fp_agent;
pub mod sample_agent;
