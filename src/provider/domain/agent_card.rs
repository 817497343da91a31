//! Agent card: protocol metadata declared by a provider.

use serde::{Deserialize, Serialize};

/// Capability flags declared by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentCardCapabilities {
    /// Whether the agent supports server-sent-event streaming responses.
    #[serde(default)]
    pub streaming: bool,
    /// Whether the agent can deliver push notifications.
    #[serde(default)]
    pub push_notifications: bool,
}

/// Environment variable declared by an agent card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVariableDeclaration {
    /// Variable name as expected by the agent process.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the agent refuses to start without this variable.
    #[serde(default)]
    pub required: bool,
}

/// Denormalized protocol metadata fetched from a provider at registration.
///
/// Only the fields orchestration needs are retained; the card is stored
/// as-is alongside the provider row and never re-validated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCard {
    /// Agent display name.
    pub name: String,
    /// Agent description.
    #[serde(default)]
    pub description: Option<String>,
    /// Declared capability flags.
    #[serde(default)]
    pub capabilities: AgentCardCapabilities,
    /// Environment variables the agent declares.
    #[serde(default)]
    pub variables: Vec<AgentVariableDeclaration>,
}

impl AgentCard {
    /// Creates a minimal card with the given display name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            capabilities: AgentCardCapabilities::default(),
            variables: Vec::new(),
        }
    }

    /// Sets the declared capability flags.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: AgentCardCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Returns the names of variables the agent marks as required.
    #[must_use]
    pub fn required_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|declaration| declaration.required)
            .map(|declaration| declaration.name.as_str())
            .collect()
    }
}
